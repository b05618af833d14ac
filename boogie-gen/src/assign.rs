// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Location-aware assignment. An assignment between reference-typed values
//! means different things depending on where each side lives: memory to
//! memory is a pointer copy, storage to memory (and back) is a deep copy,
//! storage slot to storage pointer is a rebinding of the pointer. Tuples
//! decompose through temporaries so that swaps read all their sources
//! before the first write. Scalar stores go through select-to-update
//! rewriting and keep registered sum shadow variables in step.

use boogie_ast::{Expr, Stmt};
use contract_model::{
    ast::{AssignOp, Expr as SrcExpr, NodeId},
    ty::{DataLocation, DeclId, StructId, Type},
};

use crate::{arith, exprs::ExpressionTranslator, storage};

/// One side of an assignment: the translated expression, its source type,
/// and (when available) the source expression it came from. The source
/// expression is needed where translation alone loses information, i.e.
/// packing storage paths and decomposing tuple literals.
pub struct AssignSlot<'a> {
    pub expr: Expr,
    pub ty: Type,
    pub src: Option<&'a SrcExpr>,
}

/// Translates an assignment, emitting its statements and declarations into
/// `t`. Dispatches on the left-hand type: tuples, structs, arrays and
/// mappings each have their own copy semantics, everything else is a
/// scalar store.
pub fn make_assign(
    t: &mut ExpressionTranslator<'_, '_>,
    lhs: AssignSlot<'_>,
    rhs: AssignSlot<'_>,
    op: AssignOp,
    node: NodeId,
) {
    if matches!(op, AssignOp::Compound(_)) && lhs.ty.is_reference_type() {
        t.ctx()
            .report_error(node, "compound assignment to a reference type");
        return;
    }
    match lhs.ty.clone() {
        Type::Tuple(_) => assign_tuple(t, lhs, rhs, node),
        Type::Struct { id, loc, ptr } => assign_struct(t, lhs, rhs, id, loc, ptr, node),
        Type::Array { elem, loc, ptr, .. } => assign_array(t, lhs, rhs, &elem, loc, ptr, node),
        Type::Mapping(..) => assign_mapping(t, lhs, rhs, node),
        _ => assign_scalar(t, lhs, rhs, op, node),
    }
}

fn tuple_components<'a>(src: Option<&'a SrcExpr>) -> Option<&'a [Option<SrcExpr>]> {
    match src {
        Some(SrcExpr::Tuple { components, .. }) => Some(components),
        _ => None,
    }
}

fn component_src<'a>(srcs: Option<&'a [Option<SrcExpr>]>, i: usize) -> Option<&'a SrcExpr> {
    srcs.and_then(|cs| cs.get(i)).and_then(|c| c.as_ref())
}

fn expr_components(expr: &Expr, arity: usize) -> Vec<Expr> {
    match expr {
        Expr::Tuple(parts) if parts.len() == arity => parts.clone(),
        _ => vec![Expr::Error; arity],
    }
}

/// Tuple assignment: all sources are read into temporaries before any
/// destination is written, and destinations are written in reverse order,
/// so `(a, b) = (b, a)` swaps.
fn assign_tuple(
    t: &mut ExpressionTranslator<'_, '_>,
    lhs: AssignSlot<'_>,
    rhs: AssignSlot<'_>,
    node: NodeId,
) {
    let (lhs_tys, rhs_tys) = match (&lhs.ty, &rhs.ty) {
        (Type::Tuple(l), Type::Tuple(r)) if l.len() == r.len() => (l.clone(), r.clone()),
        _ => {
            t.ctx()
                .report_error(node, "mismatching tuple arities in assignment");
            return;
        }
    };
    let arity = lhs_tys.len();
    let lhs_exprs = expr_components(&lhs.expr, arity);
    let rhs_exprs = expr_components(&rhs.expr, arity);
    let lhs_srcs = tuple_components(lhs.src);
    let rhs_srcs = tuple_components(rhs.src);

    // Read into temporaries, typed like the destination components.
    let mut temps: Vec<Option<String>> = vec![];
    for i in 0..arity {
        let skipped = lhs_srcs.map(|cs| cs[i].is_none()).unwrap_or(false);
        if skipped {
            temps.push(None);
            continue;
        }
        let bty = t.ctx().to_btype(&lhs_tys[i]);
        let temp = t.fresh_temp("tuple", bty);
        let temp_slot = AssignSlot {
            expr: Expr::id(temp.clone()),
            ty: lhs_tys[i].clone(),
            src: None,
        };
        let rhs_slot = AssignSlot {
            expr: rhs_exprs[i].clone(),
            ty: rhs_tys[i].clone(),
            src: component_src(rhs_srcs, i),
        };
        make_assign(t, temp_slot, rhs_slot, AssignOp::Assign, node);
        temps.push(Some(temp));
    }

    // Write destinations in reverse.
    for i in (0..arity).rev() {
        let temp = match &temps[i] {
            Some(temp) => temp.clone(),
            None => continue,
        };
        let lhs_slot = AssignSlot {
            expr: lhs_exprs[i].clone(),
            ty: lhs_tys[i].clone(),
            src: component_src(lhs_srcs, i),
        };
        let temp_slot = AssignSlot {
            expr: Expr::id(temp),
            ty: lhs_tys[i].clone(),
            src: None,
        };
        make_assign(t, lhs_slot, temp_slot, AssignOp::Assign, node);
    }
}

/// Rebinds a storage pointer: the right-hand side is either already a
/// pointer (plain copy) or a storage path to pack.
fn rebind_pointer(
    t: &mut ExpressionTranslator<'_, '_>,
    lhs: &AssignSlot<'_>,
    rhs: &AssignSlot<'_>,
    node: NodeId,
) {
    let value = if rhs.ty.is_storage_ptr() && !packs_from_state(t, rhs) {
        rhs.expr.clone()
    } else if let Some(src) = rhs.src {
        storage::pack(t, src)
    } else {
        t.ctx()
            .report_error(node, "cannot form a storage reference here");
        Expr::Error
    };
    store(t, lhs, value, node);
}

/// Whether the right-hand side, despite having a pointer type, names a
/// state path (and thus needs packing rather than pointer copy).
fn packs_from_state(t: &mut ExpressionTranslator<'_, '_>, rhs: &AssignSlot<'_>) -> bool {
    match rhs.src.and_then(|s| s.root_ident()) {
        Some(decl) => t.ctx().env.is_state_var(decl),
        None => false,
    }
}

#[allow(clippy::too_many_arguments)]
fn assign_struct(
    t: &mut ExpressionTranslator<'_, '_>,
    lhs: AssignSlot<'_>,
    rhs: AssignSlot<'_>,
    id: StructId,
    loc: DataLocation,
    ptr: bool,
    node: NodeId,
) {
    match loc {
        DataLocation::Storage if ptr => rebind_pointer(t, &lhs, &rhs, node),
        DataLocation::Storage => {
            // Into an actual storage slot: deep copy, unpacking a pointer
            // right-hand side first.
            let rhs_value = if rhs.ty.is_storage_ptr() {
                storage::unpack(t.ctx(), node, &rhs.expr, &rhs.ty)
            } else {
                rhs.expr.clone()
            };
            let from_memory = rhs.ty.stored_in(DataLocation::Memory)
                || rhs.ty.stored_in(DataLocation::Calldata);
            copy_struct_members(t, &lhs, rhs_value, id, from_memory, false, node);
        }
        DataLocation::Memory => {
            if rhs.ty.stored_in(DataLocation::Memory) {
                // Reference semantics within memory.
                store(t, &lhs, rhs.expr, node);
            } else {
                let rhs_value = if rhs.ty.is_storage_ptr() {
                    storage::unpack(t.ctx(), node, &rhs.expr, &rhs.ty)
                } else {
                    rhs.expr.clone()
                };
                let fresh = t.allocate_memory();
                store(t, &lhs, Expr::id(fresh.clone()), node);
                let target = AssignSlot {
                    expr: Expr::id(fresh),
                    ty: lhs.ty.clone(),
                    src: None,
                };
                copy_struct_members(t, &target, rhs_value, id, false, true, node);
            }
        }
        DataLocation::Calldata => {
            t.ctx()
                .report_error(node, "assignment into calldata is not supported");
        }
    }
}

/// Member-by-member deep copy into `lhs`, which is either a storage slot
/// (datatype value) or a fresh memory pointer. Mappings cannot be copied
/// and are skipped.
#[allow(clippy::too_many_arguments)]
fn copy_struct_members(
    t: &mut ExpressionTranslator<'_, '_>,
    lhs: &AssignSlot<'_>,
    rhs_value: Expr,
    id: StructId,
    rhs_in_memory: bool,
    lhs_in_memory: bool,
    node: NodeId,
) {
    let fields = t.ctx().env.struct_data(id).fields.clone();
    for field in fields {
        let field_ty = t.ctx().env.decl_data(field).ty.clone();
        if matches!(field_ty, Type::Mapping(..)) {
            continue;
        }
        let rhs_slot = member_slot(t, rhs_value.clone(), field, &field_ty, rhs_in_memory);
        let lhs_slot = member_slot(t, lhs.expr.clone(), field, &field_ty, lhs_in_memory);
        make_assign(t, lhs_slot, rhs_slot, AssignOp::Assign, node);
    }
}

/// A member of a struct value as an assignment slot: datatype selector in
/// storage, member heap select in memory (where the base is a pointer).
fn member_slot<'a>(
    t: &mut ExpressionTranslator<'_, '_>,
    base: Expr,
    field: DeclId,
    field_ty: &Type,
    in_memory: bool,
) -> AssignSlot<'a> {
    if in_memory {
        let heap = t.ctx().mem_field_heap(field);
        AssignSlot {
            expr: Expr::sel(Expr::id(heap), base),
            ty: field_ty.with_location(DataLocation::Memory, false),
            src: None,
        }
    } else {
        let member = t.ctx().map_decl_name(field);
        AssignSlot {
            expr: Expr::dtsel(base, member),
            ty: field_ty.with_location(DataLocation::Storage, false),
            src: None,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn assign_array(
    t: &mut ExpressionTranslator<'_, '_>,
    lhs: AssignSlot<'_>,
    rhs: AssignSlot<'_>,
    elem: &Type,
    loc: DataLocation,
    ptr: bool,
    node: NodeId,
) {
    match loc {
        DataLocation::Storage if ptr => rebind_pointer(t, &lhs, &rhs, node),
        DataLocation::Storage => {
            let rhs_value = if rhs.ty.is_storage_ptr() {
                storage::unpack(t.ctx(), node, &rhs.expr, &rhs.ty)
            } else if rhs.ty.stored_in(DataLocation::Memory)
                || rhs.ty.stored_in(DataLocation::Calldata)
            {
                if elem.is_reference_type() {
                    t.ctx().report_error(
                        node,
                        "copying arrays of reference elements between locations is not supported",
                    );
                    return;
                }
                let elem_bty = t.ctx().to_btype(elem);
                t.ctx().mem_array(rhs.expr.clone(), elem_bty)
            } else {
                rhs.expr.clone()
            };
            // Arrays are datatype values, one store copies the whole slot.
            store(t, &lhs, rhs_value, node);
        }
        DataLocation::Memory => {
            if rhs.ty.stored_in(DataLocation::Memory) {
                store(t, &lhs, rhs.expr, node);
            } else {
                if elem.is_reference_type() {
                    t.ctx().report_error(
                        node,
                        "copying arrays of reference elements between locations is not supported",
                    );
                    return;
                }
                let rhs_value = if rhs.ty.is_storage_ptr() {
                    storage::unpack(t.ctx(), node, &rhs.expr, &rhs.ty)
                } else {
                    rhs.expr.clone()
                };
                let elem_bty = t.ctx().to_btype(elem);
                let fresh = t.allocate_memory();
                let heap = t.ctx().mem_array_heap(elem_bty);
                t.emit(Stmt::assign(
                    Expr::id(heap.clone()),
                    Expr::upd(Expr::id(heap), Expr::id(fresh.clone()), rhs_value),
                ));
                store(t, &lhs, Expr::id(fresh), node);
            }
        }
        DataLocation::Calldata => {
            t.ctx()
                .report_error(node, "assignment into calldata is not supported");
        }
    }
}

/// Mappings cannot be copied; the only legal assignment is rebinding a
/// mapping-typed local pointer.
fn assign_mapping(
    t: &mut ExpressionTranslator<'_, '_>,
    lhs: AssignSlot<'_>,
    rhs: AssignSlot<'_>,
    node: NodeId,
) {
    let lhs_is_local = match lhs.src {
        Some(SrcExpr::Ident(_, decl)) => !t.ctx().env.is_state_var(*decl),
        _ => false,
    };
    if lhs_is_local {
        rebind_pointer(t, &lhs, &rhs, node);
    } else {
        t.ctx().report_error(node, "mappings cannot be assigned");
    }
}

fn assign_scalar(
    t: &mut ExpressionTranslator<'_, '_>,
    lhs: AssignSlot<'_>,
    rhs: AssignSlot<'_>,
    op: AssignOp,
    node: NodeId,
) {
    let value = match op {
        AssignOp::Assign => rhs.expr,
        AssignOp::Compound(bin_op) => {
            let (bits, signed) = match lhs.ty {
                Type::Int { bits, signed } => (bits, signed),
                _ => (256, false),
            };
            let encoded = arith::encode_binary(
                t.ctx(),
                node,
                bin_op,
                lhs.expr.clone(),
                rhs.expr,
                bits,
                signed,
            );
            if let Some(cc) = encoded.correctness {
                t.conditions_mut().add_oc(cc);
            }
            encoded.expr
        }
    };
    store(t, &lhs, value, node);
}

/// Emits the store of `value` into the place denoted by `lhs`. Conditional
/// places distribute into both branches; select chains are rewritten into
/// whole-variable updates; a registered sum shadow over the destination's
/// root state variable is kept in step before the write.
pub fn store(t: &mut ExpressionTranslator<'_, '_>, lhs: &AssignSlot<'_>, value: Expr, node: NodeId) {
    let shadow = lhs
        .src
        .and_then(|s| s.root_ident())
        .filter(|_| lhs.ty.is_number())
        .and_then(|decl| t.ctx().registered_sum_shadow(decl));
    let place = lhs.expr.lift_conditionals();
    store_in_place(t, place, value, shadow.as_deref(), node);
}

fn store_in_place(
    t: &mut ExpressionTranslator<'_, '_>,
    place: Expr,
    value: Expr,
    shadow: Option<&str>,
    node: NodeId,
) {
    match place {
        Expr::Cond {
            cond,
            if_true,
            if_false,
        } => {
            let then_block =
                t.collect_block(|t| store_in_place(t, *if_true, value.clone(), shadow, node));
            let else_block =
                t.collect_block(|t| store_in_place(t, *if_false, value, shadow, node));
            t.emit(Stmt::if_else(*cond, then_block, Some(else_block)));
        }
        Expr::Error => {
            // Already reported while translating the place.
        }
        place => {
            if let Some(shadow) = shadow {
                let this = t.ctx().this_expr();
                let current = Expr::sel(Expr::id(shadow), this.clone());
                let updated = Expr::add(Expr::sub(current, place.clone()), value.clone());
                t.emit(Stmt::assign(
                    Expr::id(shadow),
                    Expr::upd(Expr::id(shadow), this, updated),
                ));
            }
            let (base, new_value) = place.to_update(value);
            match base {
                Expr::Id(_) => t.emit(Stmt::assign(base, new_value)),
                _ => t
                    .ctx()
                    .report_error(node, "expression is not assignable"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_model::{
        ast::{BinOp, MemberRef},
        env::{DeclKind, GlobalEnv},
    };
    use num::BigInt;

    use crate::{context::TranslationContext, exprs, options::Options};

    #[test]
    fn conditional_destination_splits_into_branches() {
        // `(c ? s1 : s2).x = 1`: the conditional base is lifted out of the
        // selector chain, so the store becomes an if/else with one plain
        // assignment per branch.
        let mut env = GlobalEnv::new();
        let contract = env.add_contract("C");
        let s = env.add_struct("S");
        env.add_struct_field(s, "x", Type::uint(256));
        let slot_ty = Type::Struct {
            id: s,
            loc: DataLocation::Storage,
            ptr: false,
        };
        let s1 = env.add_state_var(contract, "s1", slot_ty.clone());
        let s2 = env.add_state_var(contract, "s2", slot_ty.clone());
        let c = env.add_local("c", Type::Bool, DeclKind::Local);

        let options = Options::default();
        let mut ctx = TranslationContext::new(&env, &options);
        let assignment = SrcExpr::Assign {
            id: env.new_node(Type::uint(256)),
            op: AssignOp::Assign,
            lhs: Box::new(SrcExpr::Member {
                id: env.new_node(Type::uint(256)),
                base: Box::new(SrcExpr::Conditional {
                    id: env.new_node(slot_ty.clone()),
                    cond: Box::new(SrcExpr::Ident(env.new_node(Type::Bool), c)),
                    if_true: Box::new(SrcExpr::Ident(env.new_node(slot_ty.clone()), s1)),
                    if_false: Box::new(SrcExpr::Ident(env.new_node(slot_ty), s2)),
                }),
                member: MemberRef::Field(s, 0),
            }),
            rhs: Box::new(SrcExpr::NumberLit(
                env.new_node(Type::uint(256)),
                BigInt::from(1),
            )),
        };
        let result = exprs::lower_expression(&mut ctx, &assignment);
        assert!(!env.has_errors());

        let single_store = |block: &boogie_ast::Block| {
            matches!(block.stmts.as_slice(), [Stmt::Assign { .. }])
        };
        let found = result.stmts.iter().any(|stmt| match stmt {
            Stmt::If {
                then_block,
                else_block: Some(else_block),
                ..
            } => single_store(then_block) && single_store(else_block),
            _ => false,
        });
        assert!(found, "expected a two-armed store, got {:?}", result.stmts);
    }

    #[test]
    fn compound_assignment_to_a_reference_type_is_rejected() {
        let mut env = GlobalEnv::new();
        let contract = env.add_contract("C");
        let s = env.add_struct("S");
        env.add_struct_field(s, "x", Type::uint(256));
        let slot_ty = Type::Struct {
            id: s,
            loc: DataLocation::Storage,
            ptr: false,
        };
        let s1 = env.add_state_var(contract, "s1", slot_ty.clone());
        let s2 = env.add_state_var(contract, "s2", slot_ty.clone());

        let options = Options::default();
        let mut ctx = TranslationContext::new(&env, &options);
        let assignment = SrcExpr::Assign {
            id: env.new_node(slot_ty.clone()),
            op: AssignOp::Compound(BinOp::Add),
            lhs: Box::new(SrcExpr::Ident(env.new_node(slot_ty.clone()), s1)),
            rhs: Box::new(SrcExpr::Ident(env.new_node(slot_ty), s2)),
        };
        exprs::lower_expression(&mut ctx, &assignment);
        assert!(env.has_errors());
    }
}
