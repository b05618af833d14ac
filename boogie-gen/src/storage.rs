// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Local storage reference codec. A storage-typed local variable is
//! represented as a packed integer array describing a path into the
//! contract's state: slot 0 holds the index of the root state variable in
//! the global enumeration, later slots hold struct member indices and
//! array/mapping index values.
//!
//! `pack` encodes a storage path expression into such an array, `unpack`
//! decodes a packed array back into a conditional over every state slot the
//! pointer could denote, and `repack` extends an existing pointer with
//! further path steps when the root of a path is itself a pointer.

use num::BigInt;

use boogie_ast::Expr;
use contract_model::{
    ast::{Expr as SrcExpr, MemberRef},
    env::DeclKind,
    ty::{DataLocation, StructId, Type},
};

use crate::{
    context::{TranslationContext, NULL_PTR},
    exprs::ExpressionTranslator,
};

fn slot(ptr: &Expr, index: usize) -> Expr {
    Expr::sel(ptr.clone(), Expr::num(BigInt::from(index)))
}

/// Writes `steps` into `base` at consecutive slots starting at `start`.
fn write_steps(base: Expr, start: usize, steps: &[Expr]) -> Expr {
    steps.iter().enumerate().fold(base, |acc, (i, step)| {
        Expr::upd(acc, Expr::num(BigInt::from(start + i)), step.clone())
    })
}

/// Both sides viewed as the slot they denote, ignoring pointer-ness.
fn types_match(candidate: &Type, target: &Type) -> bool {
    match (candidate, target) {
        (Type::Mapping(..), Type::Mapping(..)) => candidate == target,
        (Type::Struct { .. }, Type::Struct { .. }) | (Type::Array { .. }, Type::Array { .. }) => {
            candidate.with_location(DataLocation::Storage, false)
                == target.with_location(DataLocation::Storage, false)
        }
        _ => false,
    }
}

/// Packs a storage path expression into a pointer value. Index
/// subexpressions are translated through `t` (hoisting their side effects),
/// conditional paths pack both branches, and a pointer-rooted path goes
/// through `repack`.
pub fn pack(t: &mut ExpressionTranslator<'_, '_>, expr: &SrcExpr) -> Expr {
    pack_with_suffix(t, expr, &[])
}

fn pack_with_suffix(t: &mut ExpressionTranslator<'_, '_>, expr: &SrcExpr, suffix: &[Expr]) -> Expr {
    match expr {
        SrcExpr::Member {
            base,
            member: MemberRef::Field(_, index),
            ..
        } => {
            let mut steps = vec![Expr::num(BigInt::from(*index))];
            steps.extend_from_slice(suffix);
            pack_with_suffix(t, base, &steps)
        }
        SrcExpr::Index { base, index, .. } => {
            let index_expr = t.translate(index);
            let mut steps = vec![index_expr];
            steps.extend_from_slice(suffix);
            pack_with_suffix(t, base, &steps)
        }
        SrcExpr::Conditional {
            cond,
            if_true,
            if_false,
            ..
        } => {
            let cond_expr = t.translate(cond);
            let true_ptr = pack_with_suffix(t, if_true, suffix);
            let false_ptr = pack_with_suffix(t, if_false, suffix);
            Expr::cond(cond_expr, true_ptr, false_ptr)
        }
        SrcExpr::Ident(node, decl) => {
            let data = t.ctx().env.decl_data(*decl);
            match data.kind {
                DeclKind::StateVar { .. } => {
                    let order = t.ctx().env.state_vars_in_order();
                    match order.iter().position(|sv| sv == decl) {
                        Some(global_index) => {
                            let mut steps = vec![Expr::num(BigInt::from(global_index))];
                            steps.extend_from_slice(suffix);
                            write_steps(Expr::id(NULL_PTR), 0, &steps)
                        }
                        None => {
                            t.ctx()
                                .report_error(*node, "state variable missing from enumeration");
                            Expr::Error
                        }
                    }
                }
                _ if data.ty.is_storage_ptr() => {
                    let base_ty = data.ty.clone();
                    let name = t.ctx().map_decl_name(*decl);
                    repack(t.ctx(), *node, Expr::id(name), &base_ty, suffix)
                }
                _ => {
                    t.ctx()
                        .report_error(*node, "cannot take a storage reference of this expression");
                    Expr::Error
                }
            }
        }
        _ => {
            t.ctx().report_error(
                expr.node_id(),
                "cannot take a storage reference of this expression",
            );
            Expr::Error
        }
    }
}

/// Extends the packed pointer `base_ptr` (of type `base_ty`) with further
/// path steps. Since the length of the encoded path is not known
/// statically, every path through the state that could produce a value of
/// `base_ty` is a candidate; its guard tests the pointer's constant slots
/// and its value appends `suffix` after the candidate's depth. The first
/// matching path in declaration order wins.
pub fn repack(
    ctx: &mut TranslationContext,
    node: contract_model::ast::NodeId,
    base_ptr: Expr,
    base_ty: &Type,
    suffix: &[Expr],
) -> Expr {
    let candidates = path_candidates(ctx, &base_ptr, base_ty);
    if candidates.is_empty() {
        ctx.report_error(node, "no matching storage target for pointer");
        return Expr::Error;
    }
    let mut result: Option<Expr> = None;
    for (guards, depth) in candidates.into_iter().rev() {
        let value = write_steps(base_ptr.clone(), depth, suffix);
        result = Some(match result {
            None => value,
            Some(rest) => Expr::cond(conjoin(guards), value, rest),
        });
    }
    // Cannot be empty, checked above.
    result.unwrap_or(Expr::Error)
}

fn conjoin(guards: Vec<Expr>) -> Expr {
    let mut iter = guards.into_iter();
    match iter.next() {
        None => Expr::true_(),
        Some(first) => iter.fold(first, Expr::and),
    }
}

/// All paths through the state enumeration producing a value of `target`,
/// as (guard set over `ptr`'s constant slots, path depth) pairs in
/// declaration order.
fn path_candidates(
    ctx: &TranslationContext,
    ptr: &Expr,
    target: &Type,
) -> Vec<(Vec<Expr>, usize)> {
    let mut out = vec![];
    for (global_index, sv) in ctx.env.state_vars_in_order().into_iter().enumerate() {
        let ty = ctx.env.decl_data(sv).ty.clone();
        let guards = vec![Expr::eq(slot(ptr, 0), Expr::num(BigInt::from(global_index)))];
        let mut visited = vec![];
        descend_candidates(ctx, &ty, ptr, 1, guards, target, &mut visited, &mut out);
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn descend_candidates(
    ctx: &TranslationContext,
    ty: &Type,
    ptr: &Expr,
    depth: usize,
    guards: Vec<Expr>,
    target: &Type,
    visited: &mut Vec<StructId>,
    out: &mut Vec<(Vec<Expr>, usize)>,
) {
    if types_match(ty, target) {
        out.push((guards, depth));
        return;
    }
    match ty {
        Type::Array { elem, loc, .. } if *loc == DataLocation::Storage => {
            // Index slot, unconstrained.
            descend_candidates(ctx, elem, ptr, depth + 1, guards, target, visited, out);
        }
        Type::Mapping(_, value) => {
            descend_candidates(ctx, value, ptr, depth + 1, guards, target, visited, out);
        }
        Type::Struct {
            id,
            loc: DataLocation::Storage,
            ..
        } => {
            if visited.contains(id) {
                return;
            }
            visited.push(*id);
            let fields = ctx.env.struct_data(*id).fields.clone();
            for (index, field) in fields.into_iter().enumerate() {
                let field_ty = ctx.env.decl_data(field).ty.clone();
                let mut field_guards = guards.clone();
                field_guards.push(Expr::eq(
                    slot(ptr, depth),
                    Expr::num(BigInt::from(index)),
                ));
                descend_candidates(
                    ctx,
                    &field_ty,
                    ptr,
                    depth + 1,
                    field_guards,
                    target,
                    visited,
                    out,
                );
            }
            visited.pop();
        }
        _ => {}
    }
}

/// Unpacks a pointer back into the storage slot it denotes: a
/// right-associated conditional over every candidate path of the target
/// type, keyed on the pointer's constant slots, defaulting to the last
/// candidate in declaration order.
pub fn unpack(
    ctx: &mut TranslationContext,
    node: contract_model::ast::NodeId,
    ptr: &Expr,
    target: &Type,
) -> Expr {
    let mut candidates = vec![];
    for (global_index, sv) in ctx.env.state_vars_in_order().into_iter().enumerate() {
        let ty = ctx.env.decl_data(sv).ty.clone();
        let name = ctx.map_decl_name(sv);
        let base = Expr::sel(Expr::id(name), ctx.this_expr());
        let guards = vec![Expr::eq(slot(ptr, 0), Expr::num(BigInt::from(global_index)))];
        let mut visited = vec![];
        descend_unpack(
            ctx,
            &ty,
            base,
            ptr,
            1,
            guards,
            target,
            &mut visited,
            &mut candidates,
        );
    }
    if candidates.is_empty() {
        ctx.report_error(node, "no matching storage target for pointer");
        return Expr::Error;
    }
    let mut result: Option<Expr> = None;
    for (guards, value) in candidates.into_iter().rev() {
        result = Some(match result {
            None => value,
            Some(rest) => Expr::cond(conjoin(guards), value, rest),
        });
    }
    result.unwrap_or(Expr::Error)
}

#[allow(clippy::too_many_arguments)]
fn descend_unpack(
    ctx: &mut TranslationContext,
    ty: &Type,
    value: Expr,
    ptr: &Expr,
    depth: usize,
    guards: Vec<Expr>,
    target: &Type,
    visited: &mut Vec<StructId>,
    out: &mut Vec<(Vec<Expr>, Expr)>,
) {
    if types_match(ty, target) {
        out.push((guards, value));
        return;
    }
    match ty {
        Type::Array { elem, loc, .. } if *loc == DataLocation::Storage => {
            let elem_bty = ctx.to_btype(elem);
            let inner = ctx.inner_array(value, elem_bty);
            let element = Expr::sel(inner, slot(ptr, depth));
            descend_unpack(
                ctx,
                elem,
                element,
                ptr,
                depth + 1,
                guards,
                target,
                visited,
                out,
            );
        }
        Type::Mapping(_, value_ty) => {
            let element = Expr::sel(value, slot(ptr, depth));
            descend_unpack(
                ctx,
                value_ty,
                element,
                ptr,
                depth + 1,
                guards,
                target,
                visited,
                out,
            );
        }
        Type::Struct {
            id,
            loc: DataLocation::Storage,
            ..
        } => {
            if visited.contains(id) {
                return;
            }
            visited.push(*id);
            let fields = ctx.env.struct_data(*id).fields.clone();
            for (index, field) in fields.into_iter().enumerate() {
                let field_ty = ctx.env.decl_data(field).ty.clone();
                let member = Expr::dtsel(value.clone(), ctx.map_decl_name(field));
                let mut field_guards = guards.clone();
                field_guards.push(Expr::eq(
                    slot(ptr, depth),
                    Expr::num(BigInt::from(index)),
                ));
                descend_unpack(
                    ctx,
                    &field_ty,
                    member,
                    ptr,
                    depth + 1,
                    field_guards,
                    target,
                    visited,
                    out,
                );
            }
            visited.pop();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_model::env::GlobalEnv;

    use crate::options::Options;

    /// A contract with `S s1; S s2; mapping(address => S) m;` where
    /// `struct S { uint x; uint y; }`. Returns the env and the struct id.
    fn sample_env() -> (GlobalEnv, StructId) {
        let mut env = GlobalEnv::new();
        let contract = env.add_contract("Sample");
        let s = env.add_struct("S");
        env.add_struct_field(s, "x", Type::uint(256));
        env.add_struct_field(s, "y", Type::uint(256));
        let slot_ty = Type::Struct {
            id: s,
            loc: DataLocation::Storage,
            ptr: false,
        };
        env.add_state_var(contract, "s1", slot_ty.clone());
        env.add_state_var(contract, "s2", slot_ty.clone());
        env.add_state_var(
            contract,
            "m",
            Type::Mapping(Box::new(Type::Address), Box::new(slot_ty)),
        );
        (env, s)
    }

    fn ptr_target(s: StructId) -> Type {
        Type::Struct {
            id: s,
            loc: DataLocation::Storage,
            ptr: true,
        }
    }

    #[test]
    fn unpack_enumerates_all_struct_slots() {
        let (env, s) = sample_env();
        let options = Options::default();
        let mut ctx = TranslationContext::new(&env, &options);
        let node = env.new_node(ptr_target(s));
        let unpacked = unpack(&mut ctx, node, &Expr::id("p"), &ptr_target(s));
        // Three candidates (s1, s2, m[...]): two nested conditionals with
        // the mapping candidate as default.
        match unpacked {
            Expr::Cond {
                cond, if_false, ..
            } => {
                assert_eq!(
                    *cond,
                    Expr::eq(
                        Expr::sel(Expr::id("p"), Expr::num(BigInt::from(0))),
                        Expr::num(BigInt::from(0))
                    )
                );
                assert!(matches!(*if_false, Expr::Cond { .. }));
            }
            other => panic!("expected conditional chain, got {:?}", other),
        }
    }

    #[test]
    fn unpack_without_candidates_is_an_error() {
        let (env, _) = sample_env();
        let options = Options::default();
        let mut ctx = TranslationContext::new(&env, &options);
        // No state variable can produce a uint[] slot.
        let target = Type::Array {
            elem: Box::new(Type::uint(256)),
            len: None,
            loc: DataLocation::Storage,
            ptr: true,
        };
        let node = env.new_node(target.clone());
        let unpacked = unpack(&mut ctx, node, &Expr::id("p"), &target);
        assert!(unpacked.is_error());
        assert!(env.has_errors());
    }

    #[test]
    fn repack_appends_steps_at_candidate_depths() {
        let (env, s) = sample_env();
        let options = Options::default();
        let mut ctx = TranslationContext::new(&env, &options);
        let node = env.new_node(ptr_target(s));
        // Extending an S pointer by member 1 (`.y` is not packable itself,
        // but the depths are what matters here).
        let repacked = repack(
            &mut ctx,
            node,
            Expr::id("p"),
            &ptr_target(s),
            &[Expr::num(BigInt::from(1))],
        );
        // First candidate: s1 at depth 1, guarded by p[0] == 0.
        match repacked {
            Expr::Cond { cond, if_true, .. } => {
                assert_eq!(
                    *cond,
                    Expr::eq(
                        Expr::sel(Expr::id("p"), Expr::num(BigInt::from(0))),
                        Expr::num(BigInt::from(0))
                    )
                );
                assert_eq!(
                    *if_true,
                    Expr::upd(
                        Expr::id("p"),
                        Expr::num(BigInt::from(1)),
                        Expr::num(BigInt::from(1))
                    )
                );
            }
            other => panic!("expected conditional chain, got {:?}", other),
        }
    }

    #[test]
    fn matching_ignores_pointerness() {
        let (_, s) = sample_env();
        let slot_ty = Type::Struct {
            id: s,
            loc: DataLocation::Storage,
            ptr: false,
        };
        assert!(types_match(&slot_ty, &ptr_target(s)));
        assert!(!types_match(&Type::uint(256), &ptr_target(s)));
    }
}
