// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Expression translation. Every source expression lowers to a pure Boogie
//! expression plus hoisted side effects: statements for calls, allocations
//! and assignments, declarations for the fresh temporaries they need, and a
//! store of pending range/overflow conditions for the statement translator
//! to discharge.

use num::BigInt;

use boogie_ast::{BType, Expr, Stmt};
use contract_model::{
    ast::{BinOp, Expr as SrcExpr, MemberRef, NodeId, UnOp},
    env::DeclKind,
    ty::{DataLocation, DeclId, StructId, Type},
};

use crate::{
    arith::{self, Bounds},
    assign::{self, AssignSlot},
    conditions::ConditionStore,
    context::{TranslationContext, ALLOC_COUNTER, MSG_SENDER, MSG_VALUE},
    storage,
};

/// Everything produced by lowering one expression.
#[derive(Debug)]
pub struct LoweringResult {
    pub expr: Expr,
    pub stmts: Vec<Stmt>,
    pub decls: Vec<(String, BType)>,
    pub conditions: ConditionStore,
}

/// Lowers a single expression in a fresh translator.
pub fn lower_expression(
    ctx: &mut TranslationContext,
    expr: &SrcExpr,
) -> LoweringResult {
    let mut t = ExpressionTranslator::new(ctx);
    let result = t.translate(expr);
    t.finish(result)
}

pub struct ExpressionTranslator<'t, 'env> {
    ctx: &'t mut TranslationContext<'env>,
    /// Hoisted side effects, in evaluation order.
    stmts: Vec<Stmt>,
    /// Fresh temporaries to declare in the enclosing procedure.
    decls: Vec<(String, BType)>,
    conditions: ConditionStore,
}

impl<'t, 'env> ExpressionTranslator<'t, 'env> {
    pub fn new(ctx: &'t mut TranslationContext<'env>) -> Self {
        ExpressionTranslator {
            ctx,
            stmts: vec![],
            decls: vec![],
            conditions: ConditionStore::new(),
        }
    }

    pub fn ctx(&mut self) -> &mut TranslationContext<'env> {
        self.ctx
    }

    pub fn emit(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    pub fn fresh_temp(&mut self, prefix: &str, ty: BType) -> String {
        let name = self.ctx.fresh_name(prefix);
        self.decls.push((name.clone(), ty));
        name
    }

    pub fn conditions_mut(&mut self) -> &mut ConditionStore {
        &mut self.conditions
    }

    /// Runs `f` with an empty statement sink and returns what it emitted as
    /// a block, for statements that go into a nested branch.
    pub fn collect_block(&mut self, f: impl FnOnce(&mut Self)) -> boogie_ast::Block {
        let saved = std::mem::take(&mut self.stmts);
        f(self);
        let collected = std::mem::replace(&mut self.stmts, saved);
        boogie_ast::Block { stmts: collected }
    }

    pub fn finish(self, expr: Expr) -> LoweringResult {
        LoweringResult {
            expr,
            stmts: self.stmts,
            decls: self.decls,
            conditions: self.conditions,
        }
    }

    /// Translates an expression, appending side effects and conditions to
    /// this translator.
    pub fn translate(&mut self, expr: &SrcExpr) -> Expr {
        match expr {
            SrcExpr::BoolLit(_, value) => {
                if *value {
                    Expr::true_()
                } else {
                    Expr::false_()
                }
            }
            SrcExpr::NumberLit(node, value) => match self.ctx.env.node_type(*node) {
                Type::Int { bits, .. } => self.ctx.int_lit(value.clone(), bits),
                _ => Expr::num(value.clone()),
            },
            SrcExpr::Ident(node, decl) => self.translate_ident(*node, *decl),
            SrcExpr::This(_) => self.ctx.this_expr(),
            SrcExpr::MsgSender(_) => Expr::id(MSG_SENDER),
            SrcExpr::MsgValue(_) => Expr::id(MSG_VALUE),
            SrcExpr::Member {
                id, base, member, ..
            } => self.translate_member(*id, base, *member),
            SrcExpr::Index {
                id, base, index, ..
            } => self.translate_index(*id, base, index),
            SrcExpr::Unary { id, op, sub } => self.translate_unary(*id, *op, sub),
            SrcExpr::Binary { id, op, lhs, rhs } => self.translate_binary(*id, *op, lhs, rhs),
            SrcExpr::Conditional {
                cond,
                if_true,
                if_false,
                ..
            } => {
                let cond = self.translate(cond);
                let if_true = self.translate(if_true);
                let if_false = self.translate(if_false);
                Expr::cond(cond, if_true, if_false)
            }
            SrcExpr::Assign { id, op, lhs, rhs } => {
                let lhs_expr = self.translate(lhs);
                let rhs_expr = self.translate(rhs);
                let lhs_slot = AssignSlot {
                    expr: lhs_expr.clone(),
                    ty: self.ctx.env.node_type(lhs.node_id()),
                    src: Some(lhs),
                };
                let rhs_slot = AssignSlot {
                    expr: rhs_expr,
                    ty: self.ctx.env.node_type(rhs.node_id()),
                    src: Some(rhs),
                };
                assign::make_assign(self, lhs_slot, rhs_slot, *op, *id);
                // A select chain over the updated variables denotes the new
                // value.
                lhs_expr
            }
            SrcExpr::Tuple { components, .. } => {
                if components.len() == 1 {
                    match &components[0] {
                        Some(inner) => self.translate(inner),
                        None => Expr::Error,
                    }
                } else {
                    let parts = components
                        .iter()
                        .map(|c| match c {
                            Some(inner) => self.translate(inner),
                            None => Expr::Error,
                        })
                        .collect();
                    Expr::Tuple(parts)
                }
            }
            SrcExpr::Call { fun, args, .. } => self.translate_call(*fun, args),
            SrcExpr::NewStruct {
                id,
                struct_id,
                args,
            } => self.translate_new_struct(*id, *struct_id, args),
            SrcExpr::NewArray { id, len } => self.translate_new_array(*id, len),
            SrcExpr::Sum { id, base } => self.translate_sum(*id, base),
        }
    }

    fn translate_ident(&mut self, node: NodeId, decl: DeclId) -> Expr {
        let kind = self.ctx.env.decl_data(decl).kind;
        let name = self.ctx.map_decl_name(decl);
        match kind {
            DeclKind::StateVar { .. } => {
                let value = Expr::sel(Expr::id(name), self.ctx.this_expr());
                let ty = self.ctx.env.node_type(node);
                self.record_range(&value, &ty);
                value
            }
            _ => Expr::id(name),
        }
    }

    /// Resolves a base expression that must denote a storage slot,
    /// unpacking it first when it is a pointer.
    fn storage_slot_value(&mut self, base: &SrcExpr) -> Expr {
        let base_ty = self.ctx.env.node_type(base.node_id());
        let value = self.translate(base);
        if base_ty.is_storage_ptr() {
            storage::unpack(self.ctx, base.node_id(), &value, &base_ty)
        } else {
            value
        }
    }

    fn translate_member(&mut self, node: NodeId, base: &SrcExpr, member: MemberRef) -> Expr {
        match member {
            MemberRef::EnumValue(_, index) => Expr::num(BigInt::from(index)),
            MemberRef::Balance => {
                let address = self.translate(base);
                Expr::sel(self.ctx.balance_expr(), address)
            }
            MemberRef::ArrayLength => {
                let base_ty = self.ctx.env.node_type(base.node_id());
                let elem_ty = match &base_ty {
                    Type::Array { elem, .. } => (**elem).clone(),
                    _ => {
                        self.ctx.report_error(node, "length of a non-array");
                        return Expr::Error;
                    }
                };
                let elem_bty = self.ctx.to_btype(&elem_ty);
                let arr = self.array_value(base, &base_ty, elem_bty.clone());
                self.ctx.array_length(arr, elem_bty)
            }
            MemberRef::Field(struct_id, index) => {
                self.translate_field(node, base, struct_id, index)
            }
        }
    }

    fn translate_field(
        &mut self,
        node: NodeId,
        base: &SrcExpr,
        struct_id: StructId,
        index: usize,
    ) -> Expr {
        let field = self.ctx.env.struct_data(struct_id).fields[index];
        let base_ty = self.ctx.env.node_type(base.node_id());
        let value = match base_ty.data_location() {
            Some(DataLocation::Storage) => {
                let slot = self.storage_slot_value(base);
                let member = self.ctx.map_decl_name(field);
                let value = Expr::dtsel(slot, member);
                let ty = self.ctx.env.node_type(node);
                self.record_range(&value, &ty);
                value
            }
            Some(DataLocation::Memory) | Some(DataLocation::Calldata) => {
                let ptr = self.translate(base);
                let heap = self.ctx.mem_field_heap(field);
                Expr::sel(Expr::id(heap), ptr)
            }
            None => {
                self.ctx
                    .report_error(node, "member access on a non-struct value");
                Expr::Error
            }
        };
        value
    }

    /// The array datatype value behind an array-typed expression, through
    /// the memory heap for memory arrays.
    fn array_value(&mut self, base: &SrcExpr, base_ty: &Type, elem_bty: BType) -> Expr {
        match base_ty.data_location() {
            Some(DataLocation::Storage) => self.storage_slot_value(base),
            _ => {
                let ptr = self.translate(base);
                self.ctx.mem_array(ptr, elem_bty)
            }
        }
    }

    fn translate_index(&mut self, node: NodeId, base: &SrcExpr, index: &SrcExpr) -> Expr {
        let base_ty = self.ctx.env.node_type(base.node_id());
        let index_expr = self.translate(index);
        let value = match &base_ty {
            Type::Array { elem, .. } => {
                let elem_bty = self.ctx.to_btype(elem);
                let arr = self.array_value(base, &base_ty, elem_bty.clone());
                let inner = self.ctx.inner_array(arr, elem_bty);
                Expr::sel(inner, index_expr)
            }
            Type::Mapping(..) => {
                let map = self.storage_slot_value(base);
                Expr::sel(map, index_expr)
            }
            _ => {
                self.ctx.report_error(node, "index access on a non-indexable value");
                return Expr::Error;
            }
        };
        if base_ty.stored_in(DataLocation::Storage) {
            let ty = self.ctx.env.node_type(node);
            self.record_range(&value, &ty);
        }
        value
    }

    fn translate_unary(&mut self, node: NodeId, op: UnOp, sub: &SrcExpr) -> Expr {
        match op {
            UnOp::Not => {
                let sub = self.translate(sub);
                Expr::not(sub)
            }
            UnOp::Neg | UnOp::BitNot => {
                let (bits, signed) = self.int_spec(node);
                let sub = self.translate(sub);
                let encoded = arith::encode_unary(self.ctx, node, op, sub, bits, signed);
                if let Some(cc) = encoded.correctness {
                    self.conditions.add_oc(cc);
                }
                encoded.expr
            }
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                self.translate_inc_dec(node, op, sub)
            }
        }
    }

    /// `++`/`--` lower to a read, an encoded `± 1`, and a store through the
    /// copy engine; pre forms evaluate to the new value, post forms to a
    /// temporary holding the old one.
    fn translate_inc_dec(&mut self, node: NodeId, op: UnOp, sub: &SrcExpr) -> Expr {
        let (bits, signed) = self.int_spec(node);
        let place = self.translate(sub);
        let post = matches!(op, UnOp::PostInc | UnOp::PostDec);
        let old_value = if post {
            let temp = self.fresh_temp("old", self.ctx.int_btype(bits));
            self.emit(Stmt::assign(Expr::id(temp.clone()), place.clone()));
            Some(Expr::id(temp))
        } else {
            None
        };
        let bin_op = match op {
            UnOp::PreInc | UnOp::PostInc => BinOp::Add,
            _ => BinOp::Sub,
        };
        let one = self.ctx.int_lit(BigInt::from(1), bits);
        let encoded =
            arith::encode_binary(self.ctx, node, bin_op, place.clone(), one, bits, signed);
        if let Some(cc) = encoded.correctness {
            self.conditions.add_oc(cc);
        }
        let ty = self.ctx.env.node_type(node);
        let lhs_slot = AssignSlot {
            expr: place.clone(),
            ty: ty.clone(),
            src: Some(sub),
        };
        let rhs_slot = AssignSlot {
            expr: encoded.expr,
            ty,
            src: None,
        };
        assign::make_assign(
            self,
            lhs_slot,
            rhs_slot,
            contract_model::ast::AssignOp::Assign,
            node,
        );
        match old_value {
            Some(old) => old,
            None => place,
        }
    }

    fn translate_binary(&mut self, node: NodeId, op: BinOp, lhs: &SrcExpr, rhs: &SrcExpr) -> Expr {
        match op {
            BinOp::And => {
                let lhs = self.translate(lhs);
                let rhs = self.translate(rhs);
                Expr::and(lhs, rhs)
            }
            BinOp::Or => {
                let lhs = self.translate(lhs);
                let rhs = self.translate(rhs);
                Expr::or(lhs, rhs)
            }
            _ => {
                // Operand types agree after resolution up to width; the
                // operation's width comes from the operands, not the node
                // (comparisons type the node as bool).
                let (bits, signed) = self.int_spec(lhs.node_id());
                let lhs_expr = self.translate(lhs);
                let rhs_expr = self.translate(rhs);
                let rhs_expr = self.coerce_width(rhs_expr, rhs.node_id(), bits, signed);
                match self.ctx.env.node_type(lhs.node_id()) {
                    Type::Int { .. } | Type::Enum(_) => {
                        let encoded = arith::encode_binary(
                            self.ctx, node, op, lhs_expr, rhs_expr, bits, signed,
                        );
                        if let Some(cc) = encoded.correctness {
                            self.conditions.add_oc(cc);
                        }
                        encoded.expr
                    }
                    // Addresses, booleans: only direct comparisons remain.
                    _ => match op {
                        BinOp::Eq => Expr::eq(lhs_expr, rhs_expr),
                        BinOp::Neq => Expr::neq(lhs_expr, rhs_expr),
                        BinOp::Lt => Expr::lt(lhs_expr, rhs_expr),
                        BinOp::Gt => Expr::gt(lhs_expr, rhs_expr),
                        BinOp::Le => Expr::lte(lhs_expr, rhs_expr),
                        BinOp::Ge => Expr::gte(lhs_expr, rhs_expr),
                        _ => {
                            self.ctx
                                .report_error(node, "unsupported operation for this type");
                            Expr::Error
                        }
                    },
                }
            }
        }
    }

    /// In bit-vector mode, widens an operand to the target width when its
    /// own width is smaller.
    fn coerce_width(&mut self, expr: Expr, node: NodeId, bits: u16, signed: bool) -> Expr {
        if !self.ctx.options.bv_encoding() {
            return expr;
        }
        if let Type::Int {
            bits: from_bits, ..
        } = self.ctx.env.node_type(node)
        {
            if from_bits < bits {
                // Literals re-type directly, everything else extends.
                if let Expr::BvLit { value, .. } = &expr {
                    return Expr::bv(value.clone(), bits);
                }
                let ext = self.ctx.ext_builtin(from_bits, bits, signed);
                return Expr::fn_call(ext, vec![expr]);
            }
        }
        expr
    }

    fn translate_call(&mut self, fun: contract_model::ty::FunId, args: &[SrcExpr]) -> Expr {
        let proc = self.ctx.proc_name(fun);
        let return_decls = self.ctx.env.function_data(fun).returns.clone();
        let mut call_args = vec![
            self.ctx.this_expr(),
            Expr::id(MSG_SENDER),
            // Plain internal calls transfer no value.
            self.ctx.int_lit(BigInt::from(0), 256),
        ];
        for arg in args {
            let translated = self.translate(arg);
            call_args.push(translated);
        }
        let mut returns = vec![];
        for ret in &return_decls {
            let ty = self.ctx.env.decl_data(*ret).ty.clone();
            let bty = self.ctx.to_btype(&ty);
            returns.push(self.fresh_temp("result", bty));
        }
        self.emit(Stmt::call(proc, call_args, returns.clone()));
        match returns.len() {
            0 => Expr::Error,
            1 => Expr::id(returns.remove(0)),
            _ => Expr::Tuple(returns.into_iter().map(Expr::id).collect()),
        }
    }

    /// Reserves a fresh memory pointer.
    pub fn allocate_memory(&mut self) -> String {
        let temp = self.fresh_temp("new_ptr", BType::named(crate::context::MEM_PTR_TYPE));
        self.emit(Stmt::assign(
            Expr::id(temp.clone()),
            Expr::id(ALLOC_COUNTER),
        ));
        self.emit(Stmt::assign(
            Expr::id(ALLOC_COUNTER),
            Expr::add(Expr::id(ALLOC_COUNTER), Expr::num(BigInt::from(1))),
        ));
        temp
    }

    fn translate_new_struct(
        &mut self,
        node: NodeId,
        struct_id: StructId,
        args: &[SrcExpr],
    ) -> Expr {
        self.ctx.ensure_mem_struct(struct_id);
        let ptr = self.allocate_memory();
        let fields = self.ctx.env.struct_data(struct_id).fields.clone();
        if args.len() != fields.len() {
            self.ctx
                .report_error(node, "wrong number of constructor arguments");
            return Expr::Error;
        }
        for (field, arg) in fields.into_iter().zip(args) {
            let arg_expr = self.translate(arg);
            let heap = self.ctx.mem_field_heap(field);
            let field_ty = self
                .ctx
                .env
                .decl_data(field)
                .ty
                .with_location(DataLocation::Memory, false);
            let lhs_slot = AssignSlot {
                expr: Expr::sel(Expr::id(heap), Expr::id(ptr.clone())),
                ty: field_ty,
                src: None,
            };
            let rhs_slot = AssignSlot {
                expr: arg_expr,
                ty: self.ctx.env.node_type(arg.node_id()),
                src: Some(arg),
            };
            assign::make_assign(
                self,
                lhs_slot,
                rhs_slot,
                contract_model::ast::AssignOp::Assign,
                node,
            );
        }
        Expr::id(ptr)
    }

    fn translate_new_array(&mut self, node: NodeId, len: &SrcExpr) -> Expr {
        let elem_ty = match self.ctx.env.node_type(node) {
            Type::Array { elem, .. } => (*elem).clone(),
            _ => {
                self.ctx.report_error(node, "array allocation of a non-array type");
                return Expr::Error;
            }
        };
        let elem_bty = self.ctx.to_btype(&elem_ty);
        let len_expr = self.translate(len);
        let ptr = self.allocate_memory();
        let heap = self.ctx.mem_array_heap(elem_bty.clone());
        let info = self.ctx.array_type(elem_bty);
        let arr = Expr::sel(Expr::id(heap.clone()), Expr::id(ptr.clone()));
        self.emit(Stmt::assign(
            Expr::id(heap.clone()),
            Expr::upd(
                Expr::id(heap),
                Expr::id(ptr.clone()),
                Expr::dtupd(arr, info.length_sel, len_expr),
            ),
        ));
        Expr::id(ptr)
    }

    fn translate_sum(&mut self, node: NodeId, base: &SrcExpr) -> Expr {
        match base {
            SrcExpr::Ident(_, decl) if self.ctx.env.is_state_var(*decl) => {
                let shadow = self.ctx.sum_shadow(*decl);
                Expr::sel(Expr::id(shadow), self.ctx.this_expr())
            }
            _ => {
                self.ctx.report_error(
                    node,
                    "sum is only supported over state variable collections",
                );
                Expr::Error
            }
        }
    }

    /// Records a type-checking condition tying a storage read to its
    /// declared range.
    fn record_range(&mut self, expr: &Expr, ty: &Type) {
        if let Some(cond) = arith::range_condition(self.ctx, expr, ty, Bounds::Both) {
            self.conditions.add_tcc(cond);
        }
    }

    /// Width and signedness of the integer type of a node; enums widen to
    /// the full word.
    fn int_spec(&mut self, node: NodeId) -> (u16, bool) {
        match self.ctx.env.node_type(node) {
            Type::Int { bits, signed } => (bits, signed),
            _ => (256, false),
        }
    }
}
