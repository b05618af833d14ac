// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Function and statement translation. Each contract function becomes one
//! Boogie procedure: parameters are prefixed with the receiver address and
//! transaction context, returns become out-parameters, the body is built on
//! a stack of statement blocks, and modifier chains are inlined at the
//! placeholder. Functions whose translation produced errors are kept as
//! havoc stubs so that one broken function does not poison the rest of the
//! program.

use num::BigInt;

use boogie_ast::{Attribute, BType, Block, Decl, Expr, ProcDecl, Specification, Stmt};
use contract_model::{
    ast::{AssignOp, BinOp, Expr as SrcExpr, NodeId, Stmt as SrcStmt},
    env::{DeclKind, ModifierInvocation},
    ty::{ContractId, DataLocation, DeclId, EventId, FunId, Type},
};

use crate::{
    arith::{self, Bounds},
    assign::{self, AssignSlot},
    conditions::ConditionStore,
    context::{TranslationContext, MSG_SENDER, MSG_VALUE, OVERFLOW_FLAG, THIS},
    exprs::{self, ExpressionTranslator},
};

/// Translates one contract: its state variable maps and all of its
/// functions.
pub fn translate_contract(ctx: &mut TranslationContext, contract: ContractId) {
    ctx.set_current_contract(Some(contract));
    let data_name = ctx.env.contract_data(contract).name.clone();
    ctx.add_decl(Decl::Comment(format!("Contract: {}", data_name)));

    let state_vars = ctx.env.contract_data(contract).state_vars.clone();
    for sv in state_vars {
        let ty = ctx.env.decl_data(sv).ty.clone();
        let bty = ctx.to_btype(&ty);
        let name = ctx.map_decl_name(sv);
        ctx.add_decl(Decl::Var {
            name,
            ty: BType::map(BType::named("address"), bty),
            attrs: vec![],
        });
    }

    let events = ctx.env.contract_data(contract).events.clone();
    for event in events {
        let proc = event_procedure(ctx, event);
        ctx.add_decl(Decl::Proc(proc));
    }

    let functions = ctx.env.contract_data(contract).functions.clone();
    let mut has_constructor = false;
    for fun in functions {
        has_constructor |= ctx.env.function_data(fun).is_constructor;
        let proc = FunctionTranslator::new(ctx, fun).translate();
        ctx.add_decl(Decl::Proc(proc));
    }
    if !has_constructor {
        let proc = default_constructor(ctx, contract);
        ctx.add_decl(Decl::Proc(proc));
    }
    ctx.set_current_contract(None);
}

/// The zero value of a type, if it has one the generator materializes.
fn default_value(ctx: &TranslationContext, ty: &Type) -> Option<Expr> {
    match ty {
        Type::Bool => Some(Expr::false_()),
        Type::Int { bits, .. } => Some(ctx.int_lit(BigInt::from(0), *bits)),
        Type::Address | Type::Enum(_) => Some(Expr::num(BigInt::from(0))),
        _ => None,
    }
}

/// Statements initializing every scalar state variable of the contract to
/// its default.
fn state_var_defaults(ctx: &mut TranslationContext, contract: ContractId) -> Vec<Stmt> {
    let mut stmts = vec![];
    let state_vars = ctx.env.contract_data(contract).state_vars.clone();
    for sv in state_vars {
        let ty = ctx.env.decl_data(sv).ty.clone();
        if let Some(value) = default_value(ctx, &ty) {
            let name = ctx.map_decl_name(sv);
            stmts.push(Stmt::assign(
                Expr::id(name.clone()),
                Expr::upd(Expr::id(name), Expr::id(THIS), value),
            ));
        }
    }
    stmts
}

/// Synthesized constructor for contracts that do not declare one: default
/// initialization plus the contract invariants as postconditions.
fn default_constructor(ctx: &mut TranslationContext, contract: ContractId) -> ProcDecl {
    let name = format!("{}#constructor", ctx.env.contract_data(contract).name);
    let mut proc = ProcDecl::new(name);
    proc.params = receiver_params(ctx);
    proc.body.extend(state_var_defaults(ctx, contract));
    proc.ensures
        .extend(invariant_specs(ctx, contract, "invariant may not hold"));
    if ctx.options.overflow {
        proc.ensures
            .push(Specification::new(Expr::not(Expr::id(OVERFLOW_FLAG)), vec![]));
    }
    proc
}

/// Events have no verification semantics; each becomes an inlined no-op
/// procedure so that emits still show up in the generated program.
fn event_procedure(ctx: &mut TranslationContext, event: EventId) -> ProcDecl {
    let mut proc = ProcDecl::new(ctx.event_proc_name(event));
    proc.params = receiver_params(ctx);
    let params = ctx.env.event_data(event).params.clone();
    for param in params {
        let ty = ctx.env.decl_data(param).ty.clone();
        let bty = ctx.to_btype(&ty);
        proc.params.push((ctx.map_decl_name(param), bty));
    }
    proc.attrs.push(Attribute::with_num("inline", 1));
    proc
}

fn receiver_params(ctx: &TranslationContext) -> Vec<(String, BType)> {
    vec![
        (THIS.to_string(), BType::named("address")),
        (MSG_SENDER.to_string(), BType::named("address")),
        (MSG_VALUE.to_string(), ctx.int_btype(256)),
    ]
}

/// The contract's invariants lowered into specifications, each with its
/// range conditions folded in as additional specifications.
fn invariant_specs(
    ctx: &mut TranslationContext,
    contract: ContractId,
    message: &str,
) -> Vec<Specification> {
    let invariants = ctx.env.contract_data(contract).invariants.clone();
    let mut specs = vec![];
    for inv in &invariants {
        let loc = ctx.env.node_loc(inv.node_id());
        ctx.env.enter_diag_scope();
        let result = exprs::lower_expression(ctx, inv);
        if !result.stmts.is_empty() {
            ctx.env
                .error(&loc, "contract invariants cannot have side effects");
        }
        if ctx.env.exit_diag_scope_collapsed(&loc, "ill-formed contract invariant") > 0 {
            continue;
        }
        let attrs = ctx.loc_attrs(&loc, message);
        for tcc in result.conditions.tccs() {
            specs.push(Specification::new(tcc.clone(), vec![]));
        }
        for oc in result.conditions.ocs() {
            specs.push(Specification::new(oc.clone(), vec![]));
        }
        specs.push(Specification::new(result.expr, attrs));
    }
    specs
}

pub struct FunctionTranslator<'t, 'env> {
    ctx: &'t mut TranslationContext<'env>,
    fun: FunId,
    /// Stack of statement blocks under construction; the innermost block is
    /// the current emission target.
    blocks: Vec<Block>,
    locals: Vec<(String, BType)>,
    /// Per-loop continue and break label stacks.
    continue_labels: Vec<String>,
    break_labels: Vec<String>,
    return_label: String,
    /// Index into the function's modifier list during inlining.
    current_modifier: usize,
}

impl<'t, 'env> FunctionTranslator<'t, 'env> {
    pub fn new(ctx: &'t mut TranslationContext<'env>, fun: FunId) -> Self {
        let return_label = format!("$return#{}", ctx.env.next_global_id());
        FunctionTranslator {
            ctx,
            fun,
            blocks: vec![Block::new()],
            locals: vec![],
            continue_labels: vec![],
            break_labels: vec![],
            return_label,
            current_modifier: 0,
        }
    }

    pub fn translate(mut self) -> ProcDecl {
        let data = self.ctx.env.function_data(self.fun);
        let is_public = data.is_public;
        let is_constructor = data.is_constructor;
        let is_payable = data.is_payable;
        let contract = data.contract;
        let loc = data.loc.clone();
        let name = data.name.clone();
        let params: Vec<DeclId> = data.params.clone();
        let returns: Vec<DeclId> = data.returns.clone();
        let has_body = data.body.is_some();
        let preconditions = data.preconditions.clone();
        let postconditions = data.postconditions.clone();

        let mut proc = ProcDecl::new(self.ctx.proc_name(self.fun));
        proc.params = receiver_params(self.ctx);
        for param in &params {
            let ty = self.ctx.env.decl_data(*param).ty.clone();
            let bty = self.ctx.to_btype(&ty);
            proc.params.push((self.ctx.map_decl_name(*param), bty));
        }
        for ret in &returns {
            let ty = self.ctx.env.decl_data(*ret).ty.clone();
            let bty = self.ctx.to_btype(&ty);
            proc.returns.push((self.ctx.map_decl_name(*ret), bty));
        }
        proc.attrs
            .extend(self.ctx.loc_attrs(&loc, &format!("function {}", name)));
        if !is_public {
            proc.attrs.push(Attribute::with_num("inline", 1));
        }

        // Parameters of unbounded representation get their ranges assumed.
        let mut param_assumes = vec![];
        for param in &params {
            let ty = self.ctx.env.decl_data(*param).ty.clone();
            let value = Expr::id(self.ctx.map_decl_name(*param));
            if let Some(cond) = arith::range_condition(self.ctx, &value, &ty, Bounds::Both) {
                param_assumes.push(Stmt::assume(cond));
            }
        }

        self.ctx.env.enter_diag_scope();
        if is_constructor {
            let defaults = state_var_defaults(self.ctx, contract);
            self.cur_block().extend(defaults);
        }
        if is_payable {
            self.credit_msg_value();
        }
        if has_body {
            self.translate_modifier_chain();
        }
        let errors = self.ctx.env.exit_diag_scope();

        if errors > 0 || !has_body {
            // Keep the procedure but drop the body: havoc everything the
            // function could have touched.
            let state_vars = self.ctx.env.contract_data(contract).state_vars.clone();
            let vars = state_vars
                .iter()
                .filter(|sv| {
                    !matches!(
                        self.ctx.env.decl_data(**sv).kind,
                        DeclKind::StateVar { constant: true, .. }
                    )
                })
                .map(|sv| self.ctx.map_decl_name(*sv))
                .collect::<Vec<_>>();
            proc.attrs
                .push(Attribute::with_str("message", "function is not modeled precisely"));
            let mut body = Block::new();
            if !vars.is_empty() {
                body.push(Stmt::havoc(vars));
            }
            proc.body = body;
            return proc;
        }

        let mut body = Block::new();
        body.extend(param_assumes);
        let main = self.blocks.pop().unwrap_or_default();
        body.extend(main.stmts);
        body.push(Stmt::label(self.return_label.clone()));
        proc.body = body;
        proc.locals = dedup_locals(std::mem::take(&mut self.locals));

        // Specification: user pre/postconditions with their condition
        // stores, invariants for the public surface, overflow bookkeeping.
        for pre in &preconditions {
            proc.requires
                .extend(self.spec_conditions(pre, "precondition may not hold"));
        }
        for post in &postconditions {
            proc.ensures
                .extend(self.spec_conditions(post, "postcondition may not hold"));
        }
        if is_public {
            if !is_constructor {
                proc.requires
                    .extend(invariant_specs(self.ctx, contract, "invariant may not hold"));
            }
            proc.ensures
                .extend(invariant_specs(self.ctx, contract, "invariant may not hold"));
        }
        if self.ctx.options.overflow {
            if !is_constructor {
                proc.requires
                    .push(Specification::new(Expr::not(Expr::id(OVERFLOW_FLAG)), vec![]));
            }
            proc.ensures
                .push(Specification::new(Expr::not(Expr::id(OVERFLOW_FLAG)), vec![]));
        }
        proc
    }

    /// Lowers a specification expression into specs: the expression itself
    /// plus its collected range/overflow conditions.
    fn spec_conditions(&mut self, expr: &SrcExpr, message: &str) -> Vec<Specification> {
        let loc = self.ctx.env.node_loc(expr.node_id());
        self.ctx.env.enter_diag_scope();
        let result = exprs::lower_expression(self.ctx, expr);
        if !result.stmts.is_empty() {
            self.ctx
                .env
                .error(&loc, "specifications cannot have side effects");
        }
        if self
            .ctx
            .env
            .exit_diag_scope_collapsed(&loc, "ill-formed specification")
            > 0
        {
            return vec![];
        }
        let mut specs = vec![];
        for tcc in result.conditions.tccs() {
            specs.push(Specification::new(tcc.clone(), vec![]));
        }
        for oc in result.conditions.ocs() {
            specs.push(Specification::new(oc.clone(), vec![]));
        }
        let attrs = self.ctx.loc_attrs(&loc, message);
        specs.push(Specification::new(result.expr, attrs));
        specs
    }

    fn cur_block(&mut self) -> &mut Block {
        // The stack always holds at least the outermost block.
        if self.blocks.is_empty() {
            self.blocks.push(Block::new());
        }
        let last = self.blocks.len() - 1;
        &mut self.blocks[last]
    }

    fn nested_block(&mut self, f: impl FnOnce(&mut Self)) -> Block {
        self.blocks.push(Block::new());
        f(self);
        self.blocks.pop().unwrap_or_default()
    }

    /// Lowers an expression, emitting its side effects into the current
    /// block and discharging its conditions in place.
    fn lower(&mut self, expr: &SrcExpr) -> Expr {
        let result = exprs::lower_expression(self.ctx, expr);
        self.locals.extend(result.decls);
        self.cur_block().extend(result.stmts);
        self.discharge(&result.conditions);
        result.expr
    }

    /// Type-checking conditions become assumptions; overflow conditions
    /// either accumulate into the overflow flag (when checking) or are
    /// assumed away.
    fn discharge(&mut self, conditions: &ConditionStore) {
        let mut stmts = vec![];
        for tcc in conditions.tccs() {
            stmts.push(Stmt::assume(tcc.clone()));
        }
        for oc in conditions.ocs() {
            if self.ctx.options.overflow {
                stmts.push(Stmt::assign(
                    Expr::id(OVERFLOW_FLAG),
                    Expr::or(Expr::id(OVERFLOW_FLAG), Expr::not(oc.clone())),
                ));
            } else {
                stmts.push(Stmt::assume(oc.clone()));
            }
        }
        self.cur_block().extend(stmts);
    }

    /// Payable entry: `$balance[$this] := $balance[$this] + $msg_value`. In
    /// the modular encoding the unbounded representations are first assumed
    /// in range, and the addition's correctness condition is assumed
    /// (balances cannot overflow).
    fn credit_msg_value(&mut self) {
        let this_bal = Expr::sel(self.ctx.balance_expr(), self.ctx.this_expr());
        let msg_val = Expr::id(MSG_VALUE);
        let uint256 = Type::uint(256);
        if self.ctx.options.mod_encoding() {
            if let Some(cond) = arith::range_condition(self.ctx, &this_bal, &uint256, Bounds::Both)
            {
                self.cur_block().push(Stmt::assume(cond));
            }
            if let Some(cond) = arith::range_condition(self.ctx, &msg_val, &uint256, Bounds::Both) {
                self.cur_block().push(Stmt::assume(cond));
            }
        }
        let node = self.ctx.env.new_node(uint256);
        let credited = arith::encode_binary(
            self.ctx,
            node,
            BinOp::Add,
            this_bal,
            msg_val,
            256,
            false,
        );
        if let Some(cc) = credited.correctness {
            self.cur_block().push(Stmt::assume(cc));
        }
        let balance = self.ctx.balance_expr();
        let this = self.ctx.this_expr();
        self.cur_block().push(Stmt::assign(
            balance.clone(),
            Expr::upd(balance, this, credited.expr),
        ));
    }

    /// Inlines the next modifier of the chain, or the function body once
    /// the chain is exhausted. Each modifier gets its own naming scope so
    /// that repeated inlinings cannot collide; the function body runs with
    /// scopes cleared so that its names match the procedure signature.
    fn translate_modifier_chain(&mut self) {
        let data = self.ctx.env.function_data(self.fun);
        if self.current_modifier < data.modifiers.len() {
            let invocation: ModifierInvocation =
                data.modifiers[self.current_modifier].clone();
            let modifier = self.ctx.env.modifier_data(invocation.modifier);
            let params = modifier.params.clone();
            let body = modifier.body.clone();
            self.ctx.push_extra_scope();
            for (param, arg) in params.iter().zip(&invocation.args) {
                let ty = self.ctx.env.decl_data(*param).ty.clone();
                let bty = self.ctx.to_btype(&ty);
                let name = self.ctx.map_decl_name(*param);
                self.locals.push((name.clone(), bty));
                let value = self.lower(arg);
                self.cur_block().push(Stmt::assign(Expr::id(name), value));
            }
            self.translate_stmt(&body);
            self.ctx.pop_extra_scope();
        } else {
            let body = data.body.clone();
            let saved = self.ctx.swap_extra_scopes(vec![]);
            if let Some(body) = body {
                self.translate_stmt(&body);
            }
            self.ctx.swap_extra_scopes(saved);
        }
    }

    fn translate_stmt(&mut self, stmt: &SrcStmt) {
        match stmt {
            SrcStmt::Block(stmts) => {
                for s in stmts {
                    self.translate_stmt(s);
                }
            }
            SrcStmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.lower(cond);
                let then_block = self.nested_block(|t| t.translate_stmt(then_branch));
                let else_block = else_branch
                    .as_ref()
                    .map(|e| self.nested_block(|t| t.translate_stmt(e)));
                self.cur_block().push(Stmt::if_else(cond, then_block, else_block));
            }
            SrcStmt::While {
                cond,
                body,
                is_do_while,
                invariants,
            } => self.translate_while(cond, body, *is_do_while, invariants),
            SrcStmt::For {
                init,
                cond,
                update,
                body,
                invariants,
            } => self.translate_for(
                init.as_deref(),
                cond.as_ref(),
                update.as_deref(),
                body,
                invariants,
            ),
            SrcStmt::Continue => match self.continue_labels.last() {
                Some(label) => {
                    let label = label.clone();
                    self.cur_block().push(Stmt::goto(vec![label]));
                }
                None => self.ctx.env.error(
                    &self.ctx.env.unknown_loc(),
                    "continue outside of a loop",
                ),
            },
            SrcStmt::Break => match self.break_labels.last() {
                Some(label) => {
                    let label = label.clone();
                    self.cur_block().push(Stmt::goto(vec![label]));
                }
                None => self
                    .ctx
                    .env
                    .error(&self.ctx.env.unknown_loc(), "break outside of a loop"),
            },
            SrcStmt::Return(node, value) => self.translate_return(*node, value.as_ref()),
            SrcStmt::Throw => self.cur_block().push(Stmt::assume(Expr::false_())),
            SrcStmt::VarDecl { decls, init } => self.translate_var_decl(decls, init.as_ref()),
            SrcStmt::ExprStmt(expr) => {
                self.lower(expr);
            }
            SrcStmt::Emit { event, args, .. } => self.translate_emit(*event, args),
            SrcStmt::Placeholder => {
                self.current_modifier += 1;
                self.translate_modifier_chain();
                self.current_modifier -= 1;
            }
        }
    }

    /// Loop invariants: the user's, with their condition stores, plus the
    /// ambient no-overflow flag and (on request) the contract invariants.
    fn loop_invariants(&mut self, invariants: &[SrcExpr]) -> Vec<Specification> {
        let mut specs = vec![];
        for inv in invariants {
            let loc = self.ctx.env.node_loc(inv.node_id());
            self.ctx.env.enter_diag_scope();
            let result = exprs::lower_expression(self.ctx, inv);
            if !result.stmts.is_empty() {
                self.ctx
                    .env
                    .error(&loc, "loop invariants cannot have side effects");
            }
            if self
                .ctx
                .env
                .exit_diag_scope_collapsed(&loc, "ill-formed loop invariant")
                > 0
            {
                continue;
            }
            for tcc in result.conditions.tccs() {
                specs.push(Specification::new(tcc.clone(), vec![]));
            }
            for oc in result.conditions.ocs() {
                specs.push(Specification::new(oc.clone(), vec![]));
            }
            let attrs = self.ctx.loc_attrs(&loc, "loop invariant may not hold");
            specs.push(Specification::new(result.expr, attrs));
        }
        if self.ctx.options.overflow {
            specs.push(Specification::new(Expr::not(Expr::id(OVERFLOW_FLAG)), vec![]));
        }
        if self.ctx.options.invariants_on_loops {
            if let Some(contract) = self.ctx.current_contract() {
                specs.extend(invariant_specs(
                    self.ctx,
                    contract,
                    "invariant may not hold on loop",
                ));
            }
        }
        specs
    }

    fn translate_while(
        &mut self,
        cond: &SrcExpr,
        body: &SrcStmt,
        is_do_while: bool,
        invariants: &[SrcExpr],
    ) {
        let continue_label = format!("$continue#{}", self.ctx.env.next_global_id());
        let break_label = format!("$break#{}", self.ctx.env.next_global_id());

        // The condition is lowered once: the loop test reads these
        // temporaries, and the same side-effect statements run before the
        // loop and at the end of every iteration.
        let before = exprs::lower_expression(self.ctx, cond);
        self.locals.extend(before.decls.clone());

        let specs = self.loop_invariants(invariants);
        self.continue_labels.push(continue_label.clone());
        self.break_labels.push(break_label.clone());
        let mut loop_body = self.nested_block(|t| t.translate_stmt(body));
        self.continue_labels.pop();
        self.break_labels.pop();
        loop_body.push(Stmt::label(continue_label));
        loop_body.extend(before.stmts.clone());
        let recheck = self.nested_block(|t| t.discharge(&before.conditions));
        loop_body.extend(recheck.stmts);

        if is_do_while {
            // First iteration runs before the loop, bracketed by invariant
            // checks; labels stay inside the loop only, jumps out of the
            // inlined copy still target the labels placed around the loop.
            for spec in &specs {
                self.cur_block()
                    .push(Stmt::assert(spec.cond.clone(), spec.attrs.clone()));
            }
            let inlined: Vec<Stmt> = loop_body
                .stmts
                .iter()
                .filter(|s| !matches!(s, Stmt::Label(_)))
                .cloned()
                .collect();
            self.cur_block().extend(inlined);
            for spec in &specs {
                self.cur_block()
                    .push(Stmt::assert(spec.cond.clone(), spec.attrs.clone()));
            }
        }

        self.cur_block().extend(before.stmts.clone());
        self.discharge(&before.conditions);
        self.cur_block()
            .push(Stmt::while_(Some(before.expr), loop_body, specs));
        self.cur_block().push(Stmt::label(break_label));
    }

    fn translate_for(
        &mut self,
        init: Option<&SrcStmt>,
        cond: Option<&SrcExpr>,
        update: Option<&SrcStmt>,
        body: &SrcStmt,
        invariants: &[SrcExpr],
    ) {
        if let Some(init) = init {
            self.translate_stmt(init);
        }
        let continue_label = format!("$continue#{}", self.ctx.env.next_global_id());
        let break_label = format!("$break#{}", self.ctx.env.next_global_id());

        // As with while loops, the condition is lowered once and its
        // side-effect statements are re-run at the end of every iteration.
        let before = cond.map(|c| exprs::lower_expression(self.ctx, c));
        if let Some(before) = &before {
            self.locals.extend(before.decls.clone());
            self.cur_block().extend(before.stmts.clone());
            self.discharge(&before.conditions);
        }

        let specs = self.loop_invariants(invariants);
        self.continue_labels.push(continue_label.clone());
        self.break_labels.push(break_label.clone());
        let mut loop_body = self.nested_block(|t| t.translate_stmt(body));
        self.continue_labels.pop();
        self.break_labels.pop();
        loop_body.push(Stmt::label(continue_label));
        if let Some(update) = update {
            let update_block = self.nested_block(|t| t.translate_stmt(update));
            loop_body.extend(update_block.stmts);
        }
        if let Some(before) = &before {
            loop_body.extend(before.stmts.clone());
            let recheck = self.nested_block(|t| t.discharge(&before.conditions));
            loop_body.extend(recheck.stmts);
        }

        self.cur_block().push(Stmt::while_(
            before.map(|b| b.expr),
            loop_body,
            specs,
        ));
        self.cur_block().push(Stmt::label(break_label));
    }

    fn translate_emit(&mut self, event: EventId, args: &[SrcExpr]) {
        let mut call_args = vec![
            self.ctx.this_expr(),
            Expr::id(MSG_SENDER),
            self.ctx.int_lit(BigInt::from(0), 256),
        ];
        for arg in args {
            let translated = self.lower(arg);
            call_args.push(translated);
        }
        let proc = self.ctx.event_proc_name(event);
        self.cur_block().push(Stmt::call(proc, call_args, vec![]));
    }

    fn translate_return(&mut self, node: NodeId, value: Option<&SrcExpr>) {
        if let Some(value) = value {
            let returns = self.ctx.env.function_data(self.fun).returns.clone();
            let mut t = ExpressionTranslator::new(self.ctx);
            let rhs_expr = t.translate(value);
            let rhs_slot = AssignSlot {
                expr: rhs_expr,
                ty: t.ctx().env.node_type(value.node_id()),
                src: Some(value),
            };
            let lhs_slot = match returns.len() {
                1 => AssignSlot {
                    expr: Expr::id(t.ctx().map_decl_name(returns[0])),
                    ty: t.ctx().env.decl_data(returns[0]).ty.clone(),
                    src: None,
                },
                _ => AssignSlot {
                    expr: Expr::Tuple(
                        returns
                            .iter()
                            .map(|r| Expr::id(t.ctx().map_decl_name(*r)))
                            .collect(),
                    ),
                    ty: Type::Tuple(
                        returns
                            .iter()
                            .map(|r| t.ctx().env.decl_data(*r).ty.clone())
                            .collect(),
                    ),
                    src: None,
                },
            };
            assign::make_assign(&mut t, lhs_slot, rhs_slot, AssignOp::Assign, node);
            let result = t.finish(Expr::Error);
            self.locals.extend(result.decls);
            self.cur_block().extend(result.stmts);
            self.discharge(&result.conditions);
        }
        let label = self.return_label.clone();
        self.cur_block().push(Stmt::goto(vec![label]));
    }

    fn translate_var_decl(&mut self, decls: &[Option<DeclId>], init: Option<&SrcExpr>) {
        let mut lhs_exprs = vec![];
        let mut lhs_tys = vec![];
        for decl in decls {
            match decl {
                Some(decl) => {
                    let ty = self.ctx.env.decl_data(*decl).ty.clone();
                    let bty = self.ctx.to_btype(&ty);
                    let name = self.ctx.map_decl_name(*decl);
                    self.locals.push((name.clone(), bty));
                    lhs_exprs.push(Expr::id(name));
                    lhs_tys.push(ty);
                }
                None => {
                    lhs_exprs.push(Expr::Error);
                    lhs_tys.push(Type::Error);
                }
            }
        }
        match init {
            Some(init) => {
                let node = init.node_id();
                let mut t = ExpressionTranslator::new(self.ctx);
                let rhs_expr = t.translate(init);
                let rhs_slot = AssignSlot {
                    expr: rhs_expr,
                    ty: t.ctx().env.node_type(node),
                    src: Some(init),
                };
                let lhs_slot = if decls.len() == 1 {
                    AssignSlot {
                        expr: lhs_exprs.remove(0),
                        ty: lhs_tys.remove(0),
                        src: None,
                    }
                } else {
                    AssignSlot {
                        expr: Expr::Tuple(lhs_exprs),
                        ty: Type::Tuple(lhs_tys),
                        src: None,
                    }
                };
                assign::make_assign(&mut t, lhs_slot, rhs_slot, AssignOp::Assign, node);
                let result = t.finish(Expr::Error);
                self.locals.extend(result.decls);
                self.cur_block().extend(result.stmts);
                self.discharge(&result.conditions);
            }
            None => {
                // Default-initialize what we can.
                for (decl, (expr, ty)) in decls.iter().zip(lhs_exprs.iter().zip(&lhs_tys)) {
                    let decl = match decl {
                        Some(decl) => *decl,
                        None => continue,
                    };
                    if ty.is_storage_ptr() {
                        self.ctx.env.error(
                            &self.ctx.env.decl_data(decl).loc.clone(),
                            "storage pointer must be initialized",
                        );
                        continue;
                    }
                    match ty.data_location() {
                        Some(DataLocation::Memory) => {
                            let mut t = ExpressionTranslator::new(self.ctx);
                            let fresh = t.allocate_memory();
                            t.emit(Stmt::assign(expr.clone(), Expr::id(fresh)));
                            let result = t.finish(Expr::Error);
                            self.locals.extend(result.decls);
                            self.cur_block().extend(result.stmts);
                        }
                        _ => {
                            if let Some(value) = default_value(self.ctx, ty) {
                                self.cur_block().push(Stmt::assign(expr.clone(), value));
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Keeps the first occurrence of each local name; bodies that inline the
/// same statement twice (do-while) declare their locals twice.
fn dedup_locals(locals: Vec<(String, BType)>) -> Vec<(String, BType)> {
    let mut seen = std::collections::BTreeSet::new();
    locals
        .into_iter()
        .filter(|(name, _)| seen.insert(name.clone()))
        .collect()
}
