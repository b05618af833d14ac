// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end checks of the lowering: generated Boogie expressions and
//! statements are run through a small concrete evaluator and compared
//! against the source-level semantics.

use std::collections::BTreeMap;

use num::{BigInt, BigUint};

use boogie_ast::{BinOp, Expr, Stmt};
use boogie_gen::{
    arith,
    context::TranslationContext,
    exprs::{self, ExpressionTranslator},
    functions::FunctionTranslator,
    options::{ArithEncoding, Options},
    storage,
};
use contract_model::{
    ast::{AssignOp, BinOp as SrcBinOp, Expr as SrcExpr, MemberRef, Stmt as SrcStmt, UnOp},
    env::{DeclKind, FunctionData, GlobalEnv},
    ty::{ContractId, DataLocation, DeclId, FunId, StructId, Type},
};

// ---------------------------------------------------------------------------
// A concrete evaluator for generated Boogie code.

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Value {
    Int(BigInt),
    Bool(bool),
    /// Maps and datatype values; datatype members are string-keyed.
    Map(BTreeMap<Value, Value>),
    Str(String),
    Tuple(Vec<Value>),
}

impl Value {
    fn int(v: i64) -> Value {
        Value::Int(BigInt::from(v))
    }

    fn as_int(&self) -> BigInt {
        match self {
            Value::Int(v) => v.clone(),
            other => panic!("expected int, got {:?}", other),
        }
    }

    fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => panic!("expected bool, got {:?}", other),
        }
    }

    fn as_map(&self) -> &BTreeMap<Value, Value> {
        match self {
            Value::Map(m) => m,
            other => panic!("expected map, got {:?}", other),
        }
    }
}

type Store = BTreeMap<String, Value>;

fn eval(store: &Store, expr: &Expr) -> Value {
    match expr {
        Expr::BoolLit(b) => Value::Bool(*b),
        Expr::IntLit(v) => Value::Int(v.clone()),
        Expr::BvLit { value, .. } => Value::Int(BigInt::from(value.clone())),
        Expr::Id(name) => store
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::Map(BTreeMap::new())),
        Expr::Old(e) => eval(store, e),
        Expr::Not(e) => Value::Bool(!eval(store, e).as_bool()),
        Expr::Neg(e) => Value::Int(-eval(store, e).as_int()),
        Expr::Binary { op, lhs, rhs } => eval_binary(store, *op, lhs, rhs),
        Expr::Cond {
            cond,
            if_true,
            if_false,
        } => {
            if eval(store, cond).as_bool() {
                eval(store, if_true)
            } else {
                eval(store, if_false)
            }
        }
        Expr::Sel { base, index } => {
            let base = eval(store, base);
            let index = eval(store, index);
            base.as_map().get(&index).cloned().unwrap_or(Value::int(0))
        }
        Expr::Upd { base, index, value } => {
            let mut map = eval(store, base).as_map().clone();
            map.insert(eval(store, index), eval(store, value));
            Value::Map(map)
        }
        Expr::DtSel { base, member } => {
            let base = eval(store, base);
            base.as_map()
                .get(&Value::Str(member.clone()))
                .cloned()
                .unwrap_or(Value::int(0))
        }
        Expr::DtUpd {
            base,
            member,
            value,
        } => {
            let mut map = eval(store, base).as_map().clone();
            map.insert(Value::Str(member.clone()), eval(store, value));
            Value::Map(map)
        }
        Expr::FnCall { name, args } => eval_builtin(store, name, args),
        Expr::Tuple(parts) => Value::Tuple(parts.iter().map(|p| eval(store, p)).collect()),
        Expr::Error => panic!("error marker evaluated"),
    }
}

fn eval_binary(store: &Store, op: BinOp, lhs: &Expr, rhs: &Expr) -> Value {
    use BinOp::*;
    match op {
        And => return Value::Bool(eval(store, lhs).as_bool() && eval(store, rhs).as_bool()),
        Or => return Value::Bool(eval(store, lhs).as_bool() || eval(store, rhs).as_bool()),
        Implies => {
            return Value::Bool(!eval(store, lhs).as_bool() || eval(store, rhs).as_bool())
        }
        Iff => return Value::Bool(eval(store, lhs).as_bool() == eval(store, rhs).as_bool()),
        Eq => return Value::Bool(eval(store, lhs) == eval(store, rhs)),
        Neq => return Value::Bool(eval(store, lhs) != eval(store, rhs)),
        _ => {}
    }
    let l = eval(store, lhs).as_int();
    let r = eval(store, rhs).as_int();
    match op {
        Add => Value::Int(l + r),
        Sub => Value::Int(l - r),
        Mul => Value::Int(l * r),
        Div => Value::Int(l / r),
        Mod => Value::Int(l % r),
        Lt => Value::Bool(l < r),
        Gt => Value::Bool(l > r),
        Le => Value::Bool(l <= r),
        Ge => Value::Bool(l >= r),
        _ => unreachable!(),
    }
}

/// Interprets the lazily declared bit-vector builtins by name.
fn eval_builtin(store: &Store, name: &str, args: &[Expr]) -> Value {
    let mut parts = name.trim_start_matches('$').split('.');
    let op = parts.next().unwrap_or_default();
    let bits: u32 = parts.next().and_then(|b| b.parse().ok()).unwrap_or(0);
    let modulus = BigInt::from(1) << bits;
    let arg = |i: usize| eval(store, &args[i]).as_int();
    match op {
        "bvadd" => Value::Int((arg(0) + arg(1)) % modulus),
        "bvsub" => Value::Int(((arg(0) - arg(1)) % &modulus + &modulus) % &modulus),
        "bvmul" => Value::Int((arg(0) * arg(1)) % modulus),
        "bvudiv" => Value::Int(arg(0) / arg(1)),
        "bvurem" => Value::Int(arg(0) % arg(1)),
        "bvult" => Value::Bool(arg(0) < arg(1)),
        "bvugt" => Value::Bool(arg(0) > arg(1)),
        "bvule" => Value::Bool(arg(0) <= arg(1)),
        "bvuge" => Value::Bool(arg(0) >= arg(1)),
        other => panic!("builtin {} not interpreted", other),
    }
}

/// Executes straight-line generated statements (assignments, branches,
/// assumptions) against the store. Assumptions must hold.
fn exec(store: &mut Store, stmts: &[Stmt]) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign { lhs, rhs } => {
                let value = eval(store, rhs);
                match lhs {
                    Expr::Id(name) => {
                        store.insert(name.clone(), value);
                    }
                    other => panic!("assignment to non-variable {:?}", other),
                }
            }
            Stmt::Assume { cond } => assert!(eval(store, cond).as_bool(), "assumption failed"),
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                if eval(store, cond).as_bool() {
                    exec(store, &then_block.stmts);
                } else if let Some(else_block) = else_block {
                    exec(store, &else_block.stmts);
                }
            }
            Stmt::Comment(_) => {}
            Stmt::Label(_) => {}
            other => panic!("statement {:?} not interpreted", other),
        }
    }
}

// ---------------------------------------------------------------------------
// Environment helpers.

fn options_with(encoding: ArithEncoding) -> Options {
    Options {
        encoding,
        ..Options::default()
    }
}

fn ident(env: &GlobalEnv, decl: DeclId, ty: Type) -> SrcExpr {
    SrcExpr::Ident(env.new_node(ty), decl)
}

fn uint_lit(env: &GlobalEnv, value: i64, bits: u16) -> SrcExpr {
    SrcExpr::NumberLit(env.new_node(Type::uint(bits)), BigInt::from(value))
}

fn storage_struct(id: StructId, ptr: bool) -> Type {
    Type::Struct {
        id,
        loc: DataLocation::Storage,
        ptr,
    }
}

fn add_function(
    env: &mut GlobalEnv,
    contract: ContractId,
    name: &str,
    params: Vec<DeclId>,
    body: SrcStmt,
    is_payable: bool,
) -> FunId {
    let loc = env.unknown_loc();
    env.add_function(FunctionData {
        name: name.to_string(),
        contract,
        params,
        returns: vec![],
        body: Some(body),
        modifiers: vec![],
        is_public: true,
        is_constructor: false,
        is_payable,
        loc,
        preconditions: vec![],
        postconditions: vec![],
    })
}

/// `struct S { uint x; uint y; } struct T { S inner; }` with state
/// `T t1; S s1;`.
struct NestedState {
    env: GlobalEnv,
    s: StructId,
    t: StructId,
    t1: DeclId,
    s1: DeclId,
}

fn nested_state() -> NestedState {
    let mut env = GlobalEnv::new();
    let contract = env.add_contract("C");
    let s = env.add_struct("S");
    env.add_struct_field(s, "x", Type::uint(256));
    env.add_struct_field(s, "y", Type::uint(256));
    let t = env.add_struct("T");
    env.add_struct_field(t, "inner", storage_struct(s, false));
    let t1 = env.add_state_var(contract, "t1", storage_struct(t, false));
    let s1 = env.add_state_var(contract, "s1", storage_struct(s, false));
    NestedState { env, s, t, t1, s1 }
}

fn map_value(entries: Vec<(Value, Value)>) -> Value {
    Value::Map(entries.into_iter().collect())
}

fn struct_value(members: &[(&str, Value)]) -> Value {
    Value::Map(
        members
            .iter()
            .map(|(name, value)| (Value::Str(name.to_string()), value.clone()))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Tests.

#[test]
fn pack_then_unpack_reaches_the_same_slot() {
    let state = nested_state();
    let options = Options::default();
    let mut ctx = TranslationContext::new(&state.env, &options);

    // Pack the path `t1.inner`.
    let t1_ty = state.env.decl_data(state.t1).ty.clone();
    let path = SrcExpr::Member {
        id: state.env.new_node(storage_struct(state.s, false)),
        base: Box::new(ident(&state.env, state.t1, t1_ty)),
        member: MemberRef::Field(state.t, 0),
    };
    let mut t = ExpressionTranslator::new(&mut ctx);
    let packed = storage::pack(&mut t, &path);
    let result = t.finish(packed);
    assert!(result.stmts.is_empty());

    // Concrete state: t1.inner = {x: 10, y: 20}, s1 = {x: 1, y: 2}.
    let inner_name = |sid: StructId, index: usize| {
        let field = state.env.struct_data(sid).fields[index];
        ctx.map_decl_name(field)
    };
    let s_names = (inner_name(state.s, 0), inner_name(state.s, 1));
    let inner_member = ctx.map_decl_name(state.env.struct_data(state.t).fields[0]);
    let this = Value::int(7);
    let inner_value = struct_value(&[
        (&s_names.0, Value::int(10)),
        (&s_names.1, Value::int(20)),
    ]);
    let t1_value = struct_value(&[(&inner_member, inner_value.clone())]);
    let s1_value = struct_value(&[(&s_names.0, Value::int(1)), (&s_names.1, Value::int(2))]);

    let mut store = Store::new();
    store.insert("$this".to_string(), this.clone());
    store.insert(
        ctx.map_decl_name(state.t1),
        map_value(vec![(this.clone(), t1_value)]),
    );
    store.insert(
        ctx.map_decl_name(state.s1),
        map_value(vec![(this, s1_value)]),
    );

    // Bind the packed value to a pointer variable and unpack it.
    let ptr_value = eval(&store, &result.expr);
    store.insert("p".to_string(), ptr_value);
    let node = state.env.new_node(storage_struct(state.s, true));
    let unpacked = storage::unpack(&mut ctx, node, &Expr::id("p"), &storage_struct(state.s, true));
    assert!(!state.env.has_errors());

    assert_eq!(eval(&store, &unpacked), inner_value);
}

#[test]
fn memory_assignment_aliases_and_storage_assignment_copies() {
    // `struct S { uint x; }` with a memory local `a` and storage `s1`;
    // `b = a` aliases (same pointer), `b = s1` deep copies into fresh
    // memory.
    let mut env = GlobalEnv::new();
    let contract = env.add_contract("C");
    let s = env.add_struct("S");
    env.add_struct_field(s, "x", Type::uint(256));
    let s1 = env.add_state_var(contract, "s1", storage_struct(s, false));
    let mem_ty = Type::Struct {
        id: s,
        loc: DataLocation::Memory,
        ptr: false,
    };
    let a = env.add_local("a", mem_ty.clone(), DeclKind::Local);
    let b = env.add_local("b", mem_ty.clone(), DeclKind::Local);

    let options = Options::default();
    let mut ctx = TranslationContext::new(&env, &options);
    let field = env.struct_data(s).fields[0];

    // b = a: pointer copy.
    let assign_alias = SrcExpr::Assign {
        id: env.new_node(mem_ty.clone()),
        op: AssignOp::Assign,
        lhs: Box::new(ident(&env, b, mem_ty.clone())),
        rhs: Box::new(ident(&env, a, mem_ty.clone())),
    };
    let alias = exprs::lower_expression(&mut ctx, &assign_alias);
    let mut store = Store::new();
    store.insert(ctx.map_decl_name(a), Value::int(100));
    exec(&mut store, &alias.stmts);
    assert_eq!(store.get(&ctx.map_decl_name(b)), Some(&Value::int(100)));

    // b = s1: fresh pointer, member copied through the heap.
    let assign_deep = SrcExpr::Assign {
        id: env.new_node(mem_ty.clone()),
        op: AssignOp::Assign,
        lhs: Box::new(ident(&env, b, mem_ty.clone())),
        rhs: Box::new(ident(&env, s1, storage_struct(s, false))),
    };
    let deep = exprs::lower_expression(&mut ctx, &assign_deep);
    assert!(!env.has_errors());

    let this = Value::int(7);
    store.insert("$this".to_string(), this.clone());
    store.insert("$alloc".to_string(), Value::int(500));
    let s1_value = struct_value(&[(&ctx.map_decl_name(field), Value::int(42))]);
    store.insert(
        ctx.map_decl_name(s1),
        map_value(vec![(this, s1_value)]),
    );
    let heap_name = format!("{}#mem", ctx.map_decl_name(field));
    store.insert(heap_name.clone(), Value::Map(BTreeMap::new()));
    exec(&mut store, &deep.stmts);

    // b now holds the fresh pointer, distinct from a's value, and the heap
    // carries the copied member.
    let b_ptr = store.get(&ctx.map_decl_name(b)).cloned().unwrap();
    assert_eq!(b_ptr, Value::int(500));
    assert_eq!(store.get("$alloc"), Some(&Value::int(501)));
    let heap = store.get(&heap_name).unwrap().as_map().clone();
    assert_eq!(heap.get(&b_ptr), Some(&Value::int(42)));
}

#[test]
fn modular_addition_is_exact_at_width_8() {
    let env = GlobalEnv::new();
    let options = options_with(ArithEncoding::Mod);
    let mut ctx = TranslationContext::new(&env, &options);
    let store = Store::new();

    let check = |ctx: &mut TranslationContext, a: i64, b: i64| {
        let node = env.new_node(Type::uint(8));
        let encoded = arith::encode_binary(
            ctx,
            node,
            SrcBinOp::Add,
            Expr::num(BigInt::from(a)),
            Expr::num(BigInt::from(b)),
            8,
            false,
        );
        let value = eval(&store, &encoded.expr).as_int();
        let holds = eval(&store, &encoded.correctness.expect("correctness condition"));
        (value, holds.as_bool())
    };

    // 200 + 100 wraps to 44; the correctness condition must be false.
    let (value, holds) = check(&mut ctx, 200, 100);
    assert_eq!(value, BigInt::from(44));
    assert!(!holds);

    // 100 + 50 stays in range; the correctness condition holds.
    let (value, holds) = check(&mut ctx, 100, 50);
    assert_eq!(value, BigInt::from(150));
    assert!(holds);
}

#[test]
fn division_agrees_across_encodings() {
    for encoding in [ArithEncoding::Int, ArithEncoding::Bv, ArithEncoding::Mod] {
        let env = GlobalEnv::new();
        let options = options_with(encoding);
        let mut ctx = TranslationContext::new(&env, &options);
        let div = SrcExpr::Binary {
            id: env.new_node(Type::uint(8)),
            op: SrcBinOp::Div,
            lhs: Box::new(uint_lit(&env, 5, 8)),
            rhs: Box::new(uint_lit(&env, 3, 8)),
        };
        let result = exprs::lower_expression(&mut ctx, &div);
        assert!(!env.has_errors());
        let store = Store::new();
        assert_eq!(
            eval(&store, &result.expr).as_int(),
            BigInt::from(1),
            "5 / 3 under {:?}",
            encoding
        );
    }
}

#[test]
fn tuple_swap_reads_before_writing() {
    let mut env = GlobalEnv::new();
    let a = env.add_local("a", Type::uint(256), DeclKind::Local);
    let b = env.add_local("b", Type::uint(256), DeclKind::Local);
    let options = Options::default();
    let mut ctx = TranslationContext::new(&env, &options);

    let tuple_ty = Type::Tuple(vec![Type::uint(256), Type::uint(256)]);
    let swap = SrcExpr::Assign {
        id: env.new_node(tuple_ty.clone()),
        op: AssignOp::Assign,
        lhs: Box::new(SrcExpr::Tuple {
            id: env.new_node(tuple_ty.clone()),
            components: vec![
                Some(ident(&env, a, Type::uint(256))),
                Some(ident(&env, b, Type::uint(256))),
            ],
        }),
        rhs: Box::new(SrcExpr::Tuple {
            id: env.new_node(tuple_ty),
            components: vec![
                Some(ident(&env, b, Type::uint(256))),
                Some(ident(&env, a, Type::uint(256))),
            ],
        }),
    };
    let result = exprs::lower_expression(&mut ctx, &swap);
    assert!(!env.has_errors());

    let mut store = Store::new();
    store.insert(ctx.map_decl_name(a), Value::int(1));
    store.insert(ctx.map_decl_name(b), Value::int(2));
    exec(&mut store, &result.stmts);
    assert_eq!(store.get(&ctx.map_decl_name(a)), Some(&Value::int(2)));
    assert_eq!(store.get(&ctx.map_decl_name(b)), Some(&Value::int(1)));
}

#[test]
fn range_conditions_accept_extremes_and_reject_beyond() {
    let env = GlobalEnv::new();
    let options = Options::default();
    let ctx = TranslationContext::new(&env, &options);

    let cond = arith::range_condition(
        &ctx,
        &Expr::id("v"),
        &Type::uint(8),
        arith::Bounds::Both,
    )
    .expect("range condition in int mode");

    let mut store = Store::new();
    store.insert("v".to_string(), Value::int(255));
    assert!(eval(&store, &cond).as_bool());
    store.insert("v".to_string(), Value::int(256));
    assert!(!eval(&store, &cond).as_bool());
    store.insert("v".to_string(), Value::int(0));
    assert!(eval(&store, &cond).as_bool());
}

#[test]
fn sum_shadow_follows_element_updates() {
    // `mapping(address => uint) balances` with a registered sum shadow;
    // `balances[k] = balances[k] + 10` bumps the shadow by 10.
    let mut env = GlobalEnv::new();
    let contract = env.add_contract("C");
    let map_ty = Type::Mapping(Box::new(Type::Address), Box::new(Type::uint(256)));
    let balances = env.add_state_var(contract, "balances", map_ty.clone());
    let k = env.add_local("k", Type::Address, DeclKind::Local);

    let options = Options::default();
    let mut ctx = TranslationContext::new(&env, &options);
    let shadow = ctx.sum_shadow(balances);

    let element = |env: &GlobalEnv| SrcExpr::Index {
        id: env.new_node(Type::uint(256)),
        base: Box::new(ident(env, balances, map_ty.clone())),
        index: Box::new(ident(env, k, Type::Address)),
    };
    let update = SrcExpr::Assign {
        id: env.new_node(Type::uint(256)),
        op: AssignOp::Assign,
        lhs: Box::new(element(&env)),
        rhs: Box::new(SrcExpr::Binary {
            id: env.new_node(Type::uint(256)),
            op: SrcBinOp::Add,
            lhs: Box::new(element(&env)),
            rhs: Box::new(uint_lit(&env, 10, 256)),
        }),
    };
    let result = exprs::lower_expression(&mut ctx, &update);
    assert!(!env.has_errors());

    let this = Value::int(7);
    let key = Value::int(3);
    let mut store = Store::new();
    store.insert("$this".to_string(), this.clone());
    store.insert(ctx.map_decl_name(k), key.clone());
    store.insert(
        ctx.map_decl_name(balances),
        map_value(vec![(
            this.clone(),
            map_value(vec![(key.clone(), Value::int(5))]),
        )]),
    );
    store.insert(
        shadow.clone(),
        map_value(vec![(this.clone(), Value::int(5))]),
    );
    exec(&mut store, &result.stmts);

    let balances_now = store
        .get(&ctx.map_decl_name(balances))
        .unwrap()
        .as_map()
        .get(&this)
        .unwrap()
        .as_map()
        .clone();
    assert_eq!(balances_now.get(&key), Some(&Value::int(15)));
    let shadow_now = store.get(&shadow).unwrap().as_map().get(&this).cloned();
    assert_eq!(shadow_now, Some(Value::int(15)));
}

#[test]
fn loop_condition_side_effects_rerun_each_iteration() {
    // `while (i++ < 3) {}` with `i` starting at 0: the condition reads a
    // temporary holding the old value, and the increment must run again at
    // the end of every iteration for the loop to terminate.
    let mut env = GlobalEnv::new();
    let contract = env.add_contract("C");
    let i = env.add_local("i", Type::uint(256), DeclKind::Param);
    let cond = SrcExpr::Binary {
        id: env.new_node(Type::Bool),
        op: SrcBinOp::Lt,
        lhs: Box::new(SrcExpr::Unary {
            id: env.new_node(Type::uint(256)),
            op: UnOp::PostInc,
            sub: Box::new(ident(&env, i, Type::uint(256))),
        }),
        rhs: Box::new(uint_lit(&env, 3, 256)),
    };
    let body = SrcStmt::While {
        cond,
        body: Box::new(SrcStmt::Block(vec![])),
        is_do_while: false,
        invariants: vec![],
    };
    let fun = add_function(&mut env, contract, "count", vec![i], body, false);

    let options = Options::default();
    let mut ctx = TranslationContext::new(&env, &options);
    let proc = FunctionTranslator::new(&mut ctx, fun).translate();
    assert!(!env.has_errors());

    let stmts = &proc.body.stmts;
    let while_pos = stmts
        .iter()
        .position(|s| matches!(s, Stmt::While { .. }))
        .unwrap();
    let mut store = Store::new();
    store.insert(ctx.map_decl_name(i), Value::int(0));
    exec(&mut store, &stmts[..while_pos]);

    match &stmts[while_pos] {
        Stmt::While {
            cond: Some(cond),
            body,
            ..
        } => {
            let mut iterations = 0;
            while eval(&store, cond).as_bool() {
                exec(&mut store, &body.stmts);
                iterations += 1;
                assert!(iterations <= 10, "loop test never advances");
            }
            assert_eq!(iterations, 3);
        }
        other => panic!("expected a while loop, got {:?}", other),
    }
    assert_eq!(store.get(&ctx.map_decl_name(i)), Some(&Value::int(4)));
}

#[test]
fn break_in_an_inlined_do_while_iteration_jumps_past_the_loop() {
    // `do { break; } while (true)`: the first iteration is inlined before
    // the loop, so `break` must lower to a goto targeting a label placed
    // after the loop; a bare break statement would be illegal there.
    let mut env = GlobalEnv::new();
    let contract = env.add_contract("C");
    let cond = SrcExpr::BoolLit(env.new_node(Type::Bool), true);
    let body = SrcStmt::While {
        cond,
        body: Box::new(SrcStmt::Break),
        is_do_while: true,
        invariants: vec![],
    };
    let fun = add_function(&mut env, contract, "leave", vec![], body, false);

    let options = Options::default();
    let mut ctx = TranslationContext::new(&env, &options);
    let proc = FunctionTranslator::new(&mut ctx, fun).translate();
    assert!(!env.has_errors());

    fn contains_break(stmts: &[Stmt]) -> bool {
        stmts.iter().any(|s| match s {
            Stmt::Break => true,
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                contains_break(&then_block.stmts)
                    || else_block
                        .as_ref()
                        .map(|b| contains_break(&b.stmts))
                        .unwrap_or(false)
            }
            Stmt::While { body, .. } => contains_break(&body.stmts),
            _ => false,
        })
    }
    let stmts = &proc.body.stmts;
    assert!(!contains_break(stmts));

    let while_pos = stmts
        .iter()
        .position(|s| matches!(s, Stmt::While { .. }))
        .unwrap();
    let target = stmts[..while_pos]
        .iter()
        .find_map(|s| match s {
            Stmt::Goto { targets } => targets.first().cloned(),
            _ => None,
        })
        .expect("inlined break");
    assert!(stmts[while_pos + 1..]
        .iter()
        .any(|s| matches!(s, Stmt::Label(name) if *name == target)));
}

#[test]
fn payable_function_credits_msg_value_on_entry() {
    // A payable function with an empty body still adds the transferred
    // value to the receiver's balance, with the modular fold assumed exact.
    let mut env = GlobalEnv::new();
    let contract = env.add_contract("C");
    let fun = add_function(
        &mut env,
        contract,
        "deposit",
        vec![],
        SrcStmt::Block(vec![]),
        true,
    );

    let options = options_with(ArithEncoding::Mod);
    let mut ctx = TranslationContext::new(&env, &options);
    let proc = FunctionTranslator::new(&mut ctx, fun).translate();
    assert!(!env.has_errors());

    let this = Value::int(7);
    let mut store = Store::new();
    store.insert("$this".to_string(), this.clone());
    store.insert("$msg_value".to_string(), Value::int(5));
    store.insert(
        "$balance".to_string(),
        map_value(vec![(this.clone(), Value::int(100))]),
    );
    exec(&mut store, &proc.body.stmts);
    let balance = store.get("$balance").unwrap().as_map().clone();
    assert_eq!(balance.get(&this), Some(&Value::int(105)));
}

#[test]
fn generated_program_prints_without_errors() {
    let state = nested_state();
    let options = Options::default();
    let program = boogie_gen::translate_program(&state.env, &options);
    assert!(!state.env.has_errors());
    let text = boogie_gen::print_program(&program);
    assert!(text.contains("type address = int;"));
    assert!(text.contains("procedure"));
    // Both state variables become per-address maps.
    assert!(text.contains(&format!("var {}:", {
        let ctx = TranslationContext::new(&state.env, &options);
        ctx.map_decl_name(state.t1)
    })));
}
