// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Boogie expressions.

use std::fmt;

use itertools::Itertools;
use num::{BigInt, BigUint};

/// Binary operators of the verification language. Bit-vector operations are
/// not operators but calls to `:bvbuiltin` functions.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Neq,
    And,
    Or,
    Implies,
    Iff,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinOp::*;
        f.write_str(match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "div",
            Mod => "mod",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            Eq => "==",
            Neq => "!=",
            And => "&&",
            Or => "||",
            Implies => "==>",
            Iff => "<==>",
        })
    }
}

/// A Boogie expression.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Expr {
    /// Marker returned for unsupported constructs so translation can
    /// continue after reporting a diagnostic.
    Error,
    BoolLit(bool),
    IntLit(BigInt),
    BvLit { value: BigUint, bits: u16 },
    Id(String),
    Old(Box<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// Map select `base[index]`.
    Sel {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// Map update `base[index := value]`.
    Upd {
        base: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    /// Datatype member selector `member(base)`.
    DtSel {
        base: Box<Expr>,
        member: String,
    },
    /// Datatype member update: `base` with `member` replaced by `value`.
    DtUpd {
        base: Box<Expr>,
        member: String,
        value: Box<Expr>,
    },
    FnCall {
        name: String,
        args: Vec<Expr>,
    },
    Tuple(Vec<Expr>),
}

impl Expr {
    pub fn id(name: impl Into<String>) -> Expr {
        Expr::Id(name.into())
    }

    pub fn lit(value: i64) -> Expr {
        Expr::IntLit(BigInt::from(value))
    }

    pub fn num(value: BigInt) -> Expr {
        Expr::IntLit(value)
    }

    pub fn bv(value: BigUint, bits: u16) -> Expr {
        Expr::BvLit { value, bits }
    }

    pub fn true_() -> Expr {
        Expr::BoolLit(true)
    }

    pub fn false_() -> Expr {
        Expr::BoolLit(false)
    }

    pub fn old(e: Expr) -> Expr {
        Expr::Old(Box::new(e))
    }

    pub fn not(e: Expr) -> Expr {
        Expr::Not(Box::new(e))
    }

    pub fn neg(e: Expr) -> Expr {
        Expr::Neg(Box::new(e))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Mul, lhs, rhs)
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Div, lhs, rhs)
    }

    pub fn modulo(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Mod, lhs, rhs)
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Eq, lhs, rhs)
    }

    pub fn neq(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Neq, lhs, rhs)
    }

    pub fn lt(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Lt, lhs, rhs)
    }

    pub fn gt(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Gt, lhs, rhs)
    }

    pub fn lte(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Le, lhs, rhs)
    }

    pub fn gte(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Ge, lhs, rhs)
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::And, lhs, rhs)
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Or, lhs, rhs)
    }

    pub fn implies(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Implies, lhs, rhs)
    }

    pub fn cond(cond: Expr, if_true: Expr, if_false: Expr) -> Expr {
        Expr::Cond {
            cond: Box::new(cond),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    pub fn sel(base: Expr, index: Expr) -> Expr {
        Expr::Sel {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    pub fn upd(base: Expr, index: Expr, value: Expr) -> Expr {
        Expr::Upd {
            base: Box::new(base),
            index: Box::new(index),
            value: Box::new(value),
        }
    }

    pub fn dtsel(base: Expr, member: impl Into<String>) -> Expr {
        Expr::DtSel {
            base: Box::new(base),
            member: member.into(),
        }
    }

    pub fn dtupd(base: Expr, member: impl Into<String>, value: Expr) -> Expr {
        Expr::DtUpd {
            base: Box::new(base),
            member: member.into(),
            value: Box::new(value),
        }
    }

    pub fn fn_call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::FnCall {
            name: name.into(),
            args,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Expr::Error)
    }

    /// Pushes selectors through conditionals: `(c ? a : b)[i]` becomes
    /// `c ? a[i] : b[i]`, recursively, and likewise for datatype selectors.
    /// Local storage pointers unpack to conditionals, so every consumer that
    /// needs an assignable target must see the selector at the leaves.
    pub fn lift_conditionals(&self) -> Expr {
        match self {
            Expr::Sel { base, index } => match base.lift_conditionals() {
                Expr::Cond {
                    cond,
                    if_true,
                    if_false,
                } => Expr::cond(
                    *cond,
                    Expr::sel(*if_true, (**index).clone()).lift_conditionals(),
                    Expr::sel(*if_false, (**index).clone()).lift_conditionals(),
                ),
                base => Expr::sel(base, (**index).clone()),
            },
            Expr::DtSel { base, member } => match base.lift_conditionals() {
                Expr::Cond {
                    cond,
                    if_true,
                    if_false,
                } => Expr::cond(
                    *cond,
                    Expr::dtsel(*if_true, member.clone()).lift_conditionals(),
                    Expr::dtsel(*if_false, member.clone()).lift_conditionals(),
                ),
                base => Expr::dtsel(base, member.clone()),
            },
            _ => self.clone(),
        }
    }

    /// Rewrites an assignment into a select/selector chain as an assignment
    /// to the chain's base: `a[i].m := v` becomes
    /// `a := a[i := m-updated(a[i], v)]`. Returns the base expression (an
    /// identifier for well-formed targets) and the updated value.
    pub fn to_update(&self, value: Expr) -> (Expr, Expr) {
        match self {
            Expr::Sel { base, index } => {
                base.to_update(Expr::upd((**base).clone(), (**index).clone(), value))
            }
            Expr::DtSel { base, member } => {
                base.to_update(Expr::dtupd((**base).clone(), member.clone(), value))
            }
            _ => (self.clone(), value),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Expr::*;
        match self {
            Error => f.write_str("$error"),
            BoolLit(b) => write!(f, "{}", b),
            IntLit(i) => {
                if i.sign() == num::bigint::Sign::Minus {
                    write!(f, "({})", i)
                } else {
                    write!(f, "{}", i)
                }
            }
            BvLit { value, bits } => write!(f, "{}bv{}", value, bits),
            Id(name) => f.write_str(name),
            Old(e) => write!(f, "old({})", e),
            Not(e) => write!(f, "!({})", e),
            Neg(e) => write!(f, "-({})", e),
            Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            Cond {
                cond,
                if_true,
                if_false,
            } => write!(f, "(if {} then {} else {})", cond, if_true, if_false),
            Sel { base, index } => write!(f, "{}[{}]", base, index),
            Upd { base, index, value } => write!(f, "{}[{} := {}]", base, index, value),
            DtSel { base, member } => write!(f, "{}({})", member, base),
            DtUpd {
                base,
                member,
                value,
            } => write!(f, "{}[{} := {}]", base, member, value),
            FnCall { name, args } => {
                write!(f, "{}({})", name, args.iter().map(|a| a.to_string()).join(", "))
            }
            Tuple(elems) => write!(f, "{}", elems.iter().map(|e| e.to_string()).join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifts_select_through_conditional() {
        let e = Expr::sel(
            Expr::cond(Expr::id("c"), Expr::id("a"), Expr::id("b")),
            Expr::id("i"),
        );
        let lifted = e.lift_conditionals();
        assert_eq!(
            lifted,
            Expr::cond(
                Expr::id("c"),
                Expr::sel(Expr::id("a"), Expr::id("i")),
                Expr::sel(Expr::id("b"), Expr::id("i")),
            )
        );
    }

    #[test]
    fn nested_select_to_update() {
        // a[i][j] := v  ~>  a := a[i := a[i][j := v]]
        let inner = Expr::sel(Expr::id("a"), Expr::id("i"));
        let lhs = Expr::sel(inner.clone(), Expr::id("j"));
        let (base, value) = lhs.to_update(Expr::id("v"));
        assert_eq!(base, Expr::id("a"));
        assert_eq!(
            value,
            Expr::upd(
                Expr::id("a"),
                Expr::id("i"),
                Expr::upd(inner, Expr::id("j"), Expr::id("v")),
            )
        );
    }
}
