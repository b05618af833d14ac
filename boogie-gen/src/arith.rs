// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Arithmetic encoding. Source-level integer operations are lowered in one
//! of three modes:
//!
//! - `int`: unbounded mathematical integers. Sound for programs that never
//!   wrap, no side conditions produced.
//! - `bv`: SMT bit-vectors of the declared width, via lazily declared
//!   `:bvbuiltin` functions. Exact by construction.
//! - `mod`: unbounded integers with an explicit wraparound fold after every
//!   operation. Exact, and each operation yields a correctness condition
//!   stating that the fold was the identity (i.e. no overflow happened).
//!
//! Also home of the range-condition generator, which produces the
//! `min <= v <= max` assumptions that tie unbounded representations back to
//! the declared widths.

use num::{BigInt, One, Zero};

use boogie_ast::Expr;
use contract_model::{
    ast::{BinOp, NodeId, UnOp},
    ty::Type,
};

use crate::{context::TranslationContext, options::ArithEncoding};

/// Result of encoding a single arithmetic operation: the value expression
/// and, in the modular encoding, the condition under which the operation
/// did not wrap.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub expr: Expr,
    pub correctness: Option<Expr>,
}

impl Encoded {
    fn exact(expr: Expr) -> Encoded {
        Encoded {
            expr,
            correctness: None,
        }
    }
}

fn two_pow(bits: u16) -> BigInt {
    BigInt::one() << bits as usize
}

/// Smallest value of the type: `-2^(n-1)` signed, `0` unsigned.
pub fn min_value(bits: u16, signed: bool) -> BigInt {
    if signed {
        -(BigInt::one() << (bits as usize - 1))
    } else {
        BigInt::zero()
    }
}

/// Largest value of the type: `2^(n-1)-1` signed, `2^n-1` unsigned.
pub fn max_value(bits: u16, signed: bool) -> BigInt {
    if signed {
        (BigInt::one() << (bits as usize - 1)) - 1
    } else {
        two_pow(bits) - 1
    }
}

/// Encodes a binary operation on integers of the given width and
/// signedness. Reports a diagnostic and returns an error marker for
/// operations the active encoding cannot express.
pub fn encode_binary(
    ctx: &mut TranslationContext,
    node: NodeId,
    op: BinOp,
    lhs: Expr,
    rhs: Expr,
    bits: u16,
    signed: bool,
) -> Encoded {
    match ctx.options.encoding {
        ArithEncoding::Bv => encode_binary_bv(ctx, node, op, lhs, rhs, bits, signed),
        ArithEncoding::Int => encode_binary_int(ctx, node, op, lhs, rhs, bits, signed),
        ArithEncoding::Mod => encode_binary_mod(ctx, node, op, lhs, rhs, bits, signed),
    }
}

fn encode_binary_int(
    ctx: &mut TranslationContext,
    node: NodeId,
    op: BinOp,
    lhs: Expr,
    rhs: Expr,
    bits: u16,
    signed: bool,
) -> Encoded {
    let expr = match op {
        BinOp::Add => Expr::add(lhs, rhs),
        BinOp::Sub => Expr::sub(lhs, rhs),
        BinOp::Mul => Expr::mul(lhs, rhs),
        BinOp::Div => Expr::div(lhs, rhs),
        BinOp::Mod => Expr::modulo(lhs, rhs),
        BinOp::Eq => Expr::eq(lhs, rhs),
        BinOp::Neq => Expr::neq(lhs, rhs),
        BinOp::Lt => Expr::lt(lhs, rhs),
        BinOp::Gt => Expr::gt(lhs, rhs),
        BinOp::Le => Expr::lte(lhs, rhs),
        BinOp::Ge => Expr::gte(lhs, rhs),
        BinOp::Exp => return encode_exp(ctx, node, lhs, rhs, bits, signed),
        BinOp::And | BinOp::Or => {
            // Handled by the expression translator before reaching here.
            ctx.report_error(node, "boolean connective reached arithmetic encoder");
            Expr::Error
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
            ctx.report_error(
                node,
                "bitwise operations are only supported with bit-vector encoding",
            );
            Expr::Error
        }
    };
    Encoded::exact(expr)
}

fn encode_binary_bv(
    ctx: &mut TranslationContext,
    node: NodeId,
    op: BinOp,
    lhs: Expr,
    rhs: Expr,
    bits: u16,
    signed: bool,
) -> Encoded {
    let (smt_op, returns_bool) = match (op, signed) {
        // Equality has native bit-vector support, no builtin needed.
        (BinOp::Eq, _) => return Encoded::exact(Expr::eq(lhs, rhs)),
        (BinOp::Neq, _) => return Encoded::exact(Expr::neq(lhs, rhs)),
        (BinOp::Add, _) => ("bvadd", false),
        (BinOp::Sub, _) => ("bvsub", false),
        (BinOp::Mul, _) => ("bvmul", false),
        (BinOp::Div, false) => ("bvudiv", false),
        (BinOp::Div, true) => ("bvsdiv", false),
        (BinOp::Mod, false) => ("bvurem", false),
        (BinOp::Mod, true) => ("bvsrem", false),
        (BinOp::Lt, false) => ("bvult", true),
        (BinOp::Lt, true) => ("bvslt", true),
        (BinOp::Gt, false) => ("bvugt", true),
        (BinOp::Gt, true) => ("bvsgt", true),
        (BinOp::Le, false) => ("bvule", true),
        (BinOp::Le, true) => ("bvsle", true),
        (BinOp::Ge, false) => ("bvuge", true),
        (BinOp::Ge, true) => ("bvsge", true),
        (BinOp::BitAnd, _) => ("bvand", false),
        (BinOp::BitOr, _) => ("bvor", false),
        (BinOp::BitXor, _) => ("bvxor", false),
        (BinOp::Shl, _) => ("bvshl", false),
        (BinOp::Shr, false) => ("bvlshr", false),
        (BinOp::Shr, true) => ("bvashr", false),
        (BinOp::Exp, _) => {
            ctx.report_error(
                node,
                "exponentiation is not supported with bit-vector encoding",
            );
            return Encoded::exact(Expr::Error);
        }
        (BinOp::And, _) | (BinOp::Or, _) => {
            ctx.report_error(node, "boolean connective reached arithmetic encoder");
            return Encoded::exact(Expr::Error);
        }
    };
    let builtin = ctx.bv_builtin(smt_op, bits, returns_bool);
    Encoded::exact(Expr::fn_call(builtin, vec![lhs, rhs]))
}

fn encode_binary_mod(
    ctx: &mut TranslationContext,
    node: NodeId,
    op: BinOp,
    lhs: Expr,
    rhs: Expr,
    bits: u16,
    signed: bool,
) -> Encoded {
    let modulus = || Expr::num(two_pow(bits));
    let largest = || Expr::num(max_value(bits, signed));
    let smallest = || Expr::num(min_value(bits, signed));
    match op {
        BinOp::Add => {
            let sum = Expr::add(lhs, rhs);
            let folded = if signed {
                // Fold each out-of-range side back by one modulus.
                Expr::cond(
                    Expr::gt(sum.clone(), largest()),
                    Expr::sub(sum.clone(), modulus()),
                    Expr::cond(
                        Expr::lt(sum.clone(), smallest()),
                        Expr::add(sum.clone(), modulus()),
                        sum.clone(),
                    ),
                )
            } else {
                Expr::cond(
                    Expr::gt(sum.clone(), largest()),
                    Expr::sub(sum.clone(), modulus()),
                    sum.clone(),
                )
            };
            Encoded {
                correctness: Some(Expr::eq(sum, folded.clone())),
                expr: folded,
            }
        }
        BinOp::Sub => {
            let diff = Expr::sub(lhs, rhs);
            let folded = if signed {
                Expr::cond(
                    Expr::gt(diff.clone(), largest()),
                    Expr::sub(diff.clone(), modulus()),
                    Expr::cond(
                        Expr::lt(diff.clone(), smallest()),
                        Expr::add(diff.clone(), modulus()),
                        diff.clone(),
                    ),
                )
            } else {
                Expr::cond(
                    Expr::gte(diff.clone(), Expr::num(BigInt::zero())),
                    diff.clone(),
                    Expr::add(diff.clone(), modulus()),
                )
            };
            Encoded {
                correctness: Some(Expr::eq(diff, folded.clone())),
                expr: folded,
            }
        }
        BinOp::Mul => {
            // For signed operands, normalize each factor to its non-negative
            // residue so that `mod 2^n` below is the true modular product.
            let norm = |e: Expr| {
                if signed {
                    Expr::cond(
                        Expr::gte(e.clone(), Expr::num(BigInt::zero())),
                        e.clone(),
                        Expr::add(e, modulus()),
                    )
                } else {
                    e
                }
            };
            let prod = Expr::mul(lhs.clone(), rhs.clone());
            let residue = Expr::modulo(Expr::mul(norm(lhs), norm(rhs)), modulus());
            let folded = if signed {
                Expr::cond(
                    Expr::gt(residue.clone(), largest()),
                    Expr::sub(residue.clone(), modulus()),
                    residue,
                )
            } else {
                residue
            };
            Encoded {
                correctness: Some(Expr::eq(prod, folded.clone())),
                expr: folded,
            }
        }
        BinOp::Div => {
            let quot = Expr::div(lhs, rhs);
            let folded = if signed {
                // The only wrapping case is MIN / -1.
                Expr::cond(
                    Expr::gt(quot.clone(), largest()),
                    Expr::sub(quot.clone(), modulus()),
                    quot.clone(),
                )
            } else {
                quot.clone()
            };
            Encoded {
                correctness: Some(Expr::eq(quot, folded.clone())),
                expr: folded,
            }
        }
        // Remainder of in-range operands is always in range.
        BinOp::Mod => Encoded::exact(Expr::modulo(lhs, rhs)),
        BinOp::Exp => encode_exp(ctx, node, lhs, rhs, bits, signed),
        BinOp::Eq => Encoded::exact(Expr::eq(lhs, rhs)),
        BinOp::Neq => Encoded::exact(Expr::neq(lhs, rhs)),
        BinOp::Lt => Encoded::exact(Expr::lt(lhs, rhs)),
        BinOp::Gt => Encoded::exact(Expr::gt(lhs, rhs)),
        BinOp::Le => Encoded::exact(Expr::lte(lhs, rhs)),
        BinOp::Ge => Encoded::exact(Expr::gte(lhs, rhs)),
        BinOp::And | BinOp::Or => {
            ctx.report_error(node, "boolean connective reached arithmetic encoder");
            Encoded::exact(Expr::Error)
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
            ctx.report_error(
                node,
                "bitwise operations are only supported with bit-vector encoding",
            );
            Encoded::exact(Expr::Error)
        }
    }
}

/// Exponentiation with a literal exponent, expanded into a product by
/// squaring-free repeated multiplication. Folding (and the correctness
/// condition) of each step comes from the encoder itself, so overflow in
/// intermediate products is caught in the modular encoding.
fn encode_exp(
    ctx: &mut TranslationContext,
    node: NodeId,
    base: Expr,
    exponent: Expr,
    bits: u16,
    signed: bool,
) -> Encoded {
    let exp_value = match &exponent {
        Expr::IntLit(v) => v.clone(),
        _ => {
            ctx.report_error(node, "exponentiation requires a literal exponent");
            return Encoded::exact(Expr::Error);
        }
    };
    if exp_value < BigInt::zero() {
        ctx.report_error(node, "negative exponent");
        return Encoded::exact(Expr::Error);
    }
    if exp_value.is_zero() {
        return Encoded::exact(Expr::num(BigInt::one()));
    }
    let fold = ctx.options.mod_encoding();
    let mut result = Encoded::exact(base.clone());
    let mut count = BigInt::one();
    while count < exp_value {
        let step = if fold {
            encode_binary_mod(ctx, node, BinOp::Mul, result.expr, base.clone(), bits, signed)
        } else {
            Encoded::exact(Expr::mul(result.expr, base.clone()))
        };
        result = Encoded {
            expr: step.expr,
            correctness: match (result.correctness, step.correctness) {
                (Some(a), Some(b)) => Some(Expr::and(a, b)),
                (a, b) => a.or(b),
            },
        };
        count += BigInt::one();
    }
    result
}

/// Encodes unary minus and bitwise complement.
pub fn encode_unary(
    ctx: &mut TranslationContext,
    node: NodeId,
    op: UnOp,
    sub: Expr,
    bits: u16,
    signed: bool,
) -> Encoded {
    match (op, ctx.options.encoding) {
        (UnOp::Neg, ArithEncoding::Bv) => {
            let builtin = ctx.bv_builtin("bvneg", bits, false);
            Encoded::exact(Expr::fn_call(builtin, vec![sub]))
        }
        (UnOp::Neg, ArithEncoding::Int) => Encoded::exact(Expr::neg(sub)),
        (UnOp::Neg, ArithEncoding::Mod) => {
            // 0 - v, folded. Wraps only for v == MIN (signed).
            encode_binary_mod(
                ctx,
                node,
                BinOp::Sub,
                Expr::num(BigInt::zero()),
                sub,
                bits,
                signed,
            )
        }
        (UnOp::BitNot, ArithEncoding::Bv) => {
            let builtin = ctx.bv_builtin("bvnot", bits, false);
            Encoded::exact(Expr::fn_call(builtin, vec![sub]))
        }
        (UnOp::BitNot, _) => {
            ctx.report_error(
                node,
                "bitwise operations are only supported with bit-vector encoding",
            );
            Encoded::exact(Expr::Error)
        }
        _ => {
            // Not/inc/dec are handled by the expression translator.
            ctx.report_error(node, "operator reached arithmetic encoder unexpectedly");
            Encoded::exact(Expr::Error)
        }
    }
}

/// Which side of the range to constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bounds {
    Lower,
    Upper,
    Both,
}

/// The condition tying a value of the given type to its declared range:
/// `0 <= v < member_count` for enums, `min <= v <= max` for integers.
/// Returns `None` when the encoding already guarantees the range (bit-vector
/// mode) or the type has no range to speak of.
pub fn range_condition(
    ctx: &TranslationContext,
    expr: &Expr,
    ty: &Type,
    bounds: Bounds,
) -> Option<Expr> {
    if ctx.options.bv_encoding() {
        return None;
    }
    let (min, max) = match ty {
        Type::Enum(id) => {
            let count = ctx.env.enum_data(*id).members.len();
            (BigInt::zero(), BigInt::from(count) - 1)
        }
        Type::Int { bits, signed } => (min_value(*bits, *signed), max_value(*bits, *signed)),
        _ => return None,
    };
    let lower = Expr::lte(Expr::num(min), expr.clone());
    let upper = Expr::lte(expr.clone(), Expr::num(max));
    Some(match bounds {
        Bounds::Lower => lower,
        Bounds::Upper => upper,
        Bounds::Both => Expr::and(lower, upper),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_model::env::GlobalEnv;

    use crate::options::Options;

    fn ctx_with<'a>(env: &'a GlobalEnv, options: &'a Options) -> TranslationContext<'a> {
        TranslationContext::new(env, options)
    }

    fn mod_options() -> Options {
        Options {
            encoding: ArithEncoding::Mod,
            ..Options::default()
        }
    }

    #[test]
    fn unsigned_add_folds_once() {
        let env = GlobalEnv::new();
        let options = mod_options();
        let mut ctx = ctx_with(&env, &options);
        let node = env.new_node(Type::uint(8));
        let enc = encode_binary(
            &mut ctx,
            node,
            BinOp::Add,
            Expr::id("a"),
            Expr::id("b"),
            8,
            false,
        );
        let sum = Expr::add(Expr::id("a"), Expr::id("b"));
        let expected = Expr::cond(
            Expr::gt(sum.clone(), Expr::num(BigInt::from(255))),
            Expr::sub(sum.clone(), Expr::num(BigInt::from(256))),
            sum.clone(),
        );
        assert_eq!(enc.expr, expected);
        assert_eq!(enc.correctness, Some(Expr::eq(sum, expected)));
    }

    #[test]
    fn int_encoding_has_no_correctness_condition() {
        let env = GlobalEnv::new();
        let options = Options::default();
        let mut ctx = ctx_with(&env, &options);
        let node = env.new_node(Type::uint(256));
        let enc = encode_binary(
            &mut ctx,
            node,
            BinOp::Mul,
            Expr::id("a"),
            Expr::id("b"),
            256,
            false,
        );
        assert_eq!(enc.expr, Expr::mul(Expr::id("a"), Expr::id("b")));
        assert!(enc.correctness.is_none());
    }

    #[test]
    fn bv_encoding_uses_signedness_matched_builtin() {
        let env = GlobalEnv::new();
        let options = Options {
            encoding: ArithEncoding::Bv,
            ..Options::default()
        };
        let mut ctx = ctx_with(&env, &options);
        let node = env.new_node(Type::int(32));
        let enc = encode_binary(
            &mut ctx,
            node,
            BinOp::Div,
            Expr::id("a"),
            Expr::id("b"),
            32,
            true,
        );
        assert_eq!(
            enc.expr,
            Expr::fn_call("$bvsdiv.32", vec![Expr::id("a"), Expr::id("b")])
        );
        assert!(enc.correctness.is_none());
    }

    #[test]
    fn range_condition_bounds() {
        let env = GlobalEnv::new();
        let options = Options::default();
        let ctx = ctx_with(&env, &options);
        let cond = range_condition(&ctx, &Expr::id("v"), &Type::uint(8), Bounds::Both).unwrap();
        let expected = Expr::and(
            Expr::lte(Expr::num(BigInt::zero()), Expr::id("v")),
            Expr::lte(Expr::id("v"), Expr::num(BigInt::from(255))),
        );
        assert_eq!(cond, expected);
    }

    #[test]
    fn range_condition_signed() {
        let env = GlobalEnv::new();
        let options = Options::default();
        let ctx = ctx_with(&env, &options);
        let cond = range_condition(&ctx, &Expr::id("v"), &Type::int(8), Bounds::Both).unwrap();
        let expected = Expr::and(
            Expr::lte(Expr::num(BigInt::from(-128)), Expr::id("v")),
            Expr::lte(Expr::id("v"), Expr::num(BigInt::from(127))),
        );
        assert_eq!(cond, expected);
    }

    #[test]
    fn no_range_condition_in_bv_mode() {
        let env = GlobalEnv::new();
        let options = Options {
            encoding: ArithEncoding::Bv,
            ..Options::default()
        };
        let ctx = ctx_with(&env, &options);
        assert!(range_condition(&ctx, &Expr::id("v"), &Type::uint(8), Bounds::Both).is_none());
    }

    #[test]
    fn literal_exponent_expands_to_products() {
        let env = GlobalEnv::new();
        let options = Options::default();
        let mut ctx = ctx_with(&env, &options);
        let node = env.new_node(Type::uint(256));
        let enc = encode_binary(
            &mut ctx,
            node,
            BinOp::Exp,
            Expr::id("a"),
            Expr::num(BigInt::from(3)),
            256,
            false,
        );
        let expected = Expr::mul(Expr::mul(Expr::id("a"), Expr::id("a")), Expr::id("a"));
        assert_eq!(enc.expr, expected);
    }

    #[test]
    fn non_literal_exponent_is_rejected() {
        let env = GlobalEnv::new();
        let options = Options::default();
        let mut ctx = ctx_with(&env, &options);
        let node = env.new_node(Type::uint(256));
        let enc = encode_binary(
            &mut ctx,
            node,
            BinOp::Exp,
            Expr::id("a"),
            Expr::id("b"),
            256,
            false,
        );
        assert!(enc.expr.is_error());
        assert!(env.has_errors());
    }
}
