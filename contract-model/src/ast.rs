// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resolved expression and statement AST of the contract language, as
//! produced by the front end. Every node carries a `NodeId`; the node's type
//! and source location are kept in the environment's node maps.

use num::BigInt;

use crate::ty::{DeclId, EnumId, EventId, FunId, StructId};

/// Id of an AST node, used to associate type and location information.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct NodeId(pub usize);

/// Unary operators.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnOp {
    Not,
    Neg,
    BitNot,
    /// `++x` / `--x`
    PreInc,
    PreDec,
    /// `x++` / `x--`
    PostInc,
    PostDec,
}

/// Binary operators.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        use BinOp::*;
        matches!(self, Eq | Neq | Lt | Gt | Le | Ge)
    }

    pub fn is_bitwise(self) -> bool {
        use BinOp::*;
        matches!(self, BitAnd | BitOr | BitXor | Shl | Shr)
    }
}

/// Assignment operators; compound forms carry the arithmetic operator.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AssignOp {
    Assign,
    Compound(BinOp),
}

/// What a member access resolves to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MemberRef {
    /// Field of a struct, by declaration index.
    Field(StructId, usize),
    /// Member of an enum, by declaration index.
    EnumValue(EnumId, usize),
    /// `<array>.length`
    ArrayLength,
    /// `<address>.balance`
    Balance,
}

/// A resolved expression.
#[derive(Debug, Clone)]
pub enum Expr {
    BoolLit(NodeId, bool),
    NumberLit(NodeId, BigInt),
    /// Reference to a declared variable (state variable, parameter, local).
    Ident(NodeId, DeclId),
    This(NodeId),
    MsgSender(NodeId),
    MsgValue(NodeId),
    Member {
        id: NodeId,
        base: Box<Expr>,
        member: MemberRef,
    },
    Index {
        id: NodeId,
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        id: NodeId,
        op: UnOp,
        sub: Box<Expr>,
    },
    Binary {
        id: NodeId,
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        id: NodeId,
        cond: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    Assign {
        id: NodeId,
        op: AssignOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Tuple expression; components can be empty as in `(x, , y)`.
    Tuple {
        id: NodeId,
        components: Vec<Option<Expr>>,
    },
    Call {
        id: NodeId,
        fun: FunId,
        args: Vec<Expr>,
    },
    /// Allocation of a fresh memory struct, `StructName(arg, ...)`.
    NewStruct {
        id: NodeId,
        struct_id: StructId,
        args: Vec<Expr>,
    },
    /// Allocation of a fresh memory array, `new T[](len)`.
    NewArray {
        id: NodeId,
        len: Box<Expr>,
    },
    /// Running total over an integer array/mapping; only valid inside
    /// annotations. Maintained incrementally through a shadow variable.
    Sum {
        id: NodeId,
        base: Box<Expr>,
    },
}

impl Expr {
    pub fn node_id(&self) -> NodeId {
        use Expr::*;
        match self {
            BoolLit(id, _)
            | NumberLit(id, _)
            | Ident(id, _)
            | This(id)
            | MsgSender(id)
            | MsgValue(id)
            | Member { id, .. }
            | Index { id, .. }
            | Unary { id, .. }
            | Binary { id, .. }
            | Conditional { id, .. }
            | Assign { id, .. }
            | Tuple { id, .. }
            | Call { id, .. }
            | NewStruct { id, .. }
            | NewArray { id, .. }
            | Sum { id, .. } => *id,
        }
    }

    /// The root identifier of a member/index selector chain, if any.
    pub fn root_ident(&self) -> Option<DeclId> {
        match self {
            Expr::Ident(_, decl) => Some(*decl),
            Expr::Member { base, .. } | Expr::Index { base, .. } => base.root_ident(),
            _ => None,
        }
    }
}

/// A resolved statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        is_do_while: bool,
        invariants: Vec<Expr>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Box<Stmt>,
        invariants: Vec<Expr>,
    },
    Continue,
    Break,
    Return(NodeId, Option<Expr>),
    /// `revert()` / `throw`: no successful execution passes this point.
    Throw,
    /// Declaration of locals, possibly with a (tuple) initializer.
    VarDecl {
        decls: Vec<Option<DeclId>>,
        init: Option<Expr>,
    },
    ExprStmt(Expr),
    /// `emit E(args)`.
    Emit {
        id: NodeId,
        event: EventId,
        args: Vec<Expr>,
    },
    /// The `_` placeholder inside a modifier body.
    Placeholder,
}
