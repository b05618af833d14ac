// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Boogie statements and statement blocks.

use itertools::Itertools;

use contract_model::{code_writer::CodeWriter, emitln};

use crate::{
    decl::{Attribute, Specification},
    expr::Expr,
};

/// A Boogie statement.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Stmt {
    Comment(String),
    Assert {
        cond: Expr,
        attrs: Vec<Attribute>,
    },
    Assume {
        cond: Expr,
    },
    Assign {
        lhs: Expr,
        rhs: Expr,
    },
    Havoc {
        vars: Vec<String>,
    },
    Goto {
        targets: Vec<String>,
    },
    Label(String),
    Call {
        proc: String,
        args: Vec<Expr>,
        returns: Vec<String>,
    },
    Return,
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        /// `None` stands for `while (*)`.
        cond: Option<Expr>,
        body: Block,
        invariants: Vec<Specification>,
    },
    Break,
}

impl Stmt {
    pub fn comment(text: impl Into<String>) -> Stmt {
        Stmt::Comment(text.into())
    }

    pub fn assert(cond: Expr, attrs: Vec<Attribute>) -> Stmt {
        Stmt::Assert { cond, attrs }
    }

    pub fn assume(cond: Expr) -> Stmt {
        Stmt::Assume { cond }
    }

    pub fn assign(lhs: Expr, rhs: Expr) -> Stmt {
        Stmt::Assign { lhs, rhs }
    }

    pub fn havoc(vars: Vec<String>) -> Stmt {
        Stmt::Havoc { vars }
    }

    pub fn goto(targets: Vec<String>) -> Stmt {
        Stmt::Goto { targets }
    }

    pub fn label(name: impl Into<String>) -> Stmt {
        Stmt::Label(name.into())
    }

    pub fn call(proc: impl Into<String>, args: Vec<Expr>, returns: Vec<String>) -> Stmt {
        Stmt::Call {
            proc: proc.into(),
            args,
            returns,
        }
    }

    pub fn if_else(cond: Expr, then_block: Block, else_block: Option<Block>) -> Stmt {
        Stmt::If {
            cond,
            then_block,
            else_block,
        }
    }

    pub fn while_(cond: Option<Expr>, body: Block, invariants: Vec<Specification>) -> Stmt {
        Stmt::While {
            cond,
            body,
            invariants,
        }
    }

    pub fn write(&self, w: &CodeWriter) {
        match self {
            Stmt::Comment(text) => emitln!(w, "// {}", text),
            Stmt::Assert { cond, attrs } => {
                emitln!(w, "assert {}{};", Attribute::print_all(attrs), cond)
            }
            Stmt::Assume { cond } => emitln!(w, "assume {};", cond),
            Stmt::Assign { lhs, rhs } => emitln!(w, "{} := {};", lhs, rhs),
            Stmt::Havoc { vars } => emitln!(w, "havoc {};", vars.iter().join(", ")),
            Stmt::Goto { targets } => emitln!(w, "goto {};", targets.iter().join(", ")),
            Stmt::Label(name) => emitln!(w, "{}:", name),
            Stmt::Call {
                proc,
                args,
                returns,
            } => {
                if returns.is_empty() {
                    emitln!(
                        w,
                        "call {}({});",
                        proc,
                        args.iter().map(|a| a.to_string()).join(", ")
                    )
                } else {
                    emitln!(
                        w,
                        "call {} := {}({});",
                        returns.iter().join(", "),
                        proc,
                        args.iter().map(|a| a.to_string()).join(", ")
                    )
                }
            }
            Stmt::Return => emitln!(w, "return;"),
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                emitln!(w, "if ({}) {{", cond);
                then_block.write_indented(w);
                if let Some(else_block) = else_block {
                    emitln!(w, "}} else {{");
                    else_block.write_indented(w);
                }
                emitln!(w, "}}");
            }
            Stmt::While {
                cond,
                body,
                invariants,
            } => {
                match cond {
                    Some(cond) => emitln!(w, "while ({})", cond),
                    None => emitln!(w, "while (*)"),
                }
                w.indent();
                for inv in invariants {
                    emitln!(
                        w,
                        "invariant {}{};",
                        Attribute::print_all(&inv.attrs),
                        inv.cond
                    );
                }
                w.unindent();
                emitln!(w, "{{");
                body.write_indented(w);
                emitln!(w, "}}");
            }
            Stmt::Break => emitln!(w, "break;"),
        }
    }
}

/// A sequence of statements.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new() -> Block {
        Block { stmts: vec![] }
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    pub fn extend(&mut self, stmts: impl IntoIterator<Item = Stmt>) {
        self.stmts.extend(stmts);
    }

    pub fn write_indented(&self, w: &CodeWriter) {
        w.indent();
        for stmt in &self.stmts {
            stmt.write(w);
        }
        w.unindent();
    }
}
