// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Closed AST for the generated Boogie program: expressions, statements and
//! declarations, one variant per node kind, with exhaustive matching at every
//! consumer. Printing goes through `contract_model::code_writer::CodeWriter`.

pub mod decl;
pub mod expr;
pub mod stmt;

pub use decl::{Attribute, BType, Decl, ProcDecl, Specification};
pub use expr::{BinOp, Expr};
pub use stmt::{Block, Stmt};
