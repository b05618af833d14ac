// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Resolved model of an annotated contract program. This crate is the narrow
//! interface between the front end (parsing, name/type resolution, doc-comment
//! annotation extraction) and the Boogie generator: declarations in source
//! declaration order, a resolved expression/statement AST, node types and
//! locations, and the shared diagnostics environment.

pub mod ast;
pub mod code_writer;
pub mod env;
pub mod ty;
