// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Lowering of resolved contracts into a Boogie verification program.
//!
//! The pipeline runs over a populated [`contract_model::env::GlobalEnv`]:
//! every contract's state variables become per-address global maps, every
//! function becomes a procedure, and expressions lower through the selected
//! arithmetic encoding with their range and overflow side conditions
//! discharged at statement level. Diagnostics accumulate in the
//! environment; the generated program is only usable when it reports no
//! errors.

use anyhow::bail;
use log::{debug, info};

use boogie_ast::Decl;
use contract_model::{code_writer::CodeWriter, env::GlobalEnv};

pub mod arith;
pub mod assign;
pub mod conditions;
pub mod context;
pub mod exprs;
pub mod functions;
pub mod options;
pub mod storage;

use crate::{context::TranslationContext, options::Options};

/// Translates the whole program into a list of Boogie declarations.
/// Errors are reported into the environment; functions that fail keep a
/// havoc stub so the rest of the program is still produced.
pub fn translate_program(env: &GlobalEnv, options: &Options) -> Vec<Decl> {
    let mut ctx = TranslationContext::new(env, options);
    for contract in env.contract_ids() {
        debug!(
            "translating contract `{}`",
            env.contract_data(contract).name
        );
        functions::translate_contract(&mut ctx, contract);
    }
    let mut decls = ctx.into_program();
    fix_modifies(&mut decls);
    decls
}

/// Every procedure may touch every global variable, directly or through a
/// call, so the modifies clauses are filled in one pass at the end, after
/// all lazily created globals exist.
fn fix_modifies(decls: &mut [Decl]) {
    let globals: Vec<String> = decls
        .iter()
        .filter_map(|d| match d {
            Decl::Var { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    for decl in decls {
        if let Decl::Proc(proc) = decl {
            proc.modifies = globals.clone();
        }
    }
}

/// Pretty-prints a translated program.
pub fn print_program(decls: &[Decl]) -> String {
    let writer = CodeWriter::new();
    for decl in decls {
        decl.write(&writer);
    }
    writer.extract_result()
}

/// Translates and prints; fails when the translation reported errors.
pub fn generate(env: &GlobalEnv, options: &Options) -> anyhow::Result<String> {
    let decls = translate_program(env, options);
    if env.has_errors() {
        bail!("translation failed with {} error(s)", env.error_count());
    }
    info!("generated {} declaration(s)", decls.len());
    Ok(print_program(&decls))
}
