// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pending side conditions collected while translating expressions, to be
//! discharged by the statement translator.

use boogie_ast::Expr;

/// What a pending condition means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// Type-checking condition: the value is within its declared range.
    /// Discharged as an assumption.
    TypeChecking,
    /// Overflow condition: true iff the fixed-width operation was faithful.
    /// Discharged as a proof obligation (or assumed, when overflow checking
    /// is off).
    Overflow,
}

/// Conditions attached to a translated expression.
#[derive(Debug, Clone, Default)]
pub struct ConditionStore {
    tccs: Vec<Expr>,
    ocs: Vec<Expr>,
}

impl ConditionStore {
    pub fn new() -> ConditionStore {
        Default::default()
    }

    pub fn add(&mut self, kind: ConditionKind, cond: Expr) {
        match kind {
            ConditionKind::TypeChecking => {
                if !self.tccs.contains(&cond) {
                    self.tccs.push(cond)
                }
            }
            ConditionKind::Overflow => {
                if !self.ocs.contains(&cond) {
                    self.ocs.push(cond)
                }
            }
        }
    }

    pub fn add_tcc(&mut self, cond: Expr) {
        self.add(ConditionKind::TypeChecking, cond);
    }

    pub fn add_oc(&mut self, cond: Expr) {
        self.add(ConditionKind::Overflow, cond);
    }

    pub fn tccs(&self) -> &[Expr] {
        &self.tccs
    }

    pub fn ocs(&self) -> &[Expr] {
        &self.ocs
    }

    pub fn extend(&mut self, other: ConditionStore) {
        for c in other.tccs {
            self.add_tcc(c);
        }
        for c in other.ocs {
            self.add_oc(c);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tccs.is_empty() && self.ocs.is_empty()
    }
}
