// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// The arithmetic encoding used for fixed-width integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithEncoding {
    /// Unbounded mathematical integers; overflow is not modeled.
    Int,
    /// Fixed-width bit-vectors; exact by construction.
    Bv,
    /// Unbounded compute with wraparound fold; exact, and overflow
    /// detectable through correctness conditions.
    Mod,
}

/// Generator options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Arithmetic encoding for fixed-width integers.
    pub encoding: ArithEncoding,
    /// Whether to check for overflows (modular encoding only). When off,
    /// correctness conditions are assumed instead of asserted.
    pub overflow: bool,
    /// Whether to add contract invariants to loops as well.
    pub invariants_on_loops: bool,
}

impl Options {
    pub fn bv_encoding(&self) -> bool {
        self.encoding == ArithEncoding::Bv
    }

    pub fn mod_encoding(&self) -> bool {
        self.encoding == ArithEncoding::Mod
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            encoding: ArithEncoding::Int,
            overflow: false,
            invariants_on_loops: false,
        }
    }
}
