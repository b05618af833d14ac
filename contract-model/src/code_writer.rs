// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! A helper for emitting indented code. Use via the `emit!` and `emitln!`
//! macros.

use std::cell::RefCell;

const INDENT: usize = 4;

/// A code writer which accumulates output and tracks the current indentation
/// level. Interior mutability so it can be shared by reference between
/// translator layers.
pub struct CodeWriter {
    output: RefCell<String>,
    indent: RefCell<usize>,
}

impl CodeWriter {
    pub fn new() -> Self {
        CodeWriter {
            output: RefCell::new(String::new()),
            indent: RefCell::new(0),
        }
    }

    pub fn indent(&self) {
        *self.indent.borrow_mut() += INDENT;
    }

    pub fn unindent(&self) {
        let mut indent = self.indent.borrow_mut();
        debug_assert!(*indent >= INDENT);
        *indent -= INDENT;
    }

    /// Emits a string, inserting the current indentation after each newline.
    pub fn emit(&self, s: &str) {
        let mut output = self.output.borrow_mut();
        for (i, line) in s.split('\n').enumerate() {
            if i > 0 {
                output.push('\n');
            }
            if !line.is_empty() && (output.is_empty() || output.ends_with('\n')) {
                output.push_str(&" ".repeat(*self.indent.borrow()));
            }
            output.push_str(line);
        }
    }

    pub fn emit_line(&self, s: &str) {
        self.emit(s);
        self.emit("\n");
    }

    /// Extracts the accumulated output, consuming the writer.
    pub fn extract_result(self) -> String {
        self.output.into_inner()
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[macro_export]
macro_rules! emit {
    ($w:expr, $($args:tt)*) => {
        $w.emit(&format!($($args)*))
    };
}

#[macro_export]
macro_rules! emitln {
    ($w:expr) => {
        $w.emit_line("")
    };
    ($w:expr, $($args:tt)*) => {
        $w.emit_line(&format!($($args)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indents_nested_lines() {
        let w = CodeWriter::new();
        emitln!(w, "procedure p()");
        emitln!(w, "{{");
        w.indent();
        emitln!(w, "x := {};", 1);
        w.unindent();
        emitln!(w, "}}");
        assert_eq!(w.extract_result(), "procedure p()\n{\n    x := 1;\n}\n");
    }
}
