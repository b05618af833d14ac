// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Boogie top-level declarations and types.

use std::fmt;

use itertools::Itertools;

use contract_model::{code_writer::CodeWriter, emit, emitln};

use crate::{expr::Expr, stmt::Block};

/// A Boogie type.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum BType {
    Bool,
    Int,
    Bv(u16),
    Map(Box<BType>, Box<BType>),
    Named(String),
}

impl BType {
    pub fn map(key: BType, value: BType) -> BType {
        BType::Map(Box::new(key), Box::new(value))
    }

    pub fn named(name: impl Into<String>) -> BType {
        BType::Named(name.into())
    }
}

impl fmt::Display for BType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BType::Bool => f.write_str("bool"),
            BType::Int => f.write_str("int"),
            BType::Bv(bits) => write!(f, "bv{}", bits),
            BType::Map(k, v) => write!(f, "[{}]{}", k, v),
            BType::Named(name) => f.write_str(name),
        }
    }
}

/// Value of an attribute.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AttrValue {
    Str(String),
    Num(i64),
}

/// An attribute `{:name value, ...}` on a declaration, statement or spec.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<AttrValue>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Attribute {
        Attribute {
            name: name.into(),
            values: vec![],
        }
    }

    pub fn with_str(name: impl Into<String>, value: impl Into<String>) -> Attribute {
        Attribute {
            name: name.into(),
            values: vec![AttrValue::Str(value.into())],
        }
    }

    pub fn with_num(name: impl Into<String>, value: i64) -> Attribute {
        Attribute {
            name: name.into(),
            values: vec![AttrValue::Num(value)],
        }
    }

    /// Prints a list of attributes followed by a space, or nothing.
    pub fn print_all(attrs: &[Attribute]) -> String {
        if attrs.is_empty() {
            return String::new();
        }
        format!("{} ", attrs.iter().map(|a| a.to_string()).join(" "))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{:{}", self.name)?;
        for (i, v) in self.values.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            match v {
                AttrValue::Str(s) => write!(f, "\"{}\"", s)?,
                AttrValue::Num(n) => write!(f, "{}", n)?,
            }
        }
        f.write_str("}")
    }
}

/// A requires/ensures/invariant clause.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Specification {
    pub cond: Expr,
    pub attrs: Vec<Attribute>,
}

impl Specification {
    pub fn new(cond: Expr, attrs: Vec<Attribute>) -> Specification {
        Specification { cond, attrs }
    }
}

/// A procedure: parameters, returns, local declarations, a body, and its
/// specification.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ProcDecl {
    pub name: String,
    pub params: Vec<(String, BType)>,
    pub returns: Vec<(String, BType)>,
    pub locals: Vec<(String, BType)>,
    pub body: Block,
    pub requires: Vec<Specification>,
    pub ensures: Vec<Specification>,
    pub modifies: Vec<String>,
    pub attrs: Vec<Attribute>,
}

impl ProcDecl {
    pub fn new(name: impl Into<String>) -> ProcDecl {
        ProcDecl {
            name: name.into(),
            params: vec![],
            returns: vec![],
            locals: vec![],
            body: Block::new(),
            requires: vec![],
            ensures: vec![],
            modifies: vec![],
            attrs: vec![],
        }
    }
}

/// A top-level declaration of the generated program.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Decl {
    Comment(String),
    /// `type name;` or `type name = alias;`
    TypeAlias {
        name: String,
        alias: Option<BType>,
    },
    /// `type {:datatype} name;` plus a `{:constructor}` function over the
    /// members. Member selectors are the member names.
    DataType {
        name: String,
        constructor: String,
        members: Vec<(String, BType)>,
    },
    Const {
        name: String,
        ty: BType,
        unique: bool,
    },
    Var {
        name: String,
        ty: BType,
        attrs: Vec<Attribute>,
    },
    Func {
        name: String,
        params: Vec<(String, BType)>,
        result: BType,
        body: Option<Expr>,
        attrs: Vec<Attribute>,
    },
    Axiom(Expr),
    Proc(ProcDecl),
}

impl Decl {
    pub fn write(&self, w: &CodeWriter) {
        match self {
            Decl::Comment(text) => emitln!(w, "// {}", text),
            Decl::TypeAlias { name, alias } => match alias {
                Some(alias) => emitln!(w, "type {} = {};", name, alias),
                None => emitln!(w, "type {};", name),
            },
            Decl::DataType {
                name,
                constructor,
                members,
            } => {
                emitln!(w, "type {{:datatype}} {};", name);
                emitln!(
                    w,
                    "function {{:constructor}} {}({}): {};",
                    constructor,
                    members
                        .iter()
                        .map(|(n, t)| format!("{}: {}", n, t))
                        .join(", "),
                    name
                );
            }
            Decl::Const { name, ty, unique } => {
                emitln!(
                    w,
                    "const {}{}: {};",
                    if *unique { "unique " } else { "" },
                    name,
                    ty
                )
            }
            Decl::Var { name, ty, attrs } => {
                emitln!(w, "var {}{}: {};", Attribute::print_all(attrs), name, ty)
            }
            Decl::Func {
                name,
                params,
                result,
                body,
                attrs,
            } => {
                emit!(
                    w,
                    "function {}{}({}): {}",
                    Attribute::print_all(attrs),
                    name,
                    params
                        .iter()
                        .map(|(n, t)| format!("{}: {}", n, t))
                        .join(", "),
                    result
                );
                match body {
                    Some(body) => emitln!(w, " {{ {} }}", body),
                    None => emitln!(w, ";"),
                }
            }
            Decl::Axiom(e) => emitln!(w, "axiom {};", e),
            Decl::Proc(proc) => Self::write_proc(proc, w),
        }
    }

    fn write_proc(proc: &ProcDecl, w: &CodeWriter) {
        let bindings = |params: &[(String, BType)]| {
            params
                .iter()
                .map(|(n, t)| format!("{}: {}", n, t))
                .join(", ")
        };
        emit!(
            w,
            "procedure {}{}({})",
            Attribute::print_all(&proc.attrs),
            proc.name,
            bindings(&proc.params)
        );
        if !proc.returns.is_empty() {
            emit!(w, " returns ({})", bindings(&proc.returns));
        }
        emitln!(w);
        w.indent();
        if !proc.modifies.is_empty() {
            emitln!(w, "modifies {};", proc.modifies.iter().join(", "));
        }
        for spec in &proc.requires {
            emitln!(
                w,
                "requires {}{};",
                Attribute::print_all(&spec.attrs),
                spec.cond
            );
        }
        for spec in &proc.ensures {
            emitln!(
                w,
                "ensures {}{};",
                Attribute::print_all(&spec.attrs),
                spec.cond
            );
        }
        w.unindent();
        emitln!(w, "{{");
        w.indent();
        for (name, ty) in &proc.locals {
            emitln!(w, "var {}: {};", name, ty);
        }
        w.unindent();
        proc.body.write_indented(w);
        emitln!(w, "}}");
        emitln!(w);
    }
}
