// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Contains source-language types and related functions.

use std::fmt;

use num::BigUint;

use crate::env::GlobalEnv;

/// Index of a contract in the environment, in declaration order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct ContractId(pub usize);

/// Index of a struct definition in the environment.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct StructId(pub usize);

/// Index of an enum definition in the environment.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct EnumId(pub usize);

/// Index of a function or constructor in the environment.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct FunId(pub usize);

/// Index of a modifier definition in the environment.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct ModifierId(pub usize);

/// Index of an event definition in the environment.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct EventId(pub usize);

/// Index of a variable declaration (state variable, parameter, return
/// variable or local) in the environment.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct DeclId(pub usize);

/// Where the data of a reference type lives.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub enum DataLocation {
    Storage,
    Memory,
    Calldata,
}

impl fmt::Display for DataLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLocation::Storage => f.write_str("storage"),
            DataLocation::Memory => f.write_str("memory"),
            DataLocation::Calldata => f.write_str("calldata"),
        }
    }
}

/// Represents a resolved source type. Reference types carry their data
/// location and whether the value is a pointer (a re-bindable reference,
/// e.g. a storage-typed local) or the referenced slot itself.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum Type {
    Bool,
    /// Fixed-width integer.
    Int { bits: u16, signed: bool },
    Address,
    Enum(EnumId),
    Struct {
        id: StructId,
        loc: DataLocation,
        ptr: bool,
    },
    Array {
        elem: Box<Type>,
        /// `None` for dynamically sized arrays.
        len: Option<BigUint>,
        loc: DataLocation,
        ptr: bool,
    },
    /// Mappings always live in storage; a mapping-typed local is a pointer.
    Mapping(Box<Type>, Box<Type>),
    Tuple(Vec<Type>),
    /// Result of a failed resolution; accepted everywhere to avoid cascades.
    Error,
}

impl Type {
    pub fn uint(bits: u16) -> Type {
        Type::Int { bits, signed: false }
    }

    pub fn int(bits: u16) -> Type {
        Type::Int { bits, signed: true }
    }

    /// Returns true for struct, array and mapping types.
    pub fn is_reference_type(&self) -> bool {
        matches!(
            self,
            Type::Struct { .. } | Type::Array { .. } | Type::Mapping(..)
        )
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Type::Int { .. })
    }

    /// The data location, for reference types.
    pub fn data_location(&self) -> Option<DataLocation> {
        match self {
            Type::Struct { loc, .. } | Type::Array { loc, .. } => Some(*loc),
            Type::Mapping(..) => Some(DataLocation::Storage),
            _ => None,
        }
    }

    /// Whether this is a pointer into storage (a local storage reference).
    /// Mapping-typed values outside a storage slot are always pointers.
    pub fn is_storage_ptr(&self) -> bool {
        match self {
            Type::Struct { loc, ptr, .. } | Type::Array { loc, ptr, .. } => {
                *loc == DataLocation::Storage && *ptr
            }
            Type::Mapping(..) => true,
            _ => false,
        }
    }

    /// Whether this denotes an actual storage slot (not a pointer).
    pub fn is_storage_slot(&self) -> bool {
        match self {
            Type::Struct { loc, ptr, .. } | Type::Array { loc, ptr, .. } => {
                *loc == DataLocation::Storage && !*ptr
            }
            _ => false,
        }
    }

    pub fn stored_in(&self, location: DataLocation) -> bool {
        self.data_location() == Some(location)
    }

    /// The same type re-homed to the given location/pointer-ness. Identity
    /// for value types.
    pub fn with_location(&self, loc: DataLocation, ptr: bool) -> Type {
        match self {
            Type::Struct { id, .. } => Type::Struct { id: *id, loc, ptr },
            Type::Array { elem, len, .. } => Type::Array {
                elem: elem.clone(),
                len: len.clone(),
                loc,
                ptr,
            },
            _ => self.clone(),
        }
    }

    pub fn display<'a>(&'a self, env: &'a GlobalEnv) -> TypeDisplay<'a> {
        TypeDisplay { ty: self, env }
    }
}

/// Helper for type displays.
pub struct TypeDisplay<'a> {
    ty: &'a Type,
    env: &'a GlobalEnv,
}

impl<'a> fmt::Display for TypeDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Type::*;
        match self.ty {
            Bool => f.write_str("bool"),
            Int { bits, signed } => {
                write!(f, "{}int{}", if *signed { "" } else { "u" }, bits)
            }
            Address => f.write_str("address"),
            Enum(id) => write!(f, "enum {}", self.env.enum_data(*id).name),
            Struct { id, loc, ptr } => write!(
                f,
                "struct {} {}{}",
                self.env.struct_data(*id).name,
                loc,
                if *ptr { " pointer" } else { "" }
            ),
            Array { elem, len, loc, .. } => {
                write!(f, "{}[", elem.display(self.env))?;
                if let Some(n) = len {
                    write!(f, "{}", n)?;
                }
                write!(f, "] {}", loc)
            }
            Mapping(k, v) => write!(
                f,
                "mapping({} => {})",
                k.display(self.env),
                v.display(self.env)
            ),
            Tuple(ts) => {
                f.write_str("(")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", t.display(self.env))?;
                }
                f.write_str(")")
            }
            Error => f.write_str("?error"),
        }
    }
}
