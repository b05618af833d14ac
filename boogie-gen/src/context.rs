// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared translation context: output program accumulator, memoized global
//! declaration table (bit-vector builtins, struct and array types, member
//! heaps, sum shadow variables), builtin globals, fresh names, and the
//! current contract/scope cursor.
//!
//! The declaration table is append-only and keyed by structural identity:
//! encountering the same type twice always resolves to the same declaration.

use std::collections::BTreeMap;

use num::{BigInt, BigUint};

use boogie_ast::{Attribute, BType, Decl, Expr};
use contract_model::{
    ast::NodeId,
    env::{DeclKind, GlobalEnv, Loc},
    ty::{ContractId, DataLocation, DeclId, EventId, FunId, StructId, Type},
};

use crate::options::Options;

/// Name of the receiver address parameter of every procedure.
pub const THIS: &str = "$this";
/// Name of the transaction sender parameter.
pub const MSG_SENDER: &str = "$msg_sender";
/// Name of the transaction value parameter.
pub const MSG_VALUE: &str = "$msg_value";
/// Global balance map.
pub const BALANCE: &str = "$balance";
/// Global allocation counter for fresh memory pointers.
pub const ALLOC_COUNTER: &str = "$alloc";
/// Global flag tracking whether an overflow has occurred.
pub const OVERFLOW_FLAG: &str = "$overflow";
/// Type of packed local storage pointers.
pub const STOR_PTR_TYPE: &str = "$storptr";
/// Base value packed pointers are built from by successive updates.
pub const NULL_PTR: &str = "$nullptr";
/// Type of memory pointers.
pub const MEM_PTR_TYPE: &str = "$memptr";

/// Memoized information about the Boogie representation of an array type.
#[derive(Debug, Clone)]
pub struct ArrayTypeInfo {
    pub type_name: String,
    pub constructor: String,
    /// Selector for the inner `[int]T` map.
    pub inner_sel: String,
    /// Selector for the length field.
    pub length_sel: String,
}

pub struct TranslationContext<'env> {
    pub env: &'env GlobalEnv,
    pub options: &'env Options,
    /// The generated program, in emission order.
    decls: Vec<Decl>,
    bv_builtins: BTreeMap<(&'static str, u16), String>,
    ext_builtins: BTreeMap<(u16, u16, bool), String>,
    storage_struct_types: BTreeMap<StructId, (String, String)>,
    mem_struct_types: BTreeMap<StructId, String>,
    /// Heap variable per memory struct field.
    mem_field_heaps: BTreeMap<DeclId, String>,
    array_types: BTreeMap<BType, ArrayTypeInfo>,
    mem_array_heaps: BTreeMap<BType, String>,
    sum_shadows: BTreeMap<DeclId, String>,
    current_contract: Option<ContractId>,
    /// Naming scopes pushed while inlining modifier bodies, so that locals
    /// of different inlined bodies cannot collide.
    extra_scopes: Vec<usize>,
}

impl<'env> TranslationContext<'env> {
    pub fn new(env: &'env GlobalEnv, options: &'env Options) -> Self {
        let mut ctx = TranslationContext {
            env,
            options,
            decls: vec![],
            bv_builtins: BTreeMap::new(),
            ext_builtins: BTreeMap::new(),
            storage_struct_types: BTreeMap::new(),
            mem_struct_types: BTreeMap::new(),
            mem_field_heaps: BTreeMap::new(),
            array_types: BTreeMap::new(),
            mem_array_heaps: BTreeMap::new(),
            sum_shadows: BTreeMap::new(),
            current_contract: None,
            extra_scopes: vec![],
        };
        ctx.add_prelude();
        ctx
    }

    fn add_prelude(&mut self) {
        self.add_decl(Decl::Comment("Builtin declarations".to_string()));
        self.add_decl(Decl::TypeAlias {
            name: "address".to_string(),
            alias: Some(BType::Int),
        });
        self.add_decl(Decl::TypeAlias {
            name: MEM_PTR_TYPE.to_string(),
            alias: Some(BType::Int),
        });
        self.add_decl(Decl::TypeAlias {
            name: STOR_PTR_TYPE.to_string(),
            alias: Some(BType::map(BType::Int, BType::Int)),
        });
        self.add_decl(Decl::Const {
            name: NULL_PTR.to_string(),
            ty: BType::named(STOR_PTR_TYPE),
            unique: false,
        });
        self.add_decl(Decl::Var {
            name: BALANCE.to_string(),
            ty: BType::map(BType::named("address"), self.int_btype(256)),
            attrs: vec![],
        });
        self.add_decl(Decl::Var {
            name: ALLOC_COUNTER.to_string(),
            ty: BType::named(MEM_PTR_TYPE),
            attrs: vec![],
        });
        if self.options.overflow {
            self.add_decl(Decl::Var {
                name: OVERFLOW_FLAG.to_string(),
                ty: BType::Bool,
                attrs: vec![],
            });
        }
    }

    pub fn add_decl(&mut self, decl: Decl) {
        self.decls.push(decl);
    }

    pub fn into_program(self) -> Vec<Decl> {
        self.decls
    }

    pub fn current_contract(&self) -> Option<ContractId> {
        self.current_contract
    }

    pub fn set_current_contract(&mut self, id: Option<ContractId>) {
        self.current_contract = id;
    }

    // ---------------------------------------------------------------------
    // Names

    /// Maps a declaration to its unique Boogie name. Locals additionally get
    /// the current inlining scopes appended so that the same local inlined
    /// twice gets distinct names.
    pub fn map_decl_name(&self, decl: DeclId) -> String {
        let data = self.env.decl_data(decl);
        let mut name = format!("{}#{}", data.name, decl.0);
        match data.kind {
            DeclKind::Local | DeclKind::Param | DeclKind::Return => {
                for scope in &self.extra_scopes {
                    name = format!("{}#{}", name, scope);
                }
            }
            _ => {}
        }
        name
    }

    pub fn push_extra_scope(&mut self) {
        self.extra_scopes.push(self.env.next_global_id());
    }

    pub fn pop_extra_scope(&mut self) {
        self.extra_scopes.pop();
    }

    /// Replaces the scope stack wholesale; used when control leaves the
    /// inlined modifier chain for the function body proper.
    pub fn swap_extra_scopes(&mut self, scopes: Vec<usize>) -> Vec<usize> {
        std::mem::replace(&mut self.extra_scopes, scopes)
    }

    pub fn fresh_name(&self, prefix: &str) -> String {
        format!("{}#{}", prefix, self.env.next_global_id())
    }

    // ---------------------------------------------------------------------
    // Types

    /// The Boogie type of an integer of the given width under the active
    /// encoding.
    pub fn int_btype(&self, bits: u16) -> BType {
        if self.options.bv_encoding() {
            BType::Bv(bits)
        } else {
            BType::Int
        }
    }

    /// An integer literal under the active encoding.
    pub fn int_lit(&self, value: impl Into<BigInt>, bits: u16) -> Expr {
        let value = value.into();
        if self.options.bv_encoding() {
            let modulus = BigInt::from(1u8) << bits as usize;
            let folded = ((value % &modulus) + &modulus) % &modulus;
            Expr::bv(
                folded.to_biguint().unwrap_or_else(BigUint::default),
                bits,
            )
        } else {
            Expr::num(value)
        }
    }

    /// Maps a source type to its Boogie representation, creating auxiliary
    /// declarations on first use.
    pub fn to_btype(&mut self, ty: &Type) -> BType {
        match ty {
            Type::Bool => BType::Bool,
            Type::Int { bits, .. } => self.int_btype(*bits),
            Type::Address => BType::named("address"),
            // Enum values are integers; their range is enforced separately.
            Type::Enum(_) => self.int_btype(256),
            Type::Struct { id, loc, ptr } => match loc {
                DataLocation::Storage => {
                    if *ptr {
                        BType::named(STOR_PTR_TYPE)
                    } else {
                        let (name, _) = self.storage_struct(*id);
                        BType::Named(name)
                    }
                }
                DataLocation::Memory | DataLocation::Calldata => {
                    self.ensure_mem_struct(*id);
                    BType::named(MEM_PTR_TYPE)
                }
            },
            Type::Array { elem, loc, ptr, .. } => match loc {
                DataLocation::Storage => {
                    if *ptr {
                        BType::named(STOR_PTR_TYPE)
                    } else {
                        let elem_ty = self.to_btype(elem);
                        BType::Named(self.array_type(elem_ty).type_name)
                    }
                }
                DataLocation::Memory | DataLocation::Calldata => {
                    let elem_ty = self.to_btype(elem);
                    self.array_type(elem_ty.clone());
                    self.mem_array_heap(elem_ty);
                    BType::named(MEM_PTR_TYPE)
                }
            },
            Type::Mapping(key, value) => {
                let key = self.to_btype(key);
                let value = self.to_btype(value);
                BType::map(key, value)
            }
            // Tuples never appear as variable types; errors poison to int.
            Type::Tuple(_) | Type::Error => BType::Int,
        }
    }

    /// The storage representation of a struct: a datatype whose members are
    /// the fields with their storage-slot types. Returns (type name,
    /// constructor name).
    pub fn storage_struct(&mut self, id: StructId) -> (String, String) {
        if let Some(found) = self.storage_struct_types.get(&id) {
            return found.clone();
        }
        let data = self.env.struct_data(id);
        let type_name = format!("struct_stor_{}#{}", data.name, id.0);
        let constructor = format!("{}#constr", type_name);
        // Reserve the entry first; member types cannot recursively mention
        // this struct's storage representation in well-formed programs.
        self.storage_struct_types
            .insert(id, (type_name.clone(), constructor.clone()));
        let fields = data.fields.clone();
        let mut members = vec![];
        for field in fields {
            let field_ty = self
                .env
                .decl_data(field)
                .ty
                .with_location(DataLocation::Storage, false);
            let bty = self.to_btype(&field_ty);
            members.push((self.map_decl_name(field), bty));
        }
        self.add_decl(Decl::DataType {
            name: type_name.clone(),
            constructor: constructor.clone(),
            members,
        });
        (type_name, constructor)
    }

    /// Declares the member heaps for a memory struct: one global
    /// `[$memptr]T` variable per field.
    pub fn ensure_mem_struct(&mut self, id: StructId) {
        if self.mem_struct_types.contains_key(&id) {
            return;
        }
        let data = self.env.struct_data(id);
        let type_name = format!("struct_mem_{}#{}", data.name, id.0);
        self.mem_struct_types.insert(id, type_name);
        let fields = self.env.struct_data(id).fields.clone();
        for field in fields {
            let field_ty = self
                .env
                .decl_data(field)
                .ty
                .with_location(DataLocation::Memory, false);
            let bty = self.to_btype(&field_ty);
            let heap = format!("{}#mem", self.map_decl_name(field));
            self.mem_field_heaps.insert(field, heap.clone());
            self.add_decl(Decl::Var {
                name: heap,
                ty: BType::map(BType::named(MEM_PTR_TYPE), bty),
                attrs: vec![],
            });
        }
    }

    /// Heap variable of a memory struct field.
    pub fn mem_field_heap(&mut self, field: DeclId) -> String {
        if let Some(heap) = self.mem_field_heaps.get(&field) {
            return heap.clone();
        }
        if let DeclKind::Field { struct_id, .. } = self.env.decl_data(field).kind {
            self.ensure_mem_struct(struct_id);
        }
        self.mem_field_heaps
            .get(&field)
            .cloned()
            .unwrap_or_else(|| format!("{}#mem", self.map_decl_name(field)))
    }

    /// The datatype representing arrays of the given element type:
    /// an inner `[int]T` map plus a length.
    pub fn array_type(&mut self, elem: BType) -> ArrayTypeInfo {
        if let Some(found) = self.array_types.get(&elem) {
            return found.clone();
        }
        let tag = sanitize_type_name(&elem.to_string());
        let type_name = format!("$arr_{}", tag);
        let info = ArrayTypeInfo {
            type_name: type_name.clone(),
            constructor: format!("{}#constr", type_name),
            inner_sel: format!("inner#{}", tag),
            length_sel: format!("length#{}", tag),
        };
        self.array_types.insert(elem.clone(), info.clone());
        self.add_decl(Decl::DataType {
            name: info.type_name.clone(),
            constructor: info.constructor.clone(),
            members: vec![
                (info.inner_sel.clone(), BType::map(BType::Int, elem)),
                (info.length_sel.clone(), BType::Int),
            ],
        });
        info
    }

    /// The heap mapping memory pointers to array values of the given
    /// element type.
    pub fn mem_array_heap(&mut self, elem: BType) -> String {
        if let Some(found) = self.mem_array_heaps.get(&elem) {
            return found.clone();
        }
        let info = self.array_type(elem.clone());
        let name = format!("$memarr_{}", sanitize_type_name(&elem.to_string()));
        self.mem_array_heaps.insert(elem, name.clone());
        self.add_decl(Decl::Var {
            name: name.clone(),
            ty: BType::map(
                BType::named(MEM_PTR_TYPE),
                BType::Named(info.type_name),
            ),
            attrs: vec![],
        });
        name
    }

    /// Dereferences a memory array pointer to the array value.
    pub fn mem_array(&mut self, ptr: Expr, elem: BType) -> Expr {
        let heap = self.mem_array_heap(elem);
        Expr::sel(Expr::id(heap), ptr)
    }

    /// The inner `[int]T` map of an array value.
    pub fn inner_array(&mut self, arr: Expr, elem: BType) -> Expr {
        let info = self.array_type(elem);
        Expr::dtsel(arr, info.inner_sel)
    }

    /// The length field of an array value.
    pub fn array_length(&mut self, arr: Expr, elem: BType) -> Expr {
        let info = self.array_type(elem);
        Expr::dtsel(arr, info.length_sel)
    }

    // ---------------------------------------------------------------------
    // Bit-vector builtins

    /// Returns the name of the `:bvbuiltin` function for the given SMT
    /// operation at the given width, declaring it on first use.
    pub fn bv_builtin(&mut self, smt_op: &'static str, bits: u16, returns_bool: bool) -> String {
        if let Some(name) = self.bv_builtins.get(&(smt_op, bits)) {
            return name.clone();
        }
        let name = format!("${}.{}", smt_op, bits);
        self.bv_builtins.insert((smt_op, bits), name.clone());
        let result = if returns_bool {
            BType::Bool
        } else {
            BType::Bv(bits)
        };
        let params = if smt_op == "bvneg" || smt_op == "bvnot" {
            vec![("p1".to_string(), BType::Bv(bits))]
        } else {
            vec![
                ("p1".to_string(), BType::Bv(bits)),
                ("p2".to_string(), BType::Bv(bits)),
            ]
        };
        self.add_decl(Decl::Func {
            name: name.clone(),
            params,
            result,
            body: None,
            attrs: vec![Attribute::with_str("bvbuiltin", smt_op)],
        });
        name
    }

    /// The `:bvbuiltin` extension function widening `from` bits to `to`
    /// bits, zero- or sign-extending according to `signed`.
    pub fn ext_builtin(&mut self, from: u16, to: u16, signed: bool) -> String {
        if let Some(name) = self.ext_builtins.get(&(from, to, signed)) {
            return name.clone();
        }
        let op = if signed { "sign_extend" } else { "zero_extend" };
        let name = format!("${}.{}.{}", op, from, to);
        self.ext_builtins.insert((from, to, signed), name.clone());
        self.add_decl(Decl::Func {
            name: name.clone(),
            params: vec![("p1".to_string(), BType::Bv(from))],
            result: BType::Bv(to),
            body: None,
            attrs: vec![Attribute::with_str(
                "bvbuiltin",
                format!("(_ {} {})", op, to - from),
            )],
        });
        name
    }

    /// The Boogie procedure name of a function.
    pub fn proc_name(&self, fun: FunId) -> String {
        let data = self.env.function_data(fun);
        let contract = &self.env.contract_data(data.contract).name;
        if data.is_constructor {
            format!("{}#constructor", contract)
        } else {
            format!("{}#{}#{}", contract, data.name, fun.0)
        }
    }

    pub fn event_proc_name(&self, event: EventId) -> String {
        let data = self.env.event_data(event);
        let contract = &self.env.contract_data(data.contract).name;
        format!("{}#event#{}", contract, data.name)
    }

    // ---------------------------------------------------------------------
    // Sum shadow variables

    /// Registers (or retrieves) the shadow variable maintaining the running
    /// total over the given state variable's integer contents.
    pub fn sum_shadow(&mut self, state_var: DeclId) -> String {
        if let Some(name) = self.sum_shadows.get(&state_var) {
            return name.clone();
        }
        let name = format!("{}#sum", self.map_decl_name(state_var));
        self.sum_shadows.insert(state_var, name.clone());
        self.add_decl(Decl::Var {
            name: name.clone(),
            ty: BType::map(BType::named("address"), self.int_btype(256)),
            attrs: vec![],
        });
        name
    }

    /// The shadow variable of a state variable, if one was registered.
    pub fn registered_sum_shadow(&self, state_var: DeclId) -> Option<String> {
        self.sum_shadows.get(&state_var).cloned()
    }

    // ---------------------------------------------------------------------
    // Builtins and diagnostics

    pub fn this_expr(&self) -> Expr {
        Expr::id(THIS)
    }

    pub fn balance_expr(&self) -> Expr {
        Expr::id(BALANCE)
    }

    /// Attributes carrying the source location and a message, attached to
    /// asserts and specifications for traceability.
    pub fn loc_attrs(&self, loc: &Loc, message: &str) -> Vec<Attribute> {
        vec![
            Attribute::with_str("sourceloc", self.env.loc_display(loc)),
            Attribute::with_str("message", message),
        ]
    }

    pub fn report_error(&self, node: NodeId, msg: &str) {
        self.env.error(&self.env.node_loc(node), msg);
    }
}

fn sanitize_type_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
