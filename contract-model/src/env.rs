// Copyright (c) The Contract Prover Contributors
// SPDX-License-Identifier: Apache-2.0

//! Global environment holding the resolved program: contracts, state
//! variables, structs, enums, functions and modifiers in declaration order,
//! node type/location maps, and accumulated diagnostics.

use std::{
    cell::RefCell,
    collections::BTreeMap,
};

use codespan::{ByteIndex, FileId, Files, Span};
use codespan_reporting::{
    diagnostic::{Diagnostic, Label, Severity},
    term::{emit, termcolor::WriteColor, Config},
};

use crate::{
    ast::{Expr, NodeId, Stmt},
    ty::{ContractId, DeclId, EnumId, EventId, FunId, ModifierId, StructId, Type},
};

/// A location, consisting of a FileId and a span in this file.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Loc {
    pub file_id: FileId,
    pub span: Span,
}

impl Loc {
    pub fn new(file_id: FileId, span: Span) -> Loc {
        Loc { file_id, span }
    }
}

/// What kind of variable a declaration introduces.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeclKind {
    StateVar { contract: ContractId, constant: bool },
    Field { struct_id: StructId, index: usize },
    Param,
    Return,
    Local,
}

/// A variable declaration of any kind.
#[derive(Debug, Clone)]
pub struct DeclData {
    pub name: String,
    pub ty: Type,
    pub kind: DeclKind,
    pub loc: Loc,
}

#[derive(Debug, Clone)]
pub struct ContractData {
    pub name: String,
    /// State variables in declaration order.
    pub state_vars: Vec<DeclId>,
    pub functions: Vec<FunId>,
    pub events: Vec<EventId>,
    /// Contract invariants from annotations.
    pub invariants: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct StructData {
    pub name: String,
    /// Fields in declaration order; each is a `DeclKind::Field` declaration.
    pub fields: Vec<DeclId>,
}

#[derive(Debug, Clone)]
pub struct EnumData {
    pub name: String,
    pub members: Vec<String>,
}

/// A modifier applied to a function, with its actual arguments.
#[derive(Debug, Clone)]
pub struct ModifierInvocation {
    pub modifier: ModifierId,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct FunctionData {
    pub name: String,
    pub contract: ContractId,
    pub params: Vec<DeclId>,
    pub returns: Vec<DeclId>,
    /// `None` for unimplemented (abstract/interface) functions.
    pub body: Option<Stmt>,
    pub modifiers: Vec<ModifierInvocation>,
    pub is_public: bool,
    pub is_constructor: bool,
    pub is_payable: bool,
    pub loc: Loc,
    /// Pre-parsed annotation expressions.
    pub preconditions: Vec<Expr>,
    pub postconditions: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct ModifierData {
    pub name: String,
    pub params: Vec<DeclId>,
    pub body: Stmt,
}

/// An event declaration. Events carry no verification semantics of their
/// own; emitting one becomes a call to a no-op procedure.
#[derive(Debug, Clone)]
pub struct EventData {
    pub name: String,
    pub contract: ContractId,
    pub params: Vec<DeclId>,
}

/// Global environment for a resolved program.
#[derive(Debug)]
pub struct GlobalEnv {
    /// A Files database for the codespan crate which supports diagnostics.
    source_files: Files<String>,
    file_name_map: BTreeMap<String, FileId>,
    /// A special constant location representing an unknown location, backed
    /// by a pseudo entry in `source_files`.
    unknown_loc: Loc,
    /// Accumulated diagnostics. In a RefCell so we can add to them without
    /// needing a mutable GlobalEnv.
    diags: RefCell<Vec<Diagnostic>>,
    /// Start indices into `diags` for open diagnostic scopes (§ error
    /// isolation per function/annotation).
    diag_scopes: RefCell<Vec<usize>>,

    contracts: Vec<ContractData>,
    structs: Vec<StructData>,
    enums: Vec<EnumData>,
    decls: Vec<DeclData>,
    functions: Vec<FunctionData>,
    modifiers: Vec<ModifierData>,
    events: Vec<EventData>,

    /// A counter for allocating node ids.
    next_node_id: RefCell<usize>,
    loc_map: RefCell<BTreeMap<NodeId, Loc>>,
    type_map: RefCell<BTreeMap<NodeId, Type>>,
    /// A counter for issuing globally unique ids (fresh names, labels).
    global_id_counter: RefCell<usize>,
}

impl GlobalEnv {
    pub fn new() -> Self {
        let mut source_files = Files::new();
        let mut file_name_map = BTreeMap::new();
        let file_id = source_files.add("<unknown>", "<unknown>".to_string());
        file_name_map.insert("<unknown>".to_string(), file_id);
        let unknown_loc = Loc::new(
            file_id,
            Span::from(ByteIndex(0_u32)..ByteIndex("<unknown>".len() as u32)),
        );
        GlobalEnv {
            source_files,
            file_name_map,
            unknown_loc,
            diags: RefCell::new(vec![]),
            diag_scopes: RefCell::new(vec![]),
            contracts: vec![],
            structs: vec![],
            enums: vec![],
            decls: vec![],
            functions: vec![],
            modifiers: vec![],
            events: vec![],
            next_node_id: RefCell::new(0),
            loc_map: RefCell::new(BTreeMap::new()),
            type_map: RefCell::new(BTreeMap::new()),
            global_id_counter: RefCell::new(0),
        }
    }

    /// Adds a source to this environment, returning a FileId for it.
    pub fn add_source(&mut self, file_name: &str, source: &str) -> FileId {
        let file_id = self.source_files.add(file_name, source.to_string());
        self.file_name_map.insert(file_name.to_string(), file_id);
        file_id
    }

    pub fn unknown_loc(&self) -> Loc {
        self.unknown_loc.clone()
    }

    // ---------------------------------------------------------------------
    // Diagnostics

    pub fn add_diag(&self, diag: Diagnostic) {
        self.diags.borrow_mut().push(diag);
    }

    pub fn error(&self, loc: &Loc, msg: &str) {
        self.add_diag(Diagnostic::new_error(
            msg,
            Label::new(loc.file_id, loc.span, ""),
        ));
    }

    pub fn warn(&self, loc: &Loc, msg: &str) {
        self.add_diag(Diagnostic::new_warning(
            msg,
            Label::new(loc.file_id, loc.span, ""),
        ));
    }

    /// Opens a diagnostic scope. Diagnostics reported while the scope is
    /// open are attributed to it when it is closed.
    pub fn enter_diag_scope(&self) {
        self.diag_scopes.borrow_mut().push(self.diags.borrow().len());
    }

    /// Closes the innermost diagnostic scope, keeping its diagnostics, and
    /// returns the number of errors reported within it.
    pub fn exit_diag_scope(&self) -> usize {
        let mark = self
            .diag_scopes
            .borrow_mut()
            .pop()
            .unwrap_or(0);
        self.diags.borrow()[mark..]
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count()
    }

    /// Closes the innermost diagnostic scope, dropping everything reported
    /// inside it and replacing it with a single summarizing error. Used for
    /// malformed annotations, where a parse failure must not cascade.
    pub fn exit_diag_scope_collapsed(&self, loc: &Loc, summary: &str) -> usize {
        let mark = self
            .diag_scopes
            .borrow_mut()
            .pop()
            .unwrap_or(0);
        let dropped = {
            let mut diags = self.diags.borrow_mut();
            let dropped = diags[mark..]
                .iter()
                .filter(|d| d.severity >= Severity::Error)
                .count();
            diags.truncate(mark);
            dropped
        };
        if dropped > 0 {
            self.error(loc, summary);
        }
        dropped
    }

    /// Returns true if diagnostics have error severity or worse.
    pub fn has_errors(&self) -> bool {
        self.diags
            .borrow()
            .iter()
            .any(|d| d.severity >= Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diags
            .borrow()
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count()
    }

    /// Writes accumulated diagnostics of at least the given severity.
    pub fn report_diags<W: WriteColor>(&self, writer: &mut W, severity: Severity) {
        for diag in self
            .diags
            .borrow()
            .iter()
            .filter(|d| d.severity >= severity)
        {
            emit(writer, &Config::default(), &self.source_files, diag)
                .expect("emit must not fail");
        }
    }

    // ---------------------------------------------------------------------
    // Declarations

    pub fn add_contract(&mut self, name: &str) -> ContractId {
        self.contracts.push(ContractData {
            name: name.to_string(),
            state_vars: vec![],
            functions: vec![],
            events: vec![],
            invariants: vec![],
        });
        ContractId(self.contracts.len() - 1)
    }

    pub fn add_struct(&mut self, name: &str) -> StructId {
        self.structs.push(StructData {
            name: name.to_string(),
            fields: vec![],
        });
        StructId(self.structs.len() - 1)
    }

    pub fn add_struct_field(&mut self, struct_id: StructId, name: &str, ty: Type) -> DeclId {
        let index = self.structs[struct_id.0].fields.len();
        let loc = self.unknown_loc();
        let id = self.add_decl(DeclData {
            name: name.to_string(),
            ty,
            kind: DeclKind::Field { struct_id, index },
            loc,
        });
        self.structs[struct_id.0].fields.push(id);
        id
    }

    pub fn add_enum(&mut self, name: &str, members: Vec<String>) -> EnumId {
        self.enums.push(EnumData {
            name: name.to_string(),
            members,
        });
        EnumId(self.enums.len() - 1)
    }

    pub fn add_state_var(&mut self, contract: ContractId, name: &str, ty: Type) -> DeclId {
        let loc = self.unknown_loc();
        let id = self.add_decl(DeclData {
            name: name.to_string(),
            ty,
            kind: DeclKind::StateVar {
                contract,
                constant: false,
            },
            loc,
        });
        self.contracts[contract.0].state_vars.push(id);
        id
    }

    pub fn add_local(&mut self, name: &str, ty: Type, kind: DeclKind) -> DeclId {
        let loc = self.unknown_loc();
        self.add_decl(DeclData {
            name: name.to_string(),
            ty,
            kind,
            loc,
        })
    }

    fn add_decl(&mut self, data: DeclData) -> DeclId {
        self.decls.push(data);
        DeclId(self.decls.len() - 1)
    }

    pub fn add_function(&mut self, data: FunctionData) -> FunId {
        let contract = data.contract;
        self.functions.push(data);
        let id = FunId(self.functions.len() - 1);
        self.contracts[contract.0].functions.push(id);
        id
    }

    pub fn add_modifier(&mut self, data: ModifierData) -> ModifierId {
        self.modifiers.push(data);
        ModifierId(self.modifiers.len() - 1)
    }

    pub fn add_event(&mut self, contract: ContractId, name: &str) -> EventId {
        self.events.push(EventData {
            name: name.to_string(),
            contract,
            params: vec![],
        });
        let id = EventId(self.events.len() - 1);
        self.contracts[contract.0].events.push(id);
        id
    }

    pub fn add_event_param(&mut self, event: EventId, name: &str, ty: Type) -> DeclId {
        let loc = self.unknown_loc();
        let id = self.add_decl(DeclData {
            name: name.to_string(),
            ty,
            kind: DeclKind::Param,
            loc,
        });
        self.events[event.0].params.push(id);
        id
    }

    pub fn add_contract_invariant(&mut self, contract: ContractId, inv: Expr) {
        self.contracts[contract.0].invariants.push(inv);
    }

    // ---------------------------------------------------------------------
    // Accessors

    pub fn contracts(&self) -> impl Iterator<Item = (ContractId, &ContractData)> {
        self.contracts
            .iter()
            .enumerate()
            .map(|(i, c)| (ContractId(i), c))
    }

    /// All contracts, in program order.
    pub fn contract_ids(&self) -> Vec<ContractId> {
        (0..self.contracts.len()).map(ContractId).collect()
    }

    pub fn contract_data(&self, id: ContractId) -> &ContractData {
        &self.contracts[id.0]
    }

    pub fn struct_data(&self, id: StructId) -> &StructData {
        &self.structs[id.0]
    }

    pub fn enum_data(&self, id: EnumId) -> &EnumData {
        &self.enums[id.0]
    }

    pub fn decl_data(&self, id: DeclId) -> &DeclData {
        &self.decls[id.0]
    }

    pub fn function_data(&self, id: FunId) -> &FunctionData {
        &self.functions[id.0]
    }

    pub fn modifier_data(&self, id: ModifierId) -> &ModifierData {
        &self.modifiers[id.0]
    }

    pub fn event_data(&self, id: EventId) -> &EventData {
        &self.events[id.0]
    }

    pub fn is_state_var(&self, id: DeclId) -> bool {
        matches!(self.decl_data(id).kind, DeclKind::StateVar { .. })
    }

    /// The global enumeration of state variables: all contracts in program
    /// order, within each contract in declaration order. Packed storage
    /// references are indices into this enumeration, so it must be stable
    /// for the lifetime of a translation run.
    pub fn state_vars_in_order(&self) -> Vec<DeclId> {
        self.contracts
            .iter()
            .flat_map(|c| c.state_vars.iter().copied())
            .collect()
    }

    // ---------------------------------------------------------------------
    // Nodes

    /// Allocates a new node with the given type, at an unknown location.
    pub fn new_node(&self, ty: Type) -> NodeId {
        self.new_node_at(ty, self.unknown_loc())
    }

    pub fn new_node_at(&self, ty: Type, loc: Loc) -> NodeId {
        let mut counter = self.next_node_id.borrow_mut();
        let id = NodeId(*counter);
        *counter += 1;
        self.loc_map.borrow_mut().insert(id, loc);
        self.type_map.borrow_mut().insert(id, ty);
        id
    }

    pub fn node_type(&self, id: NodeId) -> Type {
        self.type_map
            .borrow()
            .get(&id)
            .cloned()
            .unwrap_or(Type::Error)
    }

    pub fn node_loc(&self, id: NodeId) -> Loc {
        self.loc_map
            .borrow()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| self.unknown_loc())
    }

    /// Returns a printable `file:line:col` form of a location, for
    /// traceability attributes on generated declarations.
    pub fn loc_display(&self, loc: &Loc) -> String {
        let name = self.source_files.name(loc.file_id);
        match self.source_files.location(loc.file_id, loc.span.start()) {
            Ok(location) => format!(
                "{}:{}:{}",
                name.to_string_lossy(),
                location.line.number(),
                location.column.number()
            ),
            Err(_) => name.to_string_lossy().to_string(),
        }
    }

    /// Issues a new globally unique id, used for fresh names and labels.
    pub fn next_global_id(&self) -> usize {
        let mut counter = self.global_id_counter.borrow_mut();
        let id = *counter;
        *counter += 1;
        id
    }
}

impl Default for GlobalEnv {
    fn default() -> Self {
        Self::new()
    }
}
