//! # Function Signatures
//!
//! Signatures drive call checking, auto-borrow, effect accounting, and the
//! stage-4 can-throw invariants. `declared_can_throw` follows from an
//! explicit `throws(..)` clause or a result-carrier return type.

use std::collections::BTreeSet;

use drift_common::{TypeId, TypeTable};
use rustc_hash::FxHashMap;

use drift_common::Span;

/// A resolved function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSignature {
    pub name: String,
    pub param_type_ids: Vec<TypeId>,
    pub param_names: Vec<String>,
    /// Keyword arguments this function accepts, if any.
    pub allowed_kwargs: Vec<String>,
    pub return_type_id: Option<TypeId>,
    /// The error half of a result-carrier return, when fallible.
    pub error_type_id: Option<TypeId>,
    pub declared_can_throw: bool,
    /// Declared thrown event names; `None` means "not declared".
    pub declared_events: Option<BTreeSet<String>>,
}

impl FnSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type_ids: Vec::new(),
            param_names: Vec::new(),
            allowed_kwargs: Vec::new(),
            return_type_id: None,
            error_type_id: None,
            declared_can_throw: false,
            declared_events: None,
        }
    }

    pub fn with_params(mut self, params: Vec<TypeId>) -> Self {
        self.param_type_ids = params;
        self
    }

    pub fn with_return_type(mut self, table: &TypeTable, return_type: TypeId) -> Self {
        self.declared_can_throw = table.is_fnresult(return_type);
        self.error_type_id = table.fnresult_parts(return_type).map(|(_, err)| err);
        self.return_type_id = Some(return_type);
        self
    }

    pub fn with_declared_events(mut self, events: impl IntoIterator<Item = String>) -> Self {
        self.declared_events = Some(events.into_iter().collect());
        self.declared_can_throw = true;
        self
    }
}

/// Per-function checker metadata consumed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnInfo {
    pub name: String,
    pub declared_can_throw: bool,
    pub declared_events: Option<BTreeSet<String>>,
    pub return_type_id: Option<TypeId>,
    pub error_type_id: Option<TypeId>,
    pub span: Option<Span>,
}

impl FnInfo {
    pub fn from_signature(sig: &FnSignature) -> Self {
        Self {
            name: sig.name.clone(),
            declared_can_throw: sig.declared_can_throw,
            declared_events: sig.declared_events.clone(),
            return_type_id: sig.return_type_id,
            error_type_id: sig.error_type_id,
            span: None,
        }
    }
}

/// Container returned by whole-program checking.
#[derive(Debug, Default)]
pub struct CheckedProgram {
    pub fn_infos: FxHashMap<String, FnInfo>,
    pub exception_catalog: Option<FxHashMap<String, i64>>,
    pub diagnostics: Vec<drift_compiler_diagnostics::Diagnostic>,
}
