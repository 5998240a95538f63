//! # Type Intern Table
//!
//! All Drift types live in a single append-only table and are referred to by
//! stable `TypeId`s. Equality of ids implies semantic equality; the reverse
//! holds only for structurally-interned kinds (scalars, references,
//! `FnResult`, variant instantiations), which are cached so identical
//! requests alias.
//!
//! Parametric variants are declared as schemas carrying `GenericTypeExpr`
//! field types; `ensure_instantiated` substitutes the type arguments and
//! interns the resulting concrete instance.

use index_vec::IndexVec;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::TypeExpr;

index_vec::define_index_type! {
    /// Stable identifier for an interned type. Valid for the lifetime of the
    /// `TypeTable` that produced it.
    pub struct TypeId = u32;
}

/// Errors raised by type construction and instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("variant '{schema}' expects {expected} type arguments, got {got}")]
    ArityMismatch {
        schema: String,
        expected: usize,
        got: usize,
    },
    #[error("type id {0:?} is not a variant schema")]
    NotASchema(TypeId),
    #[error("unknown type '{0}'")]
    UnknownType(String),
    #[error("generic parameter index {index} out of range for '{schema}'")]
    ParamOutOfRange { schema: String, index: usize },
}

/// The kind of an interned type, for cheap dispatch without matching on the
/// full `TypeData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Scalar,
    Error,
    Unknown,
    Ref,
    Array,
    Variant,
    VariantSchema,
    FnResult,
    Unit,
    Bottom,
}

/// A field of a variant arm in a schema, typed by a generic expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantFieldSchema {
    pub name: String,
    pub type_expr: GenericTypeExpr,
}

/// A named arm of a variant schema with ordered fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantArmSchema {
    pub name: String,
    pub fields: Vec<VariantFieldSchema>,
}

/// Field type inside a variant schema: either a reference to one of the
/// schema's type parameters or an already-interned concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericTypeExpr {
    Param(usize),
    Concrete(TypeId),
}

impl GenericTypeExpr {
    pub const fn param(index: usize) -> Self {
        Self::Param(index)
    }

    pub const fn concrete(id: TypeId) -> Self {
        Self::Concrete(id)
    }
}

/// A parametric variant declaration (`variant Optional<T> { Some(value: T), None }`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSchema {
    pub module: String,
    pub name: String,
    pub params: Vec<String>,
    pub arms: Vec<VariantArmSchema>,
}

/// One arm of an instantiated variant. Tags follow declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantArm {
    pub name: String,
    pub tag: u32,
    pub field_names: Vec<String>,
    pub field_types: Vec<TypeId>,
}

/// A concrete variant produced by substituting type arguments into a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInstance {
    pub schema: TypeId,
    pub name: String,
    pub args: Vec<TypeId>,
    pub arms: Vec<VariantArm>,
}

impl VariantInstance {
    pub fn arm(&self, name: &str) -> Option<&VariantArm> {
        self.arms.iter().find(|a| a.name == name)
    }
}

/// Payload of an interned type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeData {
    Scalar(String),
    Error,
    Unknown(String),
    Ref { inner: TypeId, mutable: bool },
    Array { element: TypeId },
    Variant(VariantInstance),
    VariantSchema(VariantSchema),
    FnResult { ok: TypeId, err: TypeId },
    Unit,
    Bottom,
}

impl TypeData {
    pub const fn kind(&self) -> TypeKind {
        match self {
            Self::Scalar(_) => TypeKind::Scalar,
            Self::Error => TypeKind::Error,
            Self::Unknown(_) => TypeKind::Unknown,
            Self::Ref { .. } => TypeKind::Ref,
            Self::Array { .. } => TypeKind::Array,
            Self::Variant(_) => TypeKind::Variant,
            Self::VariantSchema(_) => TypeKind::VariantSchema,
            Self::FnResult { .. } => TypeKind::FnResult,
            Self::Unit => TypeKind::Unit,
            Self::Bottom => TypeKind::Bottom,
        }
    }
}

/// The process-wide type table. Append-only; reads are by id.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: IndexVec<TypeId, TypeData>,
    scalar_cache: FxHashMap<String, TypeId>,
    ref_cache: FxHashMap<(TypeId, bool), TypeId>,
    array_cache: FxHashMap<TypeId, TypeId>,
    fnresult_cache: FxHashMap<(TypeId, TypeId), TypeId>,
    instance_cache: FxHashMap<(TypeId, Vec<TypeId>), TypeId>,
    schemas_by_name: FxHashMap<String, TypeId>,
    error_id: Option<TypeId>,
    unknown_id: Option<TypeId>,
    unit_id: Option<TypeId>,
    bottom_id: Option<TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, data: TypeData) -> TypeId {
        self.types.push(data)
    }

    /// Fetch the payload for an id. Ids are only minted by this table, so the
    /// lookup is infallible.
    pub fn get(&self, id: TypeId) -> &TypeData {
        &self.types[id]
    }

    pub fn kind(&self, id: TypeId) -> TypeKind {
        self.get(id).kind()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // --- Scalars and singletons ---

    pub fn ensure_scalar(&mut self, name: &str) -> TypeId {
        if let Some(id) = self.scalar_cache.get(name) {
            return *id;
        }
        let id = self.intern(TypeData::Scalar(name.to_string()));
        self.scalar_cache.insert(name.to_string(), id);
        id
    }

    pub fn ensure_int(&mut self) -> TypeId {
        self.ensure_scalar("Int")
    }

    pub fn ensure_bool(&mut self) -> TypeId {
        self.ensure_scalar("Bool")
    }

    pub fn ensure_string(&mut self) -> TypeId {
        self.ensure_scalar("String")
    }

    pub fn ensure_error(&mut self) -> TypeId {
        match self.error_id {
            Some(id) => id,
            None => {
                let id = self.intern(TypeData::Error);
                self.error_id = Some(id);
                id
            }
        }
    }

    pub fn ensure_unknown(&mut self) -> TypeId {
        match self.unknown_id {
            Some(id) => id,
            None => {
                let id = self.intern(TypeData::Unknown("Unknown".to_string()));
                self.unknown_id = Some(id);
                id
            }
        }
    }

    pub fn ensure_unit(&mut self) -> TypeId {
        match self.unit_id {
            Some(id) => id,
            None => {
                let id = self.intern(TypeData::Unit);
                self.unit_id = Some(id);
                id
            }
        }
    }

    pub fn ensure_bottom(&mut self) -> TypeId {
        match self.bottom_id {
            Some(id) => id,
            None => {
                let id = self.intern(TypeData::Bottom);
                self.bottom_id = Some(id);
                id
            }
        }
    }

    // --- References ---

    pub fn ensure_ref(&mut self, inner: TypeId) -> TypeId {
        self.ensure_ref_kind(inner, false)
    }

    pub fn ensure_ref_mut(&mut self, inner: TypeId) -> TypeId {
        self.ensure_ref_kind(inner, true)
    }

    fn ensure_ref_kind(&mut self, inner: TypeId, mutable: bool) -> TypeId {
        if let Some(id) = self.ref_cache.get(&(inner, mutable)) {
            return *id;
        }
        let id = self.intern(TypeData::Ref { inner, mutable });
        self.ref_cache.insert((inner, mutable), id);
        id
    }

    // --- Arrays ---

    pub fn ensure_array(&mut self, element: TypeId) -> TypeId {
        if let Some(id) = self.array_cache.get(&element) {
            return *id;
        }
        let id = self.intern(TypeData::Array { element });
        self.array_cache.insert(element, id);
        id
    }

    /// The element type, if `id` is an array.
    pub fn array_element(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            TypeData::Array { element } => Some(*element),
            _ => None,
        }
    }

    // --- FnResult ---

    pub fn ensure_fnresult(&mut self, ok: TypeId, err: TypeId) -> TypeId {
        if let Some(id) = self.fnresult_cache.get(&(ok, err)) {
            return *id;
        }
        let id = self.intern(TypeData::FnResult { ok, err });
        self.fnresult_cache.insert((ok, err), id);
        id
    }

    pub fn is_fnresult(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeData::FnResult { .. })
    }

    /// The `(ok, err)` parts of a `FnResult`, if `id` is one.
    pub fn fnresult_parts(&self, id: TypeId) -> Option<(TypeId, TypeId)> {
        match self.get(id) {
            TypeData::FnResult { ok, err } => Some((*ok, *err)),
            _ => None,
        }
    }

    // --- Variants ---

    /// Declare a parametric variant schema. Each declaration mints a fresh
    /// schema id; the qualified `module.name` is recorded for resolution.
    pub fn declare_variant(
        &mut self,
        module: &str,
        name: &str,
        params: Vec<String>,
        arms: Vec<VariantArmSchema>,
    ) -> TypeId {
        let id = self.intern(TypeData::VariantSchema(VariantSchema {
            module: module.to_string(),
            name: name.to_string(),
            params,
            arms,
        }));
        self.schemas_by_name.insert(name.to_string(), id);
        self.schemas_by_name.insert(format!("{module}.{name}"), id);
        id
    }

    pub fn schema_by_name(&self, name: &str) -> Option<TypeId> {
        self.schemas_by_name.get(name).copied()
    }

    /// Instantiate a variant schema with concrete type arguments.
    ///
    /// Identical `(base, args)` requests return the same id.
    pub fn ensure_instantiated(
        &mut self,
        base: TypeId,
        args: Vec<TypeId>,
    ) -> Result<TypeId, TypeError> {
        if let Some(id) = self.instance_cache.get(&(base, args.clone())) {
            return Ok(*id);
        }
        let schema = match self.get(base) {
            TypeData::VariantSchema(schema) => schema.clone(),
            _ => return Err(TypeError::NotASchema(base)),
        };
        if schema.params.len() != args.len() {
            return Err(TypeError::ArityMismatch {
                schema: schema.name,
                expected: schema.params.len(),
                got: args.len(),
            });
        }

        let mut arms = Vec::with_capacity(schema.arms.len());
        for (tag, arm) in schema.arms.iter().enumerate() {
            let mut field_names = Vec::with_capacity(arm.fields.len());
            let mut field_types = Vec::with_capacity(arm.fields.len());
            for field in &arm.fields {
                field_names.push(field.name.clone());
                field_types.push(match field.type_expr {
                    GenericTypeExpr::Param(index) => {
                        *args.get(index).ok_or_else(|| TypeError::ParamOutOfRange {
                            schema: schema.name.clone(),
                            index,
                        })?
                    }
                    GenericTypeExpr::Concrete(id) => id,
                });
            }
            arms.push(VariantArm {
                name: arm.name.clone(),
                tag: tag as u32,
                field_names,
                field_types,
            });
        }

        let id = self.intern(TypeData::Variant(VariantInstance {
            schema: base,
            name: schema.name,
            args: args.clone(),
            arms,
        }));
        self.instance_cache.insert((base, args), id);
        Ok(id)
    }

    pub fn variant_instance(&self, id: TypeId) -> Option<&VariantInstance> {
        match self.get(id) {
            TypeData::Variant(inst) => Some(inst),
            _ => None,
        }
    }

    // --- Resolution and queries ---

    /// Resolve a source-level type expression against primitives and declared
    /// schemas, instantiating variants as needed.
    pub fn resolve_type_expr(&mut self, expr: &TypeExpr) -> Result<TypeId, TypeError> {
        if expr.args.is_empty() {
            return match expr.name.as_str() {
                "Int" | "Bool" | "String" => Ok(self.ensure_scalar(&expr.name)),
                "Error" => Ok(self.ensure_error()),
                "Unit" => Ok(self.ensure_unit()),
                name => match self.schema_by_name(name) {
                    // A bare schema name with zero params instantiates trivially.
                    Some(base) => self.ensure_instantiated(base, Vec::new()),
                    None => Err(TypeError::UnknownType(name.to_string())),
                },
            };
        }
        if expr.name == "FnResult" && expr.args.len() == 2 {
            let ok = self.resolve_type_expr(&expr.args[0])?;
            let err = self.resolve_type_expr(&expr.args[1])?;
            return Ok(self.ensure_fnresult(ok, err));
        }
        // Reference and array type constructors from the surface syntax.
        if expr.name == "Ref" && expr.args.len() == 1 {
            let inner = self.resolve_type_expr(&expr.args[0])?;
            return Ok(self.ensure_ref(inner));
        }
        if expr.name == "RefMut" && expr.args.len() == 1 {
            let inner = self.resolve_type_expr(&expr.args[0])?;
            return Ok(self.ensure_ref_mut(inner));
        }
        if expr.name == "Array" && expr.args.len() == 1 {
            let element = self.resolve_type_expr(&expr.args[0])?;
            return Ok(self.ensure_array(element));
        }
        let base = self
            .schema_by_name(&expr.name)
            .ok_or_else(|| TypeError::UnknownType(expr.name.clone()))?;
        let args = expr
            .args
            .iter()
            .map(|a| self.resolve_type_expr(a))
            .collect::<Result<Vec<_>, _>>()?;
        self.ensure_instantiated(base, args)
    }

    /// Whether a value of this type can be rendered for the user.
    ///
    /// Scalars, Error, and variants whose fields are all displayable are
    /// displayable; references propagate to their referent.
    pub fn is_displayable(&self, id: TypeId) -> bool {
        match self.get(id) {
            TypeData::Scalar(_) | TypeData::Error | TypeData::Unit => true,
            TypeData::Ref { inner, .. } => self.is_displayable(*inner),
            TypeData::Array { element } => self.is_displayable(*element),
            TypeData::Variant(inst) => inst
                .arms
                .iter()
                .all(|arm| arm.field_types.iter().all(|t| self.is_displayable(*t))),
            TypeData::FnResult { ok, err } => self.is_displayable(*ok) && self.is_displayable(*err),
            TypeData::Unknown(_) | TypeData::VariantSchema(_) | TypeData::Bottom => false,
        }
    }

    /// Human-readable rendering for diagnostics.
    pub fn display(&self, id: TypeId) -> String {
        match self.get(id) {
            TypeData::Scalar(name) => name.clone(),
            TypeData::Error => "Error".to_string(),
            TypeData::Unknown(label) => label.clone(),
            TypeData::Ref { inner, mutable } => {
                let prefix = if *mutable { "&mut " } else { "&" };
                format!("{prefix}{}", self.display(*inner))
            }
            TypeData::Array { element } => format!("[{}]", self.display(*element)),
            TypeData::Variant(inst) => {
                if inst.args.is_empty() {
                    inst.name.clone()
                } else {
                    let args = inst
                        .args
                        .iter()
                        .map(|a| self.display(*a))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{}<{args}>", inst.name)
                }
            }
            TypeData::VariantSchema(schema) => format!("{}<schema>", schema.name),
            TypeData::FnResult { ok, err } => {
                format!("FnResult<{}, {}>", self.display(*ok), self.display(*err))
            }
            TypeData::Unit => "Unit".to_string(),
            TypeData::Bottom => "!".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optional_schema(table: &mut TypeTable) -> TypeId {
        table.declare_variant(
            "lang.core",
            "Optional",
            vec!["T".to_string()],
            vec![
                VariantArmSchema {
                    name: "Some".to_string(),
                    fields: vec![VariantFieldSchema {
                        name: "value".to_string(),
                        type_expr: GenericTypeExpr::param(0),
                    }],
                },
                VariantArmSchema {
                    name: "None".to_string(),
                    fields: vec![],
                },
            ],
        )
    }

    #[test]
    fn scalar_interning_aliases() {
        let mut table = TypeTable::new();
        assert_eq!(table.ensure_int(), table.ensure_int());
        assert_ne!(table.ensure_int(), table.ensure_bool());
    }

    #[test]
    fn variant_instantiation_produces_concrete_instance() {
        let mut table = TypeTable::new();
        let int = table.ensure_int();
        table.ensure_string();
        let opt_base = optional_schema(&mut table);

        let opt_int = table.ensure_instantiated(opt_base, vec![int]).unwrap();
        assert_eq!(table.kind(opt_int), TypeKind::Variant);

        let inst = table.variant_instance(opt_int).unwrap();
        let some = inst.arm("Some").unwrap();
        let none = inst.arm("None").unwrap();
        assert_eq!(some.tag, 0);
        assert_eq!(none.tag, 1);
        assert_eq!(some.field_names, vec!["value".to_string()]);
        assert_eq!(some.field_types, vec![int]);
    }

    #[test]
    fn identical_instantiations_alias() {
        let mut table = TypeTable::new();
        let int = table.ensure_int();
        let opt_base = optional_schema(&mut table);
        let a = table.ensure_instantiated(opt_base, vec![int]).unwrap();
        let b = table.ensure_instantiated(opt_base, vec![int]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn instantiation_arity_mismatch_is_an_error() {
        let mut table = TypeTable::new();
        let int = table.ensure_int();
        let bool_ty = table.ensure_bool();
        let opt_base = optional_schema(&mut table);
        let err = table
            .ensure_instantiated(opt_base, vec![int, bool_ty])
            .unwrap_err();
        assert!(matches!(err, TypeError::ArityMismatch { .. }));
    }

    #[test]
    fn instantiating_a_non_schema_is_an_error() {
        let mut table = TypeTable::new();
        let int = table.ensure_int();
        let err = table.ensure_instantiated(int, vec![]).unwrap_err();
        assert!(matches!(err, TypeError::NotASchema(_)));
    }

    #[test]
    fn resolve_type_expr_instantiates_declared_variant() {
        let mut table = TypeTable::new();
        let opt_base = optional_schema(&mut table);
        let raw = TypeExpr {
            name: "Optional".to_string(),
            args: vec![TypeExpr::simple("Int")],
        };
        let ty = table.resolve_type_expr(&raw).unwrap();
        assert_eq!(table.kind(ty), TypeKind::Variant);
        assert_ne!(ty, opt_base);
        let int = table.ensure_int();
        let inst = table.variant_instance(ty).unwrap();
        assert_eq!(inst.arm("Some").unwrap().field_types, vec![int]);
    }

    #[test]
    fn displayability_propagates_through_instantiation() {
        let mut table = TypeTable::new();
        let int = table.ensure_int();
        let opt_base = optional_schema(&mut table);
        let opt_int = table.ensure_instantiated(opt_base, vec![int]).unwrap();
        assert!(table.is_displayable(opt_int));
        let unknown = table.ensure_unknown();
        let opt_unknown = table.ensure_instantiated(opt_base, vec![unknown]).unwrap();
        assert!(!table.is_displayable(opt_unknown));
    }
}
