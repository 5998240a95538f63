//! The SSA value-typing interface consumed by stage-4 invariant checks.
//!
//! The concrete environment is built after SSA construction (it needs the
//! renamed values); this trait keeps the checker's type knowledge decoupled
//! from the MIR crate.

use drift_common::TypeId;

/// Answers type queries about SSA values of checked functions.
pub trait TypeEnv {
    /// The type assigned to `value` inside `func`, if known.
    fn type_of_ssa_value(&self, func: &str, value: &str) -> Option<TypeId>;

    /// Whether `ty` is the result-carrier type.
    fn is_fnresult(&self, ty: TypeId) -> bool;
}
