//! # Diagnostic System
//!
//! Diagnostic infrastructure for the Drift compiler: structured diagnostics
//! with severities, stable codes, and source locations, plus terminal
//! rendering via `ariadne`.
//!
//! Checking is accumulative: passes push diagnostics into a collection and
//! the driver decides success at the pipeline exit.

pub mod diagnostics;
pub mod reporting;

pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticCollection, DiagnosticSeverity};
pub use reporting::build_diagnostic_message;
