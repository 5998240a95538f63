//! # Diagnostics
//!
//! The diagnostic model shared by the checker, the borrow checker, the MIR
//! verifier, and the package loader.

use std::fmt;

use ariadne::ReportKind;
use drift_common::Span;

/// A diagnostic message from compilation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub code: DiagnosticCode,
    pub message: String,
    /// Source file the diagnostic applies to
    pub file_path: String,
    /// Source span where this diagnostic applies
    pub span: Span,
    /// Optional related spans for additional context
    pub related_spans: Vec<(Span, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
    Hint,
}

impl From<ReportKind<'static>> for DiagnosticSeverity {
    fn from(kind: ReportKind<'static>) -> Self {
        match kind {
            ReportKind::Error => Self::Error,
            ReportKind::Warning => Self::Warning,
            ReportKind::Advice => Self::Info,
            ReportKind::Custom(_, _) => Self::Info,
        }
    }
}

impl From<DiagnosticSeverity> for ReportKind<'static> {
    fn from(severity: DiagnosticSeverity) -> Self {
        match severity {
            DiagnosticSeverity::Error => ReportKind::Error,
            DiagnosticSeverity::Warning => ReportKind::Warning,
            DiagnosticSeverity::Info => ReportKind::Advice,
            DiagnosticSeverity::Hint => ReportKind::Advice,
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
            Self::Hint => write!(f, "hint"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    // Scope-related errors (1000-1999)
    UndeclaredVariable,
    DuplicateDefinition,
    UseBeforeDefinition,

    // Type-related errors (2000-2999)
    TypeMismatch,
    InvalidFieldAccess,
    InvalidIndexAccess,
    InvalidIndexType,
    InvalidFunctionCall,
    InvalidAssignment,
    InvalidReturnType,
    InvalidThrowPayload,

    // Flow-related errors (3000-3999)
    UnreachableCode,
    MissingReturn,

    // Ownership and effects (4000-4999)
    BorrowConflict,
    UseAfterMove,
    EffectViolation,
    UnknownCatchEvent,
}

impl From<DiagnosticCode> for u32 {
    fn from(code: DiagnosticCode) -> Self {
        match code {
            DiagnosticCode::UndeclaredVariable => 1001,
            DiagnosticCode::DuplicateDefinition => 1003,
            DiagnosticCode::UseBeforeDefinition => 1004,
            DiagnosticCode::TypeMismatch => 2001,
            DiagnosticCode::InvalidFieldAccess => 2002,
            DiagnosticCode::InvalidIndexAccess => 2003,
            DiagnosticCode::InvalidIndexType => 2004,
            DiagnosticCode::InvalidFunctionCall => 2005,
            DiagnosticCode::InvalidAssignment => 2006,
            DiagnosticCode::InvalidReturnType => 2007,
            DiagnosticCode::InvalidThrowPayload => 2008,
            DiagnosticCode::UnreachableCode => 3001,
            DiagnosticCode::MissingReturn => 3002,
            DiagnosticCode::BorrowConflict => 4001,
            DiagnosticCode::UseAfterMove => 4002,
            DiagnosticCode::EffectViolation => 4003,
            DiagnosticCode::UnknownCatchEvent => 4004,
        }
    }
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(code: DiagnosticCode, message: String) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            code,
            message,
            file_path: String::new(),
            span: Span::default(),
            related_spans: Vec::new(),
        }
    }

    /// Create a warning diagnostic
    pub fn warning(code: DiagnosticCode, message: String) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            code,
            message,
            file_path: String::new(),
            span: Span::default(),
            related_spans: Vec::new(),
        }
    }

    /// Add location information to this diagnostic
    pub fn with_location(mut self, file_path: impl Into<String>, span: Span) -> Self {
        self.file_path = file_path.into();
        self.span = span;
        self
    }

    /// Add a related span with context message
    pub fn with_related_span(mut self, span: Span, message: String) -> Self {
        self.related_spans.push((span, message));
        self
    }

    /// Convenience method for undeclared variable error
    pub fn undeclared_variable(name: &str, span: Span) -> Self {
        Self::error(
            DiagnosticCode::UndeclaredVariable,
            format!("Undeclared variable '{name}'"),
        )
        .with_location(String::new(), span)
    }

    /// Convenience method for duplicate definition error
    pub fn duplicate_definition(name: &str, span: Span) -> Self {
        Self::error(
            DiagnosticCode::DuplicateDefinition,
            format!("Duplicate definition of '{name}'"),
        )
        .with_location(String::new(), span)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        write!(f, " (at {}:{})", self.span.start, self.span.end)?;
        for (span, message) in &self.related_spans {
            write!(f, "\n  note: {} (at {}:{})", message, span.start, span.end)?;
        }
        Ok(())
    }
}

/// Collection of diagnostics accumulated across passes
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic to the collection
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add multiple diagnostics
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Sort diagnostics by severity (errors first) and then by message
    pub fn sort(&mut self) {
        self.diagnostics
            .sort_by(|a, b| a.severity.cmp(&b.severity).then(a.message.cmp(&b.message)));
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        let errors = self.errors().len();
        let total = self.diagnostics.len();
        if total == 0 {
            "No issues found".to_string()
        } else {
            format!("{errors} errors, {} warnings", total - errors)
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }
}

impl From<Vec<Diagnostic>> for DiagnosticCollection {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }
}

impl IntoIterator for DiagnosticCollection {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_creation() {
        let span = Span::from(10..20);
        let diag = Diagnostic::undeclared_variable("test_var", span);
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.code, DiagnosticCode::UndeclaredVariable);
        assert!(diag.message.contains("test_var"));
        assert_eq!(diag.span, span);
    }

    #[test]
    fn test_collection_tracks_errors() {
        let mut collection = DiagnosticCollection::new();
        collection.add(Diagnostic::undeclared_variable("var1", Span::from(0..5)));
        collection.add(Diagnostic::warning(
            DiagnosticCode::UnreachableCode,
            "Unreachable statement".to_string(),
        ));

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.errors().len(), 1);
        assert!(collection.has_errors());
    }
}
