//! Catch-arm validation against the exception catalog.

use drift_common::Span;
use drift_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use std::collections::BTreeSet;

/// Shape of one catch arm as seen by the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchArmInfo {
    /// Event name; `None` is the catch-all arm.
    pub event: Option<String>,
    pub binder: Option<String>,
    pub span: Option<Span>,
}

/// Validate catch arms against the known event set, accumulating diagnostics
/// instead of aborting.
pub fn validate_catch_arms(
    arms: &[CatchArmInfo],
    known_events: &BTreeSet<String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for arm in arms {
        let Some(event) = arm.event.as_deref() else {
            continue;
        };
        if !known_events.contains(event) {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::UnknownCatchEvent,
                    format!("unknown event '{event}' in catch arm"),
                )
                .with_location(String::new(), arm.span.unwrap_or_default()),
            );
        }
        if !seen.insert(event) {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateDefinition,
                    format!("duplicate catch arm for event '{event}'"),
                )
                .with_location(String::new(), arm.span.unwrap_or_default()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> BTreeSet<String> {
        ["ParseError".to_string(), "IoError".to_string()]
            .into_iter()
            .collect()
    }

    #[test]
    fn unknown_event_is_diagnosed() {
        let arms = vec![CatchArmInfo {
            event: Some("NoSuchEvent".to_string()),
            binder: None,
            span: None,
        }];
        let mut diags = Vec::new();
        validate_catch_arms(&arms, &known(), &mut diags);
        assert!(diags.iter().any(|d| d.message.contains("NoSuchEvent")));
    }

    #[test]
    fn known_events_and_catch_all_pass() {
        let arms = vec![
            CatchArmInfo {
                event: Some("ParseError".to_string()),
                binder: Some("err".to_string()),
                span: None,
            },
            CatchArmInfo {
                event: None,
                binder: None,
                span: None,
            },
        ];
        let mut diags = Vec::new();
        validate_catch_arms(&arms, &known(), &mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn duplicate_arm_is_diagnosed() {
        let arms = vec![
            CatchArmInfo {
                event: Some("IoError".to_string()),
                binder: None,
                span: None,
            },
            CatchArmInfo {
                event: Some("IoError".to_string()),
                binder: None,
                span: None,
            },
        ];
        let mut diags = Vec::new();
        validate_catch_arms(&arms, &known(), &mut diags);
        assert!(diags.iter().any(|d| d.message.contains("duplicate")));
    }
}
