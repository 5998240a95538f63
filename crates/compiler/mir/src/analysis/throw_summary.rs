//! Throw summary analysis.
//!
//! Accumulates, per function, the set of event discriminants it may raise:
//! direct `ConstructError`/`Raise` sites plus the declared thrown sets of
//! its callees. The checker and the stage-4 invariant passes consume this.

use std::collections::BTreeSet;

use drift_compiler_semantic::FnInfo;
use rustc_hash::FxHashMap;

use crate::{Instruction, MirFunction, Terminator};

/// Per-function throw facts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrowSummary {
    /// Does this function contain any `ConstructError` at all?
    pub constructs_error: bool,
    /// Event names this function may raise.
    pub exception_types: BTreeSet<String>,
    /// `(block, instruction index)` sites that may fail.
    pub may_fail_sites: BTreeSet<(String, usize)>,
}

/// Builds [`ThrowSummary`] values from MIR plus callee declarations.
#[derive(Debug, Default)]
pub struct ThrowSummaryBuilder;

impl ThrowSummaryBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        func: &MirFunction,
        fn_infos: &FxHashMap<String, FnInfo>,
    ) -> ThrowSummary {
        let mut summary = ThrowSummary::default();
        for (block_name, block) in &func.blocks {
            for (index, instr) in block.instructions.iter().enumerate() {
                match instr {
                    Instruction::ConstructError { event, .. } => {
                        summary.constructs_error = true;
                        if let Some(event) = event {
                            summary.exception_types.insert(event.clone());
                        }
                        summary
                            .may_fail_sites
                            .insert((block_name.clone(), index));
                    }
                    Instruction::Call { callee, .. } => {
                        if let Some(info) = fn_infos.get(callee) {
                            if info.declared_can_throw {
                                summary
                                    .may_fail_sites
                                    .insert((block_name.clone(), index));
                            }
                            if let Some(events) = &info.declared_events {
                                summary.exception_types.extend(events.iter().cloned());
                            }
                        }
                    }
                    _ => {}
                }
            }
            if let Some(Terminator::Raise { .. }) = &block.terminator {
                summary
                    .may_fail_sites
                    .insert((block_name.clone(), block.instructions.len()));
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MirBuilder, Terminator};
    use drift_common::Literal;

    #[test]
    fn construct_error_is_recorded_with_event() {
        let mut b = MirBuilder::new("f");
        let code = b.new_temp();
        b.emit(Instruction::Const {
            dest: code.clone(),
            value: Literal::Int(3),
            ty: drift_common::TypeId::from_raw(0),
        });
        let dest = b.new_temp();
        b.emit(Instruction::ConstructError {
            dest,
            code,
            event: Some("ParseError".to_string()),
        });
        b.set_terminator(Terminator::Return { value: None });

        let summary = ThrowSummaryBuilder::new().build(&b.func, &FxHashMap::default());
        assert!(summary.constructs_error);
        assert!(summary.exception_types.contains("ParseError"));
        assert!(!summary.may_fail_sites.is_empty());
    }

    #[test]
    fn callee_declared_events_propagate() {
        let mut b = MirBuilder::new("caller");
        let dest = b.new_temp();
        b.emit(Instruction::Call {
            dest,
            callee: "fallible".to_string(),
            args: vec![],
            normal: None,
            error: None,
        });
        b.set_terminator(Terminator::Return { value: None });

        let mut fn_infos = FxHashMap::default();
        fn_infos.insert(
            "fallible".to_string(),
            FnInfo {
                name: "fallible".to_string(),
                declared_can_throw: true,
                declared_events: Some(["IoError".to_string()].into_iter().collect()),
                return_type_id: None,
                error_type_id: None,
                span: None,
            },
        );

        let summary = ThrowSummaryBuilder::new().build(&b.func, &fn_infos);
        assert!(summary.exception_types.contains("IoError"));
        assert!(!summary.constructs_error);
    }
}
