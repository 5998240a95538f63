//! Address-taken analysis.

use std::collections::BTreeSet;

use crate::{Instruction, MirFunction};

/// The set of locals whose address is observed via `AddrOfLocal`.
///
/// SSA construction must leave these as storage-backed slots.
pub fn address_taken_locals(func: &MirFunction) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for block in func.blocks.values() {
        for instr in &block.instructions {
            if let Instruction::AddrOfLocal { local, .. } = instr {
                out.insert(local.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MirBuilder;

    #[test]
    fn collects_addr_of_locals() {
        let mut b = MirBuilder::new("f");
        b.ensure_local("x", None);
        b.ensure_local("y", None);
        let dest = b.new_temp();
        b.emit(Instruction::AddrOfLocal {
            dest,
            local: "x".to_string(),
        });
        let taken = address_taken_locals(&b.func);
        assert!(taken.contains("x"));
        assert!(!taken.contains("y"));
    }
}
