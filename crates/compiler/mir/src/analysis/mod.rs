//! # MIR Pre-Analyses
//!
//! Side tables computed over MIR before SSA construction, so that SSA and
//! later invariant passes stay purely structural:
//!
//! - [`address_taken`]: locals whose address is observed; these must stay
//!   storage-backed rather than become SSA values
//! - [`throw_summary`]: the events a function may raise, from direct
//!   raises and callee declarations

pub mod address_taken;
pub mod throw_summary;

pub use address_taken::address_taken_locals;
pub use throw_summary::{ThrowSummary, ThrowSummaryBuilder};
