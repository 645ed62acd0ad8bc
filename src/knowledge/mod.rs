//! Clinical knowledge: classification range tables with freshness
//! windows, the systemic toxicity grading rules, and the treatment
//! decision table.
//!
//! Everything here is loaded once into an immutable [`KnowledgeBase`]
//! at process start and consumed by pure functions; no runtime
//! mutation, no synchronization.

mod classify;
mod intervals;
mod tables;
mod toxicity;
mod treatment;

pub use classify::*;
pub use intervals::*;
pub use tables::*;
pub use toxicity::*;
pub use treatment::*;
