//! medichron — bitemporal clinical observation ledger with a
//! deterministic treatment decision engine.
//!
//! Every observation carries a valid-time interval (when the measured
//! fact was true) and a transaction-time interval (when the system
//! believed it). Corrections close the old belief and append a new
//! one; history is never rewritten. On top of the ledger sits a pure
//! reasoning pipeline: range classification into named clinical
//! states, freshness-window interval inference, maximum-severity
//! toxicity grading, and a decision-table treatment lookup.

pub mod config;
pub mod db;
pub mod editor;
pub mod history;
pub mod knowledge;
pub mod loinc;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for a hosting binary. Library callers that
/// install their own subscriber should skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
