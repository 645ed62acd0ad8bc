//! Temporal query engine — time-sliced reads over the observation
//! ledger, with test-name resolution and categorical decoding.
//!
//! Presentation layers (GUI/CLI) consume the typed payloads here; they
//! never reach into table layouts or decode codes themselves.

mod query;
mod types;

pub use query::*;
pub use types::*;
