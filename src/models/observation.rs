use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the bitemporal observation ledger.
///
/// `valid_start..valid_end` is the interval the measured fact was true
/// in the real world (`valid_end = None` means open-ended).
/// `txn_start..txn_end` is the interval the system believed the row
/// (`txn_end = None` means currently believed). Rows are never mutated
/// beyond the single guarded close of `txn_end`, and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub test_code: String,
    pub value: f64,
    pub valid_start: NaiveDateTime,
    pub valid_end: Option<NaiveDateTime>,
    pub txn_start: NaiveDateTime,
    pub txn_end: Option<NaiveDateTime>,
}

impl Observation {
    /// Whether this row is the system's current belief.
    pub fn is_open(&self) -> bool {
        self.txn_end.is_none()
    }

    /// Whether the valid-time interval contains `at`.
    pub fn valid_at(&self, at: NaiveDateTime) -> bool {
        self.valid_start <= at && self.valid_end.map_or(true, |end| end >= at)
    }
}

/// Input for a ledger insert. The ledger fills id and transaction time.
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub patient_id: Uuid,
    pub test_code: String,
    pub value: f64,
    pub valid_start: NaiveDateTime,
    pub valid_end: Option<NaiveDateTime>,
}
