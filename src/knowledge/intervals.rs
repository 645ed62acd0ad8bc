use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{hemoglobin_state_with_freshness, KnowledgeBase};
use crate::db::{self, StoreError};
use crate::loinc;
use crate::models::Gender;

/// A derived validity interval: the window around a draw during which
/// the patient is presumed to have been in `state`. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateInterval {
    pub state: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub value: f64,
    pub observed_at: NaiveDateTime,
}

/// Expand point-in-time samples into validity intervals using each
/// state's asymmetric freshness window:
/// `[t - good_before, t + good_after]`.
pub fn infer_state_intervals(
    kb: &KnowledgeBase,
    gender: Gender,
    samples: &[(NaiveDateTime, f64)],
) -> Vec<StateInterval> {
    samples
        .iter()
        .map(|&(observed_at, value)| {
            let fresh = hemoglobin_state_with_freshness(kb, gender, value);
            StateInterval {
                state: fresh.state.to_string(),
                start: observed_at - fresh.good_before,
                end: observed_at + fresh.good_after,
                value,
                observed_at,
            }
        })
        .collect()
}

/// Keep only the intervals matching a target state ("when was this
/// patient in state X").
pub fn filter_intervals_by_state(intervals: &[StateInterval], state: &str) -> Vec<StateInterval> {
    intervals
        .iter()
        .filter(|i| i.state == state)
        .cloned()
        .collect()
}

/// Infer hemoglobin state intervals for a patient from the ledger's
/// currently-believed rows in `[since, until]`.
pub fn hemoglobin_intervals(
    conn: &Connection,
    kb: &KnowledgeBase,
    patient_id: &Uuid,
    since: NaiveDateTime,
    until: NaiveDateTime,
) -> Result<Vec<StateInterval>, StoreError> {
    let patient = db::get_patient(conn, patient_id)?.ok_or(StoreError::NotFound {
        entity: "patient",
        key: patient_id.to_string(),
    })?;

    let rows = db::open_observations_in_range(conn, patient_id, loinc::HEMOGLOBIN, since, until)?;
    let samples: Vec<(NaiveDateTime, f64)> =
        rows.iter().map(|o| (o.valid_start, o.value)).collect();
    Ok(infer_state_intervals(kb, patient.gender, &samples))
}
