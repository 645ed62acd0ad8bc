use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Observation;

/// Time-sliced history of one test for one patient: the
/// currently-believed rows overlapping the requested window, oldest
/// first, each with its display value (decoded label for coded tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationHistory {
    pub test_code: String,
    pub common_name: Option<String>,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub observation: Observation,
    pub display_value: String,
}

/// One patient's latest reading per monitored test (status overview).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientStatusRow {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub readings: Vec<Reading>,
}

/// `display_value` is `None` when the patient has no believed row for
/// the test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub test_code: String,
    pub display_value: Option<String>,
}
