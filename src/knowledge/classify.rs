use chrono::Duration;

use super::KnowledgeBase;
use crate::models::Gender;

/// Sentinel label for values outside every configured range. Flows
/// through the pipeline as a normal state; treatment lookup against it
/// misses deterministically.
pub const UNKNOWN_STATE: &str = "Unknown";

/// Classify a hemoglobin value. Ranges are half-open `[low, high)`;
/// first matching bracket wins.
pub fn hemoglobin_state(kb: &KnowledgeBase, gender: Gender, value: f64) -> &'static str {
    for band in kb.hemoglobin_table(gender) {
        if band.low <= value && value < band.high {
            return band.state;
        }
    }
    UNKNOWN_STATE
}

/// A hemoglobin state together with its freshness window.
#[derive(Debug, Clone)]
pub struct StateFreshness {
    pub state: &'static str,
    pub good_before: Duration,
    pub good_after: Duration,
}

/// Classify a hemoglobin value and return its freshness window.
/// Unknown values get zero-width windows.
pub fn hemoglobin_state_with_freshness(
    kb: &KnowledgeBase,
    gender: Gender,
    value: f64,
) -> StateFreshness {
    for band in kb.hemoglobin_table(gender) {
        if band.low <= value && value < band.high {
            return StateFreshness {
                state: band.state,
                good_before: band.good_before,
                good_after: band.good_after,
            };
        }
    }
    StateFreshness {
        state: UNKNOWN_STATE,
        good_before: Duration::zero(),
        good_after: Duration::zero(),
    }
}

/// Classify the combined hemoglobin + WBC hematological state. The
/// outer bracket selects a WBC sub-table; both levels are half-open.
pub fn hematological_state(
    kb: &KnowledgeBase,
    gender: Gender,
    hemoglobin: f64,
    wbc: f64,
) -> &'static str {
    for band in kb.hematological_table(gender) {
        if band.low <= hemoglobin && hemoglobin < band.high {
            for inner in &band.wbc {
                if inner.low <= wbc && wbc < inner.high {
                    return inner.state;
                }
            }
            return UNKNOWN_STATE;
        }
    }
    UNKNOWN_STATE
}
