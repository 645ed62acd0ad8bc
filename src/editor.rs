//! Retroactive corrections of the observation ledger.
//!
//! A correction never rewrites history: it closes the transaction time
//! of the believed row and, for updates, appends a successor carrying
//! the corrected value with the same valid-time interval. Close and
//! insert happen inside one SQL transaction so a crash can never leave
//! two believed rows for the same (patient, test, valid-time) key.

use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, StoreError};
use crate::models::{NewObservation, Observation, Patient};

/// Editor policy. `match_tolerance` is the window after `measured_at`
/// inside which a row's valid_start is considered "the" measurement
/// being corrected. Deliberately explicit: widening or narrowing it
/// changes which row a correction targets.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub match_tolerance: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            match_tolerance: Duration::seconds(1),
        }
    }
}

/// Result of a successful update: the belief that was closed and the
/// open successor that replaced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub closed: Observation,
    pub replacement: Observation,
}

fn split_full_name(full_name: &str) -> Result<(&str, &str), StoreError> {
    let trimmed = full_name.trim();
    trimmed
        .split_once(char::is_whitespace)
        .map(|(first, last)| (first, last.trim_start()))
        .ok_or_else(|| StoreError::InvalidValue {
            field: "patient_name",
            value: full_name.to_string(),
        })
}

fn resolve_patient(conn: &Connection, full_name: &str) -> Result<Patient, StoreError> {
    let (first, last) = split_full_name(full_name)?;
    db::find_patient_by_name(conn, first, last)?.ok_or(StoreError::NotFound {
        entity: "patient",
        key: full_name.to_string(),
    })
}

/// Correct the value of the observation measured at `measured_at`
/// (within the configured tolerance): close the believed row at
/// `txn_at` and append a successor with the new value and the same
/// valid-time interval. Returns `Ok(None)` when no candidate row
/// matches the tolerance window.
pub fn retroactive_update(
    conn: &mut Connection,
    cfg: &EditorConfig,
    patient_name: &str,
    test: &str,
    measured_at: NaiveDateTime,
    txn_at: NaiveDateTime,
    new_value: f64,
) -> Result<Option<Correction>, StoreError> {
    let patient = resolve_patient(conn, patient_name)?;
    let test_code = db::resolve_test_code(conn, test)?;

    let tx = conn.transaction()?;

    let Some(old) = db::find_correction_candidate(
        &tx,
        &patient.id,
        &test_code,
        measured_at,
        cfg.match_tolerance,
    )?
    else {
        tracing::debug!(
            patient = %patient.id,
            %test_code,
            %measured_at,
            "retroactive update: no row within tolerance"
        );
        return Ok(None);
    };

    db::close_observation(&tx, &old.id, txn_at)?;
    let replacement = db::insert_observation_at(
        &tx,
        &NewObservation {
            patient_id: old.patient_id,
            test_code: old.test_code.clone(),
            value: new_value,
            valid_start: old.valid_start,
            valid_end: old.valid_end,
        },
        txn_at,
    )?;

    tx.commit()?;

    tracing::info!(
        patient = %patient.id,
        %test_code,
        closed = %old.id,
        replacement = %replacement.id,
        "retroactive update applied"
    );

    let closed = Observation {
        txn_end: Some(txn_at),
        ..old
    };
    Ok(Some(Correction { closed, replacement }))
}

/// Retroactively remove a belief: close the believed row with the most
/// recent valid_start (optionally constrained near `measured_at`) at
/// `delete_at`, inserting no successor. Returns the closed row, or
/// `Ok(None)` when nothing matches.
pub fn retroactive_delete(
    conn: &mut Connection,
    cfg: &EditorConfig,
    patient_name: &str,
    test: &str,
    delete_at: NaiveDateTime,
    measured_at: Option<NaiveDateTime>,
) -> Result<Option<Observation>, StoreError> {
    let patient = resolve_patient(conn, patient_name)?;
    let test_code = db::resolve_test_code(conn, test)?;

    let tx = conn.transaction()?;

    let Some(old) = db::find_deletion_candidate(
        &tx,
        &patient.id,
        &test_code,
        measured_at,
        cfg.match_tolerance,
    )?
    else {
        return Ok(None);
    };

    db::close_observation(&tx, &old.id, delete_at)?;
    tx.commit()?;

    tracing::info!(
        patient = %patient.id,
        %test_code,
        closed = %old.id,
        "retroactive delete applied"
    );

    Ok(Some(Observation {
        txn_end: Some(delete_at),
        ..old
    }))
}

/// Correct an observation addressed directly by id. Same versioning
/// discipline as [`retroactive_update`], with the correction time set
/// to now.
pub fn update_observation_value(
    conn: &mut Connection,
    observation_id: &Uuid,
    new_value: f64,
) -> Result<Correction, StoreError> {
    let old = db::get_observation(conn, observation_id)?.ok_or(StoreError::NotFound {
        entity: "observation",
        key: observation_id.to_string(),
    })?;

    let now = Utc::now().naive_utc();
    let tx = conn.transaction()?;

    db::close_observation(&tx, &old.id, now)?;
    let replacement = db::insert_observation_at(
        &tx,
        &NewObservation {
            patient_id: old.patient_id,
            test_code: old.test_code.clone(),
            value: new_value,
            valid_start: old.valid_start,
            valid_end: old.valid_end,
        },
        now,
    )?;

    tx.commit()?;

    let closed = Observation {
        txn_end: Some(now),
        ..old
    };
    Ok(Correction { closed, replacement })
}
