use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::StoreError;
use crate::models::{Gender, NewObservation, Observation, Patient};

pub(crate) fn fmt_dt(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn parse_dt(s: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| StoreError::InvalidValue {
            field: "datetime",
            value: s.into(),
        })
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|_| StoreError::InvalidValue {
        field: "uuid",
        value: s.into(),
    })
}

// ═══════════════════════════════════════════
// Patient Repository
// ═══════════════════════════════════════════

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO patients (id, first_name, last_name, gender, birth_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            patient.id.to_string(),
            patient.first_name,
            patient.last_name,
            patient.gender.as_str(),
            patient.birth_date.to_string(),
        ],
    )?;
    Ok(())
}

struct PatientRow {
    id: String,
    first_name: String,
    last_name: String,
    gender: String,
    birth_date: String,
}

fn map_patient_row(row: &Row) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        gender: row.get(3)?,
        birth_date: row.get(4)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, StoreError> {
    Ok(Patient {
        id: parse_uuid(&row.id)?,
        gender: Gender::from_str(&row.gender)?,
        birth_date: NaiveDate::parse_from_str(&row.birth_date, "%Y-%m-%d").map_err(|_| {
            StoreError::InvalidValue {
                field: "birth_date",
                value: row.birth_date.clone(),
            }
        })?,
        first_name: row.first_name,
        last_name: row.last_name,
    })
}

const PATIENT_COLUMNS: &str = "id, first_name, last_name, gender, birth_date";

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], map_patient_row);
    match result {
        Ok(row) => Ok(Some(patient_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Exact, case-sensitive match on first + last name.
pub fn find_patient_by_name(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
) -> Result<Option<Patient>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients
         WHERE first_name = ?1 AND last_name = ?2 LIMIT 1"
    ))?;

    let result = stmt.query_row(params![first_name, last_name], map_patient_row);
    match result {
        Ok(row) => Ok(Some(patient_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY last_name, first_name"
    ))?;

    let rows = stmt.query_map([], map_patient_row)?;
    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row?)?);
    }
    Ok(patients)
}

// ═══════════════════════════════════════════
// Test Catalog
// ═══════════════════════════════════════════

pub fn insert_test_code(conn: &Connection, code: &str, common_name: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO test_catalog (code, common_name) VALUES (?1, ?2)",
        params![code, common_name],
    )?;
    Ok(())
}

pub fn test_common_name(conn: &Connection, code: &str) -> Result<Option<String>, StoreError> {
    let result = conn.query_row(
        "SELECT common_name FROM test_catalog WHERE code = ?1",
        params![code],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(name) => Ok(Some(name)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Resolve a test by exact code, or by case-insensitive substring match
/// against the catalog's common names. Zero or more than one fuzzy hit
/// is a NotFound — ambiguity is never resolved silently.
pub fn resolve_test_code(conn: &Connection, query: &str) -> Result<String, StoreError> {
    if test_common_name(conn, query)?.is_some() {
        return Ok(query.to_string());
    }

    let mut stmt = conn.prepare(
        "SELECT code FROM test_catalog
         WHERE instr(lower(common_name), lower(?1)) > 0
         ORDER BY code",
    )?;
    let codes: Vec<String> = stmt
        .query_map(params![query], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    match codes.as_slice() {
        [code] => Ok(code.clone()),
        _ => Err(StoreError::NotFound {
            entity: "test code",
            key: query.to_string(),
        }),
    }
}

// ═══════════════════════════════════════════
// Observation Ledger
// ═══════════════════════════════════════════

const OBSERVATION_COLUMNS: &str =
    "id, patient_id, test_code, value, valid_start, valid_end, txn_start, txn_end";

struct ObservationRow {
    id: String,
    patient_id: String,
    test_code: String,
    value: f64,
    valid_start: String,
    valid_end: Option<String>,
    txn_start: String,
    txn_end: Option<String>,
}

fn map_observation_row(row: &Row) -> rusqlite::Result<ObservationRow> {
    Ok(ObservationRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        test_code: row.get(2)?,
        value: row.get(3)?,
        valid_start: row.get(4)?,
        valid_end: row.get(5)?,
        txn_start: row.get(6)?,
        txn_end: row.get(7)?,
    })
}

fn observation_from_row(row: ObservationRow) -> Result<Observation, StoreError> {
    Ok(Observation {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        value: row.value,
        valid_start: parse_dt(&row.valid_start)?,
        valid_end: row.valid_end.as_deref().map(parse_dt).transpose()?,
        txn_start: parse_dt(&row.txn_start)?,
        txn_end: row.txn_end.as_deref().map(parse_dt).transpose()?,
        test_code: row.test_code,
    })
}

fn query_one_observation(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Option<Observation>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let result = stmt.query_row(params, map_observation_row);
    match result {
        Ok(row) => Ok(Some(observation_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Append a new open row with `txn_start = now`. This primitive does
/// not enforce the one-open-row invariant; the retroactive editor does.
pub fn insert_observation(
    conn: &Connection,
    new: &NewObservation,
) -> Result<Observation, StoreError> {
    insert_observation_at(conn, new, Utc::now().naive_utc())
}

/// Append a new open row with an explicit transaction start, used by
/// retroactive corrections so the successor's belief interval starts
/// exactly at the correction time.
pub fn insert_observation_at(
    conn: &Connection,
    new: &NewObservation,
    txn_start: NaiveDateTime,
) -> Result<Observation, StoreError> {
    let obs = Observation {
        id: Uuid::new_v4(),
        patient_id: new.patient_id,
        test_code: new.test_code.clone(),
        value: new.value,
        valid_start: new.valid_start,
        valid_end: new.valid_end,
        txn_start,
        txn_end: None,
    };
    conn.execute(
        "INSERT INTO observations (id, patient_id, test_code, value, valid_start, valid_end, txn_start, txn_end)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
        params![
            obs.id.to_string(),
            obs.patient_id.to_string(),
            obs.test_code,
            obs.value,
            fmt_dt(obs.valid_start),
            obs.valid_end.map(fmt_dt),
            fmt_dt(obs.txn_start),
        ],
    )?;
    Ok(obs)
}

pub fn get_observation(conn: &Connection, id: &Uuid) -> Result<Option<Observation>, StoreError> {
    query_one_observation(
        conn,
        &format!("SELECT {OBSERVATION_COLUMNS} FROM observations WHERE id = ?1"),
        &[&id.to_string()],
    )
}

/// Close a row's transaction time. Guarded compare-and-swap on
/// `txn_end IS NULL`: a row that is already closed yields Conflict,
/// a row that does not exist yields NotFound. Never overwrites.
pub fn close_observation(
    conn: &Connection,
    id: &Uuid,
    txn_end: NaiveDateTime,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE observations SET txn_end = ?1 WHERE id = ?2 AND txn_end IS NULL",
        params![fmt_dt(txn_end), id.to_string()],
    )?;
    if changed == 1 {
        return Ok(());
    }

    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM observations WHERE id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    if exists > 0 {
        Err(StoreError::Conflict(format!(
            "observation {id} is already closed"
        )))
    } else {
        Err(StoreError::NotFound {
            entity: "observation",
            key: id.to_string(),
        })
    }
}

/// Currently-believed rows whose valid interval overlaps
/// `[since, until]`, ordered by valid_start ascending.
pub fn open_observations_in_range(
    conn: &Connection,
    patient_id: &Uuid,
    test_code: &str,
    since: NaiveDateTime,
    until: NaiveDateTime,
) -> Result<Vec<Observation>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OBSERVATION_COLUMNS} FROM observations
         WHERE patient_id = ?1 AND test_code = ?2
           AND txn_end IS NULL
           AND valid_start <= ?3
           AND (valid_end IS NULL OR valid_end >= ?4)
         ORDER BY valid_start ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            patient_id.to_string(),
            test_code,
            fmt_dt(until),
            fmt_dt(since)
        ],
        map_observation_row,
    )?;

    let mut observations = Vec::new();
    for row in rows {
        observations.push(observation_from_row(row?)?);
    }
    Ok(observations)
}

/// The single currently-believed row whose valid interval contains
/// `at`. Several such rows violate the one-open-row invariant but are
/// tolerated: the most recently started wins.
pub fn latest_open_as_of(
    conn: &Connection,
    patient_id: &Uuid,
    test_code: &str,
    at: NaiveDateTime,
) -> Result<Option<Observation>, StoreError> {
    query_one_observation(
        conn,
        &format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations
             WHERE patient_id = ?1 AND test_code = ?2
               AND txn_end IS NULL
               AND valid_start <= ?3
               AND (valid_end IS NULL OR valid_end >= ?3)
             ORDER BY valid_start DESC LIMIT 1"
        ),
        &[&patient_id.to_string(), &test_code, &fmt_dt(at)],
    )
}

/// Most recent currently-believed row regardless of window (status
/// overview).
pub fn latest_observation(
    conn: &Connection,
    patient_id: &Uuid,
    test_code: &str,
) -> Result<Option<Observation>, StoreError> {
    query_one_observation(
        conn,
        &format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations
             WHERE patient_id = ?1 AND test_code = ?2 AND txn_end IS NULL
             ORDER BY valid_start DESC LIMIT 1"
        ),
        &[&patient_id.to_string(), &test_code],
    )
}

/// Row a retroactive update should correct: currently believed,
/// `valid_start` within `[measured_at, measured_at + tolerance]`,
/// most recent txn_start wins.
pub fn find_correction_candidate(
    conn: &Connection,
    patient_id: &Uuid,
    test_code: &str,
    measured_at: NaiveDateTime,
    tolerance: chrono::Duration,
) -> Result<Option<Observation>, StoreError> {
    query_one_observation(
        conn,
        &format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations
             WHERE patient_id = ?1 AND test_code = ?2
               AND txn_end IS NULL
               AND valid_start >= ?3 AND valid_start <= ?4
             ORDER BY txn_start DESC LIMIT 1"
        ),
        &[
            &patient_id.to_string(),
            &test_code,
            &fmt_dt(measured_at),
            &fmt_dt(measured_at + tolerance),
        ],
    )
}

/// Row a retroactive delete should close: currently believed, with the
/// most recent valid_start, optionally constrained to the tolerance
/// window around `measured_at`.
pub fn find_deletion_candidate(
    conn: &Connection,
    patient_id: &Uuid,
    test_code: &str,
    measured_at: Option<NaiveDateTime>,
    tolerance: chrono::Duration,
) -> Result<Option<Observation>, StoreError> {
    match measured_at {
        Some(at) => query_one_observation(
            conn,
            &format!(
                "SELECT {OBSERVATION_COLUMNS} FROM observations
                 WHERE patient_id = ?1 AND test_code = ?2
                   AND txn_end IS NULL
                   AND valid_start >= ?3 AND valid_start <= ?4
                 ORDER BY valid_start DESC LIMIT 1"
            ),
            &[
                &patient_id.to_string(),
                &test_code,
                &fmt_dt(at),
                &fmt_dt(at + tolerance),
            ],
        ),
        None => query_one_observation(
            conn,
            &format!(
                "SELECT {OBSERVATION_COLUMNS} FROM observations
                 WHERE patient_id = ?1 AND test_code = ?2 AND txn_end IS NULL
                 ORDER BY valid_start DESC LIMIT 1"
            ),
            &[&patient_id.to_string(), &test_code],
        ),
    }
}

/// Count of currently-believed rows for a ledger key.
pub fn count_open_rows(
    conn: &Connection,
    patient_id: &Uuid,
    test_code: &str,
) -> Result<i64, StoreError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM observations
         WHERE patient_id = ?1 AND test_code = ?2 AND txn_end IS NULL",
        params![patient_id.to_string(), test_code],
        |row| row.get(0),
    )?;
    Ok(count)
}
