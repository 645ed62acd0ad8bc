use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use super::types::*;
use crate::db::{self, StoreError};
use crate::loinc;
use crate::models::CodedTest;

/// Capability interface the reasoning pipeline reads through: "the
/// single believed value of a test at a point in valid time".
pub trait TemporalObservationReader {
    fn latest_value_as_of(
        &self,
        patient_id: &Uuid,
        test_code: &str,
        at: NaiveDateTime,
    ) -> Result<Option<f64>, StoreError>;
}

/// The ledger-backed reader.
pub struct LedgerReader<'c> {
    conn: &'c Connection,
}

impl<'c> LedgerReader<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl TemporalObservationReader for LedgerReader<'_> {
    fn latest_value_as_of(
        &self,
        patient_id: &Uuid,
        test_code: &str,
        at: NaiveDateTime,
    ) -> Result<Option<f64>, StoreError> {
        let row = db::latest_open_as_of(self.conn, patient_id, test_code, at)?;
        Ok(row.map(|o| o.value))
    }
}

/// Display form of a stored value: decoded label for coded tests,
/// plain number otherwise. Undecodable codes are shown, not hidden.
pub fn display_value(test_code: &str, value: f64) -> String {
    match CodedTest::for_code(test_code) {
        Some(coded) => coded
            .decode(value)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Unknown({value})")),
        None => value.to_string(),
    }
}

/// Time-sliced history of one test for one patient. `test` may be a
/// code or a free-text name fragment (resolved against the catalog).
pub fn history(
    conn: &Connection,
    patient_id: &Uuid,
    test: &str,
    since: NaiveDateTime,
    until: NaiveDateTime,
) -> Result<ObservationHistory, StoreError> {
    let test_code = db::resolve_test_code(conn, test)?;
    let common_name = db::test_common_name(conn, &test_code)?;

    let rows = db::open_observations_in_range(conn, patient_id, &test_code, since, until)?;
    let entries = rows
        .into_iter()
        .map(|observation| {
            let display = display_value(&observation.test_code, observation.value);
            HistoryEntry {
                observation,
                display_value: display,
            }
        })
        .collect();

    Ok(ObservationHistory {
        test_code,
        common_name,
        entries,
    })
}

/// The believed value of a test at a point in valid time, if any.
pub fn latest_value_as_of(
    conn: &Connection,
    patient_id: &Uuid,
    test_code: &str,
    at: NaiveDateTime,
) -> Result<Option<f64>, StoreError> {
    LedgerReader::new(conn).latest_value_as_of(patient_id, test_code, at)
}

/// Latest believed reading per monitored test for every patient.
pub fn patient_status(conn: &Connection) -> Result<Vec<PatientStatusRow>, StoreError> {
    let patients = db::list_patients(conn)?;
    let mut rows = Vec::with_capacity(patients.len());

    for patient in patients {
        let mut readings = Vec::with_capacity(loinc::MONITORED.len());
        for code in loinc::MONITORED {
            let latest = db::latest_observation(conn, &patient.id, code)?;
            readings.push(Reading {
                test_code: code.to_string(),
                display_value: latest.map(|o| display_value(code, o.value)),
            });
        }
        rows.push(PatientStatusRow {
            patient_id: patient.id,
            patient_name: patient.full_name(),
            readings,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::{Gender, NewObservation, Patient};
    use chrono::NaiveDate;

    fn dt(day: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn setup() -> (Connection, Patient) {
        let conn = open_memory_database().unwrap();
        let p = Patient::new(
            "Eli",
            "Baron",
            Gender::Male,
            NaiveDate::from_ymd_opt(1975, 11, 20).unwrap(),
        );
        db::insert_patient(&conn, &p).unwrap();
        (conn, p)
    }

    fn insert(conn: &Connection, p: &Patient, code: &str, value: f64, at: NaiveDateTime) {
        db::insert_observation(
            conn,
            &NewObservation {
                patient_id: p.id,
                test_code: code.into(),
                value,
                valid_start: at,
                valid_end: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn history_resolves_by_name_and_decodes() {
        let (conn, p) = setup();
        insert(&conn, &p, loinc::CHILLS, 2.0, dt(1, 9));
        insert(&conn, &p, loinc::CHILLS, 1.0, dt(2, 9));

        let hist = history(&conn, &p.id, "chills", dt(1, 0), dt(3, 0)).unwrap();
        assert_eq!(hist.test_code, loinc::CHILLS);
        assert!(hist.common_name.is_some());
        assert_eq!(hist.entries.len(), 2);
        assert_eq!(hist.entries[0].display_value, "Rigor");
        assert_eq!(hist.entries[1].display_value, "Shaking");
    }

    #[test]
    fn history_unknown_test_is_not_found() {
        let (conn, p) = setup();
        let result = history(&conn, &p.id, "ferritin", dt(1, 0), dt(2, 0));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn undecodable_code_is_shown_not_hidden() {
        let (conn, p) = setup();
        insert(&conn, &p, loinc::SKIN_LOOK, 9.0, dt(1, 9));

        let hist = history(&conn, &p.id, loinc::SKIN_LOOK, dt(1, 0), dt(2, 0)).unwrap();
        assert_eq!(hist.entries[0].display_value, "Unknown(9)");
    }

    #[test]
    fn latest_value_as_of_respects_valid_time() {
        let (conn, p) = setup();
        db::insert_observation(
            &conn,
            &NewObservation {
                patient_id: p.id,
                test_code: loinc::HEMOGLOBIN.into(),
                value: 10.0,
                valid_start: dt(1, 8),
                valid_end: Some(dt(2, 8)),
            },
        )
        .unwrap();
        insert(&conn, &p, loinc::HEMOGLOBIN, 13.5, dt(3, 8));

        assert_eq!(
            latest_value_as_of(&conn, &p.id, loinc::HEMOGLOBIN, dt(1, 12)).unwrap(),
            Some(10.0)
        );
        // Gap between the bounded row and the next draw
        assert_eq!(
            latest_value_as_of(&conn, &p.id, loinc::HEMOGLOBIN, dt(2, 20)).unwrap(),
            None
        );
        assert_eq!(
            latest_value_as_of(&conn, &p.id, loinc::HEMOGLOBIN, dt(5, 0)).unwrap(),
            Some(13.5)
        );
    }

    #[test]
    fn status_covers_all_monitored_tests() {
        let (conn, p) = setup();
        insert(&conn, &p, loinc::HEMOGLOBIN, 14.2, dt(1, 8));
        insert(&conn, &p, loinc::ALLERGIC_STATE, 1.0, dt(1, 8));

        let rows = patient_status(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].patient_name, "Eli Baron");
        assert_eq!(rows[0].readings.len(), 6);

        let by_code = |code: &str| {
            rows[0]
                .readings
                .iter()
                .find(|r| r.test_code == code)
                .unwrap()
                .display_value
                .clone()
        };
        assert_eq!(by_code(loinc::HEMOGLOBIN), Some("14.2".to_string()));
        assert_eq!(by_code(loinc::ALLERGIC_STATE), Some("Bronchospasm".to_string()));
        assert_eq!(by_code(loinc::WBC), None);
    }
}
