//! Reasoning pipeline: read the believed inputs at a time point,
//! classify, grade, resolve a treatment.
//!
//! All-or-nothing: a recommendation is only produced when all six
//! inputs are present. Anything less is a typed [`Assessment`]
//! outcome, never a partial answer and never an error.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, StoreError};
use crate::history::{LedgerReader, TemporalObservationReader};
use crate::knowledge::{
    hematological_state, hemoglobin_state, toxicity_grade, treatment_for, KnowledgeBase,
    ToxicityInputs, TreatmentKey,
};
use crate::loinc;
use crate::models::{
    AllergicReaction, ChillsLevel, Gender, Patient, SkinLook, ToxicityGrade,
};

/// The input categories the pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    Hemoglobin,
    WhiteBloodCells,
    Fever,
    Chills,
    SkinLook,
    AllergicState,
}

/// A fully resolved recommendation: raw inputs, derived states, grade
/// and the ordered care instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarePlan {
    pub gender: Gender,
    pub hemoglobin_value: f64,
    pub wbc_value: f64,
    pub fever_value: f64,
    pub chills: Option<String>,
    pub skin_look: Option<String>,
    pub allergic_state: Option<String>,
    pub hemoglobin_state: String,
    pub hematological_state: String,
    pub toxicity_grade: ToxicityGrade,
    pub instructions: Vec<String>,
}

/// Outcome of an evaluation. All three variants are normal results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum Assessment {
    Recommendation(CarePlan),
    /// The classified tuple matched no rule; carries the unmatched key
    /// for diagnostics.
    NoRecommendation { key: TreatmentKey },
    /// One or more required inputs had no believed value at the
    /// evaluation time.
    InsufficientData { missing: Vec<InputKind> },
}

/// Evaluate a patient at a point in valid time against the ledger.
pub fn evaluate(
    conn: &Connection,
    kb: &KnowledgeBase,
    patient_id: &Uuid,
    at: NaiveDateTime,
) -> Result<Assessment, StoreError> {
    let patient = db::get_patient(conn, patient_id)?.ok_or(StoreError::NotFound {
        entity: "patient",
        key: patient_id.to_string(),
    })?;
    assess(&LedgerReader::new(conn), kb, &patient, at)
}

/// Evaluate through any [`TemporalObservationReader`].
pub fn assess(
    reader: &impl TemporalObservationReader,
    kb: &KnowledgeBase,
    patient: &Patient,
    at: NaiveDateTime,
) -> Result<Assessment, StoreError> {
    let hemoglobin = reader.latest_value_as_of(&patient.id, loinc::HEMOGLOBIN, at)?;
    let wbc = reader.latest_value_as_of(&patient.id, loinc::WBC, at)?;
    let fever = reader.latest_value_as_of(&patient.id, loinc::BODY_TEMPERATURE, at)?;
    let chills = reader.latest_value_as_of(&patient.id, loinc::CHILLS, at)?;
    let skin = reader.latest_value_as_of(&patient.id, loinc::SKIN_LOOK, at)?;
    let allergy = reader.latest_value_as_of(&patient.id, loinc::ALLERGIC_STATE, at)?;

    let mut missing = Vec::new();
    let mut require = |value: Option<f64>, kind: InputKind| {
        if value.is_none() {
            missing.push(kind);
        }
    };
    require(hemoglobin, InputKind::Hemoglobin);
    require(wbc, InputKind::WhiteBloodCells);
    require(fever, InputKind::Fever);
    require(chills, InputKind::Chills);
    require(skin, InputKind::SkinLook);
    require(allergy, InputKind::AllergicState);

    if !missing.is_empty() {
        tracing::debug!(patient = %patient.id, ?missing, "assessment has missing inputs");
        return Ok(Assessment::InsufficientData { missing });
    }

    // All six are present past this point.
    let (Some(hemoglobin), Some(wbc), Some(fever), Some(chills), Some(skin), Some(allergy)) =
        (hemoglobin, wbc, fever, chills, skin, allergy)
    else {
        return Ok(Assessment::InsufficientData { missing });
    };

    // A stored code outside the map counts as present but contributes
    // no axis to the toxicity maximum.
    let chills_level = ChillsLevel::from_code(chills);
    let skin_look = SkinLook::from_code(skin);
    let allergic = AllergicReaction::from_code(allergy);

    let inputs = ToxicityInputs {
        fever: Some(fever),
        chills: chills_level,
        skin: skin_look,
        allergy: allergic,
    };
    let Some(grade) = toxicity_grade(&inputs) else {
        // Unreachable while fever is numeric, kept as a typed outcome
        // rather than a panic.
        return Ok(Assessment::InsufficientData {
            missing: vec![
                InputKind::Fever,
                InputKind::Chills,
                InputKind::SkinLook,
                InputKind::AllergicState,
            ],
        });
    };

    let hemo_state = hemoglobin_state(kb, patient.gender, hemoglobin);
    let hema_state = hematological_state(kb, patient.gender, hemoglobin, wbc);

    let key = TreatmentKey {
        gender: patient.gender,
        hemoglobin_state: hemo_state.to_string(),
        hematological_state: hema_state.to_string(),
        grade: Some(grade),
    };

    match treatment_for(kb, &key) {
        Some(instructions) => {
            tracing::info!(
                patient = %patient.id,
                hemo_state,
                hema_state,
                grade = grade.as_str(),
                "treatment resolved"
            );
            Ok(Assessment::Recommendation(CarePlan {
                gender: patient.gender,
                hemoglobin_value: hemoglobin,
                wbc_value: wbc,
                fever_value: fever,
                chills: chills_level.map(|v| v.as_str().to_string()),
                skin_look: skin_look.map(|v| v.as_str().to_string()),
                allergic_state: allergic.map(|v| v.as_str().to_string()),
                hemoglobin_state: hemo_state.to_string(),
                hematological_state: hema_state.to_string(),
                toxicity_grade: grade,
                instructions: instructions.to_vec(),
            }))
        }
        None => {
            tracing::debug!(patient = %patient.id, ?key, "no treatment rule matched");
            Ok(Assessment::NoRecommendation { key })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::NewObservation;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn dt(day: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn patient(conn: &Connection, gender: Gender) -> Patient {
        let p = Patient::new(
            "Omer",
            "Katz",
            gender,
            NaiveDate::from_ymd_opt(1969, 9, 30).unwrap(),
        );
        db::insert_patient(conn, &p).unwrap();
        p
    }

    fn insert(conn: &Connection, p: &Patient, code: &str, value: f64) {
        db::insert_observation(
            conn,
            &NewObservation {
                patient_id: p.id,
                test_code: code.into(),
                value,
                valid_start: dt(1, 8),
                valid_end: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn full_pipeline_resolves_a_care_plan() {
        let conn = open_memory_database().unwrap();
        let kb = KnowledgeBase::standard();
        let p = patient(&conn, Gender::Female);

        // Female 9.0 → Moderate Anemia; (0,12) × 4200 → Anemia;
        // fever 39.0 → Grade II; rest Grade I axes
        insert(&conn, &p, loinc::HEMOGLOBIN, 9.0);
        insert(&conn, &p, loinc::WBC, 4200.0);
        insert(&conn, &p, loinc::BODY_TEMPERATURE, 39.0);
        insert(&conn, &p, loinc::CHILLS, 0.0);
        insert(&conn, &p, loinc::SKIN_LOOK, 0.0);
        insert(&conn, &p, loinc::ALLERGIC_STATE, 0.0);

        let assessment = evaluate(&conn, &kb, &p.id, dt(2, 0)).unwrap();
        let Assessment::Recommendation(plan) = assessment else {
            panic!("expected a recommendation, got {assessment:?}");
        };
        assert_eq!(plan.hemoglobin_state, "Moderate Anemia");
        assert_eq!(plan.hematological_state, "Anemia");
        assert_eq!(plan.toxicity_grade, ToxicityGrade::II);
        assert_eq!(plan.chills.as_deref(), Some("None"));
        assert_eq!(
            plan.instructions[1],
            "Give Celectone 2g twice a day for two days drug treatment"
        );
    }

    #[test]
    fn missing_inputs_are_named() {
        let conn = open_memory_database().unwrap();
        let kb = KnowledgeBase::standard();
        let p = patient(&conn, Gender::Male);

        insert(&conn, &p, loinc::HEMOGLOBIN, 12.0);
        insert(&conn, &p, loinc::BODY_TEMPERATURE, 37.0);

        let assessment = evaluate(&conn, &kb, &p.id, dt(2, 0)).unwrap();
        let Assessment::InsufficientData { missing } = assessment else {
            panic!("expected insufficient data, got {assessment:?}");
        };
        assert_eq!(
            missing,
            vec![
                InputKind::WhiteBloodCells,
                InputKind::Chills,
                InputKind::SkinLook,
                InputKind::AllergicState,
            ]
        );
    }

    #[test]
    fn unmatched_tuple_reports_the_key() {
        let conn = open_memory_database().unwrap();
        let kb = KnowledgeBase::standard();
        let p = patient(&conn, Gender::Male);

        // Male 12.5 → Mild Anemia; (0,13) × 4200 → Anemia; Grade I —
        // no rule for (Mild Anemia, Anemia, I)
        insert(&conn, &p, loinc::HEMOGLOBIN, 12.5);
        insert(&conn, &p, loinc::WBC, 4200.0);
        insert(&conn, &p, loinc::BODY_TEMPERATURE, 36.6);
        insert(&conn, &p, loinc::CHILLS, 0.0);
        insert(&conn, &p, loinc::SKIN_LOOK, 0.0);
        insert(&conn, &p, loinc::ALLERGIC_STATE, 0.0);

        let assessment = evaluate(&conn, &kb, &p.id, dt(2, 0)).unwrap();
        let Assessment::NoRecommendation { key } = assessment else {
            panic!("expected no recommendation, got {assessment:?}");
        };
        assert_eq!(key.hemoglobin_state, "Mild Anemia");
        assert_eq!(key.hematological_state, "Anemia");
        assert_eq!(key.grade, Some(ToxicityGrade::I));
    }

    #[test]
    fn unknown_state_flows_into_no_recommendation() {
        let conn = open_memory_database().unwrap();
        let kb = KnowledgeBase::standard();
        let p = patient(&conn, Gender::Male);

        insert(&conn, &p, loinc::HEMOGLOBIN, -2.0); // outside every range
        insert(&conn, &p, loinc::WBC, 4200.0);
        insert(&conn, &p, loinc::BODY_TEMPERATURE, 36.6);
        insert(&conn, &p, loinc::CHILLS, 0.0);
        insert(&conn, &p, loinc::SKIN_LOOK, 0.0);
        insert(&conn, &p, loinc::ALLERGIC_STATE, 0.0);

        let assessment = evaluate(&conn, &kb, &p.id, dt(2, 0)).unwrap();
        let Assessment::NoRecommendation { key } = assessment else {
            panic!("expected no recommendation, got {assessment:?}");
        };
        assert_eq!(key.hemoglobin_state, "Unknown");
    }

    #[test]
    fn unknown_patient_is_an_error_not_an_outcome() {
        let conn = open_memory_database().unwrap();
        let kb = KnowledgeBase::standard();
        let result = evaluate(&conn, &kb, &Uuid::new_v4(), dt(2, 0));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn evaluation_respects_valid_time_point() {
        let conn = open_memory_database().unwrap();
        let kb = KnowledgeBase::standard();
        let p = patient(&conn, Gender::Male);
        insert(&conn, &p, loinc::HEMOGLOBIN, 12.0);

        // Before any observation's valid_start: everything missing
        let assessment = evaluate(&conn, &kb, &p.id, dt(1, 0)).unwrap();
        let Assessment::InsufficientData { missing } = assessment else {
            panic!("expected insufficient data, got {assessment:?}");
        };
        assert_eq!(missing.len(), 6);
    }

    /// In-memory reader stub, used to exercise the pipeline without a
    /// database.
    struct StubReader {
        values: HashMap<&'static str, f64>,
    }

    impl TemporalObservationReader for StubReader {
        fn latest_value_as_of(
            &self,
            _patient_id: &Uuid,
            test_code: &str,
            _at: NaiveDateTime,
        ) -> Result<Option<f64>, StoreError> {
            Ok(self.values.get(test_code).copied())
        }
    }

    #[test]
    fn assess_works_through_any_reader() {
        let kb = KnowledgeBase::standard();
        let p = Patient::new(
            "Maya",
            "Peled",
            Gender::Female,
            NaiveDate::from_ymd_opt(1995, 2, 11).unwrap(),
        );
        let reader = StubReader {
            values: [
                (loinc::HEMOGLOBIN, 7.0),
                (loinc::WBC, 2000.0),
                (loinc::BODY_TEMPERATURE, 36.5),
                (loinc::CHILLS, 0.0),
                (loinc::SKIN_LOOK, 0.0),
                (loinc::ALLERGIC_STATE, 0.0),
            ]
            .into_iter()
            .collect(),
        };

        // Female 7.0 → Severe Anemia; (0,12) × 2000 → Pancytopenia;
        // all axes Grade I → rule hit
        let assessment = assess(&reader, &kb, &p, dt(1, 0)).unwrap();
        let Assessment::Recommendation(plan) = assessment else {
            panic!("expected a recommendation, got {assessment:?}");
        };
        assert_eq!(plan.instructions, vec!["Measure BP every 3 days"]);
    }

    #[test]
    fn undecodable_codes_count_as_present_but_grade_without_them() {
        let kb = KnowledgeBase::standard();
        let p = Patient::new(
            "Maya",
            "Peled",
            Gender::Female,
            NaiveDate::from_ymd_opt(1995, 2, 11).unwrap(),
        );
        let reader = StubReader {
            values: [
                (loinc::HEMOGLOBIN, 7.0),
                (loinc::WBC, 2000.0),
                (loinc::BODY_TEMPERATURE, 36.5),
                (loinc::CHILLS, 9.0), // outside the code map
                (loinc::SKIN_LOOK, 0.0),
                (loinc::ALLERGIC_STATE, 0.0),
            ]
            .into_iter()
            .collect(),
        };

        let assessment = assess(&reader, &kb, &p, dt(1, 0)).unwrap();
        let Assessment::Recommendation(plan) = assessment else {
            panic!("expected a recommendation, got {assessment:?}");
        };
        assert_eq!(plan.chills, None);
        assert_eq!(plan.toxicity_grade, ToxicityGrade::I);
    }

    #[test]
    fn assessment_serializes_for_presentation() {
        let key = TreatmentKey {
            gender: Gender::Male,
            hemoglobin_state: "Mild Anemia".into(),
            hematological_state: "Anemia".into(),
            grade: Some(ToxicityGrade::I),
        };
        let json = serde_json::to_value(Assessment::NoRecommendation { key }).unwrap();
        assert_eq!(json["outcome"], "NoRecommendation");
        assert_eq!(json["key"]["hemoglobin_state"], "Mild Anemia");
    }
}
