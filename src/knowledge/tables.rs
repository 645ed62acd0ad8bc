use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::models::{Gender, ToxicityGrade};

/// One half-open `[low, high)` hemoglobin bracket with its state label
/// and freshness window (how long a draw in this state stays
/// representative, asymmetric around the draw time).
#[derive(Debug, Clone)]
pub struct HemoglobinBand {
    pub low: f64,
    pub high: f64,
    pub state: &'static str,
    pub good_before: Duration,
    pub good_after: Duration,
}

#[derive(Debug, Clone)]
pub struct WbcBand {
    pub low: f64,
    pub high: f64,
    pub state: &'static str,
}

/// Outer hemoglobin bracket selecting an inner WBC table.
#[derive(Debug, Clone)]
pub struct HematologicalBand {
    pub low: f64,
    pub high: f64,
    pub wbc: Vec<WbcBand>,
}

/// Key of the treatment decision table. `grade` is optional so a
/// lookup made without a toxicity grade deterministically misses the
/// graded rules instead of guessing one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreatmentKey {
    pub gender: Gender,
    pub hemoglobin_state: String,
    pub hematological_state: String,
    pub grade: Option<ToxicityGrade>,
}

/// Immutable clinical rule tables, built once at startup.
#[derive(Debug)]
pub struct KnowledgeBase {
    male_hemoglobin: Vec<HemoglobinBand>,
    female_hemoglobin: Vec<HemoglobinBand>,
    male_hematological: Vec<HematologicalBand>,
    female_hematological: Vec<HematologicalBand>,
    treatments: HashMap<TreatmentKey, Vec<String>>,
}

fn band(
    low: f64,
    high: f64,
    state: &'static str,
    good_before_days: i64,
    good_after_days: i64,
) -> HemoglobinBand {
    HemoglobinBand {
        low,
        high,
        state,
        good_before: Duration::days(good_before_days),
        good_after: Duration::days(good_after_days),
    }
}

fn wbc(low: f64, high: f64, state: &'static str) -> WbcBand {
    WbcBand { low, high, state }
}

fn rule(
    gender: Gender,
    hemoglobin_state: &str,
    hematological_state: &str,
    grade: ToxicityGrade,
    instructions: &[&str],
) -> (TreatmentKey, Vec<String>) {
    (
        TreatmentKey {
            gender,
            hemoglobin_state: hemoglobin_state.to_string(),
            hematological_state: hematological_state.to_string(),
            grade: Some(grade),
        },
        instructions.iter().map(|s| s.to_string()).collect(),
    )
}

impl KnowledgeBase {
    /// The standard rule set.
    pub fn standard() -> Self {
        use Gender::{Female, Male};
        use ToxicityGrade as G;

        let male_hemoglobin = vec![
            band(0.0, 9.0, "Severe Anemia", 2, 5),
            band(9.0, 11.0, "Moderate Anemia", 2, 4),
            band(11.0, 13.0, "Mild Anemia", 1, 3),
            band(13.0, 16.0, "Normal Hemoglobin", 1, 2),
            band(16.0, f64::INFINITY, "Polyhemia", 1, 1),
        ];
        let female_hemoglobin = vec![
            band(0.0, 8.0, "Severe Anemia", 2, 5),
            band(8.0, 10.0, "Moderate Anemia", 2, 4),
            band(10.0, 12.0, "Mild Anemia", 1, 3),
            band(12.0, 14.0, "Normal Hemoglobin", 1, 2),
            band(14.0, f64::INFINITY, "Suspected Polycytemia Vera", 1, 1),
        ];

        let low_wbc_states = vec![
            wbc(0.0, 4000.0, "Pancytopenia"),
            wbc(4000.0, 10000.0, "Anemia"),
            wbc(10000.0, f64::INFINITY, "Suspected Leukemia"),
        ];
        let mid_wbc_states = vec![
            wbc(0.0, 4000.0, "Leukopenia"),
            wbc(4000.0, 10000.0, "Normal"),
            wbc(10000.0, f64::INFINITY, "Leukemoid reaction"),
        ];
        let high_wbc_states = vec![
            wbc(0.0, 4000.0, "Suspected Polycytemia Vera"),
            wbc(4000.0, 10000.0, "Polyhemia"),
            wbc(10000.0, f64::INFINITY, "Suspected Polycytemia Vera"),
        ];

        let male_hematological = vec![
            HematologicalBand { low: 0.0, high: 13.0, wbc: low_wbc_states.clone() },
            HematologicalBand { low: 13.0, high: 16.0, wbc: mid_wbc_states.clone() },
            HematologicalBand { low: 16.0, high: f64::INFINITY, wbc: high_wbc_states.clone() },
        ];
        let female_hematological = vec![
            HematologicalBand { low: 0.0, high: 12.0, wbc: low_wbc_states },
            HematologicalBand { low: 12.0, high: 14.0, wbc: mid_wbc_states },
            HematologicalBand { low: 14.0, high: f64::INFINITY, wbc: high_wbc_states },
        ];

        let treatments: HashMap<TreatmentKey, Vec<String>> = [
            rule(Male, "Severe Anemia", "Pancytopenia", G::I, &[
                "Measure BP once a week",
            ]),
            rule(Male, "Moderate Anemia", "Anemia", G::II, &[
                "Measure BP every 3 days",
                "Give aspirin 5g twice a week",
            ]),
            rule(Male, "Mild Anemia", "Suspected Leukemia", G::III, &[
                "Measure BP every day",
                "Give aspirin 15g every day",
                "Diet consultation",
            ]),
            rule(Male, "Normal Hemoglobin", "Leukemoid reaction", G::IV, &[
                "Measure BP twice a day",
                "Give aspirin 15g every day",
                "Exercise consultation",
                "Diet consultation",
            ]),
            rule(Male, "Polyhemia", "Suspected Polycytemia Vera", G::IV, &[
                "Measure BP every hour",
                "Give 1 gr magnesium every hour",
                "Exercise consultation",
                "Call family",
            ]),
            rule(Female, "Severe Anemia", "Pancytopenia", G::I, &[
                "Measure BP every 3 days",
            ]),
            rule(Female, "Moderate Anemia", "Anemia", G::II, &[
                "Measure BP every 3 days",
                "Give Celectone 2g twice a day for two days drug treatment",
            ]),
            rule(Female, "Mild Anemia", "Suspected Leukemia", G::III, &[
                "Measure BP every day",
                "Give 1 gr magnesium every 3 hours",
                "Diet consultation",
            ]),
            rule(Female, "Normal Hemoglobin", "Leukemoid reaction", G::IV, &[
                "Measure BP twice a day",
                "Give 1 gr magnesium every hour",
                "Exercise consultation",
                "Diet consultation",
            ]),
            rule(Female, "Polyhemia", "Suspected Polycytemia Vera", G::IV, &[
                "Measure BP every hour",
                "Give 1 gr magnesium every hour",
                "Exercise consultation",
                "Call help",
            ]),
        ]
        .into_iter()
        .collect();

        Self {
            male_hemoglobin,
            female_hemoglobin,
            male_hematological,
            female_hematological,
            treatments,
        }
    }

    pub fn hemoglobin_table(&self, gender: Gender) -> &[HemoglobinBand] {
        match gender {
            Gender::Male => &self.male_hemoglobin,
            Gender::Female => &self.female_hemoglobin,
        }
    }

    pub fn hematological_table(&self, gender: Gender) -> &[HematologicalBand] {
        match gender {
            Gender::Male => &self.male_hematological,
            Gender::Female => &self.female_hematological,
        }
    }

    pub(crate) fn treatments(&self) -> &HashMap<TreatmentKey, Vec<String>> {
        &self.treatments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_tile_without_gaps() {
        let kb = KnowledgeBase::standard();
        for gender in [Gender::Male, Gender::Female] {
            let table = kb.hemoglobin_table(gender);
            assert_eq!(table[0].low, 0.0);
            for pair in table.windows(2) {
                assert_eq!(pair[0].high, pair[1].low, "gap in {gender:?} table");
            }
            assert_eq!(table.last().unwrap().high, f64::INFINITY);
        }
    }

    #[test]
    fn every_rule_carries_a_grade() {
        let kb = KnowledgeBase::standard();
        assert_eq!(kb.treatments().len(), 10);
        assert!(kb.treatments().keys().all(|k| k.grade.is_some()));
    }
}
