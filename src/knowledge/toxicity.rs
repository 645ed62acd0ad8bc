use crate::models::{AllergicReaction, ChillsLevel, SkinLook, ToxicityGrade};

/// Up to four independent symptom axes observed at one evaluation
/// time. Absent axes simply do not contribute to the maximum.
#[derive(Debug, Clone, Default)]
pub struct ToxicityInputs {
    pub fever: Option<f64>,
    pub chills: Option<ChillsLevel>,
    pub skin: Option<SkinLook>,
    pub allergy: Option<AllergicReaction>,
}

/// Monotonic fever ladder: < 38.5 °C is Grade I, < 40.0 °C Grade II,
/// anything at or above 40.0 °C Grade III. Fever alone never reaches
/// Grade IV.
fn fever_grade(celsius: f64) -> ToxicityGrade {
    if celsius < 38.5 {
        ToxicityGrade::I
    } else if celsius < 40.0 {
        ToxicityGrade::II
    } else {
        ToxicityGrade::III
    }
}

fn chills_grade(level: ChillsLevel) -> ToxicityGrade {
    match level {
        ChillsLevel::None => ToxicityGrade::I,
        ChillsLevel::Shaking => ToxicityGrade::II,
        ChillsLevel::Rigor => ToxicityGrade::III,
    }
}

fn skin_grade(look: SkinLook) -> ToxicityGrade {
    match look {
        SkinLook::Erythema => ToxicityGrade::I,
        SkinLook::Vesiculation => ToxicityGrade::II,
        SkinLook::Desquamation => ToxicityGrade::III,
        SkinLook::Exfoliation => ToxicityGrade::IV,
    }
}

fn allergy_grade(reaction: AllergicReaction) -> ToxicityGrade {
    match reaction {
        AllergicReaction::Edema => ToxicityGrade::I,
        AllergicReaction::Bronchospasm => ToxicityGrade::II,
        AllergicReaction::SevereBronchospasm => ToxicityGrade::III,
        AllergicReaction::AnaphylacticShock => ToxicityGrade::IV,
    }
}

/// Overall systemic toxicity: the maximum grade across the axes that
/// have data. `None` when no axis has data; the pipeline turns that
/// into an explicit insufficient-data outcome rather than defaulting.
pub fn toxicity_grade(inputs: &ToxicityInputs) -> Option<ToxicityGrade> {
    let axes = [
        inputs.fever.map(fever_grade),
        inputs.chills.map(chills_grade),
        inputs.skin.map(skin_grade),
        inputs.allergy.map(allergy_grade),
    ];
    axes.into_iter().flatten().max()
}
