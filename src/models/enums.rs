use crate::db::StoreError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(StoreError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

/// Administrative gender as recorded on the patient row ("M"/"F").
/// Classification and treatment tables are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }

    /// Human-readable label used in reports and rule tables.
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" => Ok(Gender::Male),
            "F" => Ok(Gender::Female),
            _ => Err(StoreError::InvalidEnum {
                field: "Gender".into(),
                value: s.into(),
            }),
        }
    }
}

/// Systemic toxicity grade, ordered I < II < III < IV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ToxicityGrade {
    I,
    II,
    III,
    IV,
}

impl ToxicityGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            ToxicityGrade::I => "Grade I",
            ToxicityGrade::II => "Grade II",
            ToxicityGrade::III => "Grade III",
            ToxicityGrade::IV => "Grade IV",
        }
    }
}

str_enum!(ChillsLevel {
    None => "None",
    Shaking => "Shaking",
    Rigor => "Rigor",
});

str_enum!(SkinLook {
    Erythema => "Erythema",
    Vesiculation => "Vesiculation",
    Desquamation => "Desquamation",
    Exfoliation => "Exfoliation",
});

str_enum!(AllergicReaction {
    Edema => "Edema",
    Bronchospasm => "Bronchospasm",
    SevereBronchospasm => "Severe-Bronchospasm",
    AnaphylacticShock => "Anaphylactic-Shock",
});

impl ChillsLevel {
    /// Decode the stored numeric code (0/1/2).
    pub fn from_code(code: f64) -> Option<Self> {
        if code.fract() != 0.0 {
            return None;
        }
        match code as i64 {
            0 => Some(Self::None),
            1 => Some(Self::Shaking),
            2 => Some(Self::Rigor),
            _ => None,
        }
    }
}

impl SkinLook {
    /// Decode the stored numeric code (0..=3).
    pub fn from_code(code: f64) -> Option<Self> {
        if code.fract() != 0.0 {
            return None;
        }
        match code as i64 {
            0 => Some(Self::Erythema),
            1 => Some(Self::Vesiculation),
            2 => Some(Self::Desquamation),
            3 => Some(Self::Exfoliation),
            _ => None,
        }
    }
}

impl AllergicReaction {
    /// Decode the stored numeric code (0..=3).
    pub fn from_code(code: f64) -> Option<Self> {
        if code.fract() != 0.0 {
            return None;
        }
        match code as i64 {
            0 => Some(Self::Edema),
            1 => Some(Self::Bronchospasm),
            2 => Some(Self::SevereBronchospasm),
            3 => Some(Self::AnaphylacticShock),
            _ => None,
        }
    }
}

/// Registry of coded (categorical) test types. The stored value of
/// these tests is an integer code; everything that shows or grades
/// them decodes through this single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodedTest {
    Chills,
    SkinLook,
    AllergicState,
}

impl CodedTest {
    /// The coded test behind a test code, if any.
    pub fn for_code(test_code: &str) -> Option<Self> {
        match test_code {
            crate::loinc::CHILLS => Some(Self::Chills),
            crate::loinc::SKIN_LOOK => Some(Self::SkinLook),
            crate::loinc::ALLERGIC_STATE => Some(Self::AllergicState),
            _ => None,
        }
    }

    /// Decode a stored numeric code to its display label.
    pub fn decode(self, value: f64) -> Option<&'static str> {
        match self {
            Self::Chills => ChillsLevel::from_code(value).map(|v| v.as_str()),
            Self::SkinLook => SkinLook::from_code(value).map(|v| v.as_str()),
            Self::AllergicState => AllergicReaction::from_code(value).map(|v| v.as_str()),
        }
    }
}
