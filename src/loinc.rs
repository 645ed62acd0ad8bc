//! Test codes the decision engine monitors.
//!
//! The observation ledger itself accepts any test code; these six are
//! the ones the reasoning pipeline and the status overview read.

pub const HEMOGLOBIN: &str = "718-7";
pub const WBC: &str = "11218-5";
pub const BODY_TEMPERATURE: &str = "8310-5";
pub const CHILLS: &str = "75326-8";
pub const SKIN_LOOK: &str = "39106-0";
pub const ALLERGIC_STATE: &str = "69730-0";

/// All monitored codes, in display order.
pub const MONITORED: [&str; 6] = [
    HEMOGLOBIN,
    WBC,
    BODY_TEMPERATURE,
    CHILLS,
    SKIN_LOOK,
    ALLERGIC_STATE,
];
