use super::{KnowledgeBase, TreatmentKey};

/// Look up the treatment instruction list for a classified state
/// tuple. A miss returns `None`; the caller decides how to report the
/// unmatched key.
pub fn treatment_for<'kb>(kb: &'kb KnowledgeBase, key: &TreatmentKey) -> Option<&'kb [String]> {
    kb.treatments().get(key).map(|v| v.as_slice())
}
