use serde::{Deserialize, Serialize};

/// Candidate identifiers are decimal strings assigned in registration order.
pub type CandidateId = String;

/// An electable option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub candidate_id: CandidateId,
}

impl Candidate {
    pub fn new(candidate_id: u64, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidate_id: candidate_id.to_string(),
        }
    }

    /// Registration order of this candidate, if the ID is well-formed.
    pub fn ordinal(&self) -> Option<u64> {
        self.candidate_id.parse().ok()
    }
}
