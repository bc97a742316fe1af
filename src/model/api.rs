use serde::{Deserialize, Serialize};

use crate::model::candidate::CandidateId;

/// A ballot as submitted by the ballot form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSubmission {
    pub voter_national_id: String,
    pub ballot_number: String,
    pub chosen_candidate_id: CandidateId,
    pub voter_comments: String,
}

/// The body of every `count_ballot` response and of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

impl StatusBody {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}
