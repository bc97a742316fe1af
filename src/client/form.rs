use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, warn};

use super::{BallotApi, ClientError, FormError};
use crate::model::{
    api::BallotSubmission,
    candidate::{Candidate, CandidateId},
};

pub const MISSING_BALLOT_NUMBER: &str = "Please specify a ballot number";
pub const MISSING_NATIONAL_ID: &str = "Please specify your National ID";
pub const MISSING_CANDIDATE: &str = "Please select a candidate";
pub const BALLOT_CAST: &str = "Ballot has been casted.";
pub const DEREGISTRATION_HINT: &str =
    "You can de-register yourself by contacting the voter registrar.";

const BALLOT_CAST_TIMEOUT: Duration = Duration::from_millis(3000);
const DEREGISTRATION_HINT_TIMEOUT: Duration = Duration::from_millis(5000);

/// How a notice should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Primary,
    Success,
    Warning,
    Danger,
}

/// A message for the voter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub intent: Intent,
    /// How long to show the notice for; `None` means until dismissed.
    pub timeout: Option<Duration>,
}

impl Notice {
    fn danger(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            intent: Intent::Danger,
            timeout: None,
        }
    }
}

/// Where a form is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Filled,
    Submitting,
    Submitted,
    Failed,
}

/// What a call to [`BallotForm::submit`] achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A field was missing, so nothing was sent.
    Incomplete,
    /// The server refused the ballot for the given reason.
    Rejected(String),
    /// The ballot was counted and the form has been cleared.
    Cast,
}

/// Collects a voter's choice and submits it through a [`BallotApi`].
pub struct BallotForm<A> {
    api: A,
    candidates: Vec<Candidate>,
    national_id: String,
    ballot_number: String,
    selected: Option<CandidateId>,
    comments: String,
    phase: Phase,
    notices: VecDeque<Notice>,
}

impl<A: BallotApi> BallotForm<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            candidates: Vec::new(),
            national_id: String::new(),
            ballot_number: String::new(),
            selected: None,
            comments: String::new(),
            phase: Phase::Empty,
            notices: VecDeque::new(),
        }
    }

    /// Fetch the candidates to choose from, in the order the server lists
    /// them. On failure the current list is kept.
    pub async fn load_candidates(&mut self) -> Result<&[Candidate], ClientError> {
        match self.api.get_all_candidates().await {
            Ok(candidates) => {
                debug!("Loaded {} candidates", candidates.len());
                self.candidates = candidates;
                Ok(&self.candidates)
            }
            Err(e) => {
                warn!("Failed to load candidates: {e}");
                self.notify(Notice::danger(format!("Failed to load candidates: {e}")));
                Err(e)
            }
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn set_national_id(&mut self, national_id: impl Into<String>) {
        self.national_id = national_id.into();
        self.edited();
    }

    pub fn set_ballot_number(&mut self, ballot_number: impl Into<String>) {
        self.ballot_number = ballot_number.into();
        self.edited();
    }

    /// Choose a candidate from the loaded list.
    pub fn select_candidate(&mut self, candidate_id: &str) -> Result<(), FormError> {
        if !self
            .candidates
            .iter()
            .any(|c| c.candidate_id == candidate_id)
        {
            return Err(FormError::UnknownCandidate(candidate_id.to_string()));
        }
        self.selected = Some(candidate_id.to_string());
        self.edited();
        Ok(())
    }

    pub fn set_comments(&mut self, comments: impl Into<String>) {
        self.comments = comments.into();
        self.edited();
    }

    pub fn national_id(&self) -> &str {
        &self.national_id
    }

    pub fn ballot_number(&self) -> &str {
        &self.ballot_number
    }

    pub fn selected_candidate(&self) -> Option<&Candidate> {
        let selected = self.selected.as_deref()?;
        self.candidates.iter().find(|c| c.candidate_id == selected)
    }

    pub fn comments(&self) -> &str {
        &self.comments
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Remove and return the notices raised so far, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Check that every required field is present and send the ballot.
    ///
    /// Nothing is sent if a field is missing. The fields are only cleared
    /// once the server has counted the ballot.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, ClientError> {
        let missing = if self.ballot_number.is_empty() {
            Some(MISSING_BALLOT_NUMBER)
        } else if self.national_id.is_empty() {
            Some(MISSING_NATIONAL_ID)
        } else if self.selected.is_none() {
            Some(MISSING_CANDIDATE)
        } else {
            None
        };
        if let Some(message) = missing {
            self.notify(Notice::danger(message));
            return Ok(SubmitOutcome::Incomplete);
        }

        let ballot = BallotSubmission {
            voter_national_id: self.national_id.clone(),
            ballot_number: self.ballot_number.clone(),
            chosen_candidate_id: self.selected.clone().unwrap_or_default(),
            voter_comments: self.comments.clone(),
        };
        self.phase = Phase::Submitting;
        let response = match self.api.count_ballot(&ballot).await {
            Ok(response) => response,
            Err(e) => {
                self.phase = Phase::Failed;
                self.notify(Notice::danger(format!("Error casting ballot: {e}")));
                return Err(e);
            }
        };

        if !response.accepted {
            debug!("Ballot rejected: {}", response.status);
            self.phase = Phase::Failed;
            self.notify(Notice::danger(format!(
                "Error casting ballot: {}",
                response.status
            )));
            return Ok(SubmitOutcome::Rejected(response.status));
        }

        self.notify(Notice {
            message: BALLOT_CAST.to_string(),
            intent: Intent::Success,
            timeout: Some(BALLOT_CAST_TIMEOUT),
        });
        self.notify(Notice {
            message: DEREGISTRATION_HINT.to_string(),
            intent: Intent::Primary,
            timeout: Some(DEREGISTRATION_HINT_TIMEOUT),
        });
        self.national_id.clear();
        self.ballot_number.clear();
        self.selected = None;
        self.comments.clear();
        self.phase = Phase::Submitted;
        Ok(SubmitOutcome::Cast)
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push_back(notice);
    }

    fn edited(&mut self) {
        let empty = self.national_id.is_empty()
            && self.ballot_number.is_empty()
            && self.selected.is_none()
            && self.comments.is_empty();
        self.phase = if empty { Phase::Empty } else { Phase::Filled };
    }
}
