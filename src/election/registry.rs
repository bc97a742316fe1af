use log::{debug, info};

use crate::error::Result;
use crate::model::{
    candidate::Candidate,
    voter::{Voter, VoterStatus},
};

use super::Election;

// Voter and candidate registration. None of this is reachable over HTTP;
// it is driven by the seed configuration or by embedding code.
impl Election {
    /// Register a voter. This doesn't check eligibility; it only refuses
    /// a second registration for the same national ID.
    pub async fn register_voter(&self, voter: &Voter) -> Result<bool> {
        let record = self.keys().record_for(voter);
        let registered = self.store().add_voter(record).await?;
        if registered {
            info!("Registered a new voter");
        } else {
            debug!("Refused duplicate voter registration");
        }
        Ok(registered)
    }

    pub async fn get_voter_status(&self, national_id: &str) -> Result<VoterStatus> {
        let id = self.keys().obfuscate_national_id(national_id);
        let voter = self.store().voter(&id).await?;
        Ok(VoterStatus::of(voter.as_ref()))
    }

    /// Remove a voter at their request. Voters flagged for fraud stay on record.
    pub async fn de_register_voter(&self, national_id: &str) -> Result<bool> {
        let id = self.keys().obfuscate_national_id(national_id);
        let removed = self.store().remove_voter(&id).await?;
        if removed {
            info!("De-registered a voter");
        }
        Ok(removed)
    }

    /// Register a candidate, if not already registered under that name.
    pub async fn register_candidate(&self, name: &str) -> Result<Candidate> {
        let candidate = self.store().add_candidate(name.trim()).await?;
        debug!(
            "Candidate {} registered as {}",
            candidate.name, candidate.candidate_id
        );
        Ok(candidate)
    }

    pub async fn candidate_is_registered(&self, candidate_id: &str) -> Result<bool> {
        Ok(self.store().candidate(candidate_id).await?.is_some())
    }

    pub async fn get_all_candidates(&self) -> Result<Vec<Candidate>> {
        self.store().candidates().await
    }
}
