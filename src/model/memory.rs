use std::collections::{BTreeMap, HashMap, HashSet};

use rocket::tokio::sync::Mutex;

use crate::error::Result;
use crate::model::{
    ballot::Ballot,
    candidate::Candidate,
    store::{RecordOutcome, VotingStore},
    voter::VoterRecord,
};

#[derive(Default)]
struct State {
    next_candidate_id: u64,
    candidates: BTreeMap<u64, Candidate>,
    voters: HashMap<String, VoterRecord>,
    ballots: HashMap<String, Ballot>,
    invalid_ballots: HashSet<String>,
}

/// A store that lives only as long as the process. Every operation holds a
/// single lock for its whole duration, which makes them all atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl VotingStore for MemoryStore {
    async fn add_candidate(&self, name: &str) -> Result<Candidate> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.candidates.values().find(|c| c.name == name) {
            return Ok(existing.clone());
        }
        state.next_candidate_id += 1;
        let id = state.next_candidate_id;
        let candidate = Candidate::new(id, name);
        state.candidates.insert(id, candidate.clone());
        Ok(candidate)
    }

    async fn candidate(&self, candidate_id: &str) -> Result<Option<Candidate>> {
        let state = self.state.lock().await;
        let candidate = candidate_id
            .parse::<u64>()
            .ok()
            .and_then(|id| state.candidates.get(&id))
            .filter(|c| c.candidate_id == candidate_id)
            .cloned();
        Ok(candidate)
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        let state = self.state.lock().await;
        Ok(state.candidates.values().cloned().collect())
    }

    async fn add_voter(&self, voter: VoterRecord) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.voters.contains_key(&voter.national_id) {
            return Ok(false);
        }
        state.voters.insert(voter.national_id.clone(), voter);
        Ok(true)
    }

    async fn voter(&self, national_id: &str) -> Result<Option<VoterRecord>> {
        let state = self.state.lock().await;
        Ok(state.voters.get(national_id).cloned())
    }

    async fn remove_voter(&self, national_id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let removable = matches!(state.voters.get(national_id), Some(v) if !v.fraud_committed);
        if removable {
            state.voters.remove(national_id);
        }
        Ok(removable)
    }

    async fn mark_fraud(&self, national_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(voter) = state.voters.get_mut(national_id) {
            voter.fraud_committed = true;
        }
        Ok(())
    }

    async fn record_ballot(&self, ballot: Ballot, national_id: &str) -> Result<RecordOutcome> {
        let mut state = self.state.lock().await;
        match state.voters.get(national_id) {
            None => return Ok(RecordOutcome::VoterMissing),
            Some(voter) if voter.voted => return Ok(RecordOutcome::VoterAlreadyVoted),
            Some(_) => {}
        }
        if state.invalid_ballots.contains(&ballot.ballot_number) {
            return Ok(RecordOutcome::BallotInvalidated);
        }
        if state.ballots.contains_key(&ballot.ballot_number) {
            return Ok(RecordOutcome::BallotAlreadyCounted);
        }
        if let Some(voter) = state.voters.get_mut(national_id) {
            voter.voted = true;
        }
        state.ballots.insert(ballot.ballot_number.clone(), ballot);
        Ok(RecordOutcome::Counted)
    }

    async fn is_ballot_counted(&self, ballot_number: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.ballots.contains_key(ballot_number))
    }

    async fn invalidate_ballot(&self, ballot_number: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.ballots.contains_key(ballot_number) {
            return Ok(false);
        }
        state.invalid_ballots.insert(ballot_number.to_string());
        Ok(true)
    }

    async fn is_ballot_invalidated(&self, ballot_number: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.invalid_ballots.contains(ballot_number))
    }

    async fn ballot_comments(&self) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state.ballots.values().map(|b| b.comment.clone()).collect())
    }

    async fn tally(&self) -> Result<Vec<(String, u64)>> {
        let state = self.state.lock().await;
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for ballot in state.ballots.values() {
            *counts.entry(ballot.candidate_id.as_str()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(id, count)| (id.to_string(), count))
            .collect())
    }

    async fn fraudulent_voters(&self) -> Result<Vec<VoterRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .voters
            .values()
            .filter(|v| v.fraud_committed)
            .cloned()
            .collect())
    }
}
