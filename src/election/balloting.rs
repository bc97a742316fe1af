use std::collections::{BTreeSet, HashMap};

use log::{info, warn};

use crate::error::Result;
use crate::model::{
    api::BallotSubmission,
    ballot::{ballot_number_matches, new_ballot_number, Ballot, BallotStatus},
    candidate::Candidate,
    store::RecordOutcome,
    voter::VoterStatus,
};

use super::{redaction::redact_free_text, Election};

impl Election {
    /// Issue a new ballot to a registered voter. Older ballots stay valid.
    /// Returns `None` if the voter isn't registered.
    pub async fn issue_ballot(&self, national_id: &str) -> Result<Option<String>> {
        if self.get_voter_status(national_id).await? == VoterStatus::NotRegistered {
            return Ok(None);
        }
        Ok(Some(new_ballot_number(national_id).await?))
    }

    /// Check that the ballot was issued to this voter and has not been invalidated.
    pub async fn verify_ballot(&self, national_id: &str, ballot_number: &str) -> Result<bool> {
        if !ballot_number_matches(ballot_number, national_id).await {
            return Ok(false);
        }
        Ok(!self.store().is_ballot_invalidated(ballot_number).await?)
    }

    /// Mark a ballot as unusable. Fails (returning false) if it has already been cast.
    pub async fn invalidate_ballot(&self, ballot_number: &str) -> Result<bool> {
        let invalidated = self.store().invalidate_ballot(ballot_number).await?;
        if invalidated {
            info!("Invalidated a ballot");
        }
        Ok(invalidated)
    }

    /// Validate and count a ballot. The comment is redacted before it is stored,
    /// and nothing linking the ballot to the voter is kept.
    pub async fn count_ballot(&self, submission: BallotSubmission) -> Result<BallotStatus> {
        let national_id = self
            .keys()
            .obfuscate_national_id(&submission.voter_national_id);

        let voter = match self.store().voter(&national_id).await? {
            Some(voter) => voter,
            None => return Ok(BallotStatus::VoterNotRegistered),
        };
        if voter.voted {
            warn!("Repeat ballot submitted; flagging voter for fraud");
            self.store().mark_fraud(&national_id).await?;
            return Ok(BallotStatus::FraudCommitted);
        }

        if !ballot_number_matches(&submission.ballot_number, &submission.voter_national_id).await {
            return Ok(BallotStatus::VoterBallotMismatch);
        }
        if self
            .store()
            .is_ballot_invalidated(&submission.ballot_number)
            .await?
        {
            return Ok(BallotStatus::InvalidBallot);
        }
        if !self
            .candidate_is_registered(&submission.chosen_candidate_id)
            .await?
        {
            return Ok(BallotStatus::InvalidBallot);
        }

        let first_name = self.keys().decrypt_name(&voter.first_name)?;
        let last_name = self.keys().decrypt_name(&voter.last_name)?;
        let comment = redact_free_text(&submission.voter_comments, &first_name, &last_name);

        let ballot = Ballot::new(
            submission.ballot_number,
            submission.chosen_candidate_id,
            comment,
        );
        let status = match self.store().record_ballot(ballot, &national_id).await? {
            RecordOutcome::Counted => BallotStatus::BallotCounted,
            RecordOutcome::VoterAlreadyVoted => {
                warn!("Concurrent repeat ballot submitted; flagging voter for fraud");
                self.store().mark_fraud(&national_id).await?;
                BallotStatus::FraudCommitted
            }
            // De-registered since the lookup above.
            RecordOutcome::VoterMissing => BallotStatus::VoterNotRegistered,
            RecordOutcome::BallotAlreadyCounted | RecordOutcome::BallotInvalidated => {
                BallotStatus::InvalidBallot
            }
        };
        if status.is_counted() {
            info!("Ballot counted");
        }
        Ok(status)
    }

    /// All non-empty (already redacted) ballot comments.
    pub async fn get_all_ballot_comments(&self) -> Result<BTreeSet<String>> {
        let comments = self.store().ballot_comments().await?;
        Ok(comments.into_iter().filter(|c| !c.is_empty()).collect())
    }

    /// Votes per registered candidate, in registration order.
    pub async fn tally(&self) -> Result<Vec<(Candidate, u64)>> {
        let counts: HashMap<String, u64> = self.store().tally().await?.into_iter().collect();
        let candidates = self.get_all_candidates().await?;
        Ok(candidates
            .into_iter()
            .map(|candidate| {
                let votes = counts.get(&candidate.candidate_id).copied().unwrap_or(0);
                (candidate, votes)
            })
            .collect())
    }

    /// The candidate with the most votes, even without a majority. Ties go to
    /// the earliest-registered candidate. `None` if no ballots were counted.
    pub async fn compute_election_winner(&self) -> Result<Option<Candidate>> {
        let mut winner: Option<(Candidate, u64)> = None;
        for (candidate, votes) in self.tally().await? {
            let leads = match &winner {
                Some((_, best)) => votes > *best,
                None => votes > 0,
            };
            if leads {
                winner = Some((candidate, votes));
            }
        }
        Ok(winner.map(|(candidate, _)| candidate))
    }

    /// The full names ("First Last") of every voter flagged for fraud.
    pub async fn get_all_fraudulent_voters(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for voter in self.store().fraudulent_voters().await? {
            let first_name = self.keys().decrypt_name(&voter.first_name)?;
            let last_name = self.keys().decrypt_name(&voter.last_name)?;
            names.insert(format!("{first_name} {last_name}"));
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rocket::futures::future::join_all;

    use super::*;
    use crate::model::{
        memory::MemoryStore,
        store::VotingStore,
        voter::{Voter, VoterKeys, VoterRecord},
    };

    /// An election with three candidates and two registered voters.
    async fn election() -> Election {
        let election = Election::example();
        for name in ["Joseph Klimek", "Rose Hervey", "Yeong Qi"] {
            election.register_candidate(name).await.unwrap();
        }
        election.register_voter(&Voter::example()).await.unwrap();
        election.register_voter(&Voter::example2()).await.unwrap();
        election
    }

    fn submission(voter: &Voter, ballot_number: &str, candidate_id: &str) -> BallotSubmission {
        BallotSubmission::example(&voter.national_id, ballot_number, candidate_id)
    }

    #[rocket::async_test]
    async fn issue_only_to_registered_voters() {
        let election = election().await;
        let voter = Voter::example();
        let ballot = election.issue_ballot(&voter.national_id).await.unwrap();
        let ballot = ballot.unwrap();
        assert!(election
            .verify_ballot(&voter.national_id, &ballot)
            .await
            .unwrap());
        assert!(!election
            .verify_ballot(&Voter::example2().national_id, &ballot)
            .await
            .unwrap());

        assert_eq!(election.issue_ballot("999999999").await.unwrap(), None);
    }

    #[rocket::async_test]
    async fn count_once_then_fraud() {
        let election = election().await;
        let voter = Voter::example();
        let first = election
            .issue_ballot(&voter.national_id)
            .await
            .unwrap()
            .unwrap();
        let second = election
            .issue_ballot(&voter.national_id)
            .await
            .unwrap()
            .unwrap();

        let status = election
            .count_ballot(submission(&voter, &first, "1"))
            .await
            .unwrap();
        assert_eq!(status, BallotStatus::BallotCounted);
        assert_eq!(
            election.get_voter_status(&voter.national_id).await.unwrap(),
            VoterStatus::BallotCounted
        );

        let status = election
            .count_ballot(submission(&voter, &second, "2"))
            .await
            .unwrap();
        assert_eq!(status, BallotStatus::FraudCommitted);
        assert_eq!(
            election.get_voter_status(&voter.national_id).await.unwrap(),
            VoterStatus::FraudCommitted
        );
        assert_eq!(
            election.get_all_fraudulent_voters().await.unwrap(),
            BTreeSet::from(["Adam Smith".to_string()])
        );
        // Fraud stays on record.
        assert!(!election.de_register_voter(&voter.national_id).await.unwrap());

        // Only the first ballot was counted.
        let tally = election.tally().await.unwrap();
        let votes = tally.iter().map(|(_, v)| *v).collect::<Vec<_>>();
        assert_eq!(votes, vec![1, 0, 0]);
    }

    #[rocket::async_test]
    async fn rejections() {
        let election = election().await;
        let adam = Voter::example();
        let thien = Voter::example2();
        let adams_ballot = election
            .issue_ballot(&adam.national_id)
            .await
            .unwrap()
            .unwrap();

        // Not registered.
        let stranger = Voter::new("Linda", "Qi", "444444444");
        assert_eq!(
            election
                .count_ballot(submission(&stranger, &adams_ballot, "1"))
                .await
                .unwrap(),
            BallotStatus::VoterNotRegistered
        );

        // Someone else's ballot.
        assert_eq!(
            election
                .count_ballot(submission(&thien, &adams_ballot, "1"))
                .await
                .unwrap(),
            BallotStatus::VoterBallotMismatch
        );
        assert_eq!(
            election
                .count_ballot(submission(&thien, "garbage", "1"))
                .await
                .unwrap(),
            BallotStatus::VoterBallotMismatch
        );

        // Unknown candidate.
        assert_eq!(
            election
                .count_ballot(submission(&adam, &adams_ballot, "42"))
                .await
                .unwrap(),
            BallotStatus::InvalidBallot
        );

        // Invalidated ballot.
        assert!(election.invalidate_ballot(&adams_ballot).await.unwrap());
        assert!(!election
            .verify_ballot(&adam.national_id, &adams_ballot)
            .await
            .unwrap());
        assert_eq!(
            election
                .count_ballot(submission(&adam, &adams_ballot, "1"))
                .await
                .unwrap(),
            BallotStatus::InvalidBallot
        );

        // None of those counted as a vote.
        assert_eq!(
            election.get_voter_status(&adam.national_id).await.unwrap(),
            VoterStatus::RegisteredNotVoted
        );
        assert_eq!(election.compute_election_winner().await.unwrap(), None);
    }

    #[rocket::async_test]
    async fn counted_ballots_cannot_be_invalidated() {
        let election = election().await;
        let voter = Voter::example();
        let ballot = election
            .issue_ballot(&voter.national_id)
            .await
            .unwrap()
            .unwrap();
        election
            .count_ballot(submission(&voter, &ballot, "3"))
            .await
            .unwrap();
        assert!(!election.invalidate_ballot(&ballot).await.unwrap());
    }

    #[rocket::async_test]
    async fn comments_are_redacted() {
        let election = election().await;
        let voter = Voter::example();
        let ballot = election
            .issue_ballot(&voter.national_id)
            .await
            .unwrap()
            .unwrap();
        let mut ballot = submission(&voter, &ballot, "1");
        ballot.voter_comments = "Adam here, reach me on 555-123-4567".to_string();
        election.count_ballot(ballot).await.unwrap();

        // Empty comments are left out.
        let thien = Voter::example2();
        let ballot = election
            .issue_ballot(&thien.national_id)
            .await
            .unwrap()
            .unwrap();
        election
            .count_ballot(submission(&thien, &ballot, "1"))
            .await
            .unwrap();

        assert_eq!(
            election.get_all_ballot_comments().await.unwrap(),
            BTreeSet::from([
                "[REDACTED NAME] here, reach me on [REDACTED PHONE NUMBER]".to_string()
            ])
        );
    }

    #[rocket::async_test]
    async fn winner_and_ties() {
        let election = election().await;
        let adam = Voter::example();
        let thien = Voter::example2();

        for (voter, candidate) in [(&adam, "3"), (&thien, "2")] {
            let ballot = election
                .issue_ballot(&voter.national_id)
                .await
                .unwrap()
                .unwrap();
            election
                .count_ballot(submission(voter, &ballot, candidate))
                .await
                .unwrap();
        }
        // One vote each: the earlier registration wins.
        let winner = election.compute_election_winner().await.unwrap().unwrap();
        assert_eq!(winner.name, "Rose Hervey");

        let linda = Voter::new("Linda", "Qi", "444444444");
        election.register_voter(&linda).await.unwrap();
        let ballot = election
            .issue_ballot(&linda.national_id)
            .await
            .unwrap()
            .unwrap();
        election
            .count_ballot(submission(&linda, &ballot, "3"))
            .await
            .unwrap();
        let winner = election.compute_election_winner().await.unwrap().unwrap();
        assert_eq!(winner.name, "Yeong Qi");
    }

    #[rocket::async_test]
    async fn concurrent_submissions_count_once() {
        let election = election().await;
        let voter = Voter::example();
        let mut submissions = Vec::new();
        for candidate in ["1", "2", "3", "1"] {
            let ballot = election
                .issue_ballot(&voter.national_id)
                .await
                .unwrap()
                .unwrap();
            submissions.push(submission(&voter, &ballot, candidate));
        }

        let statuses = join_all(
            submissions
                .into_iter()
                .map(|submission| election.count_ballot(submission)),
        )
        .await
        .into_iter()
        .map(|status| status.unwrap())
        .collect::<Vec<_>>();

        let counted = statuses.iter().filter(|s| s.is_counted()).count();
        assert_eq!(counted, 1);
        assert!(statuses
            .iter()
            .filter(|s| !s.is_counted())
            .all(|s| *s == BallotStatus::FraudCommitted));
        let total: u64 = election.tally().await.unwrap().iter().map(|(_, v)| v).sum();
        assert_eq!(total, 1);
    }

    /// A store that invalidates a chosen ballot number as soon as a candidate
    /// is looked up, i.e. between the checks and the recording of a ballot.
    struct InvalidatingStore {
        inner: MemoryStore,
        target: Mutex<Option<String>>,
    }

    #[rocket::async_trait]
    impl VotingStore for InvalidatingStore {
        async fn add_candidate(&self, name: &str) -> Result<Candidate> {
            self.inner.add_candidate(name).await
        }

        async fn candidate(&self, candidate_id: &str) -> Result<Option<Candidate>> {
            let target = self.target.lock().unwrap().take();
            if let Some(ballot_number) = target {
                assert!(self.inner.invalidate_ballot(&ballot_number).await?);
            }
            self.inner.candidate(candidate_id).await
        }

        async fn candidates(&self) -> Result<Vec<Candidate>> {
            self.inner.candidates().await
        }

        async fn add_voter(&self, voter: VoterRecord) -> Result<bool> {
            self.inner.add_voter(voter).await
        }

        async fn voter(&self, national_id: &str) -> Result<Option<VoterRecord>> {
            self.inner.voter(national_id).await
        }

        async fn remove_voter(&self, national_id: &str) -> Result<bool> {
            self.inner.remove_voter(national_id).await
        }

        async fn mark_fraud(&self, national_id: &str) -> Result<()> {
            self.inner.mark_fraud(national_id).await
        }

        async fn record_ballot(&self, ballot: Ballot, national_id: &str) -> Result<RecordOutcome> {
            self.inner.record_ballot(ballot, national_id).await
        }

        async fn is_ballot_counted(&self, ballot_number: &str) -> Result<bool> {
            self.inner.is_ballot_counted(ballot_number).await
        }

        async fn invalidate_ballot(&self, ballot_number: &str) -> Result<bool> {
            self.inner.invalidate_ballot(ballot_number).await
        }

        async fn is_ballot_invalidated(&self, ballot_number: &str) -> Result<bool> {
            self.inner.is_ballot_invalidated(ballot_number).await
        }

        async fn ballot_comments(&self) -> Result<Vec<String>> {
            self.inner.ballot_comments().await
        }

        async fn tally(&self) -> Result<Vec<(String, u64)>> {
            self.inner.tally().await
        }

        async fn fraudulent_voters(&self) -> Result<Vec<VoterRecord>> {
            self.inner.fraudulent_voters().await
        }
    }

    #[rocket::async_test]
    async fn ballots_invalidated_mid_count_are_not_counted() {
        let store = Arc::new(InvalidatingStore {
            inner: MemoryStore::new(),
            target: Mutex::new(None),
        });
        let election = Election::new(store.clone(), VoterKeys::example());
        election.register_candidate("Rose Hervey").await.unwrap();
        let voter = Voter::example();
        election.register_voter(&voter).await.unwrap();
        let ballot = election
            .issue_ballot(&voter.national_id)
            .await
            .unwrap()
            .unwrap();

        *store.target.lock().unwrap() = Some(ballot.clone());
        assert_eq!(
            election
                .count_ballot(submission(&voter, &ballot, "1"))
                .await
                .unwrap(),
            BallotStatus::InvalidBallot
        );
        assert!(store.target.lock().unwrap().is_none());

        assert!(!store.is_ballot_counted(&ballot).await.unwrap());
        assert_eq!(
            election.get_voter_status(&voter.national_id).await.unwrap(),
            VoterStatus::RegisteredNotVoted
        );
        assert!(election.get_all_fraudulent_voters().await.unwrap().is_empty());
    }
}
