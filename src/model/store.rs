use crate::error::Result;
use crate::model::{ballot::Ballot, candidate::Candidate, voter::VoterRecord};

/// The result of trying to record a ballot against a voter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The ballot was stored and the voter marked as having voted.
    Counted,
    /// The voter was already marked as having voted; nothing was stored.
    VoterAlreadyVoted,
    /// No voter with this national ID is registered; nothing was stored.
    VoterMissing,
    /// A ballot with this number has already been counted; nothing was stored.
    BallotAlreadyCounted,
    /// The ballot number has been invalidated; nothing was stored.
    BallotInvalidated,
}

/// Persistent election state.
///
/// Voters are keyed by their obfuscated national ID (see
/// [`VoterKeys::obfuscate_national_id`](crate::model::voter::VoterKeys::obfuscate_national_id)).
/// Implementations must make [`VotingStore::add_voter`] and
/// [`VotingStore::record_ballot`] atomic with respect to concurrent callers.
#[rocket::async_trait]
pub trait VotingStore: Send + Sync {
    /// Register a candidate, or return the existing one with the same name.
    async fn add_candidate(&self, name: &str) -> Result<Candidate>;

    async fn candidate(&self, candidate_id: &str) -> Result<Option<Candidate>>;

    /// All candidates, in registration order.
    async fn candidates(&self) -> Result<Vec<Candidate>>;

    /// Insert a voter. Returns false if one with the same national ID exists.
    async fn add_voter(&self, voter: VoterRecord) -> Result<bool>;

    async fn voter(&self, national_id: &str) -> Result<Option<VoterRecord>>;

    /// Remove a voter unless they are flagged for fraud.
    /// Returns true iff a record was removed.
    async fn remove_voter(&self, national_id: &str) -> Result<bool>;

    async fn mark_fraud(&self, national_id: &str) -> Result<()>;

    /// Atomically store the ballot and mark the voter as having voted.
    /// Must not store a ballot whose number is invalidated, even by a
    /// concurrent [`VotingStore::invalidate_ballot`].
    async fn record_ballot(&self, ballot: Ballot, national_id: &str) -> Result<RecordOutcome>;

    async fn is_ballot_counted(&self, ballot_number: &str) -> Result<bool>;

    /// Mark a ballot number as unusable. Returns false if it was already counted.
    /// Atomic with respect to [`VotingStore::record_ballot`].
    async fn invalidate_ballot(&self, ballot_number: &str) -> Result<bool>;

    async fn is_ballot_invalidated(&self, ballot_number: &str) -> Result<bool>;

    /// Every stored comment, empty ones included.
    async fn ballot_comments(&self) -> Result<Vec<String>>;

    /// Ballot counts per candidate ID. Candidates without ballots may be omitted.
    async fn tally(&self) -> Result<Vec<(String, u64)>>;

    async fn fraudulent_voters(&self) -> Result<Vec<VoterRecord>>;
}
