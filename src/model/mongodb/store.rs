use log::{info, warn};
use mongodb::{
    bson::{doc, from_document},
    error::Result as DbResult,
    options::FindOptions,
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{
    ballot::Ballot,
    candidate::Candidate,
    store::{RecordOutcome, VotingStore},
    voter::VoterRecord,
};

use super::{
    ensure_counter_exists, ensure_indexes_exist, is_duplicate_key_error,
    is_transient_transaction_error, is_unknown_commit_result, CandidateDoc, Coll, Counter,
    InvalidBallot, CANDIDATE_ID_COUNTER,
};

/// How many times a transaction is tried before its error is returned.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// A store backed by MongoDB. Recording and invalidating ballots use
/// multi-document transactions, so the server must be a replica set or
/// sharded cluster.
pub struct MongoStore {
    client: Client,
    db: Database,
}

/// One row of the tally aggregation.
#[derive(Deserialize)]
struct TallyRow {
    #[serde(rename = "_id")]
    candidate_id: String,
    count: i64,
}

impl MongoStore {
    /// Connect to the database and perform any setup necessary.
    pub async fn connect(db_uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(db_uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        ensure_counter_exists(&Coll::from_db(&db), CANDIDATE_ID_COUNTER).await?;
        info!("Using MongoDB database {db_name}");
        Ok(Self { client, db })
    }

    fn candidates_coll(&self) -> Coll<CandidateDoc> {
        Coll::from_db(&self.db)
    }

    fn voters(&self) -> Coll<VoterRecord> {
        Coll::from_db(&self.db)
    }

    fn ballots(&self) -> Coll<Ballot> {
        Coll::from_db(&self.db)
    }

    fn invalid_ballots(&self) -> Coll<InvalidBallot> {
        Coll::from_db(&self.db)
    }

    /// One attempt at recording a ballot, inside the session's open transaction.
    /// Ends the transaction unless an error is returned.
    ///
    /// Both this and [`Self::try_invalidate_ballot`] write the ballot number's
    /// `invalid_ballots` key, so the server serialises them.
    async fn try_record_ballot(
        &self,
        session: &mut ClientSession,
        ballot: &Ballot,
        national_id: &str,
    ) -> DbResult<RecordOutcome> {
        // Claim the voter. A concurrent claim fails with a write conflict, so a
        // voter seen here as having voted did so in a committed transaction.
        let before = self
            .voters()
            .find_one_and_update_with_session(
                doc! {"national_id": national_id},
                doc! {"$set": { "voted": true }},
                None,
                session,
            )
            .await?;
        let outcome = match before {
            None => Some(RecordOutcome::VoterMissing),
            Some(voter) if voter.voted => Some(RecordOutcome::VoterAlreadyVoted),
            Some(_) => None,
        };
        if let Some(outcome) = outcome {
            session.abort_transaction().await?;
            return Ok(outcome);
        }

        // Take the ballot number's invalidation key for the rest of the transaction.
        let placeholder = InvalidBallot {
            ballot_number: ballot.ballot_number.clone(),
        };
        match self
            .invalid_ballots()
            .insert_one_with_session(&placeholder, None, session)
            .await
        {
            Ok(_) => {}
            Err(e) if is_duplicate_key_error(&e) => {
                session.abort_transaction().await?;
                return Ok(RecordOutcome::BallotInvalidated);
            }
            Err(e) => return Err(e),
        }

        match self
            .ballots()
            .insert_one_with_session(ballot, None, session)
            .await
        {
            Ok(_) => {}
            Err(e) if is_duplicate_key_error(&e) => {
                session.abort_transaction().await?;
                return Ok(RecordOutcome::BallotAlreadyCounted);
            }
            Err(e) => return Err(e),
        }

        self.invalid_ballots()
            .delete_one_with_session(doc! {"_id": &ballot.ballot_number}, None, session)
            .await?;
        commit(session).await?;
        Ok(RecordOutcome::Counted)
    }

    /// One attempt at invalidating a ballot number, inside the session's open
    /// transaction. Ends the transaction unless an error is returned.
    async fn try_invalidate_ballot(
        &self,
        session: &mut ClientSession,
        ballot_number: &str,
    ) -> DbResult<bool> {
        let invalid = InvalidBallot {
            ballot_number: ballot_number.to_string(),
        };
        match self
            .invalid_ballots()
            .insert_one_with_session(&invalid, None, session)
            .await
        {
            Ok(_) => {}
            // Already invalidated.
            Err(e) if is_duplicate_key_error(&e) => {
                session.abort_transaction().await?;
                return Ok(true);
            }
            Err(e) => return Err(e),
        }

        let counted = self
            .ballots()
            .count_documents_with_session(doc! {"_id": ballot_number}, None, session)
            .await?;
        if counted > 0 {
            session.abort_transaction().await?;
            return Ok(false);
        }
        commit(session).await?;
        Ok(true)
    }
}

/// Commit the session's transaction, retrying while the outcome is unknown.
async fn commit(session: &mut ClientSession) -> DbResult<()> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(e) if is_unknown_commit_result(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                warn!("Retrying commit (attempt {attempt}): {e}");
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[rocket::async_trait]
impl VotingStore for MongoStore {
    async fn add_candidate(&self, name: &str) -> Result<Candidate> {
        let candidates = self.candidates_coll();
        if let Some(existing) = candidates.find_one(doc! {"name": name}, None).await? {
            return Ok(existing.into());
        }

        let ordinal = Counter::next(&Coll::from_db(&self.db), CANDIDATE_ID_COUNTER).await?;
        let candidate = CandidateDoc::new(ordinal, name);
        match candidates.insert_one(&candidate, None).await {
            Ok(_) => Ok(candidate.into()),
            // Someone registered the same name concurrently; the unique index kept theirs.
            Err(e) if is_duplicate_key_error(&e) => candidates
                .find_one(doc! {"name": name}, None)
                .await?
                .map(Candidate::from)
                .ok_or(Error::Db(e)),
            Err(e) => Err(e.into()),
        }
    }

    async fn candidate(&self, candidate_id: &str) -> Result<Option<Candidate>> {
        let candidate = self
            .candidates_coll()
            .find_one(doc! {"_id": candidate_id}, None)
            .await?;
        Ok(candidate.map(Candidate::from))
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        let options = FindOptions::builder().sort(doc! {"ordinal": 1}).build();
        let candidates: Vec<Candidate> = self
            .candidates_coll()
            .find(None, options)
            .await?
            .map_ok(Candidate::from)
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn add_voter(&self, voter: VoterRecord) -> Result<bool> {
        match self.voters().insert_one(voter, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn voter(&self, national_id: &str) -> Result<Option<VoterRecord>> {
        let voter = self
            .voters()
            .find_one(doc! {"national_id": national_id}, None)
            .await?;
        Ok(voter)
    }

    async fn remove_voter(&self, national_id: &str) -> Result<bool> {
        let filter = doc! {
            "national_id": national_id,
            "fraud_committed": false,
        };
        let result = self.voters().delete_one(filter, None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn mark_fraud(&self, national_id: &str) -> Result<()> {
        let update = doc! {
            "$set": { "fraud_committed": true }
        };
        self.voters()
            .update_one(doc! {"national_id": national_id}, update, None)
            .await?;
        Ok(())
    }

    async fn record_ballot(&self, ballot: Ballot, national_id: &str) -> Result<RecordOutcome> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            session.start_transaction(None).await?;
            match self.try_record_ballot(&mut session, &ballot, national_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if is_transient_transaction_error(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    warn!("Retrying ballot transaction (attempt {attempt}): {e}");
                    // The transaction may already be over; server errors are ignored.
                    let _ = session.abort_transaction().await;
                    attempt += 1;
                }
                Err(e) => {
                    let _ = session.abort_transaction().await;
                    return Err(e.into());
                }
            }
        }
    }

    async fn is_ballot_counted(&self, ballot_number: &str) -> Result<bool> {
        let count = self
            .ballots()
            .count_documents(doc! {"_id": ballot_number}, None)
            .await?;
        Ok(count > 0)
    }

    async fn invalidate_ballot(&self, ballot_number: &str) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            session.start_transaction(None).await?;
            match self.try_invalidate_ballot(&mut session, ballot_number).await {
                Ok(invalidated) => return Ok(invalidated),
                Err(e) if is_transient_transaction_error(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    warn!("Retrying invalidation transaction (attempt {attempt}): {e}");
                    let _ = session.abort_transaction().await;
                    attempt += 1;
                }
                Err(e) => {
                    let _ = session.abort_transaction().await;
                    return Err(e.into());
                }
            }
        }
    }

    async fn is_ballot_invalidated(&self, ballot_number: &str) -> Result<bool> {
        let count = self
            .invalid_ballots()
            .count_documents(doc! {"_id": ballot_number}, None)
            .await?;
        Ok(count > 0)
    }

    async fn ballot_comments(&self) -> Result<Vec<String>> {
        let comments: Vec<String> = self
            .ballots()
            .find(None, None)
            .await?
            .map_ok(|ballot| ballot.comment)
            .try_collect()
            .await?;
        Ok(comments)
    }

    async fn tally(&self) -> Result<Vec<(String, u64)>> {
        let pipeline = [doc! {
            "$group": {
                "_id": "$candidate_id",
                "count": { "$sum": 1 },
            }
        }];
        let rows: Vec<_> = self
            .ballots()
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;

        let mut tally = Vec::with_capacity(rows.len());
        for row in rows {
            let row: TallyRow = from_document(row)?;
            tally.push((row.candidate_id, row.count.max(0) as u64));
        }
        Ok(tally)
    }

    async fn fraudulent_voters(&self) -> Result<Vec<VoterRecord>> {
        let voters: Vec<VoterRecord> = self
            .voters()
            .find(doc! {"fraud_committed": true}, None)
            .await?
            .try_collect()
            .await?;
        Ok(voters)
    }
}
