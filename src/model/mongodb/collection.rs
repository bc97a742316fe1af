use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::model::{
    ballot::Ballot,
    candidate::{Candidate, CandidateId},
    voter::VoterRecord,
};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A candidate as stored. The ordinal keeps registration order sortable,
/// which the decimal string ID alone does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDoc {
    #[serde(rename = "_id")]
    pub candidate_id: CandidateId,
    pub name: String,
    pub ordinal: u64,
}

impl CandidateDoc {
    pub fn new(ordinal: u64, name: &str) -> Self {
        Self {
            candidate_id: ordinal.to_string(),
            name: name.to_string(),
            ordinal,
        }
    }
}

impl From<CandidateDoc> for Candidate {
    fn from(doc: CandidateDoc) -> Self {
        Self {
            name: doc.name,
            candidate_id: doc.candidate_id,
        }
    }
}

/// A ballot number that may no longer be cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidBallot {
    #[serde(rename = "_id")]
    pub ballot_number: String,
}

const CANDIDATES: &str = "candidates";
impl MongoCollection for CandidateDoc {
    const NAME: &'static str = CANDIDATES;
}

const VOTERS: &str = "voters";
impl MongoCollection for VoterRecord {
    const NAME: &'static str = VOTERS;
}

const BALLOTS: &str = "ballots";
impl MongoCollection for Ballot {
    const NAME: &'static str = BALLOTS;
}

const INVALID_BALLOTS: &str = "invalid_ballots";
impl MongoCollection for InvalidBallot {
    const NAME: &'static str = INVALID_BALLOTS;
}

const COUNTERS: &str = "counters";
impl MongoCollection for Counter {
    const NAME: &'static str = COUNTERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent. Ballot and invalid ballot numbers are
/// unique through their `_id`.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Voter collection.
    let voter_index = IndexModel::builder()
        .keys(doc! {"national_id": 1})
        .options(unique.clone())
        .build();
    Coll::<VoterRecord>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    // Candidate collection.
    let name_index = IndexModel::builder()
        .keys(doc! {"name": 1})
        .options(unique.clone())
        .build();
    let ordinal_index = IndexModel::builder().keys(doc! {"ordinal": 1}).build();
    Coll::<CandidateDoc>::from_db(db)
        .create_indexes([name_index, ordinal_index], None)
        .await?;

    Ok(())
}
