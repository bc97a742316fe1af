use std::fmt::{Display, Formatter};

use argon2::Config;
use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use rand::Rng;
use rocket::tokio::task::spawn_blocking;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{candidate::CandidateId, voter::sanitize_national_id};

/// Salt length for ballot numbers, as recommended for Argon2.
const SALT_LENGTH: usize = 16;

/// Unpadded base64 length of `bytes` bytes, as Argon2 encodes them.
fn encoded_length(bytes: usize) -> usize {
    (bytes * 4 + 2) / 3
}

/// Whether an encoded hash uses exactly the parameters we issue ballot
/// numbers with. Verifying takes its cost from the encoded string, so
/// anything else is rejected unverified.
fn has_issued_parameters(ballot_number: &str) -> bool {
    let config = Config::default();
    let prefix = format!(
        "${}$v={}$m={},t={},p={}$",
        config.variant.as_lowercase_str(),
        config.version.as_u32(),
        config.mem_cost,
        config.time_cost,
        config.lanes,
    );
    let Some(rest) = ballot_number.strip_prefix(&prefix) else {
        return false;
    };
    match rest.split_once('$') {
        Some((salt, hash)) => {
            salt.len() == encoded_length(SALT_LENGTH)
                && hash.len() == encoded_length(config.hash_length as usize)
        }
        None => false,
    }
}

/// Derive a fresh ballot number for the given national ID.
///
/// The ballot number is the encoded Argon2 hash of the sanitised national ID,
/// so it can later be checked against the ID it was issued to without
/// storing the pairing anywhere. Hashing runs on the blocking thread pool.
pub async fn new_ballot_number(national_id: &str) -> Result<String> {
    let national_id = sanitize_national_id(national_id);
    let ballot_number = spawn_blocking(move || {
        let mut salt = [0_u8; SALT_LENGTH];
        rand::thread_rng().fill(&mut salt);
        argon2::hash_encoded(national_id.as_bytes(), &salt, &Config::default())
    })
    .await??;
    Ok(ballot_number)
}

/// Check whether the ballot number was issued to the given national ID.
/// Malformed ballot numbers, or ones with other hashing parameters, never match.
pub async fn ballot_number_matches(ballot_number: &str, national_id: &str) -> bool {
    if !has_issued_parameters(ballot_number) {
        return false;
    }
    let ballot_number = ballot_number.to_string();
    let national_id = sanitize_national_id(national_id);
    spawn_blocking(move || {
        argon2::verify_encoded(&ballot_number, national_id.as_bytes()).unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}

/// A counted ballot. Deliberately carries no reference to the voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub ballot_number: String,
    pub candidate_id: CandidateId,
    pub comment: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl Ballot {
    pub fn new(ballot_number: String, candidate_id: CandidateId, comment: String) -> Self {
        Self {
            ballot_number,
            candidate_id,
            comment,
            cast_at: Utc::now(),
        }
    }
}

/// The outcome of an attempt to count a ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BallotStatus {
    VoterBallotMismatch,
    InvalidBallot,
    FraudCommitted,
    VoterNotRegistered,
    BallotCounted,
}

impl BallotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VoterBallotMismatch => "the ballot doesn't belong to the voter specified",
            Self::InvalidBallot => "the ballot given is invalid",
            Self::FraudCommitted => "fraud committed: the voter has already voted",
            Self::VoterNotRegistered => "voter not registered",
            Self::BallotCounted => "ballot counted",
        }
    }

    pub fn is_counted(&self) -> bool {
        *self == Self::BallotCounted
    }
}

impl Display for BallotStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[rocket::async_test]
    async fn ballot_numbers_belong_to_one_voter() {
        let first = new_ballot_number("111111111").await.unwrap();
        let second = new_ballot_number("111111111").await.unwrap();
        assert_ne!(first, second);
        assert!(has_issued_parameters(&first));

        assert!(ballot_number_matches(&first, "111111111").await);
        assert!(ballot_number_matches(&second, "111-11-1111").await);
        assert!(!ballot_number_matches(&first, "222222222").await);
        assert!(!ballot_number_matches("", "111111111").await);
        assert!(!ballot_number_matches("12345", "111111111").await);
    }

    #[rocket::async_test]
    async fn costly_ballot_numbers_are_rejected_unverified() {
        let costly = "$argon2id$v=19$m=65536,t=64,p=1$c2FsdHNhbHRzYWx0c2FsdA$\
                      aGFzaGhhc2hoYXNoaGFzaGhhc2hoYXNoaGFzaGhhc2g";
        let start = Instant::now();
        assert!(!ballot_number_matches(costly, "111111111").await);
        assert!(start.elapsed() < Duration::from_secs(1));

        // A genuine ballot number with any parameter changed is rejected too.
        let genuine = new_ballot_number("111111111").await.unwrap();
        let config = Config::default();
        let tampered = genuine.replacen(
            &format!("t={}", config.time_cost),
            &format!("t={}", config.time_cost + 1),
            1,
        );
        assert_ne!(tampered, genuine);
        assert!(!has_issued_parameters(&tampered));
        assert!(!ballot_number_matches(&tampered, "111111111").await);

        let (head, hash) = genuine.rsplit_once('$').unwrap();
        let longer_salt = format!("{head}AAAA${hash}");
        assert!(!has_issued_parameters(&longer_salt));
    }

    #[test]
    fn status_strings() {
        assert_eq!(BallotStatus::BallotCounted.to_string(), "ballot counted");
        assert_eq!(
            BallotStatus::FraudCommitted.to_string(),
            "fraud committed: the voter has already voted"
        );
        assert!(BallotStatus::BallotCounted.is_counted());
        assert!(!BallotStatus::InvalidBallot.is_counted());
    }
}
