//! The Ballot Form: a client for the ballot server that collects a voter's
//! choice and submits it, reporting back through [`Notice`]s.

use thiserror::Error;

mod api;
mod form;

pub use api::{BallotApi, CastResponse, HttpBallotApi, DEFAULT_API_URL};
pub use form::{BallotForm, Intent, Notice, Phase, SubmitOutcome};

/// Failures talking to the ballot server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The server answered with an error, described by its `status` field.
    #[error("{status}")]
    Server { code: u16, status: String },
    #[error("invalid server URL: {0}")]
    Url(String),
}

/// Misuse of a [`BallotForm`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("no candidate with ID {0} is on the ballot")]
    UnknownCandidate(String),
}
