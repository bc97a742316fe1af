use argon2::Error as Argon2Error;
use log::{debug, error};
use mongodb::{bson::de::Error as BsonDecodeError, error::Error as DbError};
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    tokio::task::JoinError,
    Request,
};
use thiserror::Error;

use crate::model::api::StatusBody;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Decode(#[from] BsonDecodeError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Background task failed: {0}")]
    Task(#[from] JoinError),
    #[error("Failed to decrypt voter name: {0}")]
    NameDecryption(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) => Status::NotFound,
            Self::Db(_)
            | Self::Decode(_)
            | Self::Argon2(_)
            | Self::Task(_)
            | Self::NameDecryption(_)
            | Self::Config(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        // Internal details stay in the log; clients only see the status reason.
        let message = if status == Status::InternalServerError {
            error!("{self}");
            status.reason_lossy().to_string()
        } else {
            debug!("{self}");
            self.to_string()
        };
        (status, Json(StatusBody::new(message))).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(Error::not_found("ballot").status(), Status::NotFound);
        assert_eq!(
            Error::NameDecryption("tag".into()).status(),
            Status::InternalServerError
        );
        assert_eq!(
            Error::not_found("ballot").to_string(),
            "Not found: ballot"
        );
    }
}
