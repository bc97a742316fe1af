use reqwest::{Client, Response, StatusCode};

use super::ClientError;
use crate::model::{
    api::{BallotSubmission, StatusBody},
    candidate::Candidate,
};

/// Where a locally running server listens by default.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";

/// The server's answer to a submitted ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastResponse {
    /// Whether the server answered with a success code.
    pub accepted: bool,
    /// The `status` field of the response body.
    pub status: String,
}

/// The two calls the ballot form makes.
#[rocket::async_trait]
pub trait BallotApi: Send + Sync {
    async fn get_all_candidates(&self) -> Result<Vec<Candidate>, ClientError>;

    /// Rejections are not errors: they come back as a [`CastResponse`] that
    /// is not `accepted`.
    async fn count_ballot(&self, ballot: &BallotSubmission) -> Result<CastResponse, ClientError>;
}

/// Talks to a ballot server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBallotApi {
    client: Client,
    base_url: String,
}

impl HttpBallotApi {
    /// `base_url` is the API root, e.g. [`DEFAULT_API_URL`].
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::Url(base_url.to_string()));
        }
        Ok(Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }
}

impl Default for HttpBallotApi {
    fn default() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// The `status` of an error body, or the code's reason if there is none.
async fn status_of(response: Response) -> String {
    let code = response.status();
    match response.json::<StatusBody>().await {
        Ok(body) => body.status,
        Err(_) => reason(code),
    }
}

fn reason(code: StatusCode) -> String {
    code.canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| code.as_u16().to_string())
}

#[rocket::async_trait]
impl BallotApi for HttpBallotApi {
    async fn get_all_candidates(&self) -> Result<Vec<Candidate>, ClientError> {
        let response = self
            .client
            .get(self.endpoint("get_all_candidates"))
            .send()
            .await?;
        let code = response.status();
        if !code.is_success() {
            return Err(ClientError::Server {
                code: code.as_u16(),
                status: status_of(response).await,
            });
        }
        Ok(response.json().await?)
    }

    async fn count_ballot(&self, ballot: &BallotSubmission) -> Result<CastResponse, ClientError> {
        let response = self
            .client
            .post(self.endpoint("count_ballot"))
            .json(ballot)
            .send()
            .await?;
        let accepted = response.status().is_success();
        Ok(CastResponse {
            accepted,
            status: status_of(response).await,
        })
    }
}
