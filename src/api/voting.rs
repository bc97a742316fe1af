use log::info;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::election::Election;
use crate::error::Result;
use crate::logging::RequestId;
use crate::model::{
    api::{BallotSubmission, StatusBody},
    candidate::Candidate,
};

pub fn routes() -> Vec<Route> {
    routes![get_all_candidates, count_ballot]
}

#[get("/api/get_all_candidates")]
pub async fn get_all_candidates(election: &State<Election>) -> Result<Json<Vec<Candidate>>> {
    Ok(Json(election.get_all_candidates().await?))
}

/// Count a ballot. Answers `202 Accepted` if it was counted, and
/// `409 Conflict` with the reason otherwise.
#[post("/api/count_ballot", data = "<ballot>", format = "json")]
pub async fn count_ballot(
    ballot: Json<BallotSubmission>,
    election: &State<Election>,
    id: RequestId,
) -> Result<(Status, Json<StatusBody>)> {
    let result = election.count_ballot(ballot.into_inner()).await?;
    info!("{id} ballot outcome: {result}");
    let status = if result.is_counted() {
        Status::Accepted
    } else {
        Status::Conflict
    };
    Ok((status, Json(StatusBody::new(result.as_str()))))
}
