use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::model::api::StatusBody;

mod voting;

pub use voting::{count_ballot, get_all_candidates};

pub fn routes() -> Vec<Route> {
    let mut routes = routes![ping, preflight];
    routes.extend(voting::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

#[get("/")]
fn ping() -> &'static str {
    "pong"
}

/// CORS preflight for the API. The headers themselves are added by
/// [`CorsFairing`](crate::cors::CorsFairing).
#[options("/api/<_..>")]
fn preflight() -> Status {
    Status::NoContent
}

/// Every error the framework produces itself (bad JSON, unknown routes, ...)
/// carries a `status` field, like our own responses do.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> Json<StatusBody> {
    Json(StatusBody::new(status.reason_lossy()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
    };

    use super::*;

    #[backend_test]
    async fn ping_pong(client: Client) {
        let response = client.get(uri!(ping)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "pong");
    }

    #[backend_test]
    async fn errors_carry_a_status_field(client: Client) {
        let response = client.get("/api/no_such_route").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let body = response.into_json::<StatusBody>().await.unwrap();
        assert_eq!(body.status, "Not Found");

        let response = client
            .post("/api/count_ballot")
            .header(ContentType::JSON)
            .body("{\"ballot_number\": 12")
            .dispatch()
            .await;
        assert!(response.status().class().is_client_error());
        assert!(response.into_json::<StatusBody>().await.is_some());
    }

    #[backend_test]
    async fn preflight_from_local_origin(client: Client) {
        let response = client
            .options("/api/count_ballot")
            .header(Header::new("Origin", "http://localhost:3000"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NoContent);
        assert_eq!(
            response.headers().get_one("Access-Control-Allow-Origin"),
            Some("http://localhost:3000")
        );
    }
}
