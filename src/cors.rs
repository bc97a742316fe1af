use lazy_static::lazy_static;
use regex::Regex;
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::Header,
    Request, Response,
};

lazy_static! {
    /// The ballot form is served from the local machine during development.
    static ref ALLOWED_ORIGIN: Regex =
        Regex::new(r"^http://(localhost|127\.0\.0\.1)(:\d+)?$").unwrap();
}

pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type";

/// Whether a browser page served from `origin` may call the API.
pub fn origin_allowed(origin: &str) -> bool {
    ALLOWED_ORIGIN.is_match(origin)
}

/// Adds cross-origin headers to API responses for allowed origins.
#[derive(Debug, Copy, Clone)]
pub struct CorsFairing;

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        if !req.uri().path().as_str().starts_with("/api/") {
            return;
        }
        res.set_header(Header::new("Vary", "Origin"));
        let Some(origin) = req.headers().get_one("Origin") else {
            return;
        };
        if !origin_allowed(origin) {
            return;
        }
        res.set_header(Header::new("Access-Control-Allow-Origin", origin.to_string()));
        res.set_header(Header::new("Access-Control-Allow-Methods", ALLOWED_METHODS));
        res.set_header(Header::new("Access-Control-Allow-Headers", ALLOWED_HEADERS));
    }
}
