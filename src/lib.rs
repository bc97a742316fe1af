#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod client;
pub mod config;
pub mod cors;
pub mod election;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

/// Assemble the server from `Rocket.toml` and `ROCKET_*` configuration.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build())
}

/// Attach routes, catchers and fairings. Fairing order matters: each
/// ignite fairing depends on the state managed by the previous ones.
fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(logging::LoggerFairing)
        .attach(cors::CorsFairing)
        .attach(config::ConfigFairing)
        .attach(config::ElectionFairing)
        .attach(config::SeedFairing)
}

/// A server on a fresh in-memory store, with no seed data and fixed secrets.
#[cfg(test)]
pub(crate) fn rocket_for_testing() -> Rocket<Build> {
    use rocket::figment::Figment;

    let figment = Figment::from(rocket::Config::debug_default())
        .merge(("log_level", "off"))
        .merge(("store", config::StoreKind::Memory))
        .merge(("hmac_secret", "test-hmac-secret"));
    assemble(rocket::custom(figment))
}
