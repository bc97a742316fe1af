use std::sync::Arc;

use data_encoding::BASE64;
use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::{Deserialize, Serialize};

use crate::election::Election;
use crate::error::{Error, Result};
use crate::model::{
    memory::MemoryStore,
    mongodb::MongoStore,
    store::VotingStore,
    voter::{Voter, VoterKeys, NAME_KEY_LENGTH},
};

/// Which [`VotingStore`] implementation backs the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Nothing survives a restart. Suitable for development and tests.
    #[default]
    Memory,
    MongoDb,
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default)]
    store: StoreKind,
    // secrets
    hmac_secret: String,
    name_key: Option<String>,
}

impl Config {
    pub fn store(&self) -> StoreKind {
        self.store
    }

    /// Secret key used to HMAC national IDs.
    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.as_bytes()
    }

    /// Build the voter secrets. Without a configured `name_key`, a random one
    /// is generated, and names stored by earlier runs become unreadable.
    pub fn voter_keys(&self) -> Result<VoterKeys> {
        if self.hmac_secret.is_empty() {
            return Err(Error::Config("`hmac_secret` must not be empty".to_string()));
        }
        let name_key = match &self.name_key {
            Some(encoded) => {
                let bytes = BASE64
                    .decode(encoded.as_bytes())
                    .map_err(|e| Error::Config(format!("`name_key` is not base64: {e}")))?;
                <[u8; NAME_KEY_LENGTH]>::try_from(bytes.as_slice()).map_err(|_| {
                    Error::Config(format!("`name_key` must be {NAME_KEY_LENGTH} bytes"))
                })?
            }
            None => {
                warn!("No `name_key` configured, generating a temporary one");
                VoterKeys::random_name_key()
            }
        };
        Ok(VoterKeys::new(self.hmac_secret(), name_key))
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    db_name: String,
    // secrets
    db_uri: String,
}

/// A fairing that builds the configured store and voter secrets, and places
/// the resulting [`Election`] into managed state. Must be attached after
/// [`ConfigFairing`].
pub struct ElectionFairing;

#[rocket::async_trait]
impl Fairing for ElectionFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = rocket.state::<Config>() else {
            error!("Application config is not loaded");
            return Err(rocket);
        };
        let keys = match config.voter_keys() {
            Ok(keys) => keys,
            Err(e) => {
                error!("{e}");
                return Err(rocket);
            }
        };

        let store: Arc<dyn VotingStore> = match config.store() {
            StoreKind::Memory => {
                info!("Using in-memory store; nothing will survive a restart");
                Arc::new(MemoryStore::new())
            }
            StoreKind::MongoDb => {
                let db_config = match rocket.figment().extract::<DbConfig>() {
                    Ok(db_config) => db_config,
                    Err(e) => {
                        error!("Failed to load database config");
                        rocket::config::pretty_print_error(e);
                        return Err(rocket);
                    }
                };
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&db_config.db_uri, &db_config.db_name).await {
                    Ok(store) => {
                        info!("...database connection online!");
                        Arc::new(store)
                    }
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };

        // Manage the state.
        rocket = rocket.manage(Election::new(store, keys));
        Ok(rocket)
    }
}

/// Candidates and voters to register at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub candidates: Vec<String>,
    #[serde(default)]
    pub voters: Vec<Voter>,
}

#[derive(Deserialize)]
struct SeedConfig {
    #[serde(default)]
    seed: Seed,
}

impl Seed {
    /// Register everything in the seed and issue a ballot to each newly
    /// registered voter. Returns the `(national_id, ballot_number)` pairs.
    pub async fn apply(&self, election: &Election) -> Result<Vec<(String, String)>> {
        for name in &self.candidates {
            election.register_candidate(name).await?;
        }
        let mut ballots = Vec::new();
        for voter in &self.voters {
            if !election.register_voter(voter).await? {
                continue;
            }
            if let Some(ballot_number) = election.issue_ballot(&voter.national_id).await? {
                ballots.push((voter.national_id.clone(), ballot_number));
            }
        }
        Ok(ballots)
    }
}

/// A fairing that registers the configured seed data. Must be attached after
/// [`ElectionFairing`].
pub struct SeedFairing;

#[rocket::async_trait]
impl Fairing for SeedFairing {
    fn info(&self) -> Info {
        Info {
            name: "Seed",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let seed = match rocket.figment().extract::<SeedConfig>() {
            Ok(config) => config.seed,
            Err(e) => {
                error!("Failed to load seed config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let Some(election) = rocket.state::<Election>() else {
            error!("Election is not initialised");
            return Err(rocket);
        };

        match seed.apply(election).await {
            Ok(ballots) => {
                info!(
                    "Seeded {} candidates and {} voters",
                    seed.candidates.len(),
                    ballots.len()
                );
                for (national_id, ballot_number) in ballots {
                    info!("Voter {national_id} ballot number: {ballot_number}");
                }
                Ok(rocket)
            }
            Err(e) => {
                error!("Failed to seed the election: {e}");
                Err(rocket)
            }
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Seed {
        pub fn example() -> Self {
            Self {
                candidates: vec![
                    "Joseph Klimek".to_string(),
                    "Rose Hervey".to_string(),
                    "Yeong Qi".to_string(),
                ],
                voters: vec![Voter::example(), Voter::example2()],
            }
        }
    }
}
