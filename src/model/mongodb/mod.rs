mod collection;
mod counter;
mod errors;
mod store;

pub use collection::{ensure_indexes_exist, CandidateDoc, Coll, InvalidBallot, MongoCollection};
pub use counter::{ensure_counter_exists, Counter, CANDIDATE_ID_COUNTER};
pub use errors::{
    is_duplicate_key_error, is_transient_transaction_error, is_unknown_commit_result,
};
pub use store::MongoStore;
