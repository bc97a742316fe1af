//! Data types shared by the server, the store implementations and the
//! ballot form client.

pub mod api;
pub mod ballot;
pub mod candidate;
pub mod memory;
pub mod mongodb;
pub mod store;
pub mod voter;
