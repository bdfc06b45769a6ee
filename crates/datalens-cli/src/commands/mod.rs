//! Command implementations

pub mod cache;
pub mod delete;
pub mod ingest;
pub mod search;
pub mod status;
