//! Session log persistence: naming, listing, archival, titles and retention.

pub mod retention;
pub mod session_store;
pub mod title;
