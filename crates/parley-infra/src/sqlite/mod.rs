//! SQLite storage layer.
//!
//! Local alternative to the hosted store: same `conversations` shape, with
//! split read/write connection pools in WAL mode.

pub mod conversation;
pub mod pool;
