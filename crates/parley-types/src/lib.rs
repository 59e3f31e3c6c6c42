//! Shared domain types for Parley.
//!
//! Sessions, messages, persisted conversation records, completion request
//! shapes, configuration, and the error taxonomy used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod message;
