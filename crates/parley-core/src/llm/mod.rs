//! Completion client abstractions for Parley.
//!
//! - `CompletionClient`: RPITIT trait for concrete completion backends
//! - `BoxCompletionClient`: object-safe wrapper for runtime selection

pub mod box_client;
pub mod client;
