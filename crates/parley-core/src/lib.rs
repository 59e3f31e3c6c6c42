//! Business logic and port trait definitions for Parley.
//!
//! This crate defines the "ports" (`CompletionClient`, `ConversationRepository`)
//! that the infrastructure layer implements, plus the in-process conversation
//! state and the per-turn orchestration. It depends only on `parley-types` --
//! never on `parley-infra` or any HTTP/database crate.

pub mod chat;
pub mod history;
pub mod llm;
pub mod persistence;
pub mod store;
