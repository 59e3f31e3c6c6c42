//! Infrastructure layer for Parley.
//!
//! Contains implementations of the port traits defined in `parley-core`:
//! the OpenAI chat-completions client, the Supabase (PostgREST) and SQLite
//! conversation repositories, plus the settings loader.

pub mod config;
pub mod llm;
pub mod sqlite;
pub mod store;
pub mod supabase;
