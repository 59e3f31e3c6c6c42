//! External-store persistence for conversations.
//!
//! `ConversationRepository` is the port the infrastructure layer implements
//! (Supabase, SQLite). `PersistenceSync` owns the best-effort policy on top
//! of it: timeouts, logging, ordering of background writes, and read-through
//! loading into the in-memory store.

pub mod box_repository;
pub mod repository;
pub mod sync;
