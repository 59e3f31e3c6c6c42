//! Route handlers, grouped by resource.

pub mod chat;
pub mod conversation;
pub mod health;
