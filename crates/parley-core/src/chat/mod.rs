//! Per-turn chat orchestration.

pub mod handler;
pub mod state;

pub use handler::{ChatHandler, ChatTurn};
pub use state::TurnState;
