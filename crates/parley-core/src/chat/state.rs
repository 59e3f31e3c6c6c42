//! Lifecycle of a single chat turn.

use serde::Serialize;

/// Where a turn is in its lifecycle.
///
/// ```text
/// Received -> Validated -> UserAppended -> AwaitingCompletion -> Completed
///          -> AssistantAppended -> Persisted -> Responded
/// ```
///
/// `Failed` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Received,
    Validated,
    UserAppended,
    AwaitingCompletion,
    Completed,
    AssistantAppended,
    /// Sync handed off. Does not imply the store write succeeded.
    Persisted,
    Responded,
    Failed,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Responded | Self::Failed)
    }

    /// The next state on the success path, if any.
    pub fn next(self) -> Option<Self> {
        use TurnState::*;
        match self {
            Received => Some(Validated),
            Validated => Some(UserAppended),
            UserAppended => Some(AwaitingCompletion),
            AwaitingCompletion => Some(Completed),
            Completed => Some(AssistantAppended),
            AssistantAppended => Some(Persisted),
            Persisted => Some(Responded),
            Responded | Failed => None,
        }
    }

    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed || self.next() == Some(to)
    }
}
