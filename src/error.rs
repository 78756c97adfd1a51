use thiserror::Error;

use crate::remote::RemoteFailure;
use crate::state::game::GameId;

/// Transport status the server uses to signal an exhausted poem quota.
pub const QUOTA_STATUS: u16 = 413;

/// Store-level invariant violations.
///
/// These indicate corrupt data rather than recoverable conditions; they are
/// surfaced to the caller instead of being masked by a silent default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A game record has no player flagged as the local user.
    #[error("game `{game_id}` has no player flagged as me")]
    MissingMe {
        /// Identifier of the offending game.
        game_id: GameId,
    },
    /// Two games both claim the same successor via their `next_id`.
    #[error("multiple games claim game `{id}` as their successor")]
    AmbiguousPredecessor {
        /// Identifier of the contested successor.
        id: GameId,
    },
    /// Following `next_id` links revisited a game.
    #[error("round linking loops back through game `{id}`")]
    LinkCycle {
        /// Identifier where the cycle was detected.
        id: GameId,
    },
}

/// Errors produced by orchestrated player actions.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The server accepted the request but rejected the action in its payload.
    #[error("server rejected the action with status {status}")]
    Rejected {
        /// Status code embedded in the response body.
        status: u16,
    },
    /// The player has exhausted their poem allotment.
    #[error("out of poems")]
    OutOfQuota,
    /// The remote call failed at the transport level.
    #[error("remote call failed: {message}")]
    Transport {
        /// Transport status code, when one was received.
        status: Option<u16>,
        /// Human readable failure description.
        message: String,
    },
    /// A full sync was requested before the minimum interval elapsed.
    #[error("last sync only {elapsed}s ago (minimum interval {min_interval}s)")]
    Throttled {
        /// Seconds since the previous successful sync.
        elapsed: i64,
        /// Configured minimum interval between syncs.
        min_interval: i64,
    },
    /// No game with the given identifier is known to the store.
    #[error("game `{0}` not found")]
    NotFound(GameId),
    /// No access token is present in the session store.
    #[error("not logged in")]
    NotLoggedIn,
    /// The store detected corrupt data while deriving state.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ActionError {
    /// Classify a transport-level failure, distinguishing quota exhaustion
    /// from generic failures when the operation consumes quota.
    pub fn from_failure(failure: RemoteFailure, quota_sensitive: bool) -> Self {
        if quota_sensitive && failure.status == Some(QUOTA_STATUS) {
            return ActionError::OutOfQuota;
        }
        ActionError::Transport {
            status: failure.status,
            message: failure.message,
        }
    }
}
