//! Remote call interface: the transport layer is an external collaborator and
//! is only seen through this trait.

use futures::future::BoxFuture;
use serde_json::Value;

use crate::dto::response::Envelope;

/// Server endpoints the client can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Exchange an access token for a session.
    Login,
    /// Fetch the full game list.
    Games,
    /// Submit an entry for the writing stage.
    Write,
    /// Cast a vote on an anonymized entry.
    Vote,
    /// Submit a topic, launching the next round.
    Topic,
    /// Create a brand-new game.
    NewGame,
    /// Rename a game.
    Rename,
    /// Quit a game.
    Withdraw,
}

/// Transport-level failure of a remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    /// Transport status code, when the server responded at all.
    pub status: Option<u16>,
    /// Human readable failure description.
    pub message: String,
}

/// Abstraction over the network layer issuing the actual requests.
///
/// A call either resolves or rejects exactly once; no cancellation or timeout
/// is modeled at this layer.
pub trait RemoteApi: Send + Sync {
    /// Issue a request against `endpoint` with a JSON `payload`.
    fn call(&self, endpoint: Endpoint, payload: Value)
    -> BoxFuture<'_, Result<Envelope, RemoteFailure>>;
}
