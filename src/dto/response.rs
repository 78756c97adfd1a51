use serde::Deserialize;

use crate::dto::game::RawGame;

/// Embedded status meaning the action was acknowledged as-is.
pub const STATUS_OK: u16 = 200;
/// Embedded status meaning the action moved the game to a new round or stage;
/// an authoritative game record accompanies it.
pub const STATUS_ADVANCED: u16 = 202;

/// Response envelope common to every server endpoint.
///
/// The transport layer reports success or failure separately; the `status`
/// embedded here carries the server-side business outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Business status code embedded in the body.
    pub status: u16,
    /// Human readable outcome description.
    #[serde(default)]
    pub message: Option<String>,
    /// Authoritative replacement record for the affected game.
    #[serde(default)]
    pub game: Option<RawGame>,
    /// Complete game set, present on full syncs.
    #[serde(default)]
    pub games: Option<Vec<RawGame>>,
    /// Remaining poem quota, when the server reports it.
    #[serde(default)]
    pub poems_left: Option<i64>,
    /// Whether the account has been unlocked, when the server reports it.
    #[serde(default)]
    pub unlocked: Option<bool>,
    /// Server-side user identifier, present on login.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Envelope {
    /// Whether the embedded status is one of the success codes.
    pub fn is_success(&self) -> bool {
        matches!(self.status, STATUS_OK | STATUS_ADVANCED)
    }
}
