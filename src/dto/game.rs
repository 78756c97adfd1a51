use serde::{Deserialize, Serialize};

/// Stage of a round as transmitted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawStage {
    /// Players are writing their entries.
    Write,
    /// Players are voting on anonymized entries.
    Vote,
    /// Round finished; votes are tallied.
    Results,
    /// Round finished and the game has an overall winner.
    Winner,
    /// Too many players left; the game is dead.
    Abandoned,
}

/// One anonymized entry offered up for voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAnonPoem {
    /// Per-round anonymization identifier.
    pub fake_id: u32,
    /// The entry text.
    pub poem: String,
}

/// A participant's record within one game round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPlayer {
    /// Server-side user identifier.
    pub user_id: u64,
    /// Social network identity used for login and avatars.
    pub facebook_id: String,
    /// Per-round anonymization identifier.
    pub fake_id: u32,
    /// Whether this record belongs to the requesting user.
    pub me: bool,
    /// Display name.
    pub name: String,
    /// Entry text; absent while unwritten, the sentinel `"x"` once the
    /// deadline passed without a submission.
    #[serde(default)]
    pub poem: Option<String>,
    /// Index of the anonymized entry this player voted for; negative
    /// sentinels mean no vote was cast.
    pub vote: i64,
    /// Points earned this round.
    pub round_score: i64,
    /// Whether this player won the round.
    pub winner: bool,
    /// Cumulative score across rounds.
    pub score: i64,
}

/// One game round as transmitted by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGame {
    /// Unique game identifier.
    pub game_id: u64,
    /// Identifier of the round superseding this one, if any.
    #[serde(default)]
    pub next_id: Option<u64>,
    /// Explicit game name; absent when the client should synthesize one.
    #[serde(default)]
    pub name: Option<String>,
    /// Topic the entries were written against.
    pub topic: String,
    /// User who gets to pick the next topic.
    #[serde(default)]
    pub topic_picker_id: Option<u64>,
    /// Whether the first round of this game has just been created.
    #[serde(default, rename = "new")]
    pub is_new: bool,
    /// Current stage of the round.
    pub stage: RawStage,
    /// Epoch-seconds cutoff for the current stage.
    pub deadline: i64,
    /// Participants, in server order.
    pub players: Vec<RawPlayer>,
    /// Anonymized entries for the voting stage.
    #[serde(default)]
    pub anon_poems: Vec<RawAnonPoem>,
}
