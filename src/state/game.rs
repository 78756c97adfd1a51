use std::collections::HashMap;
use std::fmt;

use crate::config::ClientConfig;
use crate::dto::game::{RawAnonPoem, RawGame, RawPlayer, RawStage};
use crate::error::StoreError;

/// Unique identifier of a game round.
pub type GameId = u64;
/// Server-side identifier of a player.
pub type PlayerId = u64;

/// Action label shown while an entry still needs to be written.
pub const LABEL_SUBMIT_ENTRY: &str = "submit entry";
/// Action label shown while a vote still needs to be cast.
pub const LABEL_CAST_VOTE: &str = "cast vote";
/// Action label shown to the topic picker once a round is over.
pub const LABEL_CHOOSE_TOPIC: &str = "choose topic";
/// Action label shown to everyone else once a round is over.
pub const LABEL_WAIT_TOPIC: &str = "waiting for new topic";
/// Action label prompting the player to leave a dead game.
pub const LABEL_EXIT_ABANDONED: &str = "exit abandoned game";
/// Action label shown when the player has nothing to do.
pub const LABEL_WAITING: &str = "waiting for others";

/// Stage label shown for abandoned rounds (own or successor).
const ABANDONED_LABEL: &str = "Abandoned - many players quit";

/// Stage of a game round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
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

impl From<RawStage> for Stage {
    fn from(value: RawStage) -> Self {
        match value {
            RawStage::Write => Stage::Write,
            RawStage::Vote => Stage::Vote,
            RawStage::Results => Stage::Results,
            RawStage::Winner => Stage::Winner,
            RawStage::Abandoned => Stage::Abandoned,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Stage::Write => "Write",
            Stage::Vote => "Vote",
            Stage::Results => "Results",
            Stage::Winner => "Winner",
            Stage::Abandoned => "Abandoned",
        };
        f.write_str(text)
    }
}

/// Urgency tint attached to a derived label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelColor {
    /// Nothing pressing.
    #[default]
    Neutral,
    /// The player should act soon.
    Warning,
    /// The player is about to miss a deadline.
    Urgent,
}

/// A player's entry for the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Not yet submitted.
    Pending,
    /// The writing deadline passed without a submission.
    Missed,
    /// Submitted text.
    Submitted(String),
}

impl Entry {
    /// Whether the entry still needs to be written.
    pub fn is_pending(&self) -> bool {
        matches!(self, Entry::Pending)
    }

    /// Text to display for this entry.
    pub fn display_text(&self) -> &str {
        match self {
            Entry::Pending => "",
            Entry::Missed => "Didn't write a poem",
            Entry::Submitted(text) => text,
        }
    }
}

/// One anonymized entry offered up for voting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonPoem {
    /// Per-round anonymization identifier.
    pub display_id: u32,
    /// The entry text.
    pub text: String,
}

impl From<RawAnonPoem> for AnonPoem {
    fn from(value: RawAnonPoem) -> Self {
        Self {
            display_id: value.fake_id,
            text: value.poem,
        }
    }
}

/// A participant's state within one game round, including display derivations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Server-side user identifier.
    pub id: PlayerId,
    /// Social network identity.
    pub social_id: String,
    /// Per-round anonymization identifier.
    pub display_id: u32,
    /// Whether this record belongs to the local user.
    pub is_me: bool,
    /// Display name.
    pub name: String,
    /// First word of the display name, used in synthesized labels.
    pub first_name: String,
    /// The player's entry for this round.
    pub entry: Entry,
    /// Anonymized entry this player voted for, if any.
    pub vote: Option<u32>,
    /// Points earned this round.
    pub round_score: i64,
    /// Whether this player won the round.
    pub is_round_winner: bool,
    /// Cumulative score across rounds.
    pub game_score: i64,
    /// Whether this player won the whole game.
    pub is_game_winner: bool,
    /// Who voted for this player's entry, rendered for display.
    pub voters_label: Option<String>,
    /// Round-winner banner, when applicable.
    pub round_winner_label: Option<String>,
    /// Game-winner banner, when applicable.
    pub game_win_label: Option<String>,
    /// Whether the player has an outstanding task in this game.
    pub action_item: bool,
    /// Description of the outstanding task.
    pub action_label: String,
    /// Urgency tint of the outstanding task.
    pub action_color: LabelColor,
    /// Scoreboard progress label for the current stage.
    pub stage_label: String,
    /// Urgency tint of the scoreboard progress label.
    pub stage_color: LabelColor,
}

impl Player {
    fn from_raw(raw: RawPlayer) -> Self {
        let first_name = raw
            .name
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_owned();
        let entry = match raw.poem {
            None => Entry::Pending,
            Some(text) if text == "x" => Entry::Missed,
            Some(text) => Entry::Submitted(text),
        };
        Self {
            id: raw.user_id,
            social_id: raw.facebook_id,
            display_id: raw.fake_id,
            is_me: raw.me,
            name: raw.name,
            first_name,
            entry,
            // Negative wire sentinels all mean "not voted".
            vote: u32::try_from(raw.vote).ok(),
            round_score: raw.round_score,
            is_round_winner: raw.winner,
            game_score: raw.score,
            is_game_winner: false,
            voters_label: None,
            round_winner_label: None,
            game_win_label: None,
            action_item: false,
            action_label: LABEL_WAITING.to_owned(),
            action_color: LabelColor::Neutral,
            stage_label: String::new(),
            stage_color: LabelColor::Neutral,
        }
    }
}

/// One round of a game, owning the chain of rounds that supersede it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// Unique game identifier.
    pub id: GameId,
    /// Identifier of the round superseding this one, if any.
    pub next_id: Option<GameId>,
    /// The superseding round once resolved by the linking pass.
    pub next_game: Option<Box<Game>>,
    /// Current stage of the round.
    pub stage: Stage,
    /// Epoch-seconds cutoff for the current stage.
    pub deadline: i64,
    /// Display name, explicit or synthesized from participants.
    pub name: String,
    /// Topic the entries were written against.
    pub topic: String,
    /// User who gets to pick the next topic.
    pub topic_picker_id: Option<PlayerId>,
    /// Whether the first round of this game has just been created.
    pub is_new_game: bool,
    /// A new round has been requested; its id is not yet known.
    pub pending_round: bool,
    /// Participants, sorted descending by game score.
    pub players: Vec<Player>,
    /// Anonymized entries for the voting stage.
    pub anon_poems: Vec<AnonPoem>,
    /// Index into `players` of the local user's record, when present.
    pub me: Option<usize>,
    /// Stage description for display.
    pub stage_label: String,
    /// Time-to-deadline rendered for display.
    pub deadline_age: String,
    /// Urgency tint of the deadline label.
    pub deadline_color: LabelColor,
}

impl Game {
    /// Build a game entity from a raw server record, computing every derived
    /// display field that depends only on the record itself.
    ///
    /// Pure function of its inputs; `now` is the clock reading used for the
    /// initial deadline rendering.
    pub fn build(raw: RawGame, config: &ClientConfig, now: i64) -> Self {
        let mut players: Vec<Player> = raw.players.into_iter().map(Player::from_raw).collect();
        players.sort_by(|a, b| b.game_score.cmp(&a.game_score));
        let me = players.iter().position(|player| player.is_me);

        let name = match raw.name {
            Some(name) => name,
            None => synthesize_name(&players, me, config.max_game_name_length),
        };

        let mut game = Self {
            id: raw.game_id,
            next_id: raw.next_id,
            next_game: None,
            stage: raw.stage.into(),
            deadline: raw.deadline,
            name,
            topic: raw.topic,
            topic_picker_id: raw.topic_picker_id,
            is_new_game: raw.is_new,
            pending_round: false,
            players,
            anon_poems: raw.anon_poems.into_iter().map(Into::into).collect(),
            me,
            stage_label: String::new(),
            deadline_age: String::new(),
            deadline_color: LabelColor::Neutral,
        };

        game.compute_voter_labels();
        game.compute_round_winner_labels();
        game.compute_game_winner_labels(config.winning_score);
        game.refresh_stage_label();
        game.refresh_deadline_age(now);
        game
    }

    /// The local user's record.
    ///
    /// Fails loudly when the record had no player flagged `me`.
    pub fn me(&self) -> Result<&Player, StoreError> {
        self.me
            .and_then(|index| self.players.get(index))
            .ok_or(StoreError::MissingMe { game_id: self.id })
    }

    /// Mutable access to the local user's record.
    pub fn me_mut(&mut self) -> Result<&mut Player, StoreError> {
        let game_id = self.id;
        self.me
            .and_then(|index| self.players.get_mut(index))
            .ok_or(StoreError::MissingMe { game_id })
    }

    /// Whether the local user has an outstanding task in this game.
    pub fn has_action_item(&self) -> bool {
        self.me().map(|player| player.action_item).unwrap_or(false)
    }

    /// Deadline used for display and sorting: the linked successor's when one
    /// exists, else this round's own.
    pub fn effective_deadline(&self) -> i64 {
        self.next_game
            .as_ref()
            .map(|next| next.deadline)
            .unwrap_or(self.deadline)
    }

    /// Recompute the local user's action item from the current stage.
    ///
    /// Recurses into the successor chain first so that a finished round
    /// mirrors the latest round's values.
    pub fn refresh_action_item(&mut self) -> Result<(), StoreError> {
        if let Some(next) = self.next_game.as_mut() {
            next.refresh_action_item()?;
        }

        let mirrored = match self.stage {
            Stage::Results | Stage::Winner => self
                .next_game
                .as_ref()
                .map(|next| {
                    next.me().map(|player| {
                        (
                            player.action_item,
                            player.action_label.clone(),
                            player.action_color,
                        )
                    })
                })
                .transpose()?,
            _ => None,
        };

        let stage = self.stage;
        let picker_is_me = self.topic_picker_id == Some(self.me()?.id);
        let pending_round = self.pending_round;

        let me = self.me_mut()?;
        let (item, label, color) = match stage {
            Stage::Write if me.entry.is_pending() => {
                (true, LABEL_SUBMIT_ENTRY.to_owned(), LabelColor::Warning)
            }
            Stage::Vote if me.vote.is_none() => {
                (true, LABEL_CAST_VOTE.to_owned(), LabelColor::Warning)
            }
            Stage::Results | Stage::Winner => match mirrored {
                Some(values) => values,
                None if picker_is_me && !pending_round => {
                    (true, LABEL_CHOOSE_TOPIC.to_owned(), LabelColor::Warning)
                }
                None => (false, LABEL_WAIT_TOPIC.to_owned(), LabelColor::Neutral),
            },
            Stage::Abandoned => (false, LABEL_EXIT_ABANDONED.to_owned(), LabelColor::Warning),
            _ => (false, LABEL_WAITING.to_owned(), LabelColor::Neutral),
        };

        me.action_item = item;
        me.action_label = label;
        me.action_color = color;
        Ok(())
    }

    /// Recompute every player's scoreboard progress label.
    ///
    /// A finished round mirrors the corresponding player's values from the
    /// successor so the head always displays the latest round's status.
    pub fn refresh_player_stages(&mut self) {
        if let Some(next) = self.next_game.as_mut() {
            next.refresh_player_stages();
        }

        let successor_stages: Option<HashMap<PlayerId, (String, LabelColor)>> =
            self.next_game.as_ref().map(|next| {
                next.players
                    .iter()
                    .map(|player| {
                        (
                            player.id,
                            (player.stage_label.clone(), player.stage_color),
                        )
                    })
                    .collect()
            });

        let stage = self.stage;
        let picker = self.topic_picker_id;
        for player in &mut self.players {
            let (label, color) = match stage {
                Stage::Write => {
                    if player.entry.is_pending() {
                        ("Write poem: incomplete".to_owned(), LabelColor::Warning)
                    } else {
                        ("Write poem: complete".to_owned(), LabelColor::Neutral)
                    }
                }
                Stage::Vote => {
                    if player.vote.is_none() {
                        ("Cast vote: incomplete".to_owned(), LabelColor::Warning)
                    } else {
                        ("Cast vote: complete".to_owned(), LabelColor::Neutral)
                    }
                }
                Stage::Results | Stage::Winner => match &successor_stages {
                    Some(stages) => match stages.get(&player.id) {
                        Some((label, color)) => (label.clone(), *color),
                        None => continue,
                    },
                    None => {
                        if picker == Some(player.id) {
                            ("Pick topic: incomplete".to_owned(), LabelColor::Warning)
                        } else {
                            ("Pick topic: not this round".to_owned(), LabelColor::Neutral)
                        }
                    }
                },
                Stage::Abandoned => continue,
            };
            player.stage_label = label;
            player.stage_color = color;
        }
    }

    /// Recompute the display stage label, with the abandoned override
    /// propagated from the successor.
    pub fn refresh_stage_label(&mut self) {
        if let Some(next) = self.next_game.as_mut() {
            next.refresh_stage_label();
        }

        let successor_abandoned = self
            .next_game
            .as_ref()
            .is_some_and(|next| next.stage == Stage::Abandoned);
        if successor_abandoned {
            self.stage_label = ABANDONED_LABEL.to_owned();
            return;
        }

        self.stage_label = match self.stage {
            Stage::Results => "The votes are in!".to_owned(),
            Stage::Winner => "The votes are in - we have a winner!".to_owned(),
            Stage::Abandoned => ABANDONED_LABEL.to_owned(),
            other => format!("Stage: {other}"),
        };
    }

    /// Re-render the deadline label from the current time.
    pub fn refresh_deadline_age(&mut self, now: i64) {
        let successor_abandoned = self
            .next_game
            .as_ref()
            .is_some_and(|next| next.stage == Stage::Abandoned);
        if self.stage == Stage::Abandoned || successor_abandoned {
            self.deadline_age.clear();
            self.deadline_color = LabelColor::Neutral;
            return;
        }

        let delta = self.effective_deadline() - now;
        if delta > 3600 {
            let hours = delta / 3600;
            let unit = if hours > 1 { "hours" } else { "hour" };
            self.deadline_age = format!("Deadline: {hours} {unit}");
            self.deadline_color = LabelColor::Neutral;
        } else if delta > 60 {
            let minutes = delta / 60;
            let unit = if minutes > 1 { "minutes" } else { "minute" };
            self.deadline_age = format!("Deadline: {minutes} {unit}");
            self.deadline_color = LabelColor::Warning;
        } else {
            self.deadline_age = "Deadline: imminent".to_owned();
            self.deadline_color = LabelColor::Urgent;
        }

        // Whatever the time left, an idle player has nothing urgent.
        if !self.has_action_item() {
            self.deadline_color = LabelColor::Neutral;
        }
    }

    fn compute_voter_labels(&mut self) {
        if !matches!(self.stage, Stage::Results | Stage::Winner) {
            return;
        }

        let mut tally: HashMap<u32, Vec<String>> = HashMap::new();
        for player in &self.players {
            if let Some(target) = player.vote {
                tally
                    .entry(target)
                    .or_default()
                    .push(player.first_name.clone());
            }
        }

        for player in &mut self.players {
            let voters: &[String] = tally
                .get(&player.display_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            player.voters_label = Some(match voters.len() {
                0 => "No votes".to_owned(),
                1 => format!("1 vote: {}", voters[0]),
                count => format!("{count} votes: {}", voters.join(", ")),
            });
        }
    }

    fn compute_round_winner_labels(&mut self) {
        let winners: Vec<u32> = self
            .players
            .iter()
            .filter(|player| player.is_round_winner)
            .map(|player| player.display_id)
            .collect();
        if winners.is_empty() {
            return;
        }

        let tied = winners.len() > 1;
        let base = if tied {
            "Round winner (tied)"
        } else {
            "Round winner"
        };
        for player in &mut self.players {
            let picked_winner = player.vote.is_some_and(|vote| winners.contains(&vote));
            if player.is_round_winner {
                let mut label = base.to_owned();
                if tied && picked_winner {
                    label.push_str(", picked winner");
                }
                player.round_winner_label = Some(label);
            } else if picked_winner {
                player.round_winner_label = Some("Picked winner".to_owned());
            }
        }
    }

    fn compute_game_winner_labels(&mut self, winning_score: i64) {
        let top = self
            .players
            .iter()
            .map(|player| player.game_score)
            .max()
            .unwrap_or(0);
        if top < winning_score {
            return;
        }

        let count = self
            .players
            .iter()
            .filter(|player| player.game_score == top)
            .count();
        let label = if count > 1 {
            "Game winner (tied)"
        } else {
            "Game winner!"
        };
        for player in &mut self.players {
            if player.game_score == top {
                player.is_game_winner = true;
                player.game_win_label = Some(label.to_owned());
            }
        }
    }
}

/// Synthesize a game name from the other participants' first names, bounded
/// by the configured maximum length.
fn synthesize_name(players: &[Player], me: Option<usize>, max_length: usize) -> String {
    if players.is_empty() {
        return "No players".to_owned();
    }
    if players.len() == 1 {
        let name = players[0].name.trim();
        return if name.is_empty() {
            "Unknown player".to_owned()
        } else {
            players[0].name.clone()
        };
    }

    let others: Vec<&Player> = players
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != me)
        .map(|(_, player)| player)
        .collect();
    if others.len() == 1 {
        return others[0].name.clone();
    }

    // Leave room for the " & N more" suffix.
    let budget = max_length.saturating_sub(8);
    let mut name = others[0].first_name.clone();
    for (index, other) in others.iter().enumerate().skip(1) {
        let remaining = others.len() - index;
        if remaining == 1 {
            name.push_str(" & ");
            name.push_str(&other.first_name);
            return name;
        }
        if name.len() >= budget {
            name.push_str(&format!(" & {remaining} more"));
            return name;
        }
        name.push_str(", ");
        name.push_str(&other.first_name);
    }
    name
}
