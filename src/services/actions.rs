use std::sync::Arc;

use serde_json::{Value, json};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::dto::response::{Envelope, STATUS_ADVANCED, STATUS_OK};
use crate::error::ActionError;
use crate::remote::{Endpoint, RemoteApi};
use crate::session::{
    KEY_ACCESS_TOKEN, KEY_POEMS_LEFT, KEY_UNLOCKED, KEY_USER_ID, SessionStore,
};
use crate::state::events::{ClientEvent, EventHub};
use crate::state::game::{Entry, Game, GameId};
use crate::state::store::GameListStore;

/// Seconds since the UNIX epoch.
fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Orchestrates player actions against the game list: every operation applies
/// an optimistic local mutation, reruns the derivation pipeline, issues the
/// remote call, then either merges the server's authoritative state or
/// restores the pre-mutation snapshot.
///
/// All mutating operations take `&mut self`; the exclusive borrow held across
/// the remote-call await point is what guarantees that no two operations
/// interleave against the same store.
pub struct GameClient {
    store: GameListStore,
    config: ClientConfig,
    remote: Arc<dyn RemoteApi>,
    session: Arc<dyn SessionStore>,
    events: EventHub,
}

impl GameClient {
    /// Construct a client around the given collaborators with an empty store.
    pub fn new(
        config: ClientConfig,
        remote: Arc<dyn RemoteApi>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            store: GameListStore::new(),
            config,
            remote,
            session,
            events: EventHub::default(),
        }
    }

    /// The ordered, display-ready game list.
    pub fn games(&self) -> &[Game] {
        self.store.heads()
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &GameListStore {
        &self.store
    }

    /// Subscribe to client events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Exchange an access token for a session, persisting the session fields
    /// the server reports.
    pub async fn login(&mut self, access_token: &str) -> Result<(), ActionError> {
        debug!("logging in");
        let payload = json!({ "access_token": access_token });
        let remote = Arc::clone(&self.remote);
        let envelope = remote
            .call(Endpoint::Login, payload)
            .await
            .map_err(|failure| ActionError::from_failure(failure, false))?;
        if envelope.status != STATUS_OK {
            return Err(ActionError::Rejected {
                status: envelope.status,
            });
        }

        self.session.set(KEY_ACCESS_TOKEN, access_token);
        if let Some(user_id) = &envelope.user_id {
            self.session.set(KEY_USER_ID, user_id);
        }
        self.persist_quota(&envelope);
        info!("logged in");
        Ok(())
    }

    /// Clear the session and the game list.
    pub fn logout(&mut self) {
        debug!("logging out");
        self.session.remove(KEY_ACCESS_TOKEN);
        self.session.remove(KEY_POEMS_LEFT);
        self.session.remove(KEY_UNLOCKED);
        self.session.remove(KEY_USER_ID);
        self.store.clear();
    }

    /// Download the full game list and rebuild the store wholesale.
    ///
    /// Syncs requested before the configured minimum interval has elapsed are
    /// rejected locally without contacting the server.
    pub async fn sync_games(&mut self) -> Result<(), ActionError> {
        let now = unix_now();
        let elapsed = now - self.store.last_synced_at();
        let min_interval = self.config.sync_min_interval_secs;
        if elapsed < min_interval {
            info!(elapsed, min_interval, "skipping sync; last one too recent");
            return Err(ActionError::Throttled {
                elapsed,
                min_interval,
            });
        }

        let token = self.access_token()?;
        let remote = Arc::clone(&self.remote);
        let envelope = remote
            .call(Endpoint::Games, json!({ "access_token": token }))
            .await
            .map_err(|failure| ActionError::from_failure(failure, false))?;
        if envelope.status != STATUS_OK {
            return Err(ActionError::Rejected {
                status: envelope.status,
            });
        }

        self.persist_quota(&envelope);
        let raws = envelope.games.unwrap_or_default();
        debug!(count = raws.len(), "rebuilding game list from sync");
        self.store.clear();
        self.store.last_synced_at = now;
        for raw in raws {
            let game = Game::build(raw, &self.config, now);
            self.store.upsert(game);
        }
        self.postprocess_and_notify()
    }

    /// Submit the local user's entry for a round in the writing stage.
    pub async fn submit_entry(&mut self, game_id: GameId, text: &str) -> Result<(), ActionError> {
        let token = self.access_token()?;
        let payload = json!({
            "access_token": token,
            "game_id": game_id,
            "poem": text,
        });
        let text = text.to_owned();
        self.run_action(
            Endpoint::Write,
            payload,
            move |store| {
                let game = store
                    .find_mut(game_id)
                    .ok_or(ActionError::NotFound(game_id))?;
                game.me_mut()?.entry = Entry::Submitted(text);
                store.promote(game_id);
                Ok(())
            },
            reconcile_replacement,
            Some(ClientEvent::WriteFailed),
            true,
        )
        .await
        .map(drop)
    }

    /// Cast the local user's vote for an anonymized entry.
    pub async fn cast_vote(&mut self, game_id: GameId, display_id: u32) -> Result<(), ActionError> {
        let token = self.access_token()?;
        let payload = json!({
            "access_token": token,
            "game_id": game_id,
            "vote": display_id,
        });
        self.run_action(
            Endpoint::Vote,
            payload,
            move |store| {
                let game = store
                    .find_mut(game_id)
                    .ok_or(ActionError::NotFound(game_id))?;
                game.me_mut()?.vote = Some(display_id);
                Ok(())
            },
            reconcile_replacement,
            Some(ClientEvent::VoteFailed),
            false,
        )
        .await
        .map(drop)
    }

    /// Submit a topic, launching the next round of the game.
    ///
    /// The new round's id is unknown until the server responds, so the
    /// optimistic step only suppresses further choose-topic eligibility. On
    /// success the new round is inserted and its predecessor dropped outright.
    pub async fn submit_topic(
        &mut self,
        game_id: GameId,
        topic: &str,
        text: &str,
    ) -> Result<(), ActionError> {
        let token = self.access_token()?;
        let payload = json!({
            "access_token": token,
            "game_id": game_id,
            "topic": topic,
            "poem": text,
        });
        self.run_action(
            Endpoint::Topic,
            payload,
            move |store| {
                let game = store
                    .find_mut(game_id)
                    .ok_or(ActionError::NotFound(game_id))?;
                game.pending_round = true;
                Ok(())
            },
            move |store, config, envelope| {
                if envelope.status == STATUS_ADVANCED {
                    if let Some(raw) = envelope.game.clone() {
                        let game = Game::build(raw, config, unix_now());
                        let new_id = game.id;
                        store.upsert(game);
                        store.drop_predecessor(new_id);
                        // The requesting round is the predecessor even when
                        // its stale record carries no link yet; it may also
                        // sit at the end of an older round's chain.
                        store.remove(game_id);
                    }
                }
                Ok(())
            },
            Some(ClientEvent::TopicFailed),
            true,
        )
        .await
        .map(drop)
    }

    /// Create a brand-new game with the given participants.
    pub async fn start_game(
        &mut self,
        social_ids: &[String],
        topic: &str,
        text: &str,
    ) -> Result<(), ActionError> {
        let token = self.access_token()?;
        let payload = json!({
            "access_token": token,
            "social_ids": social_ids.join(","),
            "topic": topic,
            "poem": text,
        });
        self.run_action(
            Endpoint::NewGame,
            payload,
            |_| Ok(()),
            reconcile_replacement,
            Some(ClientEvent::TopicFailed),
            true,
        )
        .await
        .map(drop)
    }

    /// Rename a game, optimistically.
    pub async fn rename_game(&mut self, game_id: GameId, name: &str) -> Result<(), ActionError> {
        let token = self.access_token()?;
        let payload = json!({
            "access_token": token,
            "game_id": game_id,
            "name": name,
        });
        let name = name.to_owned();
        self.run_action(
            Endpoint::Rename,
            payload,
            move |store| {
                let game = store
                    .find_mut(game_id)
                    .ok_or(ActionError::NotFound(game_id))?;
                game.name = name;
                Ok(())
            },
            |_, _, _| Ok(()),
            None,
            false,
        )
        .await
        .map(drop)
    }

    /// Quit a game, optimistically removing it from the list.
    pub async fn withdraw(&mut self, game_id: GameId) -> Result<(), ActionError> {
        let token = self.access_token()?;
        let payload = json!({
            "access_token": token,
            "game_id": game_id,
        });
        self.run_action(
            Endpoint::Withdraw,
            payload,
            move |store| {
                store
                    .index_of_head(game_id)
                    .ok_or(ActionError::NotFound(game_id))?;
                store.remove_head(game_id);
                Ok(())
            },
            |_, _, _| Ok(()),
            Some(ClientEvent::WithdrawFailed),
            false,
        )
        .await
        .map(drop)
    }

    /// Re-render deadline labels from the given time. Cheap pass meant for a
    /// periodic tick; does not rerun the full pipeline.
    pub fn refresh_deadline_ages(&mut self, now: i64) {
        self.store.refresh_deadline_ages(now);
    }

    /// Optimistic-update transaction shared by every action: snapshot, apply,
    /// attempt the remote effect, then commit-merge or restore.
    async fn run_action<M, C>(
        &mut self,
        endpoint: Endpoint,
        payload: Value,
        mutate: M,
        commit: C,
        failure_event: Option<ClientEvent>,
        quota_sensitive: bool,
    ) -> Result<Envelope, ActionError>
    where
        M: FnOnce(&mut GameListStore) -> Result<(), ActionError>,
        C: FnOnce(&mut GameListStore, &ClientConfig, &Envelope) -> Result<(), ActionError>,
    {
        let snapshot = self.store.snapshot();

        if let Err(err) = mutate(&mut self.store) {
            self.store.restore(snapshot);
            return Err(err);
        }
        if let Err(err) = self.store.postprocess() {
            self.store.restore(snapshot);
            return Err(err.into());
        }
        self.events.notify(ClientEvent::GamesUpdated);

        let remote = Arc::clone(&self.remote);
        match remote.call(endpoint, payload).await {
            Ok(envelope) if envelope.is_success() => {
                commit(&mut self.store, &self.config, &envelope)?;
                self.postprocess_and_notify()?;
                Ok(envelope)
            }
            Ok(envelope) => {
                warn!(
                    status = envelope.status,
                    ?endpoint,
                    "server rejected action; rolling back"
                );
                self.rollback(snapshot, failure_event)?;
                Err(ActionError::Rejected {
                    status: envelope.status,
                })
            }
            Err(failure) => {
                warn!(
                    ?endpoint,
                    status = ?failure.status,
                    message = %failure.message,
                    "remote call failed; rolling back"
                );
                let err = ActionError::from_failure(failure, quota_sensitive);
                let event = if matches!(err, ActionError::OutOfQuota) {
                    Some(ClientEvent::OutOfQuota)
                } else {
                    failure_event
                };
                self.rollback(snapshot, event)?;
                Err(err)
            }
        }
    }

    /// Restore a pre-mutation snapshot and rerun the pipeline so derived
    /// state is recomputed rather than patched.
    fn rollback(
        &mut self,
        snapshot: Vec<Game>,
        event: Option<ClientEvent>,
    ) -> Result<(), ActionError> {
        self.store.restore(snapshot);
        self.postprocess_and_notify()?;
        if let Some(event) = event {
            self.events.notify(event);
        }
        Ok(())
    }

    fn postprocess_and_notify(&mut self) -> Result<(), ActionError> {
        self.store.postprocess()?;
        self.events.notify(ClientEvent::GamesUpdated);
        Ok(())
    }

    fn access_token(&self) -> Result<String, ActionError> {
        self.session
            .get(KEY_ACCESS_TOKEN)
            .ok_or(ActionError::NotLoggedIn)
    }

    fn persist_quota(&self, envelope: &Envelope) {
        if let Some(poems_left) = envelope.poems_left {
            self.session.set(KEY_POEMS_LEFT, &poems_left.to_string());
        }
        if let Some(unlocked) = envelope.unlocked {
            self.session.set(KEY_UNLOCKED, &unlocked.to_string());
        }
    }
}

/// Merge an authoritative replacement record into the store: in place when
/// the id is known (head slot or a predecessor's successor slot), inserted as
/// a fresh head otherwise.
fn reconcile_replacement(
    store: &mut GameListStore,
    config: &ClientConfig,
    envelope: &Envelope,
) -> Result<(), ActionError> {
    if envelope.status != STATUS_ADVANCED {
        return Ok(());
    }
    let Some(raw) = envelope.game.clone() else {
        return Ok(());
    };
    let game = Game::build(raw, config, unix_now());
    if !store.replace(game.clone()) {
        store.upsert(game);
    }
    Ok(())
}
