use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::StoreError;
use crate::state::game::{Game, GameId};

/// Ordered collection of head games, each possibly owning a chain of
/// superseding rounds, plus the bookkeeping for full-sync throttling.
///
/// The store is single-threaded: every mutation and pipeline pass runs to
/// completion before the next one may begin.
#[derive(Debug, Default)]
pub struct GameListStore {
    heads: Vec<Game>,
    /// Reverse index from a successor id to its predecessor head id,
    /// rebuilt by [`GameListStore::link_all`].
    prev_index: IndexMap<GameId, GameId>,
    /// Epoch seconds of the last successful full sync.
    pub(crate) last_synced_at: i64,
}

impl GameListStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The ordered head games, ready for display.
    pub fn heads(&self) -> &[Game] {
        &self.heads
    }

    /// Epoch seconds of the last successful full sync.
    pub fn last_synced_at(&self) -> i64 {
        self.last_synced_at
    }

    /// Drop every game and reset the sync clock. Used on logout.
    pub fn clear(&mut self) {
        self.heads.clear();
        self.prev_index.clear();
        self.last_synced_at = 0;
    }

    /// Insert a game, or replace the existing head with the same id in place.
    pub fn upsert(&mut self, game: Game) {
        match self.index_of_head(game.id) {
            Some(index) => self.heads[index] = game,
            None => self.heads.push(game),
        }
    }

    /// Position of the head with the given id.
    pub fn index_of_head(&self, id: GameId) -> Option<usize> {
        self.heads.iter().position(|game| game.id == id)
    }

    /// Look a game up by id: heads first, then each head's successor chain.
    pub fn find(&self, id: GameId) -> Option<&Game> {
        for head in &self.heads {
            let mut current = Some(head);
            while let Some(game) = current {
                if game.id == id {
                    return Some(game);
                }
                current = game.next_game.as_deref();
            }
        }
        None
    }

    /// Mutable lookup by id across heads and their chains.
    pub fn find_mut(&mut self, id: GameId) -> Option<&mut Game> {
        for head in &mut self.heads {
            let mut current = Some(head);
            while let Some(game) = current.take() {
                if game.id == id {
                    return Some(game);
                }
                current = game.next_game.as_deref_mut();
            }
        }
        None
    }

    /// Remove the head with the given id, if present.
    pub fn remove_head(&mut self, id: GameId) {
        if let Some(index) = self.index_of_head(id) {
            self.heads.remove(index);
        }
    }

    /// Remove a round wherever it lives: a head outright, a chain resident by
    /// unlinking it from the round that owns it. The owner's `next_id` is left
    /// dangling, which the linking pass tolerates.
    pub fn remove(&mut self, id: GameId) {
        if self.index_of_head(id).is_some() {
            self.remove_head(id);
            return;
        }
        for head in &mut self.heads {
            let mut current = Some(head);
            while let Some(game) = current.take() {
                if game.next_game.as_deref().is_some_and(|next| next.id == id) {
                    debug!(game_id = id, owner_id = game.id, "unlinking chain round");
                    game.next_game = None;
                    return;
                }
                current = game.next_game.as_deref_mut();
            }
        }
    }

    /// Replace a game by id, resolving into either the head slot or the
    /// correct predecessor's successor slot. Returns false when the id is
    /// unknown in both.
    pub fn replace(&mut self, game: Game) -> bool {
        let Some(slot) = self.find_mut(game.id) else {
            return false;
        };
        debug!(game_id = game.id, "replacing game in place");
        *slot = game;
        true
    }

    /// Replace the head whose `next_id` names this game with the game's
    /// resolved successor, advancing the round past its predecessor.
    pub fn promote(&mut self, id: GameId) {
        let Some(&pred_id) = self.prev_index.get(&id) else {
            return;
        };
        let Some(index) = self.index_of_head(pred_id) else {
            return;
        };
        if let Some(next) = self.heads[index].next_game.take() {
            if next.id == id {
                debug!(game_id = id, pred_id, "promoting successor to head");
                self.heads[index] = *next;
            } else {
                self.heads[index].next_game = Some(next);
            }
        }
    }

    /// Remove the head whose `next_id` names this game. Used once a stale
    /// previous round is of no further interest, even in linked form.
    pub fn drop_predecessor(&mut self, id: GameId) {
        // Direct scan: the successor may not be indexed yet.
        if let Some(index) = self.heads.iter().position(|game| game.next_id == Some(id)) {
            debug!(game_id = id, pred_id = self.heads[index].id, "dropping predecessor");
            self.heads.remove(index);
        }
    }

    /// Thread predecessor-to-successor chains across the whole list.
    ///
    /// Rebuilds the reverse index and errors when two games claim the same
    /// successor or the links loop; both are data corruption, never resolved
    /// by silently picking one.
    pub fn link_all(&mut self) -> Result<(), StoreError> {
        // Flatten chains first so re-linking never loses rounds that are
        // already threaded under a head; head copies take precedence over
        // chain copies of the same id.
        let mut by_id: HashMap<GameId, Game> = HashMap::new();
        for head in &self.heads {
            let mut current = head.next_game.as_deref();
            while let Some(game) = current {
                by_id.insert(game.id, game.clone());
                current = game.next_game.as_deref();
            }
        }
        for head in &self.heads {
            by_id.insert(head.id, head.clone());
        }

        let mut prev_index = IndexMap::new();
        for game in by_id.values() {
            if let Some(next_id) = game.next_id {
                if prev_index.insert(next_id, game.id).is_some() {
                    return Err(StoreError::AmbiguousPredecessor { id: next_id });
                }
            }
        }
        self.prev_index = prev_index;

        for game in &mut self.heads {
            game.next_game = None;
            if let Some(next_id) = game.next_id {
                let mut seen = HashSet::from([game.id]);
                game.next_game = resolve_chain(&by_id, next_id, &mut seen)?.map(Box::new);
            }
        }
        Ok(())
    }

    /// Remove head entries that are reachable through another head's chain.
    pub fn prune_linked(&mut self) {
        let mut claimed = HashSet::new();
        for head in &self.heads {
            let mut current = head.next_game.as_deref();
            while let Some(game) = current {
                claimed.insert(game.id);
                current = game.next_game.as_deref();
            }
        }
        self.heads.retain(|game| !claimed.contains(&game.id));
    }

    /// Run the full derivation pipeline. Must follow every structural
    /// mutation; the pass order is fixed.
    pub fn postprocess(&mut self) -> Result<(), StoreError> {
        self.link_all()?;
        // Deterministic ordering before the display sort.
        self.heads.sort_by(|a, b| b.id.cmp(&a.id));
        for game in &mut self.heads {
            game.refresh_action_item()?;
        }
        for game in &mut self.heads {
            game.refresh_player_stages();
        }
        for game in &mut self.heads {
            game.refresh_stage_label();
        }
        self.prune_linked();
        self.heads.sort_by(|a, b| {
            b.has_action_item()
                .cmp(&a.has_action_item())
                .then(a.effective_deadline().cmp(&b.effective_deadline()))
        });
        Ok(())
    }

    /// Re-render deadline labels from the current time without rerunning the
    /// full pipeline.
    pub fn refresh_deadline_ages(&mut self, now: i64) {
        for game in &mut self.heads {
            game.refresh_deadline_age(now);
        }
    }

    /// Deep copy of the ordered list, including each head's owned chain.
    pub fn snapshot(&self) -> Vec<Game> {
        self.heads.clone()
    }

    /// Restore a snapshot taken before a mutation. The caller reruns the
    /// pipeline afterwards so derived state is recomputed, never patched.
    pub fn restore(&mut self, snapshot: Vec<Game>) {
        self.heads = snapshot;
    }
}

/// Resolve the chain starting at `id`, cloning each successor out of the flat
/// list. A missing id leaves the link unresolved; a revisited id is a cycle.
fn resolve_chain(
    by_id: &HashMap<GameId, Game>,
    id: GameId,
    seen: &mut HashSet<GameId>,
) -> Result<Option<Game>, StoreError> {
    if !seen.insert(id) {
        return Err(StoreError::LinkCycle { id });
    }
    let Some(game) = by_id.get(&id) else {
        return Ok(None);
    };
    let mut game = game.clone();
    game.next_game = None;
    if let Some(next_id) = game.next_id {
        game.next_game = resolve_chain(by_id, next_id, seen)?.map(Box::new);
    }
    Ok(Some(game))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::dto::game::{RawGame, RawPlayer, RawStage};

    fn raw_player(user_id: u64, name: &str, me: bool) -> RawPlayer {
        RawPlayer {
            user_id,
            facebook_id: format!("fb-{user_id}"),
            fake_id: user_id as u32,
            me,
            name: name.to_owned(),
            poem: Some("done".to_owned()),
            vote: -1,
            round_score: 0,
            winner: false,
            score: 0,
        }
    }

    fn game(id: GameId, stage: RawStage, deadline: i64, next_id: Option<GameId>) -> Game {
        let raw = RawGame {
            game_id: id,
            next_id,
            name: None,
            topic: "rivers".to_owned(),
            topic_picker_id: None,
            is_new: false,
            stage,
            deadline,
            players: vec![
                raw_player(1, "Ann Alpha", true),
                raw_player(2, "Bob Beta", false),
            ],
            anon_poems: vec![],
        };
        Game::build(raw, &ClientConfig::default(), 0)
    }

    fn game_with_pending_entry(id: GameId, deadline: i64) -> Game {
        let mut game = game(id, RawStage::Write, deadline, None);
        game.me_mut().unwrap().entry = crate::state::game::Entry::Pending;
        game
    }

    fn all_ids(store: &GameListStore) -> Vec<(GameId, Vec<GameId>)> {
        store
            .heads()
            .iter()
            .map(|head| {
                let mut chain = vec![];
                let mut current = head.next_game.as_deref();
                while let Some(game) = current {
                    chain.push(game.id);
                    current = game.next_game.as_deref();
                }
                (head.id, chain)
            })
            .collect()
    }

    #[test]
    fn upsert_inserts_then_replaces_in_place() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Write, 100, None));
        store.upsert(game(2, RawStage::Write, 200, None));

        let mut replacement = game(1, RawStage::Vote, 100, None);
        replacement.topic = "mountains".to_owned();
        store.upsert(replacement);

        assert_eq!(store.heads().len(), 2);
        assert_eq!(store.index_of_head(1), Some(0));
        assert_eq!(store.heads()[0].topic, "mountains");
    }

    #[test]
    fn find_searches_heads_then_chains() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(2)));
        store.upsert(game(2, RawStage::Write, 200, None));
        store.postprocess().unwrap();

        // Game 2 is now only reachable through game 1's chain.
        assert_eq!(store.index_of_head(2), None);
        assert_eq!(store.find(2).map(|g| g.id), Some(2));
        assert!(store.find_mut(2).is_some());
        assert_eq!(store.find(99).map(|g| g.id), None);
    }

    #[test]
    fn linking_threads_chains_and_prunes_successors() {
        let mut store = GameListStore::new();
        store.upsert(game(3, RawStage::Write, 300, None));
        store.upsert(game(1, RawStage::Results, 100, Some(2)));
        store.upsert(game(2, RawStage::Results, 200, Some(3)));
        store.postprocess().unwrap();

        let ids = all_ids(&store);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0], (1, vec![2, 3]));
    }

    #[test]
    fn linking_is_idempotent() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(2)));
        store.upsert(game(2, RawStage::Write, 200, None));
        store.upsert(game(5, RawStage::Write, 50, None));

        store.postprocess().unwrap();
        let first = all_ids(&store);
        store.postprocess().unwrap();
        let second = all_ids(&store);
        assert_eq!(first, second);
    }

    #[test]
    fn no_id_is_both_head_and_linked() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(2)));
        store.upsert(game(2, RawStage::Results, 200, Some(4)));
        store.upsert(game(4, RawStage::Write, 300, None));
        store.upsert(game(7, RawStage::Vote, 400, None));
        store.postprocess().unwrap();

        let mut heads = HashSet::new();
        let mut linked = HashSet::new();
        for (head, chain) in all_ids(&store) {
            heads.insert(head);
            linked.extend(chain);
        }
        assert!(heads.is_disjoint(&linked));
    }

    #[test]
    fn dangling_next_id_leaves_link_unresolved() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(42)));
        store.postprocess().unwrap();
        assert!(store.heads()[0].next_game.is_none());
    }

    #[test]
    fn ambiguous_predecessors_rejected() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(3)));
        store.upsert(game(2, RawStage::Results, 200, Some(3)));
        store.upsert(game(3, RawStage::Write, 300, None));

        assert_eq!(
            store.link_all().unwrap_err(),
            StoreError::AmbiguousPredecessor { id: 3 }
        );
    }

    #[test]
    fn link_cycles_rejected() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(2)));
        store.upsert(game(2, RawStage::Results, 200, Some(1)));

        assert!(matches!(
            store.link_all().unwrap_err(),
            StoreError::LinkCycle { .. }
        ));
    }

    #[test]
    fn sort_puts_action_items_first_then_deadline() {
        let mut store = GameListStore::new();
        // No action item, urgent deadline.
        store.upsert(game(1, RawStage::Write, 100, None));
        // Action item, later deadline.
        store.upsert(game_with_pending_entry(2, 5_000));
        // Action item, sooner deadline.
        store.upsert(game_with_pending_entry(3, 2_000));
        // No action item, late deadline.
        store.upsert(game(4, RawStage::Write, 9_000, None));
        store.postprocess().unwrap();

        let order: Vec<GameId> = store.heads().iter().map(|g| g.id).collect();
        assert_eq!(order, vec![3, 2, 1, 4]);

        // Pairwise contract over the postprocessed list.
        let heads = store.heads();
        for (i, a) in heads.iter().enumerate() {
            for b in &heads[i + 1..] {
                if a.has_action_item() != b.has_action_item() {
                    assert!(a.has_action_item());
                } else {
                    assert!(a.effective_deadline() <= b.effective_deadline());
                }
            }
        }
    }

    #[test]
    fn sort_uses_successor_deadline_when_linked() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 9_000, Some(3)));
        // The successor's deadline is what counts for urgency.
        store.upsert(game(3, RawStage::Write, 100, None));
        store.upsert(game(2, RawStage::Write, 500, None));
        store.postprocess().unwrap();

        let order: Vec<GameId> = store.heads().iter().map(|g| g.id).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn promote_replaces_predecessor_with_successor() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(2)));
        store.upsert(game(2, RawStage::Write, 200, None));
        store.postprocess().unwrap();

        store.promote(2);
        assert_eq!(store.index_of_head(1), None);
        assert_eq!(store.index_of_head(2), Some(0));
    }

    #[test]
    fn drop_predecessor_removes_stale_round() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(9)));
        store.upsert(game(9, RawStage::Write, 200, None));

        store.drop_predecessor(9);
        assert_eq!(store.index_of_head(1), None);
        assert_eq!(store.heads().len(), 1);
    }

    #[test]
    fn remove_unlinks_chain_resident_round() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(2)));
        store.upsert(game(2, RawStage::Results, 200, None));
        store.postprocess().unwrap();
        assert!(store.find(2).is_some());

        store.remove(2);
        assert!(store.find(2).is_none());
        // The owner survives with its link dangling.
        store.postprocess().unwrap();
        assert_eq!(store.index_of_head(1), Some(0));
        assert!(store.heads()[0].next_game.is_none());
    }

    #[test]
    fn replace_resolves_into_successor_slot() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(2)));
        store.upsert(game(2, RawStage::Write, 200, None));
        store.postprocess().unwrap();

        let mut newer = game(2, RawStage::Vote, 300, None);
        newer.topic = "storms".to_owned();
        assert!(store.replace(newer));

        let linked = store.heads()[0].next_game.as_deref().unwrap();
        assert_eq!(linked.topic, "storms");
        assert_eq!(linked.stage, crate::state::game::Stage::Vote);
    }

    #[test]
    fn restore_is_indistinguishable_from_never_mutating() {
        let mut store = GameListStore::new();
        store.upsert(game(1, RawStage::Results, 100, Some(2)));
        store.upsert(game_with_pending_entry(2, 200));
        store.postprocess().unwrap();
        let before = store.snapshot();

        // Mutate deep inside the chain, then restore.
        let snapshot = store.snapshot();
        store.find_mut(2).unwrap().topic = "mutated".to_owned();
        store.remove_head(1);
        store.restore(snapshot);
        store.postprocess().unwrap();

        assert_eq!(store.snapshot(), before);
        assert_eq!(
            store.find(2).map(|g| g.topic.clone()),
            Some("rivers".to_owned())
        );
    }
}
