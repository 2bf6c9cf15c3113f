//! Game State
//!
//! The authoritative record for one game: registered players, the active
//! map, live role positions and the game phase.
//!
//! One `GameState` is owned by the connection layer and handed to every
//! operation; nothing here is global. Every method runs to completion
//! without suspending, so callers holding the lock see consistent state.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::renderable::{Renderable, RenderableError, SpriteAtlas};
use crate::game::config::{PlayerConfig, PressedKeys, MOVEMENT_ACTIONS};
use crate::game::map::WorldMap;
use crate::game::player::{PlayerHandle, PlayerId, PlayerSession, Pursuer};
use crate::game::position::PositionTracker;
use crate::game::role::{sprite_atlas, Role};

// =============================================================================
// SETTINGS / PHASE / FRAME
// =============================================================================

/// Tunables for a game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSettings {
    /// Players required before the readiness gate can open.
    pub min_players: usize,
    /// Distance moved per pressed direction per input report.
    pub move_step: f64,
    /// Sessions silent for longer than this are evicted. None disables eviction.
    pub idle_timeout: Option<Duration>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            min_players: 2,
            move_step: 5.0,
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Game phase. Only ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Waiting for players to ready up.
    NotStarted,
    /// Game running.
    InProgress,
}

/// Per-request snapshot sent to one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Registered players, spectators included.
    pub player_count: usize,
    /// Shapes in paint order.
    pub render_data: Vec<Renderable>,
}

/// Game state errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// The id was never registered (or has been evicted).
    #[error("unknown player id {0}")]
    UnknownPlayer(PlayerId),

    /// Pursuer invariant violated.
    #[error("no pursuer among {0} registered players")]
    NoPursuer(usize),

    /// Map or sprite geometry could not be produced.
    #[error("render data: {0}")]
    Render(#[from] RenderableError),
}

// =============================================================================
// GAME STATE
// =============================================================================

/// State of one game.
pub struct GameState {
    /// Registered players.
    players: BTreeMap<PlayerId, PlayerSession>,
    /// Registration order, used for stable frame ordering.
    join_order: Vec<PlayerId>,
    /// Live position per playable role.
    positions: BTreeMap<Role, PositionTracker>,
    /// Active map.
    map: WorldMap,
    /// Sprite sizes for hit-testing.
    atlas: SpriteAtlas,
    /// Current phase.
    phase: GamePhase,
    /// Tunables.
    settings: GameSettings,
}

impl GameState {
    /// Create a game on `map`.
    pub fn new(map: WorldMap, settings: GameSettings) -> Self {
        let positions = [Role::Pursuer, Role::Seeker1, Role::Seeker2, Role::Seeker3, Role::Seeker4]
            .into_iter()
            .filter_map(|role| map.starting_positions().for_role(role).map(|pos| (role, pos)))
            .collect();

        Self {
            players: BTreeMap::new(),
            join_order: Vec::new(),
            positions,
            map,
            atlas: sprite_atlas(),
            phase: GamePhase::NotStarted,
            settings,
        }
    }

    /// Register a new player and assign their role.
    ///
    /// Roles fill the first free slot of pursuer, seeker 1; everyone else
    /// spectates. Existing players keep their roles.
    pub fn register_player(&mut self) -> (PlayerId, Role) {
        let id = PlayerId::generate();
        let role = self.next_role();

        self.players.insert(id, PlayerSession::new(id, role, Instant::now()));
        self.join_order.push(id);

        info!("Registered player {} as {} ({} total)", id.short(), role, self.players.len());
        (id, role)
    }

    fn next_role(&self) -> Role {
        Role::JOIN_SLOTS
            .iter()
            .copied()
            .find(|slot| !self.players.values().any(|p| p.role == *slot))
            .unwrap_or(Role::Spectator)
    }

    /// Shallow-merge `partial` over the player's configuration.
    pub fn update_config(&mut self, id: &PlayerId, partial: PlayerConfig) -> Result<(), GameError> {
        let session = self.session_mut(id)?;
        session.config.merge(partial);
        Ok(())
    }

    /// Mark a player ready. Idempotent.
    pub fn mark_ready(&mut self, id: &PlayerId) -> Result<(), GameError> {
        let session = self.session_mut(id)?;
        if !session.ready {
            session.ready = true;
            debug!("Player {} ready", id.short());
        }
        Ok(())
    }

    /// Replace a player's key snapshot and refresh last-seen.
    ///
    /// Once the game is in progress, pressed movement actions move the
    /// player's role position; moves into a wall are dropped.
    pub fn record_input(&mut self, id: &PlayerId, pressed_keys: PressedKeys) -> Result<(), GameError> {
        self.record_input_at(id, pressed_keys, Instant::now())
    }

    /// [`GameState::record_input`] with an explicit clock.
    pub fn record_input_at(&mut self, id: &PlayerId, pressed_keys: PressedKeys, now: Instant) -> Result<(), GameError> {
        self.session_mut(id)?.record_input(pressed_keys, now);

        if self.phase == GamePhase::InProgress {
            self.apply_movement(id)?;
        }
        Ok(())
    }

    fn apply_movement(&mut self, id: &PlayerId) -> Result<(), GameError> {
        let session = self.players.get(id).ok_or(GameError::UnknownPlayer(*id))?;
        let role = session.role;
        let Some(mut position) = self.positions.get(&role).copied() else {
            return Ok(());
        };

        let handle = PlayerHandle::new(session);
        let directions: Vec<_> = MOVEMENT_ACTIONS
            .iter()
            .filter(|(action, _)| handle.is_pressing(action))
            .map(|(_, direction)| *direction)
            .collect();

        for direction in directions {
            let mut next = position;
            next.move_by(direction, self.settings.move_step);
            if let Some(sprite) = role_sprite(role, next) {
                if self.map.blocks(&sprite, &self.atlas)? {
                    continue;
                }
            }
            position = next;
        }

        self.positions.insert(role, position);
        Ok(())
    }

    /// Build the frame shown to `requester`.
    ///
    /// Walls first, then the pursuer (only for the pursuer themself or while
    /// the pursuer sprints), then every seeker in registration order.
    pub fn compute_frame(&self, requester: &PlayerId) -> Result<Frame, GameError> {
        let requester_role = self.role_of(requester)?;
        let mut render_data = self.map.render_data()?;

        let pursuer = self.pursuer()?;
        if requester_role == Role::Pursuer || pursuer.is_sprinting() {
            render_data.extend(self.sprite_for(Role::Pursuer));
        }

        for id in &self.join_order {
            if let Some(session) = self.players.get(id) {
                if session.role.is_seeker() {
                    render_data.extend(self.sprite_for(session.role));
                }
            }
        }

        Ok(Frame {
            player_count: self.players.len(),
            render_data,
        })
    }

    fn sprite_for(&self, role: Role) -> Option<Renderable> {
        self.positions.get(&role).and_then(|pos| role_sprite(role, *pos))
    }

    /// The pursuer's capability view.
    ///
    /// Exactly one pursuer exists whenever anyone is registered; a missing
    /// pursuer is reported as [`GameError::NoPursuer`].
    pub fn pursuer(&self) -> Result<Pursuer<'_>, GameError> {
        self.players
            .values()
            .find_map(Pursuer::new)
            .ok_or(GameError::NoPursuer(self.players.len()))
    }

    /// Open the readiness gate if possible.
    ///
    /// Returns true exactly once: on the call that moves the phase from
    /// NotStarted to InProgress.
    pub fn try_start(&mut self) -> bool {
        if self.phase != GamePhase::NotStarted {
            return false;
        }
        // Never fewer than two: a game needs a pursuer and someone to chase.
        if self.players.len() < self.settings.min_players.max(2) || !self.all_ready() {
            return false;
        }

        self.phase = GamePhase::InProgress;
        info!("Game started with {} players on map {}", self.players.len(), self.map.name());
        true
    }

    /// Remove sessions idle for longer than the configured timeout.
    ///
    /// The pursuer is never evicted. Freed seeker slots return to their
    /// starting position for the next registrant.
    pub fn evict_idle(&mut self, now: Instant) -> Vec<PlayerId> {
        let Some(timeout) = self.settings.idle_timeout else {
            return Vec::new();
        };

        let evicted: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.role != Role::Pursuer && p.idle_for(now) > timeout)
            .map(|p| p.id)
            .collect();

        for id in &evicted {
            if let Some(session) = self.players.remove(id) {
                if let Some(start) = self.map.starting_positions().for_role(session.role) {
                    self.positions.insert(session.role, start);
                }
                info!("Evicted idle player {} ({})", id.short(), session.role);
            }
        }
        self.join_order.retain(|id| self.players.contains_key(id));

        evicted
    }

    /// Check if every registered player is ready.
    pub fn all_ready(&self) -> bool {
        self.players.values().all(|p| p.ready)
    }

    /// Check if `id` is registered.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// Role of a registered player.
    pub fn role_of(&self, id: &PlayerId) -> Result<Role, GameError> {
        self.players.get(id).map(|p| p.role).ok_or(GameError::UnknownPlayer(*id))
    }

    /// Session record of a registered player.
    pub fn session(&self, id: &PlayerId) -> Option<&PlayerSession> {
        self.players.get(id)
    }

    /// Registered ids in registration order.
    pub fn player_ids(&self) -> &[PlayerId] {
        &self.join_order
    }

    /// Number of registered players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Live position of a playable role.
    pub fn position_of(&self, role: Role) -> Option<PositionTracker> {
        self.positions.get(&role).copied()
    }

    /// Active map.
    pub fn map(&self) -> &WorldMap {
        &self.map
    }

    /// Tunables.
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    fn session_mut(&mut self, id: &PlayerId) -> Result<&mut PlayerSession, GameError> {
        self.players.get_mut(id).ok_or(GameError::UnknownPlayer(*id))
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(WorldMap::random(), GameSettings::default())
    }
}

fn role_sprite(role: Role, position: PositionTracker) -> Option<Renderable> {
    role.sprite_image()
        .map(|image| Renderable::sprite(image, position.point(), 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::ACTION_PURSUER_SPRINT;
    use crate::game::role::{PURSUER_IMAGE, SEEKER_IMAGE};

    fn sprites(frame: &Frame) -> Vec<&Renderable> {
        frame
            .render_data
            .iter()
            .filter(|r| matches!(r, Renderable::Sprite(_)))
            .collect()
    }

    fn pursuer_visible(frame: &Frame) -> bool {
        frame
            .render_data
            .iter()
            .any(|r| matches!(r, Renderable::Sprite(s) if s.image == PURSUER_IMAGE))
    }

    fn started_game() -> (GameState, PlayerId, PlayerId) {
        let mut state = GameState::default();
        let (pursuer, _) = state.register_player();
        let (seeker, _) = state.register_player();
        state.mark_ready(&pursuer).unwrap();
        state.mark_ready(&seeker).unwrap();
        assert!(state.try_start());
        (state, pursuer, seeker)
    }

    #[test]
    fn test_roles_by_join_order() {
        let mut state = GameState::default();
        let roles: Vec<Role> = (0..5).map(|_| state.register_player().1).collect();
        assert_eq!(
            roles,
            vec![Role::Pursuer, Role::Seeker1, Role::Spectator, Role::Spectator, Role::Spectator]
        );
    }

    #[test]
    fn test_exactly_one_pursuer() {
        for n in 1..8 {
            let mut state = GameState::default();
            for _ in 0..n {
                state.register_player();
            }
            let pursuers = state
                .player_ids()
                .iter()
                .filter(|id| state.role_of(id).unwrap() == Role::Pursuer)
                .count();
            assert_eq!(pursuers, 1, "{n} players");
            assert!(state.pursuer().is_ok());
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let mut state = GameState::default();
        let (a, _) = state.register_player();
        let (b, _) = state.register_player();
        assert_ne!(a, b);
    }

    #[test]
    fn test_update_config_merges() {
        let mut state = GameState::default();
        let (id, _) = state.register_player();
        state
            .update_config(&id, PlayerConfig::from_pairs([(ACTION_PURSUER_SPRINT, "q")]))
            .unwrap();

        let config = &state.session(&id).unwrap().config;
        assert_eq!(config.key_for(ACTION_PURSUER_SPRINT), Some("q"));
        // Untouched default survives
        assert_eq!(config.key_for("MoveUp"), Some("w"));
    }

    #[test]
    fn test_unknown_id_is_rejected_without_mutation() {
        let mut state = GameState::default();
        state.register_player();
        let stranger = PlayerId::generate();

        assert_eq!(
            state.record_input(&stranger, PressedKeys::default()),
            Err(GameError::UnknownPlayer(stranger))
        );
        assert_eq!(state.mark_ready(&stranger), Err(GameError::UnknownPlayer(stranger)));
        assert!(state.compute_frame(&stranger).is_err());
        assert_eq!(state.player_count(), 1);
        assert!(!state.contains(&stranger));
    }

    #[test]
    fn test_record_input_replaces_snapshot() {
        let mut state = GameState::default();
        let (id, _) = state.register_player();
        state.record_input(&id, PressedKeys::from_pairs([("a", true)])).unwrap();
        state.record_input(&id, PressedKeys::from_pairs([("b", true)])).unwrap();

        let keys = &state.session(&id).unwrap().pressed_keys;
        assert!(!keys.is_pressed("a"));
        assert!(keys.is_pressed("b"));
    }

    #[test]
    fn test_frame_for_pursuer_includes_pursuer() {
        let mut state = GameState::default();
        let (pursuer, _) = state.register_player();
        state.register_player();

        let frame = state.compute_frame(&pursuer).unwrap();
        assert_eq!(frame.player_count, 2);
        assert_eq!(&frame.render_data[..4], state.map().walls());
        assert!(pursuer_visible(&frame));
        // Pursuer is painted before the seekers
        assert_eq!(sprites(&frame).len(), 2);
        assert!(matches!(sprites(&frame)[0], Renderable::Sprite(s) if s.image == PURSUER_IMAGE));
    }

    #[test]
    fn test_pursuer_hidden_until_sprinting() {
        let mut state = GameState::default();
        let (pursuer, _) = state.register_player();
        let (seeker, _) = state.register_player();

        let frame = state.compute_frame(&seeker).unwrap();
        assert!(!pursuer_visible(&frame));
        assert_eq!(sprites(&frame).len(), 1);

        state.record_input(&pursuer, PressedKeys::from_pairs([("shift", true)])).unwrap();
        let frame = state.compute_frame(&seeker).unwrap();
        assert!(pursuer_visible(&frame));
    }

    #[test]
    fn test_spectators_not_rendered() {
        let mut state = GameState::default();
        let (pursuer, _) = state.register_player();
        for _ in 0..3 {
            state.register_player();
        }

        let frame = state.compute_frame(&pursuer).unwrap();
        let seekers = frame
            .render_data
            .iter()
            .filter(|r| matches!(r, Renderable::Sprite(s) if s.image == SEEKER_IMAGE))
            .count();
        assert_eq!(seekers, 1);
        assert_eq!(frame.player_count, 4);
    }

    #[test]
    fn test_frames_are_deterministic() {
        let mut state = GameState::default();
        let (pursuer, _) = state.register_player();
        state.register_player();
        state.register_player();

        let first = state.compute_frame(&pursuer).unwrap();
        for _ in 0..10 {
            assert_eq!(state.compute_frame(&pursuer).unwrap(), first);
        }
    }

    #[test]
    fn test_missing_pursuer_is_consistency_error() {
        let mut state = GameState::default();
        state.register_player();
        let (seeker, _) = state.register_player();
        state.players.retain(|_, p| p.role != Role::Pursuer);

        assert_eq!(state.compute_frame(&seeker), Err(GameError::NoPursuer(1)));
    }

    #[test]
    fn test_readiness_gate_needs_two_players() {
        let mut state = GameState::default();
        let (solo, _) = state.register_player();
        state.mark_ready(&solo).unwrap();

        assert!(!state.try_start());
        assert_eq!(state.phase(), GamePhase::NotStarted);
    }

    #[test]
    fn test_gate_never_opens_below_two_players() {
        for min_players in [0, 1] {
            let settings = GameSettings { min_players, ..Default::default() };
            let mut state = GameState::new(WorldMap::basic(), settings);
            assert!(!state.try_start(), "empty table started with min_players={min_players}");

            let (solo, _) = state.register_player();
            state.mark_ready(&solo).unwrap();
            assert!(!state.try_start(), "lone player started with min_players={min_players}");
            assert_eq!(state.phase(), GamePhase::NotStarted);
        }
    }

    #[test]
    fn test_readiness_gate_needs_everyone_ready() {
        let mut state = GameState::default();
        let (a, _) = state.register_player();
        let (b, _) = state.register_player();
        state.mark_ready(&a).unwrap();
        assert!(!state.try_start());

        state.mark_ready(&b).unwrap();
        state.mark_ready(&b).unwrap();
        assert!(state.try_start());
        assert_eq!(state.phase(), GamePhase::InProgress);

        // One-shot: never fires again
        assert!(!state.try_start());
        assert_eq!(state.phase(), GamePhase::InProgress);
    }

    #[test]
    fn test_no_movement_before_start() {
        let mut state = GameState::default();
        let (_, _) = state.register_player();
        let (seeker, _) = state.register_player();
        let before = state.position_of(Role::Seeker1);

        state.record_input(&seeker, PressedKeys::from_pairs([("d", true)])).unwrap();
        assert_eq!(state.position_of(Role::Seeker1), before);
    }

    #[test]
    fn test_movement_after_start() {
        let (mut state, _, seeker) = started_game();
        let start = state.position_of(Role::Seeker1).unwrap();

        state
            .record_input(&seeker, PressedKeys::from_pairs([("d", true), ("w", true)]))
            .unwrap();

        let step = state.settings().move_step;
        assert_eq!(
            state.position_of(Role::Seeker1),
            Some(PositionTracker::new(start.x + step, start.y - step))
        );
    }

    #[test]
    fn test_movement_stops_at_walls() {
        let (mut state, pursuer, _) = started_game();

        for _ in 0..100 {
            state.record_input(&pursuer, PressedKeys::from_pairs([("w", true)])).unwrap();
        }

        let pos = state.position_of(Role::Pursuer).unwrap();
        // Sprite top edge (y - 32) never crosses the top wall (y = 30)
        assert!(pos.y - 32.0 > 30.0, "pursuer at {pos:?}");
        let sprite = role_sprite(Role::Pursuer, pos).unwrap();
        assert!(!state.map().blocks(&sprite, &state.atlas).unwrap());
    }

    #[test]
    fn test_frame_follows_movement() {
        let (mut state, pursuer, seeker) = started_game();
        state.record_input(&seeker, PressedKeys::from_pairs([("s", true)])).unwrap();

        let moved = state.position_of(Role::Seeker1).unwrap();
        let frame = state.compute_frame(&pursuer).unwrap();
        assert!(frame
            .render_data
            .iter()
            .any(|r| matches!(r, Renderable::Sprite(s) if s.image == SEEKER_IMAGE && s.y == moved.y)));
    }

    #[test]
    fn test_evict_idle_spares_pursuer() {
        let mut state = GameState::default();
        let (pursuer, _) = state.register_player();
        let (seeker, _) = state.register_player();
        let (spectator, _) = state.register_player();

        let timeout = state.settings().idle_timeout.unwrap();
        let later = Instant::now() + timeout + Duration::from_secs(1);
        let mut evicted = state.evict_idle(later);
        evicted.sort();
        let mut expected = vec![seeker, spectator];
        expected.sort();

        assert_eq!(evicted, expected);
        assert!(state.contains(&pursuer));
        assert_eq!(state.player_ids(), &[pursuer]);

        // Freed seeker slot is handed to the next registrant
        assert_eq!(state.register_player().1, Role::Seeker1);
        assert_eq!(state.register_player().1, Role::Spectator);
    }

    #[test]
    fn test_evict_keeps_active_players() {
        let mut state = GameState::default();
        state.register_player();
        let (seeker, _) = state.register_player();

        assert!(state.evict_idle(Instant::now()).is_empty());
        assert!(state.contains(&seeker));
    }

    #[test]
    fn test_eviction_disabled() {
        let settings = GameSettings { idle_timeout: None, ..Default::default() };
        let mut state = GameState::new(WorldMap::basic(), settings);
        state.register_player();
        state.register_player();

        let far_future = Instant::now() + Duration::from_secs(86_400);
        assert!(state.evict_idle(far_future).is_empty());
        assert_eq!(state.player_count(), 2);
    }
}
