//! Replay system for recording and playing back matches.
//!
//! A replay stores the serialized starting registry, the fixed tick delta
//! and every order issued during the match together with the selection it
//! applied to. Because the registry is deterministic, re-applying the same
//! orders before the same ticks reproduces the match exactly.
//!
//! Replays always tick with [`Roster::AllLive`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed};
use crate::orders::Order;
use crate::registry::{OrderOutcome, Registry, Roster, TickEvents};
use crate::unit::UnitId;

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// An order recorded for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayCommand {
    /// Registry tick count when the order was issued. The order is applied
    /// before the following tick runs.
    pub tick: u64,
    /// Units selected when the order was issued.
    pub selection: Vec<UnitId>,
    /// The order itself.
    pub order: Order,
}

/// Complete replay data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Seconds advanced per tick.
    #[serde(with = "fixed_serde")]
    pub delta: Fixed,
    /// Serialized starting registry.
    pub initial_state: Vec<u8>,
    /// Orders in the order they were issued.
    pub commands: Vec<ReplayCommand>,
    /// Registry tick count when recording stopped.
    pub final_tick: u64,
    /// State hash when recording stopped.
    pub final_hash: u64,
}

impl Replay {
    /// Start a replay from a registry's current state.
    pub fn new(scenario_id: impl Into<String>, delta: Fixed, initial: &Registry) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            delta,
            initial_state: initial.serialize()?,
            commands: Vec::new(),
            final_tick: initial.current_tick(),
            final_hash: initial.state_hash(),
        })
    }

    /// Record an order.
    pub fn record(&mut self, tick: u64, selection: Vec<UnitId>, order: Order) {
        self.commands.push(ReplayCommand {
            tick,
            selection,
            order,
        });
    }

    /// Finalize the replay with the end state.
    pub fn finalize(&mut self, final_tick: u64, final_hash: u64) {
        self.final_tick = final_tick;
        self.final_hash = final_hash;
    }

    /// Save the replay to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Load a replay from a file, rejecting other format versions.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::Serialization(format!("failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::UnsupportedReplayVersion {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }
        Ok(replay)
    }

    /// Rebuild the starting registry.
    pub fn restore_initial_state(&self) -> Result<Registry> {
        Registry::deserialize(&self.initial_state)
    }

    /// Orders issued at a given tick.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> Vec<&ReplayCommand> {
        self.commands.iter().filter(|cmd| cmd.tick == tick).collect()
    }

    /// Number of recorded orders.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Re-run `ticks` ticks from the starting state and return the registry.
    pub fn run(&self, ticks: u64) -> Result<Registry> {
        let mut player = ReplayPlayer::new(self.clone())?;
        for _ in 0..ticks {
            player.step();
        }
        Ok(player.registry)
    }

    /// Re-run the whole replay and compare the final state hash.
    pub fn verify(&self) -> Result<()> {
        let initial = self.restore_initial_state()?;
        let ticks = self.final_tick.saturating_sub(initial.current_tick());
        let registry = self.run(ticks)?;

        let actual = registry.state_hash();
        if actual != self.final_hash {
            return Err(GameError::ReplayMismatch {
                tick: registry.current_tick(),
                expected: self.final_hash,
                actual,
            });
        }
        Ok(())
    }
}

fn apply(registry: &mut Registry, command: &ReplayCommand) -> OrderOutcome {
    registry.clear_selection();
    for &id in &command.selection {
        registry.select(id);
    }
    registry.issue_order(command.order)
}

/// Drives a registry while recording every order into a replay.
#[derive(Debug)]
pub struct ReplayRecorder {
    registry: Registry,
    replay: Replay,
}

impl ReplayRecorder {
    /// Start recording from `registry`'s current state.
    pub fn new(scenario_id: impl Into<String>, delta: Fixed, registry: Registry) -> Result<Self> {
        let replay = Replay::new(scenario_id, delta, &registry)?;
        Ok(Self { registry, replay })
    }

    /// Replace the selection and issue an order to it.
    pub fn issue_order(&mut self, selection: &[UnitId], order: Order) -> OrderOutcome {
        let command = ReplayCommand {
            tick: self.registry.current_tick(),
            selection: selection.to_vec(),
            order,
        };
        let outcome = apply(&mut self.registry, &command);
        self.replay.commands.push(command);
        outcome
    }

    /// Advance one tick with the replay's delta.
    pub fn tick(&mut self) -> TickEvents {
        self.registry.tick(self.replay.delta, &Roster::AllLive)
    }

    /// The registry being recorded.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Stop recording and return the finalized replay with the registry.
    #[must_use]
    pub fn finish(mut self) -> (Replay, Registry) {
        self.replay
            .finalize(self.registry.current_tick(), self.registry.state_hash());
        (self.replay, self.registry)
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    registry: Registry,
    command_index: usize,
}

impl ReplayPlayer {
    /// Create a player positioned at the replay's start.
    pub fn new(replay: Replay) -> Result<Self> {
        let registry = replay.restore_initial_state()?;
        Ok(Self {
            replay,
            registry,
            command_index: 0,
        })
    }

    fn step(&mut self) {
        let now = self.registry.current_tick();
        while let Some(command) = self.replay.commands.get(self.command_index) {
            if command.tick > now {
                break;
            }
            apply(&mut self.registry, command);
            self.command_index += 1;
        }
        self.registry.tick(self.replay.delta, &Roster::AllLive);
    }

    /// Advance one tick. Returns `true` while ticks remain.
    pub fn advance(&mut self) -> bool {
        if !self.is_finished() {
            self.step();
        }
        !self.is_finished()
    }

    /// Restart from the initial state and play up to `target_tick`.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        self.registry = self.replay.restore_initial_state()?;
        self.command_index = 0;

        let target = target_tick.min(self.replay.final_tick);
        while self.registry.current_tick() < target {
            self.step();
        }
        Ok(())
    }

    /// Current registry tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.registry.current_tick()
    }

    /// The registry at the current playback position.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Check if playback reached the recorded end.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.registry.current_tick() >= self.replay.final_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factions::Faction;
    use crate::math::Vec3Fixed;
    use crate::template::StatTemplate;

    fn delta() -> Fixed {
        Fixed::from_num(0.05)
    }

    fn skirmish() -> (Registry, Vec<UnitId>) {
        let mut registry = Registry::new();
        let template = StatTemplate::infantry_squad();
        let ids = vec![
            registry.spawn(Faction::Allied, Vec3Fixed::from_ints(-5, 0, -5), &template),
            registry.spawn(Faction::Allied, Vec3Fixed::from_ints(5, 0, -5), &template),
            registry.spawn(Faction::Coalition, Vec3Fixed::from_ints(0, 0, 5), &template),
        ];
        (registry, ids)
    }

    fn recorded_match() -> Replay {
        let (registry, ids) = skirmish();
        let mut recorder = ReplayRecorder::new("skirmish", delta(), registry).unwrap();

        recorder.issue_order(&ids[..1], Order::Special);
        for _ in 0..10 {
            recorder.tick();
        }
        recorder.issue_order(&ids[..2], Order::Move(Vec3Fixed::from_ints(0, 0, 40)));
        for _ in 0..10 {
            recorder.tick();
        }
        recorder.issue_order(&ids[2..], Order::Defend);
        for _ in 0..20 {
            recorder.tick();
        }

        recorder.finish().0
    }

    #[test]
    fn test_recorder_captures_orders_with_ticks() {
        let replay = recorded_match();
        assert_eq!(replay.version, REPLAY_VERSION);
        assert_eq!(replay.command_count(), 3);
        assert_eq!(replay.commands_at_tick(0).len(), 1);
        assert_eq!(replay.commands_at_tick(10).len(), 1);
        assert_eq!(replay.commands_at_tick(20).len(), 1);
        assert_eq!(replay.final_tick, 40);
    }

    #[test]
    fn test_run_reproduces_final_hash() {
        let replay = recorded_match();
        let registry = replay.run(40).unwrap();
        assert_eq!(registry.state_hash(), replay.final_hash);
        assert!(replay.verify().is_ok());
    }

    #[test]
    fn test_tampered_replay_fails_verification() {
        let mut replay = recorded_match();
        replay.commands[1].order = Order::Move(Vec3Fixed::from_ints(0, 0, -40));

        match replay.verify() {
            Err(GameError::ReplayMismatch { tick, expected, .. }) => {
                assert_eq!(tick, 40);
                assert_eq!(expected, replay.final_hash);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_player_seek_matches_advance() {
        let replay = recorded_match();
        let mut stepped = ReplayPlayer::new(replay.clone()).unwrap();
        for _ in 0..15 {
            assert!(stepped.advance());
        }

        let mut seeker = ReplayPlayer::new(replay).unwrap();
        seeker.seek(30).unwrap();
        seeker.seek(15).unwrap();

        assert_eq!(seeker.current_tick(), 15);
        assert_eq!(seeker.registry().state_hash(), stepped.registry().state_hash());

        while stepped.advance() {}
        assert!(stepped.is_finished());
        assert_eq!(stepped.current_tick(), 40);
    }

    #[test]
    fn test_replay_save_load() {
        let replay = recorded_match();
        let dir = std::env::temp_dir().join(format!("squad_replay_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("match.replay");

        replay.save(&path).unwrap();
        let loaded = Replay::load(&path).unwrap();
        assert_eq!(loaded, replay);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_load_rejects_other_versions() {
        let mut replay = recorded_match();
        replay.version = REPLAY_VERSION + 1;
        let path = std::env::temp_dir().join(format!("squad_replay_v_{}.bin", std::process::id()));
        replay.save(&path).unwrap();

        assert!(matches!(
            Replay::load(&path),
            Err(GameError::UnsupportedReplayVersion { found, .. }) if found == REPLAY_VERSION + 1
        ));
        let _ = std::fs::remove_file(path);
    }
}
