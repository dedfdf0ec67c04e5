//! The simulation registry: unit ownership, selection and order dispatch.
//!
//! The registry owns every unit, the behavior state table and the player's
//! selection. Each [`tick`](Registry::tick) advances units in registration
//! order, so two registries fed the same spawns, orders and deltas always
//! end in the same state.
//!
//! # Example
//!
//! ```
//! use squad_core::prelude::*;
//!
//! let mut registry = Registry::new();
//! let template = StatTemplate::infantry_squad();
//! let squad = registry.spawn(Faction::Allied, Vec3Fixed::ZERO, &template);
//!
//! registry.select(squad);
//! registry.issue_order(Order::Move(Vec3Fixed::from_ints(16, 0, 0)));
//! registry.tick(Fixed::from_num(1), &Roster::AllLive);
//!
//! assert_eq!(registry.unit(squad).unwrap().position(), Vec3Fixed::from_ints(8, 0, 0));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::behavior::{enemies_in_range, AttackEvent, BehaviorMachine, BehaviorState, StateTransition};
use crate::error::{GameError, Result};
use crate::factions::Faction;
use crate::math::{fixed_decimal_serde, fixed_serde, Fixed, Vec3Fixed};
use crate::orders::{Order, OrderKind, OrderPayload};
use crate::schedule::ScheduledTask;
use crate::storage::UnitStorage;
use crate::template::StatTemplate;
use crate::unit::{Unit, UnitDeath, UnitId, UnitSnapshot};

/// Tunable registry settings.
///
/// Loadable from RON; missing fields fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Tactical points each faction starts with.
    pub starting_tactical_points: u32,
    /// Cap on a faction's tactical-point pool.
    pub max_tactical_points: u32,
    /// Require the faction to pay a special's cost before it fires.
    pub enforce_special_cost: bool,
    /// Seconds between threat sweeps. Zero disables the sweep.
    #[serde(with = "fixed_decimal_serde")]
    pub threat_sweep_interval: Fixed,
    /// Match length in seconds.
    #[serde(with = "fixed_decimal_serde")]
    pub match_duration: Fixed,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            starting_tactical_points: 50,
            max_tactical_points: 500,
            enforce_special_cost: true,
            threat_sweep_interval: Fixed::from_num(1),
            match_duration: Fixed::from_num(30 * 60),
        }
    }
}

impl RegistryConfig {
    /// Parse a config from RON text. `source_name` only labels errors.
    pub fn from_ron_str(source_name: &str, ron_text: &str) -> Result<Self> {
        ron::from_str(ron_text).map_err(|e| GameError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }
}

/// Units considered as enemy/friendly candidates during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Roster {
    /// Every unit in the registry.
    #[default]
    AllLive,
    /// Only these units, in this order.
    Only(Vec<UnitId>),
}

/// Result of a threat sweep: how many live units per faction have an enemy
/// in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThreatSweep {
    engaged: [u32; 2],
}

impl ThreatSweep {
    /// Units of `faction` with at least one enemy in range.
    #[must_use]
    pub const fn engaged(&self, faction: Faction) -> u32 {
        self.engaged[faction.index()]
    }

    /// Engaged units across both factions.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.engaged[0] + self.engaged[1]
    }
}

/// Events generated during a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Units removed this tick, in registration order.
    pub deaths: Vec<UnitDeath>,
    /// Attacks fired by behaviors.
    pub attacks: Vec<AttackEvent>,
    /// Behavior state changes.
    pub transitions: Vec<StateTransition>,
    /// Set on ticks where the threat sweep ran.
    pub threat_sweep: Option<ThreatSweep>,
}

/// Effect of one order on the selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderOutcome {
    /// Selected units the order was applied to.
    pub affected: Vec<UnitId>,
    /// Immediate strikes from an attack order.
    pub attacks: Vec<AttackEvent>,
    /// Units removed because of the order.
    pub deaths: Vec<UnitDeath>,
}

/// Owner of all units, the behavior table and the selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    tick: u64,
    #[serde(with = "fixed_serde")]
    elapsed: Fixed,
    units: UnitStorage,
    behavior: BehaviorMachine,
    selection: BTreeSet<UnitId>,
    tactical_points: [u32; 2],
    scores: [u32; 2],
    starting_tactical_points: u32,
    max_tactical_points: u32,
    enforce_special_cost: bool,
    #[serde(with = "fixed_serde")]
    match_duration: Fixed,
    threat_sweep: ScheduledTask,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry with the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&RegistryConfig::default())
    }

    /// Create an empty registry.
    #[must_use]
    pub fn with_config(config: &RegistryConfig) -> Self {
        let starting = config
            .starting_tactical_points
            .min(config.max_tactical_points);
        Self {
            tick: 0,
            elapsed: Fixed::ZERO,
            units: UnitStorage::new(),
            behavior: BehaviorMachine::new(),
            selection: BTreeSet::new(),
            tactical_points: [starting; 2],
            scores: [0; 2],
            starting_tactical_points: starting,
            max_tactical_points: config.max_tactical_points,
            enforce_special_cost: config.enforce_special_cost,
            match_duration: config.match_duration.max(Fixed::ZERO),
            threat_sweep: ScheduledTask::new(config.threat_sweep_interval),
        }
    }

    /// The config this registry runs with.
    #[must_use]
    pub fn config(&self) -> RegistryConfig {
        RegistryConfig {
            starting_tactical_points: self.starting_tactical_points,
            max_tactical_points: self.max_tactical_points,
            enforce_special_cost: self.enforce_special_cost,
            threat_sweep_interval: self.threat_sweep.interval(),
            match_duration: self.match_duration,
        }
    }

    // ------------------------------------------------------------------
    // Spawning and lookup
    // ------------------------------------------------------------------

    /// Create a unit from a template. It starts `Idle`.
    pub fn spawn(&mut self, faction: Faction, position: Vec3Fixed, template: &StatTemplate) -> UnitId {
        let id = self
            .units
            .insert_with(|id| Unit::new(id, faction, position, template));
        self.behavior.register(id);
        tracing::debug!(unit = %id, template = %template.name, ?faction, "unit spawned");
        id
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Iterate units in registration order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Number of units in the registry.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Live units belonging to `faction`.
    #[must_use]
    pub fn live_count(&self, faction: Faction) -> usize {
        self.units
            .iter()
            .filter(|u| u.is_alive() && u.faction() == faction)
            .count()
    }

    /// Behavior state of a unit.
    #[must_use]
    pub fn behavior_state(&self, id: UnitId) -> Option<BehaviorState> {
        self.behavior.state(id)
    }

    /// Force a unit's behavior state.
    pub fn set_behavior_state(&mut self, id: UnitId, state: BehaviorState) -> Option<StateTransition> {
        self.behavior.set_state(id, state)
    }

    /// Read-only view of one unit.
    #[must_use]
    pub fn snapshot(&self, id: UnitId) -> Option<UnitSnapshot> {
        let unit = self.units.get(id)?;
        Some(unit.snapshot(self.behavior.state(id).unwrap_or_default()))
    }

    /// Read-only views of every unit, in registration order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<UnitSnapshot> {
        self.units
            .iter()
            .map(|u| u.snapshot(self.behavior.state(u.id()).unwrap_or_default()))
            .collect()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Add a live unit to the selection. Unknown ids are ignored.
    pub fn select(&mut self, id: UnitId) {
        if let Some(unit) = self.units.get_mut(id).filter(|u| u.is_alive()) {
            unit.select();
            self.selection.insert(id);
        }
    }

    /// Remove a unit from the selection.
    pub fn deselect(&mut self, id: UnitId) {
        if let Some(unit) = self.units.get_mut(id) {
            unit.deselect();
        }
        self.selection.remove(&id);
    }

    /// Empty the selection.
    pub fn clear_selection(&mut self) {
        for id in std::mem::take(&mut self.selection) {
            if let Some(unit) = self.units.get_mut(id) {
                unit.deselect();
            }
        }
    }

    /// Selected ids in ascending order.
    #[must_use]
    pub fn selection(&self) -> Vec<UnitId> {
        self.selection.iter().copied().collect()
    }

    /// Check whether a unit is selected.
    #[must_use]
    pub fn is_selected(&self, id: UnitId) -> bool {
        self.selection.contains(&id)
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    /// Apply an untyped order. A payload that does not fit the kind is
    /// ignored and the outcome is empty.
    pub fn issue_order_parts(&mut self, kind: OrderKind, payload: OrderPayload) -> OrderOutcome {
        match Order::from_parts(kind, payload) {
            Some(order) => self.issue_order(order),
            None => {
                tracing::trace!(?kind, ?payload, "malformed order ignored");
                OrderOutcome::default()
            }
        }
    }

    /// Apply an order to every selected unit, in ascending id order.
    pub fn issue_order(&mut self, order: Order) -> OrderOutcome {
        tracing::trace!(?order, selected = self.selection.len(), "order issued");

        let mut outcome = OrderOutcome::default();
        for id in self.selection() {
            let applied = match order {
                Order::Move(point) => self.order_move(id, point),
                Order::Attack(target) => self.order_attack(id, target, &mut outcome.attacks),
                Order::Defend => self.set_state_if_alive(id, BehaviorState::Defending),
                Order::Special => self.order_special(id),
            };
            if applied {
                outcome.affected.push(id);
            }
        }

        outcome.deaths = self.reap();
        outcome
    }

    fn order_move(&mut self, id: UnitId, point: Vec3Fixed) -> bool {
        let Some(unit) = self.units.get_mut(id).filter(|u| u.is_alive()) else {
            return false;
        };
        unit.move_to(point);
        self.behavior.set_state(id, BehaviorState::Moving);
        true
    }

    fn order_attack(&mut self, id: UnitId, target: UnitId, attacks: &mut Vec<AttackEvent>) -> bool {
        let target_exists = target != id && self.units.contains(target);
        let attacker_alive = self.units.get(id).is_some_and(Unit::is_alive);
        if !target_exists || !attacker_alive {
            return false;
        }

        if let Some(strike) = self
            .units
            .pair_mut(id, target)
            .and_then(|(attacker, victim)| attacker.attack(victim))
        {
            attacks.push(AttackEvent::from_strike(id, target, strike));
        }
        self.behavior.set_state(id, BehaviorState::Attacking);
        true
    }

    fn order_special(&mut self, id: UnitId) -> bool {
        let Some(unit) = self.units.get_mut(id) else {
            return false;
        };
        let faction = unit.faction();
        let cost = unit.special().map_or(0, |s| s.cost);

        let pool = &mut self.tactical_points[faction.index()];
        if self.enforce_special_cost && *pool < cost {
            tracing::debug!(unit = %id, cost, available = *pool, "special skipped: insufficient tactical points");
            return false;
        }
        if !unit.use_special() {
            return false;
        }

        if self.enforce_special_cost {
            *pool -= cost;
        }
        self.behavior.set_state(id, BehaviorState::UsingSpecial);
        true
    }

    fn set_state_if_alive(&mut self, id: UnitId, state: BehaviorState) -> bool {
        if !self.units.get(id).is_some_and(Unit::is_alive) {
            return false;
        }
        self.behavior.set_state(id, state);
        true
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by `delta` seconds.
    ///
    /// Each live unit, in registration order, integrates movement and timers
    /// and then has its behavior evaluated against `roster`. Units that died
    /// during the tick are removed before it returns.
    pub fn tick(&mut self, delta: Fixed, roster: &Roster) -> TickEvents {
        let delta = delta.max(Fixed::ZERO);
        let mut events = TickEvents::default();

        self.tick += 1;
        self.elapsed = self.elapsed.saturating_add(delta);

        let roster_ids = match roster {
            Roster::AllLive => self.units.ids(),
            Roster::Only(ids) => ids.clone(),
        };

        for id in self.units.ids() {
            match self.units.get_mut(id) {
                Some(unit) if unit.is_alive() => unit.update(delta),
                _ => continue,
            }

            let evaluation = self.behavior.evaluate(id, &mut self.units, &roster_ids);
            events.transitions.extend(evaluation.transition);
            events.attacks.extend(evaluation.attack);
        }

        if self.threat_sweep.advance(delta) > 0 {
            events.threat_sweep = Some(self.sweep_threats(&roster_ids));
        }

        events.deaths = self.reap();

        #[cfg(feature = "debug-validation")]
        self.validate();

        events
    }

    fn sweep_threats(&self, roster: &[UnitId]) -> ThreatSweep {
        let mut sweep = ThreatSweep::default();
        for unit in self.units.iter().filter(|u| u.is_alive()) {
            if !enemies_in_range(unit, &self.units, roster).is_empty() {
                sweep.engaged[unit.faction().index()] += 1;
            }
        }
        tracing::debug!(
            tick = self.tick,
            allied = sweep.engaged(Faction::Allied),
            coalition = sweep.engaged(Faction::Coalition),
            "threat sweep"
        );
        sweep
    }

    /// Remove dead units from storage, behavior and selection, awarding
    /// their victory points to the opposing faction.
    fn reap(&mut self) -> Vec<UnitDeath> {
        let dead: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| !u.is_alive())
            .map(Unit::id)
            .collect();

        let mut deaths = Vec::with_capacity(dead.len());
        for id in dead {
            let Some(unit) = self.units.remove(id) else {
                continue;
            };
            self.behavior.remove(id);
            self.selection.remove(&id);

            let scorer = unit.faction().opponent();
            let score = &mut self.scores[scorer.index()];
            *score = score.saturating_add(unit.vp_value());

            deaths.push(UnitDeath {
                id,
                faction: unit.faction(),
                vp_value: unit.vp_value(),
            });
        }
        deaths
    }

    #[cfg(feature = "debug-validation")]
    fn validate(&self) {
        for unit in self.units.iter() {
            debug_assert!(unit.health() <= unit.max_health());
            debug_assert!(unit.ammo() <= unit.max_ammo());
            debug_assert!(unit.morale() <= crate::unit::MAX_MORALE);
            debug_assert!(self.behavior.state(unit.id()).is_some());
        }
        for id in &self.selection {
            debug_assert!(self.units.get(*id).is_some_and(Unit::is_alive));
        }
    }

    // ------------------------------------------------------------------
    // Match state
    // ------------------------------------------------------------------

    /// Number of ticks run.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds elapsed.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    /// Match length in seconds.
    #[must_use]
    pub const fn match_duration(&self) -> Fixed {
        self.match_duration
    }

    /// Tactical points available to `faction`.
    #[must_use]
    pub const fn tactical_points(&self, faction: Faction) -> u32 {
        self.tactical_points[faction.index()]
    }

    /// Grant tactical points, capped at the configured maximum.
    pub fn add_tactical_points(&mut self, faction: Faction, amount: u32) {
        let pool = &mut self.tactical_points[faction.index()];
        *pool = pool.saturating_add(amount).min(self.max_tactical_points);
    }

    /// Spend tactical points. Returns `false` and spends nothing if the pool
    /// is short.
    pub fn spend_tactical_points(&mut self, faction: Faction, amount: u32) -> bool {
        let pool = &mut self.tactical_points[faction.index()];
        if *pool < amount {
            return false;
        }
        *pool -= amount;
        true
    }

    /// Victory points earned by `faction`.
    #[must_use]
    pub const fn score(&self, faction: Faction) -> u32 {
        self.scores[faction.index()]
    }

    /// Check whether the match has ended: the clock ran out, or units were
    /// spawned and one side has none left.
    #[must_use]
    pub fn is_match_over(&self) -> bool {
        if self.elapsed >= self.match_duration {
            return true;
        }
        self.units.slot_count() > 0 && Faction::ALL.iter().any(|&f| self.live_count(f) == 0)
    }

    /// The winning faction once the match is over.
    ///
    /// The last side standing wins; otherwise the higher score wins. Ties
    /// and unfinished matches have no winner.
    #[must_use]
    pub fn winner(&self) -> Option<Faction> {
        if !self.is_match_over() {
            return None;
        }

        let allied = self.live_count(Faction::Allied);
        let coalition = self.live_count(Faction::Coalition);
        match (allied, coalition) {
            (0, 0) => None,
            (_, 0) => Some(Faction::Allied),
            (0, _) => Some(Faction::Coalition),
            _ => match self.score(Faction::Allied).cmp(&self.score(Faction::Coalition)) {
                std::cmp::Ordering::Greater => Some(Faction::Allied),
                std::cmp::Ordering::Less => Some(Faction::Coalition),
                std::cmp::Ordering::Equal => None,
            },
        }
    }

    // ------------------------------------------------------------------
    // Determinism support
    // ------------------------------------------------------------------

    /// Hash of the full simulation state, for desync and replay checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.elapsed.to_bits().hash(&mut hasher);
        self.tactical_points.hash(&mut hasher);
        self.scores.hash(&mut hasher);
        self.threat_sweep.hash(&mut hasher);

        self.units.len().hash(&mut hasher);
        for unit in self.units.iter() {
            unit.id().hash(&mut hasher);
            unit.position().hash(&mut hasher);
            unit.move_target().hash(&mut hasher);
            unit.health().hash(&mut hasher);
            unit.ammo().hash(&mut hasher);
            unit.reload_progress().to_bits().hash(&mut hasher);
            unit.morale().hash(&mut hasher);
            unit.is_alive().hash(&mut hasher);
            unit.effect_remaining().to_bits().hash(&mut hasher);
            if let Some(special) = unit.special() {
                special.cooldown_remaining.to_bits().hash(&mut hasher);
            }
            self.behavior.state(unit.id()).hash(&mut hasher);
        }

        self.selection.hash(&mut hasher);
        hasher.finish()
    }

    /// Serialize the full registry with bincode.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("failed to serialize registry: {e}")))
    }

    /// Restore a registry from bytes produced by [`serialize`](Self::serialize).
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::Serialization(format!("failed to deserialize registry: {e}")))
    }
}
