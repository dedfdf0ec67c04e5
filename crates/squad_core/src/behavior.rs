//! Per-unit reactive behavior state machine.
//!
//! Every tick each live unit's state is re-evaluated from scratch: the only
//! memory is the current state label plus the unit's own stats. Decisions
//! are split in two layers:
//!
//! - [`next_state`] is a pure function from a state and a [`Situation`] to a
//!   [`Decision`]. It is total over every state/situation combination.
//! - [`BehaviorMachine::evaluate`] gathers the situation from live units,
//!   applies the decision (attacks, reloads) and records the new state.
//!
//! Target selection is deliberately simple: the first enemy in roster order,
//! not the nearest or most threatening.

use serde::{Deserialize, Serialize};

use crate::storage::UnitStorage;
use crate::unit::{Strike, Unit, UnitDeath, UnitId};

/// AI disposition of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Scanning for enemies.
    #[default]
    Idle,
    /// Travelling to a movement target.
    Moving,
    /// Engaging enemies in range every tick.
    Attacking,
    /// Holding position, firing at anything in range.
    Defending,
    /// Just triggered a special ability.
    UsingSpecial,
    /// Falling back after heavy losses.
    Retreating,
    /// Waiting for the magazine to refill.
    Reloading,
    /// Looking for cover.
    SeekingCover,
    /// Enemies spotted; deciding whether to engage.
    AssessingThreat,
    /// Regrouping with friendlies.
    Rallying,
}

impl BehaviorState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Idle,
        Self::Moving,
        Self::Attacking,
        Self::Defending,
        Self::UsingSpecial,
        Self::Retreating,
        Self::Reloading,
        Self::SeekingCover,
        Self::AssessingThreat,
        Self::Rallying,
    ];
}

/// Facts about a unit that the transition table reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Situation {
    /// At least one enemy is within range.
    pub enemies_in_range: bool,
    /// Ammo is zero.
    pub ammo_empty: bool,
    /// Ammo is at maximum.
    pub ammo_full: bool,
    /// Health is below 20% of maximum.
    pub health_critical: bool,
    /// A movement target is active.
    pub has_move_target: bool,
}

impl Situation {
    /// Read the situation of `unit` against a list of enemies in range.
    #[must_use]
    pub fn of(unit: &Unit, enemies: &[UnitId]) -> Self {
        Self {
            enemies_in_range: !enemies.is_empty(),
            ammo_empty: unit.ammo() == 0,
            ammo_full: unit.ammo() == unit.max_ammo(),
            health_critical: unit.is_health_critical(),
            has_move_target: unit.is_moving(),
        }
    }
}

/// Side effect requested by a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing beyond the state change.
    None,
    /// Fire at the first enemy in roster order.
    AttackFirstEnemy,
}

/// Outcome of one transition-table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// State after this tick.
    pub next: BehaviorState,
    /// Side effect to perform.
    pub action: Action,
}

impl Decision {
    const fn go(next: BehaviorState) -> Self {
        Self {
            next,
            action: Action::None,
        }
    }

    const fn attack(next: BehaviorState) -> Self {
        Self {
            next,
            action: Action::AttackFirstEnemy,
        }
    }
}

/// Look up the transition table. Conditions are checked in order; the
/// first match wins.
///
/// For `Reloading`, the caller completes any pending reload before building
/// the situation, so `ammo_full` reflects the post-reload magazine.
#[must_use]
pub fn next_state(state: BehaviorState, situation: &Situation) -> Decision {
    use BehaviorState::*;

    match state {
        Idle if situation.enemies_in_range => Decision::go(AssessingThreat),
        Idle => Decision::go(Idle),

        Moving if !situation.has_move_target => Decision::go(Idle),
        Moving => Decision::go(Moving),

        AssessingThreat if situation.enemies_in_range => Decision::go(Attacking),
        AssessingThreat => Decision::go(Idle),

        Attacking if situation.ammo_empty => Decision::go(Reloading),
        Attacking if situation.health_critical => Decision::go(Retreating),
        Attacking if !situation.enemies_in_range => Decision::go(Idle),
        Attacking => Decision::attack(Attacking),

        Defending if situation.enemies_in_range && !situation.ammo_empty => {
            Decision::attack(Defending)
        }
        Defending => Decision::go(Defending),

        Reloading if situation.ammo_full => Decision::go(Idle),
        Reloading => Decision::go(Reloading),

        // Placeholder states: a full retreat/cover/rally implementation would
        // issue movement here. The baseline returns straight to Idle.
        Retreating | SeekingCover | UsingSpecial | Rallying => Decision::go(Idle),
    }
}

/// Enemies of `unit` within its range, in roster order.
///
/// Dead, unknown and self entries in the roster are skipped.
#[must_use]
pub fn enemies_in_range(unit: &Unit, units: &UnitStorage, roster: &[UnitId]) -> Vec<UnitId> {
    filter_roster(unit, units, roster, |other| {
        unit.faction().is_enemy_of(other.faction())
    })
}

/// Friendlies of `unit` within its range, excluding itself, in roster order.
#[must_use]
pub fn friendlies_in_range(unit: &Unit, units: &UnitStorage, roster: &[UnitId]) -> Vec<UnitId> {
    filter_roster(unit, units, roster, |other| {
        !unit.faction().is_enemy_of(other.faction())
    })
}

fn filter_roster(
    unit: &Unit,
    units: &UnitStorage,
    roster: &[UnitId],
    keep: impl Fn(&Unit) -> bool,
) -> Vec<UnitId> {
    roster
        .iter()
        .filter(|&&id| id != unit.id())
        .filter_map(|&id| units.get(id))
        .filter(|other| other.is_alive() && keep(other) && unit.is_in_range(other))
        .map(Unit::id)
        .collect()
}

/// A change of behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Unit whose state changed.
    pub unit: UnitId,
    /// Previous state.
    pub from: BehaviorState,
    /// New state.
    pub to: BehaviorState,
}

/// A successful attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackEvent {
    /// Unit that fired.
    pub attacker: UnitId,
    /// Unit that was hit.
    pub target: UnitId,
    /// Health removed from the target.
    pub damage: u32,
    /// The target's death notification, if the hit was lethal.
    pub killed: Option<UnitDeath>,
}

impl AttackEvent {
    /// Build an event from a strike.
    #[must_use]
    pub fn from_strike(attacker: UnitId, target: UnitId, strike: Strike) -> Self {
        Self {
            attacker,
            target,
            damage: strike.damage_dealt,
            killed: strike.death,
        }
    }
}

/// Result of evaluating one unit for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evaluation {
    /// Set when the state label changed.
    pub transition: Option<StateTransition>,
    /// Set when the unit fired.
    pub attack: Option<AttackEvent>,
}

/// Owner of every unit's behavior state.
///
/// States sit in a dense table indexed by [`UnitId::index`], so the per-tick
/// lookup is a bounds-checked array access rather than a hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorMachine {
    states: Vec<Option<BehaviorState>>,
}

impl BehaviorMachine {
    /// Create an empty machine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a unit in the `Idle` state.
    pub fn register(&mut self, id: UnitId) {
        let index = id.index();
        if self.states.len() <= index {
            self.states.resize(index + 1, None);
        }
        self.states[index] = Some(BehaviorState::Idle);
    }

    /// Stop tracking a unit.
    pub fn remove(&mut self, id: UnitId) {
        if let Some(slot) = self.states.get_mut(id.index()) {
            *slot = None;
        }
    }

    /// Current state of a tracked unit.
    #[must_use]
    pub fn state(&self, id: UnitId) -> Option<BehaviorState> {
        self.states.get(id.index()).copied().flatten()
    }

    /// Force a tracked unit into `state`.
    ///
    /// Returns the transition if the label changed; untracked units are
    /// ignored.
    pub fn set_state(&mut self, id: UnitId, state: BehaviorState) -> Option<StateTransition> {
        let slot = self.states.get_mut(id.index())?;
        let from = (*slot)?;
        *slot = Some(state);
        if from == state {
            return None;
        }

        tracing::debug!(unit = %id, ?from, to = ?state, "behavior state changed");
        Some(StateTransition {
            unit: id,
            from,
            to: state,
        })
    }

    /// Evaluate one unit against `roster` and apply the resulting decision.
    ///
    /// Dead or untracked units are skipped. The machine only invokes unit
    /// methods; it never adds or removes units from storage.
    pub fn evaluate(&mut self, id: UnitId, units: &mut UnitStorage, roster: &[UnitId]) -> Evaluation {
        let Some(state) = self.state(id) else {
            return Evaluation::default();
        };
        let Some(unit) = units.get_mut(id) else {
            return Evaluation::default();
        };
        if !unit.is_alive() {
            return Evaluation::default();
        }

        if state == BehaviorState::Reloading {
            unit.reload();
        }

        let Some(unit) = units.get(id) else {
            return Evaluation::default();
        };
        let enemies = enemies_in_range(unit, units, roster);
        let decision = next_state(state, &Situation::of(unit, &enemies));

        let attack = match (decision.action, enemies.first()) {
            (Action::AttackFirstEnemy, Some(&target)) => units
                .pair_mut(id, target)
                .and_then(|(attacker, victim)| attacker.attack(victim))
                .map(|strike| AttackEvent::from_strike(id, target, strike)),
            _ => None,
        };

        Evaluation {
            transition: self.set_state(id, decision.next),
            attack,
        }
    }

    /// Number of tracked units.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.states.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factions::Faction;
    use crate::math::{Fixed, Vec3Fixed};
    use crate::template::{StatTemplate, UnitVariant};

    use BehaviorState::*;

    fn template(health: u32, ammo: u32) -> StatTemplate {
        StatTemplate {
            name: "Rifle Team".to_string(),
            variant: UnitVariant::Generic,
            health,
            damage: 10,
            range: Fixed::from_num(50),
            speed: Fixed::from_num(5),
            vp_value: 5,
            ammo,
            reload_time: Fixed::from_num(2),
            special: None,
        }
    }

    fn spawn(
        storage: &mut UnitStorage,
        machine: &mut BehaviorMachine,
        faction: Faction,
        x: i32,
        template: &StatTemplate,
    ) -> UnitId {
        let id = storage.insert_with(|id| {
            Unit::new(id, faction, Vec3Fixed::from_ints(x, 0, 0), template)
        });
        machine.register(id);
        id
    }

    fn all_situations() -> Vec<Situation> {
        (0u8..32)
            .map(|bits| Situation {
                enemies_in_range: bits & 1 != 0,
                ammo_empty: bits & 2 != 0,
                ammo_full: bits & 4 != 0,
                health_critical: bits & 8 != 0,
                has_move_target: bits & 16 != 0,
            })
            .collect()
    }

    /// Reference table, written independently of `next_state`'s match arms.
    fn expected(state: BehaviorState, s: &Situation) -> BehaviorState {
        match state {
            Idle => {
                if s.enemies_in_range {
                    AssessingThreat
                } else {
                    Idle
                }
            }
            Moving => {
                if s.has_move_target {
                    Moving
                } else {
                    Idle
                }
            }
            AssessingThreat => {
                if s.enemies_in_range {
                    Attacking
                } else {
                    Idle
                }
            }
            Attacking => {
                if s.ammo_empty {
                    Reloading
                } else if s.health_critical {
                    Retreating
                } else if !s.enemies_in_range {
                    Idle
                } else {
                    Attacking
                }
            }
            Defending => Defending,
            Reloading => {
                if s.ammo_full {
                    Idle
                } else {
                    Reloading
                }
            }
            Retreating | SeekingCover | UsingSpecial | Rallying => Idle,
        }
    }

    #[test]
    fn test_transition_table_is_total_and_deterministic() {
        for state in BehaviorState::ALL {
            for situation in all_situations() {
                let first = next_state(state, &situation);
                let second = next_state(state, &situation);
                assert_eq!(first, second);
                assert_eq!(
                    first.next,
                    expected(state, &situation),
                    "{state:?} with {situation:?}"
                );
            }
        }
    }

    #[test]
    fn test_only_engaging_rows_attack() {
        for state in BehaviorState::ALL {
            for situation in all_situations() {
                let decision = next_state(state, &situation);
                let should_attack = match state {
                    Attacking => {
                        !situation.ammo_empty
                            && !situation.health_critical
                            && situation.enemies_in_range
                    }
                    Defending => situation.enemies_in_range && !situation.ammo_empty,
                    _ => false,
                };
                assert_eq!(decision.action == Action::AttackFirstEnemy, should_attack);
            }
        }
    }

    #[test]
    fn test_enemy_filter_preserves_roster_order() {
        let mut storage = UnitStorage::new();
        let mut machine = BehaviorMachine::new();
        let t = template(100, 10);
        let me = spawn(&mut storage, &mut machine, Faction::Allied, 0, &t);
        let far = spawn(&mut storage, &mut machine, Faction::Coalition, 40, &t);
        let near = spawn(&mut storage, &mut machine, Faction::Coalition, 5, &t);
        let friend = spawn(&mut storage, &mut machine, Faction::Allied, 3, &t);
        let out = spawn(&mut storage, &mut machine, Faction::Coalition, 80, &t);

        let unit = storage.get(me).unwrap();
        let roster = [me, far, near, friend, out];
        assert_eq!(enemies_in_range(unit, &storage, &roster), vec![far, near]);

        let reversed = [out, friend, near, far, me];
        assert_eq!(enemies_in_range(unit, &storage, &reversed), vec![near, far]);

        assert_eq!(friendlies_in_range(unit, &storage, &roster), vec![friend]);
    }

    #[test]
    fn test_filter_skips_dead_and_unknown() {
        let mut storage = UnitStorage::new();
        let mut machine = BehaviorMachine::new();
        let t = template(10, 10);
        let me = spawn(&mut storage, &mut machine, Faction::Allied, 0, &t);
        let corpse = spawn(&mut storage, &mut machine, Faction::Coalition, 5, &t);
        storage.get_mut(corpse).unwrap().take_damage(100);

        let unit = storage.get(me).unwrap();
        let roster = [corpse, UnitId::new(42)];
        assert!(enemies_in_range(unit, &storage, &roster).is_empty());
    }

    #[test]
    fn test_idle_to_attacking_engagement() {
        let mut storage = UnitStorage::new();
        let mut machine = BehaviorMachine::new();
        let t = template(100, 10);
        let me = spawn(&mut storage, &mut machine, Faction::Allied, 0, &t);
        let enemy = spawn(&mut storage, &mut machine, Faction::Coalition, 10, &t);
        let roster = storage.ids();

        let eval = machine.evaluate(me, &mut storage, &roster);
        assert_eq!(machine.state(me), Some(AssessingThreat));
        assert!(eval.attack.is_none());

        machine.evaluate(me, &mut storage, &roster);
        assert_eq!(machine.state(me), Some(Attacking));

        let eval = machine.evaluate(me, &mut storage, &roster);
        assert_eq!(machine.state(me), Some(Attacking));
        assert!(eval.transition.is_none());
        let attack = eval.attack.expect("attacking state fires");
        assert_eq!(attack.target, enemy);
        assert_eq!(storage.get(enemy).unwrap().health(), 90);
    }

    #[test]
    fn test_attacking_targets_first_in_roster() {
        let mut storage = UnitStorage::new();
        let mut machine = BehaviorMachine::new();
        let t = template(100, 10);
        let me = spawn(&mut storage, &mut machine, Faction::Allied, 0, &t);
        let first = spawn(&mut storage, &mut machine, Faction::Coalition, 45, &t);
        let nearer = spawn(&mut storage, &mut machine, Faction::Coalition, 1, &t);
        machine.set_state(me, Attacking);

        let eval = machine.evaluate(me, &mut storage, &[first, nearer]);
        assert_eq!(eval.attack.unwrap().target, first);
        assert_eq!(storage.get(nearer).unwrap().health(), 100);
    }

    #[test]
    fn test_attacking_out_of_ammo_reloads() {
        let mut storage = UnitStorage::new();
        let mut machine = BehaviorMachine::new();
        let me = spawn(&mut storage, &mut machine, Faction::Allied, 0, &template(100, 1));
        let enemy = spawn(&mut storage, &mut machine, Faction::Coalition, 5, &template(100, 1));
        machine.set_state(me, Attacking);
        let roster = [enemy];

        machine.evaluate(me, &mut storage, &roster);
        assert_eq!(storage.get(me).unwrap().ammo(), 0);

        let eval = machine.evaluate(me, &mut storage, &roster);
        assert_eq!(machine.state(me), Some(Reloading));
        assert!(eval.attack.is_none());
    }

    #[test]
    fn test_attacking_low_health_retreats_then_idles() {
        let mut storage = UnitStorage::new();
        let mut machine = BehaviorMachine::new();
        let me = spawn(&mut storage, &mut machine, Faction::Allied, 0, &template(100, 5));
        let enemy = spawn(&mut storage, &mut machine, Faction::Coalition, 5, &template(100, 5));
        storage.get_mut(me).unwrap().take_damage(81);
        machine.set_state(me, Attacking);

        machine.evaluate(me, &mut storage, &[enemy]);
        assert_eq!(machine.state(me), Some(Retreating));
        machine.evaluate(me, &mut storage, &[enemy]);
        assert_eq!(machine.state(me), Some(Idle));
    }

    #[test]
    fn test_defending_fires_but_holds_state() {
        let mut storage = UnitStorage::new();
        let mut machine = BehaviorMachine::new();
        let me = spawn(&mut storage, &mut machine, Faction::Allied, 0, &template(100, 1));
        let enemy = spawn(&mut storage, &mut machine, Faction::Coalition, 5, &template(100, 1));
        machine.set_state(me, Defending);

        let eval = machine.evaluate(me, &mut storage, &[enemy]);
        assert!(eval.attack.is_some());
        let eval = machine.evaluate(me, &mut storage, &[enemy]);
        assert!(eval.attack.is_none());
        assert_eq!(machine.state(me), Some(Defending));
    }

    #[test]
    fn test_moving_returns_to_idle_on_arrival() {
        let mut storage = UnitStorage::new();
        let mut machine = BehaviorMachine::new();
        let me = spawn(&mut storage, &mut machine, Faction::Allied, 0, &template(100, 1));
        storage.get_mut(me).unwrap().move_to(Vec3Fixed::from_ints(3, 0, 0));
        machine.set_state(me, Moving);

        machine.evaluate(me, &mut storage, &[]);
        assert_eq!(machine.state(me), Some(Moving));

        storage.get_mut(me).unwrap().update(Fixed::from_num(1));
        machine.evaluate(me, &mut storage, &[]);
        assert_eq!(machine.state(me), Some(Idle));
    }

    #[test]
    fn test_dead_and_untracked_units_are_skipped() {
        let mut storage = UnitStorage::new();
        let mut machine = BehaviorMachine::new();
        let me = spawn(&mut storage, &mut machine, Faction::Allied, 0, &template(10, 1));
        let enemy = spawn(&mut storage, &mut machine, Faction::Coalition, 5, &template(10, 1));
        storage.get_mut(me).unwrap().take_damage(10);
        machine.set_state(me, Attacking);

        let eval = machine.evaluate(me, &mut storage, &[enemy]);
        assert_eq!(eval, Evaluation::default());
        assert_eq!(storage.get(enemy).unwrap().health(), 10);

        machine.remove(enemy);
        assert_eq!(machine.state(enemy), None);
        assert!(machine.set_state(enemy, Attacking).is_none());
        assert_eq!(machine.tracked(), 1);
    }
}
