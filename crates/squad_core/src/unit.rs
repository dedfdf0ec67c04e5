//! The unit entity and its combat/movement primitives.
//!
//! A [`Unit`] owns its stats and enforces its own invariants: every mutator
//! clamps instead of failing, and illegal actions (attacking without ammo,
//! out of range, or while dead) are silent no-ops. The one hard guarantee is
//! that a unit reports its death exactly once.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorState;
use crate::factions::Faction;
use crate::math::{fixed_serde, Fixed, Vec3Fixed};
use crate::template::{SpecialEffect, StatTemplate, UnitVariant};

/// Maximum morale.
pub const MAX_MORALE: u8 = 100;

/// Morale lost on every nonzero damage instance, regardless of magnitude.
pub const DAMAGE_MORALE_PENALTY: u8 = 10;

/// Stable handle for a unit.
///
/// Handles are assigned sequentially and never reused, so they double as
/// dense table indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(u32);

impl UnitId {
    /// Create a unit ID from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw numeric value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Index into dense per-unit tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime state of a unit's special ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialAbility {
    /// Display name.
    pub name: String,
    /// Tactical-point cost (debited upstream, never by the unit).
    pub cost: u32,
    /// Full cooldown in seconds.
    #[serde(with = "fixed_serde")]
    pub cooldown: Fixed,
    /// Seconds until the ability is ready again.
    #[serde(with = "fixed_serde")]
    pub cooldown_remaining: Fixed,
}

impl SpecialAbility {
    /// Check whether the cooldown has fully elapsed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.cooldown_remaining == Fixed::ZERO
    }
}

/// Death notification, produced exactly once per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitDeath {
    /// The unit that died.
    pub id: UnitId,
    /// Its faction.
    pub faction: Faction,
    /// Victory points the opponent earns.
    pub vp_value: u32,
}

/// Result of a successful attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strike {
    /// Health actually removed from the target.
    pub damage_dealt: u32,
    /// The target's death notification, if this strike killed it.
    pub death: Option<UnitDeath>,
}

/// Read-only view of a unit for rendering, UI and HUD collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Unit handle.
    pub id: UnitId,
    /// Display name.
    pub name: String,
    /// Owning faction.
    pub faction: Faction,
    /// World position.
    pub position: Vec3Fixed,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
    /// Rounds left.
    pub ammo: u32,
    /// Magazine size.
    pub max_ammo: u32,
    /// Morale (0-100).
    pub morale: u8,
    /// Current behavior state.
    pub state: BehaviorState,
    /// Whether the unit is alive.
    pub alive: bool,
    /// Whether the unit is selected.
    pub selected: bool,
}

/// A squad-level unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    id: UnitId,
    name: String,
    faction: Faction,
    variant: UnitVariant,
    position: Vec3Fixed,
    move_target: Option<Vec3Fixed>,
    #[serde(with = "fixed_serde")]
    speed: Fixed,
    health: u32,
    max_health: u32,
    damage: u32,
    #[serde(with = "fixed_serde")]
    range: Fixed,
    vp_value: u32,
    ammo: u32,
    max_ammo: u32,
    #[serde(with = "fixed_serde")]
    reload_time: Fixed,
    #[serde(with = "fixed_serde")]
    reload_progress: Fixed,
    special: Option<SpecialAbility>,
    #[serde(with = "fixed_serde")]
    effect_remaining: Fixed,
    morale: u8,
    selected: bool,
    alive: bool,
}

impl Unit {
    /// Create a unit from a stat template.
    ///
    /// Negative times and speeds in the template are clamped to zero, and a
    /// zero-health template spawns with 1 health so every unit starts alive.
    #[must_use]
    pub fn new(id: UnitId, faction: Faction, position: Vec3Fixed, template: &StatTemplate) -> Self {
        let max_health = template.health.max(1);
        Self {
            id,
            name: template.name.clone(),
            faction,
            variant: template.variant,
            position,
            move_target: None,
            speed: template.speed.max(Fixed::ZERO),
            health: max_health,
            max_health,
            damage: template.damage,
            range: template.range.max(Fixed::ZERO),
            vp_value: template.vp_value,
            ammo: template.ammo,
            max_ammo: template.ammo,
            reload_time: template.reload_time.max(Fixed::ZERO),
            reload_progress: Fixed::ZERO,
            special: template.special.as_ref().map(|spec| SpecialAbility {
                name: spec.name.clone(),
                cost: spec.cost,
                cooldown: spec.cooldown.max(Fixed::ZERO),
                cooldown_remaining: Fixed::ZERO,
            }),
            effect_remaining: Fixed::ZERO,
            morale: MAX_MORALE,
            selected: false,
            alive: true,
        }
    }

    // ------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------

    /// Set the movement target. Any point is accepted.
    pub fn move_to(&mut self, target: Vec3Fixed) {
        if self.alive {
            self.move_target = Some(target);
        }
    }

    /// Clear the movement target.
    pub fn stop_moving(&mut self) {
        self.move_target = None;
    }

    /// Check whether the unit has an active movement target.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.move_target.is_some()
    }

    /// Advance movement, reload, cooldown and effect timers by `delta` seconds.
    ///
    /// The three integrations are independent of each other. Movement snaps
    /// onto the target once it is within one step, so it never overshoots.
    pub fn update(&mut self, delta: Fixed) {
        if !self.alive {
            return;
        }
        let delta = delta.max(Fixed::ZERO);

        if let Some(target) = self.move_target {
            let step = self.speed.saturating_mul(delta);
            let (position, arrived) = self.position.step_towards(target, step);
            self.position = position;
            if arrived {
                self.move_target = None;
            }
        }

        if self.ammo < self.max_ammo {
            self.reload_progress = self.reload_progress.saturating_add(delta);
            if self.reload_progress >= self.reload_time {
                self.ammo = self.max_ammo;
                self.reload_progress = Fixed::ZERO;
            }
        }

        if let Some(special) = self.special.as_mut() {
            special.cooldown_remaining = (special.cooldown_remaining - delta).max(Fixed::ZERO);
        }

        self.effect_remaining = (self.effect_remaining - delta).max(Fixed::ZERO);
    }

    // ------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------

    /// Check whether the unit has ammo to fire.
    #[must_use]
    pub fn can_attack(&self) -> bool {
        self.ammo > 0
    }

    /// Check whether `target` is within attack range (inclusive).
    #[must_use]
    pub fn is_in_range(&self, target: &Unit) -> bool {
        self.is_point_in_range(target.position)
    }

    /// Check whether a world point is within attack range (inclusive).
    #[must_use]
    pub fn is_point_in_range(&self, point: Vec3Fixed) -> bool {
        self.position.distance_squared(point) <= self.range.saturating_mul(self.range)
    }

    /// Fire one instant-hit round at `target`.
    ///
    /// Returns `None` without touching either unit when the attacker has no
    /// ammo, the target is out of range, or either side is dead.
    pub fn attack(&mut self, target: &mut Unit) -> Option<Strike> {
        if !self.alive || !target.alive || !self.can_attack() || !self.is_in_range(target) {
            return None;
        }

        let before = target.health;
        let death = target.take_damage(self.damage);
        self.ammo -= 1;

        tracing::trace!(
            attacker = %self.id,
            target = %target.id,
            damage = before - target.health,
            "strike"
        );

        Some(Strike {
            damage_dealt: before - target.health,
            death,
        })
    }

    /// Apply incoming damage.
    ///
    /// Any nonzero hit costs a flat [`DAMAGE_MORALE_PENALTY`]. Returns the
    /// death notification on the hit that brings health to zero; every call
    /// on an already-dead unit is ignored and returns `None`.
    pub fn take_damage(&mut self, amount: u32) -> Option<UnitDeath> {
        if !self.alive {
            return None;
        }

        let absorbed = match self.active_effect() {
            SpecialEffect::DamageReduction { percent, .. } => {
                let percent = u64::from(percent.min(100));
                u32::try_from(u64::from(amount) * percent / 100).unwrap_or(amount)
            }
            SpecialEffect::None => 0,
        };
        self.health = self.health.saturating_sub(amount - absorbed);

        if amount > 0 {
            self.morale = self.morale.saturating_sub(DAMAGE_MORALE_PENALTY);
        }

        if self.health > 0 {
            return None;
        }

        self.alive = false;
        self.move_target = None;
        tracing::info!(unit = %self.id, name = %self.name, faction = ?self.faction, "unit eliminated");

        Some(UnitDeath {
            id: self.id,
            faction: self.faction,
            vp_value: self.vp_value,
        })
    }

    /// Complete a pending reload whose progress has reached the reload time.
    ///
    /// Never advances progress; time is integrated once per tick by
    /// [`update`](Self::update).
    pub fn reload(&mut self) {
        if self.alive && self.ammo < self.max_ammo && self.reload_progress >= self.reload_time {
            self.ammo = self.max_ammo;
            self.reload_progress = Fixed::ZERO;
        }
    }

    /// Trigger the special ability.
    ///
    /// Succeeds only when a special is configured and fully cooled down.
    /// On success the cooldown restarts and the variant's effect begins.
    pub fn use_special(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        let Some(special) = self.special.as_mut() else {
            return false;
        };
        if !special.is_ready() {
            return false;
        }

        special.cooldown_remaining = special.cooldown;
        if let SpecialEffect::DamageReduction { duration, .. } = self.variant.special_effect() {
            self.effect_remaining = duration;
        }

        tracing::info!(unit = %self.id, special = %special.name, "special ability used");
        true
    }

    fn active_effect(&self) -> SpecialEffect {
        if self.effect_remaining > Fixed::ZERO {
            self.variant.special_effect()
        } else {
            SpecialEffect::None
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Mark the unit selected.
    pub fn select(&mut self) {
        self.selected = true;
    }

    /// Mark the unit deselected.
    pub fn deselect(&mut self) {
        self.selected = false;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Unit handle.
    #[must_use]
    pub const fn id(&self) -> UnitId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning faction.
    #[must_use]
    pub const fn faction(&self) -> Faction {
        self.faction
    }

    /// Template variant.
    #[must_use]
    pub const fn variant(&self) -> UnitVariant {
        self.variant
    }

    /// World position.
    #[must_use]
    pub const fn position(&self) -> Vec3Fixed {
        self.position
    }

    /// Current movement target.
    #[must_use]
    pub const fn move_target(&self) -> Option<Vec3Fixed> {
        self.move_target
    }

    /// Movement speed in world units per second.
    #[must_use]
    pub const fn speed(&self) -> Fixed {
        self.speed
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> u32 {
        self.health
    }

    /// Maximum health.
    #[must_use]
    pub const fn max_health(&self) -> u32 {
        self.max_health
    }

    /// Check if health is strictly below 20% of maximum.
    #[must_use]
    pub fn is_health_critical(&self) -> bool {
        u64::from(self.health) * 5 < u64::from(self.max_health)
    }

    /// Damage per attack.
    #[must_use]
    pub const fn damage(&self) -> u32 {
        self.damage
    }

    /// Attack range.
    #[must_use]
    pub const fn range(&self) -> Fixed {
        self.range
    }

    /// Victory-point value.
    #[must_use]
    pub const fn vp_value(&self) -> u32 {
        self.vp_value
    }

    /// Rounds left.
    #[must_use]
    pub const fn ammo(&self) -> u32 {
        self.ammo
    }

    /// Magazine size.
    #[must_use]
    pub const fn max_ammo(&self) -> u32 {
        self.max_ammo
    }

    /// Seconds to refill the magazine.
    #[must_use]
    pub const fn reload_time(&self) -> Fixed {
        self.reload_time
    }

    /// Seconds accumulated toward the current reload.
    #[must_use]
    pub const fn reload_progress(&self) -> Fixed {
        self.reload_progress
    }

    /// Special ability, if configured.
    #[must_use]
    pub const fn special(&self) -> Option<&SpecialAbility> {
        self.special.as_ref()
    }

    /// Seconds left on the active special effect.
    #[must_use]
    pub const fn effect_remaining(&self) -> Fixed {
        self.effect_remaining
    }

    /// Morale (0-100).
    #[must_use]
    pub const fn morale(&self) -> u8 {
        self.morale
    }

    /// Whether the unit is selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        self.selected
    }

    /// Whether the unit is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Build a read-only snapshot, tagged with the unit's behavior state.
    #[must_use]
    pub fn snapshot(&self, state: BehaviorState) -> UnitSnapshot {
        UnitSnapshot {
            id: self.id,
            name: self.name.clone(),
            faction: self.faction,
            position: self.position,
            health: self.health,
            max_health: self.max_health,
            ammo: self.ammo,
            max_ammo: self.max_ammo,
            morale: self.morale,
            state,
            alive: self.alive,
            selected: self.selected,
        }
    }
}
