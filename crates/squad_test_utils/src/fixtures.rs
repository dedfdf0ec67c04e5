//! Test fixtures and helpers.
//!
//! Pre-built registries and templates for consistent testing.

use fixed::types::I32F32;
use squad_core::factions::Faction;
use squad_core::math::Vec3Fixed;
use squad_core::registry::Registry;
use squad_core::template::{StatTemplate, UnitVariant};
use squad_core::unit::UnitId;

/// Tick length used by fixtures: 20 ticks per second.
#[must_use]
pub fn tick_delta() -> I32F32 {
    I32F32::from_num(1) / I32F32::from_num(20)
}

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// A point on the ground plane.
#[must_use]
pub fn ground(x: i32, z: i32) -> Vec3Fixed {
    Vec3Fixed::from_ints(x, 0, z)
}

/// A generic rifle team with no special.
#[must_use]
pub fn rifle_template(health: u32, damage: u32, range: i32, ammo: u32) -> StatTemplate {
    StatTemplate {
        name: "Rifle Team".to_string(),
        variant: UnitVariant::Generic,
        health,
        damage,
        range: fixed(range),
        speed: fixed(5),
        vp_value: 5,
        ammo,
        reload_time: fixed(2),
        special: None,
    }
}

/// An unarmed, immobile target with a lot of health.
#[must_use]
pub fn dummy_template() -> StatTemplate {
    StatTemplate {
        name: "Target Dummy".to_string(),
        speed: fixed(0),
        vp_value: 1,
        ..rifle_template(100_000, 0, 0, 0)
    }
}

/// Handles of the units in [`skirmish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkirmishIds {
    /// Western allied squad.
    pub allied_west: UnitId,
    /// Eastern allied squad.
    pub allied_east: UnitId,
    /// The lone coalition squad.
    pub coalition: UnitId,
}

/// Two allied infantry squads facing one coalition squad at close range.
#[must_use]
pub fn skirmish() -> (Registry, SkirmishIds) {
    let mut registry = Registry::new();
    let template = StatTemplate::infantry_squad();
    let ids = SkirmishIds {
        allied_west: registry.spawn(Faction::Allied, ground(-5, -5), &template),
        allied_east: registry.spawn(Faction::Allied, ground(5, -5), &template),
        coalition: registry.spawn(Faction::Coalition, ground(0, 5), &template),
    };
    (registry, ids)
}

/// Two lines of `per_side` infantry squads, `gap` units apart, facing each
/// other across the z axis.
#[must_use]
pub fn line_battle(per_side: i32, gap: i32) -> Registry {
    let mut registry = Registry::new();
    let template = StatTemplate::infantry_squad();
    for i in 0..per_side {
        let x = i * 10 - per_side * 5;
        registry.spawn(Faction::Allied, ground(x, -gap / 2), &template);
        registry.spawn(Faction::Coalition, ground(x, gap / 2), &template);
    }
    registry
}
