//! Scenario loading and configuration.
//!
//! A scenario describes the opening layout of a battle (which templates
//! stand where, for which faction) plus a script of orders issued at fixed
//! ticks. Scenarios are written in RON; all coordinates and times are plain
//! decimals and become fixed-point once at load time.

use std::path::Path;

use serde::{Deserialize, Serialize};
use squad_core::error::GameError;
use squad_core::factions::Faction;
use squad_core::math::{fixed_decimal_serde, Fixed, Vec3Fixed};
use squad_core::registry::RegistryConfig;
use squad_core::template::{StatTemplate, TemplateCatalog};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The simulation core rejected part of the scenario.
    #[error(transparent)]
    Game(#[from] GameError),
    /// A placement spreads its units beyond the representable world.
    #[error("Placement {index} ({template}) puts units outside the fixed-point range")]
    PlacementOutOfRange {
        /// Placement index.
        index: usize,
        /// Its template name.
        template: String,
    },
    /// A scripted command points at a placement that does not exist.
    #[error("Command at tick {at_tick} references placement {index}, but only {count} exist")]
    UnknownPlacement {
        /// Tick of the offending command.
        at_tick: u64,
        /// Placement index it referenced.
        index: usize,
        /// Number of placements in the scenario.
        count: usize,
    },
}

/// A point in world space, written as decimals.
///
/// `y` is optional in RON and defaults to the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    #[serde(with = "fixed_decimal_serde")]
    pub x: Fixed,
    /// Height above the ground plane.
    #[serde(default, with = "fixed_decimal_serde")]
    pub y: Fixed,
    /// Z coordinate.
    #[serde(with = "fixed_decimal_serde")]
    pub z: Fixed,
}

impl Point {
    /// A point on the ground plane.
    #[must_use]
    pub fn ground(x: i32, z: i32) -> Self {
        Self {
            x: Fixed::from_num(x),
            y: Fixed::ZERO,
            z: Fixed::from_num(z),
        }
    }

    /// Convert to a simulation vector.
    #[must_use]
    pub const fn to_vec3(self) -> Vec3Fixed {
        Vec3Fixed::new(self.x, self.y, self.z)
    }
}

/// A group of identical units placed at the start of the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Template name, looked up in the scenario's catalog.
    pub template: String,
    /// Owning faction.
    pub faction: Faction,
    /// Position of the first unit.
    pub position: Point,
    /// Number of units to spawn.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Offset between consecutive units of the group.
    #[serde(default)]
    pub spacing: Point,
}

impl Placement {
    /// Create a single-unit placement.
    #[must_use]
    pub fn new(template: impl Into<String>, faction: Faction, position: Point) -> Self {
        Self {
            template: template.into(),
            faction,
            position,
            count: 1,
            spacing: Point::default(),
        }
    }

    /// Position of the `index`-th unit of the group, or `None` if it falls
    /// outside the fixed-point range.
    #[must_use]
    pub fn position_of(&self, index: u32) -> Option<Vec3Fixed> {
        let i = Fixed::checked_from_num(index)?;
        let offset =
            |origin: Fixed, step: Fixed| step.checked_mul(i).and_then(|d| origin.checked_add(d));
        Some(Vec3Fixed::new(
            offset(self.position.x, self.spacing.x)?,
            offset(self.position.y, self.spacing.y)?,
            offset(self.position.z, self.spacing.z)?,
        ))
    }

    /// Spawn positions of every unit in the group, in spawn order.
    ///
    /// Positions outside the fixed-point range are skipped;
    /// [`Scenario::validate`] rejects such placements up front.
    pub fn positions(&self) -> impl Iterator<Item = Vec3Fixed> + '_ {
        (0..self.count).filter_map(|i| self.position_of(i))
    }

    /// Check that every unit of the group lands inside the fixed-point range.
    #[must_use]
    pub fn fits(&self) -> bool {
        // Positions are linear in the index, so the last one bounds the rest.
        self.count.checked_sub(1).map_or(true, |last| self.position_of(last).is_some())
    }
}

const fn default_count() -> u32 {
    1
}

/// An order as written in a scenario script.
///
/// Units are addressed by placement index, since unit handles only exist
/// once the scenario has been spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioOrder {
    /// Walk to a point.
    Move(Point),
    /// Attack the first surviving unit of a placement.
    Attack(usize),
    /// Hold position.
    Defend,
    /// Fire the unit's special ability.
    Special,
}

/// An order issued to a set of placements at a fixed tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedCommand {
    /// Tick on which the order is issued, before that tick runs.
    pub at_tick: u64,
    /// Placements whose surviving units form the selection.
    pub select: Vec<usize>,
    /// The order.
    pub order: ScenarioOrder,
}

/// A complete scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Seconds advanced per tick.
    #[serde(default = "default_delta", with = "fixed_decimal_serde")]
    pub delta: Fixed,
    /// Tick budget. The run stops earlier if the match ends.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Registry settings. `None` uses the defaults.
    #[serde(default)]
    pub config: Option<RegistryConfig>,
    /// Extra templates, layered over the built-in presets.
    #[serde(default)]
    pub templates: Vec<StatTemplate>,
    /// Opening layout.
    pub placements: Vec<Placement>,
    /// Scripted orders.
    #[serde(default)]
    pub commands: Vec<ScriptedCommand>,
}

fn default_delta() -> Fixed {
    Fixed::from_num(1) / Fixed::from_num(20)
}

const fn default_ticks() -> u64 {
    20 * 60 * 5
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Two allied infantry squads against one coalition squad at close range.
    #[must_use]
    pub fn skirmish() -> Self {
        Self {
            name: "Infantry Skirmish".to_string(),
            description: "Two allied infantry squads engage a lone coalition squad".to_string(),
            delta: default_delta(),
            ticks: default_ticks(),
            config: None,
            templates: Vec::new(),
            placements: vec![
                Placement::new("Infantry Squad", Faction::Allied, Point::ground(-5, -5)),
                Placement::new("Infantry Squad", Faction::Allied, Point::ground(5, -5)),
                Placement::new("Infantry Squad", Faction::Coalition, Point::ground(0, 5)),
            ],
            commands: Vec::new(),
        }
    }

    /// Registry settings for this scenario.
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        self.config.clone().unwrap_or_default()
    }

    /// The built-in presets overlaid with this scenario's templates.
    #[must_use]
    pub fn catalog(&self) -> TemplateCatalog {
        let mut catalog = TemplateCatalog::with_presets();
        for template in &self.templates {
            catalog.insert(template.clone());
        }
        catalog
    }

    /// Total units the placements will spawn.
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        self.placements.iter().map(|p| u64::from(p.count)).sum()
    }

    /// Check that every template resolves, every placement stays within the
    /// fixed-point range and every command addresses an existing placement.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let catalog = self.catalog();
        for (index, placement) in self.placements.iter().enumerate() {
            catalog.get(&placement.template)?;
            if !placement.fits() {
                return Err(ScenarioError::PlacementOutOfRange {
                    index,
                    template: placement.template.clone(),
                });
            }
        }

        let count = self.placements.len();
        for command in &self.commands {
            let target = match command.order {
                ScenarioOrder::Attack(index) => Some(index),
                _ => None,
            };
            if let Some(index) = command.select.iter().copied().chain(target).find(|&i| i >= count) {
                return Err(ScenarioError::UnknownPlacement {
                    at_tick: command.at_tick,
                    index,
                    count,
                });
            }
        }
        Ok(())
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skirmish_is_valid() {
        let scenario = Scenario::skirmish();
        assert!(scenario.validate().is_ok());
        assert_eq!(scenario.unit_count(), 3);
        assert_eq!(scenario.registry_config(), RegistryConfig::default());
    }

    #[test]
    fn test_parse_minimal_scenario() {
        let scenario = Scenario::from_ron_str(
            r#"(
                name: "Minimal",
                placements: [
                    (template: "Infantry Squad", faction: Allied, position: (x: 0.0, z: 0.0)),
                ],
            )"#,
        )
        .unwrap();

        assert_eq!(scenario.name, "Minimal");
        assert_eq!(scenario.delta, default_delta());
        assert_eq!(scenario.ticks, default_ticks());
        assert!(scenario.config.is_none());
        assert_eq!(scenario.placements[0].count, 1);
        assert!(scenario.commands.is_empty());
    }

    #[test]
    fn test_parse_full_scenario() {
        let scenario = Scenario::from_ron_str(
            r#"(
                name: "Crossing",
                description: "Hold the ford",
                delta: 0.25,
                ticks: 400,
                config: Some((enforce_special_cost: false)),
                templates: [
                    (
                        name: "Sniper",
                        health: 30,
                        damage: 40,
                        range: 120.0,
                        speed: 6.0,
                        vp_value: 6,
                        ammo: 5,
                        reload_time: 4.0,
                    ),
                ],
                placements: [
                    (
                        template: "Infantry Squad",
                        faction: Allied,
                        position: (x: -20.0, z: 0.0),
                        count: 3,
                        spacing: (x: 0.0, z: 10.0),
                    ),
                    (template: "Sniper", faction: Coalition, position: (x: 80.0, y: 4.0, z: 0.0)),
                ],
                commands: [
                    (at_tick: 0, select: [0], order: Move((x: 40.0, z: 0.0))),
                    (at_tick: 20, select: [1], order: Attack(0)),
                    (at_tick: 40, select: [0], order: Special),
                ],
            )"#,
        )
        .unwrap();

        assert_eq!(scenario.delta, Fixed::from_num(0.25));
        assert_eq!(scenario.ticks, 400);
        assert!(!scenario.registry_config().enforce_special_cost);
        assert_eq!(scenario.registry_config().max_tactical_points, 500);
        assert!(scenario.catalog().get("Sniper").is_ok());
        assert_eq!(scenario.unit_count(), 4);
        assert_eq!(scenario.placements[1].position.y, Fixed::from_num(4));
        assert_eq!(scenario.commands[1].order, ScenarioOrder::Attack(0));
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_placement_positions_follow_spacing() {
        let placement = Placement {
            count: 3,
            spacing: Point::ground(0, 10),
            ..Placement::new("Infantry Squad", Faction::Allied, Point::ground(-20, 0))
        };

        let positions: Vec<_> = placement.positions().collect();
        assert_eq!(
            positions,
            vec![
                Vec3Fixed::from_ints(-20, 0, 0),
                Vec3Fixed::from_ints(-20, 0, 10),
                Vec3Fixed::from_ints(-20, 0, 20),
            ]
        );
    }

    #[test]
    fn test_placement_past_fixed_range_does_not_fit() {
        let mut placement = Placement::new("Infantry Squad", Faction::Allied, Point::ground(0, 0));
        placement.count = 3;
        placement.spacing.x = Fixed::from_num(1_500_000_000);
        assert!(placement.position_of(1).is_some());
        assert!(placement.position_of(2).is_none());
        assert!(!placement.fits());

        placement.count = u32::MAX;
        placement.spacing = Point::default();
        assert!(placement.position_of(u32::MAX - 1).is_none());
        assert!(!placement.fits());

        placement.count = 0;
        assert!(placement.fits());
    }

    #[test]
    fn test_unknown_template_rejected() {
        let mut scenario = Scenario::skirmish();
        scenario.placements[0].template = "Tank".to_string();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::Game(GameError::UnknownTemplate(name))) if name == "Tank"
        ));
    }

    #[test]
    fn test_command_with_bad_placement_rejected() {
        let mut scenario = Scenario::skirmish();
        scenario.commands.push(ScriptedCommand {
            at_tick: 12,
            select: vec![0],
            order: ScenarioOrder::Attack(7),
        });

        match scenario.validate() {
            Err(ScenarioError::UnknownPlacement { at_tick, index, count }) => {
                assert_eq!((at_tick, index, count), (12, 7, 3));
            }
            other => panic!("expected UnknownPlacement, got {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Scenario::load("/nonexistent/scenario.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
