//! Stat templates for data-driven unit definitions.
//!
//! A unit type is a [`StatTemplate`]: plain numbers plus a [`UnitVariant`]
//! tag. Variants form a small closed set; each exposes the same two
//! capabilities ([`UnitVariant::special_effect`] and [`UnitVariant::visual`])
//! instead of overriding behavior through a type hierarchy.
//!
//! Templates deserialize from RON:
//!
//! ```ron
//! [
//!     (
//!         name: "Infantry Squad",
//!         variant: InfantrySquad,
//!         health: 60,
//!         damage: 12,
//!         range: 50.0,
//!         speed: 8.0,
//!         vp_value: 5,
//!         ammo: 40,
//!         reload_time: 1.2,
//!         special: Some((name: "Dig In", cost: 10, cooldown: 30.0)),
//!     ),
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_decimal_serde, Fixed};

/// Descriptor for a unit's special ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialSpec {
    /// Display name of the ability.
    pub name: String,
    /// Tactical-point cost. Recorded on the unit, debited by the registry.
    pub cost: u32,
    /// Cooldown in seconds after a successful use.
    #[serde(with = "fixed_decimal_serde")]
    pub cooldown: Fixed,
}

/// Closed set of unit variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitVariant {
    /// Plain stat block with no bespoke special effect.
    #[default]
    Generic,
    /// Infantry squad; its special ("Dig In") entrenches the squad.
    InfantrySquad,
}

/// Simulation effect started by a successful special ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialEffect {
    /// The special only starts its cooldown.
    None,
    /// Incoming damage is reduced by `percent` for `duration` seconds.
    DamageReduction {
        /// Percentage of each hit absorbed (0-100).
        percent: u8,
        /// Effect duration in seconds.
        duration: Fixed,
    },
}

/// Presentation hint for a variant. Never read by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualProfile {
    /// Short label for overlays.
    pub label: &'static str,
    /// Placeholder model footprint (width, height, depth) in world units.
    pub footprint: (u8, u8, u8),
}

impl UnitVariant {
    /// Effect applied when this variant's special ability fires.
    #[must_use]
    pub fn special_effect(self) -> SpecialEffect {
        match self {
            Self::Generic => SpecialEffect::None,
            Self::InfantrySquad => SpecialEffect::DamageReduction {
                percent: 30,
                duration: Fixed::from_num(30),
            },
        }
    }

    /// Visual customization for this variant.
    #[must_use]
    pub const fn visual(self) -> VisualProfile {
        match self {
            Self::Generic => VisualProfile {
                label: "Unit",
                footprint: (1, 1, 1),
            },
            // Taller than wide to read as a person.
            Self::InfantrySquad => VisualProfile {
                label: "Infantry",
                footprint: (1, 2, 1),
            },
        }
    }
}

/// Data-driven unit definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatTemplate {
    /// Display name, also the catalog key.
    pub name: String,
    /// Variant providing the special effect and visual capabilities.
    #[serde(default)]
    pub variant: UnitVariant,
    /// Maximum (and starting) health.
    pub health: u32,
    /// Damage per attack.
    pub damage: u32,
    /// Attack range in world units.
    #[serde(with = "fixed_decimal_serde")]
    pub range: Fixed,
    /// Movement speed in world units per second.
    #[serde(with = "fixed_decimal_serde")]
    pub speed: Fixed,
    /// Victory points awarded to the opponent when this unit dies.
    pub vp_value: u32,
    /// Magazine size (and starting ammo).
    pub ammo: u32,
    /// Seconds to refill the magazine.
    #[serde(with = "fixed_decimal_serde")]
    pub reload_time: Fixed,
    /// Optional special ability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<SpecialSpec>,
}

impl StatTemplate {
    /// The "Infantry Squad" preset.
    #[must_use]
    pub fn infantry_squad() -> Self {
        Self {
            name: "Infantry Squad".to_string(),
            variant: UnitVariant::InfantrySquad,
            health: 60,
            damage: 12,
            range: Fixed::from_num(50),
            speed: Fixed::from_num(8),
            vp_value: 5,
            ammo: 40,
            reload_time: Fixed::from_num(1.2),
            special: Some(SpecialSpec {
                name: "Dig In".to_string(),
                cost: 10,
                cooldown: Fixed::from_num(30),
            }),
        }
    }

    /// Check if this template carries a special ability.
    #[must_use]
    pub fn has_special(&self) -> bool {
        self.special.is_some()
    }
}

/// Ordered collection of templates, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateCatalog {
    templates: Vec<StatTemplate>,
}

impl TemplateCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the built-in presets.
    #[must_use]
    pub fn with_presets() -> Self {
        let mut catalog = Self::new();
        catalog.insert(StatTemplate::infantry_squad());
        catalog
    }

    /// Parse a RON list of templates.
    ///
    /// `source_name` only labels errors; no IO happens here.
    pub fn from_ron_str(source_name: &str, ron_text: &str) -> Result<Self> {
        let templates: Vec<StatTemplate> =
            ron::from_str(ron_text).map_err(|e| GameError::DataParseError {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;

        let mut catalog = Self::new();
        for template in templates {
            catalog.insert(template);
        }
        Ok(catalog)
    }

    /// Add a template, replacing any existing one with the same name.
    pub fn insert(&mut self, template: StatTemplate) {
        match self.templates.iter_mut().find(|t| t.name == template.name) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    /// Look up a template by name.
    pub fn get(&self, name: &str) -> Result<&StatTemplate> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| GameError::UnknownTemplate(name.to_string()))
    }

    /// Merge another catalog into this one. Later definitions win.
    pub fn extend(&mut self, other: Self) {
        for template in other.templates {
            self.insert(template);
        }
    }

    /// Template names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.name.as_str())
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Check if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG_RON: &str = r#"[
        (
            name: "Infantry Squad",
            variant: InfantrySquad,
            health: 60,
            damage: 12,
            range: 50.0,
            speed: 8.0,
            vp_value: 5,
            ammo: 40,
            reload_time: 1.2,
            special: Some((name: "Dig In", cost: 10, cooldown: 30.0)),
        ),
        (
            name: "Recon Team",
            health: 30,
            damage: 6,
            range: 70.0,
            speed: 12.0,
            vp_value: 3,
            ammo: 20,
            reload_time: 2.0,
        ),
    ]"#;

    #[test]
    fn test_parse_catalog_from_ron() {
        let catalog = TemplateCatalog::from_ron_str("test", CATALOG_RON).unwrap();
        assert_eq!(catalog.len(), 2);

        let infantry = catalog.get("Infantry Squad").unwrap();
        assert_eq!(infantry, &StatTemplate::infantry_squad());

        let recon = catalog.get("Recon Team").unwrap();
        assert_eq!(recon.variant, UnitVariant::Generic);
        assert!(!recon.has_special());
        assert_eq!(recon.reload_time, Fixed::from_num(2));
    }

    #[test]
    fn test_unknown_template_is_error() {
        let catalog = TemplateCatalog::with_presets();
        assert!(matches!(
            catalog.get("Battleship"),
            Err(GameError::UnknownTemplate(name)) if name == "Battleship"
        ));
    }

    #[test]
    fn test_malformed_ron_reports_source() {
        let err = TemplateCatalog::from_ron_str("broken.ron", "[ (name: ) ]").unwrap_err();
        match err {
            GameError::DataParseError { source_name, .. } => assert_eq!(source_name, "broken.ron"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut catalog = TemplateCatalog::with_presets();
        let mut tougher = StatTemplate::infantry_squad();
        tougher.health = 90;
        catalog.insert(tougher);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("Infantry Squad").unwrap().health, 90);
    }

    #[test]
    fn test_variant_capabilities() {
        assert_eq!(UnitVariant::Generic.special_effect(), SpecialEffect::None);
        assert!(matches!(
            UnitVariant::InfantrySquad.special_effect(),
            SpecialEffect::DamageReduction { percent: 30, .. }
        ));
        assert_eq!(UnitVariant::InfantrySquad.visual().footprint, (1, 2, 1));
    }
}
