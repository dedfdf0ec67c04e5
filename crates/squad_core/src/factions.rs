//! Faction definitions and identifiers.

use serde::{Deserialize, Serialize};

/// The two opposing sides of a match.
///
/// Two units are enemies iff their factions differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Faction {
    /// The Allied forces.
    Allied,
    /// The Coalition forces.
    Coalition,
}

impl Faction {
    /// Every faction, in a stable order.
    pub const ALL: [Self; 2] = [Self::Allied, Self::Coalition];

    /// Get the display name for this faction.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Allied => "Allied Forces",
            Self::Coalition => "Coalition",
        }
    }

    /// The opposing faction.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Allied => Self::Coalition,
            Self::Coalition => Self::Allied,
        }
    }

    /// Check whether `other` is hostile to this faction.
    #[must_use]
    pub fn is_enemy_of(self, other: Self) -> bool {
        self != other
    }

    /// Stable index for per-faction tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Allied => 0,
            Self::Coalition => 1,
        }
    }
}
