//! Match reports for balance analysis and CI checks.

use std::path::Path;

use serde::{Deserialize, Serialize};
use squad_core::behavior::BehaviorState;
use squad_core::factions::Faction;
use squad_core::registry::Registry;
use squad_core::unit::{UnitDeath, UnitId, UnitSnapshot};

/// A unit death and the tick it happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathRecord {
    /// Tick counter when the death was reported.
    pub tick: u64,
    /// The unit that died.
    pub unit: UnitId,
    /// Its faction.
    pub faction: Faction,
    /// Victory points its opponent earned.
    pub vp_value: u32,
}

impl DeathRecord {
    /// Stamp a death notification with a tick.
    #[must_use]
    pub const fn new(tick: u64, death: UnitDeath) -> Self {
        Self {
            tick,
            unit: death.id,
            faction: death.faction,
            vp_value: death.vp_value,
        }
    }
}

/// Per-faction totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionReport {
    /// Faction identifier.
    pub faction: Faction,
    /// Victory points earned.
    pub score: u32,
    /// Units still alive.
    pub survivors: usize,
    /// Units lost.
    pub losses: usize,
    /// Tactical points left in the pool.
    pub tactical_points: u32,
}

/// Final state of a surviving unit, with plain-decimal coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    /// Unit handle.
    pub id: UnitId,
    /// Template name.
    pub name: String,
    /// Owning faction.
    pub faction: Faction,
    /// World position as `[x, y, z]`.
    pub position: [f64; 3],
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
    /// Rounds left.
    pub ammo: u32,
    /// Morale (0-100).
    pub morale: u8,
    /// Behavior state at the end of the run.
    pub state: BehaviorState,
}

impl From<UnitSnapshot> for UnitReport {
    fn from(snapshot: UnitSnapshot) -> Self {
        let p = snapshot.position;
        Self {
            id: snapshot.id,
            name: snapshot.name,
            faction: snapshot.faction,
            position: [p.x.to_num(), p.y.to_num(), p.z.to_num()],
            health: snapshot.health,
            max_health: snapshot.max_health,
            ammo: snapshot.ammo,
            morale: snapshot.morale,
            state: snapshot.state,
        }
    }
}

/// Outcome of one headless run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks run.
    pub ticks: u64,
    /// Simulated seconds elapsed.
    pub elapsed_seconds: f64,
    /// Whether the match ended before the tick budget ran out.
    pub match_over: bool,
    /// Winning faction (None = draw or unfinished).
    pub winner: Option<Faction>,
    /// Per-faction totals, in [`Faction::ALL`] order.
    pub factions: Vec<FactionReport>,
    /// Deaths in the order they were reported.
    pub deaths: Vec<DeathRecord>,
    /// Successful strikes over the whole run.
    pub attacks: u64,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
    /// Surviving units.
    pub units: Vec<UnitReport>,
}

impl MatchReport {
    /// Build a report from a registry and the deaths collected while running it.
    #[must_use]
    pub fn from_registry(
        scenario: &str,
        registry: &Registry,
        deaths: &[DeathRecord],
        attacks: u64,
    ) -> Self {
        let factions = Faction::ALL
            .iter()
            .map(|&faction| FactionReport {
                faction,
                score: registry.score(faction),
                survivors: registry.live_count(faction),
                losses: deaths.iter().filter(|d| d.faction == faction).count(),
                tactical_points: registry.tactical_points(faction),
            })
            .collect();

        Self {
            scenario: scenario.to_string(),
            ticks: registry.current_tick(),
            elapsed_seconds: registry.elapsed().to_num(),
            match_over: registry.is_match_over(),
            winner: registry.winner(),
            factions,
            deaths: deaths.to_vec(),
            attacks,
            final_state_hash: registry.state_hash(),
            units: registry.snapshots().into_iter().map(UnitReport::from).collect(),
        }
    }

    /// Totals for one faction.
    #[must_use]
    pub fn faction(&self, faction: Faction) -> Option<&FactionReport> {
        self.factions.iter().find(|f| f.faction == faction)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Save to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }

    /// One-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let outcome = match (self.match_over, self.winner) {
            (true, Some(faction)) => format!("{} victory", faction.display_name()),
            (true, None) => "draw".to_string(),
            (false, _) => "unfinished".to_string(),
        };
        let scores: Vec<String> = self
            .factions
            .iter()
            .map(|f| format!("{} {} VP ({} left)", f.faction.display_name(), f.score, f.survivors))
            .collect();
        format!(
            "{}: {} after {} ticks ({:.2}s), {}",
            self.scenario,
            outcome,
            self.ticks,
            self.elapsed_seconds,
            scores.join(", ")
        )
    }
}
