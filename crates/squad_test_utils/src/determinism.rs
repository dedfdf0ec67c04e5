//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the registry
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays and headless balance runs only mean something if the registry is
//! fully deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`squad_core::math::Fixed`] throughout.
//!
//! - **Iteration order**: units are stored in a dense table and always
//!   visited in registration order; the selection is an ordered set.
//!
//! - **System randomness**: The core has none.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual module determinism (movement, combat, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full scenarios are reproducible
//! 4. **Parallel tests**: Running N registries on separate threads all match

use std::thread;

use squad_core::registry::{Registry, Roster};

use crate::fixtures::tick_delta;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use squad_test_utils::determinism::{step_all_live, verify_determinism};
/// use squad_test_utils::fixtures::skirmish;
///
/// let result = verify_determinism(
///     3,
///     100,
///     || skirmish().0,
///     step_all_live,
///     |registry| registry.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Advance a registry one fixture tick against every live unit.
pub fn step_all_live(registry: &mut Registry) {
    registry.tick(tick_delta(), &Roster::AllLive);
}

/// Run a registry setup twice and verify the final state hashes match.
pub fn verify_registry_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Registry,
{
    verify_determinism(2, num_ticks, &setup_fn, step_all_live, Registry::state_hash)
        .is_deterministic
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run N registries on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations_scoped<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
) -> ParallelSimResult
where
    F: Fn() -> Registry + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut registry = setup_fn();
                    for _ in 0..num_ticks {
                        step_all_live(&mut registry);
                    }
                    registry.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree throughout, `Some(tick)` for the first tick whose
/// hashes differ.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Registry,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        step_all_live(&mut first);
        step_all_live(&mut second);

        if first.state_hash() != second.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a bincode round-trip preserves the registry state exactly.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Registry,
{
    let mut registry = setup_fn();
    for _ in 0..num_ticks {
        step_all_live(&mut registry);
    }

    let Ok(bytes) = registry.serialize() else {
        return false;
    };
    let Ok(mut restored) = Registry::deserialize(&bytes) else {
        return false;
    };
    if restored.state_hash() != registry.state_hash() {
        return false;
    }

    // The restored copy must also keep evolving identically.
    for _ in 0..num_ticks {
        step_all_live(&mut registry);
        step_all_live(&mut restored);
    }
    restored.state_hash() == registry.state_hash()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of the registry.
pub mod strategies {
    use proptest::prelude::*;
    use squad_core::factions::Faction;
    use squad_core::math::{Fixed, Vec3Fixed};
    use squad_core::orders::Order;
    use squad_core::template::{SpecialSpec, StatTemplate, UnitVariant};
    use squad_core::unit::UnitId;

    /// Generate a ground-plane coordinate.
    ///
    /// Range: -200 to 200 (a skirmish-sized map)
    pub fn arb_coordinate() -> impl Strategy<Value = Fixed> {
        (-200i32..200i32).prop_map(Fixed::from_num)
    }

    /// Generate a point on the ground plane.
    pub fn arb_ground_point() -> impl Strategy<Value = Vec3Fixed> {
        (arb_coordinate(), arb_coordinate()).prop_map(|(x, z)| Vec3Fixed::new(x, Fixed::ZERO, z))
    }

    /// Generate a ground point anywhere in fixed-point range, mostly far
    /// outside any map.
    pub fn arb_far_point() -> impl Strategy<Value = Vec3Fixed> {
        let coordinate = || {
            prop_oneof![
                arb_coordinate(),
                (-100_000i32..100_000i32).prop_map(Fixed::from_num),
                any::<i64>().prop_map(Fixed::from_bits),
            ]
        };
        (coordinate(), coordinate()).prop_map(|(x, z)| Vec3Fixed::new(x, Fixed::ZERO, z))
    }

    /// Generate a tick delta between 1/64 s and 1 s.
    pub fn arb_delta() -> impl Strategy<Value = Fixed> {
        (1i32..=64i32).prop_map(|n| Fixed::from_num(n) / Fixed::from_num(64))
    }

    /// Generate a faction.
    pub fn arb_faction() -> impl Strategy<Value = Faction> {
        prop_oneof![Just(Faction::Allied), Just(Faction::Coalition)]
    }

    /// Generate health values (1-200).
    pub fn arb_health() -> impl Strategy<Value = u32> {
        1u32..200u32
    }

    /// Generate damage values (0-50).
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        0u32..50u32
    }

    /// Generate attack range in fixed-point.
    pub fn arb_attack_range() -> impl Strategy<Value = Fixed> {
        (0i32..100i32).prop_map(Fixed::from_num)
    }

    /// Generate a stat template.
    pub fn arb_template() -> impl Strategy<Value = StatTemplate> {
        (
            arb_health(),
            arb_damage(),
            arb_attack_range(),
            (0i32..20i32).prop_map(Fixed::from_num),
            0u32..60u32,
            (1i32..8i32).prop_map(Fixed::from_num),
            any::<bool>(),
        )
            .prop_map(
                |(health, damage, range, speed, ammo, reload_time, infantry)| StatTemplate {
                    name: "Generated".to_string(),
                    variant: if infantry {
                        UnitVariant::InfantrySquad
                    } else {
                        UnitVariant::Generic
                    },
                    health,
                    damage,
                    range,
                    speed,
                    vp_value: 5,
                    ammo,
                    reload_time,
                    special: infantry.then(|| SpecialSpec {
                        name: "Dig In".to_string(),
                        cost: 10,
                        cooldown: Fixed::from_num(30),
                    }),
                },
            )
    }

    /// Parameters for spawning a test unit.
    #[derive(Debug, Clone)]
    pub struct TestSpawn {
        /// Owning faction.
        pub faction: Faction,
        /// Spawn point.
        pub position: Vec3Fixed,
        /// Stats.
        pub template: StatTemplate,
    }

    /// Generate a spawn.
    pub fn arb_spawn() -> impl Strategy<Value = TestSpawn> {
        (arb_faction(), arb_ground_point(), arb_template()).prop_map(
            |(faction, position, template)| TestSpawn {
                faction,
                position,
                template,
            },
        )
    }

    /// Generate a list of spawns.
    pub fn arb_spawn_list(max_units: usize) -> impl Strategy<Value = Vec<TestSpawn>> {
        proptest::collection::vec(arb_spawn(), 1..max_units)
    }

    /// Generate an order that may reference any of the first `max_id` handles.
    pub fn arb_order(max_id: u32) -> impl Strategy<Value = Order> {
        prop_oneof![
            arb_ground_point().prop_map(Order::Move),
            (0..max_id.max(1)).prop_map(|id| Order::Attack(UnitId::new(id))),
            Just(Order::Defend),
            Just(Order::Special),
        ]
    }

    /// A scripted order: who is selected and what they are told.
    #[derive(Debug, Clone)]
    pub struct ScriptedOrder {
        /// Tick before which the order is issued.
        pub tick: u64,
        /// Handles to select.
        pub selection: Vec<UnitId>,
        /// The order.
        pub order: Order,
    }

    /// Generate an order script over `ticks` ticks for `max_id` handles.
    pub fn arb_script(
        max_id: u32,
        ticks: u64,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<ScriptedOrder>> {
        let order = (
            0..ticks.max(1),
            proptest::collection::vec((0..max_id.max(1)).prop_map(UnitId::new), 0..4),
            arb_order(max_id),
        )
            .prop_map(|(tick, selection, order)| ScriptedOrder {
                tick,
                selection,
                order,
            });
        proptest::collection::vec(order, 0..max_len).prop_map(|mut script| {
            script.sort_by_key(|s| s.tick);
            script
        })
    }
}
