//! Headless match runner.
//!
//! The runner owns the external game loop: it spawns a scenario's
//! placements, issues the scripted orders when their tick comes up and
//! advances the registry by the scenario's fixed delta. Every order goes
//! through a [`ReplayRecorder`], so a finished run can always be handed
//! back as a verifiable [`Replay`].

use squad_core::orders::Order;
use squad_core::registry::{Registry, TickEvents};
use squad_core::replay::{Replay, ReplayRecorder};
use squad_core::unit::{UnitDeath, UnitId};

use crate::report::{DeathRecord, MatchReport};
use crate::scenario::{Scenario, ScenarioError, ScenarioOrder, ScriptedCommand};

/// Runs one scenario to completion without any presentation layer.
#[derive(Debug)]
pub struct HeadlessRunner {
    scenario_name: String,
    recorder: ReplayRecorder,
    placements: Vec<Vec<UnitId>>,
    commands: Vec<ScriptedCommand>,
    next_command: usize,
    deaths: Vec<DeathRecord>,
    attacks: u64,
}

impl HeadlessRunner {
    /// Validate `scenario` and spawn its placements.
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        scenario.validate()?;

        let catalog = scenario.catalog();
        let mut registry = Registry::with_config(&scenario.registry_config());
        let mut placements = Vec::with_capacity(scenario.placements.len());
        for placement in &scenario.placements {
            let template = catalog.get(&placement.template)?;
            let ids: Vec<UnitId> = placement
                .positions()
                .map(|position| registry.spawn(placement.faction, position, template))
                .collect();
            tracing::debug!(
                template = %placement.template,
                faction = ?placement.faction,
                count = ids.len(),
                "placement spawned"
            );
            placements.push(ids);
        }

        // Stable, so same-tick commands keep their script order.
        let mut commands = scenario.commands.clone();
        commands.sort_by_key(|c| c.at_tick);

        tracing::info!(
            scenario = %scenario.name,
            units = registry.unit_count(),
            commands = commands.len(),
            "scenario loaded"
        );

        let recorder = ReplayRecorder::new(scenario.name.clone(), scenario.delta, registry)?;
        Ok(Self {
            scenario_name: scenario.name.clone(),
            recorder,
            placements,
            commands,
            next_command: 0,
            deaths: Vec::new(),
            attacks: 0,
        })
    }

    /// The registry being driven.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        self.recorder.registry()
    }

    /// Units spawned by placement `index`, dead ones included.
    #[must_use]
    pub fn placement_units(&self, index: usize) -> &[UnitId] {
        self.placements.get(index).map(Vec::as_slice).unwrap_or_default()
    }

    /// Deaths reported so far.
    #[must_use]
    pub fn deaths(&self) -> &[DeathRecord] {
        &self.deaths
    }

    /// Issue due commands, then advance one tick.
    pub fn step(&mut self) -> TickEvents {
        let now = self.registry().current_tick();
        while let Some(command) = self.commands.get(self.next_command) {
            if command.at_tick > now {
                break;
            }
            let command = command.clone();
            self.next_command += 1;
            self.issue(&command);
        }

        let events = self.recorder.tick();
        let tick = self.registry().current_tick();
        self.attacks += events.attacks.len() as u64;
        for death in &events.deaths {
            self.record_death(tick, *death);
        }
        if events.threat_sweep.is_some_and(|s| s.total() > 0) {
            tracing::trace!(tick, sweep = ?events.threat_sweep, "threat sweep");
        }
        events
    }

    /// Step until `max_ticks` ticks have run or the match is over.
    pub fn run(&mut self, max_ticks: u64) -> MatchReport {
        while self.registry().current_tick() < max_ticks && !self.registry().is_match_over() {
            self.step();
        }

        let report = self.report();
        tracing::info!(
            ticks = report.ticks,
            winner = ?report.winner,
            deaths = report.deaths.len(),
            "run finished"
        );
        report
    }

    /// Report on the current state.
    #[must_use]
    pub fn report(&self) -> MatchReport {
        MatchReport::from_registry(&self.scenario_name, self.registry(), &self.deaths, self.attacks)
    }

    /// Stop and hand back the report with the recorded replay.
    #[must_use]
    pub fn finish(self) -> (MatchReport, Replay) {
        let report = self.report();
        let (replay, _) = self.recorder.finish();
        (report, replay)
    }

    fn issue(&mut self, command: &ScriptedCommand) {
        let selection = self.live_units(&command.select);
        let order = match command.order {
            ScenarioOrder::Move(point) => Order::Move(point.to_vec3()),
            ScenarioOrder::Attack(index) => {
                let Some(target) = self.live_units(&[index]).first().copied() else {
                    tracing::debug!(at_tick = command.at_tick, placement = index, "attack target wiped out");
                    return;
                };
                Order::Attack(target)
            }
            ScenarioOrder::Defend => Order::Defend,
            ScenarioOrder::Special => Order::Special,
        };

        let outcome = self.recorder.issue_order(&selection, order);
        tracing::debug!(
            at_tick = command.at_tick,
            ?order,
            affected = outcome.affected.len(),
            "scripted order"
        );

        let tick = self.registry().current_tick();
        self.attacks += outcome.attacks.len() as u64;
        for death in outcome.deaths {
            self.record_death(tick, death);
        }
    }

    fn live_units(&self, placements: &[usize]) -> Vec<UnitId> {
        placements
            .iter()
            .flat_map(|&index| self.placement_units(index))
            .copied()
            .filter(|&id| self.registry().unit(id).is_some())
            .collect()
    }

    fn record_death(&mut self, tick: u64, death: UnitDeath) {
        tracing::info!(tick, unit = %death.id, faction = ?death.faction, "unit lost");
        self.deaths.push(DeathRecord::new(tick, death));
    }
}

/// Run `scenario` for its own tick budget, or `ticks` when given.
pub fn run_scenario(scenario: &Scenario, ticks: Option<u64>) -> Result<MatchReport, ScenarioError> {
    let mut runner = HeadlessRunner::new(scenario)?;
    Ok(runner.run(ticks.unwrap_or(scenario.ticks)))
}

/// Run `scenario` `runs` times and check every run ends on the same hash.
pub fn verify_determinism(scenario: &Scenario, runs: u32) -> Result<bool, ScenarioError> {
    let mut first = None;
    for _ in 0..runs {
        let hash = run_scenario(scenario, None)?.final_state_hash;
        match first {
            None => first = Some(hash),
            Some(expected) if expected != hash => return Ok(false),
            Some(_) => {}
        }
    }
    Ok(true)
}
