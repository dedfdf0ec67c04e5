//! Headless squad battle runner for scripted scenarios and CI verification.
//!
//! This crate runs battles without any presentation layer. A RON
//! [`Scenario`] describes the opening layout and a script of orders; the
//! [`HeadlessRunner`] plays it on a fixed tick and produces a JSON
//! [`MatchReport`]. This enables:
//!
//! - **Balance checks**: Compare outcomes as templates change
//! - **CI verification**: Automated testing of combat rules and determinism
//! - **Replay verification**: Check that recorded runs reproduce their hash
//!
//! # Example
//!
//! ```bash
//! # Run the built-in skirmish
//! cargo run -p squad_headless -- skirmish
//!
//! # Run a scenario file and print the JSON report
//! cargo run -p squad_headless -- run --scenario scenarios/crossing.ron --json
//!
//! # Record, then verify a replay
//! cargo run -p squad_headless -- run --scenario scenarios/crossing.ron --replay-out crossing.replay
//! cargo run -p squad_headless -- replay --file crossing.replay --verify
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod report;
pub mod runner;
pub mod scenario;

pub use report::{DeathRecord, FactionReport, MatchReport, UnitReport};
pub use runner::{run_scenario, verify_determinism, HeadlessRunner};
pub use scenario::{Placement, Point, Scenario, ScenarioError, ScenarioOrder, ScriptedCommand};
