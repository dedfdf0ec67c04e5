//! # Squad Core
//!
//! Deterministic tactical simulation core for squad-based combat.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No randomness
//! - No floating-point math in the simulation (uses fixed-point)
//!
//! This separation enables:
//! - Headless runs and automated balance checks
//! - Replay systems
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`unit`] - The unit entity with its combat and movement primitives
//! - [`behavior`] - Per-unit reactive behavior state machine
//! - [`registry`] - Unit ownership, selection, order dispatch and the tick loop
//! - [`template`] - Data-driven stat templates and variants
//! - [`orders`] - Player orders
//! - [`schedule`] - Deterministic periodic tasks
//! - [`replay`] - Order logs and deterministic playback
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod behavior;
pub mod error;
pub mod factions;
pub mod math;
pub mod orders;
pub mod registry;
pub mod replay;
pub mod schedule;
pub mod storage;
pub mod template;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::behavior::{AttackEvent, BehaviorState, StateTransition};
    pub use crate::error::{GameError, Result};
    pub use crate::factions::Faction;
    pub use crate::math::{Fixed, Vec3Fixed};
    pub use crate::orders::{Order, OrderKind, OrderPayload};
    pub use crate::registry::{
        OrderOutcome, Registry, RegistryConfig, Roster, ThreatSweep, TickEvents,
    };
    pub use crate::replay::{Replay, ReplayPlayer, ReplayRecorder};
    pub use crate::template::{StatTemplate, TemplateCatalog, UnitVariant};
    pub use crate::unit::{Unit, UnitDeath, UnitId, UnitSnapshot};
}
