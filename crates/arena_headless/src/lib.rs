//! Headless battle runner for tuning and CI.
//!
//! Battles are described by RON scenario files and run to completion
//! without any front end. The crate offers three entry points:
//!
//! - [`runner::run_battle`]: one seeded battle, optionally streaming the
//!   combat log as JSON lines
//! - [`batch::run_batch`]: many seeds in parallel with win-rate statistics
//! - [`batch::verify_determinism`]: replay one seed and compare the results
//!
//! Scenarios may also roll a level-scaled enemy wave per seed; see
//! [`spawner`].
//!
//! # Example
//!
//! ```bash
//! # Stream one battle's log
//! cargo run -p arena_headless -- run scenarios/skirmish.ron --seed 7 --events
//!
//! # Balance statistics over 500 seeds
//! cargo run -p arena_headless -- batch scenarios/skirmish.ron --count 500 --output results/
//! ```

pub mod batch;
pub mod runner;
pub mod scenario;
pub mod spawner;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, BatchSummary};
pub use runner::{run_battle, BattleReport, RunError};
pub use scenario::{Scenario, ScenarioError};
pub use spawner::{Formation, WaveSpec};
