//! Batch runner for balance testing.
//!
//! Runs many seeds of one scenario in parallel using rayon. Every battle
//! owns its state, so the runs share nothing.

use std::path::Path;
use std::time::Instant;

use arena_core::battle::Outcome;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::runner::{run_battle, BattleReport, RunError};
use crate::scenario::Scenario;

/// Configuration for a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of battles to run
    pub count: u32,
    /// First seed; battle `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Worker threads (0 = rayon default)
    pub parallel: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 100,
            seed_start: 0,
            parallel: 0,
        }
    }
}

impl BatchConfig {
    /// Config for `count` battles from seed 0.
    #[must_use]
    pub fn new(count: u32) -> Self {
        Self {
            count,
            ..Default::default()
        }
    }

    /// Set seed start
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }
}

/// Aggregate statistics over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Battles that produced a report.
    pub total: u32,
    /// Party wins.
    pub victories: u32,
    /// Party losses.
    pub defeats: u32,
    /// Battles that hit the tick limit.
    pub timeouts: u32,
    /// `victories / total`.
    pub victory_rate: f64,
    /// Mean ticks over decided battles.
    pub mean_ticks: f64,
}

impl BatchSummary {
    /// Summarise a set of reports.
    #[must_use]
    pub fn from_reports(reports: &[BattleReport]) -> Self {
        let mut summary = Self::default();
        let mut decided_ticks = 0u64;
        for report in reports {
            summary.total += 1;
            match report.outcome {
                Some(Outcome::Victory) => summary.victories += 1,
                Some(Outcome::Defeat) => summary.defeats += 1,
                None => summary.timeouts += 1,
            }
            if report.outcome.is_some() {
                decided_ticks += report.ticks;
            }
        }
        if summary.total > 0 {
            summary.victory_rate = f64::from(summary.victories) / f64::from(summary.total);
        }
        let decided = summary.victories + summary.defeats;
        if decided > 0 {
            summary.mean_ticks = decided_ticks as f64 / f64::from(decided);
        }
        summary
    }
}

/// A battle that could not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario name
    pub scenario: String,
    /// Configuration used
    pub config: BatchConfig,
    /// One report per successful battle, in seed order
    pub reports: Vec<BattleReport>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Wall-clock runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Run a batch of battles
pub fn run_batch(scenario: &Scenario, config: &BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        scenario = %scenario.name,
        count = config.count,
        seed_start = config.seed_start,
        "starting batch"
    );

    let run_all = || -> Vec<Result<BattleReport, BatchError>> {
        (0..config.count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                run_battle(scenario, seed, None).map_err(|e| {
                    warn!(seed, error = %e, "battle failed");
                    BatchError {
                        seed,
                        message: e.to_string(),
                    }
                })
            })
            .collect()
    };

    let results = if config.parallel > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                warn!(error = %e, "falling back to the global thread pool");
                run_all()
            }
        }
    } else {
        run_all()
    };

    let mut reports = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => errors.push(e),
        }
    }

    let summary = BatchSummary::from_reports(&reports);
    let duration_seconds = start.elapsed().as_secs_f64();
    debug!(?summary, "batch summary");
    info!(
        battles = reports.len(),
        failed = errors.len(),
        seconds = format!("{duration_seconds:.2}"),
        "batch complete"
    );

    BatchResults {
        scenario: scenario.name.clone(),
        config: config.clone(),
        reports,
        summary,
        duration_seconds,
        errors,
    }
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismCheck {
    /// Final state hash of every run.
    pub hashes: Vec<u64>,
    /// True when every run produced the same report.
    pub identical: bool,
}

/// Run the same seed `runs` times and compare the full reports.
pub fn verify_determinism(
    scenario: &Scenario,
    seed: u64,
    runs: u32,
) -> Result<DeterminismCheck, RunError> {
    let reports = (0..runs.max(1))
        .map(|_| run_battle(scenario, seed, None))
        .collect::<Result<Vec<_>, _>>()?;

    let identical = reports.windows(2).all(|w| w[0] == w[1]);
    Ok(DeterminismCheck {
        hashes: reports.iter().map(|r| r.final_state_hash).collect(),
        identical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::UnitPlacement;
    use arena_core::combatant::Archetype;

    fn quick_scenario() -> Scenario {
        let mut scenario = Scenario::skirmish();
        scenario.max_ticks = 3000;
        scenario
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new(500).with_seed(12345);
        assert_eq!(config.count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.parallel, 0);
    }

    #[test]
    fn test_run_batch_small() {
        let results = run_batch(&quick_scenario(), &BatchConfig::new(6).with_seed(10));
        assert_eq!(results.reports.len(), 6);
        assert!(results.errors.is_empty());
        let seeds: Vec<u64> = results.reports.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, (10..16).collect::<Vec<_>>());
        assert_eq!(results.summary.total, 6);
        assert_eq!(
            results.summary.victories + results.summary.defeats + results.summary.timeouts,
            6
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let scenario = quick_scenario();
        let parallel = run_batch(
            &scenario,
            &BatchConfig {
                count: 4,
                seed_start: 3,
                parallel: 4,
            },
        );
        let single = run_batch(
            &scenario,
            &BatchConfig {
                count: 4,
                seed_start: 3,
                parallel: 1,
            },
        );
        assert_eq!(parallel.reports, single.reports);
    }

    #[test]
    fn test_failed_battles_are_collected() {
        let mut scenario = quick_scenario();
        scenario.party.push(UnitPlacement::new(Archetype::Orc, 300, 300));
        let results = run_batch(&scenario, &BatchConfig::new(3));
        assert!(results.reports.is_empty());
        assert_eq!(results.errors.len(), 3);
        assert_eq!(results.summary, BatchSummary::default());
    }

    #[test]
    fn test_summary_rates() {
        let base = run_batch(&quick_scenario(), &BatchConfig::new(1)).reports;
        let mut reports = Vec::new();
        for outcome in [Some(Outcome::Victory), Some(Outcome::Victory), Some(Outcome::Defeat), None] {
            let mut r = base[0].clone();
            r.outcome = outcome;
            r.ticks = 100;
            reports.push(r);
        }
        let summary = BatchSummary::from_reports(&reports);
        assert_eq!(summary.victories, 2);
        assert_eq!(summary.defeats, 1);
        assert_eq!(summary.timeouts, 1);
        assert!((summary.victory_rate - 0.5).abs() < 1e-9);
        assert!((summary.mean_ticks - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_verify_determinism() {
        let check = verify_determinism(&quick_scenario(), 12345, 3).expect("runs");
        assert!(check.identical);
        assert_eq!(check.hashes.len(), 3);
    }

    #[test]
    fn test_batch_results_save_load() {
        let results = run_batch(&quick_scenario(), &BatchConfig::new(2));

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out").join("results.json");
        results.save(&path).expect("save");
        assert!(path.exists());

        let loaded = BatchResults::load(&path).expect("load");
        assert_eq!(loaded.reports, results.reports);
        assert_eq!(loaded.scenario, "Skirmish");
    }
}
