//! Single headless battle: run to completion, optionally streaming the
//! combat log as JSON lines, and summarise the result.

use std::io::Write;

use arena_core::battle::{Battle, Outcome};
use arena_core::combatant::{Archetype, EntityId, Faction};
use arena_core::math::to_micros;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scenario::{Scenario, ScenarioError};

/// Error type for headless runs.
#[derive(Error, Debug)]
pub enum RunError {
    /// Scenario could not be built.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// Writing the event stream failed.
    #[error("Failed to write events: {0}")]
    Io(#[from] std::io::Error),
    /// Encoding an event failed.
    #[error("Failed to encode event: {0}")]
    Json(#[from] serde_json::Error),
}

/// Final state of one combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantReport {
    /// Entity id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Class.
    pub archetype: Archetype,
    /// Side.
    pub faction: Faction,
    /// Health left.
    pub hp: i32,
    /// Maximum health.
    pub max_hp: i32,
    /// Level reached.
    pub level: u32,
    /// Experience towards the next level.
    pub xp: u32,
}

/// Summary of one finished (or timed-out) battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// `None` when the tick limit was hit.
    pub outcome: Option<Outcome>,
    /// Ticks run.
    pub ticks: u64,
    /// Simulation time in milliseconds.
    pub elapsed_ms: i64,
    /// Number of log records produced.
    pub events: usize,
    /// Every combatant, dead or alive, in id order.
    pub combatants: Vec<CombatantReport>,
    /// Final state hash, for determinism checks.
    pub final_state_hash: u64,
}

impl BattleReport {
    /// Combatants of `faction` still standing.
    #[must_use]
    pub fn survivors(&self, faction: Faction) -> usize {
        self.combatants
            .iter()
            .filter(|c| c.faction == faction && c.hp > 0)
            .count()
    }
}

/// Run one battle of `scenario` with `seed` until it ends or hits the
/// scenario's tick limit.
///
/// When `stream` is given, every log record is written to it as one JSON
/// object per line.
pub fn run_battle(
    scenario: &Scenario,
    seed: u64,
    mut stream: Option<&mut dyn Write>,
) -> Result<BattleReport, RunError> {
    let mut battle = scenario.build(seed)?;
    let dt = scenario.tick_dt();
    let mut events = 0;

    while battle.outcome().is_none() && battle.tick_count() < scenario.max_ticks {
        let records = battle.tick(dt);
        events += records.len();
        if let Some(out) = stream.as_deref_mut() {
            for record in &records {
                serde_json::to_writer(&mut *out, record)?;
                out.write_all(b"\n")?;
            }
        }
    }

    if battle.outcome().is_none() {
        tracing::info!(
            scenario = %scenario.name,
            seed,
            ticks = battle.tick_count(),
            "battle timed out"
        );
    }

    Ok(report(scenario, seed, &battle, events))
}

fn report(scenario: &Scenario, seed: u64, battle: &Battle, events: usize) -> BattleReport {
    let elapsed_ms = to_micros(battle.elapsed()) / 1000;
    BattleReport {
        scenario: scenario.name.clone(),
        seed,
        outcome: battle.outcome(),
        ticks: battle.tick_count(),
        elapsed_ms,
        events,
        combatants: battle
            .combatants()
            .into_iter()
            .map(|c| CombatantReport {
                id: c.id,
                name: c.name.clone(),
                archetype: c.archetype,
                faction: c.faction,
                hp: c.hp,
                max_hp: c.stats.max_hp,
                level: c.level,
                xp: c.xp,
            })
            .collect(),
        final_state_hash: battle.state_hash(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::UnitPlacement;
    use arena_core::events::EventRecord;

    fn duel() -> Scenario {
        Scenario {
            name: "Duel".to_string(),
            party: vec![UnitPlacement::new(Archetype::Warrior, 100, 300).at_level(3)],
            enemies: vec![UnitPlacement::new(Archetype::Goblin, 300, 300)],
            max_ticks: 2000,
            ..Scenario::default()
        }
    }

    #[test]
    fn test_duel_finishes_and_reports() {
        let mut scenario = duel();
        scenario.config.party_autopilot = true;
        let report = run_battle(&scenario, 7, None).expect("run");

        assert!(report.outcome.is_some());
        assert!(report.ticks < 2000);
        assert_eq!(report.combatants.len(), 2);
        assert!(report.events > 0);
        let expected_elapsed = i64::try_from(report.ticks).expect("ticks") * 50;
        assert_eq!(report.elapsed_ms, expected_elapsed);
        match report.outcome {
            Some(Outcome::Victory) => assert_eq!(report.survivors(Faction::Enemies), 0),
            Some(Outcome::Defeat) => assert_eq!(report.survivors(Faction::Party), 0),
            None => unreachable!(),
        }
    }

    #[test]
    fn test_stream_is_json_lines() {
        let mut scenario = duel();
        scenario.config.party_autopilot = true;
        let mut out: Vec<u8> = Vec::new();
        let report = run_battle(&scenario, 3, Some(&mut out as &mut dyn Write)).expect("run");

        let text = String::from_utf8(out).expect("utf8");
        let records: Vec<EventRecord> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("one record per line"))
            .collect();
        assert_eq!(records.len(), report.events);
        assert!(records.windows(2).all(|w| w[0].tick <= w[1].tick));
    }

    #[test]
    fn test_timeout_leaves_no_outcome() {
        let mut scenario = duel();
        scenario.max_ticks = 5;
        let report = run_battle(&scenario, 0, None).expect("run");
        assert_eq!(report.outcome, None);
        assert_eq!(report.ticks, 5);
    }

    #[test]
    fn test_same_seed_same_report() {
        let mut scenario = Scenario::skirmish();
        scenario.max_ticks = 400;
        let a = run_battle(&scenario, 99, None).expect("run");
        let b = run_battle(&scenario, 99, None).expect("run");
        assert_eq!(a, b);
    }
}
