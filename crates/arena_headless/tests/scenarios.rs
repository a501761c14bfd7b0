//! The bundled scenario files load, build and run.

use std::path::PathBuf;

use arena_core::combatant::Archetype;
use arena_headless::spawner::Formation;
use arena_headless::{run_battle, Scenario, WaveSpec};

fn bundled(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

#[test]
fn test_skirmish_file_matches_builtin() {
    let loaded = Scenario::load(bundled("skirmish.ron")).expect("load skirmish");
    assert_eq!(loaded, Scenario::skirmish());
}

#[test]
fn test_duel_file_loads() {
    let duel = Scenario::load(bundled("duel.ron")).expect("load duel");
    assert_eq!(duel.party.len(), 1);
    assert_eq!(duel.party[0].name.as_deref(), Some("Brand"));
    assert_eq!(duel.enemies[0].archetype, Archetype::Troll);
    assert!(!duel.enemies[0].interruptible);
    assert_eq!(duel.config.ai.decision_interval_ms, 250);
    assert_eq!(duel.tick_ms, 50);

    let battle = duel.build(1).expect("build");
    assert_eq!(battle.combatants().len(), 2);
}

#[test]
fn test_bundled_scenarios_run() {
    for name in ["skirmish.ron", "duel.ron", "wave.ron"] {
        let mut scenario = Scenario::load(bundled(name)).expect("load");
        scenario.max_ticks = 200;
        let report = run_battle(&scenario, 5, None).expect("run");
        assert!(report.ticks <= 200);
        assert_eq!(report.scenario, scenario.name);
    }
}

#[test]
fn test_wave_file_rolls_per_seed() {
    let scenario = Scenario::load(bundled("wave.ron")).expect("load wave");
    assert!(scenario.enemies.is_empty());
    assert_eq!(
        scenario.wave,
        Some(WaveSpec::new(5, 5).with_boss().in_formation(Formation::Wedge))
    );

    let battle = scenario.build(8).expect("build");
    let enemies: Vec<_> = battle
        .combatants()
        .into_iter()
        .filter(|c| c.archetype.faction() == arena_core::combatant::Faction::Enemies)
        .collect();
    assert_eq!(enemies.len(), 6);
    assert!(enemies
        .iter()
        .any(|c| c.archetype == Archetype::Dragon && c.level == 7));
}
