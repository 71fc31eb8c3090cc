//! End-to-end tests: compile a round, run trials, fold them into tables.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use wavelab_core::aggregate::{Aggregate, LossTable, SignatureTable};
use wavelab_core::executor::{Executor, ExecutorState};
use wavelab_core::prelude::*;
use wavelab_core::schedule::Effect;
use wavelab_test_utils::fixtures::{
    dynamic_fodder, fixed_card, fixed_fodder, flat_setting, frozen_wave, launcher, pool_setting,
    projectile, roof_projectile, setting, wave,
};

fn run_trials<T: Aggregate>(
    setting: &Setting,
    waves: &[Wave],
    mode: ScenarioMode,
    heavy_total: usize,
    trials: usize,
) -> T {
    let mut world = LaneWorld::new(setting.scene);
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut table = T::default();
    for _ in 0..trials {
        let schedule = compile(setting, waves, mode, heavy_total).expect("round compiles");
        let record = Executor::new(setting, mode, schedule).run(&mut world, &mut rng);
        table.update(&record);
    }
    table
}

// =========================================================================
// Single projectile on a flat lawn
// =========================================================================

#[test]
fn test_single_projectile_compiles_to_one_launch() {
    let setting = flat_setting(&[2]);
    let waves = vec![wave(601, vec![projectile(300, 2, 9.0)])];

    let schedule = compile(&setting, &waves, ScenarioMode::Smash, 1).unwrap();
    let launches: Vec<i64> = schedule
        .ops
        .iter()
        .filter(|op| matches!(op.effect, Effect::Launch { .. }))
        .map(|op| op.tick)
        .collect();

    assert_eq!(launches, vec![-73]);
    assert_eq!(schedule.min_tick(), Some(-73));
    assert_eq!(schedule.labels(), vec!["300P"]);
}

#[test]
fn test_negative_start_runs_to_completion() {
    let setting = flat_setting(&[2]);
    let waves = vec![wave(601, vec![projectile(300, 2, 9.0)])];
    let schedule = compile(&setting, &waves, ScenarioMode::Smash, 1).unwrap();

    let mut world = LaneWorld::new(setting.scene);
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut executor = Executor::new(&setting, ScenarioMode::Smash, schedule);
    let record = executor.run(&mut world, &mut rng);

    assert_eq!(executor.state(), ExecutorState::Done);
    assert_eq!(record.heavies.len(), 1);
    assert_eq!(record.heavies[0].lane, 2);
    assert_eq!(record.actions[0].handles.len(), 1);
}

#[test]
fn test_signature_table_counts_every_heavy() {
    let setting = flat_setting(&[2]);
    let waves = vec![wave(601, vec![projectile(300, 2, 9.0)])];

    let table: SignatureTable = run_trials(&setting, &waves, ScenarioMode::Smash, 1, 10);
    let summary = table.summarize();

    assert_eq!(summary.trials, 10);
    let total: u64 = summary.rows.iter().map(|row| row.counts.total).sum();
    assert_eq!(total, 10);
    assert!(summary.rows.iter().all(|row| row.signature.states.len() == 1));
    assert_eq!(summary.waves.len(), 1);
    assert_eq!(summary.waves[0].wave, 1);
}

// =========================================================================
// Multi-wave smash rounds
// =========================================================================

#[test]
fn test_heavies_split_across_waves() {
    let setting = pool_setting(&[1, 2, 5, 6]);
    let waves = vec![
        wave(1200, vec![projectile(300, 1, 9.0), projectile(300, 5, 9.0)]),
        wave(1200, vec![fixed_fodder(400, Some(500), &[(1, 9), (2, 9)])]),
    ];
    let schedule = compile(&setting, &waves, ScenarioMode::Smash, 8).unwrap();

    let mut world = LaneWorld::new(setting.scene);
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let record = Executor::new(&setting, ScenarioMode::Smash, schedule).run(&mut world, &mut rng);

    assert_eq!(record.heavies.len(), 8);
    assert_eq!(record.heavies.iter().filter(|h| h.wave == 1).count(), 4);
    assert_eq!(record.heavies.iter().filter(|h| h.wave == 2).count(), 4);
    assert!(record
        .heavies
        .iter()
        .all(|heavy| [1, 2, 5, 6].contains(&heavy.lane)));
    assert!(record.heavies.iter().all(|h| h.wave != 2 || h.spawn_tick == 1200));
}

#[test]
fn test_fodder_removal_frees_the_cells() {
    let setting = flat_setting(&[3]);
    let waves = vec![wave(800, vec![fixed_fodder(100, Some(150), &[(1, 5), (2, 5)])])];
    let schedule = compile(&setting, &waves, ScenarioMode::Smash, 0).unwrap();

    let mut world = LaneWorld::new(setting.scene);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let record = Executor::new(&setting, ScenarioMode::Smash, schedule).run(&mut world, &mut rng);

    assert_eq!(record.actions[0].handles.len(), 2);
    assert!(record.actions[0]
        .handles
        .iter()
        .all(|handle| !world.is_valid(*handle)));
}

#[test]
fn test_dynamic_fodder_under_supply_is_not_an_error() {
    let setting = flat_setting(&[2]);
    let waves = vec![wave(
        800,
        vec![dynamic_fodder("C_POS", 200, &[(1, 9), (2, 9), (3, 9)], 3)],
    )];

    let table: SignatureTable = run_trials(&setting, &waves, ScenarioMode::Smash, 1, 3);
    assert_eq!(table.trials(), 3);
}

#[test]
fn test_freeze_cue_runs() {
    let setting = flat_setting(&[2]);
    let waves = vec![frozen_wave(
        900,
        vec![300],
        vec![fixed_card(500, PlantKind::Jalapeno, 2, 5)],
    )];

    let table: SignatureTable = run_trials(&setting, &waves, ScenarioMode::Smash, 2, 4);
    assert_eq!(table.summarize().trials, 4);
}

#[test]
fn test_roof_requires_launcher_column() {
    let roof = setting(SceneKind::Roof, vec![launcher(3, 4)]);
    let missing = vec![wave(600, vec![projectile(300, 3, 9.0)])];
    assert!(matches!(
        compile(&roof, &missing, ScenarioMode::Smash, 1),
        Err(ScheduleError::MissingLauncherColumn { .. })
    ));

    let given = vec![wave(600, vec![roof_projectile(300, 3, 9.0, 3)])];
    assert!(compile(&roof, &given, ScenarioMode::Smash, 1).is_ok());
}

// =========================================================================
// Explode rounds
// =========================================================================

#[test]
fn test_loss_table_covers_the_window() {
    let setting = flat_setting(&[1, 2, 3, 4, 5]);
    let waves = vec![wave(601, vec![]), wave(601, vec![])];

    let table: LossTable = run_trials(&setting, &waves, ScenarioMode::Explode, 0, 3);

    assert_eq!(table.trials, 3);
    assert_eq!(table.waves.len(), 2);
    for series in &table.waves {
        assert_eq!(series.start_tick, 401);
        assert_eq!(series.sums.len(), 1);
    }
    assert!(table.mean_loss(0, 401).is_some());
    assert!(table.mean_loss(0, 402).is_none());
    assert!(table.mean_loss(2, 401).is_none());
}

#[test]
fn test_loss_is_monotone_over_the_window() {
    let mut explode_wave = wave(1500, vec![]);
    explode_wave.observe_from = Some(200);
    let setting = flat_setting(&[1, 2, 3, 4, 5]);

    let table: LossTable =
        run_trials(&setting, &[explode_wave], ScenarioMode::Explode, 0, 2);
    let series = &table.waves[0];
    assert_eq!(series.sums.len(), 1101);

    let totals: Vec<f64> = (200..=1300)
        .filter_map(|tick| table.mean_loss(0, tick))
        .map(|mean| mean.total)
        .collect();
    assert_eq!(totals.len(), 1101);
    assert!(totals.windows(2).all(|pair| pair[0] <= pair[1]));
}
