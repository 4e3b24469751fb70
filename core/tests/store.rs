use runway_core::{
    analysis::{assess, QuestionCategory, RiskFacts},
    config::ForecastConfig,
    engine::{new_run_id, ForecastEngine},
    history::read_financials,
    store::ForecastStore,
};

fn store() -> ForecastStore {
    let store = ForecastStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

#[test]
fn runs_are_recorded_with_their_seed() {
    let store = store();
    let run_id = new_run_id();
    store.insert_run(&run_id, 0xFFFF_FFFF_FFFF_FFFF, 10_000, "0.1.0-test").expect("insert run");

    assert_eq!(store.run_count().expect("count"), 1);
    assert_eq!(store.run_seed(&run_id).expect("seed"), Some(u64::MAX));
    assert_eq!(store.run_seed("missing").expect("seed"), None);
}

#[test]
fn run_ids_are_unique() {
    assert_ne!(new_run_id(), new_run_id());
}

#[test]
fn summary_and_facts_round_trip() {
    let rows = read_financials(include_str!("fixtures/quarterly.csv").as_bytes(), "fixture")
        .expect("fixture parses");
    let config = ForecastConfig::default_test();
    let engine = ForecastEngine::new(new_run_id(), config.clone()).expect("engine");
    let analysis = engine.analyze(&rows).expect("analysis runs");

    let store = store();
    store
        .insert_run(&analysis.run_id, config.seed, config.simulation_count, "0.1.0-test")
        .expect("insert run");
    store.save_summary(&analysis.run_id, &analysis.summary).expect("save summary");

    let loaded = store
        .load_summary(&analysis.run_id)
        .expect("load summary")
        .expect("summary present");
    assert_eq!(loaded.anchor_period, analysis.summary.anchor_period);
    assert_eq!(loaded.num_simulations, analysis.summary.num_simulations);
    assert_eq!(loaded.hiring_parameters.rules, analysis.summary.hiring_parameters.rules);
    assert!((loaded.cash.median - analysis.summary.cash.median).abs() < 1e-6);
    assert!((loaded.probability_should_hire - analysis.summary.probability_should_hire).abs() < 1e-12);

    for category in [QuestionCategory::Cash, QuestionCategory::Margin] {
        let facts = assess(category, &analysis.batch, &rows, None);
        store.save_facts(&analysis.run_id, category, &facts).expect("save facts");
    }
    let stored = store.facts_for_run(&analysis.run_id).expect("load facts");
    assert_eq!(stored.len(), 2);
    assert!(matches!(stored[0].facts, RiskFacts::Cash { .. }));
    assert!(matches!(stored[1].facts, RiskFacts::Margin { .. }));
}

#[test]
fn summary_for_unknown_run_is_none() {
    assert!(store().load_summary("no-such-run").expect("query").is_none());
}

#[test]
fn facts_require_a_recorded_run() {
    let rows = read_financials(include_str!("fixtures/quarterly.csv").as_bytes(), "fixture")
        .expect("fixture parses");
    let engine = ForecastEngine::new("orphan".into(), ForecastConfig::default_test()).expect("engine");
    let analysis = engine.analyze(&rows).expect("analysis runs");
    let facts = assess(QuestionCategory::General, &analysis.batch, &rows, None);

    let result = store().save_facts("orphan", QuestionCategory::General, &facts);
    assert!(result.is_err(), "foreign key on run_id must hold");
}
