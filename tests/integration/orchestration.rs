use twoopt::config::AppConfig;
use twoopt::data::{CsvDataProvider, DataProvider};
use twoopt::generator::ushakov;
use twoopt::orchestration::Orchestrated2StageSolver;
use twoopt::processor::DataProcessor;
use twoopt::storage;

#[tokio::test]
async fn test_ushakov_two_stage_writes_plan_and_results() {
    let dir = tempfile::tempdir().unwrap();
    let (data_path, _) = ushakov::write(dir.path()).unwrap();
    let config = AppConfig::test_profile();

    let mut solver = Orchestrated2StageSolver::new(
        CsvDataProvider::open(&data_path).unwrap(),
        config.orchestration.clone(),
        config.planner.clone(),
        config.ga.clone(),
        config.simulation.clone(),
    );
    let report = solver.run().await.unwrap();
    assert_eq!(report.iterations.len(), 2);
    for record in &report.iterations {
        assert!(record.planned_objective.is_finite());
        assert!(record.simulated_objective.is_finite());
    }

    // Results were synced into the file, not just kept in memory.
    let stored = CsvDataProvider::open(&data_path).unwrap();
    for variable in ["x", "y", "g", "z", "x^", "y^", "g^", "z^", "x_eq^"] {
        assert!(
            stored.entries().iter().any(|(key, _)| key.variable == variable),
            "{variable} missing from the data file"
        );
    }
    // Tuned fractions stay feasible.
    for j in 0..ushakov::NODE_COUNT {
        for l in 0..ushakov::INTERVAL_DURATIONS.len() {
            let sum: f64 = (0..ushakov::ENVIRONMENTS)
                .map(|rho| {
                    stored
                        .get(&twoopt::types::DataKey::new("m_phi", vec![j, rho, l]))
                        .unwrap_or(0.0)
                })
                .sum();
            assert!(sum <= 1.0 + 1e-9);
        }
    }

    let report_path = storage::save_report(&report, dir.path().join("reports")).unwrap();
    let loaded = storage::load_report(&report_path).unwrap().unwrap();
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.iterations, report.iterations);
}
