use twoopt::data::DataInterface;
use twoopt::generator::ushakov;
use twoopt::network::NetworkData;
use twoopt::planner::{PlannerConfig, ProcessedDataAmountMaximizationSolver};
use twoopt::simulation::{NetworkDataFlow, NoiseModel, SimulationConfig};

use crate::common::assert_balanced;

fn planned_ushakov() -> twoopt::data::RamDataProvider {
    let mut solver = ProcessedDataAmountMaximizationSolver::new(ushakov::dataset(), PlannerConfig::default()).unwrap();
    solver.plan().unwrap();
    solver.into_provider()
}

#[test]
fn test_simulated_results_balance() {
    for noise in [NoiseModel::None, NoiseModel::Gauss] {
        let config = SimulationConfig {
            noise,
            seed: 11,
            ..SimulationConfig::default()
        };
        let mut flow = NetworkDataFlow::new(planned_ushakov(), config).unwrap();
        let report = flow.simulate().unwrap();
        assert_eq!(report.ticks, 7);

        let data = NetworkData::from_provider(flow.into_provider()).unwrap();
        let dims = data.dimensions().unwrap();
        assert_balanced(&data, dims, "^");

        let inflow: f64 = ushakov::INFLOW.iter().map(|(_, _, _, amount)| amount).sum();
        assert!(report.generated <= inflow + 1e-6);
        assert!((report.processed + report.dropped + report.stored - report.generated).abs() < 1e-6);
    }
}

#[test]
fn test_noise_free_run_is_deterministic() {
    let run = || {
        let mut flow = NetworkDataFlow::new(planned_ushakov(), SimulationConfig::default()).unwrap();
        flow.simulate().unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_trace_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.csv");
    let mut flow = NetworkDataFlow::new(planned_ushakov(), SimulationConfig::default())
        .unwrap()
        .with_trace_path(&path);
    let report = flow.simulate().unwrap();
    assert!(!report.trace.is_empty());

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written.lines().count(), report.trace.len() + 1);
    let data = flow.data();
    assert!(data.get("x_eq^", &[("j", 0), ("rho", 0), ("l", 0)]).unwrap() > 0.0);
}
