use twoopt::data::DataInterface;
use twoopt::generator::{ushakov, GeneratorConfig, RandomGenerator};
use twoopt::network::{network_schema, NetworkData};
use twoopt::planner::{PlannerConfig, ProcessedDataAmountMaximizationSolver};

use crate::common::assert_balanced;

#[test]
fn test_equalities_hold_on_random_data() {
    for seed in 0..5 {
        let config = GeneratorConfig {
            x_eq_upper: Some(40.0),
            entry_nodes: vec![0, 1],
            seed,
            ..GeneratorConfig::default()
        };
        let ram = RandomGenerator::new(network_schema(4, 2, 2), config)
            .unwrap()
            .generate()
            .unwrap();

        let mut solver = ProcessedDataAmountMaximizationSolver::new(ram, PlannerConfig::default()).unwrap();
        solver.plan().unwrap();

        let data = solver.data();
        let dims = data.dimensions().unwrap();
        assert_balanced(data, dims, "");

        // Capacities are respected.
        for at in data.schema().iter_variable_named("x").unwrap() {
            let x = data.data("x", &at).unwrap();
            assert!(x >= -1e-6);
            assert!(x <= data.data("psi", &at).unwrap() + 1e-6);
        }
        for at in data.schema().iter_variable_named("g").unwrap() {
            assert!(data.data("g", &at).unwrap() <= data.data("phi", &at).unwrap() + 1e-6);
            assert!(data.data("y", &at).unwrap() <= data.data("v", &at).unwrap() + 1e-6);
        }
    }
}

#[test]
fn test_ushakov_plan_processes_inflow() {
    let mut solver = ProcessedDataAmountMaximizationSolver::new(ushakov::dataset(), PlannerConfig::default()).unwrap();
    let outcome = solver.plan().unwrap();
    assert!(outcome.objective > 0.0);

    let data = NetworkData::from_provider(solver.into_provider()).unwrap();
    let dims = data.dimensions().unwrap();
    assert_balanced(&data, dims, "");

    // Node 0 can process only 2 per unit of time and environment, so most
    // of its inflow has to leave over its channels.
    let forwarded: f64 = (0..dims.nodes)
        .map(|i| data.get("x", &[("j", 0), ("i", i), ("rho", 0), ("l", 0)]).unwrap())
        .sum();
    assert!(forwarded > 0.0);
}
