use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use twoopt::cli::{self, Cli};
use twoopt::data::{CsvDataProvider, DataProvider};
use twoopt::network::network_schema;
use twoopt::types::DataKey;

#[tokio::test]
async fn test_generate_command_covers_every_budget_index() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("schema.json");
    let output = dir.path().join("random.csv");
    let schema = network_schema(3, 2, 2);
    schema.write(&schema_path).unwrap();

    let cli = Cli::try_parse_from([
        "twoopt",
        "generate",
        "--schema",
        schema_path.to_str().unwrap(),
        "--psi-upper",
        "20",
        "--seed",
        "4",
        "--output",
        output.to_str().unwrap(),
        "--test-profile",
    ])
    .unwrap();
    cli::run(cli, Arc::new(AtomicBool::new(false))).await.unwrap();

    let data = CsvDataProvider::open(&output).unwrap();
    for variable in ["psi", "phi", "v"] {
        for at in schema.iter_variable(variable).unwrap() {
            let value = data.get(&DataKey::new(variable, at.clone()));
            assert!(value.is_some(), "{variable} {at:?} not generated");
        }
    }
    for at in schema.iter_variable("psi").unwrap() {
        let value = data.get(&DataKey::new("psi", at)).unwrap();
        assert!((0.0..20.0).contains(&value));
    }
}
