//! Per-tick record of simulated operations.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use super::ops::OpKind;
use crate::types::SimulationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub t: f64,
    pub interval: usize,
    pub kind: OpKind,
    /// Named indices of the operation, `j=0,i=1,rho=0,l=0`.
    pub op: String,
    pub amount: f64,
}

/// Export records as CSV with a header row.
pub fn write_trace_csv(path: impl AsRef<Path>, records: &[TraceRecord]) -> Result<(), SimulationError> {
    let path = path.as_ref();
    let mut out = String::from("t,interval,kind,op,amount\n");
    for record in records {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{},{},{},\"{}\",{}",
            record.t,
            record.interval,
            record.kind.label(),
            record.op,
            record.amount
        );
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, out)?;
    info!(path = %path.display(), records = records.len(), "Simulation trace written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("trace.csv");
        let records = vec![
            TraceRecord {
                t: 0.0,
                interval: 0,
                kind: OpKind::Generate,
                op: "j=0,l=0,rho=0".into(),
                amount: 25.0,
            },
            TraceRecord {
                t: 1.0,
                interval: 0,
                kind: OpKind::Transfer,
                op: "i=1,j=0,l=0,rho=0".into(),
                amount: 2.5,
            },
        ];
        write_trace_csv(&path, &records).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "t,interval,kind,op,amount");
        assert_eq!(lines[1], "0,0,generate,\"j=0,l=0,rho=0\",25");
        assert!(lines[2].starts_with("1,0,transfer,"));
    }
}
