//! Persistence of run reports.
//!
//! Orchestration reports are written as pretty JSON, one file per run,
//! named after the run id. Data files themselves go through the data
//! providers, not through here.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::orchestration::OrchestrationReport;

/// File name of a report inside the report directory.
pub fn report_file_name(report: &OrchestrationReport) -> String {
    format!("orchestration_{}.json", report.run_id)
}

/// Save a report into `dir`, creating it if needed. Returns the file path.
pub fn save_report(report: &OrchestrationReport, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let path = dir.join(report_file_name(report));
    let json = serde_json::to_string_pretty(report).context("Failed to serialise orchestration report")?;
    std::fs::write(&path, &json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    debug!(path = %path.display(), run_id = %report.run_id, "Report saved");
    Ok(path)
}

/// Load a report. Returns None if the file doesn't exist.
pub fn load_report(path: impl AsRef<Path>) -> Result<Option<OrchestrationReport>> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "No saved report found");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report from {}", path.display()))?;
    let report: OrchestrationReport = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse report from {}", path.display()))?;

    info!(
        path = %path.display(),
        run_id = %report.run_id,
        iterations = report.iterations.len(),
        "Report loaded from disk"
    );
    Ok(Some(report))
}

pub fn delete_report(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete report file {}", path.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::IterationRecord;
    use chrono::Utc;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("twoopt_test_reports_{}", Uuid::new_v4()));
        p
    }

    fn report() -> OrchestrationReport {
        let now = Utc::now();
        OrchestrationReport {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            iterations: vec![
                IterationRecord {
                    iteration: 1,
                    planned_objective: 12.5,
                    simulated_objective: 11.0,
                    best_fitness: 11.0,
                },
                IterationRecord {
                    iteration: 2,
                    planned_objective: 12.75,
                    simulated_objective: 11.5,
                    best_fitness: 11.5,
                },
            ],
            converged: false,
            cancelled: false,
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = temp_dir();
        let report = report();
        let path = save_report(&report, &dir).unwrap();
        assert!(path.ends_with(report_file_name(&report)));

        let loaded = load_report(&path).unwrap().unwrap();
        assert_eq!(loaded, report);

        delete_report(&path).unwrap();
        assert!(load_report(&path).unwrap().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_nonexistent() {
        let loaded = load_report("/tmp/twoopt_nonexistent_report_12345.json").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_corrupt() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_report(&path).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
