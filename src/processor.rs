//! Common entry point of the pipeline stages.
//!
//! The planner, the simulation, the GA and the orchestrator all own their
//! data and mutate it in place when run.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait DataProcessor: Send {
    type Output: Send;

    /// Run the stage over the owned data, writing its results back.
    async fn run(&mut self) -> Result<Self::Output>;
}
