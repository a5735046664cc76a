use crate::agent::RunResult;
use crate::benchmark::SessionSummary;
use crate::task::Task;
use async_trait::async_trait;

/// Benchmark platform boundary: supplies tasks and accepts results.
#[async_trait]
pub trait BenchmarkAdapter: Send + Sync {
    async fn tasks(&self) -> anyhow::Result<Vec<Task>>;

    async fn submit(&self, task: &Task, result: &RunResult) -> anyhow::Result<()>;

    /// Closes out a full run. Not called for partial runs.
    async fn finish_session(&self, _summary: &SessionSummary) -> anyhow::Result<()> {
        Ok(())
    }
}
