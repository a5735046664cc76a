use crate::agent::{AgentLoop, RunResult};
use crate::task::Task;
use crate::traits::BenchmarkAdapter;
use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SUMMARY_TEXT_WIDTH: usize = 60;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Run only the task at this 1-based position.
    pub only: Option<usize>,
    /// Stop at the first failed task. Forces sequential execution.
    pub fail_fast: bool,
    pub concurrency: usize,
    /// Cancels a run between steps once it has been going this long.
    pub task_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            only: None,
            fail_fast: false,
            concurrency: 1,
            task_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTask {
    pub index: usize,
    pub task_id: String,
    pub text: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub passed: usize,
    pub failed: usize,
    pub failures: Vec<FailedTask>,
}

impl SessionSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

struct TaskReport {
    index: usize,
    task: Task,
    result: RunResult,
    submit_error: Option<anyhow::Error>,
}

/// Called once per task, after its result has been submitted.
pub type TaskObserver = Box<dyn Fn(usize, &Task, &RunResult) + Send + Sync>;

/// Runs benchmark tasks through one shared agent and submits every result.
pub struct BenchmarkSession {
    adapter: Arc<dyn BenchmarkAdapter>,
    agent: Arc<AgentLoop>,
    observer: Option<TaskObserver>,
}

impl BenchmarkSession {
    pub fn new(adapter: Arc<dyn BenchmarkAdapter>, agent: Arc<AgentLoop>) -> Self {
        Self {
            adapter,
            agent,
            observer: None,
        }
    }

    pub fn with_observer(
        mut self,
        observer: impl Fn(usize, &Task, &RunResult) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub async fn run(&self, options: &SessionOptions) -> Result<SessionSummary> {
        let tasks = self.adapter.tasks().await.context("Failed to load tasks")?;
        let selected = select_tasks(tasks, options.only)?;
        let mut summary = SessionSummary::default();
        let mut stopped_early = false;

        info!(
            tasks = selected.len(),
            concurrency = options.concurrency,
            fail_fast = options.fail_fast,
            "Benchmark session started"
        );

        if options.fail_fast || options.concurrency <= 1 {
            if options.fail_fast && options.concurrency > 1 {
                warn!("fail_fast runs tasks one at a time; ignoring concurrency");
            }
            for (index, task) in selected {
                let report = self.execute(index, task, options.task_timeout).await;
                let passed = record(&mut summary, report);
                if !passed && options.fail_fast {
                    warn!(index, "Stopping after first failure");
                    stopped_early = true;
                    break;
                }
            }
        } else {
            let mut reports: Vec<TaskReport> = stream::iter(selected)
                .map(|(index, task)| self.execute(index, task, options.task_timeout))
                .buffer_unordered(options.concurrency)
                .collect()
                .await;
            reports.sort_by_key(|r| r.index);
            for report in reports {
                record(&mut summary, report);
            }
        }

        info!(
            passed = summary.passed,
            failed = summary.failed,
            "Benchmark session finished"
        );

        if let Some(only) = options.only {
            info!(only, "Skipping session submission: only one task was run");
        } else if stopped_early {
            info!("Skipping session submission: stopped early by fail_fast");
        } else {
            self.adapter
                .finish_session(&summary)
                .await
                .context("Failed to submit session")?;
            info!("Session submitted");
        }

        Ok(summary)
    }

    async fn execute(&self, index: usize, task: Task, timeout: Option<Duration>) -> TaskReport {
        let cancel = CancellationToken::new();
        let timer = timeout.map(|limit| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                cancel.cancel();
            })
        });

        info!(index, task = %task.id, "Running task");
        let result = self.agent.run_with_cancel(task.clone(), &cancel).await;
        if let Some(timer) = timer {
            timer.abort();
        }

        let submit_error = self.adapter.submit(&task, &result).await.err();
        if let Some(e) = &submit_error {
            warn!(index, task = %task.id, error = %e, "Submission failed");
        }

        info!(
            index,
            task = %task.id,
            status = %result.state(),
            steps = result.steps_taken(),
            "Task finished"
        );
        if let Some(observer) = &self.observer {
            observer(index, &task, &result);
        }

        TaskReport {
            index,
            task,
            result,
            submit_error,
        }
    }
}

fn select_tasks(tasks: Vec<Task>, only: Option<usize>) -> Result<Vec<(usize, Task)>> {
    match only {
        Some(n) => {
            let total = tasks.len();
            let task = n
                .checked_sub(1)
                .and_then(|i| tasks.into_iter().nth(i))
                .ok_or_else(|| anyhow::anyhow!("Task {} is out of range (1..={})", n, total))?;
            Ok(vec![(n, task)])
        }
        None => Ok(tasks
            .into_iter()
            .enumerate()
            .map(|(i, task)| (i + 1, task))
            .collect()),
    }
}

fn record(summary: &mut SessionSummary, report: TaskReport) -> bool {
    let reason = match (report.result.failure(), &report.submit_error) {
        (Some(failure), _) => Some(failure.to_string()),
        (None, Some(e)) => Some(format!("submission failed: {:#}", e)),
        (None, None) => None,
    };

    match reason {
        None => {
            summary.passed += 1;
            true
        }
        Some(reason) => {
            summary.failed += 1;
            summary.failures.push(FailedTask {
                index: report.index,
                task_id: report.task.id,
                text: truncate(&report.task.text, SUMMARY_TEXT_WIDTH),
                reason,
            });
            false
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= width && line.len() == text.len() {
        return line.to_string();
    }
    let kept: String = line.chars().take(width).collect();
    format!("{}...", kept)
}
