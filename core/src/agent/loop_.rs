use crate::agent::prompt::PromptBuilder;
use crate::agent::reasoner::{DEFAULT_MAX_FORMAT_RETRIES, StructuredReasoner};
use crate::agent::thread::ContextThread;
use crate::agent::ToolRegistry;
use crate::config::AgentSettings;
use crate::error::FailureKind;
use crate::task::Task;
use crate::traits::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const DEFAULT_MAX_STEPS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Running,
    AwaitingTool,
    Done,
    Failed,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::AwaitingTool => write!(f, "awaiting_tool"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    /// Ordinal of the step that could not be completed.
    pub step: u32,
    pub message: String,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at step {}: {}", self.kind, self.step, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Done { answer: Value },
    Failed(RunFailure),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub task_id: String,
    pub outcome: RunOutcome,
    pub thread: ContextThread,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn state(&self) -> AgentState {
        match self.outcome {
            RunOutcome::Done { .. } => AgentState::Done,
            RunOutcome::Failed(_) => AgentState::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state() == AgentState::Done
    }

    pub fn answer(&self) -> Option<&Value> {
        match &self.outcome {
            RunOutcome::Done { answer } => Some(answer),
            RunOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match &self.outcome {
            RunOutcome::Failed(failure) => Some(failure),
            RunOutcome::Done { .. } => None,
        }
    }

    pub fn steps_taken(&self) -> usize {
        self.thread.len()
    }
}

/// Drives one task at a time through reason → dispatch → record turns.
pub struct AgentLoop {
    reasoner: StructuredReasoner,
    tool_registry: Arc<ToolRegistry>,
    max_steps: u32,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, tool_registry: Arc<ToolRegistry>) -> Self {
        let prompt = PromptBuilder::new().with_tool_specs(tool_registry.get_specs());
        Self {
            reasoner: StructuredReasoner::new(provider)
                .with_prompt(prompt)
                .with_max_format_retries(DEFAULT_MAX_FORMAT_RETRIES),
            tool_registry,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        let prompt = self.reasoner.prompt().clone().with_instructions(instructions);
        self.reasoner = self.reasoner.with_prompt(prompt);
        self
    }

    pub fn with_settings(self, settings: &AgentSettings) -> Self {
        let agent = self
            .with_max_steps(settings.max_steps)
            .with_max_format_retries(settings.max_format_retries);
        match &settings.instructions {
            Some(instructions) => agent.with_instructions(instructions.clone()),
            None => agent,
        }
    }

    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_max_format_retries(mut self, retries: usize) -> Self {
        self.reasoner = self.reasoner.with_max_format_retries(retries);
        self
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub async fn run(&self, task: Task) -> RunResult {
        self.run_with_cancel(task, &CancellationToken::new()).await
    }

    /// Runs `task` to completion. `cancel` is honoured between steps only,
    /// so an in-flight model or tool call always finishes first.
    pub async fn run_with_cancel(&self, task: Task, cancel: &CancellationToken) -> RunResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let task_id = task.id.clone();
        let mut thread = ContextThread::new(task);
        let mut state = AgentState::Running;

        info!(%run_id, task = %task_id, max_steps = self.max_steps, "Run started");

        let outcome = loop {
            let ordinal = thread.next_ordinal();

            if cancel.is_cancelled() {
                break self.fail(&mut state, FailureKind::Cancelled, ordinal, "run was cancelled");
            }

            if ordinal > self.max_steps {
                let message = format!("no final answer within {} steps", self.max_steps);
                break self.fail(&mut state, FailureKind::StepLimitExceeded, ordinal, message);
            }

            let step = match self.reasoner.next_step(&thread).await {
                Ok(step) => step,
                Err(e) => break self.fail(&mut state, FailureKind::from(&e), ordinal, e.to_string()),
            };

            if step.is_final {
                let answer = step.final_answer.clone().unwrap_or(Value::Null);
                if let Err(e) = thread.record(step, None) {
                    break self.fail(&mut state, FailureKind::Internal, ordinal, e.to_string());
                }
                self.transition(&mut state, AgentState::Done, ordinal);
                break RunOutcome::Done { answer };
            }

            let tool_name = step.tool_name.clone().unwrap_or_default();
            let args = step.tool_args.clone().unwrap_or_else(|| json!({}));

            self.transition(&mut state, AgentState::AwaitingTool, ordinal);
            debug!(%run_id, ordinal, tool = %tool_name, reasoning = %step.reasoning, "Dispatching tool");
            let result = self.tool_registry.dispatch(&tool_name, args).await;

            if let Err(e) = thread.record(step, Some(result)) {
                break self.fail(&mut state, FailureKind::Internal, ordinal, e.to_string());
            }
            self.transition(&mut state, AgentState::Running, ordinal);
        };

        match &outcome {
            RunOutcome::Done { answer } => {
                info!(%run_id, task = %task_id, steps = thread.len(), answer = %answer, "Run done");
            }
            RunOutcome::Failed(failure) => {
                error!(%run_id, task = %task_id, steps = thread.len(), %failure, "Run failed");
            }
        }

        RunResult {
            run_id,
            task_id,
            outcome,
            thread,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn transition(&self, state: &mut AgentState, next: AgentState, ordinal: u32) {
        debug!(from = %state, to = %next, ordinal, "State transition");
        *state = next;
    }

    fn fail(
        &self,
        state: &mut AgentState,
        kind: FailureKind,
        step: u32,
        message: impl Into<String>,
    ) -> RunOutcome {
        self.transition(state, AgentState::Failed, step);
        RunOutcome::Failed(RunFailure {
            kind,
            step,
            message: message.into(),
        })
    }
}
