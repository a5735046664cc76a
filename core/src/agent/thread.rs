use crate::error::ThreadError;
use crate::task::Task;
use crate::traits::ToolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One reasoning turn produced by the structured reasoner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub ordinal: u32,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<Value>,
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<Value>,
}

impl Step {
    pub fn tool_call(
        ordinal: u32,
        reasoning: impl Into<String>,
        tool_name: impl Into<String>,
        tool_args: Value,
    ) -> Self {
        Self {
            ordinal,
            reasoning: reasoning.into(),
            tool_name: Some(tool_name.into()),
            tool_args: Some(tool_args),
            is_final: false,
            final_answer: None,
        }
    }

    pub fn finish(ordinal: u32, reasoning: impl Into<String>, answer: Value) -> Self {
        Self {
            ordinal,
            reasoning: reasoning.into(),
            tool_name: None,
            tool_args: None,
            is_final: true,
            final_answer: Some(answer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadEntry {
    pub step: Step,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
}

/// Append-only history of one run: the task, then every step and the result
/// of the tool it requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextThread {
    task: Task,
    entries: Vec<ThreadEntry>,
}

impl ContextThread {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            entries: Vec::new(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn entries(&self) -> &[ThreadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_ordinal(&self) -> u32 {
        self.entries.len() as u32 + 1
    }

    pub fn is_finished(&self) -> bool {
        self.entries.last().is_some_and(|e| e.step.is_final)
    }

    pub fn final_answer(&self) -> Option<&Value> {
        self.entries
            .last()
            .filter(|e| e.step.is_final)
            .and_then(|e| e.step.final_answer.as_ref())
    }

    /// Appends a step together with the result of the tool it requested.
    pub fn record(&mut self, step: Step, result: Option<ToolResult>) -> Result<(), ThreadError> {
        if self.is_finished() {
            return Err(ThreadError::AlreadyFinished);
        }

        let expected = self.next_ordinal();
        if step.ordinal != expected {
            return Err(ThreadError::OrdinalOutOfOrder {
                expected,
                got: step.ordinal,
            });
        }

        match (step.is_final, step.tool_name.as_deref(), result.as_ref()) {
            (true, None, None) => {}
            (true, _, _) => return Err(ThreadError::FinalWithTool),
            (false, None, _) => return Err(ThreadError::MissingTool(step.ordinal)),
            (false, Some(_), None) => return Err(ThreadError::MissingResult(step.ordinal)),
            (false, Some(requested), Some(result)) if requested != result.tool_name => {
                return Err(ThreadError::ResultMismatch {
                    expected: requested.to_string(),
                    got: result.tool_name.clone(),
                });
            }
            (false, Some(_), Some(_)) => {}
        }

        self.entries.push(ThreadEntry { step, result });
        Ok(())
    }

    /// Stable digest of the whole thread, used to correlate log lines.
    pub fn fingerprint(&self) -> String {
        let encoded = serde_json::to_string(self).unwrap_or_default();
        format!("{:x}", md5::compute(encoded.as_bytes()))
    }
}
