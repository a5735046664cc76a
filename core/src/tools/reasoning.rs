use crate::agent::{StructuredReasoner, ToolRegistry};
use crate::error::ToolError;
use crate::tools::{extract_string_arg, extract_string_arg_opt};
use crate::traits::{ChatMessage, ResponseSchema, Tool};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

/// A tool whose execution is a structured LLM call with its own schema.
///
/// `plan`, `think` and `critic` are all instances of this type. They go
/// through the registry like any other tool, so the loop never treats them
/// specially.
pub struct ReasoningTool {
    name: &'static str,
    description: &'static str,
    system_prompt: &'static str,
    /// Required string argument carrying the material to reason about.
    subject: &'static str,
    /// Optional string argument that narrows the call.
    focus: &'static str,
    output: ResponseSchema,
    reasoner: Arc<StructuredReasoner>,
}

impl ReasoningTool {
    pub fn plan(reasoner: Arc<StructuredReasoner>) -> Self {
        Self {
            name: "plan",
            description: "Draft a step-by-step plan for the task before acting",
            system_prompt: "You are a planner. Break the task into concrete, ordered steps that use the available tools, and list what could go wrong.",
            subject: "task",
            focus: "constraints",
            output: ResponseSchema::new(
                "plan",
                json!({
                    "type": "object",
                    "properties": {
                        "goal": {"type": "string"},
                        "steps": {"type": "array", "items": {"type": "string"}},
                        "risks": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["goal", "steps", "risks"],
                    "additionalProperties": false
                }),
            ),
            reasoner,
        }
    }

    pub fn think(reasoner: Arc<StructuredReasoner>) -> Self {
        Self {
            name: "think",
            description: "Reflect on the current situation and verify progress before the next action",
            system_prompt: "You are a careful analyst. Extract the observations that matter, state a conclusion, and name the single best next action.",
            subject: "thoughts",
            focus: "question",
            output: ResponseSchema::new(
                "think",
                json!({
                    "type": "object",
                    "properties": {
                        "observations": {"type": "array", "items": {"type": "string"}},
                        "conclusion": {"type": "string"},
                        "next_action": {"type": "string"}
                    },
                    "required": ["observations", "conclusion", "next_action"],
                    "additionalProperties": false
                }),
            ),
            reasoner,
        }
    }

    pub fn critic(reasoner: Arc<StructuredReasoner>) -> Self {
        Self {
            name: "critic",
            description: "Critique a draft answer or action and suggest a fix",
            system_prompt: "You are a strict reviewer. Find the most important flaw in the draft, propose a concrete fix, and rate your confidence that the draft is correct as-is from 0 to 1.",
            subject: "draft",
            focus: "criteria",
            output: ResponseSchema::new(
                "critic",
                json!({
                    "type": "object",
                    "properties": {
                        "critique": {"type": "string"},
                        "suggested_fix": {"type": "string"},
                        "confidence": {"type": "number", "minimum": 0, "maximum": 1}
                    },
                    "required": ["critique", "suggested_fix", "confidence"],
                    "additionalProperties": false
                }),
            ),
            reasoner,
        }
    }

    fn build_messages(&self, subject: &str, focus: Option<&str>) -> Vec<ChatMessage> {
        let mut request = format!("{}:\n{}", self.subject, subject);
        if let Some(focus) = focus {
            request.push_str(&format!("\n\n{}:\n{}", self.focus, focus));
        }
        vec![
            ChatMessage::system(format!(
                "{}\nReply with a single JSON object matching this schema:\n{}",
                self.system_prompt, self.output.schema
            )),
            ChatMessage::user(request),
        ]
    }
}

#[async_trait]
impl Tool for ReasoningTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                (self.subject): {"type": "string"},
                (self.focus): {"type": "string"}
            },
            "required": [self.subject],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let subject = extract_string_arg(&args, self.subject)?;
        let focus = extract_string_arg_opt(&args, self.focus);

        let output = self
            .reasoner
            .complete_json(self.build_messages(&subject, focus.as_deref()), &self.output)
            .await?;

        info!(tool = self.name, output = %output, "Reasoning tool completed");
        Ok(output)
    }
}

/// Registers `plan`, `think` and `critic`, all backed by `reasoner`.
pub fn register_reasoning_tools(
    registry: &mut ToolRegistry,
    reasoner: Arc<StructuredReasoner>,
) -> Result<(), ToolError> {
    registry.register(Arc::new(ReasoningTool::plan(reasoner.clone())))?;
    registry.register(Arc::new(ReasoningTool::think(reasoner.clone())))?;
    registry.register(Arc::new(ReasoningTool::critic(reasoner)))?;
    Ok(())
}
