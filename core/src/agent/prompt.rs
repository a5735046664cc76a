use crate::agent::reasoner::StepReply;
use crate::agent::thread::{ContextThread, ThreadEntry};
use crate::traits::{ChatMessage, ToolSpec};
use serde_json::Value;
use std::fmt::Write;

const DEFAULT_INSTRUCTIONS: &str = "You are an autonomous agent solving a benchmark task step by step. \
On every turn, think about what you know so far, then either call exactly one tool or finish with a final answer.";

/// Renders a [`ContextThread`] into chat messages.
///
/// The output is a pure function of the builder and the thread, so a retry
/// sees exactly the history the previous attempt saw.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    instructions: Option<String>,
    tool_specs: Vec<ToolSpec>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_tool_specs(mut self, tool_specs: Vec<ToolSpec>) -> Self {
        self.tool_specs = tool_specs;
        self
    }

    pub fn build_system_prompt(&self, thread: &ContextThread) -> String {
        let mut parts = vec![
            self.instructions
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            self.get_step_protocol(),
        ];

        if let Some(tools) = self.get_tool_catalog() {
            parts.push(tools);
        }

        if let Some(schema) = &thread.task().answer_schema {
            parts.push(format!(
                "## Final Answer Format\n\n`final_answer` MUST conform to this JSON schema:\n{}",
                schema
            ));
        }

        parts.join("\n\n---\n\n")
    }

    fn get_step_protocol(&self) -> String {
        let mut protocol = String::new();
        protocol.push_str("## Step Protocol\n\n");
        protocol.push_str("Reply with a single JSON object and nothing else:\n\n");
        protocol.push_str("```\n{\"reasoning\": \"...\", \"tool_name\": \"name\", \"tool_args\": {...}, \"is_done\": false}\n```\n\n");
        protocol.push_str("When the task is solved, reply with `is_done: true`, no `tool_name`, and the answer in `final_answer`. ");
        protocol.push_str("Tool results, including failures, are shown after each step. ");
        protocol.push_str("If a tool fails, adjust the arguments, pick another tool, or finish.");
        protocol
    }

    fn get_tool_catalog(&self) -> Option<String> {
        if self.tool_specs.is_empty() {
            return None;
        }

        let mut catalog = String::from("## Available Tools\n\n");
        for tool in &self.tool_specs {
            let _ = writeln!(
                catalog,
                "**{}**: {}\nParameters: `{}`\n",
                tool.name, tool.description, tool.parameters
            );
        }
        Some(catalog)
    }

    fn render_task(&self, thread: &ContextThread) -> String {
        let task = thread.task();
        match &task.context {
            Some(context) => format!("Task {}:\n{}\n\nContext:\n{}", task.id, task.text, context),
            None => format!("Task {}:\n{}", task.id, task.text),
        }
    }

    fn render_entry(entry: &ThreadEntry, messages: &mut Vec<ChatMessage>) {
        let reply = StepReply::from(&entry.step);
        messages.push(ChatMessage::assistant(
            serde_json::to_string(&reply).unwrap_or_default(),
        ));

        if let Some(result) = &entry.result {
            let body = if result.ok {
                result.payload.clone().unwrap_or(Value::Null).to_string()
            } else {
                format!("ERROR: {}", result.error.as_deref().unwrap_or("unknown error"))
            };
            messages.push(ChatMessage::user(format!(
                "[Step {} result from {}]\n{}",
                entry.step.ordinal, result.tool_name, body
            )));
        }
    }

    pub fn build_messages(&self, thread: &ContextThread) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::system(self.build_system_prompt(thread)),
            ChatMessage::user(self.render_task(thread)),
        ];
        for entry in thread.entries() {
            Self::render_entry(entry, &mut messages);
        }
        messages
    }
}
