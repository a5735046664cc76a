use crate::agent::prompt::PromptBuilder;
use crate::agent::thread::{ContextThread, Step};
use crate::error::ReasoningError;
use crate::schema;
use crate::traits::{ChatMessage, CompletionRequest, Provider, ResponseSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_MAX_FORMAT_RETRIES: usize = 2;

/// Wire shape of a step as the model writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReply {
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<Value>,
    pub is_done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<Value>,
}

impl From<&Step> for StepReply {
    fn from(step: &Step) -> Self {
        Self {
            reasoning: step.reasoning.clone(),
            tool_name: step.tool_name.clone(),
            tool_args: step.tool_args.clone(),
            is_done: step.is_final,
            final_answer: step.final_answer.clone(),
        }
    }
}

impl StepReply {
    /// Applies the rules the JSON schema cannot express.
    pub fn into_step(self, ordinal: u32, answer_schema: Option<&Value>) -> Result<Step, String> {
        let tool_name = self.tool_name.filter(|name| !name.trim().is_empty());

        if self.is_done {
            if let Some(name) = tool_name {
                return Err(format!(
                    "a step with is_done=true must not request a tool (got '{name}')"
                ));
            }
            let answer = self
                .final_answer
                .filter(|a| !a.is_null())
                .ok_or_else(|| "a step with is_done=true must include final_answer".to_string())?;
            if let Some(answer_schema) = answer_schema {
                schema::validate(answer_schema, &answer)
                    .map_err(|e| format!("final_answer does not match the answer schema: {e}"))?;
            }
            return Ok(Step::finish(ordinal, self.reasoning, answer));
        }

        let tool_name =
            tool_name.ok_or_else(|| "a step with is_done=false must name a tool".to_string())?;
        let args = self
            .tool_args
            .filter(|a| !a.is_null())
            .unwrap_or_else(|| json!({}));
        Ok(Step::tool_call(ordinal, self.reasoning, tool_name, args))
    }
}

pub fn step_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "reasoning": {"type": "string"},
            "tool_name": {"type": ["string", "null"]},
            "tool_args": {"type": ["object", "null"]},
            "is_done": {"type": "boolean"},
            "final_answer": {}
        },
        "required": ["reasoning", "is_done"],
        "additionalProperties": false
    })
}

/// Schema-guided LLM calls with a bounded repair loop.
pub struct StructuredReasoner {
    provider: Arc<dyn Provider>,
    prompt: PromptBuilder,
    max_format_retries: usize,
}

impl StructuredReasoner {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            prompt: PromptBuilder::new(),
            max_format_retries: DEFAULT_MAX_FORMAT_RETRIES,
        }
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_max_format_retries(mut self, retries: usize) -> Self {
        self.max_format_retries = retries;
        self
    }

    pub fn prompt(&self) -> &PromptBuilder {
        &self.prompt
    }

    pub async fn next_step(&self, thread: &ContextThread) -> Result<Step, ReasoningError> {
        let messages = self.prompt.build_messages(thread);
        let schema = ResponseSchema::new("next_step", step_schema());
        let ordinal = thread.next_ordinal();
        let answer_schema = thread.task().answer_schema.as_ref();

        debug!(ordinal, fingerprint = %thread.fingerprint(), "Requesting next step");

        self.structured_call(messages, &schema, |value| {
            let reply: StepReply = serde_json::from_value(value).map_err(|e| e.to_string())?;
            reply.into_step(ordinal, answer_schema)
        })
        .await
    }

    /// One structured completion validated against `schema`.
    pub async fn complete_json(
        &self,
        messages: Vec<ChatMessage>,
        schema: &ResponseSchema,
    ) -> Result<Value, ReasoningError> {
        self.structured_call(messages, schema, Ok).await
    }

    async fn structured_call<T, F>(
        &self,
        mut messages: Vec<ChatMessage>,
        schema: &ResponseSchema,
        accept: F,
    ) -> Result<T, ReasoningError>
    where
        F: Fn(Value) -> Result<T, String>,
    {
        let attempts = self.max_format_retries + 1;
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            let completion = self
                .provider
                .complete(CompletionRequest {
                    messages: &messages,
                    schema,
                })
                .await
                .map_err(ReasoningError::Provider)?;

            let checked = parse_json_object(&completion.text).and_then(|value| {
                schema::validate(&schema.schema, &value).map_err(|e| e.to_string())?;
                accept(value)
            });

            match checked {
                Ok(output) => return Ok(output),
                Err(reason) => {
                    warn!(
                        schema = %schema.name,
                        attempt,
                        attempts,
                        reason = %reason,
                        "Model output rejected"
                    );
                    messages.push(ChatMessage::assistant(completion.text));
                    messages.push(ChatMessage::user(corrective_instruction(&reason, schema)));
                    last_reason = reason;
                }
            }
        }

        Err(ReasoningError::Format {
            attempts,
            reason: last_reason,
        })
    }
}

fn corrective_instruction(reason: &str, schema: &ResponseSchema) -> String {
    format!(
        "Your previous reply was rejected: {reason}\n\
         Reply again with a single JSON object matching the `{}` schema, and nothing else:\n{}",
        schema.name, schema.schema
    )
}

/// Finds the JSON object in a model reply, tolerating code fences and prose.
pub fn parse_json_object(text: &str) -> Result<Value, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("reply was empty".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Object(_) => Ok(value),
            other => Err(format!(
                "reply was a JSON {}, expected an object",
                schema::type_name(&other)
            )),
        };
    }

    extract_json_values(trimmed)
        .into_iter()
        .next()
        .ok_or_else(|| "reply did not contain a JSON object".to_string())
}

fn extract_json_values(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start
                        && let Ok(value) = serde_json::from_str::<Value>(&text[s..=i])
                    {
                        values.push(value);
                    }
                    start = None;
                }
            }
            _ => {}
        }
    }

    values
}
