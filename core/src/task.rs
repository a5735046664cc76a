use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One benchmark problem instance. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    /// JSON schema the final answer must conform to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_schema: Option<Value>,
    /// Extra structured input shown to the model alongside `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl Task {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            answer_schema: None,
            context: None,
        }
    }

    pub fn with_answer_schema(mut self, schema: Value) -> Self {
        self.answer_schema = Some(schema);
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_fields_default_when_absent() {
        let task: Task = serde_json::from_str(r#"{"id": "t1", "text": "hi"}"#).unwrap();
        assert_eq!(task, Task::new("t1", "hi"));
    }

    #[test]
    fn skips_empty_optionals_when_serialized() {
        let value = serde_json::to_value(Task::new("t1", "hi")).unwrap();
        assert_eq!(value, json!({"id": "t1", "text": "hi"}));
    }
}
