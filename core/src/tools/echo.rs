use crate::traits::Tool;
use async_trait::async_trait;
use serde_json::{Value, json};

/// Returns its arguments unchanged.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the given arguments unchanged. Useful for recording intermediate values"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to echo back"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        Ok(args)
    }
}
