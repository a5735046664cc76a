use crate::error::ToolError;
use crate::schema;
use crate::traits::{Tool, ToolResult, ToolSpec};
use futures_util::FutureExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name-keyed set of tools. Populated at startup, then shared read-only.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Specs ordered by tool name.
    pub fn get_specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    /// Validates `args` and runs the handler, surfacing every failure.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        schema::validate(&tool.parameters_schema(), &args).map_err(|source| {
            ToolError::SchemaValidation {
                tool: name.to_string(),
                source,
            }
        })?;

        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(e)) => Err(ToolError::Execution {
                tool: name.to_string(),
                message: format!("{e:#}"),
            }),
            Err(panic) => Err(ToolError::Execution {
                tool: name.to_string(),
                message: format!("handler panicked: {}", panic_message(panic.as_ref())),
            }),
        }
    }

    /// Like [`ToolRegistry::invoke`], but folds every error into the result.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolResult {
        match self.invoke(name, args).await {
            Ok(payload) => {
                debug!(tool = name, "Tool succeeded");
                ToolResult::success(name, payload)
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool failed");
                ToolResult::error(name, e.to_string())
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingTool {
        panic: bool,
    }

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
            if self.panic {
                panic!("kaboom");
            }
            anyhow::bail!("store is closed")
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = registry();
        let err = registry.register(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateName(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn specs_are_sorted_by_name() {
        let mut registry = registry();
        registry
            .register(Arc::new(FailingTool { panic: false }))
            .unwrap();
        let names: Vec<_> = registry.get_specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["echo", "fail"]);
    }

    #[tokio::test]
    async fn unknown_tool_leaves_registry_untouched() {
        let registry = registry();
        let err = registry.invoke("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "missing"));
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("missing"));

        let result = registry.dispatch("missing", json!({})).await;
        assert!(!result.ok);
        assert_eq!(result.tool_name, "missing");
        assert_eq!(result.error.as_deref(), Some("tool 'missing' is not registered"));
    }

    #[tokio::test]
    async fn invalid_arguments_fail_validation() {
        let registry = registry();
        let err = registry.invoke("echo", json!({"text": 5})).await.unwrap_err();
        assert!(matches!(err, ToolError::SchemaValidation { .. }));
    }

    #[tokio::test]
    async fn handler_error_becomes_failed_result() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(FailingTool { panic: false }))
            .unwrap();

        let result = registry.dispatch("fail", json!({})).await;
        assert!(!result.ok);
        assert!(result.payload.is_none());
        assert_eq!(result.error.as_deref(), Some("tool 'fail' failed: store is closed"));
    }

    #[tokio::test]
    async fn handler_panic_is_contained() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(FailingTool { panic: true }))
            .unwrap();

        let result = registry.dispatch("fail", json!({})).await;
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("handler panicked: kaboom"));
    }

    #[tokio::test]
    async fn successful_dispatch_carries_payload() {
        let result = registry().dispatch("echo", json!({"text": "hi"})).await;
        assert_eq!(result, ToolResult::success("echo", json!({"text": "hi"})));
    }
}
