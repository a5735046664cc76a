use crate::schema::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{0}' is already registered")]
    DuplicateName(String),

    #[error("tool '{0}' is not registered")]
    UnknownTool(String),

    #[error("invalid arguments for tool '{tool}': {source}")]
    SchemaValidation {
        tool: String,
        #[source]
        source: SchemaError,
    },

    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },
}

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("model output was invalid after {attempts} attempts: {reason}")]
    Format { attempts: usize, reason: String },

    #[error("provider error: {0}")]
    Provider(#[source] anyhow::Error),
}

/// Append-only invariant violations on a context thread.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadError {
    #[error("expected step ordinal {expected}, got {got}")]
    OrdinalOutOfOrder { expected: u32, got: u32 },

    #[error("thread is already finished")]
    AlreadyFinished,

    #[error("final step must not request a tool or carry a tool result")]
    FinalWithTool,

    #[error("step {0} requests no tool and is not final")]
    MissingTool(u32),

    #[error("step {0} requested a tool but has no result")]
    MissingResult(u32),

    #[error("tool result for '{got}' does not match requested tool '{expected}'")]
    ResultMismatch { expected: String, got: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ReasoningFormat,
    Provider,
    StepLimitExceeded,
    Cancelled,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReasoningFormat => write!(f, "reasoning_format"),
            Self::Provider => write!(f, "provider"),
            Self::StepLimitExceeded => write!(f, "step_limit_exceeded"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl From<&ReasoningError> for FailureKind {
    fn from(err: &ReasoningError) -> Self {
        match err {
            ReasoningError::Format { .. } => Self::ReasoningFormat,
            ReasoningError::Provider(_) => Self::Provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_messages_name_the_tool() {
        assert_eq!(
            ToolError::UnknownTool("nope".into()).to_string(),
            "tool 'nope' is not registered"
        );
        let err = ToolError::Execution {
            tool: "echo".into(),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "tool 'echo' failed: boom");
    }

    #[test]
    fn failure_kind_from_reasoning_error() {
        let err = ReasoningError::Format {
            attempts: 3,
            reason: "bad".into(),
        };
        assert_eq!(FailureKind::from(&err), FailureKind::ReasoningFormat);
        assert_eq!(FailureKind::StepLimitExceeded.to_string(), "step_limit_exceeded");
    }
}
