pub mod benchmark;
pub mod provider;
pub mod tool;

pub use benchmark::BenchmarkAdapter;
pub use provider::{ChatMessage, Completion, CompletionRequest, Provider, ResponseSchema};
pub use tool::{Tool, ToolResult, ToolSpec};
