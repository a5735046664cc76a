pub mod agent;
pub mod benchmark;
pub mod config;
pub mod error;
pub mod providers;
pub mod schema;
pub mod task;
pub mod tools;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{AgentLoop, ContextThread, RunOutcome, RunResult, StructuredReasoner, ToolRegistry};
pub use benchmark::*;
pub use config::*;
pub use error::*;
pub use providers::*;
pub use task::Task;
pub use tools::*;
pub use traits::*;
