pub mod loop_;
pub mod prompt;
pub mod reasoner;
pub mod registry;
pub mod thread;

pub use loop_::{AgentLoop, AgentState, RunFailure, RunOutcome, RunResult};
pub use prompt::PromptBuilder;
pub use reasoner::{StepReply, StructuredReasoner};
pub use registry::ToolRegistry;
pub use thread::{ContextThread, Step, ThreadEntry};
