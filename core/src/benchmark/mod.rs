pub mod file;
pub mod session;

pub use file::FileBenchmark;
pub use session::{BenchmarkSession, FailedTask, SessionOptions, SessionSummary, TaskObserver};
