mod class_name;
mod sandbox_executor;

pub use class_name::detect_class_name;
pub use sandbox_executor::SandboxExecutor;

use crate::types::ExecutionRequest;

/// How a submission ended, when the runner itself did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The program ran to completion (any exit status).
    Completed { stdout: String, stderr: String },
    /// The build step exited non-zero; the program was never started.
    CompileError { diagnostics: String },
    /// The build or run step exceeded its wall-clock bound and was killed.
    TimedOut,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("failed to create scratch directory: {0}")]
    ScratchDir(#[source] std::io::Error),
    #[error("failed to write source file: {0}")]
    WriteSource(#[source] std::io::Error),
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to collect output of `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait::async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, ExecutorError>;
}
