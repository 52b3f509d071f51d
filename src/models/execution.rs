use serde::{Deserialize, Serialize};

use crate::models::submission::SubmissionStatus;

/// Outcome of running user code, as reported by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CompilationError,
    InternalError,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::WrongAnswer => "wrong_answer",
            ExecutionStatus::TimeLimitExceeded => "time_limit_exceeded",
            ExecutionStatus::MemoryLimitExceeded => "memory_limit_exceeded",
            ExecutionStatus::RuntimeError => "runtime_error",
            ExecutionStatus::CompilationError => "compilation_error",
            ExecutionStatus::InternalError => "internal_error",
        }
    }

    /// Engine status -> submission status. An engine-internal failure is
    /// surfaced to the user as a runtime error.
    pub fn to_submission_status(self) -> SubmissionStatus {
        match self {
            ExecutionStatus::Success => SubmissionStatus::Accepted,
            ExecutionStatus::WrongAnswer => SubmissionStatus::WrongAnswer,
            ExecutionStatus::TimeLimitExceeded => SubmissionStatus::TimeLimitExceeded,
            ExecutionStatus::MemoryLimitExceeded => SubmissionStatus::MemoryLimitExceeded,
            ExecutionStatus::RuntimeError => SubmissionStatus::RuntimeError,
            ExecutionStatus::CompilationError => SubmissionStatus::CompilationError,
            ExecutionStatus::InternalError => SubmissionStatus::RuntimeError,
        }
    }
}

/// Result of one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_index: usize,
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub runtime_ms: f64,
    pub memory_kb: f64,
}

/// Aggregated result of a full engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub test_results: Vec<TestResult>,
    pub compilation_output: Option<String>,
    pub total_runtime_ms: f64,
    pub passed_count: i32,
    pub total_count: i32,
}

impl ExecutionResult {
    pub fn all_passed(&self) -> bool {
        self.passed_count == self.total_count
    }
}
