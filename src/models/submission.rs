use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "submission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Running,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CompilationError,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending | SubmissionStatus::Running)
    }

    /// Legal transitions: pending -> running -> terminal, plus the defensive
    /// pending -> runtime_error shortcut. Terminal states never change.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        match self {
            SubmissionStatus::Pending => {
                next == SubmissionStatus::Running || next == SubmissionStatus::RuntimeError
            }
            SubmissionStatus::Running => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Running => "running",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::WrongAnswer => "wrong_answer",
            SubmissionStatus::TimeLimitExceeded => "time_limit_exceeded",
            SubmissionStatus::MemoryLimitExceeded => "memory_limit_exceeded",
            SubmissionStatus::RuntimeError => "runtime_error",
            SubmissionStatus::CompilationError => "compilation_error",
        }
    }

    /// Whether a status name (as it appears in a published payload) is terminal.
    pub fn is_terminal_name(name: &str) -> bool {
        matches!(
            name,
            "accepted"
                | "wrong_answer"
                | "time_limit_exceeded"
                | "memory_limit_exceeded"
                | "runtime_error"
                | "compilation_error"
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub user_id: i64,
    pub problem_id: i64,
    pub language_id: i64,
    pub code: String,
    pub status: SubmissionStatus,
    pub passed: bool,
    pub passed_count: i32,
    pub total_count: i32,
    pub results: Json<Vec<TestDetail>>,
    /// When a worker claimed this row (`pending -> running`). Staleness in
    /// the recovery sweep is measured from here, not from `created_at`, so
    /// a long queue wait cannot make an actively-judged row look orphaned.
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One entry of the `results` array. A single shape covers the three record
/// kinds that can appear there: a per-test record, a `compilation_error`
/// record, and a catch-all `error` record. Hidden test cases must leave
/// `input`, `expected_output`, `actual_output` and `stderr` unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_kb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestDetail {
    pub fn compilation(output: String) -> Self {
        Self {
            compilation_error: Some(output),
            ..Default::default()
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            error: Some(message),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubmission {
    pub user_id: i64,
    pub problem_id: i64,
    pub language_id: i64,
    pub code: String,
    pub total_count: i32,
}
