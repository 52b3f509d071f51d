use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub problem_id: i64,
    pub input: String,
    pub expected_output: String,
    pub is_hidden: bool,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

/// The shape serialized into `cache:testcases:{problem_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTestCase {
    pub id: i64,
    pub input: String,
    pub expected_output: String,
    pub order: i32,
    pub is_hidden: bool,
}

impl From<TestCase> for CachedTestCase {
    fn from(tc: TestCase) -> Self {
        Self {
            id: tc.id,
            input: tc.input,
            expected_output: tc.expected_output,
            order: tc.order,
            is_hidden: tc.is_hidden,
        }
    }
}
