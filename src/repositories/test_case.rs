use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::PgPool;

use crate::{errors::Result, models::test_case::TestCase};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TestCaseRepositoryTrait: Send + Sync {
    /// All test cases for a problem in judging order.
    async fn find_by_problem(&self, problem_id: i64) -> Result<Vec<TestCase>>;
}

pub struct TestCaseRepository {
    pool: PgPool,
}

impl TestCaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TestCaseRepositoryTrait for TestCaseRepository {
    async fn find_by_problem(&self, problem_id: i64) -> Result<Vec<TestCase>> {
        let query = r#"
            SELECT * FROM test_cases
            WHERE problem_id = $1
            ORDER BY "order" ASC
        "#;

        let test_cases = sqlx::query_as::<_, TestCase>(query)
            .bind(problem_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(test_cases)
    }
}
