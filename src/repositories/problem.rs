use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::PgPool;

use crate::{errors::Result, models::problem::ProblemRef};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProblemRepositoryTrait: Send + Sync {
    async fn exists(&self, id: i64) -> Result<bool>;
    async fn find_ref(&self, id: i64) -> Result<Option<ProblemRef>>;
}

pub struct ProblemRepository {
    pool: PgPool,
}

impl ProblemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProblemRepositoryTrait for ProblemRepository {
    async fn exists(&self, id: i64) -> Result<bool> {
        let query = "SELECT EXISTS(SELECT 1 FROM problems WHERE id = $1)";

        let exists: (bool,) = sqlx::query_as(query)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists.0)
    }

    async fn find_ref(&self, id: i64) -> Result<Option<ProblemRef>> {
        let query = "SELECT id, function_name FROM problems WHERE id = $1";

        let problem = sqlx::query_as::<_, ProblemRef>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(problem)
    }
}
