use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::PgPool;

use crate::{errors::Result, models::language::Language};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait LanguageRepositoryTrait: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Language>>;
}

pub struct LanguageRepository {
    pool: PgPool,
}

impl LanguageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LanguageRepositoryTrait for LanguageRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Language>> {
        let query = "SELECT * FROM languages WHERE id = $1";

        let language = sqlx::query_as::<_, Language>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(language)
    }
}
