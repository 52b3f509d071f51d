use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::PgPool;

use crate::{
    errors::Result,
    models::submission::{CreateSubmission, Submission, SubmissionStatus, TestDetail},
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubmissionRepositoryTrait: Send + Sync {
    async fn create(&self, submission: CreateSubmission) -> Result<Submission>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Submission>>;
    async fn find_for_user(&self, id: i64, user_id: i64) -> Result<Option<Submission>>;
    async fn list_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Submission>>;
    /// Conditional `pending -> running` claim, stamping `claimed_at`.
    /// Returns false when another worker got there first (or the row is
    /// already terminal).
    async fn claim_running(&self, id: i64) -> Result<bool>;
    /// Write the terminal outcome in one statement. Rows already terminal
    /// are left untouched.
    async fn finalize(
        &self,
        id: i64,
        status: SubmissionStatus,
        passed: bool,
        passed_count: i32,
        total_count: i32,
        results: Vec<TestDetail>,
    ) -> Result<()>;
    /// Reset `running` rows whose claim is older than the threshold back to
    /// `pending`, returning their ids so the caller can re-enqueue them.
    async fn reset_stale_running(&self, older_than_minutes: i64) -> Result<Vec<i64>>;
    /// `pending` rows older than the threshold, candidates for re-enqueue
    /// after a lost queue push.
    async fn stuck_pending(&self, older_than_minutes: i64) -> Result<Vec<i64>>;
}

pub struct SubmissionRepository {
    pool: PgPool,
}

impl SubmissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionRepositoryTrait for SubmissionRepository {
    async fn create(&self, submission: CreateSubmission) -> Result<Submission> {
        let query = r#"
            INSERT INTO submissions (user_id, problem_id, language_id, code, status, total_count)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING id, user_id, problem_id, language_id, code, status,
                      passed, passed_count, total_count, results, claimed_at, created_at
        "#;

        let submission = sqlx::query_as::<_, Submission>(query)
            .bind(submission.user_id)
            .bind(submission.problem_id)
            .bind(submission.language_id)
            .bind(&submission.code)
            .bind(submission.total_count)
            .fetch_one(&self.pool)
            .await?;

        Ok(submission)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Submission>> {
        let query = "SELECT * FROM submissions WHERE id = $1";

        let submission = sqlx::query_as::<_, Submission>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(submission)
    }

    async fn find_for_user(&self, id: i64, user_id: i64) -> Result<Option<Submission>> {
        let query = "SELECT * FROM submissions WHERE id = $1 AND user_id = $2";

        let submission = sqlx::query_as::<_, Submission>(query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(submission)
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Submission>> {
        let query = r#"
            SELECT * FROM submissions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
        "#;

        let submissions = sqlx::query_as::<_, Submission>(query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(submissions)
    }

    async fn claim_running(&self, id: i64) -> Result<bool> {
        let query = r#"
            UPDATE submissions
            SET status = 'running', claimed_at = now()
            WHERE id = $1 AND status = 'pending'
        "#;

        let result = sqlx::query(query).bind(id).execute(&self.pool).await?;

        Ok(result.rows_affected() == 1)
    }

    async fn finalize(
        &self,
        id: i64,
        status: SubmissionStatus,
        passed: bool,
        passed_count: i32,
        total_count: i32,
        results: Vec<TestDetail>,
    ) -> Result<()> {
        // Terminal rows are immutable; the status filter makes a late or
        // duplicate finalize a no-op.
        let query = r#"
            UPDATE submissions
            SET status = $2,
                passed = $3,
                passed_count = $4,
                total_count = $5,
                results = $6
            WHERE id = $1 AND status IN ('pending', 'running')
        "#;

        sqlx::query(query)
            .bind(id)
            .bind(status)
            .bind(passed)
            .bind(passed_count)
            .bind(total_count)
            .bind(sqlx::types::Json(results))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn reset_stale_running(&self, older_than_minutes: i64) -> Result<Vec<i64>> {
        // Staleness is time since the claim. A row that waited out a queue
        // backlog as pending and was only just claimed must not be yanked
        // away from its worker.
        let query = r#"
            UPDATE submissions
            SET status = 'pending', claimed_at = NULL
            WHERE status = 'running'
              AND claimed_at IS NOT NULL
              AND claimed_at < now() - make_interval(mins => $1::int)
            RETURNING id
        "#;

        let rows: Vec<(i64,)> = sqlx::query_as(query)
            .bind(older_than_minutes)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn stuck_pending(&self, older_than_minutes: i64) -> Result<Vec<i64>> {
        let query = r#"
            SELECT id FROM submissions
            WHERE status = 'pending'
              AND created_at < now() - make_interval(mins => $1::int)
            ORDER BY created_at ASC
        "#;

        let rows: Vec<(i64,)> = sqlx::query_as(query)
            .bind(older_than_minutes)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
