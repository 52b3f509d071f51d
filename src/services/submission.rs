use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{
    cache::{JobQueueTrait, test_cases::TestCaseCacheTrait},
    errors::{Result, ServiceError},
    models::{
        submission::{CreateSubmission, Submission},
        test_case::CachedTestCase,
    },
    repositories::{
        language::LanguageRepositoryTrait, problem::ProblemRepositoryTrait,
        submission::SubmissionRepositoryTrait,
    },
};

/// Upper bound on submitted source size.
pub const MAX_CODE_BYTES: usize = 64 * 1024;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubmissionServiceTrait: Send + Sync {
    /// Validate, insert the pending row and enqueue it. Returns the new
    /// submission together with the test-case list captured at creation.
    async fn create_submission(
        &self,
        user_id: i64,
        problem_id: i64,
        language_id: i64,
        code: String,
    ) -> Result<(Submission, Vec<CachedTestCase>)>;
    async fn get_submission(&self, id: i64, user_id: i64) -> Result<Submission>;
    async fn list_submissions(
        &self,
        user_id: i64,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Submission>>;
}

pub struct SubmissionService {
    submission_repository: Arc<dyn SubmissionRepositoryTrait>,
    problem_repository: Arc<dyn ProblemRepositoryTrait>,
    language_repository: Arc<dyn LanguageRepositoryTrait>,
    test_case_cache: Arc<dyn TestCaseCacheTrait>,
    job_queue: Arc<dyn JobQueueTrait>,
}

impl SubmissionService {
    pub fn new(
        submission_repository: Arc<dyn SubmissionRepositoryTrait>,
        problem_repository: Arc<dyn ProblemRepositoryTrait>,
        language_repository: Arc<dyn LanguageRepositoryTrait>,
        test_case_cache: Arc<dyn TestCaseCacheTrait>,
        job_queue: Arc<dyn JobQueueTrait>,
    ) -> Self {
        Self {
            submission_repository,
            problem_repository,
            language_repository,
            test_case_cache,
            job_queue,
        }
    }
}

#[async_trait]
impl SubmissionServiceTrait for SubmissionService {
    async fn create_submission(
        &self,
        user_id: i64,
        problem_id: i64,
        language_id: i64,
        code: String,
    ) -> Result<(Submission, Vec<CachedTestCase>)> {
        if code.len() > MAX_CODE_BYTES {
            return Err(ServiceError::ValidationError(format!(
                "Code exceeds the {MAX_CODE_BYTES} byte limit"
            ))
            .into());
        }

        if !self.problem_repository.exists(problem_id).await? {
            return Err(ServiceError::NotFoundError("Problem not found".to_string()).into());
        }

        let language = self
            .language_repository
            .find_by_id(language_id)
            .await?
            .ok_or_else(|| ServiceError::NotFoundError("Language not found".to_string()))?;
        if !language.is_active {
            return Err(ServiceError::UnsupportedLanguage(language.slug).into());
        }

        let test_cases = self.test_case_cache.get(problem_id, false).await?;

        let submission = self
            .submission_repository
            .create(CreateSubmission {
                user_id,
                problem_id,
                language_id,
                code,
                total_count: test_cases.len() as i32,
            })
            .await?;

        // Row first, queue second. If the push fails the row stays pending
        // and the worker sweep picks it up, so the request still succeeds.
        if let Err(e) = self.job_queue.push(submission.id).await {
            tracing::warn!(
                submission_id = submission.id,
                error = %e,
                "Failed to enqueue submission, leaving it for the sweep"
            );
        }

        Ok((submission, test_cases))
    }

    async fn get_submission(&self, id: i64, user_id: i64) -> Result<Submission> {
        self.submission_repository
            .find_for_user(id, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFoundError("Submission not found".to_string()).into())
    }

    async fn list_submissions(
        &self,
        user_id: i64,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Submission>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);

        self.submission_repository
            .list_by_user(user_id, limit, offset)
            .await
    }
}
