use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::json;

use crate::{
    cache::{
        StatusChannelTrait,
        test_cases::{ProblemCacheTrait, TestCaseCacheTrait},
    },
    common::text::{truncate_bytes, truncate_chars},
    errors::Result,
    executor::ExecutionEngineTrait,
    models::{
        execution::{ExecutionResult, ExecutionStatus},
        submission::{SubmissionStatus, TestDetail},
        test_case::CachedTestCase,
    },
    repositories::{language::LanguageRepositoryTrait, submission::SubmissionRepositoryTrait},
};

/// Characters of input/output surfaced per visible test case.
const MAX_DETAIL_CHARS: usize = 500;
/// Bytes of compiler output surfaced on a compilation error.
const MAX_COMPILE_DETAIL_BYTES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeOutcome {
    Completed,
    /// Nothing to do: row missing, already claimed, or already terminal.
    Skipped,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait JudgeServiceTrait: Send + Sync {
    /// Judge one submission end to end: claim it, run the engine, persist
    /// the terminal result and publish progress along the way.
    async fn judge_submission(&self, submission_id: i64) -> Result<JudgeOutcome>;
    /// Last-resort path for unhandled failures: park the submission as a
    /// runtime error so it still reaches a terminal state.
    async fn fail_submission(&self, submission_id: i64, message: &str) -> Result<()>;
}

pub struct JudgeService {
    submission_repository: Arc<dyn SubmissionRepositoryTrait>,
    language_repository: Arc<dyn LanguageRepositoryTrait>,
    test_case_cache: Arc<dyn TestCaseCacheTrait>,
    problem_cache: Arc<dyn ProblemCacheTrait>,
    status_channel: Arc<dyn StatusChannelTrait>,
    engine: Arc<dyn ExecutionEngineTrait>,
}

impl JudgeService {
    pub fn new(
        submission_repository: Arc<dyn SubmissionRepositoryTrait>,
        language_repository: Arc<dyn LanguageRepositoryTrait>,
        test_case_cache: Arc<dyn TestCaseCacheTrait>,
        problem_cache: Arc<dyn ProblemCacheTrait>,
        status_channel: Arc<dyn StatusChannelTrait>,
        engine: Arc<dyn ExecutionEngineTrait>,
    ) -> Self {
        Self {
            submission_repository,
            language_repository,
            test_case_cache,
            problem_cache,
            status_channel,
            engine,
        }
    }

    /// Accept a submission with no test cases.
    async fn accept_trivially(&self, submission_id: i64) -> Result<()> {
        self.submission_repository
            .finalize(
                submission_id,
                SubmissionStatus::Accepted,
                true,
                0,
                0,
                Vec::new(),
            )
            .await?;

        self.status_channel
            .publish(
                submission_id,
                &json!({
                    "submission_id": submission_id,
                    "status": SubmissionStatus::Accepted.as_str(),
                    "passed": true,
                    "passed_count": 0,
                    "total_count": 0,
                }),
            )
            .await
    }

    async fn fail_with(
        &self,
        submission_id: i64,
        total_count: i32,
        message: &str,
    ) -> Result<()> {
        self.submission_repository
            .finalize(
                submission_id,
                SubmissionStatus::RuntimeError,
                false,
                0,
                total_count,
                vec![TestDetail::error(message.to_string())],
            )
            .await?;

        self.status_channel
            .publish(
                submission_id,
                &json!({
                    "submission_id": submission_id,
                    "status": SubmissionStatus::RuntimeError.as_str(),
                    "passed": false,
                    "error": message,
                }),
            )
            .await
    }

    /// Pair each test case with its raw result and publish per-test
    /// progress while building the detail list.
    async fn build_details(
        &self,
        submission_id: i64,
        test_cases: &[CachedTestCase],
        exec: &ExecutionResult,
    ) -> Result<Vec<TestDetail>> {
        let mut details = Vec::with_capacity(exec.test_results.len());
        let mut passed_so_far = 0;

        for (index, (tc, result)) in test_cases.iter().zip(exec.test_results.iter()).enumerate() {
            let mut detail = TestDetail {
                test_case_id: Some(tc.id),
                order: Some(tc.order),
                is_hidden: Some(tc.is_hidden),
                status: Some(result.status.as_str().to_string()),
                runtime_ms: Some(result.runtime_ms),
                memory_kb: Some(result.memory_kb),
                exit_code: Some(result.exit_code),
                ..Default::default()
            };

            // I/O is only surfaced for visible test cases.
            if !tc.is_hidden {
                detail.input = Some(truncate_chars(&tc.input, MAX_DETAIL_CHARS));
                detail.expected_output =
                    Some(truncate_chars(&tc.expected_output, MAX_DETAIL_CHARS));
                detail.actual_output = Some(truncate_chars(&result.stdout, MAX_DETAIL_CHARS));
                if !result.stderr.is_empty() {
                    detail.stderr = Some(truncate_chars(&result.stderr, MAX_DETAIL_CHARS));
                }
            }

            if result.status == ExecutionStatus::Success {
                passed_so_far += 1;
            }
            details.push(detail);

            self.status_channel
                .publish(
                    submission_id,
                    &json!({
                        "type": "test_result",
                        "submission_id": submission_id,
                        "test_index": index,
                        "test_status": result.status.as_str(),
                        "runtime_ms": result.runtime_ms,
                        "passed_so_far": passed_so_far,
                        "total_so_far": details.len(),
                    }),
                )
                .await?;
        }

        Ok(details)
    }
}

#[async_trait]
impl JudgeServiceTrait for JudgeService {
    async fn judge_submission(&self, submission_id: i64) -> Result<JudgeOutcome> {
        let Some(submission) = self.submission_repository.find_by_id(submission_id).await? else {
            tracing::warn!(submission_id, "Submission not found, skipping");
            return Ok(JudgeOutcome::Skipped);
        };

        // Duplicate enqueue guard.
        if submission.status != SubmissionStatus::Pending {
            tracing::debug!(
                submission_id,
                status = submission.status.as_str(),
                "Submission already processed, skipping"
            );
            return Ok(JudgeOutcome::Skipped);
        }

        // Conditional claim: with several workers on one queue, exactly one
        // wins this update.
        if !self.submission_repository.claim_running(submission_id).await? {
            tracing::debug!(submission_id, "Lost the claim race, skipping");
            return Ok(JudgeOutcome::Skipped);
        }

        self.status_channel
            .publish(
                submission_id,
                &json!({
                    "submission_id": submission_id,
                    "status": SubmissionStatus::Running.as_str(),
                }),
            )
            .await?;

        let test_cases = self
            .test_case_cache
            .get(submission.problem_id, false)
            .await?;
        if test_cases.is_empty() {
            self.accept_trivially(submission_id).await?;
            return Ok(JudgeOutcome::Completed);
        }

        let Some(language) = self
            .language_repository
            .find_by_id(submission.language_id)
            .await?
        else {
            self.fail_with(submission_id, submission.total_count, "Language not found")
                .await?;
            return Ok(JudgeOutcome::Completed);
        };

        let function_name = self
            .problem_cache
            .get(submission.problem_id)
            .await?
            .and_then(|p| p.function_name);

        let inputs: Vec<String> = test_cases.iter().map(|tc| tc.input.clone()).collect();
        let expected: Vec<String> = test_cases
            .iter()
            .map(|tc| tc.expected_output.clone())
            .collect();

        let exec = self
            .engine
            .execute(
                &submission.code,
                &language.slug,
                &inputs,
                &expected,
                function_name.as_deref(),
            )
            .await;

        let mut results = self
            .build_details(submission_id, &test_cases, &exec)
            .await?;

        if let Some(output) = &exec.compilation_output {
            let record = match exec.status {
                ExecutionStatus::CompilationError => {
                    TestDetail::compilation(truncate_bytes(output, MAX_COMPILE_DETAIL_BYTES))
                }
                // Engine-internal failures carry their message the same way.
                _ => TestDetail::error(truncate_bytes(output, MAX_COMPILE_DETAIL_BYTES)),
            };
            results.insert(0, record);
        }

        let status = exec.status.to_submission_status();
        let passed = exec.status == ExecutionStatus::Success;

        // The engine's view of the test list is authoritative for the final
        // counters; it may differ from the count captured at creation if the
        // problem's test cases changed in between.
        self.submission_repository
            .finalize(
                submission_id,
                status,
                passed,
                exec.passed_count,
                exec.total_count,
                results,
            )
            .await?;

        self.status_channel
            .publish(
                submission_id,
                &json!({
                    "submission_id": submission_id,
                    "status": status.as_str(),
                    "passed": passed,
                    "passed_count": exec.passed_count,
                    "total_count": exec.total_count,
                }),
            )
            .await?;

        Ok(JudgeOutcome::Completed)
    }

    async fn fail_submission(&self, submission_id: i64, message: &str) -> Result<()> {
        let Some(submission) = self.submission_repository.find_by_id(submission_id).await? else {
            return Ok(());
        };
        // Never disturb a row that already reached a terminal state.
        if submission.status.is_terminal() {
            return Ok(());
        }

        self.fail_with(submission_id, submission.total_count, message)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MockStatusChannelTrait;
    use crate::cache::test_cases::{MockProblemCacheTrait, MockTestCaseCacheTrait};
    use crate::executor::MockExecutionEngineTrait;
    use crate::models::execution::TestResult;
    use crate::models::language::Language;
    use crate::models::problem::ProblemRef;
    use crate::models::submission::Submission;
    use crate::repositories::language::MockLanguageRepositoryTrait;
    use crate::repositories::submission::MockSubmissionRepositoryTrait;
    use mockall::predicate::eq;
    use std::sync::Mutex;

    fn pending_submission(id: i64) -> Submission {
        Submission {
            id,
            user_id: 1,
            problem_id: 3,
            language_id: 2,
            code: "print(input())".into(),
            status: SubmissionStatus::Pending,
            passed: false,
            passed_count: 0,
            total_count: 2,
            results: sqlx::types::Json(Vec::new()),
            claimed_at: None,
            created_at: chrono::Utc::now(),
        }
    }

    fn python() -> Language {
        Language {
            id: 2,
            slug: "python3".into(),
            name: "Python 3.12".into(),
            file_extension: ".py".into(),
            compile_command: None,
            run_command: "python3 /app/solution.py".into(),
            is_active: true,
        }
    }

    fn two_tests() -> Vec<CachedTestCase> {
        vec![
            CachedTestCase {
                id: 1,
                input: "hello\n".into(),
                expected_output: "hello".into(),
                order: 1,
                is_hidden: false,
            },
            CachedTestCase {
                id: 2,
                input: "secret\n".into(),
                expected_output: "secret".into(),
                order: 2,
                is_hidden: true,
            },
        ]
    }

    fn test_result(index: usize, status: ExecutionStatus, stdout: &str) -> TestResult {
        TestResult {
            test_index: index,
            status,
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
            runtime_ms: 5.0,
            memory_kb: 100.0,
        }
    }

    struct Mocks {
        submissions: MockSubmissionRepositoryTrait,
        languages: MockLanguageRepositoryTrait,
        test_cases: MockTestCaseCacheTrait,
        problems: MockProblemCacheTrait,
        channel: MockStatusChannelTrait,
        engine: MockExecutionEngineTrait,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                submissions: MockSubmissionRepositoryTrait::new(),
                languages: MockLanguageRepositoryTrait::new(),
                test_cases: MockTestCaseCacheTrait::new(),
                problems: MockProblemCacheTrait::new(),
                channel: MockStatusChannelTrait::new(),
                engine: MockExecutionEngineTrait::new(),
            }
        }

        fn into_service(self) -> JudgeService {
            JudgeService::new(
                Arc::new(self.submissions),
                Arc::new(self.languages),
                Arc::new(self.test_cases),
                Arc::new(self.problems),
                Arc::new(self.channel),
                Arc::new(self.engine),
            )
        }
    }

    /// Collects every published payload for later assertions.
    fn record_publishes(channel: &mut MockStatusChannelTrait) -> Arc<Mutex<Vec<serde_json::Value>>> {
        let published = Arc::new(Mutex::new(Vec::new()));
        let sink = published.clone();
        channel.expect_publish().returning(move |_, payload| {
            sink.lock().unwrap().push(payload.clone());
            Ok(())
        });
        published
    }

    #[tokio::test]
    async fn accepted_run_persists_and_publishes_in_order() {
        let mut mocks = Mocks::new();
        let published = record_publishes(&mut mocks.channel);

        mocks
            .submissions
            .expect_find_by_id()
            .with(eq(11))
            .returning(|id| Ok(Some(pending_submission(id))));
        mocks
            .submissions
            .expect_claim_running()
            .with(eq(11))
            .returning(|_| Ok(true));
        mocks
            .test_cases
            .expect_get()
            .returning(|_, _| Ok(two_tests()));
        mocks
            .languages
            .expect_find_by_id()
            .returning(|_| Ok(Some(python())));
        mocks
            .problems
            .expect_get()
            .returning(|_| Ok(Some(ProblemRef { id: 3, function_name: None })));
        mocks.engine.expect_execute().returning(|_, _, _, _, _| {
            ExecutionResult {
                status: ExecutionStatus::Success,
                test_results: vec![
                    test_result(0, ExecutionStatus::Success, "hello"),
                    test_result(1, ExecutionStatus::Success, "secret"),
                ],
                compilation_output: None,
                total_runtime_ms: 12.0,
                passed_count: 2,
                total_count: 2,
            }
        });
        mocks
            .submissions
            .expect_finalize()
            .withf(|id, status, passed, passed_count, total_count, results| {
                *id == 11
                    && *status == SubmissionStatus::Accepted
                    && *passed
                    && *passed_count == 2
                    && *total_count == 2
                    && results.len() == 2
                    // Visible case carries its I/O, the hidden one must not.
                    && results[0].input.is_some()
                    && results[1].input.is_none()
                    && results[1].actual_output.is_none()
            })
            .times(1)
            .returning(|_, _, _, _, _, _| Ok(()));

        let service = mocks.into_service();
        let outcome = service.judge_submission(11).await.unwrap();
        assert_eq!(outcome, JudgeOutcome::Completed);

        let events = published.lock().unwrap();
        // running, one event per test, terminal.
        assert_eq!(events.len(), 4);
        assert_eq!(events[0]["status"], "running");
        assert_eq!(events[1]["type"], "test_result");
        assert_eq!(events[1]["test_index"], 0);
        assert_eq!(events[2]["test_index"], 1);
        assert_eq!(events[2]["passed_so_far"], 2);
        assert_eq!(events[3]["status"], "accepted");
        assert_eq!(events[3]["passed"], true);
    }

    #[tokio::test]
    async fn non_pending_submission_is_skipped() {
        let mut mocks = Mocks::new();
        mocks.submissions.expect_find_by_id().returning(|id| {
            let mut s = pending_submission(id);
            s.status = SubmissionStatus::Accepted;
            Ok(Some(s))
        });
        mocks.submissions.expect_claim_running().never();
        mocks.channel.expect_publish().never();

        let service = mocks.into_service();
        assert_eq!(
            service.judge_submission(11).await.unwrap(),
            JudgeOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn missing_submission_is_skipped() {
        let mut mocks = Mocks::new();
        mocks.submissions.expect_find_by_id().returning(|_| Ok(None));
        mocks.channel.expect_publish().never();

        let service = mocks.into_service();
        assert_eq!(
            service.judge_submission(404).await.unwrap(),
            JudgeOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn losing_the_claim_race_skips_without_publishing() {
        let mut mocks = Mocks::new();
        mocks
            .submissions
            .expect_find_by_id()
            .returning(|id| Ok(Some(pending_submission(id))));
        mocks
            .submissions
            .expect_claim_running()
            .returning(|_| Ok(false));
        mocks.channel.expect_publish().never();

        let service = mocks.into_service();
        assert_eq!(
            service.judge_submission(11).await.unwrap(),
            JudgeOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn no_test_cases_accepts_trivially() {
        let mut mocks = Mocks::new();
        let published = record_publishes(&mut mocks.channel);

        mocks
            .submissions
            .expect_find_by_id()
            .returning(|id| Ok(Some(pending_submission(id))));
        mocks
            .submissions
            .expect_claim_running()
            .returning(|_| Ok(true));
        mocks.test_cases.expect_get().returning(|_, _| Ok(vec![]));
        mocks
            .submissions
            .expect_finalize()
            .withf(|_, status, passed, passed_count, total_count, _| {
                *status == SubmissionStatus::Accepted
                    && *passed
                    && *passed_count == 0
                    && *total_count == 0
            })
            .times(1)
            .returning(|_, _, _, _, _, _| Ok(()));

        let service = mocks.into_service();
        assert_eq!(
            service.judge_submission(11).await.unwrap(),
            JudgeOutcome::Completed
        );

        let events = published.lock().unwrap();
        assert_eq!(events.last().unwrap()["status"], "accepted");
        assert_eq!(events.last().unwrap()["total_count"], 0);
    }

    #[tokio::test]
    async fn compilation_error_prepends_the_compiler_output() {
        let mut mocks = Mocks::new();
        let _published = record_publishes(&mut mocks.channel);

        mocks
            .submissions
            .expect_find_by_id()
            .returning(|id| Ok(Some(pending_submission(id))));
        mocks
            .submissions
            .expect_claim_running()
            .returning(|_| Ok(true));
        mocks
            .test_cases
            .expect_get()
            .returning(|_, _| Ok(two_tests()));
        mocks
            .languages
            .expect_find_by_id()
            .returning(|_| Ok(Some(python())));
        mocks
            .problems
            .expect_get()
            .returning(|_| Ok(None));
        mocks.engine.expect_execute().returning(|_, _, _, _, _| {
            ExecutionResult {
                status: ExecutionStatus::CompilationError,
                test_results: Vec::new(),
                compilation_output: Some("error: ';' expected".to_string()),
                total_runtime_ms: 80.0,
                passed_count: 0,
                total_count: 2,
            }
        });
        mocks
            .submissions
            .expect_finalize()
            .withf(|_, status, passed, _, _, results| {
                *status == SubmissionStatus::CompilationError
                    && !*passed
                    && results[0]
                        .compilation_error
                        .as_deref()
                        .unwrap()
                        .contains("';' expected")
            })
            .times(1)
            .returning(|_, _, _, _, _, _| Ok(()));

        let service = mocks.into_service();
        assert_eq!(
            service.judge_submission(11).await.unwrap(),
            JudgeOutcome::Completed
        );
    }

    #[tokio::test]
    async fn wrong_answer_counts_partial_passes() {
        let mut mocks = Mocks::new();
        let published = record_publishes(&mut mocks.channel);

        mocks
            .submissions
            .expect_find_by_id()
            .returning(|id| Ok(Some(pending_submission(id))));
        mocks
            .submissions
            .expect_claim_running()
            .returning(|_| Ok(true));
        mocks
            .test_cases
            .expect_get()
            .returning(|_, _| Ok(two_tests()));
        mocks
            .languages
            .expect_find_by_id()
            .returning(|_| Ok(Some(python())));
        mocks.problems.expect_get().returning(|_| Ok(None));
        mocks.engine.expect_execute().returning(|_, _, _, _, _| {
            ExecutionResult {
                status: ExecutionStatus::WrongAnswer,
                test_results: vec![
                    test_result(0, ExecutionStatus::WrongAnswer, "nope"),
                    test_result(1, ExecutionStatus::Success, "secret"),
                ],
                compilation_output: None,
                total_runtime_ms: 10.0,
                passed_count: 1,
                total_count: 2,
            }
        });
        mocks
            .submissions
            .expect_finalize()
            .withf(|_, status, passed, passed_count, total_count, _| {
                *status == SubmissionStatus::WrongAnswer
                    && !*passed
                    && *passed_count == 1
                    && *total_count == 2
            })
            .times(1)
            .returning(|_, _, _, _, _, _| Ok(()));

        let service = mocks.into_service();
        service.judge_submission(11).await.unwrap();

        let events = published.lock().unwrap();
        assert_eq!(events.last().unwrap()["status"], "wrong_answer");
        assert_eq!(events.last().unwrap()["passed_count"], 1);
    }

    #[tokio::test]
    async fn fail_submission_leaves_terminal_rows_alone() {
        let mut mocks = Mocks::new();
        mocks.submissions.expect_find_by_id().returning(|id| {
            let mut s = pending_submission(id);
            s.status = SubmissionStatus::Accepted;
            Ok(Some(s))
        });
        mocks.submissions.expect_finalize().never();
        mocks.channel.expect_publish().never();

        let service = mocks.into_service();
        service.fail_submission(11, "boom").await.unwrap();
    }

    #[tokio::test]
    async fn fail_submission_parks_non_terminal_rows_as_runtime_error() {
        let mut mocks = Mocks::new();
        let published = record_publishes(&mut mocks.channel);

        mocks.submissions.expect_find_by_id().returning(|id| {
            let mut s = pending_submission(id);
            s.status = SubmissionStatus::Running;
            Ok(Some(s))
        });
        mocks
            .submissions
            .expect_finalize()
            .withf(|_, status, _, _, _, results| {
                *status == SubmissionStatus::RuntimeError
                    && results.len() == 1
                    && results[0].error.as_deref() == Some("engine exploded")
            })
            .times(1)
            .returning(|_, _, _, _, _, _| Ok(()));

        let service = mocks.into_service();
        service.fail_submission(11, "engine exploded").await.unwrap();

        let events = published.lock().unwrap();
        assert_eq!(events.last().unwrap()["status"], "runtime_error");
    }
}
