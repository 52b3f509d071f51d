pub mod drivers;
pub mod languages;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;

use crate::common::text::truncate_bytes;
use crate::errors::JudgeError;
use crate::models::execution::{ExecutionResult, ExecutionStatus, TestResult};
use crate::sandbox::{MOUNT_POINT, RawOutput, ResourceLimits, SandboxRunnerTrait, TIMEOUT_EXIT_CODE};

use drivers::generate_driver;
use languages::{ExecutionStrategy, LanguageSpec, get_language};

/// Runner script copied into the work dir for batch-strategy languages.
const PYTHON_BATCH_RUNNER: &str = include_str!("scripts/python_batch_runner.py");

/// Compiler output kept on a compilation error.
const MAX_COMPILE_OUTPUT_BYTES: usize = 2000;

/// Extra wall-clock seconds granted on top of the per-test budget to cover
/// container startup.
const TOTAL_TIMEOUT_SLACK_SECONDS: f64 = 10.0;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExecutionEngineTrait: Send + Sync {
    /// Run `code` against every test input and classify the outcomes.
    /// Failures inside the engine surface as an `InternalError` result, not
    /// as an `Err` — the caller always gets per-submission semantics back.
    async fn execute<'a>(
        &'a self,
        code: &'a str,
        language_slug: &'a str,
        inputs: &'a [String],
        expected_outputs: &'a [String],
        function_name: Option<&'a str>,
    ) -> ExecutionResult;
}

/// Drives the sandbox for one submission: writes the source (plus driver
/// stub for function-call problems), compiles when the language needs it,
/// dispatches tests per the language's strategy and compares output.
pub struct ExecutionEngine {
    sandbox: Arc<dyn SandboxRunnerTrait>,
    limits: ResourceLimits,
}

/// One record of the batch runner's JSON output.
#[derive(Debug, Deserialize)]
struct BatchRecord {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    exit_code: i32,
    #[serde(default)]
    runtime_ms: f64,
    #[serde(default)]
    memory_kb: f64,
}

/// Output comparison: trimmed byte equality first, then structural JSON
/// equality so driver-wrapped problems tolerate whitespace differences like
/// `[0,1]` vs `[0, 1]`. If either side fails to parse, it is a mismatch.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    let actual = actual.trim();
    let expected = expected.trim();

    if actual == expected {
        return true;
    }

    match (
        serde_json::from_str::<serde_json::Value>(actual),
        serde_json::from_str::<serde_json::Value>(expected),
    ) {
        (Ok(a), Ok(e)) => a == e,
        _ => false,
    }
}

impl ExecutionEngine {
    pub fn new(sandbox: Arc<dyn SandboxRunnerTrait>, limits: ResourceLimits) -> Self {
        Self { sandbox, limits }
    }

    fn total_timeout(&self, test_count: usize) -> f64 {
        let calculated =
            test_count as f64 * self.limits.timeout_per_test + TOTAL_TIMEOUT_SLACK_SECONDS;
        calculated.min(self.limits.max_total_timeout)
    }

    fn write_solution(
        &self,
        work_dir: &Path,
        language: &LanguageSpec,
        code: &str,
        function_name: Option<&str>,
    ) -> Result<(), JudgeError> {
        let mut source = code.to_string();
        if let Some(name) = function_name
            && let Some(driver) = generate_driver(language.slug, name)
        {
            source.push('\n');
            source.push_str(&driver);
        }

        std::fs::write(work_dir.join(language.filename()), source)
            .map_err(|e| JudgeError::SystemError(e.to_string()))
    }

    /// Compile inside the sandbox with a writable mount. `Some(output)`
    /// means compilation failed.
    async fn compile(
        &self,
        work_dir: &Path,
        language: &LanguageSpec,
    ) -> Result<Option<String>, JudgeError> {
        let Some(compile_command) = language.compile_command else {
            return Ok(None);
        };

        let raw = self
            .sandbox
            .run(
                language.docker_image,
                work_dir,
                compile_command,
                false,
                "",
                Duration::from_secs_f64(self.limits.compilation_timeout),
            )
            .await
            .map_err(|e| JudgeError::SystemError(e.to_string()))?;

        if raw.exit_code != 0 {
            let output = if raw.stderr.is_empty() {
                if raw.stdout.is_empty() {
                    "Compilation failed".to_string()
                } else {
                    raw.stdout
                }
            } else {
                raw.stderr
            };
            return Ok(Some(truncate_bytes(&output, MAX_COMPILE_OUTPUT_BYTES)));
        }

        Ok(None)
    }

    async fn execute_tests(
        &self,
        work_dir: &Path,
        language: &LanguageSpec,
        inputs: &[String],
        expected_outputs: &[String],
        total_timeout: f64,
    ) -> Vec<TestResult> {
        match language.strategy {
            ExecutionStrategy::Batch => {
                self.execute_batch(work_dir, language, inputs, expected_outputs, total_timeout)
                    .await
            }
            ExecutionStrategy::Individual => {
                self.execute_individual(work_dir, language, inputs, expected_outputs, total_timeout)
                    .await
            }
        }
    }

    async fn execute_batch(
        &self,
        work_dir: &Path,
        language: &LanguageSpec,
        inputs: &[String],
        expected_outputs: &[String],
        total_timeout: f64,
    ) -> Vec<TestResult> {
        if let Err(e) = std::fs::write(work_dir.join("runner.py"), PYTHON_BATCH_RUNNER) {
            return self.uniform_results(inputs.len(), ExecutionStatus::InternalError, &e.to_string());
        }

        let payload = serde_json::json!({
            "test_cases": inputs,
            "timeout_per_test": self.limits.timeout_per_test,
        })
        .to_string();

        let raw = match self
            .sandbox
            .run(
                language.docker_image,
                work_dir,
                &format!("python3 {MOUNT_POINT}/runner.py"),
                true,
                &payload,
                Duration::from_secs_f64(total_timeout),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                return self.uniform_results(
                    inputs.len(),
                    ExecutionStatus::InternalError,
                    &e.to_string(),
                );
            }
        };

        if raw.exit_code == TIMEOUT_EXIT_CODE {
            return self.uniform_results(
                inputs.len(),
                ExecutionStatus::TimeLimitExceeded,
                "Total time limit exceeded",
            );
        }

        if raw.exit_code != 0 {
            let message = truncate_bytes(&raw.stderr, 500);
            return self.uniform_results(inputs.len(), ExecutionStatus::RuntimeError, &message);
        }

        match serde_json::from_str::<Vec<BatchRecord>>(&raw.stdout) {
            Ok(records) => self.classify_batch(records, expected_outputs),
            Err(_) => {
                let message = truncate_bytes(&raw.stderr, 500);
                self.uniform_results(inputs.len(), ExecutionStatus::InternalError, &message)
            }
        }
    }

    fn classify_batch(
        &self,
        records: Vec<BatchRecord>,
        expected_outputs: &[String],
    ) -> Vec<TestResult> {
        records
            .into_iter()
            .map(|record| {
                let stdout = record.stdout.trim().to_string();

                let status = if record.exit_code == TIMEOUT_EXIT_CODE {
                    ExecutionStatus::TimeLimitExceeded
                } else if record.exit_code != 0 {
                    ExecutionStatus::RuntimeError
                } else {
                    match expected_outputs.get(record.index) {
                        Some(expected) if outputs_match(&stdout, expected) => {
                            ExecutionStatus::Success
                        }
                        Some(_) => ExecutionStatus::WrongAnswer,
                        None => ExecutionStatus::Success,
                    }
                };

                TestResult {
                    test_index: record.index,
                    status,
                    stdout: truncate_bytes(&stdout, self.limits.max_stdout_bytes),
                    stderr: truncate_bytes(&record.stderr, self.limits.max_stderr_bytes),
                    exit_code: record.exit_code,
                    runtime_ms: record.runtime_ms,
                    memory_kb: record.memory_kb,
                }
            })
            .collect()
    }

    async fn execute_individual(
        &self,
        work_dir: &Path,
        language: &LanguageSpec,
        inputs: &[String],
        expected_outputs: &[String],
        total_timeout: f64,
    ) -> Vec<TestResult> {
        let mut results = Vec::with_capacity(inputs.len());
        let mut remaining = total_timeout;

        for (index, input) in inputs.iter().enumerate() {
            // Budget exhausted: report the rest without launching them.
            if remaining <= 0.0 {
                results.push(TestResult {
                    test_index: index,
                    status: ExecutionStatus::TimeLimitExceeded,
                    stdout: String::new(),
                    stderr: "Time limit exceeded".to_string(),
                    exit_code: TIMEOUT_EXIT_CODE,
                    runtime_ms: 0.0,
                    memory_kb: 0.0,
                });
                continue;
            }

            let timeout = (self.limits.timeout_per_test + 1.0).min(remaining);
            let result = self
                .run_single_test(work_dir, language, input, expected_outputs.get(index), index, timeout)
                .await;

            remaining -= result.runtime_ms / 1000.0;
            results.push(result);
        }

        results
    }

    async fn run_single_test(
        &self,
        work_dir: &Path,
        language: &LanguageSpec,
        input: &str,
        expected_output: Option<&String>,
        index: usize,
        timeout: f64,
    ) -> TestResult {
        let raw = match self
            .sandbox
            .run(
                language.docker_image,
                work_dir,
                language.run_command,
                true,
                input,
                Duration::from_secs_f64(timeout),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => RawOutput {
                stdout: String::new(),
                stderr: e.to_string(),
                exit_code: 1,
                elapsed_ms: 0.0,
            },
        };

        let stdout = raw.stdout.trim().to_string();

        let status = if raw.exit_code == TIMEOUT_EXIT_CODE {
            ExecutionStatus::TimeLimitExceeded
        } else if raw.exit_code != 0 {
            ExecutionStatus::RuntimeError
        } else {
            match expected_output {
                Some(expected) if outputs_match(&stdout, expected) => ExecutionStatus::Success,
                Some(_) => ExecutionStatus::WrongAnswer,
                None => ExecutionStatus::Success,
            }
        };

        TestResult {
            test_index: index,
            status,
            stdout: truncate_bytes(&stdout, self.limits.max_stdout_bytes),
            stderr: truncate_bytes(&raw.stderr, self.limits.max_stderr_bytes),
            exit_code: raw.exit_code,
            runtime_ms: raw.elapsed_ms,
            memory_kb: 0.0,
        }
    }

    fn uniform_results(
        &self,
        test_count: usize,
        status: ExecutionStatus,
        message: &str,
    ) -> Vec<TestResult> {
        (0..test_count)
            .map(|index| TestResult {
                test_index: index,
                status,
                stdout: String::new(),
                stderr: message.to_string(),
                exit_code: if status == ExecutionStatus::TimeLimitExceeded {
                    TIMEOUT_EXIT_CODE
                } else {
                    1
                },
                runtime_ms: 0.0,
                memory_kb: 0.0,
            })
            .collect()
    }

    /// Aggregate per-test statuses into a submission-level verdict. The most
    /// severe outcome wins: TLE over runtime error over wrong answer.
    fn build_result(&self, test_results: Vec<TestResult>, total_runtime_ms: f64) -> ExecutionResult {
        let total_count = test_results.len() as i32;
        let passed_count = test_results
            .iter()
            .filter(|r| r.status == ExecutionStatus::Success)
            .count() as i32;

        let status = if passed_count == total_count {
            ExecutionStatus::Success
        } else if test_results
            .iter()
            .any(|r| r.status == ExecutionStatus::TimeLimitExceeded)
        {
            ExecutionStatus::TimeLimitExceeded
        } else if test_results
            .iter()
            .any(|r| r.status == ExecutionStatus::MemoryLimitExceeded)
        {
            ExecutionStatus::MemoryLimitExceeded
        } else if test_results
            .iter()
            .any(|r| r.status == ExecutionStatus::RuntimeError)
        {
            ExecutionStatus::RuntimeError
        } else if test_results
            .iter()
            .any(|r| r.status == ExecutionStatus::InternalError)
        {
            ExecutionStatus::InternalError
        } else {
            ExecutionStatus::WrongAnswer
        };

        ExecutionResult {
            status,
            test_results,
            compilation_output: None,
            total_runtime_ms,
            passed_count,
            total_count,
        }
    }

    fn error_result(&self, message: &str, test_count: usize) -> ExecutionResult {
        ExecutionResult {
            status: ExecutionStatus::InternalError,
            test_results: Vec::new(),
            compilation_output: Some(message.to_string()),
            total_runtime_ms: 0.0,
            passed_count: 0,
            total_count: test_count as i32,
        }
    }
}

#[async_trait]
impl ExecutionEngineTrait for ExecutionEngine {
    async fn execute<'a>(
        &'a self,
        code: &'a str,
        language_slug: &'a str,
        inputs: &'a [String],
        expected_outputs: &'a [String],
        function_name: Option<&'a str>,
    ) -> ExecutionResult {
        let Some(language) = get_language(language_slug) else {
            return self.error_result(&format!("Unsupported language: {language_slug}"), inputs.len());
        };

        let start = Instant::now();
        let total_timeout = self.total_timeout(inputs.len());

        // Scoped work dir, removed on every exit path when the guard drops.
        let work_dir = match tempfile::Builder::new().prefix("judge-").tempdir() {
            Ok(dir) => dir,
            Err(e) => return self.error_result(&e.to_string(), inputs.len()),
        };

        if let Err(e) = self.write_solution(work_dir.path(), language, code, function_name) {
            return self.error_result(&e.to_string(), inputs.len());
        }

        if language.needs_compilation() {
            match self.compile(work_dir.path(), language).await {
                Ok(None) => {}
                Ok(Some(output)) => {
                    return ExecutionResult {
                        status: ExecutionStatus::CompilationError,
                        test_results: Vec::new(),
                        compilation_output: Some(output),
                        total_runtime_ms: start.elapsed().as_secs_f64() * 1000.0,
                        passed_count: 0,
                        total_count: inputs.len() as i32,
                    };
                }
                Err(e) => return self.error_result(&e.to_string(), inputs.len()),
            }
        }

        let test_results = self
            .execute_tests(
                work_dir.path(),
                language,
                inputs,
                expected_outputs,
                total_timeout,
            )
            .await;

        self.build_result(test_results, start.elapsed().as_secs_f64() * 1000.0)
    }
}
