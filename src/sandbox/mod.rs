use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::errors::{JudgeError, Result};

/// Exit code synthesized when the wall-clock timeout fires. Matches the
/// convention used by coreutils `timeout` and by the batch runner.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Where the working directory is mounted inside the container.
pub const MOUNT_POINT: &str = "/app";

/// Raw outcome of one sandboxed process.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub elapsed_ms: f64,
}

/// Constraints applied to every sandboxed process. These stop hostile code
/// from spinning forever, eating all memory, fork-bombing the host or
/// flooding stdout.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Seconds allowed per test case.
    pub timeout_per_test: f64,
    /// Ceiling on the whole run, all tests included (seconds).
    pub max_total_timeout: f64,
    /// Seconds allowed for compilation.
    pub compilation_timeout: f64,
    /// Container memory limit, docker syntax (e.g. "256m").
    pub memory_limit: String,
    /// Kept equal to `memory_limit` so no swap is available.
    pub memory_swap: String,
    pub cpu_limit: String,
    pub max_pids: u32,
    pub max_open_files: u32,
    pub max_stdout_bytes: usize,
    pub max_stderr_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            timeout_per_test: 2.0,
            max_total_timeout: 60.0,
            compilation_timeout: 30.0,
            memory_limit: "256m".to_string(),
            memory_swap: "256m".to_string(),
            cpu_limit: "1.0".to_string(),
            max_pids: 128,
            max_open_files: 64,
            max_stdout_bytes: 1024 * 1024,
            max_stderr_bytes: 512 * 1024,
        }
    }
}

impl ResourceLimits {
    /// Tighter limits for contest judging.
    pub fn contest() -> Self {
        Self {
            timeout_per_test: 1.0,
            max_total_timeout: 30.0,
            memory_limit: "128m".to_string(),
            memory_swap: "128m".to_string(),
            max_pids: 64,
            ..Self::default()
        }
    }

    /// Lenient limits for practice mode.
    pub fn practice() -> Self {
        Self {
            timeout_per_test: 5.0,
            max_total_timeout: 120.0,
            memory_limit: "512m".to_string(),
            memory_swap: "512m".to_string(),
            max_pids: 256,
            ..Self::default()
        }
    }

    pub fn from_profile(profile: &str) -> Self {
        match profile {
            "contest" => Self::contest(),
            "practice" => Self::practice(),
            _ => Self::default(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SandboxRunnerTrait: Send + Sync {
    /// Run `command` inside an isolated container with `work_dir` mounted at
    /// [`MOUNT_POINT`], feeding `stdin` and enforcing `timeout`. A timeout
    /// yields a synthetic exit code 124; peak memory is best-effort and
    /// reported as zero when unavailable.
    async fn run(
        &self,
        image: &str,
        work_dir: &Path,
        command: &str,
        readonly: bool,
        stdin: &str,
        timeout: Duration,
    ) -> Result<RawOutput>;
}

/// Docker-backed sandbox. Isolation comes from the container runtime:
/// no network, all capabilities dropped, no privilege escalation, and hard
/// CPU/memory/pid/fd ceilings.
pub struct DockerSandbox {
    limits: ResourceLimits,
    /// One sandbox at a time per worker process.
    slots: Semaphore,
}

impl DockerSandbox {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            slots: Semaphore::new(1),
        }
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

/// The full `docker run` argument list for one sandboxed execution.
pub fn build_docker_args(
    limits: &ResourceLimits,
    image: &str,
    work_dir: &Path,
    command: &str,
    readonly: bool,
) -> Vec<String> {
    let mount_mode = if readonly { "ro" } else { "rw" };

    vec![
        "run".into(),
        "--rm".into(),
        "-i".into(),
        "--network".into(),
        "none".into(),
        "--cpus".into(),
        limits.cpu_limit.clone(),
        "--memory".into(),
        limits.memory_limit.clone(),
        "--memory-swap".into(),
        limits.memory_swap.clone(),
        "--pids-limit".into(),
        limits.max_pids.to_string(),
        "--security-opt".into(),
        "no-new-privileges".into(),
        "--cap-drop".into(),
        "ALL".into(),
        "--ulimit".into(),
        format!("nofile={0}:{0}", limits.max_open_files),
        "-v".into(),
        format!("{}:{}:{}", work_dir.display(), MOUNT_POINT, mount_mode),
        image.into(),
        "sh".into(),
        "-c".into(),
        command.into(),
    ]
}

#[async_trait]
impl SandboxRunnerTrait for DockerSandbox {
    async fn run(
        &self,
        image: &str,
        work_dir: &Path,
        command: &str,
        readonly: bool,
        stdin: &str,
        timeout: Duration,
    ) -> Result<RawOutput> {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|e| JudgeError::SystemError(e.to_string()))?;

        let args = build_docker_args(&self.limits, image, work_dir, command, readonly);

        let mut child = Command::new("docker")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the handle on timeout must take the container's
            // init process down with it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| JudgeError::Sandbox(format!("failed to spawn docker: {e}")))?;

        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(stdin.as_bytes())
                .await
                .map_err(|e| JudgeError::Sandbox(format!("failed to write stdin: {e}")))?;
            // Close the pipe so the child sees EOF.
            drop(pipe);
        }

        let start = Instant::now();
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                Ok(RawOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code().unwrap_or(-1),
                    elapsed_ms,
                })
            }
            Ok(Err(e)) => Err(JudgeError::Sandbox(format!("failed to collect output: {e}")).into()),
            Err(_) => Ok(RawOutput {
                stdout: String::new(),
                stderr: "Time limit exceeded".to_string(),
                exit_code: TIMEOUT_EXIT_CODE,
                elapsed_ms: timeout.as_secs_f64() * 1000.0,
            }),
        }
    }
}
