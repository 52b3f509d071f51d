use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use judge_server::{
    app,
    cache::{ProblemCache, TestCaseCache, redis::RedisStore},
    common::config::Config,
    errors::Result,
    executor::ExecutionEngine,
    repositories::{
        language::LanguageRepository, problem::ProblemRepository,
        submission::SubmissionRepository, test_case::TestCaseRepository,
    },
    sandbox::{DockerSandbox, ResourceLimits},
    services::judge::JudgeService,
    worker::JudgeWorker,
};

/// Judge worker: consumes submission ids from the shared queue and judges
/// them in sandboxed containers. Run as many instances as the host allows.
#[derive(Parser, Debug)]
#[command(name = "worker")]
struct Args {
    /// Identifier used in logs; defaults to worker-<pid>.
    #[arg(long)]
    worker_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    app::setup_tracing();

    let args = Args::parse();
    let worker_id = args
        .worker_id
        .unwrap_or_else(|| format!("worker-{}", std::process::id()));

    let config = Config::from_env()?;
    let pool = app::setup_database(&config).await?;
    let store = Arc::new(RedisStore::connect(&config.redis_url).await?);

    let submission_repository = Arc::new(SubmissionRepository::new(pool.clone()));
    let problem_repository = Arc::new(ProblemRepository::new(pool.clone()));
    let language_repository = Arc::new(LanguageRepository::new(pool.clone()));
    let test_case_repository = Arc::new(TestCaseRepository::new(pool));

    let test_case_cache = Arc::new(TestCaseCache::new(store.clone(), test_case_repository));
    let problem_cache = Arc::new(ProblemCache::new(store.clone(), problem_repository));

    let limits = ResourceLimits::from_profile(&config.judge_limits);
    let sandbox = Arc::new(DockerSandbox::new(limits.clone()));
    let engine = Arc::new(ExecutionEngine::new(sandbox, limits));

    let judge_service = Arc::new(JudgeService::new(
        submission_repository.clone(),
        language_repository,
        test_case_cache,
        problem_cache,
        store.clone(),
        engine,
    ));

    // SIGINT/SIGTERM finish the current job; the bounded queue pop keeps
    // shutdown latency within one pop timeout.
    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_signal_listener(shutdown.clone());

    let worker = JudgeWorker::new(
        worker_id,
        store,
        submission_repository,
        judge_service,
        shutdown,
    );
    worker.run().await
}

fn spawn_signal_listener(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("Shutdown requested, finishing current job");
        shutdown.store(true, Ordering::SeqCst);
    });
}
