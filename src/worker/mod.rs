use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::{
    cache::JobQueueTrait,
    errors::Result,
    repositories::submission::SubmissionRepositoryTrait,
    services::judge::{JudgeOutcome, JudgeServiceTrait},
};

/// Queue-pop timeout; also the upper bound on how long a shutdown signal
/// waits for an idle worker.
pub const POP_TIMEOUT_SECONDS: u64 = 5;

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
/// A row claimed longer ago than this is presumed orphaned by a crashed
/// worker.
const STALE_AFTER_MINUTES: i64 = 10;

/// Pulls submission ids off the shared queue and judges them one at a time.
/// Several workers can run against the same queue; the conditional claim in
/// the judge service keeps each submission with exactly one of them.
pub struct JudgeWorker {
    worker_id: String,
    job_queue: Arc<dyn JobQueueTrait>,
    submission_repository: Arc<dyn SubmissionRepositoryTrait>,
    judge_service: Arc<dyn JudgeServiceTrait>,
    shutdown: Arc<AtomicBool>,
}

impl JudgeWorker {
    pub fn new(
        worker_id: String,
        job_queue: Arc<dyn JobQueueTrait>,
        submission_repository: Arc<dyn SubmissionRepositoryTrait>,
        judge_service: Arc<dyn JudgeServiceTrait>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            worker_id,
            job_queue,
            submission_repository,
            judge_service,
            shutdown,
        }
    }

    pub async fn run(&self) -> Result<()> {
        tracing::info!(worker_id = %self.worker_id, "Judge worker starting");

        // First sweep runs immediately so a restart reclaims orphans fast.
        let mut last_sweep: Option<Instant> = None;

        while !self.shutdown.load(Ordering::SeqCst) {
            if last_sweep.is_none_or(|t| t.elapsed() >= SWEEP_INTERVAL) {
                self.sweep().await;
                last_sweep = Some(Instant::now());
            }

            match self.job_queue.pop_blocking(POP_TIMEOUT_SECONDS).await {
                Ok(Some(submission_id)) => self.process(submission_id).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(worker_id = %self.worker_id, error = %e, "Queue pop failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Judge worker stopped");
        Ok(())
    }

    async fn process(&self, submission_id: i64) {
        tracing::info!(worker_id = %self.worker_id, submission_id, "Processing submission");
        let start = Instant::now();

        match self.judge_service.judge_submission(submission_id).await {
            Ok(JudgeOutcome::Completed) => {
                tracing::info!(
                    worker_id = %self.worker_id,
                    submission_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Submission judged"
                );
            }
            Ok(JudgeOutcome::Skipped) => {
                tracing::debug!(worker_id = %self.worker_id, submission_id, "Submission skipped");
            }
            Err(e) => {
                tracing::error!(
                    worker_id = %self.worker_id,
                    submission_id,
                    error = %e,
                    "Judging failed"
                );
                if let Err(e) = self
                    .judge_service
                    .fail_submission(submission_id, &e.to_string())
                    .await
                {
                    tracing::error!(
                        worker_id = %self.worker_id,
                        submission_id,
                        error = %e,
                        "Could not park failed submission"
                    );
                }
            }
        }
    }

    /// Recovery sweep. Orphaned `running` rows (worker died mid-judge) go
    /// back to `pending` and onto the queue; old `pending` rows whose queue
    /// entry was lost get re-enqueued. Duplicate entries are harmless given
    /// the claim guard.
    async fn sweep(&self) {
        match self
            .submission_repository
            .reset_stale_running(STALE_AFTER_MINUTES)
            .await
        {
            Ok(ids) => {
                for id in ids {
                    tracing::warn!(worker_id = %self.worker_id, submission_id = id, "Requeueing stale running submission");
                    if let Err(e) = self.job_queue.push(id).await {
                        tracing::error!(submission_id = id, error = %e, "Failed to requeue");
                    }
                }
            }
            Err(e) => {
                tracing::error!(worker_id = %self.worker_id, error = %e, "Stale-running sweep failed")
            }
        }

        match self
            .submission_repository
            .stuck_pending(STALE_AFTER_MINUTES)
            .await
        {
            Ok(ids) => {
                for id in ids {
                    tracing::debug!(worker_id = %self.worker_id, submission_id = id, "Requeueing stuck pending submission");
                    if let Err(e) = self.job_queue.push(id).await {
                        tracing::error!(submission_id = id, error = %e, "Failed to requeue");
                    }
                }
            }
            Err(e) => {
                tracing::error!(worker_id = %self.worker_id, error = %e, "Stuck-pending sweep failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MockJobQueueTrait;
    use crate::errors::ServiceError;
    use crate::repositories::submission::MockSubmissionRepositoryTrait;
    use crate::services::judge::MockJudgeServiceTrait;
    use mockall::predicate::eq;

    fn worker(
        queue: MockJobQueueTrait,
        repo: MockSubmissionRepositoryTrait,
        judge: MockJudgeServiceTrait,
        shutdown: Arc<AtomicBool>,
    ) -> JudgeWorker {
        JudgeWorker::new(
            "test-worker".to_string(),
            Arc::new(queue),
            Arc::new(repo),
            Arc::new(judge),
            shutdown,
        )
    }

    #[tokio::test]
    async fn pops_and_judges_until_shutdown() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();

        let mut queue = MockJobQueueTrait::new();
        queue.expect_pop_blocking().returning(move |_| {
            // One job, then ask the loop to stop.
            if flag.swap(true, Ordering::SeqCst) {
                Ok(None)
            } else {
                Ok(Some(42))
            }
        });
        queue.expect_push().returning(|_| Ok(()));

        let mut repo = MockSubmissionRepositoryTrait::new();
        repo.expect_reset_stale_running().returning(|_| Ok(vec![]));
        repo.expect_stuck_pending().returning(|_| Ok(vec![]));

        let mut judge = MockJudgeServiceTrait::new();
        judge
            .expect_judge_submission()
            .with(eq(42))
            .times(1)
            .returning(|_| Ok(JudgeOutcome::Completed));

        worker(queue, repo, judge, shutdown).run().await.unwrap();
    }

    #[tokio::test]
    async fn judging_error_parks_the_submission() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();

        let mut queue = MockJobQueueTrait::new();
        queue.expect_pop_blocking().returning(move |_| {
            if flag.swap(true, Ordering::SeqCst) {
                Ok(None)
            } else {
                Ok(Some(7))
            }
        });

        let mut repo = MockSubmissionRepositoryTrait::new();
        repo.expect_reset_stale_running().returning(|_| Ok(vec![]));
        repo.expect_stuck_pending().returning(|_| Ok(vec![]));

        let mut judge = MockJudgeServiceTrait::new();
        judge
            .expect_judge_submission()
            .returning(|_| Err(ServiceError::InternalError("engine down".into()).into()));
        judge
            .expect_fail_submission()
            .withf(|id, msg| *id == 7 && msg.contains("engine down"))
            .times(1)
            .returning(|_, _| Ok(()));

        worker(queue, repo, judge, shutdown).run().await.unwrap();
    }

    #[tokio::test]
    async fn sweep_requeues_stale_and_stuck_rows() {
        let shutdown = Arc::new(AtomicBool::new(true));

        let mut queue = MockJobQueueTrait::new();
        queue
            .expect_push()
            .with(eq(5))
            .times(1)
            .returning(|_| Ok(()));
        queue
            .expect_push()
            .with(eq(6))
            .times(1)
            .returning(|_| Ok(()));

        let mut repo = MockSubmissionRepositoryTrait::new();
        repo.expect_reset_stale_running()
            .with(eq(STALE_AFTER_MINUTES))
            .returning(|_| Ok(vec![5]));
        repo.expect_stuck_pending()
            .with(eq(STALE_AFTER_MINUTES))
            .returning(|_| Ok(vec![6]));

        let judge = MockJudgeServiceTrait::new();
        let w = worker(queue, repo, judge, shutdown);
        w.sweep().await;
    }

    #[tokio::test]
    async fn shutdown_flag_stops_the_loop_immediately() {
        let shutdown = Arc::new(AtomicBool::new(true));

        let mut queue = MockJobQueueTrait::new();
        queue.expect_pop_blocking().never();

        let repo = MockSubmissionRepositoryTrait::new();
        let judge = MockJudgeServiceTrait::new();

        worker(queue, repo, judge, shutdown).run().await.unwrap();
    }
}
