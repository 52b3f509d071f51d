pub mod redis;
pub mod test_cases;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
#[cfg(test)]
use mockall::automock;

use crate::errors::Result;

pub use test_cases::{ProblemCache, TestCaseCache};

/// Key and TTL layout of the shared key-value store.
pub const QUEUE_KEY: &str = "judge:queue";
pub const TESTCASE_TTL_SECONDS: u64 = 3600;
pub const PROBLEM_TTL_SECONDS: u64 = 300;
pub const SNAPSHOT_TTL_SECONDS: u64 = 600;

pub fn testcases_key(problem_id: i64) -> String {
    format!("cache:testcases:{problem_id}")
}

pub fn problem_key(problem_id: i64) -> String {
    format!("cache:problem:{problem_id}")
}

pub fn snapshot_key(submission_id: i64) -> String {
    format!("sub:status:{submission_id}")
}

pub fn channel_name(submission_id: i64) -> String {
    format!("submission:{submission_id}")
}

/// Plain get/set-with-TTL/delete against the shared key-value store.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStoreTrait: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Durable FIFO of submission ids between the API and the judge workers.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait JobQueueTrait: Send + Sync {
    async fn push(&self, submission_id: i64) -> Result<()>;
    /// Blocking pop bounded by `timeout_seconds` so callers can observe
    /// shutdown. `None` means the timeout elapsed with an empty queue.
    async fn pop_blocking(&self, timeout_seconds: u64) -> Result<Option<i64>>;
}

pub type StatusStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Per-submission fan-out: a latest-snapshot key plus a pub/sub topic.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusChannelTrait: Send + Sync {
    /// Store the snapshot, then broadcast. The order matters: a subscriber
    /// that joins after the broadcast can still read the snapshot.
    async fn publish(&self, submission_id: i64, payload: &serde_json::Value) -> Result<()>;
    async fn snapshot(&self, submission_id: i64) -> Result<Option<String>>;
    async fn subscribe(&self, submission_id: i64) -> Result<StatusStream>;
}
