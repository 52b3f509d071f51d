use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::errors::Result;

use super::{
    JobQueueTrait, KeyValueStoreTrait, QUEUE_KEY, SNAPSHOT_TTL_SECONDS, StatusChannelTrait,
    StatusStream, channel_name, snapshot_key,
};

/// Redis-backed implementation of the key-value store, the judge job queue
/// and the status channel. One multiplexed connection serves commands;
/// every subscriber gets its own pub/sub connection from the client.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { client, manager })
    }
}

#[async_trait]
impl KeyValueStoreTrait for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl_seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[async_trait]
impl JobQueueTrait for RedisStore {
    async fn push(&self, submission_id: i64) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.lpush(QUEUE_KEY, submission_id.to_string()).await?;
        Ok(())
    }

    async fn pop_blocking(&self, timeout_seconds: u64) -> Result<Option<i64>> {
        let mut conn = self.manager.clone();
        let entry: Option<(String, String)> =
            conn.brpop(QUEUE_KEY, timeout_seconds as f64).await?;

        match entry {
            Some((_, raw)) => match raw.parse::<i64>() {
                Ok(id) => Ok(Some(id)),
                Err(_) => {
                    tracing::warn!(entry = %raw, "Discarding malformed queue entry");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StatusChannelTrait for RedisStore {
    async fn publish(&self, submission_id: i64, payload: &serde_json::Value) -> Result<()> {
        let data = payload.to_string();
        let mut conn = self.manager.clone();

        // Snapshot first so a subscriber that misses the broadcast can
        // still catch up from the key.
        let _: () = conn
            .set_ex(snapshot_key(submission_id), &data, SNAPSHOT_TTL_SECONDS)
            .await?;
        let _: () = conn.publish(channel_name(submission_id), &data).await?;

        Ok(())
    }

    async fn snapshot(&self, submission_id: i64) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(snapshot_key(submission_id)).await?;
        Ok(value)
    }

    async fn subscribe(&self, submission_id: i64) -> Result<StatusStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel_name(submission_id)).await?;

        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move { msg.get_payload::<String>().ok() });

        Ok(Box::pin(stream))
    }
}
