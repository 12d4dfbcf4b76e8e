//! Redis Streams `BusPort` adapter: `XADD` to publish, consumer
//! groups (`XGROUP CREATE`, `XREADGROUP`, `XACK`) for delivery, `XAUTOCLAIM`-
//! free pending recovery via a plain `XREADGROUP ... 0` read on startup.
//!
//! Holds exactly one `ConnectionManager` for the process (shared by every
//! publisher and subscriber), honoring the "one producer connection, one
//! consumer connection per process" contract — `ConnectionManager`
//! itself multiplexes over a single underlying connection with automatic
//! reconnection.

use std::time::Duration;

use async_trait::async_trait;
use callrelay_core::error::BusError;
use callrelay_core::ports::{BusMessage, BusPort, BusSubscription};
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, warn};

const FIELD_PAYLOAD: &str = "payload";
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RedisBus {
    conn: ConnectionManager,
}

impl RedisBus {
    /// Connects once and returns the shared adapter; callers clone it for
    /// every publisher/subscriber rather than opening new connections.
    pub async fn connect(redis_url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| BusError::TransientTransport(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| BusError::TransientTransport(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl BusPort for RedisBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, BusError> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd(topic, "*", &[(FIELD_PAYLOAD, payload)])
            .await
            .map_err(|e| BusError::TransientTransport(e.to_string()))?;
        Ok(id)
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
    ) -> Result<Box<dyn BusSubscription>, BusError> {
        let mut conn = self.conn.clone();
        let created: Result<(), redis::RedisError> =
            conn.xgroup_create_mkstream(topic, group, "0").await;
        if let Err(err) = created {
            // BUSYGROUP means the group already exists - not an error.
            if !err.to_string().contains("BUSYGROUP") {
                return Err(BusError::TransientTransport(err.to_string()));
            }
        }

        Ok(Box::new(RedisSubscription {
            conn: self.conn.clone(),
            topic: topic.to_string(),
            group: group.to_string(),
            consumer: consumer.to_string(),
            draining_pending: true,
            backoff: Duration::from_millis(250),
        }))
    }

    async fn list_topics(&self, prefix: &str) -> Result<Vec<String>, BusError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{prefix}*"))
            .query_async(&mut conn)
            .await
            .map_err(|e| BusError::TransientTransport(e.to_string()))?;
        Ok(keys)
    }
}

struct RedisSubscription {
    conn: ConnectionManager,
    topic: String,
    group: String,
    consumer: String,
    /// Pending-entry recovery phase: `true` until a `0`-cursor read comes
    /// back empty, then every subsequent read uses `>` (live delivery).
    draining_pending: bool,
    backoff: Duration,
}

impl RedisSubscription {
    async fn read_one(&mut self) -> Result<Option<BusMessage>, redis::RedisError> {
        let cursor = if self.draining_pending { "0" } else { ">" };
        let opts = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(1)
            .block(1000);

        let reply: StreamReadReply = self
            .conn
            .xread_options(&[&self.topic], &[cursor], &opts)
            .await?;

        for stream_key in reply.keys {
            for id in stream_key.ids {
                let payload = id
                    .map
                    .get(FIELD_PAYLOAD)
                    .and_then(|v| match v {
                        redis::Value::BulkString(bytes) => Some(bytes.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();
                return Ok(Some(BusMessage {
                    message_id: id.id,
                    payload,
                }));
            }
        }

        if self.draining_pending {
            // Empty `0`-cursor read: no more pending entries for this
            // consumer name, switch to live delivery.
            self.draining_pending = false;
        }
        Ok(None)
    }
}

#[async_trait]
impl BusSubscription for RedisSubscription {
    async fn recv(&mut self) -> Result<Option<BusMessage>, BusError> {
        loop {
            match self.read_one().await {
                Ok(Some(msg)) => {
                    self.backoff = Duration::from_millis(250);
                    return Ok(Some(msg));
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, topic = %self.topic, "bus read error, backing off");
                    tokio::time::sleep(self.backoff).await;
                    self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn ack(&mut self, message_id: &str) -> Result<(), BusError> {
        let _: i64 = self
            .conn
            .xack(&self.topic, &self.group, &[message_id])
            .await
            .map_err(|e| BusError::TransientTransport(e.to_string()))?;
        debug!(message_id, topic = %self.topic, "acked message");
        Ok(())
    }
}
