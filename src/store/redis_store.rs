//! Redis store backend

use super::{KvStore, WriteOp};
use crate::config::RedisConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, IntoConnectionInfo};

/// A [`KvStore`] over one multiplexed Redis connection.
///
/// The connection is cloned per call; clones share the underlying socket.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    addr: String,
}

impl RedisStore {
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let addr = config.display_addr();

        let mut info = (config.host.clone(), config.port)
            .into_connection_info()
            .map_err(|e| StoreError::Connection(format!("{}: {}", addr, e)))?;
        info.redis.db = config.db;
        info.redis.password = config.password.clone();

        let client = redis::Client::open(info)
            .map_err(|e| StoreError::Connection(format!("{}: {}", addr, e)))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {}", addr, e)))?;

        tracing::info!("Connected to Redis at {}", addr);
        Ok(Self { conn, addr })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {}", self.addr, e)))?;
        Ok(())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| StoreError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn pipeline_execute(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            pipe.set(&op.key, &op.value).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Pipeline {
                ops: ops.len(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.keys::<_, Vec<String>>(pattern)
            .await
            .map_err(|e| StoreError::Keys {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(|e| StoreError::Read {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        value.ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}
