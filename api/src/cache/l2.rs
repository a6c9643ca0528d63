//! Optional distributed L2 tier, JSON-serialized over Redis.
//! Compiled in only under the `distributed-cache` feature; callers treat a
//! disabled/unreachable L2 as a cache miss, never as an error.

use std::time::Duration;

#[cfg(feature = "distributed-cache")]
mod enabled {
    use super::*;
    use redis::aio::ConnectionManager;
    use redis::AsyncCommands;

    pub struct L2Cache {
        conn: ConnectionManager,
    }

    impl L2Cache {
        pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
            let client = redis::Client::open(url)?;
            let conn = client.get_connection_manager().await?;
            Ok(Self { conn })
        }

        pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
            let mut conn = self.conn.clone();
            let raw: Option<String> = conn.get(key).await.ok()?;
            raw.and_then(|s| serde_json::from_str(&s).ok())
        }

        pub async fn set(&self, key: &str, value: &serde_json::Value, ttl: Duration) {
            let mut conn = self.conn.clone();
            if let Ok(serialized) = serde_json::to_string(value) {
                let _: Result<(), _> = conn.set_ex(key, serialized, ttl.as_secs().max(1)).await;
            }
        }

        pub async fn invalidate(&self, key: &str) {
            let mut conn = self.conn.clone();
            let _: Result<(), _> = conn.del(key).await;
        }
    }
}

#[cfg(feature = "distributed-cache")]
pub use enabled::L2Cache;

#[cfg(not(feature = "distributed-cache"))]
pub struct L2Cache;

#[cfg(not(feature = "distributed-cache"))]
impl L2Cache {
    pub async fn get(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }

    pub async fn set(&self, _key: &str, _value: &serde_json::Value, _ttl: Duration) {}

    pub async fn invalidate(&self, _key: &str) {}
}
