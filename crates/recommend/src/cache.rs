//! Recommendation cache backends
//!
//! The PostgreSQL backend is [`vidrec_core::PgStore`]. The Redis backend keeps
//! one hash per user: field = video id, value = JSON `{score, expires_at}`.
//! The key itself expires with the latest entry it holds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use vidrec_core::models::rank_order;
use vidrec_core::{
    CacheBackend, CacheConfig, EngineError, PgStore, RecommendationCacheEntry,
    RecommendationCacheStore, Result, UserId, VideoId,
};

const PRUNE_UNCHANGED_FIELDS: &str = r#"
local removed = 0
for i = 1, #ARGV, 2 do
    if redis.call('HGET', KEYS[1], ARGV[i]) == ARGV[i + 1] then
        removed = removed + redis.call('HDEL', KEYS[1], ARGV[i])
    end
end
return removed
"#;

#[derive(Debug, Serialize, Deserialize)]
struct CachedScore {
    score: f64,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RedisRecommendationCache {
    manager: ConnectionManager,
    key_prefix: String,
}

impl RedisRecommendationCache {
    #[instrument(skip(config), fields(redis_url = %config.redis_url))]
    pub async fn new(config: &CacheConfig) -> Result<Self> {
        info!("Initializing Redis recommendation cache");

        let client = Client::open(config.redis_url.as_str())?;
        let manager = ConnectionManager::new(client).await?;

        let mut conn = manager.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;

        Ok(Self {
            manager,
            key_prefix: config.key_prefix.clone(),
        })
    }

    pub fn user_key(&self, user_id: UserId) -> String {
        format!("{}:user:{}", self.key_prefix, user_id)
    }

    /// Delete each `(field, value)` pair whose field still holds `value`,
    /// leaving fields rewritten since they were read. Returns the number removed.
    async fn prune_fields(&self, key: &str, fields: &[(String, String)]) -> Result<usize> {
        let script = Script::new(PRUNE_UNCHANGED_FIELDS);
        let mut invocation = script.key(key);
        for (field, value) in fields {
            invocation.arg(field).arg(value);
        }
        let mut conn = self.manager.clone();
        let removed: usize = invocation.invoke_async(&mut conn).await?;
        Ok(removed)
    }

    /// Push the key expiry out to `expires_at` unless it already lasts longer
    async fn extend_expiry(&self, key: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.manager.clone();
        let remaining_ms: i64 = conn.pttl(key).await?;
        let target_ms = (expires_at - Utc::now()).num_milliseconds();

        // -1: no expiry set, -2: key missing
        if remaining_ms == -1 || remaining_ms < target_ms {
            redis::cmd("PEXPIREAT")
                .arg(key)
                .arg(expires_at.timestamp_millis())
                .query_async::<_, ()>(&mut conn)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RecommendationCacheStore for RedisRecommendationCache {
    #[instrument(skip(self, entry), fields(user_id = entry.user_id, video_id = entry.video_id))]
    async fn upsert(&self, entry: &RecommendationCacheEntry) -> Result<()> {
        let key = self.user_key(entry.user_id);
        let value = serde_json::to_string(&CachedScore {
            score: entry.score,
            expires_at: entry.expires_at,
        })?;

        let mut conn = self.manager.clone();
        conn.hset::<_, _, _, ()>(&key, entry.video_id, value).await?;
        self.extend_expiry(&key, entry.expires_at).await?;

        debug!(key = %key, "Cached recommendation");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_unexpired(
        &self,
        user_id: UserId,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecommendationCacheEntry>> {
        let key = self.user_key(user_id);
        let mut conn = self.manager.clone();
        let fields: HashMap<String, String> = conn.hgetall(&key).await?;

        let mut expired: Vec<(String, String)> = Vec::new();
        let mut entries = Vec::with_capacity(fields.len());
        for (field, raw) in fields {
            let parsed = field
                .parse::<VideoId>()
                .map_err(|e| EngineError::Serialization(e.to_string()))
                .and_then(|video_id| {
                    serde_json::from_str::<CachedScore>(&raw)
                        .map(|cached| (video_id, cached))
                        .map_err(EngineError::from)
                });

            match parsed {
                Ok((video_id, cached)) if cached.expires_at > now => {
                    entries.push(RecommendationCacheEntry {
                        user_id,
                        video_id,
                        score: cached.score,
                        expires_at: cached.expires_at,
                    });
                }
                Ok(_) => expired.push((field, raw)),
                Err(e) => {
                    warn!(key = %key, field = %field, error = %e, "Dropping unreadable cache field");
                    expired.push((field, raw));
                }
            }
        }

        if !expired.is_empty() {
            if let Err(e) = self.prune_fields(&key, &expired).await {
                warn!(key = %key, error = %e, "Failed to prune expired cache fields");
            }
        }

        entries.sort_by(|a, b| rank_order(a.score, a.video_id, b.score, b.video_id));
        entries.truncate(limit);
        Ok(entries)
    }
}

/// Cache store selected by configuration
pub async fn build_cache_store(
    config: &CacheConfig,
    pg: &PgStore,
) -> Result<Arc<dyn RecommendationCacheStore>> {
    match config.backend {
        CacheBackend::Postgres => Ok(Arc::new(pg.clone())),
        CacheBackend::Redis => Ok(Arc::new(RedisRecommendationCache::new(config).await?)),
    }
}
