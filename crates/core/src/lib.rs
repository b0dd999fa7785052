//! # vidrec core
//!
//! Shared building blocks for the video recommendation and semantic retrieval
//! engine.
//!
//! ## Modules
//!
//! - `models`: interaction, catalog, preference and recommendation types
//! - `store`: data store contracts with PostgreSQL and in-memory implementations
//! - `error`: engine error type
//! - `config`: layered configuration loading and validation
//! - `observability`: structured logging setup
//! - `database`: shared PostgreSQL connection pool
//! - `math`: vector helpers
//! - `retry`: exponential backoff
//! - `snapshot`: build-then-swap holder for rebuilt models and indexes

pub mod config;
pub mod database;
pub mod error;
pub mod math;
pub mod models;
pub mod observability;
pub mod retry;
pub mod snapshot;
pub mod store;

pub use config::{
    load_dotenv, CacheBackend, CacheConfig, DatabaseConfig, EngineConfig, ProfileConfig,
    RecommendationConfig, SchedulerConfig, SemanticConfig,
};
pub use database::DatabasePool;
pub use error::{EngineError, Result};
pub use math::{cosine_similarity, dot_product, l2_norm};
pub use models::{
    CategoryId, InteractionRecord, PopularityStats, Recommendation, RecommendationCacheEntry,
    UserId, UserPreferenceProfile, VideoEngagementStats, VideoId, VideoMetadata,
};
pub use observability::{init_logging, LogConfig, LogFormat, ObservabilityError};
pub use retry::{retry_engine, retry_with_backoff, RetryPolicy};
pub use snapshot::SnapshotSlot;
pub use store::{
    CatalogSource, InteractionSource, MemoryStore, PgStore, PreferenceStore,
    RecommendationCacheStore,
};
