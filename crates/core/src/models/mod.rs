//! Domain models shared by the recommendation and retrieval crates

pub mod interaction;
pub mod preference;
pub mod recommendation;
pub mod video;

pub type UserId = i64;
pub type VideoId = i64;
pub type CategoryId = i64;

pub use interaction::InteractionRecord;
pub use preference::UserPreferenceProfile;
pub use recommendation::{rank_order, sort_recommendations, Recommendation, RecommendationCacheEntry};
pub use video::{PopularityStats, VideoEngagementStats, VideoMetadata};
