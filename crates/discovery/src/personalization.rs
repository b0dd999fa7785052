//! Preference-aware re-ranking of search results

use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, instrument, warn};
use vidrec_core::{PreferenceStore, UserId};

use crate::search::SearchResult;

pub const PREFERENCE_NOTE: &str = " • Matches your preferences";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalizationOutcome {
    /// No preference record; order unchanged
    PassThrough,
    /// Preferences applied; `boosted` results were in a preferred category
    Boosted { boosted: usize },
}

/// Multiply the score of every result in a preferred category by `boost`,
/// then re-sort by score. Returns how many results were boosted.
pub fn apply_preferences(results: &mut [SearchResult], preferred: &[String], boost: f32) -> usize {
    let mut boosted = 0;
    for result in results.iter_mut() {
        let preferred_category = result
            .category_name
            .as_ref()
            .map_or(false, |c| preferred.contains(c));
        if preferred_category {
            result.similarity_score *= boost;
            result.personalized = true;
            result.relevance_reason.push_str(PREFERENCE_NOTE);
            boosted += 1;
        }
    }

    results.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(Ordering::Equal)
    });
    boosted
}

/// Re-rank `results` with the stored preferences of `user_id`.
///
/// A missing profile, or one the store cannot return, leaves the results
/// untouched.
#[instrument(skip(preferences, results), fields(num_results = results.len()))]
pub async fn personalize(
    preferences: &dyn PreferenceStore,
    results: &mut [SearchResult],
    user_id: UserId,
    boost: f32,
) -> PersonalizationOutcome {
    let profile = match preferences.fetch_profile(user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            debug!(user_id, "No preference profile, results unchanged");
            return PersonalizationOutcome::PassThrough;
        }
        Err(e) => {
            warn!(user_id, error = %e, "Failed to load preferences, results unchanged");
            return PersonalizationOutcome::PassThrough;
        }
    };

    let boosted = apply_preferences(results, &profile.preferred_categories, boost);
    debug!(user_id, boosted, "Personalization applied");
    PersonalizationOutcome::Boosted { boosted }
}
