//! Item-based collaborative filtering over the current interaction model

use crate::model::InteractionModel;
use crate::types::{CollaborativeOutcome, FallbackReason};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use vidrec_core::models::sort_recommendations;
use vidrec_core::{Recommendation, UserId, VideoId};

#[derive(Debug, Default)]
struct Candidate {
    score: f64,
    contributors: usize,
}

/// Rank unseen items for `user_id` by similarity to the items they watched.
///
/// Every positively rated item is a seed. A candidate accumulates
/// `similarity * seed_rating` over the seeds it is at least `min_similarity`
/// similar to. Seeds are never recommended.
pub fn recommend(
    model: &InteractionModel,
    user_id: UserId,
    n: usize,
    min_similarity: f64,
) -> CollaborativeOutcome {
    if model.is_empty() {
        return CollaborativeOutcome::NoPersonalization(FallbackReason::EmptyModel);
    }
    if !model.matrix.contains_user(user_id) {
        return CollaborativeOutcome::NoPersonalization(FallbackReason::UnknownUser);
    }

    let seeds = model.matrix.user_ratings(user_id);
    if seeds.is_empty() {
        return CollaborativeOutcome::NoPersonalization(FallbackReason::NoSeedItems);
    }
    let seed_ids: HashSet<VideoId> = seeds.iter().map(|(id, _)| *id).collect();

    let items = model.similarity.items();
    let mut candidates: BTreeMap<VideoId, Candidate> = BTreeMap::new();

    for (seed, rating) in &seeds {
        let Some(row) = model.similarity.row(*seed) else {
            continue;
        };
        for (idx, similarity) in row.iter().enumerate() {
            if *similarity < min_similarity {
                continue;
            }
            let candidate_id = items[idx];
            if seed_ids.contains(&candidate_id) {
                continue;
            }
            let candidate = candidates.entry(candidate_id).or_default();
            candidate.score += similarity * rating;
            candidate.contributors += 1;
        }
    }

    let mut ranked: Vec<Recommendation> = candidates
        .into_iter()
        .map(|(video_id, c)| {
            Recommendation::new(
                video_id,
                c.score,
                format!("Based on {} similar videos you've watched", c.contributors),
            )
        })
        .collect();
    sort_recommendations(&mut ranked);
    ranked.truncate(n);

    debug!(
        user_id = user_id,
        seeds = seeds.len(),
        results = ranked.len(),
        "Generated collaborative recommendations"
    );
    CollaborativeOutcome::Personalized(ranked)
}
