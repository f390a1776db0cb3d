use tracing::instrument;

use crate::db::models::LeaderboardEntry;
use crate::db::{StoreResult, TriviaStore};
use crate::trivia::validate::Alias;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Default)]
pub struct LeaderboardQuery {
    pub alias: Option<Alias>,
    pub limit: Option<i64>,
}

/// Requested row count, defaulted and forced into `1..=MAX_LIMIT`
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// With an alias, that alias' row (if any); otherwise the top scores
#[instrument(skip(store))]
pub async fn query(
    store: &dyn TriviaStore,
    query: &LeaderboardQuery,
) -> StoreResult<Vec<LeaderboardEntry>> {
    match &query.alias {
        Some(alias) => store.leaderboard_for(alias).await,
        None => store.leaderboard_top(clamp_limit(query.limit)).await,
    }
}
