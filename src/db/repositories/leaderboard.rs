use sqlx::{PgPool, Result as SqlxResult};
use tracing::instrument;

use crate::db::models::LeaderboardEntry;
use crate::trivia::validate::Alias;

#[derive(Debug, Clone)]
pub struct LeaderboardRepository {
    pool: PgPool,
}

impl LeaderboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get_top(&self, limit: i64) -> SqlxResult<Vec<LeaderboardEntry>> {
        sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT
                user_id AS rsn,
                score
            FROM trivia_leaderboard
            ORDER BY score DESC, user_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    #[instrument(skip(self), fields(rsn = %alias))]
    pub async fn get_by_rsn(&self, alias: &Alias) -> SqlxResult<Vec<LeaderboardEntry>> {
        sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT
                user_id AS rsn,
                score
            FROM trivia_leaderboard
            WHERE user_id = $1
            "#,
        )
        .bind(alias.as_str())
        .fetch_all(&self.pool)
        .await
    }
}
