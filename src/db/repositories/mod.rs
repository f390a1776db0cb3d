use core::fmt;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Result as SqlxResult};
use tracing::instrument;

pub mod leaderboard;
pub mod period;
pub mod registration;
pub mod submission;

pub mod sql_fragment {
    pub const REGISTRATION_FIELDS: &str = r#"
        discord_id,
        rsn,
        updated_at
    "#;

    pub const PERIOD_FIELDS: &str = r#"
        id,
        is_closed,
        end_datetime
    "#;

    pub const SUBMISSION_FIELDS: &str = r#"
        week_id,
        rsn,
        question,
        answer,
        ip_address,
        date_time
    "#;
}

/// Keyed single-table access shared by the table-backed repositories
#[async_trait]
pub trait Repository: Send + Sync {
    type Ident: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Sync + fmt::Debug;
    type Output: for<'r> sqlx::FromRow<'r, PgRow> + Sized + Unpin + Send + fmt::Debug;

    const BASE_FIELDS: &'static str;
    const TABLE_NAME: &'static str;
    const KEY_COLUMN: &'static str;

    fn new(pool: PgPool) -> Self
    where
        Self: Sized;

    fn pool(&self) -> &PgPool;

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: &Self::Ident) -> SqlxResult<Option<Self::Output>> {
        sqlx::query_as::<_, Self::Output>(&format!(
            "SELECT {} FROM {} WHERE {} = $1",
            Self::BASE_FIELDS,
            Self::TABLE_NAME,
            Self::KEY_COLUMN,
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
    }
}
