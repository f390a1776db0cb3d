use sqlx::{PgPool, Result as SqlxResult};
use tracing::instrument;

use super::{Repository, sql_fragment};
use crate::db::models::{CollectionPeriod, PeriodId};

#[derive(Debug, Clone)]
pub struct PeriodRepository {
    pool: PgPool,
}

#[async_trait::async_trait]
impl Repository for PeriodRepository {
    type Ident = PeriodId;
    type Output = CollectionPeriod;

    const BASE_FIELDS: &'static str = sql_fragment::PERIOD_FIELDS;
    const TABLE_NAME: &'static str = "trivia_weeks";
    const KEY_COLUMN: &'static str = "id";

    fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl PeriodRepository {
    #[instrument(skip(self))]
    pub async fn latest_open(&self) -> SqlxResult<Option<PeriodId>> {
        sqlx::query_scalar::<_, PeriodId>(
            r#"
            SELECT id FROM trivia_weeks
            WHERE is_closed = FALSE
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
    }
}
