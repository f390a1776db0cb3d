use sqlx::{PgPool, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::{Destination, NewSubmission};

#[derive(Debug, Clone)]
pub struct SubmissionRepository {
    pool: PgPool,
}

impl SubmissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Writes the row to `destination`'s table. Rows are never moved between tables afterwards.
    #[instrument(
        skip(self, item),
        fields(table = destination.table_name(), week_id = item.period_id, rsn = %item.alias)
    )]
    pub async fn insert(&self, destination: Destination, item: &NewSubmission) -> SqlxResult<()> {
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6)",
            destination.table_name(),
            sql_fragment::SUBMISSION_FIELDS,
        );

        match sqlx::query(&statement)
            .bind(item.period_id)
            .bind(item.alias.as_str())
            .bind(item.question.as_str())
            .bind(item.answer.as_str())
            .bind(item.source_ip.map(|ip| ip.to_string()))
            .bind(item.submitted_at)
            .execute(&self.pool)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(error = ?e, "failure during submission insert");
                Err(e)
            }
        }
    }
}
