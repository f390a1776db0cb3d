use sqlx::{PgPool, Result as SqlxResult};
use tracing::instrument;

use super::{Repository, sql_fragment};
use crate::db::models::RegistrationRecord;
use crate::trivia::validate::{Alias, DiscordId};

#[derive(Debug, Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

#[async_trait::async_trait]
impl Repository for RegistrationRepository {
    type Ident = String;
    type Output = RegistrationRecord;

    const BASE_FIELDS: &'static str = sql_fragment::REGISTRATION_FIELDS;
    const TABLE_NAME: &'static str = "discord_rsn_map";
    const KEY_COLUMN: &'static str = "discord_id";

    fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl RegistrationRepository {
    #[instrument(skip(self), fields(discord_id = %id, rsn = %alias))]
    pub async fn upsert(&self, id: &DiscordId, alias: &Alias) -> SqlxResult<()> {
        match sqlx::query(
            r#"
            INSERT INTO discord_rsn_map (
                discord_id,
                rsn,
                updated_at
            )
            VALUES ($1, $2, NOW())
            ON CONFLICT (discord_id)
            DO UPDATE SET
                rsn = EXCLUDED.rsn,
                updated_at = NOW()
            "#,
        )
        .bind(id.as_str())
        .bind(alias.as_str())
        .execute(&self.pool)
        .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(error = ?e, "failure during registration upsert");
                Err(e)
            }
        }
    }
}
