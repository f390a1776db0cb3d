use core::fmt;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use crate::db::models::{
    CollectionPeriod, Destination, LeaderboardEntry, NewSubmission, PeriodId, RegistrationRecord,
};
use crate::trivia::validate::{Alias, DiscordId};

pub mod memory;
pub mod models;
pub mod pg;
pub mod repositories;

pub mod prelude {
    pub use crate::db::models::{CollectionPeriod, Destination, LeaderboardEntry};
    pub use crate::db::{StoreError, TriviaStore};

    pub use crate::db::memory::MemoryStore;
    pub use crate::db::pg::PgStore;
}

/// Everything the backend persists or reads.
///
/// Atomicity of `upsert_registration` and `insert_submission` is the store's own concern
/// (uniqueness constraints on the backing tables); callers never lock around these.
#[async_trait]
pub trait TriviaStore: Send + Sync + fmt::Debug {
    /// Inserts the mapping, or overwrites the alias and refreshes `updated_at` if the identity
    /// is already registered
    async fn upsert_registration(&self, id: &DiscordId, alias: &Alias) -> StoreResult<()>;

    async fn registration(&self, id: &DiscordId) -> StoreResult<Option<RegistrationRecord>>;

    /// Id of the most recently created period that is still open
    async fn latest_open_period(&self) -> StoreResult<Option<PeriodId>>;

    async fn period(&self, id: PeriodId) -> StoreResult<Option<CollectionPeriod>>;

    async fn insert_submission(
        &self,
        destination: Destination,
        submission: &NewSubmission,
    ) -> StoreResult<()>;

    /// Highest scores first, at most `limit` rows
    async fn leaderboard_top(&self, limit: i64) -> StoreResult<Vec<LeaderboardEntry>>;

    async fn leaderboard_for(&self, alias: &Alias) -> StoreResult<Vec<LeaderboardEntry>>;
}

#[instrument(skip(database_url))]
pub async fn connect(database_url: &str, run_migrations: bool) -> StoreResult<PgPool> {
    let pool = PgPool::connect(database_url).await?;

    if run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");
    }

    Ok(pool)
}

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}
