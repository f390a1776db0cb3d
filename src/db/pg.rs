use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::models::{
    CollectionPeriod, Destination, LeaderboardEntry, NewSubmission, PeriodId, RegistrationRecord,
};
use crate::db::repositories::Repository;
use crate::db::repositories::leaderboard::LeaderboardRepository;
use crate::db::repositories::period::PeriodRepository;
use crate::db::repositories::registration::RegistrationRepository;
use crate::db::repositories::submission::SubmissionRepository;
use crate::db::{StoreResult, TriviaStore};
use crate::trivia::validate::{Alias, DiscordId};

/// Postgres-backed [`TriviaStore`]
#[derive(Debug, Clone)]
pub struct PgStore {
    registrations: RegistrationRepository,
    periods: PeriodRepository,
    submissions: SubmissionRepository,
    leaderboard: LeaderboardRepository,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            registrations: RegistrationRepository::new(pool.clone()),
            periods: PeriodRepository::new(pool.clone()),
            submissions: SubmissionRepository::new(pool.clone()),
            leaderboard: LeaderboardRepository::new(pool),
        }
    }
}

#[async_trait]
impl TriviaStore for PgStore {
    async fn upsert_registration(&self, id: &DiscordId, alias: &Alias) -> StoreResult<()> {
        Ok(self.registrations.upsert(id, alias).await?)
    }

    async fn registration(&self, id: &DiscordId) -> StoreResult<Option<RegistrationRecord>> {
        Ok(self.registrations.get_by_id(&id.to_string()).await?)
    }

    async fn latest_open_period(&self) -> StoreResult<Option<PeriodId>> {
        Ok(self.periods.latest_open().await?)
    }

    async fn period(&self, id: PeriodId) -> StoreResult<Option<CollectionPeriod>> {
        Ok(self.periods.get_by_id(&id).await?)
    }

    async fn insert_submission(
        &self,
        destination: Destination,
        submission: &NewSubmission,
    ) -> StoreResult<()> {
        Ok(self.submissions.insert(destination, submission).await?)
    }

    async fn leaderboard_top(&self, limit: i64) -> StoreResult<Vec<LeaderboardEntry>> {
        Ok(self.leaderboard.get_top(limit).await?)
    }

    async fn leaderboard_for(&self, alias: &Alias) -> StoreResult<Vec<LeaderboardEntry>> {
        Ok(self.leaderboard.get_by_rsn(alias).await?)
    }
}
