use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::db::models::{
    CollectionPeriod, Destination, LeaderboardEntry, NewSubmission, PeriodId, RegistrationRecord,
};
use crate::db::{StoreResult, TriviaStore};
use crate::trivia::validate::{Alias, DiscordId};

/// Process-local [`TriviaStore`] for tests and `--memory` runs.
///
/// A single lock stands in for the database's own row-level atomicity; each trait method takes
/// it exactly once.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

#[derive(Debug, Default)]
struct Tables {
    registrations: HashMap<String, RegistrationRecord>,
    periods: BTreeMap<PeriodId, CollectionPeriod>,
    live: Vec<NewSubmission>,
    overflow: Vec<NewSubmission>,
    scores: HashMap<String, i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_period(&self, period: CollectionPeriod) {
        self.tables.write().await.periods.insert(period.id, period);
    }

    pub async fn put_score(&self, rsn: &str, score: i64) {
        self.tables
            .write()
            .await
            .scores
            .insert(rsn.to_string(), score);
    }

    pub async fn submissions(&self, destination: Destination) -> Vec<NewSubmission> {
        let tables = self.tables.read().await;
        match destination {
            Destination::Live => tables.live.clone(),
            Destination::Overflow => tables.overflow.clone(),
        }
    }

    pub async fn registrations(&self) -> Vec<RegistrationRecord> {
        self.tables
            .read()
            .await
            .registrations
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TriviaStore for MemoryStore {
    async fn upsert_registration(&self, id: &DiscordId, alias: &Alias) -> StoreResult<()> {
        let record = RegistrationRecord {
            discord_id: id.to_string(),
            rsn: alias.to_string(),
            updated_at: Utc::now(),
        };

        self.tables
            .write()
            .await
            .registrations
            .insert(record.discord_id.clone(), record);

        Ok(())
    }

    async fn registration(&self, id: &DiscordId) -> StoreResult<Option<RegistrationRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .registrations
            .get(id.as_str())
            .cloned())
    }

    async fn latest_open_period(&self) -> StoreResult<Option<PeriodId>> {
        Ok(self
            .tables
            .read()
            .await
            .periods
            .values()
            .rev()
            .find(|p| !p.is_closed)
            .map(|p| p.id))
    }

    async fn period(&self, id: PeriodId) -> StoreResult<Option<CollectionPeriod>> {
        Ok(self.tables.read().await.periods.get(&id).cloned())
    }

    async fn insert_submission(
        &self,
        destination: Destination,
        submission: &NewSubmission,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match destination {
            Destination::Live => tables.live.push(submission.clone()),
            Destination::Overflow => tables.overflow.push(submission.clone()),
        }

        Ok(())
    }

    async fn leaderboard_top(&self, limit: i64) -> StoreResult<Vec<LeaderboardEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<LeaderboardEntry> = tables
            .scores
            .iter()
            .map(|(rsn, score)| LeaderboardEntry {
                rsn: rsn.clone(),
                score: *score,
            })
            .collect();

        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.rsn.cmp(&b.rsn)));
        entries.truncate(usize::try_from(limit).unwrap_or(0));

        Ok(entries)
    }

    async fn leaderboard_for(&self, alias: &Alias) -> StoreResult<Vec<LeaderboardEntry>> {
        Ok(self
            .tables
            .read()
            .await
            .scores
            .get_key_value(alias.as_str())
            .map(|(rsn, score)| LeaderboardEntry {
                rsn: rsn.clone(),
                score: *score,
            })
            .into_iter()
            .collect())
    }
}
