use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trivia::validate::{Alias, Answer, Question};

/// 0-based collection period ("week") id, as stored
pub type PeriodId = i64;

/// Base `discord_rsn_map` table model
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RegistrationRecord {
    pub discord_id: String,
    pub rsn: String,
    pub updated_at: DateTime<Utc>,
}

/// Base `trivia_weeks` table model
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CollectionPeriod {
    pub id: PeriodId,
    pub is_closed: bool,
    pub end_datetime: Option<DateTime<Utc>>,
}

impl CollectionPeriod {
    /// Whether a submission arriving at `at` may still go into the live table
    pub fn accepts_live_at(&self, at: DateTime<Utc>) -> bool {
        if self.is_closed {
            return false;
        }

        match self.end_datetime {
            Some(end) => at <= end,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Live,
    Overflow,
}

impl Destination {
    pub const fn table_name(&self) -> &'static str {
        match self {
            Destination::Live => "trivia_submissions",
            Destination::Overflow => "trivia_submissions_overflow",
        }
    }

    pub const fn is_overflow(&self) -> bool {
        matches!(self, Destination::Overflow)
    }
}

/// A validated submission, ready to be written to exactly one destination table
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub period_id: PeriodId,
    pub alias: Alias,
    pub question: Question,
    pub answer: Answer,
    pub source_ip: Option<IpAddr>,
    pub submitted_at: DateTime<Utc>,
}

/// Row of the (read-only) `trivia_leaderboard` projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub rsn: String,
    pub score: i64,
}
