use std::net::IpAddr;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::db::TriviaStore;
use crate::db::models::{CollectionPeriod, Destination, NewSubmission, PeriodId};
use crate::trivia::validate::{Alias, Answer, DiscordId, Question};
use crate::trivia::week::resolve_period;
use crate::trivia::{TriviaError, TriviaResult};

/// A validated submission as received by the backend
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub discord_id: DiscordId,
    pub question: Question,
    pub answer: Answer,
    /// Explicit 0-based period id, if the caller picked one
    pub period_id: Option<PeriodId>,
    pub source_ip: Option<IpAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub period_id: PeriodId,
    pub destination: Destination,
}

impl SubmissionReceipt {
    pub fn overflow(&self) -> bool {
        self.destination.is_overflow()
    }
}

/// Overflow when the period is closed or its deadline is strictly before `at`; live otherwise.
/// A period id with no stored row is treated as open.
pub fn choose_destination(period: Option<&CollectionPeriod>, at: DateTime<Utc>) -> Destination {
    match period {
        Some(p) if !p.accepts_live_at(at) => Destination::Overflow,
        _ => Destination::Live,
    }
}

/// Resolves the period, picks the destination and writes the submission.
///
/// Registration is a hard precondition: without a stored alias for `discord_id`, nothing is
/// written.
#[instrument(skip(store, request), fields(discord_id = %request.discord_id))]
pub async fn submit(
    store: &dyn TriviaStore,
    request: SubmissionRequest,
    now: DateTime<Utc>,
) -> TriviaResult<SubmissionReceipt> {
    let alias = match store.registration(&request.discord_id).await? {
        Some(record) => Alias::from_stored(&record.rsn),
        None => {
            tracing::info!("submission rejected, identity not registered");
            return Err(TriviaError::NotRegistered);
        }
    };

    let period_id = resolve_period(store, request.period_id).await?;
    let period = store.period(period_id).await?;
    if period.is_none() {
        tracing::warn!(period_id, "submission targets a period with no stored row");
    }

    let destination = choose_destination(period.as_ref(), now);
    let submission = NewSubmission {
        period_id,
        alias,
        question: request.question,
        answer: request.answer,
        source_ip: request.source_ip,
        submitted_at: now,
    };

    store.insert_submission(destination, &submission).await?;

    tracing::info!(
        period_id,
        table = destination.table_name(),
        rsn = %submission.alias,
        "stored submission"
    );

    Ok(SubmissionReceipt {
        period_id,
        destination,
    })
}
