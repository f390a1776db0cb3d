use tracing::instrument;

use crate::db::models::PeriodId;
use crate::db::{StoreResult, TriviaStore};

/// Period used when nothing is open
pub const FALLBACK_PERIOD: PeriodId = 0;

/// Converts a user-facing 1-based week number to a stored 0-based period id
pub const fn period_from_week(week: i64) -> PeriodId {
    week - 1
}

/// Picks the period a submission belongs to.
///
/// An explicit id is taken as-is; whether that period exists or is open is left to the
/// submission router. Otherwise the newest open period is used, or [`FALLBACK_PERIOD`].
#[instrument(skip(store))]
pub async fn resolve_period(
    store: &dyn TriviaStore,
    explicit: Option<PeriodId>,
) -> StoreResult<PeriodId> {
    if let Some(id) = explicit {
        return Ok(id);
    }

    match store.latest_open_period().await? {
        Some(id) => Ok(id),
        None => {
            tracing::warn!(
                fallback = FALLBACK_PERIOD,
                "no open period, using fallback period"
            );
            Ok(FALLBACK_PERIOD)
        }
    }
}
