use tracing::instrument;

use crate::db::{StoreResult, TriviaStore};
use crate::trivia::validate::{Alias, DiscordId};

/// Maps `id` to `alias`, replacing any earlier alias for the same identity.
///
/// Both arguments are already-validated types, so a malformed identity or alias can never reach
/// the store.
#[instrument(skip(store), fields(discord_id = %id, rsn = %alias))]
pub async fn register(store: &dyn TriviaStore, id: &DiscordId, alias: &Alias) -> StoreResult<()> {
    store.upsert_registration(id, alias).await?;
    tracing::info!("registration stored");

    Ok(())
}
