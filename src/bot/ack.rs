use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::instrument;

use crate::bot::interaction::Interaction;
use crate::bot::transport::{InteractionResponder, TransportError, Visibility};
use crate::util::retry::{RetryOutcome, RetryPolicy, retry};

/// How long Discord keeps an interaction token open for its initial response
pub const VALIDITY_WINDOW: Duration = Duration::from_secs(3);

pub const CLAIM_POLICY: RetryPolicy<TransportError> = RetryPolicy::new(
    3,
    Duration::from_millis(500),
    2,
    TransportError::is_fatal,
);

/// The initial acknowledgment sent for an interaction
#[derive(Debug, Clone, Copy)]
pub enum Claim<'a> {
    /// "Thinking..." placeholder, filled in later with `edit_original`
    Defer(Visibility),
    Reply {
        content: &'a str,
        visibility: Visibility,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Claimed,
    /// The validity window closed before an attempt could be made
    Expired,
    /// Retries exhausted, or a fatal error
    Failed,
}

/// Claims the response slot of each interaction at most once, within its validity window
#[derive(Debug)]
pub struct AckManager {
    responder: Arc<dyn InteractionResponder>,
    policy: RetryPolicy<TransportError>,
    window: Duration,
}

impl AckManager {
    pub fn new(responder: Arc<dyn InteractionResponder>) -> Self {
        Self {
            responder,
            policy: CLAIM_POLICY,
            window: VALIDITY_WINDOW,
        }
    }

    /// `received_at` is when the webhook arrived; `age` is how old the interaction already was
    /// at that point. Anything other than [`AckOutcome::Claimed`] is logged here exactly once, and
    /// the caller must not touch the interaction again.
    #[instrument(skip(self, interaction, claim), fields(interaction_id = %interaction.id))]
    pub async fn claim(
        &self,
        interaction: &Interaction,
        received_at: Instant,
        age: Duration,
        claim: Claim<'_>,
    ) -> AckOutcome {
        let deadline = received_at + self.window.saturating_sub(age);

        let outcome = retry(&self.policy, Some(deadline), move |attempt| async move {
            tracing::trace!(attempt, "claiming interaction response");
            match claim {
                Claim::Defer(visibility) => self.responder.defer(interaction, visibility).await,
                Claim::Reply {
                    content,
                    visibility,
                } => self.responder.reply(interaction, content, visibility).await,
            }
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } => {
                tracing::debug!(attempts, "interaction claimed");
                AckOutcome::Claimed
            }

            RetryOutcome::DeadlineElapsed {
                attempts,
                last_error,
            } => {
                tracing::warn!(
                    attempts,
                    age_ms = age.as_millis() as u64,
                    last_error = ?last_error,
                    "interaction expired before it could be acknowledged"
                );
                AckOutcome::Expired
            }

            RetryOutcome::Fatal { error, attempts } => {
                tracing::error!(attempts, error = ?error, "fatal error acknowledging interaction");
                AckOutcome::Failed
            }

            RetryOutcome::Exhausted { error, attempts } => {
                tracing::error!(attempts, error = ?error, "retries exhausted acknowledging interaction");
                AckOutcome::Failed
            }
        }
    }
}
