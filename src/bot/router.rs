use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::instrument;

use crate::bot::ack::{AckManager, AckOutcome, Claim, VALIDITY_WINDOW};
use crate::bot::client::TriviaApiClient;
use crate::bot::commands::{
    Command, DeferredCommand, PING_PLACEHOLDER, UNEXPECTED_ERROR, UNKNOWN_COMMAND, UNSUPPORTED_TYPE,
    ping_report,
};
use crate::bot::interaction::{Interaction, InteractionKind};
use crate::bot::transport::{InteractionResponder, Visibility, split_content};

/// Takes each interaction from receipt to its terminal response.
///
/// Shared by every interaction task; holds no per-interaction state.
#[derive(Debug)]
pub struct CommandRouter {
    ack: AckManager,
    responder: Arc<dyn InteractionResponder>,
    api: TriviaApiClient,
}

impl CommandRouter {
    pub fn new(responder: Arc<dyn InteractionResponder>, api: TriviaApiClient) -> Self {
        Self {
            ack: AckManager::new(responder.clone()),
            responder,
            api,
        }
    }

    #[instrument(skip_all, fields(interaction_id = %interaction.id))]
    pub async fn dispatch(&self, interaction: Interaction, received_at: Instant) {
        let age = trusted_age(interaction.age_at(Utc::now()));

        if interaction.kind != InteractionKind::ApplicationCommand {
            tracing::info!(kind = ?interaction.kind, "unsupported interaction type");
            let claim = Claim::Reply {
                content: UNSUPPORTED_TYPE,
                visibility: Visibility::Private,
            };
            self.ack.claim(&interaction, received_at, age, claim).await;
            return;
        }

        let invoker = interaction.invoker();
        tracing::info!(
            user_id = invoker.map(|u| u.id.as_str()),
            username = invoker.map(|u| u.username.as_str()),
            command = interaction.command_name(),
            options = %interaction.options().summary(),
            age_ms = age.as_millis() as u64,
            "command received"
        );

        let command = interaction
            .command_name()
            .and_then(|name| Command::parse(name, interaction.options()));

        let Some(command) = command else {
            let claim = Claim::Defer(Visibility::Private);
            if self.ack.claim(&interaction, received_at, age, claim).await == AckOutcome::Claimed {
                self.edit(&interaction, UNKNOWN_COMMAND).await;
            }
            return;
        };

        match &command {
            Command::Ping => self.ping(&interaction, &command, received_at, age).await,
            Command::Deferred(deferred) => self.deferred(&interaction, deferred, received_at, age).await,
        }
    }

    /// Replies with a placeholder straight away, then edits in the measured latencies
    async fn ping(
        &self,
        interaction: &Interaction,
        command: &Command,
        received_at: Instant,
        age: Duration,
    ) {
        let claim = Claim::Reply {
            content: PING_PLACEHOLDER,
            visibility: command.visibility(),
        };

        let sent = Instant::now();
        if self.ack.claim(interaction, received_at, age, claim).await != AckOutcome::Claimed {
            return;
        }

        let api_latency = sent.elapsed().as_millis();
        let round_trip = interaction.age_at(Utc::now()).as_millis();

        self.edit(interaction, &ping_report(round_trip, api_latency)).await;
    }

    async fn deferred(
        &self,
        interaction: &Interaction,
        command: &DeferredCommand,
        received_at: Instant,
        age: Duration,
    ) {
        let visibility = command.visibility();
        let claim = Claim::Defer(visibility);
        if self.ack.claim(interaction, received_at, age, claim).await != AckOutcome::Claimed {
            return;
        }

        let Some(invoker) = interaction.invoker() else {
            tracing::error!(command = command.name(), "command interaction without an invoking user");
            self.edit(interaction, UNEXPECTED_ERROR).await;
            return;
        };

        match command.run(&invoker.id, &self.api).await {
            Ok(content) => self.deliver(interaction, &content, visibility).await,
            Err(e) => {
                tracing::error!(error = ?e, command = command.name(), "command handler failed");
                self.edit(interaction, UNEXPECTED_ERROR).await;
            }
        }
    }

    /// Fills the claimed response, spilling anything past Discord's length limit into follow-ups
    async fn deliver(&self, interaction: &Interaction, content: &str, visibility: Visibility) {
        let mut chunks = split_content(content).into_iter();
        let Some(first) = chunks.next() else {
            return;
        };

        if !self.edit(interaction, &first).await {
            return;
        }

        for chunk in chunks {
            if let Err(e) = self.responder.follow_up(interaction, &chunk, visibility).await {
                tracing::error!(error = ?e, "failed to send follow-up message");
                return;
            }
        }
    }

    /// Delivery failures past the claim are logged only
    async fn edit(&self, interaction: &Interaction, content: &str) -> bool {
        match self.responder.edit_original(interaction, content).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = ?e, "failed to edit original response");
                false
            }
        }
    }
}

/// An interaction cannot have outlived its window before the webhook even arrived unless the host
/// clock runs ahead of Discord's. Such an age is not trusted; the claim is attempted regardless and
/// a token that really is dead comes back as a fatal error.
fn trusted_age(age: Duration) -> Duration {
    if age < VALIDITY_WINDOW {
        return age;
    }

    tracing::warn!(
        age_ms = age.as_millis() as u64,
        window_ms = VALIDITY_WINDOW.as_millis() as u64,
        "interaction older than its validity window on arrival, host clock may be skewed"
    );
    Duration::ZERO
}
