use core::fmt;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

use crate::bot::interaction::Interaction;

pub type TransportResult<T> = core::result::Result<T, TransportError>;

/// Unknown interaction
pub const UNKNOWN_INTERACTION: u64 = 10062;
/// Interaction has already been acknowledged
pub const ALREADY_ACKNOWLEDGED: u64 = 40060;
/// Invalid webhook token
pub const INVALID_WEBHOOK_TOKEN: u64 = 50027;

const CALLBACK_DEFERRED: u8 = 5;
const CALLBACK_MESSAGE: u8 = 4;
const EPHEMERAL_FLAG: u64 = 1 << 6;

/// Discord rejects message content above this many characters
pub const MAX_CONTENT_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Only shown to the invoking user
    Private,
}

impl Visibility {
    fn flags(self) -> Option<u64> {
        match self {
            Visibility::Public => None,
            Visibility::Private => Some(EPHEMERAL_FLAG),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to discord failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("discord responded {status} (code {code:?}): {message}")]
    Api {
        status: StatusCode,
        code: Option<u64>,
        message: String,
    },
}

impl TransportError {
    /// Errors that retrying cannot fix: a dead or already-used token, or any client error other
    /// than rate limiting. Network failures and 5xx responses are transient.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::Reqwest(_) => false,
            TransportError::Api { status, code, .. } => {
                matches!(
                    code,
                    Some(UNKNOWN_INTERACTION | ALREADY_ACKNOWLEDGED | INVALID_WEBHOOK_TOKEN)
                ) || (status.is_client_error() && *status != StatusCode::TOO_MANY_REQUESTS)
            }
        }
    }
}

/// Outbound half of an interaction: claiming the response slot and writing into it afterwards.
///
/// `defer` and `reply` are both initial acknowledgments; exactly one of them may succeed per
/// interaction. `edit_original` and `follow_up` are only valid after that.
#[async_trait]
pub trait InteractionResponder: Send + Sync + fmt::Debug {
    async fn defer(&self, interaction: &Interaction, visibility: Visibility) -> TransportResult<()>;

    async fn reply(
        &self,
        interaction: &Interaction,
        content: &str,
        visibility: Visibility,
    ) -> TransportResult<()>;

    async fn edit_original(&self, interaction: &Interaction, content: &str) -> TransportResult<()>;

    async fn follow_up(
        &self,
        interaction: &Interaction,
        content: &str,
        visibility: Visibility,
    ) -> TransportResult<()>;
}

/// [`InteractionResponder`] over Discord's REST interaction endpoints
#[derive(Debug, Clone)]
pub struct DiscordResponder {
    client: reqwest::Client,
    api_url: String,
    application_id: String,
}

impl DiscordResponder {
    pub fn new(client: reqwest::Client, api_url: &str, application_id: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            application_id: application_id.to_string(),
        }
    }

    fn callback_uri(&self, interaction: &Interaction) -> String {
        format!(
            "{}/interactions/{}/{}/callback",
            self.api_url, interaction.id, interaction.token
        )
    }

    fn webhook_uri(&self, interaction: &Interaction) -> String {
        format!(
            "{}/webhooks/{}/{}",
            self.api_url, self.application_id, interaction.token
        )
    }

    /// Maps any non-2xx response onto [`TransportError::Api`], keeping Discord's JSON error code
    /// when the body carries one
    async fn check(res: reqwest::Response) -> TransportResult<()> {
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }

        let body = res.json::<Value>().await.unwrap_or_default();
        let code = body["code"].as_u64();
        let message = body["message"]
            .as_str()
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error"))
            .to_string();

        tracing::debug!(%status, ?code, reason = %message, "discord rejected request");
        Err(TransportError::Api {
            status,
            code,
            message,
        })
    }
}

fn message_body(content: &str, visibility: Visibility) -> Value {
    match visibility.flags() {
        Some(flags) => json!({ "content": content, "flags": flags }),
        None => json!({ "content": content }),
    }
}

#[async_trait]
impl InteractionResponder for DiscordResponder {
    #[instrument(skip(self, interaction), fields(interaction_id = %interaction.id))]
    async fn defer(&self, interaction: &Interaction, visibility: Visibility) -> TransportResult<()> {
        let data = match visibility.flags() {
            Some(flags) => json!({ "flags": flags }),
            None => json!({}),
        };

        let res = self
            .client
            .post(self.callback_uri(interaction))
            .json(&json!({ "type": CALLBACK_DEFERRED, "data": data }))
            .send()
            .await?;

        Self::check(res).await
    }

    #[instrument(skip(self, interaction, content), fields(interaction_id = %interaction.id))]
    async fn reply(
        &self,
        interaction: &Interaction,
        content: &str,
        visibility: Visibility,
    ) -> TransportResult<()> {
        let res = self
            .client
            .post(self.callback_uri(interaction))
            .json(&json!({
                "type": CALLBACK_MESSAGE,
                "data": message_body(content, visibility),
            }))
            .send()
            .await?;

        Self::check(res).await
    }

    #[instrument(skip(self, interaction, content), fields(interaction_id = %interaction.id))]
    async fn edit_original(&self, interaction: &Interaction, content: &str) -> TransportResult<()> {
        let res = self
            .client
            .patch(format!("{}/messages/@original", self.webhook_uri(interaction)))
            .json(&json!({ "content": content }))
            .send()
            .await?;

        Self::check(res).await
    }

    #[instrument(skip(self, interaction, content), fields(interaction_id = %interaction.id))]
    async fn follow_up(
        &self,
        interaction: &Interaction,
        content: &str,
        visibility: Visibility,
    ) -> TransportResult<()> {
        let res = self
            .client
            .post(self.webhook_uri(interaction))
            .json(&message_body(content, visibility))
            .send()
            .await?;

        Self::check(res).await
    }
}

/// Splits `content` on line boundaries into pieces Discord will accept. A single line longer
/// than the limit is hard-split on character boundaries.
pub fn split_content(content: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        let mut line = line.to_string();
        while line.chars().count() > MAX_CONTENT_LEN {
            let split_at = line
                .char_indices()
                .nth(MAX_CONTENT_LEN)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            let rest = line.split_off(split_at);
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(line);
            line = rest;
        }

        let needed = current.chars().count() + line.chars().count() + usize::from(!current.is_empty());
        if needed > MAX_CONTENT_LEN {
            chunks.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }

    chunks
}
