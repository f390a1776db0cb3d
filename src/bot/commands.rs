use thiserror::Error;
use tracing::instrument;

use crate::bot::client::{ApiClientError, SubmitPayload, TriviaApiClient};
use crate::bot::interaction::OptionBag;
use crate::bot::transport::Visibility;
use crate::db::models::{LeaderboardEntry, PeriodId};
use crate::trivia::validate::{
    Alias, Answer, DiscordId, Question, ValidationError, ValidationResult,
};
use crate::trivia::week::period_from_week;

pub type CommandResult<T> = core::result::Result<T, CommandError>;

pub const BOT_VERSION: &str = "0.3.7 Alpha";

pub const HELP_TEXT: &str = "**Trivia Bot Help**
Submit questions here: https://wecantread.club/trivia/
If you receive \"command not found\", try again after a few seconds.

• First register: `/register rsn:<Your RSN>`
• Then submit: `/submit question:<Your Question> answer:<Correct Answer> [week:<Number>]`";

pub const UNKNOWN_COMMAND: &str = "Unknown command.";
pub const UNSUPPORTED_TYPE: &str = "Unsupported command type.";
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred.";
pub const PING_PLACEHOLDER: &str = "Pinging...";

#[derive(Debug, Error)]
pub enum CommandError {
    /// Network-level failure talking to the backend; user-facing rejections never surface here
    #[error(transparent)]
    Client(#[from] ApiClientError),
}

/// Every slash command the bot answers, split by how the first response is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Claimed with a placeholder reply, then edited with the measured latencies
    Ping,
    /// Claimed with a "thinking" state, then edited with the output of [`DeferredCommand::run`]
    Deferred(DeferredCommand),
}

/// Options are kept raw here and validated when the command runs, so validation failures can be
/// reported through the claimed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredCommand {
    HelpTrivia,
    Version,
    Register {
        alias: Option<String>,
    },
    Submit {
        question: Option<String>,
        answer: Option<String>,
        /// 1-based, as the user sees it
        period: Option<i64>,
    },
    Leaderboard {
        alias: Option<String>,
        limit: Option<i64>,
    },
}

impl Command {
    /// `None` for names outside the command set. Legacy option names (`rsn`, `week`) are
    /// accepted alongside the current ones.
    pub fn parse(name: &str, options: OptionBag<'_>) -> Option<Self> {
        let command = match name {
            "ping" => return Some(Self::Ping),
            "helptrivia" => DeferredCommand::HelpTrivia,
            "version" => DeferredCommand::Version,
            "register" => DeferredCommand::Register {
                alias: options.string(&["alias", "rsn"]),
            },
            "submit" => DeferredCommand::Submit {
                question: options.string(&["question"]),
                answer: options.string(&["answer"]),
                period: options.integer(&["period", "week"]),
            },
            "leaderboard" => DeferredCommand::Leaderboard {
                alias: options.string(&["alias", "rsn"]),
                limit: options.integer(&["limit"]),
            },
            _ => return None,
        };

        Some(Self::Deferred(command))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Deferred(command) => command.name(),
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            Self::Ping => Visibility::Public,
            Self::Deferred(command) => command.visibility(),
        }
    }
}

/// Final content for the ping command once its placeholder has been claimed
pub fn ping_report(round_trip_ms: u128, api_latency_ms: u128) -> String {
    format!("Pong! Round-trip latency: {round_trip_ms}ms\nDiscord API latency: {api_latency_ms}ms")
}

impl DeferredCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HelpTrivia => "helptrivia",
            Self::Version => "version",
            Self::Register { .. } => "register",
            Self::Submit { .. } => "submit",
            Self::Leaderboard { .. } => "leaderboard",
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            Self::Version | Self::Leaderboard { .. } => Visibility::Public,
            Self::HelpTrivia | Self::Register { .. } | Self::Submit { .. } => Visibility::Private,
        }
    }

    /// Produces the content for the claimed response. Validation failures and backend
    /// rejections are answers too; only transport failures are errors.
    #[instrument(skip(self, api), fields(command = self.name()))]
    pub async fn run(&self, invoker_id: &str, api: &TriviaApiClient) -> CommandResult<String> {
        match self {
            Self::HelpTrivia => Ok(HELP_TEXT.to_string()),
            Self::Version => Ok(format!("Trivia Bot version: {BOT_VERSION}")),
            Self::Register { alias } => register(invoker_id, alias.as_deref(), api).await,
            Self::Submit {
                question,
                answer,
                period,
            } => {
                submit(
                    invoker_id,
                    question.as_deref(),
                    answer.as_deref(),
                    *period,
                    api,
                )
                .await
            }
            Self::Leaderboard { alias, limit } => {
                leaderboard(alias.as_deref(), *limit, api).await
            }
        }
    }
}

async fn register(
    invoker_id: &str,
    alias: Option<&str>,
    api: &TriviaApiClient,
) -> CommandResult<String> {
    let validated = DiscordId::parse(invoker_id).and_then(|id| {
        let alias = Alias::parse(alias.ok_or(ValidationError::MissingField("rsn"))?)?;
        Ok((id, alias))
    });

    let (id, alias) = match validated {
        Ok(v) => v,
        Err(e) => return Ok(format!("Registration failed: {e}")),
    };

    match api.register(&id, &alias).await {
        Ok(()) => Ok(format!("Registered as {alias}")),
        Err(e) => rejection("Registration failed", e),
    }
}

async fn submit(
    invoker_id: &str,
    question: Option<&str>,
    answer: Option<&str>,
    period: Option<i64>,
    api: &TriviaApiClient,
) -> CommandResult<String> {
    let validated = validate_submission(invoker_id, question, answer, period);

    let (id, question, answer, week_id) = match validated {
        Ok(v) => v,
        Err(e) => return Ok(format!("Submission failed: {e}")),
    };

    let payload = SubmitPayload {
        discord_id: &id,
        question: &question,
        answer: &answer,
        week_id,
    };

    match api.submit(&payload).await {
        Ok(overflow) => {
            tracing::info!(overflow, ?week_id, "question submitted");
            Ok(String::from("Question submitted successfully."))
        }
        Err(e) => rejection("Submission failed", e),
    }
}

type ValidSubmission = (DiscordId, Question, Answer, Option<PeriodId>);

fn validate_submission(
    invoker_id: &str,
    question: Option<&str>,
    answer: Option<&str>,
    period: Option<i64>,
) -> ValidationResult<ValidSubmission> {
    let id = DiscordId::parse(invoker_id)?;
    let question = Question::parse(question.ok_or(ValidationError::MissingField("question"))?)?;
    let answer = Answer::parse(answer.ok_or(ValidationError::MissingField("answer"))?)?;
    let week_id = match period {
        Some(week) if week < 1 => return Err(ValidationError::Period),
        Some(week) => Some(period_from_week(week)),
        None => None,
    };

    Ok((id, question, answer, week_id))
}

async fn leaderboard(
    alias: Option<&str>,
    limit: Option<i64>,
    api: &TriviaApiClient,
) -> CommandResult<String> {
    let alias = match alias.map(Alias::parse).transpose() {
        Ok(alias) => alias,
        Err(e) => return Ok(format!("Leaderboard lookup failed: {e}")),
    };

    match api.leaderboard(alias.as_ref(), limit).await {
        Ok(entries) => Ok(render_leaderboard(&entries)),
        Err(e) => rejection("Leaderboard lookup failed", e),
    }
}

/// Backend rejections are shown to the user; transport failures propagate
fn rejection(prefix: &str, err: ApiClientError) -> CommandResult<String> {
    match err {
        ApiClientError::Rejected { message, .. } => Ok(format!("{prefix}: {message}")),
        ApiClientError::UnexpectedResponse { status, .. } => {
            tracing::warn!(%status, "backend response had no error message");
            Ok(format!("{prefix}: Unknown error"))
        }
        e @ ApiClientError::Reqwest(_) => Err(e.into()),
    }
}

pub fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return String::from("No leaderboard entries found.");
    }

    let mut out = String::from("**Trivia Leaderboard**");
    for (rank, entry) in entries.iter().enumerate() {
        out.push_str(&format!("\n{}. {} ({} pts)", rank + 1, entry.rsn, entry.score));
    }

    out
}
