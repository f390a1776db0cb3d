//! Input rules shared by the bot (before anything is sent) and the api (before anything is
//! stored). Every constructor trims its input first; the trimmed value is what gets checked and
//! kept.

use core::fmt;

use serde::Serialize;
use thiserror::Error;

pub const DISCORD_ID_DIGITS: (usize, usize) = (15, 20);
pub const ALIAS_MAX_CHARS: usize = 25;
pub const QUESTION_CHARS: (usize, usize) = (5, 150);
pub const ANSWER_CHARS: (usize, usize) = (1, 75);

pub type ValidationResult<T> = core::result::Result<T, ValidationError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid Discord ID format")]
    DiscordId,

    #[error("Invalid RSN format (1–25 alphanumeric characters)")]
    Alias,

    #[error("Question must be 5–150 characters")]
    Question,

    #[error("Answer must be 1–75 characters")]
    Answer,

    #[error("Week must be 1 or greater")]
    Period,
}

/// Platform identity of the invoking user (a snowflake, kept as its decimal string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DiscordId(String);

/// The display name a user registers against their [`DiscordId`] (their RSN)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Alias(String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Question(String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Answer(String);

impl DiscordId {
    pub fn parse(raw: &str) -> ValidationResult<Self> {
        let raw = raw.trim();
        let (min, max) = DISCORD_ID_DIGITS;

        if (min..=max).contains(&raw.len()) && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::DiscordId)
        }
    }
}

impl Alias {
    pub fn parse(raw: &str) -> ValidationResult<Self> {
        let raw = raw.trim();
        let len = raw.chars().count();

        if (1..=ALIAS_MAX_CHARS).contains(&len) && raw.chars().all(is_alias_char) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::Alias)
        }
    }

    /// Wraps an alias read back from storage, cutting it to the alias length limit. Stored rows
    /// predate validation, so the charset is not re-checked here.
    pub fn from_stored(stored: &str) -> Self {
        Self(stored.trim().chars().take(ALIAS_MAX_CHARS).collect())
    }
}

impl Question {
    pub fn parse(raw: &str) -> ValidationResult<Self> {
        single_line_within(raw, QUESTION_CHARS)
            .map(Self)
            .ok_or(ValidationError::Question)
    }
}

impl Answer {
    pub fn parse(raw: &str) -> ValidationResult<Self> {
        single_line_within(raw, ANSWER_CHARS)
            .map(Self)
            .ok_or(ValidationError::Answer)
    }
}

/// Unicode-aware `\w`, `\s`, or `-`
fn is_alias_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c.is_whitespace()
}

fn single_line_within(raw: &str, (min, max): (usize, usize)) -> Option<String> {
    let raw = raw.trim();
    let len = raw.chars().count();

    ((min..=max).contains(&len) && !raw.contains('\n')).then(|| raw.to_string())
}

macro_rules! impl_str_newtype {
    ($($ty:ty),*) => {
        $(
            impl $ty {
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl AsRef<str> for $ty {
                fn as_ref(&self) -> &str {
                    &self.0
                }
            }
        )*
    };
}

impl_str_newtype!(DiscordId, Alias, Question, Answer);
