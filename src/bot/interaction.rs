use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Discord's epoch (2015-01-01T00:00:00Z) in unix milliseconds
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "u8")]
pub enum InteractionKind {
    Ping,
    ApplicationCommand,
    MessageComponent,
    Autocomplete,
    ModalSubmit,
    Other(u8),
}

impl From<u8> for InteractionKind {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::MessageComponent,
            4 => Self::Autocomplete,
            5 => Self::ModalSubmit,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub application_id: String,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub token: String,
    #[serde(default)]
    pub data: Option<CommandData>,
    /// Present for guild invocations
    #[serde(default)]
    pub member: Option<Member>,
    /// Present for DM invocations
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

impl Interaction {
    pub fn invoker(&self) -> Option<&User> {
        self.member
            .as_ref()
            .map(|m| &m.user)
            .or(self.user.as_ref())
    }

    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.name.as_str())
    }

    pub fn options(&self) -> OptionBag<'_> {
        OptionBag(self.data.as_ref().map(|d| d.options.as_slice()).unwrap_or_default())
    }

    /// Creation time encoded in the top 42 bits of the snowflake id
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let snowflake = self.id.parse::<u64>().ok()?;
        let unix_ms = i64::try_from(snowflake >> 22).ok()? + DISCORD_EPOCH_MS;

        DateTime::from_timestamp_millis(unix_ms)
    }

    /// Age of the interaction at `now`; unparseable ids and clock skew both count as zero
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        self.created_at()
            .and_then(|created| (now - created).to_std().ok())
            .unwrap_or_default()
    }
}

/// Read-only view over the options a user supplied with a command
#[derive(Debug, Clone, Copy)]
pub struct OptionBag<'a>(&'a [CommandOption]);

impl<'a> OptionBag<'a> {
    fn value(&self, name: &str) -> Option<&'a Value> {
        self.0
            .iter()
            .find(|opt| opt.name == name)
            .and_then(|opt| opt.value.as_ref())
    }

    /// First of `names` that was supplied, rendered as a string
    pub fn string(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| match self.value(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn integer(&self, names: &[&str]) -> Option<i64> {
        names.iter().find_map(|name| match self.value(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// `name=value` pairs for the audit log
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|opt| match &opt.value {
                Some(Value::String(s)) => format!("{}={}", opt.name, s),
                Some(v) => format!("{}={}", opt.name, v),
                None => opt.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
