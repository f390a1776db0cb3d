//! Startup configuration.
//!
//! Variables are read exactly once (process environment plus an optional `.env` file) into a
//! [`Vars`] snapshot, which is then parsed into the typed config structs below. Nothing in the
//! crate reads the environment after startup; the structs are handed to the services that need
//! them.

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_BOT_PORT: u16 = 3001;
pub const DEFAULT_API_PORT: u16 = 3000;
pub const DEFAULT_LOG_FILTER: &str =
    "trivia_relay=debug,tower_http=debug,axum=debug,sqlx=info,info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    DiscordApplicationId,
    DiscordPublicKey,
    DiscordApiUrl,
    BotListenPort,
    TriviaApiUrl,
    TriviaApiKey,
    DatabaseUrl,
    ServerApiPort,
    RunMigrations,
    LogFormat,
    RustLog,
}

impl Var {
    pub const fn key(&self) -> &'static str {
        match self {
            Var::DiscordApplicationId => "DISCORD_APPLICATION_ID",
            Var::DiscordPublicKey => "DISCORD_PUBLIC_KEY",
            Var::DiscordApiUrl => "DISCORD_API_URL",
            Var::BotListenPort => "BOT_LISTEN_PORT",
            Var::TriviaApiUrl => "TRIVIA_API_URL",
            Var::TriviaApiKey => "TRIVIA_API_KEY",
            Var::DatabaseUrl => "DATABASE_URL",
            Var::ServerApiPort => "SERVER_API_PORT",
            Var::RunMigrations => "RUN_MIGRATIONS",
            Var::LogFormat => "LOG_FORMAT",
            Var::RustLog => "RUST_LOG",
        }
    }
}

/// Snapshot of the variables visible at startup
#[derive(Debug, Clone, Default)]
pub struct Vars {
    inner: HashMap<String, String>,
}

impl Vars {
    pub fn from_env() -> EnvResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Err(e) if e.not_found() => (),
            Err(e) => return Err(e.into()),
        }

        Ok(Self::from_iter(std::env::vars()))
    }

    pub fn get(&self, var: Var) -> Option<&str> {
        self.inner
            .get(var.key())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, var: Var) -> EnvResult<String> {
        self.get(var)
            .map(str::to_owned)
            .ok_or(EnvErr::MissingValue(var.key()))
    }

    pub fn parsed_or<T>(&self, var: Var, default: T) -> EnvResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            Some(raw) => raw.parse::<T>().map_err(|e| EnvErr::InvalidValue {
                var: var.key(),
                reason: format!("{e}: while parsing '{raw}'"),
            }),
            None => Ok(default),
        }
    }
}

impl FromIterator<(String, String)> for Vars {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub application_id: String,
    /// Raw 32-byte ed25519 public key used to verify inbound interactions
    pub public_key: Vec<u8>,
    pub discord_api_url: String,
    pub listen_port: u16,
    pub trivia_api_url: String,
    pub trivia_api_key: String,
}

impl BotConfig {
    pub fn from_vars(vars: &Vars) -> EnvResult<Self> {
        let key_hex = vars.required(Var::DiscordPublicKey)?;
        let public_key = hex::decode(&key_hex).map_err(|e| EnvErr::InvalidValue {
            var: Var::DiscordPublicKey.key(),
            reason: e.to_string(),
        })?;

        if public_key.len() != 32 {
            return Err(EnvErr::InvalidValue {
                var: Var::DiscordPublicKey.key(),
                reason: format!("expected 32 bytes, got {}", public_key.len()),
            });
        }

        Ok(Self {
            application_id: vars.required(Var::DiscordApplicationId)?,
            public_key,
            discord_api_url: vars
                .get(Var::DiscordApiUrl)
                .unwrap_or(DEFAULT_DISCORD_API_URL)
                .trim_end_matches('/')
                .to_string(),
            listen_port: vars.parsed_or(Var::BotListenPort, DEFAULT_BOT_PORT)?,
            trivia_api_url: vars.required(Var::TriviaApiUrl)?,
            trivia_api_key: vars.required(Var::TriviaApiKey)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Absent only when the api runs against the in-memory store
    pub database_url: Option<String>,
    pub port: u16,
    pub api_key: String,
    pub run_migrations: bool,
}

impl ApiConfig {
    pub fn from_vars(vars: &Vars, memory_store: bool) -> EnvResult<Self> {
        let database_url = match memory_store {
            true => None,
            false => Some(vars.required(Var::DatabaseUrl)?),
        };

        Ok(Self {
            database_url,
            port: vars.parsed_or(Var::ServerApiPort, DEFAULT_API_PORT)?,
            api_key: vars.required(Var::TriviaApiKey)?,
            run_migrations: vars.parsed_or(Var::RunMigrations, true)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    pub filter: String,
}

impl TelemetryConfig {
    pub fn from_vars(vars: &Vars) -> EnvResult<Self> {
        Ok(Self {
            format: vars.parsed_or(Var::LogFormat, LogFormat::default())?,
            filter: vars
                .get(Var::RustLog)
                .unwrap_or(DEFAULT_LOG_FILTER)
                .to_string(),
        })
    }
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error("missing required variable '{0}'")]
    MissingValue(&'static str),

    #[error("invalid value for '{var}': {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

#[cfg(test)]
mod test {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const PUBLIC_KEY_HEX: &str = "e1b5d0c7c5ab3d4b8a9aa4d0e6b1f2a3c4d5e6f708192a3b4c5d6e7f80910203";

    #[test]
    fn test_bot_config_defaults() {
        let vars = vars(&[
            ("DISCORD_APPLICATION_ID", "1111111111111111111"),
            ("DISCORD_PUBLIC_KEY", PUBLIC_KEY_HEX),
            ("TRIVIA_API_URL", "http://localhost:3000"),
            ("TRIVIA_API_KEY", "secret"),
        ]);

        let config = BotConfig::from_vars(&vars).unwrap();
        assert_eq!(config.public_key.len(), 32);
        assert_eq!(config.discord_api_url, DEFAULT_DISCORD_API_URL);
        assert_eq!(config.listen_port, DEFAULT_BOT_PORT);
    }

    #[test]
    fn test_bot_config_rejects_short_key() {
        let vars = vars(&[
            ("DISCORD_APPLICATION_ID", "1111111111111111111"),
            ("DISCORD_PUBLIC_KEY", "abcd"),
            ("TRIVIA_API_URL", "http://localhost:3000"),
            ("TRIVIA_API_KEY", "secret"),
        ]);

        assert!(matches!(
            BotConfig::from_vars(&vars),
            Err(EnvErr::InvalidValue { var: "DISCORD_PUBLIC_KEY", .. })
        ));
    }

    #[test]
    fn test_api_config() {
        let vars = vars(&[
            ("TRIVIA_API_KEY", "secret"),
            ("SERVER_API_PORT", "8080"),
            ("RUN_MIGRATIONS", "false"),
        ]);

        assert!(matches!(
            ApiConfig::from_vars(&vars, false),
            Err(EnvErr::MissingValue("DATABASE_URL"))
        ));

        let config = ApiConfig::from_vars(&vars, true).unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.run_migrations);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_bad_port_names_variable() {
        let vars = vars(&[("TRIVIA_API_KEY", "secret"), ("SERVER_API_PORT", "eighty")]);
        let err = ApiConfig::from_vars(&vars, true).unwrap_err();
        assert!(err.to_string().contains("SERVER_API_PORT"));
    }

    #[test]
    fn test_log_format() {
        let config = TelemetryConfig::from_vars(&vars(&[("LOG_FORMAT", "JSON")])).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, DEFAULT_LOG_FILTER);
    }
}
