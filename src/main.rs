use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::future::join_all;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::api::server::AppState;
use crate::bot::client::TriviaApiClient;
use crate::bot::router::CommandRouter;
use crate::bot::server::BotState;
use crate::bot::transport::DiscordResponder;
use crate::db::prelude::*;
use crate::util::env::{ApiConfig, BotConfig, EnvErr, TelemetryConfig, Vars};

mod api;
mod bot;
mod db;
mod trivia;
mod util;

#[derive(Parser, Debug)]
#[command(version, about = "Discord trivia bot and submission backend")]
struct Cli {
    #[command(subcommand)]
    service: Service,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Service {
    /// Discord interaction endpoint
    Bot,

    /// Submission backend
    Api {
        /// Keep everything in process memory instead of Postgres
        #[arg(long)]
        memory: bool,
    },

    /// Both services in one process
    All {
        #[arg(long)]
        memory: bool,
    },
}

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error + Send + Sync>),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let vars = Vars::from_env()?;
    util::tracing::build_subscriber(&TelemetryConfig::from_vars(&vars)?)?;

    tracing::info!(service = ?cli.service, version = env!("CARGO_PKG_VERSION"), "starting trivia relay");

    let mut handles = Vec::new();
    match cli.service {
        Service::Bot => handles.push(start_bot(&vars)?),
        Service::Api { memory } => handles.push(start_api(&vars, memory).await?),
        Service::All { memory } => {
            handles.push(start_api(&vars, memory).await?);
            handles.push(start_bot(&vars)?);
        }
    }

    for result in join_all(handles).await {
        match result {
            Ok(Err(e)) => tracing::error!(error = ?e, "service exited with an error"),
            Err(e) => tracing::error!(error = ?e, "service task panicked"),
            Ok(Ok(())) => {}
        }
    }

    Ok(())
}

fn start_bot(vars: &Vars) -> Result<JoinHandle<std::io::Result<()>>> {
    let config = BotConfig::from_vars(vars)?;
    let http = reqwest::Client::new();

    let responder = DiscordResponder::new(
        http.clone(),
        &config.discord_api_url,
        &config.application_id,
    );
    let api = TriviaApiClient::new(http, &config.trivia_api_url, &config.trivia_api_key);

    let state = Arc::new(BotState {
        public_key: config.public_key,
        router: Arc::new(CommandRouter::new(Arc::new(responder), api)),
    });

    Ok(tokio::spawn(bot::server::serve(state, config.listen_port)))
}

async fn start_api(vars: &Vars, memory: bool) -> Result<JoinHandle<std::io::Result<()>>> {
    let config = ApiConfig::from_vars(vars, memory)?;

    let store: Arc<dyn TriviaStore> = match &config.database_url {
        Some(url) => {
            let pool = db::connect(url, config.run_migrations).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("using in-memory store, nothing will be persisted");
            let store = MemoryStore::new();
            store
                .put_period(CollectionPeriod {
                    id: 0,
                    is_closed: false,
                    end_datetime: None,
                })
                .await;
            Arc::new(store)
        }
    };

    let state = Arc::new(AppState {
        store,
        api_key: config.api_key,
    });

    Ok(tokio::spawn(api::server::serve(state, config.port)))
}
