use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::{MatchedPath, State};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use http::StatusCode;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, instrument};

use crate::bot::interaction::{Interaction, InteractionKind};
use crate::bot::router::CommandRouter;
use crate::bot::verify::{VerifiedBody, verify_interaction};

#[derive(Debug)]
pub struct BotState {
    /// Raw ed25519 application key
    pub public_key: Vec<u8>,
    pub router: Arc<CommandRouter>,
}

pub fn router(state: Arc<BotState>) -> Router {
    Router::new()
        .route("/interactions", post(receive_interaction))
        .route_layer(from_fn_with_state(state.clone(), verify_interaction))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .with_state(state)
}

#[instrument(skip(state))]
pub async fn serve(state: Arc<BotState>, port: u16) -> std::io::Result<()> {
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let listener = TcpListener::bind(socket_addr).await?;

    tracing::info!(
        server_url = &format!("http://127.0.0.1:{}/interactions", listener.local_addr()?.port()),
        "interaction endpoint ready"
    );

    axum::serve(listener, router(state)).await
}

/// PINGs are answered inline. Everything else is acknowledged to the webhook straight away and
/// handled on its own task, which owns the interaction from then on.
async fn receive_interaction(
    State(state): State<Arc<BotState>>,
    body: VerifiedBody,
) -> Result<Response, StatusCode> {
    let received_at = Instant::now();
    let interaction: Interaction = body.as_json().map_err(|e| {
        tracing::warn!(error = ?e, "malformed interaction payload");
        StatusCode::BAD_REQUEST
    })?;

    if interaction.kind == InteractionKind::Ping {
        tracing::debug!("answering discord ping");
        return Ok(Json(json!({ "type": 1 })).into_response());
    }

    let router = state.router.clone();
    let span = tracing::info_span!("interaction", id = %interaction.id);
    tokio::spawn(async move { router.dispatch(interaction, received_at).await }.instrument(span));

    Ok(StatusCode::ACCEPTED.into_response())
}
