use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::{dispatch_by_path, dispatch_by_query};
use crate::db::{StoreError, TriviaStore};
use crate::trivia::TriviaError;
use crate::trivia::validate::ValidationError;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Arc<dyn TriviaStore>,
    pub api_key: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // `?action=register` and `/register` are equivalent
        .route("/", get(dispatch_by_query).post(dispatch_by_query))
        .route("/{action}", get(dispatch_by_path).post(dispatch_by_path))
        .route("/{action}/", get(dispatch_by_path).post(dispatch_by_path))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
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
        .layer(from_fn(log_route_errors))
        .with_state(state)
}

async fn not_found() -> RouteError {
    RouteError::NotFound
}

#[instrument(skip(state))]
pub async fn serve(state: Arc<AppState>, port: u16) -> std::io::Result<()> {
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let listener = TcpListener::bind(socket_addr).await?;

    tracing::info!(
        server_url = &format!("http://127.0.0.1:{}", listener.local_addr()?.port()),
        "api server ready"
    );

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

/// Logs the `RouteError` attached to an error response by [`RouteError::into_response`]
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Not Found")]
    NotFound,

    #[error("Invalid JSON")]
    InvalidJson,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Trivia(#[from] TriviaError),

    #[error("DB upsert failed")]
    UpsertFailed(#[source] StoreError),

    #[error("DB query failed")]
    QueryFailed(#[source] StoreError),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let (status, error, err) = match &self {
            RouteError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), None),

            RouteError::InvalidJson => (StatusCode::BAD_REQUEST, self.to_string(), None),

            RouteError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), None),

            RouteError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), Some(self)),

            RouteError::Trivia(TriviaError::NotRegistered) => (
                StatusCode::FORBIDDEN,
                TriviaError::NotRegistered.to_string(),
                None,
            ),

            RouteError::Trivia(TriviaError::Store(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("DB insert failed"),
                Some(self),
            ),

            RouteError::UpsertFailed(_) | RouteError::QueryFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
                Some(self),
            ),
        };

        let mut response = (status, Json(ErrorResponse { error })).into_response();
        if let Some(err) = err {
            response.extensions_mut().insert(Arc::new(err));
        }

        response
    }
}
