use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Query, State};
use chrono::Utc;
use http::{Extensions, HeaderMap, Method};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::api::auth::verify_shared_secret;
use crate::api::server::{AppState, JsonResult, RouteError};
use crate::db::models::{LeaderboardEntry, PeriodId};
use crate::trivia::leaderboard::{self, LeaderboardQuery};
use crate::trivia::registration::register;
use crate::trivia::routing::{SubmissionRequest, submit};
use crate::trivia::validate::{Alias, Answer, DiscordId, Question, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Register,
    Submit,
    Leaderboard,
}

impl Action {
    /// Only the exact action/method pairs are routable; anything else is a 404
    pub fn resolve(action: &str, method: &Method) -> Option<Self> {
        match (action.trim_matches('/'), method) {
            ("register", &Method::POST) => Some(Self::Register),
            ("submit", &Method::POST) => Some(Self::Submit),
            ("leaderboard", &Method::GET) => Some(Self::Leaderboard),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionParams {
    pub action: Option<String>,
    pub api_key: Option<String>,
    pub rsn: Option<String>,
    pub limit: Option<String>,
}

/// Everything a handler may need from the request, extracted once
pub struct ActionRequest {
    pub method: Method,
    pub params: ActionParams,
    pub headers: HeaderMap,
    pub source_ip: Option<IpAddr>,
    pub body: Bytes,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overflow: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub count: usize,
    pub data: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActionResponse {
    Success(SuccessResponse),
    Leaderboard(LeaderboardResponse),
}

pub async fn dispatch_by_query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActionParams>,
    method: Method,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> JsonResult<ActionResponse> {
    let action = params.action.clone().unwrap_or_default();
    let request = ActionRequest {
        method,
        params,
        headers,
        source_ip: source_ip(&extensions),
        body,
    };

    dispatch(&state, &action, request).await
}

pub async fn dispatch_by_path(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
    Query(params): Query<ActionParams>,
    method: Method,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> JsonResult<ActionResponse> {
    let request = ActionRequest {
        method,
        params,
        headers,
        source_ip: source_ip(&extensions),
        body,
    };

    dispatch(&state, &action, request).await
}

#[instrument(skip(state, request), fields(method = %request.method))]
async fn dispatch(
    state: &AppState,
    action: &str,
    request: ActionRequest,
) -> JsonResult<ActionResponse> {
    let response = match Action::resolve(action, &request.method).ok_or(RouteError::NotFound)? {
        Action::Register => handle_register(state, request).await?,
        Action::Submit => handle_submit(state, request).await?,
        Action::Leaderboard => handle_leaderboard(state, request).await?,
    };

    Ok(Json(response))
}

#[instrument(skip_all)]
async fn handle_register(state: &AppState, request: ActionRequest) -> Result<ActionResponse, RouteError> {
    let data = json_object(&request.body)?;
    let discord_id = required_field(&data, "discord_id")?;
    let rsn = required_field(&data, "rsn")?;

    let discord_id = DiscordId::parse(&discord_id)?;
    let alias = Alias::parse(&rsn)?;

    register(state.store.as_ref(), &discord_id, &alias)
        .await
        .map_err(RouteError::UpsertFailed)?;

    Ok(ActionResponse::Success(SuccessResponse {
        success: true,
        overflow: None,
    }))
}

#[instrument(skip_all, fields(source_ip = ?request.source_ip))]
async fn handle_submit(state: &AppState, request: ActionRequest) -> Result<ActionResponse, RouteError> {
    verify_shared_secret(
        request.params.api_key.as_deref(),
        &request.headers,
        &state.api_key,
    )?;

    let data = json_object(&request.body)?;
    let discord_id = required_field(&data, "discord_id")?;
    let question = required_field(&data, "question")?;
    let answer = required_field(&data, "answer")?;

    let submission = SubmissionRequest {
        discord_id: DiscordId::parse(&discord_id)?,
        question: Question::parse(&question)?,
        answer: Answer::parse(&answer)?,
        period_id: optional_period(&data),
        source_ip: request.source_ip,
    };

    let receipt = submit(state.store.as_ref(), submission, Utc::now()).await?;

    Ok(ActionResponse::Success(SuccessResponse {
        success: true,
        overflow: Some(receipt.overflow()),
    }))
}

#[instrument(skip_all)]
async fn handle_leaderboard(
    state: &AppState,
    request: ActionRequest,
) -> Result<ActionResponse, RouteError> {
    let alias = match request.params.rsn.as_deref().map(str::trim) {
        Some(rsn) if !rsn.is_empty() => Some(Alias::parse(rsn)?),
        _ => None,
    };

    let limit = request
        .params
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<i64>().ok());

    let data = leaderboard::query(state.store.as_ref(), &LeaderboardQuery { alias, limit })
        .await
        .map_err(RouteError::QueryFailed)?;

    Ok(ActionResponse::Leaderboard(LeaderboardResponse {
        count: data.len(),
        data,
    }))
}

fn source_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn json_object(body: &Bytes) -> Result<Map<String, Value>, RouteError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(RouteError::InvalidJson),
    }
}

/// Absent, null, empty and zero-ish values all count as missing
fn required_field(data: &Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    let value = match data.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    if value.is_empty() || value == "0" {
        return Err(ValidationError::MissingField(field));
    }

    Ok(value)
}

/// `week_id` is optional; anything that is not an integer (or integer string) is ignored
fn optional_period(data: &Map<String, Value>) -> Option<PeriodId> {
    match data.get("week_id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<PeriodId>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use serde_json::json;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::server::router;
    use crate::db::prelude::*;

    const API_KEY: &str = "test-secret";
    const DISCORD_ID: &str = "123456789012345";

    fn app(store: MemoryStore) -> axum::Router {
        router(Arc::new(AppState {
            store: Arc::new(store),
            api_key: API_KEY.to_string(),
        }))
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("X-API-KEY", API_KEY)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: axum::Router, request: Request<Body>) -> (http::StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_register_then_reregister() {
        let store = MemoryStore::new();

        let (status, body) = send(
            app(store.clone()),
            post(
                "/?action=register",
                json!({ "discord_id": DISCORD_ID, "rsn": "Zezima" }),
            ),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "success": true }));

        let (status, _) = send(
            app(store.clone()),
            post(
                "/register",
                json!({ "discord_id": DISCORD_ID, "rsn": "Zezima2" }),
            ),
        )
        .await;
        assert_eq!(status, 200);

        let records = store.registrations().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].discord_id, DISCORD_ID);
        assert_eq!(records[0].rsn, "Zezima2");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let store = MemoryStore::new();

        let (status, body) = send(
            app(store.clone()),
            post(
                "/?action=register",
                json!({ "discord_id": DISCORD_ID, "rsn": "x".repeat(26) }),
            ),
        )
        .await;
        assert_eq!(status, 422);
        assert_eq!(body["error"], "Invalid RSN format (1–25 alphanumeric characters)");

        let (status, body) = send(
            app(store.clone()),
            post("/?action=register", json!({ "discord_id": "42", "rsn": "Zezima" })),
        )
        .await;
        assert_eq!(status, 422);
        assert_eq!(body["error"], "Invalid Discord ID format");

        let (status, body) = send(
            app(store.clone()),
            post("/?action=register", json!({ "discord_id": DISCORD_ID })),
        )
        .await;
        assert_eq!(status, 422);
        assert_eq!(body["error"], "Missing field: rsn");

        assert!(store.registrations().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_and_unknown_action() {
        let request = Request::builder()
            .method("POST")
            .uri("/?action=register")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app(MemoryStore::new()), request).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Invalid JSON");

        let (status, body) = send(app(MemoryStore::new()), get("/?action=register")).await;
        assert_eq!(status, 404);
        assert_eq!(body["error"], "Not Found");

        let (status, _) = send(app(MemoryStore::new()), get("/")).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn test_unmatched_routes_answer_not_found() {
        let store = MemoryStore::new();
        let request = |method: &str, uri: &str| {
            Request::builder()
                .method(method)
                .uri(uri)
                .header("X-API-KEY", API_KEY)
                .body(Body::from(json!({ "discord_id": DISCORD_ID }).to_string()))
                .unwrap()
        };

        for (method, uri) in [("DELETE", "/register"), ("PUT", "/?action=submit"), ("GET", "/a/b")] {
            let (status, body) = send(app(store.clone()), request(method, uri)).await;
            assert_eq!(status, 404, "{method} {uri}");
            assert_eq!(body, json!({ "error": "Not Found" }), "{method} {uri}");
        }

        // a trailing slash names the same action
        let (status, body) = send(
            app(store.clone()),
            post(
                "/register/",
                json!({ "discord_id": DISCORD_ID, "rsn": "Zezima" }),
            ),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "success": true }));
        assert_eq!(store.registrations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_requires_secret() {
        let store = MemoryStore::new();
        let request = Request::builder()
            .method("POST")
            .uri("/?action=submit")
            .body(Body::from(
                json!({ "discord_id": DISCORD_ID, "question": "Who is Zezima?", "answer": "A legend" })
                    .to_string(),
            ))
            .unwrap();

        let (status, body) = send(app(store.clone()), request).await;
        assert_eq!(status, 401);
        assert_eq!(body["error"], "Unauthorized");
        assert!(store.submissions(Destination::Live).await.is_empty());
    }

    #[tokio::test]
    async fn test_submit_unregistered_is_forbidden() {
        let (status, body) = send(
            app(MemoryStore::new()),
            post(
                "/?action=submit",
                json!({ "discord_id": DISCORD_ID, "question": "Who is Zezima?", "answer": "A legend" }),
            ),
        )
        .await;

        assert_eq!(status, 403);
        assert_eq!(body["error"], "RSN not registered. Please run `/register` first.");
    }

    #[tokio::test]
    async fn test_submit_routes_live_and_overflow() {
        let store = MemoryStore::new();
        store
            .upsert_registration(
                &DiscordId::parse(DISCORD_ID).unwrap(),
                &Alias::parse("Zezima").unwrap(),
            )
            .await
            .unwrap();
        store
            .put_period(CollectionPeriod {
                id: 1,
                is_closed: false,
                end_datetime: None,
            })
            .await;
        store
            .put_period(CollectionPeriod {
                id: 2,
                is_closed: false,
                end_datetime: Some(Utc::now() - Duration::minutes(5)),
            })
            .await;

        let (status, body) = send(
            app(store.clone()),
            post(
                "/?action=submit",
                json!({
                    "discord_id": DISCORD_ID,
                    "question": "What is the max total level?",
                    "answer": "2277",
                    "week_id": 1
                }),
            ),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "success": true, "overflow": false }));

        let (status, body) = send(
            app(store.clone()),
            post(
                "/submit?api_key=test-secret",
                json!({
                    "discord_id": DISCORD_ID,
                    "question": "What is the max total level?",
                    "answer": "2277",
                    "week_id": "2"
                }),
            ),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["overflow"], true);

        let live = store.submissions(Destination::Live).await;
        let overflow = store.submissions(Destination::Overflow).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].period_id, 1);
        assert_eq!(overflow.len(), 1);
        assert_eq!(overflow[0].period_id, 2);
    }

    #[tokio::test]
    async fn test_submit_question_bounds() {
        let store = MemoryStore::new();
        store
            .upsert_registration(
                &DiscordId::parse(DISCORD_ID).unwrap(),
                &Alias::parse("Zezima").unwrap(),
            )
            .await
            .unwrap();

        let (status, body) = send(
            app(store.clone()),
            post(
                "/?action=submit",
                json!({ "discord_id": DISCORD_ID, "question": "Why", "answer": "ok" }),
            ),
        )
        .await;
        assert_eq!(status, 422);
        assert_eq!(body["error"], "Question must be 5–150 characters");

        let (status, body) = send(
            app(store.clone()),
            post(
                "/?action=submit",
                json!({ "discord_id": DISCORD_ID, "question": "Why though?", "answer": "a".repeat(76) }),
            ),
        )
        .await;
        assert_eq!(status, 422);
        assert_eq!(body["error"], "Answer must be 1–75 characters");

        assert!(store.submissions(Destination::Live).await.is_empty());
        assert!(store.submissions(Destination::Overflow).await.is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_limit_clamped() {
        let store = MemoryStore::new();
        for i in 0..150 {
            store.put_score(&format!("player{i}"), i).await;
        }

        let (status, body) = send(app(store.clone()), get("/?action=leaderboard&limit=500")).await;
        assert_eq!(status, 200);
        assert_eq!(body["count"], 100);
        assert_eq!(body["data"].as_array().unwrap().len(), 100);
        assert_eq!(body["data"][0], json!({ "rsn": "player149", "score": 149 }));

        let (_, body) = send(app(store.clone()), get("/leaderboard?rsn=player7")).await;
        assert_eq!(body, json!({ "count": 1, "data": [{ "rsn": "player7", "score": 7 }] }));

        let (status, _) = send(app(store), get("/?action=leaderboard&rsn=bad;name")).await;
        assert_eq!(status, 422);
    }

    #[test]
    fn test_optional_period() {
        let data = |v: Value| v.as_object().cloned().unwrap();

        assert_eq!(optional_period(&data(json!({ "week_id": 0 }))), Some(0));
        assert_eq!(optional_period(&data(json!({ "week_id": "3" }))), Some(3));
        assert_eq!(optional_period(&data(json!({ "week_id": "three" }))), None);
        assert_eq!(optional_period(&data(json!({}))), None);
    }
}
