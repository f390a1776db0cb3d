use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::api::auth::API_KEY_HEADER;
use crate::db::models::{LeaderboardEntry, PeriodId};
use crate::trivia::validate::{Alias, Answer, DiscordId, Question};

pub type ApiClientResult<T> = core::result::Result<T, ApiClientError>;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// The backend answered, but said no. `message` is its `error` field and is safe to show to
    /// the user.
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("unexpected backend response ({status}): {body}")]
    UnexpectedResponse { status: StatusCode, body: Value },
}

#[derive(Debug, Serialize)]
pub struct SubmitPayload<'a> {
    pub discord_id: &'a DiscordId,
    pub question: &'a Question,
    pub answer: &'a Answer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_id: Option<PeriodId>,
}

#[derive(Debug, Serialize)]
struct RegisterPayload<'a> {
    discord_id: &'a DiscordId,
    rsn: &'a Alias,
}

/// HTTP client for the trivia backend. Every request carries the shared secret.
#[derive(Debug, Clone)]
pub struct TriviaApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TriviaApiClient {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    #[instrument(skip(self, id, alias), fields(rsn = %alias))]
    pub async fn register(&self, id: &DiscordId, alias: &Alias) -> ApiClientResult<()> {
        let res = self
            .client
            .post(&self.base_url)
            .query(&[("action", "register")])
            .header(API_KEY_HEADER, &self.api_key)
            .json(&RegisterPayload {
                discord_id: id,
                rsn: alias,
            })
            .send()
            .await?;

        Self::parse::<Value>(res).await.map(|_| ())
    }

    /// Returns whether the submission landed in overflow
    #[instrument(skip(self, payload), fields(week_id = ?payload.week_id))]
    pub async fn submit(&self, payload: &SubmitPayload<'_>) -> ApiClientResult<bool> {
        let res = self
            .client
            .post(&self.base_url)
            .query(&[("action", "submit")])
            .header(API_KEY_HEADER, &self.api_key)
            .json(payload)
            .send()
            .await?;

        let body = Self::parse::<Value>(res).await?;
        Ok(body["overflow"].as_bool().unwrap_or(false))
    }

    #[instrument(skip(self))]
    pub async fn leaderboard(
        &self,
        alias: Option<&Alias>,
        limit: Option<i64>,
    ) -> ApiClientResult<Vec<LeaderboardEntry>> {
        #[derive(serde::Deserialize)]
        struct Leaderboard {
            data: Vec<LeaderboardEntry>,
        }

        let mut query = vec![(String::from("action"), String::from("leaderboard"))];
        if let Some(alias) = alias {
            query.push((String::from("rsn"), alias.to_string()));
        }
        if let Some(limit) = limit {
            query.push((String::from("limit"), limit.to_string()));
        }

        let res = self
            .client
            .get(&self.base_url)
            .query(&query)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        Ok(Self::parse::<Leaderboard>(res).await?.data)
    }

    /// Non-2xx responses become [`ApiClientError::Rejected`] when the body carries an `error`
    /// message, [`ApiClientError::UnexpectedResponse`] otherwise
    async fn parse<T>(res: reqwest::Response) -> ApiClientResult<T>
    where
        T: DeserializeOwned,
    {
        let status = res.status();
        let body = res.json::<Value>().await.unwrap_or_default();

        if !status.is_success() {
            return Err(match body["error"].as_str() {
                Some(message) => ApiClientError::Rejected {
                    status,
                    message: message.to_string(),
                },
                None => ApiClientError::UnexpectedResponse { status, body },
            });
        }

        serde_json::from_value::<T>(body.clone())
            .map_err(|_| ApiClientError::UnexpectedResponse { status, body })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> TriviaApiClient {
        TriviaApiClient::new(reqwest::Client::new(), &server.uri(), "test-secret")
    }

    #[tokio::test]
    async fn test_register() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("action", "register"))
            .and(header("X-API-KEY", "test-secret"))
            .and(body_json(json!({ "discord_id": "123456789012345", "rsn": "Zezima" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .register(
                &DiscordId::parse("123456789012345").unwrap(),
                &Alias::parse("Zezima").unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_reports_overflow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("action", "submit"))
            .and(body_json(json!({
                "discord_id": "123456789012345",
                "question": "What is the max combat level?",
                "answer": "126",
                "week_id": 1
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true, "overflow": true })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = DiscordId::parse("123456789012345").unwrap();
        let question = Question::parse("What is the max combat level?").unwrap();
        let answer = Answer::parse("126").unwrap();

        let overflow = client(&server)
            .submit(&SubmitPayload {
                discord_id: &id,
                question: &question,
                answer: &answer,
                week_id: Some(1),
            })
            .await
            .unwrap();

        assert!(overflow);
    }

    #[tokio::test]
    async fn test_rejection_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(
                json!({ "error": "RSN not registered. Please run `/register` first." }),
            ))
            .mount(&server)
            .await;

        let id = DiscordId::parse("123456789012345").unwrap();
        let question = Question::parse("What is the max combat level?").unwrap();
        let answer = Answer::parse("126").unwrap();

        let err = client(&server)
            .submit(&SubmitPayload {
                discord_id: &id,
                question: &question,
                answer: &answer,
                week_id: None,
            })
            .await
            .unwrap_err();

        match err {
            ApiClientError::Rejected { status, message } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(message, "RSN not registered. Please run `/register` first.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_leaderboard() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "leaderboard"))
            .and(query_param("limit", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 2,
                "data": [
                    { "rsn": "Zezima", "score": 12 },
                    { "rsn": "Woox", "score": 9 }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let entries = client(&server).leaderboard(None, Some(3)).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rsn, "Zezima");
        assert_eq!(entries[1].score, 9);
    }

    #[tokio::test]
    async fn test_server_error_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server).leaderboard(None, None).await.unwrap_err();
        assert!(matches!(
            err,
            ApiClientError::UnexpectedResponse { status: StatusCode::BAD_GATEWAY, .. }
        ));
    }
}
