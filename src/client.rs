//! HTTP client for the Snapdeck API, used by the CLI subcommands.
//!
//! The base URL comes from `SNAPDECK_URL` (default:
//! `http://localhost:3000/api/v1`).

use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

const DEFAULT_URL: &str = "http://localhost:3000/api/v1";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server error: {0}")]
    Server(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Clone)]
pub struct StudyClient {
    base_url: String,
    client: Client,
}

impl StudyClient {
    pub fn from_env() -> Self {
        let base_url = std::env::var("SNAPDECK_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        match status {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(message)),
            StatusCode::BAD_REQUEST => Err(ClientError::BadRequest(message)),
            StatusCode::CONFLICT => Err(ClientError::Conflict(message)),
            _ => Err(ClientError::Server(format!("{}: {}", status, message))),
        }
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.request(Method::GET, "/health").send().await?;
        self.handle_response(response).await
    }

    // ============================================================
    // Decks
    // ============================================================

    pub async fn list_decks(&self) -> Result<Vec<DeckSummary>, ClientError> {
        let response = self.request(Method::GET, "/decks").send().await?;
        self.handle_response(response).await
    }

    pub async fn get_deck(&self, id: Uuid) -> Result<Deck, ClientError> {
        let response = self
            .request(Method::GET, &format!("/decks/{}", id))
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn create_deck(
        &self,
        input: &CreateDeckInput,
    ) -> Result<CreateDeckResponse, ClientError> {
        let response = self
            .request(Method::POST, "/decks")
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn delete_deck(&self, id: Uuid) -> Result<(), ClientError> {
        let response = self
            .request(Method::DELETE, &format!("/decks/{}", id))
            .send()
            .await?;
        self.handle_response::<serde_json::Value>(response).await?;
        Ok(())
    }

    // ============================================================
    // Study sessions
    // ============================================================

    pub async fn start_session(
        &self,
        deck_id: Uuid,
        max_cards: Option<i64>,
    ) -> Result<StartSessionResponse, ClientError> {
        let response = self
            .request(Method::POST, &format!("/study/{}/start", deck_id))
            .json(&StartSessionInput { max_cards })
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn next_card(&self, session_id: Uuid) -> Result<NextCardResponse, ClientError> {
        let response = self
            .request(Method::GET, &format!("/study/{}/next", session_id))
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn review(
        &self,
        session_id: Uuid,
        input: &ReviewInput,
    ) -> Result<ReviewOutcome, ClientError> {
        let response = self
            .request(Method::POST, &format!("/study/{}/review", session_id))
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn session_stats(
        &self,
        session_id: Uuid,
    ) -> Result<SessionStatsResponse, ClientError> {
        let response = self
            .request(Method::GET, &format!("/study/{}/stats", session_id))
            .send()
            .await?;
        self.handle_response(response).await
    }
}
