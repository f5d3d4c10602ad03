use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::study::StudyManager;

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================
// Decks
// ============================================================

pub async fn list_decks(State(study): State<StudyManager>) -> Result<Json<Vec<DeckSummary>>> {
    study.decks().list_decks(Utc::now()).map(Json)
}

pub async fn get_deck(
    State(study): State<StudyManager>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deck>> {
    study.decks().get_deck(id).map(Json)
}

pub async fn create_deck(
    State(study): State<StudyManager>,
    payload: Result<Json<CreateDeckInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateDeckResponse>)> {
    let Json(input) = payload?;
    let deck = study.decks().create_deck(input, Utc::now())?;
    Ok((
        StatusCode::CREATED,
        Json(CreateDeckResponse {
            deck_id: deck.id,
            name: deck.name,
            total_cards: deck.cards.len(),
        }),
    ))
}

pub async fn delete_deck(
    State(study): State<StudyManager>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    study.decks().delete_deck(id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================
// Study sessions
// ============================================================

/// The body is optional; an empty request uses the configured queue size.
pub async fn start_session(
    State(study): State<StudyManager>,
    Path(deck_id): Path<Uuid>,
    payload: Result<Option<Json<StartSessionInput>>, JsonRejection>,
) -> Result<Json<StartSessionResponse>> {
    let input = payload?.map(|Json(input)| input).unwrap_or_default();
    study.start(deck_id, input.max_cards, Utc::now()).map(Json)
}

pub async fn next_card(
    State(study): State<StudyManager>,
    Path(id): Path<Uuid>,
) -> Result<Json<NextCardResponse>> {
    study.next(id).map(Json)
}

pub async fn review_card(
    State(study): State<StudyManager>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<Json<ReviewOutcome>> {
    let Json(input) = payload?;
    study.review(id, input, Utc::now()).map(Json)
}

pub async fn session_stats(
    State(study): State<StudyManager>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatsResponse>> {
    study.stats(id).map(Json)
}
