mod handlers;

use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::study::StudyManager;

pub fn create_router(study: StudyManager, config: &Config) -> Router {
    let api = Router::new()
        // Decks
        .route("/decks", get(handlers::list_decks))
        .route("/decks", post(handlers::create_deck))
        .route("/decks/{id}", get(handlers::get_deck))
        .route("/decks/{id}", delete(handlers::delete_deck))
        // Study sessions
        .route("/study/{id}/start", post(handlers::start_session))
        .route("/study/{id}/next", get(handlers::next_card))
        .route("/study/{id}/review", post(handlers::review_card))
        .route("/study/{id}/stats", get(handlers::session_stats))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config.cors_origins.as_deref())),
        )
        .with_state(study)
}

/// Any origin unless an allow-list is configured.
fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
