use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    create_router_with_cors(state, &[])
}

pub fn create_router_with_cors(state: AppState, cors_origins: &[String]) -> Router {
    let allowed_methods = [Method::GET, Method::POST, Method::OPTIONS];
    let allowed_headers = [CONTENT_TYPE, AUTHORIZATION];

    let origins: Vec<HeaderValue> = if cors_origins.is_empty() {
        // Default development origins
        [
            "http://localhost:5173",
            "http://localhost:3000",
            "http://localhost:8080",
        ]
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect()
    } else {
        cors_origins.iter().filter_map(|o| o.parse().ok()).collect()
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(allowed_methods)
        .allow_headers(allowed_headers);

    let api_routes = Router::new()
        .route("/lobbies", post(handlers::lobbies::create_lobby))
        .route("/rooms", post(handlers::rooms::create_room))
        .route(
            "/users/{user_id}/pending-drafts",
            get(handlers::users::pending_drafts),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ws/draft", get(handlers::websocket::draft_ws))
        .route("/ws/lobby", get(handlers::websocket::lobby_ws))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
