pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method},
    routing::{get, post, put},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/refresh", post(routes::auth::refresh))
        .route("/me", get(routes::auth::me))
        .route("/password-reset", post(routes::auth::request_password_reset))
        .route(
            "/password-reset/confirm",
            post(routes::auth::confirm_password_reset),
        );

    let user_routes = Router::new()
        .route("/", get(routes::user::list))
        .route("/contacts", get(routes::user::contacts))
        .route("/me", put(routes::user::update_me))
        .route("/me/photo", post(routes::user::upload_photo))
        .route("/{user_id}", get(routes::user::get));

    let chat_routes = Router::new()
        .route("/", get(routes::chat::list).post(routes::chat::open))
        .route(
            "/{chat_id}/message",
            get(routes::chat::list_messages).post(routes::chat::send_message),
        )
        .route("/{chat_id}/read", post(routes::chat::mark_read))
        .route(
            "/{chat_id}/message/{message_id}/read",
            put(routes::chat::mark_message_read),
        )
        .route("/{chat_id}/image", post(routes::chat::upload_image));

    // Concierge only; the extractor enforces the role
    let visitor_routes = Router::new()
        .route("/", get(routes::visitor::list).post(routes::visitor::create))
        .route(
            "/{entry_id}",
            get(routes::visitor::get)
                .put(routes::visitor::update)
                .delete(routes::visitor::delete),
        )
        .route("/{entry_id}/exit", post(routes::visitor::register_exit));

    let package_routes = Router::new()
        .route("/", get(routes::package::list).post(routes::package::create))
        .route(
            "/{entry_id}",
            get(routes::package::get).delete(routes::package::delete),
        )
        .route("/{entry_id}/pickup", post(routes::package::register_pickup));

    let bulletin_routes = Router::new()
        .route("/", get(routes::bulletin::list).post(routes::bulletin::create))
        .route("/image", post(routes::bulletin::upload_image))
        .route(
            "/{post_id}",
            put(routes::bulletin::update).delete(routes::bulletin::delete),
        );

    // Compose API
    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/user", user_routes)
        .nest("/chat", chat_routes)
        .nest("/visitor", visitor_routes)
        .nest("/package", package_routes)
        .nest("/bulletin", bulletin_routes)
        .route("/storage/{*key}", get(routes::storage::get));

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Any origin when none are configured, otherwise exactly the configured ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(allowed)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ws_connections": state.ws_storage.connection_count(),
        "live_topics": state.feed.topic_count(),
    }))
}
