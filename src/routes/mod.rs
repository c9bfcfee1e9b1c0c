use axum::http::{header, HeaderValue, Method};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::models::ItemType;
use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod files;
pub mod health;
pub mod sharing;
pub mod trash;

pub fn create_router(state: AppState) -> Router<()> {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins()
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let files_routes = Router::new()
        .route("/", get(files::list_files))
        .route("/upload", post(files::upload_file))
        .route("/folders", post(files::create_folder))
        .route("/contents", get(files::list_contents))
        .route("/search", get(files::search))
        .route("/trash", get(trash::list_trash))
        .route("/signed-url", post(sharing::signed_url))
        .route(
            "/share",
            post(sharing::share_item).delete(sharing::revoke_share),
        )
        .route("/shared-with-me", get(sharing::shared_with_me))
        .route("/:item_type/public-link", get(sharing::public_link))
        .route("/:item_type/:id", patch(files::rename_item))
        .route("/:item_type/:id/trash", post(trash::move_to_trash))
        .route("/:item_type/:id/restore", post(trash::restore_item))
        .route("/:item_type/:id/permanent", delete(trash::delete_permanently))
        .route(
            "/:item_type/:id/permissions",
            get(sharing::list_item_permissions),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/files", files_routes)
        .route("/protected-route", get(health::protected_route))
        .route_layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(
            protected_state,
        ));

    let public_routes = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/files/public/:token", get(sharing::open_public_link));

    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest("/auth", auth_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

pub(crate) fn parse_item_type(raw: &str) -> AppResult<ItemType> {
    raw.parse()
        .map_err(|_| AppError::bad_request("Invalid item type."))
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
