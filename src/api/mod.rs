pub mod handlers;
pub mod metrics;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::service::GalleryService;
use handlers::{ApiResponse, AppState};
use metrics::MetricsMiddleware;

pub struct ApiOptions {
    pub api_token: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            api_token: None,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

pub fn create_app(gallery: Arc<GalleryService>, options: ApiOptions) -> Router {
    let upload_dir = gallery.upload_dir().to_path_buf();
    let state = Arc::new(AppState {
        gallery,
        api_token: options.api_token,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let gallery_routes = Router::new()
        .route("/upload", post(handlers::upload_photo))
        .route("/photos", get(handlers::list_photos))
        .route("/photos/:id", delete(handlers::delete_photo))
        .route("/faces/:id/assign", post(handlers::assign_face))
        .route("/persons", get(handlers::list_persons))
        .route("/persons/:id", put(handlers::update_person))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/gallery", gallery_routes)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(options.max_upload_bytes))
        .layer(MetricsMiddleware::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Rejects requests without the configured bearer token. Open when no token
/// is configured.
async fn require_token(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_token.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided == Some(expected) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error("missing or invalid API token".to_string())),
        )
            .into_response()
    }
}
