use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{
        HeaderName, HeaderValue, Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
    },
    response::IntoResponse,
    routing::{any, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};
use tracing::{error, warn};

use crate::error::AppError;
use crate::repository::Repository;

/// Shared handler state
pub struct AppState<R> {
    pub repository: R,
    /// Report failures to the client instead of answering success
    pub strict: bool,
}

impl<R> AppState<R> {
    pub fn new(repository: R, strict: bool) -> Arc<Self> {
        Arc::new(Self { repository, strict })
    }
}

/// `/api` routes plus CORS and the JSON content type on every response.
///
/// Request bodies are read whole; `max_body_bytes` caps them when set.
pub fn router<R: Repository>(state: Arc<AppState<R>>, max_body_bytes: Option<usize>) -> Router {
    let body_limit = match max_body_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            CONTENT_TYPE,
            AUTHORIZATION,
        ]);

    Router::new()
        .route("/api", post(post_handler::<R>).get(query_handler::<R>))
        .route("/api/", any(redirect_to_api))
        .layer(body_limit)
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .with_state(state)
}

/// `POST /api`: decode the body into a record and save it.
///
/// Outside strict mode a body that is not a valid record is saved as the
/// zero-valued record, a body that could not be read at all is dropped, and
/// store failures are only logged; the answer is always 204.
pub async fn post_handler<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, AppError> {
    let body = match body {
        Ok(body) => body,
        Err(e) if state.strict => {
            warn!("Rejecting unreadable request body: {}", e);
            return Err(e.into());
        }
        Err(e) => {
            warn!("Dropping unreadable request body: {}", e);
            return Ok(StatusCode::NO_CONTENT);
        }
    };

    let record = match serde_json::from_slice::<R::Record>(&body) {
        Ok(record) => record,
        Err(e) if state.strict => {
            warn!("Rejecting malformed request body: {}", e);
            return Err(e.into());
        }
        Err(e) => {
            warn!("Error while decoding the request body: {}", e);
            R::Record::default()
        }
    };

    if let Err(e) = state.repository.save(record).await {
        error!("Error while saving record to store: {}", e);
        if state.strict {
            return Err(e.into());
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// `/api/` redirects to `/api`
async fn redirect_to_api() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(LOCATION, "/api")])
}

/// `GET /api`: every stored record as a JSON array
pub async fn query_handler<R: Repository>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<Json<Vec<R::Record>>, AppError> {
    match state.repository.load_all().await {
        Ok(records) => Ok(Json(records)),
        Err(e) => {
            error!("Error while loading records from store: {}", e);
            if state.strict {
                Err(e.into())
            } else {
                Ok(Json(Vec::new()))
            }
        }
    }
}
