use crate::error::DictionaryError;
use crate::metrics::METRICS;
use crate::model::{Example, Id, Translation, Word};
use crate::state::AppState;
use crate::store::StoreCounts;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// JSON routes over the dictionary operations, plus health and metrics
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route(
            "/words",
            get(list_words)
                .post(add_word)
                .put(update_word)
                .delete(delete_word),
        )
        .route("/words/{text}/examples", get(examples_for_word))
        .route("/words/{text}/translations", get(translations_for_word))
        .route("/examples", post(add_example))
        .route("/examples/{id}", put(update_example).delete(delete_example))
        .route(
            "/translations",
            post(add_translation)
                .put(update_translation)
                .delete(delete_translation),
        )
        .with_state(state)
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug)]
pub struct ApiError(DictionaryError);

impl From<DictionaryError> for ApiError {
    fn from(error: DictionaryError) -> Self {
        Self(error)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

pub fn status_for(error: &DictionaryError) -> StatusCode {
    match error {
        DictionaryError::NotFound { .. } => StatusCode::NOT_FOUND,
        DictionaryError::UnsupportedDomain { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DictionaryError::ConstraintViolation { .. } => StatusCode::CONFLICT,
        DictionaryError::AggregateFetch { .. } => StatusCode::BAD_GATEWAY,
        DictionaryError::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct WordParams {
    pub word: String,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateWordParams {
    pub old_word: String,
    pub language: String,
    pub new_word: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddExampleParams {
    pub word: String,
    pub language: String,
    pub example: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateExampleParams {
    pub example: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslationParams {
    pub word_pl: String,
    pub word_en: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateTranslationParams {
    pub old_word_pl: String,
    pub old_word_en: String,
    pub new_word_pl: String,
    pub new_word_en: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
    pub counts: StoreCounts,
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        counts: state.counts(),
    })
}

async fn metrics() -> (StatusCode, String) {
    (StatusCode::OK, METRICS.encode())
}

async fn list_words(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Word>> {
    Ok(Json(state.dictionary().list_words().await?))
}

async fn examples_for_word(
    State(state): State<Arc<AppState>>,
    Path(text): Path<String>,
) -> ApiResult<Vec<Example>> {
    Ok(Json(state.dictionary().examples_for_word(&text).await?))
}

async fn translations_for_word(
    State(state): State<Arc<AppState>>,
    Path(text): Path<String>,
) -> ApiResult<Vec<Word>> {
    Ok(Json(state.dictionary().translations_for_word(&text).await?))
}

async fn add_word(
    State(state): State<Arc<AppState>>,
    Json(params): Json<WordParams>,
) -> ApiResult<Word> {
    let word = state
        .dictionary()
        .add_word(&params.word, &params.language)
        .await?;
    Ok(Json(word))
}

async fn update_word(
    State(state): State<Arc<AppState>>,
    Json(params): Json<UpdateWordParams>,
) -> ApiResult<Word> {
    let word = state
        .dictionary()
        .update_word(&params.old_word, &params.language, &params.new_word)
        .await?;
    Ok(Json(word))
}

async fn delete_word(
    State(state): State<Arc<AppState>>,
    Json(params): Json<WordParams>,
) -> ApiResult<bool> {
    let deleted = state
        .dictionary()
        .delete_word(&params.word, &params.language)
        .await?;
    Ok(Json(deleted))
}

async fn add_example(
    State(state): State<Arc<AppState>>,
    Json(params): Json<AddExampleParams>,
) -> ApiResult<Example> {
    let example = state
        .dictionary()
        .add_example(&params.word, &params.language, &params.example)
        .await?;
    Ok(Json(example))
}

async fn update_example(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    Json(params): Json<UpdateExampleParams>,
) -> ApiResult<Example> {
    let example = state
        .dictionary()
        .update_example(id, &params.example)
        .await?;
    Ok(Json(example))
}

async fn delete_example(State(state): State<Arc<AppState>>, Path(id): Path<Id>) -> ApiResult<bool> {
    Ok(Json(state.dictionary().delete_example(id).await?))
}

async fn add_translation(
    State(state): State<Arc<AppState>>,
    Json(params): Json<TranslationParams>,
) -> ApiResult<Translation> {
    let edge = state
        .dictionary()
        .add_translation(&params.word_pl, &params.word_en)
        .await?;
    Ok(Json(edge))
}

async fn update_translation(
    State(state): State<Arc<AppState>>,
    Json(params): Json<UpdateTranslationParams>,
) -> ApiResult<Translation> {
    let edge = state
        .dictionary()
        .update_translation(
            &params.old_word_pl,
            &params.old_word_en,
            &params.new_word_pl,
            &params.new_word_en,
        )
        .await?;
    Ok(Json(edge))
}

async fn delete_translation(
    State(state): State<Arc<AppState>>,
    Json(params): Json<TranslationParams>,
) -> ApiResult<bool> {
    let deleted = state
        .dictionary()
        .delete_translation(&params.word_pl, &params.word_en)
        .await?;
    Ok(Json(deleted))
}
