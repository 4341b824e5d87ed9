use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use server_api::{
    list_answers, record_response, restore_session, resume_by_code, start_session, ApiContext,
    Questionnaire,
};
use shared::{
    domain::{Page, SessionId},
    error::{ApiError, ErrorCode},
    protocol::{PassphraseQuery, ResponseEnvelope, SessionAnswers, SessionQuery},
};
use serde_json::Value;
use storage::Storage;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, normalize_database_url};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let questionnaire = match settings.questionnaire_path.as_deref() {
        Some(path) => Questionnaire::load(path)
            .with_context(|| format!("failed to load questionnaire from '{path}'"))?,
        None => Questionnaire::builtin().context("built-in questionnaire is invalid")?,
    };
    info!(
        pages = questionnaire.len(),
        title = questionnaire.title().unwrap_or("untitled"),
        "questionnaire loaded"
    );

    let state = AppState {
        api: ApiContext {
            storage,
            questionnaire: Arc::new(questionnaire),
        },
        max_body_bytes: settings.max_body_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "survey server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/start", get(http_start))
        .route("/api/response", post(http_response))
        .route("/api/restore", get(http_restore))
        .route("/api/answers", get(http_lookup_passphrase))
        .route("/api/sessions/:session_id/answers", get(http_list_answers))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.api.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            error!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        }
    }
}

async fn http_start(State(state): State<Arc<AppState>>) -> ApiResult<Page> {
    let page = start_session(&state.api).await.map_err(error_response)?;
    Ok(Json(page))
}

async fn http_response(
    State(state): State<Arc<AppState>>,
    envelope: Result<Json<ResponseEnvelope<Value>>, JsonRejection>,
) -> ApiResult<Page> {
    let Json(envelope) = envelope.map_err(|rejection| {
        rejection_response(rejection.status(), rejection.body_text())
    })?;
    let page = record_response(&state.api, envelope)
        .await
        .map_err(error_response)?;
    Ok(Json(page))
}

async fn http_restore(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> ApiResult<Page> {
    let Query(q) = query.map_err(|rejection| {
        rejection_response(rejection.status(), rejection.body_text())
    })?;
    let page = restore_session(&state.api, q.session_id)
        .await
        .map_err(error_response)?;
    Ok(Json(page))
}

async fn http_lookup_passphrase(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PassphraseQuery>, QueryRejection>,
) -> ApiResult<Page> {
    let Query(q) = query.map_err(|rejection| {
        rejection_response(rejection.status(), rejection.body_text())
    })?;
    let page = resume_by_code(&state.api, &q.friendly_code)
        .await
        .map_err(error_response)?;
    Ok(Json(page))
}

async fn http_list_answers(
    State(state): State<Arc<AppState>>,
    session_id: Result<Path<SessionId>, PathRejection>,
) -> ApiResult<SessionAnswers> {
    let Path(session_id) = session_id.map_err(|rejection| {
        rejection_response(rejection.status(), rejection.body_text())
    })?;
    let answers = list_answers(&state.api, session_id)
        .await
        .map_err(error_response)?;
    Ok(Json(answers))
}

/// Extractor failures keep their status but carry an `ApiError` body.
fn rejection_response(status: StatusCode, message: String) -> (StatusCode, Json<ApiError>) {
    debug!(status = status.as_u16(), %message, "request rejected by extractor");
    (status, Json(ApiError::validation(message)))
}

fn error_response(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Completed => StatusCode::GONE,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
