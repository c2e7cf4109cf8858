//! REST API for the budget-choice experiment
//!
//! The HTTP surface standing in for the study's intake form, choice slider,
//! and download button: intake starts a session, each confirmed choice runs
//! one round transition (relaying advice in the treatment arm), and the
//! finished ledger is downloadable as CSV.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::advice::AdviceRequester;
use crate::error::ExperimentError;
use crate::ledger::EXPORT_FILENAME;
use crate::models::{Condition, Participant, Sex, MAX_AGE, MIN_AGE};
use crate::session::{AdvicePolicy, Session};
use crate::store::SessionStore;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IntakeRequest {
    pub participant_id: String,
    pub age: u32,
    pub sex: String,
    /// Treatment arm unless explicitly opted out
    pub treatment: Option<bool>,
    /// Optional caller-chosen session id; derived from the participant id
    /// when absent
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChoiceRequest {
    pub choice_x: u32,
}

/// =============================
/// Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// What the participant sees each round: prices, income, progress
#[derive(Debug, Serialize, Deserialize)]
pub struct RoundView {
    pub session_id: Uuid,
    pub round: u32,
    pub price_x: f64,
    pub price_y: f64,
    pub income: f64,
    pub complete: bool,
}

impl RoundView {
    fn of(session: &Session) -> Self {
        Self {
            session_id: session.session_id,
            round: session.round,
            price_x: session.current_line.price_x,
            price_y: session.current_line.price_y,
            income: session.current_line.income,
            complete: session.complete,
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn SessionStore>,
    pub advice: Arc<AdviceRequester>,
}

/// =============================
/// Helpers — Intake Parsing
/// =============================

fn parse_sex(s: &str) -> Option<Sex> {
    match s.to_lowercase().as_str() {
        "male" | "m" => Some(Sex::Male),
        "female" | "f" => Some(Sex::Female),
        "other" => Some(Sex::Other),
        _ => None,
    }
}

fn validate_intake(req: &IntakeRequest) -> crate::Result<(Participant, Condition)> {
    if req.participant_id.trim().is_empty() {
        return Err(ExperimentError::InvalidIntake(
            "participant_id must not be empty".to_string(),
        ));
    }

    if req.age < MIN_AGE || req.age > MAX_AGE {
        return Err(ExperimentError::InvalidIntake(format!(
            "age {} outside {}..={}",
            req.age, MIN_AGE, MAX_AGE
        )));
    }

    let sex = parse_sex(&req.sex).ok_or_else(|| {
        ExperimentError::InvalidIntake(format!("unknown sex '{}'", req.sex))
    })?;

    let condition = match req.treatment {
        Some(false) => Condition::Control,
        _ => Condition::Treatment,
    };

    Ok((
        Participant {
            participant_id: req.participant_id.trim().to_string(),
            age: req.age,
            sex,
        },
        condition,
    ))
}

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Intake Endpoint
/// =============================

async fn create_session(
    State(state): State<ApiState>,
    Json(req): Json<IntakeRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let (participant, condition) = match validate_intake(&req) {
        Ok(parsed) => parsed,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    };

    let session_id = parse_or_stable_uuid(req.session_id.as_deref(), &participant.participant_id);

    info!(
        session_id = %session_id,
        participant_id = %participant.participant_id,
        condition = %condition,
        "Starting session"
    );

    let session = Session::new(
        session_id,
        participant,
        condition,
        AdvicePolicy::EveryRoundPastMidpoint,
    );
    let view = RoundView::of(&session);

    if let Err(e) = state.store.insert(session).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to store session: {}", e))),
        );
    }

    (StatusCode::OK, Json(ApiResponse::success(view)))
}

/// =============================
/// Round Endpoints
/// =============================

async fn get_session(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.store.load(session_id).await {
        Ok(Some(session)) => (
            StatusCode::OK,
            Json(ApiResponse::success(RoundView::of(&session))),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(
                ExperimentError::SessionNotFound(session_id).to_string(),
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

async fn confirm_choice(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<ChoiceRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let mut session = match state.store.load(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(
                    ExperimentError::SessionNotFound(session_id).to_string(),
                )),
            )
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    };

    let outcome = match session.confirm_choice(req.choice_x) {
        Ok(outcome) => outcome,
        Err(e @ ExperimentError::InvalidChoice(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(e.to_string())),
            )
        }
        Err(e @ ExperimentError::SessionComplete(_)) => {
            return (StatusCode::CONFLICT, Json(ApiResponse::error(e.to_string())))
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    };

    if let Err(e) = state.store.save(&session).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to save session: {}", e))),
        );
    }

    info!(
        session_id = %session_id,
        round = outcome.record.round,
        choice_x = outcome.record.choice_x,
        advice_due = outcome.advice_due,
        "Choice confirmed"
    );

    let mut data = serde_json::json!({
        "record": outcome.record,
        "next": RoundView::of(&session),
        "complete": outcome.complete,
    });

    // Advice failures are surfaced as a notice, never by failing the round
    if outcome.advice_due {
        let rows = session
            .ledger()
            .rows_for_participant(&session.participant.participant_id);

        match state.advice.request_advice(&rows).await {
            Ok(text) => {
                data["advice"] = serde_json::json!(text);
            }
            Err(e) => {
                warn!("Advice request failed: {}", e);
                data["advice_error"] =
                    serde_json::json!(format!("Advice is unavailable this round: {}", e));
            }
        }
    }

    (StatusCode::OK, Json(ApiResponse::success(data)))
}

/// =============================
/// Export Endpoint
/// =============================

async fn export_csv(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
) -> axum::response::Response {
    let session = match state.store.load(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(
                    ExperimentError::SessionNotFound(session_id).to_string(),
                )),
            )
                .into_response()
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
                .into_response()
        }
    };

    match session.export_csv() {
        Ok(csv) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => (StatusCode::CONFLICT, Json(ApiResponse::error(e.to_string()))).into_response(),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(store: Arc<dyn SessionStore>, advice: Arc<AdviceRequester>) -> Router {
    let state = ApiState { store, advice };

    Router::new()
        .route("/health", get(health))
        .route("/api/session", post(create_session))
        .route("/api/session/:id", get(get_session))
        .route("/api/session/:id/choice", post(confirm_choice))
        .route("/api/session/:id/export", get(export_csv))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    store: Arc<dyn SessionStore>,
    advice: Arc<AdviceRequester>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(store, advice);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
