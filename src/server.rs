//!
//! airwarden HTTP server
//! ---------------------
//! Axum-based HTTP API for telemetry ingestion, hazard reports and account
//! management.
//!
//! Responsibilities:
//! - Bearer-token authentication with per-operation role allow-lists.
//! - Signup/login endpoints backed by the `security` module.
//! - Unauthenticated sensor ingest feeding the anomaly detector.
//! - Report submission, listing, deletion and deactivation.
//! - Admin-only worker/user management and activity-log listing.
//! - First-run default admin provisioning and startup logs.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit;
use crate::error::{AppError, AppResult};
use crate::geocode::Geocoder;
use crate::identity::{require_role, resolve, Principal, Role, TokenService};
use crate::notify::AlertNotifier;
use crate::reports::{self, Identifier, ReportFilter, SubmitReport};
use crate::security;
use crate::storage::{Location, SensorReading, SharedStore};
use crate::telemetry::{self, AnomalyDetector};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub tokens: TokenService,
    pub detector: Arc<AnomalyDetector>,
    pub geocoder: Arc<dyn Geocoder>,
    pub notifier: Arc<dyn AlertNotifier>,
}

/// Seed an admin account on first run so the role-gated surface is usable.
/// A conflict means an account with that email already exists, which is fine.
pub fn ensure_default_admin(state: &AppState, email: &str, password: &str) {
    match security::create_admin(&state.store, "Administrator", email, password) {
        Ok(_) => info!(email, "default admin provisioned"),
        Err(AppError::Conflict { .. }) => {}
        Err(e) => warn!("default admin provisioning failed: {e}"),
    }
}

/// Mount all routes onto a router with the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "airwarden ok" }))
        .route("/api/signup", post(signup))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/verify-token", get(verify_token))
        .route("/api/sensor-data", post(receive_sensor_data))
        .route("/api/ammonia", get(get_sensor_data))
        .route("/api/manual-report", post(submit_manual_report))
        .route("/api/manual-reports", get(get_manual_reports))
        .route("/api/deactivated-reports", get(get_deactivated_reports))
        .route("/api/reports/{report_id}", delete(delete_report))
        .route("/api/reports/{report_id}/deactivate", put(deactivate_report))
        .route("/api/workers", get(list_workers).post(create_worker))
        .route("/api/workers/{worker_id}", put(update_worker).delete(delete_worker))
        .route("/api/users", get(list_users))
        .route("/api/activity-logs", get(get_activity_logs))
        .with_state(state)
}

/// Start the HTTP server bound to the given port.
pub async fn run_with_port(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let Some(value) = headers.get("authorization").or_else(|| headers.get("Authorization")) else {
        return Err(AppError::auth("missing_token", "token is missing"));
    };
    let raw = value.to_str().map_err(|_| AppError::auth("invalid_token_format", "invalid token format"))?;
    match raw.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AppError::auth("invalid_token_format", "invalid token format")),
    }
}

/// Verify the bearer token and resolve the caller against the account
/// stores. The token's role claim is a hint only.
fn current_principal(state: &AppState, headers: &HeaderMap) -> AppResult<Principal> {
    let claims = state.tokens.verify(bearer_token(headers)?)?;
    let guard = state.store.0.read();
    resolve(&guard, &claims.email, &claims.role)
}

fn require_field(value: Option<String>) -> AppResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::user("missing_fields", "missing fields")),
    }
}

// ---- Auth ----

#[derive(Debug, Deserialize)]
struct SignupPayload {
    email: Option<String>,
    name: Option<String>,
    password: Option<String>,
}

async fn signup(State(state): State<AppState>, Json(payload): Json<SignupPayload>) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let email = require_field(payload.email)?;
    let name = require_field(payload.name)?;
    let password = require_field(payload.password)?;
    security::signup(&state.store, &name, &email, &password)?;
    audit::record(&state.store, "user_signup", Some(&email), json!({ "name": name }));
    Ok((StatusCode::CREATED, Json(json!({ "message": "Signup successful" }))))
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: Option<String>,
    password: Option<String>,
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let email = require_field(payload.email)?;
    let password = require_field(payload.password)?;
    let (account, role) = security::authenticate(&state.store, &email, &password)?;
    let token = state.tokens.issue(&account.email, role)?;
    audit::record(&state.store, "login", Some(&account.email), json!({ "role": role.as_str() }));
    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Login successful",
            "token": token,
            "user": { "name": account.name, "email": account.email, "role": role.as_str() },
        })),
    ))
}

async fn verify_token(State(state): State<AppState>, headers: HeaderMap) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "valid": true,
            "user": { "name": principal.name, "email": principal.email, "role": principal.role.as_str() },
        })),
    ))
}

// Tokens are stateless; logout is a client-side acknowledgement only.
async fn logout() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "message": "Logged out successfully" })))
}

// ---- Telemetry ----

#[derive(Debug, Deserialize)]
struct SensorPayload {
    ammonia_ppm: Option<f64>,
    temperature: Option<f64>,
    humidity: Option<f64>,
}

async fn receive_sensor_data(State(state): State<AppState>, Json(payload): Json<SensorPayload>) -> (StatusCode, Json<serde_json::Value>) {
    let reading = SensorReading {
        ammonia_ppm: payload.ammonia_ppm,
        temperature: payload.temperature,
        humidity: payload.humidity,
        timestamp: Utc::now(),
    };
    let ammonia = reading.ammonia_ppm;
    telemetry::ingest(&state.store, &state.detector, &state.notifier, reading);
    audit::record(&state.store, "sensor_data_ingested", None, json!({ "ammonia_ppm": ammonia }));
    (StatusCode::OK, Json(json!({ "status": "success" })))
}

async fn get_sensor_data(State(state): State<AppState>, headers: HeaderMap) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let _principal = current_principal(&state, &headers)?;
    // Any authenticated role may read the signal window.
    let readings = state.store.0.write().recent_readings(50);
    Ok((StatusCode::OK, Json(json!(readings))))
}

// ---- Reports ----

#[derive(Debug, Deserialize)]
struct ManualReportPayload {
    name: Option<String>,
    email: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    comments: Option<String>,
    location: Option<Location>,
}

async fn submit_manual_report(State(state): State<AppState>, Json(payload): Json<ManualReportPayload>) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let (Some(latitude), Some(longitude)) = (payload.latitude, payload.longitude) else {
        return Err(AppError::user("missing_fields", "missing required fields"));
    };
    let input = SubmitReport {
        name: require_field(payload.name)?,
        email: require_field(payload.email)?,
        latitude,
        longitude,
        comments: require_field(payload.comments)?,
        location: payload.location,
    };
    let report = reports::submit(&state.store, state.geocoder.as_ref(), input).await?;
    audit::record(
        &state.store,
        "manual_report_submitted",
        Some(&report.email),
        json!({ "location": report.location }),
    );
    Ok((StatusCode::CREATED, Json(json!({ "message": "Manual report submitted successfully" }))))
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    city: Option<String>,
    postcode: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

impl From<ReportQuery> for ReportFilter {
    fn from(q: ReportQuery) -> Self {
        ReportFilter { city: q.city, postcode: q.postcode, date_from: q.date_from, date_to: q.date_to }
    }
}

async fn get_manual_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    require_role(principal.role, &[Role::Admin, Role::Worker])?;
    let found = reports::list_active(&state.store, &query.into())?;
    Ok((StatusCode::OK, Json(json!(found))))
}

async fn get_deactivated_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    require_role(principal.role, &[Role::Admin, Role::Worker])?;
    let found = reports::list_deactivated(&state.store, &query.into())?;
    Ok((StatusCode::OK, Json(json!(found))))
}

async fn delete_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(report_id): Path<String>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    require_role(principal.role, &[Role::Admin, Role::Worker])?;
    let ident = Identifier::parse(&report_id)?;
    reports::delete(&state.store, ident)?;
    audit::record(&state.store, "report_deleted", Some(&principal.email), json!({ "report_id": report_id }));
    Ok((StatusCode::OK, Json(json!({ "message": "Report deleted successfully" }))))
}

async fn deactivate_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(report_id): Path<String>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    require_role(principal.role, &[Role::Admin, Role::Worker])?;
    let ident = Identifier::parse(&report_id)?;
    reports::deactivate(&state.store, ident, &principal.email)?;
    audit::record(&state.store, "report_deactivated", Some(&principal.email), json!({ "report_id": report_id }));
    Ok((StatusCode::OK, Json(json!({ "message": "Report deactivated successfully" }))))
}

// ---- Worker and user management ----

async fn list_workers(State(state): State<AppState>, headers: HeaderMap) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    require_role(principal.role, &[Role::Admin])?;
    let workers = state.store.0.read().list_accounts(Role::Worker);
    Ok((StatusCode::OK, Json(json!(workers))))
}

#[derive(Debug, Deserialize)]
struct CreateWorkerPayload {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

async fn create_worker(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateWorkerPayload>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    require_role(principal.role, &[Role::Admin])?;
    let name = require_field(payload.name)?;
    let email = require_field(payload.email)?;
    let password = require_field(payload.password)?;
    security::create_worker(&state.store, &principal.email, &name, &email, &password)?;
    audit::record(&state.store, "worker_created", Some(&principal.email), json!({ "email": email }));
    Ok((StatusCode::CREATED, Json(json!({ "message": "Worker created" }))))
}

#[derive(Debug, Deserialize)]
struct UpdateWorkerPayload {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

fn parse_worker_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::user("invalid_worker_id", "invalid worker id"))
}

async fn update_worker(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(worker_id): Path<String>,
    Json(payload): Json<UpdateWorkerPayload>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    require_role(principal.role, &[Role::Admin])?;
    let id = parse_worker_id(&worker_id)?;
    let changed = security::update_worker(
        &state.store,
        id,
        security::WorkerUpdate { name: payload.name, email: payload.email, password: payload.password },
    )?;
    audit::record(
        &state.store,
        "worker_updated",
        Some(&principal.email),
        json!({ "worker_id": worker_id, "updates": changed }),
    );
    Ok((StatusCode::OK, Json(json!({ "message": "Worker updated" }))))
}

async fn delete_worker(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(worker_id): Path<String>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    require_role(principal.role, &[Role::Admin])?;
    let id = parse_worker_id(&worker_id)?;
    security::delete_worker(&state.store, id)?;
    audit::record(&state.store, "worker_deleted", Some(&principal.email), json!({ "worker_id": worker_id }));
    Ok((StatusCode::OK, Json(json!({ "message": "Worker deleted" }))))
}

async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    require_role(principal.role, &[Role::Admin])?;
    let users = state.store.0.read().list_accounts(Role::User);
    Ok((StatusCode::OK, Json(json!(users))))
}

// ---- Audit ----

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
}

async fn get_activity_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LogsQuery>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let principal = current_principal(&state, &headers)?;
    require_role(principal.role, &[Role::Admin])?;
    let entries = audit::recent(&state.store, query.limit.unwrap_or(audit::DEFAULT_AUDIT_LIMIT));
    Ok((StatusCode::OK, Json(json!(entries))))
}
