pub mod config;
pub mod engine;
pub mod participants;
pub mod store;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use pairing_core::{GenerationMode, Pairing, PairingError, Participant};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::{Config, StoreBackend};
use crate::engine::{EngineError, ManualPairRequest, PairingEngine};
use crate::participants::{FileParticipantSource, ParticipantSource, StaticParticipantSource};
use crate::store::{MemoryPairingStore, PairingStore, SqlitePairingStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    engine: PairingEngine,
    roster: Option<StaticParticipantSource>,
    admin_password: Arc<str>,
}

impl AppState {
    pub fn new(
        engine: PairingEngine,
        roster: Option<StaticParticipantSource>,
        admin_password: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            engine,
            roster,
            admin_password: admin_password.into(),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let store: Arc<dyn PairingStore> = match &config.store {
            StoreBackend::Memory => Arc::new(MemoryPairingStore::default()),
            StoreBackend::Json(path) => Arc::new(MemoryPairingStore::with_persistence(path).await?),
            StoreBackend::Sqlite(path) => Arc::new(SqlitePairingStore::open(path)?),
        };
        let mut roster = None;
        let source: Arc<dyn ParticipantSource> = match &config.roster_path {
            Some(path) => Arc::new(FileParticipantSource::new(path)),
            None => {
                let managed = StaticParticipantSource::default();
                roster = Some(managed.clone());
                Arc::new(managed)
            }
        };
        let engine = PairingEngine::new(source, store, config.engine);
        Ok(Self::new(engine, roster, config.admin_password.as_str()))
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/admin/pairings", get(list_pairings).delete(reset_pairings))
        .route("/admin/pairings/generate", post(generate_legacy))
        .route("/admin/pairings/generate-by-bucket", post(generate_by_bucket))
        .route("/admin/pairings/analyze", get(analyze_pool))
        .route("/admin/pairings/manual", post(manual_pair))
        .route("/admin/pairings/consistency", get(consistency))
        .route("/admin/participants", put(replace_roster))
        .route("/pairings/:giver_id", get(assignment_for))
        .with_state(state)
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let provided = headers
        .get("x-admin-password")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided != &*state.admin_password {
        return Err((StatusCode::UNAUTHORIZED, "invalid admin password").into_response());
    }
    Ok(())
}

fn engine_error(err: EngineError) -> Response {
    let status = match &err {
        EngineError::Validation(PairingError::UnknownParticipant(_)) => StatusCode::NOT_FOUND,
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::Source(_) | EngineError::Store(_) => {
            error!(error = %err, "pairing operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string()).into_response()
}

#[derive(Deserialize)]
struct GenerateParams {
    seed: Option<u64>,
}

#[derive(Serialize)]
struct PairingsResponse {
    pairings: Vec<Pairing>,
}

#[derive(Serialize)]
struct CountResponse {
    count: usize,
}

#[derive(Serialize)]
struct AssignmentResponse {
    giver_id: String,
    receivers: Vec<String>,
}

async fn generate_legacy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<GenerateParams>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }
    match state
        .engine
        .generate(GenerationMode::Legacy, params.seed)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(CountResponse {
                count: outcome.count,
            }),
        )
            .into_response(),
        Err(err) => engine_error(err),
    }
}

async fn generate_by_bucket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<GenerateParams>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }
    match state
        .engine
        .generate(GenerationMode::BucketAware, params.seed)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => engine_error(err),
    }
}

async fn analyze_pool(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }
    match state.engine.analyze().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => engine_error(err),
    }
}

async fn manual_pair(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ManualPairRequest>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }
    match state.engine.manual_pair(payload).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => engine_error(err),
    }
}

async fn reset_pairings(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }
    match state.engine.reset_all().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => engine_error(err),
    }
}

async fn list_pairings(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }
    match state.engine.pairings().await {
        Ok(pairings) => (StatusCode::OK, Json(PairingsResponse { pairings })).into_response(),
        Err(err) => engine_error(err),
    }
}

async fn consistency(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }
    match state.engine.consistency().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => engine_error(err),
    }
}

async fn replace_roster(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(roster): Json<Vec<Participant>>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }
    let Some(source) = &state.roster else {
        return (StatusCode::CONFLICT, "roster is read from a file").into_response();
    };
    let count = roster.len();
    source.replace(roster).await;
    (StatusCode::OK, Json(CountResponse { count })).into_response()
}

async fn assignment_for(State(state): State<AppState>, Path(giver_id): Path<String>) -> Response {
    match state.engine.assignments_for(&giver_id).await {
        Ok(rows) if rows.is_empty() => (StatusCode::NOT_FOUND, "no assignment").into_response(),
        Ok(rows) => (
            StatusCode::OK,
            Json(AssignmentResponse {
                giver_id,
                receivers: rows.into_iter().map(|r| r.receiver_id).collect(),
            }),
        )
            .into_response(),
        Err(err) => engine_error(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    const ADMIN: &str = "changeme";

    async fn json_body(res: Response) -> serde_json::Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn test_app() -> Router {
        let roster = StaticParticipantSource::default();
        let engine = PairingEngine::new(
            Arc::new(roster.clone()),
            Arc::new(MemoryPairingStore::default()),
            EngineConfig::default(),
        );
        app(AppState::new(engine, Some(roster), ADMIN))
    }

    fn admin_request(method: Method, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-admin-password", ADMIN);
        match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn load_roster(app: &Router, roster: serde_json::Value) {
        let res = app
            .clone()
            .oneshot(admin_request(Method::PUT, "/admin/participants", Some(roster)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    fn balanced_roster() -> serde_json::Value {
        json!([
            { "id": "A", "bucket_key": "bucket1" },
            { "id": "B", "bucket_key": "bucket1" },
            { "id": "C", "bucket_key": "bucket2" },
            { "id": "D", "bucket_key": "bucket2" },
            { "id": "E", "bucket_key": "bucket2", "eligible": false }
        ])
    }

    #[tokio::test]
    async fn admin_routes_require_password() {
        let app = test_app();
        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/admin/pairings/generate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/admin/pairings")
                    .header("x-admin-password", "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn analyze_reports_bucket_counts() {
        let app = test_app();
        load_roster(&app, balanced_roster()).await;

        let res = app
            .clone()
            .oneshot(admin_request(Method::GET, "/admin/pairings/analyze", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["total"], 4);
        assert_eq!(body["buckets"]["BUCKET1"], 2);
        assert_eq!(body["buckets"]["BUCKET2"], 2);
        assert_eq!(body["at_risk"], json!([]));
    }

    #[tokio::test]
    async fn legacy_generate_returns_count() {
        let app = test_app();
        load_roster(&app, balanced_roster()).await;

        let res = app
            .clone()
            .oneshot(admin_request(
                Method::POST,
                "/admin/pairings/generate?seed=42",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await, json!({ "count": 4 }));
    }

    #[tokio::test]
    async fn bucket_generate_then_lookup_and_reset() {
        let app = test_app();
        load_roster(&app, balanced_roster()).await;

        let res = app
            .clone()
            .oneshot(admin_request(
                Method::POST,
                "/admin/pairings/generate-by-bucket?seed=7",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["count"], 4);
        assert_eq!(body["violations"], 0);
        assert!(body.get("warning").is_none());

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/pairings/A")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        let receivers = body["receivers"].as_array().unwrap();
        assert_eq!(receivers.len(), 1);
        assert!(receivers[0] == "C" || receivers[0] == "D");

        let res = app
            .clone()
            .oneshot(admin_request(Method::DELETE, "/admin/pairings", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = app
            .clone()
            .oneshot(admin_request(Method::GET, "/admin/pairings", None))
            .await
            .unwrap();
        let body = json_body(res).await;
        assert_eq!(body["pairings"], json!([]));

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/pairings/A")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn manual_pair_supersedes_receiver_and_validates() {
        let app = test_app();
        load_roster(&app, balanced_roster()).await;

        for giver in ["A", "C"] {
            let res = app
                .clone()
                .oneshot(admin_request(
                    Method::POST,
                    "/admin/pairings/manual",
                    Some(json!({ "user_id": "B", "secret_santa_id": giver })),
                ))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = app
            .clone()
            .oneshot(admin_request(Method::GET, "/admin/pairings", None))
            .await
            .unwrap();
        let body = json_body(res).await;
        let pairings = body["pairings"].as_array().unwrap();
        assert_eq!(pairings.len(), 1);
        assert_eq!(pairings[0]["receiver_id"], "B");
        assert_eq!(pairings[0]["giver_id"], "C");

        let res = app
            .clone()
            .oneshot(admin_request(
                Method::POST,
                "/admin/pairings/manual",
                Some(json!({ "user_id": "B", "secret_santa_id": "B" })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        // E exists but is not eligible.
        let res = app
            .clone()
            .oneshot(admin_request(
                Method::POST,
                "/admin/pairings/manual",
                Some(json!({ "user_id": "E", "secret_santa_id": "A" })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn consistency_flags_doubled_giver() {
        let app = test_app();
        load_roster(&app, balanced_roster()).await;
        for receiver in ["B", "C"] {
            let res = app
                .clone()
                .oneshot(admin_request(
                    Method::POST,
                    "/admin/pairings/manual",
                    Some(json!({ "user_id": receiver, "secret_santa_id": "A" })),
                ))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = app
            .clone()
            .oneshot(admin_request(Method::GET, "/admin/pairings/consistency", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["duplicate_givers"]["A"], 2);
        assert_eq!(body["total_pairings"], 2);
    }

    #[tokio::test]
    async fn file_backed_roster_cannot_be_replaced() {
        let path = std::env::temp_dir().join(format!("santa_roster_{}.json", uuid::Uuid::new_v4()));
        let engine = PairingEngine::new(
            Arc::new(FileParticipantSource::new(path.clone())),
            Arc::new(MemoryPairingStore::default()),
            EngineConfig::default(),
        );
        let app = app(AppState::new(engine, None, ADMIN));

        let res = app
            .clone()
            .oneshot(admin_request(
                Method::PUT,
                "/admin/participants",
                Some(balanced_roster()),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        // Missing roster file surfaces as a server error, not a panic.
        let res = app
            .clone()
            .oneshot(admin_request(
                Method::POST,
                "/admin/pairings/generate-by-bucket",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn startup_fails_on_corrupt_snapshot() {
        let path = std::env::temp_dir().join(format!("santa_boot_{}.json", Uuid::new_v4()));
        tokio::fs::write(&path, "[{").await.unwrap();
        let config = Config {
            bind_addr: "127.0.0.1:0".into(),
            admin_password: ADMIN.into(),
            store: StoreBackend::Json(path.clone()),
            roster_path: None,
            engine: EngineConfig::default(),
        };
        let result = AppState::from_config(&config).await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
