use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use taskdraft_core::session::{SessionClaims, SessionVerifier};
use taskdraft_core::{DraftError, InvalidRequest, OutputError, TaskDraft, TaskDrafter};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub drafter: TaskDrafter,
    pub sessions: Arc<dyn SessionVerifier>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    raw: Option<Value>,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            raw: None,
        }
    }

    fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Drop the diagnostic payload from the response, logging it instead.
    fn without_raw(mut self) -> Self {
        if let Some(raw) = self.raw.take() {
            tracing::warn!(error = %self.message, %raw, "ai-create-todo failed");
        }
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "not authenticated")
    }

    pub fn prompt_missing() -> Self {
        Self::new(StatusCode::BAD_REQUEST, InvalidRequest::PromptMissing.to_string())
    }
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::InvalidRequest(InvalidRequest::PromptMissing) => Self::prompt_missing(),
            DraftError::InvalidRequest(InvalidRequest::PromptTooLong { .. }) => {
                Self::new(StatusCode::BAD_REQUEST, "prompt too long")
            }
            DraftError::ModelUnavailable(e) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "AI request failed")
                    .with_raw(Value::String(e.detail()))
            }
            DraftError::InvalidModelOutput(e) => {
                let message = match &e {
                    OutputError::InvalidJson { .. } => "AI returned invalid JSON".to_string(),
                    OutputError::NotAnArray { .. } => e.to_string(),
                    other => format!("AI returned an invalid task: {other}"),
                };
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, message).with_raw(e.raw())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = match self.raw {
            Some(raw) => serde_json::json!({ "error": self.message, "raw": raw }),
            None => serde_json::json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// The verified caller of a drafting route.
pub struct Caller(pub SessionClaims);

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(AppError::unauthorized)?;

        match state.sessions.verify(token) {
            Ok(claims) => Ok(Caller(claims)),
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                Err(AppError::unauthorized())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ai-create-todo", post(create_todo))
        .route("/ai-todo-breakdown", post(todo_breakdown))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("taskdraft serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("taskdraft serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_todo(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Bytes,
) -> Result<Json<TaskDraft>, AppError> {
    let prompt = prompt_from_body(&body)?;
    tracing::info!(user_id = %caller.user_id, "ai-create-todo");
    let draft = state
        .drafter
        .generate_single_task(&prompt)
        .await
        .map_err(|e| AppError::from(e).without_raw())?;
    Ok(Json(draft))
}

async fn todo_breakdown(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Bytes,
) -> Result<Json<Vec<TaskDraft>>, AppError> {
    let prompt = prompt_from_body(&body)?;
    tracing::info!(user_id = %caller.user_id, "ai-todo-breakdown");
    let drafts = state.drafter.decompose_goal(&prompt).await?;
    Ok(Json(drafts))
}

/// Pull the `prompt` string out of a `{"prompt": ...}` body.
///
/// Bodies that are not JSON, and prompts that are absent or not strings,
/// all count as a missing prompt.
fn prompt_from_body(body: &[u8]) -> Result<String, AppError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| AppError::prompt_missing())?;
    match value.get("prompt") {
        Some(Value::String(prompt)) => Ok(prompt.clone()),
        _ => Err(AppError::prompt_missing()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use chrono::Duration;
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use taskdraft_core::ModelError;
    use taskdraft_core::session::{HmacSessionVerifier, SessionConfig, generate_session_token};
    use taskdraft_core::FixedClock;
    use taskdraft_test_utils::{
        ScriptedModel, drafter_at, monday_reference, tax_return_json, trip_plan_json,
    };

    use super::AppState;

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    fn session_config() -> SessionConfig {
        SessionConfig::new(b"router-test-secret".to_vec())
    }

    fn state_with(model: Arc<ScriptedModel>) -> AppState {
        let clock = Arc::new(FixedClock(monday_reference()));
        AppState {
            drafter: drafter_at(model, monday_reference()),
            sessions: Arc::new(HmacSessionVerifier::new(session_config()).with_clock(clock)),
        }
    }

    fn valid_token() -> String {
        generate_session_token(
            &session_config(),
            Uuid::new_v4(),
            monday_reference() + Duration::hours(1),
        )
    }

    async fn post(
        model: Arc<ScriptedModel>,
        uri: &str,
        token: Option<&str>,
        body: &str,
    ) -> axum::response::Response {
        let app = super::build_router(state_with(model));
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }

    async fn post_authed(
        model: Arc<ScriptedModel>,
        uri: &str,
        body: &str,
    ) -> axum::response::Response {
        post(model, uri, Some(&valid_token()), body).await
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // -----------------------------------------------------------------------
    // Health / CORS / auth
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let app = super::build_router(state_with(Arc::new(ScriptedModel::replying("{}"))));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_preflight_is_permissive() {
        let app = super::build_router(state_with(Arc::new(ScriptedModel::replying("{}"))));
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/ai-create-todo")
                    .header(header::ORIGIN, "https://app.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "preflight should carry allow-origin"
        );
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let model = Arc::new(ScriptedModel::replying(tax_return_json()));
        let resp = post(model.clone(), "/ai-create-todo", None, r#"{"prompt":"x"}"#).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await, json!({ "error": "not authenticated" }));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_forged_token_is_unauthorized() {
        let model = Arc::new(ScriptedModel::replying(trip_plan_json()));
        let forged = generate_session_token(
            &SessionConfig::new(b"someone-else".to_vec()),
            Uuid::new_v4(),
            monday_reference() + Duration::hours(1),
        );
        let resp = post(
            model.clone(),
            "/ai-todo-breakdown",
            Some(&forged),
            r#"{"prompt":"x"}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let model = Arc::new(ScriptedModel::replying(tax_return_json()));
        let expired = generate_session_token(
            &session_config(),
            Uuid::new_v4(),
            monday_reference() - Duration::seconds(1),
        );
        let resp = post(model, "/ai-create-todo", Some(&expired), r#"{"prompt":"x"}"#).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    // -----------------------------------------------------------------------
    // /ai-create-todo
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_todo_returns_draft() {
        let model = Arc::new(ScriptedModel::replying(tax_return_json()));
        let resp = post_authed(
            model.clone(),
            "/ai-create-todo",
            r#"{"prompt":"finish tax return by friday, it's urgent"}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({
                "title": "Finish tax return",
                "description": "Complete and file the tax return before the deadline.",
                "priority": "high",
                "due_date": "2024-03-08T23:59:59Z",
            })
        );
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_create_todo_missing_prompt() {
        for body in [r#"{}"#, r#"{"prompt":42}"#, r#"{"prompt":null}"#, "not json", ""] {
            let model = Arc::new(ScriptedModel::replying(tax_return_json()));
            let resp = post_authed(model.clone(), "/ai-create-todo", body).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {body:?}");
            assert_eq!(body_json(resp).await, json!({ "error": "prompt is required" }));
            assert_eq!(model.call_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_create_todo_blank_prompt() {
        let model = Arc::new(ScriptedModel::replying(tax_return_json()));
        let resp = post_authed(model.clone(), "/ai-create-todo", r#"{"prompt":"   "}"#).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_todo_invalid_priority() {
        let model = Arc::new(ScriptedModel::replying(
            r#"{"title":"Buy milk","priority":"urgent","due_date":null}"#,
        ));
        let resp = post_authed(model, "/ai-create-todo", r#"{"prompt":"buy milk"}"#).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        let error = json["error"].as_str().unwrap();
        assert!(
            error.starts_with("AI returned an invalid task: invalid priority"),
            "unexpected error: {error}"
        );
        assert!(json.get("raw").is_none(), "raw leaked: {json}");
    }

    #[tokio::test]
    async fn test_create_todo_model_failure_hides_backend_body() {
        let model = Arc::new(ScriptedModel::failing(ModelError::Status {
            status: 429,
            body: "quota exceeded".to_string(),
        }));
        let resp = post_authed(model, "/ai-create-todo", r#"{"prompt":"buy milk"}"#).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await, json!({ "error": "AI request failed" }));
    }

    #[tokio::test]
    async fn test_create_todo_invalid_json_has_only_error() {
        let model = Arc::new(ScriptedModel::replying("not json at all"));
        let resp = post_authed(model, "/ai-create-todo", r#"{"prompt":"buy milk"}"#).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await, json!({ "error": "AI returned invalid JSON" }));
    }

    // -----------------------------------------------------------------------
    // /ai-todo-breakdown
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_breakdown_returns_array() {
        let model = Arc::new(ScriptedModel::replying(trip_plan_json()));
        let resp = post_authed(
            model,
            "/ai-todo-breakdown",
            r#"{"prompt":"plan a weekend trip to the coast"}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let items = json.as_array().expect("response should be an array");
        assert_eq!(items.len(), 3);
        assert_eq!(items[1]["due_date"], serde_json::Value::Null);
        assert_eq!(items[2]["priority"], "low");
    }

    #[tokio::test]
    async fn test_breakdown_prompt_too_long() {
        let model = Arc::new(ScriptedModel::replying(trip_plan_json()));
        let body = json!({ "prompt": "a".repeat(801) }).to_string();
        let resp = post_authed(model.clone(), "/ai-todo-breakdown", &body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await, json!({ "error": "prompt too long" }));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_breakdown_missing_prompt() {
        let model = Arc::new(ScriptedModel::replying(trip_plan_json()));
        let resp = post_authed(model, "/ai-todo-breakdown", r#"{"goal":"x"}"#).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await, json!({ "error": "prompt is required" }));
    }

    #[tokio::test]
    async fn test_breakdown_model_failure() {
        let model = Arc::new(ScriptedModel::failing(ModelError::Status {
            status: 429,
            body: "quota exceeded".to_string(),
        }));
        let resp = post_authed(model, "/ai-todo-breakdown", r#"{"prompt":"plan"}"#).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(resp).await,
            json!({ "error": "AI request failed", "raw": "quota exceeded" })
        );
    }

    #[tokio::test]
    async fn test_breakdown_invalid_json() {
        let model = Arc::new(ScriptedModel::replying("```json\nnot json at all\n```"));
        let resp = post_authed(model, "/ai-todo-breakdown", r#"{"prompt":"plan"}"#).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(resp).await,
            json!({ "error": "AI returned invalid JSON", "raw": "not json at all" })
        );
    }

    #[tokio::test]
    async fn test_breakdown_not_an_array() {
        let model = Arc::new(ScriptedModel::replying(r#"{"title":"x"}"#));
        let resp = post_authed(model, "/ai-todo-breakdown", r#"{"prompt":"plan"}"#).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(resp).await,
            json!({ "error": "AI did not return an array", "raw": { "title": "x" } })
        );
    }

    #[tokio::test]
    async fn test_breakdown_too_many_items() {
        let item = json!({ "title": "Step", "priority": "low", "due_date": null });
        let model = Arc::new(ScriptedModel::replying(
            serde_json::Value::Array(vec![item; 6]).to_string(),
        ));
        let resp = post_authed(model, "/ai-todo-breakdown", r#"{"prompt":"plan"}"#).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .starts_with("AI returned an invalid task"),
        );
        assert_eq!(json["raw"].as_array().unwrap().len(), 6);
    }
}
