use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tower_http::cors::CorsLayer;

use crate::assistant::{Assistant, AssistantSettings, ReplySource};
use crate::auth::{AccountDomain, AuthError, Authenticator, BrandAuthenticator, CreatorAuthenticator, SignUp};
use crate::completion::GeminiClient;
use crate::config::Config;
use crate::conversation::{Conversation, Message};
use crate::database::Database;
use crate::modes::{Mode, Tone};
use crate::rate_limiter::RateLimiter;
use crate::sessions::SessionRegistry;
use crate::stats::{daily_series, SyntheticStats};

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub sessions: Arc<SessionRegistry>,
    /// Per chat session
    pub rate_limiter: Arc<RateLimiter>,
    /// Per peer address, so rotating session ids does not reset the budget
    pub client_rate_limiter: Arc<RateLimiter>,
    pub creators: Arc<dyn Authenticator>,
    pub brands: Arc<dyn Authenticator>,
    pub usage: Option<Database>,
}

impl AppState {
    fn authenticator(&self, domain: &str) -> Result<&Arc<dyn Authenticator>, (StatusCode, Json<Value>)> {
        match domain.parse::<AccountDomain>() {
            Ok(AccountDomain::Creator) => Ok(&self.creators),
            Ok(AccountDomain::Brand) => Ok(&self.brands),
            Err(_) => Err(api_error(StatusCode::NOT_FOUND, &format!("Unknown account domain '{}'", domain))),
        }
    }
}

#[derive(Deserialize)]
pub struct ChatPayload {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Deserialize)]
pub struct SettingPayload {
    pub session_id: String,
    pub value: String,
}

#[derive(Deserialize)]
pub struct SessionPayload {
    pub session_id: String,
}

#[derive(Deserialize)]
pub struct SignInPayload {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub seed: Option<String>,
    pub days: Option<usize>,
}

fn api_error(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message })))
}

fn auth_error(e: AuthError) -> (StatusCode, Json<Value>) {
    let status = match e {
        AuthError::InvalidCredentials | AuthError::UnknownSession => StatusCode::UNAUTHORIZED,
        AuthError::AccountExists(_) => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    api_error(status, &e.to_string())
}

fn conversation_json(conversation: &Conversation) -> Value {
    json!({
        "session_id": conversation.session_id(),
        "mode": conversation.mode(),
        "tone": conversation.tone(),
        "typing": conversation.is_typing(),
        "messages": conversation.messages(),
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/chat", post(handle_chat))
        .route("/mode", post(handle_set_mode))
        .route("/tone", post(handle_set_tone))
        .route("/reset", post(handle_reset))
        .route("/history/:session_id", get(handle_history))
        .route("/stats", get(handle_stats))
        .route("/auth/:domain/signup", post(handle_sign_up))
        .route("/auth/:domain/signin", post(handle_sign_in))
        .route("/auth/:domain/signout", post(handle_sign_out))
        .route("/auth/:domain/me", get(handle_current_account))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Assistant HTTP server is running",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn rate_limited(retry_after: Duration) -> (StatusCode, Json<Value>) {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "You're sending messages too quickly! Please slow down.",
            "retry_after_secs": retry_after.as_secs().max(1),
        })),
    )
}

async fn handle_chat(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(payload): Json<ChatPayload>,
) -> ApiResult {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Message must not be empty"));
    }

    let client_key = peer.ip().to_string();
    if let Err(retry_after) = state.client_rate_limiter.check(&client_key) {
        warn!("Rate limit exceeded for client: {}", client_key);
        return Err(rate_limited(retry_after));
    }

    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(SessionRegistry::new_session_id);

    if let Err(retry_after) = state.rate_limiter.check(&session_id) {
        warn!("Rate limit exceeded for session: {}", session_id);
        return Err(rate_limited(retry_after));
    }

    let conversation = state.sessions.get_or_restore(&session_id).await;
    let mode = conversation.lock().await.mode();
    debug!("Chat message for session {} in {} mode", session_id, mode);

    let reply = state
        .assistant
        .handle_message(&conversation, &payload.message)
        .await
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "The reply could not be produced"))?;

    if let Some(usage) = &state.usage {
        let route = match reply.source {
            ReplySource::Local => "local",
            ReplySource::Remote(route) => route.as_str(),
        };
        if let Err(e) = usage.log_usage(&session_id, mode.as_str(), route).await {
            error!("Failed to log usage for session {}: {}", session_id, e);
        }
    }

    let message_count = conversation.lock().await.messages().len();
    let remaining = state
        .rate_limiter
        .remaining(&session_id)
        .min(state.client_rate_limiter.remaining(&client_key));
    Ok(Json(json!({
        "session_id": session_id,
        "reply": reply.message,
        "source": reply.source,
        "failed": reply.failed,
        "message_count": message_count,
        "rate_limit_remaining": remaining,
    })))
}

async fn handle_set_mode(State(state): State<AppState>, Json(payload): Json<SettingPayload>) -> ApiResult {
    let conversation = state.sessions.get_or_restore(&payload.session_id).await;
    let mut conversation = conversation.lock().await;
    let accepted = conversation.set_mode(&payload.value).await;
    info!("Mode change to '{}' for session {} accepted: {}", payload.value, payload.session_id, accepted);

    let mut body = conversation_json(&conversation);
    body["accepted"] = json!(accepted);
    Ok(Json(body))
}

async fn handle_set_tone(State(state): State<AppState>, Json(payload): Json<SettingPayload>) -> ApiResult {
    let conversation = state.sessions.get_or_restore(&payload.session_id).await;
    let mut conversation = conversation.lock().await;
    let accepted = conversation.set_tone(&payload.value).await;

    let mut body = conversation_json(&conversation);
    body["accepted"] = json!(accepted);
    Ok(Json(body))
}

async fn handle_reset(State(state): State<AppState>, Json(payload): Json<SessionPayload>) -> ApiResult {
    let conversation = state.sessions.get_or_restore(&payload.session_id).await;
    let mut conversation = conversation.lock().await;
    conversation.reset().await;
    info!("Reset session {}", payload.session_id);
    Ok(Json(conversation_json(&conversation)))
}

fn stored_history_json(session_id: &str, messages: &[Message]) -> Value {
    json!({
        "session_id": session_id,
        "mode": Mode::default(),
        "tone": Tone::default(),
        "typing": false,
        "messages": messages,
    })
}

/// Reads a session without opening it; unknown ids are a 404.
async fn handle_history(State(state): State<AppState>, Path(session_id): Path<String>) -> ApiResult {
    if let Some(conversation) = state.sessions.get(&session_id) {
        let conversation = conversation.lock().await;
        return Ok(Json(conversation_json(&conversation)));
    }

    let stored = state.sessions.stored_history(&session_id).await.map_err(|e| {
        error!("Failed to read history for session {}: {}", session_id, e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "History is unavailable")
    })?;
    if stored.is_empty() {
        return Err(api_error(StatusCode::NOT_FOUND, "Unknown session"));
    }
    Ok(Json(stored_history_json(&session_id, &stored)))
}

const USAGE_ROUTES: &[&str] = &["local", "general", "content", "originality", "conceptual_similarity"];

async fn handle_stats(State(state): State<AppState>, Query(query): Query<StatsQuery>) -> ApiResult {
    let seed = query.seed.unwrap_or_else(|| "dashboard".to_string());
    let days = query.days.unwrap_or(30).min(365);

    // Real counters, kept apart from the synthetic numbers
    let mut usage = serde_json::Map::new();
    if let Some(database) = &state.usage {
        for route in USAGE_ROUTES {
            match database.usage_count(route).await {
                Ok(count) => {
                    usage.insert(route.to_string(), json!(count));
                }
                Err(e) => error!("Failed to read usage count for {}: {}", route, e),
            }
        }
    }

    Ok(Json(json!({
        "stats": SyntheticStats::for_seed(&seed),
        "series": daily_series(&seed, days),
        "usage": usage,
    })))
}

async fn handle_sign_up(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(payload): Json<SignUp>,
) -> ApiResult {
    let authenticator = state.authenticator(&domain)?;
    let session = authenticator.sign_up(payload).await.map_err(auth_error)?;
    info!("New {} account signed up: {}", authenticator.domain().as_str(), session.account.email);
    Ok(Json(json!(session)))
}

async fn handle_sign_in(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(payload): Json<SignInPayload>,
) -> ApiResult {
    let authenticator = state.authenticator(&domain)?;
    let session = authenticator
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(auth_error)?;
    Ok(Json(json!(session)))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, (StatusCode, Json<Value>)> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Missing bearer token"))
}

async fn handle_sign_out(State(state): State<AppState>, Path(domain): Path<String>, headers: HeaderMap) -> ApiResult {
    let authenticator = state.authenticator(&domain)?;
    let token = bearer_token(&headers)?;
    authenticator.sign_out(token).await.map_err(auth_error)?;
    Ok(Json(json!({ "signed_out": true })))
}

async fn handle_current_account(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    headers: HeaderMap,
) -> ApiResult {
    let authenticator = state.authenticator(&domain)?;
    let token = bearer_token(&headers)?;
    let account = authenticator.current_account(token).await.map_err(auth_error)?;
    Ok(Json(json!(account)))
}

/// Periodically drops idle sessions and expired rate-limit keys.
fn spawn_sweeper(state: AppState, session_idle: Duration) {
    tokio::spawn(async move {
        let mut sweep = interval(SWEEP_INTERVAL);
        loop {
            sweep.tick().await;
            let sessions = state.sessions.evict_idle(session_idle);
            let keys = state.rate_limiter.prune() + state.client_rate_limiter.prune();
            if sessions > 0 || keys > 0 {
                info!("Swept {} idle session(s) and {} rate-limit key(s)", sessions, keys);
            }
        }
    });
}

pub async fn start_http_server(config: Config) -> Result<()> {
    let database = Database::new(&config.database_path).await?;
    info!("✅ Database connected");

    if config.gemini_api_key.is_none() {
        warn!("⚠️ GEMINI_API_KEY is not set; chat replies will report a configuration error");
    }
    let client = Arc::new(GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone()));
    let assistant = Assistant::new(
        client,
        AssistantSettings {
            analysis_word_ceiling: config.analysis_word_ceiling,
            simulate_typing: config.simulate_typing,
            ..AssistantSettings::default()
        },
    );

    let state = AppState {
        assistant: Arc::new(assistant),
        sessions: Arc::new(SessionRegistry::new(Arc::new(database.clone()), config.context_window_chars)),
        rate_limiter: Arc::new(RateLimiter::new(config.chat_rate_limit_per_minute, Duration::from_secs(60))),
        client_rate_limiter: Arc::new(RateLimiter::new(config.client_rate_limit_per_minute, Duration::from_secs(60))),
        creators: Arc::new(CreatorAuthenticator::new()),
        brands: Arc::new(BrandAuthenticator::new()),
        usage: Some(database),
    };

    spawn_sweeper(state.clone(), Duration::from_secs(config.session_idle_minutes * 60));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|e| anyhow!("Failed to bind to port {}: {}", config.http_port, e))?;

    info!("HTTP server starting on port {}", config.http_port);
    info!("Chat endpoint: http://0.0.0.0:{}/chat", config.http_port);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| anyhow!("HTTP server error: {}", e))?;

    Ok(())
}
