//! One-shot loopback callback server: an axum `Router` over shared `State`
//! with graceful shutdown, narrowed to a single request. The server answers
//! exactly one `/callback`, then shuts itself down.

use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Router, http::StatusCode};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::oauth::pkce::{CALLBACK_PORT, REDIRECT_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPhase {
    WaitForCallback,
    Validating,
    Exchanging,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// RFC-3339 expiry with a 60s clock-skew buffer already subtracted
    /// from the provider's `expires_in`.
    pub expires_at: String,
    pub scope: String,
    pub token_type: String,
}

pub struct AuthSession {
    pub expected_state: String,
    pub code_verifier: String,
    pub client_id: String,
    pub token_endpoint: String,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

struct ServerState {
    session: AuthSession,
    phase: Mutex<CallbackPhase>,
    callback_processing: Mutex<bool>,
    result: Mutex<Option<oneshot::Sender<Result<TokenResponse, CoreError>>>>,
    http: reqwest::Client,
}

const SKEW_BUFFER_SECS: i64 = 60;

/// Run the one-shot callback server to completion and return the exchanged
/// tokens, or the failure the callback recorded.
pub async fn run_callback_server(session: AuthSession) -> Result<TokenResponse, CoreError> {
    let (result_tx, result_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let state = Arc::new(ServerState {
        session,
        phase: Mutex::new(CallbackPhase::WaitForCallback),
        callback_processing: Mutex::new(false),
        result: Mutex::new(Some(result_tx)),
        http: reqwest::Client::new(),
    });

    let app = Router::new()
        .route(REDIRECT_PATH, get(handle_callback))
        .route("/health", get(handle_health))
        .route("/favicon.ico", get(handle_favicon))
        .with_state(state);

    let addr = format!("127.0.0.1:{CALLBACK_PORT}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| CoreError::io(format!("binding oauth callback listener on {addr}: {e}")))?;

    info!(%addr, "oauth callback listener started");

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = result_rx
        .await
        .map_err(|_| CoreError::fatal("oauth callback server stopped without a result"))?;

    let _ = shutdown_tx.send(());
    if let Err(err) = server.await {
        warn!(%err, "oauth callback server task join failed");
    }

    outcome
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn handle_favicon() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

async fn handle_callback(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    {
        let phase = *state.phase.lock().expect("lock poisoned");
        if phase == CallbackPhase::Completed || phase == CallbackPhase::Failed {
            return already_processed_page();
        }
    }

    {
        let mut processing = state.callback_processing.lock().expect("lock poisoned");
        if *processing {
            return already_processed_page();
        }
        *processing = true;
    }
    *state.phase.lock().expect("lock poisoned") = CallbackPhase::Validating;

    let outcome = validate_and_exchange(&state, params).await;

    *state.callback_processing.lock().expect("lock poisoned") = false;
    match outcome {
        Ok(tokens) => {
            *state.phase.lock().expect("lock poisoned") = CallbackPhase::Completed;
            send_result(&state, Ok(tokens));
            success_page()
        }
        Err(err) => {
            *state.phase.lock().expect("lock poisoned") = CallbackPhase::Failed;
            let page = failure_page(&err);
            send_result(&state, Err(err));
            page
        }
    }
}

async fn validate_and_exchange(
    state: &ServerState,
    params: CallbackParams,
) -> Result<TokenResponse, CoreError> {
    if let Some(error) = params.error {
        return Err(CoreError::Auth {
            message: format!("authorization provider returned an error: {error}"),
            hints: vec![],
        });
    }

    match &params.state {
        Some(received) if received == &state.session.expected_state => {}
        _ => {
            return Err(CoreError::Auth {
                message: "state parameter mismatch (possible CSRF)".to_string(),
                hints: vec![],
            });
        }
    }

    let code = params.code.ok_or_else(|| CoreError::Auth {
        message: "callback did not include an authorization code".to_string(),
        hints: vec![],
    })?;

    *state.phase.lock().expect("lock poisoned") = CallbackPhase::Exchanging;
    exchange_code(state, &code).await
}

async fn exchange_code(state: &ServerState, code: &str) -> Result<TokenResponse, CoreError> {
    #[derive(Deserialize)]
    struct TokenExchangeResponse {
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        #[serde(default)]
        scope: String,
        #[serde(default = "default_token_type")]
        token_type: String,
    }
    fn default_token_type() -> String {
        "Bearer".to_string()
    }

    let response = state
        .http
        .post(&state.session.token_endpoint)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", &state.session.code_verifier),
            ("redirect_uri", &state.session.redirect_uri),
            ("client_id", &state.session.client_id),
        ])
        .send()
        .await
        .map_err(|e| CoreError::Auth {
            message: format!("token exchange request failed: {e}"),
            hints: vec![],
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(CoreError::Auth {
            message: format!("token exchange failed ({status}): {body}"),
            hints: vec![],
        });
    }

    let body: TokenExchangeResponse = response.json().await.map_err(|e| CoreError::Auth {
        message: format!("invalid token exchange response: {e}"),
        hints: vec![],
    })?;

    let expires_at = chrono::Utc::now()
        + chrono::Duration::seconds((body.expires_in - SKEW_BUFFER_SECS).max(0));

    Ok(TokenResponse {
        access_token: body.access_token,
        refresh_token: body.refresh_token,
        expires_at: expires_at.to_rfc3339(),
        scope: body.scope,
        token_type: body.token_type,
    })
}

fn send_result(state: &ServerState, outcome: Result<TokenResponse, CoreError>) {
    if let Some(tx) = state.result.lock().expect("lock poisoned").take() {
        let _ = tx.send(outcome);
    }
}

fn already_processed_page() -> axum::response::Response {
    (
        StatusCode::OK,
        Html("<html><body><p>This authorization has already been processed.</p></body></html>"),
    )
        .into_response()
}

fn success_page() -> axum::response::Response {
    (
        StatusCode::OK,
        Html("<html><body><p>Authentication complete. You may close this window.</p></body></html>"),
    )
        .into_response()
}

fn failure_page(err: &CoreError) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Html(format!(
            "<html><body><p>Authentication failed: {err}</p></body></html>"
        )),
    )
        .into_response()
}
