//! OAuth PKCE acquirer: obtains a fresh access/refresh-token pair via an
//! RFC 7636 authorization-code grant, public client, no client secret.

pub mod pkce;
pub mod server;

use tracing::{info, warn};

use crate::error::CoreError;
use crate::remote::CachedTokens;
use pkce::{build_auth_url, AuthUrlParams, CALLBACK_PORT, REDIRECT_PATH};
use server::{run_callback_server, AuthSession, TokenResponse};

/// Remote-specific OAuth endpoints and client identity; the Remote SDK
/// itself is out of scope, but the acquirer still needs these three
/// URLs and a client id to build the authorization request.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub client_id: String,
    pub scopes: Vec<String>,
}

pub struct AuthFlowResult {
    pub authorization_url: String,
    pub tokens: TokenResponse,
}

/// `startAuthFlow(openBrowser?)`. Returns the authorization URL
/// alongside the exchanged tokens once the one-shot callback completes.
pub async fn start_auth_flow(
    endpoints: &OAuthEndpoints,
    open_browser: bool,
) -> Result<AuthFlowResult, CoreError> {
    let pair = pkce::generate();
    let state = pkce::generate_state();
    let redirect_uri = format!("http://127.0.0.1:{CALLBACK_PORT}{REDIRECT_PATH}");

    let authorization_url = build_auth_url(AuthUrlParams {
        authorization_endpoint: &endpoints.authorization_endpoint,
        client_id: &endpoints.client_id,
        redirect_uri: &redirect_uri,
        scopes: &endpoints.scopes,
        state: &state,
        code_challenge: &pair.code_challenge,
    });

    info!(url = %authorization_url, "starting oauth authorization flow");

    if open_browser {
        if let Err(err) = webbrowser::open(&authorization_url) {
            warn!(%err, "failed to open browser automatically; printed URL is still valid");
        }
    }

    let session = AuthSession {
        expected_state: state,
        code_verifier: pair.code_verifier,
        client_id: endpoints.client_id.clone(),
        token_endpoint: endpoints.token_endpoint.clone(),
        redirect_uri,
    };

    let tokens = run_callback_server(session).await?;

    Ok(AuthFlowResult {
        authorization_url,
        tokens,
    })
}

/// Adapt a freshly exchanged token pair into the on-disk cache shape,
/// stamping `createdAt`/`lastUsed` at call time.
pub fn to_cached_tokens(
    session_id: &str,
    user_email: &str,
    user_name: &str,
    user_id: &str,
    now_rfc3339: &str,
    tokens: &TokenResponse,
) -> CachedTokens {
    CachedTokens {
        session_id: session_id.to_string(),
        access_token: tokens.access_token.clone(),
        refresh_token: tokens.refresh_token.clone(),
        expires_at: tokens.expires_at.clone(),
        scope: tokens.scope.clone(),
        token_type: tokens.token_type.clone(),
        user_email: user_email.to_string(),
        user_name: user_name.to_string(),
        user_id: user_id.to_string(),
        created_at: now_rfc3339.to_string(),
        last_used: now_rfc3339.to_string(),
    }
}
