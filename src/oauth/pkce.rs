//! RFC 7636 PKCE material: verifier/challenge generation and the
//! authorization-URL builder.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const CODE_VERIFIER_BYTES: usize = 96;
pub const CALLBACK_PORT: u16 = 3000;
pub const REDIRECT_PATH: &str = "/callback";

#[derive(Debug, Clone)]
pub struct PkcePair {
    pub code_verifier: String,
    pub code_challenge: String,
}

/// `codeVerifier` = 96 random bytes, base64url. `codeChallenge` =
/// base64url(SHA-256(codeVerifier)).
pub fn generate() -> PkcePair {
    let mut bytes = [0u8; CODE_VERIFIER_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let code_verifier = URL_SAFE_NO_PAD.encode(bytes);
    let code_challenge = challenge_for(&code_verifier);
    PkcePair {
        code_verifier,
        code_challenge,
    }
}

pub fn challenge_for(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Random UUID v4 CSRF token.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub struct AuthUrlParams<'a> {
    pub authorization_endpoint: &'a str,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scopes: &'a [String],
    pub state: &'a str,
    pub code_challenge: &'a str,
}

/// Build the authorization-request URL.
pub fn build_auth_url(params: AuthUrlParams<'_>) -> String {
    let scope = params.scopes.join(" ");
    let mut url = url_base(params.authorization_endpoint);
    url.push_str("response_type=code");
    url.push_str("&access_type=offline");
    url.push_str("&prompt=consent");
    url.push_str("&code_challenge_method=S256");
    append_param(&mut url, "client_id", params.client_id);
    append_param(&mut url, "redirect_uri", params.redirect_uri);
    append_param(&mut url, "scope", &scope);
    append_param(&mut url, "state", params.state);
    append_param(&mut url, "code_challenge", params.code_challenge);
    url
}

fn url_base(endpoint: &str) -> String {
    if endpoint.contains('?') {
        format!("{endpoint}&")
    } else {
        format!("{endpoint}?")
    }
}

fn append_param(url: &mut String, key: &str, value: &str) {
    url.push('&');
    url.push_str(key);
    url.push('=');
    url.push_str(&urlencode(value));
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_96_byte_verifier_and_matching_challenge() {
        let pair = generate();
        let decoded = URL_SAFE_NO_PAD.decode(&pair.code_verifier).unwrap();
        assert_eq!(decoded.len(), CODE_VERIFIER_BYTES);
        assert_eq!(challenge_for(&pair.code_verifier), pair.code_challenge);
    }

    #[test]
    fn two_generated_pairs_differ() {
        let a = generate();
        let b = generate();
        assert_ne!(a.code_verifier, b.code_verifier);
    }

    #[test]
    fn auth_url_contains_required_params() {
        let url = build_auth_url(AuthUrlParams {
            authorization_endpoint: "https://remote.example/oauth/authorize",
            client_id: "client-1",
            redirect_uri: "http://127.0.0.1:3000/callback",
            scopes: &["projects".to_string(), "scripts".to_string()],
            state: "state-123",
            code_challenge: "challenge-abc",
        });
        assert!(url.contains("response_type=code"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("code_challenge=challenge-abc"));
        assert!(url.contains("scope=projects%20scripts"));
    }
}
