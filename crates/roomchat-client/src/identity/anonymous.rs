//! Anonymous sign-up against the hosted identity REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use roomchat_common::SessionId;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{Identity, IdentityProvider};
use crate::error::AuthError;

#[derive(Clone)]
pub struct AnonymousAuthConfig {
    /// Base URL, e.g. `https://identitytoolkit.googleapis.com`.
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AnonymousAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnonymousAuthConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AnonymousAuthConfig {
    pub(crate) fn sign_up_url(&self) -> String {
        format!(
            "{}/v1/accounts:signUp?key={}",
            self.endpoint.trim_end_matches('/'),
            self.api_key
        )
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Identity provider backed by the hosted anonymous sign-up endpoint.
pub struct AnonymousAuth {
    config: AnonymousAuthConfig,
    http: reqwest::Client,
}

impl AnonymousAuth {
    pub fn new(config: AnonymousAuthConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl IdentityProvider for AnonymousAuth {
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        debug!(endpoint = %self.config.endpoint, "Anonymous sign-up request");

        let response = self
            .http
            .post(self.config.sign_up_url())
            .json(&serde_json::json!({ "returnSecureToken": true }))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !status.is_success() {
            let reason = parse_error(&body).unwrap_or_else(|| format!("HTTP {status}"));
            warn!(status = %status, reason = %reason, "Anonymous sign-up rejected");
            return Err(AuthError::Rejected(reason));
        }

        let identity = parse_sign_up(&body)?;
        info!(user_id = %identity.user_id, "Signed in anonymously");
        Ok(identity)
    }
}

fn parse_sign_up(body: &str) -> Result<Identity, AuthError> {
    let parsed: SignUpResponse =
        serde_json::from_str(body).map_err(|e| AuthError::Malformed(e.to_string()))?;
    if parsed.local_id.is_empty() {
        return Err(AuthError::Malformed("empty localId".into()));
    }
    Ok(Identity {
        user_id: SessionId::from(parsed.local_id),
        id_token: parsed.id_token,
    })
}

fn parse_error(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnonymousAuthConfig {
        AnonymousAuthConfig {
            endpoint: "https://identity.example.com/".into(),
            api_key: "k123".into(),
            timeout_secs: 20,
        }
    }

    #[test]
    fn sign_up_url_includes_key() {
        assert_eq!(
            config().sign_up_url(),
            "https://identity.example.com/v1/accounts:signUp?key=k123"
        );
    }

    #[test]
    fn config_debug_redacts_key() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("k123"));
    }

    #[test]
    fn parses_successful_sign_up() {
        let identity =
            parse_sign_up(r#"{"kind":"x","localId":"abc","idToken":"tok","expiresIn":"3600"}"#)
                .unwrap();
        assert_eq!(identity.user_id.as_str(), "abc");
        assert_eq!(identity.id_token.as_deref(), Some("tok"));
    }

    #[test]
    fn rejects_missing_or_empty_local_id() {
        assert!(matches!(
            parse_sign_up(r#"{"idToken":"tok"}"#),
            Err(AuthError::Malformed(_))
        ));
        assert!(matches!(
            parse_sign_up(r#"{"localId":""}"#),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn extracts_error_message() {
        let body = r#"{"error":{"code":400,"message":"ADMIN_ONLY_OPERATION"}}"#;
        assert_eq!(parse_error(body).as_deref(), Some("ADMIN_ONLY_OPERATION"));
        assert_eq!(parse_error("<html>"), None);
    }
}
