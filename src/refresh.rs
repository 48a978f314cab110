use crate::client::Config;
use crate::credential::CredentialStore;
use crate::error::{strip_json_prefix, CanvasError, Result};
use crate::token::OAuthToken;
use chrono::{Duration, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;

/// Body returned by the Canvas token endpoint for `grant_type=refresh_token`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Canvas keeps the refresh token unless it rotates it
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// OAuth error body (`{"error": "invalid_grant", "error_description": "..."}`)
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges refresh tokens for new access tokens
#[derive(Debug, Clone)]
pub struct TokenRefresher {
    http: Client,
    config: Config,
}

impl TokenRefresher {
    pub fn new(http: Client, config: Config) -> Self {
        TokenRefresher { http, config }
    }

    /// Call the token endpoint. The returned token keeps `refresh_token`
    /// unless the endpoint issued a new one.
    pub fn exchange(&self, refresh_token: &str) -> Result<OAuthToken> {
        let oauth = self
            .config
            .oauth
            .as_ref()
            .ok_or_else(|| refresh_failed("no OAuth client configured", None))?;
        if refresh_token.is_empty() {
            return Err(refresh_failed("no refresh token available", None));
        }
        let url = self
            .config
            .token_url()
            .map_err(|e| refresh_failed(format!("invalid token endpoint: {}", e), None))?;

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];
        let http_response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .map_err(|e| refresh_failed(format!("token endpoint unreachable: {}", e), None))?;

        let status = http_response.status();
        let code = Some(status.as_u16());
        let body = http_response
            .bytes()
            .map_err(|e| refresh_failed(format!("failed to read token response: {}", e), code))?;
        let body = strip_json_prefix(&body);

        if !status.is_success() {
            let message = serde_json::from_slice::<TokenErrorResponse>(body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| format!("token endpoint returned {}", status));
            return Err(refresh_failed(message, code));
        }

        let renewed: TokenResponse = serde_json::from_slice(body)
            .map_err(|e| refresh_failed(format!("malformed token response: {}", e), code))?;
        if renewed.access_token.is_empty() {
            return Err(refresh_failed(
                "token endpoint returned an empty access token",
                code,
            ));
        }

        Ok(OAuthToken {
            access_token: renewed.access_token,
            refresh_token: renewed
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| refresh_token.to_string()),
            expires_at: renewed
                .expires_in
                .and_then(Duration::try_seconds)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl)),
        })
    }

    /// Make sure the store holds a token newer than `observed`.
    ///
    /// Refreshes are serialized per store: a caller that waited on another
    /// refresh reuses its result instead of hitting the endpoint again.
    pub fn ensure_fresh_token(
        &self,
        store: &CredentialStore,
        observed: &OAuthToken,
    ) -> Result<OAuthToken> {
        let _guard = store.refresh_guard();

        let current = store.oauth_token()?;
        if current.access_token != observed.access_token {
            tracing::debug!("OAuth token already refreshed by a concurrent request");
            return Ok(current);
        }

        let renewed = self.exchange(&current.refresh_token).inspect_err(|e| {
            tracing::warn!(error = %e, "OAuth token refresh failed");
        })?;

        if !store.replace_if_current(&observed.access_token, renewed.clone()) {
            tracing::warn!("discarding refreshed OAuth token, credential changed during refresh");
            return store.oauth_token();
        }

        tracing::info!(expires_at = ?renewed.expires_at, "refreshed OAuth access token");
        Ok(renewed)
    }
}

fn refresh_failed(message: impl Into<String>, status: Option<u16>) -> CanvasError {
    CanvasError::OAuthRefreshFailed {
        message: message.into(),
        status,
    }
}
