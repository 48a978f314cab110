use crate::apikey::ApiKey;
use crate::error::{CanvasError, Result};
use crate::token::OAuthToken;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};

/// Which authentication scheme requests are expected to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    ApiKey,
    OAuth,
}

/// Authentication material attached to outbound requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(ApiKey),
    OAuth(OAuthToken),
}

impl Credential {
    /// Value for the `Authorization: Bearer` header
    pub fn bearer(&self) -> &str {
        match self {
            Credential::ApiKey(key) => key.expose(),
            Credential::OAuth(token) => &token.access_token,
        }
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            Credential::ApiKey(_) => AuthMode::ApiKey,
            Credential::OAuth(_) => AuthMode::OAuth,
        }
    }

    pub fn is_oauth(&self) -> bool {
        matches!(self, Credential::OAuth(_))
    }

    /// An OAuth credential whose access token has expired at `now`
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Credential::OAuth(token) => token.is_expired_at(now),
            Credential::ApiKey(_) => false,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    mode: AuthMode,
    credential: Option<Credential>,
}

/// Holds the active credential for a client.
///
/// Reads take a shared lock; token refreshes are serialized through a separate
/// guard so that concurrent requests hitting an expired token refresh only once.
#[derive(Debug, Default)]
pub struct CredentialStore {
    state: RwLock<State>,
    refresh: Mutex<()>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(key: impl Into<ApiKey>) -> Self {
        let store = Self::new();
        store.set_api_key(key);
        store
    }

    pub fn with_oauth_token(token: OAuthToken) -> Self {
        let store = Self::new();
        store.set_oauth_token(token);
        store
    }

    /// Use a static API key for all subsequent requests
    pub fn set_api_key(&self, key: impl Into<ApiKey>) {
        let mut state = self.state.write();
        state.mode = AuthMode::ApiKey;
        state.credential = Some(Credential::ApiKey(key.into()));
    }

    /// Use an OAuth token pair for all subsequent requests
    pub fn set_oauth_token(&self, token: OAuthToken) {
        let mut state = self.state.write();
        state.mode = AuthMode::OAuth;
        state.credential = Some(Credential::OAuth(token));
    }

    /// Switch the expected authentication scheme without touching the credential.
    /// A credential of the other kind is treated as missing until replaced.
    pub fn set_auth_mode(&self, mode: AuthMode) {
        self.state.write().mode = mode;
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.state.read().mode
    }

    /// Clear the active credential
    pub fn logout(&self) {
        self.state.write().credential = None;
    }

    /// The credential requests should use right now
    pub fn current_credential(&self) -> Result<Credential> {
        let state = self.state.read();
        match (state.mode, state.credential.as_ref()) {
            (AuthMode::ApiKey, Some(Credential::ApiKey(key))) if !key.is_empty() => {
                Ok(Credential::ApiKey(key.clone()))
            }
            (AuthMode::OAuth, Some(Credential::OAuth(token))) if !token.access_token.is_empty() => {
                Ok(Credential::OAuth(token.clone()))
            }
            (AuthMode::ApiKey, _) => Err(CanvasError::MissingApiKey),
            (AuthMode::OAuth, _) => Err(CanvasError::MissingOAuthToken),
        }
    }

    /// The active OAuth token
    pub fn oauth_token(&self) -> Result<OAuthToken> {
        match self.state.read().credential.as_ref() {
            Some(Credential::OAuth(token)) => Ok(token.clone()),
            _ => Err(CanvasError::MissingOAuthToken),
        }
    }

    /// Replace the access token and expiry after a refresh
    pub fn update_access_token(
        &self,
        access_token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.state.write();
        match state.credential.as_mut() {
            Some(Credential::OAuth(token)) => {
                token.access_token = access_token.into();
                token.expires_at = expires_at;
                Ok(())
            }
            _ => Err(CanvasError::MissingOAuthToken),
        }
    }

    /// Install `token` only if the stored access token is still `observed_access`.
    ///
    /// Returns false when another refresh or a reconfiguration got there first;
    /// the caller's token is then stale and must be discarded.
    pub(crate) fn replace_if_current(&self, observed_access: &str, token: OAuthToken) -> bool {
        let mut state = self.state.write();
        match state.credential.as_mut() {
            Some(Credential::OAuth(current)) if current.access_token == observed_access => {
                *current = token;
                true
            }
            _ => false,
        }
    }

    /// Single-flight guard held for the duration of a token refresh
    pub(crate) fn refresh_guard(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_missing_credentials_depend_on_mode() {
        let store = CredentialStore::new();
        assert!(matches!(store.current_credential(), Err(CanvasError::MissingApiKey)));

        store.set_auth_mode(AuthMode::OAuth);
        assert!(matches!(store.current_credential(), Err(CanvasError::MissingOAuthToken)));
    }

    #[test]
    fn test_only_one_credential_is_active() {
        let store = CredentialStore::with_api_key("key");
        store.set_oauth_token(OAuthToken::new("A1", "R1", None));

        let credential = store.current_credential().unwrap();
        assert_eq!(credential.mode(), AuthMode::OAuth);
        assert_eq!(credential.bearer(), "A1");

        // mismatched mode counts as missing
        store.set_auth_mode(AuthMode::ApiKey);
        assert!(matches!(store.current_credential(), Err(CanvasError::MissingApiKey)));
    }

    #[test]
    fn test_update_access_token() {
        let store = CredentialStore::with_oauth_token(OAuthToken::new("A1", "R1", None));
        let expires = Utc::now() + Duration::hours(1);
        store.update_access_token("A2", Some(expires)).unwrap();

        let token = store.oauth_token().unwrap();
        assert_eq!(token.access_token, "A2");
        assert_eq!(token.refresh_token, "R1");
        assert_eq!(token.expires_at, Some(expires));

        let store = CredentialStore::with_api_key("key");
        assert!(matches!(
            store.update_access_token("A2", None),
            Err(CanvasError::MissingOAuthToken)
        ));
    }

    #[test]
    fn test_replace_if_current_discards_stale_refresh() {
        let store = CredentialStore::with_oauth_token(OAuthToken::new("A1", "R1", None));

        assert!(store.replace_if_current("A1", OAuthToken::new("A2", "R1", None)));
        // a second refresh that started from A1 lost the race
        assert!(!store.replace_if_current("A1", OAuthToken::new("A3", "R1", None)));
        assert_eq!(store.oauth_token().unwrap().access_token, "A2");
    }

    #[test]
    fn test_logout() {
        let store = CredentialStore::with_oauth_token(OAuthToken::new("A1", "R1", None));
        store.logout();
        assert!(matches!(store.current_credential(), Err(CanvasError::MissingOAuthToken)));
    }

    #[test]
    fn test_stale_only_for_expired_oauth() {
        let now = Utc::now();
        let expired_at = now - Duration::minutes(1);
        let expired = Credential::OAuth(OAuthToken::new("A", "R", Some(expired_at)));
        assert!(expired.is_stale_at(now));
        assert!(!Credential::ApiKey(ApiKey::new("k")).is_stale_at(now));
    }
}
