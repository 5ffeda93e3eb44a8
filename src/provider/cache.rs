//! Session-scoped in-memory token cache.
//!
//! Holds the tokens from the most recent acquisition for the lifetime of the
//! process only. Secrets are zeroized on drop.

use crate::provider::oauth::TokenResponse;
use crate::session::Account;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Access tokens within this window of expiry are treated as expired, so a
/// silent acquisition refreshes instead of returning a token about to die.
const EXPIRY_LEEWAY_SECONDS: i64 = 60;

/// A secure string wrapper that zeroizes its contents on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Cached state from the latest token acquisition.
struct CachedTokens {
    access_token: SecureString,
    refresh_token: Option<SecureString>,
    expires_at: DateTime<Utc>,
}

/// In-memory cache for the provider's single account and its tokens.
#[derive(Default)]
pub struct TokenCache {
    tokens: Mutex<Option<CachedTokens>>,
    account: Mutex<Option<Account>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the outcome of a token acquisition.
    pub async fn store(&self, response: &TokenResponse) {
        let expires_at = Utc::now() + Duration::seconds(response.expires_in as i64);
        let cached = CachedTokens {
            access_token: SecureString::new(response.access_token.clone()),
            refresh_token: response
                .refresh_token
                .clone()
                .map(SecureString::new),
            expires_at,
        };
        *self.tokens.lock().await = Some(cached);
    }

    /// The cached access token, if it is still comfortably within its
    /// lifetime.
    pub async fn valid_access_token(&self) -> Option<SecureString> {
        let guard = self.tokens.lock().await;
        let cached = guard.as_ref()?;
        let cutoff = Utc::now() + Duration::seconds(EXPIRY_LEEWAY_SECONDS);
        if cached.expires_at > cutoff {
            Some(cached.access_token.clone())
        } else {
            None
        }
    }

    /// The cached refresh token, if any.
    pub async fn refresh_token(&self) -> Option<SecureString> {
        self.tokens
            .lock()
            .await
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
    }

    /// The account the cached tokens belong to.
    pub async fn account(&self) -> Option<Account> {
        self.account.lock().await.clone()
    }

    /// Record the account the cached tokens belong to.
    pub async fn set_account(&self, account: Account) {
        *self.account.lock().await = Some(account);
    }

    /// Drop all cached state.
    pub async fn clear(&self) {
        *self.tokens.lock().await = None;
        *self.account.lock().await = None;
    }
}
