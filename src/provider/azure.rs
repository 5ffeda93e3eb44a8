//! Azure AD identity provider.
//!
//! Implements [`IdentityProvider`] with OAuth2 + PKCE. Interactive flows run
//! through the system browser and the localhost callback server; silent
//! acquisition uses the refresh-token grant against the in-memory cache.

use crate::config::Config;
use crate::error::ProviderError;
use crate::provider::cache::TokenCache;
use crate::provider::callback_server::{self, CallbackResult};
use crate::provider::claims;
use crate::provider::oauth::{parse_callback_url, OAuth2Client, PkceChallenge, TokenResponse};
use crate::provider::{AuthEvent, IdentityProvider, TokenRequest};
use crate::session::Account;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex as StdMutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Capacity of the login-success event channel.
const EVENT_CHANNEL_CAPACITY: usize = 10;

/// Identity provider backed by the Azure AD v2.0 endpoints.
pub struct AzureProvider {
    oauth: OAuth2Client,
    logout_endpoint: String,
    cache: TokenCache,
    event_tx: mpsc::Sender<AuthEvent>,
    event_rx: StdMutex<Option<mpsc::Receiver<AuthEvent>>>,
}

impl AzureProvider {
    /// Create a provider from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_endpoints(
            config.oauth.client_id.clone(),
            config.authorize_url(),
            config.token_url(),
            config.logout_url(),
        )
    }

    /// Create a provider with explicit endpoints (sovereign clouds, tests).
    pub fn with_endpoints(
        client_id: String,
        authorize_endpoint: String,
        token_endpoint: String,
        logout_endpoint: String,
    ) -> Result<Self> {
        let oauth = OAuth2Client::new(
            client_id,
            callback_server::redirect_uri(),
            authorize_endpoint,
            token_endpoint,
        )?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            oauth,
            logout_endpoint,
            cache: TokenCache::new(),
            event_tx,
            event_rx: StdMutex::new(Some(event_rx)),
        })
    }

    /// Run the interactive browser flow: authorization request, callback,
    /// code exchange. Caches the resulting tokens and account.
    async fn interactive_flow(
        &self,
        scopes: &[String],
    ) -> Result<(TokenResponse, Account), ProviderError> {
        let pkce = PkceChallenge::new();
        let (auth_url, expected_state) = self.oauth.generate_auth_url(scopes, &pkce)?;

        // Callback server on its own thread; the cancel channel lets us tear
        // it down if the browser fails to open.
        let (cancel_tx, cancel_rx) = std::sync::mpsc::channel();
        let (result_tx, mut result_rx) = mpsc::channel::<CallbackResult>(1);
        std::thread::spawn(move || {
            let result = callback_server::start_callback_server(cancel_rx);
            let _ = result_tx.blocking_send(result);
        });

        info!("Opening browser for interactive sign-in");
        if let Err(e) = open::that(auth_url.as_str()) {
            let _ = cancel_tx.send(());
            return Err(ProviderError::OAuth(format!("Failed to open browser: {e}")));
        }

        let callback = result_rx
            .recv()
            .await
            .ok_or_else(|| ProviderError::CallbackServer("Callback channel closed".into()))?;

        let url_string = match callback {
            CallbackResult::Success(url) => url,
            CallbackResult::Cancelled => return Err(ProviderError::UserCancelled),
            CallbackResult::Error(e) => return Err(ProviderError::CallbackServer(e)),
        };

        let (code, state) = parse_callback_url(&url_string)?;
        if state != expected_state {
            return Err(ProviderError::StateMismatch);
        }

        let token_response = self
            .oauth
            .exchange_code(&code, &pkce.verifier, scopes)
            .await?;

        let account = token_response
            .id_token
            .as_deref()
            .and_then(claims::account_from_id_token)
            .unwrap_or(Account {
                name: None,
                username: None,
                local_account_id: None,
            });

        self.cache.store(&token_response).await;
        self.cache.set_account(account.clone()).await;

        Ok((token_response, account))
    }
}

#[async_trait]
impl IdentityProvider for AzureProvider {
    async fn initialize(&self) -> Result<(), ProviderError> {
        debug!("Azure provider initialized");
        Ok(())
    }

    async fn all_accounts(&self) -> Vec<Account> {
        self.cache.account().await.into_iter().collect()
    }

    async fn set_active_account(&self, account: &Account) {
        self.cache.set_account(account.clone()).await;
    }

    async fn acquire_token_silent(
        &self,
        request: &TokenRequest,
    ) -> Result<String, ProviderError> {
        if let Some(token) = self.cache.valid_access_token().await {
            debug!("Silent acquisition served from cache");
            return Ok(token.as_str().to_string());
        }

        let refresh = self
            .cache
            .refresh_token()
            .await
            .ok_or(ProviderError::InteractionRequired)?;

        let response = self
            .oauth
            .refresh_token(refresh.as_str(), &request.scopes)
            .await?;

        let access_token = response.access_token.clone();
        self.cache.store(&response).await;

        info!("Silent acquisition refreshed the access token");
        Ok(access_token)
    }

    async fn acquire_token_popup(
        &self,
        request: &TokenRequest,
    ) -> Result<String, ProviderError> {
        let (response, _account) = self.interactive_flow(&request.scopes).await?;
        Ok(response.access_token)
    }

    async fn login_popup(&self, scopes: &[String]) -> Result<Account, ProviderError> {
        let (_response, account) = self.interactive_flow(scopes).await?;

        // Receiver may be gone during shutdown; that is not a sign-in failure
        let _ = self
            .event_tx
            .send(AuthEvent::LoginSuccess {
                account: account.clone(),
            })
            .await;

        info!("Sign-in successful: {}", account.display_label());
        Ok(account)
    }

    async fn logout_popup(&self, account: &Account) -> Result<(), ProviderError> {
        let logout_url = format!(
            "{}?post_logout_redirect_uri={}",
            self.logout_endpoint,
            urlencoding::encode(&callback_server::redirect_uri())
        );

        open::that(&logout_url)
            .map_err(|e| ProviderError::OAuth(format!("Failed to open browser: {e}")))?;

        self.cache.clear().await;
        info!("Signed out: {}", account.display_label());
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<AuthEvent> {
        let taken = self.event_rx.lock().ok().and_then(|mut guard| guard.take());
        taken.unwrap_or_else(|| {
            // Already subscribed; hand out a closed, empty stream
            let (_tx, rx) = mpsc::channel(1);
            rx
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(token_endpoint: &str) -> AzureProvider {
        AzureProvider::with_endpoints(
            "client-1".into(),
            "http://unused.invalid/authorize".into(),
            token_endpoint.into(),
            "http://unused.invalid/logout".into(),
        )
        .unwrap()
    }

    fn cached_response(expires_in: u64, refresh: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "cached-access".into(),
            token_type: "Bearer".into(),
            expires_in,
            refresh_token: refresh.map(str::to_string),
            id_token: None,
            scope: String::new(),
        }
    }

    fn request() -> TokenRequest {
        TokenRequest {
            scopes: vec!["api://app/access".into()],
            account: Account {
                name: Some("Alice".into()),
                username: None,
                local_account_id: None,
            },
        }
    }

    #[tokio::test]
    async fn test_silent_with_empty_cache_requires_interaction() {
        let provider = provider("http://unused.invalid/token");

        let result = provider.acquire_token_silent(&request()).await;
        assert!(matches!(result, Err(ProviderError::InteractionRequired)));
    }

    #[tokio::test]
    async fn test_silent_serves_valid_cached_token_without_network() {
        // Endpoint is unreachable, so any network attempt would fail loudly
        let provider = provider("http://unused.invalid/token");
        provider.cache.store(&cached_response(3600, None)).await;

        let token = provider.acquire_token_silent(&request()).await.unwrap();
        assert_eq!(token, "cached-access");
    }

    #[tokio::test]
    async fn test_silent_refreshes_expired_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-access",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&format!("{}/token", server.uri()));
        // Expired access token but a usable refresh token
        provider
            .cache
            .store(&cached_response(0, Some("refresh-1")))
            .await;

        let token = provider.acquire_token_silent(&request()).await.unwrap();
        assert_eq!(token, "fresh-access");

        // The rotated refresh token replaced the old one
        let rotated = provider.cache.refresh_token().await.unwrap();
        assert_eq!(rotated.as_str(), "refresh-2");
    }

    #[tokio::test]
    async fn test_silent_refresh_failure_is_not_interaction_required() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&format!("{}/token", server.uri()));
        provider
            .cache
            .store(&cached_response(0, Some("revoked")))
            .await;

        let result = provider.acquire_token_silent(&request()).await;
        match result {
            Err(e) => assert!(!e.is_interaction_required(), "got {e:?}"),
            Ok(_) => panic!("refresh should have failed"),
        }
    }

    #[tokio::test]
    async fn test_all_accounts_reflects_cache() {
        let provider = provider("http://unused.invalid/token");
        assert!(provider.all_accounts().await.is_empty());

        let account = Account {
            name: Some("Alice".into()),
            username: Some("alice@example.com".into()),
            local_account_id: Some("id-1".into()),
        };
        provider.set_active_account(&account).await;

        let accounts = provider.all_accounts().await;
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0], account);
    }

    #[tokio::test]
    async fn test_subscribe_is_single_use() {
        let provider = provider("http://unused.invalid/token");

        let _first = provider.subscribe();
        let mut second = provider.subscribe();

        // Second subscription is a closed stream
        assert!(second.recv().await.is_none());
    }
}
