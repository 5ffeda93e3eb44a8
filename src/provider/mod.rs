//! Identity provider abstraction and the Azure AD implementation.
//!
//! The auth flow controller talks to a provider only through the
//! [`IdentityProvider`] trait; [`azure::AzureProvider`] implements it with
//! OAuth2 + PKCE against Azure AD.

pub mod azure;
pub mod cache;
pub mod callback_server;
pub mod claims;
pub mod oauth;

use crate::error::ProviderError;
use crate::session::Account;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A request for an access token: the requested scopes and the account the
/// token is for. Constructed fresh per acquisition, never mutated.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub scopes: Vec<String>,
    pub account: Account,
}

/// Event pushed by the provider when an interactive login succeeds.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    LoginSuccess { account: Account },
}

/// Capabilities the auth flow controller consumes from an identity provider.
///
/// At most one interactive flow (`login_popup` / `acquire_token_popup`) runs
/// at a time; the provider enforces this, callers assume it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// One-time provider setup. Must be called before any other operation.
    async fn initialize(&self) -> Result<(), ProviderError>;

    /// Accounts known to the provider's own cache, in stable order.
    async fn all_accounts(&self) -> Vec<Account>;

    /// Mark an account as the provider's active one.
    async fn set_active_account(&self, account: &Account);

    /// Acquire a token without user interaction.
    ///
    /// Fails with [`ProviderError::InteractionRequired`] when the cached
    /// session cannot satisfy the request; any other error is generic.
    async fn acquire_token_silent(&self, request: &TokenRequest)
        -> Result<String, ProviderError>;

    /// Acquire a token through an interactive user-facing flow.
    async fn acquire_token_popup(&self, request: &TokenRequest)
        -> Result<String, ProviderError>;

    /// Interactive sign-in. Returns the signed-in account.
    async fn login_popup(&self, scopes: &[String]) -> Result<Account, ProviderError>;

    /// Interactive sign-out for the given account.
    async fn logout_popup(&self, account: &Account) -> Result<(), ProviderError>;

    /// Obtain the login-success event stream. Intended to be called once,
    /// at initialization; subsequent calls return an empty stream.
    fn subscribe(&self) -> mpsc::Receiver<AuthEvent>;
}
