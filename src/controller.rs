//! Auth flow controller: session lifecycle and token acquisition.
//!
//! Owns the [`Session`] and mediates every call into the identity provider.
//! Errors are caught at each operation boundary, translated for the
//! presenter, and returned to the caller.

use crate::error::AuthError;
use crate::provider::{AuthEvent, IdentityProvider, TokenRequest};
use crate::session::Session;
use crate::ui::Presenter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Orchestrates sign-in, sign-out and silent-then-interactive token
/// acquisition against an identity provider.
pub struct AuthFlowController<P, U> {
    provider: Arc<P>,
    presenter: Arc<U>,
    scopes: Vec<String>,
    session: Session,
}

impl<P, U> AuthFlowController<P, U>
where
    P: IdentityProvider,
    U: Presenter,
{
    pub fn new(provider: Arc<P>, presenter: Arc<U>, scopes: Vec<String>) -> Self {
        Self {
            provider,
            presenter,
            scopes,
            session: Session::new(),
        }
    }

    /// The current session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Initialize the provider and restore an existing account, if any.
    ///
    /// When the provider already knows one or more accounts, the first one
    /// becomes active. Returns the provider's login-success event stream,
    /// which the caller drives for the lifetime of the process.
    pub async fn initialize(&mut self) -> Result<mpsc::Receiver<AuthEvent>, AuthError> {
        if let Err(e) = self.provider.initialize().await {
            let err = AuthError::Initialization(e.to_string());
            self.presenter.render_error(&err.to_string());
            return Err(err);
        }

        let accounts = self.provider.all_accounts().await;
        if let Some(first) = accounts.into_iter().next() {
            info!("Restored existing account: {}", first.display_label());
            self.provider.set_active_account(&first).await;
            self.presenter.render_signed_in(&first);
            self.session.set_active(first);
        } else {
            self.presenter.render_signed_out();
        }

        Ok(self.provider.subscribe())
    }

    /// Interactive sign-in. On failure the session is untouched.
    pub async fn sign_in(&mut self) -> Result<(), AuthError> {
        match self.provider.login_popup(&self.scopes).await {
            Ok(account) => {
                self.provider.set_active_account(&account).await;
                self.presenter.clear_error();
                self.presenter.render_signed_in(&account);
                self.session.set_active(account);
                Ok(())
            }
            Err(e) => {
                let err = AuthError::SignIn(e.to_string());
                self.presenter.render_error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Interactive sign-out. On success the session, the displayed result
    /// and the displayed error are all cleared; on failure nothing changes.
    pub async fn sign_out(&mut self) -> Result<(), AuthError> {
        let Some(account) = self.session.active().cloned() else {
            let err = AuthError::NoActiveSession;
            self.presenter.render_error(&err.to_string());
            return Err(err);
        };

        match self.provider.logout_popup(&account).await {
            Ok(()) => {
                self.session.clear();
                self.presenter.clear_result();
                self.presenter.clear_error();
                self.presenter.render_signed_out();
                Ok(())
            }
            Err(e) => {
                let err = AuthError::SignOut(e.to_string());
                self.presenter.render_error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Acquire an access token for the configured scopes.
    ///
    /// Silent acquisition runs first; the interactive popup is attempted
    /// exactly once, and only when the silent failure says interaction is
    /// required. Requires an active account; when signed out this fails
    /// without touching the provider.
    pub async fn request_token(&self) -> Result<String, AuthError> {
        let account = self
            .session
            .active()
            .cloned()
            .ok_or(AuthError::NoActiveSession)?;

        let request = TokenRequest {
            scopes: self.scopes.clone(),
            account,
        };

        match self.provider.acquire_token_silent(&request).await {
            Ok(token) => Ok(token),
            Err(e) if e.is_interaction_required() => {
                warn!("Silent acquisition requires interaction, falling back to popup");
                self.provider
                    .acquire_token_popup(&request)
                    .await
                    .map_err(|e| AuthError::TokenAcquisition(e.to_string()))
            }
            Err(e) => Err(AuthError::TokenAcquisition(e.to_string())),
        }
    }

    /// Apply a provider event. A login success overwrites the active
    /// account regardless of prior state; if it races an explicit
    /// `sign_in`, whichever callback runs last wins.
    pub async fn handle_event(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::LoginSuccess { account } => {
                info!("Login event: {}", account.display_label());
                self.provider.set_active_account(&account).await;
                self.presenter.render_signed_in(&account);
                self.session.set_active(account);
            }
        }
    }
}
