//! Error types for the tokenprobe application.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced at the auth flow boundary.
///
/// Each variant corresponds to one controller operation; the variant carries
/// the underlying cause as a display string so the UI never sees raw
/// provider internals.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Sign in failed: {0}")]
    SignIn(String),

    #[error("Sign out failed: {0}")]
    SignOut(String),

    #[error("No account signed in")]
    NoActiveSession,

    #[error("Token acquisition failed: {0}")]
    TokenAcquisition(String),
}

/// Failures reported by an identity provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Silent acquisition cannot proceed; an interactive flow is needed.
    /// This is the only failure that triggers the interactive fallback.
    #[error("Interaction required")]
    InteractionRequired,

    #[error("OAuth2 authorization failed: {0}")]
    OAuth(String),

    #[error("Invalid authorization code")]
    InvalidAuthCode,

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("State validation failed (possible CSRF attack)")]
    StateMismatch,

    #[error("Callback server error: {0}")]
    CallbackServer(String),

    #[error("User cancelled authentication")]
    UserCancelled,
}

impl ProviderError {
    /// Returns true if interactive acquisition should be attempted.
    pub fn is_interaction_required(&self) -> bool {
        matches!(self, Self::InteractionRequired)
    }
}

/// Backend probe errors.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("API request failed: {0}")]
    Request(String),

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Access token is empty")]
    EmptyToken,
}

impl AppError {
    /// Returns a user-friendly message for display in the UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(e) => e.to_string(),
            Self::Provider(ProviderError::UserCancelled) => {
                "Sign-in was cancelled.".to_string()
            }
            Self::Provider(ProviderError::StateMismatch) => {
                "Security error. Please try signing in again.".to_string()
            }
            Self::Provider(e) => e.to_string(),
            Self::Probe(e) => format!("API call failed: {e}"),
            Self::Config(_) => "Configuration error. Please check settings.".to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
            Self::Io(_) => "An IO error occurred. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let err = AppError::Provider(ProviderError::UserCancelled);
        assert_eq!(err.user_message(), "Sign-in was cancelled.");

        let err = AppError::Auth(AuthError::NoActiveSession);
        assert_eq!(err.user_message(), "No account signed in");

        let err = AppError::Probe(ProbeError::Parse("bad json".into()));
        assert!(err.user_message().contains("API call failed"));
    }

    #[test]
    fn test_interaction_required_distinguished() {
        assert!(ProviderError::InteractionRequired.is_interaction_required());
        assert!(!ProviderError::TokenRefresh("expired".into()).is_interaction_required());
        assert!(!ProviderError::UserCancelled.is_interaction_required());
    }
}
