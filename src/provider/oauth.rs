//! OAuth2 client with PKCE support for Azure AD authentication.

use crate::error::ProviderError;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// PKCE code verifier and challenge pair.
#[derive(Debug)]
pub struct PkceChallenge {
    /// The code verifier (kept locally, sent in the token exchange).
    pub verifier: String,
    /// The code challenge (SHA256 hash of the verifier, sent in the auth request).
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE challenge pair.
    pub fn new() -> Self {
        // 32 random bytes for the verifier
        let mut rng = rand::thread_rng();
        let verifier_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        let verifier = URL_SAFE_NO_PAD.encode(&verifier_bytes);

        // challenge = BASE64URL(SHA256(verifier))
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let hash = hasher.finalize();
        let challenge = URL_SAFE_NO_PAD.encode(hash);

        Self { verifier, challenge }
    }
}

impl Default for PkceChallenge {
    fn default() -> Self {
        Self::new()
    }
}

/// OAuth2 client for the Azure AD v2.0 endpoints.
pub struct OAuth2Client {
    client_id: String,
    redirect_uri: String,
    authorize_endpoint: String,
    token_endpoint: String,
    http_client: reqwest::Client,
}

impl OAuth2Client {
    /// Create a new OAuth2 client.
    pub fn new(
        client_id: String,
        redirect_uri: String,
        authorize_endpoint: String,
        token_endpoint: String,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client_id,
            redirect_uri,
            authorize_endpoint,
            token_endpoint,
            http_client,
        })
    }

    /// Generate the authorization URL for browser-based sign-in.
    ///
    /// Returns the URL and a CSRF state token that must be verified in the
    /// callback.
    pub fn generate_auth_url(
        &self,
        scopes: &[String],
        pkce: &PkceChallenge,
    ) -> Result<(Url, String), ProviderError> {
        // Random state for CSRF protection
        let mut rng = rand::thread_rng();
        let state_bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
        let state = URL_SAFE_NO_PAD.encode(&state_bytes);

        let mut url = Url::parse(&self.authorize_endpoint)
            .map_err(|e| ProviderError::OAuth(format!("Invalid authorize endpoint: {e}")))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_mode", "query")
            .append_pair("scope", &scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256");

        Ok((url, state))
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
        scopes: &[String],
    ) -> Result<TokenResponse, ProviderError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", pkce_verifier),
            ("scope", &scopes.join(" ")),
        ];

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::TokenExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            // Log error details for debugging (not exposed to the user)
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!("Token exchange failed: HTTP {} - {}", status, error_body);
            return Err(ProviderError::TokenExchange(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::TokenExchange(e.to_string()))?;

        Ok(token_response)
    }

    /// Refresh an access token using a refresh token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<TokenResponse, ProviderError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", &scopes.join(" ")),
        ];

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::TokenRefresh(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!("Token refresh failed: HTTP {} - {}", status, error_body);
            return Err(ProviderError::TokenRefresh(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::TokenRefresh(e.to_string()))?;

        Ok(token_response)
    }
}

/// Token response from the Azure AD token endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

/// Parse an OAuth callback URL to extract code and state.
pub fn parse_callback_url(url_string: &str) -> Result<(String, String), ProviderError> {
    let url = Url::parse(url_string).map_err(|_| ProviderError::InvalidAuthCode)?;

    let params: HashMap<_, _> = url.query_pairs().collect();

    // Error responses carry error/error_description instead of a code
    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .map(|s| s.to_string())
            .unwrap_or_else(|| error.to_string());
        if error.as_ref() == "access_denied" {
            return Err(ProviderError::UserCancelled);
        }
        return Err(ProviderError::OAuth(description));
    }

    let code = params
        .get("code")
        .ok_or(ProviderError::InvalidAuthCode)?
        .to_string();

    let state = params
        .get("state")
        .ok_or(ProviderError::StateMismatch)?
        .to_string();

    Ok((code, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_generation() {
        let pkce = PkceChallenge::new();

        assert!(!pkce.verifier.is_empty());
        assert!(!pkce.challenge.is_empty());

        // Challenge is a hash of the verifier, never equal to it
        assert_ne!(pkce.verifier, pkce.challenge);
    }

    #[test]
    fn test_parse_callback_success() {
        let url = "http://localhost:29127/callback?code=abc123&state=xyz789";
        let (code, state) = parse_callback_url(url).unwrap();
        assert_eq!(code, "abc123");
        assert_eq!(state, "xyz789");
    }

    #[test]
    fn test_parse_callback_user_cancelled() {
        let url = "http://localhost:29127/callback?error=access_denied&error_description=User%20cancelled";
        let result = parse_callback_url(url);
        assert!(matches!(result, Err(ProviderError::UserCancelled)));
    }

    #[test]
    fn test_parse_callback_generic_error() {
        let url = "http://localhost:29127/callback?error=server_error&error_description=boom";
        let result = parse_callback_url(url);
        assert!(matches!(result, Err(ProviderError::OAuth(desc)) if desc == "boom"));
    }

    #[test]
    fn test_parse_callback_missing_code() {
        let url = "http://localhost:29127/callback?state=xyz789";
        let result = parse_callback_url(url);
        assert!(matches!(result, Err(ProviderError::InvalidAuthCode)));
    }

    #[test]
    fn test_generate_auth_url() {
        let client = OAuth2Client::new(
            "client-1".into(),
            "http://localhost:29127/callback".into(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/authorize".into(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/token".into(),
        )
        .unwrap();

        let pkce = PkceChallenge::new();
        let scopes = vec!["api://app/access".to_string(), "openid".to_string()];
        let (url, state) = client.generate_auth_url(&scopes, &pkce).unwrap();

        let query: HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(query.get("client_id").unwrap(), "client-1");
        assert_eq!(query.get("response_type").unwrap(), "code");
        assert_eq!(query.get("scope").unwrap(), "api://app/access openid");
        assert_eq!(query.get("state").unwrap(), state.as_str());
        assert_eq!(query.get("code_challenge_method").unwrap(), "S256");
    }
}
