//! ID token claim extraction.
//!
//! Decodes the payload segment of an ID token to build an [`Account`]. The
//! signature is deliberately not verified: the token arrives over TLS from
//! the token endpoint we just posted to, and the claims are used for display
//! only.

use crate::session::Account;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use tracing::debug;

/// The subset of ID token claims we care about.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    name: Option<String>,
    preferred_username: Option<String>,
    oid: Option<String>,
}

/// Build an account from an ID token, if the token is decodable.
///
/// Returns `None` on any structural problem; a sign-in without usable claims
/// still succeeds, just with an anonymous account.
pub fn account_from_id_token(id_token: &str) -> Option<Account> {
    let payload = id_token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload).ok().or_else(|| {
        // Some issuers pad the segment
        base64::engine::general_purpose::URL_SAFE.decode(payload).ok()
    })?;

    let claims: IdTokenClaims = match serde_json::from_slice(&decoded) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse ID token claims: {}", e);
            return None;
        }
    };

    Some(Account {
        name: claims.name,
        username: claims.preferred_username,
        local_account_id: claims.oid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_id_token(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
        format!("{header}.{body}.fake-signature")
    }

    #[test]
    fn test_full_claims() {
        let token = make_id_token(json!({
            "name": "Alice Example",
            "preferred_username": "alice@example.com",
            "oid": "0000-1111",
            "aud": "client-1"
        }));

        let account = account_from_id_token(&token).unwrap();
        assert_eq!(account.name.as_deref(), Some("Alice Example"));
        assert_eq!(account.username.as_deref(), Some("alice@example.com"));
        assert_eq!(account.local_account_id.as_deref(), Some("0000-1111"));
    }

    #[test]
    fn test_missing_claims_are_none() {
        let token = make_id_token(json!({ "aud": "client-1" }));

        let account = account_from_id_token(&token).unwrap();
        assert!(account.name.is_none());
        assert!(account.username.is_none());
        assert!(account.local_account_id.is_none());
    }

    #[test]
    fn test_garbage_token() {
        assert!(account_from_id_token("not-a-jwt").is_none());
        assert!(account_from_id_token("a.!!!.c").is_none());
        assert!(account_from_id_token("").is_none());
    }
}
