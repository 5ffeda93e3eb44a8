//! Session state: the single currently signed-in account.

use serde::{Deserialize, Serialize};

/// A signed-in identity as reported by the identity provider.
///
/// Immutable once obtained; replaced wholesale on each successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Display name, when the provider supplies one.
    pub name: Option<String>,

    /// Username, typically an email-like principal name.
    pub username: Option<String>,

    /// Stable local account identifier.
    pub local_account_id: Option<String>,
}

impl Account {
    /// Get the best available label for logging and display.
    pub fn display_label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("Unknown account")
    }
}

/// The process-wide record of zero or one active [`Account`].
///
/// Owned by the auth flow controller; nothing else mutates it.
#[derive(Debug, Default)]
pub struct Session {
    active: Option<Account>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently active account, if any.
    pub fn active(&self) -> Option<&Account> {
        self.active.as_ref()
    }

    /// Replace the active account. The previous account, if any, is dropped.
    pub fn set_active(&mut self, account: Account) {
        self.active = Some(account);
    }

    /// Clear the session.
    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn is_signed_in(&self) -> bool {
        self.active.is_some()
    }
}
