//! Presentation layer: rendering contract and the terminal implementation.

use crate::session::Account;
use serde_json::Value;

/// Rendering capabilities the auth flow exposes its state through.
///
/// Implementations must tolerate being called in any order; `clear_*` calls
/// may arrive with nothing displayed.
pub trait Presenter: Send + Sync {
    fn render_signed_in(&self, account: &Account);
    fn render_signed_out(&self);
    fn render_api_result(&self, body: &Value, success: bool);
    fn render_error(&self, message: &str);
    fn clear_error(&self);
    fn clear_result(&self);
}

/// Renders to the terminal.
#[derive(Default)]
pub struct ConsolePresenter;

impl ConsolePresenter {
    pub fn new() -> Self {
        Self
    }
}

impl Presenter for ConsolePresenter {
    fn render_signed_in(&self, account: &Account) {
        println!("Signed in");
        println!("  Name:       {}", account.name.as_deref().unwrap_or("N/A"));
        println!(
            "  Email:      {}",
            account.username.as_deref().unwrap_or("N/A")
        );
        println!(
            "  Account ID: {}",
            account.local_account_id.as_deref().unwrap_or("N/A")
        );
    }

    fn render_signed_out(&self) {
        println!("Signed out");
    }

    fn render_api_result(&self, body: &Value, success: bool) {
        let status = if success { "Success" } else { "Error" };
        let pretty = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
        println!("API response [{status}]:");
        println!("{pretty}");
    }

    fn render_error(&self, message: &str) {
        eprintln!("Error: {message}");
    }

    // Terminal output cannot be retracted; clears are no-ops here.
    fn clear_error(&self) {}

    fn clear_result(&self) {}
}
