//! tokenprobe - a terminal diagnostic tool for bearer-token validation.
//!
//! Signs a user in against Azure AD, acquires an access token (silently when
//! the cached session allows, interactively otherwise), and submits it to a
//! backend debug endpoint to inspect how the backend validates it.

#![deny(clippy::all)]

pub mod config;
pub mod controller;
pub mod error;
pub mod probe;
pub mod provider;
pub mod session;
pub mod ui;
