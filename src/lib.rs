//! # GES console (session and access-control core)
//!
//! `ges-console` is the client side of the GES inventory service: it signs an
//! operator in, keeps the resulting session across process restarts, attaches
//! it to every call made against the service, and decides which console
//! screens the signed-in role may open.
//!
//! ## Session lifecycle
//!
//! 1. **Hydrate:** at start the [`console::SessionContext`] reads the durable
//!    [`console::SessionStore`] once and settles to `Authenticated` or
//!    `Unauthenticated`. Until then every guard decision is "waiting".
//! 2. **Login:** the [`console::CredentialGateway`] exchanges a credential for a
//!    `{token, role, username}` triple; the context writes it to the store.
//! 3. **Calls:** every other request goes through the
//!    [`console::Dispatcher`], which adds `Authorization: Bearer <token>`.
//! 4. **Expiry:** a `401` from the service clears the store and surfaces as
//!    [`console::ConsoleError::SessionExpired`]; the top-level
//!    [`console::Console`] reacts by sending the operator back to `/login`.
//!
//! ## Access control
//!
//! Screens are gated by one table of [`console::RouteAccessRule`]s and one guard
//! function. The service remains the final arbiter: a screen the guard admits
//! can still be refused by the API.

pub mod cli;
pub mod console;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
