use crate::cli::actions::{Action, navigate, request, session};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Login(args) => session::login(args).await,
        Action::Logout(args) => session::logout(&args),
        Action::Status(args) => session::status(&args),
        Action::Register(args) => session::register(args).await,
        Action::Open(args) => navigate::execute(args).await,
        Action::Request(args) => request::execute(args).await,
    }
}
