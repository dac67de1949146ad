use crate::console::{AppConfig, Console, ConsoleError, Screen, routes::{self, LOGIN}};
use anyhow::{Result, bail};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub config: AppConfig,
    pub location: String,
}

/// One-line description of a settled screen.
pub(crate) fn describe(console: &Console, screen: &Screen) -> String {
    match screen {
        Screen::Waiting => "Loading session".to_string(),
        Screen::Login { from: Some(from) } => format!("Sign in to open {from}"),
        Screen::Login { from: None } => "Sign in required".to_string(),
        Screen::Register => "Create an account with `ges-console register`".to_string(),
        Screen::Page(rule) => format!("{} ({})", rule.label, console.location()),
    }
}

/// Tells the operator where an expired session sent the console.
pub(crate) fn report_expiry(console: &Console, err: &ConsoleError) {
    if err.is_session_expired() && console.location() == LOGIN {
        eprintln!("Redirected to {}", console.location());
    }
}

/// Open a screen through the route guard and print its listing.
/// # Errors
/// Returns an error if the screen needs a session, or loading its listing fails.
pub async fn execute(args: Args) -> Result<()> {
    let mut console = Console::bootstrap(&args.config)?;
    let screen = console.navigate(&args.location);
    debug!(location = console.location(), "navigation settled");

    let rule = match &screen {
        Screen::Page(rule) => *rule,
        Screen::Login { .. } | Screen::Waiting => bail!(describe(&console, &screen)),
        Screen::Register => {
            println!("{}", describe(&console, &screen));
            return Ok(());
        }
    };

    if routes::path_of(&args.location) != rule.path {
        println!(
            "{} is not available, showing {}",
            args.location.trim(),
            rule.label
        );
    }

    let listing = console
        .load()
        .await
        .inspect_err(|err| report_expiry(&console, err))?;

    match listing {
        Some(listing) => println!("{}", serde_json::to_string_pretty(&listing)?),
        None => println!("{}", describe(&console, &screen)),
    }

    Ok(())
}
