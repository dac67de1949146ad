use crate::{
    cli::actions::navigate::report_expiry,
    console::{AppConfig, Console},
};
use anyhow::Result;
use reqwest::Method;
use serde_json::Value;

#[derive(Debug)]
pub struct Args {
    pub config: AppConfig,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Send one call with the stored session and print the decoded reply.
/// # Errors
/// Returns an error if the call fails; a `401` also clears the stored session.
pub async fn execute(args: Args) -> Result<()> {
    let mut console = Console::bootstrap(&args.config)?;
    let reply = console
        .fetch(args.method, &args.path, args.body.as_ref())
        .await
        .inspect_err(|err| report_expiry(&console, err))?;

    if !reply.is_null() {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    }

    Ok(())
}
