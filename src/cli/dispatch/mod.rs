//! Maps validated CLI matches to an action carrying the resolved console
//! configuration.

use crate::cli::{
    actions::{Action, navigate, request, session},
    commands::{
        ARG_API_URL, ARG_SESSION_FILE, ARG_TIMEOUT,
        console::{CMD_LOGIN, CMD_LOGOUT, CMD_OPEN, CMD_REGISTER, CMD_REQUEST, CMD_STATUS},
    },
};
use crate::console::{AppConfig, Credential, RegistrationForm, RuntimeConfig};
use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use reqwest::Method;
use secrecy::SecretString;
use serde_json::Value;

/// # Errors
/// Returns an error if required arguments are missing or malformed.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let config = AppConfig::load(runtime_config(matches));

    let (name, sub_m) = matches.subcommand().context("missing subcommand")?;

    let action = match name {
        CMD_LOGIN => Action::Login(session::LoginArgs {
            config,
            credential: Credential::new(
                required(sub_m, "username")?,
                required(sub_m, "password")?,
            ),
            return_to: sub_m.get_one::<String>("return-to").cloned(),
        }),
        CMD_LOGOUT => Action::Logout(session::Args { config }),
        CMD_STATUS => Action::Status(session::Args { config }),
        CMD_REGISTER => Action::Register(session::RegisterArgs {
            config,
            form: RegistrationForm {
                username: required(sub_m, "username")?,
                password: SecretString::from(required(sub_m, "password")?),
                confirm_password: SecretString::from(required(sub_m, "confirm-password")?),
                full_name: required(sub_m, "full-name")?,
                role: required(sub_m, "role")?,
            },
        }),
        CMD_OPEN => Action::Open(navigate::Args {
            config,
            location: required(sub_m, "location")?,
        }),
        CMD_REQUEST => {
            let method = required(sub_m, "method")?.to_uppercase();
            let body = sub_m
                .get_one::<String>("data")
                .map(|data| serde_json::from_str::<Value>(data))
                .transpose()
                .context("--data is not valid JSON")?;

            Action::Request(request::Args {
                config,
                method: Method::from_bytes(method.as_bytes())
                    .with_context(|| format!("invalid method: {method}"))?,
                path: required(sub_m, "path")?,
                body,
            })
        }
        other => return Err(anyhow!("unknown subcommand: {other}")),
    };

    Ok(action)
}

fn runtime_config(matches: &ArgMatches) -> RuntimeConfig {
    RuntimeConfig::new(
        matches.get_one::<String>(ARG_API_URL).map(String::as_str),
        matches.get_one::<String>(ARG_SESSION_FILE).map(String::as_str),
        matches.get_one::<u64>(ARG_TIMEOUT).copied(),
    )
}

fn required(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}
