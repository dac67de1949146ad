//! Error taxonomy for everything that talks to the service, and the pure
//! function that turns a failed exchange into the message shown to the
//! operator. Call sites can rely on every failure being one of the five
//! `ConsoleError` kinds.

use serde_json::Value;
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

/// Maximum number of server-provided characters surfaced to the operator.
const MAX_MESSAGE_CHARS: usize = 200;

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please login again.";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";
const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";
const CONNECT_MESSAGE: &str = "Unable to connect to the server. Please check your connection.";
const FORBIDDEN_MESSAGE: &str = "You don't have permission to perform this action.";
const NOT_FOUND_MESSAGE: &str = "The requested resource was not found.";
const SERVER_ERROR_MESSAGE: &str = "A server error occurred. Please try again later.";
const GENERIC_MESSAGE: &str = "An error occurred";

/// Messages keyed by form field, ordered by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    /// Reads an `errors` object whose values are a string or a list of strings.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let mut errors = Self::new();
        let Some(object) = value.as_object() else {
            return errors;
        };

        for (field, messages) in object {
            match messages {
                Value::String(message) if !message.trim().is_empty() => {
                    errors.push(field, message.trim());
                }
                Value::Array(items) => {
                    for message in items.iter().filter_map(Value::as_str) {
                        if !message.trim().is_empty() {
                            errors.push(field, message.trim());
                        }
                    }
                }
                _ => {}
            }
        }

        errors
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (field, messages)) in self.iter().enumerate() {
            if index > 0 {
                writeln!(formatter)?;
            }
            write!(formatter, "{field}: {}", messages.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Error)]
pub enum ConsoleError {
    /// Local form violation; never reached the network.
    #[error("{0}")]
    ValidationFailed(FieldErrors),
    #[error("{message}")]
    InvalidCredentials { message: String },
    #[error("{message}")]
    RegistrationRejected { message: String, fields: FieldErrors },
    /// The service refused the stored token; the store has already been cleared.
    #[error("{message}")]
    SessionExpired { message: String },
    #[error("{message}")]
    Remote { status: Option<u16>, message: String },
}

impl ConsoleError {
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// Field-addressable messages, when the error carries any.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::ValidationFailed(fields) | Self::RegistrationRejected { fields, .. } => {
                Some(fields)
            }
            _ => None,
        }
    }

    pub(crate) fn remote(failure: &RawFailure) -> Self {
        Self::Remote {
            status: failure.status,
            message: normalize(failure),
        }
    }
}

/// What went wrong below the HTTP layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportFailure {
    Timeout,
    Connect(String),
    Other(String),
}

/// A failed exchange as received: status and body when a response arrived,
/// transport failure when it did not.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawFailure {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub transport: Option<TransportFailure>,
}

impl RawFailure {
    #[must_use]
    pub fn response(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: Some(body.into()),
            transport: None,
        }
    }

    #[must_use]
    pub const fn transport(failure: TransportFailure) -> Self {
        Self {
            status: None,
            body: None,
            transport: Some(failure),
        }
    }

    fn json_body(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_str::<Value>(body).ok())
    }

    /// Field errors carried by the body, if any.
    #[must_use]
    pub fn field_errors(&self) -> FieldErrors {
        self.json_body()
            .and_then(|body| body.get("errors").map(FieldErrors::from_json))
            .unwrap_or_default()
    }

    /// The most specific message the server itself provided.
    #[must_use]
    pub fn server_message(&self) -> Option<String> {
        let body = self.body.as_deref()?;
        match serde_json::from_str::<Value>(body) {
            Ok(value) => ["message", "error"]
                .iter()
                .filter_map(|key| value.get(key).and_then(Value::as_str))
                .find_map(sanitize),
            Err(_) => sanitize(body),
        }
    }
}

/// Builds the operator-facing message for a failed exchange.
///
/// Precedence: field errors, server message, transport message, then a
/// fallback chosen by status. Total and deterministic for any input.
#[must_use]
pub fn normalize(failure: &RawFailure) -> String {
    let fields = failure.field_errors();
    if !fields.is_empty() {
        return fields.to_string();
    }

    if let Some(message) = failure.server_message() {
        return message;
    }

    if let Some(transport) = &failure.transport {
        return match transport {
            TransportFailure::Timeout => TIMEOUT_MESSAGE.to_string(),
            TransportFailure::Connect(_) => CONNECT_MESSAGE.to_string(),
            TransportFailure::Other(message) => {
                sanitize(message).unwrap_or_else(|| GENERIC_MESSAGE.to_string())
            }
        };
    }

    let fallback = match failure.status {
        Some(401) => SESSION_EXPIRED_MESSAGE,
        Some(403) => FORBIDDEN_MESSAGE,
        Some(404) => NOT_FOUND_MESSAGE,
        Some(status) if status >= 500 => SERVER_ERROR_MESSAGE,
        _ => GENERIC_MESSAGE,
    };
    fallback.to_string()
}

/// Trims and truncates; `None` when nothing printable is left.
fn sanitize(message: &str) -> Option<String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(MAX_MESSAGE_CHARS).collect())
    }
}
