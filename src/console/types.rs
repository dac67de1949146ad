//! Identity types shared by the store, gateway, context and guard. Secrets
//! (passwords, session tokens) are wrapped in `SecretString` so they are
//! redacted from `Debug` output and never reach the logs by accident.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Console roles as issued by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Manager,
    Staff,
}

impl Role {
    pub const ALL: [Self; 3] = [Self::Admin, Self::Manager, Self::Staff];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Manager => "MANAGER",
            Self::Staff => "STAFF",
        }
    }

    /// Roles a registration form may request. `ADMIN` is only granted by the service.
    #[must_use]
    pub const fn is_self_assignable(self) -> bool {
        matches!(self, Self::Manager | Self::Staff)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ADMIN" => Ok(Self::Admin),
            "MANAGER" => Ok(Self::Manager),
            "STAFF" => Ok(Self::Staff),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Username/password pair. Lives only for the duration of a login call.
#[derive(Clone, Debug)]
pub struct Credential {
    pub username: String,
    pub password: SecretString,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// The non-secret part of a session, what the UI is allowed to show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub username: String,
    pub role: Role,
}

/// A complete session. There is no way to build one with an empty field.
#[derive(Clone, Debug)]
pub struct Session {
    token: SecretString,
    username: String,
    role: Role,
}

impl Session {
    /// Returns `None` when the token or username is blank.
    #[must_use]
    pub fn new(token: impl Into<String>, username: impl Into<String>, role: Role) -> Option<Self> {
        let token = token.into();
        let username = username.into();
        if token.trim().is_empty() || username.trim().is_empty() {
            return None;
        }

        Some(Self {
            token: SecretString::from(token),
            username,
            role,
        })
    }

    #[must_use]
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn user(&self) -> UserInfo {
        UserInfo {
            username: self.username.clone(),
            role: self.role,
        }
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.role == other.role
            && self.token.expose_secret() == other.token.expose_secret()
    }
}

impl Eq for Session {}

/// Raw registration input, exactly as typed into the form.
#[derive(Clone, Debug)]
pub struct RegistrationForm {
    pub username: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub full_name: String,
    pub role: String,
}

/// Registration payload that passed local validation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub username: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
    #[serde(serialize_with = "expose")]
    pub confirm_password: SecretString,
    pub full_name: String,
    pub role: Role,
}

/// Confirmation returned by a successful registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub message: String,
    pub role: Option<Role>,
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct RegisterResponse {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
