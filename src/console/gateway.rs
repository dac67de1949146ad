//! Login and registration exchanges. The gateway never touches the session
//! store: it turns service replies into a `Session` or a typed error and
//! leaves persistence to the session context.

use crate::console::{
    dispatcher::{Dispatcher, Expiry},
    errors::{ConsoleError, FieldErrors, INVALID_CREDENTIALS_MESSAGE, RawFailure},
    types::{
        Credential, LoginRequest, LoginResponse, RegisterResponse, RegistrationForm,
        RegistrationReceipt, Role, Session,
    },
    validation::validate_registration,
};
use secrecy::ExposeSecret;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";

const REGISTRATION_SUCCESS_MESSAGE: &str = "Registration successful! Please log in.";
const REGISTRATION_FAILED_MESSAGE: &str = "Registration failed";

#[derive(Clone, Debug)]
pub struct CredentialGateway {
    dispatcher: Dispatcher,
}

impl CredentialGateway {
    #[must_use]
    pub const fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Session rejections seen by the dispatcher this gateway talks through.
    #[must_use]
    pub fn expirations(&self) -> watch::Receiver<Expiry> {
        self.dispatcher.subscribe_expirations()
    }

    /// Exchanges a credential for a session.
    ///
    /// # Errors
    /// `InvalidCredentials` when the service rejects the credential (4xx),
    /// `Remote` for server/transport failures or an unusable reply.
    #[instrument(skip_all, fields(username = %credential.username))]
    pub async fn login(&self, credential: &Credential) -> Result<Session, ConsoleError> {
        let request = LoginRequest {
            username: &credential.username,
            password: credential.password.expose_secret(),
        };

        let reply = self
            .dispatcher
            .post_public(LOGIN_PATH, &request)
            .await
            .map_err(|failure| login_failure(&failure))?;
        let response: LoginResponse = reply.decode()?;

        let username = response
            .username
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| credential.username.clone());

        let session = response
            .role
            .parse::<Role>()
            .ok()
            .and_then(|role| Session::new(response.token, username, role));

        match session {
            Some(session) => {
                debug!(role = %session.role(), "login accepted");
                Ok(session)
            }
            None => {
                warn!("login reply is missing a token, username or known role");
                Err(ConsoleError::Remote {
                    status: None,
                    message: "unexpected login response".to_string(),
                })
            }
        }
    }

    /// Validates the form locally, then registers it with the service.
    ///
    /// # Errors
    /// `ValidationFailed` before any network call when the form is invalid,
    /// `RegistrationRejected` when the service refuses it (4xx), `Remote`
    /// otherwise.
    #[instrument(skip_all, fields(username = %form.username))]
    pub async fn register(&self, form: &RegistrationForm) -> Result<RegistrationReceipt, ConsoleError> {
        let request = validate_registration(form).map_err(ConsoleError::ValidationFailed)?;

        let reply = self
            .dispatcher
            .post_public(REGISTER_PATH, &request)
            .await
            .map_err(|failure| registration_failure(&failure))?;
        let response: RegisterResponse = reply.decode()?;

        Ok(RegistrationReceipt {
            message: response
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| REGISTRATION_SUCCESS_MESSAGE.to_string()),
            role: response.role.and_then(|role| role.parse().ok()),
        })
    }
}

const fn is_rejection(failure: &RawFailure) -> bool {
    matches!(failure.status, Some(status) if status >= 400 && status < 500)
}

fn login_failure(failure: &RawFailure) -> ConsoleError {
    if is_rejection(failure) {
        ConsoleError::InvalidCredentials {
            message: failure
                .server_message()
                .unwrap_or_else(|| INVALID_CREDENTIALS_MESSAGE.to_string()),
        }
    } else {
        ConsoleError::remote(failure)
    }
}

fn registration_failure(failure: &RawFailure) -> ConsoleError {
    if !is_rejection(failure) {
        return ConsoleError::remote(failure);
    }

    let fields: FieldErrors = failure.field_errors();
    let message = if fields.is_empty() {
        failure
            .server_message()
            .unwrap_or_else(|| REGISTRATION_FAILED_MESSAGE.to_string())
    } else {
        fields.to_string()
    };

    ConsoleError::RegistrationRejected { message, fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{config::AppConfig, store::SessionStore};
    use secrecy::SecretString;
    use serde_json::json;
    use std::{net::TcpListener, sync::Arc, time::Duration};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn gateway(server: &MockServer, store: Arc<SessionStore>) -> CredentialGateway {
        let config = AppConfig {
            api_base_url: format!("{}/api", server.uri()),
            session_file: "unused.json".into(),
            timeout: Duration::from_secs(5),
        };
        CredentialGateway::new(Dispatcher::new(&config, store).unwrap())
    }

    fn form(password: &str, confirm: &str) -> RegistrationForm {
        RegistrationForm {
            username: "carol".to_string(),
            password: SecretString::from(password.to_string()),
            confirm_password: SecretString::from(confirm.to_string()),
            full_name: "Carol Smith".to_string(),
            role: "STAFF".to_string(),
        }
    }

    #[tokio::test]
    async fn login_returns_session() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"username": "alice", "password": "correctpw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "t1", "role": "MANAGER", "username": "alice"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(SessionStore::in_memory());
        let session = gateway(&server, store.clone())
            .login(&Credential::new("alice", "correctpw"))
            .await
            .unwrap();

        assert_eq!(session, Session::new("t1", "alice", Role::Manager).unwrap());
        // the gateway leaves persistence to its caller
        assert!(store.read().is_none());
    }

    #[tokio::test]
    async fn login_falls_back_to_submitted_username() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"token": "t9", "role": "STAFF"})),
            )
            .mount(&server)
            .await;

        let session = gateway(&server, Arc::new(SessionStore::in_memory()))
            .login(&Credential::new("dave", "pw"))
            .await
            .unwrap();
        assert_eq!(session.username(), "dave");
        assert_eq!(session.role(), Role::Staff);
    }

    #[tokio::test]
    async fn rejected_login_is_invalid_credentials_and_keeps_store() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = Arc::new(SessionStore::in_memory());
        store.write(&Session::new("old", "alice", Role::Staff).unwrap());

        let err = gateway(&server, store.clone())
            .login(&Credential::new("alice", "wrong"))
            .await
            .unwrap_err();

        assert!(
            matches!(err, ConsoleError::InvalidCredentials { ref message } if message == INVALID_CREDENTIALS_MESSAGE)
        );
        assert!(store.read().is_some());
    }

    #[tokio::test]
    async fn login_with_unknown_role_is_remote_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "t1", "role": "ROOT", "username": "alice"
            })))
            .mount(&server)
            .await;

        let err = gateway(&server, Arc::new(SessionStore::in_memory()))
            .login(&Credential::new("alice", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Remote { .. }));
    }

    #[tokio::test]
    async fn login_server_error_is_remote_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = gateway(&server, Arc::new(SessionStore::in_memory()))
            .login(&Credential::new("alice", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Remote { status: Some(503), .. }));
    }

    #[tokio::test]
    async fn mismatched_confirmation_never_reaches_the_network() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = gateway(&server, Arc::new(SessionStore::in_memory()))
            .register(&form("Secret1", "Secret2"))
            .await
            .unwrap_err();

        let fields = err.field_errors().unwrap();
        assert!(matches!(err, ConsoleError::ValidationFailed(_)));
        assert!(fields.get("confirmPassword").is_some());
    }

    #[tokio::test]
    async fn register_returns_receipt() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .and(body_json(json!({
                "username": "carol",
                "password": "Secret1",
                "confirmPassword": "Secret1",
                "fullName": "Carol Smith",
                "role": "STAFF"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "t2", "role": "STAFF", "message": "User registered successfully"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(SessionStore::in_memory());
        let receipt = gateway(&server, store.clone())
            .register(&form("Secret1", "Secret1"))
            .await
            .unwrap();

        assert_eq!(receipt.message, "User registered successfully");
        assert_eq!(receipt.role, Some(Role::Staff));
        assert!(store.read().is_none());
    }

    #[tokio::test]
    async fn remote_rejection_carries_field_errors() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errors": {"username": "Username already exists"}
            })))
            .mount(&server)
            .await;

        let err = gateway(&server, Arc::new(SessionStore::in_memory()))
            .register(&form("Secret1", "Secret1"))
            .await
            .unwrap_err();

        match err {
            ConsoleError::RegistrationRejected { message, fields } => {
                assert_eq!(message, "username: Username already exists");
                assert_eq!(
                    fields.get("username"),
                    Some(&["Username already exists".to_string()][..])
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
