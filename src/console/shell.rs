//! Top-level navigator. Owns the current location, resolves every move
//! through the route guard and is the single place that reacts to an expired
//! session by sending the operator back to the login screen. Expiries are
//! picked up from the session context, so a `401` on any clone of the
//! dispatcher moves the console too.

use crate::console::{
    config::AppConfig,
    context::{SessionContext, SessionState},
    dispatcher::Dispatcher,
    errors::ConsoleError,
    gateway::CredentialGateway,
    guard::{self, PublicPage, Resolution},
    routes::{self, LANDING, LOGIN, REGISTER, RouteAccessRule},
    store::{FileStorage, SessionStore},
    types::{Credential, RegistrationForm, RegistrationReceipt, UserInfo},
};
use anyhow::Result;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

// redirects only ever target /login or the landing route
const MAX_REDIRECTS: usize = 4;

/// What the console shows after a navigation settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    Waiting,
    /// `from` is where the operator returns after signing in.
    Login { from: Option<String> },
    Register,
    Page(&'static RouteAccessRule),
}

pub struct Console {
    context: SessionContext,
    gateway: CredentialGateway,
    dispatcher: Dispatcher,
    changes: watch::Receiver<SessionState>,
    location: String,
    pending_return: Option<String>,
    notice: Option<String>,
}

impl Console {
    /// Wires the console against the session file named in `config` and
    /// hydrates the session.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built from `config`.
    pub fn bootstrap(config: &AppConfig) -> Result<Self> {
        let store = SessionStore::new(FileStorage::new(&config.session_file));
        Self::with_store(config, Arc::new(store))
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built from `config`.
    pub fn with_store(config: &AppConfig, store: Arc<SessionStore>) -> Result<Self> {
        let dispatcher = Dispatcher::new(config, store.clone())?;
        let gateway = CredentialGateway::new(dispatcher.clone());
        let context = SessionContext::start(store, gateway.clone());

        Ok(Self::new(context, gateway, dispatcher))
    }

    #[must_use]
    pub fn new(context: SessionContext, gateway: CredentialGateway, dispatcher: Dispatcher) -> Self {
        let changes = context.subscribe();
        Self {
            context,
            gateway,
            dispatcher,
            changes,
            location: "/".to_string(),
            pending_return: None,
            notice: None,
        }
    }

    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn user(&self) -> Option<UserInfo> {
        self.context.user()
    }

    /// Message to show on the next screen (expiry, registration success).
    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Menu entries for the signed-in role; empty when signed out.
    #[must_use]
    pub fn navigation(&self) -> Vec<&'static RouteAccessRule> {
        self.context
            .user()
            .map(|user| routes::navigation_for(user.role).collect())
            .unwrap_or_default()
    }

    /// Moves to `location`, following guard redirects until a screen settles.
    pub fn navigate(&mut self, location: &str) -> Screen {
        self.absorb_expiry();
        self.resolve(location)
    }

    fn resolve(&mut self, location: &str) -> Screen {
        let state = self.context.state();
        let mut target = location.trim().to_string();

        for _ in 0..MAX_REDIRECTS {
            match guard::resolve(&state, &target) {
                Resolution::Waiting => {
                    self.location = target;
                    return Screen::Waiting;
                }
                Resolution::Redirect { to, from } => {
                    debug!(from = %target, to, "redirected");
                    if from.is_some() {
                        self.pending_return = from;
                    }
                    target = to.to_string();
                }
                Resolution::Public(PublicPage::Login) => {
                    self.location = LOGIN.to_string();
                    return Screen::Login {
                        from: self.pending_return.clone(),
                    };
                }
                Resolution::Public(PublicPage::Register) => {
                    self.location = REGISTER.to_string();
                    return Screen::Register;
                }
                Resolution::Render(rule) => {
                    self.location = target;
                    return Screen::Page(rule);
                }
            }
        }

        warn!(location, "navigation did not settle");
        Screen::Waiting
    }

    /// Re-resolves the current location.
    pub fn current(&mut self) -> Screen {
        let location = self.location.clone();
        self.navigate(&location)
    }

    /// Re-resolves the current location when the session state changed since
    /// the last call; `None` when nothing changed.
    pub fn observe(&mut self) -> Option<Screen> {
        if let Some(screen) = self.absorb_expiry() {
            return Some(screen);
        }
        if !self.changes.has_changed().unwrap_or(false) {
            return None;
        }
        self.changes.mark_unchanged();
        Some(self.current())
    }

    /// Signs in and returns to the location that sent the operator to the
    /// login screen, or to the landing route.
    ///
    /// # Errors
    /// Whatever [`SessionContext::login`] returns; the console stays on `/login`.
    pub async fn login(&mut self, credential: &Credential) -> Result<Screen, ConsoleError> {
        self.context.login(credential).await?;
        self.changes.mark_unchanged();
        self.notice = None;

        let target = self
            .pending_return
            .take()
            .unwrap_or_else(|| LANDING.to_string());
        Ok(self.navigate(&target))
    }

    pub fn logout(&mut self) -> Screen {
        self.context.logout();
        self.changes.mark_unchanged();
        self.pending_return = None;
        self.navigate(LOGIN)
    }

    /// Registers an account and, on success, moves to the login screen with
    /// the service's confirmation as notice. No session is created.
    ///
    /// # Errors
    /// Whatever [`CredentialGateway::register`] returns.
    pub async fn register(&mut self, form: &RegistrationForm) -> Result<RegistrationReceipt, ConsoleError> {
        let receipt = self.gateway.register(form).await?;
        info!(username = %form.username, "account registered");
        self.notice = Some(receipt.message.clone());
        self.navigate(LOGIN);
        Ok(receipt)
    }

    /// Loads the listing behind the current page, forwarding the location's
    /// query. `Ok(None)` when the page has no endpoint or is not rendered.
    ///
    /// # Errors
    /// Any dispatcher error; `SessionExpired` also moves the console to `/login`.
    pub async fn load(&mut self) -> Result<Option<Value>, ConsoleError> {
        let Screen::Page(rule) = self.current() else {
            return Ok(None);
        };
        let Some(endpoint) = rule.endpoint else {
            return Ok(None);
        };

        let path = match routes::query_of(&self.location) {
            Some(query) => format!("{endpoint}?{query}"),
            None => endpoint.to_string(),
        };
        self.fetch(Method::GET, &path, None).await.map(Some)
    }

    /// Sends a call through the dispatcher and reacts to an expired session.
    ///
    /// # Errors
    /// Any dispatcher error, returned unchanged.
    pub async fn fetch(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ConsoleError> {
        let outcome = self.dispatcher.send(method, path, body).await;
        self.absorb_expiry();
        outcome
    }

    /// Navigation reaction to a call failure. Only `SessionExpired` moves the
    /// console; the returned screen is `None` for every other error.
    pub fn react(&mut self, err: &ConsoleError) -> Option<Screen> {
        if !err.is_session_expired() {
            return None;
        }

        self.context.expire();
        Some(self.expired(err.to_string()))
    }

    /// Moves to `/login` when the context was signed out by an expiry since
    /// the last check.
    fn absorb_expiry(&mut self) -> Option<Screen> {
        let message = self.context.take_expiry()?;
        Some(self.expired(message))
    }

    fn expired(&mut self, message: String) -> Screen {
        self.changes.mark_unchanged();
        self.pending_return = None;
        self.notice = Some(message);
        self.resolve(LOGIN)
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Console")
            .field("location", &self.location)
            .field("state", &self.context.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{
        errors::SESSION_EXPIRED_MESSAGE,
        types::{Role, Session},
    };
    use serde_json::json;
    use std::{net::TcpListener, time::Duration};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn config(base_url: &str) -> AppConfig {
        AppConfig {
            api_base_url: base_url.to_string(),
            session_file: "unused.json".into(),
            timeout: Duration::from_secs(5),
        }
    }

    fn console_as(role: Option<Role>, base_url: &str) -> Console {
        let store = Arc::new(SessionStore::in_memory());
        if let Some(role) = role {
            store.write(&Session::new("t1", "alice", role).unwrap());
        }
        Console::with_store(&config(base_url), store).unwrap()
    }

    #[test]
    fn signed_out_visit_goes_to_login_and_remembers_location() {
        let mut console = console_as(None, "http://localhost:8080/api");

        assert_eq!(
            console.navigate("/stocks"),
            Screen::Login {
                from: Some("/stocks".to_string())
            }
        );
        assert_eq!(console.location(), LOGIN);
        assert!(console.navigation().is_empty());
    }

    #[test]
    fn staff_is_bounced_to_landing() {
        let mut console = console_as(Some(Role::Staff), "http://localhost:8080/api");

        let screen = console.navigate("/suppliers");
        assert_eq!(screen, Screen::Page(routes::find(LANDING).unwrap()));
        assert_eq!(console.location(), LANDING);
    }

    #[test]
    fn root_and_unknown_locations_settle() {
        let mut console = console_as(Some(Role::Manager), "http://localhost:8080/api");
        assert_eq!(console.navigate("/"), Screen::Page(routes::find(LANDING).unwrap()));
        assert_eq!(console.navigate("/login"), Screen::Page(routes::find(LANDING).unwrap()));

        let mut console = console_as(None, "http://localhost:8080/api");
        assert_eq!(console.navigate("/nowhere"), Screen::Login { from: None });
        assert_eq!(console.navigate("/register"), Screen::Register);
    }

    #[test]
    fn logout_returns_to_login() {
        let mut console = console_as(Some(Role::Admin), "http://localhost:8080/api");
        assert_eq!(console.navigate("/users"), Screen::Page(routes::find("/users").unwrap()));

        assert_eq!(console.logout(), Screen::Login { from: None });
        assert!(!console.context().is_authenticated());
        assert!(console.dispatcher().store().read().is_none());
    }

    #[test]
    fn observe_follows_state_changes() {
        let mut console = console_as(Some(Role::Manager), "http://localhost:8080/api");
        console.navigate("/stocks");
        assert_eq!(console.observe(), None);

        console.context().logout();
        assert_eq!(
            console.observe(),
            Some(Screen::Login {
                from: Some("/stocks".to_string())
            })
        );
        assert_eq!(console.observe(), None);
    }

    #[test]
    fn only_session_expiry_moves_the_console() {
        let mut console = console_as(Some(Role::Manager), "http://localhost:8080/api");
        console.navigate("/stocks");

        let forbidden = ConsoleError::Remote {
            status: Some(403),
            message: "nope".to_string(),
        };
        assert_eq!(console.react(&forbidden), None);
        assert_eq!(console.location(), "/stocks");

        let expired = ConsoleError::SessionExpired {
            message: SESSION_EXPIRED_MESSAGE.to_string(),
        };
        assert_eq!(console.react(&expired), Some(Screen::Login { from: None }));
        assert_eq!(console.notice(), Some(SESSION_EXPIRED_MESSAGE));
    }

    #[tokio::test]
    async fn login_returns_to_the_requested_page() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "t1", "role": "MANAGER", "username": "alice"
            })))
            .mount(&server)
            .await;

        let mut console = console_as(None, &format!("{}/api", server.uri()));
        console.navigate("/reports?month=2024-05");

        let screen = console
            .login(&Credential::new("alice", "correctpw"))
            .await
            .unwrap();
        assert_eq!(screen, Screen::Page(routes::find("/reports").unwrap()));
        assert_eq!(console.location(), "/reports?month=2024-05");
    }

    #[tokio::test]
    async fn load_forwards_query_with_bearer() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/reports/monthly"))
            .and(query_param("month", "2024-05"))
            .and(header("Authorization", "Bearer t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 42})))
            .expect(1)
            .mount(&server)
            .await;

        let mut console = console_as(Some(Role::Staff), &format!("{}/api", server.uri()));
        console.navigate("/reports?month=2024-05");

        assert_eq!(console.load().await.unwrap(), Some(json!({"total": 42})));

        console.navigate(LANDING);
        assert_eq!(console.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_session_during_load_lands_on_login() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stocks"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut console = console_as(Some(Role::Admin), &format!("{}/api", server.uri()));
        console.navigate("/stocks");

        let err = console.load().await.unwrap_err();
        assert!(err.is_session_expired());
        assert_eq!(console.location(), LOGIN);
        assert_eq!(console.current(), Screen::Login { from: None });
        assert_eq!(console.notice(), Some(SESSION_EXPIRED_MESSAGE));
        assert!(!console.context().is_authenticated());
    }

    #[tokio::test]
    async fn rejection_outside_the_console_still_moves_it() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stocks"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut console = console_as(Some(Role::Manager), &format!("{}/api", server.uri()));
        assert_eq!(console.navigate("/stocks"), Screen::Page(routes::find("/stocks").unwrap()));

        let dispatcher = console.dispatcher().clone();
        let err = dispatcher.get::<Value>("/stocks").await.unwrap_err();
        assert!(err.is_session_expired());

        assert_eq!(console.observe(), Some(Screen::Login { from: None }));
        assert_eq!(console.observe(), None);
        assert_eq!(console.notice(), Some(SESSION_EXPIRED_MESSAGE));
        assert!(!console.context().is_authenticated());
        assert_eq!(
            console.navigate("/stocks"),
            Screen::Login {
                from: Some("/stocks".to_string())
            }
        );
    }

    #[tokio::test]
    async fn rejection_is_applied_on_the_next_navigation() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/categories"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut console = console_as(Some(Role::Staff), &format!("{}/api", server.uri()));
        console.navigate("/usage");
        console
            .dispatcher()
            .get::<Value>("/categories")
            .await
            .unwrap_err();

        assert_eq!(
            console.navigate("/usage"),
            Screen::Login {
                from: Some("/usage".to_string())
            }
        );
        assert_eq!(console.notice(), Some(SESSION_EXPIRED_MESSAGE));
        assert_eq!(console.observe(), None);
    }

    #[tokio::test]
    async fn registration_moves_to_login_with_notice() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"role": "STAFF"})))
            .mount(&server)
            .await;

        let mut console = console_as(None, &format!("{}/api", server.uri()));
        console.navigate(REGISTER);

        let form = RegistrationForm {
            username: "carol".to_string(),
            password: "Secret1".to_string().into(),
            confirm_password: "Secret1".to_string().into(),
            full_name: "Carol Smith".to_string(),
            role: "STAFF".to_string(),
        };
        let receipt = console.register(&form).await.unwrap();

        assert_eq!(receipt.message, "Registration successful! Please log in.");
        assert_eq!(console.location(), LOGIN);
        assert_eq!(console.take_notice().as_deref(), Some(receipt.message.as_str()));
        assert!(!console.context().is_authenticated());
    }
}
