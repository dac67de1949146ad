//! Shared HTTP client for every call made against the service. It reads the
//! token from the session store right before each request, attaches it as a
//! bearer credential, and turns responses into `ConsoleError`s. A `401` clears
//! the store, surfaces as `SessionExpired` and is announced on the expiry
//! channel the session context listens to; navigation is left to the caller.

use crate::{
    console::{
        config::AppConfig,
        errors::{ConsoleError, RawFailure, SESSION_EXPIRED_MESSAGE, TransportFailure},
        store::{Revocation, SessionStore},
    },
    APP_USER_AGENT,
};
use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{Span, debug, field, info, instrument};
use ulid::Ulid;
use url::Url;

const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// A successful exchange with its raw body.
#[derive(Debug)]
pub(crate) struct Reply {
    status: StatusCode,
    body: String,
}

impl Reply {
    /// Decodes the body; an empty body decodes as JSON `null`.
    pub(crate) fn decode<T: DeserializeOwned>(&self) -> Result<T, ConsoleError> {
        let decoded = if self.body.trim().is_empty() {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_str(&self.body)
        };

        decoded.map_err(|err| ConsoleError::Remote {
            status: Some(self.status.as_u16()),
            message: format!("Failed to decode response: {err}"),
        })
    }
}

/// Latest session rejection announced by the dispatcher.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Expiry {
    /// Bumped once per announced rejection.
    pub count: u64,
    pub message: String,
}

/// Per-request bookkeeping: the token the request was sent with.
struct Attempt {
    request_id: Ulid,
    token: Option<SecretString>,
}

impl Attempt {
    fn new(token: Option<SecretString>) -> Self {
        Self {
            request_id: Ulid::new(),
            token,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    base_url: String,
    store: Arc<SessionStore>,
    expirations: Arc<watch::Sender<Expiry>>,
}

impl Dispatcher {
    /// Builds the shared client for the configured service.
    ///
    /// # Errors
    /// Returns an error if the base URL is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(config: &AppConfig, store: Arc<SessionStore>) -> Result<Self> {
        let base_url = config.api_base_url.trim();
        let parsed = Url::parse(base_url)
            .with_context(|| format!("invalid API base URL: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "invalid API base URL: unsupported scheme {}",
                parsed.scheme()
            ));
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;

        let (expirations, _) = watch::channel(Expiry::default());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            expirations: Arc::new(expirations),
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Receiver for session rejections. Every clone of this dispatcher
    /// announces on the same channel.
    #[must_use]
    pub fn subscribe_expirations(&self) -> watch::Receiver<Expiry> {
        self.expirations.subscribe()
    }

    /// Joins a request path onto the configured base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        let path = path.trim();
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// # Errors
    /// Returns `SessionExpired` on `401`, `Remote` for any other failure.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConsoleError> {
        self.call::<()>(Method::GET, path, None).await?.decode()
    }

    /// # Errors
    /// Returns `SessionExpired` on `401`, `Remote` for any other failure.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ConsoleError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(Method::POST, path, Some(body)).await?.decode()
    }

    /// # Errors
    /// Returns `SessionExpired` on `401`, `Remote` for any other failure.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ConsoleError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(Method::PUT, path, Some(body)).await?.decode()
    }

    /// # Errors
    /// Returns `SessionExpired` on `401`, `Remote` for any other failure.
    pub async fn delete(&self, path: &str) -> Result<(), ConsoleError> {
        self.call::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Sends an arbitrary JSON call and returns the decoded body.
    ///
    /// # Errors
    /// Returns `SessionExpired` on `401`, `Remote` for any other failure.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ConsoleError> {
        self.call(method, path, body).await?.decode()
    }

    /// Posts without a token and without expiry handling. Used for the
    /// login/registration exchanges, where a `401` means "bad credentials".
    pub(crate) async fn post_public<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Reply, RawFailure> {
        self.exchange(Method::POST, path, Some(body), None, Ulid::new())
            .await
    }

    #[instrument(skip(self, body), fields(request_id = field::Empty))]
    async fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Reply, ConsoleError> {
        // the store, not the context, is the source for the token
        let attempt = Attempt::new(self.store.token());
        Span::current().record("request_id", field::display(attempt.request_id));

        let outcome = self
            .exchange(
                method,
                path,
                body,
                attempt.token.as_ref(),
                attempt.request_id,
            )
            .await;

        match outcome {
            Ok(reply) => Ok(reply),
            Err(failure) if failure.status == Some(StatusCode::UNAUTHORIZED.as_u16()) => {
                Err(self.handle_unauthorized(&attempt, &failure))
            }
            Err(failure) => {
                debug!(status = ?failure.status, "request failed");
                Err(ConsoleError::remote(&failure))
            }
        }
    }

    fn handle_unauthorized(&self, attempt: &Attempt, failure: &RawFailure) -> ConsoleError {
        let message = failure
            .server_message()
            .unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string());

        match self.store.revoke(attempt.token.as_ref()) {
            Revocation::Superseded => {
                debug!("rejected session was already replaced, stored session kept");
            }
            revocation => {
                if revocation == Revocation::Cleared {
                    info!(
                        authenticated = attempt.token.is_some(),
                        "session rejected by the service, stored session cleared"
                    );
                } else {
                    debug!("session rejected by the service, store already empty");
                }
                self.expirations.send_modify(|expiry| {
                    expiry.count += 1;
                    expiry.message.clone_from(&message);
                });
            }
        }

        ConsoleError::SessionExpired { message }
    }

    async fn exchange<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&SecretString>,
        request_id: Ulid,
    ) -> Result<Reply, RawFailure> {
        let mut request = self
            .client
            .request(method, self.url(path))
            .header(REQUEST_ID_HEADER, request_id.to_string());

        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(map_request_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_request_error)?;

        if status.is_success() {
            Ok(Reply { status, body })
        } else {
            Err(RawFailure::response(status.as_u16(), body))
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Dispatcher")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Maps transport errors into the failure shape used by normalization.
fn map_request_error(err: reqwest::Error) -> RawFailure {
    let failure = if err.is_timeout() {
        TransportFailure::Timeout
    } else if err.is_connect() {
        TransportFailure::Connect(err.to_string())
    } else if err.is_builder() {
        TransportFailure::Other(format!("Failed to build request: {err}"))
    } else {
        TransportFailure::Other(err.to_string())
    };
    RawFailure::transport(failure)
}
