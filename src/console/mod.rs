//! Session and access-control core of the console.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod errors;
pub mod gateway;
pub mod guard;
pub mod routes;
pub mod shell;
pub mod store;
pub mod types;
pub mod validation;

pub use config::{AppConfig, RuntimeConfig};
pub use context::{SessionContext, SessionState};
pub use dispatcher::{Dispatcher, Expiry};
pub use errors::{ConsoleError, FieldErrors, RawFailure, TransportFailure, normalize};
pub use gateway::CredentialGateway;
pub use guard::{GuardDecision, PublicPage, Resolution};
pub use routes::{PROTECTED_ROUTES, RouteAccessRule};
pub use shell::{Console, Screen};
pub use store::{FileStorage, MemoryStorage, Revocation, SessionStorage, SessionStore};
pub use types::{Credential, RegistrationForm, RegistrationReceipt, Role, Session, UserInfo};
