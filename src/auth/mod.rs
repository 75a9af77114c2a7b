//! Authentication module
//!
//! Identity-provider access, credential flows, local session state and
//! user-facing notifications.

pub mod identity;
pub mod models;
pub mod notify;
mod pkce;
mod retry;
mod service;

pub use identity::{GoTrueClient, IdentityProvider};
pub use models::{AdminCreateUser, AuthUser, Route, Session, SignUpMetadata, SignUpResponse};
pub use notify::{Level, Notification, Notifier, TracingNotifier};
pub use pkce::PkcePair;
pub use retry::RetryPolicy;
pub use service::{normalize_national_id, AuthService, ProfileStatus, SignUpOutcome};

#[cfg(test)]
pub use identity::MockIdentityProvider;
#[cfg(test)]
pub use notify::MockNotifier;
