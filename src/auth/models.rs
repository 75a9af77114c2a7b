use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::models::Role;

/// Account record as the identity provider reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// Email usable for provisioning; blank addresses count as absent.
    pub fn usable_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.trim().is_empty())
    }
}

/// Authenticated identity-provider session. The tokens stay opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(ts) => Utc::now().timestamp() >= ts,
            None => false,
        }
    }
}

/// Sign-up reply: a session when the provider auto-confirms, otherwise just the user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(Session),
    User(AuthUser),
}

impl SignUpResponse {
    pub fn user(&self) -> &AuthUser {
        match self {
            SignUpResponse::Session(session) => &session.user,
            SignUpResponse::User(user) => user,
        }
    }
}

/// Personal data collected by the sign-up form.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpMetadata {
    pub name: String,
    pub national_id: String,
    pub birth_date: NaiveDate,
}

impl SignUpMetadata {
    /// Metadata stored on the identity-provider account.
    pub fn provider_data(&self, role: Role) -> Value {
        serde_json::json!({
            "name": self.name,
            "cpf": self.national_id,
            "birth_date": self.birth_date,
            "role": role,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminCreateUser {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: Value,
}

/// Where the caller should send the user next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    ResetPassword,
}
