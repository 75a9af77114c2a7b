use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::auth::models::{AdminCreateUser, AuthUser, Session, SignUpResponse};
use crate::backend::{is_service_role, BackendClient};
use crate::error::{AppError, AuthError};

const DEFAULT_PAGE_SIZE: u32 = 50;

/// Operations the platform needs from the identity provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, data: Value) -> Result<SignUpResponse, AppError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError>;

    /// Finish an OAuth redirect by trading the callback code for a session.
    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<Session, AppError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AppError>;

    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<AuthUser, AppError>;

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AppError>;

    /// Every account known to the provider. Requires a service-role key.
    async fn list_users(&self) -> Result<Vec<AuthUser>, AppError>;

    async fn admin_create_user(&self, request: &AdminCreateUser) -> Result<AuthUser, AppError>;

    /// Send an invitation email; `data` lands in the new account's metadata.
    async fn invite_user_by_email(&self, email: &str, data: Value) -> Result<AuthUser, AppError>;

    async fn health(&self) -> Result<(), AppError>;

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> Result<Url, AppError>;
}

#[derive(Debug, Deserialize)]
struct UserPage {
    users: Vec<AuthUser>,
}

/// `IdentityProvider` over the backend's `/auth/v1` endpoints.
#[derive(Clone, Debug)]
pub struct GoTrueClient {
    client: BackendClient,
    admin: Option<BackendClient>,
    page_size: u32,
}

impl GoTrueClient {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            admin: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Enable admin endpoints. The key must carry the service role.
    pub fn with_admin(mut self, admin: BackendClient) -> Result<Self, AppError> {
        if !is_service_role(admin.api_key()) {
            return Err(AuthError::MissingServiceRole.into());
        }
        self.admin = Some(admin);
        Ok(self)
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn admin(&self) -> Result<&BackendClient, AppError> {
        self.admin
            .as_ref()
            .ok_or(AppError::AuthError(AuthError::MissingServiceRole))
    }

    async fn token(&self, grant_type: &str, body: Value) -> Result<Session, AppError> {
        let request = self
            .client
            .request(Method::POST, "auth/v1/token")?
            .query(&[("grant_type", grant_type)])
            .json(&body);
        self.client.send_json(request).await
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_up(&self, email: &str, password: &str, data: Value) -> Result<SignUpResponse, AppError> {
        let request = self.client.request(Method::POST, "auth/v1/signup")?.json(&json!({
            "email": email,
            "password": password,
            "data": data,
        }));
        self.client.send_json(request).await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        self.token("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<Session, AppError> {
        self.token("pkce", json!({ "auth_code": auth_code, "code_verifier": code_verifier }))
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let request = self
            .client
            .request_as(Method::POST, "auth/v1/logout", access_token)?
            .query(&[("scope", "local")]);
        self.client.send_empty(request).await
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AppError> {
        let request = self
            .client
            .request(Method::POST, "auth/v1/recover")?
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }));
        self.client.send_empty(request).await
    }

    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<AuthUser, AppError> {
        let request = self
            .client
            .request_as(Method::PUT, "auth/v1/user", access_token)?
            .json(&json!({ "password": new_password }));
        self.client.send_json(request).await
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AppError> {
        let request = self.client.request_as(Method::GET, "auth/v1/user", access_token)?;
        self.client.send_json(request).await
    }

    async fn list_users(&self) -> Result<Vec<AuthUser>, AppError> {
        let admin = self.admin()?;
        let per_page = self.page_size.to_string();
        let mut users = Vec::new();
        let mut page = 1u32;

        loop {
            let page_param = page.to_string();
            let request = admin
                .request(Method::GET, "auth/v1/admin/users")?
                .query(&[("page", page_param.as_str()), ("per_page", per_page.as_str())]);
            let batch: UserPage = admin.send_json(request).await?;
            let received = batch.users.len();
            debug!(page, received, "listed identity provider accounts");
            users.extend(batch.users);

            if received < self.page_size as usize {
                break;
            }
            page += 1;
        }

        Ok(users)
    }

    async fn admin_create_user(&self, request: &AdminCreateUser) -> Result<AuthUser, AppError> {
        let admin = self.admin()?;
        let request = admin.request(Method::POST, "auth/v1/admin/users")?.json(request);
        admin.send_json(request).await
    }

    async fn invite_user_by_email(&self, email: &str, data: Value) -> Result<AuthUser, AppError> {
        let admin = self.admin()?;
        let request = admin
            .request(Method::POST, "auth/v1/invite")?
            .json(&json!({ "email": email, "data": data }));
        admin.send_json(request).await
    }

    async fn health(&self) -> Result<(), AppError> {
        let request = self.client.request(Method::GET, "auth/v1/health")?;
        self.client.send_empty(request).await
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> Result<Url, AppError> {
        let mut url = self.client.url("auth/v1/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }
}
