use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use url::Url;

use crate::auth::identity::IdentityProvider;
use crate::auth::models::{AuthUser, Route, Session, SignUpMetadata};
use crate::auth::notify::{Notification, Notifier};
use crate::auth::pkce::PkcePair;
use crate::config::SiteConfig;
use crate::db::models::{NewProfile, Profile, Role};
use crate::db::operations::DataStore;
use crate::error::{AppError, AuthError};

const OAUTH_PROVIDER: &str = "google";
const NATIONAL_ID_DIGITS: usize = 11;

/// Result of the second sign-up step.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileStatus {
    Created(Profile),
    /// The account exists but its profile row could not be written. Nothing
    /// is rolled back; the profile is repaired on first load or by the repair job.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub profile: ProfileStatus,
    pub next: Route,
}

/// Credential and session operations.
///
/// Every failure is logged, reported through the notifier, and returned to
/// the caller. OAuth failures follow the same contract.
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DataStore>,
    notifier: Arc<dyn Notifier>,
    site: SiteConfig,
    session: RwLock<Option<Session>>,
    pending_oauth: RwLock<Option<PkcePair>>,
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DataStore>,
        notifier: Arc<dyn Notifier>,
        site: SiteConfig,
    ) -> Self {
        Self {
            identity,
            store,
            notifier,
            site,
            session: RwLock::new(None),
            pending_oauth: RwLock::new(None),
        }
    }

    fn fail(&self, title: &str, fallback: &str, err: AppError) -> AppError {
        let message = err.user_message();
        let description = if message.is_empty() { fallback.to_string() } else { message };
        self.notifier.notify(Notification::error(title, description));
        err
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        info!(email, "sending password reset email");
        let redirect_to = self.site.link(&self.site.reset_password_path);

        match self.identity.reset_password_for_email(email, &redirect_to).await {
            Ok(()) => {
                info!(email, "password reset email sent");
                Ok(())
            }
            Err(e) => {
                error!(email, error = %e, "password reset request failed");
                Err(self.fail(
                    "Could not send the password reset email",
                    "Check that the email address is correct",
                    e,
                ))
            }
        }
    }

    pub async fn reset_password(&self, new_password: &str) -> Result<Route, AppError> {
        info!("updating password");
        let result = async {
            let session = self.active_session().await?;
            self.identity
                .update_password(&session.access_token, new_password)
                .await
        }
        .await;

        match result {
            Ok(user) => {
                info!(user_id = %user.id, "password updated");
                self.notifier.notify(Notification::success("Password changed"));
                Ok(Route::Login)
            }
            Err(e) => {
                error!(error = %e, "password update failed");
                Err(self.fail(
                    "Could not change the password",
                    "Please try again or request a new link",
                    e,
                ))
            }
        }
    }

    /// Start the Google OAuth redirect. Returns the provider URL to open.
    pub async fn login_with_google(&self) -> Result<Url, AppError> {
        info!("starting Google sign-in");
        let pkce = PkcePair::generate();
        let redirect_to = self.site.link(&self.site.oauth_redirect_path);

        match self
            .identity
            .authorize_url(OAUTH_PROVIDER, &redirect_to, &pkce.challenge)
        {
            Ok(url) => {
                *self.pending_oauth.write().await = Some(pkce);
                Ok(url)
            }
            Err(e) => {
                error!(error = %e, "Google sign-in failed");
                Err(self.fail("Google sign-in failed", "Try again later", e))
            }
        }
    }

    /// Finish the OAuth redirect with the code from the callback URL.
    pub async fn complete_oauth(&self, auth_code: &str) -> Result<Route, AppError> {
        let pending = self.pending_oauth.write().await.take();
        let result = match pending {
            Some(pkce) => self.identity.exchange_code(auth_code, &pkce.verifier).await,
            None => Err(AuthError::Rejected("No sign-in in progress".into()).into()),
        };

        match result {
            Ok(session) => {
                info!(user_id = %session.user_id(), "OAuth sign-in completed");
                *self.session.write().await = Some(session);
                Ok(Route::Dashboard)
            }
            Err(e) => {
                error!(error = %e, "OAuth code exchange failed");
                Err(self.fail("Google sign-in failed", "Try again later", e))
            }
        }
    }

    /// Create the account, then its profile row.
    ///
    /// The two writes are independent: when the profile insert fails the
    /// account stays and the outcome reports `ProfileStatus::Failed`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<SignUpOutcome, AppError> {
        info!(email, "starting sign-up");

        let metadata = match normalize_national_id(&metadata.national_id) {
            Ok(national_id) => SignUpMetadata { national_id, ..metadata },
            Err(e) => return Err(self.fail("Sign-up failed", "Could not create the account", e)),
        };

        let response = match self
            .identity
            .sign_up(email, password, metadata.provider_data(Role::Student))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(email, error = %e, "sign-up rejected by identity provider");
                return Err(self.fail("Sign-up failed", "Could not create the account", e));
            }
        };
        let user = response.user().clone();
        info!(email, user_id = %user.id, "identity account created");

        let new_profile = NewProfile {
            id: user.id,
            email: email.to_string(),
            name: metadata.name.clone(),
            role: Role::Student,
            birth_date: Some(metadata.birth_date),
            national_id: Some(metadata.national_id.clone()),
        };

        let profile = match self.store.insert_profile(&new_profile).await {
            Ok(profile) => {
                info!(user_id = %user.id, "profile created");
                ProfileStatus::Created(profile)
            }
            Err(e) => {
                error!(user_id = %user.id, error = %e, "profile insert failed after sign-up");
                self.notifier
                    .notify(Notification::error("Could not create profile", e.user_message()));
                ProfileStatus::Failed(e.to_string())
            }
        };

        self.notifier.notify(
            Notification::success("Account created")
                .with_description("You will be redirected to the login page"),
        );

        Ok(SignUpOutcome {
            user,
            profile,
            next: Route::Login,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Route, AppError> {
        info!(email, "signing in");

        if let Err(e) = self.identity.health().await {
            warn!(error = %e, "backend unreachable");
            self.notifier.notify(Notification::error(
                "Could not reach the server",
                "Check your internet connection and try again",
            ));
            return Err(AppError::ConnectionError(e.to_string()));
        }

        match self.identity.sign_in_with_password(email, password).await {
            Ok(session) => {
                info!(email, user_id = %session.user_id(), "signed in");
                *self.session.write().await = Some(session);
                self.notifier.notify(Notification::success("Signed in"));
                Ok(Route::Dashboard)
            }
            Err(e) => {
                error!(email, error = %e, "sign-in failed");
                let err = classify_sign_in_error(e);
                let notification = match &err {
                    AppError::AuthError(AuthError::InvalidCredentials) => {
                        Notification::error("Invalid credentials", "Incorrect email or password")
                    }
                    AppError::AuthError(AuthError::EmailNotConfirmed) => Notification::error(
                        "Email not confirmed",
                        "Check your inbox to confirm your account",
                    ),
                    other => Notification::error("Sign-in failed", other.user_message()),
                };
                self.notifier.notify(notification);
                Err(err)
            }
        }
    }

    /// Sign out of the provider, falling back to discarding the local session.
    pub async fn logout(&self) -> Route {
        let session = self.session.write().await.take();
        self.pending_oauth.write().await.take();

        if let Some(session) = session {
            match self.identity.sign_out(&session.access_token).await {
                Ok(()) => {
                    info!(user_id = %session.user_id(), "signed out");
                    self.notifier.notify(Notification::success("Signed out"));
                }
                Err(e) => {
                    warn!(user_id = %session.user_id(), error = %e, "remote sign-out failed, session discarded locally");
                }
            }
        }

        Route::Login
    }

    /// Drop all local session state without contacting the provider.
    pub async fn force_logout(&self) -> Route {
        self.session.write().await.take();
        self.pending_oauth.write().await.take();
        info!("local session discarded");
        Route::Login
    }

    pub async fn restore_session(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Fresh account record for the active session, `None` when signed out.
    pub async fn current_user(&self) -> Result<Option<AuthUser>, AppError> {
        let token = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => return Ok(None),
        };
        self.identity.get_user(&token).await.map(Some)
    }

    async fn active_session(&self) -> Result<Session, AppError> {
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or(AppError::AuthError(AuthError::NoSession))?;
        if session.is_expired() {
            return Err(AuthError::SessionExpired.into());
        }
        Ok(session)
    }
}

/// Strip punctuation from a national id and require exactly eleven digits.
pub fn normalize_national_id(raw: &str) -> Result<String, AppError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != NATIONAL_ID_DIGITS {
        return Err(AppError::ValidationError(format!(
            "national id must have {} digits",
            NATIONAL_ID_DIGITS
        )));
    }
    Ok(digits)
}

fn classify_sign_in_error(err: AppError) -> AppError {
    match &err {
        AppError::BackendError(e) if e.message.contains("Invalid login credentials") => {
            AuthError::InvalidCredentials.into()
        }
        AppError::BackendError(e) if e.message.contains("Email not confirmed") => {
            AuthError::EmailNotConfirmed.into()
        }
        _ => err,
    }
}
