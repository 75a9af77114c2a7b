use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{AdminCreateUser, AuthUser, IdentityProvider, Notification, Notifier, RetryPolicy};
use crate::db::models::{NewProfile, Profile, Role};
use crate::db::operations::DataStore;
use crate::error::AppError;

const FALLBACK_NAME: &str = "Usuário";

/// Role guessed from an address. "admin" wins over "manager".
pub fn infer_role(email: &str) -> Role {
    if email.contains("admin") {
        Role::Admin
    } else if email.contains("manager") {
        Role::Manager
    } else {
        Role::Student
    }
}

/// Display name taken from the local part of the address.
pub fn default_name(email: &str) -> String {
    match email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => FALLBACK_NAME.to_string(),
    }
}

pub fn default_profile(id: Uuid, email: &str) -> NewProfile {
    NewProfile::new(id, email, default_name(email), infer_role(email))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub scanned: usize,
    pub created: usize,
    pub existing: usize,
    /// Accounts without an email address.
    pub skipped: usize,
    pub failed: Vec<Uuid>,
}

/// Demo account provisioned by [`ProfileService::seed_test_users`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

impl TestUser {
    pub fn demo_set() -> Vec<TestUser> {
        [
            ("student@demo.com", "Estudante Demo", Role::Student),
            ("manager@demo.com", "Gerente Demo", Role::Manager),
            ("admin@demo.com", "Admin Demo", Role::Admin),
        ]
        .into_iter()
        .map(|(email, name, role)| TestUser {
            email: email.to_string(),
            password: "Teste123".to_string(),
            name: name.to_string(),
            role,
        })
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub failed: Vec<String>,
}

pub struct ProfileService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DataStore>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
}

impl ProfileService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DataStore>,
        notifier: Arc<dyn Notifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            identity,
            store,
            notifier,
            retry,
        }
    }

    /// Make sure every identity-provider account has a profile row.
    ///
    /// Accounts are handled one at a time; a failure on one account is logged
    /// and does not stop the run. Only a failed listing aborts.
    pub async fn repair_profiles(&self) -> Result<RepairReport, AppError> {
        info!("checking accounts without a profile");
        let users = self.identity.list_users().await.map_err(|e| {
            error!(error = %e, "could not list identity provider accounts");
            e
        })?;

        let mut report = RepairReport {
            scanned: users.len(),
            ..Default::default()
        };
        if users.is_empty() {
            info!("no accounts found");
            return Ok(report);
        }

        for user in &users {
            let email = match user.usable_email() {
                Some(email) => email,
                None => {
                    debug!(user_id = %user.id, "account has no email, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.store.find_profile(user.id).await {
                Ok(Some(_)) => {
                    debug!(email, "profile present");
                    report.existing += 1;
                }
                Ok(None) => {
                    let profile = default_profile(user.id, email);
                    info!(email, role = %profile.role, "creating missing profile");
                    match self.store.insert_profile(&profile).await {
                        Ok(_) => report.created += 1,
                        Err(e) => {
                            error!(email, error = %e, "could not create profile");
                            report.failed.push(user.id);
                        }
                    }
                }
                Err(e) => {
                    error!(email, error = %e, "could not look up profile");
                    report.failed.push(user.id);
                }
            }
        }

        info!(
            scanned = report.scanned,
            created = report.created,
            existing = report.existing,
            skipped = report.skipped,
            failed = report.failed.len(),
            "profile repair finished"
        );
        Ok(report)
    }

    /// Profile for a signed-in user, created on the spot when missing.
    ///
    /// Without an email there is nothing to derive a default from, so a
    /// missing profile stays `None`.
    pub async fn fetch_or_create_profile(
        &self,
        user_id: Uuid,
        email: Option<&str>,
    ) -> Result<Option<Profile>, AppError> {
        if let Some(profile) = self.store.find_profile(user_id).await? {
            return Ok(Some(profile));
        }

        match email {
            Some(email) => {
                info!(user_id = %user_id, "no profile found, creating default profile");
                let profile = self.store.insert_profile(&default_profile(user_id, email)).await?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// [`fetch_or_create_profile`](Self::fetch_or_create_profile) with backoff.
    /// Each attempt checks connectivity first; an unreachable backend counts
    /// as a failed attempt. Gives up with a notification once the retry
    /// budget is spent.
    pub async fn load_profile_with_retry(&self, user: &AuthUser) -> Option<Profile> {
        let mut attempt = 0;
        loop {
            if let Err(e) = self.identity.health().await {
                warn!(user_id = %user.id, attempt, error = %e, "backend unreachable, profile not loaded");
            } else {
                match self.fetch_or_create_profile(user.id, user.usable_email()).await {
                    Ok(Some(profile)) => return Some(profile),
                    Ok(None) => warn!(user_id = %user.id, attempt, "profile not available"),
                    Err(e) => warn!(user_id = %user.id, attempt, error = %e, "profile load failed"),
                }
            }

            match self.retry.delay_for(attempt) {
                Some(delay) => {
                    debug!(user_id = %user.id, delay_ms = delay.as_millis() as u64, "retrying profile load");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    self.notifier.notify(Notification::error(
                        "Could not load your profile",
                        "Try reloading the page or checking your connection",
                    ));
                    return None;
                }
            }
        }
    }

    /// Create missing demo accounts and force their profiles to the declared role.
    pub async fn seed_test_users(&self, users: &[TestUser]) -> Result<SeedReport, AppError> {
        info!(count = users.len(), "seeding test users");
        let existing = self.identity.list_users().await?;
        let mut report = SeedReport::default();

        for test_user in users {
            let found = existing.iter().find(|u| {
                u.email
                    .as_deref()
                    .map(|e| e.eq_ignore_ascii_case(&test_user.email))
                    .unwrap_or(false)
            });

            let user_id = match found {
                Some(user) => {
                    report.existing.push(test_user.email.clone());
                    user.id
                }
                None => {
                    let request = AdminCreateUser {
                        email: test_user.email.clone(),
                        password: test_user.password.clone(),
                        email_confirm: true,
                        user_metadata: serde_json::json!({ "name": test_user.name, "role": test_user.role }),
                    };
                    match self.identity.admin_create_user(&request).await {
                        Ok(user) => {
                            report.created.push(test_user.email.clone());
                            user.id
                        }
                        Err(e) => {
                            error!(email = %test_user.email, error = %e, "could not create test user");
                            report.failed.push(test_user.email.clone());
                            continue;
                        }
                    }
                }
            };

            let profile = NewProfile::new(user_id, &test_user.email, &test_user.name, test_user.role);
            if let Err(e) = self.store.upsert_profile(&profile).await {
                error!(email = %test_user.email, error = %e, "could not upsert test profile");
                report.failed.push(test_user.email.clone());
            }
        }

        Ok(report)
    }
}
