use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{normalize_national_id, IdentityProvider};
use crate::db::models::{NewMembership, Role};
use crate::db::operations::DataStore;
use crate::error::{AppError, AuthError};

/// Student a manager wants in their organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteRequest {
    pub cpf: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteOutcome {
    /// A profile with this national id already belongs to the organization.
    AlreadyAssociated { profile_id: Uuid },
    /// An existing profile was linked to the organization.
    Associated { profile_id: Uuid },
    /// No profile matched; an invitation email went out.
    Invited { user_id: Uuid },
}

/// Manager-driven student onboarding.
///
/// Existing students are matched by national id and linked to the manager's
/// organization; unknown ones get an invitation. The profile row and the
/// organization link for invited accounts are created by the backend when
/// the invitation is accepted.
pub struct InviteService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DataStore>,
}

impl InviteService {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DataStore>) -> Self {
        Self { identity, store }
    }

    pub async fn invite_student(
        &self,
        manager_access_token: &str,
        request: &InviteRequest,
    ) -> Result<InviteOutcome, AppError> {
        let manager = self.identity.get_user(manager_access_token).await.map_err(|e| {
            warn!(error = %e, "could not resolve the calling manager");
            AppError::AuthError(AuthError::NoSession)
        })?;

        let organization_id = self.store.organization_of(manager.id).await?.ok_or_else(|| {
            warn!(manager_id = %manager.id, "manager has no organization");
            AppError::Forbidden("manager is not linked to an organization".into())
        })?;

        if [&request.cpf, &request.email, &request.name]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AppError::ValidationError("cpf, email and name are required".into()));
        }
        let cpf = normalize_national_id(&request.cpf)?;
        info!(manager_id = %manager.id, organization_id = %organization_id, email = %request.email, "adding student");

        match self.store.find_profile_by_cpf(&cpf).await? {
            Some(profile) => {
                if self.store.has_membership(profile.id, organization_id).await? {
                    info!(profile_id = %profile.id, "student already in organization");
                    return Ok(InviteOutcome::AlreadyAssociated { profile_id: profile.id });
                }

                let membership = NewMembership {
                    user_id: profile.id,
                    organization_id,
                    role: Role::Student,
                };
                self.store.insert_membership(&membership).await.map_err(|e| {
                    error!(profile_id = %profile.id, error = %e, "could not link student to organization");
                    e
                })?;
                info!(profile_id = %profile.id, "existing student linked to organization");
                Ok(InviteOutcome::Associated { profile_id: profile.id })
            }
            None => {
                let data = json!({
                    "initial_name": request.name,
                    "cpf_to_set": cpf,
                    "invited_to_org_id": organization_id,
                    "invited_by_manager_id": manager.id,
                });
                let user = self
                    .identity
                    .invite_user_by_email(&request.email, data)
                    .await
                    .map_err(|e| classify_invite_error(e, &request.email))?;
                info!(user_id = %user.id, email = %request.email, "invitation sent");
                Ok(InviteOutcome::Invited { user_id: user.id })
            }
        }
    }
}

fn classify_invite_error(err: AppError, email: &str) -> AppError {
    match &err {
        AppError::BackendError(e)
            if e.message.contains("already registered") || e.message.contains("already been registered") =>
        {
            warn!(email, "invited email belongs to an existing account");
            AuthError::AlreadyRegistered(email.to_string()).into()
        }
        _ => {
            error!(email, error = %err, "invitation failed");
            err
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthUser, MockIdentityProvider};
    use crate::db::models::Profile;
    use crate::db::operations::MockDataStore;
    use crate::error::BackendError;
    use serde_json::Map;

    fn user(id: Uuid, email: &str) -> AuthUser {
        AuthUser {
            id,
            email: Some(email.to_string()),
            user_metadata: Map::new(),
            email_confirmed_at: None,
            created_at: None,
        }
    }

    fn student(id: Uuid) -> Profile {
        Profile {
            id,
            email: Some("ana@forefy.com".into()),
            name: "Ana".into(),
            role: Role::Student,
            birth_date: None,
            national_id: Some("12345678901".into()),
            avatar_url: None,
            created_at: None,
        }
    }

    fn request() -> InviteRequest {
        InviteRequest {
            cpf: "123.456.789-01".into(),
            email: "ana@forefy.com".into(),
            name: "Ana".into(),
        }
    }

    /// Identity double that resolves the manager token.
    fn manager_identity(manager_id: Uuid) -> MockIdentityProvider {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_get_user()
            .withf(|token| token == "manager-token")
            .returning(move |_| Ok(user(manager_id, "gestor@forefy.com")));
        identity
    }

    fn store_in(organization_id: Uuid) -> MockDataStore {
        let mut store = MockDataStore::new();
        store
            .expect_organization_of()
            .returning(move |_| Ok(Some(organization_id)));
        store
    }

    #[tokio::test]
    async fn test_existing_student_already_associated() {
        let organization_id = Uuid::new_v4();
        let profile_id = Uuid::new_v4();

        let mut store = store_in(organization_id);
        store
            .expect_find_profile_by_cpf()
            .withf(|cpf| cpf == "12345678901")
            .times(1)
            .returning(move |_| Ok(Some(student(profile_id))));
        store
            .expect_has_membership()
            .withf(move |user, org| *user == profile_id && *org == organization_id)
            .times(1)
            .returning(|_, _| Ok(true));
        store.expect_insert_membership().never();

        let mut identity = manager_identity(Uuid::new_v4());
        identity.expect_invite_user_by_email().never();

        let service = InviteService::new(Arc::new(identity), Arc::new(store));
        let outcome = service.invite_student("manager-token", &request()).await.unwrap();
        assert_eq!(outcome, InviteOutcome::AlreadyAssociated { profile_id });
    }

    #[tokio::test]
    async fn test_existing_student_linked_to_organization() {
        let organization_id = Uuid::new_v4();
        let profile_id = Uuid::new_v4();

        let mut store = store_in(organization_id);
        store
            .expect_find_profile_by_cpf()
            .times(1)
            .returning(move |_| Ok(Some(student(profile_id))));
        store.expect_has_membership().times(1).returning(|_, _| Ok(false));
        store
            .expect_insert_membership()
            .withf(move |m| m.user_id == profile_id && m.organization_id == organization_id && m.role == Role::Student)
            .times(1)
            .returning(|_| Ok(()));

        let service = InviteService::new(Arc::new(manager_identity(Uuid::new_v4())), Arc::new(store));
        let outcome = service.invite_student("manager-token", &request()).await.unwrap();
        assert_eq!(outcome, InviteOutcome::Associated { profile_id });
    }

    #[tokio::test]
    async fn test_unknown_student_is_invited() {
        let organization_id = Uuid::new_v4();
        let manager_id = Uuid::new_v4();
        let invited = Uuid::new_v4();

        let mut store = store_in(organization_id);
        store.expect_find_profile_by_cpf().times(1).returning(|_| Ok(None));
        store.expect_insert_membership().never();

        let mut identity = manager_identity(manager_id);
        identity
            .expect_invite_user_by_email()
            .withf(move |email, data| {
                email == "ana@forefy.com"
                    && data["cpf_to_set"] == "12345678901"
                    && data["initial_name"] == "Ana"
                    && data["invited_to_org_id"] == organization_id.to_string()
                    && data["invited_by_manager_id"] == manager_id.to_string()
            })
            .times(1)
            .returning(move |email, _| Ok(user(invited, email)));

        let service = InviteService::new(Arc::new(identity), Arc::new(store));
        let outcome = service.invite_student("manager-token", &request()).await.unwrap();
        assert_eq!(outcome, InviteOutcome::Invited { user_id: invited });
    }

    #[tokio::test]
    async fn test_invite_of_registered_email_is_a_conflict() {
        let mut store = store_in(Uuid::new_v4());
        store.expect_find_profile_by_cpf().times(1).returning(|_| Ok(None));

        let mut identity = manager_identity(Uuid::new_v4());
        identity.expect_invite_user_by_email().times(1).returning(|_, _| {
            Err(BackendError {
                status: 422,
                message: "User already registered".into(),
                code: None,
            }
            .into())
        });

        let service = InviteService::new(Arc::new(identity), Arc::new(store));
        let result = service.invite_student("manager-token", &request()).await;
        assert!(matches!(
            result,
            Err(AppError::AuthError(AuthError::AlreadyRegistered(ref email))) if email == "ana@forefy.com"
        ));
    }

    #[tokio::test]
    async fn test_rejects_incomplete_or_malformed_requests() {
        let mut store = store_in(Uuid::new_v4());
        store.expect_find_profile_by_cpf().never();

        let service = InviteService::new(Arc::new(manager_identity(Uuid::new_v4())), Arc::new(store));

        let missing_name = InviteRequest {
            name: "  ".into(),
            ..request()
        };
        let result = service.invite_student("manager-token", &missing_name).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        let short_cpf = InviteRequest {
            cpf: "123.456".into(),
            ..request()
        };
        let result = service.invite_student("manager-token", &short_cpf).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_manager_without_organization_is_forbidden() {
        let mut store = MockDataStore::new();
        store.expect_organization_of().times(1).returning(|_| Ok(None));
        store.expect_find_profile_by_cpf().never();

        let service = InviteService::new(Arc::new(manager_identity(Uuid::new_v4())), Arc::new(store));
        let result = service.invite_student("manager-token", &request()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_unauthenticated_manager() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_get_user()
            .times(1)
            .returning(|_| Err(AuthError::Rejected("invalid JWT".into()).into()));
        let mut store = MockDataStore::new();
        store.expect_organization_of().never();

        let service = InviteService::new(Arc::new(identity), Arc::new(store));
        let result = service.invite_student("expired", &request()).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::NoSession))));
    }
}
