use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::db::models::{
    BancaCount, Enrollment, NewEnrollment, NewMembership, NewProfile, Profile, StudentDetails, SubjectCount,
};
use crate::error::{AppError, DatabaseError};

const PROFILES: &str = "rest/v1/profiles";
const STUDENT_EXAMS: &str = "rest/v1/student_exams";
const ORGANIZATION_USERS: &str = "rest/v1/organization_users";
const QUESTIONS: &str = "rest/v1/questions";
const SUBJECTS_SUMMARY: &str = "rest/v1/subjects_summary";
const BANCAS_SUMMARY: &str = "rest/v1/bancas_summary";

/// Table and RPC access on the relational store.
///
/// Lookups return `Ok(None)` when nothing matches; only transport or
/// backend failures are errors.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, AppError>;

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, AppError>;

    /// Lookup by the digits-only national id.
    async fn find_profile_by_cpf(&self, cpf: &str) -> Result<Option<Profile>, AppError>;

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, AppError>;

    /// Insert or overwrite the profile with the same id.
    async fn upsert_profile(&self, profile: &NewProfile) -> Result<Profile, AppError>;

    /// Single-row existence check, not a count.
    async fn has_enrollment(&self, student_id: Uuid) -> Result<bool, AppError>;

    /// One batch insert; a failure rejects the whole batch.
    async fn insert_enrollments(&self, rows: &[NewEnrollment]) -> Result<(), AppError>;

    async fn list_enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>, AppError>;

    async fn student_details_for_manager(&self, student_id: Uuid) -> Result<Option<StudentDetails>, AppError>;

    /// First organization the user belongs to.
    async fn organization_of(&self, user_id: Uuid) -> Result<Option<Uuid>, AppError>;

    async fn has_membership(&self, user_id: Uuid, organization_id: Uuid) -> Result<bool, AppError>;

    async fn insert_membership(&self, membership: &NewMembership) -> Result<(), AppError>;

    async fn subject_summary(&self, limit: usize) -> Result<Vec<SubjectCount>, AppError>;

    async fn banca_summary(&self, limit: usize) -> Result<Vec<BancaCount>, AppError>;

    /// Creation times of active questions, oldest first.
    async fn active_question_dates(&self) -> Result<Vec<DateTime<Utc>>, AppError>;

    /// Arbitrary SQL through the `exec_sql` RPC.
    async fn exec_sql(&self, sql: &str) -> Result<Value, AppError>;
}

/// `DataStore` over the backend's REST interface.
#[derive(Clone, Debug)]
pub struct RestStore {
    client: BackendClient,
    enrollment_conflict: Option<String>,
}

impl RestStore {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            enrollment_conflict: None,
        }
    }

    /// Unique key on `student_exams`. When set, enrollment inserts skip rows
    /// that collide with an existing key instead of failing.
    pub fn with_enrollment_conflict(mut self, columns: Option<String>) -> Self {
        self.enrollment_conflict = columns;
        self
    }

    /// Store scoped to a signed-in user so row-level policies apply.
    pub fn for_user(&self, access_token: &str) -> Self {
        Self {
            client: self.client.with_access_token(access_token),
            enrollment_conflict: self.enrollment_conflict.clone(),
        }
    }

    async fn select<T, Q>(&self, table: &str, query: &Q) -> Result<Vec<T>, AppError>
    where
        T: serde::de::DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.client.request(Method::GET, table)?.query(query);
        self.client.send_json(request).await.map_err(into_db_error)
    }

    async fn write_profile(&self, profile: &NewProfile, upsert: bool) -> Result<Profile, AppError> {
        let mut request = self.client.request(Method::POST, PROFILES)?;
        if upsert {
            request = request
                .query(&[("on_conflict", "id")])
                .header("Prefer", "resolution=merge-duplicates,return=representation");
        } else {
            request = request.header("Prefer", "return=representation");
        }

        let rows: Vec<Profile> = self
            .client
            .send_json(request.json(profile))
            .await
            .map_err(into_db_error)?;
        rows.into_iter()
            .next()
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, AppError> {
        let request = self
            .client
            .request(Method::POST, &format!("rest/v1/rpc/{}", function))?
            .json(&args);
        self.client.send_json(request).await.map_err(into_db_error)
    }
}

fn into_db_error(err: AppError) -> AppError {
    match err {
        AppError::BackendError(e) => AppError::DatabaseError(e.into()),
        other => other,
    }
}

#[async_trait]
impl DataStore for RestStore {
    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, AppError> {
        let filter = format!("eq.{}", id);
        let rows: Vec<Profile> = self
            .select(PROFILES, &[("select", "*"), ("id", filter.as_str()), ("limit", "1")])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, AppError> {
        let filter = format!("eq.{}", email);
        let rows: Vec<Profile> = self
            .select(PROFILES, &[("select", "*"), ("email", filter.as_str()), ("limit", "1")])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_profile_by_cpf(&self, cpf: &str) -> Result<Option<Profile>, AppError> {
        let filter = format!("eq.{}", cpf);
        let rows: Vec<Profile> = self
            .select(PROFILES, &[("select", "*"), ("cpf", filter.as_str()), ("limit", "1")])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, AppError> {
        self.write_profile(profile, false).await
    }

    async fn upsert_profile(&self, profile: &NewProfile) -> Result<Profile, AppError> {
        self.write_profile(profile, true).await
    }

    async fn has_enrollment(&self, student_id: Uuid) -> Result<bool, AppError> {
        let filter = format!("eq.{}", student_id);
        let rows: Vec<Value> = self
            .select(STUDENT_EXAMS, &[("select", "id"), ("student_id", filter.as_str()), ("limit", "1")])
            .await?;
        Ok(!rows.is_empty())
    }

    async fn insert_enrollments(&self, rows: &[NewEnrollment]) -> Result<(), AppError> {
        let mut request = self.client.request(Method::POST, STUDENT_EXAMS)?;
        request = match self.enrollment_conflict.as_deref() {
            Some(columns) => request
                .query(&[("on_conflict", columns)])
                .header("Prefer", "resolution=ignore-duplicates,return=minimal"),
            None => request.header("Prefer", "return=minimal"),
        };

        self.client
            .send_empty(request.json(rows))
            .await
            .map_err(into_db_error)
    }

    async fn list_enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>, AppError> {
        let filter = format!("eq.{}", student_id);
        self.select(STUDENT_EXAMS, &[("select", "*"), ("student_id", filter.as_str())])
            .await
    }

    async fn student_details_for_manager(&self, student_id: Uuid) -> Result<Option<StudentDetails>, AppError> {
        let value = self
            .rpc("get_student_details_for_manager", json!({ "p_student_id": student_id }))
            .await?;
        let rows: Vec<StudentDetails> = serde_json::from_value(value)?;
        Ok(rows.into_iter().next())
    }

    async fn organization_of(&self, user_id: Uuid) -> Result<Option<Uuid>, AppError> {
        #[derive(serde::Deserialize)]
        struct Row {
            organization_id: Uuid,
        }

        let filter = format!("eq.{}", user_id);
        let rows: Vec<Row> = self
            .select(
                ORGANIZATION_USERS,
                &[("select", "organization_id"), ("user_id", filter.as_str()), ("limit", "1")],
            )
            .await?;
        Ok(rows.into_iter().next().map(|r| r.organization_id))
    }

    async fn has_membership(&self, user_id: Uuid, organization_id: Uuid) -> Result<bool, AppError> {
        let user = format!("eq.{}", user_id);
        let organization = format!("eq.{}", organization_id);
        let rows: Vec<Value> = self
            .select(
                ORGANIZATION_USERS,
                &[
                    ("select", "user_id"),
                    ("user_id", user.as_str()),
                    ("organization_id", organization.as_str()),
                    ("limit", "1"),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn insert_membership(&self, membership: &NewMembership) -> Result<(), AppError> {
        let request = self
            .client
            .request(Method::POST, ORGANIZATION_USERS)?
            .header("Prefer", "return=minimal")
            .json(membership);
        self.client.send_empty(request).await.map_err(into_db_error)
    }

    async fn subject_summary(&self, limit: usize) -> Result<Vec<SubjectCount>, AppError> {
        let limit = limit.to_string();
        self.select(
            SUBJECTS_SUMMARY,
            &[
                ("select", "id,name,question_count"),
                ("order", "question_count.desc"),
                ("limit", limit.as_str()),
            ],
        )
        .await
    }

    async fn banca_summary(&self, limit: usize) -> Result<Vec<BancaCount>, AppError> {
        let limit = limit.to_string();
        self.select(
            BANCAS_SUMMARY,
            &[
                ("select", "banca_id,banca_nome,quantidade"),
                ("order", "quantidade.desc"),
                ("limit", limit.as_str()),
            ],
        )
        .await
    }

    async fn active_question_dates(&self) -> Result<Vec<DateTime<Utc>>, AppError> {
        #[derive(serde::Deserialize)]
        struct Row {
            created_at: DateTime<Utc>,
        }

        let rows: Vec<Row> = self
            .select(
                QUESTIONS,
                &[("select", "created_at"), ("status", "eq.active"), ("order", "created_at.asc")],
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.created_at).collect())
    }

    async fn exec_sql(&self, sql: &str) -> Result<Value, AppError> {
        self.rpc("exec_sql", json!({ "sql_query": sql })).await
    }
}
