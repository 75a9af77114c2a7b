use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stored application role. Visitors never get a profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, rename = "cpf")]
    pub national_id: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "cpf", skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
}

impl NewProfile {
    pub fn new(id: Uuid, email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
            role,
            birth_date: None,
            national_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Paid,
    Free,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub exam_position_id: Uuid,
    pub access_type: AccessType,
    pub is_current_focus: bool,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEnrollment {
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub exam_position_id: Uuid,
    pub access_type: AccessType,
    pub is_current_focus: bool,
    pub status: String,
}

/// Row of `organization_users` linking an account to an organization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMembership {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

/// Flattened profile + student row returned by `get_student_details_for_manager`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDetails {
    pub profile_id: Uuid,
    pub profile_name: Option<String>,
    pub profile_email: Option<String>,
    pub profile_avatar_url: Option<String>,
    pub profile_birth_date: Option<String>,
    pub profile_cpf: Option<String>,
    pub profile_role: Option<String>,
    pub profile_created_at: Option<String>,
    pub student_id: Option<Uuid>,
    pub student_date_of_birth: Option<String>,
    pub student_phone_number: Option<String>,
    pub student_guardian_name: Option<String>,
    pub student_confirmed: Option<bool>,
    pub student_unit_id: Option<Uuid>,
    pub student_created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubjectCount {
    pub id: String,
    pub name: String,
    pub question_count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BancaCount {
    pub banca_id: String,
    pub banca_nome: String,
    pub quantidade: u64,
}
