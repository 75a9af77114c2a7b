//! Schema verification utilities.
//!
//! These run arbitrary SQL through the `exec_sql` RPC, so every call is
//! refused unless `maintenance.allow_exec_sql` is switched on.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::operations::DataStore;
use crate::error::AppError;

const COLUMN_RENAME_QUERY: &str = "SELECT column_name FROM information_schema.columns \
     WHERE table_name = 'student_exams' AND column_name IN ('exam_positions_id', 'exam_position_id');";
const PLANS_TABLE_QUERY: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_name = 'plans') AS plans_table_exists;";
const EDUCATION_LEVELS_QUERY: &str =
    "SELECT name, promo_price, full_price FROM exam_level_of_educations ORDER BY name;";
const USERS_QUERY: &str = "SELECT email, email_confirmed_at FROM auth.users;";
const PROFILES_QUERY: &str = "SELECT id, email, role FROM profiles;";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub column_rename: Value,
    pub plans_table_exists: Option<bool>,
    pub education_levels: Value,
    pub users: Value,
    pub profiles: Value,
}

pub struct Maintenance {
    store: Arc<dyn DataStore>,
    allow_exec_sql: bool,
}

impl Maintenance {
    pub fn new(store: Arc<dyn DataStore>, allow_exec_sql: bool) -> Self {
        Self { store, allow_exec_sql }
    }

    pub async fn exec_sql(&self, sql: &str) -> Result<Value, AppError> {
        if !self.allow_exec_sql {
            warn!("exec_sql refused: maintenance.allow_exec_sql is off");
            return Err(AppError::Forbidden("exec_sql is disabled".into()));
        }
        self.store.exec_sql(sql).await
    }

    pub async fn verify_database(&self) -> Result<VerificationReport, AppError> {
        info!("starting database verification");
        let result = self.run_checks().await;
        if let Err(e) = &result {
            error!(error = %e, "database verification failed");
        }
        result
    }

    async fn run_checks(&self) -> Result<VerificationReport, AppError> {
        let column_rename = self.exec_sql(COLUMN_RENAME_QUERY).await?;
        let plans = self.exec_sql(PLANS_TABLE_QUERY).await?;
        let education_levels = self.exec_sql(EDUCATION_LEVELS_QUERY).await?;
        let users = self.exec_sql(USERS_QUERY).await?;
        let profiles = self.exec_sql(PROFILES_QUERY).await?;

        let plans_table_exists = plans
            .get(0)
            .and_then(|row| row.get("plans_table_exists"))
            .and_then(Value::as_bool);

        info!(?plans_table_exists, "database verification finished");
        Ok(VerificationReport {
            column_rename,
            plans_table_exists,
            education_levels,
            users,
            profiles,
        })
    }
}
