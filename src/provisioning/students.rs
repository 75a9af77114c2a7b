use tracing::{debug, error};
use uuid::Uuid;

use crate::db::models::StudentDetails;
use crate::db::operations::DataStore;
use crate::error::AppError;

/// Details a manager may see about one student.
///
/// No id means nothing to look up. An empty RPC result (unknown student or
/// no permission) is `Ok(None)`.
pub async fn student_details(
    store: &dyn DataStore,
    student_id: Option<Uuid>,
) -> Result<Option<StudentDetails>, AppError> {
    let student_id = match student_id {
        Some(id) => id,
        None => {
            debug!("no student id, skipping details lookup");
            return Ok(None);
        }
    };

    match store.student_details_for_manager(student_id).await {
        Ok(Some(details)) => Ok(Some(details)),
        Ok(None) => {
            debug!(student_id = %student_id, "no details returned");
            Ok(None)
        }
        Err(e) => {
            error!(student_id = %student_id, error = %e, "student details lookup failed");
            Err(e)
        }
    }
}
