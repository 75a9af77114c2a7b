use std::sync::Arc;
use tracing::{error, info};
use uuid::{uuid, Uuid};

use crate::db::models::{AccessType, NewEnrollment};
use crate::db::operations::DataStore;

pub const IN_PROGRESS: &str = "Em andamento";

/// Exam and position pair copied into a new student's enrollments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamSlot {
    pub exam_id: Uuid,
    pub exam_position_id: Uuid,
}

/// Enrollments of the demo student account. The first slot becomes the
/// current focus.
pub const DEFAULT_EXAM_TEMPLATE: [ExamSlot; 6] = [
    ExamSlot {
        exam_id: uuid!("826688ef-6e53-4b7a-8d0d-94a549eb7021"),
        exam_position_id: uuid!("df3467c5-62c0-4d6f-9840-57a26775c120"),
    },
    ExamSlot {
        exam_id: uuid!("67aa377e-b94f-4ff4-a3ac-5a84a59ed222"),
        exam_position_id: uuid!("b353b9c4-ef05-4b76-a494-ad56332f66d5"),
    },
    ExamSlot {
        exam_id: uuid!("26f8285e-56fd-4299-8334-cf18c3c76835"),
        exam_position_id: uuid!("78e8dd9c-dceb-4d32-bfc2-32735fe5b3bf"),
    },
    ExamSlot {
        exam_id: uuid!("4806517c-6523-4b72-9d38-9022c82730cc"),
        exam_position_id: uuid!("c814186c-16ff-4aba-9f36-99e88042b789"),
    },
    ExamSlot {
        exam_id: uuid!("caf3db4b-a060-4c94-a102-5bbfdbc9cb18"),
        exam_position_id: uuid!("82ae91d3-c3da-4304-8f25-e60130af1d09"),
    },
    ExamSlot {
        exam_id: uuid!("56404734-386a-4dae-8ecc-eadd4a14bb23"),
        exam_position_id: uuid!("c2665b64-5eb2-412d-8743-1481715edc9b"),
    },
];

/// Shorter template used when an operator assigns exams by hand.
pub fn manual_exam_template() -> &'static [ExamSlot] {
    &DEFAULT_EXAM_TEMPLATE[..3]
}

pub fn build_enrollments(student_id: Uuid, template: &[ExamSlot]) -> Vec<NewEnrollment> {
    template
        .iter()
        .enumerate()
        .map(|(i, slot)| NewEnrollment {
            student_id,
            exam_id: slot.exam_id,
            exam_position_id: slot.exam_position_id,
            access_type: AccessType::Paid,
            is_current_focus: i == 0,
            status: IN_PROGRESS.to_string(),
        })
        .collect()
}

/// Default enrollment assignment.
///
/// Both entry points report through their `bool` result and never return
/// an error: `true` when the student ends up with enrollments.
pub struct EnrollmentService {
    store: Arc<dyn DataStore>,
}

impl EnrollmentService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Give the student the default template unless they already have any
    /// enrollment. An existing row short-circuits; nothing is topped up.
    pub async fn auto_assign_default_exams(&self, student_id: Uuid) -> bool {
        info!(student_id = %student_id, "assigning default exams");
        self.assign(student_id, &DEFAULT_EXAM_TEMPLATE).await
    }

    /// Same as the automatic path, resolving the student by email and using
    /// the manual template.
    pub async fn manual_assign_exams(&self, email: &str) -> bool {
        info!(email, "manual exam assignment");
        let student_id = match self.store.find_profile_by_email(email).await {
            Ok(Some(profile)) => profile.id,
            Ok(None) => {
                error!(email, "no profile for email");
                return false;
            }
            Err(e) => {
                error!(email, error = %e, "profile lookup failed");
                return false;
            }
        };

        self.assign(student_id, manual_exam_template()).await
    }

    async fn assign(&self, student_id: Uuid, template: &[ExamSlot]) -> bool {
        match self.store.has_enrollment(student_id).await {
            Ok(true) => {
                info!(student_id = %student_id, "student already has exams, skipping");
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                error!(student_id = %student_id, error = %e, "could not check existing exams");
                return false;
            }
        }

        let rows = build_enrollments(student_id, template);
        match self.store.insert_enrollments(&rows).await {
            Ok(()) => {
                info!(student_id = %student_id, count = rows.len(), "exams assigned");
                true
            }
            Err(e) => {
                error!(student_id = %student_id, error = %e, "could not insert exams");
                false
            }
        }
    }
}
