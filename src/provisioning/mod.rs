//! Profile and enrollment provisioning
//!
//! Keeps the application records in step with identity-provider accounts:
//! profile repair, default exam enrollment, manager-driven student invites
//! and manager-facing lookups.

pub mod enrollment;
pub mod invites;
pub mod profiles;
pub mod students;

pub use enrollment::{build_enrollments, manual_exam_template, EnrollmentService, ExamSlot, DEFAULT_EXAM_TEMPLATE};
pub use invites::{InviteOutcome, InviteRequest, InviteService};
pub use profiles::{default_name, default_profile, infer_role, ProfileService, RepairReport, SeedReport, TestUser};
pub use students::student_details;
