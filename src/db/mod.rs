//! Relational store access.
//!
//! Profiles, student enrollments and the reporting RPCs, reached through
//! the backend's REST interface.

pub mod models;
pub mod operations;

pub use models::{AccessType, Enrollment, NewEnrollment, NewMembership, NewProfile, Profile, Role, StudentDetails};
pub use operations::{DataStore, RestStore};

#[cfg(test)]
pub use operations::MockDataStore;
