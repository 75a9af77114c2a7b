//! Hosted backend plumbing.
//!
//! Shared HTTP client, header handling and error mapping used by the
//! identity provider and the REST data store.

pub mod api_key;
mod client;

pub use api_key::{is_service_role, key_role};
pub use client::BackendClient;
