pub mod analytics;
pub mod auth;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod provisioning;

use std::sync::Arc;
use tracing::{info, warn};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, GoTrueClient, IdentityProvider, Notifier, RetryPolicy, TracingNotifier};
pub use backend::BackendClient;
pub use db::{DataStore, RestStore};
pub use maintenance::Maintenance;
pub use provisioning::{EnrollmentService, InviteService, ProfileService};

/// Services wired against one backend.
///
/// Built once from `Settings`; every service shares the same injected
/// identity provider, store and notifier.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn DataStore>,
    pub notifier: Arc<dyn Notifier>,
    pub auth: Arc<AuthService>,
    pub profiles: Arc<ProfileService>,
    pub enrollment: Arc<EnrollmentService>,
    pub invites: Arc<InviteService>,
    pub maintenance: Arc<Maintenance>,
}

impl AppState {
    pub fn new(config: Settings) -> Result<Self> {
        let anon = BackendClient::anon(&config.backend)?;
        let service = BackendClient::service(&config.backend)?;

        let mut gotrue = GoTrueClient::new(anon.clone());
        let store_client = match service {
            Some(service) => {
                gotrue = gotrue.with_admin(service.clone())?;
                service
            }
            None => {
                warn!("no service role key configured, admin operations disabled");
                anon
            }
        };
        let store = RestStore::new(store_client).with_enrollment_conflict(config.enrollment.on_conflict.clone());

        Ok(Self::with_components(
            config,
            Arc::new(gotrue),
            Arc::new(store),
            Arc::new(TracingNotifier),
        ))
    }

    /// Wire services around explicit collaborators.
    pub fn with_components(
        config: Settings,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DataStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let auth = AuthService::new(identity.clone(), store.clone(), notifier.clone(), config.site.clone());
        let profiles = ProfileService::new(
            identity.clone(),
            store.clone(),
            notifier.clone(),
            RetryPolicy::from(&config.retry),
        );
        let enrollment = EnrollmentService::new(store.clone());
        let invites = InviteService::new(identity.clone(), store.clone());
        let maintenance = Maintenance::new(store.clone(), config.maintenance.allow_exec_sql);

        Self {
            config: Arc::new(config),
            identity,
            store,
            notifier,
            auth: Arc::new(auth),
            profiles: Arc::new(profiles),
            enrollment: Arc::new(enrollment),
            invites: Arc::new(invites),
            maintenance: Arc::new(maintenance),
        }
    }

    /// Backend reachability with a timestamp, as reported by the `health` command.
    pub async fn health_check(&self) -> serde_json::Value {
        let status = match self.identity.health().await {
            Ok(()) => "healthy",
            Err(e) => {
                warn!(error = %e, "backend health check failed");
                "unreachable"
            }
        };
        info!(status, "health check");

        serde_json::json!({
            "status": status,
            "backend": self.config.backend.url,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })
    }
}
