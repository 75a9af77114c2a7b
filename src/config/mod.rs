use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub service_role_key: Option<String>,
    pub timeout_secs: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    pub url: String,
    pub login_path: String,
    pub reset_password_path: String,
    pub oauth_redirect_path: String,
}

impl SiteConfig {
    /// Absolute URL for a path on the web frontend.
    pub fn link(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MaintenanceConfig {
    pub allow_exec_sql: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EnrollmentConfig {
    /// Unique-constraint columns on `student_exams`, e.g. `student_id,exam_position_id`.
    pub on_conflict: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub backend: BackendConfig,
    pub site: SiteConfig,
    pub retry: RetryConfig,
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    environment: &str,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    builder
        .set_default("environment", environment)?
        .set_default("backend.url", "http://localhost:54321")?
        .set_default("backend.anon_key", "")?
        .set_default("backend.timeout_secs", 30)?
        .set_default("site.url", "http://localhost:8080")?
        .set_default("site.login_path", "/login")?
        .set_default("site.reset_password_path", "/reset-password")?
        .set_default("site.oauth_redirect_path", "/dashboard")?
        .set_default("retry.max_retries", 3)?
        .set_default("retry.base_delay_ms", 2000)?
        .set_default("maintenance.allow_exec_sql", false)
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = with_defaults(Config::builder(), "development")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // E.g., `APP_BACKEND__URL=https://...` would set `Settings.backend.url`
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    #[cfg(test)]
    pub fn new_for_test() -> Result<Self, ConfigError> {
        with_defaults(Config::builder(), "test")?
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Settings pointing at an arbitrary backend, for wiring tests and tools.
    pub fn for_backend(url: &str, anon_key: &str, service_role_key: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = with_defaults(Config::builder(), "test")?
            .set_override("backend.url", url)?
            .set_override("backend.anon_key", anon_key)?
            .set_override("retry.base_delay_ms", 1)?;
        if let Some(key) = service_role_key {
            builder = builder.set_override("backend.service_role_key", key)?;
        }
        builder.build()?.try_deserialize()
    }
}
