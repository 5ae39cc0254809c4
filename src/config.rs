use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File};
use moka::future::Cache;
use sea_orm::Database;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::TokenService;
use crate::mailer::{LogMailer, Mailer, SmtpMailer};
use crate::schemas::AppState;
use crate::storage::{LocalObjectStore, ObjectStore};

/// Deployment mode. Development responses include internal error details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Default review window after assignment.
    pub review_deadline_days: i64,
    /// Age at which a pending application is reported as stale.
    pub stale_after_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub storage_dir: PathBuf,
    /// Prefix of the URLs handed out for stored files.
    pub public_base_url: String,
    pub max_image_bytes: u64,
    pub max_pdf_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Without a host, mail is only logged.
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub environment: RunMode,
    pub auth: AuthConfig,
    pub workflow: WorkflowConfig,
    pub upload: UploadConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    /// Layers defaults, an optional TOML file and `LOANPORTAL_*` variables.
    ///
    /// Nested keys use a double underscore, e.g. `LOANPORTAL_AUTH__JWT_SECRET`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("loanportal").required(false),
        };

        Config::builder()
            .set_default("database_url", "sqlite://loanportal.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("environment", "development")?
            .set_default("auth.jwt_secret", "change-me-in-production")?
            .set_default("auth.token_ttl_hours", 24_i64)?
            .set_default("workflow.review_deadline_days", 3_i64)?
            .set_default("workflow.stale_after_days", 3_i64)?
            .set_default("upload.storage_dir", "uploads")?
            .set_default("upload.public_base_url", "/files")?
            .set_default("upload.max_image_bytes", 5_i64 * 1024 * 1024)?
            .set_default("upload.max_pdf_bytes", 10_i64 * 1024 * 1024)?
            .set_default("mail.from_address", "no-reply@loanportal.local")?
            .add_source(file)
            .add_source(
                Environment::with_prefix("LOANPORTAL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == RunMode::Development
    }

    /// Largest upload any single file may have.
    pub fn max_upload_bytes(&self) -> u64 {
        self.upload.max_image_bytes.max(self.upload.max_pdf_bytes)
    }
}

/// Initialize application state from configuration
pub async fn initialize_app_state(config: AppConfig) -> Result<AppState> {
    info!("Connecting to database: {}", config.database_url);
    let db = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;

    let storage: Arc<dyn ObjectStore> = Arc::new(
        LocalObjectStore::new(&config.upload.storage_dir, &config.upload.public_base_url)
            .await
            .context("preparing upload directory")?,
    );
    debug!("Upload storage at {}", config.upload.storage_dir.display());

    let mailer: Arc<dyn Mailer> = match &config.mail.smtp_host {
        Some(host) => {
            info!("Sending mail through SMTP relay {}", host);
            Arc::new(SmtpMailer::new(&config.mail).context("configuring SMTP transport")?)
        }
        None => {
            warn!("No SMTP host configured, outgoing mail will only be logged");
            Arc::new(LogMailer)
        }
    };

    Ok(build_app_state(db, config, storage, mailer))
}

/// Assemble state around already-constructed collaborators.
pub fn build_app_state(
    db: sea_orm::DatabaseConnection,
    config: AppConfig,
    storage: Arc<dyn ObjectStore>,
    mailer: Arc<dyn Mailer>,
) -> AppState {
    let cache = Cache::builder()
        .max_capacity(1000)
        .time_to_live(Duration::from_secs(60))
        .build();
    let tokens = Arc::new(TokenService::new(
        &config.auth.jwt_secret,
        config.auth.token_ttl_hours,
    ));

    AppState {
        db,
        cache,
        stats_generation: Arc::new(AtomicU64::new(0)),
        config: Arc::new(config),
        storage,
        mailer,
        tokens,
    }
}
