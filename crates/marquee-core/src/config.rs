//! Configuration module
//!
//! Environment-driven settings for the content API: database, the managed
//! upload tree, the document store, upload limits per media kind, the admin
//! token, and the orphan cleanup schedule.

use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MIN_ADMIN_TOKEN_LEN: usize = 16;

/// Settings shared by every binary.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub log_format: String,
}

/// Content service configuration
#[derive(Clone, Debug)]
pub struct ContentConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Managed upload tree and document store
    pub upload_root: PathBuf,
    pub public_upload_prefix: String,
    pub documents_root: PathBuf,
    // Upload limits
    pub max_image_size_bytes: usize,
    pub image_allowed_extensions: Vec<String>,
    pub image_allowed_content_types: Vec<String>,
    pub max_video_size_bytes: usize,
    pub video_allowed_extensions: Vec<String>,
    pub video_allowed_content_types: Vec<String>,
    /// External binary that rewrites an image file in place. Unset disables optimization.
    pub image_optimizer_path: Option<String>,
    pub admin_api_token: String,
    // Orphan file reconciliation. 0 = disabled.
    pub cleanup_interval_secs: u64,
    pub orphan_grace_period_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ContentConfig>);

impl Config {
    fn as_content(&self) -> &ContentConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.as_content().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ContentConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_content().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_content().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_content().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_content().base.environment
    }

    pub fn log_format(&self) -> &str {
        &self.as_content().base.log_format
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_content().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_content().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> &str {
        &self.as_content().database_url
    }

    pub fn upload_root(&self) -> &Path {
        &self.as_content().upload_root
    }

    pub fn public_upload_prefix(&self) -> &str {
        &self.as_content().public_upload_prefix
    }

    pub fn documents_root(&self) -> &Path {
        &self.as_content().documents_root
    }

    pub fn max_image_size_bytes(&self) -> usize {
        self.as_content().max_image_size_bytes
    }

    pub fn image_allowed_extensions(&self) -> &[String] {
        &self.as_content().image_allowed_extensions
    }

    pub fn image_allowed_content_types(&self) -> &[String] {
        &self.as_content().image_allowed_content_types
    }

    pub fn max_video_size_bytes(&self) -> usize {
        self.as_content().max_video_size_bytes
    }

    pub fn video_allowed_extensions(&self) -> &[String] {
        &self.as_content().video_allowed_extensions
    }

    pub fn video_allowed_content_types(&self) -> &[String] {
        &self.as_content().video_allowed_content_types
    }

    pub fn image_optimizer_path(&self) -> Option<&str> {
        self.as_content().image_optimizer_path.as_deref()
    }

    pub fn admin_api_token(&self) -> &str {
        &self.as_content().admin_api_token
    }

    pub fn cleanup_interval_secs(&self) -> u64 {
        self.as_content().cleanup_interval_secs
    }

    pub fn orphan_grace_period_secs(&self) -> u64 {
        self.as_content().orphan_grace_period_secs
    }
}

impl ContentConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MAX_IMAGE_SIZE_MB: usize = 10;
        const MAX_VIDEO_SIZE_MB: usize = 500;
        const CLEANUP_INTERVAL_SECS: u64 = 3600;
        const ORPHAN_GRACE_PERIOD_SECS: u64 = 900;

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_name(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins: parse_list(&cors_origins_str, false),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            environment,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "text".to_string())
                .to_lowercase(),
        };

        let config = ContentConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            upload_root: env::var("UPLOAD_ROOT")
                .unwrap_or_else(|_| "./public".to_string())
                .into(),
            public_upload_prefix: env::var("PUBLIC_UPLOAD_PREFIX")
                .unwrap_or_else(|_| "/uploads".to_string()),
            documents_root: env::var("DOCUMENTS_ROOT")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            max_image_size_bytes: env::var("MAX_IMAGE_SIZE_MB")
                .unwrap_or_else(|_| MAX_IMAGE_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_IMAGE_SIZE_MB)
                * 1024
                * 1024,
            image_allowed_extensions: parse_list(
                &env::var("IMAGE_ALLOWED_EXTENSIONS")
                    .unwrap_or_else(|_| "jpg,jpeg,png,gif,webp".to_string()),
                true,
            ),
            image_allowed_content_types: parse_list(
                &env::var("IMAGE_ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| "image/jpeg,image/png,image/gif,image/webp".to_string()),
                true,
            ),
            max_video_size_bytes: env::var("MAX_VIDEO_SIZE_MB")
                .unwrap_or_else(|_| MAX_VIDEO_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_VIDEO_SIZE_MB)
                * 1024
                * 1024,
            video_allowed_extensions: parse_list(
                &env::var("VIDEO_ALLOWED_EXTENSIONS")
                    .unwrap_or_else(|_| "mp4,mov,webm".to_string()),
                true,
            ),
            video_allowed_content_types: parse_list(
                &env::var("VIDEO_ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| "video/mp4,video/quicktime,video/webm".to_string()),
                true,
            ),
            image_optimizer_path: env::var("IMAGE_OPTIMIZER_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            admin_api_token: env::var("ADMIN_API_TOKEN")
                .map_err(|_| anyhow::anyhow!("ADMIN_API_TOKEN must be set"))?,
            cleanup_interval_secs: env::var("CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|_| CLEANUP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(CLEANUP_INTERVAL_SECS),
            orphan_grace_period_secs: env::var("ORPHAN_GRACE_PERIOD_SECS")
                .unwrap_or_else(|_| ORPHAN_GRACE_PERIOD_SECS.to_string())
                .parse()
                .unwrap_or(ORPHAN_GRACE_PERIOD_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.admin_api_token.len() < MIN_ADMIN_TOKEN_LEN {
            return Err(anyhow::anyhow!(
                "ADMIN_API_TOKEN must be at least {} characters long",
                MIN_ADMIN_TOKEN_LEN
            ));
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if !self.public_upload_prefix.starts_with('/') {
            return Err(anyhow::anyhow!(
                "PUBLIC_UPLOAD_PREFIX must be a root-relative path"
            ));
        }

        // An extension or content type may belong to at most one kind.
        if let Some(shared) = first_overlap(
            &self.image_allowed_extensions,
            &self.video_allowed_extensions,
        ) {
            return Err(anyhow::anyhow!(
                "Extension '{}' is allow-listed for both images and videos",
                shared
            ));
        }
        if let Some(shared) = first_overlap(
            &self.image_allowed_content_types,
            &self.video_allowed_content_types,
        ) {
            return Err(anyhow::anyhow!(
                "Content type '{}' is allow-listed for both images and videos",
                shared
            ));
        }

        Ok(())
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Split a comma-separated env value, dropping blanks.
pub fn parse_list(raw: &str, lowercase: bool) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            if lowercase {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        })
        .collect()
}

fn first_overlap<'a>(left: &'a [String], right: &[String]) -> Option<&'a str> {
    let right: HashSet<&str> = right.iter().map(String::as_str).collect();
    left.iter()
        .map(String::as_str)
        .find(|item| right.contains(item))
}
