//! Configuration module
//!
//! Settings are read from the environment (optionally seeded from a `.env`
//! file) once at startup.

use std::env;

use crate::storage_types::StorageBackend;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_IMAGE_WORKERS: usize = 3;
const DEFAULT_IMAGE_MAX_DIMENSION: u32 = 8192;
const DEFAULT_MAX_REQUEST_SIZE_MB: usize = 100;
const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CLAMAV_PORT: u16 = 3310;
const DEFAULT_CLAMAV_TIMEOUT_SECS: u64 = 30;

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub public_url: String,
    pub environment: String,
    pub log_format: String,
    pub cors_origins: Vec<String>,
    pub max_request_size_mb: usize,
    // Metadata catalog
    pub graphql_endpoint: String,
    pub admin_secret: Option<String>,
    pub metadata_timeout_secs: u64,
    // Content store
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub local_storage_path: Option<String>,
    pub presign_secret: Option<String>,
    // ClamAV
    pub clamav_enabled: bool,
    pub clamav_host: String,
    pub clamav_port: u16,
    pub clamav_fail_closed: bool,
    pub clamav_timeout_secs: u64,
    // Image pipeline
    pub image_workers: usize,
    pub image_max_dimension: u32,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid PORT: {}", e))?;

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .parse::<StorageBackend>()?;

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            server_port,
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", server_port))
                .trim_end_matches('/')
                .to_string(),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            cors_origins,
            max_request_size_mb: env::var("MAX_REQUEST_SIZE_MB")
                .unwrap_or_else(|_| DEFAULT_MAX_REQUEST_SIZE_MB.to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid MAX_REQUEST_SIZE_MB: {}", e))?,
            graphql_endpoint: env::var("GRAPHQL_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:8080/v1/graphql".to_string()),
            admin_secret: env_opt("ADMIN_SECRET"),
            metadata_timeout_secs: env::var("METADATA_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_METADATA_TIMEOUT_SECS.to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid METADATA_TIMEOUT_SECS: {}", e))?,
            storage_backend,
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION"),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            local_storage_path: env_opt("LOCAL_STORAGE_PATH"),
            presign_secret: env_opt("PRESIGN_SECRET"),
            clamav_enabled: env_flag("CLAMAV_ENABLED", false),
            clamav_host: env::var("CLAMAV_HOST").unwrap_or_else(|_| "localhost".to_string()),
            clamav_port: env::var("CLAMAV_PORT")
                .unwrap_or_else(|_| DEFAULT_CLAMAV_PORT.to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid CLAMAV_PORT: {}", e))?,
            clamav_fail_closed: env_flag("CLAMAV_FAIL_CLOSED", true),
            clamav_timeout_secs: env::var("CLAMAV_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_CLAMAV_TIMEOUT_SECS.to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid CLAMAV_TIMEOUT_SECS: {}", e))?,
            image_workers: env::var("IMAGE_WORKERS")
                .unwrap_or_else(|_| DEFAULT_IMAGE_WORKERS.to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid IMAGE_WORKERS: {}", e))?,
            image_max_dimension: env::var("IMAGE_MAX_DIMENSION")
                .unwrap_or_else(|_| DEFAULT_IMAGE_MAX_DIMENSION.to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid IMAGE_MAX_DIMENSION: {}", e))?,
        })
    }

    /// Fail fast on settings the selected backends cannot run without.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    anyhow::bail!("S3_BUCKET is required when STORAGE_BACKEND=s3");
                }
                if self.s3_region.is_none() {
                    anyhow::bail!("S3_REGION is required when STORAGE_BACKEND=s3");
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    anyhow::bail!("LOCAL_STORAGE_PATH is required when STORAGE_BACKEND=local");
                }
                if self.presign_secret.is_none() {
                    anyhow::bail!("PRESIGN_SECRET is required when STORAGE_BACKEND=local");
                }
            }
        }

        if self.image_workers == 0 {
            anyhow::bail!("IMAGE_WORKERS must be at least 1");
        }

        if self.image_max_dimension == 0 {
            anyhow::bail!("IMAGE_MAX_DIMENSION must be at least 1");
        }

        if self.is_production() && self.admin_secret.is_none() {
            anyhow::bail!("ADMIN_SECRET must be set in production");
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn max_request_size_bytes(&self) -> usize {
        self.max_request_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> Config {
        Config {
            server_port: 8000,
            public_url: "http://localhost:8000".to_string(),
            environment: "development".to_string(),
            log_format: "text".to_string(),
            cors_origins: vec!["*".to_string()],
            max_request_size_mb: 100,
            graphql_endpoint: "http://localhost:8080/v1/graphql".to_string(),
            admin_secret: None,
            metadata_timeout_secs: 30,
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: Some("/tmp/filegate".to_string()),
            presign_secret: Some("secret".to_string()),
            clamav_enabled: false,
            clamav_host: "localhost".to_string(),
            clamav_port: 3310,
            clamav_fail_closed: true,
            clamav_timeout_secs: 30,
            image_workers: 3,
            image_max_dimension: 8192,
        }
    }

    #[test]
    fn test_validate_local_backend() {
        assert!(local_config().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_presign_secret_for_local() {
        let mut config = local_config();
        config.presign_secret = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_bucket_for_s3() {
        let mut config = local_config();
        config.storage_backend = StorageBackend::S3;
        assert!(config.validate().is_err());
        config.s3_bucket = Some("files".to_string());
        config.s3_region = Some("us-east-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_admin_secret() {
        let mut config = local_config();
        config.environment = "Production".to_string();
        assert!(config.is_production());
        assert!(config.validate().is_err());
        config.admin_secret = Some("hunter2".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_image_workers_rejected() {
        let mut config = local_config();
        config.image_workers = 0;
        assert!(config.validate().is_err());
    }
}
