use std::env;

/// Object storage configuration, injected into the S3 client and the
/// upload coordinator at construction instead of being read from the
/// environment at call sites.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket holding all video assets
    pub bucket: String,

    /// AWS region (ignored by S3-compatible endpoints that don't care)
    pub region: String,

    /// Custom endpoint URL for MinIO/R2-style backends
    pub endpoint: Option<String>,

    /// Path-style addressing (required for MinIO)
    pub force_path_style: bool,

    /// Static credentials; when unset the SDK's ambient provider chain is used
    pub access_key: Option<String>,
    pub secret_key: Option<String>,

    /// Lifetime of every issued presigned authorization, in seconds
    pub presign_ttl_secs: u64,
}

/// Payment provider (hosted checkout) configuration.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Secret API key; checkout is disabled when unset
    pub secret_key: Option<String>,

    /// Webhook signing secret; webhooks are rejected when unset
    pub webhook_secret: Option<String>,

    /// Base URL the hosted checkout redirects back to
    pub frontend_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub payments: PaymentConfig,

    /// JWT signing secret (required in production)
    pub jwt_secret: String,

    /// Allowed CORS origins (comma separated in the environment)
    pub allowed_origins: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "filmroom-prod-videos".to_string(),
            region: "us-east-2".to_string(),
            endpoint: None,
            force_path_style: false,
            access_key: None,
            secret_key: None,
            presign_ttl_secs: 300,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            payments: PaymentConfig::default(),
            jwt_secret: "secret".to_string(),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
                "http://localhost:5175".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage: StorageConfig {
                bucket: env::var("S3_BUCKET_NAME")
                    .ok()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .unwrap_or(default.storage.bucket),
                region: env::var("AWS_REGION")
                    .or_else(|_| env::var("AWS_DEFAULT_REGION"))
                    .or_else(|_| env::var("S3_REGION"))
                    .unwrap_or(default.storage.region),
                endpoint: env::var("S3_ENDPOINT").ok(),
                force_path_style: env::var("S3_FORCE_PATH_STYLE")
                    .map(|v| v.to_lowercase() == "true" || v == "1")
                    .unwrap_or(default.storage.force_path_style),
                access_key: env::var("S3_ACCESS_KEY").ok(),
                secret_key: env::var("S3_SECRET_KEY").ok(),
                presign_ttl_secs: env::var("PRESIGN_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.storage.presign_ttl_secs),
            },
            payments: PaymentConfig {
                secret_key: env::var("STRIPE_SECRET_KEY").ok(),
                webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok(),
                frontend_url: env::var("FRONTEND_URL").unwrap_or(default.payments.frontend_url),
            },
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()), // dev fallback, enforced in production()
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (local MinIO, relaxed secrets)
    pub fn development() -> Self {
        Self {
            storage: StorageConfig {
                bucket: "filmroom-dev".to_string(),
                region: "us-east-1".to_string(),
                endpoint: Some("http://127.0.0.1:9000".to_string()),
                force_path_style: true,
                access_key: Some("minioadmin".to_string()),
                secret_key: Some("minioadmin".to_string()),
                presign_ttl_secs: 300,
            },
            payments: PaymentConfig::default(),
            jwt_secret: "secret".to_string(),
            allowed_origins: AppConfig::default().allowed_origins,
        }
    }

    /// Create config for production (strict secrets)
    pub fn production() -> Self {
        let mut config = Self::from_env();
        config.jwt_secret = env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.storage.bucket, "filmroom-prod-videos");
        assert_eq!(config.storage.presign_ttl_secs, 300);
        assert!(config.payments.secret_key.is_none());
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert!(config.storage.force_path_style);
        assert!(config.storage.endpoint.is_some());
    }

    #[test]
    fn test_from_env_bucket_fallback() {
        unsafe { env::remove_var("S3_BUCKET_NAME") };
        let config = AppConfig::from_env();
        assert_eq!(config.storage.bucket, "filmroom-prod-videos");
    }
}
