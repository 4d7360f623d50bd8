use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub auth: AuthConfig,
    pub node: NodeConfig,
    pub remote: RemoteConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for signing bearer tokens
    pub jwt_secret: String,
    /// Token lifetime in hours
    pub token_ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub enum RemoteBackend {
    Cess,
    Local,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub backend: RemoteBackend,
    /// Directory for the local storage backend
    pub local_storage_path: String,
    /// Base URL of the CESS gateway (required when backend is cess)
    pub base_url: Option<String>,
    /// Fixed credential headers forwarded on every gateway request
    pub territory: String,
    pub account: String,
    pub message: String,
    pub signature: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: 24,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: RemoteBackend::Local,
            local_storage_path: "./files".to_string(),
            base_url: None,
            territory: String::new(),
            account: String::new(),
            message: String::new(),
            signature: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
        let token_ttl_hours = std::env::var("TOKEN_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(24);

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let remote_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "cess".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => RemoteBackend::Local,
            _ => RemoteBackend::Cess,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_hours,
            },
            remote: RemoteConfig {
                backend: remote_backend,
                local_storage_path,
                base_url: std::env::var("CESS_API_URL").ok(),
                territory: std::env::var("TERRITORY").unwrap_or_default(),
                account: std::env::var("ACCOUNT").unwrap_or_default(),
                message: std::env::var("MESSAGE").unwrap_or_default(),
                signature: std::env::var("SIGNATURE").unwrap_or_default(),
            },
            test_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "JWT_SECRET cannot be empty".to_string(),
            ));
        }

        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "TOKEN_TTL_HOURS must be positive".to_string(),
            ));
        }

        if matches!(self.remote.backend, RemoteBackend::Cess) && self.remote.base_url.is_none() {
            return Err(ConfigError::ValidationError(
                "CESS_API_URL is required when STORAGE_BACKEND=cess".to_string(),
            ));
        }

        Ok(())
    }
}
