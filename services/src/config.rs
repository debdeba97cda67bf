use serde::Deserialize;
use std::env::vars;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_LOCAL_PORT: u16 = 3000;
const DEFAULT_UPLOADS_DIR: &str = "uploads";
const DEFAULT_RATE_LIMIT: u32 = 5;
const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum Env {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "test")]
    Test,
    #[serde(rename = "staging")]
    Staging,
    #[serde(rename = "prod")]
    Prod,
}

impl Display for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Env::Local => write!(f, "local"),
            Env::Test => write!(f, "test"),
            Env::Staging => write!(f, "staging"),
            Env::Prod => write!(f, "prod"),
        }
    }
}

/// Credentials and location of the remote object store.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    /// Endpoint override for S3-compatible stores (MinIO, R2, ...).
    pub endpoint: Option<String>,
}

// The final, validated configuration struct.
// When `s3` is `Some`, every credential needed by the remote backend is present.
#[derive(Debug, Clone)]
pub struct Config {
    env: Env,
    database_url: String,
    server_addr: String,
    port: u16,
    jwt_secret: String,
    s3: Option<S3Settings>,
    uploads_dir: PathBuf,
    contribution_rate_limit: u32,
    contribution_rate_window: Duration,
    max_upload_bytes: usize,
    google_cloud_project: Option<String>,
}

// An intermediate struct for deserializing environment variables
// where most fields are optional.
#[derive(Deserialize)]
struct RawConfig {
    env: Env,
    database_url: String,
    server_addr: Option<String>,
    port: Option<u16>,
    jwt_secret: Option<String>,
    enable_s3: Option<bool>,
    aws_access_key_id: Option<String>,
    aws_secret_access_key: Option<String>,
    aws_region: Option<String>,
    aws_bucket_name: Option<String>,
    aws_endpoint: Option<String>,
    uploads_dir: Option<String>,
    contribution_rate_limit: Option<u32>,
    contribution_rate_window_secs: Option<u64>,
    max_upload_bytes: Option<usize>,
    google_cloud_project: Option<String>,
}

impl Config {
    /// Create a test configuration with default values.
    ///
    /// This function is available for both unit tests and integration tests.
    /// It should not be used in production code.
    pub fn new_for_test() -> Self {
        Self {
            env: Env::Local,
            database_url: "postgres://localhost:5432/test".to_string(),
            server_addr: "127.0.0.1".to_string(),
            port: DEFAULT_LOCAL_PORT,
            jwt_secret: "test-jwt-secret-key-for-local-development".to_string(),
            s3: None,
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
            contribution_rate_limit: DEFAULT_RATE_LIMIT,
            contribution_rate_window: Duration::from_secs(DEFAULT_RATE_WINDOW_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            google_cloud_project: None,
        }
    }

    /// Test configuration with a custom contribution rate limit.
    pub fn new_for_test_with_rate_limit(limit: u32, window: Duration) -> Self {
        Self {
            contribution_rate_limit: limit,
            contribution_rate_window: window,
            ..Self::new_for_test()
        }
    }

    /// Test configuration with a custom request body cap.
    pub fn new_for_test_with_max_upload(max_upload_bytes: usize) -> Self {
        Self {
            max_upload_bytes,
            ..Self::new_for_test()
        }
    }

    pub fn environment(&self) -> &Env {
        &self.env
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_local(&self) -> bool {
        matches!(self.env, Env::Local)
    }

    /// Secret used to verify (and, in tooling, sign) session tokens.
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Remote storage settings; `None` selects the local-disk backend.
    pub fn s3(&self) -> Option<&S3Settings> {
        self.s3.as_ref()
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn contribution_rate_limit(&self) -> u32 {
        self.contribution_rate_limit
    }

    pub fn contribution_rate_window(&self) -> Duration {
        self.contribution_rate_window
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn google_cloud_project(&self) -> Option<&str> {
        self.google_cloud_project.as_deref()
    }

    /// Initializes configuration by reading from environment variables
    /// and applying environment-aware defaults.
    pub fn init() -> anyhow::Result<Self> {
        let raw_config: RawConfig = serde_env::from_iter(vars())?;
        Self::from_raw(raw_config)
    }

    fn from_raw(raw_config: RawConfig) -> anyhow::Result<Self> {
        let RawConfig {
            env,
            database_url,
            server_addr,
            port,
            jwt_secret,
            enable_s3,
            aws_access_key_id,
            aws_secret_access_key,
            aws_region,
            aws_bucket_name,
            aws_endpoint,
            uploads_dir,
            contribution_rate_limit,
            contribution_rate_window_secs,
            max_upload_bytes,
            google_cloud_project,
        } = raw_config;

        let server_addr = server_addr.unwrap_or_else(|| {
            let default_addr = match env {
                Env::Local => "127.0.0.1",
                _ => "0.0.0.0",
            };
            info!(
                "SERVER_ADDR not set, defaulting to {} for {} environment",
                default_addr, env
            );
            default_addr.to_string()
        });

        let port = match port {
            Some(port) => port,
            None if matches!(env, Env::Local | Env::Test) => DEFAULT_LOCAL_PORT,
            None => anyhow::bail!("PORT must be set for {} environment", env),
        };

        let jwt_secret = match jwt_secret {
            Some(secret) if !secret.is_empty() => secret,
            _ if matches!(env, Env::Local | Env::Test) => {
                info!("JWT_SECRET not set, using default for {} environment", env);
                "default-jwt-secret-for-local-development-only".to_string()
            }
            _ => anyhow::bail!("JWT_SECRET must be set for {} environment", env),
        };

        let s3 = if enable_s3.unwrap_or(false) {
            let Some(access_key_id) = aws_access_key_id else {
                anyhow::bail!("AWS_ACCESS_KEY_ID must be set when ENABLE_S3 is true");
            };
            let Some(secret_access_key) = aws_secret_access_key else {
                anyhow::bail!("AWS_SECRET_ACCESS_KEY must be set when ENABLE_S3 is true");
            };
            let Some(region) = aws_region else {
                anyhow::bail!("AWS_REGION must be set when ENABLE_S3 is true");
            };
            let Some(bucket) = aws_bucket_name else {
                anyhow::bail!("AWS_BUCKET_NAME must be set when ENABLE_S3 is true");
            };
            Some(S3Settings {
                access_key_id,
                secret_access_key,
                region,
                bucket,
                endpoint: aws_endpoint.map(|e| e.trim_end_matches('/').to_string()),
            })
        } else {
            None
        };

        let contribution_rate_limit = contribution_rate_limit.unwrap_or(DEFAULT_RATE_LIMIT);
        if contribution_rate_limit == 0 {
            anyhow::bail!("CONTRIBUTION_RATE_LIMIT must be greater than zero");
        }

        let contribution_rate_window_secs =
            contribution_rate_window_secs.unwrap_or(DEFAULT_RATE_WINDOW_SECS);
        if contribution_rate_window_secs == 0 {
            anyhow::bail!("CONTRIBUTION_RATE_WINDOW_SECS must be greater than zero");
        }

        Ok(Config {
            env,
            database_url,
            server_addr,
            port,
            jwt_secret,
            s3,
            uploads_dir: PathBuf::from(uploads_dir.unwrap_or_else(|| DEFAULT_UPLOADS_DIR.into())),
            contribution_rate_limit,
            contribution_rate_window: Duration::from_secs(contribution_rate_window_secs),
            max_upload_bytes: max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            google_cloud_project,
        })
    }
}
