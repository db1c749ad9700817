/*
 * Responsibility
 * - Load settings from the environment (.env supported): listen port, CORS, root email,
 *   identity provider project / credentials / emulator
 * - Validate them (missing required values fail startup)
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Falls back to `project_id` of the service account file.
    pub project_id: Option<String>,
    pub credentials_path: Option<PathBuf>,
    /// `host:port`; when set, talk to the auth emulator instead of Google.
    pub emulator_host: Option<String>,
    pub http_timeout: Duration,
    pub id_token_leeway_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    /// Caller email that bypasses role checks. Unset disables the bypass.
    pub root_email: Option<String>,

    pub identity: IdentityConfig,
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = match std::env::var("PORT") {
            Ok(v) => v.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            Err(_) => 3000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let cors_allowed_origins =
            parse_origins(&std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default());

        let root_email = non_empty_var("ACCESS_ROOT_EMAIL");

        let project_id = non_empty_var("FIREBASE_PROJECT_ID");
        let credentials_path = non_empty_var("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);
        let emulator_host = non_empty_var("FIREBASE_AUTH_EMULATOR_HOST");

        if emulator_host.is_none() && credentials_path.is_none() {
            return Err(ConfigError::Missing("GOOGLE_APPLICATION_CREDENTIALS"));
        }
        if emulator_host.is_some() && project_id.is_none() {
            return Err(ConfigError::Missing("FIREBASE_PROJECT_ID"));
        }

        let http_timeout = std::env::var("IDENTITY_HTTP_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let id_token_leeway_seconds = std::env::var("ID_TOKEN_LEEWAY_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            root_email,
            identity: IdentityConfig {
                project_id,
                credentials_path,
                emulator_host,
                http_timeout,
                id_token_leeway_seconds,
            },
        })
    }
}
