use std::path::PathBuf;

use config::{Config, Environment, File, Map};
use serde::Deserialize;

use crate::error::CoachError;

/// Environment variable holding the Gemini API credential.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Prefix of `COACH__SECTION__KEY` overrides.
const ENV_PREFIX: &str = "COACH";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CoachConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://interview_coach.db".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeminiConfig {
    /// Never read from the config file; filled from `GOOGLE_API_KEY`.
    #[serde(skip)]
    pub api_key: String,
    pub base_url: String,
    pub api_version: String,
    pub model: String,
    pub request_timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_version: "v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            request_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub poll_interval_ms: u64,
    /// 0 waits for the remote file without limit.
    pub max_poll_attempts: usize,
    pub enforce_score_range: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_poll_attempts: 600,
            enforce_score_range: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Where uploaded answers are staged. Empty means the system temp dir.
    pub upload_dir: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_upload_bytes: 25 * 1024 * 1024,
            upload_dir: String::new(),
        }
    }
}

impl HttpConfig {
    pub fn docs_url(&self) -> String {
        format!("http://{}:{}/docs", self.host, self.port)
    }

    pub fn upload_dir(&self) -> PathBuf {
        if self.upload_dir.trim().is_empty() {
            return std::env::temp_dir();
        }
        PathBuf::from(shellexpand::tilde(&self.upload_dir).into_owned())
    }
}

impl CoachConfig {
    /// Load `path` (optional) layered with `COACH__SECTION__KEY` overrides and
    /// resolve the API key from the environment. Fails when the key is absent.
    pub fn load(path: &str) -> Result<Self, CoachError> {
        let mut config = Self::from_sources(path)?;
        config.resolve_api_key(std::env::var(API_KEY_ENV).ok())?;
        Ok(config)
    }

    pub fn from_sources(path: &str) -> Result<Self, CoachError> {
        Self::layered(path, None)
    }

    /// File first, environment on top. `env` stands in for the process
    /// environment when given.
    fn layered(path: &str, env: Option<Map<String, String>>) -> Result<Self, CoachError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").source(env))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    pub fn resolve_api_key(&mut self, key: Option<String>) -> Result<(), CoachError> {
        match key.map(|k| k.trim().to_string()) {
            Some(k) if !k.is_empty() => {
                self.gemini.api_key = k;
                Ok(())
            }
            _ => Err(CoachError::MissingCredential(API_KEY_ENV)),
        }
    }
}
