use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable naming the TOML config file when `--config` is absent.
pub const CONFIG_PATH_ENV: &str = "FACEMATCH_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Service configuration.
///
/// Layered as defaults, then an optional TOML file, then `FACEMATCH_*`
/// environment variables. Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Interface to bind (default: all interfaces).
    pub host: String,
    pub port: u16,
    /// Directory holding `det_10g.onnx` and `w600k_r50.onnx`.
    pub model_dir: PathBuf,
    /// ONNX Runtime intra-op threads per session.
    pub inference_threads: usize,
    /// Timeout for fetching an image URL, in seconds.
    pub fetch_timeout_secs: u64,
    /// Largest accepted image, uploaded or fetched.
    pub max_image_bytes: usize,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_dir: PathBuf::from("models"),
            inference_threads: 2,
            fetch_timeout_secs: 10,
            max_image_bytes: 20 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `path` (or `$FACEMATCH_CONFIG`) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let file = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
                tracing::debug!(path = %path.display(), "read config file");
                Some(text)
            }
            None => None,
        };

        Self::from_sources(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build from optional TOML text and an environment lookup.
    pub fn from_sources(
        file: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(text) => toml::from_str(text)?,
            None => Config::default(),
        };

        if let Some(host) = env("FACEMATCH_HOST") {
            config.host = host;
        }
        env_override(&env, "FACEMATCH_PORT", &mut config.port)?;
        if let Some(dir) = env("FACEMATCH_MODEL_DIR") {
            config.model_dir = PathBuf::from(dir);
        }
        env_override(&env, "FACEMATCH_INFERENCE_THREADS", &mut config.inference_threads)?;
        env_override(&env, "FACEMATCH_FETCH_TIMEOUT_SECS", &mut config.fetch_timeout_secs)?;
        env_override(&env, "FACEMATCH_MAX_IMAGE_BYTES", &mut config.max_image_bytes)?;
        if let Some(level) = env("FACEMATCH_LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// `host:port` suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request body limit for the compare endpoint: two images plus form overhead.
    pub fn max_request_bytes(&self) -> usize {
        self.max_image_bytes.saturating_mul(2).saturating_add(64 * 1024)
    }
}

fn env_override<T: FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    field: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = env(key) {
        *field = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(None, no_env).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = r#"
            port = 8080
            model_dir = "/opt/facematch/models"
        "#;
        let config = Config::from_sources(Some(file), no_env).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.model_dir, PathBuf::from("/opt/facematch/models"));
        assert_eq!(config.fetch_timeout_secs, 10);
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("FACEMATCH_PORT", "9000"),
            ("FACEMATCH_FETCH_TIMEOUT_SECS", " 3 "),
            ("FACEMATCH_LOG_LEVEL", "facematchd=debug"),
        ]);
        let config = Config::from_sources(Some("port = 8080"), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.fetch_timeout_secs, 3);
        assert_eq!(config.log_level, "facematchd=debug");
    }

    #[test]
    fn test_invalid_env_value_is_an_error() {
        let err = Config::from_sources(None, |k| (k == "FACEMATCH_PORT").then(|| "http".to_string()))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value \"http\" for FACEMATCH_PORT");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = Config::from_sources(Some("prot = 1"), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/facematch.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_max_request_bytes_saturates() {
        let config = Config { max_image_bytes: usize::MAX, ..Config::default() };
        assert_eq!(config.max_request_bytes(), usize::MAX);
    }
}
