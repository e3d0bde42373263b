use crate::errors::ApiError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use zk_credentials::constants::{DEFAULT_SUBJECTS, DEFAULT_TREE_DEPTH};

/// Runtime configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub addr: String,
    pub data_dir: PathBuf,
    pub api_key: String,
    pub session_ttl: Duration,
    /// Number of graded subjects per record. Every key set is compiled for this many.
    pub subjects: usize,
    /// Largest accumulator depth a published batch may have.
    pub max_depth: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let api_key = lookup("API_KEY").unwrap_or_else(|| {
            tracing::warn!("API_KEY not set, using the development key");
            "dev-secret-key".to_string()
        });

        let config = Config {
            addr: lookup("BACKEND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            data_dir: PathBuf::from(lookup("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            api_key,
            session_ttl: Duration::from_secs(parse_or(&lookup, "SESSION_TTL_SECS", 1800)?),
            subjects: parse_or(&lookup, "CIRCUIT_SUBJECTS", DEFAULT_SUBJECTS)?,
            max_depth: parse_or(&lookup, "CIRCUIT_DEPTH", DEFAULT_TREE_DEPTH)?,
        };

        if config.subjects == 0 {
            return Err(ApiError::Config("CIRCUIT_SUBJECTS must be at least 1".to_string()));
        }
        if config.max_depth > 20 {
            return Err(ApiError::Config("CIRCUIT_DEPTH must be at most 20".to_string()));
        }
        Ok(config)
    }
}

#[cfg(test)]
impl Config {
    /// A small configuration rooted in a fresh temporary directory.
    pub fn for_tests() -> Self {
        Config {
            addr: "127.0.0.1:0".to_string(),
            data_dir: std::env::temp_dir().join(format!("zkc-{}", uuid::Uuid::new_v4())),
            api_key: "test-key".to_string(),
            session_ttl: Duration::from_secs(60),
            subjects: 1,
            max_depth: 2,
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ApiError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::Config(format!("{key} has an invalid value: {raw:?}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ApiError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.addr, "127.0.0.1:8080");
        assert_eq!(c.data_dir, PathBuf::from("data"));
        assert_eq!(c.session_ttl, Duration::from_secs(1800));
        assert_eq!(c.subjects, DEFAULT_SUBJECTS);
        assert_eq!(c.max_depth, DEFAULT_TREE_DEPTH);
    }

    #[test]
    fn values_are_parsed() {
        let c = config(&[("SESSION_TTL_SECS", "60"), ("CIRCUIT_SUBJECTS", " 3 "), ("API_KEY", "k")])
            .unwrap();
        assert_eq!(c.session_ttl, Duration::from_secs(60));
        assert_eq!(c.subjects, 3);
        assert_eq!(c.api_key, "k");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(config(&[("CIRCUIT_DEPTH", "ten")]), Err(ApiError::Config(_))));
        assert!(matches!(config(&[("CIRCUIT_SUBJECTS", "0")]), Err(ApiError::Config(_))));
        assert!(matches!(config(&[("CIRCUIT_DEPTH", "32")]), Err(ApiError::Config(_))));
    }
}
