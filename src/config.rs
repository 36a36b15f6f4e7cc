use crate::llm::google::models;
use crate::types::{AppError, AppResult};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub google: GoogleConfig,
    pub index: IndexConfig,
    pub chat: ChatConfig,
    pub retry: RetryConfig,
}

#[derive(Clone, Deserialize)]
pub struct GoogleConfig {
    pub api_key: String,
    pub api_base: String,
}

// Keep the key out of logs.
impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    pub data_directory: PathBuf,
    pub persist_directory: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
    pub top_k: usize,
    pub wrap_width: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
}

impl Config {
    /// Load configuration from `.env` (if present) and the process environment.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Values are parsed but not validated; call [`Config::validate`] once any
    /// command-line overrides have been applied.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            google: GoogleConfig {
                api_key: lookup("GOOGLE_API_KEY").unwrap_or_default(),
                api_base: string_or("GOOGLE_API_BASE", DEFAULT_GOOGLE_API_BASE)
                    .trim_end_matches('/')
                    .to_string(),
            },
            index: IndexConfig {
                data_directory: PathBuf::from(string_or("DATA_DIRECTORY", "Nutrition Data")),
                persist_directory: PathBuf::from(string_or("PERSIST_DIRECTORY", "db")),
                chunk_size: parse_or(&lookup, "CHUNK_SIZE", 1000)?,
                chunk_overlap: parse_or(&lookup, "CHUNK_OVERLAP", 0)?,
                embedding_model: string_or("EMBEDDING_MODEL", models::DEFAULT_EMBEDDING),
                embedding_batch_size: parse_or(&lookup, "EMBEDDING_BATCH_SIZE", 100)?,
            },
            chat: ChatConfig {
                model: string_or("CHAT_MODEL", models::DEFAULT_CHAT),
                temperature: parse_or(&lookup, "CHAT_TEMPERATURE", 0.7)?,
                max_output_tokens: match lookup("CHAT_MAX_OUTPUT_TOKENS") {
                    Some(raw) => Some(parse_value("CHAT_MAX_OUTPUT_TOKENS", &raw)?),
                    None => None,
                },
                top_k: parse_or(&lookup, "RETRIEVER_K", 5)?,
                wrap_width: parse_or(&lookup, "WRAP_WIDTH", 110)?,
            },
            retry: RetryConfig {
                max_retries: parse_or(&lookup, "LLM_MAX_RETRIES", 3)?,
            },
        })
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.index.chunk_size == 0 {
            return Err(AppError::Config("CHUNK_SIZE must be greater than zero".to_string()));
        }
        if self.index.chunk_overlap >= self.index.chunk_size {
            return Err(AppError::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.index.chunk_overlap, self.index.chunk_size
            )));
        }
        if self.index.embedding_batch_size == 0 {
            return Err(AppError::Config("EMBEDDING_BATCH_SIZE must be greater than zero".to_string()));
        }
        if self.chat.top_k == 0 {
            return Err(AppError::Config("RETRIEVER_K must be greater than zero".to_string()));
        }
        if self.chat.wrap_width == 0 {
            return Err(AppError::Config("WRAP_WIDTH must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(AppError::Config(format!(
                "CHAT_TEMPERATURE must be within 0.0..=2.0, got {}",
                self.chat.temperature
            )));
        }
        Ok(())
    }

    /// Fails when no API key is available for the hosted model calls.
    pub fn require_api_key(&self) -> AppResult<&str> {
        if self.google.api_key.trim().is_empty() {
            return Err(AppError::Config("GOOGLE_API_KEY must be set".to_string()));
        }
        Ok(&self.google.api_key)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{} has invalid value {:?}: {}", key, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn config_from(pairs: &[(&str, &str)]) -> AppResult<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_match_original_pipeline() {
        let config = assert_ok!(config_from(&[]));
        assert_eq!(config.index.data_directory, PathBuf::from("Nutrition Data"));
        assert_eq!(config.index.persist_directory, PathBuf::from("db"));
        assert_eq!(config.index.chunk_size, 1000);
        assert_eq!(config.index.chunk_overlap, 0);
        assert_eq!(config.index.embedding_model, "models/embedding-001");
        assert_eq!(config.chat.model, "gemini-1.5-pro");
        assert!((config.chat.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.chat.top_k, 5);
        assert_eq!(config.chat.wrap_width, 110);
        assert_eq!(config.chat.max_output_tokens, None);
        assert_eq!(config.google.api_base, DEFAULT_GOOGLE_API_BASE);
    }

    #[test]
    fn test_overrides() {
        let config = assert_ok!(config_from(&[
            ("CHUNK_SIZE", "500"),
            ("CHUNK_OVERLAP", "50"),
            ("RETRIEVER_K", "3"),
            ("CHAT_MAX_OUTPUT_TOKENS", "1024"),
            ("GOOGLE_API_BASE", "http://localhost:1234/"),
        ]));
        assert_eq!(config.index.chunk_size, 500);
        assert_eq!(config.index.chunk_overlap, 50);
        assert_eq!(config.chat.top_k, 3);
        assert_eq!(config.chat.max_output_tokens, Some(1024));
        assert_eq!(config.google.api_base, "http://localhost:1234");
    }

    #[test]
    fn test_malformed_number_is_an_error() {
        let err = assert_err!(config_from(&[("CHUNK_SIZE", "lots")]));
        assert!(err.to_string().contains("CHUNK_SIZE"));
    }

    fn validated(pairs: &[(&str, &str)]) -> AppResult<Config> {
        let config = config_from(pairs)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_validation() {
        assert_ok!(validated(&[]));
        assert_err!(validated(&[("CHUNK_SIZE", "0")]));
        assert_err!(validated(&[("CHUNK_SIZE", "100"), ("CHUNK_OVERLAP", "100")]));
        assert_err!(validated(&[("RETRIEVER_K", "0")]));
        assert_err!(validated(&[("WRAP_WIDTH", "0")]));
        assert_err!(validated(&[("CHAT_TEMPERATURE", "3.5")]));
    }

    #[test]
    fn test_invalid_value_can_be_overridden_before_validation() {
        let mut config = assert_ok!(config_from(&[("RETRIEVER_K", "0")]));
        assert_err!(config.validate());
        config.chat.top_k = 3;
        assert_ok!(config.validate());
    }

    #[test]
    fn test_api_key_requirement_and_redaction() {
        let config = assert_ok!(config_from(&[]));
        assert_err!(config.require_api_key());

        let config = assert_ok!(config_from(&[("GOOGLE_API_KEY", "secret-key")]));
        assert_eq!(assert_ok!(config.require_api_key()), "secret-key");
        assert!(!format!("{:?}", config).contains("secret-key"));
    }
}
