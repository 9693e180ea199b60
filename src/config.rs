//! Configuration file support
//!
//! Loads config from ~/.themis/config.toml; every field is optional and the
//! binary resolves CLI args > env vars > config file > defaults.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Database URL
    pub database_url: Option<String>,

    /// Embeddings API
    pub embedding_base_url: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<usize>,

    /// Chat completions (keyword extraction + summarization)
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,

    /// Web search tool API
    pub web_search_url: Option<String>,
    pub web_search_api_key: Option<String>,

    /// Streaming generation (agent app)
    pub generation_base_url: Option<String>,
    pub generation_api_key: Option<String>,
    pub generation_app_id: Option<String>,

    /// Case corpus files
    pub corpus_metadata: Option<String>,
    pub corpus_vectors: Option<String>,

    /// Server bind address
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    /// Load config from ~/.themis/config.toml
    pub fn load() -> Self {
        let path = config_path();

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".themis")
        .join("config.toml")
}
