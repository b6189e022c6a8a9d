// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub extraction: ExtractionConfig,
    pub pipeline: PipelineConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub pages_per_chunk: u32,
    /// 0 dispatches every chunk at once.
    pub max_concurrent_chunks: usize,
    pub parallel_intake: usize,
    pub stale_chunk_secs: u64,
    pub max_file_size_mb: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MergeConfig {
    pub currency: String,
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PipelineConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_chunk_secs)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        (self.max_file_size_mb as u64) * 1_048_576
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LEDGER_LENS")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        if config.extraction.gemini_api_key.is_none() {
            config.extraction.gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://data/ledger_lens.db".to_string(),
                max_connections: 5,
            },
            extraction: ExtractionConfig {
                gemini_api_key: None,
                model: "gemini-2.0-flash".to_string(),
                api_base: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
                timeout_secs: 90,
                max_output_tokens: 8192,
                temperature: 0.1,
            },
            pipeline: PipelineConfig {
                pages_per_chunk: 10,
                max_concurrent_chunks: 0,
                parallel_intake: 2,
                stale_chunk_secs: 600,
                max_file_size_mb: 10,
            },
            merge: MergeConfig {
                currency: "INR".to_string(),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.pages_per_chunk == 0 {
            return Err(PipelineError::Config(
                "pages_per_chunk must be greater than 0".to_string(),
            ));
        }

        if self.extraction.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(PipelineError::Config(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.stale_chunk_secs <= self.extraction.timeout_secs {
            return Err(PipelineError::Config(format!(
                "stale_chunk_secs ({}) must exceed the extraction timeout ({})",
                self.pipeline.stale_chunk_secs, self.extraction.timeout_secs
            )));
        }

        Ok(())
    }
}
