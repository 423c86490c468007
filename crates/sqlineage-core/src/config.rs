//! Configuration schema (sqlineage.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Traversal direction for lineage queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Follow edges forward: what consumes this object's data
    Downstream,

    /// Follow edges backward: what produced this object's data
    Upstream,
}

impl Default for Direction {
    fn default() -> Self {
        Self::Downstream
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Downstream => write!(f, "DOWNSTREAM"),
            Self::Upstream => write!(f, "UPSTREAM"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "downstream" | "down" => Ok(Self::Downstream),
            "upstream" | "up" => Ok(Self::Upstream),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown direction '{}', expected upstream or downstream",
                other
            ))),
        }
    }
}

/// Where object definitions come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Catalog CSV exports, read in order
    #[serde(default = "default_source_files")]
    pub files: Vec<PathBuf>,

    /// Catalog `ObjectType` values to extract
    #[serde(default = "default_object_types")]
    pub object_types: Vec<String>,

    /// Schemas to keep (empty keeps all)
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Databases in order of preference when an object exists in several
    #[serde(default)]
    pub preferred_databases: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            files: default_source_files(),
            object_types: default_object_types(),
            schemas: Vec::new(),
            preferred_databases: Vec::new(),
        }
    }
}

fn default_source_files() -> Vec<PathBuf> {
    vec![PathBuf::from("object_definitions.csv")]
}

fn default_object_types() -> Vec<String> {
    vec!["SQL_STORED_PROCEDURE".to_string(), "VIEW".to_string()]
}

/// Generation service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum requests in flight at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Prompt template file (built-in template when unset)
    #[serde(default)]
    pub prompt_template: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_concurrent_requests: default_max_concurrent_requests(),
            timeout_secs: default_timeout_secs(),
            prompt_template: None,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5-coder:14b".to_string()
}

fn default_max_concurrent_requests() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    600
}

/// Artifact output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one artifact per object
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("lineage_outputs")
}

/// Lineage query defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Default traversal direction
    #[serde(default)]
    pub direction: Direction,

    /// Where `trace` writes its HTML diagram
    #[serde(default = "default_html_output")]
    pub html_output: PathBuf,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            html_output: default_html_output(),
        }
    }
}

fn default_html_output() -> PathBuf {
    PathBuf::from("lineage_visualization.html")
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Object definition source
    #[serde(default)]
    pub source: SourceConfig,

    /// Generation service
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Artifact output
    #[serde(default)]
    pub output: OutputConfig,

    /// Lineage queries
    #[serde(default)]
    pub graph: GraphConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            generation: GenerationConfig::default(),
            output: OutputConfig::default(),
            graph: GraphConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Reject settings the extractor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue(
                "generation.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "generation.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.generation.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue("generation.model is empty".to_string()));
        }
        Ok(())
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Absolute artifact directory
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output.dir)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}
