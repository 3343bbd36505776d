//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.artinsight.toml` files.

use crate::batch::FailurePolicy;
use crate::graph::GraphSettings;
use crate::oracle::OracleSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the current directory.
pub const CONFIG_FILE: &str = ".artinsight.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Oracle settings.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Batch settings.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Graph layout settings.
    #[serde(default)]
    pub graph: GraphConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "artinsight_report.md".to_string()
}

/// Vision model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Gemini API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key. Usually left out of the file and supplied through
    /// `GEMINI_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-image request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_url: default_api_url(),
            api_key: None,
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_timeout() -> u64 {
    120
}

/// Batch orchestration settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// `all-or-nothing` or `partial`.
    #[serde(default)]
    pub policy: FailurePolicy,

    /// Whole-batch timeout in seconds. No limit when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Image scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Extensions picked up when walking directories.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Maximum image size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["jpg", "jpeg", "png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> usize {
    5 * 1024 * 1024 // 5MB
}

/// Relationship graph settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_width")]
    pub width: f64,

    #[serde(default = "default_height")]
    pub height: f64,

    /// Rest length of every link.
    #[serde(default = "default_link_distance")]
    pub link_distance: f64,

    /// Many-body strength; negative repels.
    #[serde(default = "default_charge")]
    pub charge: f64,

    /// Extra spacing added to node radii by the collision force.
    #[serde(default = "default_collision_padding")]
    pub collision_padding: f64,

    /// Tick cap when settling the layout for export.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            link_distance: default_link_distance(),
            charge: default_charge(),
            collision_padding: default_collision_padding(),
            max_ticks: default_max_ticks(),
        }
    }
}

fn default_width() -> f64 {
    800.0
}

fn default_height() -> f64 {
    600.0
}

fn default_link_distance() -> f64 {
    100.0
}

fn default_charge() -> f64 {
    -300.0
}

fn default_collision_padding() -> f64 {
    10.0
}

fn default_max_ticks() -> usize {
    1000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.artinsight.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. Only values
    /// the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.oracle.model = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.oracle.api_url = api_url.clone();
        }
        if let Some(ref api_key) = args.api_key {
            self.oracle.api_key = Some(api_key.clone());
        }
        if let Some(timeout) = args.timeout {
            self.oracle.timeout_seconds = timeout;
        }

        if args.partial {
            self.batch.policy = FailurePolicy::Partial;
        }
        if let Some(timeout) = args.batch_timeout {
            self.batch.timeout_seconds = Some(timeout);
        }

        if let Some(max_ticks) = args.max_ticks {
            self.graph.max_ticks = max_ticks;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.to_string_lossy().to_string();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Settings for the Gemini oracle.
    pub fn oracle_settings(&self) -> OracleSettings {
        OracleSettings {
            api_url: self.oracle.api_url.clone(),
            model_name: self.oracle.model.clone(),
            api_key: self.oracle.api_key.clone(),
            temperature: self.oracle.temperature,
            timeout_seconds: self.oracle.timeout_seconds,
        }
    }

    /// Settings for the graph view.
    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            width: self.graph.width,
            height: self.graph.height,
            link_distance: self.graph.link_distance,
            charge: self.graph.charge,
            collision_padding: self.graph.collision_padding,
            max_ticks: self.graph.max_ticks,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
