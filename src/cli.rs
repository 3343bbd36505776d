//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Art Insight - LLM-powered artwork analyzer
///
/// Sends a batch of paintings to a Gemini vision model, collects style,
/// period, insights and related artists/movements for each, and lays the
/// connections out as a force-directed relationship graph.
///
/// Examples:
///   artinsight starry_night.jpg water_lilies.png
///   artinsight ./gallery --graph graph.svg
///   artinsight ./gallery --partial --format json --output report.json
///   artinsight ./gallery --dry-run
///   artinsight --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Image files or directories to analyze
    ///
    /// Directories are searched recursively for .jpg, .jpeg and .png files.
    #[arg(value_name = "PATH", required_unless_present = "init_config")]
    pub images: Vec<PathBuf>,

    /// Gemini model to use for analysis
    ///
    /// Defaults to gemini-2.0-flash-exp or the value in .artinsight.toml.
    #[arg(short, long, env = "ARTINSIGHT_MODEL")]
    pub model: Option<String>,

    /// Gemini API base URL
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the relationship graph to this file
    #[arg(short, long, value_name = "FILE")]
    pub graph: Option<PathBuf>,

    /// Graph export format (svg, json)
    #[arg(long, default_value = "svg", value_name = "FORMAT")]
    pub graph_format: GraphFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .artinsight.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Keep successful analyses when some images fail
    ///
    /// By default any failure fails the whole batch.
    #[arg(long)]
    pub partial: bool,

    /// Per-image request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Timeout for the whole batch in seconds
    #[arg(long, value_name = "SECS")]
    pub batch_timeout: Option<u64>,

    /// Maximum simulation ticks when settling the graph layout
    #[arg(long, value_name = "TICKS")]
    pub max_ticks: Option<usize>,

    /// Dry run: scan and validate images without calling the model
    ///
    /// Shows which images would be analyzed and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .artinsight.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Export format for the relationship graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum GraphFormat {
    /// SVG drawing (default)
    #[default]
    Svg,
    /// JSON snapshot of node positions and edges
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.images.is_empty() {
            return Err("At least one image or directory is required".to_string());
        }

        // Validate API URL format (not needed for dry-run)
        if !self.dry_run {
            if let Some(ref url) = self.api_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err("API URL must start with 'http://' or 'https://'".to_string());
                }
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }
        if self.batch_timeout == Some(0) {
            return Err("Batch timeout must be at least 1 second".to_string());
        }

        if self.max_ticks == Some(0) {
            return Err("Max ticks must be at least 1".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings. `--quiet` wins
    /// over both `--verbose` and `general.verbose` from the config file.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
