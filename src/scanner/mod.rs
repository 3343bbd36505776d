//! Image intake.
//!
//! This module turns the paths given on the command line into a list of
//! validated images: directories are walked for matching extensions and
//! every selected file is checked for size and sniffed for its format.

use crate::models::{ImageFormat, ImageInput};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for image scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions picked up when walking a directory (e.g., ["jpg", "png"])
    pub extensions: Vec<String>,
    /// Maximum image size in bytes
    pub max_file_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg", "jpeg", "png"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_file_size: 5 * 1024 * 1024, // 5MB
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            max_file_size: config.max_file_size,
        }
    }
}

/// A file selected for analysis, before it is read.
#[derive(Debug, Clone)]
pub struct ScannedImage {
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl ScannedImage {
    /// Display name used in reports and logs.
    pub fn name(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// Scanner for discovering and loading images.
pub struct ImageScanner {
    config: ScanConfig,
}

impl ImageScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Resolve input paths to the list of image files, in input order.
    ///
    /// Explicit files are kept whatever their extension; directories
    /// contribute their matching files sorted by path.
    pub fn scan(&self, inputs: &[PathBuf]) -> Result<Vec<ScannedImage>> {
        let mut images = Vec::new();

        for input in inputs {
            if input.is_dir() {
                self.walk_dir(input, &mut images)?;
            } else if input.is_file() {
                images.push(self.stat(input)?);
            } else {
                bail!("Input not found: {}", input.display());
            }
        }

        Ok(images)
    }

    /// Scan, then read and validate every image.
    ///
    /// Fails on the first oversized or unrecognised file so that nothing is
    /// sent to the oracle unless the whole batch is acceptable.
    pub fn collect_images(&self, inputs: &[PathBuf]) -> Result<Vec<ImageInput>> {
        let scanned = self.scan(inputs)?;
        let mut images = Vec::with_capacity(scanned.len());

        for image in scanned {
            images.push(self.load(&image)?);
        }

        Ok(images)
    }

    /// Read one image and check its size and format.
    pub fn load(&self, image: &ScannedImage) -> Result<ImageInput> {
        if image.size > self.config.max_file_size as u64 {
            bail!(
                "{} is too large ({} bytes, limit {} bytes)",
                image.path.display(),
                image.size,
                self.config.max_file_size
            );
        }

        let bytes = fs::read(&image.path)
            .with_context(|| format!("Failed to read image: {}", image.path.display()))?;

        let Some(format) = ImageFormat::detect(&bytes) else {
            bail!("{} is not a JPEG or PNG image", image.path.display());
        };

        debug!("Loaded {} ({}, {} bytes)", image.path.display(), format, bytes.len());
        Ok(ImageInput::new(image.name(), format, bytes))
    }

    /// Check if a path has one of the configured extensions.
    pub fn matches(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        self.config.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    }

    fn stat(&self, path: &Path) -> Result<ScannedImage> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Cannot access {}", path.display()))?;

        Ok(ScannedImage {
            path: path.to_path_buf(),
            size: metadata.len(),
        })
    }

    fn walk_dir(&self, dir: &Path, images: &mut Vec<ScannedImage>) -> Result<()> {
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.matches(entry.path()) {
                        images.push(self.stat(entry.path())?);
                    }
                }
                Err(e) => {
                    warn!("Error accessing entry: {}", e);
                }
            }
        }

        Ok(())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
