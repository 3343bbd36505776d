//! Data models for the artwork analyzer.
//!
//! This module contains the core data structures shared by the batch
//! orchestrator, the relationship graph and the report generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names an analysis result refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connections {
    /// Artists related to the work.
    pub artists: Vec<String>,
    /// Art movements related to the work.
    pub movements: Vec<String>,
}

/// Structured interpretation of a single artwork.
///
/// Every field is required when deserializing; a response missing any of
/// them, or carrying a field of the wrong shape, is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Artistic style, e.g. "Impressionism".
    pub style: String,
    /// Historical period, e.g. "19th century".
    pub period: String,
    /// Observations about composition, technique and meaning, in display order.
    pub insights: Vec<String>,
    /// Related artists and movements.
    pub connections: Connections,
}

/// Supported image encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Sniff the format from the leading magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else {
            None
        }
    }

    /// MIME type sent to the oracle.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Jpeg => write!(f, "JPEG"),
            ImageFormat::Png => write!(f, "PNG"),
        }
    }
}

/// One image submitted for analysis. Each batch task owns its own copy.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Display name (usually the path the image was loaded from).
    pub name: String,
    /// Detected encoding.
    pub format: ImageFormat,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(name: impl Into<String>, format: ImageFormat, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            format,
            bytes,
        }
    }
}

/// A successful analysis paired with the image it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnalysis {
    /// Position of the image in the submitted batch.
    pub index: usize,
    /// Name of the source image.
    pub source: String,
    /// The oracle's interpretation.
    pub result: AnalysisResult,
}

/// A failed analysis, reported only in partial-success mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFailure {
    /// Position of the image in the submitted batch.
    pub index: usize,
    /// Name of the source image.
    pub source: String,
    /// Human-readable failure reason.
    pub error: String,
}

/// Metadata about an analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Name of the oracle model used.
    pub model_used: String,
    /// Number of images submitted.
    pub images_submitted: usize,
    /// Number of images analyzed successfully.
    pub images_analyzed: usize,
    /// Duration of the batch in seconds.
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Successful analyses in input order.
    pub analyses: Vec<ImageAnalysis>,
    /// Images that failed (partial-success mode only).
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<ImageFailure>,
}

impl Report {
    /// The bare results, in input order.
    pub fn results(&self) -> Vec<AnalysisResult> {
        self.analyses.iter().map(|a| a.result.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_image_format() {
        assert_eq!(
            ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::detect(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::detect(b"GIF89a"), None);
        assert_eq!(ImageFormat::detect(&[]), None);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(ImageFormat::Png.mime_type(), "image/png");
    }

    #[test]
    fn test_analysis_result_requires_every_field() {
        let missing_connections = r#"{"style": "Cubism", "period": "1910s", "insights": []}"#;
        assert!(serde_json::from_str::<AnalysisResult>(missing_connections).is_err());

        let wrong_shape = r#"{
            "style": "Cubism",
            "period": "1910s",
            "insights": "fragmented planes",
            "connections": {"artists": [], "movements": []}
        }"#;
        assert!(serde_json::from_str::<AnalysisResult>(wrong_shape).is_err());

        let complete = r#"{
            "style": "Cubism",
            "period": "1910s",
            "insights": ["fragmented planes"],
            "connections": {"artists": ["Picasso"], "movements": ["Cubism"]}
        }"#;
        let result: AnalysisResult = serde_json::from_str(complete).unwrap();
        assert_eq!(result.connections.artists, vec!["Picasso"]);
    }
}
