//! Image-analysis oracle.
//!
//! The oracle is a remote model that turns one image into an
//! [`AnalysisResult`]. Callers hold it as an `Arc<dyn Oracle>` so the batch
//! orchestrator never depends on a concrete provider.

pub mod gemini;
pub mod parse;

pub use gemini::{GeminiOracle, OracleSettings};

use crate::error::OracleError;
use crate::models::{AnalysisResult, ImageInput};
use async_trait::async_trait;

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Model identifier, for reports and logs.
    fn model(&self) -> &str;

    /// Check that the oracle can be called at all.
    ///
    /// Runs once per batch before any image is dispatched.
    fn check_ready(&self) -> Result<(), OracleError> {
        Ok(())
    }

    /// Analyze one image.
    async fn analyze(&self, image: &ImageInput) -> Result<AnalysisResult, OracleError>;
}
