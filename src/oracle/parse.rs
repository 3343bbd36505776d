//! Oracle output parsing and validation.

use crate::error::OracleError;
use crate::models::AnalysisResult;
use tracing::warn;

/// Strip a markdown code fence wrapped around a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse raw oracle text into an [`AnalysisResult`].
///
/// Only a surrounding code fence is tolerated. Prose around the payload,
/// truncated JSON, missing fields, wrongly typed fields and blank
/// `style`/`period` values are all validation failures.
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult, OracleError> {
    let payload = strip_code_blocks(raw);

    let mut result: AnalysisResult = serde_json::from_str(payload).map_err(|e| {
        warn!("Failed to parse oracle response ({}): {}", e, raw);
        OracleError::Validation {
            reason: e.to_string(),
            raw: raw.to_string(),
        }
    })?;

    result.style = result.style.trim().to_string();
    result.period = result.period.trim().to_string();

    for (field, value) in [("style", &result.style), ("period", &result.period)] {
        if value.is_empty() {
            warn!("Oracle response has an empty '{}' field: {}", field, raw);
            return Err(OracleError::Validation {
                reason: format!("field '{}' is empty", field),
                raw: raw.to_string(),
            });
        }
    }

    Ok(result)
}
