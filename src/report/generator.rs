//! Markdown and JSON report generation.
//!
//! This module turns a batch of analyses into a readable report: one card
//! per image followed by a summary of the references the images share.

use crate::analysis::{insight_count, shared_references, style_distribution, top_references, Reference};
use crate::models::{ImageAnalysis, ImageFailure, Report, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Art Insight Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.analyses));
    output.push_str(&generate_analyses_section(&report.analyses));
    output.push_str(&generate_failures_section(&report.failures));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!(
        "- **Images Analyzed:** {} of {}\n",
        metadata.images_analyzed, metadata.images_submitted
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_summary_section(analyses: &[ImageAnalysis]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "{} artwork(s), {} insight(s).\n\n",
        analyses.len(),
        insight_count(analyses)
    ));

    let styles = style_distribution(analyses);
    if !styles.is_empty() {
        section.push_str("### Styles\n\n");
        section.push_str("| Style | Artworks |\n");
        section.push_str("|:---|:---:|\n");

        let mut styles: Vec<_> = styles.into_iter().collect();
        styles.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (style, count) in styles {
            section.push_str(&format!("| {} | {} |\n", table_cell(&style), count));
        }
        section.push('\n');
    }

    for (title, kind) in [
        ("Most Referenced Artists", Reference::Artists),
        ("Most Referenced Movements", Reference::Movements),
    ] {
        let top = top_references(analyses, kind, 5);
        if top.is_empty() {
            continue;
        }
        section.push_str(&format!("### {}\n\n", title));
        section.push_str("| Name | Artworks |\n");
        section.push_str("|:---|:---:|\n");
        for (name, count) in top {
            section.push_str(&format!("| {} | {} |\n", table_cell(&name), count));
        }
        section.push('\n');
    }

    let shared: Vec<String> = [Reference::Artists, Reference::Movements]
        .into_iter()
        .flat_map(|kind| shared_references(analyses, kind))
        .map(|(name, count)| format!("{} ({})", name, count))
        .collect();
    if !shared.is_empty() {
        section.push_str(&format!("**Shared references:** {}\n\n", shared.join(", ")));
    }

    section
}

/// Escape text for a Markdown table cell.
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn generate_analyses_section(analyses: &[ImageAnalysis]) -> String {
    let mut section = String::new();

    section.push_str("## Artworks\n\n");

    if analyses.is_empty() {
        section.push_str("No artworks were analyzed.\n\n");
        return section;
    }

    for analysis in analyses {
        section.push_str(&generate_analysis_block(analysis));
    }

    section
}

fn generate_analysis_block(analysis: &ImageAnalysis) -> String {
    let mut block = String::new();
    let result = &analysis.result;

    block.push_str(&format!(
        "### {}. {}\n\n",
        analysis.index + 1,
        analysis.source
    ));
    block.push_str(&format!("**Style:** {}  \n", result.style));
    block.push_str(&format!("**Period:** {}\n\n", result.period));

    if !result.insights.is_empty() {
        block.push_str("**Insights:**\n\n");
        for insight in &result.insights {
            block.push_str(&format!("- {}\n", insight));
        }
        block.push('\n');
    }

    if !result.connections.artists.is_empty() {
        block.push_str(&format!(
            "**Related Artists:** {}\n\n",
            result.connections.artists.join(", ")
        ));
    }
    if !result.connections.movements.is_empty() {
        block.push_str(&format!(
            "**Art Movements:** {}\n\n",
            result.connections.movements.join(", ")
        ));
    }

    block.push_str("---\n\n");

    block
}

fn generate_failures_section(failures: &[ImageFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Failed Images\n\n");
    for failure in failures {
        section.push_str(&format!(
            "- **{}. {}**: {}\n",
            failure.index + 1,
            failure.source,
            failure.error
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    "---\n\n*Report generated by Art Insight*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
