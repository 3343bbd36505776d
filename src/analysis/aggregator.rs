//! Aggregation and statistics over a batch of analyses.
//!
//! This module computes the summary figures shown in reports: how often
//! each artist or movement is cited and which references several images
//! share.

use crate::models::ImageAnalysis;
use std::collections::{HashMap, HashSet};

/// Which connection list to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Artists,
    Movements,
}

fn names(analysis: &ImageAnalysis, kind: Reference) -> &[String] {
    match kind {
        Reference::Artists => &analysis.result.connections.artists,
        Reference::Movements => &analysis.result.connections.movements,
    }
}

/// Number of images citing each name, most cited first.
///
/// A name listed twice by the same image counts once.
pub fn reference_counts(analyses: &[ImageAnalysis], kind: Reference) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for analysis in analyses {
        let unique: HashSet<&str> = names(analysis, kind)
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .collect();
        for name in unique {
            *counts.entry(name.to_string()).or_default() += 1;
        }
    }

    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

/// The `n` most cited names.
pub fn top_references(analyses: &[ImageAnalysis], kind: Reference, n: usize) -> Vec<(String, usize)> {
    let mut counts = reference_counts(analyses, kind);
    counts.truncate(n);
    counts
}

/// Names cited by more than one image.
pub fn shared_references(analyses: &[ImageAnalysis], kind: Reference) -> Vec<(String, usize)> {
    reference_counts(analyses, kind)
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .collect()
}

/// How many images fall under each style.
pub fn style_distribution(analyses: &[ImageAnalysis]) -> HashMap<String, usize> {
    let mut dist: HashMap<String, usize> = HashMap::new();

    for analysis in analyses {
        *dist.entry(analysis.result.style.clone()).or_default() += 1;
    }

    dist
}

/// Total number of insights across the batch.
pub fn insight_count(analyses: &[ImageAnalysis]) -> usize {
    analyses.iter().map(|a| a.result.insights.len()).sum()
}
