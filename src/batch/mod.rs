//! Batch orchestration.
//!
//! Fans one oracle call per image out onto its own task, waits for every
//! task to settle, then applies the batch failure policy.

use crate::error::{BatchError, OracleError};
use crate::models::{ImageAnalysis, ImageFailure, ImageInput};
use crate::oracle::Oracle;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

/// How a batch reacts to individual failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Any failed image fails the whole batch and no results are returned.
    #[default]
    AllOrNothing,
    /// Successful images are returned alongside the failures, unless every
    /// image failed.
    Partial,
}

/// Outcome of a successful batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Successful analyses, in input order.
    pub analyses: Vec<ImageAnalysis>,
    /// Failed images. Always empty under [`FailurePolicy::AllOrNothing`].
    pub failures: Vec<ImageFailure>,
}

/// Aborts the batch tasks when dropped, so a batch future abandoned by the
/// timeout takes its in-flight calls down with it.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Runs batches of images against an oracle.
pub struct BatchAnalyzer {
    oracle: Arc<dyn Oracle>,
    policy: FailurePolicy,
    timeout: Option<Duration>,
}

impl BatchAnalyzer {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            policy: FailurePolicy::default(),
            timeout: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound the whole batch. In-flight calls are aborted on expiry.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        self.oracle.model()
    }

    /// Analyze every image and apply the failure policy.
    pub async fn analyze(&self, images: Vec<ImageInput>) -> Result<BatchOutcome, BatchError> {
        if images.is_empty() {
            return Err(BatchError::Empty);
        }

        self.oracle
            .check_ready()
            .map_err(|e| BatchError::Configuration(e.to_string()))?;

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(images))
                .await
                .map_err(|_| {
                    error!("Batch timed out after {}s", limit.as_secs());
                    BatchError::TimedOut(limit.as_secs())
                })?,
            None => self.run(images).await,
        }
    }

    async fn run(&self, images: Vec<ImageInput>) -> Result<BatchOutcome, BatchError> {
        let total = images.len();
        info!(
            "Dispatching {} image(s) to {} concurrently",
            total,
            self.oracle.model()
        );

        let mut sources = Vec::with_capacity(total);
        let handles: Vec<_> = images
            .into_iter()
            .enumerate()
            .map(|(index, image)| {
                sources.push(image.name.clone());
                let oracle = Arc::clone(&self.oracle);
                tokio::spawn(async move {
                    let outcome = oracle.analyze(&image).await;
                    debug!("Image {} ({}) settled", index + 1, image.name);
                    outcome
                })
            })
            .collect();
        let _guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());

        // join_all keeps input order and waits for every task.
        let settled = join_all(handles).await;

        let mut analyses = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (index, (joined, source)) in settled.into_iter().zip(sources).enumerate() {
            let outcome = joined.unwrap_or_else(|e| {
                Err(OracleError::Transport(format!("analysis task aborted: {}", e)))
            });

            match outcome {
                Ok(result) => analyses.push(ImageAnalysis {
                    index,
                    source,
                    result,
                }),
                Err(e) => {
                    warn!("Error analyzing image {} ({}): {}", index + 1, source, e);
                    failures.push(ImageFailure {
                        index,
                        source,
                        error: e.to_string(),
                    });
                }
            }
        }

        let failed = failures.len();
        let all_or_nothing = self.policy == FailurePolicy::AllOrNothing;

        if failed > 0 && (all_or_nothing || failed == total) {
            error!("Batch failed: {} of {} image(s) failed", failed, total);
            return Err(BatchError::Failed {
                failed,
                total,
                detail: failures[0].error.clone(),
            });
        }

        info!(
            "Batch complete: {} analyzed, {} failed",
            analyses.len(),
            failed
        );
        Ok(BatchOutcome { analyses, failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisResult, ImageFormat};
    use crate::oracle::parse::parse_analysis;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Instant};
    use tokio_test::{assert_err, assert_ok};

    /// Fake oracle answering from a script keyed by image name.
    struct ScriptedOracle {
        script: HashMap<String, (u64, Result<String, String>)>,
        started: AtomicUsize,
        finished: AtomicUsize,
        ready: bool,
    }

    impl ScriptedOracle {
        fn new() -> Self {
            Self {
                script: HashMap::new(),
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
                ready: true,
            }
        }

        fn respond(mut self, name: &str, delay_ms: u64, raw: &str) -> Self {
            self.script
                .insert(name.to_string(), (delay_ms, Ok(raw.to_string())));
            self
        }

        fn fail(mut self, name: &str, delay_ms: u64, message: &str) -> Self {
            self.script
                .insert(name.to_string(), (delay_ms, Err(message.to_string())));
            self
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        fn model(&self) -> &str {
            "scripted"
        }

        fn check_ready(&self) -> Result<(), OracleError> {
            if self.ready {
                Ok(())
            } else {
                Err(OracleError::Configuration("no key".to_string()))
            }
        }

        async fn analyze(&self, image: &ImageInput) -> Result<AnalysisResult, OracleError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let (delay, outcome) = self
                .script
                .get(&image.name)
                .cloned()
                .unwrap_or((0, Err("unscripted image".to_string())));
            sleep(Duration::from_millis(delay)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            match outcome {
                Ok(raw) => parse_analysis(&raw),
                Err(message) => Err(OracleError::Transport(message)),
            }
        }
    }

    fn analysis_json(style: &str, artist: &str) -> String {
        format!(
            r#"{{"style": "{}", "period": "19th century", "insights": ["note"],
                "connections": {{"artists": ["{}"], "movements": ["Impressionism"]}}}}"#,
            style, artist
        )
    }

    fn image(name: &str) -> ImageInput {
        ImageInput::new(name, ImageFormat::Jpeg, vec![0xFF, 0xD8, 0xFF, 0x00])
    }

    fn images(names: &[&str]) -> Vec<ImageInput> {
        names.iter().map(|n| image(n)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_input_order() {
        // Slowest image first so completion order is reversed.
        let oracle = ScriptedOracle::new()
            .respond("a.jpg", 300, &analysis_json("A", "Monet"))
            .respond("b.jpg", 200, &analysis_json("B", "Renoir"))
            .respond("c.jpg", 100, &analysis_json("C", "Degas"));
        let analyzer = BatchAnalyzer::new(Arc::new(oracle));

        let outcome = analyzer
            .analyze(images(&["a.jpg", "b.jpg", "c.jpg"]))
            .await
            .unwrap();

        let styles: Vec<_> = outcome
            .analyses
            .iter()
            .map(|a| a.result.style.as_str())
            .collect();
        assert_eq!(styles, vec!["A", "B", "C"]);
        let indices: Vec<_> = outcome.analyses.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_run_concurrently() {
        let oracle = ScriptedOracle::new()
            .respond("a.jpg", 1000, &analysis_json("A", "Monet"))
            .respond("b.jpg", 1000, &analysis_json("B", "Monet"))
            .respond("c.jpg", 1000, &analysis_json("C", "Monet"));
        let analyzer = BatchAnalyzer::new(Arc::new(oracle));

        let start = Instant::now();
        assert_ok!(analyzer.analyze(images(&["a.jpg", "b.jpg", "c.jpg"])).await);
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(2000), "took {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_json_response_fails_whole_batch() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .respond("1.jpg", 50, &analysis_json("A", "Monet"))
                .respond("2.jpg", 10, "Sorry, I can't tell what this painting is.")
                .respond("3.jpg", 200, &analysis_json("C", "Degas")),
        );
        let analyzer = BatchAnalyzer::new(oracle.clone());

        let err = analyzer
            .analyze(images(&["1.jpg", "2.jpg", "3.jpg"]))
            .await
            .unwrap_err();

        match err {
            BatchError::Failed { failed, total, .. } => {
                assert_eq!(failed, 1);
                assert_eq!(total, 3);
            }
            other => panic!("expected batch failure, got {:?}", other),
        }
        // The early failure did not cancel the slower calls.
        assert_eq!(oracle.finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_fails_whole_batch() {
        let oracle = ScriptedOracle::new()
            .respond("a.jpg", 0, &analysis_json("A", "Monet"))
            .fail("b.jpg", 0, "connection refused");
        let analyzer = BatchAnalyzer::new(Arc::new(oracle));

        let err = assert_err!(analyzer.analyze(images(&["a.jpg", "b.jpg"])).await);
        assert!(err.to_string().contains("Failed to analyze images"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_partial_policy_returns_successes() {
        let oracle = ScriptedOracle::new()
            .respond("a.jpg", 0, &analysis_json("A", "Monet"))
            .respond("b.jpg", 0, "{\"style\": \"B\"")
            .respond("c.jpg", 0, &analysis_json("C", "Degas"));
        let analyzer = BatchAnalyzer::new(Arc::new(oracle)).with_policy(FailurePolicy::Partial);

        let outcome = analyzer
            .analyze(images(&["a.jpg", "b.jpg", "c.jpg"]))
            .await
            .unwrap();

        let indices: Vec<_> = outcome.analyses.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].source, "b.jpg");
    }

    #[tokio::test]
    async fn test_partial_policy_fails_when_everything_fails() {
        let oracle = ScriptedOracle::new()
            .fail("a.jpg", 0, "boom")
            .fail("b.jpg", 0, "boom");
        let analyzer = BatchAnalyzer::new(Arc::new(oracle)).with_policy(FailurePolicy::Partial);

        let err = assert_err!(analyzer.analyze(images(&["a.jpg", "b.jpg"])).await);
        assert!(matches!(err, BatchError::Failed { failed: 2, total: 2, .. }));
    }

    #[tokio::test]
    async fn test_configuration_failure_dispatches_nothing() {
        let mut scripted = ScriptedOracle::new().respond("a.jpg", 0, &analysis_json("A", "Monet"));
        scripted.ready = false;
        let oracle = Arc::new(scripted);
        let analyzer = BatchAnalyzer::new(oracle.clone());

        let err = assert_err!(analyzer.analyze(images(&["a.jpg"])).await);
        assert!(matches!(err, BatchError::Configuration(_)));
        assert_eq!(oracle.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let analyzer = BatchAnalyzer::new(Arc::new(ScriptedOracle::new()));
        let err = assert_err!(analyzer.analyze(Vec::new()).await);
        assert!(matches!(err, BatchError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_timeout() {
        let oracle = ScriptedOracle::new().respond("slow.jpg", 10_000, &analysis_json("A", "Monet"));
        let analyzer =
            BatchAnalyzer::new(Arc::new(oracle)).with_timeout(Some(Duration::from_secs(1)));

        let err = assert_err!(analyzer.analyze(images(&["slow.jpg"])).await);
        assert!(matches!(err, BatchError::TimedOut(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_timeout_aborts_in_flight_calls() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .respond("slow.jpg", 10_000, &analysis_json("A", "Monet"))
                .respond("slower.jpg", 15_000, &analysis_json("B", "Degas")),
        );
        let analyzer =
            BatchAnalyzer::new(oracle.clone()).with_timeout(Some(Duration::from_secs(1)));

        let err = assert_err!(analyzer.analyze(images(&["slow.jpg", "slower.jpg"])).await);
        assert!(matches!(err, BatchError::TimedOut(1)));

        // Well past both delays; an abandoned call would have finished by now.
        sleep(Duration::from_secs(20)).await;
        assert_eq!(oracle.started.load(Ordering::SeqCst), 2);
        assert_eq!(oracle.finished.load(Ordering::SeqCst), 0);
    }
}
