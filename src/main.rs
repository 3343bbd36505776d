//! Art Insight - AI-powered artwork analyzer
//!
//! A CLI tool that sends a batch of paintings to a Gemini vision model,
//! writes a report of the structured analyses and lays out the shared
//! artists and movements as a force-directed relationship graph.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, invalid image, batch failure, I/O)

use anyhow::{Context, Result};
use artinsight::analysis;
use artinsight::batch::{BatchAnalyzer, BatchOutcome, FailurePolicy};
use artinsight::cli::{Args, GraphFormat, OutputFormat};
use artinsight::config::{Config, CONFIG_FILE};
use artinsight::graph::{Category, GraphSession};
use artinsight::models::{Report, ReportMetadata};
use artinsight::oracle::GeminiOracle;
use artinsight::report;
use artinsight::scanner::{ImageScanner, ScanConfig};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `general.verbose` applies
    let (mut config, load_warning) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("Art Insight v{}", env!("CARGO_PKG_VERSION"));
    match load_warning {
        Some(warning) => warn!("{}", warning),
        None => debug!("Configuration loaded"),
    }
    debug!("Images: {:?}", args.images);

    if let Err(e) = run(args, config).await {
        error!("Analysis failed: {}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .artinsight.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the model, batch policy and graph layout.");
    println!("   Set GEMINI_API_KEY in the environment rather than in the file.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow.
async fn run(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let image_scanner = ImageScanner::new(ScanConfig::from(&config.scanner));

    if args.dry_run {
        return handle_dry_run(&image_scanner, &args.images);
    }

    // Step 1: Load and validate images
    println!("🖼️  Loading images...");
    let images = image_scanner.collect_images(&args.images)?;
    let submitted = images.len();
    info!("Loaded {} image(s)", submitted);

    // Step 2: Set up the oracle
    let policy_str = match config.batch.policy {
        FailurePolicy::AllOrNothing => "All-or-nothing",
        FailurePolicy::Partial => "Partial",
    };

    println!("🤖 Initializing vision model...");
    println!("   Model: {}", config.oracle.model);
    println!("   Policy: {}", policy_str);
    println!("   Timeout: {}s per image", config.oracle.timeout_seconds);
    if let Some(secs) = config.batch.timeout_seconds {
        println!("   Batch timeout: {}s", secs);
    }

    let oracle = GeminiOracle::new(config.oracle_settings())?;
    let analyzer = BatchAnalyzer::new(Arc::new(oracle))
        .with_policy(config.batch.policy)
        .with_timeout(config.batch.timeout_seconds.map(Duration::from_secs));

    // Step 3: Analyze the batch
    println!("\n🎨 Analyzing {} artwork(s)...", submitted);
    let spinner = spinner(args.quiet, submitted);
    let outcome = analyzer.analyze(images).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let BatchOutcome { analyses, failures } = outcome?;

    for failure in &failures {
        warn!("Skipped {}: {}", failure.source, failure.error);
    }

    // Step 4: Build and save the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let report = Report {
        metadata: ReportMetadata {
            analysis_date: Utc::now(),
            model_used: analyzer.model().to_string(),
            images_submitted: submitted,
            images_analyzed: analyses.len(),
            duration_seconds: duration,
        },
        analyses,
        failures,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let output_path = PathBuf::from(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Step 5: Lay out and export the relationship graph
    if let Some(ref graph_path) = args.graph {
        println!("🕸️  Laying out relationship graph...");
        let mut session = GraphSession::new(config.graph_settings());
        let view = session.show(&report.results());
        let ticks = view.settle();
        debug!("Layout settled after {} ticks", ticks);

        let rendered = match args.graph_format {
            GraphFormat::Svg => view.render_svg(),
            GraphFormat::Json => serde_json::to_string_pretty(&view.snapshot())
                .context("Failed to serialize graph snapshot")?,
        };
        std::fs::write(graph_path, rendered)
            .with_context(|| format!("Failed to write graph to {}", graph_path.display()))?;

        let graph = view.graph();
        println!(
            "   Nodes: {} ({} styles, {} periods, {} artists, {} movements)",
            graph.nodes().len(),
            graph.count(Category::Style),
            graph.count(Category::Period),
            graph.count(Category::Artist),
            graph.count(Category::Movement)
        );
        println!("   Edges: {}", graph.edges().len());
        println!("   Saved to: {}", graph_path.display());
    }

    // Print summary
    println!("\n📊 Analysis Summary:");
    println!(
        "   Artworks analyzed: {} of {}",
        report.metadata.images_analyzed, report.metadata.images_submitted
    );
    if !report.failures.is_empty() {
        println!("   ⚠️  Failed: {}", report.failures.len());
    }
    println!(
        "   Insights: {}",
        analysis::insight_count(&report.analyses)
    );
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    Ok(())
}

/// Spinner shown while the batch is in flight.
fn spinner(quiet: bool, count: usize) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Waiting for {} analyses...", count));
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

/// Handle --dry-run: scan and validate images, print what would be sent, exit.
fn handle_dry_run(image_scanner: &ImageScanner, inputs: &[PathBuf]) -> Result<()> {
    println!("\n🔍 Dry run: scanning images (no model call)...\n");

    let scanned = image_scanner.scan(inputs)?;

    if scanned.is_empty() {
        println!("   No matching images found.");
    } else {
        println!("   Found {} images that would be analyzed:\n", scanned.len());
        for image in &scanned {
            match image_scanner.load(image) {
                Ok(input) => println!(
                    "     🖼️  {} ({}, {} bytes)",
                    input.name, input.format, image.size
                ),
                Err(e) => println!("     ❌ {}", e),
            }
        }
        println!("\n   Total: {} images", scanned.len());
    }

    println!("\n✅ Dry run complete. No model calls were made.");
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so a broken default file is returned as a
/// warning to log afterwards. An explicit `--config` that fails is an error.
fn load_config(args: &Args) -> Result<(Config, Option<String>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, None));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, None)),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => Ok((
            Config::default(),
            Some(format!("Failed to load {}: {}", CONFIG_FILE, e)),
        )),
    }
}
