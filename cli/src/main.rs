mod catalog;
mod orchestrator;
mod source;

use catalog::JsonCatalogWriter;
use orchestrator::{Orchestrator, Report};
use std::path::PathBuf;
use tracing::{error, info};
use vsegment_common::config::Config;
use vsegment_engine::sampler::check_ffmpeg_available;

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let tracks: Vec<PathBuf> = args.map(PathBuf::from).collect();

    let config = if config_path.exists() {
        match Config::load(&config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", config_path.display());
                std::process::exit(1);
            }
        }
    } else {
        eprintln!("{} not found, using default config", config_path.display());
        Config::default()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    if tracks.is_empty() {
        error!("no tracks given; usage: vsegment [config.toml] <track>...");
        std::process::exit(2);
    }

    info!(
        tracks = tracks.len(),
        change_threshold = config.segmenter.change_threshold,
        stability_window_secs = config.segmenter.stability_window_secs,
        max_concurrent = config.jobs.max_concurrent,
        output_dir = config.output.dir,
        "starting vsegment"
    );

    // Media files need ffmpeg; image-sequence directories do not.
    check_ffmpeg_available(&config.source.ffmpeg_path).await;

    let writer = JsonCatalogWriter::new(&config.output.dir);
    let orchestrator = Orchestrator::new(config, writer);

    let mut report = Report::default();
    let jobs = orchestrator.submit_all(&tracks, &mut report).await;
    orchestrator::cancel_on_interrupt(&jobs);
    orchestrator.collect(jobs, &mut report).await;

    info!(
        written = report.written.len(),
        failed = report.failed,
        cancelled = report.cancelled,
        "done"
    );
    if !report.is_success() {
        std::process::exit(1);
    }
}
