use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cityeye::cache::TrackCache;
use cityeye::capture::{FrameSampler, FrameSource, ImageDirSource};
use cityeye::config::{self, AppConfig};
use cityeye::database::EventStore;
use cityeye::detector::VehicleClass;
use cityeye::emit;
use cityeye::llm::LlmClient;
use cityeye::pipeline::FusionEngine;
use cityeye::query_engine::QueryEngine;
use cityeye::stats_cli;
use cityeye::synthetic;

#[derive(Parser)]
#[command(name = "cityeye", version = "0.1.0")]
#[command(about = "Video detection fusion — tracked vehicles, plates and OCR into queryable events")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the fusion pipeline over a video's frames
    Ingest {
        /// Frame image directory (default: bundled demo scene)
        #[arg(long)] frames: Option<String>,
        /// Process every Nth frame
        #[arg(long)] stride: Option<u32>,
        /// Metadata JSON output path
        #[arg(long)] output: Option<String>,
    },

    /// Interactive natural-language query (text-to-SQL)
    Query,

    /// Ask a single question (non-interactive)
    Ask {
        question: String,
    },

    /// Load a metadata JSON file into the database
    Load {
        path: String,
    },

    /// Show recent events
    Recent {
        #[arg(short, long, default_value = "20")] limit: u32,
        #[arg(long)] json: bool,
    },

    /// Event statistics
    Stats(stats_cli::StatsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cityeye=info,warn")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config().unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        config::default_config()
    });

    match cli.command {
        Command::Ingest { frames, stride, output } => {
            if let Some(dir) = frames { cfg.video.frames_dir = dir; }
            if let Some(n) = stride { cfg.pipeline.frame_step = n; }
            if let Some(path) = output { cfg.output.metadata_path = path; }
            print_startup_info(&cfg);

            if cfg.video.frames_dir.is_empty() {
                tracing::info!("No frame directory configured — running the bundled demo scene");
                run_ingest(synthetic::demo_source(), &cfg)?;
            } else {
                let source = ImageDirSource::open(Path::new(&cfg.video.frames_dir), cfg.video.fps)?;
                run_ingest(source, &cfg)?;
            }
        }

        Command::Query => {
            let db = EventStore::open(&cfg.database.path)?;
            let client = LlmClient::from_config(&cfg.llm);
            let engine = QueryEngine::new(db, client);
            engine.repl().await;
        }

        Command::Ask { question } => {
            let db = EventStore::open(&cfg.database.path)?;
            let client = LlmClient::from_config(&cfg.llm);
            let engine = QueryEngine::new(db, client);
            let result = engine.ask(&question).await?;
            result.print_table();
        }

        Command::Load { path } => {
            let events = emit::read_metadata(Path::new(&path))?;
            let mut db = EventStore::open(&cfg.database.path)?;
            let count = db.replace_all(&events)?;
            println!("Loaded {} events from {} into {}", count, path, cfg.database.path);
        }

        Command::Recent { limit, json } => {
            let db = EventStore::open(&cfg.database.path)?;
            let events = db.get_recent(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                println!(
                    "{:<7} {:<7} {:>8} {:<11} {:>5} {:<8} {}",
                    "Track", "Frame", "Time", "Label", "Conf", "Color", "Plate"
                );
                println!("{}", "─".repeat(60));
                for e in events {
                    println!(
                        "{:<7} {:<7} {:>7.2}s {:<11} {:>4.0}% {:<8} {}",
                        e.track_id,
                        e.frame_id,
                        e.timestamp,
                        e.label,
                        e.confidence * 100.0,
                        e.color,
                        if e.license_plate.is_empty() { "—" } else { e.license_plate.as_str() }
                    );
                }
            }
        }

        Command::Stats(args) => {
            let db = EventStore::open(&cfg.database.path)?;
            stats_cli::print_stats(&db, &args)?;
        }
    }
    Ok(())
}

/// Sample, fuse, then persist the run to JSON and the database.
fn run_ingest<S: FrameSource>(source: S, cfg: &AppConfig) -> Result<()> {
    if cfg.detector.backend != "synthetic" {
        anyhow::bail!("unknown detector backend: {}", cfg.detector.backend);
    }
    let (vehicles, plates, ocr) = synthetic::demo_detectors();
    let mut engine = FusionEngine::new(vehicles, plates, ocr, TrackCache::new());
    let mut sampler = FrameSampler::new(source, cfg.pipeline.frame_step);
    let events = engine.run(&mut sampler);

    emit::write_metadata(Path::new(&cfg.output.metadata_path), &events)?;

    let mut db = EventStore::open(&cfg.database.path)?;
    db.replace_all(&events)?;

    println!();
    println!(
        "  {} events → {} and {}",
        events.len(),
        cfg.output.metadata_path,
        cfg.database.path
    );
    Ok(())
}

fn print_startup_info(cfg: &AppConfig) {
    let source = if cfg.video.frames_dir.is_empty() {
        "demo scene".to_string()
    } else {
        cfg.video.frames_dir.clone()
    };
    let classes: Vec<String> = VehicleClass::ALL.iter().map(|c| c.to_string()).collect();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║                     CITYEYE v0.1                         ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("  Source:    {} ({:.1} fps)", source, cfg.video.fps);
    println!("  Stride:    every {} frames", cfg.pipeline.frame_step);
    println!("  Backend:   {}", cfg.detector.backend);
    println!("  Classes:   {}", classes.join(", "));
    println!("  Metadata:  {}", cfg.output.metadata_path);
    println!("  Database:  {}", cfg.database.path);
    println!("╚══════════════════════════════════════════════════════════╝");
}
