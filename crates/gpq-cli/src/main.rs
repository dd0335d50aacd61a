//! Command-line interface for gpq, a viewport-clipped GeoParquet downloader.
//!
//! This binary is the host application for the [`gpq_core`] engine: it
//! collects dataset URLs and destinations, validates sources against the
//! preset catalog, queues the downloads, and renders the engine's event
//! stream as terminal output.
//!
//! # Architecture
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for
//! structured logging. Downloads run on a blocking task while the event
//! channel is drained asynchronously, so progress streams while the engine
//! works.
//!
//! # Available Commands
//!
//! - `download` - Clip one or more datasets to an extent and save them
//! - `sources` - List the preset dataset catalog
//! - `formats` - List supported output formats

use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use gpq_core::catalog::{self, Catalog};
use gpq_core::{DownloadError, Extent};

mod display;

#[derive(Parser)]
#[command(
    name = "gpq",
    version,
    about = "Viewport-clipped downloads from remote GeoParquet datasets",
    long_about = "gpq clips large remote GeoParquet datasets to a bounding box through an \n\
                  embedded analytical SQL engine and saves the result in GIS-friendly formats."
)]
/// Command-line arguments and options for the gpq CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output, including every SQL query.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the gpq CLI.
#[derive(Subcommand)]
enum Commands {
    /// Downloads the subset of one or more datasets inside an extent.
    Download(DownloadArgs),

    /// Lists the preset dataset catalog and its trust flags.
    Sources,

    /// Lists supported output formats and their capabilities.
    Formats,
}

/// Arguments for the `download` subcommand.
#[derive(Args)]
struct DownloadArgs {
    /// Dataset URL (http(s)://, s3://, file:// or hf://). Repeat to queue
    /// several downloads.
    #[arg(long, value_name = "URL")]
    url: Vec<String>,

    /// Preset catalog entry as `<source>/<key>`, e.g. `overture/buildings`.
    /// Repeat to queue several downloads.
    #[arg(long, value_name = "SOURCE/KEY")]
    preset: Vec<String>,

    /// Base layer type for the `overture/base` preset
    /// (infrastructure, land, land_cover, land_use, water, bathymetry).
    #[arg(long, value_name = "SUBTYPE")]
    base_subtype: Option<String>,

    /// Viewport extent as `xmin,ymin,xmax,ymax` in the source CRS.
    #[arg(long, value_name = "BBOX")]
    bbox: String,

    /// Coordinate reference system of the extent.
    #[arg(long, value_name = "CRS", default_value = "EPSG:4326")]
    crs: String,

    /// Destination file, one per dataset in order; the extension selects
    /// the output format.
    #[arg(short, long, value_name = "PATH")]
    output: Vec<PathBuf>,

    /// Write large GeoJSON output without suspending on the size estimate.
    #[arg(long)]
    accept_large_geojson: bool,

    /// Proceed with the slower geometry-intersection filter when a dataset
    /// has no bbox covering column.
    #[arg(long)]
    allow_full_scan: bool,
}

/// Entry point for the gpq command-line interface.
///
/// # Errors
///
/// Returns an error if command execution fails or if the logging system
/// cannot be initialized.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity flags
    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Download(args) => {
            info!("Starting download queue");
            handle_download(args).await?;
        },
        Commands::Sources => handle_sources(),
        Commands::Formats => handle_formats(),
    }

    Ok(())
}

fn handle_sources() {
    let catalog = Catalog::builtin();
    println!("\nPreset datasets:\n");
    println!("{}", display::sources_table(&catalog));
}

fn handle_formats() {
    println!("\nSupported output formats:\n");
    println!("{}", display::formats_table());
}

/// Parse `xmin,ymin,xmax,ymax` into an extent.
#[cfg_attr(not(feature = "duckdb"), allow(dead_code))]
fn parse_bbox(raw: &str) -> Result<Extent> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| anyhow!("--bbox must be four comma-separated numbers"))?;
    if parts.len() != 4 {
        bail!("--bbox must be xmin,ymin,xmax,ymax");
    }
    Ok(Extent::new(parts[0], parts[1], parts[2], parts[3]))
}

/// Reject dataset URLs with schemes the engine cannot read.
#[cfg_attr(not(feature = "duckdb"), allow(dead_code))]
fn check_dataset_url(raw: &str) -> std::result::Result<(), DownloadError> {
    const ACCEPTED_SCHEMES: [&str; 5] = ["http", "https", "s3", "file", "hf"];

    let parsed = url::Url::parse(raw).map_err(|e| DownloadError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if ACCEPTED_SCHEMES.contains(&parsed.scheme()) {
        Ok(())
    } else {
        Err(DownloadError::InvalidUrl {
            url: raw.to_string(),
            reason: format!(
                "URL must start with http://, https://, s3://, hf:// or file://, got '{}://'",
                parsed.scheme()
            ),
        })
    }
}

/// Expand a `<source>/<key>` preset spec into a concrete dataset URL.
#[cfg_attr(not(feature = "duckdb"), allow(dead_code))]
fn resolve_preset(
    catalog: &Catalog,
    spec: &str,
    base_subtype: Option<&str>,
) -> Result<String> {
    let (source, key) = spec
        .split_once('/')
        .ok_or_else(|| anyhow!("--preset takes <source>/<key>, e.g. overture/buildings"))?;
    let preset = catalog
        .get(source, key)
        .ok_or_else(|| anyhow!("unknown preset '{spec}'; run `gpq-cli sources` for the list"))?;
    let subtype = if source == "overture" {
        Some(catalog::overture_subtype(key, base_subtype))
    } else {
        None
    };
    preset
        .resolve_url(subtype.as_deref())
        .ok_or_else(|| anyhow!("preset '{spec}' declares no URL"))
}

#[cfg_attr(not(feature = "duckdb"), allow(dead_code))]
fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Derive a display label from an Overture release URL.
#[cfg_attr(not(feature = "duckdb"), allow(dead_code))]
fn overture_layer_label(url: &str) -> Option<String> {
    if !url.contains("overture") {
        return None;
    }
    let theme = url.split("theme=").nth(1)?.split('/').next()?;
    if theme == "base" {
        let subtype = url.split("type=").nth(1)?.split('/').next()?;
        Some(format!(
            "Overture {} - {}",
            title_case(theme),
            title_case(subtype)
        ))
    } else {
        Some(format!("Overture {}", title_case(theme)))
    }
}

#[cfg(not(feature = "duckdb"))]
async fn handle_download(_args: DownloadArgs) -> Result<()> {
    bail!(
        "this build has no engine backend; rebuild with `--features duckdb` to download data"
    )
}

#[cfg(feature = "duckdb")]
async fn handle_download(args: DownloadArgs) -> Result<()> {
    use gpq_core::engine::{DuckDbFactory, prepare_remote_access};
    use gpq_core::validate::{ValidationOutcome, ValidationReport, validate};
    use gpq_core::{
        Crs, DownloadRequest, DownloadSequencer, EventSender, JobEvent, KillSwitch,
        SequencerState, SizeWarningChoice,
    };
    use tracing::warn;

    let catalog = Catalog::builtin();
    let extent = parse_bbox(&args.bbox)?;
    let crs = Crs::parse(&args.crs).ok_or_else(|| anyhow!("unrecognized CRS '{}'", args.crs))?;
    let factory = DuckDbFactory;

    let mut inputs: Vec<String> = Vec::new();
    for raw in &args.url {
        check_dataset_url(raw).map_err(|e| anyhow!(e.user_message()))?;
        inputs.push(raw.clone());
    }
    for spec in &args.preset {
        inputs.push(resolve_preset(&catalog, spec, args.base_subtype.as_deref())?);
    }
    if inputs.is_empty() {
        bail!("nothing to download; pass --url or --preset");
    }
    if inputs.len() != args.output.len() {
        bail!(
            "got {} dataset(s) but {} --output path(s)",
            inputs.len(),
            args.output.len()
        );
    }

    let (events, mut rx) = EventSender::channel();

    // Collect every request up front so the queue runs uninterrupted.
    let mut sequencer = DownloadSequencer::new(events.clone(), KillSwitch::new());
    for (dataset_url, output) in inputs.into_iter().zip(args.output.iter()) {
        let report = if catalog.needs_validation(&dataset_url) {
            let outcome = {
                let url = dataset_url.clone();
                let catalog = catalog.clone();
                let events = events.clone();
                tokio::task::spawn_blocking(move || -> gpq_core::Result<ValidationOutcome> {
                    let mut engine = factory.connect()?;
                    prepare_remote_access(engine.as_mut())?;
                    validate(engine.as_mut(), &url, &catalog, &events)
                })
                .await?
            };
            match outcome {
                Ok(ValidationOutcome::Ready(report)) => report,
                Ok(ValidationOutcome::NeedsConfirmation { schema }) => {
                    if args.allow_full_scan {
                        warn!(
                            "{dataset_url} has no bbox column; using a geometry \
                             intersection filter, which is slower"
                        );
                        ValidationReport::without_bbox(Some(schema))
                    } else {
                        println!(
                            "Skipping {dataset_url}: no bbox column detected, so downloads \
                             will be slower. Pass --allow-full-scan to proceed anyway."
                        );
                        continue;
                    }
                },
                Err(e) => {
                    eprintln!("Error: {}", e.user_message());
                    continue;
                },
            }
        } else {
            ValidationReport::trusted()
        };

        let mut request =
            DownloadRequest::new(&dataset_url, extent, crs.clone(), output.clone(), report);
        if let Some(label) = overture_layer_label(&dataset_url) {
            request = request.with_label(label);
        }
        request.size_warning_accepted = args.accept_large_geojson;
        sequencer.enqueue(request);
    }
    drop(events);

    if sequencer.is_empty() {
        bail!("no dataset passed validation; nothing downloaded");
    }

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                JobEvent::Progress(message) => println!("{message}"),
                JobEvent::Info(message) => println!("{message}"),
                JobEvent::Error(message) => eprintln!("Error: {message}"),
                JobEvent::FileSizeWarning(estimated_mb) => {
                    println!("Warning: estimated GeoJSON size is {estimated_mb:.0} MB");
                },
                JobEvent::RequestLoad(path) => {
                    println!("Saved {}; load it in your GIS as a layer.", path.display());
                },
                JobEvent::Completed => {},
            }
        }
    });

    let mut seq = sequencer;
    loop {
        let handle = tokio::task::spawn_blocking(move || {
            let mut seq = seq;
            let state = seq.run(&factory);
            (state, seq)
        });
        let (state, returned) = handle.await?;
        seq = returned;
        match state {
            SequencerState::Suspended { estimated_mb } => {
                println!(
                    "Skipping: estimated GeoJSON size is {estimated_mb:.0} MB. Choose \
                     FlatGeobuf, GeoPackage or GeoParquet instead, or rerun with \
                     --accept-large-geojson."
                );
                seq.resolve_size_warning(SizeWarningChoice::Abandon);
            },
            SequencerState::Cancelled => {
                println!("Download cancelled.");
                break;
            },
            SequencerState::Drained => break,
        }
    }
    drop(seq);

    printer.await?;
    Ok(())
}
