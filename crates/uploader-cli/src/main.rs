//! Uploader RS command line
//!
//! Inspect path templates and geometries, and produce derivatives from a
//! configuration file without a host application.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uploader_core::{ImageEngine, UploaderConfig, ORIGINAL_STYLE};
use uploader_imaging::{probe_dimensions, DerivativeGenerator, Dimensions, Geometry, ResizeOptions, ThumbnailPlan};
use uploader_interpolation::{InterpolationContext, Interpolator, PathResolver};

#[derive(Parser, Debug)]
#[command(name = "uploader")]
#[command(about = "Resolve attachment paths and generate image derivatives")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); environment only when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve path, url and default url of an attachment field
    Paths(PathsArgs),
    /// Show the target box a geometry computes for a source size
    Geometry(GeometryArgs),
    /// Resize one image with a geometry specifier
    Resize(ResizeArgs),
}

#[derive(clap::Args, Debug)]
struct PathsArgs {
    #[arg(long)]
    model: String,
    #[arg(long)]
    field: String,
    #[arg(long)]
    id: Option<i64>,
    #[arg(long, default_value = "")]
    filename: String,
    /// Style to resolve; every configured style when omitted
    #[arg(long)]
    style: Option<String>,
    /// Extra `key=value` tokens overriding the defaults
    #[arg(long = "token", value_parser = parse_token)]
    tokens: Vec<(String, String)>,
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct GeometryArgs {
    /// Geometry specifier, e.g. `[100x100]`, `100x100`, `200w`
    geometry: String,
    #[arg(long)]
    width: u32,
    #[arg(long)]
    height: u32,
}

#[derive(clap::Args, Debug)]
struct ResizeArgs {
    source: PathBuf,
    destination: PathBuf,
    #[arg(long)]
    geometry: String,
    #[arg(long, default_value_t = ImageEngine::Standard)]
    engine: ImageEngine,
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,
}

fn main() -> ExitCode {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Paths(args) => {
            let config = load_config(cli.config.as_ref())?;
            paths_command(&config, args)
        }
        Commands::Geometry(args) => geometry_command(args),
        Commands::Resize(args) => resize_command(args),
    }
}

/// Directives used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str =
    "info,uploader_cli=debug,uploader_attachments=debug,uploader_imaging=debug";

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<UploaderConfig> {
    let config = match path {
        Some(path) => UploaderConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => UploaderConfig::from_env().context("loading configuration from environment")?,
    };
    debug!(
        webroot = %config.webroot(),
        attachments = config.attachments.len(),
        "Configuration loaded"
    );
    Ok(config)
}

fn parse_token(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))?;
    if key.is_empty() {
        return Err("token name must not be empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

fn paths_command(config: &UploaderConfig, args: PathsArgs) -> anyhow::Result<()> {
    let registry = Arc::new(config.build_registry()?);
    let resolver = PathResolver::from_config(config, registry.clone(), Arc::new(Interpolator::new()));
    let overrides: InterpolationContext = args.tokens.into_iter().collect();

    let styles: Vec<String> = match args.style {
        Some(style) => vec![style],
        None => registry
            .get(&args.model, &args.field)?
            .style_names()
            .map(str::to_string)
            .collect(),
    };

    for style in styles {
        let paths = resolver.get_paths(&args.model, args.id, &args.field, &args.filename, &style, &overrides)?;
        if args.json {
            println!(
                "{}",
                json!({
                    "style": style,
                    "path": paths.path,
                    "url": paths.url,
                    "default_url": paths.default_url,
                })
            );
        } else {
            println!("{}", style);
            for (label, value) in [("path", &paths.path), ("url", &paths.url), ("default_url", &paths.default_url)] {
                if let Some(value) = value {
                    println!("  {:<12} {}", label, value);
                }
            }
        }
    }
    Ok(())
}

fn geometry_command(args: GeometryArgs) -> anyhow::Result<()> {
    let source = Dimensions::new(args.width, args.height);
    let geometry = Geometry::parse(&args.geometry)?;
    let target = geometry.target(source)?;
    let output = ThumbnailPlan::compute(source, target, geometry.mode()).output(source);

    println!("geometry  {}", geometry);
    println!("mode      {}", geometry.mode());
    println!("source    {}", source);
    println!("target    {}", target);
    println!("output    {}", output);
    Ok(())
}

fn resize_command(args: ResizeArgs) -> anyhow::Result<()> {
    let options = ResizeOptions {
        source: args.source,
        destination: args.destination,
        geometry: args.geometry,
        engine: args.engine,
        quality: args.quality,
    };

    let job = DerivativeGenerator::new().resize(ORIGINAL_STYLE, &options)?;
    let written = probe_dimensions(&options.destination)?;

    info!(
        destination = ?options.destination,
        target = %job.target(),
        written = %written,
        "Resized"
    );
    println!("{} {}", options.destination.display(), written);
    Ok(())
}
