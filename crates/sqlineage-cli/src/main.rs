use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sqlineage_core::{Config, Direction, RunSummary};
use sqlineage_extract::{clean_artifacts, sync_dir, CleanReport, Extractor, ExtractorConfig};
use sqlineage_graph::{trace, write_html, LineageGraph, Traversal};
use sqlineage_llm::{GenerationClient, OllamaClient};
use sqlineage_source::{load_view_dependencies, write_view_artifacts, CatalogFilter, ObjectCatalog};

const DEFAULT_CONFIG_FILE: &str = "sqlineage.toml";

/// sqlineage - Table-level lineage for SQL procedures and views
#[derive(Parser)]
#[command(name = "sqlineage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: sqlineage.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract lineage for every object that has no artifact yet
    Extract {
        /// Only these schemas (repeatable)
        #[arg(short, long = "schema")]
        schemas: Vec<String>,

        /// Maximum generation calls in flight
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,

        /// Model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Artifact directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the run summary as JSON
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Trace upstream or downstream lineage of an object
    Trace {
        /// Object to start from (schema.object or a unique object name)
        root: String,

        /// upstream or downstream (default from config)
        #[arg(short, long)]
        direction: Option<Direction>,

        /// Write an HTML diagram (to the configured path when no PATH is given)
        #[arg(long, num_args = 0..=1, value_name = "PATH")]
        html: Option<Option<PathBuf>>,

        /// Print edges as JSON
        #[arg(long)]
        json: bool,

        /// Artifact directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Rewrite artifact names in canonical schema.object form
    Clean {
        /// Artifact directory
        dir: Option<PathBuf>,
    },

    /// Replace DEST with a copy of SRC
    Sync {
        src: PathBuf,
        dest: PathBuf,
    },

    /// Write view lineage artifacts from catalog dependency exports
    Views {
        /// Dependency CSV files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Artifact directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that the generation service is reachable
    Check,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    if let Commands::Init { force } = cli.command {
        let path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        return init_command(&path, force);
    }

    let config = load_config(cli.config.as_deref(), cli.verbose)?;
    tracing::debug!("Output directory: {}", config.output_dir().display());

    match cli.command {
        Commands::Extract {
            schemas,
            concurrency,
            model,
            output,
            summary,
        } => extract_command(config, schemas, concurrency, model, output, summary.as_deref(), cli.verbose).await,
        Commands::Trace {
            root,
            direction,
            html,
            json,
            dir,
        } => trace_command(&config, &root, direction, html, json, dir, cli.verbose),
        Commands::Clean { dir } => {
            let dir = dir.unwrap_or_else(|| config.output_dir());
            let report = clean_artifacts(&dir).with_context(|| format!("Failed to clean {}", dir.display()))?;
            print_clean_report(&report);
            Ok(())
        }
        Commands::Sync { src, dest } => {
            let copied = sync_dir(&src, &dest)?;
            println!(
                "{} Copied {} files from {} to {}",
                "✓".green(),
                copied,
                src.display(),
                dest.display()
            );
            Ok(())
        }
        Commands::Views { files, output } => {
            let views = load_view_dependencies(&files)?;
            let dir = output.unwrap_or_else(|| config.output_dir());
            let written = write_view_artifacts(&views, &dir)?;
            println!("{} Wrote {} view lineage artifacts to {}", "✓".green(), written, dir.display());
            Ok(())
        }
        Commands::Check => check_command(&config).await,
        Commands::Init { .. } => Ok(()),
    }
}

/// Log to stderr; RUST_LOG wins unless --verbose is given
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Config from --config, ./sqlineage.toml or defaults, then environment overrides
fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let mut config = if let Some(path) = path {
        Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG_FILE))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if let Ok(host) = std::env::var("OLLAMA_HOST") {
        if !host.trim().is_empty() {
            config.generation.endpoint = endpoint_from_host(&host);
        }
    }
    if let Ok(model) = std::env::var("SQLINEAGE_MODEL") {
        if !model.trim().is_empty() {
            config.generation.model = model;
        }
    }

    config.validate()?;

    if verbose {
        eprintln!(
            "{} {} at {}",
            "Using model".cyan(),
            config.generation.model,
            config.generation.endpoint
        );
    }

    Ok(config)
}

/// `OLLAMA_HOST` may omit the scheme (e.g. `0.0.0.0:11434`)
fn endpoint_from_host(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

/// Init command - write a default config file
fn init_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default().save_to_file(path)?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(())
}

/// Extract command - run the resumable extractor, then clean the artifacts
async fn extract_command(
    mut config: Config,
    schemas: Vec<String>,
    concurrency: Option<usize>,
    model: Option<String>,
    output: Option<PathBuf>,
    summary_path: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    if let Some(concurrency) = concurrency {
        config.generation.max_concurrent_requests = concurrency;
    }
    if let Some(model) = model {
        config.generation.model = model;
    }
    if let Some(output) = output {
        config.output.dir = output;
    }
    config.validate()?;

    let mut filter = CatalogFilter::from_config(&config.source);
    if !schemas.is_empty() {
        filter = filter.with_schemas(schemas);
    }

    let files: Vec<PathBuf> = config.source.files.iter().map(|f| config.resolve(f)).collect();
    if verbose {
        for file in &files {
            eprintln!("{} {}", "Loading catalog from:".cyan(), file.display());
        }
    }

    let catalog = ObjectCatalog::load(&files, filter).context("Failed to load object catalog")?;
    if verbose {
        eprintln!(
            "{} {} objects from {} rows",
            "Selected".cyan(),
            catalog.len(),
            catalog.rows_read()
        );
    }
    if catalog.is_empty() {
        println!("{}", "No objects matched the catalog filter; nothing to extract.".yellow());
        return Ok(());
    }

    let client = OllamaClient::new(&config.generation.endpoint)?;
    client
        .test_connection()
        .await
        .with_context(|| format!("Cannot reach {} at {}", client.name(), client.endpoint()))?;

    let client: Arc<dyn GenerationClient> = Arc::new(client);
    let extractor = Extractor::new(ExtractorConfig::from_config(&config, client)?)?;

    tracing::info!("Starting extraction with {}", config.generation.model);
    let summary = extractor.run(catalog.into_records()).await?;
    tracing::info!("Extraction finished: {} produced, {} failed", summary.produced(), summary.failed);

    print_run_summary(&summary, extractor.output_dir());

    if let Some(path) = summary_path {
        summary
            .save_to_file(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} {}", "Summary written to:".green(), path.display());
    }

    let report = clean_artifacts(extractor.output_dir())?;
    print_clean_report(&report);

    Ok(())
}

/// Trace command - walk the lineage graph from one object
fn trace_command(
    config: &Config,
    root: &str,
    direction: Option<Direction>,
    html: Option<Option<PathBuf>>,
    json: bool,
    dir: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let direction = direction.unwrap_or(config.graph.direction);
    let dir = dir.unwrap_or_else(|| config.output_dir());

    let (graph, report) = LineageGraph::from_artifacts_dir(&dir)?;
    if verbose {
        eprintln!(
            "{} {} artifacts ({} error markers, {} skipped): {} nodes, {} edges",
            "Loaded".cyan(),
            report.artifacts_read,
            report.error_artifacts,
            report.skipped.len(),
            graph.node_count(),
            graph.edge_count()
        );
        for (path, reason) in &report.skipped {
            eprintln!("  {} {}: {}", "⚠ Skipped".yellow(), path.display(), reason);
        }
    }

    let resolved = graph.resolve_node(root).unwrap_or(root);
    let traversal = trace(&graph, resolved, direction)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&traversal.edges)?);
    } else {
        print_traversal(&traversal);
    }

    if traversal.is_empty() {
        return Ok(());
    }

    if let Some(path) = html {
        let path = path.unwrap_or_else(|| config.resolve(&config.graph.html_output));
        write_html(&traversal, &path).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} {} graph generated: {}", "✓".green(), direction, path.display());
    }

    Ok(())
}

/// Check command - test connectivity to the generation service
async fn check_command(config: &Config) -> Result<()> {
    let client = OllamaClient::new(&config.generation.endpoint)?;

    match client.test_connection().await {
        Ok(()) => {
            println!(
                "{} {} reachable at {} (model {})",
                "✓".green(),
                client.name(),
                client.endpoint(),
                config.generation.model
            );
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Cannot reach {} at {}: {}", client.name(), client.endpoint(), e)),
    }
}

fn print_run_summary(summary: &RunSummary, output_dir: &Path) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Lineage Extraction Summary".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{} {}", "Timestamp:".bold(), summary.timestamp);
    println!("{} {}", "Output:".bold(), output_dir.display());
    println!();

    println!("  {} {}", "Total objects:".bold(), summary.total);
    println!("  {} {}", "Already done:".bold(), summary.skipped);
    println!("  {} {}", "Lineage written:".bold(), summary.completed.to_string().green());
    println!("  {} {}", "Error markers:".bold(), summary.error_artifacts.to_string().yellow());
    println!("  {} {}", "Failed:".bold(), summary.failed.to_string().red());
    println!();

    if summary.failed_objects.is_empty() {
        println!("{}", "✓ Every object has an artifact".green().bold());
    } else {
        println!("{}", "Failed objects (retried on the next run):".bold());
        for name in &summary.failed_objects {
            println!("  {} {}", "✗".red(), name);
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

fn print_clean_report(report: &CleanReport) {
    println!(
        "{} Cleaned {} of {} artifacts ({} error markers left as is)",
        "✓".green(),
        report.rewritten,
        report.examined,
        report.error_artifacts
    );
    for (path, reason) in &report.skipped {
        println!("  {} {}: {}", "⚠ Skipped".yellow(), path.display(), reason);
    }
}

fn print_traversal(traversal: &Traversal) {
    let way = traversal.direction.to_string().to_lowercase();

    if traversal.is_empty() {
        println!(
            "{} Object found, but has no {} dependencies.",
            "✓".green(),
            way
        );
        return;
    }

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{} {}", traversal.root.green().bold(), format!("[{}]", traversal.direction).bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    for (i, edge) in traversal.edges.iter().enumerate() {
        println!("  {}. {} {} {}", i + 1, edge.source.yellow(), "->".dimmed(), edge.target.yellow());
    }

    println!();
    println!(
        "Found {} {} dependencies across {} objects",
        traversal.edges.len(),
        way,
        traversal.nodes().len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn ollama_host_without_scheme() {
        assert_eq!(endpoint_from_host("0.0.0.0:11434"), "http://0.0.0.0:11434");
        assert_eq!(endpoint_from_host(" https://gpu-box:11434 "), "https://gpu-box:11434");
    }

    #[test]
    fn trace_flags() {
        let cli = Cli::try_parse_from(["sqlineage", "trace", "dbo.orders", "--direction", "up", "--html"]).unwrap();
        match cli.command {
            Commands::Trace { root, direction, html, .. } => {
                assert_eq!(root, "dbo.orders");
                assert_eq!(direction, Some(Direction::Upstream));
                assert_eq!(html, Some(None));
            }
            _ => panic!("expected trace"),
        }
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlineage.toml");

        init_command(&path, false).unwrap();
        assert!(Config::from_file(&path).is_ok());
        assert!(init_command(&path, false).is_err());
        assert!(init_command(&path, true).is_ok());
    }
}
