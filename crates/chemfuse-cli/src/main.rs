//! Chemfuse CLI
//!
//! - `fuse`: compound dump + ontology → JSON-lines index documents
//! - `ontology`: single-term family lookups
//! - `graph-stats`: node/edge counts of the filtered `is_a` graph

use anyhow::{Context, Result};
use chemfuse_docs::{DuplicateIdPolicy, FusionConfig, FusionPipeline};
use chemfuse_ingest_obo::{OboGraph, OntologyDocumentBuilder, OntologyGraph};
use chemfuse_ingest_sdf::CompoundReader;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "chemfuse")]
#[command(
    author,
    version,
    about = "Chemfuse: fuse compound attributes with ontology families for indexing"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuse an SDF attribute dump with an OBO ontology into JSON lines.
    Fuse {
        /// Input SDF attribute dump
        #[arg(long)]
        sdf: PathBuf,
        /// Input OBO ontology
        #[arg(long)]
        obo: PathBuf,
        /// Output JSON-lines file
        #[arg(short, long)]
        out: PathBuf,
        /// Emit fused documents without finalization
        #[arg(long)]
        raw: bool,
        /// keep-first | reject
        #[arg(long)]
        duplicate_ids: Option<DuplicateIdPolicy>,
        #[command(flatten)]
        overrides: ConfigArgs,
    },

    /// Print the ontology document of each id.
    Ontology {
        /// Input OBO ontology
        #[arg(long)]
        obo: PathBuf,
        /// Term ids to look up
        #[arg(required = true)]
        ids: Vec<String>,
        #[command(flatten)]
        overrides: ConfigArgs,
    },

    /// Print node and edge counts of the filtered graph.
    GraphStats {
        /// Input OBO ontology
        #[arg(long)]
        obo: PathBuf,
    },
}

/// Config file plus the ontology flags shared by `fuse` and `ontology`.
#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Maximum ids per family list
    #[arg(long)]
    family_capacity: Option<usize>,
    /// Cache transitive closures per term
    #[arg(long)]
    memoize: bool,
}

impl ConfigArgs {
    /// Config file values, overridden field by field by the flags.
    fn resolve(&self) -> Result<FusionConfig> {
        let mut config = match &self.config {
            Some(path) => FusionConfig::from_path(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => FusionConfig::default(),
        };
        if let Some(capacity) = self.family_capacity {
            config.ontology.family_capacity = capacity;
        }
        if self.memoize {
            config.ontology.memoize_families = true;
        }
        config.validate().context("invalid command-line override")?;
        Ok(config)
    }
}

fn fuse_config(
    overrides: &ConfigArgs,
    duplicate_ids: Option<DuplicateIdPolicy>,
) -> Result<FusionConfig> {
    let mut config = overrides.resolve()?;
    if let Some(policy) = duplicate_ids {
        config.duplicate_ids = policy;
    }
    Ok(config)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_obo(path: &Path) -> Result<OboGraph> {
    OboGraph::from_path(path).with_context(|| format!("failed to read OBO {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Fuse {
            sdf,
            obo,
            out,
            raw,
            duplicate_ids,
            overrides,
        } => cmd_fuse(&sdf, &obo, &out, raw, &fuse_config(&overrides, duplicate_ids)?),
        Commands::Ontology {
            obo,
            ids,
            overrides,
        } => cmd_ontology(&obo, &ids, &overrides.resolve()?),
        Commands::GraphStats { obo } => cmd_graph_stats(&obo),
    }
}

fn cmd_fuse(sdf: &Path, obo: &Path, out: &Path, raw: bool, config: &FusionConfig) -> Result<()> {
    println!(
        "{} {} + {}",
        "Fusing".green().bold(),
        sdf.display(),
        obo.display()
    );
    let started = Instant::now();

    let reader = CompoundReader::from_path(sdf)
        .with_context(|| format!("failed to read SDF {}", sdf.display()))?;
    let pipeline = FusionPipeline::from_sources(reader, load_obo(obo)?, config.clone());

    let mut writer = BufWriter::new(
        File::create(out).with_context(|| format!("failed to create {}", out.display()))?,
    );
    let mut written = 0usize;
    if raw {
        for document in pipeline.generate_documents() {
            serde_json::to_writer(&mut writer, &document?)?;
            writer.write_all(b"\n")?;
            written += 1;
        }
    } else {
        for document in pipeline.documents() {
            serde_json::to_writer(&mut writer, &document?)?;
            writer.write_all(b"\n")?;
            written += 1;
        }
    }
    writer.flush()?;

    println!(
        "  {} {} ({} documents, {:.1}s)",
        "→".cyan(),
        out.display(),
        written,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn cmd_ontology(obo: &Path, ids: &[String], config: &FusionConfig) -> Result<()> {
    let builder =
        OntologyDocumentBuilder::new(OntologyGraph::from_obo(load_obo(obo)?), config.ontology);
    for id in ids {
        match builder.read_ontology(id) {
            Some(document) => println!("{}", serde_json::to_string_pretty(&document)?),
            None => println!("{} {}", "Not found:".yellow().bold(), id),
        }
    }
    Ok(())
}

fn cmd_graph_stats(obo: &Path) -> Result<()> {
    let graph = OntologyGraph::from_obo(load_obo(obo)?);
    println!("{}", "is_a graph".green().bold());
    println!("  nodes:         {}", graph.node_count());
    println!("  edges:         {}", graph.edge_count());
    println!("  removed edges: {}", graph.removed_edge_count());
    Ok(())
}
