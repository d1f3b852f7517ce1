use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use termgraph::checkpoint::CheckpointStore;
use termgraph::engine::ExpansionEngine;
use termgraph::remote::{RxNavClient, UtsClient};
use termgraph::{export, medication, seeds, Config};

/// Seed spreadsheet layout.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SeedKind {
    /// Problem-list layout
    Problems,
    /// Medication layout with drug-vocabulary columns
    Medications,
}

#[derive(Parser, Debug)]
#[command(name = "termgraph")]
#[command(about = "Expand seed concepts over a terminology service into term dictionaries")]
struct Args {
    /// Seed spreadsheet (TSV) with one row per head concept
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the rendered dictionaries
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Batch label used in output file names
    #[arg(short, long, default_value = "problems")]
    batch_name: String,

    /// Which seed spreadsheet layout the input uses
    #[arg(long, value_enum, default_value = "problems")]
    seed_kind: SeedKind,

    /// Override traversal.max_distance from the config (-1 for unbounded)
    #[arg(long)]
    max_distance: Option<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    log::info!("Starting termgraph v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    let max_distance = args.max_distance.unwrap_or(config.traversal.max_distance);

    std::fs::create_dir_all(&args.output_dir)?;

    let directives = match args.seed_kind {
        SeedKind::Problems => seeds::load_directives(&args.input)?,
        SeedKind::Medications => {
            let drug = RxNavClient::new(&config.remote)?;
            medication::load_medication_directives(&args.input, &drug).await?
        }
    };
    let lookup = UtsClient::new(&config.remote)?;

    let mut engine = ExpansionEngine::new(
        lookup,
        directives,
        max_distance,
        config.traversal.max_in_flight,
    );
    if let Some(dir) = config.checkpoint_dir() {
        log::info!("Checkpointing to {}", dir.display());
        engine = engine.with_checkpoints(CheckpointStore::new(dir)?);
    }
    engine.run().await?;
    let registry = engine.into_registry();

    let dict_path = args.output_dir.join(format!("dict_{}.xml", args.batch_name));
    let table_path = args.output_dir.join(format!("terms_{}.tsv", args.batch_name));
    let pairs_path = args.output_dir.join(format!("pairs_{}.tsv", args.batch_name));
    export::write_concept_mapper(&registry, &dict_path)?;
    export::write_term_table(&registry, &table_path)?;
    export::write_provenance_pairs(&registry, &pairs_path)?;

    log::info!("Done");
    Ok(())
}
