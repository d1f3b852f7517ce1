use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufReader;
use std::path::PathBuf;
use termgraph::checkpoint::TraversalSnapshot;
use termgraph::export;

#[derive(Parser, Debug)]
#[command(name = "render")]
#[command(about = "Render dictionaries from a saved traversal checkpoint, without remote calls")]
struct Args {
    /// Checkpoint snapshot file (e.g. checkpoints/level_003.json)
    #[arg(short, long)]
    checkpoint: PathBuf,

    /// Output directory for the rendered dictionaries
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Batch label used in output file names
    #[arg(short, long, default_value = "problems")]
    batch_name: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    let file = std::fs::File::open(&args.checkpoint)
        .with_context(|| format!("Cannot open checkpoint {}", args.checkpoint.display()))?;
    let snapshot: TraversalSnapshot = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Corrupt checkpoint {}", args.checkpoint.display()))?;

    log::info!(
        "Loaded checkpoint from {} ({} concepts, saved {})",
        args.checkpoint.display(),
        snapshot.registry.len(),
        snapshot.saved_at
    );
    if !snapshot.frontiers.is_exhausted() {
        log::warn!("Checkpoint still has pending frontier work. Output will be partial");
    }

    std::fs::create_dir_all(&args.output_dir)?;
    let dict_path = args.output_dir.join(format!("dict_{}.xml", args.batch_name));
    let table_path = args.output_dir.join(format!("terms_{}.tsv", args.batch_name));
    let pairs_path = args.output_dir.join(format!("pairs_{}.tsv", args.batch_name));
    export::write_concept_mapper(&snapshot.registry, &dict_path)?;
    export::write_term_table(&snapshot.registry, &table_path)?;
    export::write_provenance_pairs(&snapshot.registry, &pairs_path)?;

    log::info!("Done");
    Ok(())
}
