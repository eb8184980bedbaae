use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use rusty_tile_indexer::csv_reader;
use rusty_tile_indexer::model::bounds::find_bounds;
use rusty_tile_indexer::model::metadata::Metadata;
use rusty_tile_indexer::model::vector3::Vector3;
use rusty_tile_indexer::storage::LocalEndpoint;
use rusty_tile_indexer::{Builder, Result};

#[derive(Parser, Debug)]
#[command(name = "rusty-tile-indexer")]
#[command(about = "Index a point cloud into chunks and a 3D Tiles tileset")]
struct Cli {
	/// CSV file with x, y, z and attribute columns
	input: PathBuf,

	/// Output directory
	output: PathBuf,

	/// Metadata file describing bounds, structure, schema and tiles
	#[arg(long, short)]
	config: PathBuf,

	/// Add to a build already present in the output directory
	#[arg(long)]
	resume: bool,
}

fn run(cli: &Cli) -> Result<()> {
	let metadata = Metadata::from_file(&cli.config)?;
	let endpoint = Arc::new(LocalEndpoint::new(&cli.output));

	let cells = csv_reader::from_csv(&fs::read(&cli.input)?, &metadata.schema)?;
	info!("Read {} points from {}", cells.len(), cli.input.display());

	let points: Vec<Vector3> = cells.iter().map(|c| c.point).collect();
	if let Some(data) = find_bounds(&points) {
		if !metadata.bounds.contains(&data.min()) || !metadata.bounds.contains(&data.max()) {
			warn!("Points extend past the configured bounds: {:?}", data);
		}
	}

	let builder = if cli.resume {
		Builder::resume(metadata, endpoint)?
	} else {
		Builder::new(metadata, endpoint)?
	};

	let stats = builder.insert_all(cells)?;
	info!(
		"Inserted {}, {} outside bounds, {} past max depth",
		stats.inserted, stats.out_of_bounds, stats.overflow
	);
	builder.save()?;
	Ok(())
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let cli = Cli::parse();
	if let Err(e) = run(&cli) {
		error!("{}", e);
		process::exit(1);
	}
}
