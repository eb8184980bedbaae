//! Error types for the indexer

use thiserror::Error;

use crate::model::id::SpatialId;

/// Main error type for the indexer
#[derive(Debug, Error)]
pub enum Error {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("CSV error: {0}")]
	Csv(#[from] csv::Error),

	#[error("No such blob: {0}")]
	NotFound(String),

	#[error("Invalid configuration: {0}")]
	Config(String),

	#[error("Chunk at depth {depth} spans {max_points} points, more than a machine word")]
	Capacity { depth: usize, max_points: SpatialId },

	#[error("Malformed data: {0}")]
	Format(String),

	#[error("Tubes overlap while merging chunk {0}")]
	Overlap(SpatialId),
}

pub type Result<T> = std::result::Result<T, Error>;
