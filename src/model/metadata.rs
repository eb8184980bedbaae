use crate::error::{Error, Result};
use crate::model::attributes::Schema;
use crate::model::bounds::Bounds;
use crate::model::id::SpatialId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Depth thresholds of the tree.
///
/// - `[0, base_depth_begin)` holds no points.
/// - `[base_depth_begin, cold_depth_begin)` is the resident base.
/// - `[cold_depth_begin, sparse_depth_begin)` uses dense chunks of
///   `4^nominal_chunk_depth` tubes.
/// - `[sparse_depth_begin, max_depth)` uses sparse chunks that keep the x/y
///   extent of the last dense depth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
	pub base_depth_begin: usize,
	pub cold_depth_begin: usize,
	pub nominal_chunk_depth: usize,
	pub sparse_depth_begin: usize,
	#[serde(default = "default_max_depth")]
	pub max_depth: usize,
}

fn default_max_depth() -> usize {
	48
}

impl Structure {
	pub fn validate(&self) -> Result<()> {
		let bits = usize::BITS as usize;

		if self.base_depth_begin >= self.cold_depth_begin
			|| self.cold_depth_begin > self.sparse_depth_begin
			|| self.sparse_depth_begin > self.max_depth
		{
			return Err(Error::Config(format!(
				"depths must satisfy base {} < cold {} <= sparse {} <= max {}",
				self.base_depth_begin,
				self.cold_depth_begin,
				self.sparse_depth_begin,
				self.max_depth
			)));
		}
		if self.nominal_chunk_depth > self.cold_depth_begin {
			return Err(Error::Config(format!(
				"nominal chunk depth {} is past the cold depth {}",
				self.nominal_chunk_depth, self.cold_depth_begin
			)));
		}
		if self.max_depth >= 64 {
			return Err(Error::Config(format!("max depth {} must be below 64", self.max_depth)));
		}
		// The deepest base level and a dense chunk must both be word sized.
		if self.cold_depth_begin > 0 && 2 * (self.cold_depth_begin - 1) >= bits {
			return Err(Error::Config(format!(
				"cold depth {} makes base chunks too large",
				self.cold_depth_begin
			)));
		}
		Ok(())
	}

	pub fn is_within_null(&self, depth: usize) -> bool {
		depth < self.base_depth_begin
	}

	pub fn is_within_base(&self, depth: usize) -> bool {
		depth >= self.base_depth_begin && depth < self.cold_depth_begin
	}

	pub fn base_depths(&self) -> std::ops::Range<usize> {
		self.base_depth_begin..self.cold_depth_begin
	}

	/// Id of the first tube at `depth`: `(4^depth - 1) / 3`.
	pub fn level_index(&self, depth: usize) -> SpatialId {
		((SpatialId::one() << (2 * depth)) - 1u64) / 3
	}

	pub fn points_at_depth(&self, depth: usize) -> SpatialId {
		SpatialId::one() << (2 * depth)
	}

	pub fn base_index_begin(&self) -> SpatialId {
		self.level_index(self.base_depth_begin)
	}

	/// log2 of the number of tubes a chunk at `depth` spans along x (and y).
	pub fn chunk_span_bits(&self, depth: usize) -> usize {
		if depth < self.cold_depth_begin {
			depth
		} else if depth < self.sparse_depth_begin {
			self.nominal_chunk_depth
		} else {
			self.nominal_chunk_depth + depth - self.sparse_depth_begin
		}
	}

	pub fn points_per_chunk(&self, depth: usize) -> SpatialId {
		SpatialId::one() << (2 * self.chunk_span_bits(depth))
	}

	/// Number of equal slices, each a nominal chunk tall, the full z extent
	/// splits into at `depth`.
	pub fn divisor(&self, depth: usize) -> usize {
		let capped = depth.min(self.sparse_depth_begin);
		let mut d = 1usize << capped.saturating_sub(self.nominal_chunk_depth);

		if depth > self.sparse_depth_begin {
			d <<= depth - self.sparse_depth_begin;
		}

		d
	}

	/// Number of ticks (cubic z slices of a chunk column) at `depth`. Stops
	/// growing once chunks become sparse.
	pub fn max_ticks(&self, depth: usize) -> usize {
		let mut ticks = self.divisor(depth);

		if depth > self.sparse_depth_begin {
			ticks >>= depth - self.sparse_depth_begin;
		}

		ticks
	}

	/// Tick containing the z position `z` (in `[0, 2^depth)`).
	pub fn tick_of(&self, depth: usize, z: u64) -> usize {
		let tick_bits = self.max_ticks(depth).trailing_zeros() as usize;
		(z >> (depth - tick_bits)) as usize
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CesiumSettings {
	/// Depth interval at which the tileset is split into separate files.
	pub tileset_split: usize,
	/// Geometric error of the root tile.
	pub geometric_error: f64,
}

impl Default for CesiumSettings {
	fn default() -> Self {
		CesiumSettings {
			tileset_split: 8,
			geometric_error: 1024.0,
		}
	}
}

/// Read-only dataset configuration shared by every chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
	pub bounds: Bounds,
	pub structure: Structure,
	#[serde(default)]
	pub schema: Schema,
	/// Row-major world transform.
	#[serde(default)]
	pub transformation: Option<[f64; 16]>,
	#[serde(default)]
	pub cesium: Option<CesiumSettings>,
	#[serde(default)]
	pub postfix: String,
}

impl Metadata {
	pub fn new(bounds: Bounds, structure: Structure) -> Metadata {
		Metadata {
			bounds,
			structure,
			schema: Schema::default(),
			transformation: None,
			cesium: None,
			postfix: String::new(),
		}
	}

	pub fn from_file(path: &Path) -> Result<Metadata> {
		let contents = fs::read_to_string(path)?;
		let metadata: Metadata = serde_json::from_str(&contents)?;
		metadata.validate()?;
		Ok(metadata)
	}

	pub fn validate(&self) -> Result<()> {
		self.structure.validate()?;
		if let Some(cesium) = &self.cesium {
			if cesium.tileset_split == 0 {
				return Err(Error::Config("tilesetSplit must be at least 1".to_string()));
			}
		}
		Ok(())
	}

	pub fn bounds_cubic(&self) -> Bounds {
		self.bounds.cubic()
	}
}
