use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::error::Result;
use crate::model::cell::Cell;
use crate::model::metadata::Metadata;
use crate::storage::Endpoint;
use crate::tree::climber::Climber;
use crate::tree::registry::Registry;
use crate::tree::tube::Insertion;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InsertStats {
	pub inserted: usize,
	pub out_of_bounds: usize,
	/// Insertions still displaced at the maximum depth.
	pub overflow: usize,
}

/// Populates the tree, then persists it.
pub struct Builder {
	metadata: Arc<Metadata>,
	registry: Registry,
	inserted: AtomicUsize,
	out_of_bounds: AtomicUsize,
	overflow: AtomicUsize,
}

impl Builder {
	pub fn new(metadata: Metadata, endpoint: Arc<dyn Endpoint>) -> Result<Builder> {
		Builder::create(metadata, endpoint, false)
	}

	/// Continues a build persisted to `endpoint` by an earlier run.
	pub fn resume(metadata: Metadata, endpoint: Arc<dyn Endpoint>) -> Result<Builder> {
		Builder::create(metadata, endpoint, true)
	}

	fn create(metadata: Metadata, endpoint: Arc<dyn Endpoint>, exists: bool) -> Result<Builder> {
		metadata.validate()?;
		let metadata = Arc::new(metadata);
		let registry = Registry::new(metadata.clone(), endpoint, exists)?;

		Ok(Builder {
			metadata,
			registry,
			inserted: AtomicUsize::new(0),
			out_of_bounds: AtomicUsize::new(0),
			overflow: AtomicUsize::new(0),
		})
	}

	pub fn metadata(&self) -> &Metadata {
		&self.metadata
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Inserts one point, descending until some tube keeps it. Returns false
	/// if the point was dropped.
	pub fn insert(&self, cell: Cell) -> Result<bool> {
		let s = &self.metadata.structure;
		if !self.metadata.bounds.contains(&cell.point) {
			debug!("Dropping point outside bounds: {:?}", cell.point);
			self.out_of_bounds.fetch_add(1, Ordering::Relaxed);
			return Ok(false);
		}

		let mut climber = Climber::new(&self.metadata);
		while s.is_within_null(climber.depth()) {
			climber.magnify(&cell.point);
		}

		let mut cell = cell;
		loop {
			match self.registry.insert(&climber, cell)? {
				Insertion::Inserted => {
					self.inserted.fetch_add(1, Ordering::Relaxed);
					return Ok(true);
				}
				Insertion::Replaced(next) | Insertion::Rejected(next) => {
					if climber.depth() + 1 >= s.max_depth {
						self.overflow.fetch_add(1, Ordering::Relaxed);
						return Ok(false);
					}
					climber.magnify(&next.point);
					cell = next;
				}
			}
		}
	}

	/// Inserts every point in parallel. Returns the totals so far.
	pub fn insert_all(&self, cells: Vec<Cell>) -> Result<InsertStats> {
		info!("Inserting {} points", cells.len());
		cells
			.into_par_iter()
			.try_for_each(|cell| self.insert(cell).map(|_| ()))?;

		let stats = self.stats();
		if stats.out_of_bounds > 0 {
			warn!("Dropped {} points outside the bounds", stats.out_of_bounds);
		}
		if stats.overflow > 0 {
			warn!("Dropped {} points past depth {}", stats.overflow, self.metadata.structure.max_depth);
		}
		Ok(stats)
	}

	pub fn stats(&self) -> InsertStats {
		InsertStats {
			inserted: self.inserted.load(Ordering::Relaxed),
			out_of_bounds: self.out_of_bounds.load(Ordering::Relaxed),
			overflow: self.overflow.load(Ordering::Relaxed),
		}
	}

	/// Persists all chunks and, when tiles are configured, the tileset.
	/// Returns the number of tiles with content.
	pub fn save(&self) -> Result<usize> {
		info!("Saving {} points", self.stats().inserted);
		let tiles = self.registry.save()?;
		info!("Done, {} tiles", tiles);
		Ok(tiles)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;
	use std::sync::Arc;

	use rand::prelude::*;

	use crate::cesium::tile_info::TileInfo;
	use crate::cesium::tileset::{Tile, Tileset};
	use crate::model::bounds::Bounds;
	use crate::model::cell::Cell;
	use crate::model::metadata::{CesiumSettings, Metadata, Structure};
	use crate::model::vector3::Vector3;
	use crate::storage::{Endpoint, MemoryEndpoint};
	use crate::tree::builder::Builder;

	fn metadata(tileset_split: usize) -> Metadata {
		let mut metadata = Metadata::new(
			Bounds::new(100.0, 100.0, 20.0, 0.0, 0.0, 0.0),
			Structure {
				base_depth_begin: 1,
				cold_depth_begin: 3,
				nominal_chunk_depth: 2,
				sparse_depth_begin: 5,
				max_depth: 12,
			},
		);
		metadata.cesium = Some(CesiumSettings {
			tileset_split,
			geometric_error: 100.0,
		});
		metadata
	}

	fn random_cells(count: usize) -> Vec<Cell> {
		let mut rng = rand::thread_rng();
		(0..count)
			.map(|_| {
				Cell::new(
					Vector3::new(
						rng.gen_range(0.0..100.0),
						rng.gen_range(0.0..100.0),
						rng.gen_range(0.0..20.0),
					),
					Vec::new(),
				)
			})
			.collect()
	}

	fn total_points(info: &TileInfo) -> usize {
		info.num_points() + info.children().map(total_points).sum::<usize>()
	}

	fn collect(tile: &Tile, endpoint: &MemoryEndpoint, urls: &mut BTreeSet<String>) {
		if let Some(url) = tile.url() {
			urls.insert(url.to_string());
			if url.ends_with(".json") {
				let linked = Tileset::from_bytes(&endpoint.get(&format!("cesium/{}", url)).unwrap()).unwrap();
				collect(&linked.root, endpoint, urls);
			}
		}
		for child in &tile.children {
			collect(child, endpoint, urls);
		}
	}

	#[test]
	fn test_every_tile_is_persisted() {
		let endpoint = Arc::new(MemoryEndpoint::new());
		let builder = Builder::new(metadata(2), endpoint.clone()).unwrap();

		let mut cells = random_cells(2000);
		cells.push(Cell::new(Vector3::new(150.0, 0.0, 0.0), Vec::new()));
		let stats = builder.insert_all(cells).unwrap();
		assert_eq!(stats.inserted, 2000);
		assert_eq!(stats.out_of_bounds, 1);
		assert_eq!(stats.overflow, 0);

		let tiles = builder.save().unwrap();
		assert!(tiles > 0);

		let root = Tileset::from_bytes(&endpoint.get("cesium/tileset.json").unwrap()).unwrap();
		let mut urls = BTreeSet::new();
		collect(&root.root, &endpoint, &mut urls);

		let batches: Vec<&String> = urls.iter().filter(|u| u.ends_with(".pnts")).collect();
		assert_eq!(batches.len(), tiles);
		for url in batches {
			assert!(endpoint.contains(&format!("cesium/{}", url)), "missing {}", url);
		}
	}

	#[test]
	fn test_every_point_is_kept() {
		let endpoint = Arc::new(MemoryEndpoint::new());
		let builder = Builder::new(metadata(8), endpoint.clone()).unwrap();
		let cells = random_cells(500);
		builder.insert_all(cells).unwrap();

		let tree = builder.registry().tile_tree().unwrap();
		assert_eq!(total_points(&tree), 500);
	}

	#[test]
	fn test_resume_keeps_points() {
		let endpoint = Arc::new(MemoryEndpoint::new());
		let builder = Builder::new(metadata(8), endpoint.clone()).unwrap();
		builder.insert_all(random_cells(300)).unwrap();
		builder.save().unwrap();

		let resumed = Builder::resume(metadata(8), endpoint.clone()).unwrap();
		resumed.insert_all(random_cells(200)).unwrap();
		resumed.save().unwrap();

		let fresh = Builder::resume(metadata(8), endpoint).unwrap();
		let tree = fresh.registry().tile_tree().unwrap();
		assert_eq!(total_points(&tree), 500);
	}

	#[test]
	fn test_invalid_structure_is_rejected() {
		let mut metadata = metadata(8);
		metadata.structure.cold_depth_begin = 9;
		assert!(Builder::new(metadata, Arc::new(MemoryEndpoint::new())).is_err());
	}
}
