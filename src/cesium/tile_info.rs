use std::collections::BTreeMap;

use log::info;

use crate::cesium::tileset::{column_major_inverse, Tile, Tileset};
use crate::error::Result;
use crate::model::bounds::Bounds;
use crate::model::id::SpatialId;
use crate::model::metadata::{CesiumSettings, Metadata, Structure};
use crate::storage::Endpoint;

/// Part of the manifest produced for one subtree, plus the number of tiles
/// with content it (and any split-off manifest below it) holds.
#[derive(Debug, Default)]
pub struct Subtree {
	pub tile: Option<Tile>,
	pub count: usize,
}

/// Read-only projection of a populated chunk, linked to its child chunks.
#[derive(Clone, Debug, PartialEq)]
pub struct TileInfo {
	id: SpatialId,
	ticks: BTreeMap<usize, usize>,
	depth: usize,
	bounds: Bounds,
	children: BTreeMap<SpatialId, TileInfo>,
}

pub fn pnts_name(id: &SpatialId, tick: usize) -> String {
	format!("{}-{}.pnts", id, tick)
}

pub fn tileset_name(id: &SpatialId, tick: usize) -> String {
	format!("tileset-{}-{}.json", id, tick)
}

/// Slices a tile at `depth` is split into. Shallow tiles span the whole
/// column with tick 0.
fn tile_ticks(s: &Structure, depth: usize) -> usize {
	if depth < s.cold_depth_begin {
		1
	} else {
		s.max_ticks(depth)
	}
}

/// Ticks one depth deeper that lie within slice `tick` at `depth`.
///
/// Parent and child slices are matched by resolution: `[tick]` while both
/// depths share a tick count, `[2t, 2t + 1]` where the count doubles, and
/// every tick of a cold child under a shallow parent. Visiting `tick` only
/// when the child happens to hold it would skip content once the count
/// stops doubling, and at the base to cold boundary.
fn child_ticks(s: &Structure, depth: usize, tick: usize) -> std::ops::Range<usize> {
	let ratio = tile_ticks(s, depth + 1) / tile_ticks(s, depth);
	tick * ratio..(tick + 1) * ratio
}

impl TileInfo {
	pub fn new(
		id: SpatialId,
		ticks: BTreeMap<usize, usize>,
		depth: usize,
		bounds: Bounds,
	) -> TileInfo {
		TileInfo {
			id,
			ticks,
			depth,
			bounds,
			children: BTreeMap::new(),
		}
	}

	pub fn id(&self) -> &SpatialId {
		&self.id
	}

	pub fn ticks(&self) -> &BTreeMap<usize, usize> {
		&self.ticks
	}

	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn bounds(&self) -> &Bounds {
		&self.bounds
	}

	pub fn children(&self) -> impl Iterator<Item = &TileInfo> {
		self.children.values()
	}

	pub fn num_points(&self) -> usize {
		self.ticks.values().sum()
	}

	/// Number of nodes in this subtree.
	pub fn size(&self) -> usize {
		1 + self.children.values().map(|c| c.size()).sum::<usize>()
	}

	pub fn add_child(&mut self, child: TileInfo) {
		assert_ne!(child.id, self.id, "Can't add self - {}", self.id);
		self.children.insert(child.id.clone(), child);
	}

	/// Slice `tick` of this node's bounds along z.
	pub fn conforming_bounds(&self, metadata: &Metadata, tick: usize) -> Bounds {
		let max_ticks = metadata.structure.max_ticks(self.depth);
		self.bounds.slice_z(max_ticks, tick)
	}

	/// Volume of the tile emitted for `tick`: a slice past the cold depth,
	/// the whole cube above it.
	fn tile_bounds(&self, metadata: &Metadata, depth: usize, tick: usize) -> Bounds {
		if depth >= metadata.structure.cold_depth_begin {
			self.conforming_bounds(metadata, tick)
		} else {
			metadata.bounds_cubic()
		}
	}

	fn is_visited(&self, s: &Structure, depth: usize, tick: usize) -> bool {
		self.ticks.contains_key(&tick) || (tick == 0 && depth < s.cold_depth_begin)
	}

	fn has_content(&self, s: &Structure, depth: usize, tick: usize) -> bool {
		if depth >= s.cold_depth_begin {
			self.ticks.contains_key(&tick)
		} else {
			// Shallow tiles hold the whole depth under tick 0.
			tick == 0 && !self.ticks.is_empty()
		}
	}

	pub fn insert_into(
		&self,
		metadata: &Metadata,
		endpoint: &dyn Endpoint,
		geometric_error: f64,
		depth: usize,
		tick: usize,
	) -> Result<Subtree> {
		let s = &metadata.structure;
		if !self.is_visited(s, depth, tick) {
			return Ok(Subtree::default());
		}

		let next_depth = depth + 1;
		let next_geometric_error = geometric_error / 2.0;
		let split = metadata
			.cesium
			.as_ref()
			.map(|c| c.tileset_split)
			.unwrap_or(CesiumSettings::default().tileset_split);

		let mut count = 0;
		let url = if self.has_content(s, depth, tick) {
			count += 1;
			Some(pnts_name(&self.id, tick))
		} else {
			None
		};

		let mut children = Vec::new();
		for child in self.children.values() {
			for next_tick in child_ticks(s, depth, tick) {
				let from_base = next_depth - s.base_depth_begin;

				if from_base % split == 0 {
					if let Some(written) = child.restart(
						metadata,
						endpoint,
						next_geometric_error,
						next_depth,
						next_tick,
					)? {
						count += written;
						children.push(Tile::new(
							&child.tile_bounds(metadata, next_depth, next_tick),
							next_geometric_error,
							Some(tileset_name(&child.id, next_tick)),
						));
					}
				} else {
					let sub = child.insert_into(
						metadata,
						endpoint,
						next_geometric_error,
						next_depth,
						next_tick,
					)?;
					count += sub.count;
					if let Some(tile) = sub.tile {
						children.push(tile);
					}
				}
			}
		}

		if url.is_none() && children.is_empty() {
			return Ok(Subtree::default());
		}

		let mut tile = Tile::new(&self.tile_bounds(metadata, depth, tick), geometric_error, url);
		tile.children = children;

		Ok(Subtree {
			tile: Some(tile),
			count,
		})
	}

	/// Writes the subtree rooted here at `tick` to its own manifest. Returns
	/// the number of tiles written, or `None` if there was nothing to write.
	pub fn restart(
		&self,
		metadata: &Metadata,
		endpoint: &dyn Endpoint,
		geometric_error: f64,
		depth: usize,
		tick: usize,
	) -> Result<Option<usize>> {
		let sub = self.insert_into(metadata, endpoint, geometric_error, depth, tick)?;

		match sub.tile {
			Some(root) => {
				let tileset = Tileset::new(geometric_error, root);
				endpoint.ensure_put(&tileset_name(&self.id, tick), &tileset.to_bytes()?)?;
				Ok(Some(sub.count))
			}
			None => Ok(None),
		}
	}

	/// Writes `tileset.json` for the tree rooted here. Returns the number of
	/// tiles with content.
	pub fn write(
		&self,
		metadata: &Metadata,
		endpoint: &dyn Endpoint,
		geometric_error: f64,
	) -> Result<usize> {
		info!("Aggregating root");
		let sub = self.insert_into(
			metadata,
			endpoint,
			geometric_error / 2.0,
			metadata.structure.base_depth_begin,
			0,
		)?;

		let mut root = match sub.tile {
			Some(tile) => tile,
			None => Tile::new(&metadata.bounds_cubic(), geometric_error / 2.0, None),
		};
		root.refine = Some("add".to_string());

		if let Some(t) = &metadata.transformation {
			root.transform = Some(column_major_inverse(t)?.to_vec());
		}

		let tileset = Tileset::new(geometric_error, root);
		endpoint.ensure_put("tileset.json", &tileset.to_bytes()?)?;
		info!(
			"Wrote {} of {} tiles to tileset.json",
			sub.count,
			self.size()
		);

		Ok(sub.count)
	}
}
