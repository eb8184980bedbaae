use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::cesium::tile_info::TileInfo;
use crate::error::{Error, Result};
use crate::model::cell::Cell;
use crate::model::id::SpatialId;
use crate::model::metadata::{CesiumSettings, Metadata};
use crate::storage::{Endpoint, SubEndpoint};
use crate::tree::chunk::Chunk;
use crate::tree::climber::{locate_chunk, parent_chunk_id, Climber};
use crate::tree::tube::Insertion;

pub fn ids_name(metadata: &Metadata) -> String {
	format!("chunk-ids{}.json", metadata.postfix)
}

/// Owner of the base chunk and of every chunk past the cold depth.
pub struct Registry {
	metadata: Arc<Metadata>,
	endpoint: Arc<dyn Endpoint>,
	base: Chunk,
	chunks: Mutex<BTreeMap<SpatialId, Arc<Chunk>>>,
	/// Chunks persisted by an earlier run, loaded on first touch.
	known: BTreeSet<SpatialId>,
}

impl Registry {
	pub fn new(metadata: Arc<Metadata>, endpoint: Arc<dyn Endpoint>, exists: bool) -> Result<Registry> {
		let s = &metadata.structure;
		let base = Chunk::create(
			&metadata,
			endpoint.as_ref(),
			metadata.bounds_cubic(),
			s.base_depth_begin,
			s.base_index_begin(),
			&s.level_index(s.cold_depth_begin) - &s.base_index_begin(),
			exists,
		)?;

		let mut known = BTreeSet::new();
		if exists {
			let list: Vec<String> = serde_json::from_slice(&endpoint.get(&ids_name(&metadata))?)?;
			for id in list {
				known.insert(id.parse::<SpatialId>()?);
			}
			info!("Resuming with {} persisted chunks", known.len());
		}

		Ok(Registry {
			metadata,
			endpoint,
			base,
			chunks: Mutex::new(BTreeMap::new()),
			known,
		})
	}

	pub fn metadata(&self) -> &Metadata {
		&self.metadata
	}

	pub fn base(&self) -> &Chunk {
		&self.base
	}

	/// Ids of every chunk past the cold depth, persisted or in memory.
	pub fn ids(&self) -> BTreeSet<SpatialId> {
		let mut ids = self.known.clone();
		ids.extend(self.chunks.lock().unwrap().keys().cloned());
		ids
	}

	/// Looks up the chunk under `climber`, creating it if needed. The chunk is
	/// built, and loaded if persisted, outside the lock; when two threads race
	/// the first one stored wins.
	fn get_chunk(&self, climber: &Climber) -> Result<Arc<Chunk>> {
		let id = climber.chunk_id();
		if let Some(chunk) = self.chunks.lock().unwrap().get(&id) {
			return Ok(chunk.clone());
		}

		let chunk = Arc::new(Chunk::create(
			&self.metadata,
			self.endpoint.as_ref(),
			climber.chunk_bounds(),
			climber.depth(),
			id.clone(),
			climber.points_per_chunk(),
			self.known.contains(&id),
		)?);

		let mut chunks = self.chunks.lock().unwrap();
		let chunk = chunks.entry(id).or_insert(chunk).clone();
		debug!("Created chunk {} at depth {}", chunk.id(), climber.depth());
		Ok(chunk)
	}

	/// Loads a chunk persisted by an earlier run.
	fn load_chunk(&self, id: &SpatialId) -> Result<Chunk> {
		let (depth, bounds) = locate_chunk(&self.metadata, id);
		Chunk::create(
			&self.metadata,
			self.endpoint.as_ref(),
			bounds,
			depth,
			id.clone(),
			self.metadata.structure.points_per_chunk(depth),
			true,
		)
	}

	pub fn insert(&self, climber: &Climber, cell: Cell) -> Result<Insertion> {
		if self.metadata.structure.is_within_base(climber.depth()) {
			return Ok(self.base.insert(climber, cell));
		}

		let chunk = self.get_chunk(climber)?;
		Ok(chunk.insert(climber, cell))
	}

	/// Persists every chunk and the id list, then writes the tileset when
	/// tiles are configured. Returns the number of tiles with content.
	pub fn save(&self) -> Result<usize> {
		let endpoint = self.endpoint.as_ref();
		self.base.save(endpoint)?;

		let chunks: Vec<Arc<Chunk>> = self.chunks.lock().unwrap().values().cloned().collect();
		for chunk in &chunks {
			chunk.save(endpoint)?;
		}
		info!("Saved {} chunks", chunks.len() + 1);

		let ids: Vec<String> = self.ids().iter().map(|id| id.to_string()).collect();
		endpoint.ensure_put(&ids_name(&self.metadata), &serde_json::to_vec(&ids)?)?;

		match &self.metadata.cesium {
			Some(settings) => self.write_tileset(settings),
			None => Ok(0),
		}
	}

	fn write_tileset(&self, settings: &CesiumSettings) -> Result<usize> {
		let cesium = SubEndpoint::new(self.endpoint.as_ref(), "cesium");
		self.tile_tree()?
			.write(&self.metadata, &cesium, settings.geometric_error)
	}

	/// Links the projections of every chunk into one tree rooted at the
	/// first base depth. A missing parent is added without points, which
	/// prunes its subtree from the tileset.
	pub fn tile_tree(&self) -> Result<TileInfo> {
		let s = &self.metadata.structure;
		let mut nodes: BTreeMap<(usize, SpatialId), TileInfo> = BTreeMap::new();

		for info in self.base_infos() {
			nodes.insert((info.depth(), info.id().clone()), info);
		}

		let chunks = self.chunks.lock().unwrap().clone();
		for (id, chunk) in &chunks {
			nodes.insert((chunk.depth(), id.clone()), chunk.info());
		}
		for id in self.known.iter().filter(|id| !chunks.contains_key(*id)) {
			let chunk = self.load_chunk(id)?;
			nodes.insert((chunk.depth(), id.clone()), chunk.info());
		}

		while let Some(((depth, id), node)) = nodes.pop_last() {
			if depth <= s.base_depth_begin {
				return Ok(node);
			}

			let parent_id = parent_chunk_id(&self.metadata, &id, depth);
			let parent = nodes
				.entry((depth - 1, parent_id.clone()))
				.or_insert_with(|| {
					let climber = Climber::at(&self.metadata, &node.bounds().mid(), depth - 1);
					TileInfo::new(parent_id, BTreeMap::new(), depth - 1, climber.chunk_bounds())
				});
			parent.add_child(node);
		}

		Err(Error::Format("no root chunk".to_string()))
	}

	fn base_infos(&self) -> Vec<TileInfo> {
		match &self.base {
			Chunk::Base(base) => base.base_info(),
			other => vec![other.info()],
		}
	}

	/// Takes over the points and chunks of `other`, including the ones it
	/// only has persisted. Adopted chunks are saved here under this
	/// registry's postfix. Returns the ids that changed here. Nothing moves
	/// if the two overlap.
	pub fn merge(&mut self, other: &mut Registry) -> Result<BTreeSet<SpatialId>> {
		if other.metadata.structure != self.metadata.structure || other.metadata.bounds != self.metadata.bounds {
			return Err(Error::Config("can't merge trees with different bounds or structure".to_string()));
		}

		let ours = self.chunks.get_mut().unwrap();
		let theirs = other.chunks.get_mut().unwrap();
		let clash = theirs
			.keys()
			.chain(other.known.iter())
			.find(|id| ours.contains_key(*id) || self.known.contains(*id))
			.cloned();
		if let Some(id) = clash {
			return Err(Error::Overlap(id));
		}

		let mut adopted = BTreeMap::new();
		for (id, chunk) in theirs.iter() {
			adopted.insert(id.clone(), Arc::new(chunk.adopt(&self.metadata)?));
		}
		let persisted: Vec<SpatialId> = other
			.known
			.iter()
			.filter(|id| !theirs.contains_key(*id))
			.cloned()
			.collect();
		for id in persisted {
			let chunk = other.load_chunk(&id)?;
			adopted.insert(id, Arc::new(chunk.adopt(&self.metadata)?));
		}

		let mut ids = match (&mut self.base, &mut other.base) {
			(Chunk::Base(ours), Chunk::Base(theirs)) => ours.merge(theirs)?,
			_ => BTreeSet::new(),
		};

		debug!("Adopting {} chunks", adopted.len());
		ids.extend(adopted.keys().cloned());
		self.chunks.get_mut().unwrap().extend(adopted);
		other.chunks.get_mut().unwrap().clear();
		other.known.clear();

		Ok(ids)
	}
}
