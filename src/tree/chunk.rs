use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use log::{debug, error};

use crate::cesium::pnts;
use crate::cesium::tile_info::{pnts_name, TileInfo};
use crate::error::{Error, Result};
use crate::model::bounds::Bounds;
use crate::model::cell::Cell;
use crate::model::id::SpatialId;
use crate::model::metadata::Metadata;
use crate::model::vector3::Vector3;
use crate::storage::{Endpoint, SubEndpoint};
use crate::tree::climber::Climber;
use crate::tree::codec::{read_cells, write_cells};
use crate::tree::tube::{Insertion, Tube};

/// Fields shared by every chunk representation.
#[derive(Debug)]
struct Header {
	metadata: Arc<Metadata>,
	bounds: Bounds,
	depth: usize,
	id: SpatialId,
	max_points: SpatialId,
}

impl Header {
	fn end_id(&self) -> SpatialId {
		&self.id + &self.max_points
	}

	/// Offset of `index` from the start of the chunk.
	fn normalize(&self, index: &SpatialId) -> SpatialId {
		assert!(
			index >= &self.id && index < &self.end_id(),
			"Index {} outside chunk {} of {} points",
			index,
			self.id,
			self.max_points
		);
		index - &self.id
	}

	fn name(&self) -> String {
		format!("{}{}", self.id, self.metadata.postfix)
	}

	fn load(&self, endpoint: &dyn Endpoint) -> Result<Vec<Cell>> {
		let bytes = endpoint.get(&self.name())?;
		read_cells(&bytes, &self.metadata.schema)
	}

	fn save(&self, endpoint: &dyn Endpoint, cells: &[(u64, Cell)]) -> Result<()> {
		let bytes = write_cells(cells.iter().map(|(_, c)| c), &self.metadata.schema)?;
		endpoint.ensure_put(&self.name(), &bytes)?;

		if self.metadata.cesium.is_some() {
			let cesium = SubEndpoint::new(endpoint, "cesium");
			self.tile(&cesium, cells)?;
		}
		Ok(())
	}

	fn tick_of(&self, z: u64) -> usize {
		let s = &self.metadata.structure;
		if self.depth < s.cold_depth_begin {
			0
		} else {
			s.tick_of(self.depth, z)
		}
	}

	fn tick_bounds(&self, tick: usize) -> Bounds {
		let s = &self.metadata.structure;
		if self.depth < s.cold_depth_begin {
			self.metadata.bounds_cubic()
		} else {
			self.bounds.slice_z(s.max_ticks(self.depth), tick)
		}
	}

	/// Writes one point batch per populated tick.
	fn tile(&self, endpoint: &dyn Endpoint, cells: &[(u64, Cell)]) -> Result<usize> {
		let mut ticks: BTreeMap<usize, Vec<Vector3>> = BTreeMap::new();
		for (z, cell) in cells {
			let points = ticks.entry(self.tick_of(*z)).or_default();
			for _ in 0..cell.num_points() {
				points.push(cell.point);
			}
		}

		for (tick, points) in &ticks {
			let center = self.tick_bounds(*tick).mid();
			endpoint.ensure_put(&pnts_name(&self.id, *tick), &pnts::encode(points, &center)?)?;
		}
		Ok(ticks.len())
	}

	fn info(&self, cells: &[(u64, Cell)]) -> TileInfo {
		let mut ticks = BTreeMap::new();
		for (z, cell) in cells {
			*ticks.entry(self.tick_of(*z)).or_insert(0) += cell.num_points();
		}
		TileInfo::new(self.id.clone(), ticks, self.depth, self.bounds.clone())
	}

	fn populate<F>(&self, cells: Vec<Cell>, insert: F) -> Result<()>
	where
		F: Fn(&Climber, Cell) -> Insertion,
	{
		for cell in cells {
			let climber = Climber::at(&self.metadata, &cell.point, self.depth);
			match insert(&climber, cell) {
				Insertion::Inserted => {}
				_ => {
					return Err(Error::Format(format!(
						"chunk {} holds competing points",
						self.id
					)))
				}
			}
		}
		Ok(())
	}
}

/// Tubes created on first touch, for deep ranges too large to allocate.
#[derive(Debug)]
pub struct SparseChunk {
	header: Header,
	tubes: Mutex<BTreeMap<SpatialId, Arc<Tube>>>,
}

impl SparseChunk {
	fn new(header: Header) -> SparseChunk {
		SparseChunk {
			header,
			tubes: Mutex::new(BTreeMap::new()),
		}
	}

	pub fn get_tube(&self, climber: &Climber) -> Arc<Tube> {
		let norm = self.header.normalize(&climber.index());
		let mut tubes = self.tubes.lock().unwrap();
		tubes.entry(norm).or_default().clone()
	}

	pub fn num_tubes(&self) -> usize {
		self.tubes.lock().unwrap().len()
	}

	fn cells(&self) -> Vec<(u64, Cell)> {
		let tubes = self.tubes.lock().unwrap();
		tubes.values().flat_map(|tube| tube.cells()).collect()
	}

	fn acquire(&mut self) -> Vec<Cell> {
		let tubes = std::mem::take(self.tubes.get_mut().unwrap());
		tubes.values().flat_map(|tube| tube.take()).collect()
	}
}

/// Preallocated tubes covering the whole id range.
#[derive(Debug)]
pub struct ContiguousChunk {
	header: Header,
	tubes: Vec<Tube>,
}

impl ContiguousChunk {
	fn new(header: Header) -> Result<ContiguousChunk> {
		let size = header.max_points.try_simple().ok_or_else(|| Error::Capacity {
			depth: header.depth,
			max_points: header.max_points.clone(),
		})?;

		let mut tubes = Vec::new();
		tubes.resize_with(size, Tube::new);
		Ok(ContiguousChunk { header, tubes })
	}

	pub fn id(&self) -> &SpatialId {
		&self.header.id
	}

	pub fn max_points(&self) -> &SpatialId {
		&self.header.max_points
	}

	pub fn get_tube(&self, climber: &Climber) -> &Tube {
		let norm = self.header.normalize(&climber.index()).to_simple();
		&self.tubes[norm]
	}

	pub fn is_empty(&self) -> bool {
		self.tubes.iter().all(|tube| tube.is_empty())
	}

	/// Moves the tubes of `other`, which must start where this chunk ends,
	/// onto the end of this one. `other` is left cleared.
	pub fn append(&mut self, other: &mut ContiguousChunk) {
		assert_eq!(
			self.header.end_id(),
			other.header.id,
			"Appending a chunk that is not adjacent"
		);
		self.tubes.append(&mut other.tubes);
		self.header.max_points += &other.header.max_points;
		other.clear();
	}

	/// Empties the chunk. Its id moves to its old end.
	pub fn clear(&mut self) {
		self.header.id = self.header.end_id();
		self.header.max_points = SpatialId::zero();
		self.tubes.clear();
	}

	fn cells(&self) -> Vec<(u64, Cell)> {
		self.tubes.iter().flat_map(|tube| tube.cells()).collect()
	}

	fn acquire(&mut self) -> Vec<Cell> {
		self.tubes.iter().flat_map(|tube| tube.take()).collect()
	}

	fn populate(&self, cells: Vec<Cell>) -> Result<()> {
		self.header
			.populate(cells, |climber, cell| self.get_tube(climber).insert(climber, cell))
	}

	/// Ids of the nominal sized slices holding at least one point.
	fn occupied_slices(&self) -> BTreeSet<SpatialId> {
		let s = &self.header.metadata.structure;
		let span = 1usize << (2 * self.header.depth.min(s.nominal_chunk_depth));

		self.tubes
			.chunks(span)
			.enumerate()
			.filter(|(_, tubes)| tubes.iter().any(|tube| !tube.is_empty()))
			.map(|(i, _)| &self.header.id + &SpatialId::from(i * span))
			.collect()
	}

	/// First tube id occupied at the same z position in both chunks.
	fn overlap(&mut self, other: &mut ContiguousChunk) -> Option<SpatialId> {
		assert_eq!(self.header.id, other.header.id, "Merging unrelated chunks");

		self.tubes
			.iter_mut()
			.zip(other.tubes.iter_mut())
			.position(|(ours, theirs)| ours.overlaps(theirs))
			.map(|i| &self.header.id + &SpatialId::from(i))
	}

	/// Moves every tube of `other` in. Fails without moving anything if the
	/// two chunks overlap.
	fn absorb(&mut self, other: &mut ContiguousChunk) -> Result<()> {
		if let Some(id) = self.overlap(other) {
			return Err(Error::Overlap(id));
		}

		for (ours, theirs) in self.tubes.iter_mut().zip(other.tubes.iter_mut()) {
			ours.absorb(theirs);
		}
		Ok(())
	}
}

/// Every depth of the resident base, one contiguous chunk per depth.
#[derive(Debug)]
pub struct BaseChunk {
	header: Header,
	chunks: Vec<ContiguousChunk>,
}

impl BaseChunk {
	pub fn new(metadata: &Arc<Metadata>) -> Result<BaseChunk> {
		let s = &metadata.structure;
		let bounds = metadata.bounds_cubic();

		let chunks = s
			.base_depths()
			.map(|depth| {
				ContiguousChunk::new(Header {
					metadata: metadata.clone(),
					bounds: bounds.clone(),
					depth,
					id: s.level_index(depth),
					max_points: s.points_at_depth(depth),
				})
			})
			.collect::<Result<Vec<_>>>()?;

		let header = Header {
			metadata: metadata.clone(),
			bounds,
			depth: s.base_depth_begin,
			id: s.base_index_begin(),
			max_points: &s.level_index(s.cold_depth_begin) - &s.base_index_begin(),
		};

		Ok(BaseChunk { header, chunks })
	}

	fn child(&self, depth: usize) -> &ContiguousChunk {
		&self.chunks[depth - self.header.metadata.structure.base_depth_begin]
	}

	pub fn get_tube(&self, climber: &Climber) -> &Tube {
		self.child(climber.depth()).get_tube(climber)
	}

	/// Moves every point of `other` into this base. Returns the ids of the
	/// occupied slices of the merged base. Fails without touching either
	/// base if some depth overlaps.
	pub fn merge(&mut self, other: &mut BaseChunk) -> Result<BTreeSet<SpatialId>> {
		for (ours, theirs) in self.chunks.iter_mut().zip(other.chunks.iter_mut()) {
			if let Some(id) = ours.overlap(theirs) {
				return Err(Error::Overlap(id));
			}
		}

		let mut ids = BTreeSet::new();
		for (ours, theirs) in self.chunks.iter_mut().zip(other.chunks.iter_mut()) {
			ours.absorb(theirs)?;
			ids.extend(ours.occupied_slices());
		}
		Ok(ids)
	}

	/// One unlinked projection per base depth.
	pub fn base_info(&self) -> Vec<TileInfo> {
		self.chunks
			.iter()
			.map(|chunk| chunk.header.info(&chunk.cells()))
			.collect()
	}

	fn info(&self) -> TileInfo {
		let mut infos = self.base_info();
		let mut deepest = infos.pop().unwrap_or_else(|| {
			TileInfo::new(
				self.header.id.clone(),
				BTreeMap::new(),
				self.header.depth,
				self.header.bounds.clone(),
			)
		});

		while let Some(mut parent) = infos.pop() {
			parent.add_child(deepest);
			deepest = parent;
		}
		deepest
	}

	fn load(&self, endpoint: &dyn Endpoint) -> Result<()> {
		for chunk in &self.chunks {
			chunk.populate(chunk.header.load(endpoint)?)?;
		}
		Ok(())
	}

	fn save(&self, endpoint: &dyn Endpoint) -> Result<()> {
		for chunk in &self.chunks {
			chunk.header.save(endpoint, &chunk.cells())?;
		}
		Ok(())
	}

	fn tile(&self, endpoint: &dyn Endpoint) -> Result<usize> {
		let mut count = 0;
		for chunk in &self.chunks {
			count += chunk.header.tile(endpoint, &chunk.cells())?;
		}
		Ok(count)
	}
}

/// A range of tubes `[id, id + max_points)` at one depth, stored the way
/// its depth band calls for.
#[derive(Debug)]
pub enum Chunk {
	Sparse(SparseChunk),
	Contiguous(ContiguousChunk),
	Base(BaseChunk),
}

impl Chunk {
	/// Creates the chunk owning `[id, id + max_points)` at `depth`, loading
	/// its persisted points when `exists` is set. Base depths always produce
	/// the whole base.
	pub fn create(
		metadata: &Arc<Metadata>,
		endpoint: &dyn Endpoint,
		bounds: Bounds,
		depth: usize,
		id: SpatialId,
		max_points: SpatialId,
		exists: bool,
	) -> Result<Chunk> {
		let chunk = Chunk::empty(metadata, bounds, depth, id, max_points)?;

		if exists {
			match &chunk {
				Chunk::Base(base) => base.load(endpoint)?,
				other => other.populate(other.header().load(endpoint)?)?,
			}
			debug!("Loaded chunk {} with {} points", chunk.id(), chunk.num_points());
		}

		Ok(chunk)
	}

	fn empty(
		metadata: &Arc<Metadata>,
		bounds: Bounds,
		depth: usize,
		id: SpatialId,
		max_points: SpatialId,
	) -> Result<Chunk> {
		let s = &metadata.structure;
		let header = Header {
			metadata: metadata.clone(),
			bounds,
			depth,
			id,
			max_points,
		};

		Ok(if depth < s.cold_depth_begin {
			Chunk::Base(BaseChunk::new(metadata)?)
		} else if depth < s.sparse_depth_begin {
			Chunk::Contiguous(ContiguousChunk::new(header)?)
		} else {
			Chunk::Sparse(SparseChunk::new(header))
		})
	}

	/// Copy of this chunk's points in a chunk owned by `metadata`, which then
	/// persists them under its own postfix.
	pub fn adopt(&self, metadata: &Arc<Metadata>) -> Result<Chunk> {
		let copy = Chunk::empty(
			metadata,
			self.bounds().clone(),
			self.depth(),
			self.id().clone(),
			self.max_points().clone(),
		)?;
		copy.populate(self.cells().into_iter().map(|(_, cell)| cell).collect())?;
		Ok(copy)
	}

	fn header(&self) -> &Header {
		match self {
			Chunk::Sparse(c) => &c.header,
			Chunk::Contiguous(c) => &c.header,
			Chunk::Base(c) => &c.header,
		}
	}

	pub fn id(&self) -> &SpatialId {
		&self.header().id
	}

	pub fn max_points(&self) -> &SpatialId {
		&self.header().max_points
	}

	pub fn depth(&self) -> usize {
		self.header().depth
	}

	pub fn bounds(&self) -> &Bounds {
		&self.header().bounds
	}

	pub fn metadata(&self) -> &Metadata {
		&self.header().metadata
	}

	pub fn divisor(&self) -> usize {
		self.metadata().structure.divisor(self.depth())
	}

	pub fn insert(&self, climber: &Climber, cell: Cell) -> Insertion {
		match self {
			Chunk::Sparse(c) => c.get_tube(climber).insert(climber, cell),
			Chunk::Contiguous(c) => c.get_tube(climber).insert(climber, cell),
			Chunk::Base(c) => c.get_tube(climber).insert(climber, cell),
		}
	}

	/// Removes and returns every stored cell.
	pub fn acquire(&mut self) -> Vec<Cell> {
		match self {
			Chunk::Sparse(c) => c.acquire(),
			Chunk::Contiguous(c) => c.acquire(),
			Chunk::Base(_) => {
				error!("No BaseChunk::acquire");
				panic!("No BaseChunk::acquire");
			}
		}
	}

	/// Inserts previously acquired cells. Every cell must find a free spot.
	pub fn populate(&self, cells: Vec<Cell>) -> Result<()> {
		match self {
			Chunk::Sparse(c) => c
				.header
				.populate(cells, |climber, cell| c.get_tube(climber).insert(climber, cell)),
			Chunk::Contiguous(c) => c.populate(cells),
			Chunk::Base(_) => {
				error!("No BaseChunk::populate");
				panic!("No BaseChunk::populate");
			}
		}
	}

	fn cells(&self) -> Vec<(u64, Cell)> {
		match self {
			Chunk::Sparse(c) => c.cells(),
			Chunk::Contiguous(c) => c.cells(),
			Chunk::Base(c) => c.chunks.iter().flat_map(|chunk| chunk.cells()).collect(),
		}
	}

	pub fn num_points(&self) -> usize {
		self.cells().iter().map(|(_, c)| c.num_points()).sum()
	}

	/// Persists the chunk as `<id><postfix>`, plus its point batches when
	/// tiles are configured.
	pub fn save(&self, endpoint: &dyn Endpoint) -> Result<()> {
		if let Chunk::Sparse(sparse) = self {
			debug!("Saving sparse chunk {} with {} tubes", self.id(), sparse.num_tubes());
		}
		match self {
			Chunk::Base(base) => base.save(endpoint),
			other => other.header().save(endpoint, &other.cells()),
		}
	}

	/// Writes the point batches only. Returns the number written.
	pub fn tile(&self, endpoint: &dyn Endpoint) -> Result<usize> {
		match self {
			Chunk::Base(base) => base.tile(endpoint),
			other => other.header().tile(endpoint, &other.cells()),
		}
	}

	/// Projection for manifest generation. The base yields its depths
	/// linked root first.
	pub fn info(&self) -> TileInfo {
		match self {
			Chunk::Base(base) => base.info(),
			other => other.header().info(&other.cells()),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;
	use std::sync::Arc;

	use crate::error::Error;
	use crate::model::bounds::Bounds;
	use crate::model::cell::Cell;
	use crate::model::id::SpatialId;
	use crate::model::metadata::{CesiumSettings, Metadata, Structure};
	use crate::model::vector3::Vector3;
	use crate::storage::MemoryEndpoint;
	use crate::tree::chunk::{BaseChunk, Chunk, ContiguousChunk, Header};
	use crate::tree::climber::Climber;
	use crate::tree::tube::Insertion;

	fn metadata() -> Arc<Metadata> {
		Arc::new(Metadata::new(
			Bounds::new(64.0, 64.0, 64.0, 0.0, 0.0, 0.0),
			Structure {
				base_depth_begin: 0,
				cold_depth_begin: 2,
				nominal_chunk_depth: 1,
				sparse_depth_begin: 3,
				max_depth: 10,
			},
		))
	}

	fn header(metadata: &Arc<Metadata>, depth: usize, id: u64, max_points: u64) -> Header {
		Header {
			metadata: metadata.clone(),
			bounds: metadata.bounds_cubic(),
			depth,
			id: SpatialId::from(id),
			max_points: SpatialId::from(max_points),
		}
	}

	fn create(metadata: &Arc<Metadata>, point: &Vector3, depth: usize) -> Chunk {
		let climber = Climber::at(metadata, point, depth);
		Chunk::create(
			metadata,
			&MemoryEndpoint::new(),
			climber.chunk_bounds(),
			depth,
			climber.chunk_id(),
			climber.points_per_chunk(),
			false,
		)
		.unwrap()
	}

	fn insert(chunk: &Chunk, point: Vector3) -> Insertion {
		let climber = Climber::at(chunk.metadata(), &point, chunk.depth());
		chunk.insert(&climber, Cell::new(point, Vec::new()))
	}

	#[test]
	fn test_normalize_is_offset() {
		let metadata = metadata();
		let a = SpatialId::from(27u64);

		let sparse = header(&metadata, 3, 21, 64);
		let contiguous = header(&metadata, 2, 21, 64);
		let base = BaseChunk::new(&metadata).unwrap();

		assert_eq!(sparse.normalize(&a), SpatialId::from(6u64));
		assert_eq!(contiguous.normalize(&a), SpatialId::from(6u64));
		assert_eq!(
			base.chunks[1].header.normalize(&SpatialId::from(3u64)),
			SpatialId::from(2u64)
		);
	}

	#[test]
	#[should_panic]
	fn test_normalize_outside_range() {
		let metadata = metadata();
		header(&metadata, 3, 21, 4).normalize(&SpatialId::from(25u64));
	}

	#[test]
	fn test_representation_follows_depth() {
		let metadata = metadata();
		let point = Vector3::new(10.0, 50.0, 3.0);

		assert!(matches!(create(&metadata, &point, 1), Chunk::Base(_)));
		assert!(matches!(create(&metadata, &point, 2), Chunk::Contiguous(_)));
		assert!(matches!(create(&metadata, &point, 5), Chunk::Sparse(_)));
		assert_eq!(create(&metadata, &point, 2).divisor(), 2);
		assert_eq!(create(&metadata, &point, 5).divisor(), 16);
	}

	#[test]
	fn test_sparse_concurrent_creation() {
		let metadata = metadata();
		let chunk = create(&metadata, &Vector3::new(1.0, 1.0, 1.0), 3);

		// Cell centres of the chunk's 2x2 tubes, 8 cells tall.
		std::thread::scope(|scope| {
			for i in 0..2 {
				for j in 0..2 {
					let chunk = &chunk;
					scope.spawn(move || {
						for k in 0..8 {
							let point = Vector3::new(4.0 + 8.0 * i as f64, 4.0 + 8.0 * j as f64, 4.0 + 8.0 * k as f64);
							assert!(matches!(insert(chunk, point), Insertion::Inserted));
						}
					});
				}
			}
		});

		match &chunk {
			Chunk::Sparse(sparse) => assert_eq!(sparse.num_tubes(), 4),
			_ => panic!("expected a sparse chunk"),
		}
		assert_eq!(chunk.num_points(), 32);
	}

	#[test]
	fn test_contiguous_capacity() {
		let metadata = metadata();
		let mut h = header(&metadata, 2, 5, 4);
		h.max_points = SpatialId::one() << 70;

		match ContiguousChunk::new(h) {
			Err(Error::Capacity { depth, .. }) => assert_eq!(depth, 2),
			other => panic!("expected a capacity error, got {:?}", other),
		}
	}

	#[test]
	fn test_append_and_clear() {
		let metadata = metadata();
		let mut a = ContiguousChunk::new(header(&metadata, 2, 5, 4)).unwrap();
		let mut b = ContiguousChunk::new(header(&metadata, 2, 9, 4)).unwrap();

		// Upper x, lower y at depth 2 lands in the second chunk.
		let point = Vector3::new(40.0, 8.0, 8.0);
		let climber = Climber::at(&metadata, &point, 2);
		assert_eq!(climber.chunk_id(), SpatialId::from(9u64));
		b.get_tube(&climber).insert(&climber, Cell::new(point, Vec::new()));

		a.append(&mut b);
		assert_eq!(a.max_points(), &SpatialId::from(8u64));
		assert!(b.is_empty());
		assert_eq!(b.id(), &SpatialId::from(13u64));
		assert_eq!(a.get_tube(&climber).num_points(), 1);

		a.clear();
		assert!(a.is_empty());
		assert_eq!(a.id(), &SpatialId::from(13u64));
		assert_eq!(a.max_points(), &SpatialId::zero());
	}

	#[test]
	#[should_panic]
	fn test_append_requires_adjacency() {
		let metadata = metadata();
		let mut a = ContiguousChunk::new(header(&metadata, 2, 5, 4)).unwrap();
		let mut b = ContiguousChunk::new(header(&metadata, 2, 13, 4)).unwrap();
		a.append(&mut b);
	}

	#[test]
	fn test_merge_returns_union() {
		let metadata = metadata();
		let a = create(&metadata, &Vector3::empty(), 0);
		let b = create(&metadata, &Vector3::empty(), 0);
		insert(&a, Vector3::new(1.0, 1.0, 1.0));
		let climber = Climber::at(&metadata, &Vector3::new(50.0, 50.0, 1.0), 1);
		b.insert(&climber, Cell::new(Vector3::new(50.0, 50.0, 1.0), Vec::new()));

		let (mut a, mut b) = match (a, b) {
			(Chunk::Base(a), Chunk::Base(b)) => (a, b),
			_ => panic!("expected base chunks"),
		};
		let ids = a.merge(&mut b).unwrap();
		let expected: BTreeSet<SpatialId> = [0u64, 1].iter().map(|v| SpatialId::from(*v)).collect();
		assert_eq!(ids, expected);
		assert_eq!(b.base_info().iter().map(|i| i.num_points()).sum::<usize>(), 0);
		assert_eq!(a.base_info()[1].num_points(), 1);
	}

	#[test]
	fn test_merge_rejects_overlap() {
		let metadata = metadata();
		let mut a = BaseChunk::new(&metadata).unwrap();
		let mut b = BaseChunk::new(&metadata).unwrap();
		for base in [&a, &b] {
			let point = Vector3::new(2.0, 2.0, 2.0);
			let climber = Climber::at(&metadata, &point, 0);
			base.get_tube(&climber).insert(&climber, Cell::new(point, Vec::new()));
		}

		assert!(matches!(a.merge(&mut b), Err(Error::Overlap(_))));
	}

	#[test]
	fn test_failed_merge_moves_nothing() {
		let metadata = metadata();
		let mut a = BaseChunk::new(&metadata).unwrap();
		let mut b = BaseChunk::new(&metadata).unwrap();
		let put = |base: &BaseChunk, point: Vector3, depth: usize| {
			let climber = Climber::at(&metadata, &point, depth);
			base.get_tube(&climber).insert(&climber, Cell::new(point, Vec::new()));
		};
		let total = |base: &BaseChunk| base.base_info().iter().map(|i| i.num_points()).sum::<usize>();

		// Only the deeper depth clashes.
		put(&b, Vector3::new(2.0, 2.0, 2.0), 0);
		put(&a, Vector3::new(50.0, 50.0, 1.0), 1);
		put(&b, Vector3::new(50.0, 50.0, 1.0), 1);

		assert!(matches!(a.merge(&mut b), Err(Error::Overlap(_))));
		assert_eq!(total(&a), 1);
		assert_eq!(total(&b), 2);
	}

	#[test]
	#[should_panic]
	fn test_base_acquire_panics() {
		let metadata = metadata();
		let mut chunk = create(&metadata, &Vector3::empty(), 0);
		chunk.acquire();
	}

	#[test]
	fn test_acquire_then_populate() {
		let metadata = metadata();
		let mut chunk = create(&metadata, &Vector3::new(1.0, 1.0, 1.0), 2);
		insert(&chunk, Vector3::new(1.0, 1.0, 1.0));
		insert(&chunk, Vector3::new(2.0, 30.0, 60.0));

		let cells = chunk.acquire();
		assert_eq!(cells.len(), 2);
		assert_eq!(chunk.num_points(), 0);

		chunk.populate(cells).unwrap();
		assert_eq!(chunk.num_points(), 2);
	}

	#[test]
	fn test_persisted_round_trip() {
		let mut metadata = (*metadata()).clone();
		metadata.cesium = Some(CesiumSettings::default());
		metadata.postfix = "-a".to_string();
		let metadata = Arc::new(metadata);
		let endpoint = MemoryEndpoint::new();

		let point = Vector3::new(20.0, 3.0, 5.0);
		let climber = Climber::at(&metadata, &point, 3);
		let make = |exists| {
			Chunk::create(
				&metadata,
				&endpoint,
				climber.chunk_bounds(),
				3,
				climber.chunk_id(),
				climber.points_per_chunk(),
				exists,
			)
			.unwrap()
		};

		let chunk = make(false);
		insert(&chunk, point);
		insert(&chunk, point);
		insert(&chunk, Vector3::new(20.0, 3.0, 60.0));
		chunk.save(&endpoint).unwrap();

		assert!(endpoint.contains(&format!("{}-a", chunk.id())));
		// Ticks at depth 3 are 16 units tall.
		assert!(endpoint.contains(&format!("cesium/{}-0.pnts", chunk.id())));
		assert!(endpoint.contains(&format!("cesium/{}-3.pnts", chunk.id())));

		let loaded = make(true);
		assert_eq!(loaded.num_points(), 3);
		assert_eq!(loaded.info(), chunk.info());
		assert_eq!(loaded.info().ticks().get(&0), Some(&2));
	}

	#[test]
	fn test_base_info_is_chained() {
		let metadata = metadata();
		let chunk = create(&metadata, &Vector3::empty(), 0);
		insert(&chunk, Vector3::new(1.0, 1.0, 1.0));
		let climber = Climber::at(&metadata, &Vector3::new(63.0, 63.0, 63.0), 1);
		chunk.insert(&climber, Cell::new(Vector3::new(63.0, 63.0, 63.0), Vec::new()));

		let info = chunk.info();
		assert_eq!(info.id(), &SpatialId::zero());
		assert_eq!(info.ticks().get(&0), Some(&1));
		let child = info.children().next().unwrap();
		assert_eq!(child.id(), &SpatialId::one());
		assert_eq!(child.depth(), 1);
		assert_eq!(info.size(), 2);
	}
}
