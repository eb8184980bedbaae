use crate::model::bounds::Bounds;
use crate::model::id::SpatialId;
use crate::model::metadata::Metadata;
use crate::model::vector3::Vector3;

/// Cursor descending the tree towards a point.
///
/// Tracks the current depth, the Morton position of the (x, y) tube within
/// that depth, the integer x/y/z position of the cell and the cell's bounds.
#[derive(Clone, Debug)]
pub struct Climber<'a> {
	metadata: &'a Metadata,
	depth: usize,
	position: SpatialId,
	x: u64,
	y: u64,
	z: u64,
	bounds: Bounds,
}

impl<'a> Climber<'a> {
	pub fn new(metadata: &'a Metadata) -> Climber<'a> {
		Climber {
			metadata,
			depth: 0,
			position: SpatialId::zero(),
			x: 0,
			y: 0,
			z: 0,
			bounds: metadata.bounds_cubic(),
		}
	}

	/// Climber positioned at `depth` on the path to `point`.
	pub fn at(metadata: &'a Metadata, point: &Vector3, depth: usize) -> Climber<'a> {
		let mut climber = Climber::new(metadata);
		while climber.depth < depth {
			climber.magnify(point);
		}
		climber
	}

	/// Steps one depth deeper, into the octant containing `point`.
	pub fn magnify(&mut self, point: &Vector3) {
		let octant = self.bounds.octant_of(point);
		let dx = ((octant >> 2) & 1) as u64;
		let dy = ((octant >> 1) & 1) as u64;
		let dz = (octant & 1) as u64;

		self.x = (self.x << 1) | dx;
		self.y = (self.y << 1) | dy;
		self.z = (self.z << 1) | dz;
		self.position = (&self.position << 2) + ((dy << 1) | dx);
		self.bounds = self.bounds.get_octant(octant);
		self.depth += 1;
	}

	pub fn metadata(&self) -> &'a Metadata {
		self.metadata
	}

	pub fn depth(&self) -> usize {
		self.depth
	}

	/// Absolute id of the tube at the current depth.
	pub fn index(&self) -> SpatialId {
		&self.metadata.structure.level_index(self.depth) + &self.position
	}

	/// Position of the cell within its tube.
	pub fn z(&self) -> u64 {
		self.z
	}

	/// Bounds of the current cell.
	pub fn bounds(&self) -> &Bounds {
		&self.bounds
	}

	pub fn points_per_chunk(&self) -> SpatialId {
		self.metadata.structure.points_per_chunk(self.depth)
	}

	/// Id of the first tube of the chunk owning the current tube.
	pub fn chunk_id(&self) -> SpatialId {
		let s = &self.metadata.structure;
		let level = s.level_index(self.depth);
		if self.depth < s.cold_depth_begin {
			return level;
		}

		let span = self.points_per_chunk();
		let chunk_num = &self.position / &span;
		&level + &(&chunk_num * &span)
	}

	/// Bounds of the chunk owning the current tube: its x/y block over the
	/// full z extent of the dataset.
	pub fn chunk_bounds(&self) -> Bounds {
		block_bounds(self.metadata, self.depth, self.x, self.y)
	}
}

fn block_bounds(metadata: &Metadata, depth: usize, x: u64, y: u64) -> Bounds {
	let cubic = metadata.bounds_cubic();
	let s = &metadata.structure;
	if depth < s.cold_depth_begin {
		return cubic;
	}

	let span_bits = s.chunk_span_bits(depth);
	let cell = cubic.size_x / 2f64.powi(depth as i32);
	let x0 = (x >> span_bits) << span_bits;
	let y0 = (y >> span_bits) << span_bits;
	let span = 2f64.powi(span_bits as i32);

	Bounds::new(
		cubic.lx + (x0 as f64 + span) * cell,
		cubic.ly + (y0 as f64 + span) * cell,
		cubic.uz,
		cubic.lx + x0 as f64 * cell,
		cubic.ly + y0 as f64 * cell,
		cubic.lz,
	)
}

/// Depth and bounds of the chunk starting at `id`.
pub fn locate_chunk(metadata: &Metadata, id: &SpatialId) -> (usize, Bounds) {
	let s = &metadata.structure;
	let mut depth = 0;
	while &s.level_index(depth + 1) <= id {
		depth += 1;
	}

	let position = id - &s.level_index(depth);
	let (mut x, mut y) = (0u64, 0u64);
	for i in 0..depth as u64 {
		if position.bit(2 * i) {
			x |= 1 << i;
		}
		if position.bit(2 * i + 1) {
			y |= 1 << i;
		}
	}

	(depth, block_bounds(metadata, depth, x, y))
}

/// Id of the chunk one depth shallower that contains chunk `id` at `depth`.
pub fn parent_chunk_id(metadata: &Metadata, id: &SpatialId, depth: usize) -> SpatialId {
	let s = &metadata.structure;
	let parent_depth = depth - 1;
	let position = id - &s.level_index(depth);
	let parent_position = &position >> 2;
	let parent_level = s.level_index(parent_depth);

	if parent_depth < s.cold_depth_begin {
		return parent_level;
	}

	let span = s.points_per_chunk(parent_depth);
	&parent_level + &(&(&parent_position / &span) * &span)
}

#[cfg(test)]
mod tests {
	use crate::model::bounds::Bounds;
	use crate::model::id::SpatialId;
	use crate::model::metadata::{Metadata, Structure};
	use crate::model::vector3::Vector3;
	use crate::tree::climber::{locate_chunk, parent_chunk_id, Climber};

	fn metadata() -> Metadata {
		Metadata::new(
			Bounds::new(64.0, 64.0, 64.0, 0.0, 0.0, 0.0),
			Structure {
				base_depth_begin: 0,
				cold_depth_begin: 2,
				nominal_chunk_depth: 1,
				sparse_depth_begin: 3,
				max_depth: 10,
			},
		)
	}

	#[test]
	fn test_magnify_tracks_position() {
		let metadata = metadata();
		let point = Vector3::new(63.0, 1.0, 40.0);
		let mut climber = Climber::new(&metadata);
		assert_eq!(climber.index(), SpatialId::zero());

		climber.magnify(&point);
		// Upper x, lower y: Morton position 1.
		assert_eq!(climber.index(), SpatialId::from(1u64 + 1));
		assert_eq!(climber.z(), 1);
		assert!(climber.bounds().contains(&point));

		climber.magnify(&point);
		assert_eq!(climber.depth(), 2);
		// x = 3, y = 0 -> Morton 0b0101.
		assert_eq!(climber.index(), SpatialId::from(5u64 + 5));
		assert_eq!(climber.z(), 2);
		assert_eq!(climber.bounds().size_x, 16.0);
	}

	#[test]
	fn test_chunk_bounds_contain_point() {
		let metadata = metadata();
		let point = Vector3::new(50.0, 20.0, 7.0);
		for depth in 0..8 {
			let climber = Climber::at(&metadata, &point, depth);
			let chunk_bounds = climber.chunk_bounds();
			assert!(chunk_bounds.contains(&point));
			assert_eq!(chunk_bounds.lz, 0.0);
			assert_eq!(chunk_bounds.uz, 64.0);

			let id = climber.index();
			let chunk_id = climber.chunk_id();
			assert!(id >= chunk_id);
			assert!(id < &chunk_id + &climber.points_per_chunk());
		}
	}

	#[test]
	fn test_locate_chunk() {
		let metadata = metadata();
		let point = Vector3::new(41.0, 9.0, 60.0);
		for depth in 0..9 {
			let climber = Climber::at(&metadata, &point, depth);
			let (found, bounds) = locate_chunk(&metadata, &climber.chunk_id());
			assert_eq!(found, depth);
			assert_eq!(bounds, climber.chunk_bounds());
		}
	}

	#[test]
	fn test_parent_chunk_id() {
		let metadata = metadata();
		let point = Vector3::new(3.0, 60.0, 33.0);
		for depth in 3..8 {
			let child = Climber::at(&metadata, &point, depth);
			let parent = Climber::at(&metadata, &point, depth - 1);
			assert_eq!(
				parent_chunk_id(&metadata, &child.chunk_id(), depth),
				parent.chunk_id()
			);
		}
	}
}
