use crate::model::vector3::Vector3;

/// A single position in the tree. Input points sharing exactly this position
/// are stacked as extra records instead of competing for space.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
	pub point: Vector3,
	pub records: Vec<Vec<u8>>,
}

impl Cell {
	pub fn new(point: Vector3, record: Vec<u8>) -> Cell {
		Cell {
			point,
			records: vec![record],
		}
	}

	pub fn num_points(&self) -> usize {
		self.records.len()
	}

	pub fn push(&mut self, mut other: Cell) {
		self.records.append(&mut other.records);
	}
}
