use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::cell::Cell;
use crate::tree::climber::Climber;

/// Result of offering a cell to a tube. Replaced and rejected cells must be
/// reinserted one depth deeper.
#[derive(Debug)]
pub enum Insertion {
	Inserted,
	Replaced(Cell),
	Rejected(Cell),
}

/// The column of cells sharing one (x, y) tube index, keyed by z position.
#[derive(Debug, Default)]
pub struct Tube {
	cells: Mutex<HashMap<u64, Cell>>,
}

impl Tube {
	pub fn new() -> Tube {
		Tube::default()
	}

	pub fn insert(&self, climber: &Climber, cell: Cell) -> Insertion {
		let z = climber.z();

		let mut cells = self.cells.lock().unwrap();
		match cells.get_mut(&z) {
			None => {
				cells.insert(z, cell);
				Insertion::Inserted
			}
			Some(curr) if curr.point == cell.point => {
				curr.push(cell);
				Insertion::Inserted
			}
			Some(curr) => {
				let center = climber.bounds().mid();
				let a = cell.point.sq_dist(&center);
				let b = curr.point.sq_dist(&center);

				if a < b || (a == b && cell.point.lt_chained(&curr.point)) {
					Insertion::Replaced(std::mem::replace(curr, cell))
				} else {
					Insertion::Rejected(cell)
				}
			}
		}
	}

	pub fn is_empty(&self) -> bool {
		self.cells.lock().unwrap().is_empty()
	}

	pub fn num_points(&self) -> usize {
		self.cells
			.lock()
			.unwrap()
			.values()
			.map(|c| c.num_points())
			.sum()
	}

	/// Copies of the stored cells with their z positions, sorted by z.
	pub fn cells(&self) -> Vec<(u64, Cell)> {
		let mut cells: Vec<(u64, Cell)> = self
			.cells
			.lock()
			.unwrap()
			.iter()
			.map(|(z, c)| (*z, c.clone()))
			.collect();
		cells.sort_by_key(|(z, _)| *z);
		cells
	}

	/// Removes and returns every cell.
	pub fn take(&self) -> Vec<Cell> {
		self.cells.lock().unwrap().drain().map(|(_, c)| c).collect()
	}

	/// Whether some z position is occupied in both tubes.
	pub fn overlaps(&mut self, other: &mut Tube) -> bool {
		let ours = self.cells.get_mut().unwrap();
		other.cells.get_mut().unwrap().keys().any(|z| ours.contains_key(z))
	}

	/// Moves every cell of `other` into this tube. Returns false, leaving
	/// both tubes untouched, if any z position is occupied in both.
	pub fn absorb(&mut self, other: &mut Tube) -> bool {
		if self.overlaps(other) {
			return false;
		}

		let theirs = other.cells.get_mut().unwrap();
		self.cells.get_mut().unwrap().extend(theirs.drain());
		true
	}
}
