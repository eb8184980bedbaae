use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
	pub x: f64,
	pub y: f64,
	pub z: f64,
}

impl Vector3 {
	pub fn new(x: f64, y: f64, z: f64) -> Vector3 {
		Vector3 { x, y, z }
	}

	pub fn empty() -> Vector3 {
		Vector3 {
			x: 0.0,
			y: 0.0,
			z: 0.0,
		}
	}

	pub fn to_array(&self) -> [f64; 3] {
		[self.x, self.y, self.z]
	}

	pub fn sq_dist(&self, other: &Vector3) -> f64 {
		let x_diff = (self.x - other.x) * (self.x - other.x);
		let y_diff = (self.y - other.y) * (self.y - other.y);
		let z_diff = (self.z - other.z) * (self.z - other.z);
		x_diff + y_diff + z_diff
	}

	/// Lexicographic x, then y, then z.
	pub fn lt_chained(&self, other: &Vector3) -> bool {
		let chained = self
			.x
			.partial_cmp(&other.x)
			.unwrap_or(Ordering::Equal)
			.then(self.y.partial_cmp(&other.y).unwrap_or(Ordering::Equal))
			.then(self.z.partial_cmp(&other.z).unwrap_or(Ordering::Equal));
		chained == Ordering::Less
	}
}

impl ops::Sub<&Vector3> for &Vector3 {
	type Output = Vector3;

	fn sub(self, rhs: &Vector3) -> Vector3 {
		Vector3 {
			x: self.x - rhs.x,
			y: self.y - rhs.y,
			z: self.z - rhs.z,
		}
	}
}
