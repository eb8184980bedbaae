use serde::{Deserialize, Serialize};

/// A point attribute stored next to the position, as an opaque run of bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
	pub name: String,
	pub size: usize,
}

/// Attributes carried by every point beyond X, Y and Z.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
	pub list: Vec<Attribute>,
}

impl Schema {
	pub fn new(list: Vec<Attribute>) -> Schema {
		Schema { list }
	}

	/// Bytes per point record, excluding the position.
	pub fn extra_size(&self) -> usize {
		self.list.iter().map(|a| a.size).sum()
	}
}
