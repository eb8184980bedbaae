use glam::DMat4;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::bounds::Bounds;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingVolume {
	/// Center, then the x, y and z half-axis vectors.
	#[serde(rename = "box")]
	pub bbox: [f64; 12],
}

impl BoundingVolume {
	pub fn from_bounds(bounds: &Bounds) -> BoundingVolume {
		let mid = bounds.mid();
		BoundingVolume {
			bbox: [
				mid.x,
				mid.y,
				mid.z,
				bounds.size_x / 2.0,
				0.0,
				0.0,
				0.0,
				bounds.size_y / 2.0,
				0.0,
				0.0,
				0.0,
				bounds.size_z / 2.0,
			],
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content {
	pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
	pub bounding_volume: BoundingVolume,
	pub geometric_error: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub content: Option<Content>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<Tile>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refine: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transform: Option<Vec<f64>>,
}

impl Tile {
	pub fn new(bounds: &Bounds, geometric_error: f64, url: Option<String>) -> Tile {
		Tile {
			bounding_volume: BoundingVolume::from_bounds(bounds),
			geometric_error,
			content: url.map(|url| Content { url }),
			children: Vec::new(),
			refine: None,
			transform: None,
		}
	}

	pub fn url(&self) -> Option<&str> {
		self.content.as_ref().map(|c| c.url.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Asset {
	pub version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tileset {
	pub asset: Asset,
	pub geometric_error: f64,
	pub root: Tile,
}

impl Tileset {
	pub fn new(geometric_error: f64, root: Tile) -> Tileset {
		Tileset {
			asset: Asset {
				version: "0.0".to_string(),
			},
			geometric_error,
			root,
		}
	}

	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		Ok(serde_json::to_vec_pretty(self)?)
	}

	pub fn from_bytes(bytes: &[u8]) -> Result<Tileset> {
		Ok(serde_json::from_slice(bytes)?)
	}
}

/// Inverse of a row-major transform, flattened column-major.
pub fn column_major_inverse(row_major: &[f64; 16]) -> Result<[f64; 16]> {
	let matrix = DMat4::from_cols_array(row_major).transpose();
	if matrix.determinant() == 0.0 {
		return Err(Error::Config("transformation is not invertible".to_string()));
	}
	Ok(matrix.inverse().to_cols_array())
}
