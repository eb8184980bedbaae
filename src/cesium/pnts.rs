use byteorder::{LittleEndian, WriteBytesExt};
use serde::Serialize;

use crate::error::Result;
use crate::model::vector3::Vector3;

const HEADER_SIZE: usize = 28;

#[derive(Serialize)]
struct ByteOffset {
	#[serde(rename = "byteOffset")]
	byte_offset: usize,
}

#[derive(Serialize)]
struct FeatureTable {
	#[serde(rename = "POINTS_LENGTH")]
	points_length: usize,
	#[serde(rename = "POSITION")]
	position: ByteOffset,
	#[serde(rename = "RTC_CENTER")]
	rtc_center: [f64; 3],
}

fn pad(buffer: &mut Vec<u8>, fill: u8) {
	while buffer.len() % 8 != 0 {
		buffer.push(fill);
	}
}

/// Encodes a point cloud tile holding only positions, stored as f32 offsets
/// from `center`.
pub fn encode(points: &[Vector3], center: &Vector3) -> Result<Vec<u8>> {
	let table = FeatureTable {
		points_length: points.len(),
		position: ByteOffset { byte_offset: 0 },
		rtc_center: center.to_array(),
	};

	// The JSON is padded so the binary body starts on an 8 byte boundary.
	let mut json = serde_json::to_vec(&table)?;
	while (HEADER_SIZE + json.len()) % 8 != 0 {
		json.push(b' ');
	}

	let mut body: Vec<u8> = Vec::with_capacity(points.len() * 12);
	for point in points {
		let offset = point - center;
		body.write_f32::<LittleEndian>(offset.x as f32)?;
		body.write_f32::<LittleEndian>(offset.y as f32)?;
		body.write_f32::<LittleEndian>(offset.z as f32)?;
	}
	pad(&mut body, 0);

	let total = HEADER_SIZE + json.len() + body.len();
	let mut buffer: Vec<u8> = Vec::with_capacity(total);
	buffer.extend_from_slice(b"pnts");
	buffer.write_u32::<LittleEndian>(1)?;
	buffer.write_u32::<LittleEndian>(total as u32)?;
	buffer.write_u32::<LittleEndian>(json.len() as u32)?;
	buffer.write_u32::<LittleEndian>(body.len() as u32)?;
	buffer.write_u32::<LittleEndian>(0)?;
	buffer.write_u32::<LittleEndian>(0)?;
	buffer.extend_from_slice(&json);
	buffer.extend_from_slice(&body);

	Ok(buffer)
}
