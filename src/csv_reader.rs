use byteorder::{LittleEndian, WriteBytesExt};
use csv::{Reader, StringRecord};

use crate::error::{Error, Result};
use crate::model::attributes::Schema;
use crate::model::cell::Cell;
use crate::model::vector3::Vector3;

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
	headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn parse(record: &StringRecord, index: usize) -> Result<f64> {
	let field = record.get(index).unwrap_or("").trim();
	field
		.parse::<f64>()
		.map_err(|e| Error::Format(format!("bad value {:?}: {}", field, e)))
}

/// Reads points with `x`, `y` and `z` columns. Every schema attribute is
/// taken from the column of the same name and stored as a little endian
/// unsigned integer of the attribute's size; a missing column gives zeros.
pub fn from_csv(buf: &[u8], schema: &Schema) -> Result<Vec<Cell>> {
	let mut rdr = Reader::from_reader(buf);
	let headers = rdr.headers()?.clone();

	let mut xyz = [0; 3];
	for (slot, name) in xyz.iter_mut().zip(["x", "y", "z"]) {
		*slot = column(&headers, name)
			.ok_or_else(|| Error::Format(format!("missing column {}", name)))?;
	}
	let extras: Vec<(Option<usize>, usize)> = schema
		.list
		.iter()
		.map(|a| (column(&headers, &a.name), a.size))
		.collect();

	let mut cells = Vec::new();
	for result in rdr.records() {
		let record = result?;
		let point = Vector3::new(
			parse(&record, xyz[0])?,
			parse(&record, xyz[1])?,
			parse(&record, xyz[2])?,
		);

		let mut bytes: Vec<u8> = Vec::with_capacity(schema.extra_size());
		for (index, size) in &extras {
			let value = match index {
				Some(i) => parse(&record, *i)?.round().max(0.0) as u64,
				None => 0,
			};
			if *size > 8 {
				bytes.write_u64::<LittleEndian>(value)?;
				bytes.resize(bytes.len() + size - 8, 0);
			} else if *size == 8 {
				bytes.write_u64::<LittleEndian>(value)?;
			} else if *size > 0 {
				let max = (1u64 << (8 * size)) - 1;
				bytes.write_uint::<LittleEndian>(value.min(max), *size)?;
			}
		}

		cells.push(Cell::new(point, bytes));
	}

	Ok(cells)
}
