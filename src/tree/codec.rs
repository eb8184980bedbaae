use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::model::attributes::Schema;
use crate::model::cell::Cell;
use crate::model::vector3::Vector3;

// cell count + per cell: x, y, z + record count + records
pub fn write_cells<'a, I>(cells: I, schema: &Schema) -> Result<Vec<u8>>
where
	I: IntoIterator<Item = &'a Cell>,
	I::IntoIter: ExactSizeIterator,
{
	let cells = cells.into_iter();
	let extra = schema.extra_size();
	let mut buffer: Vec<u8> = Vec::new();

	buffer.write_u64::<LittleEndian>(cells.len() as u64)?;
	for cell in cells {
		buffer.write_f64::<LittleEndian>(cell.point.x)?;
		buffer.write_f64::<LittleEndian>(cell.point.y)?;
		buffer.write_f64::<LittleEndian>(cell.point.z)?;
		buffer.write_u32::<LittleEndian>(cell.records.len() as u32)?;
		for record in &cell.records {
			if record.len() != extra {
				return Err(Error::Format(format!(
					"record of {} bytes, schema expects {}",
					record.len(),
					extra
				)));
			}
			buffer.extend_from_slice(record);
		}
	}

	Ok(buffer)
}

pub fn read_cells(bytes: &[u8], schema: &Schema) -> Result<Vec<Cell>> {
	let extra = schema.extra_size();
	let mut rdr = Cursor::new(bytes);
	let count = rdr.read_u64::<LittleEndian>()?;
	let mut cells = Vec::new();

	for _ in 0..count {
		let point = Vector3 {
			x: rdr.read_f64::<LittleEndian>()?,
			y: rdr.read_f64::<LittleEndian>()?,
			z: rdr.read_f64::<LittleEndian>()?,
		};
		let num_records = rdr.read_u32::<LittleEndian>()? as usize;
		let mut records = Vec::with_capacity(num_records);
		for _ in 0..num_records {
			let start = rdr.position() as usize;
			let end = start + extra;
			if end > bytes.len() {
				return Err(Error::Format("truncated chunk data".to_string()));
			}
			records.push(bytes[start..end].to_vec());
			rdr.set_position(end as u64);
		}
		cells.push(Cell { point, records });
	}

	Ok(cells)
}
