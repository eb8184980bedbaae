//! Destinations for named blobs.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use log::debug;

use crate::error::{Error, Result};

pub trait Endpoint: Send + Sync {
	fn put(&self, name: &str, bytes: &[u8]) -> Result<()>;

	fn get(&self, name: &str) -> Result<Vec<u8>>;

	/// Writes a blob or fails the operation in progress. No retries happen
	/// here; a destination that wants them does so in `put`.
	fn ensure_put(&self, name: &str, bytes: &[u8]) -> Result<()> {
		self.put(name, bytes)?;
		debug!("Wrote {} ({} bytes)", name, bytes.len());
		Ok(())
	}

	fn get_string(&self, name: &str) -> Result<String> {
		String::from_utf8(self.get(name)?)
			.map_err(|e| Error::Format(format!("{} is not UTF-8: {}", name, e)))
	}
}

/// A directory on the local filesystem.
pub struct LocalEndpoint {
	root: PathBuf,
}

impl LocalEndpoint {
	pub fn new(root: impl Into<PathBuf>) -> LocalEndpoint {
		LocalEndpoint { root: root.into() }
	}
}

impl Endpoint for LocalEndpoint {
	fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
		let path = self.root.join(name);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		fs::write(path, bytes)?;
		Ok(())
	}

	fn get(&self, name: &str) -> Result<Vec<u8>> {
		let path = self.root.join(name);
		if !path.exists() {
			return Err(Error::NotFound(name.to_string()));
		}
		Ok(fs::read(path)?)
	}
}

/// Blobs kept in memory.
#[derive(Default)]
pub struct MemoryEndpoint {
	blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryEndpoint {
	pub fn new() -> MemoryEndpoint {
		MemoryEndpoint::default()
	}

	pub fn names(&self) -> Vec<String> {
		self.blobs.lock().unwrap().keys().cloned().collect()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.blobs.lock().unwrap().contains_key(name)
	}
}

impl Endpoint for MemoryEndpoint {
	fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
		self.blobs
			.lock()
			.unwrap()
			.insert(name.to_string(), bytes.to_vec());
		Ok(())
	}

	fn get(&self, name: &str) -> Result<Vec<u8>> {
		self.blobs
			.lock()
			.unwrap()
			.get(name)
			.cloned()
			.ok_or_else(|| Error::NotFound(name.to_string()))
	}
}

/// Another endpoint, with every name placed under `prefix/`.
pub struct SubEndpoint<'a> {
	inner: &'a dyn Endpoint,
	prefix: String,
}

impl<'a> SubEndpoint<'a> {
	pub fn new(inner: &'a dyn Endpoint, prefix: &str) -> SubEndpoint<'a> {
		SubEndpoint {
			inner,
			prefix: prefix.trim_end_matches('/').to_string(),
		}
	}

	fn full(&self, name: &str) -> String {
		format!("{}/{}", self.prefix, name)
	}
}

impl Endpoint for SubEndpoint<'_> {
	fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
		self.inner.put(&self.full(name), bytes)
	}

	fn get(&self, name: &str) -> Result<Vec<u8>> {
		self.inner.get(&self.full(name))
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use crate::error::Error;
	use crate::storage::{Endpoint, LocalEndpoint, MemoryEndpoint, SubEndpoint};

	#[test]
	fn test_local_round_trip() {
		let temp_dir = TempDir::new().expect("failed to create temp dir");
		let endpoint = LocalEndpoint::new(temp_dir.path());
		let sub = SubEndpoint::new(&endpoint, "cesium/");

		sub.ensure_put("tileset.json", b"{}").unwrap();
		assert!(temp_dir.path().join("cesium/tileset.json").exists());
		assert_eq!(endpoint.get_string("cesium/tileset.json").unwrap(), "{}");
		assert!(matches!(endpoint.get("missing"), Err(Error::NotFound(_))));
	}

	#[test]
	fn test_memory_round_trip() {
		let endpoint = MemoryEndpoint::new();
		endpoint.ensure_put("a", &[1, 2, 3]).unwrap();
		assert_eq!(endpoint.get("a").unwrap(), vec![1, 2, 3]);
		assert!(endpoint.contains("a"));
		assert!(endpoint.get("b").is_err());
	}
}
