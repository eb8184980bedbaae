pub mod cesium;
pub mod csv_reader;
pub mod error;
pub mod model;
pub mod storage;
pub mod tree;

pub use error::{Error, Result};
pub use tree::builder::Builder;
