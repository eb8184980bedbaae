pub mod attributes;
pub mod bounds;
pub mod cell;
pub mod id;
pub mod metadata;
pub mod vector3;
