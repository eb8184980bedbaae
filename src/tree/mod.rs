pub mod builder;
pub mod chunk;
pub mod climber;
pub mod codec;
pub mod registry;
pub mod tube;
