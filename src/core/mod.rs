pub mod datapoint;
pub mod rftools;

pub use datapoint::{Datapoint, SPEED_OF_LIGHT, Z0};
