pub mod traits;
pub mod mock;

pub use traits::{InstrumentLink, ValueKind};
