pub mod vna;

pub use vna::{default_response, FaultMode, InstrumentLog, ResponseFn, SimulatedVna};
