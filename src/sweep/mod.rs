pub mod plan;
pub mod settings;
pub mod storage;

pub use plan::{Averages, SweepMode, SweepPlan, SweepProperties};
pub use settings::{AcquisitionSettings, SweepSettings, ValidationSettings};
pub use storage::SettingsStorage;
