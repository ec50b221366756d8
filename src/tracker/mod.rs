pub mod controller;
pub mod state;

pub use controller::ProductionTracker;
pub use state::{OperatorState, WorkStatus};
