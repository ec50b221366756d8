pub mod cycle;
pub mod operator;
pub mod pause;

pub use cycle::{Classification, CycleOutcome, CycleRecord};
pub use operator::{Operator, OperatorId, Task, TaskId};
pub use pause::{PauseOutcome, PauseRecord};
