pub mod classify;
pub mod window;

pub use classify::{classify, Thresholds};
pub use window::{RollingWindow, WINDOW_CAPACITY};
