//! Operator-scoped logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! Usage:
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{op_info, op_warn};
//!
//! op_info!(operator_id, "cycle registered ({:.1}s)", elapsed);
//! ```
//!
//! Every line is prefixed with `operator <id>:` so a single operator's
//! history can be grepped out of an interleaved log.

#[macro_export]
macro_rules! op_info {
    ($operator:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            ::log::info!("operator {}: {}", $operator, format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! op_warn {
    ($operator:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            ::log::warn!("operator {}: {}", $operator, format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! op_error {
    ($operator:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            ::log::error!("operator {}: {}", $operator, format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! op_debug {
    ($operator:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            ::log::debug!("operator {}: {}", $operator, format_args!($($arg)*));
        }
    };
}
