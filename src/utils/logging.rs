//! Conditional logging macros gated on a module-level `ENABLE_LOGS` const.
//!
//! Modules that use them declare:
//! ```rust
//! const ENABLE_LOGS: bool = true;
//! ```
//! and then call `log_info!` / `log_warn!` / `log_error!` (exported at the
//! crate root) like the plain `log` macros.

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
