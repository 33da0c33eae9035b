//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! The reminder loop and the alarm worker run for the whole lifetime of the
//! app, so their per-tick chatter can be switched off per module without
//! touching `RUST_LOG`:
//!
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info, log_warn};
//!
//! log_info!("recheck tick found {} due medicines", due.len());
//! ```
//!
//! Errors from external collaborators (storage, notifications, audio) are
//! logged with `log::error!` directly so they are never silenced.

/// Shared expansion for the gated macros below.
#[macro_export]
macro_rules! gated_log {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::$level!($($arg)*);
        }
    };
}

/// Debug logging, only when the calling module sets `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::gated_log!(debug, $($arg)*)
    };
}

/// Info logging, only when the calling module sets `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::gated_log!(info, $($arg)*)
    };
}

/// Warn logging, only when the calling module sets `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::gated_log!(warn, $($arg)*)
    };
}

/// Error logging, only when the calling module sets `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::gated_log!(error, $($arg)*)
    };
}
