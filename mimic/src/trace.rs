// vim: tw=80
//! Internal event macros.
//!
//! With the `tracing` feature enabled these forward to the `tracing` crate.
//! Otherwise they expand to nothing, so the engine carries no logging cost.

cfg_if::cfg_if! {
    if #[cfg(feature = "tracing")] {
        macro_rules! trace_event {
            ($($arg:tt)*) => { ::tracing::trace!($($arg)*) };
        }

        macro_rules! debug_event {
            ($($arg:tt)*) => { ::tracing::debug!($($arg)*) };
        }
    } else {
        macro_rules! trace_event {
            ($($arg:tt)*) => {};
        }

        macro_rules! debug_event {
            ($($arg:tt)*) => {};
        }
    }
}
