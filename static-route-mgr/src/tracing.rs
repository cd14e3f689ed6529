//! Thin wrappers around `tracing` macros, tagged so static-route events are
//! easy to filter out of the rest of a control-plane's log stream.

macro_rules! static_info {
    ($($arg:tt)*) => {
        tracing::info!(proto = "static-route", $($arg)*)
    };
}

macro_rules! static_warn {
    ($($arg:tt)*) => {
        tracing::warn!(proto = "static-route", $($arg)*)
    };
}

macro_rules! static_debug {
    ($($arg:tt)*) => {
        tracing::debug!(proto = "static-route", $($arg)*)
    };
}

macro_rules! static_trace {
    ($($arg:tt)*) => {
        tracing::trace!(proto = "static-route", $($arg)*)
    };
}

pub(crate) use static_debug;
pub(crate) use static_info;
pub(crate) use static_trace;
pub(crate) use static_warn;
