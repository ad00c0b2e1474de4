//! Logging macros that set target to "socksgate" for all log calls.
//!
//! Without an explicit target, tracing uses the full module path
//! (e.g., "socksgate::server::connection") as the logger name. These macros
//! keep every log line from this crate under a single "socksgate" target so
//! operators can filter on one name.

macro_rules! trace {
    ($($arg:tt)*) => { ::tracing::trace!(target: "socksgate", $($arg)*) };
}

macro_rules! debug {
    ($($arg:tt)*) => { ::tracing::debug!(target: "socksgate", $($arg)*) };
}

macro_rules! info {
    ($($arg:tt)*) => { ::tracing::info!(target: "socksgate", $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { ::tracing::warn!(target: "socksgate", $($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { ::tracing::error!(target: "socksgate", $($arg)*) };
}
