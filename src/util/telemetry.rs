//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted for filter directives before `RUST_LOG`.
pub const LOG_ENV: &str = "SLOT_SCHEDULER_LOG";

/// Initialize tracing. Users can install their own subscriber; this helper
/// installs an env-filtered fmt subscriber only if none is set.
///
/// Directives come from `SLOT_SCHEDULER_LOG`, falling back to `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::from_default_env());
    install(filter);
}

/// Initialize tracing with explicit filter directives such as
/// `"prometheus_slot_scheduler=debug"`. Invalid directives fall back to `info`.
pub fn init_tracing_with(directives: &str) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    install(filter);
}

fn install(filter: EnvFilter) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
