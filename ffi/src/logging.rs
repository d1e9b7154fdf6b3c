//! Console diagnostics for external callers.
//!
//! The first call wins: the process-wide subscriber is installed once
//! with the requested maximum level, and later calls are no-ops (the
//! subscriber cannot be torn down once handed to `tracing`).

use std::sync::Once;

use tracing_subscriber::filter::LevelFilter;

use crate::{qvr_error_t, qvr_log_level_t};

static INIT: Once = Once::new();

fn level_filter(level: qvr_log_level_t) -> LevelFilter {
    match level {
        qvr_log_level_t::QVR_LOG_DEBUG => LevelFilter::DEBUG,
        qvr_log_level_t::QVR_LOG_INFO => LevelFilter::INFO,
        qvr_log_level_t::QVR_LOG_WARN => LevelFilter::WARN,
        qvr_log_level_t::QVR_LOG_ERROR => LevelFilter::ERROR,
        qvr_log_level_t::QVR_LOG_OFF => LevelFilter::OFF,
    }
}

pub(crate) fn init_logging(level: qvr_log_level_t) {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level_filter(level))
            .with_target(false)
            .try_init();
    });
}

/// Installs the console logger at the given level. Only the first call
/// in a process has an effect.
#[no_mangle]
pub extern "C" fn qvr_set_log_level(level: qvr_log_level_t) -> qvr_error_t {
    init_logging(level);
    qvr_error_t::QVR_OK
}
