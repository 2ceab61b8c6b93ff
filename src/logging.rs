use std::sync::atomic::AtomicBool;
pub(crate) static TRACE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Turns on frame-level tracing. Traced frames go to the `log` facade at trace level, so
/// `RUST_LOG` still has to let them through.
pub fn enable_tracing() {
    TRACE_ENABLED.store(true, std::sync::atomic::Ordering::Relaxed);
}

pub fn tracing_enabled() -> bool {
    TRACE_ENABLED.load(std::sync::atomic::Ordering::Relaxed)
}

#[macro_export]
macro_rules! trace_packet {
    ($($arg:tt)*) => {{
        if $crate::logging::TRACE_ENABLED.load(std::sync::atomic::Ordering::Relaxed) {
            log::trace!("[TRACE] {}", std::format!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}
