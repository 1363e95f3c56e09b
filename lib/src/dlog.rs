//! Diagnostic logging funnel.
//!
//! All library diagnostics go through a single **backend** function pointer.
//! Until a host registers one, lines are dropped — a library usable from
//! both kernel and userspace cannot assume where output should go.  The
//! `leafwalk` CLI registers a stderr backend at startup.
//!
//! Walk records themselves are not log output: they go through the sink
//! passed to [`LeafWalker::run`](crate::LeafWalker::run).  dlog carries
//! ceiling discovery and other incidental diagnostics only.
//!
//! # Backend contract
//!
//! The backend receives the pre-formatted arguments for a **single log
//! line** and is responsible for:
//!
//! 1. Writing the formatted text atomically (no interleaving between
//!    threads).
//! 2. Appending a trailing newline after the text.

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// Log levels
// ---------------------------------------------------------------------------

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DlogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DlogLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => DlogLevel::Error,
            1 => DlogLevel::Warn,
            2 => DlogLevel::Info,
            3 => DlogLevel::Debug,
            _ => DlogLevel::Trace,
        }
    }
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(DlogLevel::Info as u8);

#[inline(always)]
fn is_enabled(level: DlogLevel) -> bool {
    level as u8 <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Backend dispatch
// ---------------------------------------------------------------------------

/// Signature of a dlog backend.
///
/// The backend must write the formatted text **and** a trailing newline,
/// all under a single lock acquisition (if applicable) so that log lines
/// from different threads do not interleave.
pub type DlogBackend = fn(fmt::Arguments<'_>);

/// Stored as a raw pointer; `null` means "no backend, drop the line".
static BACKEND: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Dispatch a log line through the active backend, if any.
#[inline]
fn dispatch(args: fmt::Arguments<'_>) {
    let ptr = BACKEND.load(Ordering::Acquire);
    if ptr.is_null() {
        return;
    }
    // SAFETY: `dlog_register_backend` only stores valid `DlogBackend` fn
    // pointers, which are the same size as `*mut ()` on all supported
    // targets.
    let backend: DlogBackend = unsafe { core::mem::transmute(ptr) };
    backend(args);
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Register the backend that receives all subsequent log lines.
///
/// Typically called once by the host during its initialisation.
pub fn dlog_register_backend(backend: DlogBackend) {
    BACKEND.store(backend as *mut (), Ordering::Release);
}

pub fn dlog_set_level(level: DlogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn dlog_get_level() -> DlogLevel {
    DlogLevel::from_raw(CURRENT_LEVEL.load(Ordering::Relaxed))
}

pub fn dlog_is_enabled(level: DlogLevel) -> bool {
    is_enabled(level)
}

/// Emit a formatted log line at the given level.
///
/// The backend appends the trailing newline — callers should **not**
/// include one in their format string.
pub fn log_args(level: DlogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    dispatch(args);
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

#[macro_export]
macro_rules! dlog {
    ($level:expr, $($arg:tt)*) => {{
        $crate::dlog::log_args($level, ::core::format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! dlog_error {
    ($($arg:tt)*) => {
        $crate::dlog::log_args($crate::dlog::DlogLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! dlog_warn {
    ($($arg:tt)*) => {
        $crate::dlog::log_args($crate::dlog::DlogLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! dlog_info {
    ($($arg:tt)*) => {
        $crate::dlog::log_args($crate::dlog::DlogLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! dlog_debug {
    ($($arg:tt)*) => {
        $crate::dlog::log_args($crate::dlog::DlogLevel::Debug, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! dlog_trace {
    ($($arg:tt)*) => {
        $crate::dlog::log_args($crate::dlog::DlogLevel::Trace, ::core::format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    // Level and backend state are process-global, so everything lives in a
    // single sequenced test.
    #[test]
    fn level_gating_and_backend_dispatch() {
        static LINES: AtomicUsize = AtomicUsize::new(0);
        fn counting_backend(_args: fmt::Arguments<'_>) {
            LINES.fetch_add(1, Ordering::Relaxed);
        }

        assert_eq!(dlog_get_level(), DlogLevel::Info);
        assert!(dlog_is_enabled(DlogLevel::Error));
        assert!(!dlog_is_enabled(DlogLevel::Trace));

        dlog_register_backend(counting_backend);

        log_args(DlogLevel::Error, format_args!("reported"));
        assert_eq!(LINES.load(Ordering::Relaxed), 1);

        // Below-threshold lines never reach the backend.
        log_args(DlogLevel::Trace, format_args!("suppressed"));
        assert_eq!(LINES.load(Ordering::Relaxed), 1);

        dlog_set_level(DlogLevel::Trace);
        assert!(dlog_is_enabled(DlogLevel::Trace));
        log_args(DlogLevel::Trace, format_args!("now reported"));
        assert_eq!(LINES.load(Ordering::Relaxed), 2);

        dlog_set_level(DlogLevel::Info);
    }
}
