//! Process-wide logging setup: severity-tagged macros (`huge!`, `verb!`,
//! `err!`, `fatal!`) over the `log` facade, with `env_logger` as the
//! installed implementation.

pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Very verbose, per-packet detail. Maps to `log::trace!`.
#[macro_export]
macro_rules! huge {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

/// Per-request detail. Maps to `log::debug!`.
#[macro_export]
macro_rules! verb {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

/// Unrecoverable-for-this-request errors. Maps to `log::error!`.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => { log::error!($($arg)*) };
}

/// Startup failures the process cannot continue past: logs at error level,
/// then exits. Only appropriate where the caller owns the whole process
/// (the gateway binary, not a loaded plugin). Expands to a never-typed
/// tail expression, so it can stand in for any value, including a match arm.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        std::process::exit(1)
    }};
}
