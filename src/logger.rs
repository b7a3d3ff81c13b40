//! Console output with quiet / verbose switches.
//!
//! While a batch runs the front-end attaches its progress bar here, so lines
//! printed from worker threads are drawn above the bar instead of through it.

use indicatif::ProgressBar;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

static QUIET_MODE: AtomicBool = AtomicBool::new(false);
static VERBOSE_MODE: AtomicBool = AtomicBool::new(false);
static ATTACHED_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Verbose,
    Warn,
    Error,
}

pub fn set_quiet_mode(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

pub fn set_verbose_mode(verbose: bool) {
    VERBOSE_MODE.store(verbose, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

pub fn is_verbose() -> bool {
    VERBOSE_MODE.load(Ordering::Relaxed)
}

pub fn is_enabled(level: Level) -> bool {
    match level {
        Level::Error => true,
        Level::Info | Level::Warn => !is_quiet(),
        Level::Verbose => is_verbose() && !is_quiet(),
    }
}

/// Route subsequent output through `bar` until [`detach_progress_bar`].
pub fn attach_progress_bar(bar: &ProgressBar) {
    if let Ok(mut slot) = ATTACHED_BAR.lock() {
        *slot = Some(bar.clone());
    }
}

pub fn detach_progress_bar() {
    if let Ok(mut slot) = ATTACHED_BAR.lock() {
        *slot = None;
    }
}

pub fn emit(level: Level, message: String) {
    if !is_enabled(level) {
        return;
    }

    let line = match level {
        Level::Info => message,
        Level::Verbose => format!("🔍 {}", message),
        Level::Warn => format!("⚠️  {}", message),
        Level::Error => format!("❌ {}", message),
    };

    let bar = ATTACHED_BAR.lock().ok().and_then(|slot| slot.clone());
    match bar {
        Some(bar) if !bar.is_hidden() => bar.println(line),
        _ => match level {
            Level::Info | Level::Verbose => println!("{}", line),
            Level::Warn | Level::Error => eprintln!("{}", line),
        },
    }
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Info, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Verbose, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Warn, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Error, format!($($arg)*))
    };
}
