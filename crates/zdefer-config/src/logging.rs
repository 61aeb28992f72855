//! Structured logging utilities for zdefer components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use zdefer_config::log_shim_debug;
//!
//! log_shim_debug!("input absorbed", bytes = 4096usize);
//! ```

use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::LogConfig;

// === SHIM logging macros ===

#[macro_export]
macro_rules! log_shim_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "SHIM", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_shim_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "SHIM", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_shim_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "SHIM", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_shim_trace {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::trace!(component = "SHIM", $($key = $value,)* $msg)
    };
}

// === SLOT logging macros ===

#[macro_export]
macro_rules! log_slot_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "SLOT", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_slot_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "SLOT", $($key = $value,)* $msg)
    };
}

// === BATCH logging macros ===

#[macro_export]
macro_rules! log_batch_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "BATCH", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_batch_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "BATCH", $($key = $value,)* $msg)
    };
}

const RESET: &[u8] = b"\x1b[0m";

/// Turn an SGR code such as `"33"` or `"1;31"` into an escape prefix.
/// Anything other than digits and `;` is rejected.
pub fn ansi_prefix(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit() || b == b';') {
        return None;
    }
    Some(format!("\x1b[{}m", code))
}

/// Stderr writer factory that wraps every emitted line in a color escape.
pub struct ColorStderr {
    prefix: Option<String>,
}

impl ColorStderr {
    pub fn new(color: Option<&str>) -> Self {
        Self {
            prefix: color.and_then(ansi_prefix),
        }
    }
}

impl<'a> MakeWriter<'a> for ColorStderr {
    type Writer = ColorWriter<'a, io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        ColorWriter::new(self.prefix.as_deref(), io::stderr())
    }
}

pub struct ColorWriter<'a, W> {
    prefix: Option<&'a str>,
    inner: W,
}

impl<'a, W: Write> ColorWriter<'a, W> {
    pub fn new(prefix: Option<&'a str>, inner: W) -> Self {
        Self { prefix, inner }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ColorWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(prefix) = self.prefix else {
            return self.inner.write(buf);
        };
        let body = buf.strip_suffix(b"\n").unwrap_or(buf);
        self.inner.write_all(prefix.as_bytes())?;
        self.inner.write_all(body)?;
        self.inner.write_all(RESET)?;
        if body.len() != buf.len() {
            self.inner.write_all(b"\n")?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Install the diagnostic subscriber. Never replaces a subscriber the host
/// process already installed.
pub fn init_logging(log: &LogConfig) {
    let default = if cfg!(debug_assertions) { "debug" } else { "warn" };
    let env_filter = log
        .level
        .as_deref()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(ColorStderr::new(log.color.as_deref()))
        .try_init();
}
