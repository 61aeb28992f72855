//! # zdefer-preload
//!
//! `LD_PRELOAD` library that turns every zlib deflate stream in a process
//! into a single high-ratio zopfli pass, while callers keep driving zlib's
//! ordinary streaming API.
//!
//! ## Usage (Linux)
//!
//! ```bash
//! LD_PRELOAD=/path/to/libzdefer_preload.so \
//! ZDEFER_LOG=debug \
//! optipng image.png
//! ```
//!
//! ## Environment Variables
//!
//! - `ZDEFER_CONFIG`: additional TOML configuration file
//! - `ZDEFER_DISABLE`: leave every stream to zlib if set to `1`/`true`
//! - `ZDEFER_INITIAL_CAPACITY`: initial input buffer size in bytes
//! - `ZDEFER_EFFORT`: iteration table, e.g. `8192:1000,65536:100,15`
//! - `ZDEFER_LOG`: `tracing` filter directive
//! - `ZDEFER_LOG_COLOR`: ANSI SGR code used to highlight diagnostics
//!
//! A process can replace any entry point by exporting `zdefer_<entry point>`
//! (for example `zdefer_deflate`) from an object loaded ahead of this one.

#![allow(clippy::missing_safety_doc)]

#[macro_use]
mod macros;
mod entry;

use libc::{c_char, c_int, c_uint, c_ulong, c_void};
use once_cell::sync::Lazy;
use zdefer_config::logging::init_logging;
use zdefer_config::{config, log_shim_debug};
use zdefer_core::{Interceptor, OriginalDeflate, ShimSettings, ZStream, Zopfli};

use entry::*;

static SETTINGS: Lazy<ShimSettings> = Lazy::new(|| ShimSettings::from_config(&config()));

pub(crate) fn interceptor() -> Interceptor<'static, RealZlib, Zopfli> {
    Interceptor::new(&RealZlib, &Zopfli, &SETTINGS)
}

/// The host's zlib, reached through each slot's original target.
pub(crate) struct RealZlib;

impl OriginalDeflate for RealZlib {
    unsafe fn deflate_init2(
        &self,
        strm: *mut ZStream,
        level: c_int,
        method: c_int,
        window_bits: c_int,
        mem_level: c_int,
        strategy: c_int,
        version: *const c_char,
        stream_size: c_int,
    ) -> c_int {
        (DEFLATE_INIT2.original())(
            strm,
            level,
            method,
            window_bits,
            mem_level,
            strategy,
            version,
            stream_size,
        )
    }

    unsafe fn deflate(&self, strm: *mut ZStream, flush: c_int) -> c_int {
        (DEFLATE.original())(strm, flush)
    }

    unsafe fn deflate_reset(&self, strm: *mut ZStream) -> c_int {
        (DEFLATE_RESET.original())(strm)
    }

    unsafe fn deflate_end(&self, strm: *mut ZStream) -> c_int {
        (DEFLATE_END.original())(strm)
    }

    unsafe fn deflate_set_dictionary(
        &self,
        strm: *mut ZStream,
        dictionary: *const u8,
        dict_length: c_uint,
    ) -> c_int {
        (DEFLATE_SET_DICTIONARY.original())(strm, dictionary, dict_length)
    }

    unsafe fn deflate_get_dictionary(
        &self,
        strm: *mut ZStream,
        dictionary: *mut u8,
        dict_length: *mut c_uint,
    ) -> c_int {
        (DEFLATE_GET_DICTIONARY.original())(strm, dictionary, dict_length)
    }

    unsafe fn deflate_copy(&self, dest: *mut ZStream, source: *mut ZStream) -> c_int {
        (DEFLATE_COPY.original())(dest, source)
    }

    unsafe fn deflate_params(&self, strm: *mut ZStream, level: c_int, strategy: c_int) -> c_int {
        (DEFLATE_PARAMS.original())(strm, level, strategy)
    }

    unsafe fn deflate_tune(
        &self,
        strm: *mut ZStream,
        good_length: c_int,
        max_lazy: c_int,
        nice_length: c_int,
        max_chain: c_int,
    ) -> c_int {
        (DEFLATE_TUNE.original())(strm, good_length, max_lazy, nice_length, max_chain)
    }

    unsafe fn deflate_bound(&self, strm: *mut ZStream, source_len: c_ulong) -> c_ulong {
        (DEFLATE_BOUND.original())(strm, source_len)
    }

    unsafe fn deflate_pending(
        &self,
        strm: *mut ZStream,
        pending: *mut c_uint,
        bits: *mut c_int,
    ) -> c_int {
        (DEFLATE_PENDING.original())(strm, pending, bits)
    }

    unsafe fn deflate_prime(&self, strm: *mut ZStream, bits: c_int, value: c_int) -> c_int {
        (DEFLATE_PRIME.original())(strm, bits, value)
    }

    unsafe fn deflate_set_header(&self, strm: *mut ZStream, head: *mut c_void) -> c_int {
        (DEFLATE_SET_HEADER.original())(strm, head)
    }
}

/// Runs when the loader maps the library: installs the stderr subscriber
/// unless the host already has one.
#[cfg(target_os = "linux")]
#[link_section = ".init_array"]
#[used]
pub static ZDEFER_INIT_LINUX: unsafe extern "C" fn() = {
    unsafe extern "C" fn init() {
        let config = config();
        init_logging(&config.log);
        log_shim_debug!(
            "preload active",
            enabled = config.shim.enabled,
            initial_capacity = config.shim.initial_capacity
        );
    }
    init
};
