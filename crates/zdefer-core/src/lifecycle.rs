//! Shim-aware implementations of the deflate lifecycle entry points.
//!
//! `Interceptor` sits between the exported symbols and two collaborators:
//! the wrapped library's own entry points (`OriginalDeflate`) and the batch
//! compressor. Status codes from the original are returned verbatim; the
//! shim itself only ever answers with zlib's own codes.
//!
//! Entry points the shim cannot model follow one policy:
//!
//! | entry point | behavior |
//! |---|---|
//! | `deflateParams`, `deflateTune`, `deflateBound` | passed through, shim untouched |
//! | `deflatePending` | answered from the shim's undrained output while active |
//! | `deflateCopy` | destination receives a deep copy of the source shim |
//! | `deflateSetDictionary`, `deflateGetDictionary`, `deflatePrime`, `deflateSetHeader` | pristine shim: bypassed, then passed through; otherwise `Z_STREAM_ERROR` |

use libc::{c_char, c_int, c_uint, c_ulong, c_void};
use zdefer_config::{log_shim_debug, log_shim_trace, log_shim_warn, Config};

use crate::compressor::BatchCompressor;
use crate::effort::EffortPolicy;
use crate::extension;
use crate::format::Format;
use crate::shim::{BypassCause, Phase, StreamShim};
use crate::zlib::*;

/// The wrapped library's entry points, reached without any override.
pub trait OriginalDeflate {
    #[allow(clippy::too_many_arguments)]
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
    ) -> c_int;
    unsafe fn deflate(&self, strm: *mut ZStream, flush: c_int) -> c_int;
    unsafe fn deflate_reset(&self, strm: *mut ZStream) -> c_int;
    unsafe fn deflate_end(&self, strm: *mut ZStream) -> c_int;
    unsafe fn deflate_set_dictionary(
        &self,
        strm: *mut ZStream,
        dictionary: *const u8,
        dict_length: c_uint,
    ) -> c_int;
    unsafe fn deflate_get_dictionary(
        &self,
        strm: *mut ZStream,
        dictionary: *mut u8,
        dict_length: *mut c_uint,
    ) -> c_int;
    unsafe fn deflate_copy(&self, dest: *mut ZStream, source: *mut ZStream) -> c_int;
    unsafe fn deflate_params(&self, strm: *mut ZStream, level: c_int, strategy: c_int) -> c_int;
    unsafe fn deflate_tune(
        &self,
        strm: *mut ZStream,
        good_length: c_int,
        max_lazy: c_int,
        nice_length: c_int,
        max_chain: c_int,
    ) -> c_int;
    unsafe fn deflate_bound(&self, strm: *mut ZStream, source_len: c_ulong) -> c_ulong;
    unsafe fn deflate_pending(
        &self,
        strm: *mut ZStream,
        pending: *mut c_uint,
        bits: *mut c_int,
    ) -> c_int;
    unsafe fn deflate_prime(&self, strm: *mut ZStream, bits: c_int, value: c_int) -> c_int;
    unsafe fn deflate_set_header(&self, strm: *mut ZStream, head: *mut c_void) -> c_int;
}

/// Knobs the shim reads at attach and finish time.
#[derive(Debug, Clone)]
pub struct ShimSettings {
    pub enabled: bool,
    pub initial_capacity: usize,
    pub effort: EffortPolicy,
}

impl Default for ShimSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ShimSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.shim.enabled,
            initial_capacity: config.shim.initial_capacity,
            effort: EffortPolicy::from_config(&config.effort),
        }
    }
}

pub struct Interceptor<'a, B, C> {
    original: &'a B,
    compressor: &'a C,
    settings: &'a ShimSettings,
}

impl<'a, B: OriginalDeflate, C: BatchCompressor> Interceptor<'a, B, C> {
    pub fn new(original: &'a B, compressor: &'a C, settings: &'a ShimSettings) -> Self {
        Self {
            original,
            compressor,
            settings,
        }
    }

    /// `deflateInit_`: the short form of `deflateInit2_` with zlib's defaults.
    pub unsafe fn deflate_init(
        &self,
        strm: *mut ZStream,
        level: c_int,
        version: *const c_char,
        stream_size: c_int,
    ) -> c_int {
        self.deflate_init2(
            strm,
            level,
            Z_DEFLATED,
            MAX_WBITS,
            DEF_MEM_LEVEL,
            Z_DEFAULT_STRATEGY,
            version,
            stream_size,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub unsafe fn deflate_init2(
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
        if strm.is_null() {
            return self.original.deflate_init2(
                strm,
                level,
                method,
                window_bits,
                mem_level,
                strategy,
                version,
                stream_size,
            );
        }

        // Re-initialized without deflateEnd: the old shim must not reach zalloc.
        if let Some(stale) = extension::detach(strm) {
            log_shim_debug!("dropping shim of re-initialized stream", handle = strm as usize);
            drop(stale);
        }

        let ret = self.original.deflate_init2(
            strm,
            level,
            method,
            window_bits,
            mem_level,
            strategy,
            version,
            stream_size,
        );
        if ret != Z_OK || !self.settings.enabled {
            return ret;
        }

        let format = Format::from_window_bits(window_bits);
        extension::attach(
            strm,
            StreamShim::new(format, self.settings.initial_capacity),
        );
        log_shim_debug!(
            "shim attached",
            handle = strm as usize,
            format = format.as_str(),
            level = level
        );
        ret
    }

    pub unsafe fn deflate(&self, strm: *mut ZStream, flush: c_int) -> c_int {
        if strm.is_null() {
            return self.original.deflate(strm, flush);
        }
        let Some(shim) = extension::peek(strm) else {
            return self.original.deflate(strm, flush);
        };
        if shim.is_bypassed() {
            return extension::with_detached(strm, |s| self.original.deflate(s, flush));
        }

        let mode = match FlushMode::try_from(flush) {
            Ok(mode) => mode,
            Err(value) => {
                log_shim_warn!("invalid flush value", handle = strm as usize, flush = value);
                return Z_STREAM_ERROR;
            }
        };

        let stream = &mut *strm;
        if stream.avail_in != 0 && stream.next_in.is_null() {
            return Z_STREAM_ERROR;
        }
        if shim.phase() == Phase::Drain {
            if mode != FlushMode::Finish {
                return Z_STREAM_ERROR;
            }
            if stream.avail_in != 0 {
                return Z_BUF_ERROR;
            }
        }
        if mode == FlushMode::Finish {
            if stream.next_out.is_null() {
                return Z_STREAM_ERROR;
            }
            if stream.avail_out == 0 {
                return Z_BUF_ERROR;
            }
        }

        if !matches!(mode, FlushMode::NoFlush | FlushMode::Finish) {
            log_shim_debug!(
                "flush deferred until finish",
                handle = strm as usize,
                flush = mode.as_str()
            );
        }

        absorb_input(shim, stream);
        if mode != FlushMode::Finish {
            return Z_OK;
        }

        if shim.phase() == Phase::Accumulate {
            shim.run_deferred_pass(self.compressor, &self.settings.effort);
        }
        drain_output(shim, stream);
        log_shim_trace!(
            "drained",
            handle = strm as usize,
            remaining = shim.remaining(),
            total_out = stream.total_out
        );

        if shim.is_drained() {
            Z_STREAM_END
        } else {
            Z_OK
        }
    }

    pub unsafe fn deflate_reset(&self, strm: *mut ZStream) -> c_int {
        if strm.is_null() {
            return self.original.deflate_reset(strm);
        }
        let prior = extension::detach(strm);
        let ret = self.original.deflate_reset(strm);
        if let Some(prior) = prior {
            let next = if ret == Z_OK { prior.renewed() } else { prior };
            extension::attach(strm, next);
        }
        ret
    }

    pub unsafe fn deflate_end(&self, strm: *mut ZStream) -> c_int {
        if !strm.is_null() {
            if let Some(shim) = extension::detach(strm) {
                log_shim_debug!(
                    "shim released",
                    handle = strm as usize,
                    undrained = shim.remaining()
                );
                drop(shim);
            }
        }
        self.original.deflate_end(strm)
    }

    pub unsafe fn deflate_set_dictionary(
        &self,
        strm: *mut ZStream,
        dictionary: *const u8,
        dict_length: c_uint,
    ) -> c_int {
        self.bypass_or_refuse(strm, BypassCause::Dictionary, "deflateSetDictionary", |s| {
            self.original.deflate_set_dictionary(s, dictionary, dict_length)
        })
    }

    pub unsafe fn deflate_get_dictionary(
        &self,
        strm: *mut ZStream,
        dictionary: *mut u8,
        dict_length: *mut c_uint,
    ) -> c_int {
        self.bypass_or_refuse(strm, BypassCause::Dictionary, "deflateGetDictionary", |s| {
            self.original.deflate_get_dictionary(s, dictionary, dict_length)
        })
    }

    pub unsafe fn deflate_prime(&self, strm: *mut ZStream, bits: c_int, value: c_int) -> c_int {
        self.bypass_or_refuse(strm, BypassCause::Prime, "deflatePrime", |s| {
            self.original.deflate_prime(s, bits, value)
        })
    }

    pub unsafe fn deflate_set_header(&self, strm: *mut ZStream, head: *mut c_void) -> c_int {
        self.bypass_or_refuse(strm, BypassCause::Header, "deflateSetHeader", |s| {
            self.original.deflate_set_header(s, head)
        })
    }

    pub unsafe fn deflate_params(&self, strm: *mut ZStream, level: c_int, strategy: c_int) -> c_int {
        passthrough(strm, |s| self.original.deflate_params(s, level, strategy))
    }

    pub unsafe fn deflate_tune(
        &self,
        strm: *mut ZStream,
        good_length: c_int,
        max_lazy: c_int,
        nice_length: c_int,
        max_chain: c_int,
    ) -> c_int {
        passthrough(strm, |s| {
            self.original
                .deflate_tune(s, good_length, max_lazy, nice_length, max_chain)
        })
    }

    pub unsafe fn deflate_bound(&self, strm: *mut ZStream, source_len: c_ulong) -> c_ulong {
        passthrough(strm, |s| self.original.deflate_bound(s, source_len))
    }

    pub unsafe fn deflate_pending(
        &self,
        strm: *mut ZStream,
        pending: *mut c_uint,
        bits: *mut c_int,
    ) -> c_int {
        if !strm.is_null() {
            if let Some(shim) = extension::peek(strm) {
                if !shim.is_bypassed() {
                    if !pending.is_null() {
                        *pending = c_uint::try_from(shim.remaining()).unwrap_or(c_uint::MAX);
                    }
                    if !bits.is_null() {
                        *bits = 0;
                    }
                    return Z_OK;
                }
            }
        }
        passthrough(strm, |s| self.original.deflate_pending(s, pending, bits))
    }

    pub unsafe fn deflate_copy(&self, dest: *mut ZStream, source: *mut ZStream) -> c_int {
        if dest.is_null() || source.is_null() {
            return self.original.deflate_copy(dest, source);
        }
        let ret = extension::with_detached(source, |s| self.original.deflate_copy(dest, s));
        if ret == Z_OK {
            if let Some(shim) = extension::peek(source) {
                extension::attach(dest, shim.duplicate());
                log_shim_debug!(
                    "shim copied",
                    source = source as usize,
                    dest = dest as usize
                );
            }
        }
        ret
    }

    unsafe fn bypass_or_refuse(
        &self,
        strm: *mut ZStream,
        cause: BypassCause,
        entry: &'static str,
        call: impl FnOnce(*mut ZStream) -> c_int,
    ) -> c_int {
        if strm.is_null() {
            return call(strm);
        }
        if let Some(shim) = extension::peek(strm) {
            if !shim.is_bypassed() && !shim.is_pristine() {
                log_shim_warn!(
                    "refusing call on a stream with buffered data",
                    handle = strm as usize,
                    entry = entry
                );
                return Z_STREAM_ERROR;
            }
        }
        let ret = extension::with_detached(strm, call);
        // A rejected call leaves zlib's state, and so the shim's, untouched.
        if ret != Z_OK {
            return ret;
        }
        if let Some(shim) = extension::peek(strm) {
            if !shim.is_bypassed() {
                log_shim_debug!(
                    "bypassing shim",
                    handle = strm as usize,
                    entry = entry,
                    cause = cause.as_str()
                );
                shim.bypass(cause);
            } else if cause.survives_reset() {
                shim.bypass(cause);
            }
        }
        ret
    }
}

unsafe fn passthrough<R>(strm: *mut ZStream, call: impl FnOnce(*mut ZStream) -> R) -> R {
    if strm.is_null() {
        call(strm)
    } else {
        extension::with_detached(strm, call)
    }
}

/// Take everything the caller offers and advance its input counters.
unsafe fn absorb_input(shim: &mut StreamShim, stream: &mut ZStream) {
    let n = stream.avail_in as usize;
    if n == 0 {
        return;
    }
    shim.absorb(std::slice::from_raw_parts(stream.next_in, n));
    stream.next_in = stream.next_in.add(n);
    stream.avail_in = 0;
    stream.total_in = stream.total_in.wrapping_add(n as c_ulong);
}

/// Hand over as much output as fits and advance the output counters.
unsafe fn drain_output(shim: &mut StreamShim, stream: &mut ZStream) {
    let out = std::slice::from_raw_parts_mut(stream.next_out, stream.avail_out as usize);
    let n = shim.drain(out);
    stream.next_out = stream.next_out.add(n);
    stream.avail_out -= n as c_uint;
    stream.total_out = stream.total_out.wrapping_add(n as c_ulong);
}
