//! Exported zlib entry points and their `zdefer_` overrides.

use libc::{c_char, c_int, c_uint, c_ulong, c_void};
use zdefer_core::ZStream;

use crate::interceptor;

intercept! {
    fn deflateInit_(
        strm: *mut ZStream,
        level: c_int,
        version: *const c_char,
        stream_size: c_int,
    ) -> c_int => DEFLATE_INIT, zdefer_deflateInit_ {
        interceptor().deflate_init(strm, level, version, stream_size)
    }

    fn deflateInit2_(
        strm: *mut ZStream,
        level: c_int,
        method: c_int,
        window_bits: c_int,
        mem_level: c_int,
        strategy: c_int,
        version: *const c_char,
        stream_size: c_int,
    ) -> c_int => DEFLATE_INIT2, zdefer_deflateInit2_ {
        interceptor().deflate_init2(
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

    fn deflate(strm: *mut ZStream, flush: c_int) -> c_int => DEFLATE, zdefer_deflate {
        interceptor().deflate(strm, flush)
    }

    fn deflateReset(strm: *mut ZStream) -> c_int => DEFLATE_RESET, zdefer_deflateReset {
        interceptor().deflate_reset(strm)
    }

    fn deflateEnd(strm: *mut ZStream) -> c_int => DEFLATE_END, zdefer_deflateEnd {
        interceptor().deflate_end(strm)
    }

    fn deflateSetDictionary(
        strm: *mut ZStream,
        dictionary: *const u8,
        dict_length: c_uint,
    ) -> c_int => DEFLATE_SET_DICTIONARY, zdefer_deflateSetDictionary {
        interceptor().deflate_set_dictionary(strm, dictionary, dict_length)
    }

    fn deflateGetDictionary(
        strm: *mut ZStream,
        dictionary: *mut u8,
        dict_length: *mut c_uint,
    ) -> c_int => DEFLATE_GET_DICTIONARY, zdefer_deflateGetDictionary {
        interceptor().deflate_get_dictionary(strm, dictionary, dict_length)
    }

    fn deflateCopy(dest: *mut ZStream, source: *mut ZStream) -> c_int
        => DEFLATE_COPY, zdefer_deflateCopy {
        interceptor().deflate_copy(dest, source)
    }

    fn deflateParams(strm: *mut ZStream, level: c_int, strategy: c_int) -> c_int
        => DEFLATE_PARAMS, zdefer_deflateParams {
        interceptor().deflate_params(strm, level, strategy)
    }

    fn deflateTune(
        strm: *mut ZStream,
        good_length: c_int,
        max_lazy: c_int,
        nice_length: c_int,
        max_chain: c_int,
    ) -> c_int => DEFLATE_TUNE, zdefer_deflateTune {
        interceptor().deflate_tune(strm, good_length, max_lazy, nice_length, max_chain)
    }

    fn deflateBound(strm: *mut ZStream, source_len: c_ulong) -> c_ulong
        => DEFLATE_BOUND, zdefer_deflateBound {
        interceptor().deflate_bound(strm, source_len)
    }

    fn deflatePending(strm: *mut ZStream, pending: *mut c_uint, bits: *mut c_int) -> c_int
        => DEFLATE_PENDING, zdefer_deflatePending {
        interceptor().deflate_pending(strm, pending, bits)
    }

    fn deflatePrime(strm: *mut ZStream, bits: c_int, value: c_int) -> c_int
        => DEFLATE_PRIME, zdefer_deflatePrime {
        interceptor().deflate_prime(strm, bits, value)
    }

    fn deflateSetHeader(strm: *mut ZStream, head: *mut c_void) -> c_int
        => DEFLATE_SET_HEADER, zdefer_deflateSetHeader {
        interceptor().deflate_set_header(strm, head)
    }
}
