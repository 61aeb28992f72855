//! The alternate, high-ratio compressor behind the deferred pass.

use libc::{c_int, c_uchar, c_void, size_t};
use std::ptr;
use zdefer_config::log_batch_debug;

use crate::format::Format;
use crate::slot::InterceptSlot;

/// Whole-input, whole-output compressor. There is no streaming interface:
/// the complete input goes in and a complete, framed stream comes out.
pub trait BatchCompressor {
    fn compress(&self, format: Format, iterations: i32, input: &[u8]) -> Vec<u8>;
}

/// `ZopfliOptions` from `zopfli.h`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ZopfliOptions {
    pub verbose: c_int,
    pub verbose_more: c_int,
    pub numiterations: c_int,
    pub blocksplitting: c_int,
    pub blocksplittinglast: c_int,
    pub blocksplittingmax: c_int,
}

type InitOptionsFn = unsafe extern "C" fn(options: *mut ZopfliOptions);
type CompressFn = unsafe extern "C" fn(
    options: *const ZopfliOptions,
    output_type: c_int,
    input: *const c_uchar,
    insize: size_t,
    out: *mut *mut c_uchar,
    outsize: *mut size_t,
);

const ZOPFLI_LIBS: &[&str] = &["libzopfli.so.1\0", "libzopfli.so\0"];

static ZOPFLI_INIT_OPTIONS: InterceptSlot<InitOptionsFn> =
    InterceptSlot::new("ZopfliInitOptions\0", None, ZOPFLI_LIBS);
static ZOPFLI_COMPRESS: InterceptSlot<CompressFn> =
    InterceptSlot::new("ZopfliCompress\0", None, ZOPFLI_LIBS);

/// libzopfli, loaded on first use.
#[derive(Debug, Default, Clone, Copy)]
pub struct Zopfli;

impl BatchCompressor for Zopfli {
    fn compress(&self, format: Format, iterations: i32, input: &[u8]) -> Vec<u8> {
        let mut options = ZopfliOptions::default();
        let mut out: *mut c_uchar = ptr::null_mut();
        let mut outsize: size_t = 0;

        unsafe {
            (ZOPFLI_INIT_OPTIONS.original())(&mut options);
            options.numiterations = iterations;
            (ZOPFLI_COMPRESS.original())(
                &options,
                format.zopfli_format(),
                input.as_ptr(),
                input.len(),
                &mut out,
                &mut outsize,
            );
        }

        let compressed = unsafe { take_output(out, outsize) };

        log_batch_debug!(
            "zopfli pass complete",
            format = format.as_str(),
            iterations = iterations,
            input = input.len(),
            output = compressed.len()
        );
        compressed
    }
}

/// Copy zopfli's output into a `Vec` and free it. zopfli grows `out` with
/// realloc, so it is ours to free. Even an empty input yields a framed
/// stream; a null buffer means the allocation failed, and there is no valid
/// stream to hand the caller.
unsafe fn take_output(out: *mut c_uchar, outsize: size_t) -> Vec<u8> {
    if out.is_null() {
        crate::fatal(&["ZopfliCompress produced no output, aborting"]);
    }
    let compressed = std::slice::from_raw_parts(out, outsize).to_vec();
    libc::free(out as *mut c_void);
    compressed
}
