//! Test collaborators for the lifecycle tests.
//!
//! `RecordingZlib` stands in for the wrapped library and remembers every
//! call together with the `opaque` value it observed. `Flate2Batch` plays the
//! high-ratio compressor with flate2 at maximum level, so outputs can be
//! checked with flate2's decoders.

#![allow(dead_code)]

use flate2::Compression;
use libc::{c_char, c_int, c_uint, c_ulong, c_void};
use std::cell::{Cell, RefCell};
use std::io::{Read, Write};
use zdefer_core::zlib::*;
use zdefer_core::{BatchCompressor, Format, Interceptor, OriginalDeflate, ShimSettings};

pub const VERSION: &[u8] = b"1.3.1\0";

pub struct RecordingZlib {
    pub calls: RefCell<Vec<&'static str>>,
    pub opaque_seen: RefCell<Vec<*mut c_void>>,
    pub init_args: RefCell<Vec<(c_int, c_int, c_int, c_int, c_int)>>,
    pub init_status: Cell<c_int>,
    pub set_header_status: Cell<c_int>,
}

impl Default for RecordingZlib {
    fn default() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            opaque_seen: RefCell::new(Vec::new()),
            init_args: RefCell::new(Vec::new()),
            init_status: Cell::new(Z_OK),
            set_header_status: Cell::new(Z_OK),
        }
    }
}

impl RecordingZlib {
    unsafe fn record(&self, name: &'static str, strm: *mut ZStream) {
        self.calls.borrow_mut().push(name);
        if !strm.is_null() {
            self.opaque_seen.borrow_mut().push((*strm).opaque);
        }
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.borrow().iter().any(|c| *c == name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.borrow().iter().filter(|c| **c == name).count()
    }

    /// Whether any original call ever observed a shim in `opaque`
    pub fn saw_shim(&self) -> bool {
        self.opaque_seen
            .borrow()
            .iter()
            .any(|&p| zdefer_core::extension::is_shim(p))
    }
}

impl OriginalDeflate for RecordingZlib {
    unsafe fn deflate_init2(
        &self,
        strm: *mut ZStream,
        level: c_int,
        method: c_int,
        window_bits: c_int,
        mem_level: c_int,
        strategy: c_int,
        _version: *const c_char,
        _stream_size: c_int,
    ) -> c_int {
        self.record("deflateInit2_", strm);
        self.init_args
            .borrow_mut()
            .push((level, method, window_bits, mem_level, strategy));
        self.init_status.get()
    }

    /// Swallows the input and writes a single marker byte.
    unsafe fn deflate(&self, strm: *mut ZStream, _flush: c_int) -> c_int {
        self.record("deflate", strm);
        let s = &mut *strm;
        s.total_in += s.avail_in as c_ulong;
        s.next_in = s.next_in.add(s.avail_in as usize);
        s.avail_in = 0;
        if s.avail_out > 0 {
            *s.next_out = b'Z';
            s.next_out = s.next_out.add(1);
            s.avail_out -= 1;
            s.total_out += 1;
        }
        Z_OK
    }

    unsafe fn deflate_reset(&self, strm: *mut ZStream) -> c_int {
        self.record("deflateReset", strm);
        Z_OK
    }

    unsafe fn deflate_end(&self, strm: *mut ZStream) -> c_int {
        self.record("deflateEnd", strm);
        Z_OK
    }

    unsafe fn deflate_set_dictionary(
        &self,
        strm: *mut ZStream,
        _dictionary: *const u8,
        _dict_length: c_uint,
    ) -> c_int {
        self.record("deflateSetDictionary", strm);
        Z_OK
    }

    unsafe fn deflate_get_dictionary(
        &self,
        strm: *mut ZStream,
        _dictionary: *mut u8,
        dict_length: *mut c_uint,
    ) -> c_int {
        self.record("deflateGetDictionary", strm);
        if !dict_length.is_null() {
            *dict_length = 0;
        }
        Z_OK
    }

    unsafe fn deflate_copy(&self, dest: *mut ZStream, source: *mut ZStream) -> c_int {
        self.record("deflateCopy", source);
        std::ptr::copy_nonoverlapping(source as *const ZStream, dest, 1);
        Z_OK
    }

    unsafe fn deflate_params(&self, strm: *mut ZStream, _level: c_int, _strategy: c_int) -> c_int {
        self.record("deflateParams", strm);
        Z_OK
    }

    unsafe fn deflate_tune(
        &self,
        strm: *mut ZStream,
        _good_length: c_int,
        _max_lazy: c_int,
        _nice_length: c_int,
        _max_chain: c_int,
    ) -> c_int {
        self.record("deflateTune", strm);
        Z_OK
    }

    unsafe fn deflate_bound(&self, strm: *mut ZStream, source_len: c_ulong) -> c_ulong {
        self.record("deflateBound", strm);
        source_len + 11
    }

    unsafe fn deflate_pending(
        &self,
        strm: *mut ZStream,
        pending: *mut c_uint,
        bits: *mut c_int,
    ) -> c_int {
        self.record("deflatePending", strm);
        *pending = 42;
        *bits = 3;
        Z_OK
    }

    unsafe fn deflate_prime(&self, strm: *mut ZStream, _bits: c_int, _value: c_int) -> c_int {
        self.record("deflatePrime", strm);
        Z_OK
    }

    unsafe fn deflate_set_header(&self, strm: *mut ZStream, _head: *mut c_void) -> c_int {
        self.record("deflateSetHeader", strm);
        self.set_header_status.get()
    }
}

#[derive(Default)]
pub struct Flate2Batch {
    pub calls: RefCell<Vec<(Format, i32, usize)>>,
}

impl BatchCompressor for Flate2Batch {
    fn compress(&self, format: Format, iterations: i32, input: &[u8]) -> Vec<u8> {
        self.calls
            .borrow_mut()
            .push((format, iterations, input.len()));
        let level = Compression::best();
        match format {
            Format::Raw => {
                let mut enc = flate2::write::DeflateEncoder::new(Vec::new(), level);
                enc.write_all(input).unwrap();
                enc.finish().unwrap()
            }
            Format::Zlib => {
                let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), level);
                enc.write_all(input).unwrap();
                enc.finish().unwrap()
            }
            Format::Gzip => {
                let mut enc = flate2::write::GzEncoder::new(Vec::new(), level);
                enc.write_all(input).unwrap();
                enc.finish().unwrap()
            }
        }
    }
}

/// Decode with the standard decompressor for `format`.
pub fn inflate(format: Format, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    match format {
        Format::Raw => flate2::read::DeflateDecoder::new(data).read_to_end(&mut out),
        Format::Zlib => flate2::read::ZlibDecoder::new(data).read_to_end(&mut out),
        Format::Gzip => flate2::read::GzDecoder::new(data).read_to_end(&mut out),
    }
    .unwrap();
    out
}

/// Deterministic, mildly compressible test data
pub fn sample(len: usize) -> Vec<u8> {
    const TEXT: &[u8] = b"the quick brown fox jumps over the lazy dog ";
    (0..len)
        .map(|i| TEXT[i % TEXT.len()] ^ ((i / 251) as u8 & 0x3))
        .collect()
}

pub struct Harness {
    pub zlib: RecordingZlib,
    pub batch: Flate2Batch,
    pub settings: ShimSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(ShimSettings {
            initial_capacity: 64,
            ..ShimSettings::default()
        })
    }

    pub fn with_settings(settings: ShimSettings) -> Self {
        Self {
            zlib: RecordingZlib::default(),
            batch: Flate2Batch::default(),
            settings,
        }
    }

    pub fn interceptor(&self) -> Interceptor<'_, RecordingZlib, Flate2Batch> {
        Interceptor::new(&self.zlib, &self.batch, &self.settings)
    }
}

pub unsafe fn init(
    ic: &Interceptor<'_, RecordingZlib, Flate2Batch>,
    strm: &mut ZStream,
    window_bits: c_int,
) -> c_int {
    ic.deflate_init2(
        strm,
        9,
        Z_DEFLATED,
        window_bits,
        DEF_MEM_LEVEL,
        Z_DEFAULT_STRATEGY,
        VERSION.as_ptr() as *const c_char,
        std::mem::size_of::<ZStream>() as c_int,
    )
}

pub unsafe fn feed(
    ic: &Interceptor<'_, RecordingZlib, Flate2Batch>,
    strm: &mut ZStream,
    data: &[u8],
    flush: c_int,
) -> c_int {
    strm.next_in = data.as_ptr();
    strm.avail_in = data.len() as c_uint;
    ic.deflate(strm, flush)
}

/// Call `deflate(Z_FINISH)` with `chunk` bytes of output space until it
/// stops returning `Z_OK`. Returns every status and the concatenated output.
pub unsafe fn finish(
    ic: &Interceptor<'_, RecordingZlib, Flate2Batch>,
    strm: &mut ZStream,
    chunk: usize,
) -> (Vec<c_int>, Vec<u8>) {
    let mut statuses = Vec::new();
    let mut output = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        strm.next_out = buf.as_mut_ptr();
        strm.avail_out = chunk as c_uint;
        let ret = ic.deflate(strm, FlushMode::Finish as c_int);
        let produced = chunk - strm.avail_out as usize;
        output.extend_from_slice(&buf[..produced]);
        statuses.push(ret);
        if ret != Z_OK {
            break;
        }
    }
    (statuses, output)
}
