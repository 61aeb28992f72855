//! zlib ABI mirror.
//!
//! Layout and constants follow `zlib.h` exactly; these cross the C boundary
//! unchanged.

use libc::{c_char, c_int, c_uint, c_ulong, c_void};
use std::ptr;

pub type AllocFn = unsafe extern "C" fn(opaque: *mut c_void, items: c_uint, size: c_uint) -> *mut c_void;
pub type FreeFn = unsafe extern "C" fn(opaque: *mut c_void, address: *mut c_void);

/// `z_stream`. `opaque` is the extension field the shim borrows.
#[repr(C)]
#[derive(Debug)]
pub struct ZStream {
    pub next_in: *const u8,
    pub avail_in: c_uint,
    pub total_in: c_ulong,

    pub next_out: *mut u8,
    pub avail_out: c_uint,
    pub total_out: c_ulong,

    pub msg: *const c_char,
    pub state: *mut c_void,

    pub zalloc: Option<AllocFn>,
    pub zfree: Option<FreeFn>,
    pub opaque: *mut c_void,

    pub data_type: c_int,
    pub adler: c_ulong,
    pub reserved: c_ulong,
}

impl Default for ZStream {
    fn default() -> Self {
        Self {
            next_in: ptr::null(),
            avail_in: 0,
            total_in: 0,
            next_out: ptr::null_mut(),
            avail_out: 0,
            total_out: 0,
            msg: ptr::null(),
            state: ptr::null_mut(),
            zalloc: None,
            zfree: None,
            opaque: ptr::null_mut(),
            data_type: 0,
            adler: 0,
            reserved: 0,
        }
    }
}

pub const Z_OK: c_int = 0;
pub const Z_STREAM_END: c_int = 1;
pub const Z_NEED_DICT: c_int = 2;
pub const Z_ERRNO: c_int = -1;
pub const Z_STREAM_ERROR: c_int = -2;
pub const Z_DATA_ERROR: c_int = -3;
pub const Z_MEM_ERROR: c_int = -4;
pub const Z_BUF_ERROR: c_int = -5;
pub const Z_VERSION_ERROR: c_int = -6;

pub const Z_DEFLATED: c_int = 8;
pub const MAX_WBITS: c_int = 15;
pub const DEF_MEM_LEVEL: c_int = 8;
pub const Z_DEFAULT_STRATEGY: c_int = 0;

/// Flush argument of `deflate()`, by ordinal.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    NoFlush = 0,
    PartialFlush = 1,
    SyncFlush = 2,
    FullFlush = 3,
    Finish = 4,
    Block = 5,
    Trees = 6,
}

impl FlushMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoFlush => "Z_NO_FLUSH",
            Self::PartialFlush => "Z_PARTIAL_FLUSH",
            Self::SyncFlush => "Z_SYNC_FLUSH",
            Self::FullFlush => "Z_FULL_FLUSH",
            Self::Finish => "Z_FINISH",
            Self::Block => "Z_BLOCK",
            Self::Trees => "Z_TREES",
        }
    }
}

impl TryFrom<c_int> for FlushMode {
    type Error = c_int;

    fn try_from(value: c_int) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::NoFlush,
            1 => Self::PartialFlush,
            2 => Self::SyncFlush,
            3 => Self::FullFlush,
            4 => Self::Finish,
            5 => Self::Block,
            6 => Self::Trees,
            other => return Err(other),
        })
    }
}
