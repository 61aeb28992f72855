use libc::c_int;

use crate::zlib::MAX_WBITS;

/// Container wrapped around the deflate stream, fixed at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Raw,
    Zlib,
    Gzip,
}

impl Format {
    /// zlib's convention: negative window bits select a raw stream, adding
    /// 16 selects a gzip wrapper.
    pub fn from_window_bits(window_bits: c_int) -> Self {
        if window_bits < 0 {
            Self::Raw
        } else if window_bits > MAX_WBITS {
            Self::Gzip
        } else {
            Self::Zlib
        }
    }

    /// Value of zopfli's `ZopfliFormat` enum.
    pub fn zopfli_format(self) -> c_int {
        match self {
            Self::Gzip => 0,
            Self::Zlib => 1,
            Self::Raw => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Zlib => "zlib",
            Self::Gzip => "gzip",
        }
    }
}
