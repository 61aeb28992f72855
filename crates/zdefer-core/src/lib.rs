//! # zdefer-core
//!
//! Deferred high-ratio compression behind zlib's streaming deflate contract.
//!
//! - [`slot`]: lazily resolved, overridable indirections to library entry
//!   points, with a strict path back to the wrapped library itself.
//! - [`shim`]: per-handle state that buffers all input, runs one batch
//!   compression on finish and drains the result through `deflate()`'s
//!   incremental output protocol.
//! - [`lifecycle`]: the shim-aware entry points, generic over the original
//!   library and the batch compressor.

// Allow unsafe FFI functions without safety docs - these are inherently unsafe C ABI
#![allow(clippy::missing_safety_doc)]

pub mod compressor;
pub mod effort;
pub mod extension;
pub mod format;
pub mod lifecycle;
pub mod shim;
pub mod slot;
pub mod zlib;

pub use compressor::{BatchCompressor, Zopfli};
pub use effort::{EffortPolicy, EffortStep};
pub use format::Format;
pub use lifecycle::{Interceptor, OriginalDeflate, ShimSettings};
pub use shim::{BypassCause, Lifecycle, Phase, StreamShim};
pub use slot::{InterceptSlot, SlotError, Strategy};
pub use zlib::ZStream;

/// Print one line to stderr and abort. No unwinding, no allocation.
pub fn fatal(parts: &[&str]) -> ! {
    const PREFIX: &str = "zdefer: ";
    unsafe {
        libc::write(2, PREFIX.as_ptr() as *const libc::c_void, PREFIX.len());
        for part in parts {
            libc::write(2, part.as_ptr() as *const libc::c_void, part.len());
        }
        libc::write(2, b"\n".as_ptr() as *const libc::c_void, 1);
        libc::abort()
    }
}
