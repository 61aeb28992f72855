//! The handle's `opaque` field as a tagged side channel.
//!
//! A shim lives in `opaque` while attached and keeps whatever value was
//! there before, restoring it on detach. Whether a value is one of ours is
//! decided by a registry of live shim addresses first and the sentinel tag
//! second, so a foreign value is never dereferenced whatever its bit
//! pattern, and never freed.

use libc::c_void;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use zdefer_config::log_shim_debug;

use crate::shim::StreamShim;
use crate::zlib::ZStream;

static LIVE_SHIMS: Lazy<Mutex<HashSet<usize>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn registry() -> MutexGuard<'static, HashSet<usize>> {
    LIVE_SHIMS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// True only for the address of a live, attached shim.
pub fn is_shim(value: *mut c_void) -> bool {
    if value.is_null() || !registry().contains(&(value as usize)) {
        return false;
    }
    unsafe { (*(value as *const StreamShim)).is_tagged() }
}

/// Install `shim` on the handle. A stale shim already there is destroyed
/// (after giving back the value it had saved); any other value is kept in
/// the new shim for restoration.
pub unsafe fn attach(strm: *mut ZStream, shim: Box<StreamShim>) {
    let stream = &mut *strm;
    if let Some(stale) = take(stream) {
        log_shim_debug!("replacing stale shim", handle = strm as usize);
        drop(stale);
    } else if !stream.opaque.is_null() {
        log_shim_debug!(
            "preserving foreign extension value",
            handle = strm as usize,
            value = stream.opaque as usize
        );
    }
    install(stream, shim);
}

/// Remove the shim, restoring the saved extension value.
pub unsafe fn detach(strm: *mut ZStream) -> Option<Box<StreamShim>> {
    take(&mut *strm)
}

/// Borrow the attached shim in place.
pub unsafe fn peek<'a>(strm: *mut ZStream) -> Option<&'a mut StreamShim> {
    let value = (*strm).opaque;
    if is_shim(value) {
        Some(&mut *(value as *mut StreamShim))
    } else {
        None
    }
}

/// Run `f` with the caller's own `opaque` value in place, then put the shim
/// back. Every call into the original library goes through here.
pub unsafe fn with_detached<R>(strm: *mut ZStream, f: impl FnOnce(*mut ZStream) -> R) -> R {
    let shim = take(&mut *strm);
    let result = f(strm);
    if let Some(shim) = shim {
        install(&mut *strm, shim);
    }
    result
}

unsafe fn take(stream: &mut ZStream) -> Option<Box<StreamShim>> {
    let value = stream.opaque;
    if !is_shim(value) {
        return None;
    }
    registry().remove(&(value as usize));
    let shim = Box::from_raw(value as *mut StreamShim);
    stream.opaque = shim.saved_extension;
    Some(shim)
}

fn install(stream: &mut ZStream, mut shim: Box<StreamShim>) {
    shim.saved_extension = stream.opaque;
    let raw = Box::into_raw(shim);
    registry().insert(raw as usize);
    stream.opaque = raw as *mut c_void;
}
