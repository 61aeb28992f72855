//! Interception slots.
//!
//! A slot stands in for one library entry point and hands out a typed
//! function pointer resolved lazily from the process symbol space. It has
//! two independent targets:
//!
//! - `preferred()`: an override exported under a distinguished name
//!   (`zdefer_<entry point>`) anywhere in the global scope, else the next
//!   definition of the entry point itself.
//! - `original()`: strictly the real definition, searched first in an
//!   explicit list of candidate libraries, then next in load order. Used
//!   when the shim must reach the wrapped library even though an override
//!   is active.
//!
//! Each target is resolved at most once per process and cached behind a
//! `OnceLock`, so concurrent first calls cannot race on the cache. A target
//! that cannot be resolved aborts the process: nothing can run correctly
//! without the real entry point.

use libc::{c_char, c_void};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use zdefer_config::{log_slot_debug, log_slot_error};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("{name} function not found")]
    Unresolved { name: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Preferred,
    Original,
}

/// Lazily resolved indirection for one entry point. `F` must be an
/// `unsafe extern "C" fn(..) -> ..` pointer type.
pub struct InterceptSlot<F> {
    /// NUL-terminated
    name: &'static str,
    /// NUL-terminated
    override_name: Option<&'static str>,
    /// NUL-terminated sonames tried before the default search
    libs: &'static [&'static str],
    preferred: OnceLock<F>,
    original: OnceLock<F>,
    lookups: AtomicUsize,
}

const fn nul_terminated(s: &str) -> bool {
    let b = s.as_bytes();
    !b.is_empty() && b[b.len() - 1] == 0
}

impl<F: Copy> InterceptSlot<F> {
    pub const fn new(
        name: &'static str,
        override_name: Option<&'static str>,
        libs: &'static [&'static str],
    ) -> Self {
        assert!(std::mem::size_of::<F>() == std::mem::size_of::<*mut c_void>());
        assert!(nul_terminated(name));
        if let Some(o) = override_name {
            assert!(nul_terminated(o));
        }
        let mut i = 0;
        while i < libs.len() {
            assert!(nul_terminated(libs[i]));
            i += 1;
        }

        Self {
            name,
            override_name,
            libs,
            preferred: OnceLock::new(),
            original: OnceLock::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Entry point name without the terminator
    pub fn name(&self) -> &'static str {
        &self.name[..self.name.len() - 1]
    }

    /// Target for callers of the entry point: override first.
    #[inline]
    pub fn preferred(&self) -> F {
        *self
            .preferred
            .get_or_init(|| self.resolve_or_abort(Strategy::Preferred))
    }

    /// The wrapped library's own implementation, never an override.
    #[inline]
    pub fn original(&self) -> F {
        *self
            .original
            .get_or_init(|| self.resolve_or_abort(Strategy::Original))
    }

    /// Uncached lookup.
    pub fn try_resolve(&self, strategy: Strategy) -> Result<F, SlotError> {
        let p = unsafe { self.lookup(strategy) };
        if p.is_null() {
            return Err(SlotError::Unresolved { name: self.name() });
        }
        log_slot_debug!(
            "resolved entry point",
            name = self.name(),
            preferred = strategy == Strategy::Preferred,
            address = p as usize
        );
        Ok(unsafe { std::mem::transmute_copy::<*mut c_void, F>(&p) })
    }

    /// Number of symbol searches performed so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    fn resolve_or_abort(&self, strategy: Strategy) -> F {
        match self.try_resolve(strategy) {
            Ok(f) => f,
            Err(err) => {
                let error = err.to_string();
                log_slot_error!("mandatory entry point missing", error = error.as_str());
                crate::fatal(&[self.name(), " function not found, aborting"])
            }
        }
    }

    unsafe fn lookup(&self, strategy: Strategy) -> *mut c_void {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        if strategy == Strategy::Preferred {
            if let Some(name) = self.override_name {
                let p = libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr() as *const c_char);
                if !p.is_null() {
                    return p;
                }
            }
        }

        // Handles stay open for the life of the process.
        for lib in self.libs {
            let handle = libc::dlopen(lib.as_ptr() as *const c_char, libc::RTLD_LAZY);
            if handle.is_null() {
                continue;
            }
            let p = libc::dlsym(handle, self.name.as_ptr() as *const c_char);
            if !p.is_null() {
                return p;
            }
        }

        libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr() as *const c_char)
    }
}
