//! Per-handle stream shim.
//!
//! Two phases: ACCUMULATE copies every byte the caller streams in; the first
//! finish request runs one batch compression over the whole input and moves
//! to DRAIN, where the result is handed back in caller-sized pieces.

use libc::c_void;
use std::ptr;
use zdefer_config::log_batch_info;

use crate::compressor::BatchCompressor;
use crate::effort::EffortPolicy;
use crate::format::Format;

/// Sentinel stored first in every shim ("zdeferSH").
pub const SHIM_TAG: u64 = 0x7a64_6566_6572_5348;

/// Why a shim stopped buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassCause {
    Dictionary,
    Prime,
    Header,
}

impl BypassCause {
    /// zlib keeps an installed gzip header across `deflateReset`; the other
    /// causes are wiped by a reset.
    pub fn survives_reset(self) -> bool {
        matches!(self, Self::Header)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dictionary => "dictionary",
            Self::Prime => "prime",
            Self::Header => "header",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    /// Every call goes straight to the original library.
    Bypassed(BypassCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accumulate,
    Drain,
}

#[derive(Debug)]
pub struct StreamShim {
    tag: u64,
    input: Vec<u8>,
    output: Option<Vec<u8>>,
    cursor: usize,
    format: Format,
    lifecycle: Lifecycle,
    initial_capacity: usize,
    /// Prior occupant of the handle's `opaque` field, restored on detach.
    pub(crate) saved_extension: *mut c_void,
}

fn alloc_buffer(capacity: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    if buf.try_reserve_exact(capacity).is_err() {
        crate::fatal(&["out of memory allocating deflate input buffer"]);
    }
    buf
}

impl StreamShim {
    pub fn new(format: Format, initial_capacity: usize) -> Box<Self> {
        let initial_capacity = initial_capacity.max(1);
        Box::new(Self {
            tag: SHIM_TAG,
            input: alloc_buffer(initial_capacity),
            output: None,
            cursor: 0,
            format,
            lifecycle: Lifecycle::Active,
            initial_capacity,
            saved_extension: ptr::null_mut(),
        })
    }

    /// Fresh buffers for the same handle, as after `deflateReset`.
    pub fn renewed(&self) -> Box<Self> {
        let mut shim = Self::new(self.format, self.initial_capacity);
        if let Lifecycle::Bypassed(cause) = self.lifecycle {
            if cause.survives_reset() {
                shim.lifecycle = self.lifecycle;
            }
        }
        shim
    }

    /// Deep copy for `deflateCopy`. The copy has no saved extension value
    /// until it is attached.
    pub fn duplicate(&self) -> Box<Self> {
        let mut input = alloc_buffer(self.input.capacity());
        input.extend_from_slice(&self.input);
        Box::new(Self {
            tag: SHIM_TAG,
            input,
            output: self.output.clone(),
            cursor: self.cursor,
            format: self.format,
            lifecycle: self.lifecycle,
            initial_capacity: self.initial_capacity,
            saved_extension: ptr::null_mut(),
        })
    }

    pub fn is_tagged(&self) -> bool {
        self.tag == SHIM_TAG
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_bypassed(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Bypassed(_))
    }

    pub fn bypass(&mut self, cause: BypassCause) {
        self.lifecycle = Lifecycle::Bypassed(cause);
    }

    pub fn phase(&self) -> Phase {
        if self.output.is_some() {
            Phase::Drain
        } else {
            Phase::Accumulate
        }
    }

    /// Nothing buffered and nothing produced yet.
    pub fn is_pristine(&self) -> bool {
        self.input.is_empty() && self.output.is_none()
    }

    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    pub fn input_capacity(&self) -> usize {
        self.input.capacity()
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }

    /// Append caller input, doubling capacity until it fits.
    pub fn absorb(&mut self, data: &[u8]) {
        let needed = match self.input.len().checked_add(data.len()) {
            Some(n) => n,
            None => crate::fatal(&["deflate input length overflow"]),
        };
        let mut capacity = self.input.capacity().max(1);
        if needed > capacity {
            while capacity < needed {
                capacity = match capacity.checked_mul(2) {
                    Some(c) => c,
                    None => crate::fatal(&["deflate input length overflow"]),
                };
            }
            let additional = capacity - self.input.len();
            if self.input.try_reserve_exact(additional).is_err() {
                crate::fatal(&["out of memory growing deflate input buffer"]);
            }
        }
        self.input.extend_from_slice(data);
    }

    /// The single batch pass. The input buffer is released once the output
    /// exists.
    pub fn run_deferred_pass<C: BatchCompressor + ?Sized>(
        &mut self,
        compressor: &C,
        effort: &EffortPolicy,
    ) {
        debug_assert_eq!(self.phase(), Phase::Accumulate);
        let iterations = effort.iterations_for(self.input.len());
        log_batch_info!(
            "running deferred compression pass",
            format = self.format.as_str(),
            input = self.input.len(),
            iterations = iterations
        );
        let output = compressor.compress(self.format, iterations, &self.input);
        self.input = Vec::new();
        self.output = Some(output);
        self.cursor = 0;
    }

    pub fn output_len(&self) -> usize {
        self.output.as_ref().map_or(0, Vec::len)
    }

    /// Bytes produced but not yet handed to the caller
    pub fn remaining(&self) -> usize {
        self.output_len() - self.cursor
    }

    pub fn is_drained(&self) -> bool {
        self.output.is_some() && self.remaining() == 0
    }

    /// Copy as much pending output as fits into `out`.
    pub fn drain(&mut self, out: &mut [u8]) -> usize {
        let Some(output) = self.output.as_ref() else {
            return 0;
        };
        let n = out.len().min(output.len() - self.cursor);
        out[..n].copy_from_slice(&output[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }
}
