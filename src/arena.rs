//! Backing memory for a heap.
//!
//! An [`Arena`] is a single contiguous byte region that only grows at its
//! end, the way the program break does. The heap addresses it by offset,
//! so the region's absolute address never leaks into block metadata.

use std::{ptr, slice};

use libc::{c_void, intptr_t, sbrk};

use crate::{
  align_to,
  block::{DSIZE, MAX_BLOCK_SIZE},
  error::ArenaError,
};

/// Default [`VecArena`] limit, 20 MiB.
pub const DEFAULT_ARENA_LIMIT: usize = 20 * (1 << 20);

/// A contiguous, linearly growable byte region.
pub trait Arena {
  /// Grows the region by exactly `nbytes` and returns the offset of the
  /// first new byte. `nbytes` is always a multiple of the word size.
  fn extend(
    &mut self,
    nbytes: usize,
  ) -> Result<usize, ArenaError>;

  /// The whole current region.
  fn bytes(&self) -> &[u8];

  fn bytes_mut(&mut self) -> &mut [u8];

  /// Drops the current region so the next `extend` starts at offset zero.
  fn reset(&mut self);

  /// Absolute address of offset zero.
  fn base(&self) -> *const u8 {
    self.bytes().as_ptr()
  }

  fn len(&self) -> usize {
    self.bytes().len()
  }

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Arena backed by an owned buffer with a fixed upper bound.
///
/// The full capacity is reserved up front, so the region never moves and
/// addresses handed out by [`Heap::as_ptr`](crate::Heap::as_ptr) stay
/// valid across extensions.
#[derive(Debug)]
pub struct VecArena {
  // u64 storage keeps the base doubleword aligned.
  words: Vec<u64>,
  len: usize,
  limit: usize,
}

impl VecArena {
  pub fn new() -> Self {
    Self::with_limit(DEFAULT_ARENA_LIMIT)
  }

  /// Creates an arena that refuses to grow past `limit` bytes.
  pub fn with_limit(limit: usize) -> Self {
    let limit = limit.min(MAX_BLOCK_SIZE) & !(DSIZE - 1);
    Self {
      words: Vec::with_capacity(limit / DSIZE),
      len: 0,
      limit,
    }
  }

  pub fn limit(&self) -> usize {
    self.limit
  }
}

impl Default for VecArena {
  fn default() -> Self {
    Self::new()
  }
}

impl Arena for VecArena {
  fn extend(
    &mut self,
    nbytes: usize,
  ) -> Result<usize, ArenaError> {
    let exhausted = ArenaError::Exhausted {
      requested: nbytes,
      limit: self.limit,
    };
    let new_len = self.len.checked_add(nbytes).ok_or(exhausted.clone())?;
    if new_len > self.limit {
      return Err(exhausted);
    }

    self.words.resize(new_len.div_ceil(DSIZE), 0);

    let old_len = self.len;
    self.len = new_len;
    Ok(old_len)
  }

  fn bytes(&self) -> &[u8] {
    // SAFETY: `words` holds at least `len` initialized bytes and any bit
    // pattern of a u64 is a valid sequence of u8.
    unsafe { slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    // SAFETY: as in `bytes`, and the slice borrows `self` mutably.
    unsafe { slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
  }

  fn reset(&mut self) {
    self.words.clear();
    self.len = 0;
  }
}

/// Arena carved out of the process data segment with `sbrk(2)`.
///
/// The first extension pads the break to a doubleword boundary. If anything
/// else in the process moves the break afterwards, further extensions fail
/// with [`ArenaError::NotContiguous`] instead of producing a gap.
///
/// While an `SbrkArena` holds memory it must be the only thing moving the
/// break: the system `malloc` and any other `SbrkArena`, in any thread,
/// included. Checking the break and moving it are two separate calls, so
/// [`Arena::reset`] can hand back memory that another thread has just
/// grown into.
///
/// Holding a raw pointer, this type is neither `Send` nor `Sync`.
#[derive(Debug)]
pub struct SbrkArena {
  start: *mut u8,
  len: usize,
}

impl SbrkArena {
  pub const fn new() -> Self {
    Self {
      start: ptr::null_mut(),
      len: 0,
    }
  }

  /// Current program break, as reported by `sbrk(0)`.
  pub fn program_break() -> *mut u8 {
    unsafe { sbrk(0) as *mut u8 }
  }

  fn failed(address: *mut c_void) -> bool {
    address == usize::MAX as *mut c_void
  }

  unsafe fn claim_start(&mut self) -> Result<(), ArenaError> {
    unsafe {
      let brk = sbrk(0);
      if Self::failed(brk) {
        return Err(ArenaError::Exhausted {
          requested: 0,
          limit: self.len,
        });
      }

      let padding = align_to!(brk as usize, DSIZE) - brk as usize;
      if padding > 0 && Self::failed(sbrk(padding as intptr_t)) {
        return Err(ArenaError::Exhausted {
          requested: padding,
          limit: self.len,
        });
      }

      self.start = (brk as *mut u8).add(padding);
      Ok(())
    }
  }
}

impl Default for SbrkArena {
  fn default() -> Self {
    Self::new()
  }
}

impl Arena for SbrkArena {
  fn extend(
    &mut self,
    nbytes: usize,
  ) -> Result<usize, ArenaError> {
    let new_len = self.len.checked_add(nbytes).ok_or(ArenaError::AddressSpace)?;
    if new_len > MAX_BLOCK_SIZE {
      return Err(ArenaError::AddressSpace);
    }

    unsafe {
      if self.start.is_null() {
        self.claim_start()?;
      }

      let expected = self.start.add(self.len);
      let address = sbrk(nbytes as intptr_t);

      if Self::failed(address) {
        return Err(ArenaError::Exhausted {
          requested: nbytes,
          limit: self.len,
        });
      }

      if address as *mut u8 != expected {
        // The new bytes are not ours to use; hand them back if we still can.
        if sbrk(0) as *mut u8 == (address as *mut u8).add(nbytes) {
          sbrk(-(nbytes as intptr_t));
        }
        return Err(ArenaError::NotContiguous {
          expected: expected as usize,
          actual: address as usize,
        });
      }
    }

    let old_len = self.len;
    self.len = new_len;
    Ok(old_len)
  }

  fn bytes(&self) -> &[u8] {
    if self.start.is_null() {
      return &[];
    }
    // SAFETY: `[start, start + len)` was obtained from sbrk by this arena
    // and is only reachable through it.
    unsafe { slice::from_raw_parts(self.start, self.len) }
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    if self.start.is_null() {
      return &mut [];
    }
    // SAFETY: as in `bytes`, borrowed mutably through `self`.
    unsafe { slice::from_raw_parts_mut(self.start, self.len) }
  }

  /// Gives the region back to the system when it still ends at the
  /// program break; otherwise it is abandoned.
  fn reset(&mut self) {
    if self.start.is_null() {
      return;
    }

    unsafe {
      let end = self.start.add(self.len);
      if self.len > 0 && sbrk(0) as *mut u8 == end {
        sbrk(-(self.len as intptr_t));
      }
    }

    self.start = ptr::null_mut();
    self.len = 0;
  }
}

impl Drop for SbrkArena {
  fn drop(&mut self) {
    self.reset();
  }
}
