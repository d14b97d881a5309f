use thiserror::Error;

/// Failure to grow the arena.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArenaError {
  /// The arena limit (or the program break) cannot move any further.
  #[error("arena exhausted: cannot grow by {requested} bytes (limit {limit} bytes)")]
  Exhausted { requested: usize, limit: usize },

  /// Someone else moved the program break between two extensions.
  #[error("arena is no longer contiguous: expected break at {expected:#x}, found {actual:#x}")]
  NotContiguous { expected: usize, actual: usize },

  /// Offsets past 4 GiB cannot be stored in a header or free-list link.
  #[error("arena would exceed the 32-bit offset space")]
  AddressSpace,
}

/// Errors surfaced by heap operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeapError {
  #[error("out of memory: {0}")]
  OutOfMemory(#[from] ArenaError),

  /// The request cannot be encoded in a block header.
  #[error("out of memory: request of {0} bytes exceeds the maximum block size")]
  RequestTooLarge(usize),
}

impl HeapError {
  /// Both variants mean the request could not be served and the heap is
  /// untouched.
  pub fn is_out_of_memory(&self) -> bool {
    matches!(self, Self::OutOfMemory(_) | Self::RequestTooLarge(_))
  }
}

/// A broken heap invariant found by the consistency checker.
///
/// Offsets are payload offsets unless stated otherwise.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Violation {
  #[error("bad prologue header at {offset:#x}")]
  BadPrologue { offset: usize },

  #[error("bad epilogue header at {offset:#x}")]
  BadEpilogue { offset: usize },

  #[error("payload {offset:#x} is not doubleword aligned")]
  Misaligned { offset: usize },

  #[error("block {offset:#x} extends past the end of the arena")]
  OutOfBounds { offset: usize },

  #[error("block {offset:#x} has invalid size {size}")]
  BadSize { offset: usize, size: usize },

  #[error("header {header:#x} does not match footer {footer:#x} in free block {offset:#x}")]
  TagMismatch { offset: usize, header: u32, footer: u32 },

  #[error("contiguous free blocks at {offset:#x} and {next:#x}")]
  AdjacentFree { offset: usize, next: usize },

  #[error("prev-allocated bit of block {offset:#x} disagrees with its neighbor")]
  PrevAllocMismatch { offset: usize },

  #[error("cycle in free list reached at {offset:#x}")]
  FreeListCycle { offset: usize },

  #[error("free list entry {offset:#x} lies outside the heap")]
  FreeListOutOfBounds { offset: usize },

  #[error("allocated block {offset:#x} is contained in free list")]
  AllocatedInFreeList { offset: usize },

  #[error("free list links are inconsistent at {offset:#x}: predecessor is {found:?}, expected {expected:?}")]
  BrokenLink {
    offset: usize,
    expected: Option<usize>,
    found: Option<usize>,
  },

  #[error("free block {offset:#x} is not in the free list")]
  UnlistedFreeBlock { offset: usize },

  #[error("{physical} free blocks in heap but {listed} in free list")]
  FreeCountMismatch { physical: usize, listed: usize },
}
