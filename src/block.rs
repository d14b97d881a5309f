//! Boundary-tag block layout.
//!
//! Blocks are addressed by the offset of their payload inside the arena.
//! Everything here is plain offset arithmetic over the arena bytes; no
//! pointer casts are involved.
//!
//! ```text
//!   Allocated block:              Free block:
//!
//!   ┌──────────────┐ hdr          ┌──────────────┐ hdr
//!   │ size | a=1   │              │ size | a=0   │
//!   ├──────────────┤ ◄── bp       ├──────────────┤ ◄── bp
//!   │              │              │ pred offset  │
//!   │   payload    │              │ succ offset  │
//!   │              │              │   (unused)   │
//!   │              │              ├──────────────┤ ftr
//!   │              │              │ size | a=0   │
//!   └──────────────┘              └──────────────┘
//! ```
//!
//! Allocated blocks carry no footer, so every header also records whether
//! the block physically before it is allocated (`PREV_ALLOC`).

use std::num::NonZeroU32;

/// Word size in bytes: headers, footers and free-list links.
pub const WSIZE: usize = 4;

/// Double-word size in bytes: the payload alignment.
pub const DSIZE: usize = 8;

/// Smallest block that can hold a header, two links and a footer.
pub const MIN_BLOCK_SIZE: usize = 2 * DSIZE;

/// Default amount the heap grows by when no free block fits.
pub const CHUNK_SIZE: usize = 1 << 12;

/// Largest block size representable in a header word.
pub const MAX_BLOCK_SIZE: usize = (u32::MAX & SIZE_MASK) as usize;

/// Header flag: this block is allocated.
pub const ALLOC: u32 = 0x1;

/// Header flag: the physically previous block is allocated.
pub const PREV_ALLOC: u32 = 0x2;

const SIZE_MASK: u32 = !0x7;

/// Handle to an allocated payload, expressed as its arena offset.
///
/// Offset zero holds the alignment padding word, so a payload can never
/// live there and `Option<Ptr>` is the size of a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ptr(NonZeroU32);

impl Ptr {
  pub(crate) fn from_offset(offset: usize) -> Option<Self> {
    u32::try_from(offset).ok().and_then(NonZeroU32::new).map(Self)
  }

  /// Offset of the first payload byte from the start of the arena.
  pub fn offset(self) -> usize {
    self.0.get() as usize
  }
}

/// Decoded contents of a header or footer word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
  pub size: usize,
  pub allocated: bool,
  pub prev_allocated: bool,
}

impl Tag {
  pub fn new(
    size: usize,
    allocated: bool,
    prev_allocated: bool,
  ) -> Self {
    Self {
      size,
      allocated,
      prev_allocated,
    }
  }

  pub fn unpack(word: u32) -> Self {
    Self::new(size_of(word), is_alloc(word), is_prev_alloc(word))
  }

  pub fn pack(self) -> u32 {
    let mut flags = 0;
    if self.allocated {
      flags |= ALLOC;
    }
    if self.prev_allocated {
      flags |= PREV_ALLOC;
    }
    pack(self.size, flags)
  }
}

/// Packs a size and flag bits into a word.
#[inline]
pub const fn pack(
  size: usize,
  flags: u32,
) -> u32 {
  size as u32 | flags
}

#[inline]
pub const fn size_of(word: u32) -> usize {
  (word & SIZE_MASK) as usize
}

#[inline]
pub const fn is_alloc(word: u32) -> bool {
  word & ALLOC != 0
}

#[inline]
pub const fn is_prev_alloc(word: u32) -> bool {
  word & PREV_ALLOC != 0
}

/// Offset of the header word of the block whose payload starts at `bp`.
#[inline]
pub const fn header(bp: usize) -> usize {
  bp - WSIZE
}

/// Offset of the footer word of a block of `size` bytes at `bp`.
#[inline]
pub const fn footer(
  bp: usize,
  size: usize,
) -> usize {
  bp + size - DSIZE
}

/// Reads the word at `at`. Panics if it lies outside `mem`.
#[inline]
pub fn get(
  mem: &[u8],
  at: usize,
) -> u32 {
  let mut word = [0; WSIZE];
  word.copy_from_slice(&mem[at..at + WSIZE]);
  u32::from_le_bytes(word)
}

/// Reads the word at `at`, or `None` if it lies outside `mem`.
pub fn try_get(
  mem: &[u8],
  at: usize,
) -> Option<u32> {
  let bytes = mem.get(at..at.checked_add(WSIZE)?)?;
  <[u8; WSIZE]>::try_from(bytes).ok().map(u32::from_le_bytes)
}

/// Writes `value` to the word at `at`. Panics if it lies outside `mem`.
#[inline]
pub fn put(
  mem: &mut [u8],
  at: usize,
  value: u32,
) {
  mem[at..at + WSIZE].copy_from_slice(&value.to_le_bytes());
}

/// Size of the block at `bp`, read from its header.
#[inline]
pub fn block_size(
  mem: &[u8],
  bp: usize,
) -> usize {
  size_of(get(mem, header(bp)))
}

/// Payload offset of the block physically after `bp`.
#[inline]
pub fn next_block(
  mem: &[u8],
  bp: usize,
) -> usize {
  bp + block_size(mem, bp)
}

/// Payload offset of the block physically before `bp`.
///
/// Only meaningful when that block is free: allocated blocks have no
/// footer to read the size from. Check `PREV_ALLOC` first.
#[inline]
pub fn prev_block(
  mem: &[u8],
  bp: usize,
) -> usize {
  bp - size_of(get(mem, bp - DSIZE))
}

/// Writes the same tag to the header and footer of a free block.
pub fn write_free(
  mem: &mut [u8],
  bp: usize,
  size: usize,
  prev_allocated: bool,
) {
  let word = Tag::new(size, false, prev_allocated).pack();
  put(mem, header(bp), word);
  put(mem, footer(bp, size), word);
}

/// Sets or clears the `PREV_ALLOC` bit in the header of the block at `bp`.
pub fn set_prev_alloc(
  mem: &mut [u8],
  bp: usize,
  prev_allocated: bool,
) {
  let word = get(mem, header(bp));
  let word = if prev_allocated {
    word | PREV_ALLOC
  } else {
    word & !PREV_ALLOC
  };
  put(mem, header(bp), word);
}
