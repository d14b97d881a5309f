//! Explicit free list.
//!
//! A doubly-linked list threaded through the payloads of free blocks only.
//! Each free block stores the offset of its predecessor in its first
//! payload word and the offset of its successor in the second; offset zero
//! means "none". Allocated payloads are never interpreted as links.
//!
//! ```text
//!   head
//!    │
//!    ▼
//!   ┌──────────┐      ┌──────────┐      ┌──────────┐
//!   │ pred: 0  │◄─────┤ pred     │◄─────┤ pred     │
//!   │ succ     ├─────►│ succ     ├─────►│ succ: 0  │
//!   └──────────┘      └──────────┘      └──────────┘
//!    last freed                          first freed
//! ```
//!
//! Order is LIFO and unrelated to the physical order of the blocks.

use crate::block::{WSIZE, get, put};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FreeList {
  head: Option<usize>,
}

fn decode(word: u32) -> Option<usize> {
  match word {
    0 => None,
    offset => Some(offset as usize),
  }
}

fn encode(link: Option<usize>) -> u32 {
  link.map_or(0, |offset| offset as u32)
}

pub(crate) fn pred(
  mem: &[u8],
  bp: usize,
) -> Option<usize> {
  decode(get(mem, bp))
}

pub(crate) fn succ(
  mem: &[u8],
  bp: usize,
) -> Option<usize> {
  decode(get(mem, bp + WSIZE))
}

fn set_pred(
  mem: &mut [u8],
  bp: usize,
  link: Option<usize>,
) {
  put(mem, bp, encode(link));
}

fn set_succ(
  mem: &mut [u8],
  bp: usize,
  link: Option<usize>,
) {
  put(mem, bp + WSIZE, encode(link));
}

impl FreeList {
  pub const fn new() -> Self {
    Self { head: None }
  }

  pub fn head(&self) -> Option<usize> {
    self.head
  }

  pub fn clear(&mut self) {
    self.head = None;
  }

  /// Pushes `bp` at the head. `bp` must not already be in the list.
  pub fn insert(
    &mut self,
    mem: &mut [u8],
    bp: usize,
  ) {
    set_pred(mem, bp, None);
    set_succ(mem, bp, self.head);
    if let Some(head) = self.head {
      set_pred(mem, head, Some(bp));
    }
    self.head = Some(bp);
  }

  /// Splices `bp` out of the list.
  pub fn remove(
    &mut self,
    mem: &mut [u8],
    bp: usize,
  ) {
    let prev = pred(mem, bp);
    let next = succ(mem, bp);

    if let Some(next) = next {
      set_pred(mem, next, prev);
    }
    match prev {
      Some(prev) => set_succ(mem, prev, next),
      None => self.head = next,
    }
  }

  /// Walks the list from the head. Trusts the links; use the heap checker
  /// on a heap that may be corrupt.
  pub fn iter<'a>(
    &self,
    mem: &'a [u8],
  ) -> Iter<'a> {
    Iter {
      mem,
      next: self.head,
    }
  }
}

pub(crate) struct Iter<'a> {
  mem: &'a [u8],
  next: Option<usize>,
}

impl Iterator for Iter<'_> {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    let bp = self.next?;
    self.next = succ(self.mem, bp);
    Some(bp)
  }
}
