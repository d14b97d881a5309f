//! Heap consistency checker.
//!
//! Walks the physical block chain from prologue to epilogue, then the free
//! list from its head, and records every invariant it finds broken. All
//! reads are bounds checked, so a corrupt heap produces violations rather
//! than panics. Nothing is modified.

use std::{collections::BTreeSet, fmt};

use crate::{
  block::{DSIZE, MIN_BLOCK_SIZE, Tag, WSIZE, footer, get, header, is_alloc, size_of, try_get},
  error::Violation,
  free_list::{pred, succ},
};

/// Result of a consistency check.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HeapReport {
  /// Blocks between the sentinels.
  pub blocks: usize,
  /// Free blocks found walking the heap.
  pub free_blocks: usize,
  pub free_bytes: usize,
  /// Free blocks reachable from the free list head.
  pub listed_free: usize,
  pub violations: Vec<Violation>,
}

impl HeapReport {
  pub fn is_consistent(&self) -> bool {
    self.violations.is_empty()
  }

  pub fn contains(
    &self,
    violation: &Violation,
  ) -> bool {
    self.violations.contains(violation)
  }

  fn report(
    &mut self,
    violation: Violation,
  ) {
    self.violations.push(violation);
  }
}

impl fmt::Display for HeapReport {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "heap: {} blocks, {} free ({} bytes), {} in free list",
      self.blocks, self.free_blocks, self.free_bytes, self.listed_free
    )?;
    if self.is_consistent() {
      return write!(f, ", consistent");
    }
    for violation in &self.violations {
      write!(f, "\n  error: {violation}")?;
    }
    Ok(())
  }
}

pub(crate) fn check_heap(
  mem: &[u8],
  heap_start: usize,
  head: Option<usize>,
) -> HeapReport {
  let mut report = HeapReport::default();
  let physical_free = check_blocks(mem, heap_start, &mut report);
  check_free_list(mem, heap_start, head, &physical_free, &mut report);
  report
}

/// First pass: prologue to epilogue. Returns the free blocks seen.
fn check_blocks(
  mem: &[u8],
  heap_start: usize,
  report: &mut HeapReport,
) -> BTreeSet<usize> {
  let mut free = BTreeSet::new();

  let prologue = heap_start
    .checked_sub(WSIZE)
    .and_then(|at| try_get(mem, at));
  match prologue {
    Some(word) if size_of(word) == DSIZE && is_alloc(word) => {}
    Some(_) => report.report(Violation::BadPrologue { offset: heap_start }),
    None => {
      report.report(Violation::BadPrologue { offset: heap_start });
      return free;
    }
  }

  let mut bp = heap_start;
  // The padding word before the prologue counts as allocated.
  let mut prev: Option<(usize, bool)> = None;

  loop {
    let Some(word) = try_get(mem, header(bp)) else {
      report.report(Violation::OutOfBounds { offset: bp });
      break;
    };
    let tag = Tag::unpack(word);
    let prev_allocated = prev.is_none_or(|(_, allocated)| allocated);

    if tag.prev_allocated != prev_allocated {
      report.report(Violation::PrevAllocMismatch { offset: bp });
    }

    if tag.size == 0 {
      if !tag.allocated || bp != mem.len() {
        report.report(Violation::BadEpilogue { offset: bp });
      }
      break;
    }

    if bp % DSIZE != 0 {
      report.report(Violation::Misaligned { offset: bp });
    }
    if bp != heap_start && tag.size < MIN_BLOCK_SIZE {
      report.report(Violation::BadSize {
        offset: bp,
        size: tag.size,
      });
    }
    if bp + tag.size > mem.len() {
      report.report(Violation::OutOfBounds { offset: bp });
      break;
    }

    if bp != heap_start {
      report.blocks += 1;
    }

    if !tag.allocated {
      let footer_word = get(mem, footer(bp, tag.size));
      if footer_word != word {
        report.report(Violation::TagMismatch {
          offset: bp,
          header: word,
          footer: footer_word,
        });
      }
      if let Some((prev_bp, false)) = prev {
        report.report(Violation::AdjacentFree {
          offset: prev_bp,
          next: bp,
        });
      }
      free.insert(bp);
      report.free_blocks += 1;
      report.free_bytes += tag.size;
    }

    prev = Some((bp, tag.allocated));
    bp += tag.size;
  }

  free
}

/// Second pass: free list head to tail.
fn check_free_list(
  mem: &[u8],
  heap_start: usize,
  head: Option<usize>,
  physical_free: &BTreeSet<usize>,
  report: &mut HeapReport,
) {
  let in_heap =
    |bp: usize| bp > heap_start && bp % DSIZE == 0 && bp + MIN_BLOCK_SIZE <= mem.len() + WSIZE;
  let advance = |link: Option<usize>| link.filter(|&bp| in_heap(bp)).and_then(|bp| succ(mem, bp));

  let mut listed = BTreeSet::new();
  let mut prev = None;
  let mut slow = head;
  let mut fast = head;

  while let Some(bp) = slow {
    if !in_heap(bp) {
      report.report(Violation::FreeListOutOfBounds { offset: bp });
      break;
    }

    if is_alloc(get(mem, header(bp))) {
      report.report(Violation::AllocatedInFreeList { offset: bp });
    } else {
      listed.insert(bp);
    }

    let found = pred(mem, bp);
    if found != prev {
      report.report(Violation::BrokenLink {
        offset: bp,
        expected: prev,
        found,
      });
    }

    prev = Some(bp);
    slow = succ(mem, bp);
    fast = advance(advance(fast));

    match slow {
      Some(meet) if fast == slow => {
        report.report(Violation::FreeListCycle { offset: meet });
        break;
      }
      _ => {}
    }
  }

  report.listed_free = listed.len();

  for &bp in physical_free.difference(&listed) {
    report.report(Violation::UnlistedFreeBlock { offset: bp });
  }
  if physical_free.len() != listed.len() {
    report.report(Violation::FreeCountMismatch {
      physical: physical_free.len(),
      listed: listed.len(),
    });
  }
}
