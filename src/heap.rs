//! Allocator core: explicit free list, first fit, boundary-tag coalescing.
//!
//! ```text
//!   Heap layout right after init():
//!
//!   offset 0    4          8          12         16                  16+chunk-4
//!   ┌──────────┬──────────┬──────────┬──────────┬───────────────────┬──────────┐
//!   │ padding  │ prologue │ prologue │  header  │   free block ...  │ epilogue │
//!   │    0     │  8 | a=1 │  8 | a=1 │ chunk|a=0│ pred succ ... ftr │  0 | a=1 │
//!   └──────────┴──────────┴──────────┴──────────┴───────────────────┴──────────┘
//!                         ▲                     ▲
//!                     heap_start            first payload
//! ```

use tracing::{debug, trace, warn};

use crate::{
  align,
  arena::Arena,
  block::{
    self, ALLOC, DSIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, PREV_ALLOC, Ptr, Tag, WSIZE, block_size,
    get, header, is_alloc, is_prev_alloc, pack, put, size_of,
  },
  check::{self, HeapReport},
  config::HeapConfig,
  error::HeapError,
  free_list::FreeList,
};

/// Block size needed to serve a request of `size` payload bytes.
///
/// Allocated blocks carry only a header, but every block must be able to
/// turn back into a free block with two links and a footer.
pub fn adjusted_size(size: usize) -> Option<usize> {
  if size > MAX_BLOCK_SIZE - DSIZE {
    return None;
  }
  Some(align!(size + WSIZE).max(MIN_BLOCK_SIZE))
}

/// One block of the physical chain, sentinels excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub offset: usize,
  pub size: usize,
  pub allocated: bool,
}

/// Totals over the physical chain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  pub arena_bytes: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
}

/// A heap managing one [`Arena`].
///
/// Single-threaded: every operation takes `&mut self`. Several heaps can
/// coexist, each over its own arena.
pub struct Heap<A: Arena> {
  arena: A,
  config: HeapConfig,
  free_list: FreeList,
  heap_start: usize,
  initialized: bool,
}

impl<A: Arena> Heap<A> {
  /// Creates a heap over `arena`. The heap is laid out lazily by the first
  /// operation, or explicitly by [`Heap::init`].
  pub fn new(arena: A) -> Self {
    Self::with_config(arena, HeapConfig::default())
  }

  pub fn with_config(
    arena: A,
    config: HeapConfig,
  ) -> Self {
    Self {
      arena,
      config,
      free_list: FreeList::new(),
      heap_start: 0,
      initialized: false,
    }
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn arena(&self) -> &A {
    &self.arena
  }

  /// Raw access to the arena, metadata included. Writing outside a payload
  /// breaks the heap; the checker will tell you how.
  pub fn arena_mut(&mut self) -> &mut A {
    &mut self.arena
  }

  pub fn is_initialized(&self) -> bool {
    self.initialized
  }

  /// Lays out a fresh heap: prologue, epilogue, and one free chunk.
  ///
  /// Everything previously allocated is forgotten.
  pub fn init(&mut self) -> Result<(), HeapError> {
    self.arena.reset();
    self.free_list.clear();
    self.initialized = false;

    let start = self.arena.extend(4 * WSIZE)?;
    let mem = self.arena.bytes_mut();
    put(mem, start, 0);
    put(mem, start + WSIZE, pack(DSIZE, ALLOC | PREV_ALLOC));
    put(mem, start + 2 * WSIZE, pack(DSIZE, ALLOC | PREV_ALLOC));
    put(mem, start + 3 * WSIZE, pack(0, ALLOC | PREV_ALLOC));
    self.heap_start = start + DSIZE;
    self.initialized = true;

    self.extend_heap(self.config.chunk_size())?;

    debug!(chunk_size = self.config.chunk_size(), "heap initialized");
    self.debug_check("init");
    Ok(())
  }

  fn ensure_init(&mut self) -> Result<(), HeapError> {
    if !self.initialized {
      self.init()?;
    }
    Ok(())
  }

  /// Allocates a block with at least `size` usable bytes.
  ///
  /// A zero-sized request returns `Ok(None)` without touching the arena,
  /// even on an uninitialized heap. Fails only when the arena cannot grow.
  pub fn alloc(
    &mut self,
    size: usize,
  ) -> Result<Option<Ptr>, HeapError> {
    if size == 0 {
      return Ok(None);
    }
    self.ensure_init()?;

    let asize = adjusted_size(size).ok_or(HeapError::RequestTooLarge(size))?;

    let bp = match self.find_fit(asize) {
      Some(bp) => bp,
      None => {
        let extend = asize.max(self.config.chunk_size());
        self.extend_heap(extend).inspect_err(|err| {
          warn!(size, %err, "allocation failed");
        })?
      }
    };
    self.place(bp, asize);

    trace!(size, block = asize, offset = bp, "alloc");
    self.debug_check("alloc");
    Ok(Ptr::from_offset(bp))
  }

  /// Returns a block to the heap. `None` is ignored.
  ///
  /// `ptr` must come from this heap and must not have been freed since.
  pub fn free(
    &mut self,
    ptr: Option<Ptr>,
  ) {
    let Some(ptr) = ptr else {
      return;
    };
    if !self.initialized {
      warn!(offset = ptr.offset(), "free on an uninitialized heap ignored");
      return;
    }

    let bp = ptr.offset();
    let mem = self.arena.bytes_mut();
    let word = get(mem, header(bp));
    let size = size_of(word);

    block::write_free(mem, bp, size, is_prev_alloc(word));
    block::set_prev_alloc(mem, bp + size, false);
    self.coalesce(bp);

    trace!(offset = bp, size, "free");
    self.debug_check("free");
  }

  /// Resizes the block at `ptr` to hold at least `size` bytes.
  ///
  /// `None` behaves like [`Heap::alloc`]; a zero `size` frees the block.
  /// The block is shrunk or grown in place when possible, otherwise its
  /// contents move to a new block. On failure the original block is left
  /// untouched.
  pub fn realloc(
    &mut self,
    ptr: Option<Ptr>,
    size: usize,
  ) -> Result<Option<Ptr>, HeapError> {
    let Some(ptr) = ptr else {
      return self.alloc(size);
    };
    if size == 0 {
      self.free(Some(ptr));
      return Ok(None);
    }
    self.ensure_init()?;

    let asize = adjusted_size(size).ok_or(HeapError::RequestTooLarge(size))?;
    let bp = ptr.offset();
    let csize = block_size(self.arena.bytes(), bp);

    if asize <= csize {
      self.split_allocated(bp, csize, asize);
      trace!(offset = bp, size, "realloc in place (shrink)");
      self.debug_check("realloc");
      return Ok(Some(ptr));
    }

    if self.grow_in_place(bp, csize, asize) {
      trace!(offset = bp, size, "realloc in place (grow)");
      self.debug_check("realloc");
      return Ok(Some(ptr));
    }

    let Some(new) = self.alloc(size)? else {
      return Ok(None);
    };
    let copy = (csize - WSIZE).min(size);
    self
      .arena
      .bytes_mut()
      .copy_within(bp..bp + copy, new.offset());
    self.free(Some(ptr));

    trace!(from = bp, to = new.offset(), size, "realloc moved");
    self.debug_check("realloc");
    Ok(Some(new))
  }

  /// Grows the heap by at least `bytes` and returns the resulting free
  /// block, merged with a free block that ended the heap.
  fn extend_heap(
    &mut self,
    bytes: usize,
  ) -> Result<usize, HeapError> {
    let size = align!(bytes);
    let bp = self.arena.extend(size)?;

    // The old epilogue header becomes the new block's header.
    let mem = self.arena.bytes_mut();
    let prev_allocated = is_prev_alloc(get(mem, header(bp)));
    block::write_free(mem, bp, size, prev_allocated);
    put(mem, header(bp + size), pack(0, ALLOC));

    debug!(bytes = size, arena = mem.len(), "extended heap");
    Ok(self.coalesce(bp))
  }

  fn find_fit(
    &self,
    asize: usize,
  ) -> Option<usize> {
    let mem = self.arena.bytes();
    self
      .free_list
      .iter(mem)
      .find(|&bp| block_size(mem, bp) >= asize)
  }

  /// Allocates `asize` bytes at the start of free block `bp`.
  fn place(
    &mut self,
    bp: usize,
    asize: usize,
  ) {
    let mem = self.arena.bytes_mut();
    self.free_list.remove(mem, bp);
    let csize = block_size(mem, bp);
    self.split_allocated(bp, csize, asize);
  }

  /// Marks `bp` allocated with `asize` out of `total` bytes. A remainder
  /// large enough to be a block is split off and coalesced forward;
  /// anything smaller stays attached as internal fragmentation.
  fn split_allocated(
    &mut self,
    bp: usize,
    total: usize,
    asize: usize,
  ) {
    let mem = self.arena.bytes_mut();
    let prev_flag = get(mem, header(bp)) & PREV_ALLOC;

    if total - asize >= MIN_BLOCK_SIZE {
      put(mem, header(bp), pack(asize, prev_flag | ALLOC));
      let tail = bp + asize;
      block::write_free(mem, tail, total - asize, true);
      self.coalesce(tail);
    } else {
      put(mem, header(bp), pack(total, prev_flag | ALLOC));
      block::set_prev_alloc(mem, bp + total, true);
    }
  }

  /// Extends the allocated block `bp` into the space after it.
  fn grow_in_place(
    &mut self,
    bp: usize,
    csize: usize,
    asize: usize,
  ) -> bool {
    let next = bp + csize;
    let next_word = get(self.arena.bytes(), header(next));

    // Last block before the epilogue: grow the arena by just the shortfall.
    if size_of(next_word) == 0 {
      let missing = asize - csize;
      if let Err(err) = self.arena.extend(missing) {
        debug!(%err, "cannot grow last block in place");
        return false;
      }
      let mem = self.arena.bytes_mut();
      let prev_flag = get(mem, header(bp)) & PREV_ALLOC;
      put(mem, header(bp), pack(asize, prev_flag | ALLOC));
      put(mem, header(bp + asize), pack(0, ALLOC | PREV_ALLOC));
      return true;
    }

    let next_size = size_of(next_word);
    if is_alloc(next_word) || csize + next_size < asize {
      return false;
    }

    let mem = self.arena.bytes_mut();
    self.free_list.remove(mem, next);
    self.split_allocated(bp, csize + next_size, asize);
    true
  }

  /// Merges the free block `bp` with free physical neighbors and puts the
  /// result on the free list. Returns the merged block.
  fn coalesce(
    &mut self,
    bp: usize,
  ) -> usize {
    let mem = self.arena.bytes_mut();
    let word = get(mem, header(bp));
    let prev_allocated = is_prev_alloc(word);
    let next = bp + size_of(word);
    let next_allocated = is_alloc(get(mem, header(next)));
    let mut size = size_of(word);
    let mut bp = bp;

    match (prev_allocated, next_allocated) {
      (true, true) => {}
      (true, false) => {
        self.free_list.remove(mem, next);
        size += block_size(mem, next);
      }
      (false, true) => {
        let prev = block::prev_block(mem, bp);
        self.free_list.remove(mem, prev);
        size += block_size(mem, prev);
        bp = prev;
      }
      (false, false) => {
        let prev = block::prev_block(mem, bp);
        self.free_list.remove(mem, next);
        self.free_list.remove(mem, prev);
        size += block_size(mem, prev) + block_size(mem, next);
        bp = prev;
      }
    }

    let prev_allocated = is_prev_alloc(get(mem, header(bp)));
    block::write_free(mem, bp, size, prev_allocated);
    block::set_prev_alloc(mem, bp + size, false);
    self.free_list.insert(mem, bp);
    bp
  }

  /// Bytes the caller may use at `ptr`.
  pub fn usable_size(
    &self,
    ptr: Ptr,
  ) -> usize {
    block_size(self.arena.bytes(), ptr.offset()) - WSIZE
  }

  pub fn payload(
    &self,
    ptr: Ptr,
  ) -> &[u8] {
    let bp = ptr.offset();
    &self.arena.bytes()[bp..bp + self.usable_size(ptr)]
  }

  pub fn payload_mut(
    &mut self,
    ptr: Ptr,
  ) -> &mut [u8] {
    let bp = ptr.offset();
    let len = self.usable_size(ptr);
    &mut self.arena.bytes_mut()[bp..bp + len]
  }

  /// Absolute address of the payload at `ptr`.
  pub fn as_ptr(
    &self,
    ptr: Ptr,
  ) -> *const u8 {
    self.arena.base().wrapping_add(ptr.offset())
  }

  /// Walks the physical chain from the first block after the prologue.
  pub fn blocks(&self) -> Blocks<'_> {
    let mem = self.arena.bytes();
    let next = if self.initialized {
      Some(self.heap_start + DSIZE)
    } else {
      None
    };
    Blocks { mem, next }
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      arena_bytes: self.arena.len(),
      ..HeapStats::default()
    };
    for block in self.blocks() {
      if block.allocated {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += block.size;
      } else {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
      }
    }
    stats
  }

  /// Validates the heap and reports every broken invariant found.
  pub fn check(&self) -> HeapReport {
    check::check_heap(self.arena.bytes(), self.heap_start, self.free_list.head())
  }

  fn debug_check(
    &self,
    op: &'static str,
  ) {
    if !self.config.check_heap() {
      return;
    }
    let report = self.check();
    for violation in &report.violations {
      warn!(op, %violation, "heap consistency violation");
    }
  }
}

/// Iterator over the physical chain. See [`Heap::blocks`].
pub struct Blocks<'a> {
  mem: &'a [u8],
  next: Option<usize>,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let bp = self.next?;
    let tag = Tag::unpack(block::try_get(self.mem, header(bp))?);
    if tag.size == 0 {
      self.next = None;
      return None;
    }
    self.next = Some(bp + tag.size);
    Some(BlockInfo {
      offset: bp,
      size: tag.size,
      allocated: tag.allocated,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    arena::{Arena, VecArena},
    error::ArenaError,
  };

  fn heap() -> Heap<VecArena> {
    let config = HeapConfig::new().with_check_heap(true);
    let mut heap = Heap::with_config(VecArena::with_limit(1 << 20), config);
    heap.init().unwrap();
    heap
  }

  fn alloc(
    heap: &mut Heap<VecArena>,
    size: usize,
  ) -> Ptr {
    heap.alloc(size).unwrap().unwrap()
  }

  fn assert_consistent(heap: &Heap<VecArena>) {
    let report = heap.check();
    assert!(report.is_consistent(), "{report}");
  }

  #[test]
  fn test_adjusted_size() {
    assert_eq!(adjusted_size(1), Some(16));
    assert_eq!(adjusted_size(12), Some(16));
    assert_eq!(adjusted_size(13), Some(24));
    assert_eq!(adjusted_size(100), Some(104));
    assert_eq!(adjusted_size(usize::MAX), None);
  }

  #[test]
  fn test_init_layout() {
    let heap = heap();
    let mem = heap.arena().bytes();

    assert_eq!(mem.len(), 16 + 4096);
    assert_eq!(get(mem, 4), pack(8, ALLOC | PREV_ALLOC));
    assert_eq!(get(mem, 8), pack(8, ALLOC | PREV_ALLOC));
    assert_eq!(heap.blocks().collect::<Vec<_>>(), vec![BlockInfo {
      offset: 16,
      size: 4096,
      allocated: false,
    }]);
    assert_eq!(get(mem, mem.len() - WSIZE), pack(0, ALLOC));
    assert_consistent(&heap);
  }

  #[test]
  fn test_zero_size_is_none() {
    let mut heap = heap();
    assert_eq!(heap.alloc(0), Ok(None));
    assert_eq!(heap.stats().allocated_blocks, 0);
  }

  #[test]
  fn test_zero_size_leaves_uninitialized_heap_alone() {
    let mut heap = Heap::new(VecArena::with_limit(8));

    assert_eq!(heap.alloc(0), Ok(None));
    assert_eq!(heap.realloc(None, 0), Ok(None));
    assert!(!heap.is_initialized());
    assert!(heap.arena().is_empty());
  }

  #[test]
  fn test_alloc_lazily_initializes() {
    let mut heap = Heap::new(VecArena::with_limit(1 << 16));
    assert!(!heap.is_initialized());

    let p = heap.alloc(10).unwrap().unwrap();
    assert!(heap.is_initialized());
    assert_eq!(p.offset(), 16);
    assert_consistent(&heap);
  }

  #[test]
  fn test_alloc_is_aligned_and_writable() {
    let mut heap = heap();
    let mut ptrs = Vec::new();

    for size in [1, 7, 8, 9, 24, 100, 1000, 5000] {
      let p = alloc(&mut heap, size);
      assert_eq!(p.offset() % DSIZE, 0);
      assert_eq!(heap.as_ptr(p) as usize % DSIZE, 0);
      assert!(heap.usable_size(p) >= size);
      heap.payload_mut(p).fill(size as u8);
      ptrs.push((p, size));
    }

    for (p, size) in ptrs {
      assert!(heap.payload(p)[..size].iter().all(|&b| b == size as u8));
    }
    assert_consistent(&heap);
  }

  #[test]
  fn test_split_leaves_free_tail() {
    let mut heap = heap();
    let p = alloc(&mut heap, 100);

    let blocks: Vec<_> = heap.blocks().collect();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0], BlockInfo {
      offset: p.offset(),
      size: 104,
      allocated: true,
    });
    assert_eq!(blocks[1].size, 4096 - 104);
    assert!(!blocks[1].allocated);
  }

  #[test]
  fn test_no_split_for_small_remainder() {
    let mut heap = Heap::with_config(
      VecArena::with_limit(1 << 16),
      HeapConfig::new().with_chunk_size(32),
    );
    heap.init().unwrap();

    // 24 of 32 bytes leaves 8, too small to be a block.
    let p = alloc(&mut heap, 20);
    assert_eq!(heap.usable_size(p), 32 - WSIZE);
    assert_eq!(heap.stats().free_blocks, 0);
    assert_consistent(&heap);
  }

  #[test]
  fn test_freed_region_is_reused_first_fit() {
    let mut heap = heap();
    let a = alloc(&mut heap, 100);
    let _b = alloc(&mut heap, 200);
    heap.free(Some(a));

    let arena_before = heap.arena().len();
    let c = alloc(&mut heap, 50);

    assert_eq!(c, a);
    assert_eq!(heap.arena().len(), arena_before);
    assert_consistent(&heap);
  }

  #[test]
  fn test_adjacent_frees_merge() {
    let mut heap = heap();
    let a = alloc(&mut heap, 24);
    let b = alloc(&mut heap, 24);
    let _guard = alloc(&mut heap, 24);

    heap.free(Some(a));
    heap.free(Some(b));

    let first = heap.blocks().next().unwrap();
    assert_eq!(first.offset, a.offset());
    assert!(!first.allocated);
    assert!(first.size >= 48 + 2 * WSIZE);
    assert_consistent(&heap);
  }

  #[test]
  fn test_coalesce_all_four_cases() {
    let mut heap = heap();
    let ptrs: Vec<_> = (0..6).map(|_| alloc(&mut heap, 40)).collect();

    // Case 1: both neighbors allocated.
    heap.free(Some(ptrs[1]));
    assert_eq!(heap.stats().free_blocks, 2);

    // Case 2: successor free.
    heap.free(Some(ptrs[0]));
    assert_eq!(heap.stats().free_blocks, 2);

    // Case 3: predecessor free.
    heap.free(Some(ptrs[2]));
    assert_eq!(heap.stats().free_blocks, 2);

    // Case 4: both free.
    heap.free(Some(ptrs[4]));
    heap.free(Some(ptrs[3]));
    let stats = heap.stats();
    assert_eq!(stats.free_blocks, 2);
    assert_eq!(stats.allocated_blocks, 1);
    assert_eq!(heap.blocks().next().unwrap().size, 5 * 48);
    assert_consistent(&heap);

    heap.free(Some(ptrs[5]));
    assert_eq!(heap.stats().free_blocks, 1);
    assert_consistent(&heap);
  }

  #[test]
  fn test_extension_when_no_fit() {
    let mut heap = heap();
    let p = alloc(&mut heap, 10_000);

    assert!(heap.usable_size(p) >= 10_000);
    assert!(heap.arena().len() > 16 + 4096);
    // The initial chunk merged into the new region.
    assert_eq!(heap.blocks().next().unwrap().offset, p.offset());
    assert_consistent(&heap);
  }

  #[test]
  fn test_out_of_memory_keeps_heap_usable() {
    let mut heap = Heap::new(VecArena::with_limit(16 + 4096));
    heap.init().unwrap();
    let a = alloc(&mut heap, 64);

    let err = heap.alloc(8192).unwrap_err();
    assert!(err.is_out_of_memory());
    assert!(matches!(
      err,
      HeapError::OutOfMemory(ArenaError::Exhausted { .. })
    ));

    assert_consistent(&heap);
    assert!(heap.alloc(64).unwrap().is_some());
    heap.free(Some(a));
    assert_consistent(&heap);
  }

  #[test]
  fn test_init_fails_without_room() {
    let mut heap = Heap::new(VecArena::with_limit(8));
    assert!(heap.init().unwrap_err().is_out_of_memory());

    let mut heap = Heap::new(VecArena::with_limit(64));
    assert!(heap.init().unwrap_err().is_out_of_memory());
  }

  #[test]
  fn test_request_too_large() {
    let mut heap = heap();
    assert_eq!(
      heap.alloc(usize::MAX),
      Err(HeapError::RequestTooLarge(usize::MAX))
    );
  }

  #[test]
  fn test_free_none_is_noop() {
    let mut heap = heap();
    let before = heap.stats();
    heap.free(None);
    assert_eq!(heap.stats(), before);
  }

  #[test]
  fn test_init_resets_heap() {
    let mut heap = heap();
    alloc(&mut heap, 10_000);
    heap.init().unwrap();

    assert_eq!(heap.arena().len(), 16 + 4096);
    assert_eq!(heap.stats().free_blocks, 1);
    assert_consistent(&heap);
  }

  #[test]
  fn test_realloc_none_allocates() {
    let mut heap = heap();
    let p = heap.realloc(None, 32).unwrap().unwrap();
    assert!(heap.usable_size(p) >= 32);
  }

  #[test]
  fn test_realloc_zero_frees() {
    let mut heap = heap();
    let p = alloc(&mut heap, 32);
    assert_eq!(heap.realloc(Some(p), 0), Ok(None));
    assert_eq!(heap.stats().allocated_blocks, 0);
    assert_consistent(&heap);
  }

  #[test]
  fn test_realloc_same_size_is_identity() {
    let mut heap = heap();
    let p = alloc(&mut heap, 40);
    heap.payload_mut(p)[..40].copy_from_slice(&[9; 40]);
    let before = heap.stats();

    assert_eq!(heap.realloc(Some(p), 40), Ok(Some(p)));
    assert_eq!(&heap.payload(p)[..40], &[9; 40]);
    assert_eq!(heap.stats(), before);
  }

  #[test]
  fn test_realloc_shrinks_in_place() {
    let mut heap = heap();
    let p = alloc(&mut heap, 1000);
    let _guard = alloc(&mut heap, 8);
    heap.payload_mut(p)[..16].copy_from_slice(b"0123456789abcdef");

    assert_eq!(heap.realloc(Some(p), 16), Ok(Some(p)));
    assert_eq!(heap.usable_size(p), 24 - WSIZE);
    assert_eq!(&heap.payload(p)[..16], b"0123456789abcdef");
    assert_eq!(heap.stats().free_blocks, 2);
    assert_consistent(&heap);
  }

  #[test]
  fn test_realloc_grows_into_free_successor() {
    let mut heap = heap();
    let p = alloc(&mut heap, 24);
    let q = alloc(&mut heap, 200);
    let _guard = alloc(&mut heap, 8);
    heap.payload_mut(p)[..24].copy_from_slice(&[3; 24]);
    heap.free(Some(q));

    assert_eq!(heap.realloc(Some(p), 150), Ok(Some(p)));
    assert!(heap.usable_size(p) >= 150);
    assert_eq!(&heap.payload(p)[..24], &[3; 24]);
    assert_consistent(&heap);
  }

  #[test]
  fn test_realloc_grows_last_block_by_extending() {
    let mut heap = Heap::with_config(
      VecArena::with_limit(1 << 16),
      HeapConfig::new().with_chunk_size(64).with_check_heap(true),
    );
    heap.init().unwrap();
    let p = alloc(&mut heap, 60);
    assert_eq!(heap.stats().free_blocks, 0);
    let arena_before = heap.arena().len();

    assert_eq!(heap.realloc(Some(p), 100), Ok(Some(p)));
    assert_eq!(heap.usable_size(p), 104 - WSIZE);
    assert_eq!(heap.arena().len(), arena_before + 104 - 64);
    assert_consistent(&heap);
  }

  #[test]
  fn test_realloc_moves_and_copies() {
    let mut heap = heap();
    let p = alloc(&mut heap, 16);
    let _guard = alloc(&mut heap, 16);
    heap.payload_mut(p)[..16].copy_from_slice(b"boundary-tagged!");

    let q = heap.realloc(Some(p), 64).unwrap().unwrap();
    assert_ne!(q, p);
    assert_eq!(&heap.payload(q)[..16], b"boundary-tagged!");
    assert_consistent(&heap);
  }

  #[test]
  fn test_realloc_failure_keeps_original() {
    let mut heap = Heap::new(VecArena::with_limit(16 + 4096));
    heap.init().unwrap();
    let p = alloc(&mut heap, 32);
    let _guard = alloc(&mut heap, 32);
    heap.payload_mut(p)[..4].copy_from_slice(b"keep");

    let err = heap.realloc(Some(p), 8192).unwrap_err();
    assert!(err.is_out_of_memory());
    assert_eq!(&heap.payload(p)[..4], b"keep");
    assert!(heap.blocks().any(|b| b.offset == p.offset() && b.allocated));
    assert_consistent(&heap);
  }

  #[test]
  fn test_independent_heaps() {
    let mut first = heap();
    let mut second = heap();

    let a = alloc(&mut first, 64);
    let b = alloc(&mut second, 64);
    first.payload_mut(a).fill(1);
    second.payload_mut(b).fill(2);

    assert!(first.payload(a).iter().all(|&x| x == 1));
    assert!(second.payload(b).iter().all(|&x| x == 2));
  }
}
