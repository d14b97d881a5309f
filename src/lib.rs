//! # tagalloc - An Explicit Free List Memory Allocator
//!
//! This crate implements a `malloc`/`free`/`realloc` style heap on top of a
//! single, linearly growable memory arena. Free space is tracked with
//! **boundary tags** and an **explicit doubly-linked free list**; allocation
//! is **first fit** with splitting, and freed blocks are **coalesced**
//! eagerly with their physical neighbors.
//!
//! ## Overview
//!
//! ```text
//!   Arena:
//!
//!   ┌───┬──────┬────────────┬──────────────┬────────┬──────────────────┬───┐
//!   │pad│ prol │ allocated  │     free     │ alloc  │       free       │epi│
//!   └───┴──────┴────────────┴──────┬───────┴────────┴────────┬─────────┴───┘
//!                                  │          ▲              │    ▲
//!                                  │          └──── pred ────┘    │
//!                                  └────────────── succ ──────────┘
//!                                           ▲
//!                                     free list head
//!
//!   Physical order: every block, found by adding sizes (implicit list).
//!   Free list order: free blocks only, most recently freed first.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── arena      - Arena trait, VecArena and SbrkArena backings
//!   ├── block      - Header/footer encoding and neighbor arithmetic
//!   ├── check      - Heap consistency checker
//!   ├── config     - HeapConfig tunables
//!   ├── error      - HeapError, ArenaError, Violation
//!   ├── free_list  - Explicit free list (internal)
//!   └── heap       - Heap: init, alloc, free, realloc
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{Heap, VecArena};
//!
//! let mut heap = Heap::new(VecArena::new());
//!
//! let a = heap.alloc(100)?.expect("non-zero request");
//! heap.payload_mut(a)[..5].copy_from_slice(b"hello");
//!
//! let a = heap.realloc(Some(a), 400)?.expect("non-zero request");
//! assert_eq!(&heap.payload(a)[..5], b"hello");
//!
//! heap.free(Some(a));
//! assert!(heap.check().is_consistent());
//! # Ok::<(), tagalloc::HeapError>(())
//! ```
//!
//! ## How It Works
//!
//! Each block starts with a 4 byte header holding its size and two flags.
//! Free blocks repeat the header as a footer, so the block after them can
//! find their start in O(1):
//!
//! ```text
//!   Block header word:
//!   ┌─────────────────────────────────────────────┬───┬───┬───┐
//!   │            size (multiple of 8)             │ 0 │ p │ a │
//!   └─────────────────────────────────────────────┴───┴───┴───┘
//!                                                       │   └── this block allocated
//!                                                       └────── previous block allocated
//! ```
//!
//! Freeing a block merges it with whichever neighbors are free:
//!
//! ```text
//!   prev   block   next           result
//!   ─────  ─────   ─────          ──────────────────────────
//!   alloc  free    alloc    ──►   block inserted as is
//!   alloc  free    free     ──►   block + next
//!   free   free    alloc    ──►   prev + block
//!   free   free    free     ──►   prev + block + next
//! ```
//!
//! When no free block is large enough the arena grows by at least
//! [`HeapConfig::chunk_size`] bytes and the new space is merged with a free
//! block that ended the heap.
//!
//! ## Features
//!
//! - **Index-based**: blocks are arena offsets ([`Ptr`]); all metadata
//!   access is bounds checked
//! - **Low overhead**: 4 bytes per allocated block, 16 byte minimum block
//! - **In-place realloc**: shrinks, absorbs a free successor, or grows the
//!   last block by extending the arena
//! - **Heap checker**: [`Heap::check`] validates the block chain and the free
//!   list and reports every violation found
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Heap` requires `&mut self` for every operation
//! - **8 byte alignment**: larger alignments are not supported
//! - **4 GiB arenas**: offsets are stored in 32-bit words
//! - **Never shrinks**: memory goes back to the arena only on `init`
//!
//! ## Safety
//!
//! The allocator itself is safe code over a byte slice. The `unsafe` lives
//! in the arenas, which expose their backing memory as that slice. Freeing
//! a pointer twice or freeing a foreign pointer corrupts the heap's
//! metadata (and may panic) but cannot cause undefined behavior.

pub mod align;
pub mod arena;
pub mod block;
mod check;
mod config;
mod error;
mod free_list;
mod heap;

pub use arena::{Arena, DEFAULT_ARENA_LIMIT, SbrkArena, VecArena};
pub use block::Ptr;
pub use check::HeapReport;
pub use config::HeapConfig;
pub use error::{ArenaError, HeapError, Violation};
pub use heap::{BlockInfo, Blocks, Heap, HeapStats, adjusted_size};
