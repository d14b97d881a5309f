use crate::align;
use crate::block::{CHUNK_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Tunables for a [`Heap`](crate::Heap).
///
/// ```rust
/// use tagalloc::HeapConfig;
///
/// let config = HeapConfig::new().with_chunk_size(100).with_check_heap(true);
/// assert_eq!(config.chunk_size(), 104);
/// assert!(config.check_heap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  chunk_size: usize,
  check_heap: bool,
}

impl HeapConfig {
  pub const fn new() -> Self {
    Self {
      chunk_size: CHUNK_SIZE,
      check_heap: false,
    }
  }

  /// Minimum number of bytes requested from the arena per extension.
  ///
  /// Rounded up to a doubleword and clamped to what a block header can
  /// describe.
  pub fn with_chunk_size(
    mut self,
    bytes: usize,
  ) -> Self {
    let bytes = bytes.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
    self.chunk_size = align!(bytes);
    self
  }

  /// Runs the consistency checker after every mutating operation and logs
  /// what it finds.
  pub fn with_check_heap(
    mut self,
    enabled: bool,
  ) -> Self {
    self.check_heap = enabled;
    self
  }

  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  pub fn check_heap(&self) -> bool {
    self.check_heap
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = HeapConfig::default();
    assert_eq!(config.chunk_size(), 4096);
    assert!(!config.check_heap());
  }

  #[test]
  fn test_chunk_size_is_clamped() {
    assert_eq!(HeapConfig::new().with_chunk_size(0).chunk_size(), MIN_BLOCK_SIZE);
    assert_eq!(HeapConfig::new().with_chunk_size(usize::MAX).chunk_size(), MAX_BLOCK_SIZE);
  }
}
