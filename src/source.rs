use core::ptr::NonNull;

use crate::error::GrowError;

/// The raw memory-growth primitive a [`Heap`](crate::Heap) sits on.
///
/// A source hands out one contiguous range `[heap_lo, heap_hi)` whose upper
/// bound only ever moves up, like the classic program break.
pub trait MemorySource {
  /// Extends the range by `increment` bytes and returns the previous upper
  /// bound, which is the start of the new region.
  ///
  /// On failure the range is left unchanged.
  fn sbrk(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, GrowError>;

  /// First byte of the range.
  fn heap_lo(&self) -> NonNull<u8>;

  /// One past the last byte of the range (the current break).
  fn heap_hi(&self) -> NonNull<u8>;

  /// Number of bytes handed out so far.
  fn heap_size(&self) -> usize {
    self.heap_hi().as_ptr() as usize - self.heap_lo().as_ptr() as usize
  }
}
