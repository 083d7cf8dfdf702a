use core::ptr::NonNull;
use std::alloc::{self, Layout};

use log::warn;

use crate::{config::ALIGNMENT, error::GrowError, source::MemorySource};

/// A bounded, simulated program break over a private buffer.
///
/// Growth past the capacity fails with [`GrowError::Exhausted`] and leaves
/// the break where it was, which makes this the source of choice for tests
/// and for replaying request traces deterministically.
///
/// ```text
///   start                      brk                        start + capacity
///   ├──────── handed out ───────┼────────── reserve ──────────┤
/// ```
pub struct MemLib {
  start: NonNull<u8>,
  layout: Layout,
  capacity: usize,
  brk: usize,
}

impl MemLib {
  /// 20 MiB, the size of the classic simulated heap.
  pub const DEFAULT_CAPACITY: usize = 20 * (1 << 20);

  /// Reserves a zeroed buffer of `capacity` bytes.
  ///
  /// # Panics
  ///
  /// Panics if `capacity` exceeds `isize::MAX` or the reservation fails.
  pub fn new(capacity: usize) -> Self {
    // A zero-sized layout cannot be allocated; keep at least one unit around.
    let Ok(layout) = Layout::from_size_align(capacity.max(ALIGNMENT), 2 * ALIGNMENT) else {
      panic!("MemLib capacity {capacity} is too large");
    };
    // SAFETY: the layout has a non-zero size.
    let raw = unsafe { alloc::alloc_zeroed(layout) };
    let Some(start) = NonNull::new(raw) else {
      alloc::handle_alloc_error(layout);
    };
    Self {
      start,
      layout,
      capacity,
      brk: 0,
    }
  }

  pub const fn capacity(&self) -> usize {
    self.capacity
  }

  pub const fn remaining(&self) -> usize {
    self.capacity - self.brk
  }

  /// Moves the break back to the start, discarding every region handed out.
  ///
  /// # Safety
  ///
  /// No pointer previously returned by [`sbrk`](MemorySource::sbrk) may be
  /// used afterwards, which in practice means any [`Heap`](crate::Heap)
  /// built on this source must already be gone.
  pub unsafe fn reset_brk(&mut self) {
    self.brk = 0;
  }
}

impl Default for MemLib {
  fn default() -> Self {
    Self::new(Self::DEFAULT_CAPACITY)
  }
}

impl Drop for MemLib {
  fn drop(&mut self) {
    // SAFETY: `start` came from `alloc_zeroed` with this same layout.
    unsafe { alloc::dealloc(self.start.as_ptr(), self.layout) };
  }
}

impl MemorySource for MemLib {
  fn sbrk(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, GrowError> {
    let remaining = self.remaining();
    if increment > remaining {
      warn!("memlib: sbrk({increment}) failed, only {remaining} bytes left");
      return Err(GrowError::Exhausted {
        requested: increment,
        remaining,
      });
    }

    // SAFETY: brk <= capacity <= layout.size(), so this stays inside the buffer.
    let old = unsafe { self.start.add(self.brk) };
    self.brk += increment;
    Ok(old)
  }

  fn heap_lo(&self) -> NonNull<u8> {
    self.start
  }

  fn heap_hi(&self) -> NonNull<u8> {
    // SAFETY: brk <= capacity, so this is at most one past the end of the buffer.
    unsafe { self.start.add(self.brk) }
  }
}
