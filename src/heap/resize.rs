use core::ptr::{self, NonNull};

use log::{debug, trace, warn};

use super::Heap;
use crate::{config::DSIZE, error::AllocError, source::MemorySource};

impl<S: MemorySource> Heap<S> {
  /// Resizes the block at `ptr` to hold at least `size` bytes.
  ///
  /// - `None` behaves like [`allocate`](Self::allocate).
  /// - `size == 0` frees the block and returns `Ok(None)`.
  /// - Shrinking keeps the block as it is.
  /// - Growing first tries to absorb a free block right behind this one;
  ///   failing that, the payload moves to a new block and the old one is
  ///   freed.
  ///
  /// The first `min(old, size)` payload bytes are preserved in every case.
  /// If relocation fails, the original block is left untouched.
  pub fn resize(
    &mut self,
    ptr: Option<NonNull<u8>>,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    let Some(ptr) = ptr else {
      return self.allocate(size);
    };

    let (bp, tag) = self.locate(ptr)?;
    if tag.is_free() {
      warn!("resize: block at offset {bp} is not allocated");
      return Err(AllocError::NotAllocated(ptr.as_ptr() as usize));
    }

    if size == 0 {
      self.release(bp, tag.size());
      return Ok(None);
    }

    let old_payload = tag.size() - DSIZE;
    if size <= old_payload {
      return Ok(Some(ptr));
    }

    let asize = Self::adjusted_size(size)?;
    let next = bp + tag.size();
    let next_tag = self.header(next);
    if next_tag.is_free() && tag.size() + next_tag.size() >= asize {
      let combined = tag.size() + next_tag.size();
      self.set_block(bp, combined, true);
      self.repair_cursor(bp, combined);
      trace!("resize: grew block at {bp} in place to {combined} bytes");
      return Ok(Some(ptr));
    }

    let new_bp = self.allocate_block(asize)?;
    let new_ptr = self.payload_ptr(new_bp);
    // SAFETY: both blocks are live and distinct, and each holds at least
    // `old_payload` bytes.
    unsafe {
      ptr::copy_nonoverlapping(self.payload_ptr(bp).as_ptr(), new_ptr.as_ptr(), old_payload);
    }
    self.release(bp, tag.size());
    debug!("resize: moved block {bp} to {new_bp} ({old_payload} -> {size} bytes)");

    Ok(Some(new_ptr))
  }
}
