use super::{FIRST_BLOCK, Heap, PROLOGUE};
use crate::{
  align::is_aligned,
  block::BoundaryTag,
  config::{ALIGNMENT, DSIZE, MIN_BLOCK_SIZE, WSIZE},
  error::HeapCheckError,
  source::MemorySource,
};

/// Occupancy summary of a heap.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  /// Bytes owned by the heap, prologue and epilogue included.
  pub heap_size: usize,
  pub allocated_blocks: usize,
  pub free_blocks: usize,
  /// Sum of allocated block sizes, tags included.
  pub allocated_bytes: usize,
  /// Sum of free block sizes, tags included.
  pub free_bytes: usize,
  pub largest_free: usize,
}

impl HeapStats {
  fn record(
    &mut self,
    tag: BoundaryTag,
  ) {
    if tag.allocated() {
      self.allocated_blocks += 1;
      self.allocated_bytes += tag.size();
    } else {
      self.free_blocks += 1;
      self.free_bytes += tag.size();
      self.largest_free = self.largest_free.max(tag.size());
    }
  }
}

impl<S: MemorySource> Heap<S> {
  /// Occupancy of the heap, without validating it.
  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      heap_size: self.len,
      ..HeapStats::default()
    };
    for (_, tag) in self.walk(FIRST_BLOCK) {
      stats.record(tag);
    }
    stats
  }

  /// Walks the whole heap and verifies its invariants:
  ///
  /// - prologue and epilogue are intact and the epilogue ends the heap;
  /// - every block is aligned, at least [`MIN_BLOCK_SIZE`] long and inside
  ///   the heap;
  /// - header and footer agree;
  /// - no two free blocks are neighbours;
  /// - the next-fit cursor names a block (or the epilogue).
  ///
  /// Nothing is read outside the heap, even when it is corrupt.
  pub fn check(&self) -> Result<HeapStats, HeapCheckError> {
    let prologue = BoundaryTag::pack(DSIZE, true);
    if self.read_tag(PROLOGUE - WSIZE) != prologue || self.read_tag(PROLOGUE) != prologue {
      return Err(HeapCheckError::BadPrologue);
    }

    let mut stats = HeapStats {
      heap_size: self.len,
      ..HeapStats::default()
    };
    let mut cursor_seen = false;
    let mut prev_free = false;
    let mut prev_bp = PROLOGUE;
    let mut bp = FIRST_BLOCK;

    loop {
      cursor_seen |= bp == self.last_fit;

      let tag = self.header(bp);
      let size = tag.size();
      if size == 0 {
        if !tag.allocated() || bp != self.len {
          return Err(HeapCheckError::BadEpilogue { offset: bp });
        }
        break;
      }

      if !is_aligned(bp, ALIGNMENT) {
        return Err(HeapCheckError::Misaligned { offset: bp });
      }
      if size < MIN_BLOCK_SIZE {
        return Err(HeapCheckError::TooSmall { offset: bp, size });
      }
      if bp.checked_add(size).is_none_or(|end| end > self.len) {
        return Err(HeapCheckError::OutOfBounds { offset: bp });
      }
      if self.read_tag(bp + size - DSIZE) != tag {
        return Err(HeapCheckError::TagMismatch { offset: bp });
      }
      if prev_free && tag.is_free() {
        return Err(HeapCheckError::Uncoalesced { offset: prev_bp });
      }

      stats.record(tag);
      prev_free = tag.is_free();
      prev_bp = bp;
      bp += size;
    }

    if !cursor_seen {
      return Err(HeapCheckError::StaleCursor {
        offset: self.last_fit,
      });
    }

    Ok(stats)
  }
}
