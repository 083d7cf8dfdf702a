use log::trace;

use super::Heap;
use crate::{config::MIN_BLOCK_SIZE, source::MemorySource};

impl<S: MemorySource> Heap<S> {
  /// Allocates `asize` bytes out of the free block at `bp` and returns the
  /// payload offset of the allocated part.
  ///
  /// A remainder of at least [`MIN_BLOCK_SIZE`] is split off: in front of a
  /// large allocation, behind a small one. Smaller remainders stay inside
  /// the allocated block.
  pub(super) fn place(
    &mut self,
    bp: usize,
    asize: usize,
  ) -> usize {
    let bsize = self.header(bp).size();
    debug_assert!(self.header(bp).is_free() && bsize >= asize);
    let rsize = bsize - asize;

    let allocated = if rsize < MIN_BLOCK_SIZE {
      self.set_block(bp, bsize, true);
      bp
    } else if asize > self.config.fit_threshold {
      let back = bp + rsize;
      self.set_block(bp, rsize, false);
      self.set_block(back, asize, true);
      trace!("place: {asize} bytes at the back of {bp}, {rsize} left in front");
      back
    } else {
      self.set_block(bp, asize, true);
      self.set_block(bp + asize, rsize, false);
      trace!("place: {asize} bytes at the front of {bp}, {rsize} left behind");
      bp
    };

    self.last_fit = allocated;
    allocated
  }
}
