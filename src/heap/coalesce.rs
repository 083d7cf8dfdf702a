use log::trace;

use super::Heap;
use crate::{config::DSIZE, source::MemorySource};

impl<S: MemorySource> Heap<S> {
  /// Merges the free block at `bp` with whichever neighbours are free and
  /// returns the payload offset of the merged block.
  ///
  /// ```text
  ///   case 1   [A][bp][A]   -> unchanged
  ///   case 2   [A][bp][F]   -> [A][bp + next  ]
  ///   case 3   [F][bp][A]   -> [prev + bp  ][A]
  ///   case 4   [F][bp][F]   -> [prev + bp + next]
  /// ```
  ///
  /// The header of `bp` must already be marked free; its neighbours are
  /// read from the previous footer and the next header.
  pub(super) fn coalesce(
    &mut self,
    bp: usize,
  ) -> usize {
    let prev_allocated = self.read_tag(bp - DSIZE).allocated();
    let next = self.next_block(bp);
    let next_tag = self.header(next);
    let mut size = self.header(bp).size();

    let start = match (prev_allocated, next_tag.allocated()) {
      (true, true) => {
        trace!("coalesce: block at {bp} stands alone");
        return bp;
      }
      (true, false) => {
        size += next_tag.size();
        trace!("coalesce: absorbed next block {next} into {bp}");
        bp
      }
      (false, true) => {
        let prev = self.prev_block(bp);
        size += self.header(prev).size();
        trace!("coalesce: block at {bp} absorbed by previous {prev}");
        prev
      }
      (false, false) => {
        let prev = self.prev_block(bp);
        size += self.header(prev).size() + next_tag.size();
        trace!("coalesce: blocks {prev}, {bp} and {next} merged");
        prev
      }
    };

    self.set_block(start, size, false);
    self.repair_cursor(start, size);
    start
  }

  /// Points `last_fit` at `start` if it named a block that was just
  /// absorbed into `[start, start + size)`.
  pub(super) fn repair_cursor(
    &mut self,
    start: usize,
    size: usize,
  ) {
    if self.last_fit > start && self.last_fit < start + size {
      trace!("coalesce: cursor {} moved to {start}", self.last_fit);
      self.last_fit = start;
    }
  }
}
