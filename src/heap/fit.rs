use super::{FIRST_BLOCK, Heap};
use crate::source::MemorySource;

impl<S: MemorySource> Heap<S> {
  /// Small blocks take the lowest free block that fits; large blocks
  /// continue from where the last search left off.
  pub(super) fn find_fit(
    &mut self,
    asize: usize,
  ) -> Option<usize> {
    if asize < self.config.fit_threshold {
      self.find_first_fit(asize)
    } else {
      self.find_next_fit(asize)
    }
  }

  pub(super) fn find_first_fit(
    &self,
    asize: usize,
  ) -> Option<usize> {
    self
      .walk(FIRST_BLOCK)
      .find(|(_, tag)| tag.is_free() && tag.size() >= asize)
      .map(|(bp, _)| bp)
  }

  /// Scans `[last_fit, epilogue)`, then wraps around to
  /// `[first block, last_fit)`. A hit becomes the new cursor; a miss leaves
  /// it alone.
  pub(super) fn find_next_fit(
    &mut self,
    asize: usize,
  ) -> Option<usize> {
    let cursor = self.last_fit;
    let found = self
      .walk(cursor)
      .chain(self.walk(FIRST_BLOCK).take_while(|&(bp, _)| bp < cursor))
      .find(|(_, tag)| tag.is_free() && tag.size() >= asize)
      .map(|(bp, _)| bp);

    if let Some(bp) = found {
      self.last_fit = bp;
    }
    found
  }
}

#[cfg(test)]
mod tests {
  use crate::heap::tests::{heap, layout, offset};

  #[test]
  fn test_first_fit_takes_lowest_hole() {
    let mut heap = heap();

    let a = heap.allocate(16).unwrap().unwrap();
    let b = heap.allocate(16).unwrap().unwrap();
    let c = heap.allocate(16).unwrap().unwrap();
    let d = heap.allocate(16).unwrap().unwrap();
    heap.free(a).unwrap();
    heap.free(c).unwrap();

    assert_eq!(
      layout(&heap),
      vec![
        (16, 24, false),
        (40, 24, true),
        (64, 24, false),
        (88, 24, true),
        (112, 4064, false),
      ]
    );
    assert_eq!(heap.find_first_fit(24), Some(16));
    assert_eq!(heap.find_first_fit(32), Some(112));
    assert_eq!(heap.find_first_fit(5000), None);

    assert_eq!(heap.allocate(16).unwrap(), Some(a));
    assert_eq!(heap.allocate(16).unwrap(), Some(c));
    assert_eq!(offset(&heap, b), 40);
    assert_eq!(offset(&heap, d), 88);
  }

  #[test]
  fn test_next_fit_resumes_and_wraps() {
    let mut heap = heap();

    let a = heap.allocate(16).unwrap().unwrap();
    let _b = heap.allocate(16).unwrap().unwrap();
    let c = heap.allocate(16).unwrap().unwrap();
    let _d = heap.allocate(16).unwrap().unwrap();
    heap.free(a).unwrap();
    heap.free(c).unwrap();
    assert_eq!(heap.last_fit, 88);

    // Large request: continues from the cursor and swallows the tail.
    let e = heap.allocate(4056).unwrap().unwrap();
    assert_eq!(offset(&heap, e), 112);
    assert_eq!(heap.last_fit, 112);

    // From the middle, the hole after the cursor wins over the lower one.
    heap.last_fit = 40;
    assert_eq!(heap.find_next_fit(24), Some(64));
    assert_eq!(heap.last_fit, 64);

    // Nothing after the cursor: wrap around to the start.
    heap.last_fit = 112;
    assert_eq!(heap.find_next_fit(24), Some(16));
    assert_eq!(heap.last_fit, 16);

    // A miss keeps the cursor.
    assert_eq!(heap.find_next_fit(32), None);
    assert_eq!(heap.last_fit, 16);
  }

  #[test]
  fn test_find_fit_switches_on_threshold() {
    let mut heap = heap();

    let a = heap.allocate(16).unwrap().unwrap();
    let _b = heap.allocate(16).unwrap().unwrap();
    let c = heap.allocate(16).unwrap().unwrap();
    let _d = heap.allocate(16).unwrap().unwrap();
    heap.free(a).unwrap();
    heap.free(c).unwrap();

    // Both holes are 24 bytes; a 104-byte request only fits the tail.
    heap.last_fit = 40;
    assert_eq!(heap.find_fit(24), Some(16));
    assert_eq!(heap.last_fit, 40);
    assert_eq!(heap.find_fit(104), Some(112));
    assert_eq!(heap.last_fit, 112);
  }

  #[test]
  fn test_fit_never_returns_allocated_or_short_blocks() {
    let mut heap = heap();

    let ptrs: Vec<_> = (0..8).map(|_| heap.allocate(40).unwrap().unwrap()).collect();
    for ptr in ptrs.iter().step_by(2) {
      heap.free(*ptr).unwrap();
    }

    for asize in [16, 48, 56, 104, 512] {
      for bp in [heap.find_first_fit(asize), heap.find_next_fit(asize)]
        .into_iter()
        .flatten()
      {
        let block = heap.blocks().find(|block| block.offset == bp).unwrap();
        assert!(!block.allocated);
        assert!(block.size >= asize);
      }
    }
  }
}
