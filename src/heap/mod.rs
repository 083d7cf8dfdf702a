//! The boundary-tag heap.
//!
//! Every block is addressed by its payload offset `bp` from the start of the
//! heap. Its header lives at `bp - WSIZE`, its footer at
//! `bp + size - DSIZE`, and the next block's payload starts at `bp + size`:
//!
//! ```text
//!        bp - WSIZE   bp                      bp + size - DSIZE  bp + size
//!   ... ─┬──────────┬─┴──────────────────────┬──────────────────┬─┴─ ...
//!        │  header  │        payload         │      footer      │
//!   ... ─┴──────────┴────────────────────────┴──────────────────┴──── ...
//! ```
//!
//! All tag accesses go through `read_tag` and `write_tag`,
//! which check the offset against the current heap extent.

mod check;
mod coalesce;
mod fit;
mod place;
mod resize;

use core::{iter, ptr::NonNull};

use log::{debug, warn};

use crate::{
  align::{checked_align_up, is_aligned},
  block::{BlockInfo, BoundaryTag},
  config::{ALIGNMENT, DSIZE, HeapConfig, MIN_BLOCK_SIZE, WSIZE},
  error::{AllocError, GrowError},
  source::MemorySource,
};

pub use check::HeapStats;

/// Payload offset of the prologue block.
const PROLOGUE: usize = DSIZE;

/// Payload offset of the first real block.
const FIRST_BLOCK: usize = 2 * DSIZE;

/// Padding word, prologue header and footer, epilogue header.
const PROLOGUE_AREA: usize = 4 * WSIZE;

const EPILOGUE: BoundaryTag = BoundaryTag::pack(0, true);

/// A single-threaded heap with boundary tags, a split first-fit / next-fit
/// search and immediate coalescing.
///
/// # Invariants
/// - Header and footer of every block agree between operations.
/// - No two neighbouring blocks are both free.
/// - Prologue and epilogue are allocated, so neighbour lookups never leave
///   the heap.
/// - `last_fit` is the payload offset of a block (or of the epilogue).
pub struct Heap<S: MemorySource> {
  source: S,
  config: HeapConfig,
  /// Start of the heap; every block offset is relative to this.
  base: NonNull<u8>,
  /// Bytes owned by the heap, i.e. `[base, base + len)`.
  len: usize,
  /// Next-fit search cursor.
  last_fit: usize,
}

impl<S: MemorySource> Heap<S> {
  /// Creates a heap on `source` with the default [`HeapConfig`].
  pub fn new(source: S) -> Result<Self, AllocError> {
    Self::with_config(source, HeapConfig::default())
  }

  /// Lays down the prologue and epilogue, then grows the heap by
  /// `config.initial_size`.
  pub fn with_config(
    mut source: S,
    config: HeapConfig,
  ) -> Result<Self, AllocError> {
    config.validate()?;

    let base = source
      .sbrk(PROLOGUE_AREA)
      .map_err(|source| AllocError::OutOfMemory {
        requested: PROLOGUE_AREA,
        source,
      })?;
    if !is_aligned(base.as_ptr() as usize, ALIGNMENT) {
      return Err(AllocError::MisalignedBreak(base.as_ptr() as usize));
    }

    let mut heap = Self {
      source,
      config,
      base,
      len: PROLOGUE_AREA,
      last_fit: FIRST_BLOCK,
    };

    heap.write_tag(0, BoundaryTag::new());
    heap.write_tag(WSIZE, BoundaryTag::pack(DSIZE, true));
    heap.write_tag(2 * WSIZE, BoundaryTag::pack(DSIZE, true));
    heap.write_tag(3 * WSIZE, EPILOGUE);

    heap.extend_heap(config.initial_size)?;
    debug!("heap initialized at {:?}, {} bytes", heap.base, heap.len);

    Ok(heap)
  }

  /// Allocates a block with at least `size` usable bytes.
  ///
  /// Returns `Ok(None)` for a zero-sized request, without touching the heap.
  /// The returned pointer is aligned to [`ALIGNMENT`].
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    if size == 0 {
      return Ok(None);
    }

    let asize = Self::adjusted_size(size)?;
    let bp = self.allocate_block(asize)?;
    Ok(Some(self.payload_ptr(bp)))
  }

  /// Like [`allocate`](Self::allocate), but the payload is zeroed.
  pub fn allocate_zeroed(
    &mut self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    let ptr = self.allocate(size)?;
    if let Some(ptr) = ptr {
      // SAFETY: the block just allocated holds at least `size` payload bytes.
      unsafe { ptr.as_ptr().write_bytes(0, size) };
    }
    Ok(ptr)
  }

  /// Returns a block to the heap and merges it with free neighbours.
  ///
  /// The block's allocated bit is checked first; freeing a block twice is
  /// rejected with [`AllocError::DoubleFree`] and changes nothing.
  pub fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<(), AllocError> {
    let (bp, tag) = self.locate(ptr)?;
    if tag.is_free() {
      warn!("free: block at offset {bp} is already free");
      return Err(AllocError::DoubleFree(ptr.as_ptr() as usize));
    }

    self.release(bp, tag.size());
    Ok(())
  }

  /// Usable bytes of the live block at `ptr`.
  pub fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<usize, AllocError> {
    let (_, tag) = self.locate(ptr)?;
    if tag.is_free() {
      return Err(AllocError::NotAllocated(ptr.as_ptr() as usize));
    }
    Ok(tag.size() - DSIZE)
  }

  /// Blocks between prologue and epilogue, in address order.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.walk(FIRST_BLOCK).map(|(offset, tag)| BlockInfo {
      offset,
      size: tag.size(),
      allocated: tag.allocated(),
    })
  }

  /// First byte of the heap (the alignment padding word).
  pub const fn heap_lo(&self) -> NonNull<u8> {
    self.base
  }

  /// Bytes currently owned by the heap, prologue and epilogue included.
  pub const fn heap_size(&self) -> usize {
    self.len
  }

  pub const fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub const fn source(&self) -> &S {
    &self.source
  }

  /// Block size for a `size`-byte payload: header and footer added, rounded
  /// up to the alignment.
  fn adjusted_size(size: usize) -> Result<usize, AllocError> {
    size
      .checked_add(DSIZE)
      .and_then(|total| checked_align_up(total, ALIGNMENT))
      .filter(|&asize| asize <= BoundaryTag::MAX_SIZE)
      .map(|asize| asize.max(MIN_BLOCK_SIZE))
      .ok_or(AllocError::RequestTooLarge(size))
  }

  /// Finds or makes room for an `asize`-byte block and allocates it.
  fn allocate_block(
    &mut self,
    asize: usize,
  ) -> Result<usize, AllocError> {
    let bp = match self.find_fit(asize) {
      Some(bp) => bp,
      None => self.extend_heap(asize.max(self.config.chunk_size))?,
    };
    Ok(self.place(bp, asize))
  }

  /// Marks the block free and coalesces it.
  fn release(
    &mut self,
    bp: usize,
    size: usize,
  ) -> usize {
    self.set_block(bp, size, false);
    self.coalesce(bp)
  }

  /// Grows the heap by `size` bytes (rounded up to the alignment) and turns
  /// the new region into a free block, merged with a trailing free block if
  /// there is one.
  ///
  /// Nothing is modified when the source refuses to grow.
  fn extend_heap(
    &mut self,
    size: usize,
  ) -> Result<usize, AllocError> {
    let asize = checked_align_up(size, ALIGNMENT).ok_or(AllocError::RequestTooLarge(size))?;

    // Keep every block, merged or not, describable by a tag.
    let remaining = BoundaryTag::MAX_SIZE.saturating_sub(self.len);
    if asize > remaining {
      return Err(AllocError::OutOfMemory {
        requested: asize,
        source: GrowError::Exhausted {
          requested: asize,
          remaining,
        },
      });
    }

    let region = self
      .source
      .sbrk(asize)
      .map_err(|source| AllocError::OutOfMemory {
        requested: asize,
        source,
      })?;
    if region.as_ptr() as usize != self.base.as_ptr() as usize + self.len {
      return Err(AllocError::OutOfMemory {
        requested: asize,
        source: GrowError::NonContiguous,
      });
    }

    // The old epilogue header becomes the new block's header.
    let bp = self.len;
    self.len += asize;
    self.set_block(bp, asize, false);
    self.write_tag(self.len - WSIZE, EPILOGUE);
    debug!("heap grown by {asize} bytes to {}", self.len);

    Ok(self.coalesce(bp))
  }

  /// Maps a caller pointer back to its block, validating what can be
  /// validated without trusting the pointer: bounds, alignment, a sane size
  /// and header/footer agreement.
  fn locate(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<(usize, BoundaryTag), AllocError> {
    let addr = ptr.as_ptr() as usize;
    let invalid = AllocError::InvalidPointer(addr);

    let Some(bp) = addr.checked_sub(self.base.as_ptr() as usize) else {
      return Err(invalid);
    };
    if bp < FIRST_BLOCK || bp >= self.len || !is_aligned(bp, ALIGNMENT) {
      return Err(invalid);
    }

    let tag = self.header(bp);
    let size = tag.size();
    let fits = bp.checked_add(size).filter(|&end| end <= self.len).is_some();
    if size < MIN_BLOCK_SIZE || !fits || self.read_tag(bp + size - DSIZE) != tag {
      warn!("pointer {ptr:?} does not name a block");
      return Err(invalid);
    }

    Ok((bp, tag))
  }

  fn read_tag(
    &self,
    at: usize,
  ) -> BoundaryTag {
    assert!(
      is_aligned(at, WSIZE) && at + WSIZE <= self.len,
      "tag access at offset {at} outside heap of {} bytes",
      self.len
    );
    // SAFETY: [base, base + len) belongs to this heap and `at` was checked above.
    BoundaryTag::from_bits(unsafe { self.base.add(at).cast::<u32>().read() })
  }

  fn write_tag(
    &mut self,
    at: usize,
    tag: BoundaryTag,
  ) {
    assert!(
      is_aligned(at, WSIZE) && at + WSIZE <= self.len,
      "tag access at offset {at} outside heap of {} bytes",
      self.len
    );
    // SAFETY: see `read_tag`.
    unsafe { self.base.add(at).cast::<u32>().write(tag.into_bits()) };
  }

  #[inline]
  fn header(
    &self,
    bp: usize,
  ) -> BoundaryTag {
    self.read_tag(bp - WSIZE)
  }

  /// Writes matching header and footer for the block at `bp`.
  fn set_block(
    &mut self,
    bp: usize,
    size: usize,
    allocated: bool,
  ) {
    let tag = BoundaryTag::pack(size, allocated);
    self.write_tag(bp - WSIZE, tag);
    self.write_tag(bp + size - DSIZE, tag);
  }

  #[inline]
  fn next_block(
    &self,
    bp: usize,
  ) -> usize {
    bp + self.header(bp).size()
  }

  /// Uses the previous block's footer, so it is only meaningful when that
  /// footer is current.
  #[inline]
  fn prev_block(
    &self,
    bp: usize,
  ) -> usize {
    bp - self.read_tag(bp - DSIZE).size()
  }

  fn payload_ptr(
    &self,
    bp: usize,
  ) -> NonNull<u8> {
    debug_assert!(bp < self.len);
    // SAFETY: `bp` is inside [base, base + len), which this heap owns.
    unsafe { self.base.add(bp) }
  }

  /// Walks blocks in address order starting at `from`, stopping at the
  /// epilogue.
  fn walk(
    &self,
    from: usize,
  ) -> impl Iterator<Item = (usize, BoundaryTag)> + '_ {
    let mut bp = from;
    iter::from_fn(move || {
      let tag = self.header(bp);
      if tag.size() == 0 {
        return None;
      }
      let current = bp;
      bp += tag.size();
      Some((current, tag))
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::INITIAL_SIZE, memlib::MemLib};

  pub(super) fn heap() -> Heap<MemLib> {
    Heap::new(MemLib::new(1 << 20)).unwrap()
  }

  pub(super) fn offset<S: MemorySource>(
    heap: &Heap<S>,
    ptr: NonNull<u8>,
  ) -> usize {
    ptr.as_ptr() as usize - heap.heap_lo().as_ptr() as usize
  }

  pub(super) fn layout<S: MemorySource>(heap: &Heap<S>) -> Vec<(usize, usize, bool)> {
    heap
      .blocks()
      .map(|block| (block.offset, block.size, block.allocated))
      .collect()
  }

  #[test]
  fn test_init_layout() {
    let heap = heap();

    assert_eq!(heap.heap_size(), PROLOGUE_AREA + INITIAL_SIZE);
    assert_eq!(heap.read_tag(WSIZE), BoundaryTag::pack(DSIZE, true));
    assert_eq!(heap.read_tag(2 * WSIZE), BoundaryTag::pack(DSIZE, true));
    assert_eq!(heap.header(PROLOGUE).size(), DSIZE);
    assert_eq!(layout(&heap), vec![(FIRST_BLOCK, INITIAL_SIZE, false)]);
    assert_eq!(heap.header(heap.heap_size()), EPILOGUE);
    heap.check().unwrap();
  }

  #[test]
  fn test_init_fails_on_small_source() {
    let err = Heap::new(MemLib::new(PROLOGUE_AREA + 8)).err().unwrap();
    assert!(matches!(
      err,
      AllocError::OutOfMemory {
        requested: INITIAL_SIZE,
        source: GrowError::Exhausted { .. }
      }
    ));
  }

  #[test]
  fn test_init_rejects_bad_config() {
    let config = HeapConfig::default().with_chunk_size(0);
    let err = Heap::with_config(MemLib::new(1024), config).err().unwrap();
    assert_eq!(
      err,
      AllocError::Config(crate::error::ConfigError::ZeroChunkSize)
    );
  }

  #[test]
  fn test_adjusted_size() {
    assert_eq!(Heap::<MemLib>::adjusted_size(1).unwrap(), 16);
    assert_eq!(Heap::<MemLib>::adjusted_size(8).unwrap(), 16);
    assert_eq!(Heap::<MemLib>::adjusted_size(9).unwrap(), 24);
    assert_eq!(Heap::<MemLib>::adjusted_size(16).unwrap(), 24);
    assert_eq!(
      Heap::<MemLib>::adjusted_size(usize::MAX),
      Err(AllocError::RequestTooLarge(usize::MAX))
    );
    assert_eq!(
      Heap::<MemLib>::adjusted_size(BoundaryTag::MAX_SIZE),
      Err(AllocError::RequestTooLarge(BoundaryTag::MAX_SIZE))
    );
  }

  #[test]
  fn test_zero_sized_allocation_is_a_no_op() {
    let mut heap = heap();
    let before = layout(&heap);

    assert_eq!(heap.allocate(0), Ok(None));
    assert_eq!(layout(&heap), before);
    assert_eq!(heap.last_fit, FIRST_BLOCK);
  }

  #[test]
  fn test_alloc_alignment_and_content() {
    let mut heap = heap();

    unsafe {
      let first = heap.allocate(size_of::<u64>()).unwrap().unwrap().cast::<u64>();
      first.write(3);

      let count = 6;
      let second = heap
        .allocate(count * size_of::<u16>())
        .unwrap()
        .unwrap()
        .cast::<u16>();
      for i in 0..count {
        second.add(i).write((i + 1) as u16);
      }

      assert_eq!(first.read(), 3);
      for i in 0..count {
        assert_eq!((i + 1) as u16, second.add(i).read());
      }
      assert_eq!(first.as_ptr() as usize % ALIGNMENT, 0);
      assert_eq!(second.as_ptr() as usize % ALIGNMENT, 0);
    }
    heap.check().unwrap();
  }

  #[test]
  fn test_allocation_grows_heap_when_nothing_fits() {
    let mut heap = heap();

    let ptr = heap.allocate(1000).unwrap().unwrap();

    assert_eq!(heap.heap_size(), PROLOGUE_AREA + INITIAL_SIZE + 4096);
    assert!(heap.usable_size(ptr).unwrap() >= 1000);
    heap.check().unwrap();
  }

  #[test]
  fn test_allocate_zeroed() {
    let mut heap = heap();

    let dirty = heap.allocate(32).unwrap().unwrap();
    unsafe { dirty.as_ptr().write_bytes(0xFF, 32) };
    heap.free(dirty).unwrap();

    let clean = heap.allocate_zeroed(32).unwrap().unwrap();
    assert_eq!(clean, dirty);
    let bytes = unsafe { core::slice::from_raw_parts(clean.as_ptr(), 32) };
    assert!(bytes.iter().all(|&b| b == 0));
  }

  #[test]
  fn test_free_rejects_double_free() {
    let mut heap = heap();
    let ptr = heap.allocate(16).unwrap().unwrap();
    let _guard = heap.allocate(16).unwrap().unwrap();

    heap.free(ptr).unwrap();
    let before = layout(&heap);

    assert_eq!(
      heap.free(ptr),
      Err(AllocError::DoubleFree(ptr.as_ptr() as usize))
    );
    assert_eq!(layout(&heap), before);
  }

  #[test]
  fn test_free_rejects_foreign_pointers() {
    let mut heap = heap();
    let ptr = heap.allocate(16).unwrap().unwrap();

    let mut outside = 0u64;
    let foreign = NonNull::from(&mut outside).cast::<u8>();
    assert!(matches!(heap.free(foreign), Err(AllocError::InvalidPointer(_))));

    let misaligned = unsafe { ptr.add(4) };
    assert!(matches!(
      heap.free(misaligned),
      Err(AllocError::InvalidPointer(_))
    ));

    let prologue = unsafe { heap.heap_lo().add(PROLOGUE) };
    assert!(matches!(
      heap.free(prologue),
      Err(AllocError::InvalidPointer(_))
    ));

    heap.check().unwrap();
    assert_eq!(heap.usable_size(ptr), Ok(16));
  }

  #[test]
  fn test_free_rejects_header_claiming_too_much() {
    let mut heap = heap();
    let ptr = heap.allocate(16).unwrap().unwrap();
    let bp = offset(&heap, ptr);
    let before = layout(&heap);

    heap.write_tag(bp - WSIZE, BoundaryTag::pack(BoundaryTag::MAX_SIZE, true));

    assert_eq!(
      heap.free(ptr),
      Err(AllocError::InvalidPointer(ptr.as_ptr() as usize))
    );
    heap.write_tag(bp - WSIZE, BoundaryTag::pack(24, true));
    assert_eq!(layout(&heap), before);
    heap.check().unwrap();
  }

  #[test]
  fn test_usable_size() {
    let mut heap = heap();

    let ptr = heap.allocate(13).unwrap().unwrap();
    assert_eq!(heap.usable_size(ptr), Ok(16));

    let _guard = heap.allocate(8).unwrap().unwrap();
    heap.free(ptr).unwrap();
    assert_eq!(
      heap.usable_size(ptr),
      Err(AllocError::NotAllocated(ptr.as_ptr() as usize))
    );
  }

  #[test]
  fn test_independent_heaps_do_not_share_cursor() {
    let mut one = heap();
    let mut two = heap();

    one.allocate(200).unwrap().unwrap();

    assert_ne!(one.last_fit, FIRST_BLOCK);
    assert_eq!(two.last_fit, FIRST_BLOCK);
    two.check().unwrap();
    one.check().unwrap();
    let _ = two.allocate(8).unwrap();
  }
}
