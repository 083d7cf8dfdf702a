use bitfield_struct::bitfield;

use crate::config::{ALIGNMENT, DSIZE};

/// A header or footer word: block size and allocated flag packed into a
/// single `u32`.
///
/// ```text
///   31                                   3  2  1  0
///  +---------------------------------------+-----+---+
///  |        size / ALIGNMENT (29 bits)     | 0 0 | a |
///  +---------------------------------------+-----+---+
/// ```
///
/// Because sizes are multiples of [`ALIGNMENT`], the low three bits of the
/// raw word equal the low bits of `size | allocated`, so the encoding is the
/// classic `PACK(size, alloc)`.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct BoundaryTag {
  /// Allocated (bit 0).
  pub allocated: bool,
  #[bits(2)]
  __: u8,
  /// Block size in [`ALIGNMENT`] units (bits 3..31).
  #[bits(29)]
  units: u32,
}

impl BoundaryTag {
  /// Largest block size a tag can describe.
  pub const MAX_SIZE: usize = ((1 << 29) - 1) * ALIGNMENT;

  /// Packs `size` and `allocated` into a tag.
  ///
  /// `size` must be a multiple of [`ALIGNMENT`] no larger than
  /// [`MAX_SIZE`](Self::MAX_SIZE).
  #[inline]
  pub const fn pack(
    size: usize,
    allocated: bool,
  ) -> Self {
    debug_assert!(size % ALIGNMENT == 0);
    debug_assert!(size <= Self::MAX_SIZE);
    Self::new()
      .with_allocated(allocated)
      .with_units((size / ALIGNMENT) as u32)
  }

  /// Total block size in bytes, header and footer included.
  #[inline]
  pub const fn size(self) -> usize {
    self.units() as usize * ALIGNMENT
  }

  #[inline]
  pub const fn is_free(self) -> bool {
    !self.allocated()
  }
}

/// Read-only description of one block, as yielded by
/// [`Heap::blocks`](crate::Heap::blocks).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockInfo {
  /// Payload offset from the start of the heap.
  pub offset: usize,
  /// Total block size, header and footer included.
  pub size: usize,
  pub allocated: bool,
}

impl BlockInfo {
  /// Bytes usable by the caller.
  pub const fn payload_size(&self) -> usize {
    self.size - DSIZE
  }

  /// Offset one past the end of the block's payload area, i.e. the payload
  /// offset of the following block.
  pub const fn end(&self) -> usize {
    self.offset + self.size
  }
}
