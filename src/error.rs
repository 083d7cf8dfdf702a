//! Error types for heap growth, allocation and heap checking.

/// Failure of the raw memory-growth primitive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrowError {
  #[error("memory source exhausted: requested {requested} bytes, {remaining} remaining")]
  Exhausted { requested: usize, remaining: usize },
  #[error("program break was moved by someone else")]
  NonContiguous,
  #[error("sbrk failed (errno {0})")]
  Os(i32),
}

/// Failure of a heap operation.
///
/// Every variant is reported before the heap is mutated, so the heap stays
/// consistent after an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
  #[error("out of memory while growing the heap by {requested} bytes")]
  OutOfMemory {
    requested: usize,
    #[source]
    source: GrowError,
  },
  #[error("memory source returned a misaligned break at {0:#x}")]
  MisalignedBreak(usize),
  #[error("request of {0} bytes does not fit in a block")]
  RequestTooLarge(usize),
  #[error("pointer {0:#x} does not point into the heap")]
  InvalidPointer(usize),
  #[error("double free of {0:#x}")]
  DoubleFree(usize),
  #[error("block at {0:#x} is not allocated")]
  NotAllocated(usize),
  #[error(transparent)]
  Config(#[from] ConfigError),
}

/// Invalid [`HeapConfig`](crate::HeapConfig) value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
  #[error("chunk size must be non-zero")]
  ZeroChunkSize,
  #[error("initial size {initial_size} is below the minimum block size {minimum}")]
  InitialSizeTooSmall { initial_size: usize, minimum: usize },
}

/// An inconsistency found by [`Heap::check`](crate::Heap::check).
///
/// `offset` is the payload offset of the offending block relative to the
/// start of the heap.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapCheckError {
  #[error("bad prologue")]
  BadPrologue,
  #[error("bad epilogue at offset {offset}")]
  BadEpilogue { offset: usize },
  #[error("block at offset {offset} is not aligned")]
  Misaligned { offset: usize },
  #[error("block at offset {offset} has size {size}, below the minimum")]
  TooSmall { offset: usize, size: usize },
  #[error("header and footer of block at offset {offset} disagree")]
  TagMismatch { offset: usize },
  #[error("free blocks at offset {offset} and its successor were not coalesced")]
  Uncoalesced { offset: usize },
  #[error("block at offset {offset} runs past the end of the heap")]
  OutOfBounds { offset: usize },
  #[error("search cursor at offset {offset} is not a block boundary")]
  StaleCursor { offset: usize },
}
