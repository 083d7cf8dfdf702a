//! # tagalloc - A Boundary-Tag Heap Allocator
//!
//! This crate implements a classic **implicit free list** allocator: one
//! contiguous heap, grown on demand through an `sbrk`-like primitive, in
//! which every block describes itself with a header and a footer.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌─────┬──────────────┬──────────┬──────────┬──────────┬─────┬──────────┐
//!   │ pad │   prologue   │ block A  │ block B  │ block C  │ ... │ epilogue │
//!   │     │  (8, alloc)  │ (alloc)  │  (free)  │ (alloc)  │     │(0, alloc)│
//!   └─────┴──────────────┴──────────┴──────────┴──────────┴─────┴──────────┘
//!   ▲                                                                      ▲
//!   │                                                                      │
//!  heap_lo                                                        program break
//! ```
//!
//! Prologue and epilogue are permanently allocated, so looking at a block's
//! neighbours never runs off either end of the heap.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment helpers (align!)
//!   ├── block      - BoundaryTag (packed size | allocated word), BlockInfo
//!   ├── config     - Geometry constants and HeapConfig
//!   ├── error      - AllocError, GrowError, ConfigError, HeapCheckError
//!   ├── heap       - Heap: fit search, placement, coalescing, resize, checker
//!   ├── source     - MemorySource trait (the growth primitive)
//!   ├── memlib     - MemLib: bounded simulated break
//!   └── sbrk       - Sbrk: the real program break (unix)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{Heap, MemLib};
//!
//! let mut heap = Heap::new(MemLib::default())?;
//!
//! let ptr = heap.allocate(24)?.expect("non-zero request");
//! unsafe { ptr.cast::<u64>().write(42) };
//!
//! let ptr = heap.resize(Some(ptr), 200)?.expect("non-zero request");
//! assert_eq!(unsafe { ptr.cast::<u64>().read() }, 42);
//!
//! heap.free(ptr)?;
//! heap.check()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## How It Works
//!
//! Each block carries its size and allocated bit twice:
//!
//! ```text
//!   Single Block:
//!   ┌──────────┬────────────────────────────────┬──────────┐
//!   │  header  │            payload             │  footer  │
//!   │ size | a │                                │ size | a │
//!   │ 4 bytes  │   size - 8 bytes, 8-aligned    │ 4 bytes  │
//!   └──────────┴────────────────────────────────┴──────────┘
//!              ▲
//!              └── Pointer returned to user
//! ```
//!
//! The header gives the next block, the previous block's footer gives the
//! previous one, so freeing merges with both neighbours in O(1):
//!
//! ```text
//!   Before free(B):   [ A: free ][ B: alloc ][ C: free ]
//!   After free(B):    [        A + B + C: free         ]
//! ```
//!
//! Requests smaller than the fit threshold take the **first** free block that
//! fits and are carved from its front. Larger requests continue searching
//! from where the previous search stopped (**next fit**) and are carved from
//! the back of the block, keeping the small-block region near the start of
//! the heap compact.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization, `Heap` is not `Sync`
//! - **Never shrinks**: the break only moves up
//! - **8-byte alignment**: larger alignments are not supported
//! - **4 GiB**: block sizes are 29-bit counts of 8-byte units
//!
//! ## Safety
//!
//! The heap API itself is safe: pointers are validated (bounds, alignment,
//! boundary tags, allocated bit) before anything is modified. Reading and
//! writing through the returned pointers is up to the caller and requires
//! `unsafe` as usual.

pub mod align;
mod block;
pub mod config;
mod error;
mod heap;
mod memlib;
#[cfg(unix)]
mod sbrk;
mod source;

pub use block::{BlockInfo, BoundaryTag};
pub use config::HeapConfig;
pub use error::{AllocError, ConfigError, GrowError, HeapCheckError};
pub use heap::{Heap, HeapStats};
pub use memlib::MemLib;
#[cfg(unix)]
pub use sbrk::Sbrk;
pub use source::MemorySource;
