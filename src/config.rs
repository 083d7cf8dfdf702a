//! Heap geometry and tuning knobs.

use crate::error::ConfigError;

/// Width of a header or footer word in bytes.
pub const WSIZE: usize = 4;

/// Double word; the combined header + footer overhead of every block.
pub const DSIZE: usize = 8;

/// Payload alignment. Every block size is a multiple of this.
pub const ALIGNMENT: usize = 8;

/// Smallest block that can be carved out: header, footer and one aligned
/// payload unit.
pub const MIN_BLOCK_SIZE: usize = 16;

/// Size of the first free region laid down by [`Heap::new`](crate::Heap::new).
pub const INITIAL_SIZE: usize = 1 << 6;

/// Organic growth increment used when no fit exists.
pub const CHUNK_SIZE: usize = 1 << 12;

/// Block size separating "small" from "large" requests.
pub const FIT_THRESHOLD: usize = 100;

/// Runtime configuration of a [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Bytes requested from the memory source right after the prologue.
  pub initial_size: usize,
  /// Minimum growth increment when an allocation misses.
  pub chunk_size: usize,
  /// Adjusted block sizes below this use first-fit, the rest next-fit.
  /// Blocks strictly above it are placed at the back of a split.
  pub fit_threshold: usize,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      initial_size: INITIAL_SIZE,
      chunk_size: CHUNK_SIZE,
      fit_threshold: FIT_THRESHOLD,
    }
  }
}

impl HeapConfig {
  #[must_use]
  pub const fn with_initial_size(
    mut self,
    initial_size: usize,
  ) -> Self {
    self.initial_size = initial_size;
    self
  }

  #[must_use]
  pub const fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  #[must_use]
  pub const fn with_fit_threshold(
    mut self,
    fit_threshold: usize,
  ) -> Self {
    self.fit_threshold = fit_threshold;
    self
  }

  /// Checks that the configuration describes a usable heap.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.chunk_size == 0 {
      return Err(ConfigError::ZeroChunkSize);
    }
    if self.initial_size < MIN_BLOCK_SIZE {
      return Err(ConfigError::InitialSizeTooSmall {
        initial_size: self.initial_size,
        minimum: MIN_BLOCK_SIZE,
      });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_is_valid() {
    assert_eq!(HeapConfig::default().validate(), Ok(()));
  }

  #[test]
  fn test_geometry_is_consistent() {
    assert_eq!(DSIZE, 2 * WSIZE);
    assert!(ALIGNMENT.is_power_of_two());
    assert_eq!(MIN_BLOCK_SIZE % ALIGNMENT, 0);
    assert!(MIN_BLOCK_SIZE > DSIZE);
  }

  #[test]
  fn test_rejects_zero_chunk() {
    let config = HeapConfig::default().with_chunk_size(0);
    assert_eq!(config.validate(), Err(ConfigError::ZeroChunkSize));
  }

  #[test]
  fn test_rejects_tiny_initial_size() {
    let config = HeapConfig::default().with_initial_size(8);
    assert_eq!(
      config.validate(),
      Err(ConfigError::InitialSizeTooSmall {
        initial_size: 8,
        minimum: MIN_BLOCK_SIZE,
      })
    );
  }

  #[test]
  fn test_builder_overrides() {
    let config = HeapConfig::default()
      .with_initial_size(128)
      .with_chunk_size(256)
      .with_fit_threshold(64);
    assert_eq!(config.initial_size, 128);
    assert_eq!(config.chunk_size, 256);
    assert_eq!(config.fit_threshold, 64);
  }
}
