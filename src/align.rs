/// Rounds `value` up to the heap's [`ALIGNMENT`](crate::config::ALIGNMENT),
/// or to an explicit power-of-two alignment when one is given.
///
/// # Examples
///
/// ```rust
/// use tagalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(13, 4), 16);
/// assert_eq!(align!(17, 32), 32);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align::align_up($value, $crate::config::ALIGNMENT)
  };
  ($value:expr, $align:expr) => {
    $crate::align::align_up($value, $align)
  };
}

/// Align `value` upwards to `align` (must be a power of two).
#[inline]
pub const fn align_up(
  value: usize,
  align: usize,
) -> usize {
  debug_assert!(align.is_power_of_two());
  (value + (align - 1)) & !(align - 1)
}

/// Like [`align_up`], but returns `None` instead of wrapping around.
#[inline]
pub const fn checked_align_up(
  value: usize,
  align: usize,
) -> Option<usize> {
  match value.checked_add(align - 1) {
    Some(v) => Some(v & !(align - 1)),
    None => None,
  }
}

#[inline]
pub const fn is_aligned(
  value: usize,
  align: usize,
) -> bool {
  value & (align - 1) == 0
}
