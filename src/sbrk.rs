use core::ptr::NonNull;
use std::io;

use libc::{c_void, intptr_t, sbrk};
use log::{debug, warn};

use crate::{align::align_up, config::ALIGNMENT, error::GrowError, source::MemorySource};

/// The process data segment, grown through `sbrk(2)`.
///
/// The break is aligned to [`ALIGNMENT`] when the source is created. Any
/// other user of `brk`/`sbrk` in the process (the system `malloc`, for one)
/// may move the break between two calls; that is reported as
/// [`GrowError::NonContiguous`] instead of handing out a detached region.
pub struct Sbrk {
  lo: NonNull<u8>,
  brk: NonNull<u8>,
}

fn last_errno() -> i32 {
  io::Error::last_os_error().raw_os_error().unwrap_or(libc::ENOMEM)
}

fn is_sbrk_failure(address: *mut c_void) -> bool {
  address == usize::MAX as *mut c_void
}

impl Sbrk {
  pub fn new() -> Result<Self, GrowError> {
    // SAFETY: sbrk(0) only queries the current break.
    let current = unsafe { sbrk(0) };
    if is_sbrk_failure(current) {
      return Err(GrowError::Os(last_errno()));
    }

    let pad = align_up(current as usize, ALIGNMENT) - current as usize;
    if pad > 0 {
      // SAFETY: growing the break by less than ALIGNMENT bytes; nothing
      // is read or written through it.
      let address = unsafe { sbrk(pad as intptr_t) };
      if is_sbrk_failure(address) {
        return Err(GrowError::Os(last_errno()));
      }
      if address != current {
        return Err(GrowError::NonContiguous);
      }
    }

    let start = (current as *mut u8).wrapping_add(pad);
    let lo = NonNull::new(start).ok_or(GrowError::Os(libc::ENOMEM))?;
    debug!("sbrk: program break aligned to {lo:?} (padding {pad})");

    Ok(Self { lo, brk: lo })
  }
}

impl MemorySource for Sbrk {
  fn sbrk(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, GrowError> {
    let Ok(delta) = intptr_t::try_from(increment) else {
      return Err(GrowError::Os(libc::ENOMEM));
    };

    // SAFETY: growing the break hands new memory to this source; the
    // result is checked below before anyone uses it.
    let address = unsafe { sbrk(delta) };
    if is_sbrk_failure(address) {
      return Err(GrowError::Os(last_errno()));
    }

    let address = address as *mut u8;
    if address != self.brk.as_ptr() {
      warn!(
        "sbrk: break moved from {:?} to {address:?} behind our back",
        self.brk
      );
      return Err(GrowError::NonContiguous);
    }

    let old = self.brk;
    // SAFETY: sbrk just made `increment` bytes past the old break valid.
    self.brk = unsafe { old.add(increment) };
    Ok(old)
  }

  fn heap_lo(&self) -> NonNull<u8> {
    self.lo
  }

  fn heap_hi(&self) -> NonNull<u8> {
    self.brk
  }
}
