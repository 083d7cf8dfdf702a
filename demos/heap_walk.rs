//! Walks through the life of a small heap on the real program break.
//!
//! Run with `RUST_LOG=trace cargo run --example heap_walk` to see every
//! split, merge and growth. Pass `--pause` to stop between steps, e.g. to
//! look at the process with `pmap` or `gdb`.

use std::{error::Error, io::Read};

use libc::sbrk;
use tagalloc::{Heap, MemorySource, Sbrk};

/// Waits until the user presses ENTER, if `--pause` was given.
fn pause(enabled: bool) {
  if enabled {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_blocks<S: MemorySource>(heap: &Heap<S>) {
  for block in heap.blocks() {
    println!(
      "    offset {:>6}  size {:>6}  {}",
      block.offset,
      block.size,
      if block.allocated { "allocated" } else { "free" }
    );
  }
  println!("    {:?}", heap.stats());
}

fn main() -> Result<(), Box<dyn Error>> {
  env_logger::init();
  let paused = std::env::args().any(|arg| arg == "--pause");

  print_program_break("start");
  let mut heap = Heap::new(Sbrk::new()?)?;
  print_program_break("init");
  print_blocks(&heap);
  pause(paused);

  // --------------------------------------------------------------------
  // 1) Two small blocks: first fit, carved from the front.
  // --------------------------------------------------------------------
  let a = heap.allocate(16)?.ok_or("nothing allocated")?;
  let b = heap.allocate(16)?.ok_or("nothing allocated")?;
  unsafe { a.cast::<u64>().write(0xDEAD_BEEF) };
  println!("\n[1] a = {a:?}, b = {b:?}");
  print_blocks(&heap);
  pause(paused);

  // --------------------------------------------------------------------
  // 2) A large block: next fit, carved from the back. The heap grows.
  // --------------------------------------------------------------------
  let big = heap.allocate(1000)?.ok_or("nothing allocated")?;
  println!("\n[2] big = {big:?}");
  print_program_break("grown");
  print_blocks(&heap);
  pause(paused);

  // --------------------------------------------------------------------
  // 3) Free b, then grow a into the space it left behind.
  // --------------------------------------------------------------------
  heap.free(b)?;
  let a = heap.resize(Some(a), 40)?.ok_or("nothing allocated")?;
  println!(
    "\n[3] a = {a:?} after resize, value = 0x{:X}",
    unsafe { a.cast::<u64>().read() }
  );
  print_blocks(&heap);
  pause(paused);

  // --------------------------------------------------------------------
  // 4) Free everything: all blocks merge back into one.
  // --------------------------------------------------------------------
  heap.free(a)?;
  heap.free(big)?;
  println!("\n[4] everything freed");
  print_blocks(&heap);

  let stats = heap.check()?;
  println!("\nheap is consistent: {} free block(s)", stats.free_blocks);
  print_program_break("end");

  Ok(())
}
