use std::io::{IsTerminal, Read};

use tagalloc::{Heap, HeapConfig, Ptr, SbrkArena};
use tracing_subscriber::EnvFilter;

/// Waits until the user presses ENTER, when there is a user to wait for.
/// Handy for watching the program break move with `pmap` or `gdb`.
fn block_until_enter_pressed() {
  if !std::io::stdin().is_terminal() {
    return;
  }
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    SbrkArena::program_break(),
  );
}

fn print_heap(heap: &Heap<SbrkArena>) {
  for block in heap.blocks() {
    println!(
      "    {:#07x}  {:>6} bytes  {}",
      block.offset,
      block.size,
      if block.allocated { "allocated" } else { "free" }
    );
  }
  println!("    {}", heap.check());
}

fn alloc(
  heap: &mut Heap<SbrkArena>,
  size: usize,
) -> Ptr {
  match heap.alloc(size) {
    Ok(Some(ptr)) => {
      println!(
        "Allocated {} bytes, offset = {:#x}, address = {:?}",
        size,
        ptr.offset(),
        heap.as_ptr(ptr)
      );
      ptr
    }
    Ok(None) => unreachable!("non-zero request"),
    Err(err) => {
      eprintln!("allocation of {size} bytes failed: {err}");
      std::process::exit(1);
    }
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut heap = Heap::with_config(SbrkArena::new(), HeapConfig::new().with_check_heap(true));

  print_program_break("start");
  if let Err(err) = heap.init() {
    eprintln!("heap init failed: {err}");
    std::process::exit(1);
  }
  print_program_break("after init");
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Three allocations carved from the initial chunk.
  // --------------------------------------------------------------------
  println!("\n[1] Allocate 100, 200 and 24 bytes");
  let a = alloc(&mut heap, 100);
  let b = alloc(&mut heap, 200);
  let c = alloc(&mut heap, 24);
  heap.payload_mut(a).fill(0xAB);
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Free the first block. It goes to the head of the free list.
  // --------------------------------------------------------------------
  println!("\n[2] Free the 100 byte block");
  heap.free(Some(a));
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A small request is served from the freed block (first fit).
  // --------------------------------------------------------------------
  println!("\n[3] Allocate 50 bytes");
  let d = alloc(&mut heap, 50);
  println!(
    "[3] reused the freed block? {}",
    if d == a { "Yes" } else { "No" }
  );
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Free neighbors: they coalesce into one block.
  // --------------------------------------------------------------------
  println!("\n[4] Free the 50 and 200 byte blocks");
  heap.free(Some(d));
  heap.free(Some(b));
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) A large request extends the arena.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");
  println!("\n[5] Allocate 64 KiB");
  let big = alloc(&mut heap, 64 * 1024);
  print_program_break("after large alloc");
  print_heap(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Grow the last allocation in place.
  // --------------------------------------------------------------------
  println!("\n[6] realloc 24 bytes -> 1000 bytes");
  match heap.realloc(Some(c), 1000) {
    Ok(Some(moved)) => println!("[6] block now at {:#x} (was {:#x})", moved.offset(), c.offset()),
    Ok(None) => unreachable!("non-zero request"),
    Err(err) => eprintln!("[6] realloc failed: {err}"),
  }
  heap.free(Some(big));
  print_heap(&heap);

  println!("\n[7] End of example. The arena is returned when the heap is dropped.");
}
