//! Debug binary for concurrent arena churn.
//!
//! Several threads allocate, partially free and fully free against one
//! shared arena while a watchdog reports threads that stop making progress.
//! At the end every block must have coalesced back into one free segment.
//!
//! Run with:
//! ```bash
//! RUST_LOG=avl_arena=debug cargo run --features tracing
//! AVL_ARENA_BLOCKS=2 AVL_ARENA_BLOCK_SIZE=65536 cargo run --release
//! ```

#![allow(clippy::unwrap_used)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use avl_arena::{AllocError, Arena, ArenaAllocator, ArenaConfig};
use std::collections::VecDeque;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

// =============================================================================
// Thread progress tracking for hang detection
// =============================================================================

struct ThreadProgress {
    /// Current operation index for each thread
    current_op: Vec<AtomicUsize>,
    /// Last time each thread made progress
    last_progress_ms: Vec<AtomicU64>,
    /// Whether each thread is done
    done: Vec<AtomicBool>,
    start: Instant,
}

impl ThreadProgress {
    fn new(num_threads: usize) -> Self {
        Self {
            current_op: (0..num_threads).map(|_| AtomicUsize::new(0)).collect(),
            last_progress_ms: (0..num_threads).map(|_| AtomicU64::new(0)).collect(),
            done: (0..num_threads).map(|_| AtomicBool::new(false)).collect(),
            start: Instant::now(),
        }
    }

    fn update(&self, thread_id: usize, op: usize) {
        self.current_op[thread_id].store(op, Ordering::Relaxed);
        self.last_progress_ms[thread_id]
            .store(self.start.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    fn mark_done(&self, thread_id: usize) {
        self.done[thread_id].store(true, Ordering::Relaxed);
    }

    fn report_stuck(&self, timeout_ms: u64) -> Vec<(usize, usize, u64)> {
        let now_ms = self.start.elapsed().as_millis() as u64;
        let mut stuck = Vec::new();

        for i in 0..self.done.len() {
            if self.done[i].load(Ordering::Relaxed) {
                continue;
            }
            let last = self.last_progress_ms[i].load(Ordering::Relaxed);
            if now_ms.saturating_sub(last) > timeout_ms {
                stuck.push((i, self.current_op[i].load(Ordering::Relaxed), now_ms - last));
            }
        }
        stuck
    }

    fn all_done(&self) -> bool {
        self.done.iter().all(|d| d.load(Ordering::Relaxed))
    }
}

// =============================================================================
// Churn
// =============================================================================

#[derive(Default)]
struct Counters {
    allocations: AtomicUsize,
    partial_frees: AtomicUsize,
    exhausted: AtomicUsize,
}

/// One live allocation held by a worker.
struct Held {
    ptr: NonNull<u64>,
    remaining: usize,
}

fn worker(
    t: usize,
    ops: usize,
    alloc: &ArenaAllocator<u64>,
    progress: &ThreadProgress,
    counters: &Counters,
) {
    let mut held: VecDeque<Held> = VecDeque::new();
    let mut state = (t as u64 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15);

    for op in 0..ops {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        progress.update(t, op);

        match state >> 61 {
            // Allocate 1..=256 words.
            0..=3 => {
                let count = (state >> 8) as usize % 256 + 1;
                match alloc.allocate(count) {
                    Ok(ptr) => {
                        counters.allocations.fetch_add(1, Ordering::Relaxed);
                        held.push_back(Held {
                            ptr,
                            remaining: count,
                        });
                    }
                    Err(AllocError::ArenaExhausted { .. }) => {
                        counters.exhausted.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => eprintln!("[T{t:02}] ERROR op {op}: {e}"),
                }
            }
            // Trim the front of the oldest allocation.
            4 | 5 => {
                let Some(front) = held.front_mut() else {
                    continue;
                };
                if front.remaining < 2 {
                    continue;
                }
                let trim = (state >> 8) as usize % (front.remaining - 1) + 1;
                match alloc.deallocate(front.ptr, trim) {
                    Ok(Some(tail)) => {
                        counters.partial_frees.fetch_add(1, Ordering::Relaxed);
                        front.ptr = tail;
                        front.remaining -= trim;
                    }
                    Ok(None) => eprintln!("[T{t:02}] op {op}: partial free released everything"),
                    Err(e) => eprintln!("[T{t:02}] ERROR op {op}: {e}"),
                }
            }
            // Release the oldest allocation entirely.
            _ => {
                let Some(oldest) = held.pop_front() else {
                    continue;
                };
                if let Err(e) = alloc.deallocate(oldest.ptr, 0) {
                    eprintln!("[T{t:02}] ERROR op {op}: {e}");
                }
            }
        }

        if op % 10_000 == 0 && op > 0 {
            eprintln!("[T{t:02}] op {op}/{ops}, holding {}", held.len());
        }
    }

    for remaining in held {
        if let Err(e) = alloc.deallocate(remaining.ptr, remaining.remaining) {
            eprintln!("[T{t:02}] ERROR draining: {e}");
        }
    }
}

fn run_churn(arena: &Arena, threads: usize, ops_per_thread: usize) {
    println!("\n{}", "=".repeat(80));
    println!("CHURN ({threads} threads, {ops_per_thread} ops/thread)");
    println!("{}", "=".repeat(80));

    let progress = Arc::new(ThreadProgress::new(threads));
    let counters = Arc::new(Counters::default());
    let stop_watchdog = Arc::new(AtomicBool::new(false));

    let watchdog = {
        let progress = Arc::clone(&progress);
        let stop = Arc::clone(&stop_watchdog);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(500));
                for (tid, op, stall_ms) in &progress.report_stuck(2000) {
                    eprintln!("!!! STUCK: Thread {tid} at op {op} for {stall_ms}ms");
                }
                if progress.all_done() {
                    break;
                }
            }
        })
    };

    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let alloc: ArenaAllocator<u64> = arena.allocator().unwrap();
            let progress = Arc::clone(&progress);
            let counters = Arc::clone(&counters);
            thread::spawn(move || {
                worker(t, ops_per_thread, &alloc, &progress, &counters);
                progress.mark_done(t);
                eprintln!("[T{t:02}] DONE");
            })
        })
        .collect();

    for h in handles {
        let _ = h.join();
    }

    stop_watchdog.store(true, Ordering::Relaxed);
    let _ = watchdog.join();

    let elapsed = start.elapsed();
    let stats = arena.stats();
    println!(
        "DONE: {} ops in {:?} ({:.0} ops/sec)",
        threads * ops_per_thread,
        elapsed,
        (threads * ops_per_thread) as f64 / elapsed.as_secs_f64(),
    );
    println!(
        "allocations={} partial_frees={} exhausted={}",
        counters.allocations.load(Ordering::Relaxed),
        counters.partial_frees.load(Ordering::Relaxed),
        counters.exhausted.load(Ordering::Relaxed),
    );
    println!(
        "live={} free_segments={} largest_free={}",
        stats.live_allocations,
        stats.free_segments(),
        stats.largest_free()
    );

    match arena.validate() {
        Ok(()) if stats.free_segments() == stats.blocks.len() => println!("arena fully coalesced"),
        Ok(()) => eprintln!("!!! arena valid but fragmented: {stats:?}"),
        Err(e) => eprintln!("!!! INVARIANT VIOLATION: {e}"),
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    avl_arena::init_tracing();

    let config = match ArenaConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid arena config: {e}");
            std::process::exit(2);
        }
    };

    eprintln!("avl-arena concurrent churn");
    eprintln!("==========================");
    eprintln!("{config:?}");
    eprintln!("Watchdog will report any thread stuck for >2 seconds.");

    let arena = Arena::new(config).unwrap();
    for run in 1..=3 {
        eprintln!("\n--- Run {run}/3 ---");
        run_churn(&arena, 8, 50_000);
    }

    eprintln!("\nAll runs completed!");
}
