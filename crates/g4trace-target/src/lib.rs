//! Target-side instrumentation interface (§4.8).
//!
//! Linked into *traced* programs, not into the simulator: emits the
//! reserved no-op opcodes that act as tracing hints and pins worker threads
//! to distinct processors, reserving low-numbered processors for the tracer
//! itself. Exposes both an ergonomic Rust surface and `#[no_mangle]
//! extern "C"` wrappers, because the original interface
//! (`g4tracer-interface.h`) is a C header meant to be included directly
//! into traced C/C++ programs — a Rust-only surface would drop that
//! consumer entirely.

use std::os::raw::{c_int, c_void};
use std::time::{Duration, Instant};

/// Emits the reserved `srai zero, zero, 2` hint: begin tracing / write the
/// trace header. A no-op on non-RISC-V hosts, so instrumented programs
/// still build and run there.
#[cfg(target_arch = "riscv64")]
pub fn start_tracing() {
    // SAFETY: architecturally a no-op; the implicit "memory" clobber of
    // `asm!` without `options(nomem)` stops the compiler reordering traced
    // user code across the hint.
    unsafe {
        std::arch::asm!("srai zero, zero, 2");
    }
}

/// Emits the reserved `srai zero, zero, 2` hint. No-op on this host.
#[cfg(not(target_arch = "riscv64"))]
pub fn start_tracing() {}

/// Emits the reserved `srai zero, zero, 0` hint: region-of-interest begin.
#[cfg(target_arch = "riscv64")]
pub fn start_roi() {
    // SAFETY: see `start_tracing`.
    unsafe {
        std::arch::asm!("srai zero, zero, 0");
    }
}

/// Emits the reserved `srai zero, zero, 0` hint. No-op on this host.
#[cfg(not(target_arch = "riscv64"))]
pub fn start_roi() {}

/// Emits the reserved `srai zero, zero, 1` hint: region-of-interest end.
#[cfg(target_arch = "riscv64")]
pub fn end_roi() {
    // SAFETY: see `start_tracing`.
    unsafe {
        std::arch::asm!("srai zero, zero, 1");
    }
}

/// Emits the reserved `srai zero, zero, 1` hint. No-op on this host.
#[cfg(not(target_arch = "riscv64"))]
pub fn end_roi() {}

/// Monotonically increasing thread-registration counter backing
/// [`init_current_thread`]'s pinning formula.
static THREAD_COUNTER: std::sync::atomic::AtomicI32 = std::sync::atomic::AtomicI32::new(0);

/// Pins the calling thread to a processor chosen by
/// `((num_procs - id) mod num_procs + num_procs) mod num_procs`, where `id`
/// is an atomically incremented counter starting at 0. Threads bind from
/// the highest-numbered processor downwards, leaving low-numbered
/// processors free for the tracer itself.
///
/// # Panics
///
/// Panics if the host reports zero processors, or if `sched_setaffinity`
/// rejects the computed processor.
pub fn init_current_thread() {
    let id = THREAD_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    pin_current_thread_to(next_processor(id));
}

/// Computes the processor the `id`-th registered thread should bind to.
fn next_processor(id: i32) -> usize {
    // SAFETY: `get_nprocs` has no preconditions; it inspects `/proc` state.
    let num_procs = unsafe { libc::get_nprocs() };
    assert!(num_procs > 0, "host reported zero processors");
    (((num_procs - id) % num_procs + num_procs) % num_procs) as usize
}

/// Pins the calling thread to `proc_id` via `sched_setaffinity`.
fn pin_current_thread_to(proc_id: usize) {
    // SAFETY: `set` is plain-old-data, zeroed then populated through the
    // libc-provided macros before being handed to the kernel; `0` names
    // the calling thread, per `sched_setaffinity(2)`.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(proc_id, &mut set);
        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        assert_eq!(result, 0, "sched_setaffinity failed for processor {proc_id}");
    }
}

/// Spawns a new OS thread that first pins itself to a processor
/// ([`init_current_thread`]), then optionally emits the `start_tracing`
/// and/or `start_ROI` hints, then runs `f`. The ergonomic counterpart to
/// [`g4tracer_pthread_create`] for Rust callers.
pub fn spawn_traced<F>(
    emit_start_tracing: bool,
    emit_start_roi: bool,
    f: F,
) -> std::thread::JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::spawn(move || {
        init_current_thread();
        if emit_start_tracing {
            start_tracing();
        }
        if emit_start_roi {
            start_roi();
        }
        f();
    })
}

/// C-ABI entry point matching the original interface's
/// `g4tracer_start_tracing`.
#[no_mangle]
pub extern "C" fn g4tracer_start_tracing() {
    start_tracing();
}

/// C-ABI entry point matching the original interface's `g4tracer_start_ROI`.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn g4tracer_start_ROI() {
    start_roi();
}

/// C-ABI entry point matching the original interface's `g4tracer_end_ROI`.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn g4tracer_end_ROI() {
    end_roi();
}

/// C-ABI entry point matching the original interface's
/// `g4tracer_init_current_thread`.
#[no_mangle]
pub extern "C" fn g4tracer_init_current_thread() {
    init_current_thread();
}

/// Data handed across the C ABI boundary to the thread-wrapper trampoline,
/// mirroring the original's `struct g4tracer_thread_wrapper_data`.
struct ThreadWrapperData {
    start: extern "C" fn(*mut c_void) -> *mut c_void,
    arg: *mut c_void,
    start_tracing: bool,
    start_roi: bool,
}

// SAFETY: ownership of `arg` transfers to exactly the one thread that runs
// `start`, same contract `pthread_create` itself gives its callers.
unsafe impl Send for ThreadWrapperData {}

extern "C" fn thread_wrapper_trampoline(data: *mut c_void) -> *mut c_void {
    // SAFETY: `data` was boxed by `g4tracer_pthread_create` below and handed
    // to exactly one new thread, exactly once.
    let data = unsafe { Box::from_raw(data.cast::<ThreadWrapperData>()) };
    init_current_thread();
    if data.start_tracing {
        start_tracing();
    }
    if data.start_roi {
        start_roi();
    }
    (data.start)(data.arg)
}

/// C-ABI thread-wrapper matching the original's `g4tracer_pthread_create`:
/// pins the new thread first, then optionally emits the tracing and ROI
/// markers, then calls `start`.
///
/// # Safety
///
/// `thread` must point to valid storage for a `pthread_t`; `start` must be
/// a valid thread entry point; `arg` is passed through to `start`
/// unexamined — the same contract `pthread_create(3)` gives its callers.
#[no_mangle]
pub unsafe extern "C" fn g4tracer_pthread_create(
    thread: *mut libc::pthread_t,
    start: extern "C" fn(*mut c_void) -> *mut c_void,
    arg: *mut c_void,
    start_tracing: bool,
    start_roi: bool,
) -> c_int {
    let data = Box::new(ThreadWrapperData { start, arg, start_tracing, start_roi });
    let data_ptr = Box::into_raw(data).cast::<c_void>();
    libc::pthread_create(thread, std::ptr::null(), thread_wrapper_trampoline, data_ptr)
}

/// Verbose region-of-interest timer: records wall-clock time (and, on
/// `riscv64`, cycle/instruction-retire counts) around a region and prints a
/// short report when dropped. Supplements [`start_roi`]/[`end_roi`] for
/// programs that want a human-readable timing summary, carried over from
/// the original interface's `g4tracer_start_ROI_verbose`/`_end_ROI_verbose`
/// wrappers.
#[derive(Debug)]
pub struct RoiTimer {
    wall_start: Instant,
    #[cfg(target_arch = "riscv64")]
    cycle_start: u64,
    #[cfg(target_arch = "riscv64")]
    instret_start: u64,
}

/// Starts a verbose ROI timer, emitting the `start_ROI` hint.
#[must_use]
pub fn roi_timer() -> RoiTimer {
    start_roi();
    RoiTimer {
        wall_start: Instant::now(),
        #[cfg(target_arch = "riscv64")]
        cycle_start: read_cycle(),
        #[cfg(target_arch = "riscv64")]
        instret_start: read_instret(),
    }
}

#[cfg(target_arch = "riscv64")]
fn read_cycle() -> u64 {
    let cycles: u64;
    // SAFETY: `rdcycle` reads a CSR into a general register; no memory
    // effects.
    unsafe {
        std::arch::asm!("rdcycle {0}", out(reg) cycles);
    }
    cycles
}

#[cfg(target_arch = "riscv64")]
fn read_instret() -> u64 {
    let instret: u64;
    // SAFETY: see `read_cycle`.
    unsafe {
        std::arch::asm!("rdinstret {0}", out(reg) instret);
    }
    instret
}

impl RoiTimer {
    /// Wall-clock time elapsed since the timer was started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.wall_start.elapsed()
    }
}

impl Drop for RoiTimer {
    fn drop(&mut self) {
        end_roi();
        println!("gettime:     {:?}", self.elapsed());
        #[cfg(target_arch = "riscv64")]
        {
            let cycles = read_cycle() - self.cycle_start;
            let instret = read_instret() - self.instret_start;
            println!("instructions: {instret:15}");
            println!("cycles:      {cycles:15}");
            if instret > 0 {
                println!("CPI:         {:15.3}", cycles as f64 / instret as f64);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinning_formula_cycles_from_top_processor_downward() {
        let num_procs = 4;
        let expected: Vec<i32> = (0..num_procs)
            .map(|id| ((num_procs - id) % num_procs + num_procs) % num_procs)
            .collect();
        assert_eq!(expected, vec![0, 3, 2, 1]);
    }

    #[test]
    fn hints_are_callable_on_every_host() {
        // Exercises the non-riscv64 no-op path on this test host; on
        // riscv64 hosts it exercises the real reserved-opcode path.
        start_tracing();
        start_roi();
        end_roi();
    }

    #[test]
    fn roi_timer_reports_nonzero_elapsed_time() {
        let timer = roi_timer();
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert!(timer.elapsed() >= std::time::Duration::from_millis(1));
    }
}
