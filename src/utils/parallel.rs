//! Execution modes and the fork/join substrate
//!
//! The engine runs every numeric operation under one of two modes:
//!
//! - **Sequential**: one thread, deterministic order, plain accumulation
//! - **Concurrent**: fan-out over a capped rayon pool, atomic accumulation,
//!   per-layer fork/join
//!
//! An [`ExecutionPolicy`] bundles the mode with the accumulate strategy. It is built
//! once per call and handed down by value, so layers and units never branch on a
//! global setting.
//!
//! Summation order across concurrent writers is unspecified. Results are
//! mathematically equal to the sequential ones but not bit-identical across runs.

use crate::error::NetworkError;
use crate::utils::atomic::{Accumulate, AtomicAccumulate, AtomicF32, PlainAccumulate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

static PLAIN: PlainAccumulate = PlainAccumulate;
static ATOMIC: AtomicAccumulate = AtomicAccumulate;

/// How a call distributes its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Single thread, deterministic operation order.
    #[default]
    Sequential,
    /// Parallel fan-out with atomic accumulation and fork/join barriers.
    Concurrent,
}

impl ExecutionMode {
    /// Build the policy for this mode.
    pub fn policy(self) -> ExecutionPolicy {
        match self {
            ExecutionMode::Sequential => ExecutionPolicy::sequential(),
            ExecutionMode::Concurrent => ExecutionPolicy::concurrent(),
        }
    }

    /// Parse a mode name as used in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Some(ExecutionMode::Sequential),
            "concurrent" | "parallel" | "par" => Some(ExecutionMode::Concurrent),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => f.write_str("sequential"),
            ExecutionMode::Concurrent => f.write_str("concurrent"),
        }
    }
}

/// Execution mode plus the accumulate strategy injected for it.
#[derive(Clone, Copy)]
pub struct ExecutionPolicy {
    mode: ExecutionMode,
    accumulate: &'static dyn Accumulate,
}

impl ExecutionPolicy {
    /// Sequential mode with plain accumulation.
    pub fn sequential() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            accumulate: &PLAIN,
        }
    }

    /// Concurrent mode with atomic accumulation.
    pub fn concurrent() -> Self {
        Self {
            mode: ExecutionMode::Concurrent,
            accumulate: &ATOMIC,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn is_concurrent(&self) -> bool {
        self.mode == ExecutionMode::Concurrent
    }

    /// The accumulate strategy chosen for this policy.
    pub fn accumulator(&self) -> &'static dyn Accumulate {
        self.accumulate
    }

    /// Add `delta` into `slot` through the injected strategy.
    #[inline]
    pub fn accumulate(&self, slot: &AtomicF32, delta: f32) {
        self.accumulate.add(slot, delta);
    }

    /// Run `f(i)` for every `i` in `0..len`.
    pub fn for_each_index<F>(&self, len: usize, f: F)
    where
        F: Fn(usize) + Send + Sync,
    {
        match self.mode {
            ExecutionMode::Sequential => (0..len).for_each(f),
            ExecutionMode::Concurrent => (0..len).into_par_iter().for_each(f),
        }
    }

    /// Collect `f(i)` for every `i` in `0..len`, in index order.
    pub fn map_indices<T, F>(&self, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        match self.mode {
            ExecutionMode::Sequential => (0..len).map(f).collect(),
            ExecutionMode::Concurrent => (0..len).into_par_iter().map(f).collect(),
        }
    }

    /// Run `a` and `b`, forking `b` onto the pool in concurrent mode.
    ///
    /// Returns only once both sides have completed.
    pub fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        match self.mode {
            ExecutionMode::Sequential => {
                let ra = a();
                let rb = b();
                (ra, rb)
            }
            ExecutionMode::Concurrent => rayon::join(a, b),
        }
    }
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::sequential()
    }
}

impl fmt::Debug for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPolicy")
            .field("mode", &self.mode)
            .field("accumulate", &self.accumulate)
            .finish()
    }
}

/// Capped worker pool for concurrent training steps.
///
/// The pool is built lazily the first time a concurrent step runs. Its thread count
/// is `min(max_threads, width_hint)` where `width_hint` is the larger of the network
/// depth and the number of samples in the step, so the number of in-flight tasks is
/// bounded by the work actually available.
pub struct Scheduler {
    max_threads: usize,
    pool: Option<rayon::ThreadPool>,
}

impl Scheduler {
    /// Create a scheduler. `None` caps the pool at the machine's available parallelism.
    pub fn new(max_threads: Option<usize>) -> Self {
        let max_threads = max_threads
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            });
        Self {
            max_threads,
            pool: None,
        }
    }

    /// Upper bound on worker threads.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Worker threads in the current pool, if one has been built.
    pub fn current_threads(&self) -> Option<usize> {
        self.pool.as_ref().map(|pool| pool.current_num_threads())
    }

    /// Run `op` under `policy`.
    ///
    /// Sequential policies run `op` on the calling thread. Concurrent policies run it
    /// inside the pool so that every nested fork and fan-out stays within the cap.
    /// Failure to build the pool is returned before `op` runs.
    pub fn run<R, OP>(
        &mut self,
        policy: ExecutionPolicy,
        width_hint: usize,
        op: OP,
    ) -> Result<R, NetworkError>
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        if !policy.is_concurrent() {
            return Ok(op());
        }
        let wanted = width_hint.clamp(1, self.max_threads);
        let rebuild = match &self.pool {
            None => true,
            Some(pool) => pool.current_num_threads() < wanted,
        };
        if rebuild {
            tracing::trace!(threads = wanted, "building training worker pool");
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(wanted)
                .thread_name(|i| format!("ffe-worker-{}", i))
                .build()?;
            self.pool = Some(pool);
        }
        match &self.pool {
            Some(pool) => Ok(pool.install(op)),
            None => Ok(op()),
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("max_threads", &self.max_threads)
            .field("current_threads", &self.current_threads())
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::atomic::zeroed_slots;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_mode_from_name() {
        assert_eq!(ExecutionMode::from_name("seq"), Some(ExecutionMode::Sequential));
        assert_eq!(
            ExecutionMode::from_name("Concurrent"),
            Some(ExecutionMode::Concurrent)
        );
        assert_eq!(ExecutionMode::from_name("gpu"), None);
    }

    #[test]
    fn test_for_each_index_visits_all() {
        for policy in [ExecutionPolicy::sequential(), ExecutionPolicy::concurrent()] {
            let count = AtomicUsize::new(0);
            policy.for_each_index(100, |_| {
                count.fetch_add(1, Ordering::Relaxed);
            });
            assert_eq!(count.load(Ordering::Relaxed), 100);
        }
    }

    #[test]
    fn test_map_indices_preserves_order() {
        let values = ExecutionPolicy::concurrent().map_indices(50, |i| i * 2);
        assert_eq!(values, (0..50).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_join_runs_both_sides() {
        for policy in [ExecutionPolicy::sequential(), ExecutionPolicy::concurrent()] {
            let (a, b) = policy.join(|| 1 + 1, || "done");
            assert_eq!(a, 2);
            assert_eq!(b, "done");
        }
    }

    #[test]
    fn test_concurrent_policy_accumulates_atomically() {
        let policy = ExecutionPolicy::concurrent();
        let slots = zeroed_slots(1);
        policy.for_each_index(1000, |_| policy.accumulate(&slots[0], 1.0));
        assert_eq!(slots[0].load(), 1000.0);
    }

    #[test]
    fn test_scheduler_caps_threads() {
        let mut scheduler = Scheduler::new(Some(2));
        let threads = scheduler
            .run(ExecutionPolicy::concurrent(), 16, rayon::current_num_threads)
            .unwrap();
        assert_eq!(threads, 2);
        assert_eq!(scheduler.current_threads(), Some(2));
    }

    #[test]
    fn test_scheduler_sequential_skips_pool() {
        let mut scheduler = Scheduler::new(Some(4));
        let value = scheduler
            .run(ExecutionPolicy::sequential(), 8, || 7)
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(scheduler.current_threads(), None);
    }
}
