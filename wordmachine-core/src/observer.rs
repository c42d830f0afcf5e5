//! The observation hook contract (§6, §10.4): a statically-declared alternative to the source
//! system's runtime method monkey-patching.
//!
//! [`Computer`](crate::cpu::Computer) is generic over an [`Observer`] implementation, so the
//! common case — no observer — costs nothing beyond a monomorphized no-op call; see
//! [`NoopObserver`].

/// Hooks a host can implement to observe CPU core events without altering core semantics.
///
/// Every default method is a no-op, so an implementation only needs to override the events it
/// cares about. The core calls each hook exactly once per logical event, in the order the event
/// occurred; it never batches or reorders them relative to the instruction that produced them.
pub trait Observer {
    /// Called once before each instruction is decoded.
    fn before_decode(&mut self) {}

    /// Called on every cache lookup (instruction fetch, LOAD/STORE, PRINT, and any host-side
    /// `set_memory_chunk`/`set_memory_address` word access), reporting whether it hit the cache.
    fn on_cache_lookup(&mut self, address: u32, hit: bool) {
        let _ = (address, hit);
    }

    /// Called on every data-register read.
    fn on_register_read(&mut self, index: u8) {
        let _ = index;
    }

    /// Called on every data-register write (including writes discarded by the read-only-
    /// register rule).
    fn on_register_write(&mut self, index: u8) {
        let _ = index;
    }
}

/// The default observer: every hook is a no-op.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Accumulates the same figures the source system's ad hoc cost tracker did: instructions
/// executed, cache hit/miss counts, distinct memory and register addresses touched, and a
/// simulated-time estimate derived from those counts.
#[derive(Debug, Default, Clone)]
pub struct CostMetricTracker {
    instructions_executed: u64,
    cache_hits: u64,
    cache_misses: u64,
    accessed_memory_addresses: std::collections::HashSet<u32>,
    accessed_register_indices: std::collections::HashSet<u8>,
}

/// Nanosecond cost of retiring one instruction, independent of any memory access it makes.
pub const INSTRUCTION_TIME_NS: u64 = 1;
/// Nanosecond cost of a cache hit.
pub const CACHE_HIT_TIME_NS: u64 = 1;
/// Nanosecond cost of a cache miss (main-memory round trip).
pub const CACHE_MISS_TIME_NS: u64 = 70;

impl CostMetricTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions_executed(&self) -> u64 {
        self.instructions_executed
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses
    }

    pub fn memory_accesses(&self) -> u64 {
        self.cache_hits + self.cache_misses
    }

    /// An estimate of elapsed simulated time, in nanoseconds: one [`INSTRUCTION_TIME_NS`] per
    /// instruction retired, plus [`CACHE_HIT_TIME_NS`]/[`CACHE_MISS_TIME_NS`] per memory access.
    pub fn execution_time_ns(&self) -> u64 {
        self.instructions_executed * INSTRUCTION_TIME_NS
            + self.cache_hits * CACHE_HIT_TIME_NS
            + self.cache_misses * CACHE_MISS_TIME_NS
    }

    /// A human-readable multi-line summary, in the spirit of the source system's cost report.
    pub fn summary(&self) -> String {
        let accesses = self.memory_accesses().max(1);
        format!(
            "Instructions executed: {}.\n\
             Cache hits: {} ({:.1}%)\n\
             Cache misses: {} ({:.1}%)\n\
             Distinct memory addresses touched: {}\n\
             Distinct registers touched: {}\n\
             -----------------------------\n\
             Total estimated execution time: {}ns.\n\
             -----------------------------",
            self.instructions_executed,
            self.cache_hits,
            100.0 * self.cache_hits as f64 / accesses as f64,
            self.cache_misses,
            100.0 * self.cache_misses as f64 / accesses as f64,
            self.accessed_memory_addresses.len(),
            self.accessed_register_indices.len(),
            self.execution_time_ns(),
        )
    }
}

impl Observer for CostMetricTracker {
    fn before_decode(&mut self) {
        self.instructions_executed += 1;
    }

    fn on_cache_lookup(&mut self, address: u32, hit: bool) {
        self.accessed_memory_addresses.insert(address);
        if hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }

    fn on_register_read(&mut self, index: u8) {
        self.accessed_register_indices.insert(index);
    }

    fn on_register_write(&mut self, index: u8) {
        self.accessed_register_indices.insert(index);
    }
}
