// config.rs — compile-time defaults for the RAC reader and writer.
//
// Named after the spec knob each constant backs, the same way the
// ancestor lz4conf.h-derived config.rs named its constants after the
// C macros they replaced.

/// Default `DChunkSize` used by the encoder driver when neither
/// `CChunkSize` nor `DChunkSize` is given (§4.6).
pub const DEFAULT_D_CHUNK_SIZE: u64 = 65536;

/// Upper bound on reader concurrency when the caller does not request a
/// specific worker count: `min(numCPUs, MAX_DEFAULT_WORKERS)` (§4.4, §5).
pub const MAX_DEFAULT_WORKERS: usize = 16;

/// Extra chunk-cache slots beyond the worker count: default capacity is
/// `W + CACHE_SLACK` (§4.4).
pub const CACHE_SLACK: usize = 2;

/// Hard cap on index tree depth — a safety limit, not a normal operating
/// bound (§4.2, §5). Any plausible file needs `ceil(log_255(n))` <= 8.
pub const MAX_TREE_DEPTH: u32 = 32;

/// Maximum arity of any node (§3, §5).
pub const MAX_ARITY: u16 = 255;

/// Returns the default reader concurrency: `min(numCPUs, MAX_DEFAULT_WORKERS)`,
/// never less than 1.
pub fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_worker_count_is_bounded() {
        let w = default_worker_count();
        assert!(w >= 1 && w <= MAX_DEFAULT_WORKERS);
    }
}
