//! Parsers for `memory.stat` in both cgroup versions.
//!
//! Single-value memory files (`memory.usage_in_bytes`, `memory.current`,
//! `memory.max`, ...) are read through
//! [`crate::cgroup::paths::single_file_uint_stat`].
//!
//! # Examples
//!
//! ```rust
//! use cgroup_sampler::cgroup::stats::{MemoryStat, V1MemoryStat, KeyValueStat};
//!
//! let v2 = MemoryStat::from_reader(&mut "anon 1000\nfile 2000\n".as_bytes()).unwrap();
//! assert_eq!(v2.anon, 1000);
//!
//! let v1 = V1MemoryStat::from_reader(&mut "cache 20\nrss 10\n".as_bytes()).unwrap();
//! assert_eq!(v1.rss, 10);
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use super::parser::KeyValueStat;

/// Represents memory usage statistics from a cgroup v2 `memory.stat`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryStat {
    /// Anonymous memory.
    pub anon: u64,
    /// File-backed memory (page cache).
    pub file: u64,
    /// Kernel stack memory.
    pub kernel_stack: u64,
    /// Slab memory (used for kernel object caches).
    pub slab: u64,
}

impl MemoryStat {
    /// Kernel memory as accounted by the v1 `kmem` counter.
    pub fn kernel_usage(&self) -> u64 {
        self.kernel_stack.saturating_add(self.slab)
    }
}

type Setter = fn(&mut MemoryStat, u64);

static SETTERS: LazyLock<HashMap<&'static str, Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Setter> = HashMap::with_capacity(4);

    m.insert("anon", |s, v| s.anon = v);
    m.insert("file", |s, v| s.file = v);
    m.insert("kernel_stack", |s, v| s.kernel_stack = v);
    m.insert("slab", |s, v| s.slab = v);

    m
});

impl KeyValueStat for MemoryStat {
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &SETTERS
    }
}

/// Represents memory usage statistics from a cgroup v1 `memory.stat`.
///
/// Only the group's own counters are read; the hierarchical `total_*`
/// variants are ignored. Swap comes from `memory.memsw.*`, which combines
/// it with memory the way the swap metrics expect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct V1MemoryStat {
    /// Anonymous and swap cache memory.
    pub rss: u64,
    /// Page cache memory.
    pub cache: u64,
}

type V1Setter = fn(&mut V1MemoryStat, u64);

static V1_SETTERS: LazyLock<HashMap<&'static str, V1Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, V1Setter> = HashMap::with_capacity(2);

    m.insert("rss", |s, v| s.rss = v);
    m.insert("cache", |s, v| s.cache = v);

    m
});

impl KeyValueStat for V1MemoryStat {
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &V1_SETTERS
    }
}
