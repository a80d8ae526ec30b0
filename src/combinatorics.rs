//! Exact counting of mine arrangements within a group of interchangeable
//! cells, plus the marginal per-cell probability derived from those counts.
//!
//! `count(s, m, xmax)` is the number of ordered placements of `m` mines into
//! `s` cells with at most `xmax` mines per cell. The ordered convention is
//! deliberate: callers only ever consume counts as ratios between adjacent
//! group sizes (where the ordering factor cancels) or divide the per-group
//! mine orderings back out, so the convention must be preserved end to end.
//!
//! Results for capped placements (`1 < xmax < m`) come from an exhaustive
//! walk over non-increasing count vectors and are memoized in a
//! process-lifetime cache, seeded with a precomputed table of small cases
//! and exportable for reuse across processes.

use std::collections::HashMap;
use std::sync::RwLock;

use num_bigint::BigUint;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::{Result, SolverError};

/// Cache key: (group size, max mines per cell, mine count).
pub type ArrangementKey = (u32, u32, u32);

/// One cache entry in serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEntry {
    pub size: u32,
    pub max_per_cell: u32,
    pub mines: u32,
    pub count: BigUint,
}

/// Precomputed counts for small groups in multi-mine modes, keyed
/// (size, max_per_cell, mines). Loaded into every new cache.
const SEED_TABLE: &[(u32, u32, u32, u64)] = &[
    (2, 2, 3, 6),
    (2, 2, 4, 6),
    (2, 3, 4, 14),
    (2, 3, 5, 20),
    (2, 3, 6, 20),
    (3, 2, 3, 24),
    (3, 2, 4, 54),
    (3, 2, 5, 90),
    (3, 2, 6, 90),
    (3, 3, 4, 78),
    (3, 3, 5, 210),
    (3, 3, 6, 510),
    (3, 3, 7, 1050),
    (3, 3, 8, 1680),
    (3, 3, 9, 1680),
    (4, 2, 3, 60),
    (4, 2, 4, 204),
    (4, 2, 5, 600),
    (4, 2, 6, 1440),
    (4, 2, 7, 2520),
    (4, 2, 8, 2520),
    (4, 3, 4, 252),
    (4, 3, 5, 960),
    (4, 3, 6, 3480),
    (4, 3, 7, 11760),
    (4, 3, 8, 36120),
    (4, 3, 9, 97440),
    (4, 3, 10, 218400),
    (4, 3, 11, 369600),
    (4, 3, 12, 369600),
    (5, 2, 3, 120),
    (5, 2, 4, 540),
    (5, 2, 5, 2220),
    (5, 2, 6, 8100),
    (5, 2, 7, 25200),
    (5, 2, 8, 63000),
    (5, 2, 9, 113400),
    (5, 2, 10, 113400),
    (5, 3, 4, 620),
    (5, 3, 5, 3020),
    (5, 3, 6, 14300),
    (5, 3, 7, 65100),
];

pub(crate) fn factorial(n: u32) -> BigUint {
    (1..=n).map(BigUint::from).product()
}

/// `s · (s-1) · … · (s-m+1)`, the number of ordered injections.
fn falling_factorial(s: u32, m: u32) -> BigUint {
    (s - m + 1..=s).map(BigUint::from).product()
}

/// Arrangement counter with its process-lifetime cache.
///
/// Reads are lock-free in spirit (shared read lock); cache misses compute
/// outside the lock and insert under the write lock. Racing writers for the
/// same key are harmless since results are deterministic.
pub struct Combinatorics {
    cache: RwLock<HashMap<ArrangementKey, BigUint>>,
}

impl Default for Combinatorics {
    fn default() -> Self {
        Self::new()
    }
}

impl Combinatorics {
    /// A counter seeded with the precomputed small-case table.
    pub fn new() -> Self {
        let mut cache = HashMap::with_capacity(SEED_TABLE.len());
        for &(size, max_per_cell, mines, count) in SEED_TABLE {
            cache.insert((size, max_per_cell, mines), BigUint::from(count));
        }
        Self {
            cache: RwLock::new(cache),
        }
    }

    /// A counter seeded with the built-in table plus `entries`.
    pub fn with_seed(entries: impl IntoIterator<Item = SeedEntry>) -> Self {
        let counter = Self::new();
        {
            let mut cache = counter.cache.write().expect("cache lock poisoned");
            for entry in entries {
                cache.insert((entry.size, entry.max_per_cell, entry.mines), entry.count);
            }
        }
        counter
    }

    /// Restore a counter from the JSON produced by [`Self::to_json`].
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let entries: Vec<SeedEntry> = serde_json::from_str(json)?;
        Ok(Self::with_seed(entries))
    }

    /// Snapshot the cache, sorted by key for stable output.
    pub fn export_seed(&self) -> Vec<SeedEntry> {
        let cache = self.cache.read().expect("cache lock poisoned");
        let mut entries: Vec<SeedEntry> = cache
            .iter()
            .map(|(&(size, max_per_cell, mines), count)| SeedEntry {
                size,
                max_per_cell,
                mines,
                count: count.clone(),
            })
            .collect();
        entries.sort_by_key(|e| (e.size, e.max_per_cell, e.mines));
        entries
    }

    /// Serialize the cache so a later process can skip recomputation.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.export_seed())
    }

    /// Number of ordered ways to place `m` mines into `s` cells, each cell
    /// holding at most `xmax` mines. Returns zero for locally infeasible
    /// parameters (`m > s·xmax`); that is a valid base case, not an error.
    pub fn count(&self, s: u32, m: u32, xmax: u32) -> BigUint {
        match self.count_cancellable(s, m, xmax, &CancelToken::new()) {
            Ok(count) => count,
            Err(_) => unreachable!("a fresh token is never cancelled"),
        }
    }

    /// Like [`Self::count`], but checks `cancel` before every recursive
    /// step of a cache-miss enumeration. Closed-form branches and cache
    /// hits return without consulting the token; a cancelled enumeration
    /// inserts nothing into the cache.
    pub fn count_cancellable(
        &self,
        s: u32,
        m: u32,
        xmax: u32,
        cancel: &CancelToken,
    ) -> Result<BigUint> {
        if m as u64 > s as u64 * xmax as u64 {
            return Ok(BigUint::zero());
        }
        if xmax == 1 {
            // Ordered injections, s!/(s-m)!; see the module docs for why
            // this is not divided down to a plain combination count.
            return Ok(falling_factorial(s, m));
        }
        if xmax >= m {
            // The cap never binds: every mine picks a cell freely.
            return Ok(BigUint::from(s).pow(m));
        }
        if s == 1 {
            return Ok(BigUint::one());
        }

        if let Some(hit) = self
            .cache
            .read()
            .expect("cache lock poisoned")
            .get(&(s, xmax, m))
        {
            return Ok(hit.clone());
        }

        let (total, partials) = Enumeration::new(s, m, xmax).run(cancel)?;
        let mut cache = self.cache.write().expect("cache lock poisoned");
        for (cap, value) in partials {
            cache.insert((s, cap, m), value);
        }
        cache.insert((s, xmax, m), total.clone());
        Ok(total)
    }

    /// Marginal probability that one specific cell of the `s` holds at
    /// least one mine.
    pub fn probability(&self, s: u32, m: u32, xmax: u32) -> f64 {
        match self.probability_cancellable(s, m, xmax, &CancelToken::new()) {
            Ok(p) => p,
            Err(_) => unreachable!("a fresh token is never cancelled"),
        }
    }

    /// Like [`Self::probability`], but the capped branch's underlying
    /// counts honor `cancel`.
    pub fn probability_cancellable(
        &self,
        s: u32,
        m: u32,
        xmax: u32,
        cancel: &CancelToken,
    ) -> Result<f64> {
        if s == 0 {
            return Ok(0.0);
        }
        if m as u64 > s as u64 * xmax as u64 {
            return Ok(0.0);
        }
        if xmax == 1 {
            return Ok(m as f64 / s as f64);
        }
        if xmax >= m {
            // Independent placement; exact while the cap cannot bind.
            return Ok(1.0 - (1.0 - 1.0 / s as f64).powi(m as i32));
        }
        if m as u64 > xmax as u64 * (s as u64 - 1) {
            // The other s-1 cells cannot absorb every mine.
            return Ok(1.0);
        }
        let excluding = self.count_cancellable(s - 1, m, xmax, cancel)?;
        let all = self.count_cancellable(s, m, xmax, cancel)?;
        let ratio = BigRational::new(excluding.into(), all.into());
        Ok(1.0 - ratio.to_f64().unwrap_or(0.0))
    }
}

/// Depth-first walk over every non-increasing vector of `s` cell counts in
/// `[0, xmax]` summing to `m`.
///
/// Values are tried in ascending order at each position, so completed
/// vectors appear in ascending order of their maximum entry. Each time the
/// maximum steps up, the running total is final for the previous maximum
/// and is kept as a cacheable count for that smaller cap.
struct Enumeration {
    s: u32,
    m: u32,
    xmax: u32,
    entries: Vec<u32>,
    total: BigUint,
    last_max: Option<u32>,
    partials: Vec<(u32, BigUint)>,
}

impl Enumeration {
    fn new(s: u32, m: u32, xmax: u32) -> Self {
        Self {
            s,
            m,
            xmax,
            entries: Vec::with_capacity(s as usize),
            total: BigUint::zero(),
            last_max: None,
            partials: Vec::new(),
        }
    }

    fn run(mut self, cancel: &CancelToken) -> Result<(BigUint, Vec<(u32, BigUint)>)> {
        self.descend(self.m, cancel)?;
        Ok((self.total, self.partials))
    }

    fn descend(&mut self, remaining: u32, cancel: &CancelToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(SolverError::Cancelled);
        }
        let filled = self.entries.len() as u32;
        if filled == self.s {
            self.record();
            return Ok(());
        }
        let cells_left = self.s - filled;
        // Later entries cannot exceed this one, so it must cover at least
        // an equal share of what remains.
        let lo = remaining.div_ceil(cells_left);
        let prev = if filled == 0 {
            self.xmax
        } else {
            self.entries[filled as usize - 1]
        };
        let hi = prev.min(self.xmax).min(remaining);
        for value in lo..=hi {
            self.entries.push(value);
            self.descend(remaining - value, cancel)?;
            self.entries.pop();
        }
        Ok(())
    }

    fn record(&mut self) {
        let vector_max = self.entries[0];
        if let Some(prev) = self.last_max {
            if vector_max > prev {
                self.partials.push((prev, self.total.clone()));
            }
        }
        self.last_max = Some(vector_max);
        let weight = self.weight();
        self.total += weight;
    }

    /// Ordered placements realizing the current vector: `s!·m!` divided,
    /// for each run of `k` equal values `v` (zero runs included), by
    /// `k!·(v!)^k`.
    fn weight(&self) -> BigUint {
        let mut denominator = BigUint::one();
        let mut i = 0;
        while i < self.entries.len() {
            let value = self.entries[i];
            let mut run = 0u32;
            while i < self.entries.len() && self.entries[i] == value {
                run += 1;
                i += 1;
            }
            denominator *= factorial(run) * factorial(value).pow(run);
        }
        factorial(self.s) * factorial(self.m) / denominator
    }
}
