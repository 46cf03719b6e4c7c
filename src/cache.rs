// ABOUTME: Bounded multi-layer caches with pluggable LRU/LFU eviction and
// optional statistics

use crate::ast::Expr;
use crate::config::CacheConfig;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionPolicy {
    Lru,
    Lfu,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct Slot<V> {
    value: V,
    touched: u64,
    uses: u64,
}

/// A bounded map that never exceeds its capacity; the victim on
/// overflow is picked by the configured policy.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    entries: HashMap<K, Slot<V>>,
    capacity: usize,
    policy: EvictionPolicy,
    clock: u64,
    stats: Option<CacheStats>,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize, policy: EvictionPolicy, statistics: bool) -> Self {
        BoundedCache {
            entries: HashMap::new(),
            capacity,
            policy,
            clock: 0,
            stats: statistics.then(CacheStats::default),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> Option<CacheStats> {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.clock += 1;
        let clock = self.clock;
        match self.entries.get_mut(key) {
            Some(slot) => {
                slot.touched = clock;
                slot.uses += 1;
                if let Some(stats) = &mut self.stats {
                    stats.hits += 1;
                }
                Some(slot.value.clone())
            }
            None => {
                if let Some(stats) = &mut self.stats {
                    stats.misses += 1;
                }
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        self.clock += 1;
        if let Some(slot) = self.entries.get_mut(&key) {
            slot.value = value;
            slot.touched = self.clock;
            slot.uses += 1;
            return;
        }
        while self.entries.len() >= self.capacity {
            self.evict_one();
        }
        self.entries.insert(
            key,
            Slot {
                value,
                touched: self.clock,
                uses: 1,
            },
        );
    }

    /// Online capacity change; shrinking evicts down to the new bound.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict_to_capacity();
    }

    /// Online policy change re-evicts so the resident set matches the
    /// new policy's preferences going forward.
    pub fn set_policy(&mut self, policy: EvictionPolicy) {
        self.policy = policy;
        self.evict_to_capacity();
    }

    fn evict_to_capacity(&mut self) {
        while self.entries.len() > self.capacity {
            self.evict_one();
        }
    }

    fn evict_one(&mut self) {
        let victim = match self.policy {
            EvictionPolicy::Lru => self
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.touched)
                .map(|(key, _)| key.clone()),
            EvictionPolicy::Lfu => self
                .entries
                .iter()
                .min_by_key(|(_, slot)| (slot.uses, slot.touched))
                .map(|(key, _)| key.clone()),
        };
        if let Some(key) = victim {
            self.entries.remove(&key);
            if let Some(stats) = &mut self.stats {
                stats.evictions += 1;
            }
        }
    }

    fn report(&self) -> CacheLayerReport {
        let stats = self.stats.unwrap_or_default();
        CacheLayerReport {
            size: self.len(),
            capacity: self.capacity,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            hit_rate: stats.hit_rate(),
        }
    }
}

// ============================================================================
// Cache manager: the four layers
// ============================================================================

/// Key for the evaluation layer: the expression plus the full binding
/// map (names and value bit patterns), so results are never served
/// across differing environments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvalKey {
    pub ast: Rc<Expr>,
    pub bindings: Vec<(String, u64)>,
}

impl EvalKey {
    pub fn new(ast: Rc<Expr>, bindings: &HashMap<String, f64>) -> Self {
        let mut bindings: Vec<(String, u64)> = bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.to_bits()))
            .collect();
        bindings.sort();
        EvalKey { ast, bindings }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivativeKey {
    pub ast: Rc<Expr>,
    pub var: String,
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CacheLayerReport {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub parsed: CacheLayerReport,
    pub evaluation: CacheLayerReport,
    pub derivative: CacheLayerReport,
    pub subexpression: CacheLayerReport,
}

/// The four layers: parsed source, evaluation results, derivatives, and
/// simplified sub-expressions.
#[derive(Debug)]
pub struct CacheManager {
    parsed: BoundedCache<String, Rc<Expr>>,
    evaluation: BoundedCache<EvalKey, Value>,
    derivative: BoundedCache<DerivativeKey, Rc<Expr>>,
    subexpression: BoundedCache<Rc<Expr>, Rc<Expr>>,
    max_input_length: usize,
}

impl CacheManager {
    pub fn new(config: &CacheConfig) -> Self {
        CacheManager {
            parsed: BoundedCache::new(config.parsed_capacity, config.policy, config.statistics),
            evaluation: BoundedCache::new(
                config.evaluation_capacity,
                config.policy,
                config.statistics,
            ),
            derivative: BoundedCache::new(
                config.derivative_capacity,
                config.policy,
                config.statistics,
            ),
            subexpression: BoundedCache::new(
                config.subexpression_capacity,
                config.policy,
                config.statistics,
            ),
            max_input_length: config.max_cache_input_length,
        }
    }

    pub fn lookup_parsed(&mut self, source: &str) -> Option<Rc<Expr>> {
        self.parsed.get(&source.to_string())
    }

    /// Oversize sources still parse, they just bypass the cache.
    pub fn store_parsed(&mut self, source: &str, ast: Rc<Expr>) {
        if source.len() > self.max_input_length {
            debug!(length = source.len(), "source too long for the parse cache");
            return;
        }
        self.parsed.insert(source.to_string(), ast);
    }

    pub fn lookup_evaluation(&mut self, key: &EvalKey) -> Option<Value> {
        self.evaluation.get(key)
    }

    pub fn store_evaluation(&mut self, key: EvalKey, value: Value) {
        self.evaluation.insert(key, value);
    }

    pub fn lookup_derivative(&mut self, key: &DerivativeKey) -> Option<Rc<Expr>> {
        self.derivative.get(key)
    }

    pub fn store_derivative(&mut self, key: DerivativeKey, ast: Rc<Expr>) {
        self.derivative.insert(key, ast);
    }

    pub fn lookup_simplified(&mut self, expr: &Rc<Expr>) -> Option<Rc<Expr>> {
        self.subexpression.get(expr)
    }

    pub fn store_simplified(&mut self, expr: Rc<Expr>, simplified: Rc<Expr>) {
        self.subexpression.insert(expr, simplified);
    }

    pub fn clear_all(&mut self) {
        self.parsed.clear();
        self.evaluation.clear();
        self.derivative.clear();
        self.subexpression.clear();
    }

    pub fn set_policy(&mut self, policy: EvictionPolicy) {
        self.parsed.set_policy(policy);
        self.evaluation.set_policy(policy);
        self.derivative.set_policy(policy);
        self.subexpression.set_policy(policy);
    }

    pub fn report(&self) -> CacheReport {
        CacheReport {
            parsed: self.parsed.report(),
            evaluation: self.evaluation.report(),
            derivative: self.derivative.report(),
            subexpression: self.subexpression.report(),
        }
    }
}

/// An expression whose evaluation cost justifies the L2 lookup:
/// integrals, series, limits, or matrices with more than four rows.
pub fn is_costly(expr: &Expr) -> bool {
    match expr {
        Expr::Integral { .. }
        | Expr::MultiIntegral { .. }
        | Expr::Sum { .. }
        | Expr::Product { .. }
        | Expr::Limit { .. } => true,
        Expr::Matrix { rows } if rows.len() > 4 => true,
        other => {
            let mut found = false;
            other.map_children(&mut |child| {
                if !found && is_costly(child) {
                    found = true;
                }
                child.clone()
            });
            found
        }
    }
}
