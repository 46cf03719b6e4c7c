// ABOUTME: Hard limits and engine/cache configuration for the expression engine

use serde::{Deserialize, Serialize};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Hard limits
// ============================================================================

/// Inputs longer than this fail before tokenization.
pub const MAX_INPUT_LENGTH: usize = 100_000;

/// Recursion cap shared by the parser and the simplifier.
pub const MAX_RECURSION_DEPTH: usize = 500;

/// Iteration cap for series evaluation (sum, product).
pub const MAX_ITERATIONS: usize = 100_000;

/// Fixed-point cap for the rewrite engine; the last value is returned on
/// breach.
pub const MAX_REWRITE_PASSES: usize = 100;

/// Sub-interval count for composite Simpson integration.
pub const INTEGRATION_INTERVALS: usize = 10_000;

/// Infinite integration bounds are clamped to this magnitude.
pub const INTEGRATION_CLAMP: f64 = 100.0;

/// Step sizes for two-sided numeric limit approach.
pub const LIMIT_STEPS: [f64; 5] = [1e-1, 1e-3, 1e-5, 1e-7, 1e-9];

/// Sample magnitudes for limits at infinity.
pub const LIMIT_INFINITY_SAMPLES: [f64; 4] = [1e2, 1e4, 1e6, 1e8];

/// Two-sided limit values agreeing within this are averaged.
pub const LIMIT_EPSILON: f64 = 1e-7;

/// Sample count for numeric equivalence checking.
pub const EQUIVALENCE_SAMPLES: usize = 10;

/// A single disagreement beyond this disproves numeric equivalence.
pub const EQUIVALENCE_EPSILON: f64 = 1e-9;

/// Fixed seed for the equivalence sampler.
pub const EQUIVALENCE_SEED: u64 = 0x7e59;

// ============================================================================
// Engine configuration
// ============================================================================

/// Parser and evaluator options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// When enabled (default), identifiers are single characters and
    /// juxtaposed atoms multiply; when disabled, letter runs lex as one
    /// variable name.
    pub implicit_multiplication: bool,
    /// Strict parsing collects every recoverable error instead of failing
    /// on the first.
    pub strict_parsing: bool,
    pub max_recursion_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            implicit_multiplication: true,
            strict_parsing: false,
            max_recursion_depth: MAX_RECURSION_DEPTH,
        }
    }
}

/// Capacities and eviction behaviour for the four cache layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub parsed_capacity: usize,
    pub evaluation_capacity: usize,
    pub derivative_capacity: usize,
    pub subexpression_capacity: usize,
    pub policy: crate::cache::EvictionPolicy,
    /// Record hit/miss/eviction counters per layer.
    pub statistics: bool,
    /// Sources longer than this still parse but are not admitted to the
    /// parsed-AST layer.
    pub max_cache_input_length: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            parsed_capacity: 128,
            evaluation_capacity: 256,
            derivative_capacity: 64,
            subexpression_capacity: 512,
            policy: crate::cache::EvictionPolicy::Lru,
            statistics: false,
            max_cache_input_length: 10_000,
        }
    }
}
