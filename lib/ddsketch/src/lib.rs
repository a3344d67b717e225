//! A quantile sketch with relative-error guarantees.
//!
//! DDSketch ingests a stream of real-valued observations and answers
//! approximate quantile queries: for any queried quantile whose true value is
//! `v` (with `v != 0`), the estimate is within `alpha * |v|` of `v`, where
//! `alpha` is the relative accuracy chosen at construction.
//!
//! Sketches are fully mergeable: compute one sketch per producer, then fold
//! them together. The serialized form (see [`DDSketch::to_bytes`]) is a
//! compact protobuf payload suitable for aggregation across processes.
//!
//! # Quick Start
//!
//! ```
//! use ddsketch::DDSketch;
//!
//! let mut sketch = DDSketch::new(0.01)?;
//! for i in 1..=100 {
//!     sketch.add(i as f64);
//! }
//!
//! let p99 = sketch.quantile(0.99);
//! assert!((p99 - 99.0).abs() <= 0.01 * 99.0);
//! # Ok::<(), ddsketch::SketchError>(())
//! ```
//!
//! # Choosing a store
//!
//! - [`DenseStore`]: unbounded; fastest and simplest. The default.
//! - [`CollapsingLowestDenseStore`]: bounded memory; sacrifices the lowest
//!   quantiles. Best for latency-like data where the tail matters most.
//! - [`CollapsingHighestDenseStore`]: bounded memory; sacrifices the highest
//!   quantiles.
//!
//! # Choosing a mapping
//!
//! - [`LogarithmicMapping`]: memory-optimal; computes a logarithm per
//!   insertion. The default.
//! - [`LinearlyInterpolatedMapping`] and [`CubicallyInterpolatedMapping`]:
//!   approximate the logarithm from the floating-point representation,
//!   trading a few extra bins for cheaper keys.
//!
//! Sketches are not thread-safe; share them across threads by computing
//! independent sketches and merging.

#![deny(missing_docs)]

pub mod mapping;
pub mod store;

mod error;
mod sketch;

pub use self::error::{SketchError, WireError};
pub use self::mapping::{
    AnyMapping, CubicallyInterpolatedMapping, IndexMapping, LinearlyInterpolatedMapping, LogarithmicMapping,
};
pub use self::sketch::DDSketch;
pub use self::store::{CollapsingHighestDenseStore, CollapsingLowestDenseStore, DenseStore, Store};
