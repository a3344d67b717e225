//! Protocol Buffers definitions for the DDSketch exchange format.
//!
//! This crate contains the message types used to serialize sketches for
//! aggregation across producers. The encoding is standard Protocol Buffers:
//! field-tagged, order-independent, and unknown fields are ignored on read,
//! so producers and consumers can evolve independently.
//!
//! The messages are written by hand with `prost` derive macros rather than
//! generated from `.proto` files, which keeps `protoc` out of the build while
//! emitting byte-identical payloads.
#![deny(warnings)]
#![deny(missing_docs)]

/// A serialized sketch.
///
/// Carries the index mapping parameters, the dense bin runs for the positive
/// and negative magnitude stores, and the summary statistics that cannot be
/// recovered from the bins alone.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DdSketch {
    /// The index mapping the producer used to key its bins.
    #[prost(message, optional, tag = "1")]
    pub mapping: ::core::option::Option<IndexMapping>,

    /// Bin counts for positive magnitudes.
    #[prost(message, optional, tag = "2")]
    pub positive_values: ::core::option::Option<Store>,

    /// Bin counts for negative magnitudes, keyed by `|value|`.
    #[prost(message, optional, tag = "3")]
    pub negative_values: ::core::option::Option<Store>,

    /// Total weight of observations too close to zero to be indexed.
    #[prost(double, tag = "4")]
    pub zero_count: f64,

    /// Total weight of all observations.
    #[prost(double, tag = "5")]
    pub count: f64,

    /// Smallest observation seen by the producer.
    #[prost(double, tag = "6")]
    pub min: f64,

    /// Largest observation seen by the producer.
    #[prost(double, tag = "7")]
    pub max: f64,

    /// Weighted sum of all observations.
    #[prost(double, tag = "8")]
    pub sum: f64,
}

/// Serialized index mapping parameters.
///
/// Only the relative accuracy is transmitted; the bin base gamma is derived
/// from it on read.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndexMapping {
    /// The relative accuracy, in (0, 1).
    #[prost(double, tag = "1")]
    pub alpha: f64,

    /// Additive shift applied to every bin key.
    #[prost(double, tag = "2")]
    pub index_offset: f64,

    /// The interpolation scheme used to approximate the logarithm.
    #[prost(enumeration = "Interpolation", tag = "3")]
    pub interpolation: i32,
}

/// Serialized bin counts for one store.
///
/// Either representation may be present; readers consume both. Writers emit
/// only the dense run.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Store {
    /// Sparse representation: individual (key, count) pairs.
    #[prost(map = "sint64, double", tag = "1")]
    pub bin_counts: ::std::collections::HashMap<i64, f64>,

    /// Dense representation: a contiguous run of counts.
    #[prost(double, repeated, tag = "2")]
    pub contiguous_bin_counts: ::prost::alloc::vec::Vec<f64>,

    /// The key of the first element of the dense run.
    #[prost(sint64, tag = "3")]
    pub contiguous_bin_index_offset: i64,
}

/// How a mapping approximates the base-gamma logarithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Interpolation {
    /// No approximation: the exact logarithm.
    None = 0,

    /// Linear interpolation between powers of two.
    Linear = 1,

    /// Cubic interpolation between powers of two.
    Cubic = 2,
}
