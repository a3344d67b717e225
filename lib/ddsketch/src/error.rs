//! Error types.

use snafu::Snafu;

/// Errors raised by sketch construction and mutation.
///
/// Every error is raised synchronously at the call site, and the sketch (or
/// mapping, or store) is left unchanged when one is raised.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SketchError {
    /// The relative accuracy is outside the open interval (0, 1).
    #[snafu(display("relative accuracy must be between 0 and 1 (exclusive), got {value}"))]
    InvalidRelativeAccuracy {
        /// The rejected relative accuracy.
        value: f64,
    },

    /// The insertion weight is not strictly positive.
    #[snafu(display("weight must be positive, got {weight}"))]
    InvalidWeight {
        /// The rejected weight.
        weight: f64,
    },

    /// The sketches being merged were built with different parameters.
    ///
    /// Two sketches can be merged only when their gamma values are equal,
    /// since bin keys are only comparable within a single bin base.
    #[snafu(display("cannot merge sketches with different parameters: gamma {expected} vs {actual}"))]
    UnequalSketchParameters {
        /// Gamma of the sketch being merged into.
        expected: f64,
        /// Gamma of the sketch being merged from.
        actual: f64,
    },
}

/// Errors raised when decoding a sketch from its wire form.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WireError {
    /// The payload carries no index mapping.
    #[snafu(display("serialized sketch is missing the index mapping"))]
    MissingMapping,

    /// The payload names an interpolation scheme this crate does not know.
    #[snafu(display("unsupported interpolation kind: {value}"))]
    UnsupportedInterpolation {
        /// The raw enum value from the payload.
        value: i32,
    },

    /// The mapping parameters on the wire are invalid.
    #[snafu(display("invalid mapping parameters on the wire: {source}"))]
    InvalidMapping {
        /// The underlying parameter error.
        source: SketchError,
    },

    /// The payload is not a valid protobuf message.
    #[snafu(display("failed to decode sketch payload: {source}"))]
    Decode {
        /// The underlying protobuf decode error.
        source: prost::DecodeError,
    },
}
