/// Possible two-stream solver errors.
///
/// Validation errors are detected synchronously, before any matrix
/// assembly, and carry the offending value; a failed call returns no
/// partial results. Numeric anomalies (NaN/Inf from extreme temperatures or
/// optical depths) are not errors: they propagate through the fluxes.
#[derive(Debug, Clone, PartialEq)]
pub enum RtmError {
    /// A layer optical-depth increment is negative (or NaN)
    NegativeOpticalDepth {
        /// Layer index, 0 next to the surface
        layer: usize,
        /// The rejected increment
        value: f64,
    },
    /// A layer emissivity is outside `[0, 1]`
    EmissivityOutOfRange {
        /// Layer index, 0 next to the surface
        layer: usize,
        /// The rejected emissivity
        value: f64,
    },
    /// The surface albedo is outside `[0, 1]`
    AlbedoOutOfRange(f64),
    /// A band fraction is outside `[0, 1]`
    BandFractionOutOfRange {
        /// Band index
        band: usize,
        /// The rejected fraction
        value: f64,
    },
    /// The band fractions don't sum to 1
    BandFractionSum(f64),
    /// The inputs don't have the expected length(s)
    InconsistentInputs {
        /// Length implied by the other inputs
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },
    /// An array is not contiguous when it was assumed to be
    NotContiguous,
    /// The operation was aborted early
    Cancelled,
    /// The worker thread pool could not be built
    ThreadPool(String),
}

impl std::fmt::Display for RtmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RtmError::NegativeOpticalDepth { layer, value } => {
                write!(f, "optical depth of layer {layer} is negative: {value}")
            }
            RtmError::EmissivityOutOfRange { layer, value } => {
                write!(f, "emissivity of layer {layer} is outside [0, 1]: {value}")
            }
            RtmError::AlbedoOutOfRange(value) => {
                write!(f, "surface albedo is outside [0, 1]: {value}")
            }
            RtmError::BandFractionOutOfRange { band, value } => {
                write!(f, "fraction of band {band} is outside [0, 1]: {value}")
            }
            RtmError::BandFractionSum(sum) => {
                write!(f, "band fractions sum to {sum}, expected 1")
            }
            RtmError::InconsistentInputs { expected, actual } => {
                write!(
                    f,
                    "inputs have inconsistent lengths: expected {expected}, got {actual}"
                )
            }
            RtmError::NotContiguous => write!(f, "array slice not contiguous in memory"),
            RtmError::Cancelled => write!(f, "operation cancelled early"),
            RtmError::ThreadPool(reason) => {
                write!(f, "couldn't build the worker thread pool: {reason}")
            }
        }
    }
}

impl std::error::Error for RtmError {}
