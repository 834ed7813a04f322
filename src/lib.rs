//! Non-scattering two-stream radiative-transfer solver.
//!
//! Given per-layer absorption optical depths, layer temperatures, and the
//! boundary conditions (top-of-atmosphere incident flux, surface emission,
//! surface albedo), compute the upwelling and downwelling flux profiles at
//! the layer interfaces. A single grey band, a sum over spectral bands, and
//! a parallel fan-out over many atmospheric columns are all supported; see
//! [`twostream`].
//!
//! The solver is a pure function library: inputs are validated up front and
//! a call either fails atomically or returns the full flux profiles. NaN or
//! infinite values produced by extreme inputs are propagated, not trapped.
//!
//! With the `python` feature enabled the crate builds as an extension
//! module exposing [`twostream::compute_fluxes`] over numpy arrays.

pub mod error;
pub mod twostream;

#[cfg(feature = "python")]
mod python;
