//! Layer optics and interface transmission matrices.

use ndarray::{Array2, ArrayView2};

use crate::error::RtmError;

/// Per-layer transmissivities and emissivities for one spectral band.
///
/// For `N` layers, indexed 0 next to the surface through `N - 1` at the top
/// of the atmosphere, the interface transmissivity vector `t` has length
/// `N + 1` with `t[0] = 1` and `t[i] = exp(-Δτ_{i-1})`. The layer emissivity
/// vector has length `N` with `ε_i = 1 - t[i+1]`, so the complement identity
/// `ε_i + t[i+1] = 1` holds exactly.
#[derive(Debug, Clone)]
pub struct LayerOptics {
    /// Interface transmissivities, length `num_layers + 1`, `t[0] = 1`.
    transmissivity: Vec<f64>,
    /// Layer emissivities, length `num_layers`.
    emissivity: Vec<f64>,
}

impl LayerOptics {
    /// Build the optics from per-layer optical-depth increments.
    ///
    /// Each increment must be non-negative. A fully opaque layer needs no
    /// special handling: `exp(-Δτ)` underflows to `+0` for very large `Δτ`,
    /// which is the correct limit, so no explicit clamp is applied.
    pub fn from_optical_depths(optical_depth: &[f64]) -> Result<Self, RtmError> {
        for (layer, &dtau) in optical_depth.iter().enumerate() {
            // The negated comparison also rejects NaN
            if !(dtau >= 0.0) {
                return Err(RtmError::NegativeOpticalDepth { layer, value: dtau });
            }
        }

        let mut transmissivity = Vec::with_capacity(optical_depth.len() + 1);
        transmissivity.push(1.0);
        transmissivity.extend(optical_depth.iter().map(|&dtau| f64::exp(-dtau)));

        let emissivity = transmissivity[1..].iter().map(|t| 1.0 - t).collect();

        Ok(Self {
            transmissivity,
            emissivity,
        })
    }

    /// Build the optics directly from per-layer emissivities.
    ///
    /// The entry point for band models specified in terms of `ε` rather
    /// than `Δτ`. Each value must lie in `[0, 1]`; the transmissivities are
    /// the exact complements `t[i+1] = 1 - ε_i`. An emissivity of exactly 1
    /// describes a fully opaque layer, matching the `exp(-Δτ)` underflow
    /// limit of [`from_optical_depths`](Self::from_optical_depths).
    pub fn from_emissivities(emissivity: &[f64]) -> Result<Self, RtmError> {
        for (layer, &ems) in emissivity.iter().enumerate() {
            if !(0.0..=1.0).contains(&ems) {
                return Err(RtmError::EmissivityOutOfRange { layer, value: ems });
            }
        }

        let mut transmissivity = Vec::with_capacity(emissivity.len() + 1);
        transmissivity.push(1.0);
        transmissivity.extend(emissivity.iter().map(|ems| 1.0 - ems));

        Ok(Self {
            transmissivity,
            emissivity: emissivity.to_vec(),
        })
    }

    /// Number of atmospheric layers `N`.
    pub fn num_layers(&self) -> usize {
        self.emissivity.len()
    }

    /// Interface transmissivities, length `num_layers() + 1`.
    pub fn transmissivity(&self) -> &[f64] {
        &self.transmissivity
    }

    /// Layer emissivities, length `num_layers()`.
    pub fn emissivity(&self) -> &[f64] {
        &self.emissivity
    }
}

/// Cumulative transmission between every pair of layer interfaces.
///
/// Only one canonical `(N+1) × (N+1)` table is stored, the lower-triangular
/// matrix for the upwelling beam. The downwelling beam traverses the same
/// stack in the opposite direction, so its matrix is the exact transpose and
/// is exposed as an index-swapped view over the same storage.
#[derive(Debug, Clone)]
pub struct TransmissionMatrix {
    up: Array2<f64>,
}

impl TransmissionMatrix {
    /// Assemble the transmission table from the layer optics.
    ///
    /// Entry `(i, j)` for `i > j` is the product `t[j+1] ⋯ t[i]`, the
    /// attenuation a beam suffers between interfaces `j` and `i`; the
    /// diagonal is 1. Each row entry extends the running product of its
    /// right-hand neighbor, keeping the fill at one multiply per entry.
    pub fn new(optics: &LayerOptics) -> Self {
        let t = optics.transmissivity();
        let size = t.len();

        let mut up = Array2::zeros((size, size));
        for i in 0..size {
            up[[i, i]] = 1.0;
            for j in (0..i).rev() {
                up[[i, j]] = up[[i, j + 1]] * t[j + 1];
            }
        }

        Self { up }
    }

    /// Transmission matrix for the upwelling beam (lower triangular).
    pub fn up(&self) -> ArrayView2<'_, f64> {
        self.up.view()
    }

    /// Transmission matrix for the downwelling beam.
    ///
    /// This is the exact transpose of [`up`](Self::up), returned as a view
    /// over the same storage.
    pub fn down(&self) -> ArrayView2<'_, f64> {
        self.up.t()
    }
}
