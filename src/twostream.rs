//! Non-scattering two-stream flux computation.
//!
//! The atmosphere is a stack of `N` plane-parallel layers, each described by
//! an absorption optical-depth increment `Δτ`. A layer transmits the
//! fraction `t = exp(-Δτ)` of an incident beam and contributes the fraction
//! `ε = 1 - t` of its own blackbody emission. Fluxes are evaluated at the
//! `N + 1` layer interfaces by multiplying cumulative-transmission matrices
//! with emission vectors; the upwelling beam couples to the downwelling one
//! only through surface reflection.

mod core;
mod emission;


pub use self::core::{LayerOptics, TransmissionMatrix};
pub use self::emission::{blackbody_emission, optical_depth, STANDARD_GRAVITY, STEFAN_BOLTZMANN};

use crate::error::RtmError;
use log::{debug, info};
use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;
use smallvec::SmallVec;

/// Boundary conditions for a single column.
#[derive(Debug, Clone, Copy)]
pub struct Boundary {
    /// Incident downward flux at the top of the atmosphere in W/m². Zero
    /// for a pure longwave calculation, the insolation for shortwave.
    pub toa_flux: f64,
    /// Surface emission in W/m².
    pub surface_emission: f64,
    /// Surface albedo in `[0, 1]`.
    pub surface_albedo: f64,
}

impl Boundary {
    fn validate(&self) -> Result<(), RtmError> {
        let albedo = self.surface_albedo;
        // NaN also fails the range check
        if !(0.0..=1.0).contains(&albedo) {
            return Err(RtmError::AlbedoOutOfRange(albedo));
        }
        Ok(())
    }
}

/// Upwelling and downwelling flux profiles in W/m² at the `N + 1` layer
/// interfaces, index 0 at the surface.
#[derive(Debug, Clone)]
pub struct Fluxes {
    /// Upwelling flux per interface.
    pub up: Array1<f64>,
    /// Downwelling flux per interface.
    pub down: Array1<f64>,
}

impl Fluxes {
    fn zeros(num_interfaces: usize) -> Self {
        Self {
            up: Array1::zeros(num_interfaces),
            down: Array1::zeros(num_interfaces),
        }
    }
}

/// Two-stream flux solver for a single spectral band.
///
/// Construction validates the optical depths and assembles the transmission
/// table once; [`solve`](Self::solve) only does the matrix-vector products,
/// so repeated solves over fixed absorbers (e.g. a time loop updating
/// temperatures) pay the O(N²) fill once.
#[derive(Debug, Clone)]
pub struct TwoStreamSolver {
    optics: LayerOptics,
    matrix: TransmissionMatrix,
}

impl TwoStreamSolver {
    /// Build a solver from per-layer optical-depth increments.
    pub fn new(optical_depth: &[f64]) -> Result<Self, RtmError> {
        Ok(Self::from_optics(LayerOptics::from_optical_depths(
            optical_depth,
        )?))
    }

    /// Build a solver from already-validated layer optics.
    pub fn from_optics(optics: LayerOptics) -> Self {
        let matrix = TransmissionMatrix::new(&optics);
        Self { optics, matrix }
    }

    /// Number of atmospheric layers `N`.
    pub fn num_layers(&self) -> usize {
        self.optics.num_layers()
    }

    /// The layer optics this solver was built from.
    pub fn optics(&self) -> &LayerOptics {
        &self.optics
    }

    /// The cached transmission table.
    pub fn matrix(&self) -> &TransmissionMatrix {
        &self.matrix
    }

    /// Solve for the interface fluxes.
    ///
    /// `emission` holds the per-layer blackbody emission `σT⁴` in W/m²,
    /// length [`num_layers`](Self::num_layers); the solver applies the
    /// emissivity weighting, so a layer contributes `ε σT⁴` to each beam.
    /// The downwelling beam is computed first because the upwelling surface
    /// value couples to `D[0]` through the albedo; with zero albedo the two
    /// beams are fully independent.
    ///
    /// NaN or infinite emission values are propagated into the fluxes, not
    /// trapped.
    pub fn solve(&self, emission: &[f64], boundary: &Boundary) -> Result<Fluxes, RtmError> {
        boundary.validate()?;
        let num_layers = self.num_layers();
        if emission.len() != num_layers {
            return Err(RtmError::InconsistentInputs {
                expected: num_layers,
                actual: emission.len(),
            });
        }

        let layer_source: SmallVec<[f64; 64]> = emission
            .iter()
            .zip(self.optics.emissivity())
            .map(|(&emission, &ems)| ems * emission)
            .collect();

        // E_down = [ε_0 E_0, ..., ε_{N-1} E_{N-1}, toa]; only the top
        // boundary entry is beam specific
        let mut e_down: SmallVec<[f64; 64]> = layer_source.clone();
        e_down.push(boundary.toa_flux);
        let down = self.matrix.down().dot(&ArrayView1::from(e_down.as_slice()));

        // Surface reflection couples the upwelling beam to D[0]
        let up_sfc = boundary.surface_emission + boundary.surface_albedo * down[0];

        let mut e_up: SmallVec<[f64; 64]> = SmallVec::with_capacity(num_layers + 1);
        e_up.push(up_sfc);
        e_up.extend_from_slice(&layer_source);
        let up = self.matrix.up().dot(&ArrayView1::from(e_up.as_slice()));

        Ok(Fluxes { up, down })
    }
}

/// One spectral band of a band model.
#[derive(Debug, Clone)]
pub struct Band {
    /// Fraction `b ∈ [0, 1]` of the blackbody emission falling in this band.
    pub fraction: f64,
    /// Per-layer optical-depth increments for this band.
    pub optical_depth: Vec<f64>,
}

/// Absolute tolerance on the band-fraction sum invariant `Σ b_j = 1`.
const BAND_FRACTION_TOLERANCE: f64 = 1e-9;

/// A band model: `M` independent grey-gas problems summed over the bands.
#[derive(Debug, Clone)]
pub struct BandModel {
    solvers: Vec<(f64, TwoStreamSolver)>,
    num_layers: usize,
}

impl BandModel {
    /// Validate the band set and assemble one solver per band.
    ///
    /// The fractions must each lie in `[0, 1]` and sum to 1 within 1e-9; a
    /// violation is a configuration error and is never silently
    /// renormalized. Every band must cover the same number of layers.
    pub fn new(bands: Vec<Band>) -> Result<Self, RtmError> {
        for (position, band) in bands.iter().enumerate() {
            if !(0.0..=1.0).contains(&band.fraction) {
                return Err(RtmError::BandFractionOutOfRange {
                    band: position,
                    value: band.fraction,
                });
            }
        }
        let sum: f64 = bands.iter().map(|band| band.fraction).sum();
        if (sum - 1.0).abs() > BAND_FRACTION_TOLERANCE {
            return Err(RtmError::BandFractionSum(sum));
        }

        let num_layers = bands.first().map_or(0, |band| band.optical_depth.len());
        for band in &bands {
            if band.optical_depth.len() != num_layers {
                return Err(RtmError::InconsistentInputs {
                    expected: num_layers,
                    actual: band.optical_depth.len(),
                });
            }
        }

        let solvers = bands
            .into_iter()
            .map(|band| Ok((band.fraction, TwoStreamSolver::new(&band.optical_depth)?)))
            .collect::<Result<Vec<_>, RtmError>>()?;

        Ok(Self { solvers, num_layers })
    }

    /// Number of atmospheric layers `N`.
    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    /// Number of spectral bands `M`.
    pub fn num_bands(&self) -> usize {
        self.solvers.len()
    }

    /// Solve every band and sum the fluxes elementwise.
    ///
    /// `temperature` holds the layer temperatures in K, length
    /// [`num_layers`](Self::num_layers). Each band sees the blackbody
    /// emission and the boundary emission terms scaled by its fraction; the
    /// albedo is a ratio and applies to every band unscaled. The bands share
    /// nothing and fan out over the rayon pool, reduced by elementwise sum.
    pub fn solve(&self, temperature: &[f64], boundary: &Boundary) -> Result<Fluxes, RtmError> {
        boundary.validate()?;
        if temperature.len() != self.num_layers {
            return Err(RtmError::InconsistentInputs {
                expected: self.num_layers,
                actual: temperature.len(),
            });
        }
        let emission = blackbody_emission(temperature);

        let per_band = self
            .solvers
            .par_iter()
            .map(|(fraction, solver)| {
                let scaled: SmallVec<[f64; 64]> =
                    emission.iter().map(|emission| fraction * emission).collect();
                let band_boundary = Boundary {
                    toa_flux: fraction * boundary.toa_flux,
                    surface_emission: fraction * boundary.surface_emission,
                    surface_albedo: boundary.surface_albedo,
                };
                solver.solve(&scaled, &band_boundary)
            })
            .collect::<Result<Vec<_>, RtmError>>()?;

        let mut total = Fluxes::zeros(self.num_layers + 1);
        for fluxes in &per_band {
            total.up += &fluxes.up;
            total.down += &fluxes.down;
        }
        Ok(total)
    }
}

/// Inputs for one atmospheric column of a grid computation.
#[derive(Debug, Clone)]
pub struct ColumnInput {
    /// Spectral bands with this column's per-layer optical depths.
    pub bands: Vec<Band>,
    /// Layer temperatures in K.
    pub temperature: Vec<f64>,
    /// Column boundary conditions.
    pub boundary: Boundary,
}

/// Solve many independent atmospheric columns on a worker thread pool.
///
/// The number of worker threads is controlled by `num_threads`. It must be
/// a positive integer, or `None` to automatically choose the number of
/// threads. Columns share no state, so the fan-out needs no synchronization
/// beyond collecting the per-column results; the first validation error
/// fails the whole call.
pub fn compute_fluxes(
    columns: &[ColumnInput],
    num_threads: Option<usize>,
) -> Result<Vec<Fluxes>, RtmError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .build()
        .map_err(|e| RtmError::ThreadPool(e.to_string()))?;

    info!(
        "computing two-stream fluxes for {} atmospheric columns",
        columns.len()
    );

    let mut results = Vec::new();
    pool.install(|| {
        columns
            .par_iter()
            .map(|column| {
                let model = BandModel::new(column.bands.clone())?;
                model.solve(&column.temperature, &column.boundary)
            })
            .collect_into_vec(&mut results);
    });

    debug!("collecting column fluxes");
    results.into_iter().collect()
}
