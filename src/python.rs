//! Python interface.
//!
//! NOTE: this module is the interface between Rust and Python. The real
//! work happens in the other modules, and they do not use `pyo3`, it's only
//! used here.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use log::{debug, info};
use ndarray::{Array2, Axis};
use numpy::prelude::*;
use numpy::{PyArray2, PyReadonlyArray1, PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rayon::prelude::*;

use crate::error::RtmError;
use crate::twostream::{optical_depth, Band, BandModel, Boundary, Fluxes};

impl From<RtmError> for PyErr {
    fn from(e: RtmError) -> Self {
        PyValueError::new_err(e.to_string())
    }
}

/// Interface flux profiles.
///
/// This is just a container of two numpy arrays, each dimensioned as
/// (`num_points`, `num_layers + 1`), index 0 at the surface.
#[pyclass]
struct FluxProfiles {
    up: Array2<f64>,
    down: Array2<f64>,
}

/// Implement all the "getters" for the Python properties
#[pymethods]
impl FluxProfiles {
    #[getter]
    fn up<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.up.to_pyarray(py)
    }

    #[getter]
    fn down<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.down.to_pyarray(py)
    }
}

impl FluxProfiles {
    fn new(num_points: usize, num_interfaces: usize) -> Self {
        Self {
            up: Array2::zeros([num_points, num_interfaces]),
            down: Array2::zeros([num_points, num_interfaces]),
        }
    }
}

/// Compute two-stream radiative fluxes for a grid of atmospheric columns.
///
/// The spectral model is shared by all columns and has shape (`num_bands`, )
/// or (`num_bands`, `num_layers`):
///
/// `band_fraction`: fraction of the blackbody emission per band; must sum
/// to 1
///
/// `absorption`: per-band, per-layer mass absorption cross-section in m²/kg
///
/// The following are per-column profiles and have shape (`num_points`,
/// `num_layers`), layer 0 next to the surface:
///
/// `pressure_thickness`: layer pressure thickness in Pa
///
/// `temperature`: layer temperature in K
///
/// The following are boundary conditions and have shape (`num_points`, ):
///
/// `toa_flux`: incident downward flux at the top of the atmosphere in W/m²
///
/// `surface_emission`: surface emission in W/m²
///
/// `surface_albedo`: surface albedo in [0, 1]
///
/// The returned flux profiles are each dimensioned as (`num_points`,
/// `num_layers + 1`).
///
/// The number of worker threads is controlled by `num_threads`. It must be
/// a positive integer, or `None` to automatically choose the number of
/// threads.
#[pyfunction]
#[pyo3(signature = (band_fraction, absorption, pressure_thickness, temperature, toa_flux, surface_emission, surface_albedo, num_threads))]
#[allow(clippy::too_many_arguments)]
fn compute_fluxes(
    py: Python<'_>,
    band_fraction: PyReadonlyArray1<'_, f64>,
    absorption: PyReadonlyArray2<'_, f64>,
    pressure_thickness: PyReadonlyArray2<'_, f64>,
    temperature: PyReadonlyArray2<'_, f64>,
    toa_flux: PyReadonlyArray1<'_, f64>,
    surface_emission: PyReadonlyArray1<'_, f64>,
    surface_albedo: PyReadonlyArray1<'_, f64>,
    num_threads: Option<usize>,
) -> PyResult<FluxProfiles> {
    let num_bands = band_fraction.len();
    let num_points = temperature.shape()[0];
    let num_layers = temperature.shape()[1];

    // Check shapes of all inputs
    {
        let per_column = &[pressure_thickness.dims(), temperature.dims()];
        let per_point = &[
            toa_flux.len(),
            surface_emission.len(),
            surface_albedo.len(),
        ];

        if absorption.dims() != [num_bands, num_layers] {
            return Err(RtmError::InconsistentInputs {
                expected: num_layers,
                actual: absorption.shape()[1],
            }
            .into());
        }
        if per_column.iter().any(|d| d != &[num_points, num_layers]) {
            return Err(RtmError::InconsistentInputs {
                expected: num_layers,
                actual: pressure_thickness.shape()[1],
            }
            .into());
        }
        if per_point.iter().any(|&d| d != num_points) {
            return Err(RtmError::InconsistentInputs {
                expected: num_points,
                actual: toa_flux.len(),
            }
            .into());
        }
    }
    debug!("input shapes are consistent");

    // Ensure everything is converted and contiguous
    let band_fraction = band_fraction.as_slice()?;
    let absorption = absorption.as_array();
    let pressure_thickness = pressure_thickness.as_array();
    let temperature = temperature.as_array();
    let toa_flux = toa_flux.as_slice()?;
    let surface_emission = surface_emission.as_slice()?;
    let surface_albedo = surface_albedo.as_slice()?;

    let mut results = Vec::new();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .build()
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    // These atomics keep track of how many columns have finished and whether
    // it's time to cancel the computation or not
    let num_completed = AtomicUsize::new(0);
    let cancelled = AtomicBool::new(false);

    info!("Processing two-stream fluxes for {num_points} columns and {num_bands} bands");

    pool.in_place_scope(|s| -> Result<(), PyErr> {
        s.spawn(|_| {
            (0..num_points)
                .into_par_iter()
                .map(|point| -> Result<Fluxes, RtmError> {
                    if cancelled.load(Ordering::Relaxed) {
                        return Err(RtmError::Cancelled);
                    }

                    let thickness = pressure_thickness.index_axis(Axis(0), point);
                    let thickness = thickness.as_slice().ok_or(RtmError::NotContiguous)?;

                    let bands = band_fraction
                        .iter()
                        .zip(absorption.outer_iter())
                        .map(|(&fraction, kappa)| -> Result<Band, RtmError> {
                            let kappa = kappa.as_slice().ok_or(RtmError::NotContiguous)?;
                            Ok(Band {
                                fraction,
                                optical_depth: optical_depth(kappa, thickness)?,
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;

                    let model = BandModel::new(bands)?;
                    let boundary = Boundary {
                        toa_flux: toa_flux[point],
                        surface_emission: surface_emission[point],
                        surface_albedo: surface_albedo[point],
                    };

                    model.solve(
                        temperature
                            .index_axis(Axis(0), point)
                            .as_slice()
                            .ok_or(RtmError::NotContiguous)?,
                        &boundary,
                    )
                })
                .inspect(|_| {
                    num_completed.fetch_add(1, Ordering::Relaxed);
                })
                .collect_into_vec(&mut results);
        });

        // The work is done in the thread pool, but back here in the main
        // thread, handle progress reporting and checking for early
        // cancellation
        while !cancelled.load(Ordering::Relaxed) {
            if let Err(e) = py.check_signals() {
                cancelled.store(true, Ordering::Relaxed);
                return Err(e);
            }

            let num_completed = num_completed.load(Ordering::Relaxed);
            let progress = num_completed as f64 / num_points as f64 * 100.;
            info!("Completed fluxes for {num_completed}/{num_points} columns ({progress:0.2}%)");

            // All finished without cancelling early
            if num_completed == num_points {
                break;
            }

            py.allow_threads(|| {
                std::thread::sleep(Duration::from_secs(5));
            });
        }

        Ok(())
    })?;

    // Copy the intermediate results to the output arrays
    debug!("copying flux output");
    let mut output = FluxProfiles::new(num_points, num_layers + 1);
    results
        .into_iter()
        .enumerate()
        .try_for_each(|(index, fluxes)| -> Result<_, RtmError> {
            let Fluxes { up, down } = fluxes?;

            output.up.index_axis_mut(Axis(0), index).assign(&up);
            output.down.index_axis_mut(Axis(0), index).assign(&down);

            Ok(())
        })?;

    Ok(output)
}

/// A Python module implemented in Rust.
#[pymodule]
fn twostream_rtm(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();

    m.add_function(wrap_pyfunction!(compute_fluxes, m)?)?;
    m.add_class::<FluxProfiles>()?;
    Ok(())
}
