//! Blackbody emission and hydrostatic optical-depth physics.

use crate::error::RtmError;

/// Stefan–Boltzmann constant in W m⁻² K⁻⁴.
pub const STEFAN_BOLTZMANN: f64 = 5.670374419e-8;

/// Standard gravitational acceleration in m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Map layer temperatures in K to blackbody emission `σT⁴` in W/m².
///
/// Temperatures are not validated: a NaN input propagates into NaN fluxes
/// downstream rather than being trapped here.
pub fn blackbody_emission(temperature: &[f64]) -> Vec<f64> {
    temperature
        .iter()
        .map(|&t| STEFAN_BOLTZMANN * t.powi(4))
        .collect()
}

/// Hydrostatic optical-depth increments `Δτ_i = (κ_i / g) Δp_i`.
///
/// `absorption` is the per-layer mass absorption cross-section in m²/kg and
/// `pressure_thickness` the per-layer pressure thickness in Pa; the two
/// slices must have the same length.
pub fn optical_depth(
    absorption: &[f64],
    pressure_thickness: &[f64],
) -> Result<Vec<f64>, RtmError> {
    if absorption.len() != pressure_thickness.len() {
        return Err(RtmError::InconsistentInputs {
            expected: absorption.len(),
            actual: pressure_thickness.len(),
        });
    }

    Ok(absorption
        .iter()
        .zip(pressure_thickness)
        .map(|(&kappa, &dp)| kappa / STANDARD_GRAVITY * dp)
        .collect())
}
