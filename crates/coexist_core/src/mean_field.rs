//! Mean-field lattice-gas model equations.
//!
//! The homogeneous self-consistent equation is
//! `rho = (1 - rho) * exp(beta * (mu + z_eff * rho))`, with all energies in
//! units of the nearest-neighbour interaction strength. Next-nearest
//! neighbours couple at a quarter of that strength, which makes the
//! effective coordination `z_eff = 4 + 4 * 0.25 = 5`.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};

pub const NEAREST_COUPLING: f64 = 1.0;
pub const NEXT_NEAREST_COUPLING: f64 = 0.25;
pub const COORDINATION: usize = 4;

/// Homogeneous coupling seen by a site when every neighbour has the same density.
pub const EFFECTIVE_COUPLING: f64 =
    COORDINATION as f64 * NEAREST_COUPLING + COORDINATION as f64 * NEXT_NEAREST_COUPLING;

/// Top of the spinodal dome, `z_eff / 4`.
pub const CRITICAL_TEMPERATURE: f64 = EFFECTIVE_COUPLING / 4.0;

/// Particle-hole symmetric chemical potential, `-z_eff / 2`.
pub const CRITICAL_CHEMICAL_POTENTIAL: f64 = -EFFECTIVE_COUPLING / 2.0;

/// Thermodynamic state point, in units where `k_B = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanFieldParams {
    pub chemical_potential: f64,
    pub temperature: f64,
}

impl MeanFieldParams {
    pub fn new(chemical_potential: f64, temperature: f64) -> Result<Self, DomainError> {
        if temperature < 0.0 {
            return Err(DomainError::NegativeTemperature(temperature));
        }
        Ok(Self {
            chemical_potential,
            temperature,
        })
    }

    pub fn beta(&self) -> Result<f64, DomainError> {
        if self.temperature < 0.0 {
            return Err(DomainError::NegativeTemperature(self.temperature));
        }
        Ok(1.0 / self.temperature)
    }
}

fn check_domain(rho: f64, beta: f64) -> Result<(), DomainError> {
    if !(0.0..=1.0).contains(&rho) {
        return Err(DomainError::UnphysicalDensity(rho));
    }
    if beta < 0.0 {
        return Err(DomainError::NegativeInverseTemperature(beta));
    }
    Ok(())
}

/// `(1 - rho) * exp(exponent)`. A fully occupied site has no holes left and
/// maps to zero however large the exponential.
fn occupation(rho: f64, exponent: f64) -> Result<f64, DomainError> {
    let holes = 1.0 - rho;
    if holes == 0.0 {
        return Ok(0.0);
    }
    let value = holes * exponent.exp();
    if value.is_nan() {
        return Err(DomainError::IndeterminateUpdate(rho));
    }
    Ok(value)
}

/// Right-hand side of the homogeneous self-consistent density equation.
pub fn homogeneous_rhs(rho: f64, beta: f64, mu: f64) -> Result<f64, DomainError> {
    check_domain(rho, beta)?;
    occupation(rho, beta * (mu + EFFECTIVE_COUPLING * rho))
}

/// `rho - rhs(rho)`; zero exactly where the grand potential is stationary.
pub fn stationarity_residual(rho: f64, beta: f64, mu: f64) -> Result<f64, DomainError> {
    Ok(rho - homogeneous_rhs(rho, beta, mu)?)
}

/// Inhomogeneous right-hand side for a single lattice site.
///
/// `nearest_sum` and `next_nearest_sum` are the summed densities of the four
/// nearest and four diagonal neighbours; `potential` is the site's external
/// potential.
pub fn site_rhs(
    rho: f64,
    nearest_sum: f64,
    next_nearest_sum: f64,
    potential: f64,
    beta: f64,
    mu: f64,
) -> Result<f64, DomainError> {
    check_domain(rho, beta)?;
    let field = mu + NEAREST_COUPLING * nearest_sum + NEXT_NEAREST_COUPLING * next_nearest_sum
        - potential;
    occupation(rho, beta * field)
}

/// Low and high spinodal densities at `temperature`, or `None` above the
/// critical temperature where the homogeneous state is always stable.
pub fn spinodal_densities(temperature: f64) -> Option<(f64, f64)> {
    let disc = 1.0 - temperature / CRITICAL_TEMPERATURE;
    if disc.is_nan() || disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    Some(((1.0 - root) / 2.0, (1.0 + root) / 2.0))
}

/// Chemical potential at which `rho` solves the homogeneous equation.
pub fn spinodal_chemical_potential(rho: f64, temperature: f64) -> f64 {
    temperature * (rho / (1.0 - rho)).ln() - EFFECTIVE_COUPLING * rho
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rhs_accepts_the_physical_domain() {
        for i in 0..=20 {
            let rho = i as f64 / 20.0;
            for beta in [0.0, 0.5, 1.0, 4.0] {
                assert!(homogeneous_rhs(rho, beta, -2.0).is_ok());
            }
        }
    }

    #[test]
    fn rhs_rejects_unphysical_density() {
        assert_eq!(
            homogeneous_rhs(-0.01, 1.0, -2.0),
            Err(DomainError::UnphysicalDensity(-0.01))
        );
        assert_eq!(
            homogeneous_rhs(1.5, 1.0, -2.0),
            Err(DomainError::UnphysicalDensity(1.5))
        );
        assert!(homogeneous_rhs(f64::NAN, 1.0, -2.0).is_err());
    }

    #[test]
    fn rhs_rejects_negative_beta_for_any_density() {
        for rho in [0.0, 0.3, 1.0] {
            assert_eq!(
                homogeneous_rhs(rho, -0.1, -2.0),
                Err(DomainError::NegativeInverseTemperature(-0.1))
            );
        }
    }

    #[test]
    fn full_occupancy_maps_to_zero_at_low_temperature() {
        // beta * (mu + z_eff) far beyond the f64 exponent range.
        assert_eq!(homogeneous_rhs(1.0, 1_000.0, 0.0), Ok(0.0));
        assert_eq!(site_rhs(1.0, 4.0, 4.0, 0.0, 250.0, -1.0), Ok(0.0));
        assert_eq!(homogeneous_rhs(0.99, 1_000.0, 0.0), Ok(f64::INFINITY));
    }

    #[test]
    fn zero_temperature_at_vanishing_field_is_indeterminate() {
        // mu + z_eff * rho == 0 and beta == inf gives inf * 0.
        assert_eq!(
            homogeneous_rhs(0.5, f64::INFINITY, CRITICAL_CHEMICAL_POTENTIAL),
            Err(DomainError::IndeterminateUpdate(0.5))
        );
    }

    #[test]
    fn negative_temperature_is_rejected() {
        assert_eq!(
            MeanFieldParams::new(-2.0, -1.0),
            Err(DomainError::NegativeTemperature(-1.0))
        );
    }

    #[test]
    fn empty_lattice_site_reduces_to_ideal_gas() {
        let rhs = site_rhs(0.0, 0.0, 0.0, 0.0, 1.0, -1.0).unwrap();
        assert!((rhs - (-1.0f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn uniform_site_matches_homogeneous_equation() {
        let rho = 0.3;
        let site = site_rhs(rho, 4.0 * rho, 4.0 * rho, 0.0, 0.8, -3.0).unwrap();
        let bulk = homogeneous_rhs(rho, 0.8, -3.0).unwrap();
        assert!((site - bulk).abs() < 1e-12);
    }

    #[test]
    fn half_filling_is_stationary_at_symmetric_point() {
        let residual = stationarity_residual(0.5, 1.0, CRITICAL_CHEMICAL_POTENTIAL).unwrap();
        assert!(residual.abs() < 1e-12);
    }

    #[test]
    fn spinodal_closes_at_critical_temperature() {
        let (low, high) = spinodal_densities(CRITICAL_TEMPERATURE).unwrap();
        assert!((low - 0.5).abs() < 1e-12);
        assert!((high - 0.5).abs() < 1e-12);
        assert!(spinodal_densities(CRITICAL_TEMPERATURE + 0.1).is_none());

        let mu = spinodal_chemical_potential(0.5, CRITICAL_TEMPERATURE);
        assert!((mu - CRITICAL_CHEMICAL_POTENTIAL).abs() < 1e-12);
    }

    #[test]
    fn spinodal_branches_are_symmetric_about_critical_mu() {
        let (low, high) = spinodal_densities(1.0).unwrap();
        let mu_low = spinodal_chemical_potential(low, 1.0);
        let mu_high = spinodal_chemical_potential(high, 1.0);
        assert!((mu_low + mu_high - 2.0 * CRITICAL_CHEMICAL_POTENTIAL).abs() < 1e-12);
    }
}
