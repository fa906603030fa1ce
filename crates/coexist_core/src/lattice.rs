//! Inhomogeneous mean-field density on a periodic square lattice.
//!
//! Sites live in an arena indexed by `k = Lx * y + x`. Each site carries a
//! precomputed adjacency table of four nearest neighbours and four diagonal
//! next-nearest neighbours, built once with periodic wraparound.
//!
//! A sweep is a synchronous update: every candidate density is computed from
//! the frozen previous densities, then all sites commit together.

use crate::error::DomainError;
use crate::fixed_point::{damped_update, Bounds, FixedPointSettings};
use crate::mean_field::{site_rhs, MeanFieldParams, COORDINATION};
use anyhow::{bail, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const NEAREST_OFFSETS: [(isize, isize); COORDINATION] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONAL_OFFSETS: [(isize, isize); COORDINATION] = [(1, 1), (-1, -1), (1, -1), (-1, 1)];

/// Damping and stopping policy for the lattice iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeSettings {
    pub mixing: f64,
    /// Bound on the Euclidean norm of the per-site change over one sweep.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for LatticeSettings {
    fn default() -> Self {
        Self {
            mixing: 0.1,
            tolerance: 1e-8,
            max_iterations: 1_000,
        }
    }
}

impl From<LatticeSettings> for FixedPointSettings {
    fn from(value: LatticeSettings) -> Self {
        Self {
            mixing: value.mixing,
            tolerance: value.tolerance,
            max_iterations: value.max_iterations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeSite {
    pub index: usize,
    pub coordinate: (usize, usize),
    pub nearest: [usize; COORDINATION],
    pub next_nearest: [usize; COORDINATION],
    pub potential: f64,
    pub density_current: f64,
    pub density_previous: f64,
}

impl LatticeSite {
    /// Moves the candidate density into the previous slot, clamped into `bounds`.
    ///
    /// A density sitting exactly on a bound stays there.
    fn commit(&mut self, bounds: Bounds) {
        let (density, _) = bounds.saturate(self.density_current);
        self.density_previous = density;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    lx: usize,
    ly: usize,
    sites: Vec<LatticeSite>,
}

impl Lattice {
    /// Builds an `lx * ly` periodic lattice with every site seeded at `seed_density`.
    ///
    /// The seed selects the branch found inside the coexistence region; a
    /// low value such as 0.2 lands on the gas side.
    pub fn new(lx: usize, ly: usize, seed_density: f64) -> Result<Self> {
        if lx == 0 || ly == 0 {
            bail!("Lattice dimensions must be positive, got {lx} x {ly}.");
        }
        if !(0.0..=1.0).contains(&seed_density) {
            return Err(DomainError::UnphysicalDensity(seed_density).into());
        }

        let wrap = |x: usize, y: usize, (dx, dy): (isize, isize)| {
            let nx = (x as isize + dx).rem_euclid(lx as isize) as usize;
            let ny = (y as isize + dy).rem_euclid(ly as isize) as usize;
            lx * ny + nx
        };

        let sites = (0..lx * ly)
            .map(|index| {
                let (x, y) = (index % lx, index / lx);
                LatticeSite {
                    index,
                    coordinate: (x, y),
                    nearest: NEAREST_OFFSETS.map(|offset| wrap(x, y, offset)),
                    next_nearest: DIAGONAL_OFFSETS.map(|offset| wrap(x, y, offset)),
                    potential: 0.0,
                    density_current: seed_density,
                    density_previous: seed_density,
                }
            })
            .collect();

        Ok(Self { lx, ly, sites })
    }

    /// Assigns each site's external potential from its coordinate.
    pub fn with_potential(mut self, potential: impl Fn(usize, usize) -> f64) -> Self {
        for site in &mut self.sites {
            let (x, y) = site.coordinate;
            site.potential = potential(x, y);
        }
        self
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.lx, self.ly)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn index(&self, x: usize, y: usize) -> usize {
        self.lx * (y % self.ly) + (x % self.lx)
    }

    pub fn site(&self, x: usize, y: usize) -> &LatticeSite {
        &self.sites[self.index(x, y)]
    }

    pub fn sites(&self) -> &[LatticeSite] {
        &self.sites
    }

    /// Committed densities reshaped row-major into an `Lx x Ly` grid, so
    /// entry `(i, j)` holds site `i * Ly + j`.
    pub fn density_grid(&self) -> DMatrix<f64> {
        let densities: Vec<f64> = self.sites.iter().map(|s| s.density_previous).collect();
        DMatrix::from_row_slice(self.lx, self.ly, &densities)
    }

    /// Committed density at lattice coordinate `(x, y)`.
    pub fn density_at(&self, x: usize, y: usize) -> f64 {
        self.site(x, y).density_previous
    }

    /// Computes every site's candidate density from the frozen previous
    /// densities and returns the Euclidean norm of the change.
    fn sweep(&mut self, beta: f64, mu: f64, mixing: f64) -> Result<f64, DomainError> {
        let previous: Vec<f64> = self.sites.iter().map(|s| s.density_previous).collect();

        let candidates = self
            .sites
            .par_iter()
            .map(|site| -> Result<f64, DomainError> {
                let nearest_sum: f64 = site.nearest.iter().map(|&j| previous[j]).sum();
                let next_sum: f64 = site.next_nearest.iter().map(|&j| previous[j]).sum();
                let rho = previous[site.index];
                let mapped = site_rhs(rho, nearest_sum, next_sum, site.potential, beta, mu)?;
                Ok(damped_update(rho, mapped, mixing))
            })
            .collect::<Result<Vec<f64>, DomainError>>()?;

        let mut norm2 = 0.0;
        for (site, candidate) in self.sites.iter_mut().zip(candidates) {
            norm2 += (candidate - site.density_previous).powi(2);
            site.density_current = candidate;
        }
        Ok(norm2.sqrt())
    }

    fn commit(&mut self) {
        for site in &mut self.sites {
            site.commit(Bounds::UNIT);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeSolution {
    /// Steady-state density in site order, reshaped row-major to `Lx x Ly`.
    pub density: DMatrix<f64>,
    pub converged: bool,
    pub iterations: usize,
    /// Norm of the per-site change on the final sweep.
    pub residual: f64,
}

impl LatticeSolution {
    /// Largest spread between any two site densities.
    pub fn spread(&self) -> f64 {
        self.density.max() - self.density.min()
    }
}

/// Iterates the lattice to a self-consistent density field.
///
/// Runs synchronous sweeps until the change norm drops below the tolerance
/// or the iteration cap is hit, committing and clamping every site into
/// [0, 1] after each sweep. Hitting the cap is reported through
/// `converged == false` and a warning.
pub fn run_lattice_mean_field(
    lattice: &mut Lattice,
    params: MeanFieldParams,
    settings: LatticeSettings,
) -> Result<LatticeSolution> {
    FixedPointSettings::from(settings).validate()?;
    let beta = params.beta()?;

    let mut residual = f64::INFINITY;
    let mut iterations = 0usize;
    while residual > settings.tolerance && iterations < settings.max_iterations {
        residual = lattice.sweep(beta, params.chemical_potential, settings.mixing)?;
        iterations += 1;
        lattice.commit();
    }

    let converged = residual <= settings.tolerance;
    if converged {
        debug!(iterations, residual, ?params, "lattice mean-field converged");
    } else {
        warn!(
            iterations,
            residual,
            mixing = settings.mixing,
            tolerance = settings.tolerance,
            ?params,
            "lattice mean-field did not converge"
        );
    }

    Ok(LatticeSolution {
        density: lattice.density_grid(),
        converged,
        iterations,
        residual,
    })
}
