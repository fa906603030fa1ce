//! Bulk liquid/gas coexistence from the homogeneous mean-field equation.
//!
//! A state point is single-phase when the self-consistent solution does not
//! depend on where the iteration starts. Inside the coexistence band the
//! low- and high-density starting guesses land on different branches.

use crate::error::DomainError;
use crate::fixed_point::{solve_fixed_point, Bounds, FixedPointResult, FixedPointSettings};
use crate::mean_field::{homogeneous_rhs, MeanFieldParams};
use anyhow::{bail, Context, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoexistenceSettings {
    /// Gas-side starting density.
    pub low_guess: f64,
    /// Liquid-side starting density.
    pub high_guess: f64,
    /// Branches further apart than this count as distinct phases.
    pub threshold: f64,
    pub solver: FixedPointSettings,
}

impl Default for CoexistenceSettings {
    fn default() -> Self {
        Self {
            low_guess: 0.05,
            high_guess: 0.95,
            threshold: 0.1,
            solver: FixedPointSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BulkPhase {
    Single { density: f64 },
    Coexistence { low: f64, high: f64 },
}

impl BulkPhase {
    /// The unique bulk density, or `None` inside the coexistence band.
    pub fn density(&self) -> Option<f64> {
        match self {
            BulkPhase::Single { density } => Some(*density),
            BulkPhase::Coexistence { .. } => None,
        }
    }
}

fn bulk_rhs(rho: f64, params: &MeanFieldParams) -> Result<f64, DomainError> {
    homogeneous_rhs(rho, params.beta()?, params.chemical_potential)
}

/// Solves the homogeneous equation from a single starting density.
pub fn solve_bulk(
    initial: f64,
    params: MeanFieldParams,
    settings: FixedPointSettings,
) -> Result<FixedPointResult> {
    solve_fixed_point(initial, bulk_rhs, &params, Bounds::UNIT, settings)
}

/// Classifies a state point by solving from both starting guesses.
pub fn classify_bulk(params: MeanFieldParams, settings: CoexistenceSettings) -> Result<BulkPhase> {
    if !(settings.threshold > 0.0) {
        bail!("threshold must be positive, got {}.", settings.threshold);
    }
    let low = solve_bulk(settings.low_guess, params, settings.solver)?.value;
    let high = solve_bulk(settings.high_guess, params, settings.solver)?.value;

    if (high - low).abs() > settings.threshold {
        debug!(low, high, ?params, "coexisting branches");
        Ok(BulkPhase::Coexistence { low, high })
    } else {
        Ok(BulkPhase::Single {
            density: 0.5 * (low + high),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDiagram {
    pub chemical_potentials: Vec<f64>,
    pub temperatures: Vec<f64>,
    /// Indexed `(temperature, chemical potential)`; `None` marks coexistence.
    pub density: DMatrix<Option<f64>>,
}

impl PhaseDiagram {
    pub fn coexisting_points(&self) -> usize {
        self.density.iter().filter(|d| d.is_none()).count()
    }
}

/// Evaluates [`classify_bulk`] on every `(temperature, chemical potential)` pair.
pub fn phase_diagram(
    chemical_potentials: &[f64],
    temperatures: &[f64],
    settings: CoexistenceSettings,
) -> Result<PhaseDiagram> {
    let rows = temperatures.len();
    let cols = chemical_potentials.len();

    let cells = (0..rows * cols)
        .into_par_iter()
        .map(|cell| -> Result<Option<f64>> {
            let (t, m) = (temperatures[cell / cols], chemical_potentials[cell % cols]);
            let params = MeanFieldParams::new(m, t)?;
            let phase = classify_bulk(params, settings)
                .with_context(|| format!("Failed to classify state point (T={t}, mu={m})."))?;
            Ok(phase.density())
        })
        .collect::<Result<Vec<Option<f64>>>>()?;

    Ok(PhaseDiagram {
        chemical_potentials: chemical_potentials.to_vec(),
        temperatures: temperatures.to_vec(),
        density: DMatrix::from_row_slice(rows, cols, &cells),
    })
}

/// `n` evenly spaced samples from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
