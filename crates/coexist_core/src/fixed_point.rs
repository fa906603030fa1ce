use crate::error::DomainError;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, warn};

/// Damping and stopping policy shared by the scalar and lattice solvers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedPointSettings {
    /// Fraction of the freshly evaluated right-hand side blended into each update.
    pub mixing: f64,
    /// Largest absolute change between successive iterates accepted as converged.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for FixedPointSettings {
    fn default() -> Self {
        Self {
            mixing: 0.01,
            tolerance: 1e-6,
            max_iterations: 10_000,
        }
    }
}

impl FixedPointSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.mixing > 0.0 && self.mixing <= 1.0) {
            bail!("mixing must lie in (0, 1], got {}.", self.mixing);
        }
        if !(self.tolerance > 0.0) {
            bail!("tolerance must be positive, got {}.", self.tolerance);
        }
        if self.max_iterations == 0 {
            bail!("max_iterations must be greater than zero.");
        }
        Ok(())
    }
}

/// Closed interval a physical quantity is allowed to occupy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::UNIT
    }
}

impl Bounds {
    /// Occupation densities: empty to fully occupied.
    pub const UNIT: Bounds = Bounds {
        lower: 0.0,
        upper: 1.0,
    };

    pub fn validate(&self) -> Result<()> {
        if !(self.lower <= self.upper) {
            bail!(
                "Lower bound {} must not exceed upper bound {}.",
                self.lower,
                self.upper
            );
        }
        Ok(())
    }

    /// Clamps `value` into the interval, reporting which side it crossed.
    ///
    /// Infinities clamp like any other out-of-range value. NaN compares false
    /// against both bounds and passes through, so callers reject it first.
    pub fn saturate(&self, value: f64) -> (f64, Option<Saturation>) {
        if value > self.upper {
            (self.upper, Some(Saturation::Upper))
        } else if value < self.lower {
            (self.lower, Some(Saturation::Lower))
        } else {
            (value, None)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Saturation {
    Lower,
    Upper,
}

/// Why the iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Successive iterates differ by less than the tolerance.
    Tolerance,
    /// An iterate ran past a physical bound and was pinned to it.
    Saturated(Saturation),
    /// The iteration cap was reached first.
    IterationCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedPointResult {
    pub value: f64,
    pub converged: bool,
    pub iterations: usize,
    /// Last absolute change between iterates.
    pub change: f64,
    pub termination: Termination,
}

/// One damped update, `(1 - mixing) * x + mixing * f(x)`.
pub fn damped_update(current: f64, mapped: f64, mixing: f64) -> f64 {
    (1.0 - mixing) * current + mixing * mapped
}

/// Solves `x = rhs(x, params)` by damped fixed-point iteration.
///
/// An iterate that leaves `bounds` is clamped to the crossed bound and ends
/// the iteration as converged. Exhausting `max_iterations` is not an error:
/// the last iterate comes back with `converged == false` and a warning is
/// logged with the parameters used. Domain violations raised by `rhs`
/// propagate unchanged, and an update that evaluates to NaN fails with
/// [`DomainError::IndeterminateUpdate`].
pub fn solve_fixed_point<P, F>(
    initial: f64,
    rhs: F,
    params: &P,
    bounds: Bounds,
    settings: FixedPointSettings,
) -> Result<FixedPointResult>
where
    P: Debug + ?Sized,
    F: Fn(f64, &P) -> Result<f64, DomainError>,
{
    settings.validate()?;
    bounds.validate()?;

    let mut value = initial;
    let mut change = f64::INFINITY;
    let mut iterations = 0usize;

    while change > settings.tolerance && iterations < settings.max_iterations {
        let next = damped_update(value, rhs(value, params)?, settings.mixing);
        if next.is_nan() {
            return Err(DomainError::IndeterminateUpdate(value).into());
        }
        change = (next - value).abs();
        iterations += 1;

        let (clamped, saturation) = bounds.saturate(next);
        value = clamped;
        if let Some(side) = saturation {
            debug!(iterations, ?side, ?params, "fixed-point iterate saturated at bound");
            return Ok(FixedPointResult {
                value,
                converged: true,
                iterations,
                change,
                termination: Termination::Saturated(side),
            });
        }
    }

    if change <= settings.tolerance {
        return Ok(FixedPointResult {
            value,
            converged: true,
            iterations,
            change,
            termination: Termination::Tolerance,
        });
    }

    warn!(
        iterations,
        change,
        mixing = settings.mixing,
        tolerance = settings.tolerance,
        ?params,
        "fixed-point iteration did not converge"
    );
    Ok(FixedPointResult {
        value,
        converged: false,
        iterations,
        change,
        termination: Termination::IterationCap,
    })
}
