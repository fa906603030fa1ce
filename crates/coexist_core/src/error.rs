use thiserror::Error;

/// Unphysical inputs rejected by the model equations.
///
/// These signal a caller bug and are never recovered inside a solve.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DomainError {
    /// Occupation density left the closed interval [0, 1].
    #[error("density {0} is unphysical (expected 0 <= rho <= 1)")]
    UnphysicalDensity(f64),
    #[error("temperature {0} is negative")]
    NegativeTemperature(f64),
    #[error("inverse temperature {0} is negative")]
    NegativeInverseTemperature(f64),
    /// The update rule evaluated to NaN, e.g. `0 * inf` in the zero-temperature limit.
    #[error("update at density {0} is indeterminate")]
    IndeterminateUpdate(f64),
    #[error("body mass {0} must be strictly positive")]
    NonPositiveMass(f64),
}
