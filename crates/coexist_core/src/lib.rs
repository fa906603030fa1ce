//! The `coexist_core` crate provides the numerical primitives behind the
//! lattice-gas phase diagram and planar gravitational orbit studies.
//!
//! Key components:
//! - **Fixed point**: damped self-consistent iteration with physical bound clamping.
//! - **Mean field**: homogeneous and per-site lattice-gas equations, analytic spinodal.
//! - **Coexistence**: bulk phase classification and phase-diagram sweeps.
//! - **Lattice**: synchronous mean-field iteration on a periodic square lattice.
//! - **Solvers / N-body**: stateless RK4 steps and gravitating bodies with explicit commit.
pub mod coexistence;
pub mod error;
pub mod fixed_point;
pub mod lattice;
pub mod mean_field;
pub mod nbody;
pub mod solvers;
pub mod traits;

pub use error::DomainError;
