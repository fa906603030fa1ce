//! Planar gravitational bodies stepped with RK4.
//!
//! Stepping never mutates a body: [`Body::propagate`] and friends return a
//! [`Step`] candidate and the caller commits it with [`Body::commit`]. This
//! leaves room to inspect a candidate (apsis detection, energy checks) before
//! accepting it.
//!
//! In a multi-body system every body's candidate is computed against a frozen
//! snapshot of the others taken at the start of the step. Other bodies are
//! not re-evaluated at the RK4 sub-steps, which is accurate for small steps.

use crate::error::DomainError;
use crate::solvers::{rk4_step, Step};
use crate::traits::{Acceleration, ForceLaw, Kinematics, PhasePoint};
use anyhow::{bail, Result};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Time-stamped reduced state of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub time: f64,
    pub phase: PhasePoint,
}

impl BodyState {
    pub fn new(time: f64, position: Vector2<f64>, velocity: Vector2<f64>) -> Self {
        Self {
            time,
            phase: PhasePoint::new(position.x, position.y, velocity.x, velocity.y),
        }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.phase[0], self.phase[1])
    }

    pub fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.phase[2], self.phase[3])
    }
}

/// Read-only view of another body as a source of gravity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attractor {
    pub position: Vector2<f64>,
    pub mass: f64,
}

/// Newtonian gravity from a set of point masses, in units where `G = 1`.
///
/// Each source contributes `-M * dr / |dr|^3` with `dr` the separation from
/// the source to the evaluation point.
#[derive(Debug, Clone, Copy)]
pub struct Gravity<'a> {
    sources: &'a [Attractor],
    /// Plummer softening, squared. Zero for exact point masses.
    softening2: f64,
}

impl<'a> Gravity<'a> {
    pub fn new(sources: &'a [Attractor]) -> Self {
        Self {
            sources,
            softening2: 0.0,
        }
    }

    pub fn with_softening(mut self, softening2: f64) -> Self {
        self.softening2 = softening2;
        self
    }
}

impl Acceleration for Gravity<'_> {
    fn acceleration(&self, position: &Vector2<f64>) -> Vector2<f64> {
        self.sources
            .iter()
            .fold(Vector2::zeros(), |acc, source| {
                let dr = position - source.position;
                let r2 = dr.norm_squared() + self.softening2;
                acc - dr * (source.mass / (r2 * r2.sqrt()))
            })
    }
}

/// Spatially uniform acceleration, e.g. a constant thrust or field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformField(pub Vector2<f64>);

impl Acceleration for UniformField {
    fn acceleration(&self, _position: &Vector2<f64>) -> Vector2<f64> {
        self.0
    }
}

/// Adapts a closure into an [`Acceleration`].
#[derive(Debug, Clone, Copy)]
pub struct FieldFn<F>(pub F);

impl<F: Fn(&Vector2<f64>) -> Vector2<f64>> Acceleration for FieldFn<F> {
    fn acceleration(&self, position: &Vector2<f64>) -> Vector2<f64> {
        (self.0)(position)
    }
}

/// A massive body with exclusively owned state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    state: BodyState,
    mass: f64,
}

impl Body {
    pub fn new(state: BodyState, mass: f64) -> Result<Self, DomainError> {
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(DomainError::NonPositiveMass(mass));
        }
        Ok(Self { state, mass })
    }

    pub fn state(&self) -> &BodyState {
        &self.state
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn position(&self) -> Vector2<f64> {
        self.state.position()
    }

    pub fn velocity(&self) -> Vector2<f64> {
        self.state.velocity()
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity().norm_squared()
    }

    pub fn as_attractor(&self) -> Attractor {
        Attractor {
            position: self.position(),
            mass: self.mass,
        }
    }

    /// Candidate next state under an arbitrary force law.
    pub fn propagate<L: ForceLaw + ?Sized>(&self, law: &L, dx: f64) -> Step {
        rk4_step(&self.state, law, dx)
    }

    /// Candidate next state under the gravity of `others`.
    ///
    /// `others` must not include this body.
    pub fn propagate_multi(&self, others: &[Attractor], dx: f64) -> Step {
        self.propagate(&Kinematics(Gravity::new(others)), dx)
    }

    /// As [`Body::propagate_multi`], plus an external acceleration field.
    pub fn propagate_multi_with<A: Acceleration>(
        &self,
        others: &[Attractor],
        external: A,
        dx: f64,
    ) -> Step {
        self.propagate(&Kinematics((Gravity::new(others), external)), dx)
    }

    /// Accepts a candidate produced by one of the `propagate` methods.
    pub fn commit(&mut self, step: &Step) {
        self.state = step.next;
    }

    /// Propagates and commits in one go.
    pub fn advance<L: ForceLaw + ?Sized>(&mut self, law: &L, dx: f64) -> Step {
        let step = self.propagate(law, dx);
        self.commit(&step);
        step
    }
}

/// Mutually gravitating bodies advanced in lock-step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NBodySystem {
    pub bodies: Vec<Body>,
    /// Squared softening length applied to every pairwise interaction.
    #[serde(default)]
    pub softening2: f64,
}

impl NBodySystem {
    pub fn new(bodies: Vec<Body>) -> Self {
        Self {
            bodies,
            softening2: 0.0,
        }
    }

    /// Gravity sources seen by body `index`: every body except itself.
    pub fn others(&self, index: usize) -> Vec<Attractor> {
        self.bodies
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != index)
            .map(|(_, b)| b.as_attractor())
            .collect()
    }

    /// Candidates for every body, all computed from the current snapshot.
    pub fn propagate_all(&self, dx: f64) -> Vec<Step> {
        (0..self.bodies.len())
            .map(|i| {
                let others = self.others(i);
                let law = Kinematics(Gravity::new(&others).with_softening(self.softening2));
                self.bodies[i].propagate(&law, dx)
            })
            .collect()
    }

    pub fn commit_all(&mut self, steps: &[Step]) -> Result<()> {
        if steps.len() != self.bodies.len() {
            bail!(
                "Step count mismatch. Expected {}, got {}.",
                self.bodies.len(),
                steps.len()
            );
        }
        for (body, step) in self.bodies.iter_mut().zip(steps) {
            body.commit(step);
        }
        Ok(())
    }

    pub fn center_of_mass(&self) -> Vector2<f64> {
        let total: f64 = self.bodies.iter().map(Body::mass).sum();
        if total <= 0.0 {
            return Vector2::zeros();
        }
        self.bodies
            .iter()
            .fold(Vector2::zeros(), |acc, b| acc + b.position() * b.mass())
            / total
    }

    /// Kinetic plus pairwise potential energy.
    pub fn total_energy(&self) -> f64 {
        let kinetic: f64 = self.bodies.iter().map(Body::kinetic_energy).sum();
        let mut potential = 0.0;
        for (i, a) in self.bodies.iter().enumerate() {
            for b in &self.bodies[i + 1..] {
                let r2 = (a.position() - b.position()).norm_squared() + self.softening2;
                potential -= a.mass() * b.mass() / r2.sqrt();
            }
        }
        kinetic + potential
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApsisKind {
    Periapsis,
    Apoapsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Apsis {
    pub kind: ApsisKind,
    /// Candidate state at which the turning point was detected.
    pub state: BodyState,
    pub distance: f64,
}

/// Detects turning points of the distance to a fixed centre.
///
/// A periapsis is reported when the radial velocity changes sign from
/// inward to outward between the committed state and the candidate; an
/// apoapsis for the reverse. Resolution is one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApsisDetector {
    pub center: Vector2<f64>,
    pub periapses: usize,
    pub apoapses: usize,
}

impl ApsisDetector {
    pub fn new(center: Vector2<f64>) -> Self {
        Self {
            center,
            periapses: 0,
            apoapses: 0,
        }
    }

    fn radial_rate(&self, state: &BodyState) -> f64 {
        (state.position() - self.center).dot(&state.velocity())
    }

    pub fn observe(&mut self, current: &BodyState, candidate: &BodyState) -> Option<Apsis> {
        let before = self.radial_rate(current);
        let after = self.radial_rate(candidate);
        let kind = if before < 0.0 && after >= 0.0 {
            self.periapses += 1;
            ApsisKind::Periapsis
        } else if before > 0.0 && after <= 0.0 {
            self.apoapses += 1;
            ApsisKind::Apoapsis
        } else {
            return None;
        };
        Some(Apsis {
            kind,
            state: *candidate,
            distance: (candidate.position() - self.center).norm(),
        })
    }
}

/// Orbital period of a Keplerian ellipse, `2π sqrt(a³ / GM)`.
pub fn keplerian_period(semi_major_axis: f64, gm: f64) -> f64 {
    2.0 * PI * (semi_major_axis.powi(3) / gm).sqrt()
}

/// Semi-major axis of a bound orbit from its vis-viva energy, `None` if unbound.
pub fn semi_major_axis(distance: f64, speed: f64, gm: f64) -> Option<f64> {
    let energy = 0.5 * speed * speed - gm / distance;
    if energy < 0.0 {
        Some(-gm / (2.0 * energy))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sun() -> [Attractor; 1] {
        [Attractor {
            position: Vector2::zeros(),
            mass: 1.0,
        }]
    }

    #[test]
    fn rejects_non_positive_mass() {
        let state = BodyState::new(0.0, Vector2::zeros(), Vector2::zeros());
        assert_eq!(Body::new(state, 0.0), Err(DomainError::NonPositiveMass(0.0)));
        assert_eq!(Body::new(state, -2.0), Err(DomainError::NonPositiveMass(-2.0)));
        assert!(Body::new(state, f64::NAN).is_err());
    }

    #[test]
    fn propagate_leaves_commit_to_the_caller() {
        let state = BodyState::new(0.0, Vector2::new(7.0, 0.0), Vector2::new(0.0, 0.36));
        let mut body = Body::new(state, 1.0).unwrap();
        let step = body.propagate_multi(&sun(), 1e-2);
        assert_eq!(*body.state(), state);
        assert_eq!(step.dx, 1e-2);

        body.commit(&step);
        assert_eq!(*body.state(), step.next);
        assert!((body.state().time - 1e-2).abs() < 1e-15);
    }

    #[test]
    fn kinetic_energy_uses_speed() {
        let state = BodyState::new(0.0, Vector2::zeros(), Vector2::new(3.0, 4.0));
        let body = Body::new(state, 2.0).unwrap();
        assert!((body.kinetic_energy() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn gravity_points_toward_source() {
        let sources = sun();
        let a = Gravity::new(&sources).acceleration(&Vector2::new(2.0, 0.0));
        assert!((a.x + 0.25).abs() < 1e-15);
        assert_eq!(a.y, 0.0);
    }

    #[test]
    fn circular_orbit_closes_after_one_period() {
        let start = Vector2::new(1.0, 0.0);
        let state = BodyState::new(0.0, start, Vector2::new(0.0, 1.0));
        let mut body = Body::new(state, 1e-6).unwrap();
        let sources = sun();
        let law = Kinematics(Gravity::new(&sources));

        let period = keplerian_period(1.0, 1.0);
        let steps = 20_000;
        let dx = period / steps as f64;
        for _ in 0..steps {
            body.advance(&law, dx);
        }
        assert!((body.position() - start).norm() < 1e-6);
        assert!((body.state().time - period).abs() < 1e-9);
    }

    #[test]
    fn periapses_recur_at_the_keplerian_period() {
        let state = BodyState::new(0.0, Vector2::new(7.0, 0.0), Vector2::new(0.0, 0.36));
        let mut body = Body::new(state, 1.0).unwrap();
        let sources = sun();
        let a = semi_major_axis(7.0, 0.36, 1.0).unwrap();
        let period = keplerian_period(a, 1.0);

        let mut detector = ApsisDetector::new(Vector2::zeros());
        let mut periapses = Vec::new();
        let dx = 1e-2;
        while periapses.len() < 2 {
            let step = body.propagate_multi(&sources, dx);
            if let Some(apsis) = detector.observe(body.state(), &step.next) {
                if apsis.kind == ApsisKind::Periapsis {
                    periapses.push(apsis);
                }
            }
            body.commit(&step);
            assert!(body.state().time < 3.0 * period, "no periapsis found");
        }

        // Starts at apoapsis, so the first periapsis is half a period in.
        assert!((periapses[0].state.time - 0.5 * period).abs() < 0.05);
        assert!((periapses[1].state.time - periapses[0].state.time - period).abs() < 0.05);
        assert!((periapses[0].distance - (2.0 * a - 7.0)).abs() < 1e-3);
        assert_eq!(detector.periapses, 2);
        assert_eq!(detector.apoapses, 1);
    }

    #[test]
    fn equal_masses_stay_symmetric_about_center_of_mass() {
        let a = Body::new(
            BodyState::new(0.0, Vector2::new(-1.0, 0.0), Vector2::new(0.0, -0.4)),
            1.0,
        )
        .unwrap();
        let b = Body::new(
            BodyState::new(0.0, Vector2::new(1.0, 0.0), Vector2::new(0.0, 0.4)),
            1.0,
        )
        .unwrap();
        let mut system = NBodySystem::new(vec![a, b]);
        let energy = system.total_energy();

        for _ in 0..2_000 {
            let steps = system.propagate_all(1e-3);
            system.commit_all(&steps).unwrap();
            let sum = system.bodies[0].position() + system.bodies[1].position();
            assert!(sum.norm() < 1e-9);
            assert!(system.center_of_mass().norm() < 1e-9);
        }
        assert!((system.total_energy() - energy).abs() < 1e-3);
    }

    #[test]
    fn lone_body_in_system_feels_no_force() {
        let body = Body::new(
            BodyState::new(0.0, Vector2::new(1.0, 2.0), Vector2::new(0.5, 0.0)),
            3.0,
        )
        .unwrap();
        let mut system = NBodySystem::new(vec![body]);
        let steps = system.propagate_all(2.0);
        system.commit_all(&steps).unwrap();
        let moved = system.bodies[0].position();
        assert!((moved - Vector2::new(2.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn commit_all_rejects_mismatched_steps() {
        let body = Body::new(BodyState::new(0.0, Vector2::zeros(), Vector2::zeros()), 1.0).unwrap();
        let mut system = NBodySystem::new(vec![body, body]);
        let steps = vec![body.propagate(&[|_: &PhasePoint| 0.0; 4], 1.0)];
        let err = system.commit_all(&steps).expect_err("expected mismatch");
        assert!(format!("{err}").contains("Step count mismatch"));
    }

    #[test]
    fn external_field_adds_to_gravity() {
        let state = BodyState::new(0.0, Vector2::zeros(), Vector2::zeros());
        let body = Body::new(state, 1.0).unwrap();
        let push = UniformField(Vector2::new(0.0, -2.0));
        let step = body.propagate_multi_with(&[], push, 1.0);
        assert!((step.next.position() - Vector2::new(0.0, -1.0)).norm() < 1e-12);
        assert!((step.next.velocity() - Vector2::new(0.0, -2.0)).norm() < 1e-12);

        let drag = FieldFn(|p: &Vector2<f64>| -p);
        let sources = sun();
        let step = body.propagate_multi_with(&sources[..0], drag, 0.1);
        assert_eq!(step.next.position(), Vector2::zeros());
    }
}
