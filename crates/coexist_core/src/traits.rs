use nalgebra::{Vector2, Vector4};

/// Reduced dynamical state of a planar body: `(x, y, vx, vy)`.
pub type PhasePoint = Vector4<f64>;

/// Right-hand side of a body's equations of motion.
pub trait ForceLaw {
    /// Time derivative of the reduced state evaluated at `phase`.
    fn derivative(&self, phase: &PhasePoint) -> PhasePoint;
}

/// One scalar law per component, `[f_x, f_y, f_vx, f_vy]`.
impl<F: Fn(&PhasePoint) -> f64> ForceLaw for [F; 4] {
    fn derivative(&self, phase: &PhasePoint) -> PhasePoint {
        PhasePoint::new(
            (self[0])(phase),
            (self[1])(phase),
            (self[2])(phase),
            (self[3])(phase),
        )
    }
}

/// Acceleration felt by a body at a given position.
pub trait Acceleration {
    /// Acceleration at `position`, per unit mass of the body feeling it.
    fn acceleration(&self, position: &Vector2<f64>) -> Vector2<f64>;
}

/// Superposition of two fields.
impl<A: Acceleration, B: Acceleration> Acceleration for (A, B) {
    fn acceleration(&self, position: &Vector2<f64>) -> Vector2<f64> {
        self.0.acceleration(position) + self.1.acceleration(position)
    }
}

/// Newtonian kinematics over an acceleration field: `dx/dt = v`, `dv/dt = a(x)`.
#[derive(Debug, Clone, Copy)]
pub struct Kinematics<A>(pub A);

impl<A: Acceleration> ForceLaw for Kinematics<A> {
    fn derivative(&self, phase: &PhasePoint) -> PhasePoint {
        let a = self.0.acceleration(&Vector2::new(phase[0], phase[1]));
        PhasePoint::new(phase[2], phase[3], a.x, a.y)
    }
}
