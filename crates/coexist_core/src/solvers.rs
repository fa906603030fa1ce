use crate::nbody::BodyState;
use crate::traits::ForceLaw;
use serde::{Deserialize, Serialize};

/// Candidate produced by one integration step, not yet committed to a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub next: BodyState,
    /// Step size that produced `next`.
    pub dx: f64,
}

/// Classic Runge-Kutta 4th order step.
///
/// Pure: `state` is left untouched and the caller decides whether to commit
/// the returned candidate. Time advances by exactly `dx`.
pub fn rk4_step<L: ForceLaw + ?Sized>(state: &BodyState, law: &L, dx: f64) -> Step {
    let y = state.phase;
    let half = 0.5 * dx;

    // k1 = f(y)
    let k1 = law.derivative(&y);
    // k2 = f(y + dx*k1/2)
    let k2 = law.derivative(&(y + k1 * half));
    // k3 = f(y + dx*k2/2)
    let k3 = law.derivative(&(y + k2 * half));
    // k4 = f(y + dx*k3)
    let k4 = law.derivative(&(y + k3 * dx));

    // y_next = y + dx/6 * (k1 + 2k2 + 2k3 + k4)
    let phase = y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dx / 6.0);

    Step {
        next: BodyState {
            time: state.time + dx,
            phase,
        },
        dx,
    }
}
