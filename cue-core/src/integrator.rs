//! Four-stage numerical integration for advancing body state in time.
//!
//! ## Algorithm
//!
//! Given position x, velocity v, and an acceleration field a(x, v, t), one step
//! samples four derivatives and blends them with weights 1-2-2-1:
//!
//! ```text
//! k1 = (v,              a(x, v, t))
//! k2 = (v + k1.a·dt/2,  a(x + k1.v·dt/2, v + k1.a·dt/2, t + dt/2))
//! k3 = (v + k2.a·dt/2,  a(x + k2.v·dt/2, v + k2.a·dt/2, t + dt/2))
//! k4 = (v + k3.a·dt,    a(x + k3.v·dt,   v + k3.a·dt,   t + dt))
//! x' = x + dt/6 · (k1.v + 2·k2.v + 2·k3.v + k4.v)
//! v' = v + dt/6 · (k1.a + 2·k2.a + 2·k3.a + k4.a)
//! ```
//!
//! Bodies integrate with [`ConstantAcceleration`]: their accumulated force is
//! held fixed for the whole sub-step, so every stage sees the same
//! acceleration and the blend reduces to `x' = x + v·dt + a·dt²/2`.

use crate::types::Vec3;

/// Position/velocity pair advanced by the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Kinematics {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self { position, velocity }
    }
}

/// Result of an integration step, containing the new state and metadata.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationResult {
    pub state: Kinematics,
    /// Average velocity over the step (`displacement / dt`).
    pub mean_velocity: Vec3,
}

/// Source of accelerations for the integrator.
pub trait AccelerationField {
    /// Acceleration at `state`, `t` seconds into the step.
    fn acceleration(&self, state: &Kinematics, t: f64) -> Vec3;
}

/// Acceleration that does not depend on state or time.
#[derive(Debug, Clone, Copy)]
pub struct ConstantAcceleration(pub Vec3);

impl AccelerationField for ConstantAcceleration {
    fn acceleration(&self, _state: &Kinematics, _t: f64) -> Vec3 {
        self.0
    }
}

/// Classical four-stage (RK4) integrator.
pub struct FourStage;

impl FourStage {
    /// Advance `state` by one step of `dt` seconds.
    pub fn step<F: AccelerationField>(state: &Kinematics, field: &F, dt: f64) -> IntegrationResult {
        let half = 0.5 * dt;
        let x = state.position;
        let v = state.velocity;

        let k1v = v;
        let k1a = field.acceleration(state, 0.0);

        let k2v = v + k1a * half;
        let k2a = field.acceleration(&Kinematics::new(x + k1v * half, k2v), half);

        let k3v = v + k2a * half;
        let k3a = field.acceleration(&Kinematics::new(x + k2v * half, k3v), half);

        let k4v = v + k3a * dt;
        let k4a = field.acceleration(&Kinematics::new(x + k3v * dt, k4v), dt);

        let mean_velocity = (k1v + k2v * 2.0 + k3v * 2.0 + k4v) / 6.0;
        let acceleration = (k1a + k2a * 2.0 + k3a * 2.0 + k4a) / 6.0;

        IntegrationResult {
            state: Kinematics::new(x + mean_velocity * dt, v + acceleration * dt),
            mean_velocity,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
