//! Vehicle physics: tuning, the per-step integrator, and the movement
//! component that owns a vehicle's velocity and driver controls.

use glam::{DQuat, DVec3};

use crate::body::{Body, FreeBody, WorldContext};
use crate::{MotionInput, Seconds, VehicleMotionState};

// ============================================================================
// Tuning Constants
// ============================================================================

/// Body positions are in centimeters while velocity is in meters per second.
pub const CENTIMETERS_PER_METER: f64 = 100.0;

/// Vehicle mass in kilograms.
pub const DEFAULT_MASS: f64 = 1000.0;

/// Force applied at full throttle, in newtons.
pub const DEFAULT_MAX_DRIVING_FORCE: f64 = 10000.0;

/// Air resistance coefficient, kg/m.
pub const DEFAULT_DRAG_COEFFICIENT: f64 = 16.0;

/// Rolling resistance coefficient (dimensionless).
pub const DEFAULT_ROLLING_COEFFICIENT: f64 = 0.015;

/// Radius of the turning circle at full lock, in meters.
pub const DEFAULT_MIN_TURNING_RADIUS: f64 = 10.0;

/// Squared length below which a vector has no usable direction.
const SAFE_NORMAL_TOLERANCE: f64 = 1.0e-8;

// ============================================================================
// Tuning
// ============================================================================

/// Physical parameters of a vehicle.
///
/// Every participant MUST simulate a given vehicle with identical tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleTuning {
    /// kg
    pub mass: f64,
    /// N
    pub max_driving_force: f64,
    /// kg/m
    pub drag_coefficient: f64,
    pub rolling_coefficient: f64,
    /// m
    pub min_turning_radius: f64,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            mass: DEFAULT_MASS,
            max_driving_force: DEFAULT_MAX_DRIVING_FORCE,
            drag_coefficient: DEFAULT_DRAG_COEFFICIENT,
            rolling_coefficient: DEFAULT_ROLLING_COEFFICIENT,
            min_turning_radius: DEFAULT_MIN_TURNING_RADIUS,
        }
    }
}

impl VehicleTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(TuningError::InvalidMass(self.mass));
        }
        if !(self.max_driving_force.is_finite() && self.max_driving_force >= 0.0) {
            return Err(TuningError::InvalidDrivingForce(self.max_driving_force));
        }
        if !(self.drag_coefficient.is_finite() && self.drag_coefficient >= 0.0) {
            return Err(TuningError::InvalidDragCoefficient(self.drag_coefficient));
        }
        if !(self.rolling_coefficient.is_finite() && self.rolling_coefficient >= 0.0) {
            return Err(TuningError::InvalidRollingCoefficient(
                self.rolling_coefficient,
            ));
        }
        if !(self.min_turning_radius.is_finite() && self.min_turning_radius > 0.0) {
            return Err(TuningError::InvalidTurningRadius(self.min_turning_radius));
        }
        Ok(())
    }
}

/// Rejected vehicle tuning.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TuningError {
    #[error("mass must be positive and finite, got {0}")]
    InvalidMass(f64),
    #[error("max driving force must be non-negative and finite, got {0}")]
    InvalidDrivingForce(f64),
    #[error("drag coefficient must be non-negative and finite, got {0}")]
    InvalidDragCoefficient(f64),
    #[error("rolling coefficient must be non-negative and finite, got {0}")]
    InvalidRollingCoefficient(f64),
    #[error("minimum turning radius must be positive and finite, got {0}")]
    InvalidTurningRadius(f64),
}

// ============================================================================
// Simulator
// ============================================================================

/// What a single step did, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// m/s²
    pub acceleration: DVec3,
    /// Requested body displacement in centimeters.
    pub displacement: DVec3,
    /// Radians about the body's up axis.
    pub rotation_angle: f64,
    /// The body reported a blocking collision; velocity was zeroed.
    pub blocked: bool,
}

/// Deterministic vehicle integrator.
///
/// Holds no state besides its tuning, so identical inputs always produce
/// identical outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Simulator {
    tuning: VehicleTuning,
}

impl Simulator {
    pub fn new(tuning: VehicleTuning) -> Result<Self, TuningError> {
        tuning.validate()?;
        Ok(Self { tuning })
    }

    pub fn tuning(&self) -> &VehicleTuning {
        &self.tuning
    }

    /// Quadratic drag opposing motion.
    pub fn air_resistance(&self, velocity: DVec3) -> DVec3 {
        let magnitude = velocity.length_squared() * self.tuning.drag_coefficient;
        -safe_normal(velocity) * magnitude
    }

    /// Speed-independent resistance opposing motion; zero at rest.
    pub fn rolling_resistance(&self, velocity: DVec3, gravity: f64) -> DVec3 {
        let normal_force = self.tuning.mass * gravity;
        -safe_normal(velocity) * self.tuning.rolling_coefficient * normal_force
    }

    /// Advance `velocity` and `body` by one input.
    ///
    /// Precondition: `input.delta_time > 0`. Not checked.
    pub fn step<B: Body + ?Sized>(
        &self,
        velocity: &mut DVec3,
        body: &mut B,
        gravity: f64,
        input: &MotionInput,
    ) -> StepOutcome {
        let tuning = &self.tuning;

        let mut force = body.forward_vector() * tuning.max_driving_force * input.throttle;
        force += self.air_resistance(*velocity);
        force += self.rolling_resistance(*velocity, gravity);

        let acceleration = force / tuning.mass;
        *velocity += acceleration * input.delta_time;

        let displacement = *velocity * input.delta_time * CENTIMETERS_PER_METER;

        let rotation_angle = self.rotate(velocity, body, input.delta_time, input.steering);

        let blocked = body.move_by(displacement);
        if blocked {
            *velocity = DVec3::ZERO;
        }

        tracing::trace!(
            throttle = input.throttle,
            steering = input.steering,
            delta_time = input.delta_time,
            rotation_angle,
            blocked,
            "vehicle step"
        );

        StepOutcome {
            acceleration,
            displacement,
            rotation_angle,
            blocked,
        }
    }

    /// Step a detached state through a body in open space.
    pub fn simulate(
        &self,
        state: &VehicleMotionState,
        input: &MotionInput,
        gravity: f64,
    ) -> VehicleMotionState {
        let mut body = FreeBody::new(state.pose);
        let mut velocity = state.velocity;
        self.step(&mut velocity, &mut body, gravity, input);
        VehicleMotionState::new(velocity, body.pose())
    }

    /// Turn about the body's up axis by an angle proportional to the distance
    /// travelled forward this step. Velocity is rotated by the same delta so
    /// it stays aligned with the heading.
    fn rotate<B: Body + ?Sized>(
        &self,
        velocity: &mut DVec3,
        body: &mut B,
        delta_time: Seconds,
        steering: f64,
    ) -> f64 {
        let forward_distance = body.forward_vector().dot(*velocity) * delta_time;
        let rotation_angle = forward_distance / self.tuning.min_turning_radius * steering;
        let delta_rotation = DQuat::from_axis_angle(body.up_vector(), rotation_angle);

        *velocity = delta_rotation * *velocity;
        body.rotate_by(delta_rotation);

        rotation_angle
    }
}

/// Unit vector, or zero when `v` is too short to have a direction.
fn safe_normal(v: DVec3) -> DVec3 {
    let length_sq = v.length_squared();
    if length_sq < SAFE_NORMAL_TOLERANCE {
        DVec3::ZERO
    } else {
        v / length_sq.sqrt()
    }
}

// ============================================================================
// Vehicle Motion
// ============================================================================

/// Per-vehicle movement component.
///
/// Owns the velocity and the current driver controls, and remembers the last
/// input it simulated so the authority can snapshot it.
#[derive(Debug, Clone)]
pub struct VehicleMotion {
    simulator: Simulator,
    velocity: DVec3,
    throttle: f64,
    steering: f64,
    last_input: MotionInput,
}

impl VehicleMotion {
    pub fn new(simulator: Simulator) -> Self {
        Self {
            simulator,
            velocity: DVec3::ZERO,
            throttle: 0.0,
            steering: 0.0,
            last_input: MotionInput::default(),
        }
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    pub fn velocity(&self) -> DVec3 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: DVec3) {
        self.velocity = velocity;
    }

    pub fn throttle(&self) -> f64 {
        self.throttle
    }

    /// Set by external input acquisition. Not clamped here; the authority
    /// validates the range.
    pub fn set_throttle(&mut self, throttle: f64) {
        self.throttle = throttle;
    }

    pub fn steering(&self) -> f64 {
        self.steering
    }

    pub fn set_steering(&mut self, steering: f64) {
        self.steering = steering;
    }

    pub fn last_input(&self) -> MotionInput {
        self.last_input
    }

    /// Snapshot the current controls into an input.
    pub fn create_input(&self, delta_time: Seconds, timestamp: Seconds) -> MotionInput {
        MotionInput::new(self.throttle, self.steering, delta_time, timestamp)
    }

    /// Record `input` as the last applied input and simulate it.
    pub fn simulate<B: Body + ?Sized>(
        &mut self,
        body: &mut B,
        world: &dyn WorldContext,
        input: &MotionInput,
    ) -> StepOutcome {
        self.last_input = *input;
        self.simulator
            .step(&mut self.velocity, body, world.gravity_magnitude(), input)
    }
}

// ============================================================================
// Tests
// ============================================================================
