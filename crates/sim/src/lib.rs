//! KartSync Simulation Core
//!
//! This crate contains the deterministic vehicle physics shared by every
//! participant of a networked match. Given the same motion state and the same
//! [`MotionInput`], [`Simulator::step`] produces bit-identical results on the
//! authority and on a predicting client. Replay-based reconciliation is only
//! valid because of that property.
//!
//! # Architecture Constraints
//!
//! The Simulation Core MUST NOT:
//! - Perform I/O operations (file, network, etc.)
//! - Read wall-clock time
//! - Use ambient randomness
//! - Know which network role it is running under
//!
//! Engine-owned state (the vehicle transform and collision-aware movement) is
//! reached only through the [`Body`] trait, and ambient gravity only through
//! [`WorldContext`]. Time arrives inside each [`MotionInput`].
//!
//! # Units
//!
//! Velocity is tracked in meters per second. Body positions are in
//! centimeters, so displacements are scaled by [`CENTIMETERS_PER_METER`].

#![deny(unsafe_code)]

mod body;
mod digest;
mod physics;

pub use body::{Body, DEFAULT_GRAVITY, FreeBody, StandardGravity, WorldContext};
pub use digest::{authoritative_digest, motion_digest};
pub use glam::{DQuat, DVec3};
pub use physics::{
    CENTIMETERS_PER_METER, DEFAULT_DRAG_COEFFICIENT, DEFAULT_MASS, DEFAULT_MAX_DRIVING_FORCE,
    DEFAULT_MIN_TURNING_RADIUS, DEFAULT_ROLLING_COEFFICIENT, Simulator, StepOutcome, TuningError,
    VehicleMotion, VehicleTuning,
};

// ============================================================================
// Type Aliases
// ============================================================================

/// Time in seconds.
pub type Seconds = f64;

/// Identifier of a replicated vehicle, shared by every participant.
pub type VehicleId = u64;

/// Local forward axis of a vehicle.
pub const FORWARD: DVec3 = DVec3::X;

/// Local up axis of a vehicle.
pub const UP: DVec3 = DVec3::Z;

// ============================================================================
// Core Types
// ============================================================================

/// Driver intent for a single simulation step.
///
/// Created once per tick by the participant controlling the vehicle and never
/// modified afterwards. Timestamps from a single controller are
/// non-decreasing; reconciliation relies on that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionInput {
    /// Drive request in [-1, 1]. Negative values reverse.
    pub throttle: f64,
    /// Steering request in [-1, 1]. Positive turns right.
    pub steering: f64,
    /// Length of the step in seconds. MUST be strictly positive.
    pub delta_time: Seconds,
    /// Server clock time at which the input was produced.
    pub timestamp: Seconds,
}

impl MotionInput {
    pub fn new(throttle: f64, steering: f64, delta_time: Seconds, timestamp: Seconds) -> Self {
        Self {
            throttle,
            steering,
            delta_time,
            timestamp,
        }
    }

    /// Range check applied by the authority before simulating a remote input.
    ///
    /// NaN controls fail the check.
    pub fn is_valid(&self) -> bool {
        self.throttle.abs() <= 1.0 && self.steering.abs() <= 1.0
    }
}

/// World position (centimeters) plus orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: DVec3,
    pub orientation: DQuat,
}

impl Pose {
    pub fn new(position: DVec3, orientation: DQuat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Pose at `position` facing along +X.
    pub fn at(position: DVec3) -> Self {
        Self::new(position, DQuat::IDENTITY)
    }

    pub fn forward(&self) -> DVec3 {
        self.orientation * FORWARD
    }

    pub fn up(&self) -> DVec3 {
        self.orientation * UP
    }
}

/// Velocity and pose of one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleMotionState {
    /// Meters per second.
    pub velocity: DVec3,
    pub pose: Pose,
}

impl VehicleMotionState {
    pub fn new(velocity: DVec3, pose: Pose) -> Self {
        Self { velocity, pose }
    }

    /// Deterministic digest of this state.
    pub fn digest(&self) -> u64 {
        motion_digest(self)
    }
}

/// Snapshot written by the authority and replicated to every peer.
///
/// The authority is the only writer; everyone else treats it as read-only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AuthoritativeState {
    /// Most recent input the authority applied to this vehicle.
    pub last_input: MotionInput,
    pub velocity: DVec3,
    pub pose: Pose,
}

impl AuthoritativeState {
    pub fn new(last_input: MotionInput, velocity: DVec3, pose: Pose) -> Self {
        Self {
            last_input,
            velocity,
            pose,
        }
    }

    /// The motion part of the snapshot.
    pub fn motion(&self) -> VehicleMotionState {
        VehicleMotionState::new(self.velocity, self.pose)
    }

    /// Deterministic digest of this snapshot, including the last input.
    pub fn digest(&self) -> u64 {
        authoritative_digest(self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_validity_boundary() {
        assert!(MotionInput::new(1.0, -1.0, 0.1, 0.0).is_valid());
        assert!(MotionInput::new(-1.0, 1.0, 0.1, 0.0).is_valid());
        assert!(!MotionInput::new(1.0001, 0.0, 0.1, 0.0).is_valid());
        assert!(!MotionInput::new(0.0, -1.0001, 0.1, 0.0).is_valid());
    }

    #[test]
    fn test_input_validity_rejects_nan() {
        assert!(!MotionInput::new(f64::NAN, 0.0, 0.1, 0.0).is_valid());
        assert!(!MotionInput::new(0.0, f64::NAN, 0.1, 0.0).is_valid());
    }

    #[test]
    fn test_pose_axes_follow_orientation() {
        let pose = Pose::new(
            DVec3::ZERO,
            DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2),
        );
        assert!(pose.forward().abs_diff_eq(DVec3::Y, 1e-12));
        assert!(pose.up().abs_diff_eq(DVec3::Z, 1e-12));
    }

    #[test]
    fn test_authoritative_state_motion_view() {
        let pose = Pose::at(DVec3::new(10.0, 20.0, 0.0));
        let state = AuthoritativeState::new(
            MotionInput::new(1.0, 0.0, 0.1, 3.0),
            DVec3::new(2.0, 0.0, 0.0),
            pose,
        );

        let motion = state.motion();
        assert_eq!(motion.velocity, DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(motion.pose, pose);
    }
}
