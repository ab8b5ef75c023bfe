//! Engine collaborators consumed by the simulator.

use glam::{DQuat, DVec3};

use crate::{FORWARD, Pose, UP};

/// Capability interface over an engine-owned vehicle transform.
///
/// Implementations own the world position and orientation and perform
/// collision-aware movement. The simulator never reads the transform through
/// any other path, so it stays testable without a live 3D world.
pub trait Body {
    fn position(&self) -> DVec3;

    fn set_position(&mut self, position: DVec3);

    fn orientation(&self) -> DQuat;

    fn set_orientation(&mut self, orientation: DQuat);

    /// Move by `displacement` (centimeters), stopping at the first blocking
    /// hit. Returns `true` if a collision blocked the requested displacement.
    fn move_by(&mut self, displacement: DVec3) -> bool;

    fn forward_vector(&self) -> DVec3 {
        self.orientation() * FORWARD
    }

    fn up_vector(&self) -> DVec3 {
        self.orientation() * UP
    }

    fn pose(&self) -> Pose {
        Pose::new(self.position(), self.orientation())
    }

    fn set_pose(&mut self, pose: Pose) {
        self.set_position(pose.position);
        self.set_orientation(pose.orientation);
    }

    /// Apply a world-space rotation on top of the current orientation.
    fn rotate_by(&mut self, delta: DQuat) {
        let orientation = (delta * self.orientation()).normalize();
        self.set_orientation(orientation);
    }
}

/// A body in open space: every move succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FreeBody {
    pose: Pose,
}

impl FreeBody {
    pub fn new(pose: Pose) -> Self {
        Self { pose }
    }
}

impl Body for FreeBody {
    fn position(&self) -> DVec3 {
        self.pose.position
    }

    fn set_position(&mut self, position: DVec3) {
        self.pose.position = position;
    }

    fn orientation(&self) -> DQuat {
        self.pose.orientation
    }

    fn set_orientation(&mut self, orientation: DQuat) {
        self.pose.orientation = orientation;
    }

    fn move_by(&mut self, displacement: DVec3) -> bool {
        self.pose.position += displacement;
        false
    }
}

// ============================================================================
// World Context
// ============================================================================

/// Standard gravity in meters per second squared.
pub const DEFAULT_GRAVITY: f64 = 9.8;

/// Ambient world queries needed by the simulator.
pub trait WorldContext {
    /// Magnitude of gravitational acceleration, m/s².
    fn gravity_magnitude(&self) -> f64;
}

/// Constant gravity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardGravity(pub f64);

impl Default for StandardGravity {
    fn default() -> Self {
        Self(DEFAULT_GRAVITY)
    }
}

impl WorldContext for StandardGravity {
    fn gravity_magnitude(&self) -> f64 {
        self.0.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_body_never_blocks() {
        let mut body = FreeBody::default();
        assert!(!body.move_by(DVec3::new(10.0, -5.0, 0.0)));
        assert_eq!(body.position(), DVec3::new(10.0, -5.0, 0.0));
    }

    #[test]
    fn test_rotate_by_composes_in_world_space() {
        let mut body = FreeBody::default();
        let quarter = DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2);

        body.rotate_by(quarter);
        body.rotate_by(quarter);

        assert!(body.forward_vector().abs_diff_eq(-DVec3::X, 1e-12));
        assert!(body.up_vector().abs_diff_eq(DVec3::Z, 1e-12));
    }

    #[test]
    fn test_set_pose_roundtrip() {
        let mut body = FreeBody::default();
        let pose = Pose::new(DVec3::new(1.0, 2.0, 3.0), DQuat::from_rotation_z(0.5));
        body.set_pose(pose);
        assert_eq!(body.pose(), pose);
    }

    #[test]
    fn test_gravity_is_a_magnitude() {
        assert_eq!(StandardGravity(-9.8).gravity_magnitude(), 9.8);
        assert_eq!(StandardGravity::default().gravity_magnitude(), DEFAULT_GRAVITY);
    }
}
