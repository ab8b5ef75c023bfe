//! Observer behavior: smooths between authoritative snapshots.
//!
//! Snapshots arrive irregularly. The observer assumes the next one will take
//! as long as the last one did and moves a rendered pose along a cubic
//! Hermite curve from where it was drawn to the latest snapshot. The body
//! itself snaps to the snapshot so collision stays correct; only the
//! rendered pose is smoothed.

use kartsync_sim::{
    AuthoritativeState, CENTIMETERS_PER_METER, DVec3, Pose, Seconds, VehicleId, VehicleMotion,
};

use crate::spline::HermiteCubicSpline;

#[derive(Debug, Clone)]
pub(crate) struct ObserverRole {
    time_since_update: Seconds,
    time_between_updates: Seconds,
    start_pose: Pose,
    /// Meters per second.
    start_velocity: DVec3,
    rendered: Pose,
    target: Option<AuthoritativeState>,
}

/// Outcome of accepting a snapshot as the new target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retarget {
    Interpolating,
    DegenerateInterval,
}

impl ObserverRole {
    pub(crate) fn new(initial: Pose) -> Self {
        Self {
            time_since_update: 0.0,
            time_between_updates: 0.0,
            start_pose: initial,
            start_velocity: DVec3::ZERO,
            rendered: initial,
            target: None,
        }
    }

    pub(crate) fn rendered(&self) -> Pose {
        self.rendered
    }

    pub(crate) fn target(&self) -> Option<&AuthoritativeState> {
        self.target.as_ref()
    }

    /// Tangent scale for the spline: meters per second across one update
    /// interval, expressed in centimeters.
    fn velocity_to_derivative(&self) -> f64 {
        self.time_between_updates * CENTIMETERS_PER_METER
    }

    /// Advance the rendered pose. Writes the interpolated velocity into
    /// `motion`.
    pub(crate) fn tick(
        &mut self,
        delta_time: Seconds,
        motion: &mut VehicleMotion,
        min_update_interval: Seconds,
    ) {
        self.time_since_update += delta_time;

        if self.time_between_updates < min_update_interval {
            return;
        }
        let Some(target) = self.target else {
            return;
        };

        // Not clamped: a late snapshot extrapolates along the curve
        let lerp_ratio = self.time_since_update / self.time_between_updates;
        let scale = self.velocity_to_derivative();

        let spline = HermiteCubicSpline {
            start_location: self.start_pose.position,
            start_derivative: self.start_velocity * scale,
            target_location: target.pose.position,
            target_derivative: target.velocity * scale,
        };

        self.rendered.position = spline.interpolate_location(lerp_ratio);
        motion.set_velocity(spline.interpolate_derivative(lerp_ratio) / scale);
        self.rendered.orientation = self
            .start_pose
            .orientation
            .slerp(target.pose.orientation, lerp_ratio);
    }

    /// Retarget at a fresh snapshot. The caller snaps the body.
    pub(crate) fn on_state(
        &mut self,
        vehicle_id: VehicleId,
        state: &AuthoritativeState,
        motion: &VehicleMotion,
        min_update_interval: Seconds,
    ) -> Retarget {
        self.time_between_updates = self.time_since_update;
        self.time_since_update = 0.0;
        self.target = Some(*state);

        if self.time_between_updates < min_update_interval {
            tracing::warn!(
                vehicle_id,
                interval = self.time_between_updates,
                "snapshot interval too short, interpolation skipped"
            );
            return Retarget::DegenerateInterval;
        }

        self.start_pose = self.rendered;
        self.start_velocity = motion.velocity();
        Retarget::Interpolating
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kartsync_sim::{DQuat, MotionInput, Simulator, VehicleTuning};

    const MIN_INTERVAL: Seconds = 1e-4;

    fn motion() -> VehicleMotion {
        VehicleMotion::new(Simulator::new(VehicleTuning::default()).expect("default tuning"))
    }

    fn snapshot(x: f64, velocity_x: f64, yaw: f64) -> AuthoritativeState {
        AuthoritativeState::new(
            MotionInput::default(),
            DVec3::new(velocity_x, 0.0, 0.0),
            Pose::new(DVec3::new(x, 0.0, 0.0), DQuat::from_rotation_z(yaw)),
        )
    }

    #[test]
    fn test_first_snapshot_is_degenerate() {
        let mut observer = ObserverRole::new(Pose::default());
        let motion = motion();

        let outcome = observer.on_state(1, &snapshot(100.0, 1.0, 0.0), &motion, MIN_INTERVAL);

        assert_eq!(outcome, Retarget::DegenerateInterval);
        assert_eq!(observer.rendered(), Pose::default());
    }

    #[test]
    fn test_tick_without_interval_leaves_rendered_pose() {
        let mut observer = ObserverRole::new(Pose::default());
        let mut motion = motion();
        observer.on_state(1, &snapshot(100.0, 1.0, 0.0), &motion, MIN_INTERVAL);

        observer.tick(0.05, &mut motion, MIN_INTERVAL);

        assert_eq!(observer.rendered(), Pose::default());
    }

    #[test]
    fn test_interpolation_endpoints() {
        let mut observer = ObserverRole::new(Pose::default());
        let mut motion = motion();

        observer.tick(0.1, &mut motion, MIN_INTERVAL);
        let outcome = observer.on_state(1, &snapshot(10.0, 1.0, 0.4), &motion, MIN_INTERVAL);
        assert_eq!(outcome, Retarget::Interpolating);

        // Zero elapsed time renders the start pose
        observer.tick(0.0, &mut motion, MIN_INTERVAL);
        assert!(observer.rendered().position.abs_diff_eq(DVec3::ZERO, 1e-12));
        assert!(
            observer
                .rendered()
                .orientation
                .abs_diff_eq(DQuat::IDENTITY, 1e-12)
        );

        // One full interval reaches the target
        observer.tick(0.1, &mut motion, MIN_INTERVAL);
        assert!(
            observer
                .rendered()
                .position
                .abs_diff_eq(DVec3::new(10.0, 0.0, 0.0), 1e-9)
        );
        assert!(
            observer
                .rendered()
                .orientation
                .abs_diff_eq(DQuat::from_rotation_z(0.4), 1e-9)
        );
        assert!(motion.velocity().abs_diff_eq(DVec3::new(1.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn test_constant_velocity_moves_linearly() {
        // 1 m/s over 0.1 s covers 10 cm
        let mut observer = ObserverRole::new(Pose::default());
        let mut motion = motion();
        motion.set_velocity(DVec3::new(1.0, 0.0, 0.0));

        observer.tick(0.1, &mut motion, MIN_INTERVAL);
        observer.on_state(1, &snapshot(10.0, 1.0, 0.0), &motion, MIN_INTERVAL);

        observer.tick(0.05, &mut motion, MIN_INTERVAL);
        assert!(
            observer
                .rendered()
                .position
                .abs_diff_eq(DVec3::new(5.0, 0.0, 0.0), 1e-9)
        );
        assert!(motion.velocity().abs_diff_eq(DVec3::new(1.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn test_late_snapshot_extrapolates() {
        let mut observer = ObserverRole::new(Pose::default());
        let mut motion = motion();
        motion.set_velocity(DVec3::new(1.0, 0.0, 0.0));

        observer.tick(0.1, &mut motion, MIN_INTERVAL);
        observer.on_state(1, &snapshot(10.0, 1.0, 0.0), &motion, MIN_INTERVAL);

        observer.tick(0.15, &mut motion, MIN_INTERVAL);
        assert!(
            observer
                .rendered()
                .position
                .abs_diff_eq(DVec3::new(15.0, 0.0, 0.0), 1e-9)
        );
    }

    #[test]
    fn test_retarget_starts_from_rendered_pose() {
        let mut observer = ObserverRole::new(Pose::default());
        let mut motion = motion();
        motion.set_velocity(DVec3::new(1.0, 0.0, 0.0));

        observer.tick(0.1, &mut motion, MIN_INTERVAL);
        observer.on_state(1, &snapshot(10.0, 1.0, 0.0), &motion, MIN_INTERVAL);
        observer.tick(0.05, &mut motion, MIN_INTERVAL);
        let midway = observer.rendered();

        observer.on_state(1, &snapshot(20.0, 1.0, 0.0), &motion, MIN_INTERVAL);
        observer.tick(0.0, &mut motion, MIN_INTERVAL);

        assert!(observer.rendered().position.abs_diff_eq(midway.position, 1e-12));
    }
}
