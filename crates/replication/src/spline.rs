//! Cubic Hermite interpolation between two authoritative snapshots.

use kartsync_sim::DVec3;

/// Cubic Hermite curve from a start point and tangent to a target point and
/// tangent, parameterized over [0, 1]. Parameters above 1 extrapolate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HermiteCubicSpline {
    pub start_location: DVec3,
    pub start_derivative: DVec3,
    pub target_location: DVec3,
    pub target_derivative: DVec3,
}

impl HermiteCubicSpline {
    /// Position at parameter `t`.
    pub fn interpolate_location(&self, t: f64) -> DVec3 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        self.start_location * h00
            + self.start_derivative * h10
            + self.target_location * h01
            + self.target_derivative * h11
    }

    /// Derivative with respect to `t` (not per second).
    pub fn interpolate_derivative(&self, t: f64) -> DVec3 {
        let p0 = self.start_location;
        let m0 = self.start_derivative;
        let p1 = self.target_location;
        let m1 = self.target_derivative;

        let a = p0 * 6.0 + m0 * 3.0 + m1 * 3.0 - p1 * 6.0;
        let b = p0 * -6.0 - m0 * 4.0 - m1 * 2.0 + p1 * 6.0;

        a * (t * t) + b * t + m0
    }
}
