//! Deterministic state digests.
//!
//! Algorithm: FNV-1a 64-bit over little-endian canonicalized f64 values.
//! - `-0.0` → `+0.0`
//! - Any NaN → quiet NaN `0x7ff8000000000000`
//!
//! Field order: velocity xyz, position xyz, orientation xyzw, then (for
//! authoritative states) throttle, steering, delta_time, timestamp.

use crate::{AuthoritativeState, MotionInput, VehicleMotionState};

/// FNV-1a 64-bit offset basis.
const FNV1A_OFFSET_BASIS: u64 = 0xcbf29ce484222325;

/// FNV-1a 64-bit prime.
const FNV1A_PRIME: u64 = 0x100000001b3;

#[derive(Debug, Clone)]
struct Fnv1a64 {
    state: u64,
}

impl Fnv1a64 {
    fn new() -> Self {
        Self {
            state: FNV1A_OFFSET_BASIS,
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(FNV1A_PRIME);
        }
    }

    fn update_f64(&mut self, value: f64) {
        self.update(&canonicalize_f64(value).to_le_bytes());
    }

    fn update_motion(&mut self, motion: &VehicleMotionState) {
        let v = motion.velocity;
        let p = motion.pose.position;
        let q = motion.pose.orientation;
        for value in [v.x, v.y, v.z, p.x, p.y, p.z, q.x, q.y, q.z, q.w] {
            self.update_f64(value);
        }
    }

    fn update_input(&mut self, input: &MotionInput) {
        for value in [
            input.throttle,
            input.steering,
            input.delta_time,
            input.timestamp,
        ] {
            self.update_f64(value);
        }
    }

    fn finish(self) -> u64 {
        self.state
    }
}

fn canonicalize_f64(value: f64) -> u64 {
    const QUIET_NAN_BITS: u64 = 0x7ff8000000000000;

    if value.is_nan() {
        QUIET_NAN_BITS
    } else if value == 0.0 {
        0u64
    } else {
        value.to_bits()
    }
}

/// Digest of a vehicle's velocity and pose.
pub fn motion_digest(motion: &VehicleMotionState) -> u64 {
    let mut hasher = Fnv1a64::new();
    hasher.update_motion(motion);
    hasher.finish()
}

/// Digest of a replicated snapshot.
pub fn authoritative_digest(state: &AuthoritativeState) -> u64 {
    let mut hasher = Fnv1a64::new();
    hasher.update_motion(&state.motion());
    hasher.update_input(&state.last_input);
    hasher.finish()
}
