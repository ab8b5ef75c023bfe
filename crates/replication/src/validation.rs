//! Authority-side validation of remote inputs.
//!
//! - |throttle| > 1 or |steering| > 1: DROP
//! - Claimed simulated time not strictly behind the server clock: DROP
//!
//! Dropped inputs are never applied and the sender is never told. From the
//! controller's side a rejection looks exactly like packet loss.

use kartsync_sim::{MotionInput, Seconds};

/// Result of input validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// Input accepted and simulated.
    Accepted,
    /// Dropped: throttle or steering outside [-1, 1].
    DroppedOutOfRange { throttle: f64, steering: f64 },
    /// Dropped: the controller claims to have simulated up to or past the
    /// server clock.
    DroppedAheadOfClock {
        proposed: Seconds,
        server_time: Seconds,
    },
    /// Dropped: this participant hosts no vehicle with that id.
    DroppedUnknownVehicle,
    /// Dropped: this participant is not the authority for the vehicle.
    DroppedNotAuthority,
    /// Dropped: the authority drives this vehicle itself.
    DroppedLocallyControlled,
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Validate an input against the time a controller has already claimed.
///
/// # Arguments
/// * `input` - The remote input
/// * `simulated_time` - Sum of `delta_time` over every input accepted so far
/// * `server_time` - The authority's current clock
pub fn validate_input(
    input: &MotionInput,
    simulated_time: Seconds,
    server_time: Seconds,
) -> ValidationResult {
    if !input.is_valid() {
        return ValidationResult::DroppedOutOfRange {
            throttle: input.throttle,
            steering: input.steering,
        };
    }

    // Written as "accept only if behind" so NaN delta_time is rejected
    let proposed = simulated_time + input.delta_time;
    if !(proposed < server_time) {
        return ValidationResult::DroppedAheadOfClock {
            proposed,
            server_time,
        };
    }

    ValidationResult::Accepted
}

/// Speed-hack guard for one controlled vehicle.
///
/// Caps how far ahead of real time a controller can claim to have driven.
#[derive(Debug, Clone, Default)]
pub struct InputValidator {
    simulated_time: Seconds,
}

impl InputValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total `delta_time` accepted so far.
    pub fn simulated_time(&self) -> Seconds {
        self.simulated_time
    }

    /// Validate without charging time.
    pub fn check(&self, input: &MotionInput, server_time: Seconds) -> ValidationResult {
        validate_input(input, self.simulated_time, server_time)
    }

    /// Validate and, on acceptance, charge the input's `delta_time`.
    pub fn admit(&mut self, input: &MotionInput, server_time: Seconds) -> ValidationResult {
        let result = self.check(input, server_time);
        if result.is_accepted() {
            self.simulated_time += input.delta_time;
        }
        result
    }
}
