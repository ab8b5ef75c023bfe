//! Authority behavior: validates and simulates remote inputs, and snapshots
//! the vehicle for replication every tick.

use kartsync_sim::{
    AuthoritativeState, Body, MotionInput, Seconds, VehicleId, VehicleMotion, WorldContext,
};

use crate::ReplicationConfig;
use crate::clock::Clock;
use crate::transport::Transport;
use crate::validation::{InputValidator, ValidationResult};

#[derive(Debug, Clone)]
pub(crate) struct AuthorityRole {
    locally_controlled: bool,
    validator: InputValidator,
    /// Latest snapshot, rewritten every tick.
    state: Option<AuthoritativeState>,
    last_replicated_digest: Option<u64>,
    since_replication: Seconds,
}

impl AuthorityRole {
    pub(crate) fn new(locally_controlled: bool) -> Self {
        Self {
            locally_controlled,
            validator: InputValidator::new(),
            state: None,
            last_replicated_digest: None,
            since_replication: 0.0,
        }
    }

    pub(crate) fn locally_controlled(&self) -> bool {
        self.locally_controlled
    }

    pub(crate) fn state(&self) -> Option<&AuthoritativeState> {
        self.state.as_ref()
    }

    pub(crate) fn simulated_time(&self) -> Seconds {
        self.validator.simulated_time()
    }

    /// Per-frame update: drive locally if the host controls the vehicle, then
    /// snapshot and replicate when the snapshot changed.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn tick<B: Body + ?Sized>(
        &mut self,
        vehicle_id: VehicleId,
        delta_time: Seconds,
        motion: &mut VehicleMotion,
        body: &mut B,
        clock: &dyn Clock,
        world: &dyn WorldContext,
        transport: &mut dyn Transport,
        config: &ReplicationConfig,
    ) {
        if self.locally_controlled {
            let input = motion.create_input(delta_time, clock.now());
            motion.simulate(body, world, &input);
        }

        let state = AuthoritativeState::new(motion.last_input(), motion.velocity(), body.pose());
        self.state = Some(state);
        self.since_replication += delta_time;

        let digest = state.digest();
        if self.last_replicated_digest == Some(digest) {
            return;
        }
        if let Some(interval) = config.replication_interval()
            && self.last_replicated_digest.is_some()
            && self.since_replication < interval
        {
            return;
        }

        transport.replicate(vehicle_id, &state);
        self.last_replicated_digest = Some(digest);
        self.since_replication = 0.0;

        tracing::debug!(
            vehicle_id,
            last_input_timestamp = state.last_input.timestamp,
            "replicated authoritative state"
        );
    }

    /// Remote input from the controlling client.
    pub(crate) fn on_input<B: Body + ?Sized>(
        &mut self,
        vehicle_id: VehicleId,
        input: &MotionInput,
        motion: &mut VehicleMotion,
        body: &mut B,
        clock: &dyn Clock,
        world: &dyn WorldContext,
    ) -> ValidationResult {
        if self.locally_controlled {
            tracing::warn!(vehicle_id, "remote input for locally controlled vehicle");
            return ValidationResult::DroppedLocallyControlled;
        }

        let result = self.validator.admit(input, clock.now());

        if result.is_accepted() {
            motion.simulate(body, world, input);
            tracing::debug!(
                vehicle_id,
                timestamp = input.timestamp,
                simulated_time = self.validator.simulated_time(),
                "accepted remote input"
            );
        } else {
            tracing::warn!(vehicle_id, ?result, "dropped remote input");
        }

        result
    }
}
