//! Controller behavior: client-side prediction with server reconciliation.
//!
//! Every tick the controller simulates its own input immediately, logs it and
//! sends it to the authority. When an authoritative snapshot arrives it snaps
//! to the snapshot, drops everything the snapshot already covers and replays
//! the rest. Because the simulator is deterministic, replaying an input that
//! the authority has not seen yet reproduces the locally predicted pose.

use kartsync_sim::{AuthoritativeState, Body, Seconds, VehicleId, VehicleMotion, WorldContext};

use crate::clock::Clock;
use crate::input_log::UnacknowledgedInputs;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub(crate) struct ControllerRole {
    unacknowledged: UnacknowledgedInputs,
    latest: Option<AuthoritativeState>,
}

/// What a reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reconciliation {
    pub(crate) pruned: usize,
    pub(crate) replayed: usize,
}

impl ControllerRole {
    pub(crate) fn new(max_unacknowledged_inputs: usize) -> Self {
        Self {
            unacknowledged: UnacknowledgedInputs::new(max_unacknowledged_inputs),
            latest: None,
        }
    }

    pub(crate) fn unacknowledged(&self) -> &UnacknowledgedInputs {
        &self.unacknowledged
    }

    pub(crate) fn latest(&self) -> Option<&AuthoritativeState> {
        self.latest.as_ref()
    }

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
    ) {
        let input = motion.create_input(delta_time, clock.now());
        self.unacknowledged.push(input);
        motion.simulate(body, world, &input);
        transport.send_input(vehicle_id, &input);
    }

    pub(crate) fn reconcile<B: Body + ?Sized>(
        &mut self,
        vehicle_id: VehicleId,
        state: &AuthoritativeState,
        motion: &mut VehicleMotion,
        body: &mut B,
        world: &dyn WorldContext,
    ) -> Reconciliation {
        self.latest = Some(*state);

        body.set_pose(state.pose);
        motion.set_velocity(state.velocity);

        let pruned = self
            .unacknowledged
            .prune_acknowledged(state.last_input.timestamp);

        let mut replayed = 0;
        for input in self.unacknowledged.iter() {
            motion.simulate(body, world, input);
            replayed += 1;
        }

        tracing::trace!(
            vehicle_id,
            acknowledged = state.last_input.timestamp,
            pruned,
            replayed,
            "reconciled with authority"
        );

        Reconciliation { pruned, replayed }
    }
}
