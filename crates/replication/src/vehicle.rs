//! A replicated vehicle: one body, one motion component and the behavior for
//! the role this participant holds over it.

use kartsync_sim::{
    AuthoritativeState, Body, DVec3, MotionInput, Pose, Seconds, Simulator, VehicleId,
    VehicleMotion, VehicleTuning, WorldContext,
};

use crate::authority::AuthorityRole;
use crate::clock::Clock;
use crate::controller::ControllerRole;
use crate::input_log::UnacknowledgedInputs;
use crate::observer::{ObserverRole, Retarget};
use crate::role::NetRole;
use crate::transport::Transport;
use crate::validation::ValidationResult;
use crate::{ReplicationConfig, ReplicationError};

/// Result of delivering an authoritative snapshot to a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOutcome {
    /// Controller snapped to the snapshot and replayed its pending inputs.
    Reconciled { pruned: usize, replayed: usize },
    /// Observer is now interpolating toward the snapshot.
    Interpolating,
    /// Observer stored the snapshot but the interval since the previous one
    /// was too short to interpolate over.
    DegenerateInterval,
    /// The authority produces snapshots; it never consumes them.
    IgnoredByAuthority,
    /// This participant hosts no vehicle with that id.
    UnknownVehicle,
}

#[derive(Debug, Clone)]
enum Behavior {
    Authority(AuthorityRole),
    Controller(ControllerRole),
    Observer(ObserverRole),
}

/// One vehicle as seen by one participant.
#[derive(Debug, Clone)]
pub struct ReplicatedVehicle<B> {
    id: VehicleId,
    config: ReplicationConfig,
    body: B,
    motion: VehicleMotion,
    behavior: Behavior,
}

impl<B: Body> ReplicatedVehicle<B> {
    pub fn new(
        id: VehicleId,
        role: NetRole,
        body: B,
        tuning: VehicleTuning,
        config: ReplicationConfig,
    ) -> Result<Self, ReplicationError> {
        config.validate()?;
        let motion = VehicleMotion::new(Simulator::new(tuning)?);
        let behavior = match role {
            NetRole::Authority { locally_controlled } => {
                Behavior::Authority(AuthorityRole::new(locally_controlled))
            }
            NetRole::Controller => {
                Behavior::Controller(ControllerRole::new(config.max_unacknowledged_inputs))
            }
            NetRole::Observer => Behavior::Observer(ObserverRole::new(body.pose())),
        };

        Ok(Self {
            id,
            config,
            body,
            motion,
            behavior,
        })
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn role(&self) -> NetRole {
        match &self.behavior {
            Behavior::Authority(authority) => NetRole::Authority {
                locally_controlled: authority.locally_controlled(),
            },
            Behavior::Controller(_) => NetRole::Controller,
            Behavior::Observer(_) => NetRole::Observer,
        }
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    pub fn motion(&self) -> &VehicleMotion {
        &self.motion
    }

    /// Meters per second. On an observer this is the interpolated velocity.
    pub fn velocity(&self) -> DVec3 {
        self.motion.velocity()
    }

    /// Set by gameplay code on whichever participant drives the vehicle.
    pub fn set_throttle(&mut self, throttle: f64) {
        self.motion.set_throttle(throttle);
    }

    pub fn set_steering(&mut self, steering: f64) {
        self.motion.set_steering(steering);
    }

    /// Pose to draw. Observers draw the smoothed pose; everyone else draws the
    /// body.
    pub fn rendered_pose(&self) -> Pose {
        match &self.behavior {
            Behavior::Observer(observer) => observer.rendered(),
            _ => self.body.pose(),
        }
    }

    /// Pending predicted inputs, controllers only.
    pub fn unacknowledged_inputs(&self) -> Option<&UnacknowledgedInputs> {
        match &self.behavior {
            Behavior::Controller(controller) => Some(controller.unacknowledged()),
            _ => None,
        }
    }

    /// Latest snapshot this participant produced (authority) or received.
    pub fn authoritative_state(&self) -> Option<&AuthoritativeState> {
        match &self.behavior {
            Behavior::Authority(authority) => authority.state(),
            Behavior::Controller(controller) => controller.latest(),
            Behavior::Observer(observer) => observer.target(),
        }
    }

    /// Total input time the authority has accepted for this vehicle.
    pub fn simulated_time(&self) -> Option<Seconds> {
        match &self.behavior {
            Behavior::Authority(authority) => Some(authority.simulated_time()),
            _ => None,
        }
    }

    /// Per-frame update.
    pub fn tick(
        &mut self,
        delta_time: Seconds,
        clock: &dyn Clock,
        world: &dyn WorldContext,
        transport: &mut dyn Transport,
    ) {
        match &mut self.behavior {
            Behavior::Authority(authority) => authority.tick(
                self.id,
                delta_time,
                &mut self.motion,
                &mut self.body,
                clock,
                world,
                transport,
                &self.config,
            ),
            Behavior::Controller(controller) => controller.tick(
                self.id,
                delta_time,
                &mut self.motion,
                &mut self.body,
                clock,
                world,
                transport,
            ),
            Behavior::Observer(observer) => {
                observer.tick(delta_time, &mut self.motion, self.config.min_update_interval)
            }
        }
    }

    /// Input sent by the controlling client. Only the authority acts on it.
    pub fn on_input_received(
        &mut self,
        input: &MotionInput,
        clock: &dyn Clock,
        world: &dyn WorldContext,
    ) -> ValidationResult {
        let role = self.role();
        match &mut self.behavior {
            Behavior::Authority(authority) => authority.on_input(
                self.id,
                input,
                &mut self.motion,
                &mut self.body,
                clock,
                world,
            ),
            _ => {
                tracing::warn!(vehicle_id = self.id, %role, "input sent to non-authority");
                ValidationResult::DroppedNotAuthority
            }
        }
    }

    /// Snapshot replicated by the authority.
    pub fn on_authoritative_state_received(
        &mut self,
        state: &AuthoritativeState,
        world: &dyn WorldContext,
    ) -> StateOutcome {
        match &mut self.behavior {
            Behavior::Authority(_) => StateOutcome::IgnoredByAuthority,
            Behavior::Controller(controller) => {
                let reconciliation =
                    controller.reconcile(self.id, state, &mut self.motion, &mut self.body, world);
                StateOutcome::Reconciled {
                    pruned: reconciliation.pruned,
                    replayed: reconciliation.replayed,
                }
            }
            Behavior::Observer(observer) => {
                let retarget = observer.on_state(
                    self.id,
                    state,
                    &self.motion,
                    self.config.min_update_interval,
                );
                self.body.set_pose(state.pose);
                match retarget {
                    Retarget::Interpolating => StateOutcome::Interpolating,
                    Retarget::DegenerateInterval => StateOutcome::DegenerateInterval,
                }
            }
        }
    }
}
