//! KartSync Replication
//!
//! Role-based networking for vehicles driven by the simulation core. Every
//! participant hosts a copy of each vehicle and holds exactly one role over
//! it:
//! - **Authority**: validates remote inputs, simulates them and replicates
//!   the resulting [`AuthoritativeState`] to everyone else
//! - **Controller**: predicts its own inputs immediately and reconciles by
//!   replaying the inputs the authority has not acknowledged yet
//! - **Observer**: interpolates a rendered pose between snapshots
//!
//! # Architecture
//!
//! Simulation stays in `kartsync-sim`. This crate performs no I/O itself:
//! outbound traffic goes through a [`Transport`], inbound traffic is handed
//! to a [`Participant`], and time comes from a [`Clock`].
//!
//! # Ordering
//!
//! Inputs from one controller are assumed to arrive in send order. The
//! validator does not reorder or deduplicate.

#![deny(unsafe_code)]

mod authority;
pub mod clock;
mod controller;
pub mod input_log;
mod observer;
pub mod role;
pub mod spline;
pub mod transport;
pub mod validation;
mod vehicle;

use std::collections::BTreeMap;

use kartsync_sim::{
    AuthoritativeState, Body, MotionInput, Seconds, TuningError, VehicleId, VehicleTuning,
    WorldContext,
};
use kartsync_wire::{Frame, WireError, decode_frame};

pub use clock::{Clock, ManualClock, SystemClock};
pub use input_log::UnacknowledgedInputs;
pub use role::NetRole;
pub use spline::HermiteCubicSpline;
pub use transport::{EncodedOutbox, Outbound, Outbox, Transport};
pub use validation::{InputValidator, ValidationResult, validate_input};
pub use vehicle::{ReplicatedVehicle, StateOutcome};

// ============================================================================
// Parameters
// ============================================================================

/// Shortest snapshot interval the observer will interpolate over. Anything
/// shorter is treated as numeric noise.
pub const DEFAULT_MIN_UPDATE_INTERVAL: Seconds = 1e-4;

/// Pending predicted inputs a controller keeps before dropping the oldest.
pub const DEFAULT_MAX_UNACKNOWLEDGED_INPUTS: usize = 1024;

/// Replication configuration shared by every vehicle of a participant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicationConfig {
    /// Upper bound on snapshots per second per vehicle. `None` replicates on
    /// every change.
    pub net_update_frequency_hz: Option<f64>,
    pub min_update_interval: Seconds,
    pub max_unacknowledged_inputs: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            net_update_frequency_hz: None,
            min_update_interval: DEFAULT_MIN_UPDATE_INTERVAL,
            max_unacknowledged_inputs: DEFAULT_MAX_UNACKNOWLEDGED_INPUTS,
        }
    }
}

impl ReplicationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_update_interval.is_finite() && self.min_update_interval > 0.0) {
            return Err(ConfigError::InvalidMinUpdateInterval(
                self.min_update_interval,
            ));
        }
        if self.max_unacknowledged_inputs == 0 {
            return Err(ConfigError::EmptyInputLog);
        }
        Ok(())
    }

    /// Minimum time between two snapshots, if rate limited. Non-positive or
    /// non-finite frequencies disable the limit.
    pub fn replication_interval(&self) -> Option<Seconds> {
        self.net_update_frequency_hz
            .filter(|hz| hz.is_finite() && *hz > 0.0)
            .map(|hz| 1.0 / hz)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Rejected replication configuration.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("minimum update interval must be positive and finite, got {0}")]
    InvalidMinUpdateInterval(Seconds),
    #[error("unacknowledged input log must hold at least one input")]
    EmptyInputLog,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("vehicle {0} is already hosted")]
    DuplicateVehicle(VehicleId),
    #[error("invalid vehicle tuning: {0}")]
    InvalidTuning(#[from] TuningError),
    #[error("invalid replication config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

// ============================================================================
// Participant
// ============================================================================

/// What happened to an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Input {
        vehicle_id: VehicleId,
        result: ValidationResult,
    },
    State {
        vehicle_id: VehicleId,
        outcome: StateOutcome,
    },
}

/// One networked participant (server or client) and the vehicles it hosts.
#[derive(Debug)]
pub struct Participant<B> {
    config: ReplicationConfig,
    vehicles: BTreeMap<VehicleId, ReplicatedVehicle<B>>,
}

impl<B: Body> Participant<B> {
    pub fn new(config: ReplicationConfig) -> Result<Self, ReplicationError> {
        config.validate()?;
        Ok(Self {
            config,
            vehicles: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Host a vehicle under a fixed role.
    pub fn spawn_vehicle(
        &mut self,
        id: VehicleId,
        role: NetRole,
        body: B,
        tuning: VehicleTuning,
    ) -> Result<(), ReplicationError> {
        if self.vehicles.contains_key(&id) {
            return Err(ReplicationError::DuplicateVehicle(id));
        }

        let vehicle = ReplicatedVehicle::new(id, role, body, tuning, self.config)?;
        self.vehicles.insert(id, vehicle);
        tracing::debug!(vehicle_id = id, %role, "spawned vehicle");
        Ok(())
    }

    pub fn despawn_vehicle(&mut self, id: VehicleId) -> Option<ReplicatedVehicle<B>> {
        self.vehicles.remove(&id)
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&ReplicatedVehicle<B>> {
        self.vehicles.get(&id)
    }

    pub fn vehicle_mut(&mut self, id: VehicleId) -> Option<&mut ReplicatedVehicle<B>> {
        self.vehicles.get_mut(&id)
    }

    /// Hosted vehicle ids in ascending order.
    pub fn vehicle_ids(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.vehicles.keys().copied()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Tick every hosted vehicle in ascending id order.
    pub fn tick(
        &mut self,
        delta_time: Seconds,
        clock: &dyn Clock,
        world: &dyn WorldContext,
        transport: &mut dyn Transport,
    ) {
        for vehicle in self.vehicles.values_mut() {
            vehicle.tick(delta_time, clock, world, transport);
        }
    }

    /// Route an input from a controlling client.
    pub fn receive_input(
        &mut self,
        vehicle_id: VehicleId,
        input: &MotionInput,
        clock: &dyn Clock,
        world: &dyn WorldContext,
    ) -> ValidationResult {
        let Some(vehicle) = self.vehicles.get_mut(&vehicle_id) else {
            tracing::warn!(vehicle_id, "input for unknown vehicle");
            return ValidationResult::DroppedUnknownVehicle;
        };
        vehicle.on_input_received(input, clock, world)
    }

    /// Route a snapshot replicated by the authority.
    pub fn receive_state(
        &mut self,
        vehicle_id: VehicleId,
        state: &AuthoritativeState,
        world: &dyn WorldContext,
    ) -> StateOutcome {
        let Some(vehicle) = self.vehicles.get_mut(&vehicle_id) else {
            tracing::warn!(vehicle_id, "snapshot for unknown vehicle");
            return StateOutcome::UnknownVehicle;
        };
        vehicle.on_authoritative_state_received(state, world)
    }

    /// Decode and route one encoded frame.
    pub fn receive_frame(
        &mut self,
        bytes: &[u8],
        clock: &dyn Clock,
        world: &dyn WorldContext,
    ) -> Result<Delivery, ReplicationError> {
        let delivery = match decode_frame(bytes)? {
            Frame::SendInput { vehicle_id, input } => Delivery::Input {
                vehicle_id,
                result: self.receive_input(vehicle_id, &input, clock, world),
            },
            Frame::ReplicateState { vehicle_id, state } => Delivery::State {
                vehicle_id,
                outcome: self.receive_state(vehicle_id, &state, world),
            },
        };
        Ok(delivery)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use kartsync_sim::{DVec3, FreeBody, Pose, StandardGravity};

    const DT: Seconds = 1.0 / 60.0;
    const KART: VehicleId = 1;

    fn participant() -> Participant<FreeBody> {
        Participant::new(ReplicationConfig::default()).expect("default config")
    }

    fn spawn(participant: &mut Participant<FreeBody>, id: VehicleId, role: NetRole) {
        participant
            .spawn_vehicle(id, role, FreeBody::default(), VehicleTuning::default())
            .expect("spawn");
    }

    fn remote_authority() -> NetRole {
        NetRole::Authority {
            locally_controlled: false,
        }
    }

    fn deliver(
        frames: Vec<Vec<u8>>,
        to: &mut [&mut Participant<FreeBody>],
        clock: &dyn Clock,
        world: &dyn WorldContext,
    ) {
        for frame in frames {
            for participant in to.iter_mut() {
                participant
                    .receive_frame(&frame, clock, world)
                    .expect("valid frame");
            }
        }
    }

    #[test]
    fn test_replication_interval() {
        let mut config = ReplicationConfig::default();
        assert_eq!(config.replication_interval(), None);

        config.net_update_frequency_hz = Some(20.0);
        assert_eq!(config.replication_interval(), Some(0.05));

        config.net_update_frequency_hz = Some(0.0);
        assert_eq!(config.replication_interval(), None);
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(ReplicationConfig::default().validate(), Ok(()));

        for interval in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = ReplicationConfig {
                min_update_interval: interval,
                ..ReplicationConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidMinUpdateInterval(_))
            ));
        }

        let config = ReplicationConfig {
            max_unacknowledged_inputs: 0,
            ..ReplicationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyInputLog));
    }

    #[test]
    fn test_zero_update_interval_rejected_at_construction() {
        let config = ReplicationConfig {
            min_update_interval: 0.0,
            ..ReplicationConfig::default()
        };
        let result = Participant::<FreeBody>::new(config);
        assert!(matches!(
            result,
            Err(ReplicationError::InvalidConfig(
                ConfigError::InvalidMinUpdateInterval(_)
            ))
        ));
    }

    #[test]
    fn test_duplicate_spawn_rejected() {
        let mut host = participant();
        spawn(&mut host, KART, NetRole::Observer);

        let result = host.spawn_vehicle(
            KART,
            NetRole::Controller,
            FreeBody::default(),
            VehicleTuning::default(),
        );

        assert!(matches!(result, Err(ReplicationError::DuplicateVehicle(KART))));
        assert_eq!(host.vehicle(KART).map(|v| v.role()), Some(NetRole::Observer));
    }

    #[test]
    fn test_despawn() {
        let mut host = participant();
        spawn(&mut host, KART, NetRole::Observer);

        assert!(host.despawn_vehicle(KART).is_some());
        assert!(host.despawn_vehicle(KART).is_none());
        assert_eq!(host.vehicle_count(), 0);
    }

    #[test]
    fn test_unknown_vehicle_is_a_noop() {
        let mut host = participant();
        let world = StandardGravity::default();

        let input = host.receive_input(
            99,
            &MotionInput::new(1.0, 0.0, DT, 0.0),
            &ManualClock::new(10.0),
            &world,
        );
        let state = host.receive_state(99, &AuthoritativeState::default(), &world);

        assert_eq!(input, ValidationResult::DroppedUnknownVehicle);
        assert_eq!(state, StateOutcome::UnknownVehicle);
    }

    #[test]
    fn test_garbage_frame_is_an_error() {
        let mut host = participant();
        let result = host.receive_frame(
            &[0xff, 0xff, 0xff],
            &ManualClock::new(0.0),
            &StandardGravity::default(),
        );
        assert!(matches!(result, Err(ReplicationError::Wire(_))));
    }

    #[test]
    fn test_tick_in_ascending_id_order() {
        let mut host = participant();
        for id in [30, 10, 20] {
            spawn(&mut host, id, NetRole::Controller);
        }
        let mut outbox = Outbox::new();

        host.tick(
            DT,
            &ManualClock::new(0.0),
            &StandardGravity::default(),
            &mut outbox,
        );

        let ids: Vec<VehicleId> = outbox
            .drain()
            .into_iter()
            .map(|message| match message {
                Outbound::Input { vehicle_id, .. } | Outbound::State { vehicle_id, .. } => {
                    vehicle_id
                }
            })
            .collect();
        assert_eq!(ids, vec![10, 20, 30]);
        assert_eq!(host.vehicle_ids().collect::<Vec<_>>(), vec![10, 20, 30]);
    }

    #[test]
    fn test_end_to_end_over_encoded_frames() {
        let world = StandardGravity::default();
        // Server clock runs ahead so each claimed step lands behind it
        let server_clock = ManualClock::new(10.0);
        let client_clock = ManualClock::synced(0.0, 10.0);

        let mut server = participant();
        let mut driver = participant();
        let mut spectator = participant();
        spawn(&mut server, KART, remote_authority());
        spawn(&mut driver, KART, NetRole::Controller);
        spawn(&mut spectator, KART, NetRole::Observer);

        if let Some(kart) = driver.vehicle_mut(KART) {
            kart.set_throttle(1.0);
            kart.set_steering(0.25);
        }

        let mut driver_out = EncodedOutbox::new();
        let mut server_out = EncodedOutbox::new();
        let mut spectator_out = EncodedOutbox::new();

        for _ in 0..30 {
            server_clock.advance(DT);
            client_clock.advance(DT);

            driver.tick(DT, &client_clock, &world, &mut driver_out);
            deliver(driver_out.drain(), &mut [&mut server], &server_clock, &world);

            server.tick(DT, &server_clock, &world, &mut server_out);
            deliver(
                server_out.drain(),
                &mut [&mut driver, &mut spectator],
                &client_clock,
                &world,
            );

            spectator.tick(DT, &client_clock, &world, &mut spectator_out);
        }

        let server_kart = server.vehicle(KART).expect("server kart");
        let driver_kart = driver.vehicle(KART).expect("driver kart");
        let spectator_kart = spectator.vehicle(KART).expect("spectator kart");

        assert!(server_kart.body().position().x > 0.0);
        assert_eq!(server_kart.simulated_time().map(|t| t > 0.0), Some(true));

        // Every input was acknowledged, so the controller sits exactly on the
        // authority with nothing left to replay
        assert_eq!(driver_kart.body().pose(), server_kart.body().pose());
        assert_eq!(driver_kart.velocity(), server_kart.velocity());
        assert_eq!(driver_kart.unacknowledged_inputs().map(|log| log.len()), Some(0));

        // The spectator's body follows snapshots; its rendered pose trails it
        assert_eq!(spectator_kart.body().pose(), server_kart.body().pose());
        let lag = spectator_kart.rendered_pose().position - server_kart.body().position();
        assert!(lag.length() < 100.0);
        assert!(spectator_out.is_empty());
    }

    #[test]
    fn test_lost_snapshot_reconciles_without_correction() {
        let world = StandardGravity::default();
        let server_clock = ManualClock::new(10.0);
        let client_clock = ManualClock::synced(0.0, 10.0);

        let mut server = participant();
        let mut driver = participant();
        spawn(&mut server, KART, remote_authority());
        spawn(&mut driver, KART, NetRole::Controller);
        if let Some(kart) = driver.vehicle_mut(KART) {
            kart.set_throttle(0.8);
            kart.set_steering(-0.5);
        }

        let mut driver_out = Outbox::new();
        let mut server_out = Outbox::new();

        // Three predicted steps; the authority sees all three but only the
        // snapshot after the first one survives the trip back
        let mut snapshots = Vec::new();
        for _ in 0..3 {
            server_clock.advance(DT);
            client_clock.advance(DT);
            driver.tick(DT, &client_clock, &world, &mut driver_out);
            for message in driver_out.drain() {
                if let Outbound::Input { vehicle_id, input } = message {
                    assert!(
                        server
                            .receive_input(vehicle_id, &input, &server_clock, &world)
                            .is_accepted()
                    );
                }
            }
            server.tick(DT, &server_clock, &world, &mut server_out);
            snapshots.extend(server_out.drain());
        }
        assert_eq!(snapshots.len(), 3);

        let predicted = driver.vehicle(KART).map(|v| v.body().pose());
        let Outbound::State { vehicle_id, state } = &snapshots[0] else {
            panic!("expected a snapshot");
        };
        let outcome = driver.receive_state(*vehicle_id, state, &world);

        assert_eq!(
            outcome,
            StateOutcome::Reconciled {
                pruned: 1,
                replayed: 2
            }
        );
        assert_eq!(driver.vehicle(KART).map(|v| v.body().pose()), predicted);
    }

    #[test]
    fn test_speed_hack_is_capped_by_server_clock() {
        let world = StandardGravity::default();
        let server_clock = ManualClock::new(1.0);
        let mut server = participant();
        spawn(&mut server, KART, remote_authority());

        // Claims of 0.3 s each against one second of server time
        let results: Vec<bool> = (0..5)
            .map(|i| {
                let input = MotionInput::new(1.0, 0.0, 0.3, f64::from(i) * 0.3);
                server
                    .receive_input(KART, &input, &server_clock, &world)
                    .is_accepted()
            })
            .collect();

        assert_eq!(results, vec![true, true, true, false, false]);
        let simulated = server.vehicle(KART).and_then(|v| v.simulated_time());
        assert!(simulated.is_some_and(|t| (t - 0.9).abs() < 1e-12));
    }

    #[test]
    fn test_observer_never_sends() {
        let mut host = participant();
        spawn(&mut host, KART, NetRole::Observer);
        let mut outbox = Outbox::new();

        host.tick(
            DT,
            &ManualClock::new(0.0),
            &StandardGravity::default(),
            &mut outbox,
        );

        assert!(outbox.is_empty());
        assert_eq!(
            host.vehicle(KART).map(|v| v.rendered_pose()),
            Some(Pose::at(DVec3::ZERO))
        );
    }
}
