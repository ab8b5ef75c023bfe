//! KartSync Wire Protocol Types
//!
//! This crate defines the Protobuf messages exchanged between participants.
//! Every participant MUST depend on this crate so that all of them agree on
//! one schema.
//!
//! # Message Categories
//!
//! - **Server-bound input** (reliable): a controller's [`MotionInput`] for one
//!   vehicle, validated by the authority before it has any effect.
//! - **Replicated state** (authority → everyone): the latest
//!   [`AuthoritativeState`] of one vehicle, overwritten wholesale on change.
//!
//! This is a logical schema. Floats travel as `double`, so values survive the
//! round trip exactly, apart from the sign of zero, and a controller replays
//! from the state the authority produced.

#![deny(unsafe_code)]

use kartsync_sim::{AuthoritativeState, DQuat, DVec3, MotionInput, Pose, VehicleId};
use prost::Message;

// ============================================================================
// Errors
// ============================================================================

/// Failure to turn bytes or protobuf messages into simulation types.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("failed to decode frame: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("orientation quaternion is zero-length or non-finite")]
    DegenerateOrientation,
    #[error("frame carries no payload")]
    EmptyFrame,
}

// ============================================================================
// Primitive Messages
// ============================================================================

/// 3-component vector.
#[derive(Clone, PartialEq, Message)]
pub struct Vec3Proto {
    #[prost(double, tag = "1")]
    pub x: f64,

    #[prost(double, tag = "2")]
    pub y: f64,

    #[prost(double, tag = "3")]
    pub z: f64,
}

/// Rotation quaternion.
#[derive(Clone, PartialEq, Message)]
pub struct QuatProto {
    #[prost(double, tag = "1")]
    pub x: f64,

    #[prost(double, tag = "2")]
    pub y: f64,

    #[prost(double, tag = "3")]
    pub z: f64,

    #[prost(double, tag = "4")]
    pub w: f64,
}

/// World position (centimeters) plus orientation.
#[derive(Clone, PartialEq, Message)]
pub struct PoseProto {
    #[prost(message, optional, tag = "1")]
    pub position: Option<Vec3Proto>,

    #[prost(message, optional, tag = "2")]
    pub orientation: Option<QuatProto>,
}

// ============================================================================
// Motion Messages
// ============================================================================

/// Driver intent for one simulation step (4 floats).
#[derive(Clone, PartialEq, Message)]
pub struct MotionInputProto {
    #[prost(double, tag = "1")]
    pub throttle: f64,

    #[prost(double, tag = "2")]
    pub steering: f64,

    /// Step length in seconds.
    #[prost(double, tag = "3")]
    pub delta_time: f64,

    /// Server clock seconds.
    #[prost(double, tag = "4")]
    pub timestamp: f64,
}

/// Authority snapshot of one vehicle.
#[derive(Clone, PartialEq, Message)]
pub struct AuthoritativeStateProto {
    #[prost(message, optional, tag = "1")]
    pub last_input: Option<MotionInputProto>,

    /// Meters per second.
    #[prost(message, optional, tag = "2")]
    pub velocity: Option<Vec3Proto>,

    #[prost(message, optional, tag = "3")]
    pub pose: Option<PoseProto>,
}

// ============================================================================
// Frames
// ============================================================================

/// Controller → authority remote call.
#[derive(Clone, PartialEq, Message)]
pub struct SendInputProto {
    #[prost(uint64, tag = "1")]
    pub vehicle_id: VehicleId,

    #[prost(message, optional, tag = "2")]
    pub input: Option<MotionInputProto>,
}

/// Authority → everyone replicated property.
#[derive(Clone, PartialEq, Message)]
pub struct ReplicateStateProto {
    #[prost(uint64, tag = "1")]
    pub vehicle_id: VehicleId,

    #[prost(message, optional, tag = "2")]
    pub state: Option<AuthoritativeStateProto>,
}

/// Envelope carried by the transport.
#[derive(Clone, PartialEq, Message)]
pub struct NetFrameProto {
    #[prost(oneof = "net_frame_proto::Payload", tags = "1, 2")]
    pub payload: Option<net_frame_proto::Payload>,
}

pub mod net_frame_proto {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        SendInput(super::SendInputProto),

        #[prost(message, tag = "2")]
        ReplicateState(super::ReplicateStateProto),
    }
}

/// Decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    SendInput {
        vehicle_id: VehicleId,
        input: MotionInput,
    },
    ReplicateState {
        vehicle_id: VehicleId,
        state: AuthoritativeState,
    },
}

impl Frame {
    pub fn vehicle_id(&self) -> VehicleId {
        match self {
            Self::SendInput { vehicle_id, .. } | Self::ReplicateState { vehicle_id, .. } => {
                *vehicle_id
            }
        }
    }
}

/// Encode a frame for the transport.
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    NetFrameProto::from(frame.clone()).encode_to_vec()
}

/// Decode a frame received from the transport.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, WireError> {
    NetFrameProto::decode(bytes)?.try_into()
}

// ============================================================================
// Conversion Traits
// ============================================================================

impl From<DVec3> for Vec3Proto {
    fn from(v: DVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3Proto> for DVec3 {
    fn from(v: Vec3Proto) -> Self {
        DVec3::new(v.x, v.y, v.z)
    }
}

impl From<DQuat> for QuatProto {
    fn from(q: DQuat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}

impl TryFrom<QuatProto> for DQuat {
    type Error = WireError;

    /// Not renormalized: the receiver must see the authority's exact bits.
    fn try_from(q: QuatProto) -> Result<Self, Self::Error> {
        let quat = DQuat::from_xyzw(q.x, q.y, q.z, q.w);
        if !quat.is_finite() || quat.length_squared() < 1.0e-12 {
            return Err(WireError::DegenerateOrientation);
        }
        Ok(quat)
    }
}

impl From<Pose> for PoseProto {
    fn from(p: Pose) -> Self {
        Self {
            position: Some(p.position.into()),
            orientation: Some(p.orientation.into()),
        }
    }
}

impl TryFrom<PoseProto> for Pose {
    type Error = WireError;

    fn try_from(p: PoseProto) -> Result<Self, Self::Error> {
        let position = p.position.ok_or(WireError::MissingField("pose.position"))?;
        let orientation = p
            .orientation
            .ok_or(WireError::MissingField("pose.orientation"))?;
        Ok(Pose::new(position.into(), orientation.try_into()?))
    }
}

impl From<MotionInput> for MotionInputProto {
    fn from(i: MotionInput) -> Self {
        Self {
            throttle: i.throttle,
            steering: i.steering,
            delta_time: i.delta_time,
            timestamp: i.timestamp,
        }
    }
}

impl From<MotionInputProto> for MotionInput {
    fn from(i: MotionInputProto) -> Self {
        MotionInput::new(i.throttle, i.steering, i.delta_time, i.timestamp)
    }
}

impl From<AuthoritativeState> for AuthoritativeStateProto {
    fn from(s: AuthoritativeState) -> Self {
        Self {
            last_input: Some(s.last_input.into()),
            velocity: Some(s.velocity.into()),
            pose: Some(s.pose.into()),
        }
    }
}

impl TryFrom<AuthoritativeStateProto> for AuthoritativeState {
    type Error = WireError;

    fn try_from(s: AuthoritativeStateProto) -> Result<Self, Self::Error> {
        let last_input = s
            .last_input
            .ok_or(WireError::MissingField("state.last_input"))?;
        let velocity = s.velocity.ok_or(WireError::MissingField("state.velocity"))?;
        let pose = s.pose.ok_or(WireError::MissingField("state.pose"))?;
        Ok(AuthoritativeState::new(
            last_input.into(),
            velocity.into(),
            pose.try_into()?,
        ))
    }
}

impl From<Frame> for NetFrameProto {
    fn from(frame: Frame) -> Self {
        let payload = match frame {
            Frame::SendInput { vehicle_id, input } => {
                net_frame_proto::Payload::SendInput(SendInputProto {
                    vehicle_id,
                    input: Some(input.into()),
                })
            }
            Frame::ReplicateState { vehicle_id, state } => {
                net_frame_proto::Payload::ReplicateState(ReplicateStateProto {
                    vehicle_id,
                    state: Some(state.into()),
                })
            }
        };
        Self {
            payload: Some(payload),
        }
    }
}

impl TryFrom<NetFrameProto> for Frame {
    type Error = WireError;

    fn try_from(frame: NetFrameProto) -> Result<Self, Self::Error> {
        match frame.payload.ok_or(WireError::EmptyFrame)? {
            net_frame_proto::Payload::SendInput(msg) => Ok(Frame::SendInput {
                vehicle_id: msg.vehicle_id,
                input: msg.input.ok_or(WireError::MissingField("input"))?.into(),
            }),
            net_frame_proto::Payload::ReplicateState(msg) => Ok(Frame::ReplicateState {
                vehicle_id: msg.vehicle_id,
                state: msg
                    .state
                    .ok_or(WireError::MissingField("state"))?
                    .try_into()?,
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> AuthoritativeState {
        AuthoritativeState::new(
            MotionInput::new(0.75, -0.25, 1.0 / 60.0, 12.345),
            DVec3::new(4.1, -0.3, 0.0),
            Pose::new(
                DVec3::new(1234.5, -67.25, 10.0),
                DQuat::from_rotation_z(0.731),
            ),
        )
    }

    #[test]
    fn test_state_frame_roundtrip_is_bit_exact() {
        let frame = Frame::ReplicateState {
            vehicle_id: 7,
            state: sample_state(),
        };

        let decoded = decode_frame(&encode_frame(&frame)).unwrap();
        assert_eq!(decoded, frame);

        let Frame::ReplicateState { state, .. } = decoded else {
            panic!("expected a state frame");
        };
        assert_eq!(state.digest(), sample_state().digest());
    }

    #[test]
    fn test_input_frame_roundtrip() {
        let frame = Frame::SendInput {
            vehicle_id: 3,
            input: MotionInput::new(1.0, 0.0, 0.1, 5.0),
        };
        let decoded = decode_frame(&encode_frame(&frame)).unwrap();
        assert_eq!(decoded.vehicle_id(), 3);
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_empty_frame_rejected() {
        let bytes = NetFrameProto { payload: None }.encode_to_vec();
        assert!(matches!(decode_frame(&bytes), Err(WireError::EmptyFrame)));
    }

    #[test]
    fn test_missing_input_rejected() {
        let bytes = NetFrameProto {
            payload: Some(net_frame_proto::Payload::SendInput(SendInputProto {
                vehicle_id: 1,
                input: None,
            })),
        }
        .encode_to_vec();
        assert!(matches!(
            decode_frame(&bytes),
            Err(WireError::MissingField("input"))
        ));
    }

    #[test]
    fn test_missing_pose_rejected() {
        let mut proto = AuthoritativeStateProto::from(sample_state());
        proto.pose = None;
        assert!(matches!(
            AuthoritativeState::try_from(proto),
            Err(WireError::MissingField("state.pose"))
        ));
    }

    #[test]
    fn test_degenerate_orientation_rejected() {
        let zero = QuatProto {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 0.0,
        };
        assert!(matches!(
            DQuat::try_from(zero),
            Err(WireError::DegenerateOrientation)
        ));

        let nan = QuatProto {
            x: f64::NAN,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        };
        assert!(matches!(
            DQuat::try_from(nan),
            Err(WireError::DegenerateOrientation)
        ));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let result = decode_frame(&[0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert!(matches!(result, Err(WireError::Decode(_))));
    }

    /// Out-of-range controls are transported as-is; the authority validates.
    #[test]
    fn test_out_of_range_input_survives_transport() {
        let frame = Frame::SendInput {
            vehicle_id: 1,
            input: MotionInput::new(3.0, -2.0, 0.1, 1.0),
        };
        assert_eq!(decode_frame(&encode_frame(&frame)).unwrap(), frame);
    }
}
