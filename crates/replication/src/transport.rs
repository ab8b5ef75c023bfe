//! Transport collaborator.
//!
//! The network runtime owns delivery. The core only asks it to send an input
//! to the authority and to replicate a snapshot to peers; inbound traffic is
//! handed back through [`crate::Participant`].

use kartsync_sim::{AuthoritativeState, MotionInput, VehicleId};
use kartsync_wire::{Frame, encode_frame};

/// Outbound half of the network runtime.
pub trait Transport {
    /// Reliable controller → authority call.
    fn send_input(&mut self, vehicle_id: VehicleId, input: &MotionInput);

    /// Authority → all peers. Receivers get the whole snapshot or nothing.
    fn replicate(&mut self, vehicle_id: VehicleId, state: &AuthoritativeState);
}

/// Outbound message captured by [`Outbox`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Input {
        vehicle_id: VehicleId,
        input: MotionInput,
    },
    State {
        vehicle_id: VehicleId,
        state: AuthoritativeState,
    },
}

/// Collects outbound messages in send order.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Outbound>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Outbound] {
        &self.messages
    }

    pub fn drain(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.messages)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Transport for Outbox {
    fn send_input(&mut self, vehicle_id: VehicleId, input: &MotionInput) {
        self.messages.push(Outbound::Input {
            vehicle_id,
            input: *input,
        });
    }

    fn replicate(&mut self, vehicle_id: VehicleId, state: &AuthoritativeState) {
        self.messages.push(Outbound::State {
            vehicle_id,
            state: *state,
        });
    }
}

/// Encodes outbound messages into wire frames.
#[derive(Debug, Default)]
pub struct EncodedOutbox {
    frames: Vec<Vec<u8>>,
}

impl EncodedOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.frames)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Transport for EncodedOutbox {
    fn send_input(&mut self, vehicle_id: VehicleId, input: &MotionInput) {
        self.frames.push(encode_frame(&Frame::SendInput {
            vehicle_id,
            input: *input,
        }));
    }

    fn replicate(&mut self, vehicle_id: VehicleId, state: &AuthoritativeState) {
        self.frames.push(encode_frame(&Frame::ReplicateState {
            vehicle_id,
            state: *state,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kartsync_wire::decode_frame;

    #[test]
    fn test_outbox_keeps_send_order() {
        let mut outbox = Outbox::new();
        let input = MotionInput::new(1.0, 0.0, 0.1, 1.0);
        outbox.send_input(4, &input);
        outbox.replicate(4, &AuthoritativeState::default());

        let messages = outbox.drain();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            Outbound::Input {
                vehicle_id: 4,
                input
            }
        );
        assert!(matches!(messages[1], Outbound::State { vehicle_id: 4, .. }));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_encoded_outbox_frames_decode() {
        let mut outbox = EncodedOutbox::new();
        let input = MotionInput::new(-0.5, 0.25, 0.05, 2.0);
        outbox.send_input(9, &input);

        let frames = outbox.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            decode_frame(&frames[0]).unwrap(),
            Frame::SendInput {
                vehicle_id: 9,
                input
            }
        );
    }
}
