//! Message types for the UI link
//!
//! Message types are divided into two categories:
//! - UI → controller: operator commands, heartbeat requests
//! - Controller → UI: command replies, events, samples, heartbeat responses
//!
//! Every command gets exactly one [`RigMessage::Accepted`] or
//! [`RigMessage::Rejected`] reply, in order.

use resistrig_core::controller::SafetyCircuitError;
use resistrig_core::config::RunRequest;
use resistrig_core::range::RangeMode;
use resistrig_core::recorder::Sample;
use resistrig_core::sequencer::{ManualRelayError, RunError, RunHandle, StartError};
use resistrig_core::state::RigEvent;
use resistrig_core::traits::{HardwareError, RelayId, RelayState};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::frame::{Frame, FrameError, MAX_PAYLOAD_SIZE};

// Message type IDs: UI → controller
pub const MSG_COMMAND: u8 = 0x01;
pub const MSG_PING: u8 = 0x02;

// Message type IDs: controller → UI
pub const MSG_EVENT: u8 = 0x20;
pub const MSG_SAMPLE: u8 = 0x21;
pub const MSG_ACCEPTED: u8 = 0x22;
pub const MSG_REJECTED: u8 = 0x23;
pub const MSG_PONG: u8 = 0x24;

/// Message encode/decode errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageError {
    Frame(FrameError),
    /// Body did not fit in a frame
    Encode,
    /// Body did not decode as the type's message
    Decode,
    /// Frame type not known in this direction
    UnknownType(u8),
}

impl From<FrameError> for MessageError {
    fn from(e: FrameError) -> Self {
        MessageError::Frame(e)
    }
}

/// Operator command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatorCommand {
    StartRun(RunRequest),
    AbortRun(RunHandle),
    SetManualRelay { relay: RelayId, state: RelayState },
    AcknowledgeBreakdown,
    ArmSafetyCircuit,
    DisarmSafetyCircuit,
    SetRangeMode(RangeMode),
}

/// Messages from the UI to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UiMessage {
    Command(OperatorCommand),
    /// Heartbeat request
    Ping,
}

impl UiMessage {
    pub fn to_frame(&self) -> Result<Frame, MessageError> {
        match self {
            UiMessage::Command(command) => body_frame(MSG_COMMAND, command),
            UiMessage::Ping => Ok(Frame::empty(MSG_PING)),
        }
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, MessageError> {
        match frame.msg_type {
            MSG_COMMAND => Ok(UiMessage::Command(body(frame)?)),
            MSG_PING => Ok(UiMessage::Ping),
            other => Err(MessageError::UnknownType(other)),
        }
    }
}

/// Successful command reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Accepted {
    /// A run was started
    RunStarted(RunHandle),
    /// The command took effect
    Done,
}

/// Why a command was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rejection {
    Start(StartError),
    Run(RunError),
    ManualRelay(ManualRelayError),
    SafetyCircuit(SafetyCircuitError),
    Range(HardwareError),
    /// Acknowledge with no breakdown pending
    NoBreakdownPending,
}

/// Messages from the controller to the UI
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RigMessage {
    Event(RigEvent),
    Sample(Sample),
    Accepted(Accepted),
    Rejected(Rejection),
    /// Heartbeat response
    Pong,
}

impl RigMessage {
    pub fn to_frame(&self) -> Result<Frame, MessageError> {
        match self {
            RigMessage::Event(event) => body_frame(MSG_EVENT, event),
            RigMessage::Sample(sample) => body_frame(MSG_SAMPLE, sample),
            RigMessage::Accepted(accepted) => body_frame(MSG_ACCEPTED, accepted),
            RigMessage::Rejected(rejection) => body_frame(MSG_REJECTED, rejection),
            RigMessage::Pong => Ok(Frame::empty(MSG_PONG)),
        }
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, MessageError> {
        match frame.msg_type {
            MSG_EVENT => Ok(RigMessage::Event(body(frame)?)),
            MSG_SAMPLE => Ok(RigMessage::Sample(body(frame)?)),
            MSG_ACCEPTED => Ok(RigMessage::Accepted(body(frame)?)),
            MSG_REJECTED => Ok(RigMessage::Rejected(body(frame)?)),
            MSG_PONG => Ok(RigMessage::Pong),
            other => Err(MessageError::UnknownType(other)),
        }
    }
}

fn body_frame<T: Serialize>(msg_type: u8, value: &T) -> Result<Frame, MessageError> {
    let mut buffer = [0u8; MAX_PAYLOAD_SIZE];
    let used = postcard::to_slice(value, &mut buffer).map_err(|_| MessageError::Encode)?;
    Ok(Frame::new(msg_type, used)?)
}

fn body<T: DeserializeOwned>(frame: &Frame) -> Result<T, MessageError> {
    postcard::from_bytes(&frame.payload).map_err(|_| MessageError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameParser;
    use resistrig_core::config::{MeasurementSpeed, Timing};
    use resistrig_core::config::ConfigError;
    use resistrig_core::range::MeasurementRange;
    use resistrig_core::state::{AbortReason, Phase};
    use resistrig_core::traits::SourceKind;

    fn over_the_wire(frame: &Frame) -> Frame {
        let encoded = frame.encode_to_vec().unwrap();
        let (parsed, _) = FrameParser::new().feed_bytes(&encoded).unwrap();
        parsed.unwrap()
    }

    #[test]
    fn test_start_run_command() {
        let request = RunRequest::pdc(SourceKind::Electrometer, -500, 60, 600, 600)
            .with_label("pet-film-3");
        let message = UiMessage::Command(OperatorCommand::StartRun(request));
        let frame = over_the_wire(&message.to_frame().unwrap());
        assert_eq!(frame.msg_type, MSG_COMMAND);
        assert_eq!(UiMessage::from_frame(&frame), Ok(message));
    }

    #[test]
    fn test_ping_has_no_body() {
        let frame = UiMessage::Ping.to_frame().unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(RigMessage::Pong.to_frame().unwrap().msg_type, MSG_PONG);
    }

    #[test]
    fn test_rejection_carries_config_error() {
        let rejected = RigMessage::Rejected(Rejection::Start(StartError::Config(
            ConfigError::MissingTiming(Timing::T3),
        )));
        let frame = over_the_wire(&rejected.to_frame().unwrap());
        assert_eq!(RigMessage::from_frame(&frame), Ok(rejected));
    }

    #[test]
    fn test_sample_and_event_stream() {
        let sample = Sample {
            run: 4,
            seq: 17,
            timestamp_ms: 123_456,
            elapsed_ms: 17_000,
            phase: Phase::Polarize,
            voltage: Some(1013.6),
            current: Some(-2.5e3),
            temperature: Some(23.5),
            humidity: None,
            range: MeasurementRange::new(5).unwrap(),
            speed: MeasurementSpeed::Stable,
        };
        let frame = over_the_wire(&RigMessage::Sample(sample).to_frame().unwrap());
        assert_eq!(RigMessage::from_frame(&frame), Ok(RigMessage::Sample(sample)));

        let event = RigMessage::Event(RigEvent::RunAborted {
            run: 4,
            reason: AbortReason::InterlockOpened,
        });
        let frame = over_the_wire(&event.to_frame().unwrap());
        assert_eq!(RigMessage::from_frame(&frame), Ok(event));
    }

    #[test]
    fn test_direction_is_checked() {
        let frame = RigMessage::Pong.to_frame().unwrap();
        assert_eq!(
            UiMessage::from_frame(&frame),
            Err(MessageError::UnknownType(MSG_PONG))
        );
    }

    #[test]
    fn test_range_index_above_top_is_rejected() {
        let message = UiMessage::Command(OperatorCommand::SetRangeMode(RangeMode::Manual(
            MeasurementRange::TOP,
        )));
        let frame = message.to_frame().unwrap();
        assert_eq!(frame.payload.last(), Some(&11));
        assert_eq!(UiMessage::from_frame(&frame), Ok(message));

        let mut payload = frame.payload.clone();
        let last = payload.len() - 1;
        payload[last] = 100;
        let tampered = Frame::new(MSG_COMMAND, &payload).unwrap();
        assert_eq!(UiMessage::from_frame(&tampered), Err(MessageError::Decode));
    }

    #[test]
    fn test_garbage_body_is_decode_error() {
        let frame = Frame::new(MSG_COMMAND, &[0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(UiMessage::from_frame(&frame), Err(MessageError::Decode));
    }
}
