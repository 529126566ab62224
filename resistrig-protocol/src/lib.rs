//! Rig UI link protocol
//!
//! This crate defines the link between the rig controller and an operator
//! UI. The UI sends operator commands; the controller answers each command
//! and streams events and samples. The transport is any byte stream (TCP on
//! the host, UART on a bench panel).
//!
//! # Protocol Overview
//!
//! All messages use one binary frame format:
//! ```text
//! ┌───────┬────────┬──────┬─────────────┬───────┐
//! │ START │ LENGTH │ TYPE │ PAYLOAD     │ CRC-8 │
//! │ 1B    │ 1B     │ 1B   │ 0–250B      │ 1B    │
//! └───────┴────────┴──────┴─────────────┴───────┘
//! ```
//!
//! Payloads are `postcard`-encoded core types, so the UI and the controller
//! share one definition of runs, events and errors.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod frame;
pub mod messages;

pub use frame::{Frame, FrameError, FrameParser, FRAME_START, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
pub use messages::{Accepted, MessageError, OperatorCommand, Rejection, RigMessage, UiMessage};
