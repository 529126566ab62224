//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the capability traits
//! defined in resistrig-core:
//!
//! - GPIO relay board (SAFETY, HV, GND, signal lamp)
//! - GPIO interlock inputs (S1, S2) with per-switch polarity
//! - HV probe correction and electrometer reply normalization
//! - Simulated bench rig with a dielectric response model (`std` feature)

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod interlock;
pub mod probe;
pub mod relay;
#[cfg(any(test, feature = "std"))]
pub mod sim;

pub use interlock::{GpioInterlock, Polarity};
pub use relay::GpioRelayBoard;
