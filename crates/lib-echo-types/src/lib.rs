//! # lib-echo-types
//!
//! Core type definitions for the Echo AIO/ATS driver binding.
//!
//! This crate provides the vocabulary shared by the binding layer and its
//! callers:
//! - Status codes returned by every fallible driver call
//! - Module slots and module parameter identifiers (AIO-C, AIO-T, AIO-H)
//! - Device, gain and mode enumerations
//! - Aggregate records describing a connected device and its channels
//!
//! Nothing here talks to the driver; see `lib-echo-ffi` for that.

pub mod status;
pub mod params;
pub mod device;

pub use status::*;
pub use params::*;
pub use device::*;

/// Name of the broadcast event the driver raises when a control changes.
pub const NOTIFICATION_STRING: &str = "Echo AIO control change";

/// Number of audio module slots on an AIO chassis.
pub const NUM_MODULE_SLOTS: usize = 2;
