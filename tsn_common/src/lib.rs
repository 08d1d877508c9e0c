//! TSN Data Plane Common Library
//!
//! Shared leaf crate for the TSN cyclic data plane workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Wire-format and scheduling constants
//! - [`time`] - Carry-safe TAI time arithmetic and OPC UA time conversion
//! - [`axis`] - Axis identifiers, control/feedback value structs
//! - [`config`] - TOML configuration loading and validation

pub mod axis;
pub mod config;
pub mod consts;
pub mod time;
