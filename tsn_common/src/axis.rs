//! Axis identifiers, Ethernet addressing and control/feedback values.
//!
//! These are the in-memory counterparts of the two wire dataset shapes:
//! a [`ControlInfo`] snapshot carries every setpoint the controller
//! publishes per cycle, an [`AxisInfo`] carries one axis' value plus its
//! boolean (enable on the way out, fault on the way back).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{DEST_MAC_AXIS, DEST_MAC_CONTROL, WRITER_ID_AXIS};

// ─── Ethernet addressing ────────────────────────────────────────────

/// A 48-bit Ethernet MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

/// Error parsing a MAC address from its colon-separated form.
#[derive(Debug, Clone, Error)]
#[error("invalid MAC address '{0}'")]
pub struct MacParseError(pub String);

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| MacParseError(s.to_string()))?;
            *octet =
                u8::from_str_radix(part, 16).map_err(|_| MacParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(MacParseError(s.to_string()));
        }
        Ok(MacAddr(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl MacAddr {
    /// Multicast destination of the control publisher.
    pub const CONTROL: MacAddr = MacAddr(DEST_MAC_CONTROL);
}

// ─── Axis identity ──────────────────────────────────────────────────

/// Identifies one of the four axes of the demo cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
#[serde(rename_all = "lowercase")]
pub enum AxisId {
    /// X linear axis.
    X = 0,
    /// Y linear axis.
    Y = 1,
    /// Z linear axis.
    Z = 2,
    /// Spindle.
    Spindle = 3,
}

impl AxisId {
    /// All axes in slot order.
    pub const ALL: [AxisId; 4] = [AxisId::X, AxisId::Y, AxisId::Z, AxisId::Spindle];

    /// Convert from raw `u8`. Returns `None` for values above 3.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::X),
            1 => Some(Self::Y),
            2 => Some(Self::Z),
            3 => Some(Self::Spindle),
            _ => None,
        }
    }

    /// Slot index (x = 0 .. spindle = 3).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Pub/sub writer id of this axis' feedback publisher.
    #[inline]
    pub const fn writer_id(self) -> u16 {
        WRITER_ID_AXIS[self as usize]
    }

    /// Look up an axis by its feedback writer id.
    pub fn from_writer_id(id: u16) -> Option<Self> {
        AxisId::ALL
            .into_iter()
            .find(|axis| axis.writer_id() == id)
    }

    /// Multicast MAC this axis' feedback is published to.
    #[inline]
    pub const fn multicast_mac(self) -> MacAddr {
        MacAddr(DEST_MAC_AXIS[self as usize])
    }
}

// ─── Value carriers ─────────────────────────────────────────────────

/// One axis' value plus switch, either direction.
///
/// Controller → drive: `value` is the velocity setpoint, `switch` the
/// enable. Drive → controller: `value` is the current position, `switch`
/// the fault flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisInfo {
    /// Which axis this refers to.
    pub axis: AxisId,
    /// Setpoint or current value [user units resp. units/s].
    pub value: f64,
    /// Enable (outbound) or fault (inbound).
    pub switch: bool,
}

impl AxisInfo {
    /// A zeroed value for the given axis.
    pub const fn zero(axis: AxisId) -> Self {
        Self {
            axis,
            value: 0.0,
            switch: false,
        }
    }
}

/// Full setpoint snapshot published by the machine control each cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlInfo {
    /// X velocity setpoint + enable.
    pub x_set: AxisInfo,
    /// Y velocity setpoint + enable.
    pub y_set: AxisInfo,
    /// Z velocity setpoint + enable.
    pub z_set: AxisInfo,
    /// Spindle speed setpoint + enable.
    pub s_set: AxisInfo,
    /// Spindle brake engaged.
    pub spindle_brake: bool,
    /// Machine running status.
    pub machine_status: bool,
    /// Emergency stop active.
    pub estop_status: bool,
}

impl ControlInfo {
    /// Per-axis setpoints in slot order.
    pub fn setpoints(&self) -> [&AxisInfo; 4] {
        [&self.x_set, &self.y_set, &self.z_set, &self.s_set]
    }

    /// The setpoint for one axis.
    pub fn setpoint(&self, axis: AxisId) -> &AxisInfo {
        match axis {
            AxisId::X => &self.x_set,
            AxisId::Y => &self.y_set,
            AxisId::Z => &self.z_set,
            AxisId::Spindle => &self.s_set,
        }
    }
}

impl Default for ControlInfo {
    fn default() -> Self {
        Self {
            x_set: AxisInfo::zero(AxisId::X),
            y_set: AxisInfo::zero(AxisId::Y),
            z_set: AxisInfo::zero(AxisId::Z),
            s_set: AxisInfo::zero(AxisId::Spindle),
            spindle_brake: false,
            machine_status: false,
            estop_status: false,
        }
    }
}
