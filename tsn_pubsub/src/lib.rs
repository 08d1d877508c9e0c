//! # TSN Pub/Sub Codec Library
//!
//! Deterministic, bit-exact translation between control/axis values and
//! OPC UA UADP network message bytes, plus the fixed-capacity packet pool
//! feeding the codec with buffers. Nothing in this crate allocates on the
//! cyclic hot path: buffers are caller-supplied, pool buffers are
//! allocated once at startup.
//!
//! ## Wire Model
//!
//! One NetworkMessage carries 1..n DataSetMessages of a single shape:
//! either the 11-field machine control setpoint set or the 2-field axis
//! feedback. Multi-byte integers are big-endian; fixed-point values travel
//! as big-endian raw 64-bit patterns after nano-unit scaling.

pub mod error;
pub mod fixed;
pub mod pool;
pub mod wire;

pub use error::{CodecError, PoolError};
pub use pool::{PacketBuffer, PacketPool};
pub use wire::DatasetKind;
