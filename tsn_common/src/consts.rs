//! System-wide constants for the TSN data plane workspace.
//!
//! Single source of truth for wire-format values, addressing tables and
//! scheduling defaults. Imported by all crates — no duplication permitted.

/// Maximum Ethernet payload carried by one packet buffer [bytes].
pub const MAX_PACKET_SIZE: usize = 1500;

/// EtherType for OPC UA UADP NetworkMessages over Ethernet II.
pub const UADP_ETHERTYPE: u16 = 0xB62C;

/// NetworkMessage version/flags byte: version 1, publisher id, group
/// header, payload header and extended flags 1 enabled.
pub const VERSION_FLAGS: u8 = 0xF1;

/// Extended flags byte: publisher id is UInt16, timestamp enabled.
pub const EXTENDED_FLAGS: u8 = 0x21;

/// Group flags byte: writer group id, group version and sequence number
/// enabled.
pub const GROUP_FLAGS: u8 = 0x0B;

/// Fixed writer group id shared by all publishers in the demo cell.
pub const WRITER_GROUP_ID: u16 = 0x1000;

/// Fixed group version (seconds since Jan 1 2000; schema created
/// Sept 1 2020).
pub const GROUP_VERSION: u32 = 0x26DE_FA00;

/// DataSetMessage header byte (DataSetFlags1 only).
pub const DATASET_FLAGS1: u8 = 0x01;

/// Writer id of the machine control publisher.
pub const WRITER_ID_CONTROL: u16 = 0xAC00;

/// Writer ids of the axis publishers, indexed x, y, z, spindle.
pub const WRITER_ID_AXIS: [u16; 4] = [0xAC01, 0xAC02, 0xAC03, 0xAC04];

/// Multicast destination MAC the control publisher sends to.
pub const DEST_MAC_CONTROL: [u8; 6] = [0x01, 0xAC, 0xCE, 0x55, 0x00, 0x00];

/// Multicast destination MACs of the axis publishers, indexed x, y, z,
/// spindle.
pub const DEST_MAC_AXIS: [[u8; 6]; 4] = [
    [0x01, 0xAC, 0xCE, 0x55, 0x00, 0x01],
    [0x01, 0xAC, 0xCE, 0x55, 0x00, 0x02],
    [0x01, 0xAC, 0xCE, 0x55, 0x00, 0x03],
    [0x01, 0xAC, 0xCE, 0x55, 0x00, 0x04],
];

/// Fixed-point scale: payload doubles travel as nano-units in an i64.
pub const FIXED_POINT_SCALE: f64 = 1e9;

/// Largest magnitude representable after fixed-point scaling.
pub const FIXED_POINT_LIMIT: f64 = i64::MAX as f64 * 1e-9;

/// Number of axes in the demo cell (x, y, z, spindle).
pub const NUM_AXES: usize = 4;

/// Default cycle interval [ns] (1 kHz).
pub const DEFAULT_INTERVAL_NS: u64 = 1_000_000;

/// Default outbound network stack latency budget [ns].
pub const DEFAULT_SEND_STACK_NS: u64 = 100_000;

/// Default inbound network stack latency budget [ns].
pub const DEFAULT_RECV_STACK_NS: u64 = 100_000;

/// Default application wakeup budget [ns] (time the loop body needs
/// between wakeup and its wire deadline).
pub const DEFAULT_APP_WAKEUP_NS: u64 = 100_000;

/// Default worst-case scheduling jitter allowance [ns].
pub const DEFAULT_MAX_JITTER_NS: u64 = 40_000;

/// SCHED_FIFO priority of the sending thread. A late send is a harder
/// failure than a late receive, so the sender outranks the receiver.
pub const RT_PRIORITY_SEND: i32 = 80;

/// SCHED_FIFO priority of the receiving thread.
pub const RT_PRIORITY_RECV: i32 = 75;
