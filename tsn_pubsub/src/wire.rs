//! OPC UA UADP network message encode/decode.
//!
//! Layout of one frame (all multi-byte integers big-endian):
//!
//! ```text
//! off 0   NetworkMessageHeader  ver_flags(u8) ext_flags(u8) publisher_id(u16)
//! off 4   GroupHeader           group_flags(u8) writer_group_id(u16)
//!                               group_version(u32) sequence_no(u16)
//! off 13  PayloadHeader         msg_count(u8) writer_id(u16)[msg_count]
//!         ExtendedHeader        timestamp(u64, OPC UA ticks)
//!         SizeArray             size(u16)[msg_count]  — only if msg_count > 1
//!         Datasets              msg_count * dataset of one shape
//! ```
//!
//! Every offset is computed from the sizes of the preceding fields, so
//! omitting the size array for a single-message frame cannot misalign the
//! dataset region. The decoder recomputes the same offsets and infers the
//! dataset shape from the exact per-message byte size — a deliberate
//! simplifying assumption of the protocol subset: two differently-shaped
//! messages of equal wire size would be misclassified.

use heapless::Vec as HVec;
use static_assertions::const_assert_eq;

use tsn_common::axis::{AxisId, AxisInfo, ControlInfo};
use tsn_common::consts::{
    DATASET_FLAGS1, EXTENDED_FLAGS, GROUP_FLAGS, GROUP_VERSION, NUM_AXES, VERSION_FLAGS,
    WRITER_GROUP_ID, WRITER_ID_CONTROL,
};
use tsn_common::time::TaiTime;

use crate::error::CodecError;
use crate::fixed::{from_fixed, to_fixed};
use crate::pool::PacketBuffer;

// ─── Layout Constants ───────────────────────────────────────────────

const NM_HDR_SIZE: usize = 4;
const GRP_HDR_SIZE: usize = 9;
const EXT_HDR_SIZE: usize = 8;
const SIZE_ENTRY_SIZE: usize = 2;
const WRITER_ID_SIZE: usize = 2;

const PUBLISHER_ID_OFF: usize = 2;
const SEQ_NO_OFF: usize = NM_HDR_SIZE + 7;
const MSG_CNT_OFF: usize = NM_HDR_SIZE + GRP_HDR_SIZE;
const WRITER_IDS_OFF: usize = MSG_CNT_OFF + 1;

/// Wire size of one control dataset: header byte, field count, four
/// fixed-point i64, seven bools, zero-padded to an 8-byte multiple.
pub const CONTROL_WIRE_SIZE: usize = 48;

/// Wire size of one axis dataset: header byte, field count, one
/// fixed-point 64-bit value, one bool.
pub const AXIS_WIRE_SIZE: usize = 12;

const CONTROL_FIELDS_SIZE: usize = 1 + 2 + 4 * 8 + 7;
const CONTROL_FIELD_COUNT: u16 = 11;
const AXIS_FIELD_COUNT: u16 = 2;

const_assert_eq!(CONTROL_FIELDS_SIZE, 42);
const_assert_eq!(1 + 2 + 8 + 1, AXIS_WIRE_SIZE);

const fn ext_hdr_off(msg_count: usize) -> usize {
    WRITER_IDS_OFF + msg_count * WRITER_ID_SIZE
}

const fn size_array_off(msg_count: usize) -> usize {
    ext_hdr_off(msg_count) + EXT_HDR_SIZE
}

const fn data_off(msg_count: usize) -> usize {
    size_array_off(msg_count)
        + if msg_count > 1 {
            msg_count * SIZE_ENTRY_SIZE
        } else {
            0
        }
}

// A single-message frame has no size array.
const_assert_eq!(data_off(1), 24);
const_assert_eq!(data_off(2), 30);

/// Which of the two fixed dataset shapes a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// 11-field machine control setpoints.
    Control,
    /// 2-field axis feedback.
    Axis,
}

impl DatasetKind {
    /// Fixed wire size of one dataset of this shape [bytes].
    #[inline]
    pub const fn wire_size(self) -> usize {
        match self {
            DatasetKind::Control => CONTROL_WIRE_SIZE,
            DatasetKind::Axis => AXIS_WIRE_SIZE,
        }
    }

    /// Classify a dataset by its exact wire size.
    const fn from_wire_size(size: usize) -> Option<Self> {
        match size {
            CONTROL_WIRE_SIZE => Some(DatasetKind::Control),
            AXIS_WIRE_SIZE => Some(DatasetKind::Axis),
            _ => None,
        }
    }
}

/// Total frame size for `msg_count` datasets of one shape.
pub const fn frame_size(msg_count: usize, kind: DatasetKind) -> usize {
    data_off(msg_count) + msg_count * kind.wire_size()
}

// ─── Byte Helpers ───────────────────────────────────────────────────

#[inline]
fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_be_bytes());
}

#[inline]
fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_be_bytes());
}

#[inline]
fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_be_bytes());
}

#[inline]
fn put_i64(buf: &mut [u8], off: usize, v: i64) {
    buf[off..off + 8].copy_from_slice(&v.to_be_bytes());
}

#[inline]
fn get_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

#[inline]
fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[inline]
fn get_i64(buf: &[u8], off: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    i64::from_be_bytes(raw)
}

// ─── Encoding ───────────────────────────────────────────────────────

/// Write all fixed header fields of a frame carrying `msg_count`
/// datasets of shape `kind`, and set the buffer's logical length.
///
/// The sequence number, writer ids, timestamp and dataset payloads are
/// filled afterwards by [`encode_control`] / [`encode_axis`] /
/// [`encode_axis_multi`].
///
/// # Errors
///
/// - `UnsupportedMessageCount` for `msg_count == 0`
/// - `BufferTooSmall` if the frame does not fit
pub fn encode_header(
    buf: &mut PacketBuffer,
    msg_count: u8,
    kind: DatasetKind,
    publisher_id: u16,
) -> Result<(), CodecError> {
    if msg_count == 0 {
        return Err(CodecError::UnsupportedMessageCount(0));
    }
    let n = msg_count as usize;
    let need = frame_size(n, kind);
    if need > buf.capacity() {
        return Err(CodecError::BufferTooSmall {
            need,
            have: buf.capacity(),
        });
    }

    let bytes = buf.bytes_mut();
    bytes[..need].fill(0);

    bytes[0] = VERSION_FLAGS;
    bytes[1] = EXTENDED_FLAGS;
    put_u16(bytes, PUBLISHER_ID_OFF, publisher_id);
    bytes[NM_HDR_SIZE] = GROUP_FLAGS;
    put_u16(bytes, NM_HDR_SIZE + 1, WRITER_GROUP_ID);
    put_u32(bytes, NM_HDR_SIZE + 3, GROUP_VERSION);
    bytes[MSG_CNT_OFF] = msg_count;

    if n > 1 {
        let sizes = size_array_off(n);
        for i in 0..n {
            put_u16(bytes, sizes + i * SIZE_ENTRY_SIZE, kind.wire_size() as u16);
        }
    }

    buf.set_len(need);
    Ok(())
}

/// Fill a prepared single-message frame with the control setpoints.
///
/// All four velocities are scale-converted before any byte is written,
/// so an overflow never leaves a partially filled frame.
///
/// # Errors
///
/// - `UnsupportedMessageCount` unless the header was written for exactly
///   one message
/// - `Overflow` if a velocity exceeds the fixed-point range
pub fn encode_control(
    buf: &mut PacketBuffer,
    info: &ControlInfo,
    seq_no: u16,
    now: TaiTime,
) -> Result<(), CodecError> {
    let msg_count = frame_msg_count(buf)?;
    if msg_count != 1 {
        return Err(CodecError::UnsupportedMessageCount(msg_count));
    }

    let mut vels = [0i64; NUM_AXES];
    for (raw, set) in vels.iter_mut().zip(info.setpoints()) {
        *raw = to_fixed(set.value)?;
    }

    let bytes = buf.bytes_mut();
    put_u16(bytes, SEQ_NO_OFF, seq_no);
    put_u16(bytes, WRITER_IDS_OFF, WRITER_ID_CONTROL);
    put_u64(bytes, ext_hdr_off(1), now.to_ua_ticks());

    let d = data_off(1);
    bytes[d] = DATASET_FLAGS1;
    put_u16(bytes, d + 1, CONTROL_FIELD_COUNT);
    for (i, raw) in vels.iter().enumerate() {
        put_i64(bytes, d + 3 + i * 8, *raw);
    }
    let bools = d + 3 + 4 * 8;
    bytes[bools] = u8::from(info.x_set.switch);
    bytes[bools + 1] = u8::from(info.y_set.switch);
    bytes[bools + 2] = u8::from(info.z_set.switch);
    bytes[bools + 3] = u8::from(info.s_set.switch);
    bytes[bools + 4] = u8::from(info.spindle_brake);
    bytes[bools + 5] = u8::from(info.machine_status);
    bytes[bools + 6] = u8::from(info.estop_status);
    // Trailing pad up to the fixed dataset size stays zero.
    bytes[d + CONTROL_FIELDS_SIZE..d + CONTROL_WIRE_SIZE].fill(0);

    buf.set_len(frame_size(1, DatasetKind::Control));
    Ok(())
}

/// Fill a prepared single-message frame with one axis' feedback. The
/// writer id is selected from the fixed per-axis table.
///
/// # Errors
///
/// - `UnsupportedMessageCount` unless the header was written for exactly
///   one message
/// - `Overflow` if the position exceeds the fixed-point range
pub fn encode_axis(
    buf: &mut PacketBuffer,
    info: &AxisInfo,
    seq_no: u16,
    now: TaiTime,
) -> Result<(), CodecError> {
    let msg_count = frame_msg_count(buf)?;
    if msg_count != 1 {
        return Err(CodecError::UnsupportedMessageCount(msg_count));
    }
    encode_axis_slot(buf, 1, 0, info)?;

    let bytes = buf.bytes_mut();
    put_u16(bytes, SEQ_NO_OFF, seq_no);
    put_u64(bytes, ext_hdr_off(1), now.to_ua_ticks());
    buf.set_len(frame_size(1, DatasetKind::Axis));
    Ok(())
}

/// Fill a prepared multi-message axis frame with one feedback dataset
/// per entry, in slot order.
///
/// # Errors
///
/// - `UnsupportedMessageCount` if the header message count differs from
///   the number of entries
/// - `Overflow` if any position exceeds the fixed-point range
pub fn encode_axis_multi(
    buf: &mut PacketBuffer,
    infos: &[AxisInfo],
    seq_no: u16,
    now: TaiTime,
) -> Result<(), CodecError> {
    let msg_count = frame_msg_count(buf)?;
    if msg_count as usize != infos.len() {
        return Err(CodecError::UnsupportedMessageCount(msg_count));
    }
    let n = infos.len();
    for (slot, info) in infos.iter().enumerate() {
        encode_axis_slot(buf, n, slot, info)?;
    }

    let bytes = buf.bytes_mut();
    put_u16(bytes, SEQ_NO_OFF, seq_no);
    put_u64(bytes, ext_hdr_off(n), now.to_ua_ticks());
    buf.set_len(frame_size(n, DatasetKind::Axis));
    Ok(())
}

fn encode_axis_slot(
    buf: &mut PacketBuffer,
    msg_count: usize,
    slot: usize,
    info: &AxisInfo,
) -> Result<(), CodecError> {
    let raw = to_fixed(info.value)?;

    let bytes = buf.bytes_mut();
    put_u16(
        bytes,
        WRITER_IDS_OFF + slot * WRITER_ID_SIZE,
        info.axis.writer_id(),
    );
    let d = data_off(msg_count) + slot * AXIS_WIRE_SIZE;
    bytes[d] = DATASET_FLAGS1;
    put_u16(bytes, d + 1, AXIS_FIELD_COUNT);
    put_i64(bytes, d + 3, raw);
    bytes[d + 11] = u8::from(info.switch);
    Ok(())
}

fn frame_msg_count(buf: &PacketBuffer) -> Result<u8, CodecError> {
    let frame = buf.as_slice();
    if frame.len() <= MSG_CNT_OFF {
        return Err(CodecError::ProtocolViolation("header not encoded"));
    }
    Ok(frame[MSG_CNT_OFF])
}

// ─── Decoding ───────────────────────────────────────────────────────

/// Validate a frame's fixed headers and classify its payload.
///
/// Offsets are recomputed exactly as on encode. Returns the message
/// count and the dataset shape, inferred from the per-message byte size.
///
/// # Errors
///
/// `ProtocolViolation` naming the first failed check.
pub fn decode_header(frame: &[u8]) -> Result<(u8, DatasetKind), CodecError> {
    if frame.len() <= MSG_CNT_OFF {
        return Err(CodecError::ProtocolViolation("truncated frame"));
    }
    if frame[0] != VERSION_FLAGS {
        return Err(CodecError::ProtocolViolation("bad version flags"));
    }
    if frame[1] != EXTENDED_FLAGS {
        return Err(CodecError::ProtocolViolation("bad extended flags"));
    }
    if frame[NM_HDR_SIZE] != GROUP_FLAGS {
        return Err(CodecError::ProtocolViolation("bad group flags"));
    }
    if get_u16(frame, NM_HDR_SIZE + 1) != WRITER_GROUP_ID {
        return Err(CodecError::ProtocolViolation("writer group id mismatch"));
    }
    if get_u32(frame, NM_HDR_SIZE + 3) != GROUP_VERSION {
        return Err(CodecError::ProtocolViolation("group version mismatch"));
    }

    let msg_count = frame[MSG_CNT_OFF];
    if msg_count == 0 {
        return Err(CodecError::ProtocolViolation("zero message count"));
    }
    let n = msg_count as usize;
    let data = data_off(n);
    if frame.len() <= data {
        return Err(CodecError::ProtocolViolation("truncated payload"));
    }
    let payload = frame.len() - data;
    if payload % n != 0 {
        return Err(CodecError::ProtocolViolation(
            "payload not divisible by message count",
        ));
    }
    let kind = DatasetKind::from_wire_size(payload / n)
        .ok_or(CodecError::ProtocolViolation("unknown dataset size"))?;

    if n > 1 {
        let sizes = size_array_off(n);
        for i in 0..n {
            if get_u16(frame, sizes + i * SIZE_ENTRY_SIZE) as usize != kind.wire_size() {
                return Err(CodecError::ProtocolViolation("size array mismatch"));
            }
        }
    }

    Ok((msg_count, kind))
}

/// Decode a single-message control frame. Inverse of [`encode_control`].
///
/// # Errors
///
/// `ProtocolViolation` on any header, writer id or field count mismatch.
pub fn decode_control(frame: &[u8]) -> Result<(ControlInfo, u16), CodecError> {
    let (msg_count, kind) = decode_header(frame)?;
    if kind != DatasetKind::Control {
        return Err(CodecError::ProtocolViolation("not a control frame"));
    }
    if msg_count != 1 {
        return Err(CodecError::UnsupportedMessageCount(msg_count));
    }
    if get_u16(frame, WRITER_IDS_OFF) != WRITER_ID_CONTROL {
        return Err(CodecError::ProtocolViolation("unexpected control writer id"));
    }

    let d = data_off(1);
    if frame[d] != DATASET_FLAGS1 {
        return Err(CodecError::ProtocolViolation("bad dataset header"));
    }
    if get_u16(frame, d + 1) != CONTROL_FIELD_COUNT {
        return Err(CodecError::ProtocolViolation("control field count mismatch"));
    }

    let bools = d + 3 + 4 * 8;
    let mut info = ControlInfo::default();
    for (slot, axis) in AxisId::ALL.into_iter().enumerate() {
        let set = AxisInfo {
            axis,
            value: from_fixed(get_i64(frame, d + 3 + slot * 8)),
            switch: frame[bools + slot] != 0,
        };
        match axis {
            AxisId::X => info.x_set = set,
            AxisId::Y => info.y_set = set,
            AxisId::Z => info.z_set = set,
            AxisId::Spindle => info.s_set = set,
        }
    }
    info.spindle_brake = frame[bools + 4] != 0;
    info.machine_status = frame[bools + 5] != 0;
    info.estop_status = frame[bools + 6] != 0;

    Ok((info, get_u16(frame, SEQ_NO_OFF)))
}

/// Decode every axis dataset of a frame, in slot order. The axis of each
/// entry is recovered from its writer id.
///
/// # Errors
///
/// `ProtocolViolation` on any header, writer id or field count mismatch.
pub fn decode_axis_all(
    frame: &[u8],
) -> Result<(HVec<AxisInfo, NUM_AXES>, u16), CodecError> {
    let (msg_count, kind) = decode_header(frame)?;
    if kind != DatasetKind::Axis {
        return Err(CodecError::ProtocolViolation("not an axis frame"));
    }
    let n = msg_count as usize;
    if n > NUM_AXES {
        return Err(CodecError::UnsupportedMessageCount(msg_count));
    }

    let mut infos = HVec::new();
    for slot in 0..n {
        let writer_id = get_u16(frame, WRITER_IDS_OFF + slot * WRITER_ID_SIZE);
        let axis = AxisId::from_writer_id(writer_id)
            .ok_or(CodecError::ProtocolViolation("unknown axis writer id"))?;

        let d = data_off(n) + slot * AXIS_WIRE_SIZE;
        if frame[d] != DATASET_FLAGS1 {
            return Err(CodecError::ProtocolViolation("bad dataset header"));
        }
        if get_u16(frame, d + 1) != AXIS_FIELD_COUNT {
            return Err(CodecError::ProtocolViolation("axis field count mismatch"));
        }

        let info = AxisInfo {
            axis,
            value: from_fixed(get_i64(frame, d + 3)),
            switch: frame[d + 11] != 0,
        };
        // Slot capacity equals the axis count; n was bounds-checked.
        let _ = infos.push(info);
    }

    Ok((infos, get_u16(frame, SEQ_NO_OFF)))
}

/// Decode a single-message axis frame. Inverse of [`encode_axis`].
pub fn decode_axis(frame: &[u8]) -> Result<(AxisInfo, u16), CodecError> {
    let (infos, seq_no) = decode_axis_all(frame)?;
    if infos.len() != 1 {
        return Err(CodecError::UnsupportedMessageCount(infos.len() as u8));
    }
    Ok((infos[0], seq_no))
}

/// Publisher id of a validated frame.
pub fn frame_publisher_id(frame: &[u8]) -> u16 {
    get_u16(frame, PUBLISHER_ID_OFF)
}

/// Timestamp of a validated frame.
pub fn frame_timestamp(frame: &[u8]) -> TaiTime {
    let n = frame[MSG_CNT_OFF] as usize;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&frame[ext_hdr_off(n)..ext_hdr_off(n) + 8]);
    TaiTime::from_ua_ticks(u64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsn_common::axis::AxisId;

    fn control_info() -> ControlInfo {
        ControlInfo {
            x_set: AxisInfo {
                axis: AxisId::X,
                value: 12.5,
                switch: true,
            },
            y_set: AxisInfo {
                axis: AxisId::Y,
                value: -3.25,
                switch: false,
            },
            z_set: AxisInfo {
                axis: AxisId::Z,
                value: 0.000_000_001,
                switch: true,
            },
            s_set: AxisInfo {
                axis: AxisId::Spindle,
                value: 6000.0,
                switch: true,
            },
            spindle_brake: false,
            machine_status: true,
            estop_status: false,
        }
    }

    fn now() -> TaiTime {
        TaiTime::new(1_700_000_000, 123_456_700)
    }

    #[test]
    fn control_roundtrip() {
        let mut buf = PacketBuffer::boxed();
        encode_header(&mut buf, 1, DatasetKind::Control, 7).unwrap();
        encode_control(&mut buf, &control_info(), 42, now()).unwrap();
        assert_eq!(buf.len(), frame_size(1, DatasetKind::Control));

        let (decoded, seq_no) = decode_control(buf.as_slice()).unwrap();
        assert_eq!(seq_no, 42);
        assert_eq!(frame_publisher_id(buf.as_slice()), 7);
        assert_eq!(frame_timestamp(buf.as_slice()), now());

        let original = control_info();
        for (got, want) in decoded.setpoints().iter().zip(original.setpoints()) {
            assert_eq!(got.axis, want.axis);
            assert_eq!(got.switch, want.switch);
            assert!((got.value - want.value).abs() < 1e-9);
        }
        assert_eq!(decoded.spindle_brake, original.spindle_brake);
        assert_eq!(decoded.machine_status, original.machine_status);
        assert_eq!(decoded.estop_status, original.estop_status);
    }

    #[test]
    fn axis_roundtrip() {
        let mut buf = PacketBuffer::boxed();
        let info = AxisInfo {
            axis: AxisId::Z,
            value: 123.456_789,
            switch: true,
        };
        encode_header(&mut buf, 1, DatasetKind::Axis, 1).unwrap();
        encode_axis(&mut buf, &info, 9, now()).unwrap();
        assert_eq!(buf.len(), frame_size(1, DatasetKind::Axis));

        let (decoded, seq_no) = decode_axis(buf.as_slice()).unwrap();
        assert_eq!(seq_no, 9);
        assert_eq!(decoded.axis, AxisId::Z);
        assert!(decoded.switch);
        assert!((decoded.value - info.value).abs() < 1e-9);
    }

    #[test]
    fn size_array_only_above_one_message() {
        let mut single = PacketBuffer::boxed();
        let mut double = PacketBuffer::boxed();
        encode_header(&mut single, 1, DatasetKind::Axis, 1).unwrap();
        encode_header(&mut double, 2, DatasetKind::Axis, 1).unwrap();

        // Two messages add one dataset, one writer id and two size
        // entries; the single-message frame has no size array at all.
        let extra = AXIS_WIRE_SIZE + WRITER_ID_SIZE + 2 * SIZE_ENTRY_SIZE;
        assert_eq!(double.len(), single.len() + extra);

        let (n, kind) = decode_header(single.as_slice()).unwrap();
        assert_eq!((n, kind), (1, DatasetKind::Axis));
        let infos = [
            AxisInfo::zero(AxisId::X),
            AxisInfo::zero(AxisId::Y),
        ];
        encode_axis_multi(&mut double, &infos, 0, now()).unwrap();
        let (n, kind) = decode_header(double.as_slice()).unwrap();
        assert_eq!((n, kind), (2, DatasetKind::Axis));
    }

    #[test]
    fn multi_axis_roundtrip() {
        let mut buf = PacketBuffer::boxed();
        let infos = [
            AxisInfo {
                axis: AxisId::X,
                value: 1.0,
                switch: false,
            },
            AxisInfo {
                axis: AxisId::Y,
                value: 2.0,
                switch: true,
            },
            AxisInfo {
                axis: AxisId::Spindle,
                value: 3.0,
                switch: false,
            },
        ];
        encode_header(&mut buf, 3, DatasetKind::Axis, 1).unwrap();
        encode_axis_multi(&mut buf, &infos, 5, now()).unwrap();

        let (decoded, seq_no) = decode_axis_all(buf.as_slice()).unwrap();
        assert_eq!(seq_no, 5);
        assert_eq!(decoded.len(), 3);
        for (got, want) in decoded.iter().zip(&infos) {
            assert_eq!(got.axis, want.axis);
            assert_eq!(got.switch, want.switch);
            assert!((got.value - want.value).abs() < 1e-9);
        }
    }

    #[test]
    fn group_version_mismatch_rejected() {
        let mut buf = PacketBuffer::boxed();
        encode_header(&mut buf, 1, DatasetKind::Axis, 1).unwrap();
        encode_axis(&mut buf, &AxisInfo::zero(AxisId::X), 0, now()).unwrap();

        let off = NM_HDR_SIZE + 3;
        buf.bytes_mut()[off] ^= 0xFF;
        assert_eq!(
            decode_header(buf.as_slice()),
            Err(CodecError::ProtocolViolation("group version mismatch"))
        );
    }

    #[test]
    fn fixed_flag_mismatches_rejected() {
        let mut buf = PacketBuffer::boxed();
        encode_header(&mut buf, 1, DatasetKind::Axis, 1).unwrap();
        encode_axis(&mut buf, &AxisInfo::zero(AxisId::X), 0, now()).unwrap();

        for (off, reason) in [
            (0usize, "bad version flags"),
            (1, "bad extended flags"),
            (NM_HDR_SIZE, "bad group flags"),
            (NM_HDR_SIZE + 1, "writer group id mismatch"),
        ] {
            let mut bad = PacketBuffer::boxed();
            bad.storage_mut()[..buf.len()].copy_from_slice(buf.as_slice());
            bad.set_len(buf.len());
            bad.bytes_mut()[off] ^= 0xFF;
            assert_eq!(
                decode_header(bad.as_slice()),
                Err(CodecError::ProtocolViolation(reason))
            );
        }
    }

    #[test]
    fn field_count_is_verified_before_payload() {
        let mut buf = PacketBuffer::boxed();
        encode_header(&mut buf, 1, DatasetKind::Axis, 1).unwrap();
        encode_axis(&mut buf, &AxisInfo::zero(AxisId::Y), 0, now()).unwrap();

        put_u16(buf.bytes_mut(), data_off(1) + 1, 3);
        assert_eq!(
            decode_axis(buf.as_slice()),
            Err(CodecError::ProtocolViolation("axis field count mismatch"))
        );
    }

    #[test]
    fn unknown_writer_id_rejected() {
        let mut buf = PacketBuffer::boxed();
        encode_header(&mut buf, 1, DatasetKind::Axis, 1).unwrap();
        encode_axis(&mut buf, &AxisInfo::zero(AxisId::Y), 0, now()).unwrap();

        put_u16(buf.bytes_mut(), WRITER_IDS_OFF, 0xBEEF);
        assert_eq!(
            decode_axis(buf.as_slice()),
            Err(CodecError::ProtocolViolation("unknown axis writer id"))
        );
    }

    #[test]
    fn overflow_aborts_before_any_write() {
        let mut buf = PacketBuffer::boxed();
        encode_header(&mut buf, 1, DatasetKind::Control, 1).unwrap();
        let before: Vec<u8> = buf.as_slice().to_vec();

        let mut info = control_info();
        info.z_set.value = 1e10; // beyond i64::MAX * 1e-9
        assert!(matches!(
            encode_control(&mut buf, &info, 0, now()),
            Err(CodecError::Overflow(_))
        ));
        assert_eq!(buf.as_slice(), &before[..]);
    }

    #[test]
    fn truncated_and_garbage_frames_rejected() {
        assert!(decode_header(&[]).is_err());
        assert!(decode_header(&[0xF1, 0x21]).is_err());

        let mut buf = PacketBuffer::boxed();
        encode_header(&mut buf, 1, DatasetKind::Axis, 1).unwrap();
        encode_axis(&mut buf, &AxisInfo::zero(AxisId::X), 0, now()).unwrap();
        // Chop the last byte: the 11-byte remainder matches no shape.
        let frame = &buf.as_slice()[..buf.len() - 1];
        assert_eq!(
            decode_header(frame),
            Err(CodecError::ProtocolViolation("unknown dataset size"))
        );
    }

    #[test]
    fn control_frame_not_accepted_as_axis() {
        let mut buf = PacketBuffer::boxed();
        encode_header(&mut buf, 1, DatasetKind::Control, 1).unwrap();
        encode_control(&mut buf, &control_info(), 0, now()).unwrap();
        assert_eq!(
            decode_axis(buf.as_slice()),
            Err(CodecError::ProtocolViolation("not an axis frame"))
        );
    }

    #[test]
    fn encode_control_requires_single_message_header() {
        let mut buf = PacketBuffer::boxed();
        encode_header(&mut buf, 2, DatasetKind::Control, 1).unwrap();
        assert_eq!(
            encode_control(&mut buf, &control_info(), 0, now()),
            Err(CodecError::UnsupportedMessageCount(2))
        );
    }
}
