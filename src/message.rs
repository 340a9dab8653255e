//! Wire framing for the five DQN message types.
//!
//! Every message is a fixed-layout, byte-packed record: a 1-byte protocol
//! version, a 1-byte kind tag, the type's fields, and a trailing CRC-8
//! computed over all preceding bytes. Multi-byte fields are little-endian;
//! this is the single place that byte order is decided for the network.
//!
//! Decoding is the inverse of encoding and is gated: length, then CRC, then
//! version are checked before any semantic field is read. A message failing
//! any gate is reported as a [`DecodeError`] and must be discarded by the
//! caller without disturbing the current frame phase.
//!
//! ## Kind byte
//!
//! The low nibble of the kind tag is the type lane; the high bits carry
//! variant flags. Feedback (`0x01`), ack (`0x02`), join request (`0xa0`) and
//! join response (`0xa1`) match exactly. Transmission requests are a family
//! marked by bit 7: bits 0..=1 carry the requested-slot count, bit 2 the
//! downstream flag, bit 4 the join flag, bit 6 the high-rate flag. A join TR
//! is therefore `0x90`.
//!
//! ## Frame shape
//!
//! [`FrameParam`] packs the frame geometry a node must respect until its next
//! synchronization: bits 15..=9 hold the CRQ minislot count, bits 8..=2 the
//! DTQ slot count, bits 1..=0 the rate selector. The layout is symmetric
//! between [`FrameParam::pack`] and [`FrameParam::unpack`] and fixed for the
//! lifetime of a network.

use crate::consts::{
    DQN_ACK_BITMAP_LEN, DQN_ACK_LEN, DQN_FEEDBACK_HEADER_LEN, DQN_JOIN_REQ_LEN, DQN_JOIN_RESP_LEN,
    DQN_MAX_SNAPSHOT_LEN, DQN_MESSAGE_ACK, DQN_MESSAGE_DOWNSTREAM, DQN_MESSAGE_FEEDBACK,
    DQN_MESSAGE_HIGH_RATE, DQN_MESSAGE_JOIN_FLAG, DQN_MESSAGE_JOIN_REQ, DQN_MESSAGE_JOIN_RESP,
    DQN_MESSAGE_SLOT_MASK, DQN_MESSAGE_TR, DQN_MESSAGE_TR_MASK, DQN_PENDING_CAPACITY, DQN_TR_LEN,
    DQN_VERSION, HW_ADDR_LENGTH, HwAddr,
};
use crate::crc::crc8;
use thiserror::Error;

/// Reason a received byte sequence was rejected by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer is shorter than the message's fixed layout.
    #[error("message shorter than its fixed layout")]
    Truncated,
    /// The trailing CRC does not match the message bytes.
    #[error("crc mismatch")]
    BadCrc,
    /// The version byte differs from the protocol version constant.
    #[error("unsupported protocol version {0:#04x}")]
    BadVersion(u8),
    /// The kind tag names no known message type, or its flag combination is
    /// not meaningful.
    #[error("unknown message kind {0:#04x}")]
    UnknownKind(u8),
    /// The frame-shape field decodes to an unusable geometry.
    #[error("malformed frame-shape field {0:#06x}")]
    BadFrameParam(u16),
    /// The CRQ/DTQ occupancy counters exceed protocol bounds.
    #[error("crq/dtq counters exceed protocol bounds")]
    BadCounters,
}

/// Reason a message could not be serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The output buffer cannot hold the encoded message.
    #[error("output buffer too small")]
    BufferTooSmall,
    /// The admission-set snapshot is longer than a feedback can carry.
    #[error("admission snapshot longer than a feedback can carry")]
    SnapshotTooLong,
    /// The requested-slot count does not fit the TR kind byte.
    #[error("requested slot count out of range")]
    BadSlotCount,
}

// Length, CRC, version - in that order - before any field is trusted.
fn gate(buf: &[u8]) -> Result<u8, DecodeError> {
    if buf.len() < 3 {
        return Err(DecodeError::Truncated);
    }
    let (body, crc) = buf.split_at(buf.len() - 1);
    if crc8(body) != crc[0] {
        return Err(DecodeError::BadCrc);
    }
    if buf[0] != DQN_VERSION {
        return Err(DecodeError::BadVersion(buf[0]));
    }
    Ok(buf[1])
}

fn seal(buf: &mut [u8], len: usize) {
    buf[len - 1] = crc8(&buf[..len - 1]);
}

/// The bit-packed frame-shape field carried in every feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameParam {
    /// Number of contention minislots per frame (1..=127).
    pub num_tr_slots: u8,
    /// Number of data slots per frame (1..=127).
    pub num_data_slots: u8,
    /// Rate selector for the frame's data phase.
    pub rate: u8,
}

impl FrameParam {
    /// Packs the frame shape into its 16-bit wire form.
    pub fn pack(&self) -> u16 {
        ((self.num_tr_slots as u16 & 0x7f) << 9)
            | ((self.num_data_slots as u16 & 0x7f) << 2)
            | (self.rate as u16 & 0x03)
    }

    /// Unpacks a 16-bit frame-shape field.
    ///
    /// A geometry with zero minislots or zero data slots cannot drive a
    /// frame and is rejected as a protocol violation.
    pub fn unpack(raw: u16) -> Result<Self, DecodeError> {
        let param = Self {
            num_tr_slots: ((raw >> 9) & 0x7f) as u8,
            num_data_slots: ((raw >> 2) & 0x7f) as u8,
            rate: (raw & 0x03) as u8,
        };
        if param.num_tr_slots == 0 || param.num_data_slots == 0 {
            return Err(DecodeError::BadFrameParam(raw));
        }
        Ok(param)
    }
}

/// A contention-phase transmission request.
///
/// Five bytes on the wire: version, kind, node id, CRC. The node id is
/// meaningful upstream only; join TRs carry no identity yet and encode it
/// as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionRequest {
    /// Requesting node's session id (ignored for join TRs).
    pub node_id: u16,
    /// Number of data slots requested (1..=3).
    pub slots: u8,
    /// Set when the node asks the server to transmit to it.
    pub downstream: bool,
    /// Set on the join sub-flow's TR.
    pub join: bool,
    /// Set when the node selects the fast rate.
    pub high_rate: bool,
}

impl TransmissionRequest {
    /// A request to transmit `slots` chunks upstream.
    pub fn upstream(node_id: u16, slots: u8, high_rate: bool) -> Self {
        Self { node_id, slots, downstream: false, join: false, high_rate }
    }

    /// A request to receive `slots` chunks of downstream data.
    pub fn downstream(node_id: u16, slots: u8, high_rate: bool) -> Self {
        Self { node_id, slots, downstream: true, join: false, high_rate }
    }

    /// The join sub-flow's TR, sent before the node holds a session id.
    pub fn join(high_rate: bool) -> Self {
        Self { node_id: 0, slots: 1, downstream: false, join: true, high_rate }
    }

    fn kind(&self) -> Result<u8, EncodeError> {
        if self.join {
            let mut kind = DQN_MESSAGE_TR | DQN_MESSAGE_JOIN_FLAG;
            if self.high_rate {
                kind |= DQN_MESSAGE_HIGH_RATE;
            }
            return Ok(kind);
        }
        if self.slots == 0 || self.slots > DQN_MESSAGE_SLOT_MASK {
            return Err(EncodeError::BadSlotCount);
        }
        let mut kind = DQN_MESSAGE_TR | (self.slots & DQN_MESSAGE_SLOT_MASK);
        if self.downstream {
            kind |= DQN_MESSAGE_DOWNSTREAM;
        }
        if self.high_rate {
            kind |= DQN_MESSAGE_HIGH_RATE;
        }
        Ok(kind)
    }

    /// Serializes the request into `buf`, returning the encoded length.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        if buf.len() < DQN_TR_LEN {
            return Err(EncodeError::BufferTooSmall);
        }
        buf[0] = DQN_VERSION;
        buf[1] = self.kind()?;
        buf[2..4].copy_from_slice(&self.node_id.to_le_bytes());
        seal(buf, DQN_TR_LEN);
        Ok(DQN_TR_LEN)
    }

    /// Parses a transmission request, gated by length, CRC and version.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() != DQN_TR_LEN {
            return Err(DecodeError::Truncated);
        }
        let kind = gate(buf)?;
        if kind & DQN_MESSAGE_TR_MASK == 0 {
            return Err(DecodeError::UnknownKind(kind));
        }
        let join = kind & DQN_MESSAGE_JOIN_FLAG != 0;
        let slots = kind & DQN_MESSAGE_SLOT_MASK;
        if !join && slots == 0 {
            return Err(DecodeError::UnknownKind(kind));
        }
        Ok(Self {
            node_id: u16::from_le_bytes([buf[2], buf[3]]),
            slots: if join { 1 } else { slots },
            downstream: kind & DQN_MESSAGE_DOWNSTREAM != 0,
            join,
            high_rate: kind & DQN_MESSAGE_HIGH_RATE != 0,
        })
    }
}

/// The per-frame feedback broadcast that opens every cycle.
///
/// Sixteen header bytes, a variable admission-set snapshot whose length is
/// fixed by the set's configuration (not by this codec), and the CRC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback<'a> {
    /// Network this feedback belongs to; nodes ignore other networks.
    pub network_id: u32,
    /// Server frame timestamp in milliseconds, monotone across frames.
    pub timestamp: u32,
    /// Contention-queue occupancy (collisions awaiting re-contention).
    pub crq_length: u16,
    /// Data-queue occupancy (admitted requests awaiting a slot).
    pub dtq_length: u16,
    /// Frame geometry for the coming synchronization interval.
    pub frame: FrameParam,
    /// Serialized admission set summarizing the previous frame's CRQ outcomes.
    pub snapshot: &'a [u8],
}

impl<'a> Feedback<'a> {
    /// Serializes the feedback into `buf`, returning the encoded length.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        if self.snapshot.len() > DQN_MAX_SNAPSHOT_LEN {
            return Err(EncodeError::SnapshotTooLong);
        }
        let len = DQN_FEEDBACK_HEADER_LEN + self.snapshot.len() + 1;
        if buf.len() < len {
            return Err(EncodeError::BufferTooSmall);
        }
        buf[0] = DQN_VERSION;
        buf[1] = DQN_MESSAGE_FEEDBACK;
        buf[2..6].copy_from_slice(&self.network_id.to_le_bytes());
        buf[6..10].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[10..12].copy_from_slice(&self.crq_length.to_le_bytes());
        buf[12..14].copy_from_slice(&self.dtq_length.to_le_bytes());
        buf[14..16].copy_from_slice(&self.frame.pack().to_le_bytes());
        buf[DQN_FEEDBACK_HEADER_LEN..len - 1].copy_from_slice(self.snapshot);
        seal(buf, len);
        Ok(len)
    }

    /// Parses a feedback, gated by length, CRC and version. The snapshot is
    /// borrowed from `buf`, valid until the receive buffer is reused.
    pub fn decode(buf: &'a [u8]) -> Result<Self, DecodeError> {
        if buf.len() < DQN_FEEDBACK_HEADER_LEN + 1 {
            return Err(DecodeError::Truncated);
        }
        let kind = gate(buf)?;
        if kind != DQN_MESSAGE_FEEDBACK {
            return Err(DecodeError::UnknownKind(kind));
        }
        let crq_length = u16::from_le_bytes([buf[10], buf[11]]);
        let dtq_length = u16::from_le_bytes([buf[12], buf[13]]);
        if crq_length > DQN_PENDING_CAPACITY as u16 || dtq_length > DQN_PENDING_CAPACITY as u16 {
            return Err(DecodeError::BadCounters);
        }
        Ok(Self {
            network_id: u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]),
            timestamp: u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]),
            crq_length,
            dtq_length,
            frame: FrameParam::unpack(u16::from_le_bytes([buf[14], buf[15]]))?,
            snapshot: &buf[DQN_FEEDBACK_HEADER_LEN..buf.len() - 1],
        })
    }
}

/// The per-frame acknowledgment bitmap that closes every cycle.
///
/// Bit `s` reports whether data slot `s` of the frame just completed carried
/// a successfully received payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Per-slot delivery bits, LSB-first within each byte.
    pub bitmap: [u8; DQN_ACK_BITMAP_LEN],
}

impl Ack {
    /// An ack with no slot marked delivered.
    pub fn new() -> Self {
        Self { bitmap: [0; DQN_ACK_BITMAP_LEN] }
    }

    /// Marks data slot `slot` as delivered.
    pub fn set_delivered(&mut self, slot: u8) {
        self.bitmap[(slot as usize) / 8] |= 1 << (slot % 8);
    }

    /// Whether data slot `slot` is marked delivered.
    pub fn is_delivered(&self, slot: u8) -> bool {
        self.bitmap[(slot as usize) / 8] & (1 << (slot % 8)) != 0
    }

    /// Serializes the ack into `buf`, returning the encoded length.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        if buf.len() < DQN_ACK_LEN {
            return Err(EncodeError::BufferTooSmall);
        }
        buf[0] = DQN_VERSION;
        buf[1] = DQN_MESSAGE_ACK;
        buf[2..2 + DQN_ACK_BITMAP_LEN].copy_from_slice(&self.bitmap);
        seal(buf, DQN_ACK_LEN);
        Ok(DQN_ACK_LEN)
    }

    /// Parses an ack, gated by length, CRC and version.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() != DQN_ACK_LEN {
            return Err(DecodeError::Truncated);
        }
        let kind = gate(buf)?;
        if kind != DQN_MESSAGE_ACK {
            return Err(DecodeError::UnknownKind(kind));
        }
        let mut bitmap = [0; DQN_ACK_BITMAP_LEN];
        bitmap.copy_from_slice(&buf[2..2 + DQN_ACK_BITMAP_LEN]);
        Ok(Self { bitmap })
    }
}

impl Default for Ack {
    fn default() -> Self {
        Self::new()
    }
}

/// A node's request to be registered, sent in its admitted join slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRequest {
    /// The physical device's fixed hardware address.
    pub hw_addr: HwAddr,
}

impl JoinRequest {
    /// Serializes the join request into `buf`, returning the encoded length.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        if buf.len() < DQN_JOIN_REQ_LEN {
            return Err(EncodeError::BufferTooSmall);
        }
        buf[0] = DQN_VERSION;
        buf[1] = DQN_MESSAGE_JOIN_REQ;
        buf[2..2 + HW_ADDR_LENGTH].copy_from_slice(&self.hw_addr);
        seal(buf, DQN_JOIN_REQ_LEN);
        Ok(DQN_JOIN_REQ_LEN)
    }

    /// Parses a join request, gated by length, CRC and version.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() != DQN_JOIN_REQ_LEN {
            return Err(DecodeError::Truncated);
        }
        let kind = gate(buf)?;
        if kind != DQN_MESSAGE_JOIN_REQ {
            return Err(DecodeError::UnknownKind(kind));
        }
        let mut hw_addr = [0; HW_ADDR_LENGTH];
        hw_addr.copy_from_slice(&buf[2..2 + HW_ADDR_LENGTH]);
        Ok(Self { hw_addr })
    }
}

/// The server's reply to a [`JoinRequest`], assigning a session node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinResponse {
    /// Echo of the requesting hardware address; nodes match on this.
    pub hw_addr: HwAddr,
    /// The node id assigned for the session lifetime.
    pub node_id: u16,
}

impl JoinResponse {
    /// Serializes the join response into `buf`, returning the encoded length.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        if buf.len() < DQN_JOIN_RESP_LEN {
            return Err(EncodeError::BufferTooSmall);
        }
        buf[0] = DQN_VERSION;
        buf[1] = DQN_MESSAGE_JOIN_RESP;
        buf[2..2 + HW_ADDR_LENGTH].copy_from_slice(&self.hw_addr);
        buf[8..10].copy_from_slice(&self.node_id.to_le_bytes());
        seal(buf, DQN_JOIN_RESP_LEN);
        Ok(DQN_JOIN_RESP_LEN)
    }

    /// Parses a join response, gated by length, CRC and version.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() != DQN_JOIN_RESP_LEN {
            return Err(DecodeError::Truncated);
        }
        let kind = gate(buf)?;
        if kind != DQN_MESSAGE_JOIN_RESP {
            return Err(DecodeError::UnknownKind(kind));
        }
        let mut hw_addr = [0; HW_ADDR_LENGTH];
        hw_addr.copy_from_slice(&buf[2..2 + HW_ADDR_LENGTH]);
        Ok(Self { hw_addr, node_id: u16::from_le_bytes([buf[8], buf[9]]) })
    }
}

/// Any valid wire message, classified by its kind tag.
///
/// Used where a listener cannot know in advance which type will arrive
/// (e.g. a node cold-synchronizing on an arbitrary broadcast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<'a> {
    /// A contention-phase transmission request.
    Tr(TransmissionRequest),
    /// A frame-opening feedback broadcast.
    Feedback(Feedback<'a>),
    /// A frame-closing acknowledgment bitmap.
    Ack(Ack),
    /// A join request.
    JoinRequest(JoinRequest),
    /// A join response.
    JoinResponse(JoinResponse),
}

impl<'a> Message<'a> {
    /// Classifies and parses a received byte sequence.
    pub fn decode(buf: &'a [u8]) -> Result<Self, DecodeError> {
        if buf.len() < 3 {
            return Err(DecodeError::Truncated);
        }
        let kind = buf[1];
        if kind & DQN_MESSAGE_TR_MASK != 0 {
            return TransmissionRequest::decode(buf).map(Message::Tr);
        }
        match kind {
            DQN_MESSAGE_FEEDBACK => Feedback::decode(buf).map(Message::Feedback),
            DQN_MESSAGE_ACK => Ack::decode(buf).map(Message::Ack),
            DQN_MESSAGE_JOIN_REQ => JoinRequest::decode(buf).map(Message::JoinRequest),
            DQN_MESSAGE_JOIN_RESP => JoinResponse::decode(buf).map(Message::JoinResponse),
            other => Err(DecodeError::UnknownKind(other)),
        }
    }
}
