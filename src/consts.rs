//! Constants used across the DQN protocol implementation.
//!
//! This module defines the protocol-wide constants for message tagging,
//! frame timing, buffer sizing, and capacity limits.
//!
//! ## Key Concepts
//!
//! - **Kind byte**: every wire message carries a 1-byte kind tag after the
//!   version byte. The low nibble is the type lane; the high bits carry
//!   variant flags (transmission-request marker, join, downstream, rate).
//! - **Guards**: fixed inter-phase and inter-minislot idle intervals that
//!   absorb clock skew and radio turnaround time.
//! - **TR unit length**: contention minislots are sized for exactly one
//!   transmission request, using a fixed per-network budget rather than a
//!   computed airtime.
//! - **Capacity limits**: every queue and table in the engines is a bounded
//!   `heapless` container sized by the constants below; exceeding one is a
//!   reported condition, never undefined behavior.

/// Protocol version byte. Messages with any other version are discarded.
pub const DQN_VERSION: u8 = 0x27;

/// Kind byte of an upstream transmission request. Bit 7 marks the TR family;
/// match with [`DQN_MESSAGE_TR_MASK`], not equality.
pub const DQN_MESSAGE_TR: u8 = 0x80;
/// Mask selecting the TR-family marker bit of a kind byte.
pub const DQN_MESSAGE_TR_MASK: u8 = 0x80;
/// Kind byte of a feedback broadcast.
pub const DQN_MESSAGE_FEEDBACK: u8 = 0x01;
/// Kind byte of an acknowledgment bitmap broadcast.
pub const DQN_MESSAGE_ACK: u8 = 0x02;
/// Kind byte of a join transmission request (TR marker + join flag).
pub const DQN_MESSAGE_TR_JOIN: u8 = 0x90;
/// Kind byte of a join request.
pub const DQN_MESSAGE_JOIN_REQ: u8 = 0xa0;
/// Kind byte of a join response.
pub const DQN_MESSAGE_JOIN_RESP: u8 = 0xa1;
/// Mask selecting the type lane (low nibble) of a kind byte.
pub const DQN_MESSAGE_MASK: u8 = 0x0f;
/// Downstream flag: set on a TR when the node asks to receive rather than send.
pub const DQN_MESSAGE_DOWNSTREAM: u8 = 0x04;
/// Join flag within the TR family.
pub const DQN_MESSAGE_JOIN_FLAG: u8 = 0x10;
/// High-rate flag within the TR family.
pub const DQN_MESSAGE_HIGH_RATE: u8 = 0x40;
/// Mask selecting the requested-slot count (1..=3) of a plain TR kind byte.
pub const DQN_MESSAGE_SLOT_MASK: u8 = 0x03;

/// Guard interval between frame phases, in milliseconds.
pub const DQN_GUARD_MS: u32 = 15;
/// Guard interval between contention minislots and data slots, in milliseconds.
pub const DQN_SHORT_GUARD_MS: u32 = 5;
/// Fixed length of one transmission-request minislot, in milliseconds.
pub const DQN_TR_LENGTH_MS: u32 = 150;
/// Preamble length in symbols, used by the on-air-time model.
pub const DQN_PREAMBLE: u16 = 6;

/// Default synchronization interval (10 hours). After this long without a
/// deliberate resync, a node must re-learn frame timing from a fresh feedback.
pub const DQN_SYNC_INTERVAL_MS: u32 = 36_000_000;
/// Default number of consecutive feedback misses (or unadmitted retries)
/// a node tolerates before forcing a full resynchronization.
pub const DQN_SYNC_RETRY: u16 = 2;

/// Length of a hardware address in bytes.
pub const HW_ADDR_LENGTH: usize = 6;

/// A node's fixed hardware address, unique per physical device.
pub type HwAddr = [u8; HW_ADDR_LENGTH];

/// Maximum radio payload in bytes (LoRa FIFO limit).
pub const DQN_MAX_PAYLOAD: usize = 255;

/// Maximum contention minislots per frame. Bounded by the 7-bit lane of the
/// frame-shape field; the per-frame status array is sized by this.
pub const DQN_MAX_TR_SLOTS: usize = 128;

/// Maximum data slots per frame, bounded like [`DQN_MAX_TR_SLOTS`].
pub const DQN_MAX_DATA_SLOTS: usize = 128;

/// Size in bytes of the ack bitmap (one bit per data slot of a frame).
pub const DQN_ACK_BITMAP_LEN: usize = DQN_MAX_DATA_SLOTS / 8;

/// Maximum number of registered nodes per server.
pub const DQN_NODE_CAPACITY: usize = 256;

/// Capacity of the server's pending-admission queue (requests admitted but
/// not yet served a data slot).
pub const DQN_PENDING_CAPACITY: usize = 256;

/// Capacity of a node's outbound message queue, in chunks.
pub const DQN_MESSAGE_QUEUE_SIZE: usize = 10;

/// Fixed feedback header length: version, kind, network id (4), timestamp (4),
/// CRQ length (2), DTQ length (2), frame shape (2).
pub const DQN_FEEDBACK_HEADER_LEN: usize = 16;

/// Largest admission-set snapshot a feedback can carry: the radio payload
/// minus the feedback header and trailing CRC.
pub const DQN_MAX_SNAPSHOT_LEN: usize = DQN_MAX_PAYLOAD - DQN_FEEDBACK_HEADER_LEN - 1;

/// Encoded length of a transmission request.
pub const DQN_TR_LEN: usize = 5;
/// Encoded length of an acknowledgment broadcast.
pub const DQN_ACK_LEN: usize = 2 + DQN_ACK_BITMAP_LEN + 1;
/// Encoded length of a join request.
pub const DQN_JOIN_REQ_LEN: usize = 2 + HW_ADDR_LENGTH + 1;
/// Encoded length of a join response.
pub const DQN_JOIN_RESP_LEN: usize = 2 + HW_ADDR_LENGTH + 2 + 1;

/// Highest slot count representable in one 7-bit lane of the frame-shape field.
pub const DQN_FRAME_MAX_SLOT_COUNT: u8 = 127;

/// Slow-rate selector (the default; every TR currently requests this).
pub const DQN_RATE_SLOW: u8 = 0;
/// Fast-rate selector, reserved for networks that negotiate a second modem
/// configuration.
pub const DQN_RATE_FAST: u8 = 1;
