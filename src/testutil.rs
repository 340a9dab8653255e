//! Shared fakes for the engine tests: a scripted radio, a stepping clock,
//! and a deterministic stand-in for the admission set.

use crate::admission::AdmissionSet;
use crate::radio::{Clock, Radio};
use core::cell::Cell;
use std::collections::VecDeque;
use std::vec::Vec;

/// A radio driven by a prepared script: each `receive` call consumes one
/// entry (`Some(bytes)` = frame received, `None` = budget expired empty).
/// Every transmitted frame is recorded. An exhausted script reports a
/// transport error, which ends any engine loop under test.
#[derive(Debug, Default)]
pub(crate) struct ScriptRadio {
    pub incoming: VecDeque<Option<Vec<u8>>>,
    pub sent: Vec<Vec<u8>>,
}

impl ScriptRadio {
    pub fn new(script: impl IntoIterator<Item = Option<Vec<u8>>>) -> Self {
        Self { incoming: script.into_iter().collect(), sent: Vec::new() }
    }
}

impl Radio for ScriptRadio {
    type Error = &'static str;

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn receive(
        &mut self,
        buf: &mut [u8],
        _timeout_ms: Option<u32>,
    ) -> Result<Option<usize>, Self::Error> {
        match self.incoming.pop_front() {
            Some(Some(bytes)) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(Some(bytes.len()))
            }
            Some(None) => Ok(None),
            None => Err("script exhausted"),
        }
    }
}

/// A clock advancing one millisecond per reading; enough for the engines'
/// elapsed-time arithmetic without real time.
#[derive(Debug, Default)]
pub(crate) struct StepClock {
    now: Cell<u32>,
}

impl Clock for StepClock {
    fn now_ms(&self) -> u32 {
        let t = self.now.get();
        self.now.set(t.wrapping_add(1));
        t
    }
}

/// A miniature deterministic membership set with an 8-byte serialized form.
/// Both sides of a test share the hashing, so a snapshot produced by one
/// engine's set is readable by the other's - exactly the property the real
/// bloom-filter collaborator provides.
#[derive(Debug, Default)]
pub(crate) struct MiniSet {
    bits: [u8; 8],
}

fn bit_of(key: &[u8]) -> (usize, u8) {
    let h = key.iter().fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(*b as u32));
    let bit = (h % 64) as usize;
    (bit / 8, 1 << (bit % 8))
}

impl AdmissionSet for MiniSet {
    fn clear(&mut self) {
        self.bits = [0; 8];
    }

    fn insert(&mut self, key: &[u8]) {
        let (byte, mask) = bit_of(key);
        self.bits[byte] |= mask;
    }

    fn contains(&self, key: &[u8]) -> bool {
        let (byte, mask) = bit_of(key);
        self.bits[byte] & mask != 0
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    fn load(&mut self, bytes: &[u8]) {
        if bytes.len() == self.bits.len() {
            self.bits.copy_from_slice(bytes);
        } else {
            self.bits = [0; 8];
        }
    }
}

/// Serializes a snapshot advertising the given minislot successes, as a
/// server-side `MiniSet` would.
pub(crate) fn snapshot_for(frame_timestamp: u32, minislots: &[u8]) -> [u8; 8] {
    let mut set = MiniSet::default();
    for m in minislots {
        set.insert(&crate::admission::minislot_key(frame_timestamp, *m));
    }
    set.bits
}

/// Encodes a feedback frame the way a server with the given state would.
pub(crate) fn feedback_bytes(
    network_id: u32,
    timestamp: u32,
    crq_length: u16,
    dtq_length: u16,
    num_tr_slots: u8,
    num_data_slots: u8,
    snapshot: &[u8],
) -> Vec<u8> {
    let feedback = crate::message::Feedback {
        network_id,
        timestamp,
        crq_length,
        dtq_length,
        frame: crate::message::FrameParam { num_tr_slots, num_data_slots, rate: 0 },
        snapshot,
    };
    let mut buf = [0u8; 255];
    let len = feedback.encode(&mut buf).unwrap();
    buf[..len].to_vec()
}

/// Encodes an ack frame marking the given data slots delivered.
pub(crate) fn ack_bytes(delivered: &[u8]) -> Vec<u8> {
    let mut ack = crate::message::Ack::new();
    for slot in delivered {
        ack.set_delivered(*slot);
    }
    let mut buf = [0u8; 32];
    let len = ack.encode(&mut buf).unwrap();
    buf[..len].to_vec()
}

/// Encodes a join response frame.
pub(crate) fn join_resp_bytes(hw_addr: crate::consts::HwAddr, node_id: u16) -> Vec<u8> {
    let resp = crate::message::JoinResponse { hw_addr, node_id };
    let mut buf = [0u8; 16];
    let len = resp.encode(&mut buf).unwrap();
    buf[..len].to_vec()
}
