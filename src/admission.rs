//! Interface to the probabilistic admission set.
//!
//! The feedback broadcast cannot afford a per-minislot status list, so the
//! server compacts "which contention slots of the previous frame carried a
//! successfully parsed request" into a probabilistic membership set (a bloom
//! filter in practice). Nodes test their own minislot against the received
//! snapshot to learn, without an explicit per-node reply, whether their
//! request was admitted.
//!
//! The set itself is an external collaborator: this crate only consumes the
//! interface below and never redefines its hashing. Implementations are
//! constructed by the platform with a target false-positive probability and
//! a capacity bound (see [`crate::config::Config::admission_error_rate`]);
//! the serialized size must be constant for a given construction, since the
//! feedback's trailing field is sized by it.
//!
//! Keys are `(frame timestamp, minislot index)` pairs built with
//! [`minislot_key`], so entries from different frames never alias.

/// Probabilistic membership set used to compact admission feedback.
pub trait AdmissionSet {
    /// Removes all entries. Called by the server after every feedback
    /// broadcast; the retention window of an entry is thus one frame.
    fn clear(&mut self);

    /// Inserts an identifier.
    fn insert(&mut self, key: &[u8]);

    /// Tests membership. May return false positives at the configured rate,
    /// never false negatives.
    fn contains(&self, key: &[u8]) -> bool;

    /// The fixed-size serialized form carried in a feedback broadcast.
    fn as_bytes(&self) -> &[u8];

    /// Replaces this set's contents with a received snapshot.
    ///
    /// Snapshots shorter or longer than this set's own serialized size come
    /// from a differently configured network and should leave the set empty.
    fn load(&mut self, bytes: &[u8]);
}

/// Builds the admission key for a contention minislot of one frame.
pub fn minislot_key(frame_timestamp: u32, minislot: u8) -> [u8; 5] {
    let ts = frame_timestamp.to_le_bytes();
    [ts[0], ts[1], ts[2], ts[3], minislot]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_distinguish_frames_and_minislots() {
        let a = minislot_key(1000, 3);
        assert_ne!(a, minislot_key(1000, 4));
        assert_ne!(a, minislot_key(1001, 3));
        assert_eq!(a, minislot_key(1000, 3));
    }
}
