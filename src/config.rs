//! Network configuration surface.
//!
//! One [`Config`] describes everything a deployment fixes about a DQN
//! network: identity, frame geometry, modulation, capacities and retry
//! thresholds. Both engines take a `Config` at construction and call
//! [`Config::validate`] before touching the radio; an invalid configuration
//! is the only condition in this crate that is a hard startup failure rather
//! than a recoverable runtime state.

use crate::airtime::ModemConfig;
use crate::consts::{
    DQN_FRAME_MAX_SLOT_COUNT, DQN_JOIN_REQ_LEN, DQN_JOIN_RESP_LEN, DQN_NODE_CAPACITY,
    DQN_RATE_SLOW, DQN_SHORT_GUARD_MS, DQN_SYNC_INTERVAL_MS, DQN_SYNC_RETRY,
};
use crate::message::FrameParam;
use thiserror::Error;

/// A configuration the engines cannot start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Node capacity of zero leaves nothing to register.
    #[error("node capacity must be at least 1")]
    ZeroNodeCapacity,
    /// Node capacity above the registry's bounded size.
    #[error("node capacity exceeds {DQN_NODE_CAPACITY}")]
    NodeCapacityTooLarge,
    /// A frame needs at least one contention minislot and one data slot.
    #[error("slot counts must be at least 1")]
    ZeroSlots,
    /// Slot counts above what the frame-shape field can carry.
    #[error("slot counts exceed {DQN_FRAME_MAX_SLOT_COUNT}")]
    SlotCountTooLarge,
    /// A zero maximum payload makes every data slot useless.
    #[error("max payload must be at least 1")]
    ZeroPayload,
    /// A data slot sized by `max_payload` cannot fit the join
    /// request/response exchange.
    #[error("data slot too short for the join exchange")]
    SlotTooShortForJoin,
    /// The admission set serializes to more than a feedback can carry.
    #[error("admission set snapshot too large for a feedback")]
    SnapshotOversized,
}

/// Structured configuration for one DQN network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Network identifier carried in every feedback; nodes ignore other
    /// networks' broadcasts.
    pub network_id: u32,
    /// How long a node may trust a learned frame shape before it must
    /// resynchronize from a fresh feedback.
    pub sync_interval_ms: u32,
    /// Consecutive feedback misses (or unadmitted request retries) a node
    /// tolerates before forcing full resynchronization.
    pub sync_retries: u16,
    /// Target false-positive probability the platform configures its
    /// admission set with. Recorded here so deployments keep both sides
    /// consistent; the engines never evaluate it.
    pub admission_error_rate: f32,
    /// Contention minislots per frame.
    pub num_tr_slots: u8,
    /// Data slots per frame.
    pub num_data_slots: u8,
    /// Largest data payload a slot carries, in bytes. Fixed for the network
    /// lifetime (the frame-shape field has no payload-size lane).
    pub max_payload: u8,
    /// Rate selector advertised in the frame shape.
    pub rate: u8,
    /// Modulation parameters for the timing model.
    pub modem: ModemConfig,
    /// Registered-node limit for the server's registry.
    pub node_capacity: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_id: 1,
            sync_interval_ms: DQN_SYNC_INTERVAL_MS,
            sync_retries: DQN_SYNC_RETRY,
            admission_error_rate: 0.01,
            num_tr_slots: 16,
            num_data_slots: 16,
            max_payload: 100,
            rate: DQN_RATE_SLOW,
            modem: ModemConfig::default(),
            node_capacity: DQN_NODE_CAPACITY as u16,
        }
    }
}

impl Config {
    /// Checks the configuration for conditions the engines cannot recover
    /// from at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_capacity == 0 {
            return Err(ConfigError::ZeroNodeCapacity);
        }
        if self.node_capacity as usize > DQN_NODE_CAPACITY {
            return Err(ConfigError::NodeCapacityTooLarge);
        }
        if self.num_tr_slots == 0 || self.num_data_slots == 0 {
            return Err(ConfigError::ZeroSlots);
        }
        if self.num_tr_slots > DQN_FRAME_MAX_SLOT_COUNT
            || self.num_data_slots > DQN_FRAME_MAX_SLOT_COUNT
        {
            return Err(ConfigError::SlotCountTooLarge);
        }
        if self.max_payload == 0 {
            return Err(ConfigError::ZeroPayload);
        }
        // The join exchange (request up, short guard, response down) must fit
        // the data slot budget derived from max_payload.
        let slot_budget = self.modem.air_time_ms(self.max_payload as usize);
        let join_exchange = self.modem.air_time_ms(DQN_JOIN_REQ_LEN)
            + DQN_SHORT_GUARD_MS
            + self.modem.air_time_ms(DQN_JOIN_RESP_LEN);
        if join_exchange > slot_budget {
            return Err(ConfigError::SlotTooShortForJoin);
        }
        Ok(())
    }

    /// The frame-shape field this configuration advertises.
    pub fn frame_param(&self) -> FrameParam {
        FrameParam {
            num_tr_slots: self.num_tr_slots,
            num_data_slots: self.num_data_slots,
            rate: self.rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn zero_node_capacity_is_a_startup_failure() {
        let cfg = Config { node_capacity: 0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroNodeCapacity));
    }

    #[test]
    fn zero_slots_rejected() {
        let cfg = Config { num_tr_slots: 0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroSlots));
        let cfg = Config { num_data_slots: 0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroSlots));
    }

    #[test]
    fn slot_counts_bounded_by_frame_shape_field() {
        let cfg = Config { num_tr_slots: 128, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::SlotCountTooLarge));
    }

    #[test]
    fn tiny_payload_cannot_host_the_join_exchange() {
        let cfg = Config { max_payload: 8, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::SlotTooShortForJoin));
    }

    #[test]
    fn frame_param_mirrors_config() {
        let cfg = Config::default();
        let param = cfg.frame_param();
        assert_eq!(param.num_tr_slots, cfg.num_tr_slots);
        assert_eq!(param.num_data_slots, cfg.num_data_slots);
        assert_eq!(param.rate, cfg.rate);
    }
}
