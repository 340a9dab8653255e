//! LoRa on-air-time math and frame phase timing.
//!
//! [`ModemConfig`] carries the modulation parameters; [`ModemConfig::air_time_ms`]
//! computes a message's transmission duration from the standard symbol-time and
//! payload-symbol-count formulas (Semtech SX127x datasheet, section 4.1.1.7).
//! [`FrameTiming`] turns those durations, plus the fixed guard intervals and
//! the unit transmission-request length, into the phase budgets and in-frame
//! offsets both engines schedule by.
//!
//! The frame layout, from the start of the feedback broadcast:
//!
//! ```text
//! | feedback | G | TR 0 | g | ... | TR n-1 | g | G | slot 0 | g | ... | G | ack | G |
//! ```
//!
//! where `G` is [`DQN_GUARD_MS`] and `g` is [`DQN_SHORT_GUARD_MS`]. A frame's
//! total length is only well-defined once the CRQ/DTQ slot counts are known
//! from a feedback; before that a node cannot compute a listening schedule.

use crate::consts::{DQN_GUARD_MS, DQN_PREAMBLE, DQN_SHORT_GUARD_MS, DQN_TR_LENGTH_MS};
use libm::ceil;

/// LoRa modulation parameters for on-air-time calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModemConfig {
    /// Bandwidth in Hz (125_000, 250_000 or 500_000).
    pub bandwidth_hz: u32,
    /// Spreading factor (7..=12).
    pub spreading_factor: u8,
    /// Coding-rate denominator (5..=8 for 4/5..4/8).
    pub coding_rate: u8,
    /// Preamble length in symbols.
    pub preamble_symbols: u16,
    /// Explicit (true) or implicit/fixed-length (false) header mode.
    pub explicit_header: bool,
    /// Whether the radio appends its payload CRC.
    pub crc_enabled: bool,
    /// Low-data-rate optimization flag.
    pub low_data_rate: bool,
}

impl Default for ModemConfig {
    /// The network's slow-rate default: SF12 at 500 kHz, 4/8 coding.
    fn default() -> Self {
        Self {
            bandwidth_hz: 500_000,
            spreading_factor: 12,
            coding_rate: 8,
            preamble_symbols: DQN_PREAMBLE,
            explicit_header: true,
            crc_enabled: true,
            low_data_rate: false,
        }
    }
}

impl ModemConfig {
    /// Symbol duration in microseconds: `2^SF / BW`.
    pub fn symbol_time_us(&self) -> u32 {
        ((1u64 << self.spreading_factor) * 1_000_000 / self.bandwidth_hz as u64) as u32
    }

    /// On-air duration in milliseconds of a `payload_len`-byte message,
    /// rounded up to the next millisecond.
    ///
    /// Preamble time is `(preamble_symbols + 4.25)` symbols; the payload
    /// symbol count comes from the published ceiling formula over payload
    /// length, SF, coding rate, header mode and the low-data-rate term.
    pub fn air_time_ms(&self, payload_len: usize) -> u32 {
        let sf = self.spreading_factor as f64;
        let t_sym_us = self.symbol_time_us() as f64;
        let t_preamble_us = (self.preamble_symbols as f64 + 4.25) * t_sym_us;

        let de = if self.low_data_rate { 1.0 } else { 0.0 };
        let h = if self.explicit_header { 0.0 } else { 1.0 };
        let crc_bits = if self.crc_enabled { 16.0 } else { 0.0 };
        let numerator = 8.0 * payload_len as f64 - 4.0 * sf + 28.0 + crc_bits - 20.0 * h;
        let denominator = 4.0 * (sf - 2.0 * de);
        let extra = ceil(numerator / denominator) * self.coding_rate as f64;
        let payload_symbols = 8.0 + if extra > 0.0 { extra } else { 0.0 };

        let total_us = t_preamble_us + payload_symbols * t_sym_us;
        ceil(total_us / 1000.0) as u32
    }
}

/// Phase budgets and in-frame offsets for one frame shape.
///
/// Derived from the modem parameters, the CRQ/DTQ slot counts learned from a
/// feedback, the feedback's own encoded length, and the network's maximum
/// data payload. Both engines derive the same values from the same inputs,
/// which is what keeps their schedules aligned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// On-air duration of the feedback broadcast, in ms.
    pub feedback_ms: u32,
    /// Length of one contention minislot including its trailing short guard.
    pub tr_slot_ms: u32,
    /// Length of one data slot including its trailing short guard.
    pub data_slot_ms: u32,
    /// On-air duration of the ack broadcast, in ms.
    pub ack_ms: u32,
    /// Contention minislots in this frame.
    pub num_tr_slots: u8,
    /// Data slots in this frame.
    pub num_data_slots: u8,
}

impl FrameTiming {
    /// Computes the timing for one frame shape.
    pub fn new(
        modem: &ModemConfig,
        num_tr_slots: u8,
        num_data_slots: u8,
        feedback_len: usize,
        max_payload: usize,
        ack_len: usize,
    ) -> Self {
        Self {
            feedback_ms: modem.air_time_ms(feedback_len),
            tr_slot_ms: DQN_TR_LENGTH_MS + DQN_SHORT_GUARD_MS,
            data_slot_ms: modem.air_time_ms(max_payload) + DQN_SHORT_GUARD_MS,
            ack_ms: modem.air_time_ms(ack_len),
            num_tr_slots,
            num_data_slots,
        }
    }

    /// Length of the feedback phase: the broadcast plus the long guard.
    pub fn feedback_phase_ms(&self) -> u32 {
        self.feedback_ms + DQN_GUARD_MS
    }

    /// Length of the contention phase.
    pub fn crq_phase_ms(&self) -> u32 {
        self.num_tr_slots as u32 * self.tr_slot_ms
    }

    /// Length of the data phase.
    pub fn dtq_phase_ms(&self) -> u32 {
        self.num_data_slots as u32 * self.data_slot_ms
    }

    /// Length of the ack phase: the long guard plus the broadcast.
    pub fn ack_phase_ms(&self) -> u32 {
        DQN_GUARD_MS + self.ack_ms
    }

    /// Offset of contention minislot `i` from the frame start.
    pub fn minislot_offset_ms(&self, i: u8) -> u32 {
        self.feedback_phase_ms() + i as u32 * self.tr_slot_ms
    }

    /// Offset of the data phase from the frame start.
    pub fn dtq_start_ms(&self) -> u32 {
        self.feedback_phase_ms() + self.crq_phase_ms() + DQN_GUARD_MS
    }

    /// Offset of data slot `s` from the frame start.
    pub fn data_slot_offset_ms(&self, s: u8) -> u32 {
        self.dtq_start_ms() + s as u32 * self.data_slot_ms
    }

    /// Offset of the ack broadcast from the frame start.
    pub fn ack_offset_ms(&self) -> u32 {
        self.dtq_start_ms() + self.dtq_phase_ms() + DQN_GUARD_MS
    }

    /// Total frame length: feedback through the post-ack guard.
    pub fn frame_ms(&self) -> u32 {
        self.ack_offset_ms() + self.ack_ms + DQN_GUARD_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::DQN_ACK_LEN;

    #[test]
    fn symbol_time_reference_values() {
        let sf7_125k = ModemConfig {
            spreading_factor: 7,
            bandwidth_hz: 125_000,
            ..Default::default()
        };
        // 2^7 / 125000 = 1024 us
        assert_eq!(sf7_125k.symbol_time_us(), 1024);

        let sf12_500k = ModemConfig::default();
        // 2^12 / 500000 = 8192 us
        assert_eq!(sf12_500k.symbol_time_us(), 8192);
    }

    #[test]
    fn air_time_monotone_in_payload() {
        let modem = ModemConfig::default();
        let mut last = 0;
        for len in [0, 5, 16, 50, 100, 200, 255] {
            let t = modem.air_time_ms(len);
            assert!(t >= last, "airtime shrank at payload {len}");
            last = t;
        }
    }

    #[test]
    fn air_time_monotone_in_spreading_factor() {
        let mut last = 0;
        for sf in 7..=12 {
            let modem = ModemConfig { spreading_factor: sf, ..Default::default() };
            let t = modem.air_time_ms(50);
            assert!(t >= last, "airtime shrank at SF{sf}");
            last = t;
        }
    }

    #[test]
    fn air_time_decreases_with_bandwidth() {
        let narrow = ModemConfig { bandwidth_hz: 125_000, ..Default::default() };
        let wide = ModemConfig { bandwidth_hz: 500_000, ..Default::default() };
        assert!(narrow.air_time_ms(50) > wide.air_time_ms(50));
    }

    #[test]
    fn empty_payload_still_carries_preamble() {
        let modem = ModemConfig::default();
        assert!(modem.air_time_ms(0) > 0);
    }

    #[test]
    fn tr_fits_in_its_minislot() {
        // Requests go out in implicit-header mode without the radio CRC
        // (the codec's own CRC-8 is the integrity gate). At the slow rate
        // that is exactly what the fixed 150 ms minislot budget covers.
        let modem = ModemConfig {
            explicit_header: false,
            crc_enabled: false,
            ..Default::default()
        };
        assert!(modem.air_time_ms(crate::consts::DQN_TR_LEN) <= crate::consts::DQN_TR_LENGTH_MS);
    }

    #[test]
    fn frame_length_is_sum_of_phases() {
        let modem = ModemConfig::default();
        let timing = FrameTiming::new(&modem, 4, 4, 40, 100, DQN_ACK_LEN);
        let total = timing.feedback_phase_ms()
            + timing.crq_phase_ms()
            + crate::consts::DQN_GUARD_MS
            + timing.dtq_phase_ms()
            + timing.ack_phase_ms()
            + crate::consts::DQN_GUARD_MS;
        assert_eq!(timing.frame_ms(), total);
    }

    #[test]
    fn offsets_are_ordered() {
        let modem = ModemConfig::default();
        let timing = FrameTiming::new(&modem, 4, 4, 40, 100, DQN_ACK_LEN);
        assert!(timing.minislot_offset_ms(0) < timing.minislot_offset_ms(3));
        assert!(timing.minislot_offset_ms(3) < timing.dtq_start_ms());
        assert!(timing.data_slot_offset_ms(3) < timing.ack_offset_ms());
        assert!(timing.ack_offset_ms() < timing.frame_ms());
    }
}
