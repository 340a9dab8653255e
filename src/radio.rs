//! Collaborator traits for the radio transport and the local clock.
//!
//! The protocol engines never touch a transceiver directly. They are generic
//! over a [`Radio`] that moves whole frames at a fixed channel configuration,
//! a [`Clock`] that supplies local millisecond time for offset tracking, and
//! an [`embedded_hal::delay::DelayNs`] for waiting out guard intervals and
//! slot boundaries. Any RFM95/SX127x driver (or an in-memory fake in tests)
//! can sit behind these traits.

/// A half-duplex packet radio at a fixed channel configuration.
///
/// The engines assume the configuration (frequency, modulation) does not
/// change mid-frame; rate renegotiation happens only at feedback boundaries
/// and is the platform's responsibility to apply.
pub trait Radio {
    /// Transport-level failure type (bus errors, chip faults). Timeouts and
    /// empty listening windows are *not* errors.
    type Error: core::fmt::Debug;

    /// Transmits one frame, blocking until the radio has accepted it.
    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Listens for up to `timeout_ms`, or indefinitely when `None`.
    ///
    /// Returns `Ok(Some(len))` with the frame copied into `buf`, or
    /// `Ok(None)` when the budget expired with nothing received - a normal
    /// outcome (empty minislot, lost packet), never an error. The engines
    /// always advance their phase on budget expiry; the indefinite wait is
    /// used only for deliberate blocking (cold synchronization).
    fn receive(&mut self, buf: &mut [u8], timeout_ms: Option<u32>)
    -> Result<Option<usize>, Self::Error>;
}

/// Local millisecond clock.
///
/// Only differences of readings are used, so the epoch is arbitrary;
/// wrapping at `u32::MAX` is handled by the engines' offset arithmetic.
pub trait Clock {
    /// Current local time in milliseconds.
    fn now_ms(&self) -> u32;
}
