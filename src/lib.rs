//! # dqn915
//!
//! A portable, no_std Rust implementation of the Distributed Queueing (DQN)
//! reservation MAC for star-topology LoRa networks, built for RFM95/SX127x-class
//! radios reporting to one coordinating server over a shared, half-duplex channel.
//!
//! Channel time is divided into repeating frames. Each frame opens with a server
//! feedback broadcast, continues with a contention phase (CRQ minislots where
//! nodes announce transmission requests), a reservation phase (DTQ slots where
//! admitted nodes move payload), and closes with an acknowledgment bitmap.
//! Admission is first-come-first-served and collision-tolerant: a corrupted
//! minislot is simply retried on the next frame.
//!
//! This crate implements the protocol engine only:
//! - wire framing and CRC gating for the five message types
//! - LoRa on-air-time math and frame/phase/slot timing budgets
//! - the server cycle engine (feedback, CRQ scan, DTQ service, ack, reset)
//! - the node session engine (sync, join, request, transmit, ack, resync)
//!
//! The radio PHY, the clock, and the probabilistic admission set are external
//! collaborators supplied through traits ([`radio::Radio`], [`radio::Clock`],
//! [`admission::AdmissionSet`]) plus [`embedded_hal::delay::DelayNs`] for phase
//! waits.
//!
//! ## Crate features
//! | Feature                 | Description |
//! |-------------------------|-------------|
//! | `std`                   | Disables `#![no_std]` and enables `std` in dependencies |
//! | `shared-node` (default) | `critical_section` helpers for enqueueing from a second context or ISR |
//! | `defmt-0-3`             | Uses `defmt` logging |
//! | `log`                   | Uses `log` logging |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dqn915::config::Config;
//! use dqn915::node::Node;
//!
//! let cfg = Config::default();
//! let mut node = Node::new(radio, clock, delay, admission, handler, cfg, hw_addr)?;
//! node.sync()?;
//! let id = node.join()?;
//! node.add_data_to_send(b"sensor reading")?;
//! let sent = node.send()?;
//! ```
//!
//! Server side:
//!
//! ```rust,ignore
//! use dqn915::server::Server;
//!
//! let mut server = Server::new(radio, clock, delay, admission, handler, cfg)?;
//! loop {
//!     server.run_cycle()?;
//! }
//! ```
//!
//! ## Integration Notes
//!
//! - Both engines are single-threaded and phase-driven: they block for the
//!   listening budget the timing model computes for the current phase, then
//!   advance. An empty budget ("nothing received") is a normal outcome, never
//!   an error.
//! - A node cannot compute its listening schedule before the first valid
//!   feedback supplies the frame shape; [`node::Node::sync`] blocks
//!   indefinitely for that first broadcast.
//! - Only steady-state capacity conditions are surfaced as errors; integrity
//!   failures (CRC/version mismatch) are silently discarded per protocol.
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    while_true,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces
)]
#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "shared-node")]
pub use critical_section;

pub use heapless;

pub(crate) mod macros;

pub mod admission;
pub mod airtime;
pub mod config;
pub mod consts;
pub(crate) mod crc;
pub mod message;
pub mod node;
pub mod radio;
pub mod registry;
pub mod server;
#[cfg(feature = "shared-node")]
pub mod shared;
#[cfg(test)]
pub(crate) mod testutil;
