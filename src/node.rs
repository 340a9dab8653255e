//! The node session engine.
//!
//! A node moves through explicit session states:
//!
//! ```text
//! IDLE -> SYNC -> TRAN -> CRQ -> ADJT -> DTQ -> SENT -> TRAN
//!           ^________________________|____________________|
//!                (retry threshold / feedback loss)
//! ```
//!
//! - **SYNC**: listen (indefinitely on a cold start) for a valid feedback;
//!   record the server timestamp against the local clock and cache the frame
//!   shape. From then on every frame starts with an aligned feedback listen.
//! - **TRAN**: synchronized and idle. With queued work, pick a contention
//!   minislot and transmit a request (**CRQ**), then wait for the next
//!   feedback to learn the outcome (**ADJT**).
//! - **ADJT**: if the snapshot shows the request's minislot was admitted, the
//!   node computes its data-queue position from the advertised DTQ occupancy
//!   (`dtq_length - admitted_this_round + rank`) and enters **DTQ**; the
//!   position then falls by the slot count each frame until it lands inside a
//!   frame. If not admitted, the retry counter rises and, at the configured
//!   threshold, forces a full resynchronization.
//! - **DTQ**/**SENT**: transmit the queue-front chunk in the assigned slot
//!   and confirm it against the closing ack; an unacknowledged chunk stays
//!   queued for another contention attempt.
//!
//! The join sub-flow rides the same machinery with a join-flagged request;
//! its data slot carries the registration exchange instead of payload. The
//! downstream flow requests a slot the *server* fills, delivered to the
//! injected [`NodeHandler`].
//!
//! Outbound data is queued with [`Node::add_data_to_send`] at any time; the
//! queue is bounded and reports a distinct capacity error when full.

use crate::admission::{AdmissionSet, minislot_key};
use crate::airtime::FrameTiming;
use crate::config::{Config, ConfigError};
use crate::consts::{
    DQN_ACK_LEN, DQN_GUARD_MS, DQN_MAX_PAYLOAD, DQN_MAX_SNAPSHOT_LEN, DQN_MESSAGE_QUEUE_SIZE,
    HwAddr,
};
use crate::macros::{net_debug, net_warn};
use crate::message::{Ack, EncodeError, Feedback, FrameParam, JoinRequest, JoinResponse,
    TransmissionRequest};
use crate::radio::{Clock, Radio};
use embedded_hal::delay::DelayNs;
use heapless::{Deque, Vec};
use thiserror::Error;

/// Application capability injected into the node at construction.
pub trait NodeHandler {
    /// Called when a downstream slot delivered payload to this node.
    fn on_receive(&mut self, payload: &[u8]);
}

/// The session states of the node engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Powered but not yet synchronized.
    #[default]
    Idle,
    /// (Re)learning frame timing from a fresh feedback.
    Sync,
    /// Synchronized and idle.
    Tran,
    /// Transmitting a request in a contention minislot.
    Crq,
    /// Waiting for the next feedback to learn the request's outcome.
    Adjt,
    /// Admitted; waiting for or occupying the assigned data slot.
    Dtq,
    /// Payload transmitted; awaiting the closing ack.
    Sent,
}

/// Node-side engine failure. Timing loss and unadmitted requests are not
/// errors - they are absorbed by the retry/resync machinery.
#[derive(Debug, Error)]
pub enum NodeError<E> {
    /// The radio transport failed.
    #[error("radio transport failure")]
    Radio(E),
    /// A wire message could not be serialized.
    #[error("wire encoding failed")]
    Encode(#[from] EncodeError),
    /// The operation needs a session id; call [`Node::join`] first.
    #[error("node has not joined the network")]
    NotJoined,
    /// Joining kept failing across the configured number of
    /// resynchronization rounds.
    #[error("join retries exhausted")]
    JoinTimeout,
}

/// Capacity condition from the outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The bounded outbound queue is at capacity.
    #[error("outbound queue full")]
    Full,
    /// The chunk exceeds the network's per-slot payload limit.
    #[error("chunk exceeds max payload")]
    PayloadTooLarge,
    /// The shared node handle has not been initialized yet.
    #[error("node not initialized")]
    Uninitialized,
}

/// One queued outbound payload, consumed exactly once when its data slot
/// arrives (or dropped back to the queue front when unacknowledged).
#[derive(Debug)]
struct OutboundChunk {
    data: Vec<u8, DQN_MAX_PAYLOAD>,
}

/// Frame alignment learned from the last adopted feedback.
#[derive(Debug, Clone, Copy)]
struct FrameInfo {
    shape: FrameParam,
    timestamp: u32,
    frame_start_local: u32,
    feedback_len: usize,
}

/// The request transmitted this contention round, awaiting resolution.
#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    frame_timestamp: u32,
    minislot: u8,
}

/// Scalar view of an adopted feedback (the snapshot lands in the node's own
/// admission set).
#[derive(Debug, Clone, Copy)]
struct FeedbackSummary {
    timestamp: u32,
    dtq_length: u16,
    shape: FrameParam,
}

/// Which flow a frame step is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Upstream,
    Downstream,
    Join,
}

/// What one frame of the session produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameEvent {
    /// Nothing actionable this frame.
    Idle,
    /// A request went out; resolution comes with the next feedback.
    Requested,
    /// Admitted but the assigned slot is in a later frame.
    Waiting,
    /// The queue-front chunk was transmitted and acknowledged.
    Delivered(usize),
    /// The slot passed without an ack (or response); the work stays queued.
    NotDelivered,
    /// The join exchange completed with this session id.
    Joined(u16),
    /// A downstream slot delivered this many bytes.
    Downloaded(usize),
    /// Timing was lost; the caller must resynchronize before continuing.
    LostSync,
}

/// A DQN node session over its injected collaborators.
#[derive(Debug)]
pub struct Node<R, C, D, A, H> {
    radio: R,
    clock: C,
    delay: D,
    admission: A,
    handler: H,
    cfg: Config,
    hw_addr: HwAddr,
    node_id: Option<u16>,
    state: SessionState,
    queue: Deque<OutboundChunk, DQN_MESSAGE_QUEUE_SIZE>,
    frame: Option<FrameInfo>,
    last_sync_local: u32,
    feedback_misses: u16,
    request_retries: u16,
    pending_request: Option<PendingRequest>,
    dtq_position: Option<u16>,
    seed: u32,
    buf: [u8; DQN_MAX_PAYLOAD],
}

impl<R, C, D, A, H> Node<R, C, D, A, H>
where
    R: Radio,
    C: Clock,
    D: DelayNs,
    A: AdmissionSet,
    H: NodeHandler,
{
    /// Builds a node over its collaborators.
    pub fn new(
        radio: R,
        clock: C,
        delay: D,
        admission: A,
        handler: H,
        cfg: Config,
        hw_addr: HwAddr,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        if admission.as_bytes().len() > DQN_MAX_SNAPSHOT_LEN {
            return Err(ConfigError::SnapshotOversized);
        }
        // Minislot selection wants per-node dispersion, not randomness; the
        // hardware address seeds a xorshift sequence (never zero).
        let seed = u32::from_le_bytes([hw_addr[0], hw_addr[1], hw_addr[2], hw_addr[3]])
            .wrapping_add(u32::from(u16::from_le_bytes([hw_addr[4], hw_addr[5]])))
            | 1;
        Ok(Self {
            radio,
            clock,
            delay,
            admission,
            handler,
            cfg,
            hw_addr,
            node_id: None,
            state: SessionState::Idle,
            queue: Deque::new(),
            frame: None,
            last_sync_local: 0,
            feedback_misses: 0,
            request_retries: 0,
            pending_request: None,
            dtq_position: None,
            seed,
            buf: [0; DQN_MAX_PAYLOAD],
        })
    }

    /// The current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The session id assigned at join, if any.
    pub fn node_id(&self) -> Option<u16> {
        self.node_id
    }

    /// Whether frame timing is currently known.
    pub fn is_synced(&self) -> bool {
        self.frame.is_some()
    }

    /// Number of chunks awaiting transmission.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// The largest chunk [`Node::add_data_to_send`] accepts.
    pub fn max_payload(&self) -> u8 {
        self.cfg.max_payload
    }

    /// The injected application handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Queues a chunk for upstream transmission.
    ///
    /// Safe to call at any point relative to the engine's phase; the queue is
    /// only drained when an assigned data slot arrives.
    pub fn add_data_to_send(&mut self, data: &[u8]) -> Result<(), QueueError> {
        if data.len() > self.cfg.max_payload as usize {
            return Err(QueueError::PayloadTooLarge);
        }
        let mut chunk = Vec::new();
        chunk.extend_from_slice(data).map_err(|_| QueueError::PayloadTooLarge)?;
        self.queue
            .push_back(OutboundChunk { data: chunk })
            .map_err(|_| QueueError::Full)
    }

    /// Blocks until a valid feedback for this network arrives, then adopts
    /// its timing and frame shape. Used on cold start and whenever timing is
    /// lost; the listen is deliberately unbounded.
    pub fn sync(&mut self) -> Result<(), NodeError<R::Error>> {
        self.state = SessionState::Sync;
        self.pending_request = None;
        self.dtq_position = None;
        net_debug!("synchronizing");
        loop {
            let outcome = self.radio.receive(&mut self.buf, None).map_err(NodeError::Radio)?;
            let Some(n) = outcome else { continue };
            let adopted = match Feedback::decode(&self.buf[..n]) {
                Ok(fb) if fb.network_id == self.cfg.network_id => {
                    self.admission.load(fb.snapshot);
                    Some(FeedbackSummary {
                        timestamp: fb.timestamp,
                        dtq_length: fb.dtq_length,
                        shape: fb.frame,
                    })
                }
                _ => None,
            };
            if let Some(summary) = adopted {
                self.adopt_frame(summary, n);
                self.state = SessionState::Tran;
                net_debug!("synchronized, ts={}", summary.timestamp);
                return Ok(());
            }
        }
    }

    /// Resynchronizes if the synchronization interval has expired (or timing
    /// was never learned).
    pub fn check_sync(&mut self) -> Result<(), NodeError<R::Error>> {
        let stale = match self.frame {
            None => true,
            Some(_) => {
                self.clock.now_ms().wrapping_sub(self.last_sync_local) >= self.cfg.sync_interval_ms
            }
        };
        if stale {
            self.sync()?;
        }
        Ok(())
    }

    /// Registers this node with the server, returning the assigned id.
    ///
    /// Drives join requests through the contention flow until the exchange
    /// completes. Gives up after the configured number of resynchronization
    /// rounds.
    pub fn join(&mut self) -> Result<u16, NodeError<R::Error>> {
        self.check_sync()?;
        let mut resyncs: u16 = 0;
        loop {
            match self.step_frame(Purpose::Join)? {
                FrameEvent::Joined(id) => {
                    net_debug!("joined as node {}", id);
                    return Ok(id);
                }
                FrameEvent::LostSync => {
                    resyncs += 1;
                    if resyncs > self.cfg.sync_retries {
                        return Err(NodeError::JoinTimeout);
                    }
                    self.sync()?;
                }
                _ => {}
            }
        }
    }

    /// Transmits every queued chunk, blocking across as many frames as the
    /// contention and acknowledgment outcomes require. Returns the number of
    /// bytes delivered (acknowledged).
    pub fn send(&mut self) -> Result<u32, NodeError<R::Error>> {
        if self.node_id.is_none() {
            return Err(NodeError::NotJoined);
        }
        self.check_sync()?;
        let mut delivered: u32 = 0;
        while !self.queue.is_empty() {
            match self.step_frame(Purpose::Upstream)? {
                FrameEvent::Delivered(n) => delivered += n as u32,
                FrameEvent::LostSync => self.sync()?,
                _ => {}
            }
        }
        Ok(delivered)
    }

    /// Requests one downstream slot and returns the bytes received in it
    /// (zero when the server had nothing pending). Received payload is also
    /// delivered to the injected handler.
    pub fn recv(&mut self) -> Result<usize, NodeError<R::Error>> {
        if self.node_id.is_none() {
            return Err(NodeError::NotJoined);
        }
        self.check_sync()?;
        loop {
            match self.step_frame(Purpose::Downstream)? {
                FrameEvent::Downloaded(n) => return Ok(n),
                FrameEvent::NotDelivered => return Ok(0),
                FrameEvent::LostSync => self.sync()?,
                _ => {}
            }
        }
    }

    fn adopt_frame(&mut self, summary: FeedbackSummary, feedback_len: usize) {
        let now = self.clock.now_ms();
        let air = self.cfg.modem.air_time_ms(feedback_len);
        self.frame = Some(FrameInfo {
            shape: summary.shape,
            timestamp: summary.timestamp,
            // Reception completed `air` ms after the broadcast - and the
            // frame - started.
            frame_start_local: now.wrapping_sub(air),
            feedback_len,
        });
        self.last_sync_local = now;
        self.feedback_misses = 0;
    }

    fn frame_timing(&self, frame: &FrameInfo) -> FrameTiming {
        FrameTiming::new(
            &self.cfg.modem,
            frame.shape.num_tr_slots,
            frame.shape.num_data_slots,
            frame.feedback_len,
            self.cfg.max_payload as usize,
            DQN_ACK_LEN,
        )
    }

    fn wait_until_offset(&mut self, frame_start_local: u32, offset_ms: u32) {
        let target = frame_start_local.wrapping_add(offset_ms);
        let delta = target.wrapping_sub(self.clock.now_ms()) as i32;
        if delta > 0 {
            self.delay.delay_ms(delta as u32);
        }
    }

    // Current policy: always the slow rate, as every deployed network so far
    // runs a single modem configuration.
    fn determine_rate(&self) -> bool {
        false
    }

    fn pick_minislot(&mut self, num_tr_slots: u8) -> u8 {
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.seed = x;
        (x % num_tr_slots as u32) as u8
    }

    /// Listens for this frame's feedback at the aligned offset. `Ok(None)`
    /// is a miss: the schedule is assumed to have continued, and enough
    /// consecutive misses force [`SessionState::Sync`].
    fn await_feedback(&mut self) -> Result<Option<FeedbackSummary>, NodeError<R::Error>> {
        let Some(frame) = self.frame else {
            self.state = SessionState::Sync;
            return Ok(None);
        };
        let timing = self.frame_timing(&frame);
        let next_start = frame.frame_start_local.wrapping_add(timing.frame_ms());
        self.wait_until_offset(next_start, 0);
        let budget = timing.feedback_ms + DQN_GUARD_MS;
        let outcome = self.radio.receive(&mut self.buf, Some(budget)).map_err(NodeError::Radio)?;
        let adopted = match outcome {
            Some(n) => match Feedback::decode(&self.buf[..n]) {
                Ok(fb) if fb.network_id == self.cfg.network_id => {
                    self.admission.load(fb.snapshot);
                    Some((
                        FeedbackSummary {
                            timestamp: fb.timestamp,
                            dtq_length: fb.dtq_length,
                            shape: fb.frame,
                        },
                        n,
                    ))
                }
                _ => None,
            },
            None => None,
        };
        match adopted {
            Some((summary, len)) => {
                self.adopt_frame(summary, len);
                Ok(Some(summary))
            }
            None => {
                if let Some(frame) = self.frame.as_mut() {
                    frame.frame_start_local = next_start;
                }
                self.feedback_misses += 1;
                net_warn!("feedback missed ({} consecutive)", self.feedback_misses);
                if self.feedback_misses >= self.cfg.sync_retries {
                    self.feedback_misses = 0;
                    self.state = SessionState::Sync;
                }
                Ok(None)
            }
        }
    }

    /// Advances the session by one frame for the given flow.
    fn step_frame(&mut self, purpose: Purpose) -> Result<FrameEvent, NodeError<R::Error>> {
        if self.frame.is_none() || self.state == SessionState::Sync {
            self.state = SessionState::Sync;
            return Ok(FrameEvent::LostSync);
        }
        if self.state == SessionState::Idle {
            self.state = SessionState::Tran;
        }
        let summary = match self.await_feedback()? {
            Some(summary) => summary,
            None => {
                return Ok(if self.state == SessionState::Sync {
                    FrameEvent::LostSync
                } else {
                    FrameEvent::Idle
                });
            }
        };

        if self.state == SessionState::Adjt {
            match self.resolve_admission(&summary) {
                Some(position) => {
                    self.pending_request = None;
                    self.request_retries = 0;
                    self.dtq_position = Some(position);
                    self.state = SessionState::Dtq;
                    net_debug!("admitted at queue position {}", position);
                }
                None => {
                    self.pending_request = None;
                    self.request_retries += 1;
                    if self.request_retries >= self.cfg.sync_retries {
                        // Repeated silence means lost messages or a stale
                        // frame shape; timing must be re-learned.
                        self.request_retries = 0;
                        self.state = SessionState::Sync;
                        return Ok(FrameEvent::LostSync);
                    }
                    net_debug!("not admitted, re-contending");
                    self.state = SessionState::Tran;
                }
            }
        }

        if self.state == SessionState::Dtq {
            let position = self.dtq_position.take().unwrap_or(0);
            let num_data = summary.shape.num_data_slots as u16;
            if position < num_data {
                return self.serve_own_slot(purpose, position as u8);
            }
            self.dtq_position = Some(position - num_data);
            return Ok(FrameEvent::Waiting);
        }

        if self.state == SessionState::Tran {
            let wanted = match purpose {
                Purpose::Upstream => !self.queue.is_empty(),
                Purpose::Downstream | Purpose::Join => true,
            };
            if wanted {
                self.submit_request(purpose)?;
                return Ok(FrameEvent::Requested);
            }
        }
        Ok(FrameEvent::Idle)
    }

    fn submit_request(&mut self, purpose: Purpose) -> Result<(), NodeError<R::Error>> {
        let Some(frame) = self.frame else { return Ok(()) };
        let timing = self.frame_timing(&frame);
        let minislot = self.pick_minislot(frame.shape.num_tr_slots);
        let high_rate = self.determine_rate();
        let tr = match purpose {
            Purpose::Upstream => {
                TransmissionRequest::upstream(self.node_id.unwrap_or(0), 1, high_rate)
            }
            Purpose::Downstream => {
                TransmissionRequest::downstream(self.node_id.unwrap_or(0), 1, high_rate)
            }
            Purpose::Join => TransmissionRequest::join(high_rate),
        };
        self.state = SessionState::Crq;
        self.wait_until_offset(frame.frame_start_local, timing.minislot_offset_ms(minislot));
        let len = tr.encode(&mut self.buf)?;
        self.radio.send(&self.buf[..len]).map_err(NodeError::Radio)?;
        self.pending_request =
            Some(PendingRequest { frame_timestamp: frame.timestamp, minislot });
        self.state = SessionState::Adjt;
        net_debug!("request sent in minislot {}", minislot);
        Ok(())
    }

    /// Checks the freshly loaded snapshot for the pending request and, when
    /// admitted, derives the data-queue position: the advertised occupancy
    /// minus this round's admissions, plus the request's rank among them.
    fn resolve_admission(&mut self, summary: &FeedbackSummary) -> Option<u16> {
        let pending = self.pending_request?;
        if !self
            .admission
            .contains(&minislot_key(pending.frame_timestamp, pending.minislot))
        {
            return None;
        }
        let mut admitted = 0u16;
        let mut rank = 0u16;
        for i in 0..summary.shape.num_tr_slots {
            if self.admission.contains(&minislot_key(pending.frame_timestamp, i)) {
                admitted += 1;
                if i < pending.minislot {
                    rank += 1;
                }
            }
        }
        Some(summary.dtq_length.saturating_sub(admitted) + rank)
    }

    fn serve_own_slot(
        &mut self,
        purpose: Purpose,
        slot: u8,
    ) -> Result<FrameEvent, NodeError<R::Error>> {
        let Some(frame) = self.frame else { return Ok(FrameEvent::Idle) };
        let timing = self.frame_timing(&frame);
        self.wait_until_offset(frame.frame_start_local, timing.data_slot_offset_ms(slot));
        match purpose {
            Purpose::Upstream => {
                let Some(chunk) = self.queue.front() else {
                    self.state = SessionState::Tran;
                    return Ok(FrameEvent::Idle);
                };
                self.radio.send(&chunk.data).map_err(NodeError::Radio)?;
                self.state = SessionState::Sent;
                net_debug!("payload sent in slot {}", slot);

                self.wait_until_offset(frame.frame_start_local, timing.ack_offset_ms());
                let outcome = self
                    .radio
                    .receive(&mut self.buf, Some(timing.ack_ms + DQN_GUARD_MS))
                    .map_err(NodeError::Radio)?;
                let delivered = match outcome {
                    Some(n) => Ack::decode(&self.buf[..n])
                        .map(|ack| ack.is_delivered(slot))
                        .unwrap_or(false),
                    None => false,
                };
                self.state = SessionState::Tran;
                if delivered {
                    let n = self.queue.pop_front().map(|c| c.data.len()).unwrap_or(0);
                    Ok(FrameEvent::Delivered(n))
                } else {
                    net_warn!("slot {} unacknowledged, chunk stays queued", slot);
                    Ok(FrameEvent::NotDelivered)
                }
            }
            Purpose::Join => {
                let req = JoinRequest { hw_addr: self.hw_addr };
                let len = req.encode(&mut self.buf)?;
                self.radio.send(&self.buf[..len]).map_err(NodeError::Radio)?;
                let outcome = self
                    .radio
                    .receive(&mut self.buf, Some(timing.data_slot_ms))
                    .map_err(NodeError::Radio)?;
                self.state = SessionState::Tran;
                if let Some(n) = outcome {
                    if let Ok(resp) = JoinResponse::decode(&self.buf[..n]) {
                        if resp.hw_addr == self.hw_addr {
                            self.node_id = Some(resp.node_id);
                            return Ok(FrameEvent::Joined(resp.node_id));
                        }
                    }
                }
                Ok(FrameEvent::NotDelivered)
            }
            Purpose::Downstream => {
                let budget = self.cfg.modem.air_time_ms(self.cfg.max_payload as usize);
                let outcome =
                    self.radio.receive(&mut self.buf, Some(budget)).map_err(NodeError::Radio)?;
                self.state = SessionState::Tran;
                match outcome {
                    Some(n) => {
                        self.handler.on_receive(&self.buf[..n]);
                        Ok(FrameEvent::Downloaded(n))
                    }
                    None => Ok(FrameEvent::NotDelivered),
                }
            }
        }
    }
}
