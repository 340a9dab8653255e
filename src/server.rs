//! The server cycle engine.
//!
//! One call to [`Server::run_cycle`] drives exactly one frame as a strict
//! phase sequence:
//!
//! 1. **Feedback**: broadcast network id, a monotone timestamp, CRQ/DTQ
//!    occupancy, the frame shape, and the admission-set snapshot summarizing
//!    the previous frame's successful contention slots.
//! 2. **CRQ**: listen across the contention minislots. A minislot is empty,
//!    carries exactly one well-formed transmission request (success), or
//!    yields bytes that fail the CRC gate (collision - discarded, implicitly
//!    retried by its senders next cycle).
//! 3. **DTQ**: serve the pending-admission queue head-first, one reservation
//!    per data slot, in strict arrival order. Upstream slots deliver payload
//!    to the application, downstream slots carry application payload to the
//!    node, join slots run the request/response registration exchange.
//! 4. **Ack**: broadcast the per-slot delivery bitmap.
//! 5. **End of cycle**: append this frame's arrivals to the pending queue and
//!    reset the per-frame counters. The node registry and the admission
//!    set's just-inserted entries persist into the next feedback.
//!
//! Requests admitted in frame N are served from frame N+1 on; that one-frame
//! pipeline is what lets a node compute its data-slot position from the
//! advertised DTQ occupancy and the snapshot alone.
//!
//! Nothing in steady state is fatal: integrity failures are discarded,
//! capacity conditions are logged and deferred, and every phase advances on
//! budget expiry.

use crate::admission::{AdmissionSet, minislot_key};
use crate::airtime::FrameTiming;
use crate::config::{Config, ConfigError};
use crate::consts::{
    DQN_ACK_LEN, DQN_FEEDBACK_HEADER_LEN, DQN_GUARD_MS, DQN_JOIN_RESP_LEN, DQN_MAX_PAYLOAD,
    DQN_MAX_SNAPSHOT_LEN, DQN_MAX_TR_SLOTS, DQN_PENDING_CAPACITY, DQN_SHORT_GUARD_MS,
    DQN_TR_LENGTH_MS, HwAddr,
};
use crate::macros::{net_debug, net_warn};
use crate::message::{Ack, EncodeError, Feedback, JoinRequest, JoinResponse, TransmissionRequest};
use crate::radio::{Clock, Radio};
use crate::registry::{NodeRegistry, RegistryError};
use embedded_hal::delay::DelayNs;
use heapless::{Deque, Vec};
use thiserror::Error;

/// Application capability injected into the server at construction.
pub trait ServerHandler {
    /// Called when a data slot delivered a payload from a registered node.
    fn on_receive(&mut self, payload: &[u8], hw_addr: &HwAddr);

    /// Called when a downstream slot is about to be filled for `hw_addr`.
    /// Writes the payload into `buf` and returns its length; zero means
    /// nothing is pending and the slot stays silent.
    fn on_download(&mut self, hw_addr: &HwAddr, buf: &mut [u8]) -> usize;
}

/// Outcome of one contention minislot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MinislotStatus {
    /// Nothing was received within the minislot budget.
    #[default]
    Empty,
    /// Exactly one well-formed request was parsed.
    Success,
    /// Bytes arrived but failed the integrity gate - overlapping or
    /// corrupted transmissions.
    Collision,
}

/// What an admitted request reserves its data slot for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationKind {
    /// Node transmits payload to the server.
    Upstream,
    /// Server transmits payload to the node.
    Downstream,
    /// Join request/response exchange.
    Join,
}

/// One admitted request awaiting (or occupying) a data slot. Lives only in
/// the server's pending queue, never on the wire.
#[derive(Debug, Clone, Copy)]
struct SlotReservation {
    kind: ReservationKind,
    node_id: u16,
    minislot: u8,
}

/// Server-side engine failure. Only transport faults and internal encoding
/// errors surface here; protocol-level noise is absorbed per cycle.
#[derive(Debug, Error)]
pub enum ServerError<E> {
    /// The radio transport failed.
    #[error("radio transport failure")]
    Radio(E),
    /// A wire message could not be serialized.
    #[error("wire encoding failed")]
    Encode(#[from] EncodeError),
}

/// The coordinating server of one DQN network.
///
/// Generic over the radio transport, the local clock, a delay provider for
/// guard intervals, the admission set, and the application handler - all
/// injected at construction so tests can substitute fakes.
#[derive(Debug)]
pub struct Server<R, C, D, A, H> {
    radio: R,
    clock: C,
    delay: D,
    admission: A,
    handler: H,
    cfg: Config,
    registry: NodeRegistry,
    pending: Deque<SlotReservation, DQN_PENDING_CAPACITY>,
    arrivals: Vec<SlotReservation, DQN_MAX_TR_SLOTS>,
    tr_status: [MinislotStatus; DQN_MAX_TR_SLOTS],
    crq_collisions: u16,
    ack: Ack,
    last_timestamp: u32,
    buf: [u8; DQN_MAX_PAYLOAD],
}

impl<R, C, D, A, H> Server<R, C, D, A, H>
where
    R: Radio,
    C: Clock,
    D: DelayNs,
    A: AdmissionSet,
    H: ServerHandler,
{
    /// Builds a server over its collaborators.
    ///
    /// Fails only on an unusable configuration, including an admission set
    /// whose snapshot cannot fit a feedback broadcast.
    pub fn new(
        radio: R,
        clock: C,
        delay: D,
        admission: A,
        handler: H,
        cfg: Config,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        if admission.as_bytes().len() > DQN_MAX_SNAPSHOT_LEN {
            return Err(ConfigError::SnapshotOversized);
        }
        let node_capacity = cfg.node_capacity;
        Ok(Self {
            radio,
            clock,
            delay,
            admission,
            handler,
            cfg,
            registry: NodeRegistry::new(node_capacity),
            pending: Deque::new(),
            arrivals: Vec::new(),
            tr_status: [MinislotStatus::Empty; DQN_MAX_TR_SLOTS],
            crq_collisions: 0,
            ack: Ack::new(),
            last_timestamp: 0,
            buf: [0; DQN_MAX_PAYLOAD],
        })
    }

    /// Runs frames until the radio transport fails. Blocking.
    pub fn run(&mut self) -> Result<(), ServerError<R::Error>> {
        loop {
            self.run_cycle()?;
        }
    }

    /// Drives exactly one frame through all five phases.
    pub fn run_cycle(&mut self) -> Result<(), ServerError<R::Error>> {
        let ts = self.next_timestamp();
        self.send_feedback(ts)?;
        self.delay.delay_ms(DQN_GUARD_MS);
        self.receive_trs(ts)?;
        self.delay.delay_ms(DQN_GUARD_MS);
        self.serve_slots()?;
        self.delay.delay_ms(DQN_GUARD_MS);
        self.send_ack()?;
        self.end_cycle();
        self.delay.delay_ms(DQN_GUARD_MS);
        Ok(())
    }

    /// Renegotiates the frame geometry, effective from the next feedback.
    ///
    /// Only the fields the frame-shape wire format can carry are
    /// renegotiable; the payload budget is fixed for the network lifetime.
    pub fn change_network_config(
        &mut self,
        num_tr_slots: u8,
        num_data_slots: u8,
        rate: u8,
    ) -> Result<(), ConfigError> {
        let cfg = Config { num_tr_slots, num_data_slots, rate, ..self.cfg };
        cfg.validate()?;
        self.cfg = cfg;
        Ok(())
    }

    /// The registry of joined nodes.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Number of admitted requests awaiting a data slot.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Outcome of contention minislot `i` in the frame being driven.
    /// Reset at end of cycle.
    pub fn minislot_status(&self, i: u8) -> MinislotStatus {
        self.tr_status[i as usize]
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The injected application handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    // Frame timestamps must be strictly monotone even on a coarse clock:
    // admission keys embed them, and equal stamps would alias entries
    // across frames.
    fn next_timestamp(&mut self) -> u32 {
        let now = self.clock.now_ms();
        let ts = if now > self.last_timestamp { now } else { self.last_timestamp.wrapping_add(1) };
        self.last_timestamp = ts;
        ts
    }

    fn send_feedback(&mut self, ts: u32) -> Result<(), ServerError<R::Error>> {
        let feedback = Feedback {
            network_id: self.cfg.network_id,
            timestamp: ts,
            crq_length: self.crq_collisions,
            dtq_length: self.pending.len() as u16,
            frame: self.cfg.frame_param(),
            snapshot: self.admission.as_bytes(),
        };
        net_debug!(
            "feedback ts={} crq={} dtq={}",
            ts,
            feedback.crq_length,
            feedback.dtq_length
        );
        let len = feedback.encode(&mut self.buf)?;
        self.radio.send(&self.buf[..len]).map_err(ServerError::Radio)?;
        // The snapshot just broadcast covered the previous frame; entries
        // inserted from here on describe this frame's CRQ phase.
        self.admission.clear();
        self.crq_collisions = 0;
        Ok(())
    }

    fn receive_trs(&mut self, ts: u32) -> Result<(), ServerError<R::Error>> {
        for i in 0..self.cfg.num_tr_slots {
            let slot_start = self.clock.now_ms();
            let outcome = self
                .radio
                .receive(&mut self.buf, Some(DQN_TR_LENGTH_MS))
                .map_err(ServerError::Radio)?;
            self.tr_status[i as usize] = match outcome {
                None => MinislotStatus::Empty,
                Some(n) => match TransmissionRequest::decode(&self.buf[..n]) {
                    Ok(tr) => {
                        let kind = if tr.join {
                            ReservationKind::Join
                        } else if tr.downstream {
                            ReservationKind::Downstream
                        } else {
                            ReservationKind::Upstream
                        };
                        let reservation =
                            SlotReservation { kind, node_id: tr.node_id, minislot: i };
                        if self.arrivals.push(reservation).is_ok() {
                            self.admission.insert(&minislot_key(ts, i));
                            MinislotStatus::Success
                        } else {
                            net_warn!("arrival queue full, request in minislot {} dropped", i);
                            MinislotStatus::Empty
                        }
                    }
                    Err(_) => {
                        // Overlapping transmissions never survive the CRC
                        // gate; the senders see no admission and re-contend.
                        self.crq_collisions = self.crq_collisions.saturating_add(1);
                        MinislotStatus::Collision
                    }
                },
            };
            self.hold_until(slot_start, DQN_TR_LENGTH_MS);
            self.delay.delay_ms(DQN_SHORT_GUARD_MS);
        }
        Ok(())
    }

    fn serve_slots(&mut self) -> Result<(), ServerError<R::Error>> {
        let payload_ms = self.cfg.modem.air_time_ms(self.cfg.max_payload as usize);
        for s in 0..self.cfg.num_data_slots {
            let slot_start = self.clock.now_ms();
            match self.pending.pop_front() {
                None => {}
                Some(res) => match res.kind {
                    ReservationKind::Upstream => self.serve_upstream(s, &res, payload_ms)?,
                    ReservationKind::Downstream => self.serve_downstream(s, &res)?,
                    ReservationKind::Join => self.serve_join(s, payload_ms)?,
                },
            }
            self.hold_until(slot_start, payload_ms);
            self.delay.delay_ms(DQN_SHORT_GUARD_MS);
        }
        Ok(())
    }

    fn serve_upstream(
        &mut self,
        slot: u8,
        res: &SlotReservation,
        payload_ms: u32,
    ) -> Result<(), ServerError<R::Error>> {
        let outcome =
            self.radio.receive(&mut self.buf, Some(payload_ms)).map_err(ServerError::Radio)?;
        if let Some(n) = outcome {
            match self.registry.addr_of(res.node_id) {
                Some(addr) => {
                    self.handler.on_receive(&self.buf[..n], addr);
                    self.ack.set_delivered(slot);
                }
                // A reservation can outlive a registration only through
                // protocol noise; drop without disturbing the cycle.
                None => net_debug!("payload from unregistered node {}", res.node_id),
            }
        }
        Ok(())
    }

    fn serve_downstream(
        &mut self,
        slot: u8,
        res: &SlotReservation,
    ) -> Result<(), ServerError<R::Error>> {
        let addr = match self.registry.addr_of(res.node_id) {
            Some(addr) => *addr,
            None => return Ok(()),
        };
        let max = self.cfg.max_payload as usize;
        let n = self.handler.on_download(&addr, &mut self.buf[..max]);
        if n > 0 {
            let n = n.min(max);
            self.radio.send(&self.buf[..n]).map_err(ServerError::Radio)?;
            self.ack.set_delivered(slot);
        }
        Ok(())
    }

    fn serve_join(&mut self, slot: u8, payload_ms: u32) -> Result<(), ServerError<R::Error>> {
        let resp_ms = self.cfg.modem.air_time_ms(DQN_JOIN_RESP_LEN);
        // Leave room inside the slot for the guard and our response.
        let req_budget = payload_ms.saturating_sub(resp_ms + DQN_SHORT_GUARD_MS);
        let outcome =
            self.radio.receive(&mut self.buf, Some(req_budget)).map_err(ServerError::Radio)?;
        let Some(n) = outcome else {
            return Ok(());
        };
        let req = match JoinRequest::decode(&self.buf[..n]) {
            Ok(req) => req,
            Err(_) => return Ok(()),
        };
        match self.registry.register(req.hw_addr) {
            Ok(node_id) => {
                self.delay.delay_ms(DQN_SHORT_GUARD_MS);
                let resp = JoinResponse { hw_addr: req.hw_addr, node_id };
                let len = resp.encode(&mut self.buf)?;
                self.radio.send(&self.buf[..len]).map_err(ServerError::Radio)?;
                self.ack.set_delivered(slot);
                net_debug!("registered node {}", node_id);
            }
            Err(RegistryError::Full) => {
                // Surfaced as silence; the node re-contends and the operator
                // sees the capacity condition in the log.
                net_warn!("node registry full, join in slot {} ignored", slot);
            }
        }
        Ok(())
    }

    fn send_ack(&mut self) -> Result<(), ServerError<R::Error>> {
        let ack = self.ack;
        let len = ack.encode(&mut self.buf)?;
        self.radio.send(&self.buf[..len]).map_err(ServerError::Radio)
    }

    fn end_cycle(&mut self) {
        for res in &self.arrivals {
            if self.pending.push_back(*res).is_err() {
                net_warn!("data queue full, deferring request from minislot {}", res.minislot);
                break;
            }
        }
        self.arrivals.clear();
        self.tr_status = [MinislotStatus::Empty; DQN_MAX_TR_SLOTS];
        self.ack = Ack::new();
    }

    // Phase budgets are wall-clock: if a reception finished early, idle out
    // the remainder so the advertised schedule holds.
    fn hold_until(&mut self, start: u32, budget_ms: u32) {
        let elapsed = self.clock.now_ms().wrapping_sub(start);
        if elapsed < budget_ms {
            self.delay.delay_ms(budget_ms - elapsed);
        }
    }

    /// The timing of the frames this server currently runs.
    pub fn frame_timing(&self) -> FrameTiming {
        FrameTiming::new(
            &self.cfg.modem,
            self.cfg.num_tr_slots,
            self.cfg.num_data_slots,
            DQN_FEEDBACK_HEADER_LEN + self.admission.as_bytes().len() + 1,
            self.cfg.max_payload as usize,
            DQN_ACK_LEN,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::DQN_TR_LEN;
    use crate::testutil::{MiniSet, ScriptRadio, StepClock};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use std::vec::Vec as StdVec;

    #[derive(Debug, Default)]
    struct RecordingHandler {
        received: StdVec<(StdVec<u8>, HwAddr)>,
        downloads: StdVec<HwAddr>,
        download_payload: StdVec<u8>,
    }

    impl ServerHandler for RecordingHandler {
        fn on_receive(&mut self, payload: &[u8], hw_addr: &HwAddr) {
            self.received.push((payload.to_vec(), *hw_addr));
        }

        fn on_download(&mut self, hw_addr: &HwAddr, buf: &mut [u8]) -> usize {
            self.downloads.push(*hw_addr);
            let n = self.download_payload.len().min(buf.len());
            buf[..n].copy_from_slice(&self.download_payload[..n]);
            n
        }
    }

    type TestServer = Server<ScriptRadio, StepClock, NoopDelay, MiniSet, RecordingHandler>;

    fn small_config() -> Config {
        Config { num_tr_slots: 4, num_data_slots: 4, ..Default::default() }
    }

    fn server_with(script: StdVec<Option<StdVec<u8>>>, cfg: Config) -> TestServer {
        Server::new(
            ScriptRadio::new(script),
            StepClock::default(),
            NoopDelay::new(),
            MiniSet::default(),
            RecordingHandler::default(),
            cfg,
        )
        .unwrap()
    }

    fn tr_bytes(node_id: u16) -> StdVec<u8> {
        let mut buf = [0u8; DQN_TR_LEN];
        let len = TransmissionRequest::upstream(node_id, 1, false).encode(&mut buf).unwrap();
        buf[..len].to_vec()
    }

    fn down_tr_bytes(node_id: u16) -> StdVec<u8> {
        let mut buf = [0u8; DQN_TR_LEN];
        let len = TransmissionRequest::downstream(node_id, 1, false).encode(&mut buf).unwrap();
        buf[..len].to_vec()
    }

    fn join_tr_bytes() -> StdVec<u8> {
        let mut buf = [0u8; DQN_TR_LEN];
        let len = TransmissionRequest::join(false).encode(&mut buf).unwrap();
        buf[..len].to_vec()
    }

    fn join_req_bytes(hw_addr: HwAddr) -> StdVec<u8> {
        let mut buf = [0u8; 16];
        let len = JoinRequest { hw_addr }.encode(&mut buf).unwrap();
        buf[..len].to_vec()
    }

    fn decode_feedback(frame: &[u8]) -> (u32, u16, u16) {
        let fb = Feedback::decode(frame).unwrap();
        (fb.timestamp, fb.crq_length, fb.dtq_length)
    }

    #[test]
    fn zero_capacity_config_fails_at_construction() {
        let cfg = Config { node_capacity: 0, ..small_config() };
        let result = Server::new(
            ScriptRadio::new([]),
            StepClock::default(),
            NoopDelay::new(),
            MiniSet::default(),
            RecordingHandler::default(),
            cfg,
        );
        assert!(matches!(result, Err(ConfigError::ZeroNodeCapacity)));
    }

    #[test]
    fn fifo_admission_preserves_arrival_order() {
        let script = vec![Some(tr_bytes(1)), Some(tr_bytes(2)), Some(tr_bytes(3)), None];
        let mut server = server_with(script, small_config());
        server.run_cycle().unwrap();

        let order: StdVec<u16> = server.pending.iter().map(|r| r.node_id).collect();
        assert_eq!(order, vec![1, 2, 3]);

        // Next cycle drains all three in arrival order, one slot each.
        server.radio.incoming.extend([None, None, None, None, None, None, None]);
        server.run_cycle().unwrap();
        assert_eq!(server.pending_len(), 0);
    }

    #[test]
    fn collision_is_counted_and_not_admitted() {
        let mut corrupted = tr_bytes(5);
        corrupted[2] ^= 0xff;
        let script = vec![Some(corrupted), None, None, None];
        let mut server = server_with(script, small_config());
        server.run_cycle().unwrap();

        assert_eq!(server.pending_len(), 0);
        assert_eq!(server.crq_collisions, 1);

        // The next feedback advertises the collision, then the counter resets.
        server.radio.incoming.extend([None, None, None, None]);
        server.run_cycle().unwrap();
        let (_, crq, dtq) = decode_feedback(&server.radio.sent[2]);
        assert_eq!((crq, dtq), (1, 0));
        assert_eq!(server.crq_collisions, 0);
    }

    #[test]
    fn end_to_end_upstream_delivery() {
        let hw: HwAddr = [0xca, 0xfe, 0, 0, 0, 1];
        let payload = vec![0x42u8; 20];

        // Frame 1: join TR in minislot 0.
        let mut script = vec![Some(join_tr_bytes()), None, None, None];
        // Frame 2: join exchange in data slot 0.
        script.extend([None, None, None, None, Some(join_req_bytes(hw))]);
        let mut server = server_with(script, small_config());
        server.run_cycle().unwrap();
        server.run_cycle().unwrap();

        assert_eq!(server.registry().len(), 1);
        assert_eq!(server.registry().id_of(&hw), Some(1));
        let resp = JoinResponse::decode(&server.radio.sent[3]).unwrap();
        assert_eq!(resp, JoinResponse { hw_addr: hw, node_id: 1 });

        // Frame 3: upstream TR from node 1 in minislot 0.
        server.radio.incoming.extend([Some(tr_bytes(1)), None, None, None]);
        server.run_cycle().unwrap();
        let (_, _, dtq) = decode_feedback(&server.radio.sent[5]);
        assert_eq!(dtq, 0, "request admitted at end of cycle, not before");

        // Frame 4: the feedback advertises the admission; payload lands in
        // data slot 0 and the closing ack marks it delivered.
        server.radio.incoming.extend([None, None, None, None, Some(payload.clone())]);
        server.run_cycle().unwrap();

        // Sends so far: fb1, ack1, fb2, join resp, ack2, fb3, ack3, fb4, ack4.
        let fb4 = Feedback::decode(&server.radio.sent[7]).unwrap();
        assert_eq!(fb4.dtq_length, 1);
        let fb3 = Feedback::decode(&server.radio.sent[5]).unwrap();
        let mut probe = MiniSet::default();
        probe.load(fb4.snapshot);
        assert!(probe.contains(&minislot_key(fb3.timestamp, 0)));

        assert_eq!(server.handler().received, vec![(payload, hw)]);
        let ack = Ack::decode(server.radio.sent.last().unwrap()).unwrap();
        assert!(ack.is_delivered(0));
        assert!(!ack.is_delivered(1));
        assert_eq!(server.pending_len(), 0);
    }

    #[test]
    fn unregistered_node_payload_dropped_silently() {
        let mut script = vec![Some(tr_bytes(99)), None, None, None];
        script.extend([None, None, None, None, Some(vec![1, 2, 3])]);
        let mut server = server_with(script, small_config());
        server.run_cycle().unwrap();
        server.run_cycle().unwrap();

        assert!(server.handler().received.is_empty());
        let ack = Ack::decode(server.radio.sent.last().unwrap()).unwrap();
        assert!(!ack.is_delivered(0));
    }

    #[test]
    fn registry_full_join_is_ignored_not_fatal() {
        let cfg = Config { node_capacity: 1, ..small_config() };
        let mut script = vec![Some(join_tr_bytes()), Some(join_tr_bytes()), None, None];
        script.extend([
            None,
            None,
            None,
            None,
            Some(join_req_bytes([1; 6])),
            Some(join_req_bytes([2; 6])),
        ]);
        let mut server = server_with(script, cfg);
        server.run_cycle().unwrap();
        server.run_cycle().unwrap();

        assert_eq!(server.registry().len(), 1);
        let responses = server
            .radio
            .sent
            .iter()
            .filter(|f| JoinResponse::decode(f).is_ok())
            .count();
        assert_eq!(responses, 1);
    }

    #[test]
    fn downstream_slot_carries_application_payload() {
        let hw: HwAddr = [7; 6];
        let mut script = vec![Some(down_tr_bytes(1)), None, None, None];
        script.extend([None, None, None, None]);
        let mut server = server_with(script, small_config());
        let _ = server.registry.register(hw).unwrap();
        server.handler.download_payload = b"abc".to_vec();

        server.run_cycle().unwrap();
        server.run_cycle().unwrap();

        assert_eq!(server.handler().downloads, vec![hw]);
        // Sends: fb1, ack1, fb2, downstream payload, ack2.
        assert_eq!(server.radio.sent[3], b"abc".to_vec());
        let ack = Ack::decode(server.radio.sent.last().unwrap()).unwrap();
        assert!(ack.is_delivered(0));
    }

    #[test]
    fn renegotiated_frame_shape_appears_in_next_feedback() {
        let mut server = server_with(vec![], small_config());
        assert!(matches!(
            server.change_network_config(0, 4, 0),
            Err(ConfigError::ZeroSlots)
        ));
        server.change_network_config(8, 8, 0).unwrap();

        server.radio.incoming.extend(std::iter::repeat_n(None, 8));
        server.run_cycle().unwrap();
        let fb = Feedback::decode(&server.radio.sent[0]).unwrap();
        assert_eq!(fb.frame.num_tr_slots, 8);
        assert_eq!(fb.frame.num_data_slots, 8);
    }
}
