//! Testing utilities and mock implementations
//!
//! This module provides simulated hardware for testing the DMX/RDM
//! driver on the host: a bus driver with scripted or modeled far-end
//! responders, an instant-expiry timing source, an in-memory
//! persistence store and a no-op delay.
//!
//! Only available when running `cargo test`.

#![cfg(test)]
#![allow(missing_docs)]

extern crate std;

use std::collections::{HashMap, VecDeque};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::hal::bus::{BusDriver, BusEvent, Direction};
use crate::hal::persist::ParameterStore;
use crate::hal::timer::TimingSource;
use crate::rdm::packet::{self, Decoded, RdmHeader};
use crate::rdm::pids::{CommandClass, NackReason, Pid, ResponseType, pid};
use crate::rdm::uid::Uid;

// =============================================================================
// Shared Test Fixtures
// =============================================================================

/// A port over the full set of simulated hardware.
pub type SimPort = crate::driver::port::DmxPort<SimBus, SimTimer, MemStore, 16>;

/// Serialize tests that touch the process-wide binding UID.
///
/// The binding UID is first-bind-wins for the process, so tests that
/// initialize ports or reset the binding must not interleave.
pub fn binding_guard() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// An initialized port on simulated hardware, with the binding lock
/// held for the caller's lifetime.
pub fn ready_port() -> (std::sync::MutexGuard<'static, ()>, SimPort) {
    let guard = binding_guard();
    let mut port = SimPort::new(0, SimBus::new(), SimTimer::new(), MemStore::new());
    let config = crate::driver::config::DmxConfig::new()
        .with_mac([0x02, 0x00, 0x00, 0x10, 0x20, 0x30])
        .with_model_id(0x0042)
        .with_discovery_force_bisect(false);
    port.init(config).unwrap();
    (guard, port)
}

// =============================================================================
// Delay / Timer / Store Doubles
// =============================================================================

/// Delay provider that returns immediately.
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// One-shot timer whose deadline is always already past.
///
/// Arming latches an expiry that the next poll consumes, which models
/// "the interval elapsed before anything else happened" — exactly
/// right for a simulation that delivers whole byte runs at once.
#[derive(Default)]
pub struct SimTimer {
    armed: bool,
}

impl SimTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimingSource for SimTimer {
    fn arm_one_shot(&mut self, _duration_us: u32) {
        self.armed = true;
    }

    fn cancel(&mut self) {
        self.armed = false;
    }

    fn poll_expired(&mut self) -> bool {
        core::mem::take(&mut self.armed)
    }
}

/// In-memory `(port, pid)` key-value store.
#[derive(Default)]
pub struct MemStore {
    records: HashMap<(u8, Pid), Vec<u8>>,
    /// When set, every store is rejected (boot-loader flag testing)
    pub fail_stores: bool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, port: u8, pid: Pid) -> Option<&Vec<u8>> {
        self.records.get(&(port, pid))
    }

    pub fn insert(&mut self, port: u8, pid: Pid, data: &[u8]) {
        self.records.insert((port, pid), data.to_vec());
    }
}

impl ParameterStore for MemStore {
    fn load(&mut self, port: u8, pid: Pid, out: &mut [u8]) -> Option<usize> {
        let record = self.records.get(&(port, pid))?;
        if record.len() > out.len() {
            return None;
        }
        out[..record.len()].copy_from_slice(record);
        Some(record.len())
    }

    fn store(&mut self, port: u8, pid: Pid, data: &[u8]) -> bool {
        if self.fail_stores {
            return false;
        }
        self.records.insert((port, pid), data.to_vec());
        true
    }
}

// =============================================================================
// Simulated Far-End Responder
// =============================================================================

/// A modeled RDM responder on the far end of the simulated bus.
pub struct SimResponder {
    pub uid: Uid,
    pub muted: bool,
    /// Binding UID advertised in mute responses (multi-port devices)
    pub binding_uid: Option<Uid>,
    /// UID the device erroneously expects mute commands at (the
    /// "flipped UID" field bug); `None` means it behaves correctly
    pub mute_uid_override: Option<Uid>,
    /// Control field bits reported in mute responses
    pub control_field: u16,
    /// Canned GET responses per PID
    pub get_responses: HashMap<Pid, Vec<u8>>,
    /// Record of SET parameter data received
    pub set_log: Vec<(Pid, Vec<u8>)>,
}

impl SimResponder {
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            muted: false,
            binding_uid: None,
            mute_uid_override: None,
            control_field: 0,
            get_responses: HashMap::new(),
            set_log: Vec::new(),
        }
    }

    fn accepts_mute_at(&self, dest: &Uid) -> bool {
        match self.mute_uid_override {
            Some(expected) => *dest == expected || dest.is_broadcast(),
            None => self.uid.accepts(dest),
        }
    }
}

// =============================================================================
// Simulated Bus
// =============================================================================

/// A captured transmit frame.
#[derive(Debug, Clone)]
pub struct TxFrame {
    pub bytes: Vec<u8>,
    pub with_break: bool,
}

/// A scripted reaction to the next transmitted frame, overriding the
/// modeled responders.
pub enum ScriptedReply {
    /// Deliver these bytes, optionally preceded by a break
    Frame { bytes: Vec<u8>, with_break: bool },
    /// Deliver nothing
    Silence,
}

/// Simulated half-duplex DMX bus.
///
/// Captures everything the driver transmits and, when the driver
/// turns the line around, lets scripted replies or modeled responders
/// produce the inbound byte run.
#[derive(Default)]
pub struct SimBus {
    events: VecDeque<BusEvent>,
    tx_bytes: Vec<u8>,
    tx_had_break: bool,
    tx_frames: Vec<TxFrame>,
    pub responders: Vec<SimResponder>,
    scripted: VecDeque<ScriptedReply>,
    pub direction: Direction,
    pub break_asserted: bool,
    /// Limit bytes accepted per `write_fifo` call (FIFO chunking)
    pub fifo_limit: usize,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            fifo_limit: usize::MAX,
            ..Self::default()
        }
    }

    pub fn add_responder(&mut self, responder: SimResponder) {
        self.responders.push(responder);
    }

    pub fn push_scripted(&mut self, reply: ScriptedReply) {
        self.scripted.push_back(reply);
    }

    /// Deliver a frame to the driver as if a controller sent it.
    pub fn inject_frame(&mut self, bytes: &[u8], with_break: bool) {
        if with_break {
            self.events.push_back(BusEvent::Break);
        }
        for &byte in bytes {
            self.events.push_back(BusEvent::RxByte(byte));
        }
    }

    /// Deliver a framing error to the driver.
    pub fn inject_framing_error(&mut self) {
        self.events.push_back(BusEvent::FramingError);
    }

    /// Close the in-progress capture and return every frame
    /// transmitted so far.
    pub fn take_tx_frames(&mut self) -> Vec<TxFrame> {
        self.absorb_closed_frame();
        core::mem::take(&mut self.tx_frames)
    }

    pub fn responder(&self, uid: Uid) -> Option<&SimResponder> {
        self.responders.iter().find(|r| r.uid == uid)
    }

    /// Close the in-progress capture, returning the finished frame.
    fn close_capture(&mut self) -> Option<Vec<u8>> {
        let with_break = core::mem::take(&mut self.tx_had_break);
        if self.tx_bytes.is_empty() {
            return None;
        }
        let bytes = core::mem::take(&mut self.tx_bytes);
        self.tx_frames.push(TxFrame {
            bytes: bytes.clone(),
            with_break,
        });
        Some(bytes)
    }

    /// A frame finished without the driver listening for a reply
    /// (broadcasts, DMX data): responders still act on it.
    fn absorb_closed_frame(&mut self) {
        if let Some(frame) = self.close_capture() {
            self.respond_as_modeled(&frame);
        }
    }

    /// The driver turned the line around: the frame it just sent may
    /// draw a reply.
    fn turnaround(&mut self) {
        let Some(request) = self.close_capture() else {
            return;
        };

        if let Some(scripted) = self.scripted.pop_front() {
            match scripted {
                ScriptedReply::Frame { bytes, with_break } => self.emit(&bytes, with_break),
                ScriptedReply::Silence => {}
            }
            return;
        }

        self.respond_as_modeled(&request);
    }

    fn emit(&mut self, bytes: &[u8], with_break: bool) {
        if with_break {
            self.events.push_back(BusEvent::Break);
        }
        for &byte in bytes {
            self.events.push_back(BusEvent::RxByte(byte));
        }
    }

    fn respond_as_modeled(&mut self, request: &[u8]) {
        let Ok(Decoded::Rdm { header, pd }) = packet::decode(request) else {
            return;
        };
        let pd = pd.to_vec();

        match (header.cc, header.pid) {
            (CommandClass::DiscoveryCommand, pid::DISC_UNIQUE_BRANCH) => {
                self.respond_unique_branch(&pd);
            }
            (CommandClass::DiscoveryCommand, pid::DISC_MUTE | pid::DISC_UN_MUTE) => {
                self.respond_mute(&header);
            }
            (CommandClass::GetCommand | CommandClass::SetCommand, _) => {
                self.respond_get_set(&header, &pd);
            }
            _ => {}
        }
    }

    fn respond_unique_branch(&mut self, pd: &[u8]) {
        if pd.len() < 12 {
            return;
        }
        let lower = Uid::from_bytes([pd[0], pd[1], pd[2], pd[3], pd[4], pd[5]]);
        let upper = Uid::from_bytes([pd[6], pd[7], pd[8], pd[9], pd[10], pd[11]]);

        let in_range: Vec<Uid> = self
            .responders
            .iter()
            .filter(|r| !r.muted && r.uid >= lower && r.uid <= upper)
            .map(|r| r.uid)
            .collect();

        match in_range.len() {
            0 => {}
            1 => {
                let mut buf = [0u8; 24];
                let len = packet::encode_disc_response(&mut buf, in_range[0]).unwrap();
                let bytes = buf[..len].to_vec();
                self.emit(&bytes, false);
            }
            _ => {
                // Overlapping transmissions: deliver one response with
                // a corrupted body so the checksum cannot survive.
                let mut buf = [0u8; 24];
                let len = packet::encode_disc_response(&mut buf, in_range[0]).unwrap();
                buf[10] ^= 0x0F;
                buf[15] ^= 0x3C;
                let bytes = buf[..len].to_vec();
                self.emit(&bytes, false);
            }
        }
    }

    fn respond_mute(&mut self, header: &RdmHeader) {
        let mute = header.pid == pid::DISC_MUTE;
        let mut reply: Option<Vec<u8>> = None;

        for responder in &mut self.responders {
            if !responder.accepts_mute_at(&header.dest_uid) {
                continue;
            }
            responder.muted = mute;
            if header.dest_uid.is_broadcast() {
                continue;
            }

            let mut pd = Vec::new();
            pd.extend_from_slice(&responder.control_field.to_be_bytes());
            if let Some(binding) = responder.binding_uid {
                pd.extend_from_slice(&binding.to_bytes());
            }
            // A device muted through its flipped UID answers from that
            // address too; its true identity rides in the binding UID.
            let src_uid = if responder.mute_uid_override.is_some() {
                header.dest_uid
            } else {
                responder.uid
            };
            let resp_header = RdmHeader {
                dest_uid: header.src_uid,
                src_uid,
                tn: header.tn,
                port_id: ResponseType::Ack.to_wire(),
                message_count: 0,
                sub_device: header.sub_device,
                cc: header.cc.response(),
                pid: header.pid,
                pdl: pd.len() as u8,
            };
            let mut buf = [0u8; 257];
            let len = packet::encode(&mut buf, &resp_header, &pd).unwrap();
            reply = Some(buf[..len].to_vec());
        }

        if let Some(bytes) = reply {
            self.emit(&bytes, true);
        }
    }

    fn respond_get_set(&mut self, header: &RdmHeader, request_pd: &[u8]) {
        let mut reply: Option<Vec<u8>> = None;

        for responder in &mut self.responders {
            if !responder.uid.accepts(&header.dest_uid) {
                continue;
            }

            let (response_type, pd): (ResponseType, Vec<u8>) = match header.cc {
                CommandClass::GetCommand => match responder.get_responses.get(&header.pid) {
                    Some(data) => (ResponseType::Ack, data.clone()),
                    None => (
                        ResponseType::NackReason,
                        NackReason::UnknownPid.code().to_be_bytes().to_vec(),
                    ),
                },
                CommandClass::SetCommand => {
                    responder.set_log.push((header.pid, request_pd.to_vec()));
                    (ResponseType::Ack, Vec::new())
                }
                _ => continue,
            };

            if header.dest_uid.is_broadcast() {
                continue;
            }

            let resp_header = RdmHeader {
                dest_uid: header.src_uid,
                src_uid: responder.uid,
                tn: header.tn,
                port_id: response_type.to_wire(),
                message_count: 0,
                sub_device: header.sub_device,
                cc: header.cc.response(),
                pid: header.pid,
                pdl: pd.len() as u8,
            };
            let mut buf = [0u8; 257];
            let len = packet::encode(&mut buf, &resp_header, &pd).unwrap();
            reply = Some(buf[..len].to_vec());
        }

        if let Some(bytes) = reply {
            self.emit(&bytes, true);
        }
    }
}

impl BusDriver for SimBus {
    fn write_fifo(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.fifo_limit);
        self.tx_bytes.extend_from_slice(&bytes[..n]);
        self.events.push_back(BusEvent::TxComplete);
        n
    }

    fn flush(&mut self) {
        self.events.clear();
    }

    fn set_direction(&mut self, direction: Direction) {
        let turning_to_rx = self.direction == Direction::Tx && direction == Direction::Rx;
        self.direction = direction;
        if turning_to_rx {
            self.turnaround();
        }
    }

    fn set_break(&mut self, asserted: bool) {
        self.break_asserted = asserted;
        if asserted {
            self.absorb_closed_frame();
            self.tx_had_break = true;
        }
    }

    fn poll_event(&mut self) -> Option<BusEvent> {
        self.events.pop_front()
    }
}

// =============================================================================
// Self Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_timer_expires_once_per_arm() {
        let mut timer = SimTimer::new();
        assert!(!timer.poll_expired());
        timer.arm_one_shot(100);
        assert!(timer.poll_expired());
        assert!(!timer.poll_expired());
    }

    #[test]
    fn mem_store_roundtrip() {
        let mut store = MemStore::new();
        assert!(store.store(0, 0x00F0, &[1, 2]));

        let mut out = [0u8; 4];
        assert_eq!(store.load(0, 0x00F0, &mut out), Some(2));
        assert_eq!(&out[..2], &[1, 2]);
        assert!(store.load(1, 0x00F0, &mut out).is_none());
    }

    #[test]
    fn mem_store_can_fail() {
        let mut store = MemStore::new();
        store.fail_stores = true;
        assert!(!store.store(0, 0x00F0, &[1]));
    }

    #[test]
    fn sim_bus_captures_frames() {
        let mut bus = SimBus::new();
        bus.set_direction(Direction::Tx);
        bus.set_break(true);
        bus.set_break(false);
        bus.write_fifo(&[0x00, 0x10, 0x20]);

        let frames = bus.take_tx_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bytes, &[0x00, 0x10, 0x20]);
        assert!(frames[0].with_break);
    }

    #[test]
    fn sim_bus_scripted_reply_on_turnaround() {
        let mut bus = SimBus::new();
        bus.push_scripted(ScriptedReply::Frame {
            bytes: std::vec![0xAA, 0xBB],
            with_break: true,
        });

        bus.set_direction(Direction::Tx);
        bus.write_fifo(&[0xCC, 0x01]);
        bus.set_direction(Direction::Rx);

        // Drain the TxComplete from the write first
        assert_eq!(bus.poll_event(), Some(BusEvent::TxComplete));
        assert_eq!(bus.poll_event(), Some(BusEvent::Break));
        assert_eq!(bus.poll_event(), Some(BusEvent::RxByte(0xAA)));
        assert_eq!(bus.poll_event(), Some(BusEvent::RxByte(0xBB)));
        assert_eq!(bus.poll_event(), None);
    }
}
