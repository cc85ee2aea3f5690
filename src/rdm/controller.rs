//! RDM controller (requester) operations.
//!
//! This module extends [`DmxPort`] with the request/response side of
//! RDM: building request frames, driving them through the line state
//! machine, matching responses against the pending transaction and
//! classifying the acknowledgement.

use embedded_hal::delay::DelayNs;

use super::packet::{self, Decoded, RdmHeader};
use super::pids::{NackReason, pid, sub_device};
use super::uid::Uid;
use crate::constants::{
    ACK_TIMER_TICK_MS, RDM_PDL_MAX, RDM_RESPONSE_TIMEOUT_US, WAIT_POLL_INTERVAL_US,
};
use crate::driver::error::{CodecError, ConfigError, Error, IoError};
use crate::driver::line::LineState;
use crate::driver::port::{DmxPort, TransactionState};
use crate::hal::bus::BusDriver;
use crate::hal::persist::ParameterStore;
use crate::hal::timer::TimingSource;

/// Software backstop on the response wait, generous against the
/// 2.8 ms worst-case turnaround plus a full response frame.
const RESPONSE_WAIT_BACKSTOP_US: u32 = RDM_RESPONSE_TIMEOUT_US * 4 + 257 * 44;

// =============================================================================
// Acknowledgement
// =============================================================================

/// How a transaction concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckType {
    /// No response received or none expected
    #[default]
    None,
    /// Responder fulfilled the request
    Ack,
    /// Responder deferred; retry after `timer_ms`
    AckTimer,
    /// Responder declined with `nack_reason`
    NackReason,
    /// Responder has more data than one packet carries
    AckOverflow,
    /// A response arrived but failed validation
    Invalid,
}

/// Everything the controller learned from one transaction.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AckStatus {
    /// Classification of the outcome
    pub ack_type: AckType,
    /// Error that stopped the transaction, if any
    pub err: Option<Error>,
    /// UID of the responder that answered
    pub src_uid: Option<Uid>,
    /// Queued-message count advertised by the responder
    pub message_count: u8,
    /// Parameter data length received with an ACK
    pub pdl: u8,
    /// Retry delay in milliseconds, valid with `AckTimer`
    pub timer_ms: u32,
    /// Decline reason, valid with `NackReason`
    pub nack_reason: Option<NackReason>,
}

impl AckStatus {
    /// An empty acknowledgement.
    pub const fn new() -> Self {
        Self {
            ack_type: AckType::None,
            err: None,
            src_uid: None,
            message_count: 0,
            pdl: 0,
            timer_ms: 0,
            nack_reason: None,
        }
    }
}

// =============================================================================
// Controller Operations
// =============================================================================

impl<B: BusDriver, T: TimingSource, S: ParameterStore, const PIDS: usize> DmxPort<B, T, S, PIDS> {
    /// Send one RDM request and collect its acknowledgement.
    ///
    /// Fields the controller owns are filled in automatically: a null
    /// source UID becomes this port's UID, the port id becomes
    /// `port index + 1`, the message count is zeroed and the
    /// transaction number is taken from the port and incremented once
    /// the frame is on the wire.
    ///
    /// A response is expected iff the destination is unicast or the
    /// request is `DISC_UNIQUE_BRANCH`; otherwise the call returns
    /// after the frame has drained with `ack.ack_type == None`.
    ///
    /// Returns `true` only for an `ACK`. Every other outcome is
    /// described by `ack`.
    pub fn send_request<D: DelayNs>(
        &mut self,
        delay: &mut D,
        header: &mut RdmHeader,
        pd_in: &[u8],
        pd_out: &mut [u8],
        ack: &mut AckStatus,
    ) -> bool {
        *ack = AckStatus::new();
        if self.ensure_ready().is_err() {
            ack.err = Some(ConfigError::NotReady.into());
            return false;
        }
        // Zero-wait send lock: a pending transaction on this port
        // fails the call immediately, without touching the bus.
        if self.send_lock {
            ack.err = Some(IoError::SendBusy.into());
            return false;
        }
        self.send_lock = true;
        let ok = self.send_request_locked(delay, header, pd_in, pd_out, ack);
        self.send_lock = false;
        ok
    }

    fn send_request_locked<D: DelayNs>(
        &mut self,
        delay: &mut D,
        header: &mut RdmHeader,
        pd_in: &[u8],
        pd_out: &mut [u8],
        ack: &mut AckStatus,
    ) -> bool {
        if let Err(e) = validate_request(header, pd_in) {
            ack.err = Some(e.into());
            return false;
        }

        // Auto-filled header fields
        if header.src_uid.is_null() {
            header.src_uid = self.uid();
        }
        header.port_id = self.port_index() + 1;
        header.message_count = 0;
        header.tn = self.tn;
        header.pdl = pd_in.len() as u8;

        let len = match packet::encode(self.frame.as_mut_full(), header, pd_in) {
            Ok(len) => len,
            Err(e) => {
                ack.err = Some(e.into());
                return false;
            }
        };
        self.frame.set_len(len);

        let expect_response =
            !header.dest_uid.is_broadcast() || header.pid == pid::DISC_UNIQUE_BRANCH;
        self.transaction = TransactionState {
            pending: expect_response,
            tn: header.tn,
            cc: header.cc,
            pid: header.pid,
            dest_uid: header.dest_uid,
            src_uid: header.src_uid,
        };

        if let Err(e) = self.send_frame(true, expect_response) {
            ack.err = Some(e);
            self.transaction.pending = false;
            return false;
        }
        if let Err(e) = self.wait_tx_drained(delay) {
            ack.err = Some(e.into());
            self.transaction.pending = false;
            return false;
        }

        // The request is on the wire: the transaction number advances
        // exactly once, response or not.
        self.tn = self.tn.wrapping_add(1);

        if !expect_response {
            self.transaction.pending = false;
            return false;
        }

        match self.wait_response(delay) {
            Ok(()) => {}
            Err(e) => {
                ack.err = Some(e.into());
                self.transaction.pending = false;
                return false;
            }
        }

        let ok = self.classify_response(pd_out, ack);
        self.transaction.pending = false;
        let _ = self.line.consume_rx();
        ok
    }

    /// Block until the line engine has pushed the whole frame out.
    fn wait_tx_drained<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), IoError> {
        let mut elapsed = 0u32;
        loop {
            self.poll();
            if !self.line.is_transmitting() {
                break;
            }
            if elapsed >= RESPONSE_WAIT_BACKSTOP_US {
                self.line.abort(&mut self.timer);
                return Err(IoError::Timeout);
            }
            delay.delay_us(WAIT_POLL_INTERVAL_US);
            elapsed += WAIT_POLL_INTERVAL_US;
        }
        if self.line.state() == LineState::Error {
            return Err(self.line.acknowledge_error().unwrap_or(IoError::BusError));
        }
        Ok(())
    }

    /// Block until a complete response frame (or a line fault) is in.
    fn wait_response<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), IoError> {
        let mut elapsed = 0u32;
        loop {
            self.poll();
            match self.line.state() {
                LineState::RxDone => return Ok(()),
                LineState::Error => {
                    return Err(self.line.acknowledge_error().unwrap_or(IoError::BusError));
                }
                _ => {}
            }
            if elapsed >= RESPONSE_WAIT_BACKSTOP_US {
                self.line.abort(&mut self.timer);
                return Err(IoError::Timeout);
            }
            delay.delay_us(WAIT_POLL_INTERVAL_US);
            elapsed += WAIT_POLL_INTERVAL_US;
        }
    }

    /// Decode the frame in the buffer and match it against the pending
    /// transaction.
    fn classify_response(&mut self, pd_out: &mut [u8], ack: &mut AckStatus) -> bool {
        let tx = self.transaction;
        let decoded = match packet::decode(self.frame.as_slice()) {
            Ok(decoded) => decoded,
            Err(e) => {
                ack.ack_type = AckType::Invalid;
                ack.err = Some(e.into());
                return false;
            }
        };

        match decoded {
            Decoded::DiscoveryResponse(uid) => {
                if tx.pid == pid::DISC_UNIQUE_BRANCH {
                    ack.ack_type = AckType::Ack;
                    ack.src_uid = Some(uid);
                    true
                } else {
                    ack.ack_type = AckType::Invalid;
                    ack.err = Some(CodecError::UnexpectedResponseShape.into());
                    false
                }
            }
            Decoded::Rdm { header: resp, pd } => {
                let Some(response_type) = resp.response_type() else {
                    ack.ack_type = AckType::Invalid;
                    ack.err = Some(CodecError::UnexpectedResponseShape.into());
                    return false;
                };

                if tx.pid != pid::DISC_UNIQUE_BRANCH {
                    let matches = resp.cc == tx.cc.response()
                        && resp.pid == tx.pid
                        && resp.tn == tx.tn
                        && resp.dest_uid == tx.src_uid
                        && resp.src_uid.accepts(&tx.dest_uid);
                    if !matches {
                        ack.ack_type = AckType::Invalid;
                        ack.err = Some(CodecError::UnexpectedResponseShape.into());
                        return false;
                    }
                }

                ack.src_uid = Some(resp.src_uid);
                ack.message_count = resp.message_count;
                use super::pids::ResponseType;
                match response_type {
                    ResponseType::Ack => {
                        let n = pd.len().min(pd_out.len());
                        pd_out[..n].copy_from_slice(&pd[..n]);
                        ack.pdl = pd.len().min(RDM_PDL_MAX) as u8;
                        ack.ack_type = AckType::Ack;
                        true
                    }
                    ResponseType::AckTimer => {
                        let ticks = if pd.len() >= 2 {
                            u16::from_be_bytes([pd[0], pd[1]])
                        } else {
                            0
                        };
                        ack.timer_ms = u32::from(ticks) * ACK_TIMER_TICK_MS;
                        ack.ack_type = AckType::AckTimer;
                        false
                    }
                    ResponseType::NackReason => {
                        let code = if pd.len() >= 2 {
                            u16::from_be_bytes([pd[0], pd[1]])
                        } else {
                            0
                        };
                        ack.nack_reason = Some(NackReason::from_code(code));
                        ack.ack_type = AckType::NackReason;
                        false
                    }
                    ResponseType::AckOverflow => {
                        let n = pd.len().min(pd_out.len());
                        pd_out[..n].copy_from_slice(&pd[..n]);
                        ack.pdl = pd.len().min(RDM_PDL_MAX) as u8;
                        // The continuation request is the caller's
                        // decision; the core only reports the overflow.
                        ack.ack_type = AckType::AckOverflow;
                        false
                    }
                }
            }
        }
    }
}

/// Request pre-validation shared by the controller entry points.
fn validate_request(header: &RdmHeader, pd_in: &[u8]) -> Result<(), ConfigError> {
    if header.dest_uid.is_null() {
        return Err(ConfigError::InvalidArgument);
    }
    if !header.src_uid.is_null() && header.src_uid.is_broadcast() {
        return Err(ConfigError::InvalidArgument);
    }
    if !header.cc.is_request() {
        return Err(ConfigError::InvalidArgument);
    }
    let sub = header.sub_device;
    if sub >= sub_device::MAX + 1 && sub != sub_device::ALL {
        return Err(ConfigError::InvalidArgument);
    }
    if sub == sub_device::ALL && header.cc == super::pids::CommandClass::GetCommand {
        return Err(ConfigError::InvalidArgument);
    }
    if pd_in.len() > RDM_PDL_MAX {
        return Err(ConfigError::InvalidArgument);
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
