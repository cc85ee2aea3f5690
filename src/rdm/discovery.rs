//! RDM discovery engine.
//!
//! Enumeration of every responder on the bus by binary descent of the
//! 48-bit UID space: un-mute everyone, probe a branch with
//! `DISC_UNIQUE_BRANCH`, and on collision bisect until each responder
//! is isolated, muted and recorded. The branch stack is explicit and
//! bounded at 49 entries, the worst-case depth of the tree.

use embedded_hal::delay::DelayNs;

use super::controller::AckStatus;
use super::packet::RdmHeader;
use super::pids::{CommandClass, pid, sub_device};
use super::uid::Uid;
use crate::constants::{DISCOVERY_ATTEMPTS, DISCOVERY_STACK_DEPTH, RDM_PDL_MAX};
use crate::driver::error::{Error, IoError, Result, TableError};
use crate::driver::port::DmxPort;
use crate::hal::bus::BusDriver;
use crate::hal::persist::ParameterStore;
use crate::hal::timer::TimingSource;

// =============================================================================
// Discovery Results
// =============================================================================

/// The parameter data of a `DISC_MUTE` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MuteParams {
    /// Managed-proxy / sub-device / boot-loader / proxied-device bits
    pub control_field: u16,
    /// Binding UID, present on multi-port devices
    pub binding_uid: Option<Uid>,
}

/// One device found during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveredDevice {
    /// The responder's UID (the binding UID when one was reported)
    pub uid: Uid,
    /// Zero-based discovery order
    pub index: usize,
    /// Mute response contents
    pub mute: MuteParams,
}

/// What one branch probe established.
enum BranchOutcome {
    /// Nobody answered after all attempts
    Quiet,
    /// Exactly one responder answered cleanly
    Single(Uid),
    /// Garbled data: more than one responder in the branch
    Collision,
}

// =============================================================================
// Discovery Operations
// =============================================================================

impl<B: BusDriver, T: TimingSource, S: ParameterStore, const PIDS: usize> DmxPort<B, T, S, PIDS> {
    /// Discover responders, filling `found` with their UIDs.
    ///
    /// Recording stops at the array's capacity but discovery runs to
    /// completion so every responder ends up muted. Returns the total
    /// number of devices found.
    pub fn discover<D: DelayNs>(&mut self, delay: &mut D, found: &mut [Uid]) -> Result<usize> {
        self.discover_with(delay, |device| {
            if let Some(slot) = found.get_mut(device.index) {
                *slot = device.uid;
            }
        })
    }

    /// Discover responders, invoking `on_device` for each one with its
    /// UID, discovery index and mute parameters.
    ///
    /// Returns the total number of devices found.
    pub fn discover_with<D, F>(&mut self, delay: &mut D, mut on_device: F) -> Result<usize>
    where
        D: DelayNs,
        F: FnMut(&DiscoveredDevice),
    {
        self.ensure_ready()?;

        // Step 1: every responder participates again.
        self.broadcast_un_mute(delay);

        // Step 2: explicit branch stack rooted at the whole UID space.
        let mut stack = [(0u64, 0u64); DISCOVERY_STACK_DEPTH];
        let mut depth = 0usize;
        stack[depth] = (0, Uid::MAX.to_u48());
        depth += 1;

        let force_bisect = self.config.discovery_force_bisect;
        let mut count = 0usize;

        while depth > 0 {
            depth -= 1;
            let (lo, hi) = stack[depth];

            if lo == hi {
                if let Some(device) = self.mute_singleton(delay, Uid::from_u48(lo), count) {
                    on_device(&device);
                    count += 1;
                }
                continue;
            }

            // Re-probe the same branch after every successful mute so
            // remaining responders in it surface one by one.
            loop {
                match self.probe_branch(delay, lo, hi) {
                    BranchOutcome::Quiet => break,
                    BranchOutcome::Single(uid) if !force_bisect => {
                        match self.mute_uid(delay, uid) {
                            Some(mute) => {
                                let device = DiscoveredDevice {
                                    uid: mute.binding_uid.unwrap_or(uid),
                                    index: count,
                                    mute,
                                };
                                on_device(&device);
                                count += 1;
                            }
                            // Answers probes but will not mute: descend
                            // so the rest of the branch still resolves.
                            None => {
                                push_halves(&mut stack, &mut depth, lo, hi)?;
                                break;
                            }
                        }
                    }
                    BranchOutcome::Single(_) | BranchOutcome::Collision => {
                        push_halves(&mut stack, &mut depth, lo, hi)?;
                        break;
                    }
                }
            }
        }

        #[cfg(feature = "defmt")]
        defmt::info!("discovery complete, {} device(s)", count);

        Ok(count)
    }

    /// Broadcast `DISC_UN_MUTE`; nobody answers a broadcast un-mute.
    fn broadcast_un_mute<D: DelayNs>(&mut self, delay: &mut D) {
        let mut header = RdmHeader::request(
            Uid::BROADCAST_ALL,
            CommandClass::DiscoveryCommand,
            pid::DISC_UN_MUTE,
            sub_device::ROOT,
        );
        let mut ack = AckStatus::new();
        let _ = self.send_request(delay, &mut header, &[], &mut [], &mut ack);
    }

    /// Probe `[lo, hi]` with `DISC_UNIQUE_BRANCH`, retrying silence.
    fn probe_branch<D: DelayNs>(&mut self, delay: &mut D, lo: u64, hi: u64) -> BranchOutcome {
        let mut pd = [0u8; 12];
        pd[..6].copy_from_slice(&Uid::from_u48(lo).to_bytes());
        pd[6..].copy_from_slice(&Uid::from_u48(hi).to_bytes());

        for _ in 0..DISCOVERY_ATTEMPTS {
            let mut header = RdmHeader::request(
                Uid::BROADCAST_ALL,
                CommandClass::DiscoveryCommand,
                pid::DISC_UNIQUE_BRANCH,
                sub_device::ROOT,
            );
            let mut ack = AckStatus::new();
            let mut pd_out = [0u8; RDM_PDL_MAX];
            let ok = self.send_request(delay, &mut header, &pd, &mut pd_out, &mut ack);

            if ok {
                if let Some(uid) = ack.src_uid {
                    return BranchOutcome::Single(uid);
                }
            }
            match ack.err {
                // Silence: retry, then conclude the branch is empty
                Some(Error::Io(IoError::Timeout)) | None => {}
                // Data arrived but did not survive decoding: a true
                // collision between overlapping responses
                Some(_) => return BranchOutcome::Collision,
            }
        }
        BranchOutcome::Quiet
    }

    /// Mute a lone branch occupant, with the byte-swapped-UID
    /// workaround for responders that answered probes with their UID
    /// flipped.
    fn mute_singleton<D: DelayNs>(
        &mut self,
        delay: &mut D,
        uid: Uid,
        index: usize,
    ) -> Option<DiscoveredDevice> {
        if let Some(mute) = self.mute_uid(delay, uid) {
            return Some(DiscoveredDevice {
                uid: mute.binding_uid.unwrap_or(uid),
                index,
                mute,
            });
        }
        // One shot at the flipped rendition; the recorded UID is
        // whatever the responder reports, not the guess.
        let flipped = uid.flipped();
        let mute = self.mute_uid(delay, flipped)?;
        Some(DiscoveredDevice {
            uid: mute.binding_uid.unwrap_or(flipped),
            index,
            mute,
        })
    }

    /// Send `DISC_MUTE` to `uid`, retrying up to the attempt limit.
    fn mute_uid<D: DelayNs>(&mut self, delay: &mut D, uid: Uid) -> Option<MuteParams> {
        for _ in 0..DISCOVERY_ATTEMPTS {
            let mut header = RdmHeader::request(
                uid,
                CommandClass::DiscoveryCommand,
                pid::DISC_MUTE,
                sub_device::ROOT,
            );
            let mut ack = AckStatus::new();
            let mut pd_out = [0u8; RDM_PDL_MAX];
            if self.send_request(delay, &mut header, &[], &mut pd_out, &mut ack) {
                return Some(parse_mute_params(&pd_out[..ack.pdl as usize]));
            }
        }
        None
    }
}

/// Split `[lo, hi]` and push both halves.
fn push_halves(
    stack: &mut [(u64, u64); DISCOVERY_STACK_DEPTH],
    depth: &mut usize,
    lo: u64,
    hi: u64,
) -> Result<()> {
    let mid = lo + (hi - lo) / 2;
    if *depth + 2 > DISCOVERY_STACK_DEPTH {
        // Unreachable for a well-formed descent; refuse rather than
        // clobber the stack.
        return Err(TableError::CapacityExceeded.into());
    }
    stack[*depth] = (mid + 1, hi);
    *depth += 1;
    stack[*depth] = (lo, mid);
    *depth += 1;
    Ok(())
}

/// Decode the control field and optional binding UID of a mute reply.
fn parse_mute_params(pd: &[u8]) -> MuteParams {
    let control_field = if pd.len() >= 2 {
        u16::from_be_bytes([pd[0], pd[1]])
    } else {
        0
    };
    let binding_uid = if pd.len() >= 8 {
        Some(Uid::from_bytes([pd[2], pd[3], pd[4], pd[5], pd[6], pd[7]]))
    } else {
        None
    };
    MuteParams {
        control_field,
        binding_uid,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
