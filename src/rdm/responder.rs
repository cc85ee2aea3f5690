//! RDM responder engine.
//!
//! This module extends [`DmxPort`] with the inbound side of RDM:
//! discovery participation (unique-branch replies, mute state), the
//! table-driven GET/SET dispatcher, reply emission, and the default
//! parameter set every responder carries.
//!
//! Dispatch follows a fixed ladder: unknown PID, impermissible
//! command class and non-root sub-device are NACKed before the
//! driver handler runs. Broadcast requests are acted upon but never
//! answered, with the single exception of `DISC_UNIQUE_BRANCH`.

use embedded_hal::delay::DelayNs;

use super::format::emplace;
use super::packet::{self, Decoded, RdmHeader};
use super::pids::{CommandClass, NackReason, Pid, ResponseType, control_field, pid, sub_device};
use super::table::{
    CommandClassMask, DeviceInfoView, HandlerContext, HandlerResponse, ParameterDescriptor,
};
use super::uid::{Uid, binding_uid};
use crate::constants::{RDM_ASCII_MAX_LEN, RDM_PDL_MAX, RDM_TURNAROUND_MIN_US};
use crate::driver::error::{IoError, Result};
use crate::driver::port::DmxPort;
use crate::hal::bus::BusDriver;
use crate::hal::persist::ParameterStore;
use crate::hal::timer::TimingSource;

/// Wire format of the `DEVICE_INFO` block: protocol version literal,
/// model, category, software version, footprint, personality
/// (current, count), start address, sub-device count, sensor count.
const DEVICE_INFO_FORMAT: &str = "#0100hwwdwbbwwb$";

/// In-memory size of the `DEVICE_INFO` image fed to the format above.
const DEVICE_INFO_IMAGE_SIZE: usize = 17;

/// Storage size of an ASCII parameter: 32 characters plus NUL.
const LABEL_STORAGE_SIZE: usize = RDM_ASCII_MAX_LEN + 1;

// =============================================================================
// Responder Operations
// =============================================================================

impl<B: BusDriver, T: TimingSource, S: ParameterStore, const PIDS: usize> DmxPort<B, T, S, PIDS> {
    /// Service the RDM frame sitting in the frame buffer, replying if
    /// it is a request this port must answer.
    ///
    /// Called from the receive path once a complete frame is in.
    pub(crate) fn respond_if_addressed<D: DelayNs>(&mut self, delay: &mut D) -> Result<()> {
        let (header, pd_len, pd_buf) = {
            let bytes = self.frame.as_slice();
            match packet::decode(bytes) {
                Ok(Decoded::Rdm { header, pd }) if header.cc.is_request() => {
                    let mut buf = [0u8; RDM_PDL_MAX];
                    buf[..pd.len()].copy_from_slice(pd);
                    (header, pd.len(), buf)
                }
                // Responses, discovery replies and undecodable frames
                // are the controller's or the caller's business.
                _ => return Ok(()),
            }
        };
        let pd = &pd_buf[..pd_len];

        if header.cc == CommandClass::DiscoveryCommand {
            return self.handle_discovery_request(delay, &header, pd);
        }
        if !self.uid().accepts(&header.dest_uid) {
            return Ok(());
        }

        let mut response_pd = [0u8; RDM_PDL_MAX];
        let outcome = self.dispatch(&header, pd, &mut response_pd);

        // Broadcasts are acted upon but not answered
        if header.dest_uid.is_broadcast() {
            return Ok(());
        }

        let mut nack_pd = [0u8; 2];
        let (response_type, reply_pd): (ResponseType, &[u8]) = match outcome {
            HandlerResponse::Ack(pdl) => (ResponseType::Ack, &response_pd[..pdl as usize]),
            HandlerResponse::Nack(reason) => {
                nack_pd = reason.code().to_be_bytes();
                (ResponseType::NackReason, &nack_pd[..])
            }
        };

        let reply = reply_header(&header, self.uid(), response_type, reply_pd.len() as u8);
        self.send_reply(delay, &reply, reply_pd, true)
    }

    /// Discovery requests bypass the generic dispatcher: the
    /// unique-branch reply is not a standard frame, and mute state
    /// lives on the port.
    fn handle_discovery_request<D: DelayNs>(
        &mut self,
        delay: &mut D,
        header: &RdmHeader,
        pd: &[u8],
    ) -> Result<()> {
        match header.pid {
            pid::DISC_UNIQUE_BRANCH => {
                if self.muted || pd.len() < 12 {
                    return Ok(());
                }
                let lower = Uid::from_bytes([pd[0], pd[1], pd[2], pd[3], pd[4], pd[5]]);
                let upper = Uid::from_bytes([pd[6], pd[7], pd[8], pd[9], pd[10], pd[11]]);
                let uid = self.uid();
                if uid < lower || uid > upper {
                    return Ok(());
                }

                #[cfg(feature = "defmt")]
                defmt::debug!("answering unique-branch probe as {}", uid);

                let len = packet::encode_disc_response(self.frame.as_mut_full(), uid)
                    .map_err(crate::driver::error::Error::from)?;
                self.frame.set_len(len);
                delay.delay_us(RDM_TURNAROUND_MIN_US);
                // Discovery responses carry no break
                self.send_frame(false, false)?;
                self.wait_sent(delay)
            }
            pid::DISC_MUTE | pid::DISC_UN_MUTE => {
                if !self.uid().accepts(&header.dest_uid) {
                    return Ok(());
                }
                self.muted = header.pid == pid::DISC_MUTE;
                if header.dest_uid.is_broadcast() {
                    return Ok(());
                }

                let mut control = 0u16;
                if self.boot_loader_required {
                    control |= control_field::BOOT_LOADER;
                }
                let binding = binding_uid().unwrap_or(self.uid());

                let mut reply_pd = [0u8; 8];
                reply_pd[..2].copy_from_slice(&control.to_be_bytes());
                // The binding UID rides along on multi-port devices,
                // where it differs from the port UID.
                let pdl = if binding != self.uid() {
                    reply_pd[2..8].copy_from_slice(&binding.to_bytes());
                    8
                } else {
                    2
                };

                let reply = reply_header(header, self.uid(), ResponseType::Ack, pdl as u8);
                self.send_reply(delay, &reply, &reply_pd[..pdl], true)
            }
            _ => Ok(()),
        }
    }

    /// The NACK ladder and driver-handler invocation for GET/SET.
    fn dispatch(
        &mut self,
        header: &RdmHeader,
        request_pd: &[u8],
        response_pd: &mut [u8],
    ) -> HandlerResponse {
        let Some((descriptor, handler, callback, region)) = self.table.slot_info(header.pid)
        else {
            return HandlerResponse::Nack(NackReason::UnknownPid);
        };

        let permitted = match header.cc {
            CommandClass::GetCommand => descriptor.command_classes.get,
            CommandClass::SetCommand => descriptor.command_classes.set,
            _ => false,
        };
        if !permitted {
            return HandlerResponse::Nack(NackReason::UnsupportedCommandClass);
        }

        // Multi-sub-device support is deferred: anything but the root
        // sub-device is out of range.
        if header.sub_device != sub_device::ROOT {
            return HandlerResponse::Nack(NackReason::SubDeviceOutOfRange);
        }

        let device = self.device_info_view();
        let mut supported = [0 as Pid; 64];
        let supported_len = self.table.supported_pids(&mut supported);

        let outcome = {
            let storage = region.map(|r| self.table.region_mut(r));
            let mut ctx = HandlerContext {
                header,
                request_pd,
                response_pd,
                storage,
                descriptor: &descriptor,
                device: &device,
                supported: &supported[..supported_len],
            };
            handler(&mut ctx)
        };

        if matches!(outcome, HandlerResponse::Ack(_))
            && header.cc == CommandClass::SetCommand
            && descriptor.persistent
        {
            if let Some(r) = region {
                let stored = self
                    .store
                    .store(self.port_index(), header.pid, self.table.region(r));
                if !stored {
                    // The set itself stands; only the flag is raised.
                    self.boot_loader_required = true;

                    #[cfg(feature = "defmt")]
                    defmt::warn!("persist failed for pid {=u16:x}", header.pid);
                }
            }
        }

        if let Some(cb) = callback {
            cb(header);
        }
        outcome
    }

    /// Encode and transmit one reply frame, honoring the minimum
    /// responder turnaround.
    fn send_reply<D: DelayNs>(
        &mut self,
        delay: &mut D,
        header: &RdmHeader,
        pd: &[u8],
        with_break: bool,
    ) -> Result<()> {
        let len = packet::encode(self.frame.as_mut_full(), header, pd)
            .map_err(crate::driver::error::Error::from)?;
        self.frame.set_len(len);
        delay.delay_us(RDM_TURNAROUND_MIN_US);
        self.send_frame(with_break, false)?;
        self.wait_sent(delay)
    }

    // =========================================================================
    // Local Parameter Access
    // =========================================================================

    /// Read a parameter's in-memory value.
    pub fn get_parameter(&self, pid: Pid, out: &mut [u8]) -> Option<usize> {
        self.table.get(pid, out)
    }

    /// Write a parameter's in-memory value, optionally persisting it.
    ///
    /// The in-memory write always takes effect; a rejected persistent
    /// write raises the boot-loader flag and reports
    /// [`IoError::PersistenceFailed`].
    pub fn set_parameter(&mut self, pid: Pid, data: &[u8], persist: bool) -> Result<usize> {
        self.ensure_ready()?;
        let n = self.table.set(pid, data)?;
        if persist {
            if let Some((_, _, _, Some(region))) = self.table.slot_info(pid) {
                if !self
                    .store
                    .store(self.port_index(), pid, self.table.region(region))
                {
                    self.boot_loader_required = true;
                    return Err(IoError::PersistenceFailed.into());
                }
            }
        }
        Ok(n)
    }

    /// Register a parameter with the driver-provided simple handler.
    ///
    /// For parameters whose wire format is fully described by a
    /// format string, this covers GET and SET without custom code.
    pub fn register_parameter(
        &mut self,
        descriptor: ParameterDescriptor,
        storage_size: usize,
    ) -> Result<()> {
        self.ensure_ready()?;
        self.table
            .register(descriptor, simple_handler, None, storage_size)
            .map_err(Into::into)
    }

    /// Snapshot of the state `DEVICE_INFO` reports.
    pub(crate) fn device_info_view(&self) -> DeviceInfoView {
        let mut addr = [0u8; 2];
        let start_address = match self.table.get(pid::DMX_START_ADDRESS, &mut addr) {
            Some(2) => u16::from_le_bytes(addr),
            _ => self.config.dmx_start_address,
        };
        DeviceInfoView {
            model_id: self.config.model_id,
            product_category: self.config.product_category,
            software_version_id: self.config.software_version_id,
            footprint: self.config.current_footprint(),
            current_personality: self.config.current_personality,
            personality_count: self.config.personality_count,
            start_address,
            sub_device_count: 0,
            sensor_count: 0,
        }
    }

    // =========================================================================
    // Default Parameters
    // =========================================================================

    /// Register the parameter set every responder carries.
    pub(crate) fn register_default_parameters(&mut self) -> Result<()> {
        use CommandClassMask as Mask;

        // Discovery parameters hold no storage and admit neither GET
        // nor SET; the discovery engine services them directly.
        self.table.register(
            ParameterDescriptor::new(pid::DISC_UNIQUE_BRANCH, 12, "uu$", Mask::NONE),
            discovery_only_handler,
            None,
            0,
        )?;
        self.table.register(
            ParameterDescriptor::new(pid::DISC_MUTE, 8, "wv$", Mask::NONE),
            discovery_only_handler,
            None,
            0,
        )?;
        self.table.register(
            ParameterDescriptor::new(pid::DISC_UN_MUTE, 8, "wv$", Mask::NONE),
            discovery_only_handler,
            None,
            0,
        )?;

        self.table.register(
            ParameterDescriptor::new(pid::DEVICE_INFO, 19, DEVICE_INFO_FORMAT, Mask::GET)
                .with_description("Device Info"),
            device_info_handler,
            None,
            0,
        )?;
        self.table.register(
            ParameterDescriptor::new(pid::SUPPORTED_PARAMETERS, 0, "w", Mask::GET)
                .with_description("Supported Parameters"),
            supported_parameters_handler,
            None,
            0,
        )?;

        self.table.register(
            ParameterDescriptor::new(
                pid::SOFTWARE_VERSION_LABEL,
                LABEL_STORAGE_SIZE as u8,
                "a$",
                Mask::GET,
            )
            .with_description("Software Version Label"),
            simple_handler,
            None,
            LABEL_STORAGE_SIZE,
        )?;
        self.set_label_storage(pid::SOFTWARE_VERSION_LABEL, self.config.software_version_label);

        self.table.register(
            ParameterDescriptor::new(
                pid::DEVICE_LABEL,
                LABEL_STORAGE_SIZE as u8,
                "a$",
                Mask::GET_SET,
            )
            .with_description("Device Label")
            .with_persistence(),
            simple_handler,
            None,
            LABEL_STORAGE_SIZE,
        )?;
        self.set_label_storage(pid::DEVICE_LABEL, self.config.device_label);

        self.table.register(
            ParameterDescriptor::new(pid::DMX_START_ADDRESS, 2, "w$", Mask::GET_SET)
                .with_range(1, 512, 1)
                .with_description("DMX Start Address")
                .with_persistence(),
            simple_handler,
            None,
            2,
        )?;
        let addr = self.config.dmx_start_address.to_le_bytes();
        let _ = self.table.set(pid::DMX_START_ADDRESS, &addr);

        self.table.register(
            ParameterDescriptor::new(pid::IDENTIFY_DEVICE, 1, "b$", Mask::GET_SET)
                .with_range(0, 1, 0)
                .with_description("Identify Device"),
            simple_handler,
            None,
            1,
        )?;
        let _ = self.table.set(pid::IDENTIFY_DEVICE, &[0]);

        Ok(())
    }

    fn set_label_storage(&mut self, pid: Pid, label: &str) {
        let mut storage = [0u8; LABEL_STORAGE_SIZE];
        let n = label.len().min(RDM_ASCII_MAX_LEN);
        storage[..n].copy_from_slice(&label.as_bytes()[..n]);
        let _ = self.table.set(pid, &storage);
    }

    /// Restore persisted values for every persistent parameter.
    pub(crate) fn restore_persistent_parameters(&mut self) {
        let mut persistent = [(0 as Pid, 0usize); PIDS];
        let mut count = 0;
        for slot in self.table.iter() {
            if slot.descriptor.persistent {
                if let Some(region) = slot.region {
                    persistent[count] = (slot.descriptor.pid, region.len());
                    count += 1;
                }
            }
        }

        let port = self.port_index();
        for &(pid, size) in &persistent[..count] {
            let mut buf = [0u8; RDM_PDL_MAX];
            if let Some(n) = self.store.load(port, pid, &mut buf[..size]) {
                let _ = self.table.set(pid, &buf[..n]);
            }
        }
    }
}

/// Build the header of a reply to `request`.
fn reply_header(
    request: &RdmHeader,
    responder: Uid,
    response_type: ResponseType,
    pdl: u8,
) -> RdmHeader {
    RdmHeader {
        dest_uid: request.src_uid,
        src_uid: responder,
        tn: request.tn,
        port_id: response_type.to_wire(),
        message_count: 0,
        sub_device: request.sub_device,
        cc: request.cc.response(),
        pid: request.pid,
        pdl,
    }
}

// =============================================================================
// Driver Handlers
// =============================================================================

/// The default handler for format-described parameters.
///
/// GET marshals the storage region onto the wire; SET unmarshals the
/// request into storage, range-checking word-sized scalars against
/// the descriptor.
pub fn simple_handler(ctx: &mut HandlerContext<'_>) -> HandlerResponse {
    match ctx.header.cc {
        CommandClass::GetCommand => {
            let Some(storage) = ctx.storage.as_deref() else {
                return HandlerResponse::Nack(NackReason::HardwareFault);
            };
            match emplace(ctx.response_pd, ctx.descriptor.format, storage, false) {
                Ok(n) => HandlerResponse::Ack(n as u8),
                Err(_) => HandlerResponse::Nack(NackReason::HardwareFault),
            }
        }
        CommandClass::SetCommand => {
            if let Err(reason) = check_scalar_range(ctx) {
                return HandlerResponse::Nack(reason);
            }
            let Some(storage) = ctx.storage.as_deref_mut() else {
                return HandlerResponse::Nack(NackReason::HardwareFault);
            };
            match emplace(storage, ctx.descriptor.format, ctx.request_pd, true) {
                Ok(_) => HandlerResponse::Ack(0),
                Err(_) => HandlerResponse::Nack(NackReason::FormatError),
            }
        }
        _ => HandlerResponse::Nack(NackReason::UnsupportedCommandClass),
    }
}

/// Range check for byte- and word-leading formats with a configured
/// range.
fn check_scalar_range(ctx: &HandlerContext<'_>) -> core::result::Result<(), NackReason> {
    let descriptor = ctx.descriptor;
    let value = match (descriptor.max, descriptor.format.as_bytes().first()) {
        (0, _) => return Ok(()),
        (_, Some(b'w' | b'W')) => {
            if ctx.request_pd.len() < 2 {
                return Err(NackReason::FormatError);
            }
            u32::from(u16::from_be_bytes([ctx.request_pd[0], ctx.request_pd[1]]))
        }
        (_, Some(b'b' | b'B')) => {
            if ctx.request_pd.is_empty() {
                return Err(NackReason::FormatError);
            }
            u32::from(ctx.request_pd[0])
        }
        _ => return Ok(()),
    };
    if value < descriptor.min || value > descriptor.max {
        return Err(NackReason::DataOutOfRange);
    }
    Ok(())
}

/// Handler for `DEVICE_INFO`: synthesizes the 19-byte block from the
/// device view.
pub fn device_info_handler(ctx: &mut HandlerContext<'_>) -> HandlerResponse {
    if ctx.header.cc != CommandClass::GetCommand {
        return HandlerResponse::Nack(NackReason::UnsupportedCommandClass);
    }
    let d = ctx.device;
    let mut image = [0u8; DEVICE_INFO_IMAGE_SIZE];
    image[0..2].copy_from_slice(&d.model_id.to_le_bytes());
    image[2..4].copy_from_slice(&d.product_category.to_le_bytes());
    image[4..8].copy_from_slice(&d.software_version_id.to_le_bytes());
    image[8..10].copy_from_slice(&d.footprint.to_le_bytes());
    image[10] = d.current_personality;
    image[11] = d.personality_count;
    image[12..14].copy_from_slice(&d.start_address.to_le_bytes());
    image[14..16].copy_from_slice(&d.sub_device_count.to_le_bytes());
    image[16] = d.sensor_count;

    match emplace(ctx.response_pd, ctx.descriptor.format, &image, false) {
        Ok(n) => HandlerResponse::Ack(n as u8),
        Err(_) => HandlerResponse::Nack(NackReason::HardwareFault),
    }
}

/// Handler for `SUPPORTED_PARAMETERS`: one word per advertised PID.
pub fn supported_parameters_handler(ctx: &mut HandlerContext<'_>) -> HandlerResponse {
    if ctx.header.cc != CommandClass::GetCommand {
        return HandlerResponse::Nack(NackReason::UnsupportedCommandClass);
    }
    let mut image = [0u8; 128];
    let mut n = 0;
    for &p in ctx.supported {
        if n + 2 > image.len() {
            break;
        }
        image[n..n + 2].copy_from_slice(&p.to_le_bytes());
        n += 2;
    }
    match emplace(ctx.response_pd, "w", &image[..n], false) {
        Ok(written) => HandlerResponse::Ack(written as u8),
        Err(_) => HandlerResponse::Nack(NackReason::HardwareFault),
    }
}

/// Handler behind the discovery PIDs, which the discovery engine
/// services before dispatch ever runs.
pub fn discovery_only_handler(_ctx: &mut HandlerContext<'_>) -> HandlerResponse {
    HandlerResponse::Nack(NackReason::UnsupportedCommandClass)
}

// =============================================================================
// Unit Tests
// =============================================================================
