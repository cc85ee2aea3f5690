//! RDM parameter table
//!
//! Each port carries a fixed-capacity table of parameter slots: a
//! descriptor, an optional storage region carved from a per-port bump
//! arena, an optional user callback, and the driver handler that
//! services GET/SET requests for the PID. Registration is insert-only
//! for the lifetime of the driver; re-registering a PID overwrites its
//! descriptor and handlers in place but never removes it.
//!
//! Lookup is a linear scan, which is fine at the table sizes the
//! protocol allows.

use super::packet::RdmHeader;
use super::pids::{NackReason, Pid, pid};
use crate::constants::PD_ARENA_SIZE;
use crate::driver::error::TableError;

// =============================================================================
// Descriptor
// =============================================================================

/// The command classes a parameter admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandClassMask {
    /// GET permitted
    pub get: bool,
    /// SET permitted
    pub set: bool,
}

impl CommandClassMask {
    /// GET only.
    pub const GET: Self = Self {
        get: true,
        set: false,
    };
    /// SET only.
    pub const SET: Self = Self {
        get: false,
        set: true,
    };
    /// GET and SET.
    pub const GET_SET: Self = Self {
        get: true,
        set: true,
    };
    /// Neither (discovery-only parameters).
    pub const NONE: Self = Self {
        get: false,
        set: false,
    };
}

/// Static description of a registered parameter.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParameterDescriptor {
    /// The parameter id
    pub pid: Pid,
    /// Maximum in-memory size of the parameter value
    pub pdl_size_max: u8,
    /// Format string describing the wire marshalling
    pub format: &'static str,
    /// Permitted request command classes
    pub command_classes: CommandClassMask,
    /// RDM unit code
    pub unit: u8,
    /// RDM prefix code
    pub prefix: u8,
    /// Minimum legal value for ranged scalars
    pub min: u32,
    /// Maximum legal value for ranged scalars (0 disables the check)
    pub max: u32,
    /// Default value for ranged scalars
    pub default: u32,
    /// Human-readable description
    pub description: &'static str,
    /// Whether the value persists across power cycles
    pub persistent: bool,
}

impl ParameterDescriptor {
    /// Create a descriptor with no unit, no range and no persistence.
    pub const fn new(
        pid: Pid,
        pdl_size_max: u8,
        format: &'static str,
        command_classes: CommandClassMask,
    ) -> Self {
        Self {
            pid,
            pdl_size_max,
            format,
            command_classes,
            unit: 0,
            prefix: 0,
            min: 0,
            max: 0,
            default: 0,
            description: "",
            persistent: false,
        }
    }

    /// Set the legal range for ranged scalar parameters.
    #[must_use]
    pub const fn with_range(mut self, min: u32, max: u32, default: u32) -> Self {
        self.min = min;
        self.max = max;
        self.default = default;
        self
    }

    /// Set the description.
    #[must_use]
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Mark the parameter persistent.
    #[must_use]
    pub const fn with_persistence(mut self) -> Self {
        self.persistent = true;
        self
    }
}

// =============================================================================
// Handler Seam
// =============================================================================

/// What a driver handler decided about a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandlerResponse {
    /// Acknowledge with `pdl` bytes of response parameter data
    Ack(u8),
    /// Decline with a reason
    Nack(NackReason),
}

/// The device state a handler may need to synthesize a response.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfoView {
    /// Device model id
    pub model_id: u16,
    /// Product category
    pub product_category: u16,
    /// Software version id
    pub software_version_id: u32,
    /// DMX footprint of the current personality
    pub footprint: u16,
    /// Current personality, 1-based
    pub current_personality: u8,
    /// Number of declared personalities
    pub personality_count: u8,
    /// DMX start address
    pub start_address: u16,
    /// Number of sub-devices (always 0, multi-sub-device is deferred)
    pub sub_device_count: u16,
    /// Number of sensors
    pub sensor_count: u8,
}

/// Everything a driver handler sees while servicing one request.
pub struct HandlerContext<'a> {
    /// The decoded request header
    pub header: &'a RdmHeader,
    /// The request's parameter data
    pub request_pd: &'a [u8],
    /// Writable region the response parameter data goes into
    pub response_pd: &'a mut [u8],
    /// The slot's storage region, if it has one
    pub storage: Option<&'a mut [u8]>,
    /// The slot's descriptor
    pub descriptor: &'a ParameterDescriptor,
    /// Snapshot of the device state
    pub device: &'a DeviceInfoView,
    /// PIDs currently advertised through `SUPPORTED_PARAMETERS`
    pub supported: &'a [Pid],
}

/// The driver handler servicing GET/SET requests for one PID.
pub type DriverHandler = fn(&mut HandlerContext<'_>) -> HandlerResponse;

/// Optional user notification invoked after a request was serviced.
pub type ParameterCallback = fn(&RdmHeader);

// =============================================================================
// Slots and Table
// =============================================================================

/// A storage region inside the table's bump arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdRegion {
    offset: u16,
    len: u16,
}

impl PdRegion {
    /// Region length in bytes.
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the region is empty.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One registered parameter.
#[derive(Clone, Copy)]
pub struct ParameterSlot {
    /// Static parameter description
    pub descriptor: ParameterDescriptor,
    /// Storage region, if the parameter holds state
    pub region: Option<PdRegion>,
    /// The driver handler
    pub handler: DriverHandler,
    /// Optional user notification
    pub callback: Option<ParameterCallback>,
}

/// Fixed-capacity parameter table with a bump-allocated storage arena.
pub struct ParameterTable<const PIDS: usize> {
    slots: [Option<ParameterSlot>; PIDS],
    count: usize,
    arena: [u8; PD_ARENA_SIZE],
    arena_used: usize,
}

impl<const PIDS: usize> ParameterTable<PIDS> {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            slots: [None; PIDS],
            count: 0,
            arena: [0; PD_ARENA_SIZE],
            arena_used: 0,
        }
    }

    /// Number of registered parameters.
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Whether the table is empty.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Table capacity.
    pub const fn capacity(&self) -> usize {
        PIDS
    }

    /// Carve `size` bytes from the bump arena.
    pub fn alloc(&mut self, size: usize) -> Option<PdRegion> {
        if self.arena_used + size > PD_ARENA_SIZE {
            return None;
        }
        let region = PdRegion {
            offset: self.arena_used as u16,
            len: size as u16,
        };
        self.arena_used += size;
        Some(region)
    }

    /// Register a parameter, or overwrite the descriptor and handlers
    /// of an already-registered PID in place.
    ///
    /// `storage_size` bytes are bump-allocated for new registrations;
    /// an existing registration keeps its region.
    ///
    /// # Errors
    ///
    /// [`TableError::CapacityExceeded`] when the slot vector or the
    /// arena is full.
    pub fn register(
        &mut self,
        descriptor: ParameterDescriptor,
        handler: DriverHandler,
        callback: Option<ParameterCallback>,
        storage_size: usize,
    ) -> Result<(), TableError> {
        if let Some(slot) = self.find_mut(descriptor.pid) {
            slot.descriptor = descriptor;
            slot.handler = handler;
            slot.callback = callback;
            return Ok(());
        }
        if self.count >= PIDS {
            return Err(TableError::CapacityExceeded);
        }
        let region = if storage_size > 0 {
            Some(self.alloc(storage_size).ok_or(TableError::CapacityExceeded)?)
        } else {
            None
        };
        self.slots[self.count] = Some(ParameterSlot {
            descriptor,
            region,
            handler,
            callback,
        });
        self.count += 1;
        Ok(())
    }

    /// Find the slot registered for `pid`.
    pub fn find(&self, pid: Pid) -> Option<&ParameterSlot> {
        self.slots[..self.count]
            .iter()
            .flatten()
            .find(|slot| slot.descriptor.pid == pid)
    }

    fn find_mut(&mut self, pid: Pid) -> Option<&mut ParameterSlot> {
        self.slots[..self.count]
            .iter_mut()
            .flatten()
            .find(|slot| slot.descriptor.pid == pid)
    }

    /// Copyable dispatch info for `pid`.
    pub fn slot_info(
        &self,
        pid: Pid,
    ) -> Option<(
        ParameterDescriptor,
        DriverHandler,
        Option<ParameterCallback>,
        Option<PdRegion>,
    )> {
        self.find(pid)
            .map(|slot| (slot.descriptor, slot.handler, slot.callback, slot.region))
    }

    /// Borrow a storage region.
    pub fn region(&self, region: PdRegion) -> &[u8] {
        &self.arena[region.offset as usize..region.offset as usize + region.len as usize]
    }

    /// Mutably borrow a storage region.
    pub fn region_mut(&mut self, region: PdRegion) -> &mut [u8] {
        &mut self.arena[region.offset as usize..region.offset as usize + region.len as usize]
    }

    /// Copy the in-memory value of `pid` into `out`.
    ///
    /// Returns the number of bytes copied, or `None` if the PID is not
    /// registered or holds no storage.
    pub fn get(&self, pid: Pid, out: &mut [u8]) -> Option<usize> {
        let slot = self.find(pid)?;
        let region = slot.region?;
        let data = self.region(region);
        let n = data.len().min(out.len());
        out[..n].copy_from_slice(&data[..n]);
        Some(n)
    }

    /// Overwrite the in-memory value of `pid` with `data`, truncated
    /// to the storage region.
    ///
    /// # Errors
    ///
    /// [`TableError::NotRegistered`] if the PID is unknown or holds no
    /// storage.
    pub fn set(&mut self, pid: Pid, data: &[u8]) -> Result<usize, TableError> {
        let region = self
            .find(pid)
            .and_then(|slot| slot.region)
            .ok_or(TableError::NotRegistered)?;
        let storage = self.region_mut(region);
        let n = data.len().min(storage.len());
        storage[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    /// Collect the PIDs advertised through `SUPPORTED_PARAMETERS`:
    /// everything registered except the discovery set and the list
    /// parameter itself. Returns the number of entries written.
    pub fn supported_pids(&self, out: &mut [Pid]) -> usize {
        let mut n = 0;
        for slot in self.slots[..self.count].iter().flatten() {
            let p = slot.descriptor.pid;
            let mandatory = matches!(
                p,
                pid::DISC_UNIQUE_BRANCH
                    | pid::DISC_MUTE
                    | pid::DISC_UN_MUTE
                    | pid::SUPPORTED_PARAMETERS
            );
            if !mandatory && n < out.len() {
                out[n] = p;
                n += 1;
            }
        }
        n
    }

    /// Iterate the registered slots.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterSlot> {
        self.slots[..self.count].iter().flatten()
    }
}

impl<const PIDS: usize> Default for ParameterTable<PIDS> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
