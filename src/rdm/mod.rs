//! Remote Device Management (ANSI E1.20) on top of the DMX line.
//!
//! - [`uid`]: 48-bit unique identifiers and the binding UID
//! - [`pids`]: parameter ids, command classes, response types
//! - [`packet`]: wire-format codec, checksums, discovery encoding
//! - [`format`]: declarative parameter-data marshalling
//! - [`table`]: the per-port parameter table and handler seam
//! - [`controller`]: request/response transactions
//! - [`discovery`]: binary-tree responder enumeration
//! - [`responder`]: inbound dispatch and the default parameter set
//!
//! The controller, discovery and responder modules extend
//! [`DmxPort`](crate::driver::DmxPort) with further `impl` blocks.

pub mod controller;
pub mod discovery;
pub mod format;
pub mod packet;
pub mod pids;
pub mod responder;
pub mod table;
pub mod uid;

// Re-exports for convenience
pub use controller::{AckStatus, AckType};
pub use discovery::{DiscoveredDevice, MuteParams};
pub use packet::{Decoded, RdmHeader};
pub use pids::{CommandClass, NackReason, Pid, ResponseType};
pub use table::{
    CommandClassMask, DeviceInfoView, DriverHandler, HandlerContext, HandlerResponse,
    ParameterCallback, ParameterDescriptor, ParameterSlot, ParameterTable, PdRegion,
};
pub use uid::{Uid, binding_uid};
