/*!
    host side of the coprocessor bus

    The central resource is the [Device] struct which owns the bus, the chip select and power down lines.

    layers, from the wire up:

    - [Transport] serializes chip select frames on the bus
    - memory access ([Transport::read_bytes], [Transport::write_bytes] and their typed versions) implements the chip's ready byte handshake
    - [BootSequencer] brings the chip from power off to a running state
    - [LinkSupervisor] watches and recovers the video capture link
    - [Device::submit_bytes] and [Device::barrier] feed the coprocessor command fifo
*/

/// chip select framing, this is where the bus gets locked
mod transport;
/// aligned memory access with the ready byte handshake, this is the tricky part of the code
mod access;
/// power-up state machine
mod boot;
/// capture link supervision
mod link;
/// command fifo feeding
mod coprocessor;
/// device handle
mod device;


pub use transport::{Transport, Frame};
pub use boot::{BootSequencer, BootConfig, BootState, BootReport};
pub use link::{LinkSupervisor, LinkConfig, LinkState, LinkEvent};
pub use device::Device;


use embedded_hal::{spi, digital};
use thiserror::Error;

/// error regarding coprocessor communication
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("problem with spi bus: {0:?}")]
    Bus(spi::ErrorKind),
    #[error("problem driving a control line: {0:?}")]
    Pin(digital::ErrorKind),
    #[error("access at {address:#010x} of {length} bytes is not 4-bytes aligned")]
    Alignment {address: u32, length: usize},
    #[error("address {0:#010x} cannot be framed on the bus")]
    Address(u32),
    #[error("frequency {0} Hz cannot be derived from the chip's pll")]
    Frequency(u32),
    #[error("boot abandoned after {attempts} attempts, last failure: {last}")]
    Boot {attempts: u32, last: BootFailure},
    #[error("coprocessor fault")]
    Coprocessor,
    #[error("storage medium unavailable")]
    StorageUnavailable,
}

/// reason of a failed boot attempt, all are recovered by power cycling again
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum BootFailure {
    #[error("no ready byte after power cycle")]
    Handshake,
    #[error("timeout waiting for chip identity, stuck at {0:#x}")]
    Identity(u32),
    #[error("timeout waiting for boot status, stuck at {0:#010x}")]
    Status(u32),
    #[error("requested {requested} Hz but chip runs at {actual} Hz")]
    ClockMismatch {requested: u32, actual: u32},
}

fn bus_error<E: spi::Error>(error: E) -> Error {
    Error::Bus(error.kind())
}
fn pin_error<E: digital::Error>(error: E) -> Error {
    Error::Pin(error.kind())
}
