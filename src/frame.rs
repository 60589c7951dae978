/*!
    wire framing of bus transactions

    every memory transaction starts with a 4 byte big endian address whose highest bit tells the direction. Before the chip is booted, the bus instead carries 5 byte host commands.
*/

use bilge::prelude::*;
use packbytes::ToBytes;

use crate::{
    pack_bits,
    host::Error,
    };


/// in-band byte emitted by the chip right before valid read data
pub const READY: u8 = 0x01;
/// maximum number of bytes read in one chip select frame
pub const MAX_CHUNK: usize = 32;
/// number of bytes the chip may clock out before its ready byte
pub const READ_LATENCY: usize = 32;

/// size of a transaction header on the wire
pub const HEADER: usize = 4;

/// transaction header as sent on the bus
#[bitsize(32)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct AddressFrame {
    /// memory address, always 4-bytes aligned
    pub address: u31,
    /// set for a write, cleared for a read
    pub write: bool,
}
pack_bits!(AddressFrame);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// one aligned memory access, only exists while building the exchange on the bus
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub address: u32,
    pub direction: Direction,
    pub length: u32,
}
impl Transaction {
    /// check alignment and range of a memory access
    pub fn new(address: u32, direction: Direction, length: usize) -> Result<Self, Error> {
        if address % 4 != 0 || length % 4 != 0
            {return Err(Error::Alignment {address, length})}
        if address & (1 << 31) != 0
            {return Err(Error::Address(address))}
        let length = u32::try_from(length)
            .map_err(|_| Error::Alignment {address, length})?;
        if address.checked_add(length).is_none()
            {return Err(Error::Address(address))}
        Ok(Self {address, direction, length})
    }
    /// header starting the transaction on the bus
    pub fn header(&self) -> [u8; HEADER] {
        AddressFrame::new(
            u31::new(self.address),
            self.direction == Direction::Write,
            ).to_be_bytes()
    }
    /// transaction covering the next `length` bytes after this one
    pub fn advance(&self, length: usize) -> Result<Self, Error> {
        Self::new(self.address + self.length, self.direction, length)
    }
}

/**
    5 bytes command understood by the chip's serial interface while it is held in boot configuration

    the layout on wire is `0xff, opcode, parameter, 0, 0`, except for the flush command which is all zeros
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HostCommand {
    pub opcode: u8,
    pub parameter: u8,
}
impl HostCommand {
    /// enter boot configuration mode
    pub const BOOT_CONFIG_ENABLE: Self = Self::new(0xe9, 0xc1);
    /// leave boot configuration mode
    pub const BOOT_CONFIG_DISABLE: Self = Self::new(0xe9, 0xc0);
    /// select double data rate memory
    pub const DDR: Self = Self::new(0xeb, 0x0a);
    /// spi slave boot configuration
    pub const SPI_BOOT_CONFIG: Self = Self::new(0xe8, 0xe0);
    /// pulse the chip's internal reset
    pub const RESET_PULSE: Self = Self::new(0xe7, 0x00);

    /// command bit set in the clock selection parameter
    const CLOCK_SELECT: u8 = 0x10;

    pub const fn new(opcode: u8, parameter: u8) -> Self {
        Self {opcode, parameter}
    }
    /// select the bus clock divisor, only its low nibble is used
    pub const fn clock(divisor: u8) -> Self {
        Self::new(0xe6, Self::CLOCK_SELECT | (divisor & 0xf))
    }
    pub const fn to_bytes(self) -> [u8; 5] {
        [0xff, self.opcode, self.parameter, 0, 0]
    }
    /// zeros sent to flush the serial interface after configuration
    pub const fn flush() -> [u8; 5] {
        [0; 5]
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_marks_direction_in_high_bit() {
        let read = Transaction::new(0x7f00_6000, Direction::Read, 4).unwrap();
        assert_eq!(read.header(), [0x7f, 0x00, 0x60, 0x00]);
        let write = Transaction::new(0x7f00_6000, Direction::Write, 4).unwrap();
        assert_eq!(write.header(), [0xff, 0x00, 0x60, 0x00]);
    }

    #[test]
    fn misaligned_accesses_are_refused() {
        for address in [1, 2, 3, 0x7f00_6001, 0x7f00_600e] {
            assert_eq!(
                Transaction::new(address, Direction::Read, 4),
                Err(Error::Alignment {address, length: 4}),
                );
        }
        for length in [1, 2, 3, 5, 33] {
            assert_eq!(
                Transaction::new(0x100, Direction::Write, length),
                Err(Error::Alignment {address: 0x100, length}),
                );
        }
    }

    #[test]
    fn high_addresses_cannot_be_framed() {
        assert_eq!(Transaction::new(0x8000_0000, Direction::Read, 4), Err(Error::Address(0x8000_0000)));
    }

    #[test]
    fn clock_command_carries_divisor() {
        assert_eq!(HostCommand::clock(7).to_bytes(), [0xff, 0xe6, 0x17, 0, 0]);
        assert_eq!(HostCommand::BOOT_CONFIG_ENABLE.to_bytes(), [0xff, 0xe9, 0xc1, 0, 0]);
    }
}
