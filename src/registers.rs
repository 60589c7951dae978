/*!
    registers of the coprocessor

    each register is described by a serializable data type and a [Register] giving its position in the chip's memory. The chip memory is little endian, so register values are converted with `from_le_bytes` and `to_le_bytes`.

    addresses are not process-wide constants: a [RegisterMap] is given to each component at construction, [RegisterMap::BT820] describes the chip this crate was written for.
*/

use core::marker::PhantomData;
use packbytes::{FromBytes, ToBytes, ByteArray};
use bilge::prelude::*;
use crate::pack_bits;


/**
    a register is a typed pointer in chip memory.

    it only holds the memory address of the starting byte of the referenced value, hence can be created, copied or destroyed at no cost
*/
pub struct Register<T> {
    addr: u32,
    ty: PhantomData<T>,
}
impl<T> Register<T> {
    /// create a register from its starting byte
    pub const fn new(address: u32) -> Self {
        Self{addr: address, ty: PhantomData}
    }
    /// starting byte in memory
    pub const fn address(&self) -> u32 {self.addr}
}
impl<T: FromBytes> Register<T> {
    pub const fn size(&self) -> usize {<T::Bytes as ByteArray>::SIZE}
}
impl<T> Clone for Register<T> {
    fn clone(&self) -> Self {
        Self::new(self.address())
    }
}
impl<T> Copy for Register<T> {}
impl<T> PartialEq for Register<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}
impl<T> Eq for Register<T> {}
impl<T> core::fmt::Debug for Register<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Register({:#010x})", self.addr)
    }
}


/// value of the identity register of a running chip
pub const CHIP_ID: u32 = 0x7c;
/// value of the boot status register once the chip is fully booted
pub const BOOT_COMPLETE: u32 = 0x522e_2e2e;
/// size of the coprocessor command fifo
pub const COMMAND_FIFO: u32 = 16 * 1024;
/// value of the command read pointer after a coprocessor fault
pub const COMMAND_FAULT: u32 = 0xfff;

/// locations of all registers used by this driver
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterMap {
    /// chip identity, reads [CHIP_ID]
    pub id: Register<u32>,
    /// running clock counter
    pub clock: Register<u32>,
    /// operating frequency in Hz
    pub frequency: Register<u32>,
    /// coarse initialization phase, reads [BOOT_COMPLETE] when booted
    pub boot_status: Register<u32>,
    /// coprocessor read pointer in its command fifo
    pub command_read: Register<u32>,
    /// free bytes in the command fifo
    pub command_space: Register<u32>,
    /// memory window appending to the command fifo
    pub command_write: u32,
    /// last touch position
    pub touch: Register<TouchXY>,

    /// capture receiver enable
    pub rx_enable: Register<u32>,
    /// capture to memory enable
    pub rx_capture: Register<u32>,
    /// capture mode
    pub rx_setup: Register<u32>,
    /// capture destination address
    pub rx_dest: Register<u32>,
    /// capture destination pixel format
    pub rx_format: Register<u32>,
    /// capture dithering
    pub rx_dither: Register<u32>,

    /// lvds receiver setup
    pub link_setup: Register<u32>,
    /// lvds receiver control
    pub link_control: Register<u32>,
    /// lvds receiver status
    pub link_status: Register<LinkStatus>,
}
impl RegisterMap {
    const RAM_REG: u32 = 0x7f00_6000;
    const LVDSRX: u32 = 0x7f80_0500;

    pub const BT820: Self = Self {
        id:            Register::new(Self::RAM_REG + 0x000),
        clock:         Register::new(Self::RAM_REG + 0x008),
        frequency:     Register::new(Self::RAM_REG + 0x00c),
        boot_status:   Register::new(0x7f80_044c),
        command_read:  Register::new(Self::RAM_REG + 0x14c),
        command_space: Register::new(Self::RAM_REG + 0x594),
        command_write: 0x7f01_0000,
        touch:         Register::new(Self::RAM_REG + 0x160),

        rx_enable:     Register::new(Self::RAM_REG + 0x670),
        rx_capture:    Register::new(Self::RAM_REG + 0x674),
        rx_setup:      Register::new(Self::RAM_REG + 0x678),
        rx_dest:       Register::new(Self::RAM_REG + 0x67c),
        rx_format:     Register::new(Self::RAM_REG + 0x680),
        rx_dither:     Register::new(Self::RAM_REG + 0x684),

        link_setup:    Register::new(Self::LVDSRX + 0x0),
        link_control:  Register::new(Self::LVDSRX + 0x4),
        link_status:   Register::new(Self::LVDSRX + 0x8),
    };
}
impl Default for RegisterMap {
    fn default() -> Self {Self::BT820}
}


/// lvds capture link status
#[bitsize(32)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct LinkStatus {
    /// receiver internals, not interpreted
    pub detail: u28,
    /// one bit per lane, all set when the link is synchronized
    pub sync: u4,
}
pack_bits!(LinkStatus);
impl LinkStatus {
    pub fn synced(&self) -> bool {
        self.sync() == u4::new(0xf)
    }
}

/// raw touch register content, the chip stores y first
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, ToBytes)]
pub struct TouchXY {
    pub y: i16,
    pub x: i16,
}
impl TouchXY {
    /// value of `x` when nothing touches the screen
    pub const NO_TOUCH: i16 = i16::MIN;
}


/// pixel format tag understood by the coprocessor
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PixelFormat(pub u32);
impl PixelFormat {
    pub const RGB565: Self = Self(7);
    pub const YCBCR: Self = Self(28);
}

/// memory region the coprocessor reads or writes as an image
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    pub address: u32,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}
impl Surface {
    pub const fn new(address: u32, format: PixelFormat, width: u32, height: u32) -> Self {
        Self {address, format, width, height}
    }
}
impl From<Surface> for (u32, u32, u32, u32) {
    fn from(surface: Surface) -> Self {
        (surface.address, surface.format.0, surface.width, surface.height)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_status_needs_all_top_bits() {
        assert!(LinkStatus::from(0xf000_0000).synced());
        assert!(LinkStatus::from(0xffff_ffff).synced());
        assert!(!LinkStatus::from(0x7000_0000).synced());
        assert!(!LinkStatus::from(0x0fff_ffff).synced());
        assert!(LinkStatus::from_le_bytes([0, 0, 0, 0xf0]).synced());
    }

    #[test]
    fn touch_register_is_y_then_x() {
        let touch = TouchXY::from_le_bytes([0x10, 0x00, 0x00, 0x80]);
        assert_eq!(touch, TouchXY {y: 16, x: TouchXY::NO_TOUCH});
    }

    #[test]
    fn surface_is_a_plain_tuple() {
        let surface = Surface::new(0x10_0000, PixelFormat::RGB565, 1920, 1080);
        assert_eq!(<(u32, u32, u32, u32)>::from(surface), (0x10_0000, 7, 1920, 1080));
    }
}
