#![allow(dead_code)]

use evespi::{
    host::Device,
    registers::RegisterMap,
    sim::*,
    };

pub type SimDevice = Device<SimBus, SimSelect, SimPower, SimClock>;

/// install the test logger, every test calls it first
pub fn logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// device handle wired to a simulated chip
pub fn device(chip: &SimChip) -> SimDevice {
    Device::new(chip.bus(), chip.select(), chip.power(), chip.clock(), RegisterMap::BT820)
        .expect("failed to initialize device")
}
