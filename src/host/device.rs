use core::time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use packbytes::{FromBytes, ToBytes};

use crate::{
    clock::Clock,
    registers::{Register, RegisterMap, TouchXY},
    };
use super::{Error, Transport, BootSequencer, BootConfig, BootReport};


/**
    handle on one physical coprocessor

    it owns the bus, the chip select line, the power down line, and the clock used for waiting. There is one per chip, living as long as the program drives it.

    memory accesses take `&self` since the transport serializes them, while operations waiting on the clock take `&mut self`.
*/
pub struct Device<S, P, D, C> {
    pub(super) transport: Transport<S, P>,
    power: D,
    pub(super) clock: C,
    pub(super) registers: RegisterMap,
    pub(super) poll_interval: Duration,
}
impl<S, P, D, C> Device<S, P, D, C>
where
    S: SpiBus,
    P: OutputPin,
    D: OutputPin,
    C: Clock,
{
    pub fn new(spi: S, select: P, power: D, clock: C, registers: RegisterMap) -> Result<Self, Error> {
        Ok(Self {
            transport: Transport::new(spi, select)?,
            power,
            clock,
            registers,
            poll_interval: Duration::from_micros(100),
        })
    }
    /// change the sleep between two polls of the command fifo
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
    /// give back the hardware resources
    pub fn release(self) -> (S, P, D, C) {
        let (spi, select) = self.transport.release();
        (spi, select, self.power, self.clock)
    }

    pub fn transport(&self) -> &Transport<S, P>  {&self.transport}
    pub fn registers(&self) -> &RegisterMap  {&self.registers}
    pub fn clock(&mut self) -> &mut C  {&mut self.clock}

    /// power cycle the chip until it runs with the given settings
    pub async fn boot(&mut self, config: BootConfig) -> Result<BootReport, Error> {
        BootSequencer::new(config, self.registers)
            .run(&self.transport, &mut self.power, &mut self.clock).await
    }

    pub async fn read_register<T: FromBytes>(&self, register: Register<T>) -> Result<T, Error> {
        self.transport.read(register).await
    }
    pub async fn write_register<T: ToBytes>(&self, register: Register<T>, value: T) -> Result<(), Error> {
        self.transport.write(register, value).await
    }
    pub async fn read_memory<'d>(&self, address: u32, data: &'d mut [u8]) -> Result<&'d mut [u8], Error> {
        self.transport.read_bytes(address, data).await
    }
    pub async fn write_memory(&self, address: u32, data: &[u8]) -> Result<(), Error> {
        self.transport.write_bytes(address, data).await
    }

    /// raw content of the touch register
    pub async fn touch(&self) -> Result<TouchXY, Error> {
        self.transport.read(self.registers.touch).await
    }
}
