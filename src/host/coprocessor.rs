use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use log::*;

use crate::{
    clock::Clock,
    registers::{COMMAND_FIFO, COMMAND_FAULT},
    };
use super::{Error, Device};


/// free space reported by an empty command fifo
const EMPTY: u32 = COMMAND_FIFO - 4;

/**
    feeding of the coprocessor command fifo

    commands are encoded elsewhere, here they are only bytes to append to the fifo, and a barrier to wait for their consumption.
*/
impl<S, P, D, C> Device<S, P, D, C>
where
    S: SpiBus,
    P: OutputPin,
    D: OutputPin,
    C: Clock,
{
    /// append encoded commands to the fifo, waiting for space when it is full
    pub async fn submit_bytes(&mut self, commands: &[u8]) -> Result<(), Error> {
        if commands.len() % 4 != 0
            {return Err(Error::Alignment {address: self.registers.command_write, length: commands.len()})}
        let mut remaining = commands;
        while !remaining.is_empty() {
            let space = self.space().await?;
            let (now, later) = remaining.split_at(remaining.len().min(space));
            trace!("submit {} command bytes", now.len());
            self.transport.write_bytes(self.registers.command_write, now).await?;
            remaining = later;
        }
        Ok(())
    }

    /// wait until the coprocessor has consumed every submitted command
    pub async fn barrier(&mut self) -> Result<(), Error> {
        loop {
            if self.transport.read(self.registers.command_space).await? == EMPTY
                {return Ok(())}
            self.check_fault().await?;
            self.clock.sleep(self.poll_interval).await;
        }
    }

    /// wait for some room in the fifo, and return its size in bytes
    async fn space(&mut self) -> Result<usize, Error> {
        loop {
            let space = self.transport.read(self.registers.command_space).await? & !3;
            if space != 0
                {return Ok(space as usize)}
            self.check_fault().await?;
            self.clock.sleep(self.poll_interval).await;
        }
    }

    async fn check_fault(&self) -> Result<(), Error> {
        if self.transport.read(self.registers.command_read).await? == COMMAND_FAULT {
            error!("coprocessor fault");
            return Err(Error::Coprocessor);
        }
        Ok(())
    }
}
