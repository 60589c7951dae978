use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use log::*;

use crate::mutex::*;
use super::{Error, bus_error, pin_error};


/**
    exclusive access to the serial bus and the chip select line

    a request to the chip is framed as chip select assert, full duplex exchange, chip select deassert. The framing happens under lock so requests from different places of the driver never interleave.
*/
pub struct Transport<S, P> {
    bus: BusyMutex<Wires<S, P>>,
}
/// what the lock protects
struct Wires<S, P> {
    spi: S,
    select: P,
}

impl<S: SpiBus, P: OutputPin> Transport<S, P> {
    /// take ownership of the bus and its chip select line, which is left deasserted
    pub fn new(spi: S, mut select: P) -> Result<Self, Error> {
        select.set_high().map_err(pin_error)?;
        Ok(Self {
            bus: BusyMutex::new(Wires {spi, select}),
        })
    }
    /// give back the bus and chip select line
    pub fn release(self) -> (S, P) {
        let wires = self.bus.into_inner();
        (wires.spi, wires.select)
    }

    /**
        lock the bus and assert chip select

        the returned frame deasserts chip select and unlocks the bus when dropped, whatever path drops it
    */
    pub async fn select(&self) -> Result<Frame<'_, S, P>, Error> {
        let mut wires = self.bus.lock().await;
        wires.select.set_low().map_err(pin_error)?;
        Ok(Frame {wires})
    }

    /**
        exchange one complete frame: write all of `write`, then read exactly `read.len()` bytes

        payloads are not interpreted. An empty `read` makes it a pure write.
    */
    pub async fn transfer(&self, write: &[u8], read: &mut [u8]) -> Result<(), Error> {
        trace!("transfer {} bytes out, {} bytes in", write.len(), read.len());
        let mut frame = self.select().await?;
        frame.write(write).await?;
        if !read.is_empty() {
            frame.read(read).await?;
        }
        frame.close().await
    }
}


/// a chip select frame in progress, holds the bus lock
pub struct Frame<'t, S: SpiBus, P: OutputPin> {
    wires: BusyMutexGuard<'t, Wires<S, P>>,
}
impl<S: SpiBus, P: OutputPin> Frame<'_, S, P> {
    pub async fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.wires.spi.write(data).await.map_err(bus_error)
    }
    pub async fn read(&mut self, data: &mut [u8]) -> Result<(), Error> {
        self.wires.spi.read(data).await.map_err(bus_error)
    }
    /// wait for all bytes to be on the wire, then end the frame
    pub async fn close(mut self) -> Result<(), Error> {
        self.wires.spi.flush().await.map_err(bus_error)
        // chip select is released by drop
    }
}
impl<S: SpiBus, P: OutputPin> Drop for Frame<'_, S, P> {
    fn drop(&mut self) {
        if self.wires.select.set_high().is_err() {
            error!("failed to deassert chip select");
        }
    }
}
