use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use log::*;

use crate::registers::{RegisterMap, Surface, PixelFormat};
use super::{Error, Transport};


/// synchronization of the capture link as seen by the supervisor
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkState {
    Synced,
    /// number of consecutive bad polls, below the threshold
    Degrading(u8),
    /// capture disabled until the link comes back
    Lost,
}

/// what a poll did to the link
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// good status, nothing to do
    Steady,
    /// bad status, not yet enough to declare loss
    Glitch(u8),
    /// bad status reached the threshold, capture was disabled
    Lost,
    /// good status after glitches or loss, capture was set up again
    Recovered,
    /// bad status while capture is already disabled
    Down,
}

/// capture link settings
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    /// consecutive bad polls before declaring the link lost
    pub threshold: u8,
    /// where captured frames are written
    pub destination: Surface,
    /// lvds receiver setup value
    pub setup: u32,
    /// lvds receiver control value
    pub control: u32,
    /// bits kept in the lvds receiver control when the link is lost
    pub loss_mask: u32,
}
impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            destination: Surface::new(0x10_0000, PixelFormat::RGB565, 1920, 1080),
            setup: 0x16,
            control: 0x8989,
            loss_mask: !0x0101,
        }
    }
}


/**
    supervision of the video capture link

    meant to be polled once per rendered frame while a capture-dependent scene owns the device. Transient faults are debounced: only [LinkConfig::threshold] consecutive bad polls disable the capture. The first good poll after that sets the capture up again.
*/
pub struct LinkSupervisor {
    config: LinkConfig,
    registers: RegisterMap,
    state: LinkState,
}
impl LinkSupervisor {
    /// set the capture link up and start supervising it
    pub async fn start<S: SpiBus, P: OutputPin>(transport: &Transport<S, P>, registers: RegisterMap, config: LinkConfig) -> Result<Self, Error> {
        let supervisor = Self {config, registers, state: LinkState::Synced};
        supervisor.setup(transport).await?;
        Ok(supervisor)
    }
    pub fn state(&self) -> LinkState {self.state}
    pub fn config(&self) -> &LinkConfig {&self.config}

    /// check the link status once, and disable or restore the capture accordingly
    pub async fn poll<S: SpiBus, P: OutputPin>(&mut self, transport: &Transport<S, P>) -> Result<LinkEvent, Error> {
        let status = transport.read(self.registers.link_status).await?;
        debug!("link status {:?}", status);

        if status.synced() {
            if self.state == LinkState::Synced
                {return Ok(LinkEvent::Steady)}
            info!("capture link recovered, setting up again");
            self.setup(transport).await?;
            self.state = LinkState::Synced;
            return Ok(LinkEvent::Recovered);
        }

        let count = match self.state {
            LinkState::Lost => return Ok(LinkEvent::Down),
            LinkState::Synced => 1,
            LinkState::Degrading(count) => count.saturating_add(1),
        };
        if count < self.config.threshold {
            self.state = LinkState::Degrading(count);
            return Ok(LinkEvent::Glitch(count));
        }
        warn!("capture link lost after {} bad polls, disabling capture", count);
        self.disable(transport).await?;
        self.state = LinkState::Lost;
        Ok(LinkEvent::Lost)
    }

    async fn setup<S: SpiBus, P: OutputPin>(&self, transport: &Transport<S, P>) -> Result<(), Error> {
        let registers = &self.registers;
        let destination = &self.config.destination;
        transport.write(registers.rx_setup, 1).await?;
        transport.write(registers.rx_dest, destination.address).await?;
        transport.write(registers.rx_format, destination.format.0).await?;
        transport.write(registers.rx_dither, 1).await?;

        transport.write(registers.rx_capture, 1).await?;
        transport.write(registers.rx_enable, 1).await?;

        transport.write(registers.link_setup, self.config.setup).await?;
        transport.write(registers.link_control, self.config.control).await?;

        if log_enabled!(Level::Debug) {
            let setup = transport.read(registers.link_setup).await?;
            let control = transport.read(registers.link_control).await?;
            debug!("link setup {:#x}  control {:#x}", setup, control);
        }
        Ok(())
    }

    async fn disable<S: SpiBus, P: OutputPin>(&self, transport: &Transport<S, P>) -> Result<(), Error> {
        let registers = &self.registers;
        transport.write(registers.rx_capture, 0).await?;
        transport.write(registers.rx_enable, 0).await?;
        let control = transport.read(registers.link_control).await?;
        transport.write(registers.link_control, control & self.config.loss_mask).await
    }
}
