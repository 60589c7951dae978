/*!
    demo loop driving a booted device

    drawing is left to a [Renderer], which encodes its commands elsewhere and only sees the device through [Device::submit_bytes] and [Device::barrier]. The director decides which mode owns the device, supervises the capture link while a capture-dependent mode runs, and reads the touch register after every frame.
*/

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use log::*;

use crate::{
    clock::Clock,
    host::{Device, Error, LinkSupervisor, LinkEvent},
    scene::{DemoMode, SceneSelector, SceneConfig, Touch},
    };


/// what a renderer is told when a mode takes the device
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stage {
    pub mode: DemoMode,
    /// whether assets can be loaded from the optional storage medium
    pub storage: bool,
}

/// producer of frame content, one implementation drawing every mode
#[allow(async_fn_in_trait)]
pub trait Renderer {
    /// prepare the scene of a mode that just took the device
    async fn enter<S, P, D, C>(&mut self, stage: Stage, device: &mut Device<S, P, D, C>) -> Result<(), Error>
    where S: SpiBus, P: OutputPin, D: OutputPin, C: Clock;
    /// draw one frame of the current mode and wait for its completion
    async fn frame<S, P, D, C>(&mut self, mode: DemoMode, device: &mut Device<S, P, D, C>) -> Result<(), Error>
    where S: SpiBus, P: OutputPin, D: OutputPin, C: Clock;
}


pub struct Director<R, S, P, D, C> {
    device: Device<S, P, D, C>,
    renderer: R,
    selector: SceneSelector,
    /// only exists while a capture-dependent mode owns the device
    link: Option<LinkSupervisor>,
    /// mode entered but not yet prepared
    pending: bool,
    storage: bool,
}
impl<R, S, P, D, C> Director<R, S, P, D, C>
where
    R: Renderer,
    S: SpiBus,
    P: OutputPin,
    D: OutputPin,
    C: Clock,
{
    /// start on the logo, with a device already booted
    pub fn new(device: Device<S, P, D, C>, renderer: R, config: SceneConfig) -> Self {
        Self {
            device,
            renderer,
            selector: SceneSelector::new(config),
            link: None,
            pending: true,
            storage: false,
        }
    }
    pub fn mode(&self) -> DemoMode {self.selector.mode()}
    pub fn device(&self) -> &Device<S, P, D, C> {&self.device}
    pub fn renderer(&self) -> &R {&self.renderer}
    pub fn link(&self) -> Option<&LinkSupervisor> {self.link.as_ref()}
    pub fn into_parts(self) -> (Device<S, P, D, C>, R) {(self.device, self.renderer)}

    /**
        report the outcome of mounting the optional storage medium

        a failed mount is not fatal: the renderer is simply told storage is unavailable at its next mode entry
    */
    pub fn attach_storage<E: core::fmt::Debug>(&mut self, mount: Result<(), E>) -> Result<(), Error> {
        self.storage = mount.is_ok();
        if let Err(err) = mount {
            warn!("storage unavailable, assets disabled: {:?}", err);
            return Err(Error::StorageUnavailable);
        }
        Ok(())
    }

    /**
        run the demo loop for the given number of frames, or forever

        return the mode owning the device when the loop ends
    */
    pub async fn run(&mut self, frames: Option<u64>) -> Result<DemoMode, Error> {
        let mut rendered = 0;
        while frames.is_none_or(|frames| rendered < frames) {
            self.frame().await?;
            rendered += 1;
        }
        Ok(self.mode())
    }

    async fn frame(&mut self) -> Result<(), Error> {
        let mode = self.selector.mode();
        if self.pending {
            self.enter(mode).await?;
        }
        if let Some(link) = self.link.as_mut() {
            if link.poll(self.device.transport()).await? == LinkEvent::Lost {
                warn!("frame lost, capture cleared");
            }
        }
        self.renderer.frame(mode, &mut self.device).await?;

        let config = self.selector.config();
        let touch = Touch::decode(self.device.touch().await?, config.width, config.height);
        if let Some(next) = self.selector.frame(touch) {
            info!("switching from {:?} to {:?}", mode, next);
            self.pending = true;
        }
        Ok(())
    }

    async fn enter(&mut self, mode: DemoMode) -> Result<(), Error> {
        // link state never survives a mode switch
        self.link = None;
        let stage = Stage {mode, storage: self.storage};
        self.renderer.enter(stage, &mut self.device).await?;
        if mode.captures() {
            self.link = Some(LinkSupervisor::start(
                self.device.transport(),
                *self.device.registers(),
                self.selector.config().link,
                ).await?);
        }
        self.pending = false;
        Ok(())
    }
}
