use core::time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiBus;
use log::*;

use crate::{
    clock::Clock,
    frame::{HostCommand, Transaction, Direction, READY},
    registers::{RegisterMap, CHIP_ID, BOOT_COMPLETE},
    utils::div_round,
    };
use super::{Error, BootFailure, Transport, pin_error};


/// size of the read probing the chip right after its reset
const PROBE: usize = 128;

/// phases of a boot attempt
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootState {
    /// pulsing the power down line and configuring the serial interface
    PowerCycling,
    /// probing for the ready byte
    AwaitingReadyByte,
    /// polling the identity register
    VerifyingId,
    /// polling the boot status register
    AwaitingBootStatus,
    /// checking the operating frequency
    VerifyingClock,
    /// chip is running
    Ready,
}

/// settings of the boot sequence
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BootConfig {
    /// requested bus clock in Hz
    pub frequency: u32,
    /// chip internal pll frequency in Hz, the bus clock is derived from it
    pub pll: u32,
    /// wait after each edge of the power down line, and after configuration
    pub settle: Duration,
    /// maximum wait for the boot status
    pub status_timeout: Duration,
    /// maximum wait for the chip identity
    pub identity_timeout: Duration,
    /// sleep between two polls of a register
    pub poll_interval: Duration,
    /// rate of the running clock register, used to report the boot time
    pub clock_rate: u32,
    /// maximum number of power cycles, `None` retries forever
    pub attempts: Option<u32>,
}
impl Default for BootConfig {
    fn default() -> Self {
        Self {
            frequency: 72_000_000,
            pll: 576_000_000,
            settle: Duration::from_millis(100),
            status_timeout: Duration::from_millis(100),
            identity_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(1),
            clock_rate: 36_000_000,
            attempts: None,
        }
    }
}
impl BootConfig {
    /// divisor of the pll giving the requested frequency, as expected in the clock host command
    pub fn divisor(&self) -> Result<u8, Error> {
        if self.frequency == 0
            {return Err(Error::Frequency(self.frequency))}
        match div_round(self.pll, self.frequency) {
            ratio @ 1 ..= 16 => Ok((ratio - 1) as u8),
            _ => Err(Error::Frequency(self.frequency)),
        }
    }
}

/// outcome of a successful boot
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BootReport {
    /// number of power cycles it took
    pub attempts: u32,
    /// boot time reported by the chip's running clock
    pub elapsed: Duration,
}


/**
    power-up state machine

    each attempt power cycles the chip, configures its serial interface and clock, then waits for it to report a healthy state. Any failure of an attempt restarts from the power cycle, without limit unless [BootConfig::attempts] is set.
*/
pub struct BootSequencer {
    config: BootConfig,
    registers: RegisterMap,
    state: BootState,
}
impl BootSequencer {
    pub fn new(config: BootConfig, registers: RegisterMap) -> Self {
        Self {config, registers, state: BootState::PowerCycling}
    }
    pub fn state(&self) -> BootState {self.state}
    pub fn config(&self) -> &BootConfig {&self.config}

    /// boot the chip, retrying until it runs
    pub async fn run<S, P, D, C>(&mut self, transport: &Transport<S, P>, power: &mut D, clock: &mut C) -> Result<BootReport, Error>
    where
        S: SpiBus,
        P: OutputPin,
        D: OutputPin,
        C: Clock,
    {
        let divisor = self.config.divisor()?;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(transport, power, clock, divisor).await? {
                Ok(elapsed) => {
                    info!("boot time {:.3} s after {} attempts", elapsed.as_secs_f32(), attempts);
                    return Ok(BootReport {attempts, elapsed});
                },
                Err(last) => {
                    warn!("[{}, retrying...]", last);
                    if self.config.attempts.is_some_and(|max| attempts >= max)
                        {return Err(Error::Boot {attempts, last})}
                },
            }
        }
    }

    /// one power cycle, the inner result tells whether the chip booted
    async fn attempt<S, P, D, C>(&mut self, transport: &Transport<S, P>, power: &mut D, clock: &mut C, divisor: u8) -> Result<Result<Duration, BootFailure>, Error>
    where
        S: SpiBus,
        P: OutputPin,
        D: OutputPin,
        C: Clock,
    {
        let registers = self.registers;
        let config = self.config;

        self.enter(BootState::PowerCycling);
        power.set_low().map_err(pin_error)?;
        clock.sleep(config.settle).await;
        power.set_high().map_err(pin_error)?;
        clock.sleep(config.settle).await;

        for command in [
                HostCommand::BOOT_CONFIG_ENABLE,
                HostCommand::DDR,
                HostCommand::SPI_BOOT_CONFIG,
                HostCommand::BOOT_CONFIG_DISABLE,
                HostCommand::clock(divisor),
                HostCommand::RESET_PULSE,
                ] {
            transport.transfer(&command.to_bytes(), &mut []).await?;
        }
        transport.transfer(&HostCommand::flush(), &mut []).await?;
        clock.sleep(config.settle).await;

        self.enter(BootState::AwaitingReadyByte);
        let mut probe = [0; PROBE];
        let header = Transaction::new(0, Direction::Read, PROBE)?.header();
        transport.transfer(&header, &mut probe).await?;
        if !probe.contains(&READY)
            {return Ok(Err(BootFailure::Handshake))}

        self.enter(BootState::VerifyingId);
        let start = clock.now();
        loop {
            let id = transport.read(registers.id).await?;
            if id == CHIP_ID
                {break}
            if clock.now() - start > config.identity_timeout
                {return Ok(Err(BootFailure::Identity(id)))}
            clock.sleep(config.poll_interval).await;
        }

        self.enter(BootState::AwaitingBootStatus);
        let start = clock.now();
        loop {
            let status = transport.read(registers.boot_status).await?;
            if status == BOOT_COMPLETE
                {break}
            if clock.now() - start > config.status_timeout
                {return Ok(Err(BootFailure::Status(status)))}
            clock.sleep(config.poll_interval).await;
        }

        self.enter(BootState::VerifyingClock);
        let actual = transport.read(registers.frequency).await?;
        if actual != config.frequency
            {return Ok(Err(BootFailure::ClockMismatch {requested: config.frequency, actual}))}

        self.enter(BootState::Ready);
        let ticks = transport.read(registers.clock).await?;
        let elapsed = (u64::from(ticks) * 1_000_000_000)
            .checked_div(u64::from(config.clock_rate))
            .map_or(Duration::ZERO, Duration::from_nanos);
        Ok(Ok(elapsed))
    }

    fn enter(&mut self, state: BootState) {
        debug!("boot state {:?}", state);
        self.state = state;
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_rounds_pll_ratio() {
        assert_eq!(BootConfig::default().divisor(), Ok(7));
        let config = BootConfig {frequency: 60_000_000, .. Default::default()};
        // 9.6 rounds to 10
        assert_eq!(config.divisor(), Ok(9));
    }

    #[test]
    fn divisor_must_fit_a_nibble() {
        for frequency in [0, 1_000_000, 20_000_000] {
            let config = BootConfig {frequency, .. Default::default()};
            assert_eq!(config.divisor(), Err(Error::Frequency(frequency)));
        }
        let config = BootConfig {frequency: 36_000_000, .. Default::default()};
        assert_eq!(config.divisor(), Ok(15));
    }
}
