/*!
    simulated coprocessor, implementing the chip side of the bus protocol in `std` environment

    [SimChip] holds the chip state and hands out the hardware seams a [Device](crate::host::Device) needs: the bus, the chip select line, the power down line and a clock. Time is simulated and advances only when the driver sleeps, so bounded waits expire without real delay.

    behaviors of a marginal chip are enabled through [SimConfig]: slow ready byte, silent boot probes, missing identity, stuck boot status, detuned clock, slow command fifo, faulting coprocessor. Capture link status and touches can be scripted, and every write is logged for inspection.
*/

use core::{
    convert::Infallible,
    time::Duration,
    };
use std::{
    sync::{Arc, Mutex, MutexGuard},
    collections::{HashMap, VecDeque},
    vec::Vec,
    };
use embedded_hal::{digital, spi};
use embedded_hal_async::{delay::DelayNs, spi::SpiBus};
use packbytes::{FromBytes, ToBytes, ByteArray};
use log::*;

use crate::{
    clock::Clock,
    frame::{HEADER, READY},
    registers::{Register, RegisterMap, TouchXY, CHIP_ID, BOOT_COMPLETE, COMMAND_FIFO, COMMAND_FAULT},
    };


/// pll of the simulated chip, the bus clock is derived from it
const PLL: u32 = 576_000_000;
/// rate of the running clock register
const CLOCK_RATE: u128 = 36_000_000;

/// behavior of the simulated chip
#[derive(Clone, Debug)]
pub struct SimConfig {
    pub registers: RegisterMap,
    /// filler bytes clocked out before the ready byte of every read
    pub latency: usize,
    /// number of first power cycles where the chip never sends a ready byte
    pub silent_cycles: u32,
    /// number of first power cycles where the identity register stays zero
    pub anonymous_cycles: u32,
    /// number of first power cycles where the boot status never completes
    pub stuck_cycles: u32,
    /// boot status reported while stuck
    pub stuck_status: u32,
    /// number of first power cycles where the chip runs at a wrong frequency
    pub detuned_cycles: u32,
    /// polls of the command fifo reporting it full after each submission
    pub fifo_latency: u32,
    /// coprocessor faulted
    pub fault: bool,
}
impl Default for SimConfig {
    fn default() -> Self {
        Self {
            registers: RegisterMap::BT820,
            latency: 3,
            silent_cycles: 0,
            anonymous_cycles: 0,
            stuck_cycles: 0,
            stuck_status: 0x522e_2e00,
            detuned_cycles: 0,
            fifo_latency: 0,
            fault: false,
        }
    }
}


/// shared handle on a simulated chip
#[derive(Clone)]
pub struct SimChip {
    state: Arc<Mutex<Chip>>,
}
/// chip internals
struct Chip {
    config: SimConfig,
    memory: HashMap<u32, u8>,
    /// power down line is high
    powered: bool,
    /// serial interface left host command mode
    booted: bool,
    reset_pulse: bool,
    cycles: u32,
    divisor: u8,
    now: Duration,
    frame: Option<SimFrame>,

    link_status: VecDeque<u32>,
    touches: VecDeque<TouchXY>,
    fifo_busy: u32,

    host_commands: Vec<[u8; 5]>,
    writes: Vec<(u32, Vec<u8>)>,
    submitted: Vec<u8>,
    read_frames: usize,
}
/// chip select frame in progress
#[derive(Default)]
struct SimFrame {
    written: Vec<u8>,
    /// decoded transaction header (address, write)
    header: Option<(u32, bool)>,
    /// bytes clocked out so far
    streamed: usize,
}

impl SimChip {
    /// a chip powered off, waiting to be booted
    pub fn new(config: SimConfig) -> Self {
        Self {state: Arc::new(Mutex::new(Chip {
            config,
            memory: HashMap::new(),
            powered: false,
            booted: false,
            reset_pulse: false,
            cycles: 0,
            divisor: 0,
            now: Duration::ZERO,
            frame: None,
            link_status: VecDeque::new(),
            touches: VecDeque::new(),
            fifo_busy: 0,
            host_commands: Vec::new(),
            writes: Vec::new(),
            submitted: Vec::new(),
            read_frames: 0,
        }))}
    }
    /// a chip already booted at 72MHz, for testing memory accesses alone
    pub fn running(config: SimConfig) -> Self {
        let chip = Self::new(config);
        {
            let mut state = chip.lock();
            state.powered = true;
            state.cycles = 1;
            state.divisor = 7;
            state.boot();
        }
        chip
    }

    pub fn bus(&self) -> SimBus  {SimBus {chip: self.clone()}}
    pub fn select(&self) -> SimSelect  {SimSelect {chip: self.clone()}}
    pub fn power(&self) -> SimPower  {SimPower {chip: self.clone()}}
    pub fn clock(&self) -> SimClock  {SimClock {chip: self.clone()}}

    fn lock(&self) -> MutexGuard<'_, Chip> {
        self.state.lock().expect("simulated chip poisoned")
    }

    /// number of power cycles so far
    pub fn cycles(&self) -> u32  {self.lock().cycles}
    /// simulated time
    pub fn now(&self) -> Duration  {self.lock().now}
    /// number of read transactions so far
    pub fn read_frames(&self) -> usize  {self.lock().read_frames}
    /// host commands received, in order
    pub fn host_commands(&self) -> Vec<[u8; 5]>  {self.lock().host_commands.clone()}
    /// bytes appended to the command fifo
    pub fn submitted(&self) -> Vec<u8>  {self.lock().submitted.clone()}
    /// every value written to a register, in order
    pub fn writes_to(&self, register: Register<u32>) -> Vec<u32> {
        self.lock().writes.iter()
            .filter(|(address, data)| *address == register.address() && data.len() >= 4)
            .map(|(_, data)| u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            .collect()
    }
    /// forget logged writes and counters
    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.writes.clear();
        state.submitted.clear();
        state.read_frames = 0;
    }

    /// read memory without going through the bus
    pub fn peek(&self, address: u32, size: usize) -> Vec<u8> {
        let state = self.lock();
        (address .. address + size as u32)
            .map(|at| state.memory.get(&at).copied().unwrap_or(0))
            .collect()
    }
    /// write memory without going through the bus
    pub fn poke(&self, address: u32, data: &[u8]) {
        let mut state = self.lock();
        for (at, &byte) in (address ..).zip(data) {
            state.memory.insert(at, byte);
        }
    }
    pub fn poke_register<T: ToBytes>(&self, register: Register<T>, value: T) {
        self.poke(register.address(), value.to_le_bytes().as_ref());
    }

    /// capture link statuses returned by the next polls, synced once exhausted
    pub fn script_link(&self, statuses: impl IntoIterator<Item=u32>) {
        self.lock().link_status.extend(statuses);
    }
    /// touches returned by the next reads of the touch register, released once exhausted
    pub fn script_touches(&self, touches: impl IntoIterator<Item=TouchXY>) {
        self.lock().touches.extend(touches);
    }
    /// change the chip behavior on the fly
    pub fn configure(&self, change: impl FnOnce(&mut SimConfig)) {
        change(&mut self.lock().config);
    }
}

impl Chip {
    fn boot(&mut self) {
        debug!("simulated chip booted, cycle {}", self.cycles);
        self.booted = true;
        self.reset_pulse = false;
        let registers = self.config.registers;
        let id = if self.cycles <= self.config.anonymous_cycles {0} else {CHIP_ID};
        self.store(registers.id.address(), &id.to_le_bytes());
    }
    fn power_down(&mut self) {
        self.powered = false;
        self.booted = false;
        self.reset_pulse = false;
        self.memory.clear();
    }
    fn power_up(&mut self) {
        if !self.powered {
            self.powered = true;
            self.cycles += 1;
        }
    }
    fn silent(&self) -> bool {
        self.cycles <= self.config.silent_cycles
    }

    fn store(&mut self, address: u32, data: &[u8]) {
        for (at, &byte) in (address ..).zip(data) {
            self.memory.insert(at, byte);
        }
    }
    fn fetch(&self, address: u32) -> u8 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    /// refresh the registers whose value is computed when read
    fn load_word(&mut self, address: u32) {
        let registers = self.config.registers;
        let value = if address == registers.boot_status.address() {
            if self.cycles <= self.config.stuck_cycles
                {self.config.stuck_status}
            else
                {BOOT_COMPLETE}
        }
        else if address == registers.frequency.address() {
            let frequency = PLL / (u32::from(self.divisor) + 1);
            if self.cycles <= self.config.detuned_cycles
                {frequency - 1_000_000}
            else
                {frequency}
        }
        else if address == registers.clock.address() {
            (self.now.as_nanos() * CLOCK_RATE / 1_000_000_000) as u32
        }
        else if address == registers.command_space.address() {
            if self.fifo_busy > 0 {
                self.fifo_busy -= 1;
                0
            }
            else
                {COMMAND_FIFO - 4}
        }
        else if address == registers.command_read.address() {
            if self.config.fault {COMMAND_FAULT} else {0}
        }
        else if address == registers.link_status.address() {
            self.link_status.pop_front().unwrap_or(0xf000_0000)
        }
        else if address == registers.touch.address() {
            let touch = self.touches.pop_front()
                .unwrap_or(TouchXY {y: 0, x: TouchXY::NO_TOUCH});
            self.store(address, touch.to_le_bytes().as_ref());
            return;
        }
        else {return};
        self.store(address, &value.to_le_bytes());
    }

    fn select(&mut self) {
        self.frame = Some(SimFrame::default());
    }
    fn deselect(&mut self) {
        let Some(frame) = self.frame.take() else {return};
        if !self.powered
            {return}
        if !self.booted {
            self.host_command(&frame.written);
            return;
        }
        if let Some((address, true)) = frame.header {
            let payload = frame.written[HEADER ..].to_vec();
            if address == self.config.registers.command_write {
                self.submitted.extend_from_slice(&payload);
                self.fifo_busy = self.config.fifo_latency;
            }
            else {
                self.store(address, &payload);
                self.writes.push((address, payload));
            }
        }
    }
    fn host_command(&mut self, written: &[u8]) {
        let Ok(command) = <[u8; 5]>::try_from(written) else {
            warn!("simulated chip ignored {} bytes before boot", written.len());
            return;
        };
        self.host_commands.push(command);
        match command {
            [0xff, 0xe6, parameter, _, _] => self.divisor = parameter & 0xf,
            [0xff, 0xe7, _, _, _] => self.reset_pulse = true,
            [0, 0, 0, 0, 0] if self.reset_pulse => self.boot(),
            _ => {},
        }
    }

    fn clock_in(&mut self, data: &[u8]) {
        let Some(frame) = self.frame.as_mut() else {return};
        frame.written.extend_from_slice(data);
        if self.booted && frame.header.is_none() && frame.written.len() >= HEADER {
            let header = u32::from_be_bytes([frame.written[0], frame.written[1], frame.written[2], frame.written[3]]);
            let write = header & (1 << 31) != 0;
            frame.header = Some((header & !(1 << 31), write));
            if !write {
                self.read_frames += 1;
            }
        }
    }
    fn clock_out(&mut self) -> u8 {
        let Some(frame) = self.frame.as_mut() else {return 0};
        let Some((address, false)) = frame.header else {return 0};
        let position = frame.streamed;
        frame.streamed += 1;

        if !self.powered || self.silent()
            {return 0}
        let latency = self.config.latency;
        if position < latency
            {return 0}
        if position == latency
            {return READY}
        let at = address + (position - latency - 1) as u32;
        // only the addressed register is refreshed, bytes clocked out beyond it are stale memory
        if at == address {
            self.load_word(at);
        }
        self.fetch(at)
    }
}


/// bus side of the simulated chip
pub struct SimBus {chip: SimChip}
/// chip select line of the simulated chip
pub struct SimSelect {chip: SimChip}
/// power down line of the simulated chip
pub struct SimPower {chip: SimChip}
/// simulated time, advancing only when sleeping
pub struct SimClock {chip: SimChip}

impl spi::ErrorType for SimBus {
    type Error = Infallible;
}
impl SpiBus for SimBus {
    async fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        // a real bus suspends the task while shifting bytes
        tokio::task::yield_now().await;
        let mut chip = self.chip.lock();
        for word in words {
            *word = chip.clock_out();
        }
        Ok(())
    }
    async fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        tokio::task::yield_now().await;
        self.chip.lock().clock_in(words);
        Ok(())
    }
    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write).await?;
        self.read(read).await
    }
    async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.write(words).await?;
        self.read(words).await
    }
    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl digital::ErrorType for SimSelect {
    type Error = Infallible;
}
impl digital::OutputPin for SimSelect {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.chip.lock().select();
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.chip.lock().deselect();
        Ok(())
    }
}

impl digital::ErrorType for SimPower {
    type Error = Infallible;
}
impl digital::OutputPin for SimPower {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.chip.lock().power_down();
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.chip.lock().power_up();
        Ok(())
    }
}

impl DelayNs for SimClock {
    async fn delay_ns(&mut self, ns: u32) {
        self.chip.lock().now += Duration::from_nanos(ns.into());
    }
}
impl Clock for SimClock {
    fn now(&mut self) -> Duration {
        self.chip.now()
    }
}

impl SimChip {
    /// typed read without going through the bus
    pub fn peek_register<T: FromBytes>(&self, register: Register<T>) -> T {
        let mut bytes = T::Bytes::zeroed();
        bytes.as_mut().copy_from_slice(&self.peek(register.address(), register.size()));
        T::from_le_bytes(bytes)
    }
}
