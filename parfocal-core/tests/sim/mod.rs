//! Simulated board for driving `Focuser` on the host

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use parfocal_core::config::record::{self, RECORD_SIZE};
use parfocal_core::config::{FocuserConfig, PersistedSettings};
use parfocal_core::traits::{
    Direction, ProbeError, StepMode, StepperDriver, StepperError, TemperatureProbe,
};
use parfocal_core::Focuser;
use parfocal_hal::{ChannelId, NvStorage, StorageError, Transport};

/// Stepper counting pulses per direction line state
#[derive(Debug, Default)]
pub struct SimStepper {
    pub enabled: bool,
    pub direction: Option<Direction>,
    pub mode: Option<StepMode>,
    pub pulses: u32,
}

impl StepperDriver for SimStepper {
    fn enable(&mut self, enabled: bool) -> Result<(), StepperError> {
        self.enabled = enabled;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_direction(&mut self, dir: Direction) -> Result<(), StepperError> {
        self.direction = Some(dir);
        Ok(())
    }

    fn set_step_mode(&mut self, mode: StepMode) -> Result<(), StepperError> {
        self.mode = Some(mode);
        Ok(())
    }

    fn pulse(&mut self) -> Result<(), StepperError> {
        self.pulses += 1;
        Ok(())
    }
}

/// 512-byte EEPROM image
pub struct SimStorage {
    pub bytes: [u8; 512],
    pub writes: u32,
}

impl SimStorage {
    pub fn erased() -> Self {
        Self {
            bytes: [0xFF; 512],
            writes: 0,
        }
    }

    pub fn with(settings: &PersistedSettings) -> Self {
        let mut storage = Self::erased();
        storage.bytes[..RECORD_SIZE].copy_from_slice(&record::encode(settings).unwrap());
        storage
    }

    pub fn stored(&self) -> PersistedSettings {
        record::decode(&self.bytes[..RECORD_SIZE]).unwrap()
    }
}

impl NvStorage for SimStorage {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read_record(&mut self, addr: usize, buffer: &mut [u8]) -> Result<(), StorageError> {
        buffer.copy_from_slice(&self.bytes[addr..addr + buffer.len()]);
        Ok(())
    }

    fn write_record(&mut self, addr: usize, data: &[u8]) -> Result<(), StorageError> {
        self.bytes[addr..addr + data.len()].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}

/// Probe whose reading the test can change while the focuser owns it
#[derive(Clone)]
pub struct SimProbe {
    celsius_x100: Rc<Cell<i32>>,
}

impl SimProbe {
    pub fn new(celsius_x100: i32) -> Self {
        Self {
            celsius_x100: Rc::new(Cell::new(celsius_x100)),
        }
    }

    pub fn set(&self, celsius_x100: i32) {
        self.celsius_x100.set(celsius_x100);
    }
}

impl TemperatureProbe for SimProbe {
    fn request_conversion(&mut self) -> Result<(), ProbeError> {
        Ok(())
    }

    fn read_celsius_x100(&mut self) -> Result<i32, ProbeError> {
        Ok(self.celsius_x100.get())
    }
}

/// Transport recording every reply
#[derive(Debug)]
pub struct Recorder {
    pub active: [bool; 3],
    pub sent: Vec<(ChannelId, String)>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            active: [true; 3],
            sent: Vec::new(),
        }
    }
}

impl Recorder {
    pub fn on(&self, channel: ChannelId) -> Vec<&str> {
        self.sent
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, text)| text.as_str())
            .collect()
    }
}

impl Transport for Recorder {
    fn is_active(&self, channel: ChannelId) -> bool {
        self.active[channel.index()]
    }

    fn send(&mut self, channel: ChannelId, text: &str) {
        self.sent.push((channel, text.to_string()));
    }
}

pub type SimFocuser<P> = Focuser<SimStepper, P, SimStorage>;

/// Focuser plus its clock and transport
pub struct Bench<P: TemperatureProbe> {
    pub focuser: SimFocuser<P>,
    pub link: Recorder,
    pub now: u32,
}

impl<P: TemperatureProbe> Bench<P> {
    pub fn new(probe: P, storage: SimStorage) -> Self {
        let focuser = Focuser::new(
            SimStepper::default(),
            probe,
            storage,
            FocuserConfig::default(),
            0,
        );
        Self {
            focuser,
            link: Recorder::default(),
            now: 0,
        }
    }

    pub fn send(&mut self, channel: ChannelId, line: &str) {
        self.focuser
            .receive(channel, line.as_bytes(), self.now, &mut self.link);
    }

    /// Poll once per millisecond for `ms` milliseconds
    pub fn run_for(&mut self, ms: u32) {
        for _ in 0..ms {
            self.focuser.poll(self.now, &mut self.link).unwrap();
            self.now += 1;
        }
    }

    /// Poll until the motor stops turning
    pub fn run_until_stopped(&mut self) {
        for _ in 0..10_000_000 {
            if !self.focuser.is_moving() {
                return;
            }
            self.focuser.poll(self.now, &mut self.link).unwrap();
            self.now += 1;
        }
        panic!("focuser never stopped");
    }

    pub fn pulses(&self) -> u32 {
        self.focuser.driver().pulses
    }

    pub fn writes(&self) -> u32 {
        self.focuser.storage().writes
    }
}

/// Stored settings at `position`
pub fn settings_at(position: i32) -> PersistedSettings {
    let mut settings = PersistedSettings::default();
    settings.last_position = position;
    settings
}
