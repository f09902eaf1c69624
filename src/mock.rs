//! Recording test doubles for the platform traits
//!
//! Every double appends to one shared event log, so tests can assert on the
//! exact order of bus transfers, pin changes and delays.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    vec::Vec,
};

use embedded_hal::{
    blocking::{
        delay::{DelayMs, DelayUs},
        spi,
    },
    digital::v2::OutputPin,
};

use crate::{gpio::ResetLine, irq::InterruptGate, spi::SpiPort};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    Attach(u32),
    Detach,
    Release,
    Write { hz: u32, data: Vec<u8> },
    Transfer { hz: u32, len: usize },
    ChipSelect(bool),
    Wakeup(bool),
    ResetAssert,
    ResetRelease,
    ResetPoll,
    IrqListen,
    IrqUnlisten,
    IrqAcknowledge,
    IrqEnable,
    IrqDisable,
    DelayMs(u32),
    DelayUs(u32),
}

impl Event {
    /// Whether the event put anything on, or took anything off, the bus
    pub fn is_bus(&self) -> bool {
        matches!(
            self,
            Event::Attach(_) | Event::Write { .. } | Event::Transfer { .. }
        )
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct MockError;

#[derive(Default)]
pub struct Faults {
    pub attach: Cell<bool>,
    pub write: Cell<bool>,
    pub transfer: Cell<bool>,
}

/// Shared state of one test rig
#[derive(Clone, Default)]
pub struct Rig {
    pub log: Rc<RefCell<Vec<Event>>>,
    pub faults: Rc<Faults>,
    /// Level of the IRQ line once a gate's countdown has run out
    pub irq_line: Rc<Cell<bool>>,
}

impl Rig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn bus_events(&self) -> Vec<Event> {
        self.events().into_iter().filter(Event::is_bus).collect()
    }

    fn push(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }

    pub fn port(&self, max_safe_hz: u32) -> MockPort {
        MockPort {
            rig: self.clone(),
            max_safe_hz,
            read_data: Vec::new(),
        }
    }

    pub fn port_with_data(&self, max_safe_hz: u32, read_data: &[u8]) -> MockPort {
        MockPort {
            rig: self.clone(),
            max_safe_hz,
            read_data: read_data.to_vec(),
        }
    }

    pub fn chip_select(&self) -> MockPin {
        MockPin {
            rig: self.clone(),
            event: Event::ChipSelect,
        }
    }

    pub fn wakeup(&self) -> MockPin {
        MockPin {
            rig: self.clone(),
            event: Event::Wakeup,
        }
    }

    /// A reset line that reads high after `polls` reads, or never
    pub fn reset(&self, polls: Option<u32>) -> MockReset {
        MockReset {
            rig: self.clone(),
            remaining: Cell::new(polls),
        }
    }

    /// An interrupt gate whose line stays asserted for `asserted` reads
    pub fn gate(&self, enabled: bool, asserted: u32) -> MockGate {
        MockGate {
            rig: self.clone(),
            enabled,
            asserted: Cell::new(asserted),
            fail_listen: false,
        }
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay { rig: self.clone() }
    }
}

pub struct MockPort {
    rig: Rig,
    max_safe_hz: u32,
    read_data: Vec<u8>,
}

impl SpiPort for MockPort {
    type Device = MockDevice;
    type Error = MockError;

    fn attach(&mut self, hz: u32) -> Result<MockDevice, MockError> {
        if self.rig.faults.attach.get() {
            return Err(MockError);
        }
        self.rig.push(Event::Attach(hz));

        Ok(MockDevice {
            rig: self.rig.clone(),
            hz,
            read_data: self.read_data.clone(),
        })
    }

    fn detach(&mut self, _device: MockDevice) {
        self.rig.push(Event::Detach);
    }

    fn max_safe_hz(&self) -> u32 {
        self.max_safe_hz
    }

    fn release(&mut self) {
        self.rig.push(Event::Release);
    }
}

pub struct MockDevice {
    rig: Rig,
    hz: u32,
    read_data: Vec<u8>,
}

impl spi::Write<u8> for MockDevice {
    type Error = MockError;

    fn write(&mut self, words: &[u8]) -> Result<(), MockError> {
        if self.rig.faults.write.get() {
            return Err(MockError);
        }
        self.rig.push(Event::Write {
            hz: self.hz,
            data: words.to_vec(),
        });
        Ok(())
    }
}

impl spi::Transfer<u8> for MockDevice {
    type Error = MockError;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], MockError> {
        if self.rig.faults.transfer.get() {
            return Err(MockError);
        }
        self.rig.push(Event::Transfer {
            hz: self.hz,
            len: words.len(),
        });

        let n = words.len().min(self.read_data.len());
        words[..n].copy_from_slice(&self.read_data[..n]);

        Ok(words)
    }
}

pub struct MockPin {
    rig: Rig,
    event: fn(bool) -> Event,
}

impl OutputPin for MockPin {
    type Error = MockError;

    fn set_low(&mut self) -> Result<(), MockError> {
        self.rig.push((self.event)(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), MockError> {
        self.rig.push((self.event)(true));
        Ok(())
    }
}

pub struct MockReset {
    rig: Rig,
    remaining: Cell<Option<u32>>,
}

impl ResetLine for MockReset {
    type Error = MockError;

    fn assert(&mut self) -> Result<(), MockError> {
        self.rig.push(Event::ResetAssert);
        Ok(())
    }

    fn release(&mut self) -> Result<(), MockError> {
        self.rig.push(Event::ResetRelease);
        Ok(())
    }

    fn is_released(&self) -> Result<bool, MockError> {
        self.rig.push(Event::ResetPoll);

        match self.remaining.get() {
            Some(0) => Ok(true),
            Some(n) => {
                self.remaining.set(Some(n - 1));
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

pub struct MockGate {
    rig: Rig,
    pub enabled: bool,
    asserted: Cell<u32>,
    pub fail_listen: bool,
}

impl InterruptGate for MockGate {
    type Error = MockError;

    fn listen(&mut self) -> Result<(), MockError> {
        if self.fail_listen {
            return Err(MockError);
        }
        self.rig.push(Event::IrqListen);
        Ok(())
    }

    fn unlisten(&mut self) {
        self.rig.push(Event::IrqUnlisten);
    }

    fn acknowledge(&mut self) {
        self.rig.push(Event::IrqAcknowledge);
    }

    fn enable(&mut self) {
        self.rig.push(Event::IrqEnable);
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.rig.push(Event::IrqDisable);
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_asserted(&self) -> bool {
        match self.asserted.get() {
            0 => self.rig.irq_line.get(),
            n => {
                self.asserted.set(n - 1);
                true
            }
        }
    }
}

pub struct MockDelay {
    rig: Rig,
}

impl DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.rig.push(Event::DelayMs(ms));
    }
}

impl DelayUs<u32> for MockDelay {
    fn delay_us(&mut self, us: u32) {
        self.rig.push(Event::DelayUs(us));
    }
}
