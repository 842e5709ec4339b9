//! Access to the two digital lines the HX711 is wired to. The driver only
//! ever talks to hardware through the [`Port`] trait so tests can substitute
//! a scripted implementation for the real chip.

use std::collections::HashMap;

use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::error::Result;

/// Capability set over the digital lines of one GPIO chip. Levels are plain
/// booleans, `true` meaning high. Opening and closing the chip itself map
/// onto the implementing type's constructor and `Drop`.
pub trait Port {
    /// Claims `pin` as an input line.
    fn claim_input(&mut self, pin: u8) -> Result<()>;

    /// Claims `pin` as an output line, driven to `high` immediately.
    fn claim_output(&mut self, pin: u8, high: bool) -> Result<()>;

    /// Samples a claimed input line.
    fn read_level(&mut self, pin: u8) -> bool;

    /// Drives a claimed output line.
    fn write_level(&mut self, pin: u8, high: bool);

    /// Hands a claimed line back to the chip.
    fn release(&mut self, pin: u8);
}

/// [`Port`] backed by the Raspberry Pi GPIO peripheral.
pub struct RppalPort {
    chip: Gpio,
    inputs: HashMap<u8, InputPin>,
    outputs: HashMap<u8, OutputPin>,
}

impl RppalPort {
    /// Opens the GPIO chip. Dropping the port releases every claimed line
    /// and closes the chip again.
    pub fn open() -> Result<Self> {
        Ok(Self {
            chip: Gpio::new()?,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        })
    }
}

impl Port for RppalPort {
    fn claim_input(&mut self, pin: u8) -> Result<()> {
        let line = self.chip.get(pin)?.into_input();
        self.inputs.insert(pin, line);
        Ok(())
    }

    fn claim_output(&mut self, pin: u8, high: bool) -> Result<()> {
        let mut line = self.chip.get(pin)?.into_output();
        if high {
            line.set_high();
        } else {
            line.set_low();
        }
        self.outputs.insert(pin, line);
        Ok(())
    }

    /// Panics if `pin` was not previously claimed as an input.
    fn read_level(&mut self, pin: u8) -> bool {
        self.inputs
            .get(&pin)
            .expect("line not claimed as input")
            .is_high()
    }

    /// Panics if `pin` was not previously claimed as an output.
    fn write_level(&mut self, pin: u8, high: bool) {
        let line = self
            .outputs
            .get_mut(&pin)
            .expect("line not claimed as output");
        if high {
            line.set_high();
        } else {
            line.set_low();
        }
    }

    fn release(&mut self, pin: u8) {
        self.inputs.remove(&pin);
        self.outputs.remove(&pin);
    }
}
