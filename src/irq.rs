//! Interrupt line
//!
//! The DW3000 raises IRQ while it has unhandled events. The interrupt is
//! edge triggered at the microcontroller, so the handler keeps servicing
//! events as long as the line stays high, or events arriving during
//! servicing would be lost.

use log::error;

use crate::{error::Line, gpio::Error};

/// The platform's side of the interrupt line
///
/// `enable` and `disable` mask the interrupt at the interrupt controller.
/// They must be callable from the interrupt handler and are expected to be
/// infallible.
pub trait InterruptGate {
    /// Error returned when the line can't be configured
    type Error;

    /// Configures rising-edge detection on the line
    fn listen(&mut self) -> Result<(), Self::Error>;

    /// Stops detecting edges and releases the line
    fn unlisten(&mut self);

    /// Unmasks the interrupt
    fn enable(&mut self);

    /// Masks the interrupt
    fn disable(&mut self);

    /// Whether the interrupt is unmasked
    fn is_enabled(&self) -> bool;

    /// Whether the line is high
    fn is_asserted(&self) -> bool;

    /// Clears the pending edge event, at the start of servicing
    fn acknowledge(&mut self) {}
}

/// The interrupt line, if connected
pub struct IrqGate<G> {
    gate: Option<G>,
}

impl<G> IrqGate<G>
where
    G: InterruptGate,
{
    /// Takes ownership of the interrupt line
    pub fn new(gate: Option<G>) -> Self {
        IrqGate { gate }
    }

    /// Starts listening for rising edges
    pub fn init(&mut self) -> Result<(), Error> {
        match &mut self.gate {
            Some(gate) => gate.listen().map_err(|_| {
                error!("IRQ init failed");
                Error::Pin(Line::Interrupt)
            }),
            None => {
                error!("IRQ pin is not defined");
                Err(Error::Unassigned(Line::Interrupt))
            }
        }
    }

    /// Unmasks the interrupt. Does nothing without an interrupt line.
    pub fn enable(&mut self) {
        if let Some(gate) = &mut self.gate {
            gate.enable();
        }
    }

    /// Masks the interrupt. Does nothing without an interrupt line.
    pub fn disable(&mut self) {
        if let Some(gate) = &mut self.gate {
            gate.disable();
        }
    }

    /// Whether the interrupt is unmasked; always `false` without an
    /// interrupt line
    pub fn is_enabled(&self) -> bool {
        self.gate.as_ref().map_or(false, |gate| gate.is_enabled())
    }

    /// Clears the pending edge event
    ///
    /// Called once at the start of servicing, before the line is sampled.
    pub fn acknowledge(&mut self) {
        if let Some(gate) = &mut self.gate {
            gate.acknowledge();
        }
    }

    /// Whether the line is high; always `false` without an interrupt line
    pub fn is_asserted(&self) -> bool {
        self.gate.as_ref().map_or(false, |gate| gate.is_asserted())
    }

    /// Masks the interrupt, stops listening, and returns the line
    pub fn fini(self) -> Option<G> {
        let mut gate = self.gate?;

        if gate.is_enabled() {
            gate.disable();
        }
        gate.unlisten();

        Some(gate)
    }
}
