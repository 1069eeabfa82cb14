//! Event state shared between the IRQ handler and the main loop.
//!
//! There is exactly one writer, the IRQ handler, and one reader, the
//! dispatcher. The state is a single naturally aligned word, so plain loads
//! and stores are atomic on their own. No lock is taken: the handler cannot
//! wait for the main loop, and the reader accepts a value up to one polling
//! period old.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::gic::{CpuInterface, IntId, IrqSource};
use crate::gpio::{Gpio, Pin};
use crate::mmio::Bus;
use crate::time::Delay;
use crate::{Error, Result};

/// LED pattern selected by the event state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// C, B, A with a 500ms dwell.
    Slow = 0,

    /// A, B, C with a 250ms dwell.
    Fast = 1,
}

impl TryFrom<u32> for Pattern {
    type Error = Error;

    fn try_from(value: u32) -> Result<Pattern> {
        match value {
            0 => Ok(Pattern::Slow),
            1 => Ok(Pattern::Fast),
            _ => Err(Error::UnknownPattern(value)),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pattern::Slow => write!(f, "slow"),
            Pattern::Fast => write!(f, "fast"),
        }
    }
}

/// The shared event word.
///
/// Only `Relaxed` loads and stores are used. Read-modify-write atomics would
/// need exclusive accesses, which are not available with the MMU off.
pub struct EventState(AtomicU32);

impl EventState {
    /// Creates the state holding `value`.
    pub const fn new(value: u32) -> EventState {
        EventState(AtomicU32::new(value))
    }

    /// Returns the raw state. It may hold a value that is not a [`Pattern`].
    pub fn load(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Stores a raw state.
    pub fn store(&self, value: u32) {
        self.0.store(value, Ordering::Relaxed)
    }

    /// Selects a pattern.
    pub fn select(&self, pattern: Pattern) {
        self.store(pattern as u32)
    }
}

/// Edge-detect inputs that select a pattern.
#[derive(Debug, Copy, Clone)]
pub struct EdgeInputs {
    /// An event on this pin selects [`Pattern::Fast`].
    pub fast: Pin,

    /// An event on this pin selects [`Pattern::Slow`].
    pub slow: Pin,
}

/// Handles a GPIO bank interrupt: updates `state` from the detected events
/// and clears them. Returns true if any input had a pending event.
///
/// The caller still has to signal end of interrupt to the GIC.
pub fn handle_gpio_event<B: Bus, D: Delay>(
    gpio: &Gpio<B, D>,
    state: &EventState,
    inputs: &EdgeInputs,
) -> bool {
    let fast = gpio.detected(inputs.fast);
    let slow = gpio.detected(inputs.slow);

    if fast {
        gpio.clear_event(inputs.fast);
        state.select(Pattern::Fast);
    }
    if slow {
        gpio.clear_event(inputs.slow);
        state.select(Pattern::Slow);
    }

    fast || slow
}

/// Result of [`handle_irq`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Handled {
    /// Spurious interrupt. Nothing was acknowledged.
    Spurious,

    /// GPIO bank 0 interrupt. Holds whether an edge input had a pending
    /// event.
    Gpio(bool),

    /// Interrupt from another source. It was completed without touching the
    /// state.
    Other(IntId),
}

/// Handles an IRQ: acknowledges it, updates `state` if it comes from GPIO
/// bank 0 and signals end of interrupt.
///
/// GPEDS0 is cleared before the end of interrupt, otherwise the still
/// asserted line would be taken again. Spurious interrupts are not completed.
pub fn handle_irq<C: Bus, B: Bus, D: Delay>(
    gicc: &CpuInterface<C>,
    gpio: &Gpio<B, D>,
    state: &EventState,
    inputs: &EdgeInputs,
) -> Handled {
    let Some(irq) = gicc.acknowledge() else {
        return Handled::Spurious;
    };

    let handled = if irq.id() == IntId::from(IrqSource::GpioBank0) {
        Handled::Gpio(handle_gpio_event(gpio, state, inputs))
    } else {
        Handled::Other(irq.id())
    };

    gicc.end_of_interrupt(irq);
    handled
}
