//! gicpi drives edge-triggered GPIO interrupts through the GIC-400 of the
//! Raspberry Pi 4 Model B.
//!
//! The crate covers the order-sensitive register protocol needed to get a
//! GPIO edge from the pad to the CPU: line configuration with the required
//! settle delays, distributor setup (priority, routing, trigger mode and
//! enable) and the group forwarding policy that depends on the exception
//! level we run at. On top of that it provides the shared event word written
//! by the IRQ handler and the dispatcher that turns it into LED patterns.
//!
//! Drivers are generic over [`mmio::Bus`] and [`time::Delay`], so the same
//! code runs against [`mmio::Mmio`] and [`systimer::SystemTimer`] on the board
//! and against a recording fake in the unit tests.
//!
//! Although there are other methods, the documentation in this crate expects
//! you to use [flatelf] to generate the kernel image. The following Cargo
//! configuration is used by the firmware crate:
//!
//! ```text
//! [target.aarch64-unknown-none]
//! rustflags = [
//!     "-Ccode-model=large",
//!     "-Crelocation-model=static",
//!     "-Clink-arg=--nmagic",
//! ]
//! ```
//!
//! [flatelf]: https://github.com/jroimartin/flatelf/

#![no_std]

#[cfg(test)]
extern crate std;

use core::fmt;

pub mod cpu;
pub mod gic;
pub mod gpio;
pub mod mmio;
pub mod pattern;
pub mod print;
pub mod state;
pub mod systimer;
pub mod time;
pub mod uart;

/// gicpi error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid GPIO pin.
    InvalidGpioPin(usize),

    /// Invalid GIC interrupt ID.
    InvalidIntId(usize),

    /// The value does not name a known LED pattern.
    UnknownPattern(u32),

    /// Unknown exception level.
    InvalidExceptionLevel(u64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidGpioPin(pin) => write!(f, "invalid GPIO pin: {pin}"),
            Error::InvalidIntId(id) => write!(f, "invalid interrupt ID: {id}"),
            Error::UnknownPattern(value) => {
                write!(f, "unknown pattern: {value:#x}")
            }
            Error::InvalidExceptionLevel(el) => {
                write!(f, "invalid exception level: {el:#x}")
            }
        }
    }
}

/// gicpi result.
pub type Result<T> = core::result::Result<T, Error>;
