//! CPU specific operations.

use core::fmt;

use crate::{Error, Result};

#[cfg(target_arch = "aarch64")]
use core::arch::asm;

#[cfg(target_arch = "aarch64")]
pub mod exceptions;

/// Exception level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExceptionLevel {
    /// Applications.
    El0,

    /// OS kernel.
    El1,

    /// Hypervisor.
    El2,

    /// Secure monitor.
    El3,
}

impl TryFrom<u64> for ExceptionLevel {
    type Error = Error;

    /// Decodes the value of the CurrentEL register.
    fn try_from(current_el: u64) -> Result<ExceptionLevel> {
        match current_el {
            0b0000 => Ok(ExceptionLevel::El0),
            0b0100 => Ok(ExceptionLevel::El1),
            0b1000 => Ok(ExceptionLevel::El2),
            0b1100 => Ok(ExceptionLevel::El3),
            _ => Err(Error::InvalidExceptionLevel(current_el)),
        }
    }
}

impl From<ExceptionLevel> for u8 {
    fn from(el: ExceptionLevel) -> u8 {
        match el {
            ExceptionLevel::El0 => 0,
            ExceptionLevel::El1 => 1,
            ExceptionLevel::El2 => 2,
            ExceptionLevel::El3 => 3,
        }
    }
}

impl fmt::Display for ExceptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EL{}", u8::from(*self))
    }
}

/// Returns the current exception level.
#[cfg(target_arch = "aarch64")]
pub fn current_el() -> ExceptionLevel {
    let current_el: u64;
    unsafe { asm!("mrs {current_el}, CurrentEL", current_el = out(reg) current_el) };

    // Only bits 3:2 are defined, so the decoding cannot fail.
    match ExceptionLevel::try_from(current_el & 0b1100) {
        Ok(el) => el,
        Err(_) => unreachable!(),
    }
}

/// Returns the SPSel register. 0 means SP_EL0 is used at every exception
/// level, 1 means SP_ELx is used at ELx.
#[cfg(target_arch = "aarch64")]
pub fn spsel() -> u64 {
    let spsel: u64;
    unsafe { asm!("mrs {spsel}, SPSel", spsel = out(reg) spsel) };
    spsel
}

/// Returns the DAIF register.
#[cfg(target_arch = "aarch64")]
pub fn daif() -> u64 {
    let daif: u64;
    unsafe { asm!("mrs {daif}, daif", daif = out(reg) daif) };
    daif
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_current_el() {
        assert_eq!(ExceptionLevel::try_from(0b1000), Ok(ExceptionLevel::El2));
        assert_eq!(ExceptionLevel::try_from(0b1100), Ok(ExceptionLevel::El3));
        assert_eq!(
            ExceptionLevel::try_from(0b0001),
            Err(Error::InvalidExceptionLevel(1))
        );
        assert_eq!(u8::from(ExceptionLevel::El1), 1);
    }
}
