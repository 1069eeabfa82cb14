//! Exception handling.

use core::arch::asm;

use crate::cpu::{self, ExceptionLevel};

/// Interrupt types.
#[derive(Debug, Copy, Clone)]
pub enum Interrupt {
    /// Watchpoint, Breakpoint, and Software Step exceptions.
    Debug,

    /// System error exception.
    SError,

    /// IRQ exception.
    Irq,

    /// FIQ exception.
    Fiq,
}

/// DAIF register mask.
struct DaifMask(u64);

impl From<Interrupt> for DaifMask {
    fn from(int: Interrupt) -> DaifMask {
        match int {
            Interrupt::Debug => DaifMask(1 << 9),
            Interrupt::SError => DaifMask(1 << 8),
            Interrupt::Irq => DaifMask(1 << 7),
            Interrupt::Fiq => DaifMask(1 << 6),
        }
    }
}

/// HCR_EL2.IMO, physical IRQ routing.
const HCR_EL2_IMO: u64 = 1 << 4;

/// Mask the provided interrupt.
pub fn mask(int: Interrupt) {
    let mut daif = cpu::daif();
    daif |= DaifMask::from(int).0;
    unsafe { asm!("msr daif, {daif}", daif = in(reg) daif) };
}

/// Unmask the provided interrupt.
pub fn unmask(int: Interrupt) {
    let mut daif = cpu::daif();
    daif &= !DaifMask::from(int).0;
    unsafe { asm!("msr daif, {daif}", daif = in(reg) daif) };
}

/// Enables delivery of IRQs to the core. Must be called once, after every
/// interrupt source has been configured.
pub fn enable_interrupts() {
    unmask(Interrupt::Irq);
}

/// Sets the exception vector table address of the current exception level.
pub fn set_vector_table(address: usize) {
    unsafe {
        match cpu::current_el() {
            ExceptionLevel::El3 => {
                asm!("msr vbar_el3, {address}", address = in(reg) address)
            }
            ExceptionLevel::El2 => {
                asm!("msr vbar_el2, {address}", address = in(reg) address)
            }
            _ => asm!("msr vbar_el1, {address}", address = in(reg) address),
        }
        asm!("isb");
    }
}

/// Routes physical IRQs to EL2. Nothing to do at any other level.
pub fn enable_irq_routing() {
    if cpu::current_el() != ExceptionLevel::El2 {
        return;
    }

    let mut hcr_el2: u64;
    unsafe { asm!("mrs {hcr_el2}, hcr_el2", hcr_el2 = out(reg) hcr_el2) };
    hcr_el2 |= HCR_EL2_IMO;
    unsafe { asm!("msr hcr_el2, {hcr_el2}", hcr_el2 = in(reg) hcr_el2) };
}
