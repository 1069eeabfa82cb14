//! Memory mapped I/O operations.
//!
//! For more information, please see [BCM2711 ARM Peripherals specification].
//!
//! [BCM2711 ARM Peripherals specification]: https://datasheets.raspberrypi.com/bcm2711/bcm2711-peripherals.pdf

use core::ptr::{read_volatile, write_volatile};

/// MMIO base address.
///
/// [/arch/arm/boot/dts/bcm2711.dtsi] defines the following mapping for the
/// low peripheral mode:
///
/// ```text
/// <0x7e000000  0x0 0xfe000000  0x01800000>,
/// <0x7c000000  0x0 0xfc000000  0x02000000>,
/// <0x40000000  0x0 0xff800000  0x00800000>;
/// ```
///
/// The GIC-400 lives at 0xff840000, so it is also addressed relative to this
/// base.
///
/// [/arch/arm/boot/dts/bcm2711.dtsi]: https://github.com/raspberrypi/linux/blob/rpi-6.1.y/arch/arm/boot/dts/bcm2711.dtsi
pub const MMIO_BASE: usize = 0xfe000000;

/// Read register. `reg` is the offset of the register from the MMIO base
/// address.
///
/// # Safety
///
/// This function reads an arbitrary memory address, thus it is unsafe.
pub unsafe fn read(reg: usize) -> u32 {
    read_volatile((MMIO_BASE + reg) as *const u32)
}

/// Write value into register. `reg` is the offset of the register from the
/// MMIO base address.
///
/// # Safety
///
/// This function writes to an arbitrary memory address, thus it is unsafe.
pub unsafe fn write(reg: usize, val: u32) {
    write_volatile((MMIO_BASE + reg) as *mut u32, val)
}

/// A 32-bit register bus. Every call must reach the device: implementations
/// must not cache, merge or reorder accesses.
pub trait Bus {
    /// Reads the register at offset `reg`.
    ///
    /// # Safety
    ///
    /// `reg` must be the offset of a readable device register.
    unsafe fn read(&self, reg: usize) -> u32;

    /// Writes `val` into the register at offset `reg`.
    ///
    /// # Safety
    ///
    /// `reg` must be the offset of a writable device register.
    unsafe fn write(&self, reg: usize, val: u32);
}

impl<B: Bus + ?Sized> Bus for &B {
    unsafe fn read(&self, reg: usize) -> u32 {
        (**self).read(reg)
    }

    unsafe fn write(&self, reg: usize, val: u32) {
        (**self).write(reg, val)
    }
}

/// The peripheral window of the BCM2711.
#[derive(Debug, Default, Copy, Clone)]
pub struct Mmio;

impl Bus for Mmio {
    unsafe fn read(&self, reg: usize) -> u32 {
        read(reg)
    }

    unsafe fn write(&self, reg: usize, val: u32) {
        write(reg, val)
    }
}

/// Recording register file used by the unit tests.
#[cfg(test)]
pub(crate) mod fake {
    use core::cell::RefCell;
    use std::collections::BTreeMap;
    use std::vec::Vec;

    use super::Bus;
    use crate::time::Delay;

    /// An access observed by [`FakeBoard`].
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum Op {
        Read(usize, u32),
        Write(usize, u32),
        Spin(u32),
        DelayUs(u32),
    }

    /// Registers hold the last written value. Unknown registers read as 0.
    #[derive(Default)]
    pub struct FakeBoard {
        regs: RefCell<BTreeMap<usize, u32>>,
        ops: RefCell<Vec<Op>>,
    }

    impl FakeBoard {
        pub fn new() -> FakeBoard {
            FakeBoard::default()
        }

        /// Sets a register value without logging the access.
        pub fn preload(&self, reg: usize, val: u32) {
            self.regs.borrow_mut().insert(reg, val);
        }

        pub fn reg(&self, reg: usize) -> u32 {
            self.regs.borrow().get(&reg).copied().unwrap_or(0)
        }

        pub fn ops(&self) -> Vec<Op> {
            self.ops.borrow().clone()
        }

        pub fn writes(&self) -> Vec<(usize, u32)> {
            self.ops
                .borrow()
                .iter()
                .filter_map(|op| match *op {
                    Op::Write(reg, val) => Some((reg, val)),
                    _ => None,
                })
                .collect()
        }

        pub fn clear_log(&self) {
            self.ops.borrow_mut().clear();
        }
    }

    impl Bus for FakeBoard {
        unsafe fn read(&self, reg: usize) -> u32 {
            let val = self.reg(reg);
            self.ops.borrow_mut().push(Op::Read(reg, val));
            val
        }

        unsafe fn write(&self, reg: usize, val: u32) {
            self.regs.borrow_mut().insert(reg, val);
            self.ops.borrow_mut().push(Op::Write(reg, val));
        }
    }

    impl Delay for FakeBoard {
        fn spin(&self, cycles: u32) {
            self.ops.borrow_mut().push(Op::Spin(cycles));
        }

        fn delay_us(&self, us: u32) {
            self.ops.borrow_mut().push(Op::DelayUs(us));
        }
    }
}
