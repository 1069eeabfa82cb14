//! Time operations.

/// Minimum number of cycles the GPIO block needs after a function select or
/// pull control write before the new state can be relied upon.
pub const SETTLE_CYCLES: u32 = 150;

/// Blocking delays.
///
/// None of these waits can be cancelled. They are only ever called from the
/// single thread of control outside the IRQ handler.
pub trait Delay {
    /// Busy-waits at least `cycles` CPU cycles.
    fn spin(&self, cycles: u32);

    /// Busy-waits at least `us` microseconds.
    fn delay_us(&self, us: u32);

    /// Waits for the GPIO control signals to settle. Takes at least
    /// [`SETTLE_CYCLES`] cycles.
    fn settle(&self) {
        self.spin(SETTLE_CYCLES)
    }
}

impl<D: Delay + ?Sized> Delay for &D {
    fn spin(&self, cycles: u32) {
        (**self).spin(cycles)
    }

    fn delay_us(&self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Wait at least `cycles`.
#[cfg(target_arch = "aarch64")]
pub fn delay(cycles: u64) {
    if cycles == 0 {
        return;
    }

    unsafe {
        core::arch::asm!(
            r#"
                1:
                    subs {cycles}, {cycles}, #1
                    bne 1b
            "#,
            cycles = inout(reg) cycles => _
        )
    }
}

/// Wait at least `cycles`.
#[cfg(not(target_arch = "aarch64"))]
pub fn delay(cycles: u64) {
    for _ in 0..cycles {
        core::hint::spin_loop();
    }
}
