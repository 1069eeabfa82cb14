//! System Timer driver.

use crate::mmio::{self, Bus};
use crate::time::{self, Delay};

/// Base address of the System Timer.
///
/// [/arch/arm/boot/dts/bcm2711.dtsi] inherits it from bcm283x.dtsi:
///
/// ```text
/// system_timer: timer@7e003000 {
///     compatible = "brcm,bcm2835-system-timer";
///     reg = <0x7e003000 0x1000>;
///     ...
///     clock-frequency = <1000000>;
/// };
/// ```
///
/// [/arch/arm/boot/dts/bcm2711.dtsi]: https://github.com/raspberrypi/linux/blob/rpi-6.1.y/arch/arm/boot/dts/bcm283x.dtsi
const SYSTIMER_BASE: usize = 0x3000;

/// System Timer Counter Lower 32 bits.
const SYSTIMER_CLO: usize = SYSTIMER_BASE + 0x4;

/// System Timer Counter Higher 32 bits.
const SYSTIMER_CHI: usize = SYSTIMER_BASE + 0x8;

/// The System Timer runs at 1MHz.
pub const CLOCK_FREQ: u32 = 1_000_000;

/// Returns the current value of the System Timer free-running counter.
pub fn counter<B: Bus>(bus: &B) -> u64 {
    // CHI can tick between both reads. Retry until it is stable.
    loop {
        let chi = unsafe { bus.read(SYSTIMER_CHI) };
        let clo = unsafe { bus.read(SYSTIMER_CLO) };
        if unsafe { bus.read(SYSTIMER_CHI) } == chi {
            return ((chi as u64) << 32) | clo as u64;
        }
    }
}

/// Returns the number of counter ticks in `us` microseconds.
fn ticks(us: u32) -> u64 {
    us as u64 * CLOCK_FREQ as u64 / 1_000_000
}

/// Delay source backed by the System Timer counter.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemTimer;

impl Delay for SystemTimer {
    fn spin(&self, cycles: u32) {
        time::delay(cycles as u64);
    }

    fn delay_us(&self, us: u32) {
        let ticks = ticks(us);
        let start = counter(&mmio::Mmio);
        while counter(&mmio::Mmio).wrapping_sub(start) < ticks {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::fake::FakeBoard;

    #[test]
    fn counter_joins_halves() {
        let board = FakeBoard::new();
        board.preload(SYSTIMER_CHI, 0x1);
        board.preload(SYSTIMER_CLO, 0x2345_6789);

        assert_eq!(counter(&board), 0x1_2345_6789);
    }

    #[test]
    fn one_tick_per_microsecond() {
        assert_eq!(ticks(0), 0);
        assert_eq!(ticks(250_000), 250_000);
        assert_eq!(ticks(u32::MAX), u32::MAX as u64);
    }
}
