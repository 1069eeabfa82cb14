//! GPIO operations.
//!
//! For more information, please see [BCM2711 ARM Peripherals specification].
//!
//! [BCM2711 ARM Peripherals specification]: https://datasheets.raspberrypi.com/bcm2711/bcm2711-peripherals.pdf

use core::fmt;

use crate::mmio::Bus;
use crate::time::Delay;
use crate::{Error, Result};

/// Base address of GPIO.
///
/// [/arch/arm/boot/dts/bcm2711.dtsi] describes it:
///
/// ```text
/// gpio: gpio@7e200000 {
///     compatible = "brcm,bcm2711-gpio";
///     reg = <0x7e200000 0xf4>;
///     ...
/// };
/// ```
///
/// [/arch/arm/boot/dts/bcm2711.dtsi]: https://github.com/raspberrypi/linux/blob/rpi-6.1.y/arch/arm/boot/dts/bcm2711.dtsi
const GPIO_BASE: usize = 0x200000;

/// Base address of GPFSELn registers.
const GPFSEL_BASE: usize = GPIO_BASE;

/// Base address of GPSETn registers.
const GPSET_BASE: usize = GPIO_BASE + 0x1c;

/// Base address of GPCLRn registers.
const GPCLR_BASE: usize = GPIO_BASE + 0x28;

/// Base address of GPLEVn registers.
const GPLEV_BASE: usize = GPIO_BASE + 0x34;

/// Base address of GPEDSn registers.
const GPEDS_BASE: usize = GPIO_BASE + 0x40;

/// Base address of GPRENn registers.
const GPREN_BASE: usize = GPIO_BASE + 0x4c;

/// Base address of GPFENn registers.
const GPFEN_BASE: usize = GPIO_BASE + 0x58;

/// Base address of GPHENn registers.
const GPHEN_BASE: usize = GPIO_BASE + 0x64;

/// Base address of GPLENn registers.
const GPLEN_BASE: usize = GPIO_BASE + 0x70;

/// Base address of GPARENn registers.
const GPAREN_BASE: usize = GPIO_BASE + 0x7c;

/// Base address of GPAFENn registers.
const GPAFEN_BASE: usize = GPIO_BASE + 0x88;

/// Base address of GPIO_PUP_PDN_CNTRL_REGn registers.
const GPPUPPDN_BASE: usize = GPIO_BASE + 0xe4;

/// Number of GPIO pins.
const NPINS: usize = 58;

/// Represents a GPIO pin.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pin(usize);

impl Pin {
    /// Returns the pin `n`.
    ///
    /// Meant for `const` items, where an out of range pin is rejected at
    /// compile time.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a valid GPIO pin.
    pub const fn new(n: usize) -> Pin {
        assert!(n < NPINS, "invalid GPIO pin");
        Pin(n)
    }

    /// Offset and mask of the single bit used by this pin in the banked
    /// one-bit-per-pin registers starting at `base`.
    fn bit(&self, base: usize) -> (usize, u32) {
        (base + (self.0 / 32) * 4, 1 << (self.0 % 32))
    }
}

impl TryFrom<usize> for Pin {
    type Error = Error;

    fn try_from(pin: usize) -> Result<Pin> {
        if pin >= NPINS {
            return Err(Error::InvalidGpioPin(pin));
        }
        Ok(Pin(pin))
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Pull state (pull-up/pull-down) for a GPIO pin.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PullState {
    /// Disable pull-up/down.
    Off,

    /// Enable pull-up.
    Up,

    /// Enable pull-down.
    Down,
}

impl From<PullState> for u32 {
    fn from(state: PullState) -> u32 {
        match state {
            PullState::Off => 0b00,
            PullState::Up => 0b01,
            PullState::Down => 0b10,
        }
    }
}

/// Pin function.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Function {
    /// Input pin.
    Input,

    /// Output pin.
    Output,

    /// Alternate function 0.
    Alt0,

    /// Alternate function 1.
    Alt1,

    /// Alternate function 2.
    Alt2,

    /// Alternate function 3.
    Alt3,

    /// Alternate function 4.
    Alt4,

    /// Alternate function 5.
    Alt5,
}

impl From<Function> for u32 {
    fn from(fcn: Function) -> u32 {
        match fcn {
            Function::Input => 0b000,
            Function::Output => 0b001,
            Function::Alt0 => 0b100,
            Function::Alt1 => 0b101,
            Function::Alt2 => 0b110,
            Function::Alt3 => 0b111,
            Function::Alt4 => 0b011,
            Function::Alt5 => 0b010,
        }
    }
}

/// Pin level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Level {
    /// Low level.
    Low,

    /// High level.
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Level::Low => write!(f, "Low"),
            Level::High => write!(f, "High"),
        }
    }
}

/// Edge monitored by an edge-detect input.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Edge {
    /// Low to high transition.
    Rising,

    /// High to low transition.
    Falling,
}

impl From<Edge> for Event {
    fn from(edge: Edge) -> Event {
        match edge {
            Edge::Rising => Event::RisingEdge,
            Edge::Falling => Event::FallingEdge,
        }
    }
}

/// Pin event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    /// Rising edge transition using synchronous edge detection. The input
    /// signal is sampled using the system clock and then it is looking for a
    /// "011" pattern on the sampled signal. This has the effect of suppressing
    /// glitches.
    RisingEdge,

    /// Falling edge transition using synchronous edge detection. The input
    /// signal is sampled using the system clock and then it is looking for a
    /// "100" pattern on the sampled signal. This has the effect of suppressing
    /// glitches.
    FallingEdge,

    /// Rising edge transition using asynchronous edge detection. The incoming
    /// signal is not sampled by the system clock. As such rising edges of very
    /// short duration can be detected.
    AsyncRisingEdge,

    /// Falling edge transition using asynchronous edge detection. The incoming
    /// signal is not sampled by the system clock. As such falling edges of
    /// very short duration can be detected.
    AsyncFallingEdge,

    /// High level.
    PinHigh,

    /// Low level.
    PinLow,
}

impl Event {
    /// Base address of the enable registers of this event type.
    fn enable_base(&self) -> usize {
        match self {
            Event::RisingEdge => GPREN_BASE,
            Event::FallingEdge => GPFEN_BASE,
            Event::AsyncRisingEdge => GPAREN_BASE,
            Event::AsyncFallingEdge => GPAFEN_BASE,
            Event::PinHigh => GPHEN_BASE,
            Event::PinLow => GPLEN_BASE,
        }
    }
}

/// GPIO driver.
///
/// Register writes are issued in program order and are never merged, the
/// configuration sequences below depend on it.
pub struct Gpio<B, D> {
    /// Register bus.
    bus: B,

    /// Delay source used for the settle waits.
    delay: D,
}

impl<B: Bus, D: Delay> Gpio<B, D> {
    /// Creates a GPIO driver.
    pub fn new(bus: B, delay: D) -> Gpio<B, D> {
        Gpio { bus, delay }
    }

    /// Configures the operation of a GPIO pin.
    pub fn set_function(&self, pin: Pin, fcn: Function) {
        // Read the initial register value.
        let addr = GPFSEL_BASE + (pin.0 / 10) * 4;
        let reg = unsafe { self.bus.read(addr) };

        // Write register.
        let shift = (pin.0 % 10) * 3;
        let mask: u32 = 0b111 << shift;
        let fcn: u32 = fcn.into();
        unsafe { self.bus.write(addr, (reg & !mask) | (fcn << shift)) };
    }

    /// Configures the pull state (pull-up/pull-down) of a GPIO pin.
    ///
    /// The pull control is latched by the pad. Callers must wait for the
    /// signals to settle before and after calling this function.
    pub fn set_pull_state(&self, pin: Pin, state: PullState) {
        let addr = GPPUPPDN_BASE + (pin.0 / 16) * 4;
        let reg = unsafe { self.bus.read(addr) };

        let shift = (pin.0 % 16) * 2;
        let mask: u32 = 0b11 << shift;
        let state: u32 = state.into();
        unsafe { self.bus.write(addr, (reg & !mask) | (state << shift)) };
    }

    /// Configures a pin as output.
    pub fn configure_output(&self, pin: Pin) {
        self.set_function(pin, Function::Output);
    }

    /// Configures a pin as a rising edge input without pull-up/down.
    pub fn configure_rising_edge_input(&self, pin: Pin) {
        self.configure_edge_input(pin, Edge::Rising, PullState::Off);
    }

    /// Configures a pin as a falling edge input without pull-up/down.
    pub fn configure_falling_edge_input(&self, pin: Pin) {
        self.configure_edge_input(pin, Edge::Falling, PullState::Off);
    }

    /// Configures a pin as an edge-detect input.
    ///
    /// The pin is switched to input before the pull control is touched and
    /// edge detection is armed last. Detect enables of other pins are
    /// preserved.
    pub fn configure_edge_input(&self, pin: Pin, edge: Edge, pull: PullState) {
        self.set_function(pin, Function::Input);
        self.delay.settle();

        self.set_pull_state(pin, pull);
        self.delay.settle();

        self.enable_event(pin, edge.into());
    }

    /// Enables an event type for a pin.
    pub fn enable_event(&self, pin: Pin, event: Event) {
        let (addr, mask) = pin.bit(event.enable_base());
        let reg = unsafe { self.bus.read(addr) };
        unsafe { self.bus.write(addr, reg | mask) };
    }

    /// Disables an event type for a pin.
    pub fn disable_event(&self, pin: Pin, event: Event) {
        let (addr, mask) = pin.bit(event.enable_base());
        let reg = unsafe { self.bus.read(addr) };
        unsafe { self.bus.write(addr, reg & !mask) };
    }

    /// Returns the raw edge detect enable register for the bank of `pin`.
    pub fn event_enables(&self, pin: Pin, edge: Edge) -> u32 {
        let (addr, _) = pin.bit(Event::from(edge).enable_base());
        unsafe { self.bus.read(addr) }
    }

    /// Sets a GPIO pin. GPSETn is write-1-to-set, other pins are untouched.
    pub fn set(&self, pin: Pin) {
        let (addr, mask) = pin.bit(GPSET_BASE);
        unsafe { self.bus.write(addr, mask) };
    }

    /// Sets a GPIO pin whose transition would otherwise be seen by the rising
    /// edge detector of `guard`. The detector is disarmed around the set and
    /// armed again before returning.
    pub fn set_guarded(&self, pin: Pin, guard: Pin) {
        self.disable_event(guard, Event::RisingEdge);
        self.set(pin);
        self.enable_event(guard, Event::RisingEdge);
    }

    /// Clears a GPIO pin. GPCLRn is write-1-to-clear, other pins are
    /// untouched.
    pub fn clear(&self, pin: Pin) {
        let (addr, mask) = pin.bit(GPCLR_BASE);
        unsafe { self.bus.write(addr, mask) };
    }

    /// Returns the level of a GPIO pin.
    pub fn read_level(&self, pin: Pin) -> Level {
        let (addr, mask) = pin.bit(GPLEV_BASE);
        if unsafe { self.bus.read(addr) } & mask == 0 {
            Level::Low
        } else {
            Level::High
        }
    }

    /// Returns true if the programmed event type has been detected for the
    /// pin.
    pub fn detected(&self, pin: Pin) -> bool {
        let (addr, mask) = pin.bit(GPEDS_BASE);
        unsafe { self.bus.read(addr) & mask != 0 }
    }

    /// Clears the event status of a GPIO pin.
    pub fn clear_event(&self, pin: Pin) {
        let (addr, mask) = pin.bit(GPEDS_BASE);
        unsafe { self.bus.write(addr, mask) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::fake::{FakeBoard, Op};
    use crate::time::SETTLE_CYCLES;

    const GPFSEL0: usize = GPFSEL_BASE;
    const GPFSEL1: usize = GPFSEL_BASE + 4;
    const GPREN0: usize = GPREN_BASE;
    const GPFEN0: usize = GPFEN_BASE;
    const GPPUPPDN0: usize = GPPUPPDN_BASE;

    #[test]
    fn pin_bounds() {
        assert_eq!(Pin::try_from(57), Ok(Pin(57)));
        assert_eq!(Pin::try_from(58), Err(Error::InvalidGpioPin(58)));
    }

    #[test]
    fn output_changes_only_its_field() {
        let board = FakeBoard::new();
        board.preload(GPFSEL1, 0xffff_ffff);
        let gpio = Gpio::new(&board, &board);

        gpio.configure_output(Pin::new(12));

        // GPIO12 uses bits 8:6 of GPFSEL1.
        assert_eq!(board.reg(GPFSEL1), 0xffff_ffff & !(0b110 << 6));
        assert_eq!(board.writes(), [(GPFSEL1, 0xffff_fe7f)]);
    }

    #[test]
    fn output_sequence_has_no_delay() {
        let board = FakeBoard::new();
        let gpio = Gpio::new(&board, &board);

        gpio.configure_output(Pin::new(4));

        assert_eq!(
            board.ops(),
            [Op::Read(GPFSEL0, 0), Op::Write(GPFSEL0, 0b001 << 12)]
        );
    }

    #[test]
    fn function_select_preserves_neighbours() {
        for n in 0..NPINS {
            let board = FakeBoard::new();
            let addr = GPFSEL_BASE + (n / 10) * 4;
            board.preload(addr, 0x2492_4924);
            let gpio = Gpio::new(&board, &board);

            gpio.set_function(Pin::new(n), Function::Input);

            let field = 0b111 << ((n % 10) * 3);
            assert_eq!(board.reg(addr) & !field, 0x2492_4924 & !field);
            assert_eq!(board.reg(addr) & field, 0);
        }
    }

    #[test]
    fn rising_edge_input_sequence() {
        let board = FakeBoard::new();
        board.preload(GPFSEL0, 0b001 << 12);
        board.preload(GPPUPPDN0, 0b1001);
        board.preload(GPREN0, 1 << 7);
        let gpio = Gpio::new(&board, &board);

        gpio.configure_rising_edge_input(Pin::new(0));

        assert_eq!(
            board.ops(),
            [
                Op::Read(GPFSEL0, 0b001 << 12),
                Op::Write(GPFSEL0, 0b001 << 12),
                Op::Spin(SETTLE_CYCLES),
                Op::Read(GPPUPPDN0, 0b1001),
                Op::Write(GPPUPPDN0, 0b1000),
                Op::Spin(SETTLE_CYCLES),
                Op::Read(GPREN0, 1 << 7),
                Op::Write(GPREN0, (1 << 7) | 1),
            ]
        );
    }

    #[test]
    fn falling_edge_input_arms_falling_detector() {
        let board = FakeBoard::new();
        board.preload(GPFSEL0, 0b111 << 3);
        let gpio = Gpio::new(&board, &board);

        gpio.configure_falling_edge_input(Pin::new(1));

        assert_eq!(board.reg(GPFSEL0), 0);
        assert_eq!(board.reg(GPFEN0), 1 << 1);
        assert_eq!(board.reg(GPREN0), 0);
    }

    #[test]
    fn edge_input_is_idempotent() {
        let once = FakeBoard::new();
        let twice = FakeBoard::new();
        for board in [&once, &twice] {
            board.preload(GPFSEL0, 0x0000_1249);
            board.preload(GPPUPPDN0, 0x5555_5555);
        }

        Gpio::new(&once, &once).configure_rising_edge_input(Pin::new(3));
        let gpio = Gpio::new(&twice, &twice);
        gpio.configure_rising_edge_input(Pin::new(3));
        gpio.configure_rising_edge_input(Pin::new(3));

        for reg in [GPFSEL0, GPPUPPDN0, GPREN0, GPFEN0] {
            assert_eq!(once.reg(reg), twice.reg(reg));
        }
    }

    #[test]
    fn second_edge_input_keeps_first_armed() {
        let board = FakeBoard::new();
        let gpio = Gpio::new(&board, &board);

        gpio.configure_rising_edge_input(Pin::new(0));
        gpio.configure_rising_edge_input(Pin::new(5));

        assert_eq!(board.reg(GPREN0), (1 << 5) | 1);
    }

    #[test]
    fn pull_state_field() {
        let board = FakeBoard::new();
        let gpio = Gpio::new(&board, &board);

        gpio.set_pull_state(Pin::new(17), PullState::Down);
        gpio.set_pull_state(Pin::new(18), PullState::Up);

        // GPIO17 and GPIO18 live in the second register, fields 1 and 2.
        assert_eq!(board.reg(GPPUPPDN_BASE + 4), (0b10 << 2) | (0b01 << 4));
    }

    #[test]
    fn set_and_clear_are_plain_writes() {
        let board = FakeBoard::new();
        let gpio = Gpio::new(&board, &board);

        gpio.set(Pin::new(16));
        gpio.clear(Pin::new(40));

        assert_eq!(
            board.ops(),
            [
                Op::Write(GPSET_BASE, 1 << 16),
                Op::Write(GPCLR_BASE + 4, 1 << 8),
            ]
        );
    }

    #[test]
    fn guarded_set_rearms_detector() {
        let board = FakeBoard::new();
        board.preload(GPREN0, 0b11);
        let gpio = Gpio::new(&board, &board);

        gpio.set_guarded(Pin::new(4), Pin::new(0));

        assert_eq!(
            board.writes(),
            [
                (GPREN0, 0b10),
                (GPSET_BASE, 1 << 4),
                (GPREN0, 0b11),
            ]
        );
        assert_eq!(board.reg(GPREN0), 0b11);
    }

    #[test]
    fn events() {
        let board = FakeBoard::new();
        board.preload(GPEDS_BASE, 0b10);
        board.preload(GPLEV_BASE + 4, 1);
        let gpio = Gpio::new(&board, &board);

        assert!(!gpio.detected(Pin::new(0)));
        assert!(gpio.detected(Pin::new(1)));
        assert_eq!(gpio.read_level(Pin::new(32)), Level::High);
        assert_eq!(gpio.read_level(Pin::new(33)), Level::Low);

        board.clear_log();
        gpio.clear_event(Pin::new(1));
        assert_eq!(board.ops(), [Op::Write(GPEDS_BASE, 0b10)]);
    }
}
