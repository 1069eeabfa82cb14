//! PL011 UART driver.
//!
//! For more information, please see:
//!
//! - [BCM2711 ARM Peripherals specification].
//! - [PL011 Technical Reference Manual].
//!
//! [BCM2711 ARM Peripherals specification]: https://datasheets.raspberrypi.com/bcm2711/bcm2711-peripherals.pdf
//! [PL011 Technical Reference Manual]: https://developer.arm.com/documentation/ddi0183/g

use crate::gpio::{Function, Gpio, Pin, PullState};
use crate::mmio;
use crate::systimer::SystemTimer;
use crate::time::Delay;

/// Base address of the PL011 UART.
///
/// [/arch/arm/boot/dts/bcm2711.dtsi] inherits it from bcm283x.dtsi:
///
/// ```text
/// uart0: serial@7e201000 {
///     compatible = "arm,pl011", "arm,primecell";
///     reg = <0x7e201000 0x200>;
///     ...
/// };
/// ```
///
/// [/arch/arm/boot/dts/bcm2711.dtsi]: https://github.com/raspberrypi/linux/blob/rpi-6.1.y/arch/arm/boot/dts/bcm283x.dtsi
const UART_BASE: usize = 0x201000;

/// UART data register.
const UARTDR: usize = UART_BASE;

/// UART flag register.
const UARTFR: usize = UART_BASE + 0x18;

/// Transmit FIFO full.
const UARTFR_TXFF: u32 = 0x20;

/// UART integer baud rate register.
const UARTIBRD: usize = UART_BASE + 0x24;

/// UART fractional baud rate register.
const UARTFBRD: usize = UART_BASE + 0x28;

/// UART line control register.
const UARTLCR_H: usize = UART_BASE + 0x2c;

/// UART control register.
const UARTCR: usize = UART_BASE + 0x30;

/// UART interrupt mask set/clear register.
const UARTIMSC: usize = UART_BASE + 0x38;

/// UART interrupt clear register.
const UARTICR: usize = UART_BASE + 0x44;

/// TX pin.
const PIN_TX: Pin = Pin::new(14);

/// RX pin.
const PIN_RX: Pin = Pin::new(15);

/// Initializes the UART at 115200 8n1.
///
/// The firmware sets UARTCLK to 48MHz (`init_uart_clock` in config.txt).
pub fn init() {
    let gpio = Gpio::new(mmio::Mmio, SystemTimer);

    unsafe {
        // Mask all UART interrupts.
        mmio::write(UARTIMSC, 0);

        // Clear all UART interrupts.
        mmio::write(UARTICR, 0x7ff);

        // Disable UART.
        mmio::write(UARTCR, 0);
    }

    // Route the UART to pins 14 (TX) and 15 (RX) and disable
    // pull-up/down.
    for pin in [PIN_TX, PIN_RX] {
        gpio.set_function(pin, Function::Alt0);
        SystemTimer.settle();
        gpio.set_pull_state(pin, PullState::Off);
        SystemTimer.settle();
    }

    unsafe {
        // Configure the baud rate divisor.
        // BRD = UARTCLK / (16 * Baud rate) = 48000000 / (16 * 115200) = 26.0416
        // UARTIBRD = BRDi = 26
        mmio::write(UARTIBRD, 26);
        // UARTFBRD = int((BRDf * 2**6) + 0.5) = int((0.0416 * 64) + 0.5) = 3
        mmio::write(UARTFBRD, 3);

        // Set UART to 8n1 and enable FIFOs.
        mmio::write(UARTLCR_H, (1 << 4) | (1 << 5) | (1 << 6));

        // Enable UART, transmit and receive.
        mmio::write(UARTCR, (1 << 0) | (1 << 8) | (1 << 9));
    }
}

/// Transmits a byte.
pub fn send_byte(b: u8) {
    unsafe {
        // Wait while the transmit FIFO is full.
        while mmio::read(UARTFR) & UARTFR_TXFF != 0 {}

        // Write byte.
        mmio::write(UARTDR, b as u32);
    }
}
