//! Edge-triggered GPIO interrupts selecting a LED pattern.
//!
//! A rising edge on GPIO0 selects the fast pattern, a falling edge on GPIO1
//! selects the slow one. The LEDs are connected to GPIO4 (A), GPIO12 (B) and
//! GPIO16 (C). GPIO4 is looped back to GPIO0 on the board, so its rising
//! edge detector is disarmed while GPIO4 is set.

#![no_std]
#![no_main]

use gicpi::cpu::{self, exceptions};
use gicpi::gic::{
    CpuInterface, CpuTargets, Distributor, GicConfig, GroupForwarding, IntId,
    IrqSource,
};
use gicpi::gpio::{Edge, Gpio, Pin};
use gicpi::mmio::Mmio;
use gicpi::pattern::{Dispatcher, Output, Outputs};
use gicpi::print::UartWriter;
use gicpi::state::{self, EdgeInputs, EventState, Handled, Pattern};
use gicpi::systimer::SystemTimer;
use gicpi::{print_reg, println, uart};
use gicpi_macros::{entrypoint, exception_handler, exception_vector_table};

/// Rising edge on this pin selects the fast pattern.
const GPIO_FAST: Pin = Pin::new(0);

/// Falling edge on this pin selects the slow pattern.
const GPIO_SLOW: Pin = Pin::new(1);

/// LED outputs.
const OUTPUTS: Outputs = Outputs {
    a: Output {
        pin: Pin::new(4),
        guard: Some(GPIO_FAST),
    },
    b: Output {
        pin: Pin::new(12),
        guard: None,
    },
    c: Output {
        pin: Pin::new(16),
        guard: None,
    },
};

/// Edge-detect inputs.
const INPUTS: EdgeInputs = EdgeInputs {
    fast: GPIO_FAST,
    slow: GPIO_SLOW,
};

/// Address of the exception vector table. Must match the linker arguments.
const VECTOR_TABLE: usize = 0x90000;

/// Pattern selected by the IRQ handler.
static EVENT_STATE: EventState = EventState::new(Pattern::Slow as u32);

/// Kernel main function.
#[entrypoint]
fn kernel_main() {
    uart::init();

    let gpio = Gpio::new(Mmio, SystemTimer);

    println!("Initial values:");
    let el = cpu::current_el();
    print_reg!("Exception level", u8::from(el));
    print_reg!("SPSel", cpu::spsel());
    print_reg!("DAIF", cpu::daif());
    print_reg!("GPREN0", gpio.event_enables(GPIO_FAST, Edge::Rising));
    print_reg!("GPFEN0", gpio.event_enables(GPIO_SLOW, Edge::Falling));

    EVENT_STATE.select(Pattern::Slow);

    // Mask IRQs until everything is configured.
    exceptions::mask(exceptions::Interrupt::Irq);

    println!();
    println!("Configuring GPIO:");
    gpio.configure_rising_edge_input(GPIO_FAST);
    gpio.configure_falling_edge_input(GPIO_SLOW);
    for out in [OUTPUTS.a, OUTPUTS.b, OUTPUTS.c] {
        gpio.configure_output(out.pin);
    }
    print_reg!("GPREN0", gpio.event_enables(GPIO_FAST, Edge::Rising));
    print_reg!("GPFEN0", gpio.event_enables(GPIO_SLOW, Edge::Falling));

    println!();
    let gpio_irq = IntId::from(IrqSource::GpioBank0);
    let forwarding = GroupForwarding::from(el);
    println!("Enabling GPIO bank 0 interrupts (ID {gpio_irq}) in GIC:");
    let gicd = Distributor::new(Mmio);
    gicd.init(&GicConfig {
        lines: &[gpio_irq],
        // Secondary cores are parked, route to core 0 only.
        targets: CpuTargets::CPU0,
        forwarding,
    });
    let (n, _) = gpio_irq.enable_bit();
    print_reg!("GICD_ISENABLER0", gicd.enable_set(0));
    print_reg!(format_args!("GICD_ISENABLER{n}"), gicd.enable_set(n));
    println!("Forwarding {forwarding} interrupts");
    print_reg!("GICD_CTLR", gicd.ctlr());

    exceptions::set_vector_table(VECTOR_TABLE);
    exceptions::enable_irq_routing();
    exceptions::enable_interrupts();
    print_reg!("DAIF", cpu::daif());

    println!();
    println!("Starting main loop...");

    let mut dispatcher = Dispatcher::new(
        Gpio::new(Mmio, SystemTimer),
        SystemTimer,
        OUTPUTS,
        &EVENT_STATE,
        UartWriter,
    );
    dispatcher.run();
}

/// IRQ handler.
#[exception_handler]
fn irq_handler() {
    let gicc = CpuInterface::new(Mmio);
    let gpio = Gpio::new(Mmio, SystemTimer);
    if let Handled::Other(id) = state::handle_irq(&gicc, &gpio, &EVENT_STATE, &INPUTS) {
        panic!("unexpected interrupt {id}");
    }
}

/// Unimplemented exception handler.
#[exception_handler]
fn unimplemented_handler() {
    unimplemented!();
}

exception_vector_table! {
    // Synchronous.
    unimplemented_handler,
    // IRQ.
    irq_handler,
    // FIQ.
    unimplemented_handler,
    // SError
    unimplemented_handler,
}
