//! Driver for the GIC-400 interrupt controller of the BCM2711.
//!
//! For more information, please see [ARM Generic Interrupt Controller
//! Architecture Specification v2] and [CoreLink GIC-400 Technical Reference
//! Manual].
//!
//! [ARM Generic Interrupt Controller Architecture Specification v2]: https://developer.arm.com/documentation/ihi0048/b
//! [CoreLink GIC-400 Technical Reference Manual]: https://developer.arm.com/documentation/ddi0471/b

use core::fmt;

use crate::cpu::ExceptionLevel;
use crate::mmio::Bus;
use crate::{Error, Result};

/// Base address of the GIC-400.
///
/// [/arch/arm/boot/dts/bcm2711.dtsi] describes it:
///
/// ```text
/// gicv2: interrupt-controller@40041000 {
///     interrupt-controller;
///     #interrupt-cells = <3>;
///     compatible = "arm,gic-400";
///     reg = <0x40041000 0x1000>,
///           <0x40042000 0x2000>,
///           ...
/// };
/// ```
///
/// The ARM view of 0x40000000 is 0xff800000, which is 0x1800000 above
/// [`crate::mmio::MMIO_BASE`].
///
/// [/arch/arm/boot/dts/bcm2711.dtsi]: https://github.com/raspberrypi/linux/blob/rpi-6.1.y/arch/arm/boot/dts/bcm2711.dtsi
const GIC_BASE: usize = 0x1840000;

/// Base address of the distributor.
const GICD_BASE: usize = GIC_BASE + 0x1000;

/// Distributor control register.
const GICD_CTLR: usize = GICD_BASE;

/// Interrupt controller type register.
const GICD_TYPER: usize = GICD_BASE + 0x4;

/// Base address of the interrupt set-enable registers.
const GICD_ISENABLER: usize = GICD_BASE + 0x100;

/// Base address of the interrupt priority registers.
const GICD_IPRIORITYR: usize = GICD_BASE + 0x400;

/// Base address of the interrupt processor targets registers.
const GICD_ITARGETSR: usize = GICD_BASE + 0x800;

/// Base address of the interrupt configuration registers.
const GICD_ICFGR: usize = GICD_BASE + 0xc00;

/// Base address of the CPU interface.
const GICC_BASE: usize = GIC_BASE + 0x2000;

/// Interrupt acknowledge register.
const GICC_IAR: usize = GICC_BASE + 0xc;

/// End of interrupt register.
const GICC_EOIR: usize = GICC_BASE + 0x10;

/// Number of interrupt IDs defined by the architecture. 1020 to 1023 are
/// special.
const NINTIDS: usize = 1020;

/// First Shared Peripheral Interrupt. Targets of lower IDs are read-only.
const FIRST_SPI: usize = 32;

/// ID of the first VideoCore peripheral interrupt.
const VC_IRQ_BASE: usize = 96;

/// Interrupt IDs per enable register.
const IDS_PER_BLOCK: usize = 32;

/// Represents a GIC interrupt ID.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IntId(usize);

impl IntId {
    /// Returns the interrupt ID `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a valid interrupt ID.
    pub const fn new(n: usize) -> IntId {
        assert!(n < NINTIDS, "invalid interrupt ID");
        IntId(n)
    }

    /// Returns the index of the enable register holding this ID and the mask
    /// of its bit.
    pub const fn enable_bit(&self) -> (usize, u32) {
        (self.0 / 32, 1 << (self.0 % 32))
    }

    /// First ID of the 32-ID block containing this ID.
    fn block_start(&self) -> usize {
        self.0 - self.0 % IDS_PER_BLOCK
    }
}

impl TryFrom<usize> for IntId {
    type Error = Error;

    fn try_from(id: usize) -> Result<IntId> {
        if id >= NINTIDS {
            return Err(Error::InvalidIntId(id));
        }
        Ok(IntId(id))
    }
}

impl fmt::Display for IntId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// BCM2711 interrupt source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IrqSource {
    /// System Timer match 1.
    SystemTimer1,

    /// System Timer match 3.
    SystemTimer3,

    /// GPIO bank 0 (pins 0-27).
    GpioBank0,

    /// GPIO bank 1 (pins 28-45).
    GpioBank1,

    /// GPIO bank 2 (pins 46-57).
    GpioBank2,

    /// Any GPIO bank.
    GpioAny,

    /// PL011 UARTs.
    Uart,
}

impl From<IrqSource> for IntId {
    fn from(src: IrqSource) -> IntId {
        let vc_irq = match src {
            IrqSource::SystemTimer1 => 1,
            IrqSource::SystemTimer3 => 3,
            IrqSource::GpioBank0 => 49,
            IrqSource::GpioBank1 => 50,
            IrqSource::GpioBank2 => 51,
            IrqSource::GpioAny => 52,
            IrqSource::Uart => 57,
        };
        IntId(VC_IRQ_BASE + vc_irq)
    }
}

/// Set of CPU interfaces an interrupt is forwarded to. One bit per core.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CpuTargets(u8);

impl CpuTargets {
    /// Core 0 only.
    pub const CPU0: CpuTargets = CpuTargets(0b0001);

    /// Any of the four cores.
    pub const ALL: CpuTargets = CpuTargets(0b1111);

    /// Returns the mask replicated over the four byte fields of an
    /// ITARGETSRn register.
    fn replicated(&self) -> u32 {
        u32::from_ne_bytes([self.0; 4])
    }
}

/// Interrupt groups forwarded by the distributor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GroupForwarding {
    /// Group 0 and Group 1. Only possible from the Secure state.
    Both,

    /// Group 1 only, which is the only group visible to Non-secure accesses.
    NonSecureOnly,
}

impl From<ExceptionLevel> for GroupForwarding {
    fn from(el: ExceptionLevel) -> GroupForwarding {
        match el {
            ExceptionLevel::El3 => GroupForwarding::Both,
            _ => GroupForwarding::NonSecureOnly,
        }
    }
}

impl From<GroupForwarding> for u32 {
    fn from(fwd: GroupForwarding) -> u32 {
        match fwd {
            GroupForwarding::Both => 0b11,
            GroupForwarding::NonSecureOnly => 0b01,
        }
    }
}

impl fmt::Display for GroupForwarding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GroupForwarding::Both => write!(f, "Group 0 and 1"),
            GroupForwarding::NonSecureOnly => write!(f, "Group 1"),
        }
    }
}

/// Distributor setup.
#[derive(Debug, Copy, Clone)]
pub struct GicConfig<'a> {
    /// Interrupt lines to enable. They are configured as edge-triggered.
    pub lines: &'a [IntId],

    /// Cores the configured lines are forwarded to.
    pub targets: CpuTargets,

    /// Interrupt groups forwarded by the distributor.
    pub forwarding: GroupForwarding,
}

/// GIC distributor.
pub struct Distributor<B> {
    /// Register bus.
    bus: B,
}

impl<B: Bus> Distributor<B> {
    /// Creates a distributor driver.
    pub fn new(bus: B) -> Distributor<B> {
        Distributor { bus }
    }

    /// Configures and enables the provided interrupt lines, then enables
    /// forwarding at the distributor level.
    ///
    /// The enable bit of a line is only set after its priority, target and
    /// trigger mode are in place.
    pub fn init(&self, config: &GicConfig) {
        self.clear_priorities();

        for id in config.lines {
            self.set_block_targets(*id, config.targets);
        }

        for id in config.lines {
            self.set_block_edge_triggered(*id);
        }

        for id in config.lines {
            self.enable(*id);
        }

        self.set_forwarding(config.forwarding);
    }

    /// Returns the number of implemented interrupt IDs.
    pub fn num_lines(&self) -> usize {
        let typer = unsafe { self.bus.read(GICD_TYPER) };
        let lines = ((typer & 0x1f) as usize + 1) * 32;
        lines.min(NINTIDS)
    }

    /// Sets the priority of every implemented interrupt to 0, the highest.
    pub fn clear_priorities(&self) {
        // One byte per ID.
        for n in 0..self.num_lines() / 4 {
            unsafe { self.bus.write(GICD_IPRIORITYR + n * 4, 0) };
        }
    }

    /// Forwards every SPI in the 32-ID block of `id` to `targets`.
    pub fn set_block_targets(&self, id: IntId, targets: CpuTargets) {
        let start = id.block_start();
        if start < FIRST_SPI {
            return;
        }

        let val = targets.replicated();
        for n in (start..start + IDS_PER_BLOCK).step_by(4) {
            unsafe { self.bus.write(GICD_ITARGETSR + n, val) };
        }
    }

    /// Configures every ID in the 32-ID block of `id` as edge-triggered.
    pub fn set_block_edge_triggered(&self, id: IntId) {
        // Two bits per ID, 16 IDs per register.
        let first = id.block_start() / 16;
        for n in first..first + 2 {
            unsafe { self.bus.write(GICD_ICFGR + n * 4, 0xffff_ffff) };
        }
    }

    /// Enables forwarding of an interrupt. ISENABLERn is write-1-to-set.
    pub fn enable(&self, id: IntId) {
        let (n, mask) = id.enable_bit();
        unsafe { self.bus.write(GICD_ISENABLER + n * 4, mask) };
    }

    /// Enables forwarding of the provided interrupt groups.
    pub fn set_forwarding(&self, fwd: GroupForwarding) {
        unsafe { self.bus.write(GICD_CTLR, fwd.into()) };
    }

    /// Returns the set-enable register `n`.
    pub fn enable_set(&self, n: usize) -> u32 {
        unsafe { self.bus.read(GICD_ISENABLER + n * 4) }
    }

    /// Returns the distributor control register.
    pub fn ctlr(&self) -> u32 {
        unsafe { self.bus.read(GICD_CTLR) }
    }
}

/// An acknowledged interrupt.
///
/// Keeps the raw GICC_IAR value. For SGIs it carries the ID of the requesting
/// CPU in bits [12:10], and GICC_EOIR must receive the same value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Acknowledged {
    id: IntId,
    iar: u32,
}

impl Acknowledged {
    /// Returns the interrupt ID.
    pub fn id(&self) -> IntId {
        self.id
    }
}

/// GIC CPU interface.
pub struct CpuInterface<B> {
    /// Register bus.
    bus: B,
}

impl<B: Bus> CpuInterface<B> {
    /// Creates a CPU interface driver.
    pub fn new(bus: B) -> CpuInterface<B> {
        CpuInterface { bus }
    }

    /// Acknowledges the highest priority pending interrupt. Returns `None`
    /// for a spurious interrupt, which must not be completed.
    pub fn acknowledge(&self) -> Option<Acknowledged> {
        let iar = unsafe { self.bus.read(GICC_IAR) };
        let id = IntId::try_from((iar & 0x3ff) as usize).ok()?;
        Some(Acknowledged { id, iar })
    }

    /// Signals the completion of the processing of `irq`.
    pub fn end_of_interrupt(&self, irq: Acknowledged) {
        unsafe { self.bus.write(GICC_EOIR, irq.iar) };
    }
}
