//! LED pattern dispatcher.
//!
//! Three output lines, A, B and C, are driven through a sequence of three
//! phases. In every phase exactly one line is asserted and the other two are
//! cleared. Which sequence runs is decided by the [`EventState`] sampled at the
//! start of each pass.

use core::fmt::Write;

use crate::gpio::{Gpio, Pin};
use crate::mmio::Bus;
use crate::state::{EventState, Pattern};
use crate::time::Delay;

/// Busy-wait between two samples of the event state, in cycles. This bounds
/// how stale an observed state can be.
pub const POLL_CYCLES: u32 = 0xffff;

/// Output line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Line {
    A,
    B,
    C,
}

/// One step of a pattern.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Phase {
    /// Line asserted by this phase.
    pub assert: Line,

    /// Lines cleared right after the assertion, in order.
    pub clear: [Line; 2],

    /// Time spent in this phase, in microseconds.
    pub dwell_us: u32,
}

/// Phases of [`Pattern::Slow`].
const SLOW: [Phase; 3] = [
    Phase {
        assert: Line::C,
        clear: [Line::B, Line::A],
        dwell_us: 500_000,
    },
    Phase {
        assert: Line::B,
        clear: [Line::C, Line::A],
        dwell_us: 500_000,
    },
    Phase {
        assert: Line::A,
        clear: [Line::B, Line::C],
        dwell_us: 500_000,
    },
];

/// Phases of [`Pattern::Fast`].
const FAST: [Phase; 3] = [
    Phase {
        assert: Line::A,
        clear: [Line::B, Line::C],
        dwell_us: 250_000,
    },
    Phase {
        assert: Line::B,
        clear: [Line::A, Line::C],
        dwell_us: 250_000,
    },
    Phase {
        assert: Line::C,
        clear: [Line::A, Line::B],
        dwell_us: 250_000,
    },
];

impl Pattern {
    /// Returns the phases of the pattern.
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            Pattern::Slow => &SLOW,
            Pattern::Fast => &FAST,
        }
    }
}

/// A GPIO output line.
#[derive(Debug, Copy, Clone)]
pub struct Output {
    /// Output pin.
    pub pin: Pin,

    /// Input whose rising edge detector sees this output. It is disarmed
    /// while the output is set.
    pub guard: Option<Pin>,
}

/// Pins of the three output lines.
#[derive(Debug, Copy, Clone)]
pub struct Outputs {
    pub a: Output,
    pub b: Output,
    pub c: Output,
}

impl Outputs {
    fn get(&self, line: Line) -> &Output {
        match line {
            Line::A => &self.a,
            Line::B => &self.b,
            Line::C => &self.c,
        }
    }
}

/// Drives the outputs according to the event state.
pub struct Dispatcher<'a, B, D, W> {
    /// GPIO driver.
    gpio: Gpio<B, D>,

    /// Delay source for the dwell times and the polling period.
    delay: D,

    /// Output lines.
    outputs: Outputs,

    /// Event state written by the IRQ handler.
    state: &'a EventState,

    /// Diagnostics sink.
    console: W,
}

impl<'a, B: Bus, D: Delay, W: Write> Dispatcher<'a, B, D, W> {
    /// Creates a dispatcher. The output pins must already be configured as
    /// outputs.
    pub fn new(
        gpio: Gpio<B, D>,
        delay: D,
        outputs: Outputs,
        state: &'a EventState,
        console: W,
    ) -> Dispatcher<'a, B, D, W> {
        Dispatcher {
            gpio,
            delay,
            outputs,
            state,
            console,
        }
    }

    /// Runs forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    /// Runs a single pass: samples the state once, plays the selected
    /// pattern, if any, and waits for the polling period.
    pub fn step(&mut self) {
        if let Ok(pattern) = Pattern::try_from(self.state.load()) {
            let _ = writeln!(self.console, "pattern: {pattern}");
            for phase in pattern.phases() {
                self.apply(phase);
                self.delay.delay_us(phase.dwell_us);
            }
        }

        self.delay.spin(POLL_CYCLES);
    }

    /// Asserts the line of `phase` and clears the other two.
    fn apply(&self, phase: &Phase) {
        let out = self.outputs.get(phase.assert);
        match out.guard {
            Some(guard) => self.gpio.set_guarded(out.pin, guard),
            None => self.gpio.set(out.pin),
        }

        for line in phase.clear {
            self.gpio.clear(self.outputs.get(line).pin);
        }
    }

    /// Consumes the dispatcher and returns the diagnostics sink.
    pub fn into_console(self) -> W {
        self.console
    }
}

#[cfg(test)]
mod tests {
    use std::string::String;
    use std::vec::Vec;

    use super::*;
    use crate::mmio::fake::{FakeBoard, Op};

    const GPSET0: usize = 0x20001c;
    const GPCLR0: usize = 0x200028;
    const GPREN0: usize = 0x20004c;

    const OUTPUTS: Outputs = Outputs {
        a: Output {
            pin: Pin::new(4),
            guard: Some(Pin::new(0)),
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

    /// Pin of a line.
    fn pin(line: Line) -> u32 {
        match line {
            Line::A => 4,
            Line::B => 12,
            Line::C => 16,
        }
    }

    /// Simulated observable action.
    #[derive(Debug, PartialEq, Eq)]
    enum Action {
        Set(u32),
        Clear(u32),
        Dwell(u32),
        Poll,
    }

    fn run_step(state: u32) -> (FakeBoard, String) {
        let board = FakeBoard::new();
        board.preload(GPREN0, 1);
        let state = EventState::new(state);
        let console = {
            let mut dispatcher = Dispatcher::new(
                Gpio::new(&board, &board),
                &board,
                OUTPUTS,
                &state,
                String::new(),
            );
            dispatcher.step();
            dispatcher.into_console()
        };
        (board, console)
    }

    fn actions(board: &FakeBoard) -> Vec<Action> {
        board
            .ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Write(GPSET0, mask) => Some(Action::Set(mask.trailing_zeros())),
                Op::Write(GPCLR0, mask) => Some(Action::Clear(mask.trailing_zeros())),
                Op::DelayUs(us) => Some(Action::Dwell(us)),
                Op::Spin(POLL_CYCLES) => Some(Action::Poll),
                _ => None,
            })
            .collect()
    }

    fn expected(phases: &[Phase]) -> Vec<Action> {
        let mut actions = Vec::new();
        for phase in phases {
            actions.push(Action::Set(pin(phase.assert)));
            for line in phase.clear {
                actions.push(Action::Clear(pin(line)));
            }
            actions.push(Action::Dwell(phase.dwell_us));
        }
        actions.push(Action::Poll);
        actions
    }

    #[test]
    fn phases_are_mutually_exclusive() {
        for phase in SLOW.iter().chain(FAST.iter()) {
            assert!(!phase.clear.contains(&phase.assert));
            assert_ne!(phase.clear[0], phase.clear[1]);
        }
    }

    #[test]
    fn slow_pattern() {
        let (board, console) = run_step(0);

        let order: Vec<Line> = SLOW.iter().map(|p| p.assert).collect();
        assert_eq!(order, [Line::C, Line::B, Line::A]);
        assert!(SLOW.iter().all(|p| p.dwell_us == 500_000));
        assert_eq!(actions(&board), expected(&SLOW));
        assert_eq!(console, "pattern: slow\n");
    }

    #[test]
    fn fast_pattern() {
        let (board, console) = run_step(1);

        let order: Vec<Line> = FAST.iter().map(|p| p.assert).collect();
        assert_eq!(order, [Line::A, Line::B, Line::C]);
        assert!(FAST.iter().all(|p| p.dwell_us == 250_000));
        assert_eq!(actions(&board), expected(&FAST));
        assert_eq!(console, "pattern: fast\n");
    }

    #[test]
    fn unknown_state_only_polls() {
        for state in [2, 3, 0xffff_ffff] {
            let (board, console) = run_step(state);
            assert_eq!(board.ops(), [Op::Spin(POLL_CYCLES)]);
            assert!(console.is_empty());
        }
    }

    #[test]
    fn guard_wraps_line_a() {
        let (board, _) = run_step(1);

        let writes = board.writes();
        assert_eq!(&writes[..3], [(GPREN0, 0), (GPSET0, 1 << 4), (GPREN0, 1)]);
        assert_eq!(board.reg(GPREN0), 1);
    }
}
