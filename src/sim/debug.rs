//! Breakpoints that pause a running [`Simulator`].
//!
//! Breakpoints live in the simulator's `breakpoints` set. After each instruction
//! executed by one of the run functions ([`Simulator::run`], [`Simulator::run_while`],
//! [`Simulator::run_with_limit`]), every breakpoint is checked against the machine
//! and execution pauses if any of them holds. [`Simulator::step_in`] ignores them.
use std::fmt;

use super::Simulator;

/// A condition on the machine that pauses execution.
#[derive(PartialEq, Eq, Hash, Clone, Copy)]
pub enum Breakpoint {
    /// The instruction pointer is at this cell.
    PC(usize),

    /// The accumulator satisfies the comparison.
    Acu(Comparator),

    /// A memory cell satisfies the comparison.
    ///
    /// A cell outside of memory never matches.
    Mem {
        /// The cell to check.
        addr: usize,
        /// The comparison the cell's value is checked with.
        value: Comparator
    },
}

impl Breakpoint {
    /// Checks whether this breakpoint holds for the simulator's current state.
    pub fn check(&self, sim: &Simulator) -> bool {
        match *self {
            Breakpoint::PC(cell) => sim.pc == cell,
            Breakpoint::Acu(cmp) => cmp.check(sim.reg_file.acu),
            Breakpoint::Mem { addr, value } => sim.mem.read(addr).is_ok_and(|v| value.check(v)),
        }
    }
}
impl fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breakpoint::PC(cell) => write!(f, "Breakpoint(PC == {cell})"),
            Breakpoint::Acu(cmp) => write!(f, "Breakpoint(ACU {cmp})"),
            Breakpoint::Mem { addr, value } => write!(f, "Breakpoint(mem[{addr}] {value})"),
        }
    }
}

/// A comparison of the checked value (the accumulator or a memory cell) against a fixed bound.
///
/// For example, `Comparator::Lt(0)` holds whenever the checked value is negative.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum Comparator {
    /// Never holds.
    Never,
    /// Holds if the checked value is less than the bound.
    Lt(i32),
    /// Holds if the checked value equals the bound.
    Eq(i32),
    /// Holds if the checked value is at most the bound.
    Le(i32),
    /// Holds if the checked value is greater than the bound.
    Gt(i32),
    /// Holds if the checked value differs from the bound.
    Ne(i32),
    /// Holds if the checked value is at least the bound.
    Ge(i32),
    /// Always holds.
    Always
}
impl Comparator {
    /// Checks whether `value` satisfies this comparison.
    pub fn check(self, value: i32) -> bool {
        match self {
            Comparator::Never     => false,
            Comparator::Always    => true,
            Comparator::Lt(bound) => value < bound,
            Comparator::Eq(bound) => value == bound,
            Comparator::Le(bound) => value <= bound,
            Comparator::Gt(bound) => value > bound,
            Comparator::Ne(bound) => value != bound,
            Comparator::Ge(bound) => value >= bound,
        }
    }
}
impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (symbol, bound) = match *self {
            Comparator::Never  => return f.write_str("never"),
            Comparator::Always => return f.write_str("always"),
            Comparator::Lt(b) => ("<", b),
            Comparator::Eq(b) => ("==", b),
            Comparator::Le(b) => ("<=", b),
            Comparator::Gt(b) => (">", b),
            Comparator::Ne(b) => ("!=", b),
            Comparator::Ge(b) => (">=", b),
        };
        write!(f, "{symbol} {bound}")
    }
}
