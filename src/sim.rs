//! Simulating and execution for assembled code.
//!
//! This module is focused on executing fully assembled code (i.e., [`ObjectFile`]).
//!
//! This module consists of:
//! - [`Simulator`]: The struct that simulates assembled code.
//! - [`mem`]: The module handling memory and the register file.
//! - [`debug`]: The module handling types of breakpoints for the simulator.
//! - [`observer`]: The module handling change tracking and change events.
//!
//! # Usage
//!
//! To simulate some code, you need to instantiate a Simulator and load an object file to it:
//!
//! ```no_run
//! use acu_ensemble::sim::Simulator;
//!
//! # let obj_file = panic!("don't actually make an object file");
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_obj_file(&obj_file).unwrap();
//! simulator.run().unwrap();
//! ```
//!
//! ## Flags
//!
//! Here, we define `simulator` to have the default flags.
//! We could also configure the simulator by editing the flags. For example,
//! if we wish to have more memory, we can edit the flags like so:
//!
//! ```
//! # use acu_ensemble::sim::{Simulator, SimFlags};
//! let simulator = Simulator::new(SimFlags { capacity: 5000, ..Default::default() });
//! assert_eq!(simulator.mem.len(), 5000);
//! ```
//!
//! All of the available flags can be found in [`SimFlags`].
//!
//! ## Execution
//!
//! Beyond the basic [`Simulator::run`] (which runs until halting),
//! there are also:
//! - [`Simulator::step_in`]: manual step-by-step simulation
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: more advanced programmatic execution
//!
//! ```
//! use acu_ensemble::asm::assemble;
//! use acu_ensemble::sim::{Simulator, SimState};
//!
//! let src = "
//!     .code 0
//!     CPA $1
//!     ADD $1
//!     ADD $1
//!     HLT
//! ";
//! let obj_file = assemble(src).unwrap();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_obj_file(&obj_file).unwrap();
//! assert_eq!(sim.state(), &SimState::Ready);
//!
//! // Running step by step:
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file.acu, 1);
//! assert_eq!(sim.state(), &SimState::Running);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file.acu, 2);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file.acu, 3);
//! sim.step_in().unwrap();
//! assert_eq!(sim.state(), &SimState::Halted);
//! ```
//!
//! ## Querying State
//!
//! - The instruction pointer is the `sim.pc` field.
//! - The register file is the `sim.reg_file` field.
//! - The memory is the `sim.mem` field. Direct edits to memory are not tracked by the observer.
//! - The execution state is available through [`Simulator::state`].
//! - The labels of the loaded object file are available through [`Simulator::labels`].
//!
//! ## Debugging with breakpoints
//!
//! Breakpoints are accessible through the `breakpoints` field on [`Simulator`].
//!
//! To add a `breakpoint`, simply insert a [`Breakpoint`] and
//! it will break if its condition is met during all execution functions (except [`Simulator::step_in`]).
//!
//! ```
//! use acu_ensemble::asm::assemble;
//! use acu_ensemble::sim::Simulator;
//! use acu_ensemble::sim::debug::Breakpoint;
//!
//! let src = "
//!     .code 0
//!     CPA $0
//!     ADD $1
//!     ADD $2
//!     ADD $3
//!     HLT
//! ";
//! let obj_file = assemble(src).unwrap();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_obj_file(&obj_file).unwrap();
//!
//! // Without breakpoint
//! sim.run().unwrap();
//! assert_eq!(sim.pc, 4);
//!
//! // With breakpoint
//! sim.rewind();
//! sim.breakpoints.insert(Breakpoint::PC(2));
//! sim.run().unwrap();
//! assert!(sim.hit_breakpoint());
//! assert_eq!(sim.pc, 2);
//! ```
//!
//! ## Observing changes
//!
//! Every change made by execution is recorded by the `observer` field and
//! sent as a [`SimEvent`] to each receiver created with [`Simulator::subscribe`].
//!
//! ```
//! use acu_ensemble::asm::assemble;
//! use acu_ensemble::sim::Simulator;
//! use acu_ensemble::sim::observer::SimEvent;
//!
//! let obj_file = assemble("CPA $4\nSTO 50\nHLT").unwrap();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_obj_file(&obj_file).unwrap();
//! let events = sim.subscribe();
//!
//! sim.run().unwrap();
//! assert!(sim.observer.mem_changed(50));
//! assert_eq!(events.try_recv(), Ok(SimEvent::MemoryChanged(vec![50])));
//! assert_eq!(events.try_recv(), Ok(SimEvent::RegistersChanged { acu: 4, pc: 2 }));
//! ```
//!
//! [`Breakpoint`]: self::debug::Breakpoint
//! [`SimEvent`]: self::observer::SimEvent
pub mod mem;
pub mod debug;
pub mod observer;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::asm::{ObjectFile, SymbolTable};
use crate::ast::sim::SimInstr;
use crate::ast::{AddrMode, Opcode, Operand};
use debug::Breakpoint;
use observer::{ChangeObserver, SimEvent};

use self::mem::{MachineInitStrategy, MemArray, RegFile};

/// Errors that can occur during simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimErr {
    /// The instruction pointer or an operand address fell outside of memory.
    OutOfRange(i64),
    /// The cell at the instruction pointer does not hold a valid instruction.
    UnrecognizedEncoding(i32),
}
impl SimErr {
    pub(crate) fn out_of_range(addr: usize) -> Self {
        SimErr::OutOfRange(i64::try_from(addr).unwrap_or(i64::MAX))
    }
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::OutOfRange(addr)           => write!(f, "address {addr} is outside of memory"),
            SimErr::UnrecognizedEncoding(word) => write!(f, "cell value {word} is not a valid instruction"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn line(&self) -> Option<usize> {
        None
    }

    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            SimErr::OutOfRange(_) => Some("increase the memory capacity or check for a missing HLT".into()),
            SimErr::UnrecognizedEncoding(_) => Some("execution may have run into data; check for a missing HLT or a bad branch target".into()),
        }
    }
}

/// Anything that can cause a step to abruptly fail to finish.
enum StepBreak {
    /// A halt was executed.
    Halt,
    /// A simulation error occurred.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(value: SimErr) -> Self {
        Self::Err(value)
    }
}

/// The execution state of the simulator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SimState {
    /// No instruction has run since the last load, rewind, or reset.
    #[default]
    Ready,
    /// At least one instruction has run and the program has not ended.
    Running,
    /// The program executed `HLT`.
    Halted,
    /// The program hit an error and cannot continue.
    Faulted(SimErr),
}

/// Reason for why execution paused if it wasn't due to an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
enum PauseCondition {
    /// Program reached a halt.
    Halt,
    /// Execution was stopped through a [`StopHandle`].
    Stopped,
    /// Program hit a breakpoint.
    Breakpoint,
    /// Program hit a tripwire condition.
    Tripwire,
    /// Program hit an error and did not pause successfully.
    #[default]
    Unsuccessful
}

/// A handle that can stop a running simulator from another thread.
///
/// ```
/// use acu_ensemble::asm::assemble;
/// use acu_ensemble::sim::Simulator;
///
/// let obj_file = assemble("LOOP: BRA LOOP").unwrap();
/// let mut sim = Simulator::new(Default::default());
/// sim.load_obj_file(&obj_file).unwrap();
///
/// let handle = sim.stop_handle();
/// let stopper = std::thread::spawn(move || {
///     while !handle.is_running() { std::thread::yield_now(); }
///     handle.stop();
/// });
///
/// sim.run().unwrap();
/// stopper.join().unwrap();
/// assert!(!sim.hit_halt());
/// ```
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);
impl StopHandle {
    /// Stops the simulator (if it is running).
    pub fn stop(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Whether the simulator is currently in one of its run functions.
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Configuration flags for [`Simulator`].
///
/// These can be modified after the `Simulator` is created with [`Simulator::new`]
/// and their effects apply on the next [`Simulator::reset`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The number of memory cells.
    ///
    /// By default, this flag is `1000`.
    pub capacity: usize,

    /// The creation strategy for memory cells not written by a program.
    ///
    /// By default, this flag is [`MachineInitStrategy::default`].
    pub machine_init: MachineInitStrategy,
}

impl Default for SimFlags {
    fn default() -> Self {
        Self {
            capacity: 1000,
            machine_init: Default::default(),
        }
    }
}

/// Executes assembled code.
#[derive(Debug)]
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// The simulator's memory.
    pub mem: MemArray,

    /// The simulator's register file.
    pub reg_file: RegFile,

    /// The instruction pointer.
    pub pc: usize,

    /// The current execution state.
    state: SimState,

    /// The cell execution starts at.
    start: usize,

    /// Labels and line mappings of the loaded object file.
    sym: SymbolTable,

    /// The number of instructions successfully run since the last load, rewind, or reset.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// Indicates the reason why the last execution (via [`Simulator::run_while`] and adjacent)
    /// had paused.
    pause_condition: PauseCondition,

    /// Tracks changes in simulator state.
    pub observer: ChangeObserver,

    // ------------------ CONFIG/DEBUG STATE ------------------
    // Calling [`Simulator::reset`] does not reset these values.

    /// Set while a run function is executing. Clearing it stops execution.
    running: Arc<AtomicBool>,

    /// Configuration settings for the simulator.
    ///
    /// These are preserved between resets.
    ///
    /// See [`SimFlags`] for more details on what configuration
    /// settings are available.
    pub flags: SimFlags,

    /// Breakpoints for the simulator.
    pub breakpoints: HashSet<Breakpoint>,
}
impl Simulator where Simulator: Send + Sync {}

impl Simulator {
    /// Creates a new simulator with the provided flags, without a loaded object file.
    pub fn new(flags: SimFlags) -> Self {
        let mut filler = flags.machine_init.generator();

        Self {
            mem: MemArray::new(flags.capacity, &mut filler),
            reg_file: RegFile::new(),
            pc: 0,
            state: SimState::Ready,
            start: 0,
            sym: SymbolTable::default(),
            instructions_run: 0,
            pause_condition: Default::default(),
            observer: Default::default(),

            running: Arc::default(),
            flags,
            breakpoints: Default::default(),
        }
    }

    /// Resets the simulator.
    ///
    /// This refills memory (using the current flags), clears the registers and labels,
    /// and returns the simulator to [`SimState::Ready`].
    ///
    /// Note that this function preserves:
    /// - Flags
    /// - Breakpoints
    /// - Subscribers to change events
    /// - Stop handles (i.e., anything with a [`StopHandle`] can still control the simulator)
    ///
    /// This also does not reload object files. Any object file data has to be reloaded into the Simulator.
    pub fn reset(&mut self) {
        let running = Arc::clone(&self.running);
        let flags = self.flags;
        let breakpoints = std::mem::take(&mut self.breakpoints);
        let mut observer = std::mem::take(&mut self.observer);

        *self = Simulator::new(flags);
        self.running = running;
        self.breakpoints = breakpoints;

        observer.clear();
        observer.notify(SimEvent::MemoryChanged((0..self.mem.len()).collect()));
        observer.notify(SimEvent::RegistersChanged { acu: self.reg_file.acu, pc: self.pc });
        observer.notify(SimEvent::LabelsChanged);
        self.observer = observer;

        log::debug!("simulator reset with {} cells", self.mem.len());
    }

    /// Returns the simulator to the start of the program.
    ///
    /// The registers are cleared, the instruction pointer is moved to the start cell,
    /// and the simulator returns to [`SimState::Ready`]. Memory is left as is.
    pub fn rewind(&mut self) {
        self.reg_file = RegFile::new();
        self.pc = self.start;
        self.state = SimState::Ready;
        self.instructions_run = 0;
        self.pause_condition = Default::default();

        self.observer.clear();
        self.observer.notify(SimEvent::RegistersChanged { acu: self.reg_file.acu, pc: self.pc });
    }

    /// Clears the register file, leaving the instruction pointer and memory as is.
    pub fn reset_registers(&mut self) {
        self.reg_file = RegFile::new();
        self.observer.notify(SimEvent::RegistersChanged { acu: self.reg_file.acu, pc: self.pc });
    }

    /// Loads an object file into this simulator.
    ///
    /// This writes the object file's cells into memory, sets the start cell and labels,
    /// and rewinds the simulator to the start cell.
    ///
    /// If any cell lies outside of memory, this fails without writing anything.
    pub fn load_obj_file(&mut self, obj: &ObjectFile) -> Result<(), SimErr> {
        if obj.extent() > self.mem.len() {
            return Err(SimErr::out_of_range(obj.extent() - 1));
        }

        let mut changed = vec![];
        for (addr, value) in obj.addr_iter() {
            if self.mem.write(addr, value)? {
                changed.push(addr);
            }
        }
        self.start = obj.start_cell();
        self.sym = obj.symbol_table().clone();
        log::debug!(
            "loaded object file ({} cells, start = {})",
            obj.addr_iter().count(), self.start
        );

        self.rewind();
        if !changed.is_empty() {
            self.observer.notify(SimEvent::MemoryChanged(changed));
        }
        self.observer.notify(SimEvent::LabelsChanged);
        Ok(())
    }

    /// Sets the first cells of memory to the given values.
    ///
    /// Cells past the end of `cells` are left unchanged.
    /// If `cells` is longer than memory, this fails without writing anything.
    ///
    /// ```
    /// use acu_ensemble::sim::Simulator;
    ///
    /// let mut sim = Simulator::new(Default::default());
    /// sim.set_memory(&[9115, 9133, 0]).unwrap();
    /// sim.run().unwrap();
    /// assert_eq!(sim.reg_file.acu, 8);
    /// ```
    pub fn set_memory(&mut self, cells: &[i32]) -> Result<(), SimErr> {
        if cells.len() > self.mem.len() {
            return Err(SimErr::out_of_range(cells.len() - 1));
        }

        let mut changed = vec![];
        for (addr, &value) in cells.iter().enumerate() {
            if self.mem.write(addr, value)? {
                changed.push(addr);
            }
        }
        if !changed.is_empty() {
            self.observer.notify(SimEvent::MemoryChanged(changed));
        }
        Ok(())
    }

    /// Changes the number of memory cells.
    ///
    /// Cells within the new capacity keep their values.
    /// New cells are filled according to [`SimFlags::machine_init`], and
    /// the capacity flag is updated so that resets keep the new capacity.
    pub fn resize_mem(&mut self, capacity: usize) {
        let old_len = self.mem.len();
        self.mem.resize(capacity, &mut self.flags.machine_init.generator());
        self.flags.capacity = capacity;
        log::debug!("memory resized from {old_len} to {capacity} cells");

        if capacity > old_len {
            self.observer.notify(SimEvent::MemoryChanged((old_len..capacity).collect()));
        }
    }

    /// Sets the start cell to the cell the given (1-based) source line was assembled at,
    /// then rewinds to it.
    ///
    /// This returns the new start cell, or `None` (leaving the simulator unchanged)
    /// if the line was not assembled to any cell.
    pub fn set_start_line(&mut self, line: usize) -> Option<usize> {
        let addr = self.sym.lookup_line(line)?;
        self.start = addr;
        self.rewind();
        Some(addr)
    }

    /// The cell execution starts at.
    pub fn start_cell(&self) -> usize {
        self.start
    }

    /// The source line of the instruction at the instruction pointer (if it is known).
    pub fn current_line(&self) -> Option<usize> {
        self.sym.rev_lookup_line(self.pc)
    }

    /// Gets the symbol table of the loaded object file.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.sym
    }

    /// Gets the labels of the loaded object file and their cells, sorted by label.
    pub fn labels(&self) -> impl Iterator<Item=(&str, usize)> + '_ {
        self.sym.label_iter()
    }

    /// The current execution state.
    pub fn state(&self) -> &SimState {
        &self.state
    }

    /// Creates a receiver for change events.
    pub fn subscribe(&mut self) -> Receiver<SimEvent> {
        self.observer.subscribe()
    }

    /// Creates a handle which can stop execution (e.g., from another thread).
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.running))
    }

    /// Indicates whether the last execution of the simulator hit a breakpoint.
    pub fn hit_breakpoint(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Breakpoint)
    }

    /// Indicates whether the last execution of the simulator resulted in a HLT successfully occurring.
    pub fn hit_halt(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Halt)
    }

    /// Converts an operand value to an address, erroring if it lies outside of memory.
    fn addr(&self, value: i32) -> Result<usize, SimErr> {
        usize::try_from(value).ok()
            .filter(|&addr| addr < self.mem.len())
            .ok_or(SimErr::OutOfRange(value.into()))
    }

    /// Computes the address an operand refers to.
    ///
    /// Immediate operands refer to the address equal to their literal.
    fn operand_addr(&self, operand: Operand) -> Result<usize, SimErr> {
        match operand.mode {
            AddrMode::Immediate | AddrMode::Direct => self.addr(operand.value),
            AddrMode::Indirect => {
                let ptr = self.mem.read(self.addr(operand.value)?)?;
                self.addr(ptr)
            },
        }
    }

    /// Computes the value an operand refers to.
    fn operand_value(&self, operand: Operand) -> Result<i32, SimErr> {
        match operand.mode {
            AddrMode::Immediate => Ok(operand.value),
            AddrMode::Indirect | AddrMode::Direct => self.mem.read(self.operand_addr(operand)?),
        }
    }

    /// Writes to memory, recording the change.
    fn write_mem(&mut self, addr: usize, value: i32) -> Result<(), SimErr> {
        if self.mem.write(addr, value)? {
            self.observer.set_mem_changed(addr);
        }
        Ok(())
    }

    /// Runs until the tripwire condition returns false (or any of the typical breaks occur).
    ///
    /// The typical break conditions are:
    /// - `HLT` is executed
    /// - a [`StopHandle`] was used to stop execution
    /// - A breakpoint matches
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator) -> bool) -> Result<(), SimErr> {
        self.observer.clear();
        std::mem::take(&mut self.pause_condition);
        self.running.store(true, Ordering::Relaxed);

        // event loop
        // run until:
        // 1. execution is stopped
        // 2. the tripwire condition returns false
        // 3. any of the breakpoints are hit
        let result = loop {
            // Stopped externally:
            if !self.running.load(Ordering::Relaxed) {
                break Ok(PauseCondition::Stopped);
            }
            // Tripwire turned off:
            if !tripwire(self) {
                break Ok(PauseCondition::Tripwire);
            }

            // Run a step:
            match self.step() {
                Ok(_) => {},
                Err(StepBreak::Halt) => break Ok(PauseCondition::Halt),
                Err(StepBreak::Err(e)) => break Err(e)
            }

            // After executing, check that any breakpoints were hit.
            if self.breakpoints.iter().any(|bp| bp.check(self)) {
                break Ok(PauseCondition::Breakpoint);
            }
        };

        self.running.store(false, Ordering::Relaxed);
        self.observer.publish(self.reg_file.acu, self.pc);
        self.pause_condition = result?;
        Ok(())
    }

    /// Execute the program.
    ///
    /// This blocks until the program ends.
    /// If you would like to limit the maximum number of steps to execute, consider [`Simulator::run_with_limit`].
    pub fn run(&mut self) -> Result<(), SimErr> {
        self.run_while(|_| true)
    }

    /// Execute the program with a limit on how many steps to execute.
    ///
    /// This blocks until the program ends or until the number of steps to execute has been hit.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<(), SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)
    }

    /// Executes the instruction at the instruction pointer.
    fn execute(&mut self) -> Result<(), StepBreak> {
        let word = self.mem.read(self.pc)?;
        let (instr, width) = SimInstr::decode(word, || self.mem.read(self.pc + 1))?;
        log::trace!("{:>5}: {instr} (ACU = {})", self.pc, self.reg_file.acu);

        let acu = self.reg_file.acu;
        let mut next_pc = self.pc + width.cells();
        match (instr.op, instr.operand) {
            (Opcode::HLT, _) | (_, None) => {
                // HLT keeps the instruction pointer on itself.
                self.instructions_run = self.instructions_run.wrapping_add(1);
                return Err(StepBreak::Halt);
            },
            (Opcode::INC, Some(operand)) => {
                let addr = self.operand_addr(operand)?;
                let value = self.mem.read(addr)?;
                self.write_mem(addr, value.wrapping_add(1))?;
            },
            (Opcode::DEC, Some(operand)) => {
                let addr = self.operand_addr(operand)?;
                let value = self.mem.read(addr)?;
                self.write_mem(addr, value.wrapping_sub(1))?;
            },
            (Opcode::CPA, Some(operand)) => self.reg_file.acu = self.operand_value(operand)?,
            (Opcode::STO, Some(operand)) => {
                let addr = self.operand_addr(operand)?;
                self.write_mem(addr, acu)?;
            },
            (Opcode::ADD, Some(operand)) => self.reg_file.acu = acu.wrapping_add(self.operand_value(operand)?),
            (Opcode::SUB, Some(operand)) => self.reg_file.acu = acu.wrapping_sub(self.operand_value(operand)?),
            (Opcode::MUL, Some(operand)) => self.reg_file.acu = acu.wrapping_mul(self.operand_value(operand)?),
            (Opcode::BRA, Some(operand)) => next_pc = self.operand_addr(operand)?,
            (Opcode::BRN, Some(operand)) => if acu < 0 {
                next_pc = self.operand_addr(operand)?;
            },
            (Opcode::BRZ, Some(operand)) => if acu == 0 {
                next_pc = self.operand_addr(operand)?;
            },
        }

        self.pc = next_pc;
        self.observer.set_regs_changed();
        self.instructions_run = self.instructions_run.wrapping_add(1);
        Ok(())
    }

    /// Simulate one step, executing one instruction and updating the execution state.
    ///
    /// Halted simulators stay halted, and faulted simulators raise their fault again.
    fn step(&mut self) -> Result<(), StepBreak> {
        match &self.state {
            SimState::Ready | SimState::Running => {},
            SimState::Halted => return Err(StepBreak::Halt),
            SimState::Faulted(e) => return Err(StepBreak::Err(e.clone())),
        }
        self.state = SimState::Running;

        let result = self.execute();
        match &result {
            Ok(()) => {},
            Err(StepBreak::Halt) => {
                log::debug!("halted at cell {} after {} instructions", self.pc, self.instructions_run);
                self.state = SimState::Halted;
            },
            Err(StepBreak::Err(e)) => {
                log::debug!("faulted at cell {}: {e}", self.pc);
                self.state = SimState::Faulted(e.clone());
            },
        }
        result
    }

    /// Simulate one step, executing one instruction.
    ///
    /// Stepping a halted simulator does nothing.
    pub fn step_in(&mut self) -> Result<(), SimErr> {
        self.observer.clear();
        let result = match self.step() {
            Ok(()) => Ok(()),
            Err(StepBreak::Halt) => Ok(()),
            Err(StepBreak::Err(e)) => Err(e)
        };
        self.observer.publish(self.reg_file.acu, self.pc);
        result
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::assemble;

    use super::debug::{Breakpoint, Comparator};
    use super::mem::MachineInitStrategy;
    use super::observer::SimEvent;
    use super::{SimErr, SimFlags, SimState, Simulator};

    fn load(src: &str) -> Simulator {
        let obj = assemble(src).unwrap();
        let mut sim = Simulator::new(Default::default());
        sim.load_obj_file(&obj).unwrap();
        sim
    }

    #[test]
    fn test_arithmetic() {
        for (op, expected) in [("ADD", 10), ("SUB", 4), ("MUL", 21)] {
            let mut sim = load(&format!("CPA $7\n{op} 50\nHLT\n50 3"));
            sim.run().unwrap();
            assert_eq!(sim.reg_file.acu, expected, "{op}");
        }
    }

    #[test]
    fn test_addressing_modes() {
        let src = "
            .data 40
            VAL: 12
            PTR: 40
            .code 0
            CPA $5
            ADD VAL
            ADD [PTR]
            HLT
        ";
        let mut sim = load(src);
        sim.run().unwrap();
        assert_eq!(sim.reg_file.acu, 29);
    }

    #[test]
    fn test_inc_dec_sto() {
        let src = "
            .data 20
            X: 5
            P: 20
            .code 0
            INC X
            INC [P]
            CPA X
            DEC 21
            STO [P]
            HLT
        ";
        let mut sim = load(src);
        sim.run().unwrap();
        assert_eq!(sim.reg_file.acu, 7);
        assert_eq!(sim.mem[19], 7);
        assert_eq!(sim.mem[20], 7);
        assert_eq!(sim.mem[21], 19);
    }

    #[test]
    fn test_brz() {
        // taken
        let mut sim = load("CPA $0\nBRZ 4\nHLT\nHLT\nCPA $1\nHLT");
        sim.run().unwrap();
        assert_eq!((sim.reg_file.acu, sim.pc), (1, 5));

        // not taken
        let mut sim = load("CPA $2\nBRZ 4\nHLT\nHLT\nCPA $1\nHLT");
        sim.run().unwrap();
        assert_eq!((sim.reg_file.acu, sim.pc), (2, 2));
    }

    #[test]
    fn test_brn() {
        let mut sim = load("CPA $0\nSUB $1\nBRN 5\nHLT\nHLT\nCPA $7\nHLT");
        sim.run().unwrap();
        assert_eq!((sim.reg_file.acu, sim.pc), (7, 6));

        let mut sim = load("CPA $0\nBRN 4\nHLT\nHLT\nCPA $7\nHLT");
        sim.run().unwrap();
        assert_eq!((sim.reg_file.acu, sim.pc), (0, 2));
    }

    #[test]
    fn test_halt_only() {
        let mut sim = load("HLT");
        let before = sim.mem.clone();

        assert_eq!(sim.state(), &SimState::Ready);
        sim.step_in().unwrap();
        assert_eq!(sim.state(), &SimState::Halted);
        assert_eq!(sim.instructions_run, 1);
        assert_eq!(sim.pc, 0);
        assert_eq!(sim.reg_file.acu, 0);
        assert_eq!(sim.mem, before);

        // halted stays halted
        sim.step_in().unwrap();
        assert_eq!(sim.instructions_run, 1);
        sim.run().unwrap();
        assert!(sim.hit_halt());
    }

    #[test]
    fn test_end_to_end_steps() {
        let mut sim = load(".code 0\nCPA $5\nADD $3\nHLT");
        sim.run().unwrap();
        assert_eq!(sim.reg_file.acu, 8);
        assert_eq!(sim.instructions_run, 3);
        assert_eq!(sim.state(), &SimState::Halted);
    }

    #[test]
    fn test_unrecognized_fault() {
        let mut sim = load("CPA $1");
        sim.mem[1] = 9999;
        assert_eq!(sim.run(), Err(SimErr::UnrecognizedEncoding(9999)));
        assert_eq!(sim.state(), &SimState::Faulted(SimErr::UnrecognizedEncoding(9999)));
        assert!(!sim.hit_halt());
        assert_eq!(sim.pc, 1);

        // fault is raised again
        assert_eq!(sim.step_in(), Err(SimErr::UnrecognizedEncoding(9999)));
    }

    #[test]
    fn test_out_of_range_faults() {
        // operand address out of range
        let mut sim = load("CPA 5000\nHLT");
        assert_eq!(sim.run(), Err(SimErr::OutOfRange(5000)));

        // negative operand address
        let mut sim = load("STO -3\nHLT");
        assert_eq!(sim.run(), Err(SimErr::OutOfRange(-3)));

        // pointer runs off the end of memory
        let mut sim = Simulator::new(SimFlags { capacity: 2, machine_init: MachineInitStrategy::Known { value: 9111 } });
        assert_eq!(sim.run(), Err(SimErr::OutOfRange(2)));

        // wide operand cut off by the end of memory
        let mut sim = Simulator::new(SimFlags { capacity: 1, ..Default::default() });
        sim.mem[0] = 9210;
        assert_eq!(sim.run(), Err(SimErr::OutOfRange(1)));
    }

    #[test]
    fn test_load_out_of_range() {
        let obj = assemble("CPA $1\n2000 7").unwrap();
        let mut sim = Simulator::new(Default::default());
        assert_eq!(sim.load_obj_file(&obj), Err(SimErr::OutOfRange(2000)));
        assert_eq!(sim.mem[0], 0);

        sim.resize_mem(2001);
        sim.load_obj_file(&obj).unwrap();
        assert_eq!(sim.mem[2000], 7);
    }

    #[test]
    fn test_rewind() {
        let mut sim = load(".code 3\nCPA $4\nSTO 0\nHLT");
        sim.run().unwrap();
        assert_eq!(sim.mem[0], 4);

        sim.rewind();
        assert_eq!(sim.state(), &SimState::Ready);
        assert_eq!(sim.pc, 3);
        assert_eq!(sim.reg_file.acu, 0);
        assert_eq!(sim.mem[0], 4);
    }

    #[test]
    fn test_reset_registers() {
        let mut sim = load("CPA $4\nHLT");
        sim.run().unwrap();
        sim.reset_registers();
        assert_eq!(sim.reg_file.acu, 0);
        assert_eq!(sim.pc, 1);
        assert_eq!(sim.state(), &SimState::Halted);
    }

    #[test]
    fn test_reset() {
        let mut sim = load("LOOP: CPA $4\nHLT");
        sim.breakpoints.insert(Breakpoint::PC(1));
        sim.run().unwrap();

        sim.reset();
        assert_eq!(sim.state(), &SimState::Ready);
        assert_eq!(sim.labels().count(), 0);
        assert_eq!(sim.mem[0], 0);
        assert_eq!(sim.breakpoints.len(), 1);
    }

    #[test]
    fn test_run_with_limit() {
        let mut sim = load("LOOP: INC 50\nBRA LOOP");
        sim.run_with_limit(10).unwrap();
        assert_eq!(sim.instructions_run, 10);
        assert_eq!(sim.mem[50], 5);
        assert_eq!(sim.state(), &SimState::Running);
        assert!(!sim.hit_halt());
    }

    #[test]
    fn test_breakpoints() {
        let mut sim = load("LOOP: INC 50\nCPA 50\nBRA LOOP");
        sim.breakpoints.insert(Breakpoint::Acu(Comparator::Ge(3)));
        sim.run().unwrap();
        assert!(sim.hit_breakpoint());
        assert_eq!(sim.reg_file.acu, 3);

        sim.breakpoints.clear();
        sim.breakpoints.insert(Breakpoint::Mem { addr: 50, value: Comparator::Eq(6) });
        sim.run().unwrap();
        assert!(sim.hit_breakpoint());
        assert_eq!(sim.mem[50], 6);
    }

    #[test]
    fn test_start_line() {
        let mut sim = load("CPA $1\nCPA $2\nHLT");
        assert_eq!(sim.set_start_line(2), Some(1));
        assert_eq!(sim.set_start_line(7), None);
        sim.run().unwrap();
        assert_eq!(sim.reg_file.acu, 2);
        assert_eq!(sim.current_line(), Some(3));
    }

    #[test]
    fn test_labels() {
        let sim = load("ZETA: CPA $1\nALPHA: HLT\n.data 9\nMID: 4");
        let labels: Vec<_> = sim.labels().collect();
        assert_eq!(labels, [("ALPHA", 1), ("MID", 9), ("ZETA", 0)]);
    }

    #[test]
    fn test_events() {
        let obj = assemble("CPA $3\nSTO 10\nHLT").unwrap();
        let mut sim = Simulator::new(Default::default());
        let rx = sim.subscribe();

        sim.load_obj_file(&obj).unwrap();
        assert_eq!(rx.try_recv(), Ok(SimEvent::RegistersChanged { acu: 0, pc: 0 }));
        assert_eq!(rx.try_recv(), Ok(SimEvent::MemoryChanged(vec![0, 1])));
        assert_eq!(rx.try_recv(), Ok(SimEvent::LabelsChanged));

        sim.step_in().unwrap();
        assert_eq!(rx.try_recv(), Ok(SimEvent::RegistersChanged { acu: 3, pc: 1 }));
        sim.step_in().unwrap();
        assert_eq!(rx.try_recv(), Ok(SimEvent::MemoryChanged(vec![10])));
        assert_eq!(rx.try_recv(), Ok(SimEvent::RegistersChanged { acu: 3, pc: 2 }));

        // halting changes nothing
        sim.step_in().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
