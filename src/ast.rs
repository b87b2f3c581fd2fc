//! Components relating to the instructions of the machine.
//!
//! These components together are used to construct [`sim::SimInstr`]
//! (a data structure holding a decoded instruction word), which both the assembler
//! and the simulator use to translate between instructions and memory cells.

pub mod sim;

/// An instruction mnemonic.
///
/// The mnemonics are listed in their encoding order.
/// `CPA` through `BRZ` form the "operand family", whose encoding bases
/// are offset by their index in that family (see [`Opcode::family_index`]).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum Opcode {
    /// Halt execution.
    HLT,
    /// Increment the addressed cell.
    INC,
    /// Decrement the addressed cell.
    DEC,
    /// Copy the operand into the accumulator.
    CPA,
    /// Store the accumulator into the addressed cell.
    STO,
    /// Add the operand to the accumulator.
    ADD,
    /// Subtract the operand from the accumulator.
    SUB,
    /// Branch unconditionally.
    BRA,
    /// Branch if the accumulator is negative.
    BRN,
    /// Multiply the accumulator by the operand.
    MUL,
    /// Branch if the accumulator is zero.
    BRZ,
}
impl Opcode {
    /// All opcodes, in encoding order.
    pub const ALL: [Opcode; 11] = [
        Opcode::HLT, Opcode::INC, Opcode::DEC,
        Opcode::CPA, Opcode::STO, Opcode::ADD, Opcode::SUB,
        Opcode::BRA, Opcode::BRN, Opcode::MUL, Opcode::BRZ,
    ];

    /// The index of this opcode in the operand family (`CPA` = 0, ..., `BRZ` = 7).
    ///
    /// `HLT`, `INC`, and `DEC` are not part of the family.
    pub fn family_index(self) -> Option<i32> {
        match self {
            Opcode::HLT | Opcode::INC | Opcode::DEC => None,
            op => Some(op as i32 - Opcode::CPA as i32),
        }
    }

    /// Whether this opcode takes an operand.
    pub fn has_operand(self) -> bool {
        self != Opcode::HLT
    }

    /// Whether this opcode treats its operand as an address to jump to.
    pub fn is_branch(self) -> bool {
        matches!(self, Opcode::BRA | Opcode::BRN | Opcode::BRZ)
    }
}
impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
impl std::str::FromStr for Opcode {
    type Err = ();

    /// Parses a mnemonic (case-insensitively).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        Opcode::ALL.into_iter()
            .find(|op| op.to_string() == upper)
            .ok_or(())
    }
}

/// The addressing mode of an operand.
///
/// ```text
/// CPA $5    ; Immediate: ACU = 5
/// CPA 5     ; Direct:    ACU = mem[5]
/// CPA [5]   ; Indirect:  ACU = mem[mem[5]]
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AddrMode {
    /// The operand is a literal value (written with `$`).
    Immediate,
    /// The operand is the address of a cell holding the target address (written with `[...]`).
    Indirect,
    /// The operand is the address of the target cell.
    Direct,
}
impl AddrMode {
    /// All addressing modes.
    pub const ALL: [AddrMode; 3] = [AddrMode::Immediate, AddrMode::Indirect, AddrMode::Direct];
}

/// An operand: an addressing mode together with its magnitude.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Operand {
    /// How the value is interpreted.
    pub mode: AddrMode,
    /// The literal value or address.
    pub value: i32,
}
impl Operand {
    /// Creates an immediate operand.
    pub fn imm(value: i32) -> Self {
        Self { mode: AddrMode::Immediate, value }
    }
    /// Creates an indirect operand.
    pub fn ind(value: i32) -> Self {
        Self { mode: AddrMode::Indirect, value }
    }
    /// Creates a direct operand.
    pub fn dir(value: i32) -> Self {
        Self { mode: AddrMode::Direct, value }
    }
}
impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            AddrMode::Immediate => write!(f, "${}", self.value),
            AddrMode::Indirect  => write!(f, "[{}]", self.value),
            AddrMode::Direct    => write!(f, "{}", self.value),
        }
    }
}

/// How many cells an instruction occupies.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Width {
    /// The operand is packed into the instruction word (1 cell).
    Packed,
    /// The instruction word is a marker and the operand is in the next cell (2 cells).
    Wide,
}
impl Width {
    /// The number of cells this width takes up.
    pub fn cells(self) -> usize {
        match self {
            Width::Packed => 1,
            Width::Wide   => 2,
        }
    }
}
