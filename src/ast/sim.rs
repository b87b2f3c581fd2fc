//! Instruction words and the table that packs them into memory cells.
//!
//! Every instruction word is a decimal number whose magnitude determines
//! the instruction, its addressing mode, and (if it fits) its operand.
//! The full table is:
//!
//! | instruction | mode      | packed (1 cell)          | wide marker (2 cells) |
//! |-------------|-----------|--------------------------|-----------------------|
//! | `HLT`       | -         | `0`                      | -                     |
//! | `INC`       | direct    | `100 + v` (v < 100)      | `9000`                |
//! | `DEC`       | direct    | `200 + v` (v < 100)      | `9090`                |
//! | `INC`       | indirect  | `9300 + v` (v < 10)      | `9400`                |
//! | `DEC`       | indirect  | `9390 + v` (v < 10)      | `9490`                |
//! | family `i`  | immediate | `9110 + 10i + v` (v < 10)| `9210 + 10i`          |
//! | family `i`  | indirect  | `9310 + 10i + v` (v < 10)| `9410 + 10i`          |
//! | family `i`  | direct    | `1000(i + 1) + v` (v < 1000) | `9010 + 10i`      |
//!
//! where the family is `CPA, STO, ADD, SUB, BRA, BRN, MUL, BRZ` (`i` = 0..7).
//!
//! After a wide marker, the following cell holds the raw operand.
//!
//! Both [`SimInstr::encode`] and [`SimInstr::decode`] read from the same table,
//! so that one is always the inverse of the other.

use std::sync::OnceLock;

use crate::asm::AsmErrKind;
use crate::sim::SimErr;

use super::{AddrMode, Opcode, Operand, Width};

/// A single row of the encoding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Format {
    op: Opcode,
    /// `None` only for `HLT`.
    mode: Option<AddrMode>,
    width: Width,
    base: i32,
    /// Packed operands must be in `0..limit`. Unused for wide formats.
    limit: i32,
}
impl Format {
    /// Checks if a word falls in this row, and if so,
    /// computes the operand packed in the word (0 for markers).
    fn matches(&self, word: i32) -> Option<i32> {
        match self.width {
            Width::Packed => (self.base..self.base + self.limit).contains(&word).then(|| word - self.base),
            Width::Wide   => (word == self.base).then_some(0),
        }
    }
}

fn format_table() -> &'static [Format] {
    static TABLE: OnceLock<Vec<Format>> = OnceLock::new();

    TABLE.get_or_init(|| {
        use AddrMode::*;
        use Width::*;

        let row = |op, mode, width, base, limit| Format { op, mode: Some(mode), width, base, limit };
        let mut table = vec![
            Format { op: Opcode::HLT, mode: None, width: Packed, base: 0, limit: 1 }
        ];

        // INC/DEC, DEC sits 90 above INC:
        for (d, op) in [Opcode::INC, Opcode::DEC].into_iter().enumerate() {
            let d = d as i32;
            table.extend([
                row(op, Indirect, Packed, 9300 + 90 * d, 10),
                row(op, Indirect, Wide,   9400 + 90 * d, 0),
                row(op, Direct,   Packed, 100 + 100 * d, 100),
                row(op, Direct,   Wide,   9000 + 90 * d, 0),
            ]);
        }

        for op in Opcode::ALL {
            let Some(i) = op.family_index() else { continue };
            table.extend([
                row(op, Immediate, Packed, 9110 + 10 * i, 10),
                row(op, Immediate, Wide,   9210 + 10 * i, 0),
                row(op, Indirect,  Packed, 9310 + 10 * i, 10),
                row(op, Indirect,  Wide,   9410 + 10 * i, 0),
                row(op, Direct,    Packed, 1000 * (i + 1), 1000),
                row(op, Direct,    Wide,   9010 + 10 * i, 0),
            ]);
        }

        table
    })
}

/// The cells produced by encoding a single instruction.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct EncodedInstr {
    words: [i32; 2],
    width: Width,
}
impl EncodedInstr {
    /// The width of this instruction.
    pub fn width(&self) -> Width {
        self.width
    }
    /// The cells of this instruction (1 or 2 of them).
    pub fn words(&self) -> &[i32] {
        &self.words[..self.width.cells()]
    }
}

/// A decoded instruction.
///
/// ## Example
/// ```
/// use acu_ensemble::ast::{Opcode, Operand, Width};
/// use acu_ensemble::ast::sim::SimInstr;
///
/// let instr = SimInstr::new(Opcode::ADD, Operand::imm(3));
/// let enc = instr.encode().unwrap();
/// assert_eq!(enc.words(), [9133]);
///
/// let (dec, width) = SimInstr::decode(9133, || unreachable!()).unwrap();
/// assert_eq!(dec, instr);
/// assert_eq!(width, Width::Packed);
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct SimInstr {
    /// The instruction.
    pub op: Opcode,
    /// The operand (`None` only for `HLT`).
    pub operand: Option<Operand>,
}
impl SimInstr {
    /// Creates an instruction with an operand.
    pub fn new(op: Opcode, operand: Operand) -> Self {
        Self { op, operand: Some(operand) }
    }
    /// Creates the halt instruction.
    pub fn halt() -> Self {
        Self { op: Opcode::HLT, operand: None }
    }

    /// Encodes this instruction into one or two cells.
    ///
    /// Operands within `0..limit` of their format are packed into one cell.
    /// All other operands (including negative ones) are written after a marker word.
    ///
    /// This fails if the instruction has no encoding for its addressing mode
    /// (`INC`/`DEC` with an immediate operand) or if an operand is missing.
    pub fn encode(&self) -> Result<EncodedInstr, AsmErrKind> {
        self.encode_min(Width::Packed)
    }

    /// Encodes this instruction, using the wide format even if the operand could be packed.
    ///
    /// ## Example
    /// ```
    /// use acu_ensemble::ast::{Opcode, Operand};
    /// use acu_ensemble::ast::sim::SimInstr;
    ///
    /// let enc = SimInstr::new(Opcode::INC, Operand::dir(5)).encode_wide().unwrap();
    /// assert_eq!(enc.words(), [9000, 5]);
    /// ```
    pub fn encode_wide(&self) -> Result<EncodedInstr, AsmErrKind> {
        self.encode_min(Width::Wide)
    }

    /// Encodes this instruction in at least the given width.
    fn encode_min(&self, min: Width) -> Result<EncodedInstr, AsmErrKind> {
        let table = format_table();
        let Some(operand) = self.operand else {
            return match self.op {
                Opcode::HLT => Ok(EncodedInstr { words: [halt_word(), 0], width: Width::Packed }),
                _ => Err(AsmErrKind::MissingOperand),
            };
        };

        let find = |width| table.iter()
            .find(|f| f.op == self.op && f.mode == Some(operand.mode) && f.width == width);

        let packed = find(Width::Packed).ok_or(AsmErrKind::InvalidAddressingMode)?;
        if min == Width::Packed && (0..packed.limit).contains(&operand.value) {
            return Ok(EncodedInstr { words: [packed.base + operand.value, 0], width: Width::Packed });
        }

        let wide = find(Width::Wide).ok_or(AsmErrKind::InvalidAddressingMode)?;
        Ok(EncodedInstr { words: [wide.base, operand.value], width: Width::Wide })
    }

    /// Decodes the instruction word at the start of an instruction.
    ///
    /// If the word is a wide marker, `next` is called to read the operand from the next cell.
    /// This returns the instruction and how many cells it took up.
    pub fn decode(word: i32, next: impl FnOnce() -> Result<i32, SimErr>) -> Result<(SimInstr, Width), SimErr> {
        let (fmt, packed) = format_table().iter()
            .find_map(|f| f.matches(word).map(|v| (f, v)))
            .ok_or(SimErr::UnrecognizedEncoding(word))?;

        let instr = match (fmt.mode, fmt.width) {
            (None, _) => SimInstr::halt(),
            (Some(mode), Width::Packed) => SimInstr::new(fmt.op, Operand { mode, value: packed }),
            (Some(mode), Width::Wide)   => SimInstr::new(fmt.op, Operand { mode, value: next()? }),
        };
        Ok((instr, fmt.width))
    }
}
impl std::fmt::Display for SimInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operand {
            Some(opr) => write!(f, "{} {opr}", self.op),
            None => write!(f, "{}", self.op),
        }
    }
}

/// The value stored for a halt instruction.
///
/// Cells hold plain integers, so this is the identity conversion of 0.
pub fn halt_word() -> i32 {
    0
}

#[cfg(test)]
mod tests {
    use crate::ast::{AddrMode, Opcode, Operand, Width};
    use crate::sim::SimErr;

    use super::{format_table, SimInstr};

    const BOUNDARIES: [i32; 9] = [0, 9, 10, 99, 100, 999, 1000, 43210, -7];

    fn roundtrip(instr: SimInstr) -> (SimInstr, Width) {
        let enc = instr.encode().unwrap_or_else(|e| panic!("{instr} should encode: {e}"));
        let words = enc.words();
        let result = SimInstr::decode(words[0], || words.get(1).copied().ok_or(SimErr::OutOfRange(1)))
            .unwrap_or_else(|e| panic!("{instr} should decode: {e}"));
        assert_eq!(result.1, enc.width(), "{instr} decoded with a different width");
        result
    }

    #[test]
    fn test_table_disjoint() {
        let table = format_table();
        for (i, a) in table.iter().enumerate() {
            for b in &table[i + 1..] {
                let a_end = a.base + a.limit.max(1);
                let b_end = b.base + b.limit.max(1);
                assert!(a_end <= b.base || b_end <= a.base, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_roundtrip_all() {
        for op in Opcode::ALL {
            if !op.has_operand() {
                assert_eq!(roundtrip(SimInstr::halt()).0, SimInstr::halt());
                continue;
            }
            for mode in AddrMode::ALL {
                if matches!(op, Opcode::INC | Opcode::DEC) && mode == AddrMode::Immediate {
                    continue;
                }
                for value in BOUNDARIES {
                    let instr = SimInstr::new(op, Operand { mode, value });
                    assert_eq!(roundtrip(instr).0, instr);
                }
            }
        }
    }

    #[test]
    fn test_widths() {
        let width = |op, opr| SimInstr::new(op, opr).encode().unwrap().width();

        assert_eq!(width(Opcode::CPA, Operand::imm(9)), Width::Packed);
        assert_eq!(width(Opcode::CPA, Operand::imm(10)), Width::Wide);
        assert_eq!(width(Opcode::STO, Operand::ind(9)), Width::Packed);
        assert_eq!(width(Opcode::STO, Operand::ind(10)), Width::Wide);
        assert_eq!(width(Opcode::BRZ, Operand::dir(999)), Width::Packed);
        assert_eq!(width(Opcode::BRZ, Operand::dir(1000)), Width::Wide);
        assert_eq!(width(Opcode::INC, Operand::dir(99)), Width::Packed);
        assert_eq!(width(Opcode::INC, Operand::dir(100)), Width::Wide);
        assert_eq!(width(Opcode::DEC, Operand::ind(9)), Width::Packed);
        assert_eq!(width(Opcode::DEC, Operand::ind(10)), Width::Wide);
        assert_eq!(width(Opcode::ADD, Operand::imm(-1)), Width::Wide);
    }

    #[test]
    fn test_forced_wide() {
        let instr = SimInstr::new(Opcode::BRZ, Operand::dir(7));
        let enc = instr.encode_wide().unwrap();
        assert_eq!(enc.words(), [9080, 7]);

        let (dec, width) = SimInstr::decode(9080, || Ok(7)).unwrap();
        assert_eq!((dec, width), (instr, Width::Wide));

        assert_eq!(SimInstr::halt().encode_wide().unwrap().words(), [0]);
        assert!(SimInstr::new(Opcode::INC, Operand::imm(1)).encode_wide().is_err());
    }

    #[test]
    fn test_known_words() {
        let words = |op, opr| SimInstr::new(op, opr).encode().unwrap().words().to_vec();

        assert_eq!(words(Opcode::CPA, Operand::imm(5)), [9115]);
        assert_eq!(words(Opcode::ADD, Operand::imm(3)), [9133]);
        assert_eq!(words(Opcode::ADD, Operand::imm(15)), [9230, 15]);
        assert_eq!(words(Opcode::BRZ, Operand::ind(4)), [9384]);
        assert_eq!(words(Opcode::MUL, Operand::ind(40)), [9470, 40]);
        assert_eq!(words(Opcode::STO, Operand::dir(42)), [2042]);
        assert_eq!(words(Opcode::SUB, Operand::dir(4000)), [9040, 4000]);
        assert_eq!(words(Opcode::INC, Operand::ind(3)), [9303]);
        assert_eq!(words(Opcode::DEC, Operand::ind(3)), [9393]);
        assert_eq!(words(Opcode::INC, Operand::ind(30)), [9400, 30]);
        assert_eq!(words(Opcode::DEC, Operand::ind(30)), [9490, 30]);
        assert_eq!(words(Opcode::INC, Operand::dir(42)), [142]);
        assert_eq!(words(Opcode::DEC, Operand::dir(42)), [242]);
        assert_eq!(words(Opcode::INC, Operand::dir(420)), [9000, 420]);
        assert_eq!(words(Opcode::DEC, Operand::dir(420)), [9090, 420]);
        assert_eq!(SimInstr::halt().encode().unwrap().words(), [0]);
    }

    #[test]
    fn test_invalid_forms() {
        use crate::asm::AsmErrKind;

        assert_eq!(SimInstr::new(Opcode::INC, Operand::imm(1)).encode(), Err(AsmErrKind::InvalidAddressingMode));
        assert_eq!(SimInstr::new(Opcode::DEC, Operand::imm(100)).encode(), Err(AsmErrKind::InvalidAddressingMode));
        assert_eq!(SimInstr { op: Opcode::CPA, operand: None }.encode(), Err(AsmErrKind::MissingOperand));
    }

    #[test]
    fn test_unrecognized_words() {
        for word in [1, 99, 300, 999, 9100, 9211, 9290, 9401, 9500, -1] {
            assert_eq!(
                SimInstr::decode(word, || Ok(0)),
                Err(SimErr::UnrecognizedEncoding(word)),
                "{word} should not decode"
            );
        }
    }
}
