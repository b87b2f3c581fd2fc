//! Assembling source code into object files.
//!
//! This module is used to convert source code into object files
//! that can be executed by the simulator.
//!
//! The assembler module notably consists of:
//! - [`assemble`] and [`assemble_lossy`]: The main functions which assemble source code into an object file.
//! - [`SymbolTable`]: a struct holding label addresses and the mapping of source lines to memory cells
//! - [`ObjectFile`]: a struct holding the object file, which can be loaded into the simulator and executed
//!
//! # Assembly passes
//!
//! Each pass walks every statement once, keeping a *code cursor* (where the next instruction goes)
//! and a *data cursor* (where the next data value goes). Labels are bound to cursors as they are
//! encountered, and label operands are replaced by the label's address.
//!
//! A label used before its definition is not known yet during the first pass, so passes are repeated
//! (using the label addresses from the previous pass) until every label address is stable.
//! Repeating is necessary since resolving a label can widen an instruction (e.g., a branch to a cell
//! past 999 takes two cells), which shifts every label after it.
//!
//! An instruction that takes two cells in one pass keeps taking two cells in every later pass.
//! Each pass therefore either widens another instruction or leaves every address where it was,
//! so the passes always settle.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;

use crate::ast::sim::{halt_word, SimInstr};
use crate::ast::{AddrMode, Opcode, Operand, Width};
use crate::parse::lex::parse_int;
use crate::parse::{parse_ast, Place, Stmt, StmtKind};

/// Assembles source code into an object file.
///
/// Assembly does not stop at the first error.
/// If any errors occur, all of them are returned (in line order).
/// To get the best-effort object file alongside the errors, use [`assemble_lossy`].
///
/// # Example
/// ```
/// use acu_ensemble::asm::assemble;
///
/// let src = "
///     .code 0
///     LABEL: HLT
/// ";
/// let obj_file = assemble(src).unwrap();
/// assert_eq!(obj_file.symbol_table().lookup_label("LABEL"), Some(0));
/// ```
pub fn assemble(src: &str) -> Result<ObjectFile, AsmErrList> {
    let (obj, errors) = assemble_lossy(src);
    match errors.is_empty() {
        true  => Ok(obj),
        false => Err(AsmErrList(errors)),
    }
}

/// Assembles source code into an object file, returning the object file and any errors that occurred.
///
/// Lines with errors are assembled with best-effort defaults:
/// - unknown mnemonics, invalid addressing modes, and malformed cell indices emit nothing,
/// - malformed operands are assembled as 0.
///
/// # Example
/// ```
/// use acu_ensemble::asm::{assemble_lossy, AsmErrKind};
///
/// let src = "
///     CPA $1
///     FOO 5
///     INC $2
///     ADD $2
/// ";
/// let (obj_file, errors) = assemble_lossy(src);
/// assert_eq!(obj_file.addr_iter().collect::<Vec<_>>(), [(0, 9111), (1, 9132)]);
///
/// let kinds: Vec<_> = errors.iter().map(|e| (e.line, e.kind)).collect();
/// assert_eq!(kinds, [(3, AsmErrKind::UnknownMnemonic), (4, AsmErrKind::InvalidAddressingMode)]);
/// ```
pub fn assemble_lossy(src: &str) -> (ObjectFile, Vec<AsmErr>) {
    let ast = parse_ast(src);

    let mut pass = Pass::run(&ast, BTreeMap::new(), BTreeSet::new());
    let mut n_passes = 1;

    while pass.addresses() != pass.prev {
        let (prev, wide) = (pass.addresses(), std::mem::take(&mut pass.wide));
        pass = Pass::run(&ast, prev, wide);
        n_passes += 1;
    }

    pass.errors.sort_by_key(|e| e.line);
    for err in &pass.errors {
        log::warn!("line {}: {err}", err.line);
    }
    log::debug!(
        "assembled {} cells with {} labels in {n_passes} passes ({} errors)",
        pass.writes.len(), pass.labels.len(), pass.errors.len()
    );

    let Pass { labels, lines, writes, start, errors, .. } = pass;
    let sym = SymbolTable { label_map: labels, line_map: lines };
    (ObjectFile { writes, start, sym }, errors)
}

/// Kinds of errors that can occur from assembling given assembly code.
///
/// See [`AsmErr`] for this error type with line information included.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AsmErrKind {
    /// Mnemonic does not match any instruction.
    UnknownMnemonic,
    /// The instruction does not support the operand's addressing mode (e.g., `INC $1`).
    InvalidAddressingMode,
    /// The operand is neither a number nor a known label.
    MalformedOperand,
    /// A cell index or directive argument is not a non-negative number.
    MalformedAddress,
    /// The directive is not `.data` or `.code`.
    UnknownDirective,
    /// An instruction which requires an operand was given none.
    MissingOperand,
    /// The line has more than three words.
    UnexpectedToken,
    /// A label was defined multiple times at different addresses.
    OverlappingLabels,
}
impl std::fmt::Display for AsmErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMnemonic       => f.write_str("unknown mnemonic"),
            Self::InvalidAddressingMode => f.write_str("instruction does not support this addressing mode"),
            Self::MalformedOperand      => f.write_str("operand is not a number or a known label"),
            Self::MalformedAddress      => f.write_str("expected a non-negative cell index"),
            Self::UnknownDirective      => f.write_str("unknown directive"),
            Self::MissingOperand        => f.write_str("instruction is missing an operand"),
            Self::UnexpectedToken       => f.write_str("too many words on one line"),
            Self::OverlappingLabels     => f.write_str("label was defined multiple times"),
        }
    }
}

/// Error from assembling given assembly code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErr {
    /// The kind of error.
    pub kind: AsmErrKind,
    /// The 1-based source line this error occurred on.
    pub line: usize,
}
impl AsmErr {
    /// Creates a new [`AsmErr`].
    pub fn new(kind: AsmErrKind, line: usize) -> Self {
        AsmErr { kind, line }
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for AsmErr {}
impl crate::err::Error for AsmErr {
    fn line(&self) -> Option<usize> {
        Some(self.line)
    }

    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self.kind {
            AsmErrKind::UnknownMnemonic       => Some("valid mnemonics are HLT, INC, DEC, CPA, STO, ADD, SUB, BRA, BRN, MUL, and BRZ".into()),
            AsmErrKind::InvalidAddressingMode => Some("INC and DEC can only take direct (5) or indirect ([5]) operands".into()),
            AsmErrKind::MalformedOperand      => Some("operands are decimal numbers or labels, optionally written as $n (immediate) or [n] (indirect)".into()),
            AsmErrKind::MalformedAddress      => Some("cell indices must be non-negative decimal numbers".into()),
            AsmErrKind::UnknownDirective      => Some("the available directives are .data and .code".into()),
            AsmErrKind::MissingOperand        => Some("only HLT can be written without an operand".into()),
            AsmErrKind::UnexpectedToken       => Some("a line holds at most a label or cell, a mnemonic, and an operand".into()),
            AsmErrKind::OverlappingLabels     => Some("labels must be unique within a file, try renaming one of the labels".into()),
        }
    }
}

/// All errors raised from assembling given assembly code, in line order.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErrList(Vec<AsmErr>);
impl AsmErrList {
    /// Consumes the list, returning the errors.
    pub fn into_vec(self) -> Vec<AsmErr> {
        self.0
    }
}
impl Deref for AsmErrList {
    type Target = [AsmErr];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl IntoIterator for AsmErrList {
    type Item = AsmErr;
    type IntoIter = std::vec::IntoIter<AsmErr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
impl std::fmt::Display for AsmErrList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_slice() {
            [] => f.write_str("no errors"),
            [e] => write!(f, "line {}: {e}", e.line),
            [e, rest @ ..] => write!(f, "line {}: {e} (and {} more errors)", e.line, rest.len()),
        }
    }
}
impl std::error::Error for AsmErrList {}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
struct SymbolData {
    addr: usize,
    /// The line the label was defined on.
    line: usize,
}

/// The symbol table created while assembling.
///
/// The symbol table consists of:
/// - A mapping from source code labels to memory cells.
/// - A mapping from (1-based) source code line numbers to memory cells.
///
/// | from ↓, to →   | label                             | memory cell                   | source line                      |
/// |----------------|-----------------------------------|-------------------------------|----------------------------------|
/// | label          | -                                 | [`SymbolTable::lookup_label`] | [`SymbolTable::label_line`]      |
/// | memory cell    | [`SymbolTable::rev_lookup_label`] | -                             | [`SymbolTable::rev_lookup_line`] |
/// | source line    | none                              | [`SymbolTable::lookup_line`]  | -                                |
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct SymbolTable {
    label_map: BTreeMap<String, SymbolData>,
    line_map: BTreeMap<usize, usize>,
}
impl SymbolTable {
    /// Gets the memory cell of a given label (if it exists).
    ///
    /// Labels are case-sensitive.
    ///
    /// ## Example
    /// ```
    /// use acu_ensemble::asm::assemble;
    ///
    /// let src = "
    ///     .code 0
    ///     LOOP: INC 50
    ///     BRA LOOP
    ///     .data 50
    ///     X: 0
    /// ";
    /// let obj = assemble(src).unwrap();
    /// let sym = obj.symbol_table();
    /// assert_eq!(sym.lookup_label("LOOP"), Some(0));
    /// assert_eq!(sym.lookup_label("X"), Some(50));
    /// assert_eq!(sym.lookup_label("loop"), None);
    /// ```
    pub fn lookup_label(&self, label: &str) -> Option<usize> {
        self.label_map.get(label).map(|data| data.addr)
    }

    /// Gets the label at a given memory cell (if it exists).
    ///
    /// If multiple labels share a cell, the first in name order is returned.
    pub fn rev_lookup_label(&self, addr: usize) -> Option<&str> {
        self.label_map.iter()
            .find(|(_, data)| data.addr == addr)
            .map(|(label, _)| label.as_str())
    }

    /// Gets the source line a label was defined on (if it exists).
    pub fn label_line(&self, label: &str) -> Option<usize> {
        self.label_map.get(label).map(|data| data.line)
    }

    /// Gets the memory cell of a given (1-based) source line.
    ///
    /// ## Example
    /// ```
    /// use acu_ensemble::asm::assemble;
    ///
    /// let src = "CPA $50\nSTO 20\n\nHLT";
    /// let sym = assemble(src).unwrap().symbol_table().clone();
    /// assert_eq!(sym.lookup_line(1), Some(0));
    /// assert_eq!(sym.lookup_line(2), Some(2));
    /// assert_eq!(sym.lookup_line(3), None);
    /// assert_eq!(sym.lookup_line(4), Some(3));
    /// ```
    pub fn lookup_line(&self, line: usize) -> Option<usize> {
        self.line_map.get(&line).copied()
    }

    /// Gets the source line of a given memory cell (if it exists).
    ///
    /// If multiple lines map to the cell (e.g., a lone label and the instruction after it),
    /// the last of those lines is returned.
    pub fn rev_lookup_line(&self, addr: usize) -> Option<usize> {
        self.line_map.iter()
            .rev()
            .find(|&(_, &a)| a == addr)
            .map(|(&line, _)| line)
    }

    /// Gets an iterable of the mapping from labels to memory cells, sorted by label.
    pub fn label_iter(&self) -> impl Iterator<Item=(&str, usize)> + '_ {
        self.label_map.iter()
            .map(|(label, data)| (label.as_str(), data.addr))
    }

    /// Gets an iterable of the mapping from source lines to memory cells, sorted by line.
    pub fn line_iter(&self) -> impl Iterator<Item=(usize, usize)> + '_ {
        self.line_map.iter()
            .map(|(&line, &addr)| (line, addr))
    }
}

/// An object file.
///
/// This is the final product after source code is assembled.
/// It consists of the ordered stream of memory writes, the start cell, and the symbol table.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ObjectFile {
    /// Memory writes, in the order they were assembled.
    writes: Vec<(usize, i32)>,
    /// The cell execution starts at.
    start: usize,
    /// Labels and line mappings.
    sym: SymbolTable,
}
impl ObjectFile {
    /// Creates an empty object file.
    pub fn empty() -> Self {
        Default::default()
    }

    /// Gets an iterator over the memory writes, in the order they were assembled.
    ///
    /// Later writes to the same cell overwrite earlier ones.
    pub fn write_iter(&self) -> impl Iterator<Item=(usize, i32)> + '_ {
        self.writes.iter().copied()
    }

    /// Gets an iterator over the final value of every memory cell written, in cell order.
    pub fn addr_iter(&self) -> impl Iterator<Item=(usize, i32)> {
        let cells: BTreeMap<_, _> = self.write_iter().collect();
        cells.into_iter()
    }

    /// The number of memory cells needed to hold every write in this object file.
    pub fn extent(&self) -> usize {
        self.writes.iter()
            .map(|&(addr, _)| addr + 1)
            .max()
            .unwrap_or(0)
    }

    /// The cell execution starts at (set by `.code`, 0 by default).
    pub fn start_cell(&self) -> usize {
        self.start
    }

    /// Gets the symbol table of the object file.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.sym
    }
}

/// The state of a single assembly pass.
struct Pass {
    /// Label addresses from the previous pass.
    prev: BTreeMap<String, usize>,
    /// Lines whose instruction took two cells in this or an earlier pass.
    wide: BTreeSet<usize>,

    labels: BTreeMap<String, SymbolData>,
    lines: BTreeMap<usize, usize>,
    writes: Vec<(usize, i32)>,
    errors: Vec<AsmErr>,

    code: usize,
    data: usize,
    start: usize,
}
impl Pass {
    fn run(ast: &[Stmt], prev: BTreeMap<String, usize>, wide: BTreeSet<usize>) -> Self {
        let mut pass = Pass {
            prev,
            wide,
            labels: BTreeMap::new(),
            lines: BTreeMap::new(),
            writes: vec![],
            errors: vec![],
            code: 0,
            data: 0,
            start: 0,
        };
        for stmt in ast {
            pass.stmt(stmt);
        }
        pass
    }

    fn addresses(&self) -> BTreeMap<String, usize> {
        self.labels.iter()
            .map(|(label, data)| (label.clone(), data.addr))
            .collect()
    }

    fn error(&mut self, kind: AsmErrKind, line: usize) {
        self.errors.push(AsmErr::new(kind, line));
    }

    fn write(&mut self, addr: usize, value: i32) {
        self.writes.push((addr, value));
    }

    /// Looks up a label, preferring its address in the current pass.
    fn lookup(&self, label: &str) -> Option<usize> {
        self.labels.get(label)
            .map(|data| data.addr)
            .or_else(|| self.prev.get(label).copied())
    }

    fn define_label(&mut self, label: &str, addr: usize, line: usize) {
        let old = self.labels.insert(label.to_string(), SymbolData { addr, line });
        if old.is_some_and(|old| old.addr != addr) {
            self.error(AsmErrKind::OverlappingLabels, line);
        }
    }

    fn parse_addr(&mut self, word: &str, line: usize) -> Option<usize> {
        let addr = parse_int(word).and_then(|n| usize::try_from(n).ok());
        if addr.is_none() {
            self.error(AsmErrKind::MalformedAddress, line);
        }
        addr
    }

    /// Resolves an operand word.
    ///
    /// A word containing `$` is immediate, a word containing `[` is indirect, otherwise it is direct.
    /// The value is a number or a label (with `$`, `[`, `]` removed).
    fn operand(&mut self, word: &str, line: usize) -> Operand {
        if let Some(addr) = self.lookup(word) {
            return Operand::dir(addr as i32);
        }

        let mode = if word.contains('$') {
            AddrMode::Immediate
        } else if word.contains('[') {
            AddrMode::Indirect
        } else {
            AddrMode::Direct
        };
        let stripped: String = word.chars()
            .filter(|c| !matches!(c, '$' | '[' | ']'))
            .collect();

        let value = parse_int(&stripped)
            .or_else(|| self.lookup(&stripped).map(|addr| addr as i32));
        let value = value.unwrap_or_else(|| {
            self.error(AsmErrKind::MalformedOperand, line);
            0
        });

        Operand { mode, value }
    }

    /// Writes a halt at the given cell.
    fn halt(&mut self, addr: usize) {
        self.write(addr, halt_word());
    }

    /// Reports the error for a word that was expected to be HLT.
    fn not_halt(&mut self, word: &str, line: usize) {
        match word.parse::<Opcode>() {
            Ok(_) => self.error(AsmErrKind::MissingOperand, line),
            Err(()) => self.error(AsmErrKind::UnknownMnemonic, line),
        }
    }

    /// Assembles an instruction at the given cell, returning the number of cells written.
    fn instr(&mut self, addr: usize, mnemonic: &str, operand: &str, line: usize) -> usize {
        let Ok(op) = mnemonic.parse::<Opcode>() else {
            self.error(AsmErrKind::UnknownMnemonic, line);
            return 0;
        };
        if op == Opcode::HLT {
            self.halt(addr);
            return 1;
        }

        let instr = SimInstr::new(op, self.operand(operand, line));
        let enc = match self.wide.contains(&line) {
            true  => instr.encode_wide(),
            false => instr.encode(),
        };
        match enc {
            Ok(enc) => {
                for (i, &word) in enc.words().iter().enumerate() {
                    self.write(addr + i, word);
                }
                if enc.width() == Width::Wide {
                    self.wide.insert(line);
                }
                enc.width().cells()
            },
            Err(kind) => {
                self.error(kind, line);
                0
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        let line = stmt.line;
        log::trace!("line {line}: {:?} (code = {}, data = {})", stmt.nucleus, self.code, self.data);

        match &stmt.nucleus {
            StmtKind::Empty => {},
            StmtKind::Directive { name, arg } => match name.to_lowercase().as_str() {
                "data" => if let Some(addr) = self.parse_addr(arg, line) {
                    self.data = addr;
                },
                "code" => if let Some(addr) = self.parse_addr(arg, line) {
                    self.code = addr;
                    self.start = addr;
                },
                _ => self.error(AsmErrKind::UnknownDirective, line),
            },
            StmtKind::LabeledData { label, value } => {
                let addr = self.data;
                self.lines.insert(line, addr);
                self.define_label(label, addr, line);
                self.write(addr, *value);
                self.data += 1;
            },
            StmtKind::LabeledHalt { label, word } => {
                let addr = self.code;
                self.lines.insert(line, addr);
                self.define_label(label, addr, line);
                self.halt(addr);
                self.code += 1;

                if word.parse::<Opcode>() != Ok(Opcode::HLT) {
                    self.not_halt(word, line);
                }
            },
            &StmtKind::CellData { cell, value } => {
                let Ok(addr) = usize::try_from(cell) else {
                    return self.error(AsmErrKind::MalformedAddress, line);
                };
                self.lines.insert(line, addr);
                self.write(addr, value);
                self.data = addr + 1;
            },
            StmtKind::CellWord { cell, word } => {
                let Ok(addr) = usize::try_from(*cell) else {
                    return self.error(AsmErrKind::MalformedAddress, line);
                };
                self.lines.insert(line, addr);
                match word.parse::<Opcode>() {
                    Ok(Opcode::HLT) => {
                        self.halt(addr);
                        self.code = addr + 1;
                    },
                    _ => self.not_halt(word, line),
                }
            },
            StmtKind::Instr { place, mnemonic, operand } => {
                let addr = match place {
                    None => self.code,
                    Some(Place::Label(label)) => {
                        let addr = self.code;
                        self.define_label(label, addr, line);
                        addr
                    },
                    Some(Place::Cell(word)) => match self.parse_addr(word, line) {
                        Some(addr) => addr,
                        None => return,
                    },
                };

                self.lines.insert(line, addr);
                let width = self.instr(addr, mnemonic, operand, line);
                self.code = addr + width;
            },
            &StmtKind::Data(value) => {
                self.write(self.data, value);
                self.data += 1;
            },
            StmtKind::Label => {
                self.lines.insert(line, self.code);
            },
            StmtKind::Word(word) => match word.parse::<Opcode>() {
                Ok(Opcode::HLT) => {
                    self.lines.insert(line, self.code);
                    self.halt(self.code);
                    self.code += 1;
                },
                _ => self.not_halt(word, line),
            },
            StmtKind::Overlong(_) => self.error(AsmErrKind::UnexpectedToken, line),
        }
    }
}
