//! Parsing assembly source code into statements.
//!
//! Parsing occurs in two steps:
//! 1. [`preprocess`] normalizes every line: comments (`;` onwards) are removed,
//!    runs of whitespace collapse into single spaces, and a line holding only a label
//!    (`LABEL:`) is copied onto the start of the next line.
//! 2. [`parse_ast`] splits every normalized line on spaces and classifies it
//!    by its number of words into a [`Stmt`].
//!
//! Numeric validation of cell indices and operands is left to the assembler,
//! which reports malformed values as errors.

pub mod lex;

use lex::{classify, parse_int, Token};

/// Normalizes the lines of the source code.
///
/// The result has exactly one entry per source line (so line `n` is at index `n - 1`).
///
/// ```
/// use acu_ensemble::parse::preprocess;
///
/// let lines = preprocess("START:\n   CPA   $5 ; load\nEND:");
/// assert_eq!(lines, ["START:", "START: CPA $5", "END:"]);
/// ```
pub fn preprocess(src: &str) -> Vec<String> {
    let mut raw: Vec<String> = src.split('\n').map(String::from).collect();
    let mut lines = Vec::with_capacity(raw.len());

    for i in 0..raw.len() {
        let line = match raw[i].find(';') {
            Some(n) => &raw[i][..n],
            None => &raw[i],
        };
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");

        // Carry single labels onto the next line:
        if let Some(Token::LabelDef(_)) = classify(&line) {
            if let Some(next) = raw.get_mut(i + 1) {
                next.insert_str(0, &format!("{line} "));
            }
        }

        lines.push(line);
    }

    lines
}

/// Where an instruction is placed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Place {
    /// At the code cursor, binding the label to that cell.
    Label(String),
    /// At an explicit cell index (the raw, unvalidated word).
    Cell(String),
}

/// A statement, the classification of a single source line.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stmt {
    /// The 1-based source line.
    pub line: usize,
    /// The kind of statement.
    pub nucleus: StmtKind,
}

/// The kinds of statements.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum StmtKind {
    /// Blank line.
    Empty,
    /// A directive with an argument (e.g., `.data 50`).
    Directive {
        /// Directive name, without the dot.
        name: String,
        /// The raw argument.
        arg: String,
    },
    /// A labeled data value (e.g., `X: 15`).
    LabeledData {
        /// Label name.
        label: String,
        /// The value.
        value: i32,
    },
    /// A label with a non-numeric word (e.g., `END: HLT`), assembled as a halt.
    LabeledHalt {
        /// Label name.
        label: String,
        /// The word after the label.
        word: String,
    },
    /// A data value at an explicit cell (e.g., `40 15`).
    CellData {
        /// The cell index.
        cell: i32,
        /// The value.
        value: i32,
    },
    /// A non-numeric word at an explicit cell (e.g., `40 HLT`).
    CellWord {
        /// The cell index.
        cell: i32,
        /// The word.
        word: String,
    },
    /// An instruction with an operand (e.g., `ADD $3`, `L: ADD $3`, `12 ADD $3`).
    Instr {
        /// An explicit placement, if any.
        place: Option<Place>,
        /// The raw mnemonic.
        mnemonic: String,
        /// The raw operand.
        operand: String,
    },
    /// A sequential data value (e.g., `15`).
    Data(i32),
    /// A lone label (e.g., `LOOP:`).
    Label,
    /// A single non-numeric, non-label word (e.g., `HLT`).
    Word(String),
    /// A line with more than three words.
    Overlong(usize),
}

/// Parses source code into a list of statements (one per line).
///
/// ```
/// use acu_ensemble::parse::{parse_ast, StmtKind};
///
/// let ast = parse_ast("X: 15\nADD X");
/// assert_eq!(ast[0].nucleus, StmtKind::LabeledData { label: "X".into(), value: 15 });
/// assert!(matches!(ast[1].nucleus, StmtKind::Instr { place: None, .. }));
/// ```
pub fn parse_ast(src: &str) -> Vec<Stmt> {
    preprocess(src).iter()
        .enumerate()
        .map(|(i, line)| Stmt { line: i + 1, nucleus: parse_line(line) })
        .collect()
}

fn strip_label(word: &str) -> Option<&str> {
    word.strip_suffix(':')
}

fn parse_line(line: &str) -> StmtKind {
    let words: Vec<&str> = match line {
        "" => vec![],
        l  => l.split(' ').collect(),
    };

    match *words.as_slice() {
        [] => StmtKind::Empty,
        [word] => {
            if let Some(value) = parse_int(word) {
                StmtKind::Data(value)
            } else if strip_label(word).is_some() {
                StmtKind::Label
            } else {
                StmtKind::Word(word.to_string())
            }
        },
        [first, second] => {
            if let Some(name) = first.strip_prefix('.') {
                StmtKind::Directive { name: name.to_string(), arg: second.to_string() }
            } else if let Some(label) = strip_label(first) {
                let label = label.to_string();
                match parse_int(second) {
                    Some(value) => StmtKind::LabeledData { label, value },
                    None => StmtKind::LabeledHalt { label, word: second.to_string() },
                }
            } else if let Some(cell) = parse_int(first) {
                match parse_int(second) {
                    Some(value) => StmtKind::CellData { cell, value },
                    None => StmtKind::CellWord { cell, word: second.to_string() },
                }
            } else {
                StmtKind::Instr { place: None, mnemonic: first.to_string(), operand: second.to_string() }
            }
        },
        [first, mnemonic, operand] => {
            let place = match strip_label(first) {
                Some(label) => Place::Label(label.to_string()),
                None => Place::Cell(first.to_string()),
            };
            StmtKind::Instr { place: Some(place), mnemonic: mnemonic.to_string(), operand: operand.to_string() }
        },
        _ => StmtKind::Overlong(words.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_ast, preprocess, Place, StmtKind};

    fn kinds(src: &str) -> Vec<StmtKind> {
        parse_ast(src).into_iter().map(|s| s.nucleus).collect()
    }

    #[test]
    fn test_preprocess_whitespace() {
        assert_eq!(preprocess("  ADD\t\t $3   ;; comment ; more\r"), ["ADD $3"]);
        assert_eq!(preprocess(";only a comment\n\n"), ["", "", ""]);
    }

    #[test]
    fn test_label_carry() {
        // carried over a comment-only line
        assert_eq!(preprocess("A:\n; hi\nCPA 5"), ["A:", "A:", "A: CPA 5"]);
        // last line label is not carried anywhere
        assert_eq!(preprocess("CPA 5\nB:"), ["CPA 5", "B:"]);
        // label with trailing comment is still carried
        assert_eq!(preprocess("C: ; here\nHLT"), ["C:", "C: HLT"]);
        // invalid identifiers are not labels
        assert_eq!(preprocess("1A:\nHLT"), ["1A:", "HLT"]);
    }

    #[test]
    fn test_classify_lines() {
        let src = "
            .code 10
            X: 15
            END: HLT
            40 15
            41 hlt
            L: ADD $3
            12 SUB [4]
            ADD X
            7
            HLT
            A B C D
        ";
        assert_eq!(kinds(src), [
            StmtKind::Empty,
            StmtKind::Directive { name: "code".into(), arg: "10".into() },
            StmtKind::LabeledData { label: "X".into(), value: 15 },
            StmtKind::LabeledHalt { label: "END".into(), word: "HLT".into() },
            StmtKind::CellData { cell: 40, value: 15 },
            StmtKind::CellWord { cell: 41, word: "hlt".into() },
            StmtKind::Instr { place: Some(Place::Label("L".into())), mnemonic: "ADD".into(), operand: "$3".into() },
            StmtKind::Instr { place: Some(Place::Cell("12".into())), mnemonic: "SUB".into(), operand: "[4]".into() },
            StmtKind::Instr { place: None, mnemonic: "ADD".into(), operand: "X".into() },
            StmtKind::Data(7),
            StmtKind::Word("HLT".into()),
            StmtKind::Overlong(4),
            StmtKind::Empty,
        ]);
    }

    #[test]
    fn test_line_numbers() {
        let ast = parse_ast("\n\nHLT");
        assert_eq!(ast.len(), 3);
        assert_eq!(ast[2].line, 3);
    }
}
