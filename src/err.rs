//! Error interface for this crate.
//!
//! Every error raised by the assembler or the simulator implements [`Error`],
//! which exposes the source line the error came from (if any)
//! and a hint on how to fix it (if any).

use std::borrow::Cow;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// The 1-based source line associated with this error (if it exists).
    fn line(&self) -> Option<usize>;

    /// A help message describing how to fix this error (if it exists).
    fn help(&self) -> Option<Cow<str>>;
}

/// Formats an error as a one-line diagnostic, with the offending line
/// and the help message attached when available.
///
/// ## Example
/// ```
/// use acu_ensemble::asm::assemble;
/// use acu_ensemble::err::report;
///
/// let src = "FOO 5";
/// let errs = assemble(src).unwrap_err();
/// let msg = report(&errs[0], src);
/// assert!(msg.starts_with("line 1: unknown mnemonic"));
/// assert!(msg.contains("FOO 5"));
/// ```
pub fn report<E: Error + ?Sized>(err: &E, src: &str) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    match err.line() {
        Some(lno) => {
            let _ = write!(out, "line {lno}: {err}");
            if let Some(text) = src.lines().nth(lno.wrapping_sub(1)) {
                let _ = write!(out, "\n    | {}", text.trim());
            }
        },
        None => { let _ = write!(out, "{err}"); }
    }
    if let Some(help) = err.help() {
        let _ = write!(out, "\n    = help: {help}");
    }
    out
}
