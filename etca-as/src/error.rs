//! Assembler error taxonomy and the rejection control-flow channel.

use std::collections::BTreeSet;

use thiserror::Error;

/// Signal from a semantic action that the current parse alternative does not
/// encode and the driver should try another one.
///
/// This is deliberately not an [`Error`] variant: a rejection only surfaces
/// when every alternative of a line rejects, at which point the collected
/// reasons become an [`Error::UnknownInstruction`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rejection {
    /// Optional human-readable reason shown when the whole line fails.
    pub reason: Option<String>,
}

impl Rejection {
    /// A rejection carrying a reason for the user.
    pub fn new(reason: impl Into<String>) -> Self {
        Rejection {
            reason: Some(reason.into()),
        }
    }

    /// A rejection without a reason; used where the mismatch is obvious from
    /// the other alternatives (e.g. an identifier that is not a known macro).
    pub fn silent() -> Self {
        Rejection { reason: None }
    }
}

/// Outcome channel of semantic actions.
///
/// `Reject` is local control flow swallowed by the parser driver; `Fatal`
/// bubbles to the top-level caller untouched.
#[derive(Debug)]
pub enum ActionError {
    /// This alternative does not apply; try the next one.
    Reject(Rejection),
    /// A real assembler error; abort the line and the pass.
    Fatal(Error),
}

impl From<Rejection> for ActionError {
    fn from(rejection: Rejection) -> Self {
        ActionError::Reject(rejection)
    }
}

impl From<Error> for ActionError {
    fn from(error: Error) -> Self {
        ActionError::Fatal(error)
    }
}

impl From<etca_asm::EncodingError> for ActionError {
    fn from(error: etca_asm::EncodingError) -> Self {
        ActionError::Fatal(Error::Encoding(error))
    }
}

/// Reject the current parse alternative when `condition` holds.
pub fn reject(condition: bool, reason: impl Into<String>) -> Result<(), ActionError> {
    if condition {
        Err(Rejection::new(reason).into())
    } else {
        Ok(())
    }
}

/// Top-level assembler errors.
#[derive(Debug, Error)]
pub enum Error {
    /// No parse alternative of the line succeeded. Collects the reasons of
    /// every rejecting alternative.
    #[error("{}", format_unknown_instruction(.line, .reasons))]
    UnknownInstruction {
        /// The offending source line.
        line: String,
        /// Reasons given by rejecting alternatives, in parse order.
        reasons: Vec<String>,
    },

    /// The grammar composed from the enabled extensions is inconsistent.
    #[error("invalid grammar composed from the enabled extensions: {0}")]
    Grammar(String),

    /// The multi-pass engine made no progress between two passes.
    #[error("stuck without further progress, still missing symbols {missing:?}")]
    StuckProgress {
        /// Symbols still unresolved when the fixed point stalled.
        missing: BTreeSet<String>,
    },

    /// An emission was placed before an earlier one.
    #[error("instruction at {found:#x} placed before the current address {expected:#x}")]
    Placement {
        /// Masked address of the offending emission.
        found: u64,
        /// Masked address the output had already reached.
        expected: u64,
    },

    /// A user value does not fit the width it is being encoded into.
    #[error(transparent)]
    Encoding(#[from] etca_asm::EncodingError),

    /// `.extension` named an extension outside the available set.
    #[error("unknown extension {name:?}, expected one of {available:?}")]
    UnknownExtension {
        /// The requested extension short id.
        name: String,
        /// The extensions the current run may enable.
        available: Vec<String>,
    },

    /// A directive handled outside the grammar (`.macro`) is malformed.
    #[error("malformed directive: {line}")]
    MalformedDirective {
        /// The offending source line.
        line: String,
    },

    /// A string directive received text it cannot encode.
    #[error("invalid string literal: {0}")]
    InvalidString(String),
}

fn format_unknown_instruction(line: &str, reasons: &[String]) -> String {
    let mut message = format!("can't process instruction: {}", line.trim());
    match reasons.len() {
        0 => {}
        1 => {
            message.push_str("\nreason: ");
            message.push_str(&reasons[0]);
        }
        _ => {
            message.push_str("\nreasons:");
            for reason in reasons {
                message.push_str("\n    ");
                message.push_str(reason);
            }
        }
    }
    message
}
