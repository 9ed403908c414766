//! Encoding primitives of the ETCa instruction set.
//!
//! This crate holds the pieces every instruction encoder shares: the
//! bit-level [`build`] packer, width-checked little-endian integer encoding,
//! the operand [`Size`] tags, and the opcode/condition/control-register
//! tables of the base ISA. It carries no assembler state; the assembler
//! engine lives in the `etca-as` crate.

#![warn(missing_docs)]

mod error;
mod op;
mod pack;
mod size;

pub use error::EncodingError;
pub use op::{base_opcode, condition_code, control_register, BASE_OPCODES, CONDITION_CODES, NAMED_CONTROL_REGISTERS};
pub use pack::{build, signed_le_bytes};
pub use size::Size;
