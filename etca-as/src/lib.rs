//! Modular, extensible multi-pass assembler for the ETCa instruction set.
//!
//! Source lines are parsed by an Earley grammar composed on demand from the
//! syntax elements of the enabled extensions. Every valid parse of a line is
//! evaluated; alternatives may reject, and among the survivors the shortest
//! encoding wins. A fixed-point loop replays the input until forward
//! references and moving symbols settle.
//!
//! ```
//! use etca_as::Assembler;
//!
//! let mut assembler = Assembler::new(0, None, None).unwrap();
//! let result = assembler.n_pass("mov r0, 5\n").unwrap();
//! assert_eq!(result.to_bytes(None).unwrap(), vec![0x59, 0x05]);
//! ```

mod assembler;
mod context;
mod error;
mod eval;
mod extensions;
mod grammar;
mod output;
mod registry;
mod value;

pub use assembler::Assembler;
pub use context::{Context, Macro};
pub use error::{reject, ActionError, Error, Rejection};
pub use output::{AssemblyResult, InstructionOutput};
pub use registry::{one_of, registry, Action, Extension, ModePredicate, Registry, SyntaxElement};
pub use value::Value;

pub mod prelude {
    //! Convenience re-exports for embedding the assembler.
    pub use crate::assembler::Assembler;
    pub use crate::context::Context;
    pub use crate::error::{Error, Rejection};
    pub use crate::output::{AssemblyResult, InstructionOutput};
    pub use crate::registry::registry;
    pub use crate::value::Value;
    pub use etca_asm::{build, signed_le_bytes, Size};
}
