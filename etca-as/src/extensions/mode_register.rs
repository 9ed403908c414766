//! The `modes` extension: the `%mode` control register name.
//!
//! Address-space extensions pull this in from their init hooks so that the
//! mode register becomes nameable as soon as an address width is selected.

use crate::assembler::Assembler;
use crate::context::Context;
use crate::error::ActionError;
use crate::registry::{registry, Extension, Registry};
use crate::value::Value;

const MODE_CR: i128 = 17;

pub(crate) fn register(catalogue: &mut Registry) {
    let mut ext = Extension::new(None, "modes", "Mode Register", false);
    ext.register_syntax_in_modes("control_register", r#""mode""#, &[("prefix", false)], "named_cr", named_cr);
    ext.register_syntax_in_modes("control_register", r#""%mode""#, &[("prefix", true)], "named_cr", named_cr);
    catalogue.register(ext);
}

fn named_cr(_asm: &mut Assembler, _values: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::Int(MODE_CR))
}

/// Enable the mode register in `context` if it is not already active.
pub(crate) fn enable(context: &mut Context) {
    if !context.extension_enabled("modes") {
        if let Some(ext) = registry().get("modes") {
            context.enabled_extensions.push(ext);
        }
    }
}
