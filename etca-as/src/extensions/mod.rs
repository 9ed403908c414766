//! The compiled-in extension catalogue.
//!
//! Each module registers one extension; [`register_all`] runs once from
//! [`crate::registry::registry`] and the registration order here is the
//! default priority order.

mod base_isa;
mod byte_operations;
mod cache_instructions;
mod common_macros;
mod core;
mod dword_operations;
mod expanded_opcodes;
mod functions;
mod mode_register;
mod qword_operations;
mod real32;
mod real64;

use crate::registry::Registry;

pub(crate) fn register_all(registry: &mut Registry) {
    self::core::register(registry);
    base_isa::register(registry);
    common_macros::register(registry);
    byte_operations::register(registry);
    dword_operations::register(registry);
    qword_operations::register(registry);
    functions::register(registry);
    expanded_opcodes::register(registry);
    cache_instructions::register(registry);
    mode_register::register(registry);
    real32::register(registry);
    real64::register(registry);
}
