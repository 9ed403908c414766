//! The `real32` extension: 32-bit address space.

use crate::context::Context;
use crate::registry::{Extension, Registry};

use super::mode_register;

pub(crate) fn register(catalogue: &mut Registry) {
    let mut ext = Extension::new(Some(16), "real32", "32 Bit Address Space", false);
    ext.set_init(real32_init);
    catalogue.register(ext);
}

fn real32_init(context: &mut Context) {
    context.ip_mask = 0xFFFF_FFFF;
    mode_register::enable(context);
}
