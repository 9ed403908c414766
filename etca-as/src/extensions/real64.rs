//! The `real64` extension: 64-bit address space.

use crate::context::Context;
use crate::registry::{Extension, Registry};

use super::mode_register;

pub(crate) fn register(catalogue: &mut Registry) {
    let mut ext = Extension::new(Some(32), "real64", "64 Bit Address Space", false);
    ext.set_init(real64_init);
    catalogue.register(ext);
}

fn real64_init(context: &mut Context) {
    context.ip_mask = u64::MAX;
    mode_register::enable(context);
}
