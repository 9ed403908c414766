//! The `byte_operations` extension: the 8-bit operand size tag `h`.

use etca_asm::Size;

use crate::context::Context;
use crate::registry::{Extension, Registry};

use super::base_isa::size_tag_element;

pub(crate) fn register(catalogue: &mut Registry) {
    let mut ext = Extension::new(Some(3), "byte_operations", "Byte Operations", false);
    ext.set_init(byte_init);
    ext.register_syntax("size_postfix", "/h/", "size_postfix_h", size_tag_element);
    ext.register_syntax_in_modes("size_postfix", "", &[("strict", false)], "size_postfix_h", size_tag_element);
    ext.register_syntax("size_infix", "/h/", "size_infix_h", size_tag_element);
    ext.register_syntax_in_modes("size_infix", "", &[("strict", false)], "size_infix_h", size_tag_element);
    catalogue.register(ext);
}

fn byte_init(context: &mut Context) {
    context.register_sizes.insert(Size::Byte, Size::Byte.exponent());
}
