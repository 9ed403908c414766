//! The `dword_operations` extension: the 32-bit operand size tag `d`.

use etca_asm::Size;

use crate::context::Context;
use crate::registry::{Extension, Registry};

use super::base_isa::size_tag_element;

pub(crate) fn register(catalogue: &mut Registry) {
    let mut ext = Extension::new(Some(14), "dword_operations", "Double Word Operations", false);
    ext.set_init(dword_init);
    ext.register_syntax("size_postfix", "/d/", "size_postfix_d", size_tag_element);
    ext.register_syntax_in_modes("size_postfix", "", &[("strict", false)], "size_postfix_d", size_tag_element);
    ext.register_syntax("size_infix", "/d/", "size_infix_d", size_tag_element);
    ext.register_syntax_in_modes("size_infix", "", &[("strict", false)], "size_infix_d", size_tag_element);
    catalogue.register(ext);
}

fn dword_init(context: &mut Context) {
    context.register_sizes.insert(Size::DoubleWord, Size::DoubleWord.exponent());
}
