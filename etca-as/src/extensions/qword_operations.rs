//! The `qword_operations` extension: the 64-bit operand size tag `q`.

use etca_asm::Size;

use crate::context::Context;
use crate::registry::{Extension, Registry};

use super::base_isa::size_tag_element;

pub(crate) fn register(catalogue: &mut Registry) {
    let mut ext = Extension::new(Some(4), "qword_operations", "Quad Word Operations", false);
    ext.set_init(qword_init);
    ext.register_syntax("size_postfix", "/q/", "size_postfix_q", size_tag_element);
    ext.register_syntax_in_modes("size_postfix", "", &[("strict", false)], "size_postfix_q", size_tag_element);
    ext.register_syntax("size_infix", "/q/", "size_infix_q", size_tag_element);
    ext.register_syntax_in_modes("size_infix", "", &[("strict", false)], "size_infix_q", size_tag_element);
    catalogue.register(ext);
}

fn qword_init(context: &mut Context) {
    context.register_sizes.insert(Size::QuadWord, Size::QuadWord.exponent());
}
