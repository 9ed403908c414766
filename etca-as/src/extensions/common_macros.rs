//! The `common_macros` extension: pseudo-instructions expanded into base ISA
//! sequences, chiefly `mov` with immediates wider than the short form.

use etca_asm::Size;

use crate::assembler::Assembler;
use crate::error::{reject, ActionError, Rejection};
use crate::registry::{Extension, Registry};
use crate::value::Value;

pub(crate) fn register(catalogue: &mut Registry) {
    let mut ext = Extension::new(None, "common_macros", "Common Macros", true);
    ext.inst(
        r#""mov" register_raw "," immediate"#,
        "mov_large_immediate",
        mov_large_immediate,
    );
    catalogue.register(ext);
}

fn sign_extend_5(value: i128) -> i128 {
    (value & 0xF) - (value & 0x10)
}

/// Smallest enabled operand size whose value range contains `imm`.
fn pick_size(asm: &Assembler, imm: i128) -> Option<Size> {
    let candidates: [(Size, Option<&str>, i128, i128); 4] = [
        (Size::Byte, Some("byte_operations"), -(1 << 7), (1 << 8) - 1),
        (Size::Word, None, -(1 << 15), (1 << 16) - 1),
        (Size::DoubleWord, Some("dword_operations"), -(1 << 31), (1i128 << 32) - 1),
        (Size::QuadWord, Some("qword_operations"), -(1i128 << 63), (1i128 << 64) - 1),
    ];
    candidates.into_iter().find_map(|(size, gate, lo, hi)| {
        let enabled = gate.map_or(true, |strid| asm.context.extension_enabled(strid));
        (enabled && (lo..=hi).contains(&imm)).then_some(size)
    })
}

/// Expand `mov reg, imm` into a `movz`/`movs` head followed by `slo` shifts
/// of five bits each, then re-enter the assembler over the expansion. The
/// ambiguity resolver discards this in favor of the short immediate form
/// whenever that one applies.
fn mov_large_immediate(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let reg = values[0].str().to_string();
    let imm = values[1].int();
    let size = pick_size(asm, imm);
    reject(
        size.is_none(),
        format!("immediate is too large to fit in a register: {imm}"),
    )?;
    let Some(size) = size else { unreachable!() };

    let mut groups: Vec<i128> = (0..13).map(|i| (imm >> (60 - 5 * i)) & 0x1F).collect();
    let mut lines = Vec::new();
    // The 0..15 range still goes through `movs` so the sign-extended head
    // group stays a single instruction for small negatives.
    if imm < 16 {
        while groups.len() > 1 && groups[0] == 0x1F && groups[1] & 0x10 != 0 {
            groups.remove(0);
        }
        let head = sign_extend_5(groups.remove(0));
        lines.push(format!("movs{size} {reg}, {head}"));
    } else {
        while groups.len() > 1 && groups[0] == 0 {
            groups.remove(0);
        }
        let head = groups.remove(0);
        lines.push(format!("movz{size} {reg}, {head}"));
    }
    for group in groups {
        lines.push(format!("slo{size} {reg}, {group}"));
    }
    // An expansion the current grammar cannot encode (size conflict with a
    // tagged register, register out of range) disqualifies this alternative
    // rather than the whole line.
    match asm.expand_macro(&lines.join("\n")) {
        Ok(bytes) => Ok(Value::Bytes(bytes)),
        Err(crate::error::Error::UnknownInstruction { reasons, .. }) => Err(Rejection {
            reason: reasons.into_iter().next(),
        }
        .into()),
        Err(other) => Err(other.into()),
    }
}
