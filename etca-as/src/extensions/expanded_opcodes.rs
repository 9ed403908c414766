//! The `exopc` extension: computations from the expanded opcode plane and
//! relative jumps with width-scaled offsets.

use etca_asm::{build, signed_le_bytes, CONDITION_CODES};

use crate::assembler::Assembler;
use crate::error::{reject, ActionError};
use crate::registry::{one_of, Extension, Registry};
use crate::value::Value;

use super::base_isa::validate_registers;

const INSTRUCTIONS: &[(&str, u16)] = &[("adc", 0), ("sbb", 1), ("rsbb", 2)];

pub(crate) fn register(catalogue: &mut Registry) {
    let mut ext = Extension::new(Some(0), "exopc", "Expanded Opcodes", false);

    let mnemonics = one_of(INSTRUCTIONS.iter().map(|&(name, _)| name));
    ext.inst(
        &format!(r#"/{mnemonics}/ ~ size_postfix register "," register"#),
        "exopc_reg_reg",
        exopc_reg_reg,
    );
    ext.inst(
        &format!(r#"/{mnemonics}/ ~ size_postfix register "," immediate"#),
        "exopc_reg_imm",
        exopc_reg_imm,
    );

    let conditions = one_of(
        CONDITION_CODES
            .iter()
            .map(|&(name, _)| name)
            .filter(|name| !name.is_empty()),
    );
    ext.inst(&format!("/j{conditions}/ symbol"), "exopc_jumps", exopc_jumps);

    catalogue.register(ext);
}

fn opcode(mnemonic: &str) -> u16 {
    match INSTRUCTIONS.iter().find(|(name, _)| *name == mnemonic) {
        Some(&(_, op)) => op,
        None => unreachable!("mnemonic {mnemonic} missing from the expanded opcode table"),
    }
}

fn exopc_reg_reg(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let op = opcode(values[0].str());
    let (size, regs) = validate_registers(&asm.context, &[&values[2], &values[3]], values[1].size_tag())?;
    let exponent = asm.context.register_size(size)?;
    Ok(Value::Bytes(build(&[
        (0xE, 4),
        ((op >> 4) as u64 & 0x1F, 5),
        (0, 1),
        (exponent as u64, 2),
        ((op & 0xF) as u64, 4),
        (regs[0] as u64, 3),
        (regs[1] as u64, 3),
        (0, 2),
    ])))
}

fn exopc_reg_imm(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let mnemonic = values[0].str();
    let op = opcode(mnemonic);
    let imm = values[3].int();
    reject(
        !(-16..16).contains(&imm),
        format!("invalid immediate {imm} for opcode {mnemonic}"),
    )?;
    let (size, regs) = validate_registers(&asm.context, &[&values[2]], values[1].size_tag())?;
    let exponent = asm.context.register_size(size)?;
    Ok(Value::Bytes(build(&[
        (0xE, 4),
        ((op >> 4) as u64 & 0x1F, 5),
        (1, 1),
        (exponent as u64, 2),
        ((op & 0xF) as u64, 4),
        (regs[0] as u64, 3),
        ((imm & 0x1F) as u64, 5),
    ])))
}

/// Relative jump with a 1/2/4/8-byte little-endian offset, scaled to the
/// smallest width that reaches the target within the visible address space.
fn exopc_jumps(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let (dots, name) = values[1].symbol();
    let name = name.to_string();
    let resolved = asm.context.resolve_symbol(dots, &name)?;
    let ip = asm.context.ip() as i128;
    let target = resolved.unwrap_or(ip);
    let offset = target - ip;

    let ip_mask = asm.context.ip_mask;
    let scale = if (-(1i128 << 7)..1 << 7).contains(&offset) {
        Some(0u64)
    } else if (-(1i128 << 15)..1 << 15).contains(&offset) {
        Some(1)
    } else if (-(1i128 << 31)..1 << 31).contains(&offset) && ip_mask >= 0xFFFF_FFFF {
        Some(2)
    } else if ip_mask == u64::MAX {
        Some(3)
    } else {
        None
    };
    let Some(scale) = scale else {
        return Err(crate::error::Rejection::new(format!(
            "offset {offset} does not fit the visible address space"
        ))
        .into());
    };
    let mut bytes = build(&[(0x7, 3), (2, 2), (0, 1), (scale, 2)]);
    bytes.extend(signed_le_bytes(offset, 1 << scale)?);
    Ok(Value::Bytes(bytes))
}
