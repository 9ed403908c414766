//! The `base` extension: the base instruction set, registers, size tags,
//! control registers, and the syntax-mode directives.

use std::collections::BTreeSet;

use etca_asm::{base_opcode, build, condition_code, control_register, Size, BASE_OPCODES, CONDITION_CODES};

use crate::assembler::Assembler;
use crate::context::Context;
use crate::error::{reject, ActionError, Rejection};
use crate::registry::{one_of, Extension, Registry};
use crate::value::Value;

pub(crate) fn register(catalogue: &mut Registry) {
    let mut base = Extension::new(None, "base", "Base Instruction Set", true);
    base.set_init(base_init);

    base.inst(r#"".syntax" /(no)?prefix/"#, "syntax_prefix", syntax_prefix);
    base.inst(r#"".strict""#, "strict", strict);

    base.reg_in_modes(
        r#""%r" ~ size_infix ~ /[0-9]+/"#,
        &[("prefix", true)],
        "base_registers",
        base_registers,
    );
    base.reg_in_modes(
        r#""r" ~ size_infix ~ /[0-9]+/"#,
        &[("prefix", false)],
        "base_registers",
        base_registers,
    );

    base.register_syntax("size_postfix", "/x/", "size_postfix_x", size_tag_element);
    base.register_syntax_in_modes("size_postfix", "", &[("strict", false)], "size_postfix_x", size_tag_element);
    base.register_syntax("size_infix", "/x/", "size_infix_x", size_tag_element);
    base.register_syntax_in_modes("size_infix", "", &[("strict", false)], "size_infix_x", size_tag_element);

    let mnemonics = one_of(BASE_OPCODES.iter().map(|&(name, _)| name));
    base.inst(
        &format!(r#"/{mnemonics}/ ~ size_postfix register "," register"#),
        "base_computations_2reg",
        base_computations_2reg,
    );
    base.inst(
        &format!(r#"/{mnemonics}/ ~ size_postfix register "," immediate"#),
        "base_computations_imm",
        base_computations_imm,
    );

    base.register_syntax_in_modes("control_register", "/cr[0-9]+/", &[("prefix", false)], "cr_n", cr_n);
    base.register_syntax_in_modes("control_register", "/%cr[0-9]+/", &[("prefix", true)], "cr_n", cr_n);
    let named_crs = one_of(etca_asm::NAMED_CONTROL_REGISTERS.iter().map(|&(name, _)| name));
    base.register_syntax_in_modes(
        "control_register",
        &format!("/{named_crs}/"),
        &[("prefix", false)],
        "named_cr",
        named_cr,
    );
    base.register_syntax_in_modes(
        "control_register",
        &format!("/%{named_crs}/"),
        &[("prefix", true)],
        "named_cr",
        named_cr,
    );

    base.inst(
        r#""mov" ~ size_postfix register_raw "," control_register"#,
        "mov_from_cr",
        mov_from_cr,
    );
    base.inst(
        r#""mov" ~ size_postfix control_register "," register_raw"#,
        "mov_to_cr",
        mov_to_cr,
    );
    base.inst(
        r#""mov" ~ size_postfix register_raw "," "[" ( register_raw | immediate_raw ) "]""#,
        "mov_from_mem",
        mov_from_mem,
    );
    base.inst(
        r#""mov" ~ size_postfix "[" ( register_raw | immediate_raw ) "]" "," register_raw"#,
        "mov_to_mem",
        mov_to_mem,
    );

    let conditions = one_of(CONDITION_CODES.iter().map(|&(name, _)| name));
    base.inst(&format!("/j{conditions}/ symbol"), "base_jumps", base_jumps);

    base.inst(r#""nop""#, "base_nop", base_nop);
    base.inst(r#""halt" | "hlt""#, "base_halt", base_halt);

    catalogue.register(base);
}

fn base_init(context: &mut Context) {
    context.register_sizes.insert(Size::Word, Size::Word.exponent());
}

/// Resolve the effective operand size from an instruction postfix and the
/// register tags; conflicting explicit tags reject, none at all falls back to
/// the context default.
pub(crate) fn resolve_register_size(
    context: &Context,
    sizes: impl IntoIterator<Item = Option<Size>>,
) -> Result<Size, ActionError> {
    let distinct: BTreeSet<Size> = sizes.into_iter().flatten().collect();
    let mut iter = distinct.iter();
    match (iter.next(), iter.next()) {
        (None, _) => Ok(context.default_size),
        (Some(&only), None) => Ok(only),
        _ => Err(Rejection::new(format!("conflicting register sizes: {distinct:?}")).into()),
    }
}

/// Check register ranges and resolve the shared operand size.
pub(crate) fn validate_registers(
    context: &Context,
    registers: &[&Value],
    inst_size: Option<Size>,
) -> Result<(Size, Vec<u8>), ActionError> {
    let mut sizes = vec![inst_size];
    let mut indexes = Vec::with_capacity(registers.len());
    for value in registers {
        let (size, index) = value.register();
        reject(index >= 8, format!("register {index} out of valid range (0..8)"))?;
        sizes.push(size);
        indexes.push(index);
    }
    Ok((resolve_register_size(context, sizes)?, indexes))
}

fn syntax_prefix(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    if values[0].str() == "noprefix" {
        asm.context.modes.remove("prefix");
    } else {
        asm.context.modes.insert("prefix".to_string());
    }
    asm.reload_extensions()?;
    Ok(Value::None)
}

fn strict(asm: &mut Assembler, _values: &[Value]) -> Result<Value, ActionError> {
    asm.context.modes.insert("strict".to_string());
    asm.reload_extensions()?;
    Ok(Value::None)
}

fn base_registers(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let size = values[0].size_tag();
    let index: u8 = values[1]
        .str()
        .parse()
        .map_err(|_| Rejection::new(format!("register {} out of valid range (0..8)", values[1].str())))?;
    Ok(Value::Register { size, index })
}

pub(crate) fn size_tag_element(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    Ok(values.first().cloned().unwrap_or(Value::None))
}

fn base_computations_2reg(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let mnemonic = values[0].str();
    let Some(op) = base_opcode(mnemonic) else {
        unreachable!("mnemonic {mnemonic} missing from the opcode table")
    };
    reject(op >= 12, format!("opcode {op:#x} doesn't have a 2 register form"))?;
    let (size, regs) = validate_registers(&asm.context, &[&values[2], &values[3]], values[1].size_tag())?;
    let exponent = asm.context.register_size(size)?;
    Ok(Value::Bytes(build(&[
        (0b00, 2),
        (exponent as u64, 2),
        (op as u64, 4),
        (regs[0] as u64, 3),
        (regs[1] as u64, 3),
        (0, 2),
    ])))
}

fn base_computations_imm(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let mnemonic = values[0].str();
    let Some(op) = base_opcode(mnemonic) else {
        unreachable!("mnemonic {mnemonic} missing from the opcode table")
    };
    let imm = values[3].int();
    if op <= 7 || op == 9 {
        reject(
            !(-16..16).contains(&imm),
            format!("invalid immediate {imm} for base opcode {mnemonic}"),
        )?;
    } else {
        reject(
            !(0..32).contains(&imm),
            format!("invalid immediate {imm} for base opcode {mnemonic}"),
        )?;
    }
    let (size, regs) = validate_registers(&asm.context, &[&values[2]], values[1].size_tag())?;
    let exponent = asm.context.register_size(size)?;
    Ok(Value::Bytes(build(&[
        (0b01, 2),
        (exponent as u64, 2),
        (op as u64, 4),
        (regs[0] as u64, 3),
        ((imm & 0x1F) as u64, 5),
    ])))
}

fn cr_n(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let token = values[0].str().trim_start_matches('%').trim_start_matches("cr");
    let index: u8 = token
        .parse()
        .map_err(|_| Rejection::new(format!("control register {token} out of range")))?;
    Ok(Value::Int(index as i128))
}

fn named_cr(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let name = values[0].str().trim_start_matches('%');
    let Some(index) = control_register(name) else {
        unreachable!("control register {name} missing from the table")
    };
    Ok(Value::Int(index as i128))
}

fn size_suffix(value: &Value) -> String {
    value.size_tag().map(|size| size.to_string()).unwrap_or_default()
}

fn mov_from_cr(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let size = size_suffix(&values[0]);
    let reg = values[1].str().to_string();
    let cr = values[2].int();
    Ok(Value::Bytes(asm.expand_macro(&format!("mfcr{size} {reg}, {cr}"))?))
}

fn mov_to_cr(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let size = size_suffix(&values[0]);
    let cr = values[1].int();
    let reg = values[2].str().to_string();
    Ok(Value::Bytes(asm.expand_macro(&format!("mtcr{size} {reg}, {cr}"))?))
}

fn mov_from_mem(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let size = size_suffix(&values[0]);
    let dest = values[1].str().to_string();
    let source = values[2].str().to_string();
    Ok(Value::Bytes(asm.expand_macro(&format!("ld{size} {dest}, {source}"))?))
}

fn mov_to_mem(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let size = size_suffix(&values[0]);
    let dest = values[1].str().to_string();
    let source = values[2].str().to_string();
    Ok(Value::Bytes(asm.expand_macro(&format!("st{size} {source}, {dest}"))?))
}

fn base_jumps(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let mnemonic = values[0].str();
    let suffix = &mnemonic[1..];
    let Some(cc) = condition_code(suffix) else {
        unreachable!("condition {suffix} missing from the table")
    };
    let (dots, name) = values[1].symbol();
    let name = name.to_string();
    let resolved = asm.context.resolve_symbol(dots, &name)?;
    let ip = asm.context.ip() as i128;
    let target = resolved.unwrap_or(ip);
    let offset = target - ip;
    reject(
        !(-256..256).contains(&offset),
        format!("cannot encode near jump from `{mnemonic} {name}' at {ip:#06x} to {target:#06x}"),
    )?;
    Ok(Value::Bytes(build(&[
        (0b100, 3),
        ((offset < 0) as u64, 1),
        (cc as u64, 4),
        (offset as u64 & 0xFF, 8),
    ])))
}

fn base_nop(_asm: &mut Assembler, _values: &[Value]) -> Result<Value, ActionError> {
    // Jump nowhere, never.
    Ok(Value::Bytes(vec![0x8F, 0x00]))
}

fn base_halt(_asm: &mut Assembler, _values: &[Value]) -> Result<Value, ActionError> {
    // Jump nowhere, always.
    Ok(Value::Bytes(vec![0x8E, 0x00]))
}
