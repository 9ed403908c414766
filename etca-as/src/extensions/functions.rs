//! The `functions` extension: named calling-convention registers, the stack
//! push/pop forms, and absolute register calls, returns, and jumps.

use etca_asm::{build, condition_code, CONDITION_CODES};

use crate::assembler::Assembler;
use crate::error::{reject, ActionError, Rejection};
use crate::registry::{one_of, Extension, Registry};
use crate::value::Value;

use super::base_isa::validate_registers;

/// Calling-convention register names of the ABI.
const REGISTERS: &[(&str, u8)] = &[
    ("a0", 0),
    ("a1", 1),
    ("a2", 2),
    ("s0", 3),
    ("s1", 4),
    ("bp", 5),
    ("sp", 6),
    ("ln", 7),
];

pub(crate) fn register(catalogue: &mut Registry) {
    let mut ext = Extension::new(Some(2), "functions", "Stack and Functions", false);

    ext.reg(r#""%" ~ /(bp|sp|ln)/ ~ size_postfix"#, "fn_ptr_registers", fn_ptr_registers);
    ext.reg_in_modes(
        r#"/(bp|sp|ln)/ ~ size_postfix"#,
        &[("prefix", false)],
        "fn_ptr_registers",
        fn_ptr_registers,
    );
    ext.reg(
        r#""%" ~ /(a|v|s)/ ~ size_infix ~ /[0-2]/"#,
        "fn_gp_registers",
        fn_gp_registers,
    );
    ext.reg_in_modes(
        r#"/(a|v|s)/ ~ size_infix ~ /[0-2]/"#,
        &[("prefix", false)],
        "fn_gp_registers",
        fn_gp_registers,
    );

    ext.inst(r#""pop" ~ size_postfix register"#, "pop_inst", pop_inst);
    ext.inst(r#""push" ~ size_postfix register"#, "push_register_inst", push_register_inst);
    ext.inst(r#""push" ~ size_postfix immediate"#, "push_immediate_inst", push_immediate_inst);

    let conditions = one_of(CONDITION_CODES.iter().map(|&(name, _)| name));
    ext.inst(&format!("/j{conditions}/ register"), "cond_abs_reg_jump", cond_abs_reg_jump);
    ext.inst(&format!("/ret{conditions}/"), "cond_return", cond_return);
    ext.inst(&format!("/call{conditions}/ register"), "cond_abs_reg_call", cond_abs_reg_call);
    ext.inst(r#""call" symbol"#, "rel_near_imm_call", rel_near_imm_call);

    catalogue.register(ext);
}

fn fn_ptr_registers(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let name = values[0].str();
    let Some(&(_, index)) = REGISTERS.iter().find(|(known, _)| *known == name) else {
        unreachable!("pointer register {name} missing from the table")
    };
    Ok(Value::Register {
        size: values[1].size_tag(),
        index,
    })
}

fn fn_gp_registers(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let name = format!("{}{}", values[0].str(), values[2].str());
    let found = REGISTERS.iter().find(|(known, _)| *known == name);
    let Some(&(_, index)) = found else {
        return Err(Rejection::new(format!("unknown register name `{name}'")).into());
    };
    Ok(Value::Register {
        size: values[1].size_tag(),
        index,
    })
}

fn pop_inst(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let (size, regs) = validate_registers(&asm.context, &[&values[1]], values[0].size_tag())?;
    let exponent = asm.context.register_size(size)?;
    Ok(Value::Bytes(build(&[
        (0b00, 2),
        (exponent as u64, 2),
        (0xC, 4),
        (regs[0] as u64, 3),
        (6, 3),
        (0b00, 2),
    ])))
}

fn push_register_inst(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let (size, regs) = validate_registers(&asm.context, &[&values[1]], values[0].size_tag())?;
    let exponent = asm.context.register_size(size)?;
    Ok(Value::Bytes(build(&[
        (0b00, 2),
        (exponent as u64, 2),
        (0xD, 4),
        (6, 3),
        (regs[0] as u64, 3),
        (0b00, 2),
    ])))
}

fn push_immediate_inst(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let (size, _) = validate_registers(&asm.context, &[], values[0].size_tag())?;
    let imm = values[1].int();
    reject(!(0..32).contains(&imm), format!("invalid immediate {imm} for op `push'"))?;
    let exponent = asm.context.register_size(size)?;
    Ok(Value::Bytes(build(&[
        (0b01, 2),
        (exponent as u64, 2),
        (0xD, 4),
        (6, 3),
        (imm as u64, 5),
    ])))
}

fn cond_abs_reg_jump(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let suffix = &values[0].str()[1..];
    let Some(cc) = condition_code(suffix) else {
        unreachable!("condition {suffix} missing from the table")
    };
    let (_, regs) = validate_registers(&asm.context, &[&values[1]], None)?;
    Ok(Value::Bytes(build(&[
        (0xAF, 8),
        (regs[0] as u64, 3),
        (0b0, 1),
        (cc as u64, 4),
    ])))
}

fn cond_return(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let suffix = &values[0].str()[3..];
    reject(suffix == "mp", "`mp' is not a valid conditional return suffix")?;
    let Some(cc) = condition_code(suffix) else {
        unreachable!("condition {suffix} missing from the table")
    };
    Ok(Value::Bytes(build(&[(0xAF, 8), (0b111, 3), (0b0, 1), (cc as u64, 4)])))
}

fn cond_abs_reg_call(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let suffix = &values[0].str()[4..];
    reject(suffix == "mp", "`mp' is not a valid conditional call suffix")?;
    let Some(cc) = condition_code(suffix) else {
        unreachable!("condition {suffix} missing from the table")
    };
    let (_, regs) = validate_registers(&asm.context, &[&values[1]], None)?;
    Ok(Value::Bytes(build(&[
        (0xAF, 8),
        (regs[0] as u64, 3),
        (0b1, 1),
        (cc as u64, 4),
    ])))
}

fn rel_near_imm_call(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let (dots, name) = values[0].symbol();
    let name = name.to_string();
    let resolved = asm.context.resolve_symbol(dots, &name)?;
    let ip = asm.context.ip() as i128;
    let offset = match resolved {
        Some(target) => target - ip,
        None => 0,
    };
    reject(
        !(-2048..2048).contains(&offset),
        format!("cannot encode near call from `call {name}' at {ip:#06x}"),
    )?;
    Ok(Value::Bytes(build(&[(0xB, 4), (offset as u64 & 0xFFF, 12)])))
}
