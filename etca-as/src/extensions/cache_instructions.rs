//! The `cachecontrol` extension: cache maintenance instructions.

use etca_asm::build;

use crate::assembler::Assembler;
use crate::error::ActionError;
use crate::registry::{Extension, Registry};
use crate::value::Value;

use super::base_isa::validate_registers;

pub(crate) fn register(catalogue: &mut Registry) {
    let mut ext = Extension::new(Some(6), "cachecontrol", "Cache Instructions", false);
    ext.inst(r#""clzero" register"#, "clzero", clzero);
    ext.inst(r#""invdda" register"#, "invalidate_dcache_by_address", invalidate_dcache_by_address);
    ext.inst(r#""invdia" register"#, "invalidate_icache_by_address", invalidate_icache_by_address);
    ext.inst(r#""cflush""#, "cache_flush", cache_flush);
    ext.inst(r#""invd""#, "cache_invalidate", cache_invalidate);
    ext.inst(r#""prefetchd" register"#, "data_prefetch", data_prefetch);
    ext.inst(r#""prefetchi" register"#, "inst_prefetch", inst_prefetch);
    ext.inst(r#""clflush" register"#, "cache_line_flush", cache_line_flush);
    catalogue.register(ext);
}

fn operand(asm: &Assembler, value: &Value) -> Result<u8, ActionError> {
    let (_, regs) = validate_registers(&asm.context, &[value], None)?;
    Ok(regs[0])
}

fn clzero(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let reg = operand(asm, &values[0])?;
    Ok(Value::Bytes(build(&[(0xF, 8), (0b010, 3), (reg as u64, 3), (0, 2)])))
}

fn invalidate_dcache_by_address(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let reg = operand(asm, &values[0])?;
    Ok(Value::Bytes(build(&[(0xF, 8), (0b011, 3), (reg as u64, 3), (0, 2)])))
}

fn invalidate_icache_by_address(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let reg = operand(asm, &values[0])?;
    Ok(Value::Bytes(build(&[(0x9F, 8), (0, 3), (reg as u64, 3), (3, 2)])))
}

fn cache_flush(_asm: &mut Assembler, _values: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::Bytes(vec![0x8F, 0x01]))
}

fn cache_invalidate(_asm: &mut Assembler, _values: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::Bytes(vec![0x8F, 0x02]))
}

fn data_prefetch(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let reg = operand(asm, &values[0])?;
    Ok(Value::Bytes(build(&[(0x9F, 8), (0, 3), (reg as u64, 3), (0, 2)])))
}

fn inst_prefetch(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let reg = operand(asm, &values[0])?;
    Ok(Value::Bytes(build(&[(0x9F, 8), (0, 3), (reg as u64, 3), (1, 2)])))
}

fn cache_line_flush(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let reg = operand(asm, &values[0])?;
    Ok(Value::Bytes(build(&[(0x9F, 8), (0, 3), (reg as u64, 3), (2, 2)])))
}
