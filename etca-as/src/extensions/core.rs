//! The `core` extension: directives, numeric atoms, the expression ladder,
//! symbol references, and macro invocation.

use etca_asm::{signed_le_bytes, Size};
use itertools::Itertools;

use crate::assembler::Assembler;
use crate::error::{reject, ActionError, Error, Rejection};
use crate::registry::{registry, Extension, Registry};
use crate::value::Value;

pub(crate) fn register(catalogue: &mut Registry) {
    let mut core = Extension::new(None, "core", "Core Assembly", true);

    core.inst(r"/\.(half|word|dword|qword)/ immediate*", "put_word", put_word);
    core.inst(r"/\.(ascii|utf8)/ ESCAPED_STRING", "put_string", put_string);
    core.inst(r"/\.(ascii|utf8)z/ ESCAPED_STRING", "put_stringz", put_stringz);

    core.inst(r"/\.b?align/ ~ size_postfix immediate", "balign", balign);
    core.inst(
        r#"/\.b?align/ ~ size_postfix immediate "," [ immediate ] [ "," immediate ]"#,
        "balign",
        balign,
    );
    core.inst(r"/\.p2align/ ~ size_postfix immediate", "p2align", p2align);
    core.inst(
        r#"/\.p2align/ ~ size_postfix immediate "," [ immediate ] [ "," immediate ]"#,
        "p2align",
        p2align,
    );

    core.inst(r#"".org" immediate [ "," immediate ]"#, "org", org);
    core.inst(r#"".set" symbol immediate"#, "set_symbol", set_symbol);
    core.inst(r#"NAME ":""#, "global_label", global_label);
    core.inst(r#"/\.+/ ~ NAME ":""#, "local_label", local_label);

    core.register_syntax("symbol", "NAME", "global_symbol_reference", global_symbol_reference);
    core.register_syntax("symbol", r"/\.+/ ~ NAME", "local_symbol_reference", local_symbol_reference);

    core.inst(
        r#"".extension" /\w+/ ( "," /\w+/ )*"#,
        "enable_extension",
        enable_extension,
    );
    core.inst(
        r#"".extensions" /\w+/ ( "," /\w+/ )*"#,
        "enable_extension",
        enable_extension,
    );

    core.register_syntax("atom", r"/[+-]?[0-9]+(_[0-9]+)*/", "atom_dec", atom_dec);
    core.register_syntax("atom", r"/[+-]?0[bB]_?[01]+(_[01]+)*/", "atom_bin", atom_bin);
    core.register_syntax("atom", r"/[+-]?0[oO]_?[0-7]+(_[0-7]+)*/", "atom_oct", atom_oct);
    core.register_syntax("atom", r"/[+-]?0x_?[0-9a-f]+(_[0-9a-f]+)*/i", "atom_hex", atom_hex);
    core.register_syntax("atom", r"/'([^'\\\n]|\\[^\n])'/", "atom_char", atom_char);
    core.register_syntax("atom", r"/\$/", "atom_ip", atom_ip);
    core.register_syntax("atom", "symbol", "immediate_symbol", immediate_symbol);

    core.register_syntax("immediate", "expression_or", "immediate", first_value);
    core.register_syntax(
        "expression_paren",
        r#""(" expression_or ")" | atom"#,
        "expr_paren",
        first_value,
    );
    core.register_syntax(
        "expression_unary",
        r"/~|!|-|\+/ expression_paren",
        "expr_unary",
        expr_unary,
    );
    core.register_syntax(
        "expression_mul",
        r"( expression_paren | expression_unary ) ( /\/|\*|%/ ( expression_paren | expression_unary ) )*",
        "expr_mul",
        expr_mul,
    );
    core.register_syntax(
        "expression_add",
        r"expression_mul ( /\+|-/ expression_mul )*",
        "expr_add",
        expr_add,
    );
    core.register_syntax(
        "expression_shift",
        r"expression_add ( /<<|>>/ expression_add )*",
        "expr_shift",
        expr_shift,
    );
    core.register_syntax(
        "expression_and",
        r#"expression_shift ( "&" expression_shift )*"#,
        "expr_and",
        expr_and,
    );
    core.register_syntax(
        "expression_xor",
        r#"expression_and ( "^" expression_and )*"#,
        "expr_xor",
        expr_xor,
    );
    core.register_syntax(
        "expression_or",
        r#"expression_xor ( "|" expression_xor )*"#,
        "expr_or",
        expr_or,
    );

    core.inst(
        r#"NAME ( /[^,\s][^,]*/ ( "," /[^,]+/ )* )?"#,
        "macro_invocation",
        macro_invocation,
    );

    catalogue.register(core);
}

fn word_width(directive: &str) -> usize {
    match directive {
        ".half" | ".word" => 2,
        ".dword" => 4,
        ".qword" => 8,
        other => unreachable!("unknown word directive {other}"),
    }
}

fn put_word(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let [directive, rest @ ..] = values else {
        unreachable!("word directive without its mnemonic token")
    };
    let width = word_width(directive.str());
    let mut bytes = Vec::with_capacity(rest.len() * width);
    for value in rest {
        bytes.extend(signed_le_bytes(value.int(), width)?);
    }
    Ok(Value::Bytes(bytes))
}

fn put_string(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let encoding = &values[0].str()[1..];
    let text = unescape_string(values[1].str())?;
    encode_string(encoding, &text)
}

fn put_stringz(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let token = values[0].str();
    let encoding = &token[1..token.len() - 1];
    let text = unescape_string(values[1].str())?;
    let mut value = encode_string(encoding, &text)?;
    if let Value::Bytes(bytes) = &mut value {
        bytes.push(0x00);
    }
    Ok(value)
}

fn encode_string(encoding: &str, text: &str) -> Result<Value, ActionError> {
    match encoding {
        "ascii" => {
            if !text.is_ascii() {
                return Err(Error::InvalidString(format!("{text:?} is not pure ASCII")).into());
            }
            Ok(Value::Bytes(text.as_bytes().to_vec()))
        }
        "utf8" => Ok(Value::Bytes(text.as_bytes().to_vec())),
        other => unreachable!("unknown string encoding {other}"),
    }
}

fn opt_int(value: &Value) -> Option<i128> {
    match value {
        Value::None => None,
        other => Some(other.int()),
    }
}

fn balign(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    align_to(
        asm,
        values[1].size_tag(),
        values[2].int(),
        values.get(3).and_then(opt_int),
        values.get(4).and_then(opt_int),
    )
}

fn p2align(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let power = values[2].int();
    reject(
        !(0..63).contains(&power),
        format!("invalid alignment power {power}"),
    )?;
    align_to(
        asm,
        values[1].size_tag(),
        1i128 << power,
        values.get(3).and_then(opt_int),
        values.get(4).and_then(opt_int),
    )
}

fn align_to(
    asm: &mut Assembler,
    size: Option<Size>,
    width: i128,
    fill: Option<i128>,
    max_skip: Option<i128>,
) -> Result<Value, ActionError> {
    reject(width <= 0, format!("alignment width {width} must be positive"))?;
    let ip = asm.context.ip() as i128;
    let delta = (width - ip.rem_euclid(width)).rem_euclid(width);
    let word_width = match size {
        Some(tag) => 1usize << asm.context.register_size(tag)?,
        None => 1,
    };
    if let Some(max_skip) = max_skip {
        if max_skip < width {
            return Ok(Value::None);
        }
    }
    match fill {
        None => Ok(Value::SetIp((ip + delta) as u64)),
        Some(fill) => {
            let unit = signed_le_bytes(fill, word_width)?;
            let delta = delta as usize;
            let mut bytes = Vec::with_capacity(delta);
            while bytes.len() < delta {
                let take = (delta - bytes.len()).min(unit.len());
                bytes.extend_from_slice(&unit[..take]);
            }
            Ok(Value::Bytes(bytes))
        }
    }
}

fn org(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let target = values[0].int();
    match values.get(1).and_then(opt_int) {
        None => Ok(Value::SetIp(target as u64)),
        Some(fill) => {
            let unit = signed_le_bytes(fill, 1)?;
            let delta = (target - asm.context.ip() as i128).max(0) as usize;
            Ok(Value::Bytes(unit.repeat(delta)))
        }
    }
}

fn set_symbol(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let (dots, name) = values[0].symbol();
    let name = name.to_string();
    let value = values[1].int();
    asm.context.set_symbol(dots, &name, value);
    Ok(Value::Bytes(Vec::new()))
}

fn global_label(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let name = values[0].str().to_string();
    let ip = asm.context.ip() as i128;
    asm.context.set_symbol(0, &name, ip);
    Ok(Value::Bytes(Vec::new()))
}

fn local_label(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let dots = values[0].str().len();
    let name = values[1].str().to_string();
    let ip = asm.context.ip() as i128;
    asm.context.set_symbol(dots, &name, ip);
    Ok(Value::Bytes(Vec::new()))
}

fn global_symbol_reference(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::Symbol {
        dots: 0,
        name: values[0].str().to_string(),
    })
}

fn local_symbol_reference(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::Symbol {
        dots: values[0].str().len(),
        name: values[1].str().to_string(),
    })
}

fn enable_extension(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    for value in values {
        let name = value.str();
        let known = asm.context.available_extensions.contains(name);
        let extension = registry().get(name).filter(|_| known);
        let Some(extension) = extension else {
            return Err(Error::UnknownExtension {
                name: name.to_string(),
                available: asm.context.available_extensions.iter().cloned().collect(),
            }
            .into());
        };
        if !asm.context.extension_enabled(name) {
            asm.context.enabled_extensions.push(extension);
            if let Some(init) = extension.init {
                init(&mut asm.context);
            }
        }
    }
    asm.reload_extensions()?;
    Ok(Value::None)
}

fn parse_radix(token: &str, radix: u32, prefix_len: usize) -> Result<Value, ActionError> {
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    let cleaned: String = digits[prefix_len..].chars().filter(|&c| c != '_').collect();
    let magnitude = i128::from_str_radix(&cleaned, radix)
        .map_err(|_| Rejection::new(format!("integer literal {token} out of range")))?;
    Ok(Value::Int(if negative { -magnitude } else { magnitude }))
}

fn atom_dec(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    parse_radix(values[0].str(), 10, 0)
}

fn atom_bin(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    parse_radix(values[0].str(), 2, 2)
}

fn atom_oct(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    parse_radix(values[0].str(), 8, 2)
}

fn atom_hex(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    parse_radix(values[0].str(), 16, 2)
}

fn atom_char(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let token = values[0].str();
    let inner = &token[1..token.len() - 1];
    let c = unescape_char(inner)?;
    Ok(Value::Int(c as i128))
}

fn atom_ip(asm: &mut Assembler, _values: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::Int(asm.context.ip() as i128))
}

fn immediate_symbol(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let (dots, name) = values[0].symbol();
    match asm.context.resolve_symbol(dots, name)? {
        Some(value) => Ok(Value::Int(value)),
        // Not defined yet in this pass; instruction creators see zero and the
        // multi-pass engine reruns once the symbol exists.
        None => Ok(Value::Int(0)),
    }
}

fn first_value(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    Ok(values[0].clone())
}

fn expr_unary(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let operand = values[1].int();
    Ok(Value::Int(match values[0].str() {
        "~" => !operand,
        "!" => i128::from(operand == 0),
        "-" => operand.wrapping_neg(),
        "+" => operand,
        other => unreachable!("unknown unary operator {other}"),
    }))
}

fn floor_div(a: i128, b: i128) -> i128 {
    let quotient = a.wrapping_div(b);
    if a % b != 0 && (a < 0) != (b < 0) {
        quotient - 1
    } else {
        quotient
    }
}

fn expr_mul(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let mut acc = values[0].int();
    for (op, operand) in values[1..].iter().tuples() {
        let rhs = operand.int();
        acc = match op.str() {
            "*" => acc.wrapping_mul(rhs),
            "/" => {
                reject(rhs == 0, "division by zero")?;
                floor_div(acc, rhs)
            }
            "%" => {
                reject(rhs == 0, "modulo by zero")?;
                acc.wrapping_sub(floor_div(acc, rhs).wrapping_mul(rhs))
            }
            other => unreachable!("unknown multiplicative operator {other}"),
        };
    }
    Ok(Value::Int(acc))
}

fn expr_add(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let mut acc = values[0].int();
    for (op, operand) in values[1..].iter().tuples() {
        let rhs = operand.int();
        acc = match op.str() {
            "+" => acc.wrapping_add(rhs),
            "-" => acc.wrapping_sub(rhs),
            other => unreachable!("unknown additive operator {other}"),
        };
    }
    Ok(Value::Int(acc))
}

fn expr_shift(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let mut acc = values[0].int();
    for (op, operand) in values[1..].iter().tuples() {
        let rhs = operand.int();
        reject(!(0..128).contains(&rhs), format!("invalid shift amount {rhs}"))?;
        acc = match op.str() {
            "<<" => acc << rhs as u32,
            ">>" => acc >> rhs as u32,
            other => unreachable!("unknown shift operator {other}"),
        };
    }
    Ok(Value::Int(acc))
}

fn expr_and(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::Int(values[1..].iter().fold(values[0].int(), |acc, v| acc & v.int())))
}

fn expr_xor(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::Int(values[1..].iter().fold(values[0].int(), |acc, v| acc ^ v.int())))
}

fn expr_or(_asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::Int(values[1..].iter().fold(values[0].int(), |acc, v| acc | v.int())))
}

fn macro_invocation(asm: &mut Assembler, values: &[Value]) -> Result<Value, ActionError> {
    let [name_value, arg_values @ ..] = values else {
        unreachable!("macro invocation without a name token")
    };
    let name = name_value.str();
    let args: Vec<String> = arg_values.iter().map(|v| v.str().trim().to_string()).collect();
    let Some(known) = asm.context.known_macros.get(name).cloned() else {
        return Err(Rejection::silent().into());
    };
    reject(
        known.argc != args.len(),
        format!(
            "unexpected number of arguments for macro {name} (got {}, expected {})",
            args.len(),
            known.argc
        ),
    )?;
    let mut body = known.body;
    for (index, arg) in args.iter().enumerate() {
        body = body.replace(&format!("{{{index}}}"), arg);
    }
    Ok(Value::Bytes(asm.expand_macro(&body)?))
}

fn unescape_string(raw: &str) -> Result<String, ActionError> {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                let (Some(hi), Some(lo)) = (hi, lo) else {
                    return Err(Error::InvalidString(format!("truncated \\x escape in {raw}")).into());
                };
                let code = u8::from_str_radix(&format!("{hi}{lo}"), 16)
                    .map_err(|_| Error::InvalidString(format!("bad \\x escape in {raw}")))?;
                out.push(code as char);
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return Err(Error::InvalidString(format!("dangling backslash in {raw}")).into()),
        }
    }
    Ok(out)
}

fn unescape_char(inner: &str) -> Result<char, ActionError> {
    let mut chars = inner.chars();
    let first = chars
        .next()
        .ok_or_else(|| Error::InvalidString("empty character literal".to_string()))?;
    if first != '\\' {
        return Ok(first);
    }
    match chars.next() {
        Some('n') => Ok('\n'),
        Some('r') => Ok('\r'),
        Some('t') => Ok('\t'),
        Some('0') => Ok('\0'),
        Some('\\') => Ok('\\'),
        Some('\'') => Ok('\''),
        Some('"') => Ok('"'),
        Some(other) => Ok(other),
        None => Err(Error::InvalidString("dangling backslash in character literal".to_string()).into()),
    }
}
