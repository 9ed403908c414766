use etca_as::{Assembler, AssemblyResult, Error};

fn assemble(source: &str) -> AssemblyResult {
    Assembler::new(0, None, None)
        .expect("failed to build assembler")
        .n_pass(source)
        .expect("assembly failed")
}

fn assemble_err(source: &str) -> Error {
    Assembler::new(0, None, None)
        .unwrap()
        .n_pass(source)
        .unwrap_err()
}

#[test]
fn macro_bodies_expand_at_the_invocation_site() {
    let source = "\
.macro put2 2
.half {0}
.half {1}
.endmacro
put2 3, 4
";
    let result = assemble(source);
    // One payload entry at the invocation site.
    assert_eq!(result.output.len(), 1);
    assert_eq!(result.output[0].raw_line, "put2 3, 4");
    assert_eq!(
        result.to_bytes(None).unwrap(),
        vec![0x03, 0x00, 0x04, 0x00]
    );
}

#[test]
fn ip_advances_by_exactly_the_emitted_bytes() {
    let source = "\
.macro put2 2
.half {0}
.half {1}
.endmacro
put2 1, 2
put2 3, 4
";
    let result = assemble(source);
    assert_eq!(result.output.len(), 2);
    assert_eq!(result.output[0].start_ip & 0xFFFF, 0x8000);
    assert_eq!(result.output[1].start_ip & 0xFFFF, 0x8004);
    assert_eq!(
        result.to_bytes(None).unwrap(),
        vec![0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00]
    );
}

#[test]
fn arguments_substitute_into_instruction_operands() {
    let source = "\
.macro addboth 1
add r0, {0}
add r1, {0}
.endmacro
addboth 7
";
    assert_eq!(
        assemble(source).to_bytes(None).unwrap(),
        vec![0x50, 0x07, 0x50, 0x27]
    );
}

#[test]
fn wrong_argument_count_rejects_the_invocation() {
    let error = assemble_err("\
.macro put2 2
.half {0}
.half {1}
.endmacro
put2 3
");
    let message = error.to_string();
    assert!(message.contains("unexpected number of arguments"), "{message}");
}

#[test]
fn unknown_names_stay_unknown_instructions() {
    let error = assemble_err("frobnicate r0\n");
    assert!(matches!(error, Error::UnknownInstruction { .. }));
}

#[test]
fn malformed_macro_headers_are_fatal() {
    let error = assemble_err(".macro broken\n.endmacro\n");
    assert!(matches!(error, Error::MalformedDirective { .. }));
}

#[test]
fn labels_defined_inside_macros_persist() {
    let source = "\
.macro mark 0
spot:
.endmacro
mark
.half spot
";
    assert_eq!(assemble(source).to_bytes(None).unwrap(), vec![0x00, 0x80]);
}
