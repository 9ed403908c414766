use std::collections::BTreeSet;

use etca_as::{Assembler, Error};
use rstest::rstest;

fn bytes(source: &str) -> Vec<u8> {
    Assembler::new(0, None, None)
        .expect("failed to build assembler")
        .n_pass(source)
        .expect("assembly failed")
        .to_bytes(None)
        .expect("flatten failed")
}

fn assemble_err(source: &str) -> Error {
    Assembler::new(0, None, None)
        .unwrap()
        .n_pass(source)
        .unwrap_err()
}

#[rstest]
#[case("add r0, r1", &[0x10, 0x04])]
#[case("sub r2, r3", &[0x11, 0x4C])]
#[case("cmp r0, r1", &[0x13, 0x04])]
#[case("comp r0, r1", &[0x13, 0x04])]
#[case("test r1, r2", &[0x17, 0x28])]
#[case("xor r3, r3", &[0x15, 0x6C])]
#[case("ld r0, r1", &[0x1A, 0x04])]
#[case("st r0, r1", &[0x1B, 0x04])]
fn encodes_two_register_forms(#[case] source: &str, #[case] expected: &[u8]) {
    assert_eq!(bytes(source), expected);
}

#[rstest]
#[case("mov r0, 5", &[0x59, 0x05])]
#[case("movs r0, 5", &[0x59, 0x05])]
#[case("mov r1, -1", &[0x59, 0x3F])]
#[case("add r0, -16", &[0x50, 0x10])]
#[case("slo r0, 31", &[0x5C, 0x1F])]
#[case("movz r0, 17", &[0x58, 0x11])]
fn encodes_immediate_forms(#[case] source: &str, #[case] expected: &[u8]) {
    assert_eq!(bytes(source), expected);
}

#[test]
fn nop_and_halt_are_fixed_jumps() {
    assert_eq!(bytes("nop"), vec![0x8F, 0x00]);
    assert_eq!(bytes("halt"), vec![0x8E, 0x00]);
    assert_eq!(bytes("hlt"), vec![0x8E, 0x00]);
}

#[test]
fn forward_jump_reaches_past_its_own_encoding() {
    let source = "\
jmp end
end:
";
    // offset == the jump's own length once `end` settles.
    assert_eq!(bytes(source), vec![0x8E, 0x02]);
}

#[test]
fn backward_jump_sets_the_sign_bit() {
    let source = "\
start:
nop
jmp start
";
    assert_eq!(bytes(source), vec![0x8F, 0x00, 0x9E, 0xFE]);
}

#[test]
fn conditional_jumps_take_their_condition_code() {
    assert_eq!(bytes("jz end\nend:\n"), vec![0x80, 0x02]);
    assert_eq!(bytes("jne end\nend:\n"), vec![0x81, 0x02]);
}

#[test]
fn near_jump_out_of_range_reports_the_rejection() {
    let error = assemble_err("\
jmp far
.org 0x9000
far:
");
    let message = error.to_string();
    assert!(message.contains("cannot encode near jump"), "{message}");
}

#[test]
fn mov_with_a_control_register_becomes_mfcr_mtcr() {
    assert_eq!(bytes("mfcr r0, 0"), vec![0x5E, 0x00]);
    assert_eq!(bytes("mov r0, cpuid"), vec![0x5E, 0x00]);
    assert_eq!(bytes("mtcr r1, 2"), vec![0x5F, 0x22]);
    assert_eq!(bytes("mov feat, r1"), vec![0x5F, 0x22]);
    assert_eq!(bytes("mov cr5, r1"), vec![0x5F, 0x25]);
}

#[test]
fn mov_with_memory_brackets_becomes_load_store() {
    assert_eq!(bytes("mov r0, [r1]"), bytes("ld r0, r1"));
    assert_eq!(bytes("mov [r1], r0"), bytes("st r0, r1"));
}

#[test]
fn large_immediates_expand_into_movz_slo_chains() {
    assert_eq!(bytes("mov r0, 0x100"), vec![0x58, 0x08, 0x5C, 0x00]);
    // The short form still wins when it applies.
    assert_eq!(bytes("mov r0, 5").len(), 2);
}

#[test]
fn immediate_out_of_every_form_is_unknown() {
    let error = assemble_err("add r0, 100000\n");
    assert!(matches!(error, Error::UnknownInstruction { .. }));
}

#[test]
fn register_out_of_range_is_unknown() {
    let error = assemble_err("add r8, r1\n");
    let message = error.to_string();
    assert!(message.contains("out of valid range"), "{message}");
}

#[test]
fn prefix_mode_requires_percent_registers() {
    let mut modes = BTreeSet::new();
    modes.insert("prefix".to_string());
    let mut assembler = Assembler::new(0, Some(modes), None).unwrap();
    let result = assembler.n_pass("mov %r1, 3\n").unwrap();
    assert_eq!(result.to_bytes(None).unwrap(), vec![0x59, 0x23]);

    let mut assembler = Assembler::new(
        0,
        Some(BTreeSet::from(["prefix".to_string()])),
        None,
    )
    .unwrap();
    assert!(assembler.n_pass("mov r1, 3\n").is_err());
}

#[test]
fn syntax_directive_switches_register_spelling() {
    let source = "\
.syntax prefix
mov %r1, 3
.syntax noprefix
mov r1, 3
";
    assert_eq!(bytes(source), vec![0x59, 0x23, 0x59, 0x23]);
}

#[test]
fn strict_mode_demands_explicit_sizes() {
    assert_eq!(bytes(".strict\naddx rx0, rx1\n"), vec![0x10, 0x04]);
    assert!(Assembler::new(0, None, None)
        .unwrap()
        .n_pass(".strict\nadd r0, r1\n")
        .is_err());
}

#[test]
fn conflicting_size_tags_reject() {
    let error = assemble_err("\
.extension byte_operations
addx rh0, rh1
");
    let message = error.to_string();
    assert!(message.contains("conflicting register sizes"), "{message}");
}

#[test]
fn explicit_size_tags_choose_the_operand_width() {
    assert_eq!(bytes("addx rx0, rx1"), vec![0x10, 0x04]);
    assert_eq!(
        bytes(".extension byte_operations\naddh rh0, rh1\n"),
        vec![0x00, 0x04]
    );
    // Enabling a wider size moves the default for untagged operands.
    assert_eq!(
        bytes(".extension qword_operations\nadd r0, r1\n"),
        vec![0x30, 0x04]
    );
}
