use std::collections::BTreeSet;

use etca_as::{registry, Assembler, AssemblyResult, Error};
use rstest::rstest;

fn assemble(source: &str) -> AssemblyResult {
    Assembler::new(0, None, None)
        .expect("failed to build assembler")
        .n_pass(source)
        .expect("assembly failed")
}

fn bytes(source: &str) -> Vec<u8> {
    assemble(source).to_bytes(None).expect("flatten failed")
}

#[test]
fn the_catalogue_holds_the_compiled_in_extensions() {
    for strid in [
        "core",
        "base",
        "common_macros",
        "byte_operations",
        "dword_operations",
        "qword_operations",
        "functions",
        "exopc",
        "cachecontrol",
        "modes",
        "real32",
        "real64",
    ] {
        assert!(registry().get(strid).is_some(), "missing extension {strid}");
    }
    assert!(registry().get("base").unwrap().default_on);
    assert!(!registry().get("functions").unwrap().default_on);
}

#[test]
fn unknown_extensions_are_fatal() {
    let error = Assembler::new(0, None, None)
        .unwrap()
        .n_pass(".extension bogus\n")
        .unwrap_err();
    assert!(matches!(error, Error::UnknownExtension { .. }));
}

#[test]
fn extensions_outside_the_available_set_are_fatal() {
    let available: BTreeSet<String> = ["core", "base", "common_macros"]
        .into_iter()
        .map(str::to_string)
        .collect();
    let error = Assembler::new(0, None, Some(available))
        .unwrap()
        .n_pass(".extension functions\n")
        .unwrap_err();
    assert!(matches!(error, Error::UnknownExtension { .. }));
}

#[test]
fn ambiguous_encodings_resolve_to_the_shortest() {
    let source = "\
.extension byte_operations,functions
mov ax0, 5
";
    // The short-immediate form, not a movz/slo chain.
    assert_eq!(bytes(source), vec![0x59, 0x05]);
}

#[rstest]
#[case("pop r1", &[0x1C, 0x38])]
#[case("push r1", &[0x1D, 0xC4])]
#[case("push 5", &[0x5D, 0xC5])]
#[case("ret", &[0xAF, 0xEE])]
#[case("retz", &[0xAF, 0xE0])]
#[case("call r2", &[0xAF, 0x5E])]
fn encodes_stack_and_function_forms(#[case] line: &str, #[case] expected: &[u8]) {
    let source = format!(".extension functions\n{line}\n");
    assert_eq!(bytes(&source), expected);
}

#[test]
fn register_jumps_win_once_the_name_is_known_absent() {
    let source = "\
.extension functions
jmp r3
";
    assert_eq!(bytes(source), vec![0xAF, 0x6E]);
}

#[test]
fn named_abi_registers_map_to_indexes() {
    let source = "\
.extension functions
mov sp, 5
mov ln, 5
";
    // sp is r6, ln is r7.
    assert_eq!(bytes(source), vec![0x59, 0xC5, 0x59, 0xE5]);
}

#[test]
fn near_call_encodes_a_twelve_bit_offset() {
    let source = "\
.extension functions
call after
after:
";
    assert_eq!(bytes(source), vec![0xB0, 0x02]);
}

#[rstest]
#[case("adc r0, r1", &[0xE0, 0x10, 0x04])]
#[case("sbb r0, 5", &[0xE0, 0x51, 0x05])]
#[case("rsbb r1, r2", &[0xE0, 0x12, 0x28])]
fn encodes_expanded_opcodes(#[case] line: &str, #[case] expected: &[u8]) {
    let source = format!(".extension exopc\n{line}\n");
    assert_eq!(bytes(&source), expected);
}

#[test]
fn wide_jumps_take_the_scaled_offset_form() {
    let source = "\
.extension exopc
jmp far
.org 0x8500
far:
";
    let image = assemble(source);
    assert_eq!(image.output[0].binary, vec![0xF1, 0x00, 0x05]);
}

#[test]
fn near_jumps_still_win_under_exopc() {
    let source = "\
.extension exopc
jmp end
end:
";
    assert_eq!(bytes(source), vec![0x8E, 0x02]);
}

#[rstest]
#[case("cflush", &[0x8F, 0x01])]
#[case("invd", &[0x8F, 0x02])]
#[case("clzero r1", &[0x0F, 0x44])]
#[case("prefetchd r2", &[0x9F, 0x08])]
#[case("clflush r2", &[0x9F, 0x0A])]
fn encodes_cache_maintenance(#[case] line: &str, #[case] expected: &[u8]) {
    let source = format!(".extension cachecontrol\n{line}\n");
    assert_eq!(bytes(&source), expected);
}

#[test]
fn address_space_extensions_widen_the_ip_mask() {
    assert_eq!(assemble("nop\n").max_address_width, 16);
    assert_eq!(
        assemble(".extension real32\nnop\n").max_address_width,
        32
    );
    assert_eq!(
        assemble(".extension real64\nnop\n").max_address_width,
        64
    );
}

#[test]
fn the_mode_register_becomes_nameable_with_an_address_space() {
    let source = "\
.extension real32
mov r0, mode
";
    // mfcr r0, 17
    assert_eq!(bytes(source), vec![0x5E, 0x11]);
}

#[test]
fn qword_moves_use_slo_chains_for_wide_values() {
    let source = "\
.extension qword_operations
mov rq0, 0x1_0000_0000
";
    let image = bytes(source);
    // movzq head followed by six sloq shifts.
    let mut expected = vec![0x78, 0x04];
    expected.extend([0x7C, 0x00].repeat(6));
    assert_eq!(image, expected);
}
