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
fn forward_references_settle_to_real_addresses() {
    let source = "\
jmp skip
.half 0xAA
skip:
";
    // Two bytes of jump plus two of data; the offset lands past both.
    assert_eq!(
        assemble(source).to_bytes(None).unwrap(),
        vec![0x8E, 0x04, 0xAA, 0x00]
    );
}

#[test]
fn fixed_point_output_is_stable_across_reruns() {
    let source = "\
jmp end
.half end
end:
";
    let first = assemble(source);
    let second = assemble(source);
    assert_eq!(first, second);
    assert_eq!(
        first.to_bytes(None).unwrap(),
        vec![0x8E, 0x04, 0x04, 0x80]
    );
}

#[test]
fn monotonic_placement_holds_over_every_pass() {
    let source = "\
jmp end
.align 8
.half end
end:
";
    let result = assemble(source);
    let mut last = 0u64;
    for entry in &result.output {
        let address = entry.start_ip & 0xFFFF;
        assert!(address >= last, "placement went backwards");
        last = address + entry.binary.len() as u64;
    }
}

#[test]
fn undefined_symbols_become_hard_errors_on_the_next_pass() {
    let error = assemble_err("jmp nowhere\n");
    let message = error.to_string();
    assert!(message.contains("Symbol nowhere is not defined"), "{message}");
}

#[test]
fn mutually_chasing_sets_are_detected_as_stuck() {
    let error = assemble_err("\
.set x y
.set y x + 1
");
    assert!(matches!(error, Error::StuckProgress { .. }));
}

#[test]
fn local_labels_scope_under_their_global() {
    let source = "\
alpha:
.target:
.half .target
";
    // `.target` resolves to `alpha.target`, the address of the data itself.
    assert_eq!(assemble(source).to_bytes(None).unwrap(), vec![0x00, 0x80]);
}

#[test]
fn a_new_global_truncates_deeper_scopes() {
    let error = assemble_err("\
alpha:
.target:
.half 1
beta:
.half .target
");
    let message = error.to_string();
    assert!(message.contains("Symbol beta.target is not defined"), "{message}");
}

#[test]
fn local_jumps_resolve_within_the_scope() {
    let source = "\
spin:
.loop:
jmp .loop
";
    assert_eq!(assemble(source).to_bytes(None).unwrap(), vec![0x8E, 0x00]);
}
