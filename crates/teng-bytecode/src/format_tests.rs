use teng_core::{CompiledRegex, Pos};

use super::*;

fn sample_program() -> Program {
    let mut program = Program::new();
    let name = program.strings.intern("var");
    let repr = program.strings.intern(".var");
    let hello = program.strings.intern("hello");
    program.add_regex(CompiledRegex::new("ab+", "i").unwrap());
    program.instrs.push(Instr::new(InstrKind::PushStr(hello), Pos::new(1, 0)));
    program.instrs.push(Instr::new(InstrKind::PrintRaw, Pos::new(1, 0)));
    program.instrs.push(Instr::new(
        InstrKind::Var { frame_offset: 0, name, repr },
        Pos::new(1, 8),
    ));
    program.instrs.push(Instr::new(InstrKind::PushRegex(0), Pos::new(1, 12)));
    program.instrs.push(Instr::new(InstrKind::MatchRe, Pos::new(1, 12)));
    program.instrs.push(Instr::new(InstrKind::JmpIfNot(2), Pos::new(1, 12)));
    program.instrs.push(Instr::new(InstrKind::PushInt(42), Pos::new(1, 20)));
    program.instrs.push(Instr::new(InstrKind::Print, Pos::new(1, 20)));
    program.instrs.push(Instr { kind: InstrKind::Halt, pos: None });
    program
}

#[test]
fn roundtrip_with_positions() {
    let program = sample_program();
    let bytes = program.to_bytes(true);
    let decoded = Program::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.instrs, program.instrs);
    assert_eq!(decoded.strings.len(), program.strings.len());
    assert_eq!(decoded.regexes.len(), 1);
    assert_eq!(decoded.regexes[0].pattern, "ab+");
    assert_eq!(decoded.regexes[0].flags, "i");
}

#[test]
fn roundtrip_without_positions_drops_them() {
    let program = sample_program();
    let bytes_full = program.to_bytes(true);
    let bytes_bare = program.to_bytes(false);
    assert!(bytes_bare.len() < bytes_full.len());

    let decoded = Program::from_bytes(&bytes_bare).unwrap();
    assert!(decoded.instrs.iter().all(|i| i.pos.is_none()));
    assert_eq!(decoded.instrs.len(), program.instrs.len());
}

#[test]
fn bad_magic_is_rejected() {
    let err = Program::from_bytes(b"XXXX12345678").unwrap_err();
    assert!(matches!(err, ProgramFormatError::BadMagic));
}

#[test]
fn corrupted_body_fails_checksum() {
    let mut bytes = sample_program().to_bytes(true);
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    let err = Program::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, ProgramFormatError::BadChecksum));
}

#[test]
fn truncated_stream_is_detected() {
    let bytes = sample_program().to_bytes(true);
    // cutting inside the body corrupts the checksum before it truncates
    let err = Program::from_bytes(&bytes[..10]).unwrap_err();
    assert!(matches!(err, ProgramFormatError::Truncated | ProgramFormatError::BadChecksum));
}
