use teng_core::Pos;

use super::*;

#[test]
fn string_pool_interns() {
    let mut pool = StringPool::new();
    let a = pool.intern("hello");
    let b = pool.intern("world");
    let c = pool.intern("hello");
    assert_eq!(a, c);
    assert_ne!(a, b);
    assert_eq!(pool.get(a), "hello");
    assert_eq!(pool.len(), 2);
}

#[test]
fn dump_resolves_pool_operands() {
    let mut program = Program::new();
    let s = program.strings.intern("danger");
    program.instrs.push(Instr::new(
        InstrKind::Var { frame_offset: 0, name: s, repr: program.strings.intern(".danger") },
        Pos::new(1, 2),
    ));
    program.instrs.push(Instr::new(InstrKind::Print, Pos::new(1, 2)));
    program.instrs.push(Instr { kind: InstrKind::Halt, pos: None });

    insta::assert_snapshot!(program.dump(), @r"
    0000 LOAD_VAR frame=0 name=danger repr=.danger  ; 1:2
    0001 PRINT  ; 1:2
    0002 HALT
    ");
}

#[test]
fn jump_targets_are_absolute_in_dump() {
    let mut program = Program::new();
    program.instrs.push(Instr { kind: InstrKind::PushInt(1), pos: None });
    program.instrs.push(Instr { kind: InstrKind::JmpIfNot(1), pos: None });
    program.instrs.push(Instr { kind: InstrKind::Jmp(-3), pos: None });
    program.instrs.push(Instr { kind: InstrKind::Halt, pos: None });

    insta::assert_snapshot!(program.dump(), @r"
    0000 PUSH_INT 1
    0001 JMP_IF_NOT -> 0003
    0002 JMP -> 0000
    0003 HALT
    ");
}
