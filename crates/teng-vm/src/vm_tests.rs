use teng_bytecode::{Instr, InstrKind, Program};
use teng_core::{ErrorLog, Fragment, Pos, Severity};

use crate::sink::StringSink;
use crate::vm::Vm;

fn run(program: &Program, root: &Fragment) -> (String, ErrorLog) {
    let mut sink = StringSink::new();
    let mut log = ErrorLog::new();
    Vm::new(program, root).run(&mut sink, &mut log);
    (sink.into_string(), log)
}

fn asm(kinds: Vec<InstrKind>) -> Program {
    let mut program = Program::new();
    for kind in kinds {
        program.instrs.push(Instr::new(kind, Pos::new(1, 0)));
    }
    program
}

#[test]
fn integral_arithmetic() {
    let program = asm(vec![
        InstrKind::PushInt(7),
        InstrKind::PushInt(3),
        InstrKind::Sub,
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ]);
    let (out, log) = run(&program, &Fragment::new());
    assert_eq!(out, "4");
    assert!(log.is_empty());
}

#[test]
fn mixed_arithmetic_promotes_to_real() {
    let program = asm(vec![
        InstrKind::PushInt(1),
        InstrKind::PushReal(0.5),
        InstrKind::Add,
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ]);
    let (out, _) = run(&program, &Fragment::new());
    assert_eq!(out, "1.5");
}

#[test]
fn division_by_zero_yields_undefined_with_an_error() {
    let program = asm(vec![
        InstrKind::PushInt(1),
        InstrKind::PushInt(0),
        InstrKind::Div,
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ]);
    let (out, log) = run(&program, &Fragment::new());
    assert_eq!(out, "undefined");
    assert_eq!(log.entries().len(), 1);
    assert_eq!(log.entries()[0].severity, Severity::Error);
    assert_eq!(
        log.entries()[0].msg,
        "Runtime: right operand of / division operator is zero",
    );
}

#[test]
fn string_coercion_in_arithmetic_is_strict() {
    let mut root = Fragment::new();
    root.add_variable("v", "12suffix");
    let mut program = Program::new();
    let name = program.strings.intern("v");
    let repr = program.strings.intern(".v");
    for kind in [
        InstrKind::Var { frame_offset: 0, name, repr },
        InstrKind::PushInt(1),
        InstrKind::Add,
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ] {
        program.instrs.push(Instr::new(kind, Pos::new(1, 0)));
    }
    let (out, log) = run(&program, &root);
    assert_eq!(out, "undefined");
    assert_eq!(log.entries().len(), 1);
    assert_eq!(
        log.entries()[0].msg,
        "Runtime: Left operand of + numeric operator is string_ref",
    );
}

#[test]
fn print_escapes_through_the_active_content_type() {
    let mut program = Program::new();
    let danger = program.strings.intern("&<>\"");
    let shell = program.strings.intern("application/x-sh");
    for kind in [
        InstrKind::PushStr(danger),
        InstrKind::Print,
        InstrKind::PushCtype(shell),
        InstrKind::PushStr(danger),
        InstrKind::Print,
        InstrKind::PopCtype,
        InstrKind::PushStr(danger),
        InstrKind::Print,
        InstrKind::Halt,
    ] {
        program.instrs.push(Instr::new(kind, Pos::new(1, 0)));
    }
    let (out, log) = run(&program, &Fragment::new());
    assert_eq!(out, "&amp;&lt;&gt;&quot;&<>\"&amp;&lt;&gt;&quot;");
    assert!(log.is_empty());
}

#[test]
fn print_raw_bypasses_escaping() {
    let mut program = Program::new();
    let danger = program.strings.intern("&<>");
    for kind in [InstrKind::PushStr(danger), InstrKind::PrintRaw, InstrKind::Halt] {
        program.instrs.push(Instr::new(kind, Pos::new(1, 0)));
    }
    let (out, _) = run(&program, &Fragment::new());
    assert_eq!(out, "&<>");
}

#[test]
fn unknown_ctype_falls_back_to_the_top_escaper() {
    let mut program = Program::new();
    let bogus = program.strings.intern("unknown/unknown");
    let danger = program.strings.intern("<x>");
    for kind in [
        InstrKind::PushCtype(bogus),
        InstrKind::PushStr(danger),
        InstrKind::Print,
        InstrKind::Halt,
    ] {
        program.instrs.push(Instr::new(kind, Pos::new(1, 9)));
    }
    let (out, log) = run(&program, &Fragment::new());
    assert_eq!(out, "&lt;x&gt;");
    assert_eq!(log.entries().len(), 1);
    assert_eq!(
        log.entries()[0].msg,
        "Invalid content type 'unknown/unknown'; using top instead",
    );
}

#[test]
fn fragment_iteration_binds_builtin_variables() {
    let mut root = Fragment::new();
    let list = root.add_fragment_list("items");
    list.add_fragment();
    list.add_fragment();
    list.add_fragment();

    let mut program = Program::new();
    let items = program.strings.intern("items");
    let index = program.strings.intern("_index");
    let repr = program.strings.intern(".items._index");
    let sep = program.strings.intern(";");
    for kind in [
        // 0: open, exit past the CLOSE_FRAG at 6
        InstrKind::OpenFrag { name: items, exit: 6 },
        // 1..=3: body prints _index and a separator
        InstrKind::Var { frame_offset: 1, name: index, repr },
        InstrKind::PrintRaw,
        InstrKind::PushStr(sep),
        InstrKind::PrintRaw,
        // 5: loop
        InstrKind::NextFrag(-5),
        InstrKind::CloseFrag,
        InstrKind::Halt,
    ] {
        program.instrs.push(Instr::new(kind, Pos::new(1, 0)));
    }
    let (out, log) = run(&program, &root);
    assert_eq!(out, "0;1;2;");
    assert!(log.is_empty());
}

#[test]
fn empty_fragment_list_skips_the_body() {
    let mut root = Fragment::new();
    root.add_fragment_list("items");

    let mut program = Program::new();
    let items = program.strings.intern("items");
    let body = program.strings.intern("body");
    for kind in [
        InstrKind::OpenFrag { name: items, exit: 4 },
        InstrKind::PushStr(body),
        InstrKind::PrintRaw,
        InstrKind::NextFrag(-3),
        InstrKind::CloseFrag,
        InstrKind::Halt,
    ] {
        program.instrs.push(Instr::new(kind, Pos::new(1, 0)));
    }
    let (out, log) = run(&program, &root);
    assert_eq!(out, "");
    assert!(log.is_empty());
}

#[test]
fn and_or_preserve_operand_values() {
    // 3 || 0 --> 3
    let program = asm(vec![
        InstrKind::PushInt(3),
        InstrKind::Or(1),
        InstrKind::PushInt(0),
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ]);
    let (out, _) = run(&program, &Fragment::new());
    assert_eq!(out, "3");

    // 3 && 2 --> 2
    let program = asm(vec![
        InstrKind::PushInt(3),
        InstrKind::And(1),
        InstrKind::PushInt(2),
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ]);
    let (out, _) = run(&program, &Fragment::new());
    assert_eq!(out, "2");

    // 0 && 9 --> 0
    let program = asm(vec![
        InstrKind::PushInt(0),
        InstrKind::And(1),
        InstrKind::PushInt(9),
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ]);
    let (out, _) = run(&program, &Fragment::new());
    assert_eq!(out, "0");
}

#[test]
fn repeat_stringifies_the_left_operand() {
    let program = asm(vec![
        InstrKind::PushReal(0.0),
        InstrKind::PushInt(3),
        InstrKind::Repeat,
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ]);
    let (out, _) = run(&program, &Fragment::new());
    assert_eq!(out, "0.00.00.0");
}

#[test]
fn missing_variable_warns_with_open_frags_state() {
    let mut program = Program::new();
    let name = program.strings.intern("missing");
    let repr = program.strings.intern(".missing");
    for kind in [
        InstrKind::Var { frame_offset: 0, name, repr },
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ] {
        program.instrs.push(Instr::new(kind, Pos::new(1, 2)));
    }
    let (out, log) = run(&program, &Fragment::new());
    assert_eq!(out, "undefined");
    assert_eq!(
        log.entries()[0].msg,
        "Runtime: Variable '.missing' is undefined [open_frags=., iteration=0/1]",
    );
}

#[test]
fn suppression_hides_path_warnings() {
    let mut program = Program::new();
    let name = program.strings.intern("missing");
    let path = program.strings.intern("");
    for kind in [
        InstrKind::SuppressBegin,
        InstrKind::PushThisFrag,
        InstrKind::PushAttr { name, path },
        InstrKind::SuppressEnd,
        InstrKind::Exists,
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ] {
        program.instrs.push(Instr::new(kind, Pos::new(1, 0)));
    }
    let (out, log) = run(&program, &Fragment::new());
    assert_eq!(out, "0");
    assert!(log.is_empty());
}

#[test]
fn stack_underflow_is_fatal() {
    let program = asm(vec![InstrKind::Add, InstrKind::Halt]);
    let (out, log) = run(&program, &Fragment::new());
    assert_eq!(out, "");
    assert_eq!(log.entries().len(), 1);
    assert_eq!(log.entries()[0].severity, Severity::Fatal);
}

#[test]
fn set_variables_resolve_after_data_tree_misses() {
    let mut program = Program::new();
    let x = program.strings.intern("x");
    let repr = program.strings.intern(".x");
    for kind in [
        InstrKind::PushInt(42),
        InstrKind::Set { name: x },
        InstrKind::Var { frame_offset: 0, name: x, repr },
        InstrKind::PrintRaw,
        InstrKind::Halt,
    ] {
        program.instrs.push(Instr::new(kind, Pos::new(1, 0)));
    }
    let (out, log) = run(&program, &Fragment::new());
    assert_eq!(out, "42");
    assert!(log.is_empty());
}
