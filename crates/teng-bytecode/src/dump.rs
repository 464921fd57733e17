//! Human-readable disassembly of compiled programs.

use std::fmt::Write as _;

use crate::instr::InstrKind;
use crate::program::Program;

impl Program {
    /// Disassemble into one line per instruction, with pool operands
    /// resolved inline. Intended for debugging and snapshot tests.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (ip, instr) in self.instrs.iter().enumerate() {
            let _ = write!(out, "{ip:04} {}", instr.kind.name());
            match &instr.kind {
                InstrKind::PushInt(v) => {
                    let _ = write!(out, " {v}");
                }
                InstrKind::PushReal(v) => {
                    let _ = write!(out, " {v}");
                }
                InstrKind::PushStr(id) => {
                    let _ = write!(out, " {:?}", self.str(*id));
                }
                InstrKind::PushRegex(id) => {
                    let _ = write!(out, " {}", self.regex(*id));
                }
                InstrKind::Var { frame_offset, name, repr } => {
                    let _ = write!(
                        out,
                        " frame={} name={} repr={}",
                        frame_offset,
                        self.str(*name),
                        self.str(*repr),
                    );
                }
                InstrKind::PushAttr { name, path } => {
                    let _ = write!(out, " name={} path={}", self.str(*name), self.str(*path));
                }
                InstrKind::PushAttrAt { path } | InstrKind::PushParent { path } => {
                    let _ = write!(out, " path={}", self.str(*path));
                }
                InstrKind::And(off)
                | InstrKind::Or(off)
                | InstrKind::Jmp(off)
                | InstrKind::JmpIfNot(off)
                | InstrKind::NextFrag(off) => {
                    let _ = write!(out, " -> {:04}", target(ip, *off));
                }
                InstrKind::OpenFrag { name, exit } => {
                    let _ = write!(out, " {} exit -> {:04}", self.str(*name), target(ip, *exit));
                }
                InstrKind::PushCtype(id) | InstrKind::PushFormat(id) => {
                    let _ = write!(out, " {}", self.str(*id));
                }
                InstrKind::Call { name, argc } => {
                    let _ = write!(out, " {}/{argc}", self.str(*name));
                }
                InstrKind::Set { name } => {
                    let _ = write!(out, " {}", self.str(*name));
                }
                _ => {}
            }
            if let Some(pos) = instr.pos {
                let _ = write!(out, "  ; {pos}");
            }
            out.push('\n');
        }
        out
    }
}

fn target(ip: usize, off: i32) -> usize {
    (ip as i64 + 1 + off as i64) as usize
}
