//! The persisted program format.
//!
//! Little-endian byte stream:
//!
//! ```text
//! magic  "TBC1"            4 bytes
//! flags  u32               bit 0 = positions present
//! crc32  u32               over everything after the header
//! count  u32               instruction count
//! instructions             opcode u8 + operands, see the opcode table
//!                          [+ line u32, col u32 when positions present;
//!                           line 0 marks a stripped position]
//! string pool              count u32, then len u32 + UTF-8 bytes each
//! regex pool               count u32, then len u32 + pattern bytes +
//!                          len u32 + flags bytes each
//! ```

use teng_core::{CompiledRegex, Pos};
use thiserror::Error;

use crate::instr::{Instr, InstrKind};
use crate::program::{Program, StringPool};

const MAGIC: &[u8; 4] = b"TBC1";
const FLAG_POSITIONS: u32 = 1;

/// Errors produced while decoding a persisted program.
#[derive(Debug, Error)]
pub enum ProgramFormatError {
    #[error("bad magic; not a compiled template")]
    BadMagic,
    #[error("checksum mismatch; the compiled template is corrupted")]
    BadChecksum,
    #[error("truncated program")]
    Truncated,
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("string pool entry is not valid UTF-8")]
    BadString,
    #[error("regex pool entry failed to compile: {0}")]
    BadRegex(#[from] regex::Error),
}

// one byte per operation; extending the table is append-only
mod op {
    pub const PUSH_INT: u8 = 0x01;
    pub const PUSH_REAL: u8 = 0x02;
    pub const PUSH_STR: u8 = 0x03;
    pub const PUSH_REGEX: u8 = 0x04;
    pub const PUSH_UNDEF: u8 = 0x05;
    pub const VAR: u8 = 0x06;
    pub const PUSH_THIS_FRAG: u8 = 0x07;
    pub const PUSH_ROOT_FRAG: u8 = 0x08;
    pub const PUSH_ATTR: u8 = 0x09;
    pub const PUSH_ATTR_AT: u8 = 0x0a;
    pub const PUSH_PARENT: u8 = 0x0b;
    pub const DUP: u8 = 0x0c;
    pub const POP: u8 = 0x0d;
    pub const ADD: u8 = 0x10;
    pub const SUB: u8 = 0x11;
    pub const MUL: u8 = 0x12;
    pub const DIV: u8 = 0x13;
    pub const MOD: u8 = 0x14;
    pub const CONCAT: u8 = 0x15;
    pub const REPEAT: u8 = 0x16;
    pub const BITAND: u8 = 0x17;
    pub const BITOR: u8 = 0x18;
    pub const BITXOR: u8 = 0x19;
    pub const EQ: u8 = 0x1a;
    pub const NE: u8 = 0x1b;
    pub const LT: u8 = 0x1c;
    pub const LE: u8 = 0x1d;
    pub const GT: u8 = 0x1e;
    pub const GE: u8 = 0x1f;
    pub const MATCH_RE: u8 = 0x20;
    pub const NMATCH_RE: u8 = 0x21;
    pub const NEG: u8 = 0x22;
    pub const POS: u8 = 0x23;
    pub const BITNOT: u8 = 0x24;
    pub const NOT: u8 = 0x25;
    pub const AND: u8 = 0x26;
    pub const OR: u8 = 0x27;
    pub const JMP: u8 = 0x28;
    pub const JMP_IF_NOT: u8 = 0x29;
    pub const OPEN_FRAG: u8 = 0x30;
    pub const NEXT_FRAG: u8 = 0x31;
    pub const CLOSE_FRAG: u8 = 0x32;
    pub const PRINT: u8 = 0x38;
    pub const PRINT_RAW: u8 = 0x39;
    pub const PUSH_CTYPE: u8 = 0x3a;
    pub const POP_CTYPE: u8 = 0x3b;
    pub const PUSH_FORMAT: u8 = 0x3c;
    pub const POP_FORMAT: u8 = 0x3d;
    pub const CALL_FN: u8 = 0x40;
    pub const EXISTS: u8 = 0x41;
    pub const IS_EMPTY: u8 = 0x42;
    pub const TYPE_OF: u8 = 0x43;
    pub const COUNT: u8 = 0x44;
    pub const DEFINED: u8 = 0x45;
    pub const JSONIFY: u8 = 0x46;
    pub const SUPPRESS_BEGIN: u8 = 0x47;
    pub const SUPPRESS_END: u8 = 0x48;
    pub const DICT_LOOKUP: u8 = 0x49;
    pub const SET_VAR: u8 = 0x4a;
    pub const HALT: u8 = 0x7f;
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }
    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn bytes(&mut self, v: &[u8]) {
        self.u32(v.len() as u32);
        self.buf.extend_from_slice(v);
    }
}

struct Reader<'b> {
    buf: &'b [u8],
    pos: usize,
}

impl<'b> Reader<'b> {
    fn take(&mut self, n: usize) -> Result<&'b [u8], ProgramFormatError> {
        if self.pos + n > self.buf.len() {
            return Err(ProgramFormatError::Truncated);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
    fn u8(&mut self) -> Result<u8, ProgramFormatError> {
        Ok(self.take(1)?[0])
    }
    fn u16(&mut self) -> Result<u16, ProgramFormatError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }
    fn u32(&mut self) -> Result<u32, ProgramFormatError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }
    fn i32(&mut self) -> Result<i32, ProgramFormatError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }
    fn i64(&mut self) -> Result<i64, ProgramFormatError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }
    fn f64(&mut self) -> Result<f64, ProgramFormatError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }
    fn str_bytes(&mut self) -> Result<&'b [u8], ProgramFormatError> {
        let len = self.u32()? as usize;
        self.take(len)
    }
}

impl Program {
    /// Serialize the program. `with_positions` keeps per-instruction source
    /// positions; dropping them shrinks cached programs.
    pub fn to_bytes(&self, with_positions: bool) -> Vec<u8> {
        let mut body = Writer { buf: Vec::new() };
        body.u32(self.instrs.len() as u32);
        for instr in &self.instrs {
            write_instr(&mut body, instr, with_positions);
        }
        body.u32(self.strings.len() as u32);
        for s in self.strings.iter() {
            body.bytes(s.as_bytes());
        }
        body.u32(self.regexes.len() as u32);
        for re in &self.regexes {
            body.bytes(re.pattern.as_bytes());
            body.bytes(re.flags.as_bytes());
        }

        let mut out = Writer { buf: Vec::with_capacity(body.buf.len() + 16) };
        out.buf.extend_from_slice(MAGIC);
        out.u32(if with_positions { FLAG_POSITIONS } else { 0 });
        out.u32(crc32fast::hash(&body.buf));
        out.buf.extend_from_slice(&body.buf);
        out.buf
    }

    /// Decode a persisted program, verifying magic and checksum.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProgramFormatError> {
        let mut r = Reader { buf: bytes, pos: 0 };
        if r.take(4)? != MAGIC {
            return Err(ProgramFormatError::BadMagic);
        }
        let flags = r.u32()?;
        let crc = r.u32()?;
        if crc32fast::hash(&bytes[r.pos..]) != crc {
            return Err(ProgramFormatError::BadChecksum);
        }
        let with_positions = flags & FLAG_POSITIONS != 0;

        let count = r.u32()? as usize;
        let mut instrs = Vec::with_capacity(count);
        for _ in 0..count {
            instrs.push(read_instr(&mut r, with_positions)?);
        }

        let mut strings = StringPool::new();
        let nstrings = r.u32()? as usize;
        for _ in 0..nstrings {
            let raw = r.str_bytes()?;
            let s = std::str::from_utf8(raw).map_err(|_| ProgramFormatError::BadString)?;
            strings.intern(s);
        }

        let nregexes = r.u32()? as usize;
        let mut program = Program { instrs, strings, regexes: Vec::with_capacity(nregexes) };
        for _ in 0..nregexes {
            let pattern = std::str::from_utf8(r.str_bytes()?)
                .map_err(|_| ProgramFormatError::BadString)?
                .to_owned();
            let flags = std::str::from_utf8(r.str_bytes()?)
                .map_err(|_| ProgramFormatError::BadString)?
                .to_owned();
            program.add_regex(CompiledRegex::new(&pattern, &flags)?);
        }
        Ok(program)
    }
}

fn write_instr(w: &mut Writer, instr: &Instr, with_positions: bool) {
    match &instr.kind {
        InstrKind::PushInt(v) => {
            w.u8(op::PUSH_INT);
            w.i64(*v);
        }
        InstrKind::PushReal(v) => {
            w.u8(op::PUSH_REAL);
            w.f64(*v);
        }
        InstrKind::PushStr(id) => {
            w.u8(op::PUSH_STR);
            w.u32(*id);
        }
        InstrKind::PushRegex(id) => {
            w.u8(op::PUSH_REGEX);
            w.u32(*id);
        }
        InstrKind::PushUndef => w.u8(op::PUSH_UNDEF),
        InstrKind::Var { frame_offset, name, repr } => {
            w.u8(op::VAR);
            w.u16(*frame_offset);
            w.u32(*name);
            w.u32(*repr);
        }
        InstrKind::PushThisFrag => w.u8(op::PUSH_THIS_FRAG),
        InstrKind::PushRootFrag => w.u8(op::PUSH_ROOT_FRAG),
        InstrKind::PushAttr { name, path } => {
            w.u8(op::PUSH_ATTR);
            w.u32(*name);
            w.u32(*path);
        }
        InstrKind::PushAttrAt { path } => {
            w.u8(op::PUSH_ATTR_AT);
            w.u32(*path);
        }
        InstrKind::PushParent { path } => {
            w.u8(op::PUSH_PARENT);
            w.u32(*path);
        }
        InstrKind::Dup => w.u8(op::DUP),
        InstrKind::Pop => w.u8(op::POP),
        InstrKind::Add => w.u8(op::ADD),
        InstrKind::Sub => w.u8(op::SUB),
        InstrKind::Mul => w.u8(op::MUL),
        InstrKind::Div => w.u8(op::DIV),
        InstrKind::Mod => w.u8(op::MOD),
        InstrKind::Concat => w.u8(op::CONCAT),
        InstrKind::Repeat => w.u8(op::REPEAT),
        InstrKind::BitAnd => w.u8(op::BITAND),
        InstrKind::BitOr => w.u8(op::BITOR),
        InstrKind::BitXor => w.u8(op::BITXOR),
        InstrKind::Eq => w.u8(op::EQ),
        InstrKind::Ne => w.u8(op::NE),
        InstrKind::Lt => w.u8(op::LT),
        InstrKind::Le => w.u8(op::LE),
        InstrKind::Gt => w.u8(op::GT),
        InstrKind::Ge => w.u8(op::GE),
        InstrKind::MatchRe => w.u8(op::MATCH_RE),
        InstrKind::NMatchRe => w.u8(op::NMATCH_RE),
        InstrKind::Neg => w.u8(op::NEG),
        InstrKind::Pos => w.u8(op::POS),
        InstrKind::BitNot => w.u8(op::BITNOT),
        InstrKind::Not => w.u8(op::NOT),
        InstrKind::And(off) => {
            w.u8(op::AND);
            w.i32(*off);
        }
        InstrKind::Or(off) => {
            w.u8(op::OR);
            w.i32(*off);
        }
        InstrKind::Jmp(off) => {
            w.u8(op::JMP);
            w.i32(*off);
        }
        InstrKind::JmpIfNot(off) => {
            w.u8(op::JMP_IF_NOT);
            w.i32(*off);
        }
        InstrKind::OpenFrag { name, exit } => {
            w.u8(op::OPEN_FRAG);
            w.u32(*name);
            w.i32(*exit);
        }
        InstrKind::NextFrag(off) => {
            w.u8(op::NEXT_FRAG);
            w.i32(*off);
        }
        InstrKind::CloseFrag => w.u8(op::CLOSE_FRAG),
        InstrKind::Print => w.u8(op::PRINT),
        InstrKind::PrintRaw => w.u8(op::PRINT_RAW),
        InstrKind::PushCtype(id) => {
            w.u8(op::PUSH_CTYPE);
            w.u32(*id);
        }
        InstrKind::PopCtype => w.u8(op::POP_CTYPE),
        InstrKind::PushFormat(id) => {
            w.u8(op::PUSH_FORMAT);
            w.u32(*id);
        }
        InstrKind::PopFormat => w.u8(op::POP_FORMAT),
        InstrKind::Call { name, argc } => {
            w.u8(op::CALL_FN);
            w.u32(*name);
            w.u16(*argc);
        }
        InstrKind::Exists => w.u8(op::EXISTS),
        InstrKind::IsEmpty => w.u8(op::IS_EMPTY),
        InstrKind::TypeOf => w.u8(op::TYPE_OF),
        InstrKind::Count => w.u8(op::COUNT),
        InstrKind::Defined => w.u8(op::DEFINED),
        InstrKind::Jsonify => w.u8(op::JSONIFY),
        InstrKind::SuppressBegin => w.u8(op::SUPPRESS_BEGIN),
        InstrKind::SuppressEnd => w.u8(op::SUPPRESS_END),
        InstrKind::DictLookup => w.u8(op::DICT_LOOKUP),
        InstrKind::Set { name } => {
            w.u8(op::SET_VAR);
            w.u32(*name);
        }
        InstrKind::Halt => w.u8(op::HALT),
    }
    if with_positions {
        match instr.pos {
            Some(pos) => {
                w.u32(pos.line);
                w.u32(pos.col);
            }
            None => {
                w.u32(0);
                w.u32(0);
            }
        }
    }
}

fn read_instr(r: &mut Reader<'_>, with_positions: bool) -> Result<Instr, ProgramFormatError> {
    let opcode = r.u8()?;
    let kind = match opcode {
        op::PUSH_INT => InstrKind::PushInt(r.i64()?),
        op::PUSH_REAL => InstrKind::PushReal(r.f64()?),
        op::PUSH_STR => InstrKind::PushStr(r.u32()?),
        op::PUSH_REGEX => InstrKind::PushRegex(r.u32()?),
        op::PUSH_UNDEF => InstrKind::PushUndef,
        op::VAR => InstrKind::Var {
            frame_offset: r.u16()?,
            name: r.u32()?,
            repr: r.u32()?,
        },
        op::PUSH_THIS_FRAG => InstrKind::PushThisFrag,
        op::PUSH_ROOT_FRAG => InstrKind::PushRootFrag,
        op::PUSH_ATTR => InstrKind::PushAttr { name: r.u32()?, path: r.u32()? },
        op::PUSH_ATTR_AT => InstrKind::PushAttrAt { path: r.u32()? },
        op::PUSH_PARENT => InstrKind::PushParent { path: r.u32()? },
        op::DUP => InstrKind::Dup,
        op::POP => InstrKind::Pop,
        op::ADD => InstrKind::Add,
        op::SUB => InstrKind::Sub,
        op::MUL => InstrKind::Mul,
        op::DIV => InstrKind::Div,
        op::MOD => InstrKind::Mod,
        op::CONCAT => InstrKind::Concat,
        op::REPEAT => InstrKind::Repeat,
        op::BITAND => InstrKind::BitAnd,
        op::BITOR => InstrKind::BitOr,
        op::BITXOR => InstrKind::BitXor,
        op::EQ => InstrKind::Eq,
        op::NE => InstrKind::Ne,
        op::LT => InstrKind::Lt,
        op::LE => InstrKind::Le,
        op::GT => InstrKind::Gt,
        op::GE => InstrKind::Ge,
        op::MATCH_RE => InstrKind::MatchRe,
        op::NMATCH_RE => InstrKind::NMatchRe,
        op::NEG => InstrKind::Neg,
        op::POS => InstrKind::Pos,
        op::BITNOT => InstrKind::BitNot,
        op::NOT => InstrKind::Not,
        op::AND => InstrKind::And(r.i32()?),
        op::OR => InstrKind::Or(r.i32()?),
        op::JMP => InstrKind::Jmp(r.i32()?),
        op::JMP_IF_NOT => InstrKind::JmpIfNot(r.i32()?),
        op::OPEN_FRAG => InstrKind::OpenFrag { name: r.u32()?, exit: r.i32()? },
        op::NEXT_FRAG => InstrKind::NextFrag(r.i32()?),
        op::CLOSE_FRAG => InstrKind::CloseFrag,
        op::PRINT => InstrKind::Print,
        op::PRINT_RAW => InstrKind::PrintRaw,
        op::PUSH_CTYPE => InstrKind::PushCtype(r.u32()?),
        op::POP_CTYPE => InstrKind::PopCtype,
        op::PUSH_FORMAT => InstrKind::PushFormat(r.u32()?),
        op::POP_FORMAT => InstrKind::PopFormat,
        op::CALL_FN => InstrKind::Call { name: r.u32()?, argc: r.u16()? },
        op::EXISTS => InstrKind::Exists,
        op::IS_EMPTY => InstrKind::IsEmpty,
        op::TYPE_OF => InstrKind::TypeOf,
        op::COUNT => InstrKind::Count,
        op::DEFINED => InstrKind::Defined,
        op::JSONIFY => InstrKind::Jsonify,
        op::SUPPRESS_BEGIN => InstrKind::SuppressBegin,
        op::SUPPRESS_END => InstrKind::SuppressEnd,
        op::DICT_LOOKUP => InstrKind::DictLookup,
        op::SET_VAR => InstrKind::Set { name: r.u32()? },
        op::HALT => InstrKind::Halt,
        other => return Err(ProgramFormatError::UnknownOpcode(other)),
    };
    let pos = if with_positions {
        let line = r.u32()?;
        let col = r.u32()?;
        (line != 0).then(|| Pos::new(line, col))
    } else {
        None
    };
    Ok(Instr { kind, pos })
}
