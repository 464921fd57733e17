//! Instruction definitions.

use teng_core::Pos;

/// Index into the program string pool.
pub type StrId = u32;

/// Index into the program regex pool.
pub type RegexId = u32;

/// One instruction: an operation plus the source position it was compiled
/// from. Positions are optional and may be dropped to shrink cached
/// programs; diagnostics then fall back to `1:0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub kind: InstrKind,
    pub pos: Option<Pos>,
}

impl Instr {
    pub fn new(kind: InstrKind, pos: Pos) -> Self {
        Self { kind, pos: Some(pos) }
    }

    /// Source position, or the document start when positions were stripped.
    pub fn pos(&self) -> Pos {
        self.pos.unwrap_or_default()
    }
}

/// The operation tag plus immediate operands.
///
/// Jump offsets are relative to the instruction after the jump: the target
/// is `ip + 1 + offset`.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    // constants
    PushInt(i64),
    PushReal(f64),
    PushStr(StrId),
    PushRegex(RegexId),
    PushUndef,

    /// Static variable: resolved against the open-frags stack. The frame
    /// offset counts from the root frame; `repr` is the absolute dotted
    /// form used in diagnostics.
    Var { frame_offset: u16, name: StrId, repr: StrId },

    // runtime path construction; the cursor lives on the value stack
    PushThisFrag,
    PushRootFrag,
    /// Descend by name. `path` is the dotted repr of the steps before this
    /// one, used in diagnostics.
    PushAttr { name: StrId, path: StrId },
    /// Descend by an index popped from the value stack.
    PushAttrAt { path: StrId },
    /// Climb one level, clamping at the root with a warning.
    PushParent { path: StrId },

    /// Duplicate the top of the value stack (case discriminants).
    Dup,
    /// Drop the top of the value stack.
    Pop,

    // binary operators: pop two, push result (or Undefined on type error)
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Repeat,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    MatchRe,
    NMatchRe,

    // unary operators: pop one, push result
    Neg,
    Pos,
    BitNot,
    Not,

    /// Value-preserving `&&`: jump if the top of stack is falsy (keeping
    /// it), otherwise pop and continue into the right operand.
    And(i32),
    /// Value-preserving `||`: jump if the top of stack is truthy (keeping
    /// it), otherwise pop and continue into the right operand.
    Or(i32),

    Jmp(i32),
    /// Pop one value, jump when it is falsy.
    JmpIfNot(i32),

    /// Resolve the fragment path and start iterating it. When the target
    /// holds no fragments, jump past the matching `CloseFrag` without
    /// pushing an iteration frame.
    OpenFrag { name: StrId, exit: i32 },
    /// Advance the innermost iteration; jump back to the loop top while
    /// fragments remain.
    NextFrag(i32),
    CloseFrag,

    /// Pop, coerce to string, write through the active escaper.
    Print,
    /// Pop, coerce to string, write verbatim.
    PrintRaw,

    PushCtype(StrId),
    PopCtype,
    PushFormat(StrId),
    PopFormat,

    /// Invoke a built-in function with `argc` arguments from the stack.
    Call { name: StrId, argc: u16 },

    // query ops on top of stack
    Exists,
    IsEmpty,
    TypeOf,
    Count,
    Defined,
    Jsonify,

    /// Diagnostics suppression for query argument evaluation.
    SuppressBegin,
    SuppressEnd,

    /// Pop a key string and push the dictionary entry (or Undefined).
    DictLookup,

    /// Pop a value into the page-local variable overlay.
    Set { name: StrId },

    Halt,
}

impl InstrKind {
    /// Mnemonic used by the disassembler and the wire format table.
    pub fn name(&self) -> &'static str {
        match self {
            InstrKind::PushInt(_) => "PUSH_INT",
            InstrKind::PushReal(_) => "PUSH_REAL",
            InstrKind::PushStr(_) => "PUSH_STR",
            InstrKind::PushRegex(_) => "PUSH_REGEX",
            InstrKind::PushUndef => "PUSH_UNDEF",
            InstrKind::Var { .. } => "LOAD_VAR",
            InstrKind::PushThisFrag => "PUSH_THIS_FRAG",
            InstrKind::PushRootFrag => "PUSH_ROOT_FRAG",
            InstrKind::PushAttr { .. } => "PUSH_ATTR",
            InstrKind::PushAttrAt { .. } => "PUSH_ATTR_AT",
            InstrKind::PushParent { .. } => "PUSH_PARENT",
            InstrKind::Dup => "DUP",
            InstrKind::Pop => "POP",
            InstrKind::Add => "ADD",
            InstrKind::Sub => "SUB",
            InstrKind::Mul => "MUL",
            InstrKind::Div => "DIV",
            InstrKind::Mod => "MOD",
            InstrKind::Concat => "CONCAT",
            InstrKind::Repeat => "REPEAT",
            InstrKind::BitAnd => "BITAND",
            InstrKind::BitOr => "BITOR",
            InstrKind::BitXor => "BITXOR",
            InstrKind::Eq => "EQ",
            InstrKind::Ne => "NE",
            InstrKind::Lt => "LT",
            InstrKind::Le => "LE",
            InstrKind::Gt => "GT",
            InstrKind::Ge => "GE",
            InstrKind::MatchRe => "MATCH_RE",
            InstrKind::NMatchRe => "NMATCH_RE",
            InstrKind::Neg => "NEG",
            InstrKind::Pos => "POS",
            InstrKind::BitNot => "BITNOT",
            InstrKind::Not => "NOT",
            InstrKind::And(_) => "AND",
            InstrKind::Or(_) => "OR",
            InstrKind::Jmp(_) => "JMP",
            InstrKind::JmpIfNot(_) => "JMP_IF_NOT",
            InstrKind::OpenFrag { .. } => "OPEN_FRAG",
            InstrKind::NextFrag(_) => "NEXT_FRAG",
            InstrKind::CloseFrag => "CLOSE_FRAG",
            InstrKind::Print => "PRINT",
            InstrKind::PrintRaw => "PRINT_RAW",
            InstrKind::PushCtype(_) => "PUSH_CTYPE",
            InstrKind::PopCtype => "POP_CTYPE",
            InstrKind::PushFormat(_) => "PUSH_FORMAT",
            InstrKind::PopFormat => "POP_FORMAT",
            InstrKind::Call { .. } => "CALL_FN",
            InstrKind::Exists => "EXISTS",
            InstrKind::IsEmpty => "IS_EMPTY",
            InstrKind::TypeOf => "TYPE_OF",
            InstrKind::Count => "COUNT",
            InstrKind::Defined => "DEFINED",
            InstrKind::Jsonify => "JSONIFY",
            InstrKind::SuppressBegin => "SUPPRESS_BEGIN",
            InstrKind::SuppressEnd => "SUPPRESS_END",
            InstrKind::DictLookup => "DICT_LOOKUP",
            InstrKind::Set { .. } => "SET_VAR",
            InstrKind::Halt => "HALT",
        }
    }
}
