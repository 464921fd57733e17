//! The dispatch loop and runtime state.

use std::collections::HashMap;

use teng_bytecode::{InstrKind, Program};
use teng_core::{Dictionary, ErrorLog, Fragment, FragmentList, FragmentValue, Pos, Value};

use crate::builtins;
use crate::escape::{ContentType, lookup_content_type};
use crate::ops::{self, OpFail};
use crate::sink::Sink;
use crate::space::SpaceMode;

/// Configures and runs one page generation.
///
/// The program and the data tree are borrowed immutably; each run owns its
/// value stack, fragment stack and output sink, so one program may serve
/// many concurrent pages.
pub struct Vm<'a> {
    program: &'a Program,
    root: &'a Fragment,
    dict: Option<&'a dyn Dictionary>,
    ctype: &'a str,
}

impl<'a> Vm<'a> {
    pub fn new(program: &'a Program, root: &'a Fragment) -> Self {
        Self { program, root, dict: None, ctype: "text/html" }
    }

    pub fn dictionary(mut self, dict: &'a dyn Dictionary) -> Self {
        self.dict = Some(dict);
        self
    }

    /// The content type active at the top of the escaper stack.
    pub fn content_type(mut self, name: &'a str) -> Self {
        self.ctype = name;
        self
    }

    pub fn run(self, sink: &mut dyn Sink, log: &mut ErrorLog) {
        let root_ctype = match lookup_content_type(self.ctype) {
            Some(ct) => ct,
            None => {
                log.error(
                    Pos::start(),
                    format!("Invalid content type '{}'; using top instead", self.ctype),
                );
                lookup_content_type("text/html").expect("text/html is registered")
            }
        };
        let mut exec = Exec {
            program: self.program,
            root: self.root,
            dict: self.dict,
            log,
            sink,
            stack: Vec::with_capacity(16),
            frames: Vec::new(),
            ctypes: vec![root_ctype],
            spaces: Vec::new(),
            overlay: HashMap::new(),
            suppress: 0,
            dead: false,
        };
        exec.execute();
    }
}

/// A value-stack cell: either a finished value or a path cursor still
/// being built by `PUSH_ATTR`-style instructions.
#[derive(Clone)]
enum Cell<'a> {
    Value(Value<'a>),
    Cursor(Cursor<'a>),
}

/// The cursor of a runtime path: the chain of nodes walked so far, root
/// first. `_parent` pops the trail, which is why the whole walk is kept.
#[derive(Clone)]
struct Cursor<'a> {
    trail: Vec<Node<'a>>,
}

#[derive(Clone, Copy)]
enum Node<'a> {
    Frag(&'a Fragment),
    List(&'a FragmentList),
}

/// One open fragment iteration.
struct IterFrame<'a> {
    target: Target<'a>,
    /// Display name without the leading dot, for `open_frags=` output.
    name: String,
    index: usize,
    len: usize,
}

enum Target<'a> {
    Single(&'a Fragment),
    List(&'a FragmentList),
}

impl<'a> IterFrame<'a> {
    fn current(&self) -> &'a Fragment {
        match self.target {
            Target::Single(frag) => frag,
            Target::List(list) => list.get(self.index).expect("index is bounds-checked"),
        }
    }
}

fn cell_value(cell: Cell<'_>) -> Value<'_> {
    match cell {
        Cell::Value(v) => v,
        Cell::Cursor(c) => match c.trail.last().expect("trail is never empty") {
            Node::Frag(f) => Value::FragRef(f),
            Node::List(l) => Value::ListRef(l),
        },
    }
}

fn frag_value<'a>(fv: &'a FragmentValue) -> Value<'a> {
    match fv {
        FragmentValue::Integral(v) => Value::Integral(*v),
        FragmentValue::Real(v) => Value::Real(*v),
        FragmentValue::String(v) => Value::StringRef(v),
        FragmentValue::Frag(f) => Value::FragRef(f),
        FragmentValue::List(l) => Value::ListRef(l),
    }
}

/// Iteration pseudo-attributes computed from a frame position.
fn frame_builtin(name: &str, index: usize, len: usize) -> Option<Value<'static>> {
    let v = match name {
        "_index" => index as i64,
        "_number" => index as i64 + 1,
        "_count" => len as i64,
        "_first" => (index == 0) as i64,
        "_last" => (index + 1 == len) as i64,
        "_inner" => (index > 0 && index + 1 < len) as i64,
        _ => return None,
    };
    Some(Value::Integral(v))
}

struct Exec<'a, 'io> {
    program: &'a Program,
    root: &'a Fragment,
    dict: Option<&'a dyn Dictionary>,
    log: &'io mut ErrorLog,
    sink: &'io mut dyn Sink,
    stack: Vec<Cell<'a>>,
    frames: Vec<IterFrame<'a>>,
    ctypes: Vec<&'static ContentType>,
    spaces: Vec<SpaceMode>,
    overlay: HashMap<String, Value<'a>>,
    suppress: u32,
    dead: bool,
}

impl<'a> Exec<'a, '_> {
    // ---- diagnostics ----

    fn warn(&mut self, pos: Pos, msg: String) {
        if self.suppress == 0 {
            self.log.warning(pos, msg);
        }
    }

    fn error(&mut self, pos: Pos, msg: String) {
        if self.suppress == 0 {
            self.log.error(pos, msg);
        }
    }

    fn fatal(&mut self, pos: Pos, msg: &str) {
        self.log.fatal(pos, msg.to_owned());
        self.dead = true;
    }

    /// The `[open_frags=…, iteration=…]` suffix carried by path warnings.
    fn state_suffix(&self) -> String {
        let path = if self.frames.is_empty() {
            ".".to_owned()
        } else {
            let names: Vec<&str> = self.frames.iter().map(|f| f.name.as_str()).collect();
            format!(".{}", names.join("."))
        };
        let (index, len) = self.frames.last().map_or((0, 1), |f| (f.index, f.len));
        format!("[open_frags={path}, iteration={index}/{len}]")
    }

    // ---- stack ----

    fn push(&mut self, value: Value<'a>) {
        self.stack.push(Cell::Value(value));
    }

    fn pop_cell(&mut self, pos: Pos) -> Option<Cell<'a>> {
        let cell = self.stack.pop();
        if cell.is_none() {
            self.fatal(pos, "Runtime: value stack underflow; aborting the page");
        }
        cell
    }

    fn pop_value(&mut self, pos: Pos) -> Option<Value<'a>> {
        Some(cell_value(self.pop_cell(pos)?))
    }

    fn current_frag(&self) -> &'a Fragment {
        self.frames.last().map_or(self.root, |f| f.current())
    }

    // ---- dispatch ----

    fn execute(&mut self) {
        let program = self.program;
        let mut ip = 0usize;
        while ip < program.instrs.len() {
            let instr = &program.instrs[ip];
            let pos = instr.pos();
            let mut jump: Option<i32> = None;
            match &instr.kind {
                InstrKind::PushInt(v) => self.push(Value::Integral(*v)),
                InstrKind::PushReal(v) => self.push(Value::Real(*v)),
                InstrKind::PushStr(id) => self.push(Value::StringRef(program.str(*id))),
                InstrKind::PushRegex(id) => {
                    self.push(Value::Regex(program.regex(*id).clone()));
                }
                InstrKind::PushUndef => self.push(Value::Undefined),

                InstrKind::Var { frame_offset, name, repr } => {
                    self.load_var(*frame_offset, program.str(*name), program.str(*repr), pos);
                }

                InstrKind::PushThisFrag => {
                    let mut trail = Vec::with_capacity(self.frames.len() + 1);
                    trail.push(Node::Frag(self.root));
                    for frame in &self.frames {
                        trail.push(Node::Frag(frame.current()));
                    }
                    self.stack.push(Cell::Cursor(Cursor { trail }));
                }
                InstrKind::PushRootFrag => {
                    self.stack.push(Cell::Cursor(Cursor { trail: vec![Node::Frag(self.root)] }));
                }
                InstrKind::PushAttr { name, path } => {
                    self.attr_step(program.str(*name), program.str(*path), pos);
                }
                InstrKind::PushAttrAt { path } => {
                    self.attr_at_step(program.str(*path), pos);
                }
                InstrKind::PushParent { .. } => self.parent_step(pos),

                InstrKind::Dup => {
                    let Some(top) = self.stack.last().cloned() else {
                        self.fatal(pos, "Runtime: value stack underflow; aborting the page");
                        return;
                    };
                    self.stack.push(top);
                }
                InstrKind::Pop => {
                    if self.pop_cell(pos).is_none() {
                        return;
                    }
                }

                InstrKind::Add
                | InstrKind::Sub
                | InstrKind::Mul
                | InstrKind::Div
                | InstrKind::Mod
                | InstrKind::Concat
                | InstrKind::Repeat
                | InstrKind::BitAnd
                | InstrKind::BitOr
                | InstrKind::BitXor
                | InstrKind::Eq
                | InstrKind::Ne
                | InstrKind::Lt
                | InstrKind::Le
                | InstrKind::Gt
                | InstrKind::Ge
                | InstrKind::MatchRe
                | InstrKind::NMatchRe => {
                    let Some(rhs) = self.pop_value(pos) else { return };
                    let Some(lhs) = self.pop_value(pos) else { return };
                    let result = match &instr.kind {
                        InstrKind::Add => ops::add(lhs, rhs),
                        InstrKind::Sub => ops::sub(lhs, rhs),
                        InstrKind::Mul => ops::mul(lhs, rhs),
                        InstrKind::Div => ops::div(lhs, rhs),
                        InstrKind::Mod => ops::rem(lhs, rhs),
                        InstrKind::Concat => ops::concat(lhs, rhs),
                        InstrKind::Repeat => ops::repeat(lhs, rhs),
                        InstrKind::BitAnd => ops::bit(lhs, rhs, "&"),
                        InstrKind::BitOr => ops::bit(lhs, rhs, "|"),
                        InstrKind::BitXor => ops::bit(lhs, rhs, "^"),
                        InstrKind::Eq => ops::compare(lhs, rhs, "=="),
                        InstrKind::Ne => ops::compare(lhs, rhs, "!="),
                        InstrKind::Lt => ops::compare(lhs, rhs, "<"),
                        InstrKind::Le => ops::compare(lhs, rhs, "<="),
                        InstrKind::Gt => ops::compare(lhs, rhs, ">"),
                        InstrKind::Ge => ops::compare(lhs, rhs, ">="),
                        InstrKind::MatchRe => ops::match_regex(lhs, rhs, false),
                        InstrKind::NMatchRe => ops::match_regex(lhs, rhs, true),
                        _ => unreachable!(),
                    };
                    self.push_op_result(result, pos);
                }

                InstrKind::Neg | InstrKind::Pos | InstrKind::BitNot => {
                    let Some(v) = self.pop_value(pos) else { return };
                    let result = match &instr.kind {
                        InstrKind::Neg => ops::neg(v),
                        InstrKind::Pos => ops::pos(v),
                        InstrKind::BitNot => ops::bit_not(v),
                        _ => unreachable!(),
                    };
                    self.push_op_result(result, pos);
                }
                InstrKind::Not => {
                    let Some(v) = self.pop_value(pos) else { return };
                    let negated = ops::not(v);
                    self.push(negated);
                }

                InstrKind::And(off) => {
                    // falsy left operand decides the result and is kept
                    let Some(v) = self.pop_value(pos) else { return };
                    if !v.is_truthy() {
                        self.push(v);
                        jump = Some(*off);
                    }
                }
                InstrKind::Or(off) => {
                    let Some(v) = self.pop_value(pos) else { return };
                    if v.is_truthy() {
                        self.push(v);
                        jump = Some(*off);
                    }
                }
                InstrKind::Jmp(off) => jump = Some(*off),
                InstrKind::JmpIfNot(off) => {
                    let Some(v) = self.pop_value(pos) else { return };
                    if !v.is_truthy() {
                        jump = Some(*off);
                    }
                }

                InstrKind::OpenFrag { name, exit } => {
                    match self.resolve_frag(program.str(*name), pos) {
                        Some((target, len)) if len > 0 => {
                            let display = program.str(*name).trim_start_matches('.').to_owned();
                            self.frames.push(IterFrame { target, name: display, index: 0, len });
                        }
                        _ => jump = Some(*exit),
                    }
                }
                InstrKind::NextFrag(off) => match self.frames.last_mut() {
                    Some(frame) => {
                        frame.index += 1;
                        if frame.index < frame.len {
                            jump = Some(*off);
                        }
                    }
                    None => {
                        self.fatal(pos, "Runtime: fragment stack underflow; aborting the page");
                        return;
                    }
                },
                InstrKind::CloseFrag => {
                    self.frames.pop();
                }

                InstrKind::Print => self.print(pos, false),
                InstrKind::PrintRaw => self.print(pos, true),

                InstrKind::PushCtype(id) => {
                    let name = program.str(*id);
                    let top = *self.ctypes.last().expect("ctype stack is never empty");
                    if name.is_empty() {
                        self.ctypes.push(top);
                    } else {
                        match lookup_content_type(name) {
                            Some(ct) => self.ctypes.push(ct),
                            None => {
                                self.error(
                                    pos,
                                    format!("Invalid content type '{name}'; using top instead"),
                                );
                                self.ctypes.push(top);
                            }
                        }
                    }
                }
                InstrKind::PopCtype => {
                    if self.ctypes.len() > 1 {
                        self.ctypes.pop();
                    }
                }
                InstrKind::PushFormat(id) => {
                    let mode = SpaceMode::parse(program.str(*id)).unwrap_or_default();
                    self.spaces.push(mode);
                }
                InstrKind::PopFormat => {
                    self.spaces.pop();
                }

                InstrKind::Call { name, argc } => {
                    let mut args = Vec::with_capacity(*argc as usize);
                    for _ in 0..*argc {
                        let Some(v) = self.pop_value(pos) else { return };
                        args.push(v);
                    }
                    args.reverse();
                    let escaper = *self.ctypes.last().expect("ctype stack is never empty");
                    let mut warns = Vec::new();
                    let result = builtins::call(program.str(*name), args, escaper, &mut warns);
                    for msg in warns {
                        self.warn(pos, msg);
                    }
                    self.push(result);
                }

                InstrKind::Exists => {
                    let Some(v) = self.pop_value(pos) else { return };
                    self.push(Value::Integral(!v.is_undefined() as i64));
                }
                InstrKind::Defined => {
                    let Some(v) = self.pop_value(pos) else { return };
                    self.push(Value::Integral(!v.is_undefined() as i64));
                }
                InstrKind::IsEmpty => {
                    let Some(v) = self.pop_value(pos) else { return };
                    let result = match &v {
                        Value::FragRef(f) => Value::Integral(f.is_empty() as i64),
                        Value::ListRef(l) => Value::Integral(l.is_empty() as i64),
                        other => {
                            let state = self.state_suffix();
                            self.warn(
                                pos,
                                format!(
                                    "Runtime: The path expression references object of '{}' \
                                     type with value '{}' for which isempty() query is \
                                     undefined {state}",
                                    other.type_name(),
                                    other.printable(),
                                ),
                            );
                            Value::Undefined
                        }
                    };
                    self.push(result);
                }
                InstrKind::Count => {
                    let Some(v) = self.pop_value(pos) else { return };
                    let result = match &v {
                        Value::ListRef(l) => Value::Integral(l.len() as i64),
                        other => {
                            let state = self.state_suffix();
                            self.warn(
                                pos,
                                format!(
                                    "Runtime: The path expression references object of '{}' \
                                     type with value '{}' for which count() query is \
                                     undefined {state}",
                                    other.type_name(),
                                    other.printable(),
                                ),
                            );
                            Value::Undefined
                        }
                    };
                    self.push(result);
                }
                InstrKind::TypeOf => {
                    let Some(v) = self.pop_value(pos) else { return };
                    self.push(Value::StringRef(v.type_name()));
                }
                InstrKind::Jsonify => {
                    let Some(v) = self.pop_value(pos) else { return };
                    self.push(Value::String(jsonify(&v)));
                }

                InstrKind::SuppressBegin => self.suppress += 1,
                InstrKind::SuppressEnd => self.suppress = self.suppress.saturating_sub(1),

                InstrKind::DictLookup => {
                    let Some(key) = self.pop_value(pos) else { return };
                    let key = key.printable();
                    let entry = self.dict.and_then(|d| d.entry(&key));
                    match entry {
                        Some(text) => self.push(Value::StringRef(text)),
                        None => {
                            self.warn(pos, format!("Runtime: Dictionary item '{key}' was not found"));
                            self.push(Value::String(key));
                        }
                    }
                }

                InstrKind::Set { name } => {
                    let Some(v) = self.pop_value(pos) else { return };
                    self.overlay.insert(program.str(*name).to_owned(), v);
                }

                InstrKind::Halt => return,
            }
            if self.dead {
                return;
            }
            ip = match jump {
                Some(rel) => (ip as i64 + 1 + rel as i64) as usize,
                None => ip + 1,
            };
        }
    }

    fn push_op_result(&mut self, result: Result<Value<'a>, OpFail>, pos: Pos) {
        match result {
            Ok(v) => self.push(v),
            Err(OpFail::Warn(msg)) => {
                self.warn(pos, msg);
                self.push(Value::Undefined);
            }
            Err(OpFail::Error(msg)) => {
                self.error(pos, msg);
                self.push(Value::Undefined);
            }
        }
    }

    // ---- variables and paths ----

    fn load_var(&mut self, offset: u16, name: &'a str, repr: &'a str, pos: Pos) {
        let offset = offset as usize;
        let (frag, index, len) = if offset == 0 {
            (self.root, 0, 1)
        } else {
            match self.frames.get(offset - 1) {
                Some(frame) => (frame.current(), frame.index, frame.len),
                None => {
                    let state = self.state_suffix();
                    self.warn(pos, format!("Runtime: Variable '{repr}' is undefined {state}"));
                    self.push(Value::Undefined);
                    return;
                }
            }
        };
        if let Some(v) = frame_builtin(name, index, len) {
            self.push(v);
            return;
        }
        match name {
            "_this" => self.push(Value::FragRef(frag)),
            "_parent" => {
                if offset == 0 {
                    self.log.warning(
                        pos,
                        "The builtin _parent variable has crossed root boundary; \
                         converting it to _this"
                            .to_owned(),
                    );
                    self.push(Value::FragRef(self.root));
                } else if offset == 1 {
                    self.push(Value::FragRef(self.root));
                } else {
                    let parent = self.frames[offset - 2].current();
                    self.push(Value::FragRef(parent));
                }
            }
            _ => {
                // search from the addressed fragment up to the root
                let mut depth = offset;
                loop {
                    let here = if depth == 0 {
                        self.root
                    } else {
                        self.frames[depth - 1].current()
                    };
                    if let Some(fv) = here.get(name) {
                        self.push(frag_value(fv));
                        return;
                    }
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                match self.overlay.get(name).cloned() {
                    Some(v) => self.push(v),
                    None => {
                        let state = self.state_suffix();
                        self.warn(
                            pos,
                            format!("Runtime: Variable '{repr}' is undefined {state}"),
                        );
                        self.push(Value::Undefined);
                    }
                }
            }
        }
    }

    fn attr_step(&mut self, name: &'a str, path: &'a str, pos: Pos) {
        let Some(cell) = self.pop_cell(pos) else { return };
        match cell {
            Cell::Cursor(mut cursor) => {
                let node = *cursor.trail.last().expect("trail is never empty");
                if name == "_count" {
                    let count = match node {
                        Node::List(l) => l.len(),
                        Node::Frag(_) => 1,
                    };
                    self.push(Value::Integral(count as i64));
                    return;
                }
                let frag = match node {
                    Node::Frag(f) => f,
                    Node::List(l) if l.len() == 1 => l.get(0).expect("length checked"),
                    Node::List(l) => {
                        let state = self.state_suffix();
                        self.warn(
                            pos,
                            format!(
                                "Runtime: The path expression '{path}' references fragment \
                                 list of '{}' fragments; the expression is ambiguous {state}",
                                l.len(),
                            ),
                        );
                        self.push(Value::Undefined);
                        return;
                    }
                };
                match frag.get(name) {
                    Some(FragmentValue::Frag(f)) => {
                        cursor.trail.push(Node::Frag(f));
                        self.stack.push(Cell::Cursor(cursor));
                    }
                    Some(FragmentValue::List(l)) => {
                        cursor.trail.push(Node::List(l));
                        self.stack.push(Cell::Cursor(cursor));
                    }
                    Some(scalar) => self.push(frag_value(scalar)),
                    None => {
                        let state = self.state_suffix();
                        if path.is_empty() {
                            self.warn(
                                pos,
                                format!(
                                    "Runtime: This fragment doesn't contain any value for \
                                     key '{name}' {state}",
                                ),
                            );
                        } else {
                            self.warn(
                                pos,
                                format!(
                                    "Runtime: The path expression '{path}' references \
                                     fragment that doesn't contain any value for key \
                                     '{name}' {state}",
                                ),
                            );
                        }
                        self.push(Value::Undefined);
                    }
                }
            }
            Cell::Value(Value::Undefined) => self.push(Value::Undefined),
            Cell::Value(other) => {
                let state = self.state_suffix();
                self.warn(
                    pos,
                    format!(
                        "Runtime: The path expression '{path}' references object of '{}' \
                         type with value '{}' that is not a fragment {state}",
                        other.type_name(),
                        other.printable(),
                    ),
                );
                self.push(Value::Undefined);
            }
        }
    }

    fn attr_at_step(&mut self, path: &'a str, pos: Pos) {
        let Some(index) = self.pop_value(pos) else { return };
        let Some(cell) = self.pop_cell(pos) else { return };
        match cell {
            Cell::Cursor(mut cursor) => {
                let node = *cursor.trail.last().expect("trail is never empty");
                match index {
                    Value::Integral(i) => {
                        let len = match node {
                            Node::List(l) => l.len(),
                            Node::Frag(_) => 1,
                        };
                        let wrapped = if i < 0 { i + len as i64 } else { i };
                        if wrapped < 0 || wrapped >= len as i64 {
                            let state = self.state_suffix();
                            self.warn(
                                pos,
                                format!(
                                    "Runtime: The index '{i}' is out of valid range <0, {len}) \
                                     of the fragments list referenced by this path expression \
                                     '{path}' {state}",
                                ),
                            );
                            self.push(Value::Undefined);
                            return;
                        }
                        match node {
                            Node::List(l) => {
                                let frag = l.get(wrapped as usize).expect("bounds checked");
                                cursor.trail.push(Node::Frag(frag));
                            }
                            // indexing a plain fragment by 0 or -1 is the
                            // fragment itself
                            Node::Frag(_) => {}
                        }
                        self.stack.push(Cell::Cursor(cursor));
                    }
                    Value::String(_) | Value::StringRef(_) => {
                        let name = index.as_str().expect("string variant").to_owned();
                        self.stack.push(Cell::Cursor(cursor));
                        self.attr_step_owned(&name, path, pos);
                    }
                    Value::Undefined => self.push(Value::Undefined),
                    other => {
                        let state = self.state_suffix();
                        self.warn(
                            pos,
                            format!(
                                "Runtime: The index of the fragments list referenced by this \
                                 path expression '{path}' must be integral or string, not \
                                 {} {state}",
                                other.type_name(),
                            ),
                        );
                        self.push(Value::Undefined);
                    }
                }
            }
            Cell::Value(Value::Undefined) => self.push(Value::Undefined),
            Cell::Value(other) => {
                let state = self.state_suffix();
                self.warn(
                    pos,
                    format!(
                        "Runtime: The path expression '{path}' references object of '{}' \
                         type with value '{}' that is not a fragment {state}",
                        other.type_name(),
                        other.printable(),
                    ),
                );
                self.push(Value::Undefined);
            }
        }
    }

    /// `attr_step` for a key that is not interned in the program (string
    /// index values).
    fn attr_step_owned(&mut self, name: &str, path: &'a str, pos: Pos) {
        let Some(cell) = self.pop_cell(pos) else { return };
        let Cell::Cursor(mut cursor) = cell else {
            unreachable!("attr_step_owned is only called on cursors");
        };
        let node = *cursor.trail.last().expect("trail is never empty");
        let frag = match node {
            Node::Frag(f) => f,
            Node::List(l) if l.len() == 1 => l.get(0).expect("length checked"),
            Node::List(l) => {
                let state = self.state_suffix();
                self.warn(
                    pos,
                    format!(
                        "Runtime: The path expression '{path}' references fragment list \
                         of '{}' fragments; the expression is ambiguous {state}",
                        l.len(),
                    ),
                );
                self.push(Value::Undefined);
                return;
            }
        };
        match frag.get(name) {
            Some(FragmentValue::Frag(f)) => {
                cursor.trail.push(Node::Frag(f));
                self.stack.push(Cell::Cursor(cursor));
            }
            Some(FragmentValue::List(l)) => {
                cursor.trail.push(Node::List(l));
                self.stack.push(Cell::Cursor(cursor));
            }
            Some(scalar) => self.push(frag_value(scalar)),
            None => {
                let state = self.state_suffix();
                self.warn(
                    pos,
                    format!(
                        "Runtime: The path expression '{path}' references fragment that \
                         doesn't contain any value for key '{name}' {state}",
                    ),
                );
                self.push(Value::Undefined);
            }
        }
    }

    fn parent_step(&mut self, pos: Pos) {
        let Some(cell) = self.pop_cell(pos) else { return };
        match cell {
            Cell::Cursor(mut cursor) => {
                if cursor.trail.len() > 1 {
                    cursor.trail.pop();
                } else {
                    // root clamp is always reported, queries included
                    self.log.warning(
                        pos,
                        "The builtin _parent variable has crossed root boundary; \
                         converting it to _this"
                            .to_owned(),
                    );
                }
                self.stack.push(Cell::Cursor(cursor));
            }
            Cell::Value(Value::Undefined) => self.push(Value::Undefined),
            Cell::Value(other) => {
                let state = self.state_suffix();
                self.warn(
                    pos,
                    format!(
                        "Runtime: The _parent segment is applied to object of '{}' type \
                         that is not a fragment {state}",
                        other.type_name(),
                    ),
                );
                self.push(Value::Undefined);
            }
        }
    }

    /// Resolve a fragment directive path to its iteration target.
    fn resolve_frag(&mut self, name: &'a str, pos: Pos) -> Option<(Target<'a>, usize)> {
        let (mut frag, rest) = match name.strip_prefix('.') {
            Some(rest) => (self.root, rest),
            None => (self.current_frag(), name),
        };
        let parts: Vec<&str> = rest.split('.').collect();
        for part in &parts[..parts.len() - 1] {
            frag = match frag.get(part) {
                Some(FragmentValue::Frag(f)) => f,
                Some(FragmentValue::List(l)) if l.len() == 1 => l.get(0).expect("length checked"),
                Some(FragmentValue::List(l)) => {
                    let state = self.state_suffix();
                    self.warn(
                        pos,
                        format!(
                            "Runtime: The fragment path '{name}' references fragment list \
                             of '{}' fragments; the expression is ambiguous {state}",
                            l.len(),
                        ),
                    );
                    return None;
                }
                _ => return None,
            };
        }
        match frag.get(parts[parts.len() - 1]) {
            Some(FragmentValue::Frag(f)) => Some((Target::Single(f), 1)),
            Some(FragmentValue::List(l)) => Some((Target::List(l), l.len())),
            Some(other) => {
                let state = self.state_suffix();
                self.warn(
                    pos,
                    format!(
                        "Runtime: The fragment path '{name}' references object of '{}' \
                         type that is not a fragment {state}",
                        other_type_name(other),
                    ),
                );
                None
            }
            None => None,
        }
    }

    fn print(&mut self, pos: Pos, raw: bool) {
        let Some(v) = self.pop_value(pos) else { return };
        match &v {
            Value::FragRef(_) => {
                self.warn(pos, "Runtime: Variable is a fragment, not a scalar value".to_owned());
            }
            Value::ListRef(_) => {
                self.warn(
                    pos,
                    "Runtime: Variable is a fragment list, not a scalar value".to_owned(),
                );
            }
            _ => {}
        }
        let text = v.printable();
        let escaped = if raw {
            text
        } else {
            let escaper = self.ctypes.last().expect("ctype stack is never empty");
            (escaper.escape)(&text).into_owned()
        };
        let formatted = match self.spaces.last() {
            Some(mode) => mode.apply(&escaped),
            None => escaped,
        };
        if self.sink.write_str(&formatted).is_err() {
            self.fatal(pos, "Runtime: error writing to output; aborting the page");
        }
    }
}

fn other_type_name(fv: &FragmentValue) -> &'static str {
    frag_value(fv).type_name()
}

fn jsonify(v: &Value<'_>) -> String {
    match v {
        Value::Undefined => "null".to_owned(),
        Value::Integral(n) => n.to_string(),
        Value::Real(n) => serde_json::to_string(n).unwrap_or_else(|_| "null".to_owned()),
        Value::String(s) => serde_json::to_string(s).expect("string serialization cannot fail"),
        Value::StringRef(s) => serde_json::to_string(s).expect("string serialization cannot fail"),
        Value::Regex(re) => serde_json::to_string(&re.to_string())
            .expect("string serialization cannot fail"),
        Value::FragRef(f) => f.json(),
        Value::ListRef(l) => l.json(),
    }
}
