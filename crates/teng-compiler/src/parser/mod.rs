//! The directive parser and bytecode emitter.
//!
//! A single left-to-right pass over the token stream. Statement structure
//! is tracked on an explicit compile-time stack that mirrors the nested
//! control blocks; expressions are compiled by precedence climbing in
//! `expr.rs`, emitting postfix bytecode as each sub-tree reduces. Forward
//! jumps are emitted with placeholder offsets and back-patched when the
//! target becomes known.
//!
//! Nothing here ever aborts the page. A broken expression is replaced with
//! `Undefined`; a block whose terminator never arrives is discarded by
//! truncating the instruction buffer back to the block's watermark.

mod expr;

use std::path::PathBuf;

use teng_bytecode::{Instr, InstrKind, Program, StrId};
use teng_core::{Dictionary, ErrorLog, Pos};

use crate::lexer::{Lexer, Mode, Token, TokenKind};
use crate::opts::CompileOpts;
use crate::source::Source;

const MAX_INCLUDE_DEPTH: usize = 32;

/// Compile one template into a bytecode program, appending problems to
/// `log`. Always returns a runnable program.
pub fn compile(
    source: &Source,
    dict: Option<&dyn Dictionary>,
    opts: &CompileOpts,
    log: &mut ErrorLog,
) -> Program {
    let lexer = Lexer::new(source, opts.no_print_escape);
    let parser = Parser {
        lexers: vec![lexer],
        program: Program::new(),
        log,
        dict,
        opts,
        frames: Vec::new(),
        frag_chain: Vec::new(),
        peeked: None,
        peek_start_off: 0,
    };
    parser.run()
}

/// One open block on the compile-time stack.
enum Frame {
    If(IfFrame),
    Frag(FragFrame),
    Format { pos: Pos },
    Ctype { pos: Pos },
}

struct IfFrame {
    pos: Pos,
    /// Instruction count when the block opened; truncation target when the
    /// whole statement is discarded.
    watermark: usize,
    /// Jumps to the end of the statement, one per finished branch.
    end_jumps: Vec<usize>,
    /// The conditional jump of the branch currently being compiled.
    cond_jump: Option<usize>,
    seen_else: bool,
    /// Set on misordered elif/else; the statement is discarded at `endif`.
    disordered: bool,
}

struct FragFrame {
    pos: Pos,
    watermark: usize,
    open_ip: usize,
    /// Path segments pushed onto the compile-time fragment chain.
    segments: usize,
    /// Set when the directive was invalid; the body is discarded.
    discard: bool,
}

pub(crate) struct Parser<'a> {
    /// Lexer stack; includes push a new lexer on top.
    lexers: Vec<Lexer>,
    program: Program,
    pub(crate) log: &'a mut ErrorLog,
    dict: Option<&'a dyn Dictionary>,
    opts: &'a CompileOpts,
    frames: Vec<Frame>,
    /// Compile-time chain of open fragment names, used to resolve static
    /// variables and to rewrite useless runtime variables.
    pub(crate) frag_chain: Vec<String>,
    peeked: Option<Token>,
    /// Byte offset of the start of the peeked token (including preceding
    /// whitespace); used to slice index-expression source for diagnostics.
    peek_start_off: usize,
}

impl<'a> Parser<'a> {
    // ---- token plumbing ----

    fn lexer_mut(&mut self) -> &mut Lexer {
        self.lexers.last_mut().expect("lexer stack is never empty")
    }

    fn filename(&self) -> String {
        self.lexers.last().expect("lexer stack is never empty").filename().to_owned()
    }

    /// Fetch the next token. `expect_operand` steers the regex/division
    /// disambiguation; it must reflect the grammar position.
    pub(crate) fn next_tok(&mut self, expect_operand: bool) -> Token {
        if let Some(tok) = self.peeked.take() {
            return tok;
        }
        self.lexer_mut().expect_operand = expect_operand;
        let lexer = self.lexers.last_mut().expect("lexer stack is never empty");
        lexer.next_token(self.log)
    }

    pub(crate) fn peek_tok(&mut self, expect_operand: bool) -> &Token {
        if self.peeked.is_none() {
            self.peek_start_off = self.lexer_off();
            let tok = self.next_tok(expect_operand);
            self.peeked = Some(tok);
        }
        self.peeked.as_ref().expect("just peeked")
    }

    pub(crate) fn push_back(&mut self, tok: Token) {
        debug_assert!(self.peeked.is_none());
        self.peeked = Some(tok);
    }

    fn lexer_off(&self) -> usize {
        self.lexers.last().expect("lexer stack is never empty").offset()
    }

    /// Byte offset where the next unconsumed token starts (the peeked token
    /// included). Used to slice expression source text for path reprs.
    pub(crate) fn mark(&self) -> usize {
        if self.peeked.is_some() { self.peek_start_off } else { self.lexer_off() }
    }

    pub(crate) fn slice_src(&self, from: usize, to: usize) -> String {
        self.lexers
            .last()
            .expect("lexer stack is never empty")
            .text()
            .get(from..to)
            .unwrap_or("")
            .trim()
            .to_owned()
    }

    // ---- emission ----

    pub(crate) fn emit(&mut self, kind: InstrKind, pos: Pos) -> usize {
        self.program.instrs.push(Instr::new(kind, pos));
        self.program.instrs.len() - 1
    }

    pub(crate) fn intern(&mut self, s: &str) -> StrId {
        self.program.strings.intern(s)
    }

    pub(crate) fn len(&self) -> usize {
        self.program.instrs.len()
    }

    fn truncate(&mut self, watermark: usize) {
        self.program.instrs.truncate(watermark);
    }

    /// Back-patch the jump at `at` so that it targets the next instruction
    /// to be emitted.
    pub(crate) fn patch_jump(&mut self, at: usize) {
        let offset = (self.program.instrs.len() - at - 1) as i32;
        match &mut self.program.instrs[at].kind {
            InstrKind::Jmp(o)
            | InstrKind::JmpIfNot(o)
            | InstrKind::And(o)
            | InstrKind::Or(o)
            | InstrKind::NextFrag(o) => *o = offset,
            InstrKind::OpenFrag { exit, .. } => *exit = offset,
            other => unreachable!("patching non-jump instruction {}", other.name()),
        }
    }

    // ---- driver ----

    fn run(mut self) -> Program {
        loop {
            self.lexer_mut().mode = Mode::Text;
            let tok = self.next_tok(true);
            match tok.kind {
                TokenKind::Text => {
                    if !tok.view.is_empty() {
                        let id = self.intern(&tok.view);
                        self.emit(InstrKind::PushStr(id), tok.pos);
                        self.emit(InstrKind::PrintRaw, tok.pos);
                    }
                }
                TokenKind::ShortExpr => self.short_print(tok.pos, false),
                TokenKind::ShortRaw => self.short_print(tok.pos, true),
                TokenKind::ShortDict => self.short_dict(tok.pos),
                TokenKind::TengStart => self.directive(tok.pos),
                TokenKind::Eof => {
                    if self.lexers.len() > 1 {
                        self.lexers.pop();
                        continue;
                    }
                    self.finish(tok.pos);
                    break;
                }
                _ => unreachable!("text mode produced {}", tok.name()),
            }
        }
        self.program
    }

    /// Unwind still-open blocks at end of input.
    fn finish(&mut self, eof_pos: Pos) {
        if !self.frames.is_empty() {
            for frame in &self.frames {
                match frame {
                    Frame::If(f) => self.log.error(
                        f.pos,
                        "Missing <?teng endif?> closing directive of <?teng if?> statement; \
                         discarding whole if statement",
                    ),
                    Frame::Frag(f) => self.log.error(
                        f.pos,
                        "The closing directive of this <?teng frag?> directive is missing",
                    ),
                    Frame::Format { pos } => self.log.error(
                        *pos,
                        "The closing directive of this <?teng format?> directive is missing",
                    ),
                    Frame::Ctype { pos } => self.log.error(
                        *pos,
                        "The closing directive of this <?teng ctype?> directive is missing",
                    ),
                }
            }
            self.log.error(eof_pos, "Unexpected token: name=<EOF>, view=");
        }
        while let Some(frame) = self.frames.pop() {
            match frame {
                Frame::If(f) => self.truncate(f.watermark),
                Frame::Frag(f) => {
                    if f.discard {
                        self.truncate(f.watermark);
                    } else {
                        self.close_frag_block(&f, eof_pos);
                    }
                    let keep = self.frag_chain.len() - f.segments;
                    self.frag_chain.truncate(keep);
                }
                Frame::Format { .. } => {
                    self.emit(InstrKind::PopFormat, eof_pos);
                }
                Frame::Ctype { .. } => {
                    self.emit(InstrKind::PopCtype, eof_pos);
                }
            }
        }
        self.emit(InstrKind::Halt, eof_pos);
    }

    /// Emit the iteration tail of a fragment block and patch its entry.
    fn close_frag_block(&mut self, frame: &FragFrame, pos: Pos) {
        let next_ip = self.len();
        let back = frame.open_ip as i32 - next_ip as i32;
        self.emit(InstrKind::NextFrag(back), pos);
        self.emit(InstrKind::CloseFrag, pos);
        self.patch_jump(frame.open_ip);
    }

    // ---- print statements ----

    fn short_print(&mut self, pos: Pos, raw: bool) {
        self.lexer_mut().mode = Mode::Expr;
        self.parse_expr_guarded(&ExprCtx::print(TokenKind::ShortEnd));
        self.expect_closer(TokenKind::ShortEnd);
        self.emit(if raw { InstrKind::PrintRaw } else { InstrKind::Print }, pos);
    }

    fn short_dict(&mut self, pos: Pos) {
        self.lexer_mut().mode = Mode::Expr;
        let tok = self.next_tok(true);
        if tok.kind == TokenKind::Ident {
            self.emit_dict_print(&tok.view, tok.pos);
        } else {
            self.log.error(pos, "Invalid dictionary item identifier");
            self.log.error(tok.pos, format!("Unexpected token: {tok}"));
            if tok.kind == TokenKind::ShortEnd || tok.kind == TokenKind::Eof {
                self.push_back(tok);
            }
        }
        self.expect_closer(TokenKind::ShortEnd);
    }

    /// Dictionary prints resolve at compile time; the resolved string is
    /// baked into the pool. A miss prints the key itself.
    fn emit_dict_print(&mut self, key: &str, pos: Pos) {
        let text = match self.dict.and_then(|d| d.entry(key)) {
            Some(value) => value.to_owned(),
            None => {
                self.log.error(pos, format!("Dictionary item '{key}' was not found"));
                key.to_owned()
            }
        };
        let id = self.intern(&text);
        self.emit(InstrKind::PushStr(id), pos);
        self.emit(InstrKind::PrintRaw, pos);
    }

    // ---- directives ----

    fn directive(&mut self, dpos: Pos) {
        self.lexer_mut().mode = Mode::Expr;
        let tok = self.next_tok(true);
        match tok.kind {
            TokenKind::KwIf => self.if_directive(dpos),
            TokenKind::KwElif => self.elif_directive(dpos),
            TokenKind::KwElse => self.else_directive(dpos),
            TokenKind::KwEndif => self.endif_directive(dpos),
            TokenKind::KwFrag => self.frag_directive(dpos),
            TokenKind::KwEndfrag => self.endfrag_directive(dpos),
            TokenKind::KwFormat => self.format_directive(dpos),
            TokenKind::KwEndformat => self.endformat_directive(dpos),
            TokenKind::KwCtype => self.ctype_directive(dpos),
            TokenKind::KwEndctype => self.endctype_directive(dpos),
            TokenKind::KwExpr => self.expr_directive(dpos),
            TokenKind::KwSet => self.set_directive(dpos),
            TokenKind::KwDict => self.dict_directive(dpos),
            TokenKind::KwInclude => self.include_directive(dpos),
            _ => {
                self.log.error(dpos, "Unknown teng directive; ignoring it");
                self.log.error(tok.pos, format!("Unexpected token: {tok}"));
                if tok.kind == TokenKind::End || tok.kind == TokenKind::Eof {
                    self.push_back(tok);
                }
                self.expect_closer(TokenKind::End);
            }
        }
    }

    fn if_directive(&mut self, dpos: Pos) {
        let watermark = self.len();
        self.parse_expr_guarded(&ExprCtx::if_cond(dpos));
        self.expect_closer(TokenKind::End);
        let cond_jump = self.emit(InstrKind::JmpIfNot(0), dpos);
        self.frames.push(Frame::If(IfFrame {
            pos: dpos,
            watermark,
            end_jumps: Vec::new(),
            cond_jump: Some(cond_jump),
            seen_else: false,
            disordered: false,
        }));
    }

    fn elif_directive(&mut self, dpos: Pos) {
        match self.frames.last_mut() {
            Some(Frame::If(f)) if f.seen_else => {
                let if_pos = f.pos;
                f.disordered = true;
                self.log.error(
                    if_pos,
                    "Disordered elif/else branches in <?teng if?> statement; \
                     discarding whole if statement",
                );
                self.parse_expr_guarded(&ExprCtx::elif_cond(dpos));
                self.expect_closer(TokenKind::End);
            }
            Some(Frame::If(_)) => {
                let end_jump = self.emit(InstrKind::Jmp(0), dpos);
                let prev_cond = {
                    let Some(Frame::If(f)) = self.frames.last_mut() else { unreachable!() };
                    f.end_jumps.push(end_jump);
                    f.cond_jump.take()
                };
                if let Some(at) = prev_cond {
                    self.patch_jump(at);
                }
                self.parse_expr_guarded(&ExprCtx::elif_cond(dpos));
                self.expect_closer(TokenKind::End);
                let cond_jump = self.emit(InstrKind::JmpIfNot(0), dpos);
                let Some(Frame::If(f)) = self.frames.last_mut() else { unreachable!() };
                f.cond_jump = Some(cond_jump);
            }
            _ => {
                self.log
                    .warning(dpos, "The <?teng elif?> directive is not attached to any if block");
                let watermark = self.len();
                self.parse_expr_guarded(&ExprCtx::elif_cond(dpos));
                self.truncate(watermark);
                self.expect_closer(TokenKind::End);
            }
        }
    }

    fn else_directive(&mut self, dpos: Pos) {
        match self.frames.last_mut() {
            Some(Frame::If(f)) if f.seen_else => {
                let if_pos = f.pos;
                f.disordered = true;
                self.log.error(
                    if_pos,
                    "Disordered elif/else branches in <?teng if?> statement; \
                     discarding whole if statement",
                );
            }
            Some(Frame::If(_)) => {
                let end_jump = self.emit(InstrKind::Jmp(0), dpos);
                let prev_cond = {
                    let Some(Frame::If(f)) = self.frames.last_mut() else { unreachable!() };
                    f.end_jumps.push(end_jump);
                    f.seen_else = true;
                    f.cond_jump.take()
                };
                if let Some(at) = prev_cond {
                    self.patch_jump(at);
                }
            }
            _ => {
                self.log
                    .warning(dpos, "The <?teng else?> directive is not attached to any if block");
            }
        }
        self.expect_closer_no_options(TokenKind::End);
    }

    fn endif_directive(&mut self, dpos: Pos) {
        match self.frames.last() {
            Some(Frame::If(_)) => {
                let Some(Frame::If(f)) = self.frames.pop() else { unreachable!() };
                if f.disordered {
                    self.truncate(f.watermark);
                } else {
                    if let Some(at) = f.cond_jump {
                        self.patch_jump(at);
                    }
                    for at in f.end_jumps {
                        self.patch_jump(at);
                    }
                }
            }
            Some(Frame::Frag(_)) if self.has_if_below_top_frags() => {
                self.discard_frags_crossing_if(dpos);
            }
            _ => {
                self.log
                    .warning(dpos, "The <?teng endif?> directive closes unopened if block");
            }
        }
        self.expect_closer_no_options(TokenKind::End);
    }

    /// True when fragment frames sit on top of an open if frame.
    fn has_if_below_top_frags(&self) -> bool {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Frag(_) | Frame::Format { .. } | Frame::Ctype { .. } => continue,
                Frame::If(_) => return true,
            }
        }
        false
    }

    /// An `endif` arrived while fragment blocks opened inside the if are
    /// still open: the fragment blocks cross the if boundary. Their content
    /// is discarded and the if statement closes normally.
    fn discard_frags_crossing_if(&mut self, dpos: Pos) {
        let filename = self.filename();
        while let Some(frame) = self.frames.pop() {
            match frame {
                Frame::Frag(f) => {
                    self.log.error(
                        f.pos,
                        format!(
                            "The <?teng frag?> block crosses the parent if block ending \
                             at={}; discarding fragment block content",
                            dpos.located_in(&filename),
                        ),
                    );
                    self.truncate(f.watermark);
                    let keep = self.frag_chain.len() - f.segments;
                    self.frag_chain.truncate(keep);
                }
                Frame::Format { .. } | Frame::Ctype { .. } => {
                    // these close with their region; the discard swallowed them
                }
                Frame::If(f) => {
                    if f.disordered {
                        self.truncate(f.watermark);
                    } else {
                        if let Some(at) = f.cond_jump {
                            self.patch_jump(at);
                        }
                        for at in f.end_jumps {
                            self.patch_jump(at);
                        }
                    }
                    return;
                }
            }
        }
    }

    fn frag_directive(&mut self, dpos: Pos) {
        let watermark = self.len();
        match self.parse_frag_name() {
            Some((name, segments)) => {
                self.expect_closer(TokenKind::End);
                let id = self.intern(&name);
                let open_ip = self.emit(InstrKind::OpenFrag { name: id, exit: 0 }, dpos);
                self.frag_chain.extend(segments.iter().cloned());
                self.frames.push(Frame::Frag(FragFrame {
                    pos: dpos,
                    watermark,
                    open_ip,
                    segments: segments.len(),
                    discard: false,
                }));
            }
            None => {
                let tok = self.next_tok(true);
                self.log
                    .error(dpos, "Invalid fragment identifier; discarding fragment block content");
                self.log.error(tok.pos, format!("Unexpected token: {tok}"));
                if tok.kind == TokenKind::End || tok.kind == TokenKind::Eof {
                    self.push_back(tok);
                }
                self.expect_closer(TokenKind::End);
                self.frames.push(Frame::Frag(FragFrame {
                    pos: dpos,
                    watermark,
                    open_ip: 0,
                    segments: 0,
                    discard: true,
                }));
            }
        }
    }

    /// Parse `name`, `a.b.c` or `.a.b`; returns the joined path and its
    /// segments, or None when the next token cannot start a fragment name.
    /// A leading dot anchors the path at the root.
    fn parse_frag_name(&mut self) -> Option<(String, Vec<String>)> {
        let absolute = if self.peek_tok(true).kind == TokenKind::Dot {
            self.next_tok(true);
            true
        } else {
            false
        };
        if self.peek_tok(true).kind != TokenKind::Ident {
            return None;
        }
        let mut segments = vec![self.next_tok(true).view];
        while self.peek_tok(false).kind == TokenKind::Dot {
            self.next_tok(false);
            let tok = self.next_tok(true);
            if tok.kind != TokenKind::Ident {
                self.push_back(tok);
                return None;
            }
            segments.push(tok.view);
        }
        let mut name = segments.join(".");
        if absolute {
            name.insert(0, '.');
        }
        Some((name, segments))
    }

    fn endfrag_directive(&mut self, dpos: Pos) {
        match self.frames.last() {
            Some(Frame::Frag(_)) => {
                let Some(Frame::Frag(f)) = self.frames.pop() else { unreachable!() };
                if f.discard {
                    self.truncate(f.watermark);
                } else {
                    self.close_frag_block(&f, dpos);
                }
                let keep = self.frag_chain.len() - f.segments;
                self.frag_chain.truncate(keep);
            }
            Some(Frame::If(_)) if self.has_frag_below_top_ifs() => {
                self.discard_ifs_crossing_frag(dpos);
            }
            _ => {
                self.log.warning(
                    dpos,
                    "The <?teng endfrag?> directive closes unopened fragment block",
                );
            }
        }
        self.expect_closer_no_options(TokenKind::End);
    }

    fn has_frag_below_top_ifs(&self) -> bool {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::If(_) | Frame::Format { .. } | Frame::Ctype { .. } => continue,
                Frame::Frag(_) => return true,
            }
        }
        false
    }

    /// An `endfrag` arrived while if blocks opened inside the fragment are
    /// still open: the if statements cross the fragment boundary and are
    /// discarded whole; the fragment block then closes here.
    fn discard_ifs_crossing_frag(&mut self, dpos: Pos) {
        let filename = self.filename();
        // the outermost crossing if owns the truncation point
        let mut outer_watermark = None;
        while let Some(frame) = self.frames.pop() {
            match frame {
                Frame::If(f) => {
                    self.log.error(
                        f.pos,
                        format!(
                            "The <?teng if?> block crosses the parent fragment block ending \
                             at={}; discarding whole if statement",
                            dpos.located_in(&filename),
                        ),
                    );
                    outer_watermark = Some(f.watermark);
                }
                Frame::Format { .. } | Frame::Ctype { .. } => {}
                Frame::Frag(f) => {
                    if let Some(watermark) = outer_watermark {
                        self.truncate(watermark);
                    }
                    if f.discard {
                        self.truncate(f.watermark);
                    } else {
                        self.close_frag_block(&f, dpos);
                    }
                    let keep = self.frag_chain.len() - f.segments;
                    self.frag_chain.truncate(keep);
                    self.log.warning(
                        dpos,
                        "The <?teng endfrag?> directive closes unopened fragment block",
                    );
                    return;
                }
            }
        }
    }

    fn format_directive(&mut self, dpos: Pos) {
        let mut mode = None;
        let tok = self.next_tok(true);
        if tok.kind == TokenKind::Ident && tok.view == "space" {
            if self.peek_tok(false).kind == TokenKind::Assign {
                self.next_tok(false);
                let val = self.next_tok(true);
                if let TokenKind::Str(value) = &val.kind {
                    if matches!(
                        value.as_str(),
                        "noformat" | "nospace" | "nowhite" | "onespace" | "striplines"
                            | "joinlines"
                    ) {
                        mode = Some(value.clone());
                    } else {
                        self.log.error(
                            val.pos,
                            format!("Unsupported value '{value}' of the space formatting option"),
                        );
                    }
                } else {
                    self.log.error(val.pos, format!("Unexpected token: {val}"));
                    if val.kind == TokenKind::End || val.kind == TokenKind::Eof {
                        self.push_back(val);
                    }
                }
            } else {
                self.log.error(dpos, "Invalid or missing space option in format directive");
            }
        } else {
            self.log.error(dpos, "Invalid or missing space option in format directive");
            if tok.kind == TokenKind::End || tok.kind == TokenKind::Eof {
                self.push_back(tok);
            }
        }
        self.expect_closer(TokenKind::End);
        let id = self.intern(mode.as_deref().unwrap_or("noformat"));
        self.emit(InstrKind::PushFormat(id), dpos);
        self.frames.push(Frame::Format { pos: dpos });
    }

    fn endformat_directive(&mut self, dpos: Pos) {
        match self.frames.last() {
            Some(Frame::Format { .. }) => {
                self.frames.pop();
                self.emit(InstrKind::PopFormat, dpos);
            }
            _ => {
                self.log
                    .warning(dpos, "The <?teng endformat?> directive closes unopened format block");
            }
        }
        self.expect_closer_no_options(TokenKind::End);
    }

    fn ctype_directive(&mut self, dpos: Pos) {
        let tok = self.next_tok(true);
        let name = if let TokenKind::Str(name) = &tok.kind {
            name.clone()
        } else {
            self.log.error(dpos, "Invalid content type name; using top instead");
            self.log.error(tok.pos, format!("Unexpected token: {tok}"));
            if tok.kind == TokenKind::End || tok.kind == TokenKind::Eof {
                self.push_back(tok);
            }
            // empty name duplicates the top escaper without further noise
            String::new()
        };
        self.expect_closer_no_options(TokenKind::End);
        let id = self.intern(&name);
        self.emit(InstrKind::PushCtype(id), dpos);
        self.frames.push(Frame::Ctype { pos: dpos });
    }

    fn endctype_directive(&mut self, dpos: Pos) {
        match self.frames.last() {
            Some(Frame::Ctype { .. }) => {
                self.frames.pop();
                self.emit(InstrKind::PopCtype, dpos);
            }
            _ => {
                self.log
                    .warning(dpos, "The <?teng endctype?> directive closes unopened ctype block");
            }
        }
        self.expect_closer_no_options(TokenKind::End);
    }

    fn expr_directive(&mut self, dpos: Pos) {
        self.parse_expr_guarded(&ExprCtx::print(TokenKind::End));
        self.expect_closer(TokenKind::End);
        self.emit(InstrKind::Print, dpos);
    }

    fn set_directive(&mut self, dpos: Pos) {
        // optional $ or . prefix on the variable being set
        let mut tok = self.next_tok(true);
        if tok.kind == TokenKind::Dollar || tok.kind == TokenKind::Dot {
            tok = self.next_tok(true);
        }
        if tok.kind != TokenKind::Ident {
            self.log.error(dpos, "Invalid variable identifier in the set directive");
            self.log.error(tok.pos, format!("Unexpected token: {tok}"));
            if tok.kind == TokenKind::End || tok.kind == TokenKind::Eof {
                self.push_back(tok);
            }
            self.expect_closer(TokenKind::End);
            return;
        }
        let name = tok.view;
        let eq = self.next_tok(false);
        if eq.kind != TokenKind::Assign {
            self.log.error(eq.pos, format!("Unexpected token: {eq}"));
            if eq.kind == TokenKind::End || eq.kind == TokenKind::Eof {
                self.push_back(eq);
            }
            self.expect_closer(TokenKind::End);
            return;
        }
        self.parse_expr_guarded(&ExprCtx::print(TokenKind::End));
        self.expect_closer(TokenKind::End);
        let id = self.intern(&name);
        self.emit(InstrKind::Set { name: id }, dpos);
    }

    fn dict_directive(&mut self, dpos: Pos) {
        let tok = self.next_tok(true);
        if tok.kind == TokenKind::Ident {
            self.emit_dict_print(&tok.view, tok.pos);
        } else {
            self.log.error(dpos, "Invalid dictionary item identifier");
            self.log.error(tok.pos, format!("Unexpected token: {tok}"));
            if tok.kind == TokenKind::End || tok.kind == TokenKind::Eof {
                self.push_back(tok);
            }
        }
        self.expect_closer(TokenKind::End);
    }

    fn include_directive(&mut self, dpos: Pos) {
        let mut file = None;
        // options: name = 'literal' pairs
        loop {
            let tok = self.next_tok(true);
            match tok.kind {
                TokenKind::Ident => {
                    let opt = tok.view.clone();
                    let eq = self.next_tok(false);
                    if eq.kind != TokenKind::Assign {
                        self.log.error(eq.pos, format!("Unexpected token: {eq}"));
                        if eq.kind == TokenKind::End || eq.kind == TokenKind::Eof {
                            self.push_back(eq);
                        }
                        break;
                    }
                    let val = self.next_tok(true);
                    if let TokenKind::Str(value) = &val.kind {
                        if opt == "file" {
                            file = Some(value.clone());
                        }
                    } else {
                        self.log.error(val.pos, format!("Unexpected token: {val}"));
                        if val.kind == TokenKind::End || val.kind == TokenKind::Eof {
                            self.push_back(val);
                        }
                        break;
                    }
                }
                TokenKind::End | TokenKind::Eof => {
                    self.push_back(tok);
                    break;
                }
                _ => {
                    self.log.error(tok.pos, format!("Unexpected token: {tok}"));
                    break;
                }
            }
        }
        self.expect_closer(TokenKind::End);

        let Some(file) = file else {
            self.log.error(dpos, "Missing file option in include directive");
            return;
        };
        if self.lexers.len() >= MAX_INCLUDE_DEPTH {
            self.log
                .error(dpos, "Too many nested includes; discarding the include directive");
            return;
        }
        let Some(root) = self.opts.include_root.clone() else {
            self.log.error(
                dpos,
                format!("Cannot open input file '{file}'; the include root is not configured"),
            );
            return;
        };
        let path: PathBuf = root.join(&file);
        match std::fs::read(&path) {
            Ok(bytes) => {
                let source = Source::from_bytes(&bytes, path.display().to_string(), self.log);
                let no_print_escape = self.opts.no_print_escape;
                self.lexers.push(Lexer::new(&source, no_print_escape));
            }
            Err(_) => {
                self.log
                    .error(dpos, format!("Cannot open input file '{}'", path.display()));
            }
        }
    }

    // ---- closers ----

    /// Consume the directive closer, recovering from garbage before it.
    pub(crate) fn expect_closer(&mut self, closer: TokenKind) {
        let tok = self.next_tok(false);
        if tok.kind == closer {
            self.lexer_mut().mode = Mode::Text;
            return;
        }
        if tok.kind == TokenKind::Eof {
            self.push_back(tok);
            return;
        }
        self.log.error(tok.pos, format!("Unexpected token: {tok}"));
        self.skip_through_closer(closer);
    }

    /// Consume the closer of a directive that takes no options, warning
    /// about anything found before it.
    fn expect_closer_no_options(&mut self, closer: TokenKind) {
        let tok = self.next_tok(false);
        if tok.kind == closer {
            self.lexer_mut().mode = Mode::Text;
            return;
        }
        if tok.kind == TokenKind::Eof {
            self.push_back(tok);
            return;
        }
        self.log
            .warning(tok.pos, "This directive doesn't accept any options; ignoring them");
        self.skip_through_closer(closer);
    }

    fn skip_through_closer(&mut self, closer: TokenKind) {
        loop {
            let tok = self.next_tok(false);
            if tok.kind == closer {
                self.lexer_mut().mode = Mode::Text;
                return;
            }
            if tok.kind == TokenKind::Eof {
                self.push_back(tok);
                return;
            }
        }
    }
}

/// Context for one guarded expression parse: the closing delimiter and the
/// diagnostic hints flushed ahead of a syntax error.
pub(crate) struct ExprCtx {
    pub closer: TokenKind,
    pub hint_pos: Option<Pos>,
    pub empty_hint: &'static str,
    pub invalid_hint: &'static str,
}

impl ExprCtx {
    fn print(closer: TokenKind) -> Self {
        Self {
            closer,
            hint_pos: None,
            empty_hint: "",
            invalid_hint: "",
        }
    }

    fn if_cond(dpos: Pos) -> Self {
        Self {
            closer: TokenKind::End,
            hint_pos: Some(dpos),
            empty_hint: "You forgot write condition of the if statement",
            invalid_hint: "Invalid expression in the if statement condition",
        }
    }

    fn elif_cond(dpos: Pos) -> Self {
        Self {
            closer: TokenKind::End,
            hint_pos: Some(dpos),
            empty_hint: "You forgot write condition of the elif statement",
            invalid_hint: "Invalid expression in the elif statement condition",
        }
    }
}
