//! Expression compilation: precedence climbing with direct postfix
//! emission, plus variable paths, queries and the `case` form.
//!
//! Parsing never throws: a failed sub-parse bubbles the offending token up
//! to `parse_expr_guarded`, which flushes pending diagnostic hints, logs
//! the error, truncates the instructions emitted for the expression and
//! replaces it with a single `PUSH_UNDEF`.

use teng_bytecode::InstrKind;
use teng_core::{CompiledRegex, Pos};

use super::{ExprCtx, Parser};
use crate::lexer::{Token, TokenKind};

/// Carries the token the grammar rejected.
pub(crate) struct ExprFail(pub Token);

type PResult = Result<(), ExprFail>;

/// Binary operator precedence, lowest first. One tier per spec row.
fn bin_prec(kind: &TokenKind) -> Option<u8> {
    Some(match kind {
        TokenKind::Or => 1,
        TokenKind::And => 2,
        TokenKind::BitOr | TokenKind::BitXor | TokenKind::BitAnd => 3,
        TokenKind::Eq | TokenKind::Ne | TokenKind::MatchRe | TokenKind::NMatchRe => 4,
        TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge => 5,
        TokenKind::Concat => 6,
        TokenKind::Plus | TokenKind::Minus => 7,
        TokenKind::Mul | TokenKind::Div | TokenKind::Mod => 8,
        TokenKind::Repeat => 9,
        _ => return None,
    })
}

fn bin_instr(kind: &TokenKind) -> InstrKind {
    match kind {
        TokenKind::BitOr => InstrKind::BitOr,
        TokenKind::BitXor => InstrKind::BitXor,
        TokenKind::BitAnd => InstrKind::BitAnd,
        TokenKind::Eq => InstrKind::Eq,
        TokenKind::Ne => InstrKind::Ne,
        TokenKind::MatchRe => InstrKind::MatchRe,
        TokenKind::NMatchRe => InstrKind::NMatchRe,
        TokenKind::Lt => InstrKind::Lt,
        TokenKind::Le => InstrKind::Le,
        TokenKind::Gt => InstrKind::Gt,
        TokenKind::Ge => InstrKind::Ge,
        TokenKind::Concat => InstrKind::Concat,
        TokenKind::Plus => InstrKind::Add,
        TokenKind::Minus => InstrKind::Sub,
        TokenKind::Mul => InstrKind::Mul,
        TokenKind::Div => InstrKind::Div,
        TokenKind::Mod => InstrKind::Mod,
        TokenKind::Repeat => InstrKind::Repeat,
        other => unreachable!("not a binary operator: {}", other.name()),
    }
}

const QUERIES: &[&str] = &["exists", "isempty", "type", "count", "defined", "jsonify"];

impl Parser<'_> {
    /// Compile one expression, replacing it with `Undefined` on failure.
    /// Leaves the closing delimiter unconsumed for the caller.
    pub(crate) fn parse_expr_guarded(&mut self, ctx: &ExprCtx) {
        let watermark = self.len();
        let start = self.peek_tok(true).pos;
        match self.parse_expr() {
            Ok(()) => {
                let tok = self.peek_tok(false).clone();
                if tok.kind == ctx.closer || tok.kind == TokenKind::Eof {
                    return;
                }
                self.next_tok(false);
                self.fail_expr(ctx, watermark, start, tok, false);
            }
            Err(ExprFail(tok)) => {
                let empty = tok.pos == start
                    && matches!(tok.kind, TokenKind::End | TokenKind::ShortEnd | TokenKind::Eof);
                self.fail_expr(ctx, watermark, start, tok, empty);
            }
        }
    }

    fn fail_expr(&mut self, ctx: &ExprCtx, watermark: usize, start: Pos, tok: Token, empty: bool) {
        if let Some(hint_pos) = ctx.hint_pos {
            let hint = if empty { ctx.empty_hint } else { ctx.invalid_hint };
            if !hint.is_empty() {
                self.log.diag(hint_pos, hint);
            }
        }
        self.log.error(tok.pos, format!("Unexpected token: {tok}"));
        self.log.error(
            start,
            "Invalid expression, fix it please; replacing whole expression with undefined value",
        );
        self.truncate(watermark);
        self.emit(InstrKind::PushUndef, start);
        if tok.kind == ctx.closer || tok.kind == TokenKind::Eof {
            self.push_back(tok);
        } else {
            loop {
                let next = self.peek_tok(false);
                if next.kind == ctx.closer || next.kind == TokenKind::Eof {
                    break;
                }
                self.next_tok(false);
            }
        }
    }

    pub(crate) fn parse_expr(&mut self) -> PResult {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> PResult {
        self.parse_binary(1)?;
        if self.peek_tok(false).kind == TokenKind::Question {
            let q = self.next_tok(false);
            let jump_else = self.emit(InstrKind::JmpIfNot(0), q.pos);
            self.parse_ternary()?;
            let jump_end = self.emit(InstrKind::Jmp(0), q.pos);
            let colon = self.next_tok(false);
            if colon.kind != TokenKind::Colon {
                return Err(ExprFail(colon));
            }
            self.patch_jump(jump_else);
            self.parse_ternary()?;
            self.patch_jump(jump_end);
        }
        Ok(())
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult {
        self.parse_unary()?;
        loop {
            let prec = match bin_prec(&self.peek_tok(false).kind) {
                Some(p) if p >= min_prec => p,
                _ => break,
            };
            let op = self.next_tok(false);
            match op.kind {
                // value-preserving short circuit: the jump keeps the left
                // operand when it decides the result
                TokenKind::And => {
                    let jump = self.emit(InstrKind::And(0), op.pos);
                    self.parse_binary(prec + 1)?;
                    self.patch_jump(jump);
                }
                TokenKind::Or => {
                    let jump = self.emit(InstrKind::Or(0), op.pos);
                    self.parse_binary(prec + 1)?;
                    self.patch_jump(jump);
                }
                _ => {
                    self.parse_binary(prec + 1)?;
                    self.emit(bin_instr(&op.kind), op.pos);
                }
            }
        }
        Ok(())
    }

    fn parse_unary(&mut self) -> PResult {
        let tok = self.next_tok(true);
        match tok.kind {
            TokenKind::Minus => {
                self.parse_unary()?;
                self.emit(InstrKind::Neg, tok.pos);
            }
            TokenKind::Plus => {
                self.parse_unary()?;
                self.emit(InstrKind::Pos, tok.pos);
            }
            TokenKind::Not => {
                self.parse_unary()?;
                self.emit(InstrKind::Not, tok.pos);
            }
            TokenKind::BitNot => {
                self.parse_unary()?;
                self.emit(InstrKind::BitNot, tok.pos);
            }
            TokenKind::DecInt(v) | TokenKind::HexInt(v) | TokenKind::OctInt(v) => {
                self.emit(InstrKind::PushInt(v), tok.pos);
            }
            TokenKind::Real(v) => {
                self.emit(InstrKind::PushReal(v), tok.pos);
            }
            TokenKind::Str(ref s) => {
                let id = self.intern(s);
                self.emit(InstrKind::PushStr(id), tok.pos);
            }
            TokenKind::RegexLit { ref pattern, ref flags } => {
                match CompiledRegex::new(pattern, flags) {
                    Ok(re) => {
                        let id = self.program.add_regex(re);
                        self.emit(InstrKind::PushRegex(id), tok.pos);
                    }
                    Err(_) => {
                        self.log
                            .error(tok.pos, format!("Invalid regex literal /{pattern}/{flags}"));
                        self.emit(InstrKind::PushUndef, tok.pos);
                    }
                }
            }
            TokenKind::LParen => {
                self.parse_expr()?;
                let close = self.next_tok(false);
                if close.kind != TokenKind::RParen {
                    return Err(ExprFail(close));
                }
            }
            TokenKind::Ident => return self.ident_operand(tok),
            TokenKind::Dollar => {
                let name = self.next_tok(true);
                if name.kind != TokenKind::Ident {
                    return Err(ExprFail(name));
                }
                let names = self.collect_dotted(name)?;
                self.compile_name_path(names)?;
            }
            TokenKind::DollarDollar => return self.rtvar(tok.pos, false),
            TokenKind::At => {
                let key = self.next_tok(true);
                if key.kind != TokenKind::Ident {
                    return Err(ExprFail(key));
                }
                let id = self.intern(&key.view);
                self.emit(InstrKind::PushStr(id), key.pos);
                self.emit(InstrKind::DictLookup, tok.pos);
            }
            TokenKind::KwCase => return self.case_expr(tok.pos),
            _ => return Err(ExprFail(tok)),
        }
        Ok(())
    }

    fn ident_operand(&mut self, tok: Token) -> PResult {
        if self.peek_tok(false).kind == TokenKind::LParen {
            if QUERIES.contains(&tok.view.as_str()) {
                return self.query(tok);
            }
            return self.call(tok);
        }
        let names = self.collect_dotted(tok)?;
        self.compile_name_path(names)
    }

    fn call(&mut self, tok: Token) -> PResult {
        self.next_tok(false); // (
        let mut argc: u16 = 0;
        if self.peek_tok(true).kind == TokenKind::RParen {
            self.next_tok(true);
        } else {
            loop {
                self.parse_expr()?;
                argc += 1;
                let sep = self.next_tok(false);
                match sep.kind {
                    TokenKind::Comma => continue,
                    TokenKind::RParen => break,
                    _ => return Err(ExprFail(sep)),
                }
            }
        }
        let name = self.intern(&tok.view);
        self.emit(InstrKind::Call { name, argc }, tok.pos);
        Ok(())
    }

    /// Collect `first(.ident)*` into a list of (name, pos) pairs.
    fn collect_dotted(&mut self, first: Token) -> Result<Vec<(String, Pos)>, ExprFail> {
        let mut names = vec![(first.view, first.pos)];
        while self.peek_tok(false).kind == TokenKind::Dot {
            self.next_tok(false);
            let tok = self.next_tok(true);
            if tok.kind != TokenKind::Ident {
                return Err(ExprFail(tok));
            }
            names.push((tok.view, tok.pos));
        }
        Ok(names)
    }

    /// Compile a bare (or `$`-prefixed) dotted path. Paths that address an
    /// open fragment compile to a static variable load; everything else
    /// becomes an auto runtime variable.
    fn compile_name_path(&mut self, mut names: Vec<(String, Pos)>) -> PResult {
        let first_pos = names[0].1;
        // leading _this segments carry no meaning
        while names.len() > 1 && names[0].0 == "_this" {
            names.remove(0);
        }
        if names.len() == 1 && names[0].0 == "_this" {
            self.emit(InstrKind::PushThisFrag, first_pos);
            return Ok(());
        }
        let interior_special = names
            .iter()
            .any(|(n, _)| n == "_parent" || n == "_this");
        if !interior_special {
            if names.len() == 1 {
                let (name, pos) = names.pop().expect("one element");
                self.emit_static_var(self.frag_chain.len() as u16, &name, pos);
                return Ok(());
            }
            let prefix: Vec<&str> = names[..names.len() - 1].iter().map(|(n, _)| n.as_str()).collect();
            let matches_chain = prefix.len() <= self.frag_chain.len()
                && prefix.iter().zip(&self.frag_chain).all(|(a, b)| *a == b.as_str());
            if matches_chain {
                let offset = prefix.len() as u16;
                let repr = format!(
                    ".{}",
                    names.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>().join("."),
                );
                let (name, pos) = names.pop().expect("non-empty");
                let name_id = self.intern(&name);
                let repr_id = self.intern(&repr);
                self.emit(
                    InstrKind::Var { frame_offset: offset, name: name_id, repr: repr_id },
                    pos,
                );
                return Ok(());
            }
        }
        // auto runtime variable, relative to the current fragment
        self.emit(InstrKind::PushThisFrag, first_pos);
        let mut repr = String::new();
        for (name, pos) in names {
            self.emit_chain_step(&name, pos, &mut repr, false);
        }
        Ok(())
    }

    /// Emit a static variable load addressing the open fragment at `offset`.
    fn emit_static_var(&mut self, offset: u16, name: &str, pos: Pos) {
        let mut parts: Vec<&str> = self
            .frag_chain
            .iter()
            .take(offset as usize)
            .map(|s| s.as_str())
            .collect();
        parts.push(name);
        let repr = format!(".{}", parts.join("."));
        let name_id = self.intern(name);
        let repr_id = self.intern(&repr);
        self.emit(InstrKind::Var { frame_offset: offset, name: name_id, repr: repr_id }, pos);
    }

    /// Emit one runtime-chain step, maintaining the dotted repr used by
    /// diagnostics (`path` operand carries the repr *before* the step).
    fn emit_chain_step(&mut self, name: &str, pos: Pos, repr: &mut String, absolute: bool) {
        match name {
            "_this" => {}
            "_parent" => {
                let path = self.intern(repr);
                self.emit(InstrKind::PushParent { path }, pos);
                append_repr(repr, name, absolute);
            }
            _ => {
                let path = self.intern(repr);
                let name_id = self.intern(name);
                self.emit(InstrKind::PushAttr { name: name_id, path }, pos);
                append_repr(repr, name, absolute);
            }
        }
    }

    /// Compile a `$$` runtime variable. Paths that are runtime only in
    /// their syntactic form are rewritten to static loads with an advisory
    /// warning.
    pub(crate) fn rtvar(&mut self, dollar_pos: Pos, force_runtime: bool) -> PResult {
        let absolute = if self.peek_tok(true).kind == TokenKind::Dot {
            self.next_tok(true);
            true
        } else {
            false
        };
        let mut pending: Vec<(String, Pos)> = Vec::new();
        let mut repr = String::new();
        let mut flushed = false;
        let mut dynamic = false;
        loop {
            let tok = self.next_tok(true);
            if tok.kind != TokenKind::Ident {
                return Err(ExprFail(tok));
            }
            let name = tok.view.clone();
            if name == "_parent" {
                dynamic = true;
            }
            if flushed {
                self.emit_chain_step(&name, tok.pos, &mut repr, absolute);
            } else if name == "_parent" {
                self.flush_chain(absolute, &mut pending, dollar_pos, &mut repr);
                flushed = true;
                self.emit_chain_step(&name, tok.pos, &mut repr, absolute);
            } else {
                pending.push((name, tok.pos));
            }

            while self.peek_tok(false).kind == TokenKind::LBracket {
                dynamic = true;
                if !flushed {
                    self.flush_chain(absolute, &mut pending, dollar_pos, &mut repr);
                    flushed = true;
                }
                self.next_tok(false); // [
                let from = self.mark();
                self.parse_expr()?;
                let to = self.mark();
                let close = self.next_tok(false);
                if close.kind != TokenKind::RBracket {
                    return Err(ExprFail(close));
                }
                let index_src = self.slice_src(from, to);
                let path = self.intern(&repr);
                self.emit(InstrKind::PushAttrAt { path }, close.pos);
                repr.push('[');
                repr.push_str(&index_src);
                repr.push(']');
            }

            if self.peek_tok(false).kind == TokenKind::Dot {
                self.next_tok(false);
                continue;
            }
            break;
        }

        if flushed {
            return Ok(());
        }

        let plain: Vec<(String, Pos)> =
            pending.iter().filter(|(n, _)| n.as_str() != "_this").cloned().collect();
        let rewritable = !force_runtime && !dynamic && {
            if absolute {
                !plain.is_empty() && {
                    let prefix = &plain[..plain.len() - 1];
                    prefix.len() <= self.frag_chain.len()
                        && prefix.iter().zip(&self.frag_chain).all(|((n, _), c)| n == c)
                }
            } else {
                plain.len() == 1
            }
        };
        if rewritable {
            let warn_pos = plain[0].1;
            self.log.warning(
                warn_pos,
                "The runtime variable is useless; converting it to regular variable",
            );
            if absolute {
                let offset = (plain.len() - 1) as u16;
                let repr = format!(
                    ".{}",
                    plain.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>().join("."),
                );
                let (name, pos) = plain.last().cloned().expect("non-empty");
                let name_id = self.intern(&name);
                let repr_id = self.intern(&repr);
                self.emit(
                    InstrKind::Var { frame_offset: offset, name: name_id, repr: repr_id },
                    pos,
                );
            } else {
                let (name, pos) = plain.into_iter().next().expect("one element");
                self.emit_static_var(self.frag_chain.len() as u16, &name, pos);
            }
            return Ok(());
        }

        self.flush_chain(absolute, &mut pending, dollar_pos, &mut repr);
        Ok(())
    }

    /// Emit the chain start and any buffered attribute steps.
    fn flush_chain(
        &mut self,
        absolute: bool,
        pending: &mut Vec<(String, Pos)>,
        start_pos: Pos,
        repr: &mut String,
    ) {
        if absolute {
            self.emit(InstrKind::PushRootFrag, start_pos);
            repr.push('.');
        } else {
            self.emit(InstrKind::PushThisFrag, start_pos);
        }
        for (name, pos) in pending.drain(..) {
            self.emit_chain_step(&name, pos, repr, absolute);
        }
    }

    // ---- queries ----

    fn query(&mut self, tok: Token) -> PResult {
        let qname = tok.view.clone();
        let qpos = tok.pos;
        self.next_tok(false); // (
        match qname.as_str() {
            "count" => self.log.warning(
                qpos,
                "The count() query is deprecated; use _count builtin variable instead",
            ),
            "defined" => self.log.warning(
                qpos,
                "The defined() query is deprecated; use isempty() or exists() instead",
            ),
            _ => {}
        }
        self.emit(InstrKind::SuppressBegin, qpos);

        let arg = self.peek_tok(true).clone();
        match arg.kind {
            TokenKind::Dollar => {
                self.next_tok(true);
                self.log.warning(
                    arg.pos,
                    "In query expression the identifier shouldn't be denoted by $ sign",
                );
                let first = self.next_tok(true);
                if first.kind != TokenKind::Ident {
                    self.log
                        .error(arg.pos, format!("Invalid variable identifier in {qname}()"));
                    return Err(ExprFail(first));
                }
                let names = self.collect_dotted(first)?;
                self.emit_query_chain(names);
            }
            TokenKind::DollarDollar => {
                self.next_tok(true);
                self.rtvar(arg.pos, true)?;
            }
            TokenKind::Ident => {
                let first = self.next_tok(true);
                let names = self.collect_dotted(first)?;
                self.emit_query_chain(names);
            }
            _ => {
                self.log
                    .error(arg.pos, format!("Invalid variable identifier in {qname}()"));
                let offender = self.next_tok(true);
                return Err(ExprFail(offender));
            }
        }

        let close = self.next_tok(false);
        if close.kind != TokenKind::RParen {
            return Err(ExprFail(close));
        }
        self.emit(InstrKind::SuppressEnd, qpos);
        let op = match qname.as_str() {
            "exists" => InstrKind::Exists,
            "isempty" => InstrKind::IsEmpty,
            "type" => InstrKind::TypeOf,
            "count" => InstrKind::Count,
            "defined" => InstrKind::Defined,
            "jsonify" => InstrKind::Jsonify,
            _ => unreachable!("unknown query {qname}"),
        };
        self.emit(op, qpos);
        Ok(())
    }

    /// Queries always evaluate their path as a runtime chain so that a
    /// miss yields `Undefined` instead of a logged warning.
    fn emit_query_chain(&mut self, names: Vec<(String, Pos)>) {
        let start_pos = names[0].1;
        self.emit(InstrKind::PushThisFrag, start_pos);
        let mut repr = String::new();
        for (name, pos) in names {
            self.emit_chain_step(&name, pos, &mut repr, false);
        }
    }

    // ---- case ----

    fn case_expr(&mut self, cpos: Pos) -> PResult {
        let open = self.next_tok(false);
        if open.kind != TokenKind::LParen {
            return Err(ExprFail(open));
        }
        if let Err(fail) = self.parse_expr() {
            self.log.error(cpos, "Invalid condition in case expression");
            return Err(fail);
        }
        let comma = self.next_tok(false);
        if comma.kind != TokenKind::Comma {
            return Err(ExprFail(comma));
        }

        let mut end_jumps = Vec::new();
        let mut pending_fail: Option<usize> = None;
        loop {
            if let Some(at) = pending_fail.take() {
                self.patch_jump(at);
            }
            let label = self.peek_tok(true).clone();
            if label.kind == TokenKind::Mul {
                // the `*` default branch
                self.next_tok(true);
                let colon = self.next_tok(false);
                if colon.kind != TokenKind::Colon {
                    return Err(ExprFail(colon));
                }
                self.emit(InstrKind::Pop, label.pos);
                self.parse_expr()?;
                end_jumps.push(self.emit(InstrKind::Jmp(0), label.pos));
            } else {
                let mut alt_jumps = Vec::new();
                loop {
                    let tok = self.next_tok(true);
                    let push = self.case_label(&tok)?;
                    self.emit(InstrKind::Dup, tok.pos);
                    self.emit(push, tok.pos);
                    self.emit(InstrKind::Eq, tok.pos);
                    let sep = self.next_tok(false);
                    match sep.kind {
                        TokenKind::Comma => {
                            alt_jumps.push(self.emit(InstrKind::Or(0), sep.pos));
                        }
                        TokenKind::Colon => break,
                        _ => return Err(ExprFail(sep)),
                    }
                }
                for at in alt_jumps {
                    self.patch_jump(at);
                }
                pending_fail = Some(self.emit(InstrKind::JmpIfNot(0), label.pos));
                self.emit(InstrKind::Pop, label.pos);
                self.parse_expr()?;
                end_jumps.push(self.emit(InstrKind::Jmp(0), label.pos));
            }
            let sep = self.next_tok(false);
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::RParen => break,
                _ => {
                    self.log.error(cpos, "Missing closing ')' in case expression");
                    return Err(ExprFail(sep));
                }
            }
        }
        // a trailing labeled branch needs the implicit undefined default
        if let Some(at) = pending_fail.take() {
            self.patch_jump(at);
            self.emit(InstrKind::Pop, cpos);
            self.emit(InstrKind::PushUndef, cpos);
        }
        for at in end_jumps {
            self.patch_jump(at);
        }
        Ok(())
    }

    /// One case label: an int, real or string literal, optionally negated.
    fn case_label(&mut self, tok: &Token) -> Result<InstrKind, ExprFail> {
        Ok(match &tok.kind {
            TokenKind::DecInt(v) | TokenKind::HexInt(v) | TokenKind::OctInt(v) => {
                InstrKind::PushInt(*v)
            }
            TokenKind::Real(v) => InstrKind::PushReal(*v),
            TokenKind::Str(s) => InstrKind::PushStr(self.intern(s)),
            TokenKind::Minus => {
                let num = self.next_tok(true);
                match num.kind {
                    TokenKind::DecInt(v) | TokenKind::HexInt(v) | TokenKind::OctInt(v) => {
                        InstrKind::PushInt(-v)
                    }
                    TokenKind::Real(v) => InstrKind::PushReal(-v),
                    _ => return Err(ExprFail(num)),
                }
            }
            _ => return Err(ExprFail(tok.clone())),
        })
    }
}

/// Append one segment to a dotted path repr.
fn append_repr(repr: &mut String, name: &str, absolute: bool) {
    if absolute {
        if repr != "." {
            repr.push('.');
        }
        repr.push_str(name);
    } else {
        if !repr.is_empty() {
            repr.push('.');
        }
        repr.push_str(name);
    }
}
