//! The two-mode template lexer.
//!
//! *Text mode* scans for directive openers and yields maximal text runs.
//! *Expression mode* tokenizes the embedded expression language via logos.
//! The parser drives the mode: directive boundaries are syntactically
//! significant, so the lexer never switches on its own.
//!
//! Regex literals are disambiguated from division by the parser-maintained
//! *expect-operand* bit: `/` after an operand is division, `/` where an
//! operand is expected starts a regex literal.

mod token;

use logos::Logos;
use teng_core::{ErrorLog, Pos};

pub use token::{Token, TokenKind};

use crate::source::Source;

/// Lexer mode, switched by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Text,
    Expr,
}

// expression-mode raw tokens; comments, regexes and the slash operator are
// handled by the wrapper before logos runs
#[derive(Logos, Debug, Clone, PartialEq)]
enum RawTok<'s> {
    #[token("?>")]
    End,
    #[token("}")]
    ShortEnd,

    #[token("if")]
    KwIf,
    #[token("elif")]
    KwElif,
    #[token("else")]
    KwElse,
    #[token("endif")]
    KwEndif,
    #[token("frag")]
    KwFrag,
    #[token("endfrag")]
    KwEndfrag,
    #[token("format")]
    KwFormat,
    #[token("endformat")]
    KwEndformat,
    #[token("ctype")]
    KwCtype,
    #[token("endctype")]
    KwEndctype,
    #[token("expr")]
    KwExpr,
    #[token("set")]
    KwSet,
    #[token("dict")]
    KwDict,
    #[token("include")]
    KwInclude,
    #[token("case")]
    KwCase,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'s str),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Real(f64),
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| i64::from_str_radix(&lex.slice()[2..], 16).ok())]
    HexInt(i64),
    #[regex(r"0[0-7]+", |lex| i64::from_str_radix(&lex.slice()[1..], 8).ok(), priority = 5)]
    OctInt(i64),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok(), priority = 3)]
    DecInt(i64),

    #[regex(r#""(?:[^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r"'(?:[^'\\\n]|\\.)*'", |lex| unescape(lex.slice()))]
    Str(String),

    #[token("||")]
    Or,
    #[token("&&")]
    And,
    #[token("|")]
    BitOr,
    #[token("^")]
    BitXor,
    #[token("&")]
    BitAnd,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("=~")]
    MatchRe,
    #[token("!~")]
    NMatchRe,
    #[token("<=")]
    Le,
    #[token("<")]
    Lt,
    #[token(">=")]
    Ge,
    #[token(">")]
    Gt,
    #[token("++")]
    Concat,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("**")]
    Repeat,
    #[token("*")]
    Mul,
    #[token("/")]
    Div,
    #[token("%")]
    Mod,
    #[token("!")]
    Not,
    #[token("~")]
    BitNot,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("=")]
    Assign,
    #[token("$$")]
    DollarDollar,
    #[token("$")]
    Dollar,
    #[token("@")]
    At,
}

/// Unescape a quoted string literal (either quote style).
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                // unknown escape keeps the backslash
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// The lexer over one source. Owns its text so that included templates can
/// be stacked without lifetime entanglement.
pub struct Lexer {
    src: String,
    filename: String,
    off: usize,
    loc: Pos,
    pub mode: Mode,
    no_print_escape: bool,
    /// Set by the parser before requesting a token: `/` starts a regex
    /// literal when an operand is expected, a division otherwise.
    pub expect_operand: bool,
}

impl Lexer {
    pub fn new(source: &Source, no_print_escape: bool) -> Self {
        Self {
            src: source.text.clone(),
            filename: source.filename.clone(),
            off: 0,
            loc: Pos::start(),
            mode: Mode::Text,
            no_print_escape,
            expect_operand: true,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Current byte offset into the source.
    pub fn offset(&self) -> usize {
        self.off
    }

    pub fn text(&self) -> &str {
        &self.src
    }

    fn rest(&self) -> &str {
        &self.src[self.off..]
    }

    fn eof(&self) -> bool {
        self.off >= self.src.len()
    }

    /// Consume `n` bytes, tracking line/column per Unicode character.
    fn advance(&mut self, n: usize) {
        let end = self.off + n;
        self.loc.advance_str(&self.src[self.off..end]);
        self.off = end;
    }

    pub fn next_token(&mut self, log: &mut ErrorLog) -> Token {
        match self.mode {
            Mode::Text => self.next_text_token(),
            Mode::Expr => self.next_expr_token(log),
        }
    }

    // ---- text mode ----

    fn next_text_token(&mut self) -> Token {
        let start_pos = self.loc;
        if self.eof() {
            return Token::new(TokenKind::Eof, "", start_pos);
        }

        // an opener at the cursor yields the opener token itself
        if let Some((kind, len)) = self.opener_at(self.off) {
            let view = self.src[self.off..self.off + len].to_owned();
            self.advance(len);
            return Token::new(kind, view, start_pos);
        }

        // otherwise a maximal text run up to the next opener or EOF
        let mut scan = self.off;
        while scan < self.src.len() {
            if self.src.is_char_boundary(scan) && self.opener_at(scan).is_some() {
                break;
            }
            scan += 1;
        }
        let view = self.src[self.off..scan].to_owned();
        self.advance(scan - self.off);
        Token::new(TokenKind::Text, view, start_pos)
    }

    fn opener_at(&self, at: usize) -> Option<(TokenKind, usize)> {
        let rest = &self.src[at..];
        if let Some(after) = rest.strip_prefix("<?teng") {
            // `<?tengx` is plain text, not a directive
            if !after.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
                return Some((TokenKind::TengStart, "<?teng".len()));
            }
        }
        if rest.starts_with("${") {
            return Some((TokenKind::ShortExpr, 2));
        }
        if !self.no_print_escape {
            if rest.starts_with("%{") {
                return Some((TokenKind::ShortRaw, 2));
            }
            if rest.starts_with("#{") {
                return Some((TokenKind::ShortDict, 2));
            }
        }
        None
    }

    // ---- expression mode ----

    fn next_expr_token(&mut self, log: &mut ErrorLog) -> Token {
        loop {
            self.skip_ws();
            let start_pos = self.loc;
            if self.eof() {
                return Token::new(TokenKind::Eof, "", start_pos);
            }

            if self.rest().starts_with("/*") {
                match self.scan_comment(log, start_pos) {
                    Some(token) => return token,
                    None => continue,
                }
            }
            if self.expect_operand && self.rest().starts_with('/') {
                return self.scan_regex(log, start_pos);
            }
            return self.scan_raw(log, start_pos);
        }
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        let len = rest.len() - rest.trim_start_matches([' ', '\t', '\r', '\n']).len();
        if len > 0 {
            self.advance(len);
        }
    }

    /// Consume a `/* … */` comment. Returns `None` when the comment closed
    /// and lexing should continue; an unterminated comment swallows
    /// everything through the nearest directive closer and yields `INV`.
    fn scan_comment(&mut self, log: &mut ErrorLog, start_pos: Pos) -> Option<Token> {
        if let Some(end) = self.rest().find("*/") {
            self.advance(end + 2);
            return None;
        }
        log.error(start_pos, "Unterminated comment");
        let rest = self.rest();
        let stop = match (rest.find("?>"), rest.find('}')) {
            (Some(a), Some(b)) => {
                if a < b {
                    a + 2
                } else {
                    b + 1
                }
            }
            (Some(a), None) => a + 2,
            (None, Some(b)) => b + 1,
            (None, None) => rest.len(),
        };
        let view = self.src[self.off..self.off + stop].to_owned();
        self.advance(stop);
        Some(Token::new(TokenKind::Inv, view, start_pos))
    }

    /// Consume a `/pattern/flags` regex literal.
    fn scan_regex(&mut self, log: &mut ErrorLog, start_pos: Pos) -> Token {
        let rest = self.rest();
        let body = &rest[1..];
        let mut pattern = String::new();
        let mut chars = body.char_indices();
        let mut close = None;
        while let Some((i, ch)) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some((_, '/')) => pattern.push('/'),
                    Some((_, esc)) => {
                        pattern.push('\\');
                        pattern.push(esc);
                    }
                    None => break,
                },
                '/' => {
                    close = Some(i);
                    break;
                }
                '\n' => break,
                other => pattern.push(other),
            }
        }
        let Some(close) = close else {
            // swallow through the end of line so recovery can resynchronize
            log.error(start_pos, "Unterminated regex literal");
            let stop = 1 + body.find('\n').unwrap_or(body.len());
            let view = self.src[self.off..self.off + stop].to_owned();
            self.advance(stop);
            return Token::new(TokenKind::Inv, view, start_pos);
        };
        let after = &body[close + 1..];
        let flags_len = after.len() - after.trim_start_matches(|c: char| c.is_ascii_alphabetic()).len();
        let flags = after[..flags_len].to_owned();
        let total = 1 + close + 1 + flags_len;
        let view = self.src[self.off..self.off + total].to_owned();
        self.advance(total);
        Token::new(TokenKind::RegexLit { pattern, flags }, view, start_pos)
    }

    fn scan_raw(&mut self, log: &mut ErrorLog, start_pos: Pos) -> Token {
        let mut raw = RawTok::lexer(self.rest());
        match raw.next() {
            Some(Ok(tok)) => {
                let view = raw.slice().to_owned();
                let end = raw.span().end;
                let kind = map_raw(tok);
                self.advance(end);
                Token::new(kind, view, start_pos)
            }
            Some(Err(())) => {
                // take one whole character, never splitting a UTF-8 sequence
                let ch = self.rest().chars().next().expect("non-empty rest");
                let view = ch.to_string();
                if ch.is_ascii() {
                    log.error(start_pos, format!("Unexpected character '{ch}'"));
                } else {
                    log.error(start_pos, format!("Unexpected utf-8 encoded character '{ch}'"));
                }
                self.advance(ch.len_utf8());
                Token::new(TokenKind::Inv, view, start_pos)
            }
            None => Token::new(TokenKind::Eof, "", start_pos),
        }
    }
}

fn map_raw(tok: RawTok<'_>) -> TokenKind {
    match tok {
        RawTok::End => TokenKind::End,
        RawTok::ShortEnd => TokenKind::ShortEnd,
        RawTok::KwIf => TokenKind::KwIf,
        RawTok::KwElif => TokenKind::KwElif,
        RawTok::KwElse => TokenKind::KwElse,
        RawTok::KwEndif => TokenKind::KwEndif,
        RawTok::KwFrag => TokenKind::KwFrag,
        RawTok::KwEndfrag => TokenKind::KwEndfrag,
        RawTok::KwFormat => TokenKind::KwFormat,
        RawTok::KwEndformat => TokenKind::KwEndformat,
        RawTok::KwCtype => TokenKind::KwCtype,
        RawTok::KwEndctype => TokenKind::KwEndctype,
        RawTok::KwExpr => TokenKind::KwExpr,
        RawTok::KwSet => TokenKind::KwSet,
        RawTok::KwDict => TokenKind::KwDict,
        RawTok::KwInclude => TokenKind::KwInclude,
        RawTok::KwCase => TokenKind::KwCase,
        RawTok::Ident(_) => TokenKind::Ident,
        RawTok::Real(v) => TokenKind::Real(v),
        RawTok::HexInt(v) => TokenKind::HexInt(v),
        RawTok::OctInt(v) => TokenKind::OctInt(v),
        RawTok::DecInt(v) => TokenKind::DecInt(v),
        RawTok::Str(v) => TokenKind::Str(v),
        RawTok::Or => TokenKind::Or,
        RawTok::And => TokenKind::And,
        RawTok::BitOr => TokenKind::BitOr,
        RawTok::BitXor => TokenKind::BitXor,
        RawTok::BitAnd => TokenKind::BitAnd,
        RawTok::Eq => TokenKind::Eq,
        RawTok::Ne => TokenKind::Ne,
        RawTok::MatchRe => TokenKind::MatchRe,
        RawTok::NMatchRe => TokenKind::NMatchRe,
        RawTok::Le => TokenKind::Le,
        RawTok::Lt => TokenKind::Lt,
        RawTok::Ge => TokenKind::Ge,
        RawTok::Gt => TokenKind::Gt,
        RawTok::Concat => TokenKind::Concat,
        RawTok::Plus => TokenKind::Plus,
        RawTok::Minus => TokenKind::Minus,
        RawTok::Repeat => TokenKind::Repeat,
        RawTok::Mul => TokenKind::Mul,
        RawTok::Div => TokenKind::Div,
        RawTok::Mod => TokenKind::Mod,
        RawTok::Not => TokenKind::Not,
        RawTok::BitNot => TokenKind::BitNot,
        RawTok::Question => TokenKind::Question,
        RawTok::Colon => TokenKind::Colon,
        RawTok::LParen => TokenKind::LParen,
        RawTok::RParen => TokenKind::RParen,
        RawTok::LBracket => TokenKind::LBracket,
        RawTok::RBracket => TokenKind::RBracket,
        RawTok::Dot => TokenKind::Dot,
        RawTok::Comma => TokenKind::Comma,
        RawTok::Assign => TokenKind::Assign,
        RawTok::DollarDollar => TokenKind::DollarDollar,
        RawTok::Dollar => TokenKind::Dollar,
        RawTok::At => TokenKind::At,
    }
}
