//! Token kinds shared by the lexer and the parser.

use std::fmt;

use teng_core::Pos;

/// One token. `view` is the raw source slice, used verbatim in
/// `Unexpected token: name=…, view=…` diagnostics; `pos` addresses the
/// first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub view: String,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, view: impl Into<String>, pos: Pos) -> Self {
        Self { kind, view: view.into(), pos }
    }

    /// The token name printed in diagnostics.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name={}, view={}", self.name(), self.view)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // text mode
    Text,
    /// `<?teng`
    TengStart,
    /// `${`
    ShortExpr,
    /// `%{`
    ShortRaw,
    /// `#{`
    ShortDict,

    // directive keywords
    KwIf,
    KwElif,
    KwElse,
    KwEndif,
    KwFrag,
    KwEndfrag,
    KwFormat,
    KwEndformat,
    KwCtype,
    KwEndctype,
    KwExpr,
    KwSet,
    KwDict,
    KwInclude,
    KwCase,

    // literals and identifiers
    Ident,
    DecInt(i64),
    HexInt(i64),
    OctInt(i64),
    Real(f64),
    Str(String),
    RegexLit { pattern: String, flags: String },

    // operators
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    MatchRe,
    NMatchRe,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Repeat,
    Not,
    BitNot,
    Question,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Assign,
    Dollar,
    DollarDollar,
    At,

    // closers
    /// `?>`
    End,
    /// `}`
    ShortEnd,

    /// Anything the lexer could not tokenize.
    Inv,
    Eof,
}

impl TokenKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Text => "TEXT",
            TokenKind::TengStart => "TENG",
            TokenKind::ShortExpr => "SHORT_EXPR",
            TokenKind::ShortRaw => "SHORT_RAW",
            TokenKind::ShortDict => "SHORT_DICT",
            TokenKind::KwIf => "IF",
            TokenKind::KwElif => "ELIF",
            TokenKind::KwElse => "ELSE",
            TokenKind::KwEndif => "ENDIF",
            TokenKind::KwFrag => "FRAG",
            TokenKind::KwEndfrag => "ENDFRAG",
            TokenKind::KwFormat => "FORMAT",
            TokenKind::KwEndformat => "ENDFORMAT",
            TokenKind::KwCtype => "CTYPE",
            TokenKind::KwEndctype => "ENDCTYPE",
            TokenKind::KwExpr => "EXPR",
            TokenKind::KwSet => "SET",
            TokenKind::KwDict => "DICT",
            TokenKind::KwInclude => "INCLUDE",
            TokenKind::KwCase => "CASE",
            TokenKind::Ident => "IDENT",
            TokenKind::DecInt(_) => "DEC_INT",
            TokenKind::HexInt(_) => "HEX_INT",
            TokenKind::OctInt(_) => "OCT_INT",
            TokenKind::Real(_) => "REAL",
            TokenKind::Str(_) => "STRING",
            TokenKind::RegexLit { .. } => "REGEX",
            TokenKind::Or => "OR",
            TokenKind::And => "AND",
            TokenKind::BitOr => "BITOR",
            TokenKind::BitXor => "BITXOR",
            TokenKind::BitAnd => "BITAND",
            TokenKind::Eq => "EQ",
            TokenKind::Ne => "NE",
            TokenKind::MatchRe => "STR_EQ",
            TokenKind::NMatchRe => "STR_NE",
            TokenKind::Lt => "LT",
            TokenKind::Le => "LE",
            TokenKind::Gt => "GT",
            TokenKind::Ge => "GE",
            TokenKind::Concat => "CONCAT",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Mul => "MUL",
            TokenKind::Div => "DIV",
            TokenKind::Mod => "MOD",
            TokenKind::Repeat => "REPEAT",
            TokenKind::Not => "NOT",
            TokenKind::BitNot => "BITNOT",
            TokenKind::Question => "COND_EXPR",
            TokenKind::Colon => "COLON",
            TokenKind::LParen => "L_PAREN",
            TokenKind::RParen => "R_PAREN",
            TokenKind::LBracket => "L_BRACKET",
            TokenKind::RBracket => "R_BRACKET",
            TokenKind::Dot => "DOT",
            TokenKind::Comma => "COMMA",
            TokenKind::Assign => "ASSIGN",
            TokenKind::Dollar => "VAR",
            TokenKind::DollarDollar => "RTVAR",
            TokenKind::At => "DICT_INDIRECT",
            TokenKind::End => "END",
            TokenKind::ShortEnd => "SHORT_END",
            TokenKind::Inv => "INV",
            TokenKind::Eof => "<EOF>",
        }
    }
}
