//! Token set for the quasigo language: Go's tokens extended with the
//! quotation tokens `QUOTE`, `QUASIQUOTE`, `UNQUOTE`, `UNQUOTE_SPLICE`
//! and the `MACRO` keyword.

use strum::Display;

/// A lexical token kind.
///
/// Literal payloads (the text of an `Int` or `Str` token) travel next to
/// the kind in the lexer output; the kind itself is a plain copyable tag,
/// which also serves as the "operator" reported by AST nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Token {
    #[strum(serialize = "EOF")]
    Eof,
    #[strum(serialize = "ILLEGAL")]
    Illegal,

    // literals and names
    #[strum(serialize = "IDENT")]
    Ident,
    #[strum(serialize = "INT")]
    Int,
    #[strum(serialize = "FLOAT")]
    Float,
    #[strum(serialize = "IMAG")]
    Imag,
    #[strum(serialize = "CHAR")]
    Char,
    #[strum(serialize = "STRING")]
    Str,

    // operators and delimiters
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Quo,
    #[strum(serialize = "%")]
    Rem,
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "|")]
    Or,
    #[strum(serialize = "^")]
    Xor,
    #[strum(serialize = "<<")]
    Shl,
    #[strum(serialize = ">>")]
    Shr,
    #[strum(serialize = "&^")]
    AndNot,
    #[strum(serialize = "&&")]
    LAnd,
    #[strum(serialize = "||")]
    LOr,
    #[strum(serialize = "<-")]
    Arrow,
    #[strum(serialize = "++")]
    Inc,
    #[strum(serialize = "--")]
    Dec,
    #[strum(serialize = "==")]
    Eql,
    #[strum(serialize = "<")]
    Lss,
    #[strum(serialize = ">")]
    Gtr,
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "!=")]
    Neq,
    #[strum(serialize = "<=")]
    Leq,
    #[strum(serialize = ">=")]
    Geq,
    #[strum(serialize = ":=")]
    Define,
    #[strum(serialize = "...")]
    Ellipsis,

    #[strum(serialize = "+=")]
    AddAssign,
    #[strum(serialize = "-=")]
    SubAssign,
    #[strum(serialize = "*=")]
    MulAssign,
    #[strum(serialize = "/=")]
    QuoAssign,
    #[strum(serialize = "%=")]
    RemAssign,
    #[strum(serialize = "&=")]
    AndAssign,
    #[strum(serialize = "|=")]
    OrAssign,
    #[strum(serialize = "^=")]
    XorAssign,
    #[strum(serialize = "<<=")]
    ShlAssign,
    #[strum(serialize = ">>=")]
    ShrAssign,
    #[strum(serialize = "&^=")]
    AndNotAssign,

    #[strum(serialize = "(")]
    Lparen,
    #[strum(serialize = "[")]
    Lbrack,
    #[strum(serialize = "{{")]
    Lbrace,
    #[strum(serialize = ",")]
    Comma,
    #[strum(serialize = ".")]
    Period,
    #[strum(serialize = ")")]
    Rparen,
    #[strum(serialize = "]")]
    Rbrack,
    #[strum(serialize = "}}")]
    Rbrace,
    #[strum(serialize = ";")]
    Semicolon,
    #[strum(serialize = ":")]
    Colon,

    // keywords
    #[strum(serialize = "break")]
    Break,
    #[strum(serialize = "case")]
    Case,
    #[strum(serialize = "chan")]
    Chan,
    #[strum(serialize = "const")]
    Const,
    #[strum(serialize = "continue")]
    Continue,
    #[strum(serialize = "default")]
    Default,
    #[strum(serialize = "defer")]
    Defer,
    #[strum(serialize = "else")]
    Else,
    #[strum(serialize = "fallthrough")]
    Fallthrough,
    #[strum(serialize = "for")]
    For,
    #[strum(serialize = "func")]
    Func,
    #[strum(serialize = "go")]
    Go,
    #[strum(serialize = "goto")]
    Goto,
    #[strum(serialize = "if")]
    If,
    #[strum(serialize = "import")]
    Import,
    #[strum(serialize = "interface")]
    Interface,
    #[strum(serialize = "map")]
    Map,
    #[strum(serialize = "package")]
    Package,
    #[strum(serialize = "range")]
    Range,
    #[strum(serialize = "return")]
    Return,
    #[strum(serialize = "select")]
    Select,
    #[strum(serialize = "struct")]
    Struct,
    #[strum(serialize = "switch")]
    Switch,
    #[strum(serialize = "type")]
    Type,
    #[strum(serialize = "var")]
    Var,

    // quasigo extensions
    #[strum(serialize = "MACRO")]
    Macro,
    #[strum(serialize = "QUOTE")]
    Quote,
    #[strum(serialize = "QUASIQUOTE")]
    Quasiquote,
    #[strum(serialize = "UNQUOTE")]
    Unquote,
    #[strum(serialize = "UNQUOTE_SPLICE")]
    UnquoteSplice,
}

/// Lowest binary-operator precedence; unary operators bind tighter than
/// any binary operator.
pub const LOWEST_PREC: u8 = 0;

impl Token {
    /// Binary-operator precedence, 1 (weakest) to 5 (strongest);
    /// 0 for tokens that are not binary operators.
    pub fn precedence(self) -> u8 {
        match self {
            Self::LOr => 1,
            Self::LAnd => 2,
            Self::Eql | Self::Neq | Self::Lss | Self::Leq | Self::Gtr | Self::Geq => 3,
            Self::Add | Self::Sub | Self::Or | Self::Xor => 4,
            Self::Mul | Self::Quo | Self::Rem | Self::Shl | Self::Shr | Self::And | Self::AndNot => 5,
            _ => LOWEST_PREC,
        }
    }

    /// Looks up the keyword for an identifier's text, if there is one.
    pub fn keyword(name: &str) -> Option<Self> {
        Some(match name {
            "break" => Self::Break,
            "case" => Self::Case,
            "chan" => Self::Chan,
            "const" => Self::Const,
            "continue" => Self::Continue,
            "default" => Self::Default,
            "defer" => Self::Defer,
            "else" => Self::Else,
            "fallthrough" => Self::Fallthrough,
            "for" => Self::For,
            "func" => Self::Func,
            "go" => Self::Go,
            "goto" => Self::Goto,
            "if" => Self::If,
            "import" => Self::Import,
            "interface" => Self::Interface,
            "map" => Self::Map,
            "package" => Self::Package,
            "range" => Self::Range,
            "return" => Self::Return,
            "select" => Self::Select,
            "struct" => Self::Struct,
            "switch" => Self::Switch,
            "type" => Self::Type,
            "var" => Self::Var,
            "macro" => Self::Macro,
            "quote" => Self::Quote,
            "quasiquote" => Self::Quasiquote,
            "unquote" => Self::Unquote,
            "unquote_splice" => Self::UnquoteSplice,
            _ => return None,
        })
    }

    /// True for the quotation operators that carry a block-in-expression
    /// encoding (see `parser::make_quote`).
    pub fn is_quote(self) -> bool {
        matches!(
            self,
            Self::Quote | Self::Quasiquote | Self::Unquote | Self::UnquoteSplice | Self::Macro
        )
    }

    /// True for the assignment-with-operation tokens (`+=` .. `&^=`).
    pub fn is_op_assign(self) -> bool {
        matches!(
            self,
            Self::AddAssign
                | Self::SubAssign
                | Self::MulAssign
                | Self::QuoAssign
                | Self::RemAssign
                | Self::AndAssign
                | Self::OrAssign
                | Self::XorAssign
                | Self::ShlAssign
                | Self::ShrAssign
                | Self::AndNotAssign
        )
    }

    /// Strips the `=` from an assignment-with-operation token.
    pub fn strip_assign(self) -> Self {
        match self {
            Self::AddAssign => Self::Add,
            Self::SubAssign => Self::Sub,
            Self::MulAssign => Self::Mul,
            Self::QuoAssign => Self::Quo,
            Self::RemAssign => Self::Rem,
            Self::AndAssign => Self::And,
            Self::OrAssign => Self::Or,
            Self::XorAssign => Self::Xor,
            Self::ShlAssign => Self::Shl,
            Self::ShrAssign => Self::Shr,
            Self::AndNotAssign => Self::AndNot,
            other => other,
        }
    }
}

/// A line/column source position. Lines and columns are 1-based;
/// `Pos::NONE` marks synthesized nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub const NONE: Self = Self { line: 0, col: 0 };

    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    pub fn is_none(self) -> bool {
        self.line == 0
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "-")
        } else {
            write!(f, "{}:{}", self.line, self.col)
        }
    }
}
