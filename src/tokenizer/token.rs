use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a token's word in the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Every token class the language knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    LiteralBool,
    LiteralInt,
    LiteralDouble,
    LiteralString,

    Identifier,
    Operator,

    // Keywords
    KeywordIf,
    KeywordElse,
    KeywordFor,
    KeywordWhile,
    KeywordOperator,

    // Type keywords
    KeywordBool,
    KeywordInt,
    KeywordDouble,
    KeywordString,

    // Delimiters
    ScopeBegin,
    ScopeEnd,
    ExprBegin,
    ExprEnd,
    EndOfInstruction,
    ListSeparator,

    /// Whitespace and comments.
    Ignore,
}

impl TokenKind {
    pub fn is_type_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::KeywordBool
                | TokenKind::KeywordInt
                | TokenKind::KeywordDouble
                | TokenKind::KeywordString
        )
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::LiteralBool
                | TokenKind::LiteralInt
                | TokenKind::LiteralDouble
                | TokenKind::LiteralString
        )
    }

    /// Whether trailing ignored text may be glued to a token of this kind.
    /// Identifiers and brackets hand it to the next token instead.
    pub fn accepts_suffix(self) -> bool {
        !matches!(
            self,
            TokenKind::Identifier | TokenKind::ExprBegin | TokenKind::ExprEnd
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::LiteralBool => "literal_bool",
            TokenKind::LiteralInt => "literal_int",
            TokenKind::LiteralDouble => "literal_double",
            TokenKind::LiteralString => "literal_string",
            TokenKind::Identifier => "identifier",
            TokenKind::Operator => "operator",
            TokenKind::KeywordIf => "keyword_if",
            TokenKind::KeywordElse => "keyword_else",
            TokenKind::KeywordFor => "keyword_for",
            TokenKind::KeywordWhile => "keyword_while",
            TokenKind::KeywordOperator => "keyword_operator",
            TokenKind::KeywordBool => "keyword_bool",
            TokenKind::KeywordInt => "keyword_int",
            TokenKind::KeywordDouble => "keyword_double",
            TokenKind::KeywordString => "keyword_string",
            TokenKind::ScopeBegin => "scope_begin",
            TokenKind::ScopeEnd => "scope_end",
            TokenKind::ExprBegin => "expr_begin",
            TokenKind::ExprEnd => "expr_end",
            TokenKind::EndOfInstruction => "end_of_instruction",
            TokenKind::ListSeparator => "list_separator",
            TokenKind::Ignore => "ignore",
        };
        f.write_str(name)
    }
}

/// A classified word plus the ignored text glued around it.
///
/// Writing `prefix + word + suffix` for every token of a ribbon reproduces
/// the tokenized text byte for byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub prefix: String,
    pub word: String,
    pub suffix: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, word: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            prefix: String::new(),
            word: word.into(),
            suffix: String::new(),
            position,
        }
    }

    /// Token with no source position, used for text built by the editor.
    pub fn synthetic(kind: TokenKind, word: impl Into<String>) -> Self {
        Self::new(kind, word, Position::default())
    }

    /// Token holding only ignored text, used for the ribbon's leading and
    /// trailing accumulators.
    pub fn ignored(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Ignore, text, Position::default())
    }

    /// Keep the formatting and kind but none of the word.
    pub fn take_formatting(&mut self) -> Token {
        Token {
            kind: self.kind,
            prefix: std::mem::take(&mut self.prefix),
            word: String::new(),
            suffix: std::mem::take(&mut self.suffix),
            position: self.position,
        }
    }

    pub fn write_to(&self, out: &mut String) {
        out.push_str(&self.prefix);
        out.push_str(&self.word);
        out.push_str(&self.suffix);
    }
}

impl Default for Token {
    fn default() -> Self {
        Token::ignored("")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, self.word, self.suffix)
    }
}
