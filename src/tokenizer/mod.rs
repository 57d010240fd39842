//=============================================
// nodlang/tokenizer/mod.rs
//=============================================
// Author: Nodlang Contributors
// License: Duality Public License (DPL v1.0)
// Goal: Lossless tokenizer
// Objective: Split source text into a ribbon of tokens keeping every
//            whitespace and comment byte as token prefix/suffix
// Formatting: Zobie.format (.solvraformat)
//=============================================

pub mod ribbon;
pub mod token;

use crate::language::Language;
use ribbon::Ribbon;
use thiserror::Error;
use token::{Position, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("unable to tokenize '{ch}' at {position}")]
    UnexpectedCharacter { ch: char, position: Position },
    #[error("unterminated string literal starting at {position}")]
    UnterminatedString { position: Position },
}

/// Single pass scanner producing a [`Ribbon`].
pub struct Tokenizer<'a> {
    language: &'a Language,
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    ribbon: Ribbon,
    /// Ignored text waiting for the next token.
    pending_ignore: String,
}

impl<'a> Tokenizer<'a> {
    pub fn new(language: &'a Language, input: &str) -> Self {
        Self {
            language,
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            ribbon: Ribbon::new(),
            pending_ignore: String::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Ribbon, TokenizeError> {
        while !self.is_at_end() {
            let token = self.next_token()?;
            if token.kind == TokenKind::Ignore {
                self.pending_ignore.push_str(&token.word);
                continue;
            }
            self.push_token(token);
        }
        self.ribbon.suffix = Token::ignored(std::mem::take(&mut self.pending_ignore));
        Ok(self.ribbon)
    }

    /// Flush pending ignored text around `token`, then append it.
    fn push_token(&mut self, mut token: Token) {
        let ignored = std::mem::take(&mut self.pending_ignore);
        if !ignored.is_empty() {
            match self.ribbon.last_mut() {
                Some(last) if last.kind.accepts_suffix() => last.suffix.push_str(&ignored),
                Some(_) => token.prefix = ignored,
                None => self.ribbon.prefix.word.push_str(&ignored),
            }
        }
        self.ribbon.push(token);
    }

    //=============================================
    // Cursor helpers
    //=============================================

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.char_at(self.position).unwrap_or('\0')
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.input.get(index).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.char_at(self.position + 1)
    }

    fn advance(&mut self) -> char {
        let ch = self.current_char();
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column, self.position)
    }

    fn take_while(&mut self, mut keep: impl FnMut(char) -> bool) -> String {
        let mut word = String::new();
        while !self.is_at_end() && keep(self.current_char()) {
            word.push(self.advance());
        }
        word
    }

    //=============================================
    // Scanning
    //=============================================

    fn next_token(&mut self) -> Result<Token, TokenizeError> {
        let start = self.current_position();
        let ch = self.current_char();

        if ch == '/' && self.peek_char() == Some('/') {
            return Ok(self.line_comment(start));
        }
        if ch == '/' && self.peek_char() == Some('*') {
            return Ok(self.block_comment(start));
        }
        if let Some(kind) = self.language.single_char(ch) {
            self.advance();
            return Ok(Token::new(kind, ch.to_string(), start));
        }
        if let Some(token) = self.operator(start) {
            return Ok(token);
        }
        if ch.is_ascii_digit() {
            return Ok(self.number(start));
        }
        if ch == '"' {
            return self.string(start);
        }
        if ch.is_alphabetic() || ch == '_' {
            return Ok(self.identifier(start));
        }
        Err(TokenizeError::UnexpectedCharacter {
            ch,
            position: start,
        })
    }

    /// `// ...` up to and including the line break.
    fn line_comment(&mut self, start: Position) -> Token {
        let mut word = self.take_while(|c| c != '\n');
        if !self.is_at_end() {
            word.push(self.advance());
        }
        Token::new(TokenKind::Ignore, word, start)
    }

    /// `/* ... */`, running to the end of input when unterminated.
    fn block_comment(&mut self, start: Position) -> Token {
        let mut word = String::new();
        word.push(self.advance());
        word.push(self.advance());
        while !self.is_at_end() {
            if self.current_char() == '*' && self.peek_char() == Some('/') {
                word.push(self.advance());
                word.push(self.advance());
                break;
            }
            word.push(self.advance());
        }
        Token::new(TokenKind::Ignore, word, start)
    }

    /// Greedy operator scan: `=>`, `==`, `<=>` and `X=` forms.
    fn operator(&mut self, start: Position) -> Option<Token> {
        let ch = self.current_char();
        let next = self.peek_char();
        let length = match ch {
            '=' if matches!(next, Some('>') | Some('=')) => 2,
            '=' => 1,
            '<' if next == Some('=') && self.char_at(self.position + 2) == Some('>') => 3,
            '!' | '/' | '*' | '+' | '-' | '>' | '<' if next == Some('=') => 2,
            '!' | '/' | '*' | '+' | '-' | '>' | '<' => 1,
            '|' if next == Some('|') => 2,
            '&' if next == Some('&') => 2,
            _ => return None,
        };
        let word: String = (0..length).map(|_| self.advance()).collect();
        Some(Token::new(TokenKind::Operator, word, start))
    }

    /// Digit run, optionally `.` followed by at least one digit.
    fn number(&mut self, start: Position) -> Token {
        let mut word = self.take_while(|c| c.is_ascii_digit());
        let decimal = self.current_char() == '.'
            && self.peek_char().is_some_and(|c| c.is_ascii_digit());
        if !decimal {
            return Token::new(TokenKind::LiteralInt, word, start);
        }
        word.push(self.advance());
        word.push_str(&self.take_while(|c| c.is_ascii_digit()));
        Token::new(TokenKind::LiteralDouble, word, start)
    }

    /// Double quoted string; a quote preceded by a backslash does not close it.
    fn string(&mut self, start: Position) -> Result<Token, TokenizeError> {
        let mut word = String::new();
        word.push(self.advance());
        let mut escaped = false;
        while !self.is_at_end() {
            let c = self.advance();
            word.push(c);
            if c == '"' && !escaped {
                return Ok(Token::new(TokenKind::LiteralString, word, start));
            }
            escaped = c == '\\' && !escaped;
        }
        Err(TokenizeError::UnterminatedString { position: start })
    }

    fn identifier(&mut self, start: Position) -> Token {
        let word = self.take_while(|c| c.is_alphanumeric() || c == '_');
        let kind = self.language.keyword(&word).unwrap_or(TokenKind::Identifier);
        Token::new(kind, word, start)
    }
}

/// Tokenize `source` with the tables of `language`.
pub fn tokenize(language: &Language, source: &str) -> Result<Ribbon, TokenizeError> {
    Tokenizer::new(language, source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let lang = Language::new();
        tokenize(&lang, source)
            .expect("tokenize")
            .tokens()
            .iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn ribbon_reproduces_source() {
        let lang = Language::new();
        let source = "  // header\nint a = 42; /* note */ a = a+1;\n";
        let ribbon = tokenize(&lang, source).expect("tokenize");
        assert_eq!(ribbon.to_string(), source);
        assert_eq!(ribbon.prefix.word, "  // header\n");
    }

    #[test]
    fn greedy_operators() {
        let lang = Language::new();
        let ribbon = tokenize(&lang, "a<=>b<=c=>d==e").expect("tokenize");
        let words: Vec<&str> = ribbon
            .tokens()
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.word.as_str())
            .collect();
        assert_eq!(words, vec!["<=>", "<=", "=>", "=="]);
    }

    #[test]
    fn trailing_dot_is_not_decimal() {
        assert_eq!(
            kinds("1.5 2."),
            vec![TokenKind::LiteralDouble, TokenKind::LiteralInt]
        );
    }

    #[test]
    fn fails_on_unknown_character() {
        let lang = Language::new();
        match tokenize(&lang, "int a = 4 # 2;") {
            Err(TokenizeError::UnexpectedCharacter { ch, .. }) => assert_eq!(ch, '#'),
            other => panic!("expected unexpected character, found {other:?}"),
        }
    }

    #[test]
    fn escaped_quote_keeps_string_open() {
        let lang = Language::new();
        let ribbon = tokenize(&lang, r#""a\"b";"#).expect("tokenize");
        assert_eq!(ribbon.tokens()[0].word, r#""a\"b""#);
        assert_eq!(ribbon.tokens()[1].kind, TokenKind::EndOfInstruction);
    }

    #[test]
    fn ignored_text_skips_identifier_suffix() {
        let lang = Language::new();
        let ribbon = tokenize(&lang, "a + b").expect("tokenize");
        let tokens = ribbon.tokens();
        assert_eq!(tokens[0].suffix, "");
        assert_eq!(tokens[1].prefix, " ");
        assert_eq!(tokens[1].suffix, " ");
    }

    #[test]
    fn only_whitespace_lands_in_ribbon_suffix() {
        let lang = Language::new();
        let ribbon = tokenize(&lang, " ").expect("tokenize");
        assert!(ribbon.is_empty());
        assert_eq!(ribbon.prefix.word, "");
        assert_eq!(ribbon.suffix.word, " ");
    }
}
