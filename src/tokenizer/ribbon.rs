use super::token::{Token, TokenKind};
use std::fmt;

/// Ordered token stream with a cursor and nested transactions.
///
/// A transaction remembers the cursor when it starts; `rollback` puts the
/// cursor back there, `commit` keeps whatever was eaten since.
#[derive(Debug, Clone, Default)]
pub struct Ribbon {
    tokens: Vec<Token>,
    /// Ignored text found before the first token.
    pub prefix: Token,
    /// Ignored text found after the last token.
    pub suffix: Token,
    cursor: usize,
    transactions: Vec<usize>,
}

impl Ribbon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn last_mut(&mut self) -> Option<&mut Token> {
        self.tokens.last_mut()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.prefix = Token::default();
        self.suffix = Token::default();
        self.cursor = 0;
        self.transactions.clear();
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// True when at least `count` tokens remain.
    pub fn can_eat(&self, count: usize) -> bool {
        self.cursor + count <= self.tokens.len()
    }

    pub fn has_remaining(&self) -> bool {
        self.can_eat(1)
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    pub fn eat(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(token)
    }

    /// Eat the next token only if it has the expected kind.
    pub fn eat_if(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek_kind() == Some(kind) {
            self.eat()
        } else {
            None
        }
    }

    /// Last token consumed.
    pub fn get_eaten(&self) -> Option<&Token> {
        self.cursor
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
    }

    pub fn transaction_start(&mut self) {
        self.transactions.push(self.cursor);
    }

    pub fn transaction_commit(&mut self) {
        self.transactions.pop();
    }

    pub fn transaction_rollback(&mut self) {
        if let Some(cursor) = self.transactions.pop() {
            self.cursor = cursor;
        }
    }

    pub fn transaction_depth(&self) -> usize {
        self.transactions.len()
    }
}

impl fmt::Display for Ribbon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        for token in &self.tokens {
            write!(f, "{token}")?;
        }
        write!(f, "{}", self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ribbon_of(words: &[(TokenKind, &str)]) -> Ribbon {
        let mut ribbon = Ribbon::new();
        for (kind, word) in words {
            ribbon.push(Token::synthetic(*kind, *word));
        }
        ribbon
    }

    #[test]
    fn rollback_restores_cursor() {
        let mut ribbon = ribbon_of(&[
            (TokenKind::Identifier, "a"),
            (TokenKind::Operator, "+"),
            (TokenKind::LiteralInt, "1"),
        ]);
        ribbon.transaction_start();
        ribbon.eat();
        ribbon.eat();
        assert_eq!(ribbon.cursor(), 2);
        ribbon.transaction_rollback();
        assert_eq!(ribbon.cursor(), 0);
        assert_eq!(ribbon.transaction_depth(), 0);
    }

    #[test]
    fn nested_commit_keeps_progress() {
        let mut ribbon = ribbon_of(&[
            (TokenKind::Identifier, "a"),
            (TokenKind::EndOfInstruction, ";"),
        ]);
        ribbon.transaction_start();
        ribbon.transaction_start();
        ribbon.eat();
        ribbon.transaction_commit();
        assert_eq!(ribbon.cursor(), 1);
        ribbon.transaction_rollback();
        assert_eq!(ribbon.cursor(), 0);
    }

    #[test]
    fn eat_if_checks_kind() {
        let mut ribbon = ribbon_of(&[(TokenKind::ExprBegin, "(")]);
        assert!(ribbon.eat_if(TokenKind::ExprEnd).is_none());
        assert!(ribbon.eat_if(TokenKind::ExprBegin).is_some());
        assert!(!ribbon.can_eat(1));
        assert_eq!(ribbon.get_eaten().map(|t| t.word.as_str()), Some("("));
    }
}
