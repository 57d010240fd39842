//! Language definition shared by the tokenizer, parser, serializer and VM:
//! keyword tables, operator precedences and the native function library.

pub mod natives;
pub mod signature;
pub mod types;

use crate::tokenizer::token::TokenKind;
use natives::NativeFn;
use signature::Signature;
use std::collections::HashMap;
use std::sync::Arc;
use types::Type;

/// Operand count of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Unary,
    Binary,
}

impl OperatorKind {
    pub fn from_arity(arity: usize) -> Option<Self> {
        match arity {
            1 => Some(OperatorKind::Unary),
            2 => Some(OperatorKind::Binary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub identifier: &'static str,
    pub kind: OperatorKind,
    pub precedence: u8,
}

/// A native implementation bound to its signature.
#[derive(Debug)]
pub struct Function {
    pub signature: Signature,
    pub native: NativeFn,
}

#[derive(Debug, Clone)]
pub struct Language {
    keywords: HashMap<&'static str, TokenKind>,
    type_keywords: Vec<(TokenKind, Type, &'static str)>,
    single_chars: HashMap<char, TokenKind>,
    operators: Vec<Operator>,
    functions: Vec<Arc<Function>>,
}

impl Default for Language {
    fn default() -> Self {
        Self::new()
    }
}

impl Language {
    pub fn new() -> Self {
        let mut lang = Self {
            keywords: HashMap::new(),
            type_keywords: Vec::new(),
            single_chars: HashMap::new(),
            operators: Vec::new(),
            functions: Vec::new(),
        };

        for (word, kind) in [
            ("if", TokenKind::KeywordIf),
            ("for", TokenKind::KeywordFor),
            ("while", TokenKind::KeywordWhile),
            ("else", TokenKind::KeywordElse),
            ("true", TokenKind::LiteralBool),
            ("false", TokenKind::LiteralBool),
            ("operator", TokenKind::KeywordOperator),
            ("bool", TokenKind::KeywordBool),
            ("string", TokenKind::KeywordString),
            ("double", TokenKind::KeywordDouble),
            ("int", TokenKind::KeywordInt),
        ] {
            lang.keywords.insert(word, kind);
        }

        lang.type_keywords = vec![
            (TokenKind::KeywordBool, Type::Bool, "bool"),
            (TokenKind::KeywordString, Type::String, "string"),
            (TokenKind::KeywordDouble, Type::Double, "double"),
            (TokenKind::KeywordInt, Type::Int, "int"),
        ];

        for (ch, kind) in [
            ('(', TokenKind::ExprBegin),
            (')', TokenKind::ExprEnd),
            ('{', TokenKind::ScopeBegin),
            ('}', TokenKind::ScopeEnd),
            ('\n', TokenKind::Ignore),
            ('\r', TokenKind::Ignore),
            ('\t', TokenKind::Ignore),
            (' ', TokenKind::Ignore),
            (';', TokenKind::EndOfInstruction),
            (',', TokenKind::ListSeparator),
        ] {
            lang.single_chars.insert(ch, kind);
        }

        use OperatorKind::{Binary, Unary};
        for (identifier, kind, precedence) in [
            ("-", Unary, 5),
            ("!", Unary, 5),
            ("/", Binary, 20),
            ("*", Binary, 20),
            ("+", Binary, 10),
            ("-", Binary, 10),
            ("||", Binary, 10),
            ("&&", Binary, 10),
            (">=", Binary, 10),
            ("<=", Binary, 10),
            ("=>", Binary, 10),
            ("==", Binary, 10),
            ("<=>", Binary, 10),
            ("!=", Binary, 10),
            (">", Binary, 10),
            ("<", Binary, 10),
            ("=", Binary, 0),
            ("+=", Binary, 0),
            ("-=", Binary, 0),
            ("/=", Binary, 0),
            ("*=", Binary, 0),
        ] {
            lang.operators.push(Operator {
                identifier,
                kind,
                precedence,
            });
        }

        natives::register_math(&mut lang);
        natives::register_strings(&mut lang);
        lang
    }

    //=============================================
    // Tables
    //=============================================

    pub fn keyword(&self, word: &str) -> Option<TokenKind> {
        self.keywords.get(word).copied()
    }

    pub fn single_char(&self, ch: char) -> Option<TokenKind> {
        self.single_chars.get(&ch).copied()
    }

    /// Type named by a type keyword token.
    pub fn type_of(&self, kind: TokenKind) -> Option<Type> {
        self.type_keywords
            .iter()
            .find(|(keyword, _, _)| *keyword == kind)
            .map(|(_, ty, _)| *ty)
    }

    /// Keyword spelling of a type, if it has one.
    pub fn type_keyword(&self, ty: Type) -> Option<(TokenKind, &'static str)> {
        self.type_keywords
            .iter()
            .find(|(_, candidate, _)| *candidate == ty)
            .map(|(kind, _, word)| (*kind, *word))
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn find_operator(&self, identifier: &str, kind: OperatorKind) -> Option<&Operator> {
        self.operators
            .iter()
            .find(|op| op.identifier == identifier && op.kind == kind)
    }

    /// Precedence of an operator given its identifier and operand count.
    pub fn precedence(&self, identifier: &str, arity: usize) -> Option<u8> {
        let kind = OperatorKind::from_arity(arity)?;
        self.find_operator(identifier, kind).map(|op| op.precedence)
    }

    //=============================================
    // Functions
    //=============================================

    pub fn functions(&self) -> &[Arc<Function>] {
        &self.functions
    }

    pub fn find_function_exact(&self, candidate: &Signature) -> Option<Arc<Function>> {
        self.functions
            .iter()
            .find(|f| f.signature.is_exactly(candidate))
            .cloned()
    }

    pub fn find_function_compatible(&self, candidate: &Signature) -> Option<Arc<Function>> {
        self.functions
            .iter()
            .find(|f| f.signature.is_compatible(candidate))
            .cloned()
    }

    /// Exact match first, then the first implicitly compatible one.
    pub fn find_function(&self, candidate: &Signature) -> Option<Arc<Function>> {
        self.find_function_exact(candidate)
            .or_else(|| self.find_function_compatible(candidate))
    }

    pub fn register(&mut self, signature: Signature, native: NativeFn) {
        self.functions.push(Arc::new(Function { signature, native }));
    }

    pub fn register_native(
        &mut self,
        identifier: &str,
        return_type: Type,
        args: &[Type],
        native: NativeFn,
    ) {
        self.register(Signature::new(identifier, return_type).with_args(args), native);
    }

    /// `=` overload: the left operand is written through.
    pub fn register_assign(&mut self, target: Type, source: Type, native: NativeFn) {
        let signature = Signature::new("=", target)
            .with_ref_arg(target)
            .with_arg(source);
        self.register(signature, native);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_take_priority() {
        let lang = Language::new();
        assert_eq!(lang.keyword("while"), Some(TokenKind::KeywordWhile));
        assert_eq!(lang.keyword("true"), Some(TokenKind::LiteralBool));
        assert_eq!(lang.keyword("return"), None);
    }

    #[test]
    fn precedence_depends_on_arity() {
        let lang = Language::new();
        assert_eq!(lang.precedence("-", 1), Some(5));
        assert_eq!(lang.precedence("-", 2), Some(10));
        assert_eq!(lang.precedence("*", 2), Some(20));
        assert_eq!(lang.precedence("=", 2), Some(0));
        assert_eq!(lang.precedence("pow", 2), None);
    }

    #[test]
    fn exact_match_wins_over_compatible() {
        let lang = Language::new();
        let candidate = Signature::new("+", Type::Any).with_args(&[Type::Int, Type::Int]);
        let found = lang.find_function(&candidate).expect("int addition");
        assert_eq!(found.signature.return_type, Type::Int);
    }

    #[test]
    fn unknown_function_is_not_found() {
        let lang = Language::new();
        let candidate = Signature::new("dna_to_protein", Type::Any).with_arg(Type::String);
        assert!(lang.find_function(&candidate).is_none());
    }
}
