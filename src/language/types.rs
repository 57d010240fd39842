use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type of a property or a signature argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Matches anything; used for return types of candidate signatures.
    Any,
    /// Unknown type, carried by variables that were never declared.
    Null,
    Bool,
    Int,
    Double,
    String,
}

impl Type {
    /// `self` can flow into a slot of type `target` without an explicit cast.
    pub fn is_implicitly_convertible(self, target: Type) -> bool {
        self == target
            || matches!(self, Type::Any | Type::Null)
            || matches!(target, Type::Any | Type::Null)
            || (self == Type::Int && target == Type::Double)
    }

    pub fn name(self) -> &'static str {
        match self {
            Type::Any => "any",
            Type::Null => "null",
            Type::Bool => "bool",
            Type::Int => "int",
            Type::Double => "double",
            Type::String => "string",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime value stored in a property.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
}

impl Value {
    /// Zero value of a type.
    pub fn default_for(ty: Type) -> Value {
        match ty {
            Type::Any | Type::Null => Value::Null,
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::Double => Value::Double(0.0),
            Type::String => Value::String(String::new()),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Double(_) => Type::Double,
            Value::String(_) => Type::String,
        }
    }

    /// Convert for storage into a slot of type `ty`. Numeric values are
    /// converted between int and double, anything else is kept as is.
    pub fn cast(self, ty: Type) -> Value {
        match (self, ty) {
            (Value::Int(n), Type::Double) => Value::Double(f64::from(n)),
            (Value::Double(n), Type::Int) => Value::Int(n as i32),
            (Value::Bool(b), Type::Int) => Value::Int(i32::from(b)),
            (value, _) => value,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            Value::Double(n) => Some(*n != 0.0),
            Value::String(s) => Some(!s.is_empty()),
            Value::Null => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Double(n) => Some(*n as i32),
            Value::Bool(b) => Some(i32::from(*b)),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            Value::Int(n) => Some(f64::from(*n)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Spelling of the value as a source literal.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Double(n) => format!("{n:?}"),
            Value::String(s) => quote(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

/// Strip the quotes of a string literal and resolve its escapes.
pub fn unquote(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(literal);
    let mut text = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            text.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => text.push('\n'),
            Some('t') => text.push('\t'),
            Some(other) => text.push(other),
            None => text.push('\\'),
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_converts_to_double_only() {
        assert!(Type::Int.is_implicitly_convertible(Type::Double));
        assert!(!Type::Double.is_implicitly_convertible(Type::Int));
        assert!(!Type::String.is_implicitly_convertible(Type::Bool));
        assert!(Type::Null.is_implicitly_convertible(Type::String));
        assert!(Type::Bool.is_implicitly_convertible(Type::Any));
    }

    #[test]
    fn cast_follows_slot_type() {
        assert_eq!(Value::Int(10).cast(Type::Double), Value::Double(10.0));
        assert_eq!(Value::Double(2.9).cast(Type::Int), Value::Int(2));
        assert_eq!(
            Value::String("x".into()).cast(Type::Int),
            Value::String("x".into())
        );
    }

    #[test]
    fn literal_spelling_keeps_doubles_distinct() {
        assert_eq!(Value::Double(15.0).to_literal(), "15.0");
        assert_eq!(Value::Double(8.5).to_string(), "8.5");
        assert_eq!(Value::String("a\"b".into()).to_literal(), "\"a\\\"b\"");
    }

    #[test]
    fn unquote_resolves_escapes() {
        assert_eq!(unquote("\"coucou\""), "coucou");
        assert_eq!(unquote("\"say \\\"hi\\\"\""), "say \"hi\"");
    }
}
