use super::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One argument of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arg {
    pub ty: Type,
    /// Argument is written back to its source after the call.
    pub by_ref: bool,
}

/// Identifier, argument types and return type of an invokable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub identifier: String,
    pub return_type: Type,
    pub args: Vec<Arg>,
}

impl Signature {
    pub fn new(identifier: impl Into<String>, return_type: Type) -> Self {
        Self {
            identifier: identifier.into(),
            return_type,
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, ty: Type) -> Self {
        self.args.push(Arg { ty, by_ref: false });
        self
    }

    pub fn with_ref_arg(mut self, ty: Type) -> Self {
        self.args.push(Arg { ty, by_ref: true });
        self
    }

    pub fn with_args(mut self, types: &[Type]) -> Self {
        for ty in types {
            self = self.with_arg(*ty);
        }
        self
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Same identifier and the very same argument types. Return type and
    /// reference-ness are ignored.
    pub fn is_exactly(&self, candidate: &Signature) -> bool {
        self.identifier == candidate.identifier
            && self.args.len() == candidate.args.len()
            && self
                .args
                .iter()
                .zip(&candidate.args)
                .all(|(mine, theirs)| mine.ty == theirs.ty)
    }

    /// Same identifier and every argument of `candidate` converts implicitly
    /// into the matching argument of `self`.
    pub fn is_compatible(&self, candidate: &Signature) -> bool {
        self.identifier == candidate.identifier
            && self.args.len() == candidate.args.len()
            && self
                .args
                .iter()
                .zip(&candidate.args)
                .all(|(mine, theirs)| theirs.ty.is_implicitly_convertible(mine.ty))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.return_type, self.identifier)?;
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg.ty)?;
            if arg.by_ref {
                f.write_str("&")?;
            }
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_ignores_return_type() {
        let native = Signature::new("+", Type::Int).with_args(&[Type::Int, Type::Int]);
        let candidate = Signature::new("+", Type::Any).with_args(&[Type::Int, Type::Int]);
        assert!(native.is_exactly(&candidate));
    }

    #[test]
    fn compatible_match_widens_int() {
        let native = Signature::new("<", Type::Bool).with_args(&[Type::Double, Type::Double]);
        let candidate = Signature::new("<", Type::Any).with_args(&[Type::Double, Type::Int]);
        assert!(!native.is_exactly(&candidate));
        assert!(native.is_compatible(&candidate));
    }

    #[test]
    fn display_marks_references() {
        let sig = Signature::new("=", Type::Int)
            .with_ref_arg(Type::Int)
            .with_arg(Type::Double);
        assert_eq!(sig.to_string(), "int =(int&, double)");
    }
}
