use crate::compiler::CompileError;
use crate::compiler::instruction::BytecodeError;
use crate::config::ConfigError;
use crate::graph::GraphError;
use crate::language::natives::NativeError;
use crate::parser::ParseError;
use crate::serializer::SerializeError;
use crate::tokenizer::TokenizeError;
use crate::vm::VmError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Syntax,
    Graph,
    TypeMismatch,
    InvalidOperation,
    VmFault,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Syntax => "E001",
            ErrorCode::Graph => "E002",
            ErrorCode::TypeMismatch => "E003",
            ErrorCode::InvalidOperation => "E004",
            ErrorCode::VmFault => "E005",
        }
    }
}

/// Any engine failure, flattened to a stable code and a message.
#[derive(Debug, Clone, Error)]
#[error("{}: {message}", .code.as_str())]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

pub fn graph_error_code(error: &GraphError) -> ErrorCode {
    match error {
        GraphError::IncompatibleTypes { .. } => ErrorCode::TypeMismatch,
        _ => ErrorCode::Graph,
    }
}

pub fn native_error_code(error: &NativeError) -> ErrorCode {
    match error {
        NativeError::ArgumentType { .. } => ErrorCode::TypeMismatch,
        NativeError::DivisionByZero | NativeError::MissingArgument(_) => ErrorCode::InvalidOperation,
    }
}

pub fn vm_error_code(error: &VmError) -> ErrorCode {
    match error {
        VmError::Native { source, .. } => native_error_code(source),
        VmError::Graph(inner) => graph_error_code(inner),
        _ => ErrorCode::VmFault,
    }
}

impl From<TokenizeError> for EngineError {
    fn from(value: TokenizeError) -> Self {
        EngineError::new(ErrorCode::Syntax, value.to_string())
    }
}

impl From<ParseError> for EngineError {
    fn from(value: ParseError) -> Self {
        EngineError::new(ErrorCode::Syntax, value.to_string())
    }
}

impl From<GraphError> for EngineError {
    fn from(value: GraphError) -> Self {
        EngineError::new(graph_error_code(&value), value.to_string())
    }
}

impl From<SerializeError> for EngineError {
    fn from(value: SerializeError) -> Self {
        let code = match &value {
            SerializeError::Graph(inner) => graph_error_code(inner),
            SerializeError::UnknownType(..) => ErrorCode::TypeMismatch,
        };
        EngineError::new(code, value.to_string())
    }
}

impl From<CompileError> for EngineError {
    fn from(value: CompileError) -> Self {
        let code = match &value {
            CompileError::Graph(inner) => graph_error_code(inner),
            _ => ErrorCode::InvalidOperation,
        };
        EngineError::new(code, value.to_string())
    }
}

impl From<VmError> for EngineError {
    fn from(value: VmError) -> Self {
        EngineError::new(vm_error_code(&value), value.to_string())
    }
}

impl From<NativeError> for EngineError {
    fn from(value: NativeError) -> Self {
        EngineError::new(native_error_code(&value), value.to_string())
    }
}

impl From<BytecodeError> for EngineError {
    fn from(value: BytecodeError) -> Self {
        EngineError::new(ErrorCode::VmFault, value.to_string())
    }
}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        EngineError::new(ErrorCode::InvalidOperation, value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::types::Type;

    #[test]
    fn codes_are_stable() {
        let codes = [
            ErrorCode::Syntax,
            ErrorCode::Graph,
            ErrorCode::TypeMismatch,
            ErrorCode::InvalidOperation,
            ErrorCode::VmFault,
        ];
        let strings: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        assert_eq!(strings, ["E001", "E002", "E003", "E004", "E005"]);
    }

    #[test]
    fn type_errors_map_to_mismatch() {
        let err = EngineError::from(GraphError::IncompatibleTypes {
            from: Type::String,
            to: Type::Int,
        });
        assert_eq!(err.code_str(), "E003");

        let err = EngineError::from(VmError::Native {
            node: "/".into(),
            source: NativeError::DivisionByZero,
        });
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert!(err.to_string().starts_with("E004: "));
    }
}
