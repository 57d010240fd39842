mod util;

use nodlang::config::ConfigError;
use nodlang::graph::GraphError;
use nodlang::vm::VmError;
use nodlang::{EngineError, Session, Type};
use util::strict_session;

#[test]
fn syntax_errors_use_e001() {
    let mut session = Session::default();
    for source in ["(1 + 2;", "1 + 2);", "int a = 4 # 2;", "int a = 1; }"] {
        let err = session.parse(source).expect_err(source);
        assert_eq!(err.code_str(), "E001", "{source}");
    }
}

#[test]
fn strict_undeclared_identifier_uses_e001() {
    let mut session = strict_session();
    let err = session.parse("a + 1;").expect_err("strict");
    assert_eq!(err.code_str(), "E001");
    assert!(err.message.contains('a'));
}

#[test]
fn graph_errors_use_e002() {
    let err: EngineError = GraphError::SelfConnection.into();
    assert_eq!(err.code_str(), "E002");
}

#[test]
fn incompatible_types_use_e003() {
    let err: EngineError = GraphError::IncompatibleTypes {
        from: Type::String,
        to: Type::Bool,
    }
    .into();
    assert_eq!(err.code_str(), "E003");
}

#[test]
fn compile_refusals_use_e004() {
    let mut session = Session::default();
    session.parse("a + 1;").expect("permissive parse");
    let err = session.compile().expect_err("undeclared");
    assert_eq!(err.code_str(), "E004");

    session.parse("if () { 1; }").expect("parse");
    let err = session.compile().expect_err("missing condition");
    assert_eq!(err.code_str(), "E004");
}

#[test]
fn vm_faults_use_e005() {
    let err: EngineError = VmError::NotRunning.into();
    assert_eq!(err.code_str(), "E005");
    let err: EngineError = VmError::StepBudgetExceeded(10).into();
    assert_eq!(err.code_str(), "E005");
}

#[test]
fn config_errors_are_invalid_operations() {
    let parse_err = nodlang::EngineConfig::from_toml_str("strict_mode = 3").expect_err("bad type");
    assert!(matches!(parse_err, ConfigError::Parse(_)));
    let err: EngineError = parse_err.into();
    assert_eq!(err.code_str(), "E004");
}
