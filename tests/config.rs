use nodlang::{EngineConfig, Qword, Session};
use tempfile::tempdir;

#[test]
fn config_round_trips_through_disk() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("nodlang.toml");
    let config = EngineConfig {
        strict_mode: true,
        max_steps: 42,
        log_filter: "nodlang=debug".into(),
    };
    config.save(&path).expect("save");
    assert_eq!(EngineConfig::load(&path).expect("load"), config);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    assert!(EngineConfig::load(&dir.path().join("absent.toml")).is_err());
}

#[test]
fn step_budget_comes_from_config() {
    let config = EngineConfig::from_toml_str("max_steps = 10").expect("parse");
    let mut session = Session::new(config);
    let err = session
        .eval("int i = 0; while (i < 100) { i = i + 1; }")
        .expect_err("budget");
    assert_eq!(err.code_str(), "E005");

    let mut session = Session::default();
    assert_eq!(
        session.eval("int i = 0; while (i < 100) { i = i + 1; } i;").expect("eval"),
        Qword::Int(100)
    );
}
