#![allow(dead_code)]

use nodlang::{EngineConfig, Qword, Session};

pub fn eval(source: &str) -> Qword {
    let mut session = Session::default();
    session
        .eval(source)
        .unwrap_or_else(|err| panic!("evaluating {source:?} failed: {err}"))
}

pub fn roundtrip(source: &str) -> String {
    Session::default()
        .parse_and_serialize(source)
        .unwrap_or_else(|err| panic!("round-tripping {source:?} failed: {err}"))
}

pub fn strict_session() -> Session {
    Session::new(EngineConfig {
        strict_mode: true,
        ..EngineConfig::default()
    })
}
