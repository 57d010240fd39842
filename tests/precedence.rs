mod util;

use nodlang::{Graph, Language, PropertyId, Qword, Session, parse};
use util::{eval, roundtrip};

/// Identifier of the node feeding the last instruction of `source`.
fn top_operator(source: &str) -> String {
    let language = Language::new();
    let mut graph = Graph::new();
    let root = parse(&language, &mut graph, source, false).expect("parse");
    let instruction = *graph.node(root).expect("root").children().last().expect("instruction");
    let top = graph.source_of(PropertyId::new(instruction, 0)).expect("expression");
    graph.node(top.node).expect("node").name.clone()
}

#[test]
fn products_bind_tighter_than_sums() {
    assert_eq!(top_operator("1*1+2;"), "+");
    assert_eq!(top_operator("1+1*2;"), "+");
    assert_eq!(eval("1*1+2;"), Qword::Int(3));
    assert_eq!(eval("1+1*2;"), Qword::Int(3));
}

#[test]
fn unary_minus_and_brackets() {
    assert_eq!(eval("-(2*5);"), Qword::Int(-10));
    assert_eq!(eval("(-2)*5;"), Qword::Int(-10));
    assert_eq!(eval("5+(-1)*3;"), Qword::Int(2));
    for source in ["1*1+2;", "-(2*5);", "(-2)*5;", "5+(-1)*3;"] {
        assert_eq!(roundtrip(source), source);
        let evaluated = Session::default().parse_eval_and_serialize(source).expect("evaluate");
        assert_eq!(evaluated, source);
    }
}

#[test]
fn assignment_is_right_associative() {
    assert_eq!(top_operator("int a; int b; a = b = 3;").as_str(), "=");
    assert_eq!(eval("int a; int b; a = b = 3; b;"), Qword::Int(3));
}

#[test]
fn same_precedence_is_left_associative() {
    assert_eq!(eval("8-4-2;"), Qword::Int(2));
    assert_eq!(eval("8/4/2;"), Qword::Int(1));
}
