mod util;

use nodlang::{ErrorCode, Qword, Session};
use util::eval;

#[test]
fn arithmetic_corpus() {
    assert_eq!(eval("2+3;"), Qword::Int(5));
    assert_eq!(eval("-5+4;"), Qword::Int(-1));
    assert_eq!(eval("-1.0+2.0*5.0-3.0/6.0;"), Qword::Double(8.5));
    assert_eq!(eval("2*(5+3);"), Qword::Int(16));
    assert_eq!(eval("10-2-3;"), Qword::Int(5));
    assert_eq!(eval("7/2;"), Qword::Int(3));
}

#[test]
fn mixed_int_and_double_promote() {
    assert_eq!(eval("0.5 + 1;"), Qword::Double(1.5));
    // the left operand decides the result type
    assert_eq!(eval("1 + 0.5;"), Qword::Int(1));
    assert_eq!(eval("double d = 2; d;"), Qword::Double(2.0));
}

#[test]
fn chained_assignment() {
    assert_eq!(eval("double a; double b; a = b = 5.0;"), Qword::Double(5.0));
    assert_eq!(eval("double a; double b; a = b = 5.0; a + b;"), Qword::Double(10.0));
}

#[test]
fn strings_and_conversions() {
    assert_eq!(eval("\"ab\" + \"cd\";"), Qword::String("abcd".into()));
    assert_eq!(eval("string s = \"n=\"; s + 4;"), Qword::String("n=4".into()));
    assert_eq!(eval("to_string(12);"), Qword::String("12".into()));
}

#[test]
fn library_functions() {
    assert_eq!(eval("pow(2,10);"), Qword::Int(1024));
    assert_eq!(eval("operator*(2,2);"), Qword::Int(4));
    assert_eq!(eval("sqrt(16.0);"), Qword::Double(4.0));
    assert_eq!(eval("secondDegreePolynomial(1.0, 2.0, 3.0, 4.0, 5.0);"), Qword::Double(21.0));
}

#[test]
fn comparisons_and_logic() {
    assert_eq!(eval("3 > 2;"), Qword::Bool(true));
    assert_eq!(eval("2.0 <= 1.0;"), Qword::Bool(false));
    assert_eq!(eval("true && false;"), Qword::Bool(false));
    assert_eq!(eval("!false;"), Qword::Bool(true));
    assert_eq!(eval("\"a\" != \"b\";"), Qword::Bool(true));
}

#[test]
fn conditional_takes_the_matching_branch() {
    let source = "int bob = 50; int alice = 10; string winner = \"\";\n\
                  if (bob > alice) { winner = \"bob\"; } else { winner = \"alice\"; }\n\
                  winner;";
    assert_eq!(eval(source), Qword::String("bob".into()));

    let source = "int bob = 5; int alice = 10; string winner = \"\";\n\
                  if (bob > alice) { winner = \"bob\"; } else { winner = \"alice\"; }\n\
                  winner;";
    assert_eq!(eval(source), Qword::String("alice".into()));
}

#[test]
fn else_if_chain() {
    let program = |value: i32| {
        format!(
            "int a = {value}; int r = 0; if (a > 10) {{ r = 1; }} else if (a > 5) {{ r = 2; }} else {{ r = 3; }} r;"
        )
    };
    assert_eq!(eval(&program(20)), Qword::Int(1));
    assert_eq!(eval(&program(7)), Qword::Int(2));
    assert_eq!(eval(&program(1)), Qword::Int(3));
}

#[test]
fn for_loop_accumulates() {
    let source = "string s = \"\";\n\
                  for (int n = 0; n < 10; n = n + 1) { s = s + to_string(n); }\n\
                  s;";
    assert_eq!(eval(source), Qword::String("0123456789".into()));
}

#[test]
fn while_loop_counts() {
    let source = "int i = 0; int sum = 0; while (i < 5) { i = i + 1; sum = sum + i; } sum;";
    assert_eq!(eval(source), Qword::Int(15));
}

#[test]
fn division_by_zero_is_invalid_operation() {
    let mut session = Session::default();
    let err = session.eval("1/0;").expect_err("division by zero");
    assert_eq!(err.code, ErrorCode::InvalidOperation);
}

#[test]
fn abstract_function_cannot_run() {
    let mut session = Session::default();
    let err = session.eval("dna_to_protein(\"GATACA\");").expect_err("abstract");
    assert_eq!(err.code, ErrorCode::InvalidOperation);
    // the graph still serializes
    assert_eq!(session.serialize().expect("serialize"), "dna_to_protein(\"GATACA\");");
}
