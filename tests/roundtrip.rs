mod util;

use util::roundtrip;

#[test]
fn whitespace_and_empty_sources() {
    for source in ["", " ", "{}", " {} ", "\n\n"] {
        assert_eq!(roundtrip(source), source);
    }
}

#[test]
fn expressions_keep_their_spacing() {
    let corpus = [
        "1+2;",
        "1 + 2 ;",
        "-1.0+2.0*5.0-3.0/6.0;",
        "(1+2)*3;",
        "( ( 4 ) );",
        "\"hello\" + \" world\";",
        "true && false;",
    ];
    for source in corpus {
        assert_eq!(roundtrip(source), source);
    }
}

#[test]
fn declarations_and_assignments() {
    let corpus = [
        "int a;",
        "double a = 5.0;",
        "string s = \"x\";",
        "bool flag = true;",
        "double a; double b; a = b = 5.0;",
        "int a = 1;\nint b = a * 2;\n",
    ];
    for source in corpus {
        assert_eq!(roundtrip(source), source);
    }
}

#[test]
fn undeclared_identifiers_round_trip_in_permissive_mode() {
    let source = "double a = b + c * r - z;";
    assert_eq!(roundtrip(source), source);
}

#[test]
fn calls_and_operator_call_form() {
    let corpus = [
        "pow(2,3);",
        "pow( 2 , 3 );",
        "to_string(42);",
        "operator*(2,2);",
        "dna_to_protein(\"GATACA\");",
    ];
    for source in corpus {
        assert_eq!(roundtrip(source), source);
    }
}

#[test]
fn control_flow_structures() {
    let corpus = [
        "if (true) { 1; }",
        "if (true) { 1; } else { 2; }",
        "int a = 3; if (a > 1) { a = 1; } else if (a < 0) { a = 0; } else { a = 2; }",
        "for (int n = 0; n < 10; n = n + 1) { n; }",
        "int i = 0; while (i < 3) { i = i + 1; }",
        "{ int a = 1; { a; } }",
    ];
    for source in corpus {
        assert_eq!(roundtrip(source), source);
    }
}

#[test]
fn comments_are_preserved() {
    let corpus = [
        "// header\n1;",
        "1; // trailing\n",
        "/* block */ int a = 2;",
        "int a = /* inline */ 2;",
    ];
    for source in corpus {
        assert_eq!(roundtrip(source), source);
    }
}
