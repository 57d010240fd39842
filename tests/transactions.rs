use nodlang::graph::{Edge, NodeKind, SideEffects};
use nodlang::{Graph, Language, Parser, PropertyId, Session, Value, parse};
use std::time::{Duration, Instant};

#[test]
fn failed_parse_leaves_an_empty_graph() {
    let language = Language::new();
    for source in ["int a = 1; }", "(1 + 2;", "1 + 2);", "int a = \"unterminated;"] {
        let mut graph = Graph::new();
        assert!(parse(&language, &mut graph, source, false).is_err(), "{source}");
        assert!(graph.is_empty(), "{source}");
        assert_eq!(graph.edge_count(), 0, "{source}");
    }
}

#[test]
fn reparse_replaces_the_previous_graph() {
    let language = Language::new();
    let mut fresh = Graph::new();
    parse(&language, &mut fresh, "int b = 2; b * b;", false).expect("parse");

    let mut reused = Graph::new();
    parse(&language, &mut reused, "int a = 1; if (a > 0) { a = 2; }", false).expect("parse");
    parse(&language, &mut reused, "int b = 2; b * b;", false).expect("parse");

    assert_eq!(reused.node_count(), fresh.node_count());
    assert_eq!(reused.edge_count(), fresh.edge_count());
    reused.check_invariants().expect("invariants");
}

#[test]
fn backtracking_leaves_no_stray_nodes() {
    let language = Language::new();
    // brackets and the call are both reached after failed alternatives
    let mut graph = Graph::new();
    parse(&language, &mut graph, "pow(2, 3) + (4);", false).expect("parse");
    graph.check_invariants().expect("invariants");

    // root, instruction, `+` and `pow`; every literal is digested
    assert_eq!(graph.node_count(), 4);
}

#[test]
fn successful_parse_after_backtracking_matches_the_plain_form() {
    let language = Language::new();

    // the call is reached only after the parenthesis and unary alternatives
    // were tried and rolled back
    let mut call = Graph::new();
    parse(&language, &mut call, "dna_to_protein(\"GATACA\");", false).expect("parse");
    call.check_invariants().expect("invariants");
    // root, instruction and the abstract function; the literal is digested
    assert_eq!(call.node_count(), 3);
    // root -> instruction as child and as successor, function -> instruction root
    assert_eq!(call.edge_count(), 3);
    let functions = call
        .nodes()
        .filter(|(_, node)| matches!(node.kind, NodeKind::Function(_)))
        .count();
    assert_eq!(functions, 1);

    let mut plain = Graph::new();
    parse(&language, &mut plain, "1 + 2 * 3 - 4 / 2;", false).expect("parse");
    let mut bracketed = Graph::new();
    parse(&language, &mut bracketed, "(1 + (2 * 3)) - (4 / 2);", false).expect("parse");
    plain.check_invariants().expect("invariants");
    bracketed.check_invariants().expect("invariants");

    // root, instruction and four operators
    assert_eq!(plain.node_count(), 6);
    assert_eq!(bracketed.node_count(), plain.node_count());
    assert_eq!(bracketed.edge_count(), plain.edge_count());
}

#[test]
fn long_programs_parse_in_linear_time() {
    const LINES: usize = 4000;
    let source: String = (0..LINES).map(|i| format!("int v{i} = {i} + 1;\n")).collect();

    let mut session = Session::default();
    let started = Instant::now();
    session.parse(&source).expect("parse");
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_secs(5), "{LINES} declarations took {elapsed:?}");

    // root, then an instruction, a variable and `+` per line
    assert_eq!(session.graph().node_count(), 1 + 3 * LINES);
    session.graph().check_invariants().expect("invariants");
    assert_eq!(session.serialize().expect("serialize"), source);
}

#[test]
fn failed_declaration_releases_its_name() {
    let language = Language::new();
    let mut graph = Graph::new();
    let mut parser = Parser::new(&language, &mut graph);
    assert!(parser.parse("int a = ;").is_err());
    assert_eq!(parser.ribbon().cursor(), 0);
    drop(parser);
    assert!(graph.is_empty());

    parse(&language, &mut graph, "int a = 1;", false).expect("name is free again");
}

#[test]
fn checkpoint_restore_drops_late_nodes_and_edges() {
    let mut graph = Graph::new();
    let root = graph.create_root();
    let instruction = graph.create_instruction();
    graph
        .connect(Edge::Child { parent: root, child: instruction }, SideEffects::On)
        .expect("child");
    let nodes = graph.node_count();
    let edges = graph.edge_count();

    let checkpoint = graph.checkpoint();
    let literal = graph.create_literal(Value::Int(3));
    let second = graph.create_instruction();
    graph
        .connect(Edge::Child { parent: root, child: second }, SideEffects::On)
        .expect("child");
    graph
        .connect(
            Edge::Value {
                output: PropertyId::new(literal, 0),
                input: PropertyId::new(second, 0),
            },
            SideEffects::On,
        )
        .expect("value");
    graph.restore(checkpoint);

    assert_eq!(graph.node_count(), nodes);
    assert_eq!(graph.edge_count(), edges);
    assert!(!graph.contains(literal));
    assert!(!graph.contains(second));
    assert!(graph.contains(instruction));
    graph.check_invariants().expect("invariants");
}
