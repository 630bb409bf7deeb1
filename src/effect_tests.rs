use crate::ast::{BinOp, Expr, Program};
use crate::effects::{effect_of_stmt, function_effects, substitute, vars_in_expr, Effect};
use crate::lexer::lex;
use crate::parser::Parser;

fn parse(src: &str) -> Program {
    Parser::new(lex(src).expect("lex"))
        .parse_program()
        .expect("parse")
}

fn var(name: &str) -> Expr {
    Expr::Var {
        line: 1,
        name: name.to_owned(),
    }
}

fn num(value: i64) -> Expr {
    Expr::Num { line: 1, value }
}

fn is_subset(a: &Effect, b: &Effect) -> bool {
    a.reads.is_subset(&b.reads)
        && a.writes.is_subset(&b.writes)
        && a.read_sites
            .iter()
            .all(|(v, lines)| b.read_sites.get(v).map_or(false, |bl| lines.is_subset(bl)))
        && a.write_sites
            .iter()
            .all(|(v, lines)| b.write_sites.get(v).map_or(false, |bl| lines.is_subset(bl)))
}

#[test]
fn vars_in_expr_ignores_literals() {
    let expr = Expr::Arith {
        line: 1,
        op: BinOp::Add,
        left: Box::new(var("a")),
        right: Box::new(num(3)),
    };
    let vars = vars_in_expr(&expr);
    assert_eq!(vars.len(), 1);
    assert!(vars.contains("a"));
}

#[test]
fn assign_effect_records_sites() {
    let prog = parse("function main() {\n    x = y + z;\n}\n");
    let table = function_effects(&prog);
    let eff = &table["main"];
    assert!(eff.reads.contains("y"));
    assert!(eff.reads.contains("z"));
    assert!(eff.writes.contains("x"));
    assert!(eff.read_sites["y"].contains(&2));
    assert!(eff.write_sites["x"].contains(&2));
}

const ALIAS_CALLEE: &str = "\
function callee(p, q) {
    x = p;
    q = 1;
}
";

#[test]
fn substitution_maps_formals_to_actual_variables() {
    let prog = parse(ALIAS_CALLEE);
    let table = function_effects(&prog);
    let out = substitute(
        &table["callee"],
        prog.function("callee"),
        &[var("a"), num(5)],
    );

    // The formal p aliases the actual a, carrying the callee's site lines.
    assert!(out.reads.contains("a"));
    assert!(!out.reads.contains("p"));
    assert!(out.read_sites["a"].contains(&2));
    // x is no formal, so it passes through as a global.
    assert!(out.writes.contains("x"));
    // q was bound to a constant, so it contributes nothing.
    assert!(!out.writes.contains("q"));
}

#[test]
fn substitution_tolerates_arity_mismatch() {
    let prog = parse(ALIAS_CALLEE);
    let table = function_effects(&prog);
    let out = substitute(&table["callee"], prog.function("callee"), &[]);
    assert!(out.reads.is_empty());
    assert_eq!(out.writes.len(), 1);
    assert!(out.writes.contains("x"));
}

const MUTUAL_RECURSION: &str = "\
function ping(a) {
    pong(a);
    x = 1;
}
function pong(b) {
    ping(b);
    y = 1;
}
";

#[test]
fn fixpoint_converges_on_mutual_recursion() {
    let prog = parse(MUTUAL_RECURSION);
    let table = function_effects(&prog);

    assert!(table["ping"].writes.contains("x"));
    assert!(table["ping"].writes.contains("y"));
    assert!(table["pong"].writes.contains("x"));
    assert!(table["pong"].writes.contains("y"));
    assert!(table["ping"].reads.contains("a"));
}

#[test]
fn fixpoint_summaries_contain_their_recomputation() {
    // At the fixed point, recomputing any body under the final table cannot
    // produce anything outside the stored summary.
    let prog = parse(MUTUAL_RECURSION);
    let table = function_effects(&prog);
    for (name, fdef) in &prog.functions {
        let recomputed = effect_of_stmt(&fdef.body, &prog, &table);
        assert!(
            is_subset(&recomputed, &table[name.as_str()]),
            "summary of {} is not a fixed point",
            name
        );
    }
}

const SPAWN_EFFECT: &str = "\
function main() {
    h = spawn f(v);
}
function f(p) {
    x = p;
}
";

#[test]
fn spawn_effect_includes_handle_write_and_callee_footprint() {
    let prog = parse(SPAWN_EFFECT);
    let table = function_effects(&prog);
    let eff = &table["main"];

    assert!(eff.writes.contains("h"));
    assert!(eff.write_sites["h"].contains(&2));
    assert!(eff.writes.contains("x"));
    assert!(eff.write_sites["x"].contains(&5));
    // v is read once as the spawn argument and once through the substituted
    // formal p, at the callee's site.
    assert!(eff.read_sites["v"].contains(&2));
    assert!(eff.read_sites["v"].contains(&5));
}

#[test]
fn control_flow_conditions_are_reads() {
    let prog = parse(
        "function main() {\n    if (c) x = 1; else y = 2;\n    while (k < 2) z = 3;\n}\n",
    );
    let table = function_effects(&prog);
    let eff = &table["main"];
    assert!(eff.read_sites["c"].contains(&2));
    assert!(eff.read_sites["k"].contains(&3));
    assert!(eff.writes.contains("x"));
    assert!(eff.writes.contains("y"));
    assert!(eff.writes.contains("z"));
}

#[test]
fn await_contributes_no_effect() {
    let prog = parse("function main() {\n    h = spawn f();\n    await h;\n}\nfunction f() { }\n");
    let table = function_effects(&prog);
    let eff = &table["main"];
    assert!(eff.reads.is_empty());
    assert_eq!(eff.writes.len(), 1);
    assert!(eff.writes.contains("h"));
}
