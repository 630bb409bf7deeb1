use crate::ast::{BinOp, Program, Stmt};
use crate::constraints;
use crate::constraints::list_spawns_awaits;
use crate::diag::Diagnostic;
use crate::lexer::{lex, TokenKind};
use crate::parser::Parser;
use assert_matches::assert_matches;

fn parse(src: &str) -> Result<Program, Diagnostic> {
    Parser::new(lex(src)?).parse_program()
}

fn body_of<'a>(prog: &'a Program, name: &str) -> &'a [Stmt] {
    match &prog.function(name).body {
        Stmt::Seq { stmts, .. } => stmts,
        other => panic!("function body should be a sequence, got {:?}", other),
    }
}

#[test]
fn lex_tracks_lines_and_skips_comments() {
    let toks = lex("x = 1; // trailing comment\ny = 2;\n").unwrap();
    assert_eq!(toks.len(), 9);
    assert_eq!(toks[0].kind, TokenKind::Ident);
    assert_eq!(toks[0].text, "x");
    assert_eq!(toks[0].line, 1);
    assert_eq!(toks[4].text, "y");
    assert_eq!(toks[4].line, 2);
    assert_eq!(toks[8].kind, TokenKind::Eof);
}

#[test]
fn lex_separates_keywords_from_identifiers() {
    let toks = lex("spawn spawned await f").unwrap();
    assert_eq!(toks[0].kind, TokenKind::Keyword);
    assert_eq!(toks[1].kind, TokenKind::Ident);
    assert_eq!(toks[2].kind, TokenKind::Keyword);
    assert_eq!(toks[3].kind, TokenKind::Ident);
}

#[test]
fn lex_prefers_two_character_operators() {
    let toks = lex("a <= b == c").unwrap();
    assert_eq!(toks[1].text, "<=");
    assert_eq!(toks[1].kind, TokenKind::Op);
    assert_eq!(toks[3].text, "==");
}

#[test]
fn lex_rejects_unknown_characters() {
    let err = lex("x = $;").unwrap_err();
    assert_matches!(err, Diagnostic::UnexpectedCharacter { line: 1, col: 5, .. });
}

const STATEMENT_FORMS: &str = "\
function main() {
    x = 1;
    y = x + 2;
    z = f(x);
    f(y);
}
function f(p) {
    return p;
}
";

#[test]
fn parse_statement_forms() {
    let prog = parse(STATEMENT_FORMS).unwrap();
    let stmts = body_of(&prog, "main");
    assert_eq!(stmts.len(), 4);
    assert_matches!(stmts[0], Stmt::Assign { line: 2, ref target, .. } if target == "x");
    assert_matches!(
        stmts[1],
        Stmt::Assign { line: 3, ref expr, .. }
            if matches!(expr, crate::ast::Expr::Arith { op: BinOp::Add, .. })
    );
    assert_matches!(
        stmts[2],
        Stmt::AssignCall { ref target, ref func, .. } if target == "z" && func == "f"
    );
    assert_matches!(stmts[3], Stmt::Call { line: 5, ref func, .. } if func == "f");

    assert_eq!(prog.function("f").params, vec!["p".to_owned()]);
    assert_matches!(body_of(&prog, "f")[0], Stmt::Return { line: 8, .. });
}

const SPAWN_FORMS: &str = "\
function main() {
    h = spawn f();
    spawn f();
    g = spawn { x = 1; };
    spawn { y = 2; };
    await h;
    await f;
}
function f() { }
";

#[test]
fn parse_spawn_forms() {
    let prog = parse(SPAWN_FORMS).unwrap();
    let stmts = body_of(&prog, "main");
    assert_eq!(stmts.len(), 6);
    assert_matches!(
        stmts[0],
        Stmt::Spawn(ref s)
            if s.line == 2
                && s.handle.as_deref() == Some("h")
                && matches!(s.target, crate::ast::SpawnTarget::Call { ref func, .. } if func == "f")
    );
    assert_matches!(stmts[1], Stmt::Spawn(ref s) if s.handle.is_none());
    assert_matches!(
        stmts[2],
        Stmt::Spawn(ref s)
            if s.handle.as_deref() == Some("g")
                && matches!(s.target, crate::ast::SpawnTarget::Block { .. })
    );
    assert_matches!(
        stmts[3],
        Stmt::Spawn(ref s)
            if s.handle.is_none() && matches!(s.target, crate::ast::SpawnTarget::Block { .. })
    );
    assert_matches!(stmts[4], Stmt::Await { line: 6, ref handle } if handle == "h");
    assert_matches!(stmts[5], Stmt::Await { ref handle, .. } if handle == "f");
}

#[test]
fn parse_requires_else_branch() {
    let err = parse("function main() { if (c) x = 1; }").unwrap_err();
    assert_matches!(err, Diagnostic::UnexpectedToken { line: 1, .. });
}

#[test]
fn parse_rejects_chained_operators() {
    // SMALL expressions are flat: a single operator, no precedence.
    let err = parse("function main() { x = 1 + 2 + 3; }").unwrap_err();
    assert_matches!(err, Diagnostic::UnexpectedToken { line: 1, .. });
}

#[test]
fn parse_rejects_duplicate_functions() {
    let err = parse("function f() { }\nfunction f() { }\n").unwrap_err();
    assert_eq!(
        err,
        Diagnostic::DuplicateFunction {
            line: 2,
            name: "f".to_owned()
        }
    );
}

macro_rules! constraint_test {
    ($name:ident, $src:expr, $diag:expr) => {
        #[test]
        fn $name() {
            let prog = parse($src).unwrap();
            assert_eq!(constraints::validate(&prog), Err($diag));
        }
    };
}

constraint_test!(
    validator_rejects_spawn_in_while,
    "function main() {\n    while (c) spawn f();\n}\nfunction f() { }\n",
    Diagnostic::SpawnInControl { line: 2 }
);
constraint_test!(
    validator_rejects_await_in_if,
    "function main() {\n    if (c) await h; else x = 1;\n}\n",
    Diagnostic::AwaitInControl { line: 2 }
);
constraint_test!(
    validator_descends_through_nested_sequences,
    "function main() {\n    if (c) { { spawn f(); } } else x = 1;\n}\nfunction f() { }\n",
    Diagnostic::SpawnInControl { line: 2 }
);
constraint_test!(
    validator_rejects_undefined_callee,
    "function main() {\n    g();\n}\n",
    Diagnostic::UndefinedFunction {
        line: 2,
        name: "g".to_owned()
    }
);
constraint_test!(
    validator_resolves_callees_inside_spawn_blocks,
    "function main() {\n    spawn { g(); };\n}\n",
    Diagnostic::UndefinedFunction {
        line: 2,
        name: "g".to_owned()
    }
);

#[test]
fn plain_sequences_do_not_count_as_control() {
    let prog = parse(
        "function main() {\n    {\n        h = spawn f();\n        await h;\n    }\n}\nfunction f() { }\n",
    )
    .unwrap();
    assert_eq!(constraints::validate(&prog), Ok(()));

    // The spawn/await collector sees through plain sequences too.
    let (spawns, awaits) = list_spawns_awaits(&prog.function("main").body);
    assert_eq!(spawns.len(), 1);
    assert_eq!(spawns[0].handle.as_deref(), Some("h"));
    assert_eq!(awaits, vec!["h"]);
}

#[test]
fn spawn_block_bodies_are_not_control_contexts() {
    // A spawn block may itself contain spawns; the constraint only guards
    // if/while bodies.
    let prog = parse("function main() {\n    spawn { spawn f(); };\n}\nfunction f() { }\n").unwrap();
    assert_eq!(constraints::validate(&prog), Ok(()));
}
