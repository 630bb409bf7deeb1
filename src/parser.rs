//! Recursive-descent parser producing the SMALL AST.
//!
//! The grammar is deliberately small: `function name(params) { ... }`
//! definitions, `;`-terminated statements, both spawn forms with an optional
//! handle assignment, and flat expressions (one optional operator, no
//! parenthesized subexpressions). Function names must be unique.

use crate::ast::{BinOp, Expr, FunctionDef, Program, RelOp, Spawn, SpawnTarget, Stmt};
use crate::diag::Diagnostic;
use crate::lexer::{Token, TokenKind};
use fnv::FnvHashMap;

enum OpKind {
    Arith(BinOp),
    Rel(RelOp),
}

fn classify_op(text: &str) -> OpKind {
    match text {
        "+" => OpKind::Arith(BinOp::Add),
        "-" => OpKind::Arith(BinOp::Sub),
        "*" => OpKind::Arith(BinOp::Mul),
        "/" => OpKind::Arith(BinOp::Div),
        "==" => OpKind::Rel(RelOp::Eq),
        "!=" => OpKind::Rel(RelOp::Ne),
        "<" => OpKind::Rel(RelOp::Lt),
        "<=" => OpKind::Rel(RelOp::Le),
        ">" => OpKind::Rel(RelOp::Gt),
        ">=" => OpKind::Rel(RelOp::Ge),
        "and" => OpKind::Rel(RelOp::And),
        "or" => OpKind::Rel(RelOp::Or),
        _ => panic!("lexer produced unknown operator `{}`", text),
    }
}

fn describe(t: &Token) -> String {
    match t.kind {
        TokenKind::Eof => "end of input".to_owned(),
        _ => format!("`{}`", t.text),
    }
}

/// Token-stream parser. Construct with the lexer's output, then call
/// [`Parser::parse_program`].
pub struct Parser {
    toks: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(toks: Vec<Token>) -> Parser {
        Parser { toks, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.toks[self.pos]
    }

    // The token list ends with Eof, so one-token lookahead clamps there.
    fn peek2(&self) -> &Token {
        &self.toks[(self.pos + 1).min(self.toks.len() - 1)]
    }

    fn at(&self, kind: TokenKind, text: &str) -> bool {
        let t = self.peek();
        t.kind == kind && t.text == text
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, Diagnostic> {
        let t = self.peek().clone();
        if t.kind != kind {
            return Err(Diagnostic::UnexpectedToken {
                line: t.line,
                expected: what.to_owned(),
                found: describe(&t),
            });
        }
        self.pos += 1;
        Ok(t)
    }

    fn expect_text(&mut self, kind: TokenKind, text: &str) -> Result<Token, Diagnostic> {
        let t = self.peek().clone();
        if t.kind != kind || t.text != text {
            return Err(Diagnostic::UnexpectedToken {
                line: t.line,
                expected: format!("`{}`", text),
                found: describe(&t),
            });
        }
        self.pos += 1;
        Ok(t)
    }

    /// Parses a whole source file into a program.
    pub fn parse_program(mut self) -> Result<Program, Diagnostic> {
        let mut functions = FnvHashMap::default();
        while self.peek().kind != TokenKind::Eof {
            let f = self.parse_function()?;
            if functions.contains_key(&f.name) {
                return Err(Diagnostic::DuplicateFunction {
                    line: f.line,
                    name: f.name,
                });
            }
            functions.insert(f.name.clone(), f);
        }
        Ok(Program { functions })
    }

    fn parse_function(&mut self) -> Result<FunctionDef, Diagnostic> {
        let start = self.expect_text(TokenKind::Keyword, "function")?;
        let name = self.expect(TokenKind::Ident, "function name")?.text;
        self.expect_text(TokenKind::Sym, "(")?;

        let mut params = Vec::new();
        if !self.at(TokenKind::Sym, ")") {
            params.push(self.expect(TokenKind::Ident, "parameter name")?.text);
            while self.at(TokenKind::Sym, ",") {
                self.expect_text(TokenKind::Sym, ",")?;
                params.push(self.expect(TokenKind::Ident, "parameter name")?.text);
            }
        }

        self.expect_text(TokenKind::Sym, ")")?;
        self.expect_text(TokenKind::Sym, "{")?;
        let stmts = self.parse_stmt_list("}")?;
        self.expect_text(TokenKind::Sym, "}")?;
        Ok(FunctionDef {
            name,
            params,
            body: Stmt::Seq {
                line: start.line,
                stmts,
            },
            line: start.line,
        })
    }

    fn parse_stmt_list(&mut self, until: &str) -> Result<Vec<Stmt>, Diagnostic> {
        let mut out = Vec::new();
        while !self.at(TokenKind::Sym, until) {
            out.push(self.parse_stmt()?);
        }
        Ok(out)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, Diagnostic> {
        let t = self.peek().clone();
        match (t.kind, t.text.as_str()) {
            (TokenKind::Keyword, "if") => self.parse_if(),
            (TokenKind::Keyword, "while") => self.parse_while(),
            (TokenKind::Keyword, "return") => self.parse_return(),
            (TokenKind::Keyword, "spawn") => self.parse_spawn(None),
            (TokenKind::Keyword, "await") => self.parse_await(),
            (TokenKind::Sym, "{") => self.parse_seq(),
            (TokenKind::Ident, _) => {
                if self.peek2().kind == TokenKind::Sym && self.peek2().text == "=" {
                    let lhs = self.expect(TokenKind::Ident, "identifier")?;
                    self.expect_text(TokenKind::Sym, "=")?;

                    if self.at(TokenKind::Keyword, "spawn") {
                        return self.parse_spawn(Some(lhs.text));
                    }
                    if self.peek().kind == TokenKind::Ident
                        && self.peek2().kind == TokenKind::Sym
                        && self.peek2().text == "("
                    {
                        let (func, args) = self.parse_call()?;
                        self.expect_text(TokenKind::Sym, ";")?;
                        return Ok(Stmt::AssignCall {
                            line: lhs.line,
                            target: lhs.text,
                            func,
                            args,
                        });
                    }
                    let expr = self.parse_expr()?;
                    self.expect_text(TokenKind::Sym, ";")?;
                    return Ok(Stmt::Assign {
                        line: lhs.line,
                        target: lhs.text,
                        expr,
                    });
                }
                if self.peek2().kind == TokenKind::Sym && self.peek2().text == "(" {
                    let (func, args) = self.parse_call()?;
                    self.expect_text(TokenKind::Sym, ";")?;
                    return Ok(Stmt::Call {
                        line: t.line,
                        func,
                        args,
                    });
                }
                Err(Diagnostic::UnexpectedToken {
                    line: t.line,
                    expected: "a statement".to_owned(),
                    found: describe(&t),
                })
            }
            _ => Err(Diagnostic::UnexpectedToken {
                line: t.line,
                expected: "a statement".to_owned(),
                found: describe(&t),
            }),
        }
    }

    fn parse_seq(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.expect_text(TokenKind::Sym, "{")?;
        let stmts = self.parse_stmt_list("}")?;
        self.expect_text(TokenKind::Sym, "}")?;
        Ok(Stmt::Seq {
            line: start.line,
            stmts,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.expect_text(TokenKind::Keyword, "if")?;
        self.expect_text(TokenKind::Sym, "(")?;
        let cond = self.parse_expr()?;
        self.expect_text(TokenKind::Sym, ")")?;
        let then_branch = self.parse_stmt()?;
        self.expect_text(TokenKind::Keyword, "else")?;
        let else_branch = self.parse_stmt()?;
        Ok(Stmt::If {
            line: start.line,
            cond,
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.expect_text(TokenKind::Keyword, "while")?;
        self.expect_text(TokenKind::Sym, "(")?;
        let cond = self.parse_expr()?;
        self.expect_text(TokenKind::Sym, ")")?;
        let body = self.parse_stmt()?;
        Ok(Stmt::While {
            line: start.line,
            cond,
            body: Box::new(body),
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.expect_text(TokenKind::Keyword, "return")?;
        let expr = self.parse_expr()?;
        self.expect_text(TokenKind::Sym, ";")?;
        Ok(Stmt::Return {
            line: start.line,
            expr,
        })
    }

    fn parse_await(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.expect_text(TokenKind::Keyword, "await")?;
        let handle = self.expect(TokenKind::Ident, "handle name")?.text;
        self.expect_text(TokenKind::Sym, ";")?;
        Ok(Stmt::Await {
            line: start.line,
            handle,
        })
    }

    fn parse_spawn(&mut self, handle: Option<String>) -> Result<Stmt, Diagnostic> {
        let kw = self.expect_text(TokenKind::Keyword, "spawn")?;

        if self.at(TokenKind::Sym, "{") {
            let body = self.parse_seq()?;
            self.expect_text(TokenKind::Sym, ";")?;
            return Ok(Stmt::Spawn(Spawn {
                line: kw.line,
                handle,
                target: SpawnTarget::Block {
                    line: kw.line,
                    body: Box::new(body),
                },
            }));
        }

        let (func, args) = self.parse_call()?;
        self.expect_text(TokenKind::Sym, ";")?;
        Ok(Stmt::Spawn(Spawn {
            line: kw.line,
            handle,
            target: SpawnTarget::Call {
                line: kw.line,
                func,
                args,
            },
        }))
    }

    fn parse_call(&mut self) -> Result<(String, Vec<Expr>), Diagnostic> {
        let name = self.expect(TokenKind::Ident, "function name")?.text;
        self.expect_text(TokenKind::Sym, "(")?;

        let mut args = Vec::new();
        if !self.at(TokenKind::Sym, ")") {
            args.push(self.parse_expr()?);
            while self.at(TokenKind::Sym, ",") {
                self.expect_text(TokenKind::Sym, ",")?;
                args.push(self.parse_expr()?);
            }
        }

        self.expect_text(TokenKind::Sym, ")")?;
        Ok((name, args))
    }

    fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        let left = self.parse_operand()?;
        let t = self.peek().clone();

        let logical = t.kind == TokenKind::Keyword && (t.text == "and" || t.text == "or");
        if t.kind == TokenKind::Op || logical {
            self.pos += 1;
            let right = self.parse_operand()?;
            let line = left.line();
            return Ok(match classify_op(&t.text) {
                OpKind::Arith(op) => Expr::Arith {
                    line,
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                OpKind::Rel(op) => Expr::Rel {
                    line,
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            });
        }

        Ok(left)
    }

    fn parse_operand(&mut self) -> Result<Expr, Diagnostic> {
        let t = self.peek().clone();
        match (t.kind, t.text.as_str()) {
            (TokenKind::Number, _) => {
                self.pos += 1;
                match t.text.parse::<i64>() {
                    Ok(value) => Ok(Expr::Num {
                        line: t.line,
                        value,
                    }),
                    Err(_) => Err(Diagnostic::UnexpectedToken {
                        line: t.line,
                        expected: "a 64-bit integer literal".to_owned(),
                        found: describe(&t),
                    }),
                }
            }
            (TokenKind::Keyword, "True") => {
                self.pos += 1;
                Ok(Expr::Bool {
                    line: t.line,
                    value: true,
                })
            }
            (TokenKind::Keyword, "False") => {
                self.pos += 1;
                Ok(Expr::Bool {
                    line: t.line,
                    value: false,
                })
            }
            (TokenKind::Ident, _) => {
                self.pos += 1;
                Ok(Expr::Var {
                    line: t.line,
                    name: t.text.clone(),
                })
            }
            _ => Err(Diagnostic::UnexpectedToken {
                line: t.line,
                expected: "an operand".to_owned(),
                found: describe(&t),
            }),
        }
    }
}
