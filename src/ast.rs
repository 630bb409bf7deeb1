//! Abstract syntax tree for SMALL programs extended with `spawn`/`await`.
//!
//! Every node carries the 1-based source line it came from; the analysis
//! passes use those lines as the sites of variable accesses. Nodes are closed
//! sum types dispatched by pattern match.

use fnv::FnvHashMap;
use std::fmt;

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        })
    }
}

/// Relational and logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
            RelOp::And => "and",
            RelOp::Or => "or",
        })
    }
}

/// Expressions. SMALL expressions are flat: one optional operator over two
/// operands, no parenthesized subexpressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var {
        line: u32,
        name: String,
    },
    Num {
        line: u32,
        value: i64,
    },
    Bool {
        line: u32,
        value: bool,
    },
    Arith {
        line: u32,
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Rel {
        line: u32,
        op: RelOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Source line this expression starts on.
    pub fn line(&self) -> u32 {
        match *self {
            Expr::Var { line, .. }
            | Expr::Num { line, .. }
            | Expr::Bool { line, .. }
            | Expr::Arith { line, .. }
            | Expr::Rel { line, .. } => line,
        }
    }
}

/// What a `spawn` starts: a named function call or an inline block.
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnTarget {
    Call {
        line: u32,
        func: String,
        args: Vec<Expr>,
    },
    Block {
        line: u32,
        body: Box<Stmt>,
    },
}

/// A `spawn` statement, with an optional handle binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Spawn {
    pub line: u32,
    pub handle: Option<String>,
    pub target: SpawnTarget,
}

/// Statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        line: u32,
        target: String,
        expr: Expr,
    },
    AssignCall {
        line: u32,
        target: String,
        func: String,
        args: Vec<Expr>,
    },
    Call {
        line: u32,
        func: String,
        args: Vec<Expr>,
    },
    Spawn(Spawn),
    Await {
        line: u32,
        handle: String,
    },
    If {
        line: u32,
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Box<Stmt>,
    },
    While {
        line: u32,
        cond: Expr,
        body: Box<Stmt>,
    },
    Seq {
        line: u32,
        stmts: Vec<Stmt>,
    },
    Return {
        line: u32,
        expr: Expr,
    },
}

impl Stmt {
    /// Source line this statement starts on.
    pub fn line(&self) -> u32 {
        match *self {
            Stmt::Assign { line, .. }
            | Stmt::AssignCall { line, .. }
            | Stmt::Call { line, .. }
            | Stmt::Await { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::Seq { line, .. }
            | Stmt::Return { line, .. } => line,
            Stmt::Spawn(ref s) => s.line,
        }
    }
}

/// A function definition: name, ordered formal parameters, and a body that is
/// always a `Seq`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Stmt,
    pub line: u32,
}

/// A parsed program: function definitions keyed by their unique names.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: FnvHashMap<String, FunctionDef>,
}

impl Program {
    /// Looks up a function the validator has already resolved.
    pub fn function(&self, name: &str) -> &FunctionDef {
        match self.functions.get(name) {
            Some(f) => f,
            None => panic!("unresolved function `{}` reached the analysis", name),
        }
    }
}
