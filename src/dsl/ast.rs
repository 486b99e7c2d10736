//! AST node types for the maze DSL.

use std::fmt;

/// 1-based source position of the token that starts a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A complete program: the ordered top-level declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Decl>,
}

/// A top-level declaration. Functions only appear here, never inside a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Function(FnDecl),
    Stmt(Stmt),
}

impl Decl {
    pub fn loc(&self) -> Location {
        match self {
            Decl::Function(f) => f.loc,
            Decl::Stmt(s) => s.loc(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Int,
    Float,
    Bool,
    Void,
}

impl TypeName {
    pub fn is_numeric(self) -> bool {
        matches!(self, TypeName::Int | TypeName::Float)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            TypeName::Int => "int",
            TypeName::Float => "float",
            TypeName::Bool => "bool",
            TypeName::Void => "void",
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeName,
    pub name: String,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub return_type: TypeName,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDecl {
        ty: TypeName,
        name: String,
        init: Expr,
        loc: Location,
    },
    Assign {
        name: String,
        value: Expr,
        loc: Location,
    },
    /// Single-branch only; the language has no `else`.
    If {
        test: Expr,
        consequent: Vec<Stmt>,
        loc: Location,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        loc: Location,
    },
    Return {
        value: Option<Expr>,
        loc: Location,
    },
    Expr(Expr),
    Block {
        body: Vec<Stmt>,
        loc: Location,
    },
}

impl Stmt {
    pub fn loc(&self) -> Location {
        match self {
            Stmt::VarDecl { loc, .. }
            | Stmt::Assign { loc, .. }
            | Stmt::If { loc, .. }
            | Stmt::While { loc, .. }
            | Stmt::Return { loc, .. }
            | Stmt::Block { loc, .. } => *loc,
            Stmt::Expr(e) => e.loc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLit(i64),
    /// The raw text is kept so `1.0` stays a float literal.
    FloatLit { value: f64, raw: String },
    BoolLit(bool),
    Ident(String),
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}
