use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::ast::Location;

/// A compile-time diagnostic with an optional source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl Diagnostic {
    pub fn at(message: impl Into<String>, loc: Location) -> Self {
        Self {
            message: message.into(),
            line: Some(loc.line),
            column: Some(loc.column),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "{} (line {line}, column {col})", self.message),
            (Some(line), None) => write!(f, "{} (line {line})", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

/// Fatal conditions raised while loading or executing bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeFault {
    #[error("program has no 'main' function")]
    MissingMain,
    #[error("unresolved label '{0}'")]
    UnresolvedLabel(String),
    #[error("unresolved call target '{0}'")]
    UnresolvedCall(String),
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),
    #[error("grid access out of bounds at ({x}, {y})")]
    OutOfBounds { x: i64, y: i64 },
    #[error("maze has no start cell")]
    NoStartCell,
    #[error("instruction budget of {limit} exceeded")]
    StepLimitExceeded { limit: u64 },
    #[error("operand stack exceeded {limit} values")]
    StackOverflow { limit: usize },
    #[error("operand stack underflow at instruction {ip}")]
    StackUnderflow { ip: usize },
    #[error("variable '{0}' is not defined")]
    UndefinedVariable(String),
    #[error("division by zero at instruction {ip}")]
    DivisionByZero { ip: usize },
    #[error("{0}")]
    TypeFault(String),
}

impl Serialize for RuntimeFault {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A pipeline failure tagged with the stage that produced it.
///
/// Every stage fails fast on its first violation, so a run yields at most one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "stage", content = "detail", rename_all = "snake_case")]
pub enum PipelineError {
    #[error("Lexer error: {0}")]
    Lexical(Diagnostic),
    #[error("Parser error: {0}")]
    Syntax(Diagnostic),
    #[error("Semantic Analysis Error: {0}")]
    Semantic(Diagnostic),
    #[error("Compiler Error: {0}")]
    Compile(Diagnostic),
    #[error("Runtime Error: {0}")]
    Runtime(RuntimeFault),
}

impl PipelineError {
    pub fn lexical(message: impl Into<String>, loc: Location) -> Self {
        Self::Lexical(Diagnostic::at(message, loc))
    }

    pub fn syntax(message: impl Into<String>, loc: Location) -> Self {
        Self::Syntax(Diagnostic::at(message, loc))
    }

    pub fn semantic(message: impl Into<String>, loc: Location) -> Self {
        Self::Semantic(Diagnostic::at(message, loc))
    }

    pub fn compile(message: impl Into<String>, loc: Location) -> Self {
        Self::Compile(Diagnostic::at(message, loc))
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Lexical(_) => "lexical",
            Self::Syntax(_) => "syntax",
            Self::Semantic(_) => "semantic",
            Self::Compile(_) => "compile",
            Self::Runtime(_) => "runtime",
        }
    }

    /// The diagnostic message without stage prefix or location.
    pub fn message(&self) -> String {
        match self {
            Self::Lexical(d) | Self::Syntax(d) | Self::Semantic(d) | Self::Compile(d) => {
                d.message.clone()
            }
            Self::Runtime(fault) => fault.to_string(),
        }
    }
}

impl From<RuntimeFault> for PipelineError {
    fn from(fault: RuntimeFault) -> Self {
        Self::Runtime(fault)
    }
}
