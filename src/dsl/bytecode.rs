//! Stack-machine instructions and their textual listing form.
//!
//! A listing holds one instruction per line, mnemonic first:
//!
//! ```text
//! FUNC main 0
//! PUSH_INT 1
//! CALL print 1
//! END
//! ```
//!
//! Blank lines and `//` comments are ignored when reading a listing back.

use std::fmt;

use serde::Serialize;

use super::error::{PipelineError, RuntimeFault};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "args", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    // Stack / values
    PushInt(i64),
    PushFloat(f64),
    Load(String),
    Store(String),

    // Arithmetic / logic / comparison
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
    Neg,
    Not,
    /// Widen the int on top of the stack to a float.
    ToFloat,

    // Control
    Label(String),
    Jmp(String),
    JmpIfFalse(String),
    Func { name: String, arity: usize },
    End,
    Call { name: String, argc: usize },
    Ret,
    RetVoid,

    /// Marks an abandoned expression-statement value. The value stays on the stack.
    Nop,
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::PushInt(_) => "PUSH_INT",
            Instruction::PushFloat(_) => "PUSH_FLOAT",
            Instruction::Load(_) => "LOAD",
            Instruction::Store(_) => "STORE",
            Instruction::Add => "ADD",
            Instruction::Sub => "SUB",
            Instruction::Mul => "MUL",
            Instruction::Div => "DIV",
            Instruction::Mod => "MOD",
            Instruction::Eq => "EQ",
            Instruction::Ne => "NE",
            Instruction::Lt => "LT",
            Instruction::Le => "LE",
            Instruction::Gt => "GT",
            Instruction::Ge => "GE",
            Instruction::And => "AND",
            Instruction::Or => "OR",
            Instruction::Neg => "NEG",
            Instruction::Not => "NOT",
            Instruction::ToFloat => "TO_FLOAT",
            Instruction::Label(_) => "LABEL",
            Instruction::Jmp(_) => "JMP",
            Instruction::JmpIfFalse(_) => "JMP_IF_FALSE",
            Instruction::Func { .. } => "FUNC",
            Instruction::End => "END",
            Instruction::Call { .. } => "CALL",
            Instruction::Ret => "RET",
            Instruction::RetVoid => "RET_VOID",
            Instruction::Nop => "NOP",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.mnemonic();
        match self {
            Instruction::PushInt(v) => write!(f, "{op} {v}"),
            // `{:?}` keeps the decimal point on whole floats (2.0, not 2).
            Instruction::PushFloat(v) => write!(f, "{op} {v:?}"),
            Instruction::Load(name)
            | Instruction::Store(name)
            | Instruction::Label(name)
            | Instruction::Jmp(name)
            | Instruction::JmpIfFalse(name) => write!(f, "{op} {name}"),
            Instruction::Func { name, arity } => write!(f, "{op} {name} {arity}"),
            Instruction::Call { name, argc } => write!(f, "{op} {name} {argc}"),
            _ => f.write_str(op),
        }
    }
}

/// Render a program as a listing, one instruction per line.
pub fn to_listing(code: &[Instruction]) -> String {
    let mut out = String::new();
    for instr in code {
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out
}

/// Read a listing back into instructions.
///
/// Unrecognized mnemonics and malformed operands are reported as
/// [`RuntimeFault::UnknownOpcode`], since listings are only ever consumed by the VM.
pub fn parse_listing(text: &str) -> Result<Vec<Instruction>, PipelineError> {
    let mut code = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.split("//").next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let op = parts.next().unwrap_or("");
        let operands: Vec<&str> = parts.collect();
        let instr = parse_instruction(op, &operands)
            .map_err(|detail| RuntimeFault::UnknownOpcode(format!("line {}: {detail}", idx + 1)))?;
        code.push(instr);
    }
    Ok(code)
}

fn parse_instruction(op: &str, operands: &[&str]) -> Result<Instruction, String> {
    let arity = |n: usize| -> Result<(), String> {
        if operands.len() == n {
            Ok(())
        } else {
            Err(format!("{op} takes {n} operand(s), got {}", operands.len()))
        }
    };
    let word = |i: usize| -> String { operands.get(i).map_or_else(String::new, |s| (*s).to_string()) };
    let count = |i: usize| -> Result<usize, String> {
        operands
            .get(i)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| format!("{op} expects a count operand"))
    };

    let simple = match op {
        "ADD" => Some(Instruction::Add),
        "SUB" => Some(Instruction::Sub),
        "MUL" => Some(Instruction::Mul),
        "DIV" => Some(Instruction::Div),
        "MOD" => Some(Instruction::Mod),
        "EQ" => Some(Instruction::Eq),
        "NE" => Some(Instruction::Ne),
        "LT" => Some(Instruction::Lt),
        "LE" => Some(Instruction::Le),
        "GT" => Some(Instruction::Gt),
        "GE" => Some(Instruction::Ge),
        "AND" => Some(Instruction::And),
        "OR" => Some(Instruction::Or),
        "NEG" => Some(Instruction::Neg),
        "NOT" => Some(Instruction::Not),
        "TO_FLOAT" => Some(Instruction::ToFloat),
        "END" => Some(Instruction::End),
        "RET" => Some(Instruction::Ret),
        "RET_VOID" => Some(Instruction::RetVoid),
        "NOP" => Some(Instruction::Nop),
        _ => None,
    };
    if let Some(instr) = simple {
        arity(0)?;
        return Ok(instr);
    }

    match op {
        "PUSH_INT" => {
            arity(1)?;
            word(0)
                .parse()
                .map(Instruction::PushInt)
                .map_err(|_| format!("PUSH_INT expects an integer, got '{}'", word(0)))
        }
        "PUSH_FLOAT" => {
            arity(1)?;
            word(0)
                .parse()
                .map(Instruction::PushFloat)
                .map_err(|_| format!("PUSH_FLOAT expects a number, got '{}'", word(0)))
        }
        "LOAD" => arity(1).map(|()| Instruction::Load(word(0))),
        "STORE" => arity(1).map(|()| Instruction::Store(word(0))),
        "LABEL" => arity(1).map(|()| Instruction::Label(word(0))),
        "JMP" => arity(1).map(|()| Instruction::Jmp(word(0))),
        "JMP_IF_FALSE" => arity(1).map(|()| Instruction::JmpIfFalse(word(0))),
        "FUNC" => {
            arity(2)?;
            Ok(Instruction::Func { name: word(0), arity: count(1)? })
        }
        "CALL" => {
            arity(2)?;
            Ok(Instruction::Call { name: word(0), argc: count(1)? })
        }
        other => Err(format!("'{other}'")),
    }
}
