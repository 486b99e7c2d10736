//! Stack-machine interpreter that drives the agent through the maze.
//!
//! All functions share one global variable store: a recursive call writes the
//! same names its caller reads. This mirrors how the language has always run
//! and is kept on purpose.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use ts_rs::TS;

use super::ast::BinOp;
use super::builtins::{Intrinsic, BUILTINS};
use super::bytecode::Instruction;
use super::error::{PipelineError, RuntimeFault};
use crate::model::{Agent, Cell, Heading, Maze, Position};
use crate::settings::{RunSettings, DEFAULT_HEADING};

/// Runtime value on the operand stack or in the variable store.
///
/// Bools live on the stack as `Int(1)` and `Int(0)`, whether they come from a
/// literal, a comparison or a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn from_bool(b: bool) -> Self {
        Value::Int(i64::from(b))
    }

    /// Zero is falsy; everything else is truthy.
    pub fn truthy(self) -> bool {
        match self {
            Value::Int(i) => i != 0,
            Value::Float(f) => f != 0.0,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            // `{:?}` keeps the decimal point on whole floats.
            Value::Float(x) => write!(f, "{x:?}"),
        }
    }
}

/// Everything a finished run produces.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct RunOutcome {
    /// Initial pose, then one entry per successful move or teleport.
    pub trace: Vec<Position>,
    /// Number of dispatched instructions.
    #[ts(type = "number")]
    pub steps: u64,
    /// `print` output, one line per call.
    pub output: String,
    /// Top of stack when `main` returned a value.
    #[ts(type = "number | null")]
    pub return_value: Option<Value>,
    /// Whether the agent ended on the goal cell.
    pub completed: bool,
    /// Final contents of the shared variable store, in first-write order.
    #[ts(type = "Record<string, number>")]
    pub variables: IndexMap<String, Value>,
    /// The grid after the run, with walked cells cleared.
    #[ts(type = "number[][]")]
    pub maze: Maze,
}

/// Compile-time-free entry point: load `code` and run it to completion.
#[tracing::instrument(skip_all, fields(instructions = code.len()))]
pub fn run(code: &[Instruction], maze: Maze, settings: &RunSettings) -> Result<RunOutcome, PipelineError> {
    let result = Vm::load(code, maze, settings).and_then(Vm::run);
    match &result {
        Ok(outcome) => tracing::info!(
            steps = outcome.steps,
            moves = outcome.trace.len().saturating_sub(1),
            completed = outcome.completed,
            "run finished"
        ),
        Err(e) => tracing::warn!(error = %e, "run faulted"),
    }
    result
}

// ── Linked program ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallTarget {
    Builtin(Intrinsic),
    User(usize),
    Unresolved,
}

/// An instruction with its label and call operands resolved to addresses.
#[derive(Debug, Clone)]
enum Op<'a> {
    Push(Value),
    Load(&'a str),
    Store(&'a str),
    Binary(BinOp),
    Neg,
    Not,
    ToFloat,
    /// LABEL, FUNC and NOP markers.
    Skip,
    Jump { target: Option<usize>, label: &'a str },
    JumpIfFalse { target: Option<usize>, label: &'a str },
    Call { target: CallTarget, name: &'a str },
    /// RET: leaves the produced value on the stack.
    Return,
    /// RET_VOID and END.
    ReturnVoid,
}

/// Resolve labels and call targets once, so execution never searches by name.
fn link(code: &[Instruction]) -> (Vec<Op<'_>>, HashMap<&str, usize>) {
    let mut labels = HashMap::new();
    let mut functions = HashMap::new();
    for (addr, instr) in code.iter().enumerate() {
        match instr {
            Instruction::Label(l) => {
                labels.entry(l.as_str()).or_insert(addr);
            }
            Instruction::Func { name, .. } => {
                functions.entry(name.as_str()).or_insert(addr + 1);
            }
            _ => {}
        }
    }

    let mut calls: HashMap<&str, CallTarget> = functions
        .iter()
        .map(|(name, addr)| (*name, CallTarget::User(*addr)))
        .collect();
    // Intrinsics short-circuit any user function of the same name.
    for b in BUILTINS {
        if let Some(intrinsic) = b.intrinsic {
            calls.insert(b.name, CallTarget::Builtin(intrinsic));
        }
    }

    let ops = code
        .iter()
        .map(|instr| match instr {
            Instruction::PushInt(v) => Op::Push(Value::Int(*v)),
            Instruction::PushFloat(v) => Op::Push(Value::Float(*v)),
            Instruction::Load(name) => Op::Load(name),
            Instruction::Store(name) => Op::Store(name),
            Instruction::Add => Op::Binary(BinOp::Add),
            Instruction::Sub => Op::Binary(BinOp::Sub),
            Instruction::Mul => Op::Binary(BinOp::Mul),
            Instruction::Div => Op::Binary(BinOp::Div),
            Instruction::Mod => Op::Binary(BinOp::Mod),
            Instruction::Eq => Op::Binary(BinOp::Eq),
            Instruction::Ne => Op::Binary(BinOp::Ne),
            Instruction::Lt => Op::Binary(BinOp::Lt),
            Instruction::Le => Op::Binary(BinOp::Le),
            Instruction::Gt => Op::Binary(BinOp::Gt),
            Instruction::Ge => Op::Binary(BinOp::Ge),
            Instruction::And => Op::Binary(BinOp::And),
            Instruction::Or => Op::Binary(BinOp::Or),
            Instruction::Neg => Op::Neg,
            Instruction::Not => Op::Not,
            Instruction::ToFloat => Op::ToFloat,
            Instruction::Label(_) | Instruction::Func { .. } | Instruction::Nop => Op::Skip,
            Instruction::Jmp(label) => Op::Jump {
                target: labels.get(label.as_str()).copied(),
                label,
            },
            Instruction::JmpIfFalse(label) => Op::JumpIfFalse {
                target: labels.get(label.as_str()).copied(),
                label,
            },
            Instruction::Call { name, .. } => Op::Call {
                target: calls.get(name.as_str()).copied().unwrap_or(CallTarget::Unresolved),
                name,
            },
            Instruction::Ret => Op::Return,
            Instruction::RetVoid | Instruction::End => Op::ReturnVoid,
        })
        .collect();
    (ops, functions)
}

// ── Machine ──────────────────────────────────────────────────────

pub struct Vm<'a> {
    ops: Vec<Op<'a>>,
    entry: usize,
    stack: Vec<Value>,
    vars: IndexMap<String, Value>,
    frames: Vec<usize>,
    maze: Maze,
    agent: Agent,
    trace: Vec<Position>,
    output: String,
    steps: u64,
    max_steps: u64,
    max_stack: usize,
}

type Exec<T> = Result<T, RuntimeFault>;

impl<'a> Vm<'a> {
    /// Link the program and place the agent. Fails if there is no `main`.
    pub fn load(code: &'a [Instruction], maze: Maze, settings: &RunSettings) -> Result<Self, PipelineError> {
        let (ops, functions) = link(code);
        let entry = *functions.get("main").ok_or(RuntimeFault::MissingMain)?;
        let agent = Self::start_agent(&maze, settings)?;
        tracing::debug!(entry, functions = functions.len(), x = agent.x, y = agent.y, "vm loaded");
        Ok(Self {
            ops,
            entry,
            stack: Vec::new(),
            vars: IndexMap::new(),
            frames: Vec::new(),
            trace: vec![agent.position()],
            maze,
            agent,
            output: String::new(),
            steps: 0,
            max_steps: settings.max_steps,
            max_stack: settings.max_stack,
        })
    }

    fn start_agent(maze: &Maze, settings: &RunSettings) -> Result<Agent, RuntimeFault> {
        let agent = match settings.start {
            Some(pose) => {
                let heading = Heading::new(pose.dir_x, pose.dir_y).ok_or_else(|| {
                    RuntimeFault::TypeFault(format!(
                        "start heading ({}, {}) is not a unit axis vector",
                        pose.dir_x, pose.dir_y
                    ))
                })?;
                Agent::new(pose.x, pose.y, heading)
            }
            None => {
                let (x, y) = maze.find(Cell::Start).ok_or(RuntimeFault::NoStartCell)?;
                Agent::new(x, y, DEFAULT_HEADING)
            }
        };
        if maze.contains(agent.x, agent.y) {
            Ok(agent)
        } else {
            Err(RuntimeFault::OutOfBounds { x: agent.x, y: agent.y })
        }
    }

    /// Execute from `main` until it returns, the program ends, or a fault occurs.
    pub fn run(mut self) -> Result<RunOutcome, PipelineError> {
        let return_value = self.execute()?;
        let completed = self.maze.get(self.agent.x, self.agent.y) == Some(Cell::Goal);
        Ok(RunOutcome {
            trace: self.trace,
            steps: self.steps,
            output: self.output,
            return_value,
            completed,
            variables: self.vars,
            maze: self.maze,
        })
    }

    fn execute(&mut self) -> Exec<Option<Value>> {
        let mut ip = self.entry;
        while let Some(op) = self.ops.get(ip).cloned() {
            self.steps += 1;
            if self.steps > self.max_steps {
                return Err(RuntimeFault::StepLimitExceeded { limit: self.max_steps });
            }
            let at = ip;
            ip += 1;

            match op {
                Op::Push(v) => self.push(v)?,
                Op::Load(name) => {
                    let v = *self
                        .vars
                        .get(name)
                        .ok_or_else(|| RuntimeFault::UndefinedVariable(name.to_string()))?;
                    self.push(v)?;
                }
                Op::Store(name) => {
                    let v = self.pop(at)?;
                    self.vars.insert(name.to_string(), v);
                }
                Op::Binary(op) => {
                    let b = self.pop(at)?;
                    let a = self.pop(at)?;
                    self.push(binary(op, a, b, at)?)?;
                }
                Op::Neg => {
                    let v = match self.pop(at)? {
                        Value::Int(i) => Value::Int(i.wrapping_neg()),
                        Value::Float(f) => Value::Float(-f),
                    };
                    self.push(v)?;
                }
                Op::Not => {
                    let v = self.pop(at)?;
                    self.push(Value::from_bool(!v.truthy()))?;
                }
                Op::ToFloat => {
                    let v = self.pop(at)?;
                    self.push(Value::Float(v.as_f64()))?;
                }
                Op::Skip => {}
                Op::Jump { target, label } => {
                    ip = target.ok_or_else(|| RuntimeFault::UnresolvedLabel(label.to_string()))?;
                }
                Op::JumpIfFalse { target, label } => {
                    if !self.pop(at)?.truthy() {
                        ip = target
                            .ok_or_else(|| RuntimeFault::UnresolvedLabel(label.to_string()))?;
                    }
                }
                Op::Call { target, name } => match target {
                    CallTarget::Builtin(intrinsic) => {
                        tracing::trace!(name, "intrinsic");
                        self.intrinsic(intrinsic, at)?;
                    }
                    CallTarget::User(addr) => {
                        if self.frames.len() >= self.max_stack {
                            return Err(RuntimeFault::StackOverflow { limit: self.max_stack });
                        }
                        tracing::trace!(name, depth = self.frames.len() + 1, "call");
                        self.frames.push(ip);
                        ip = addr;
                    }
                    CallTarget::Unresolved => {
                        return Err(RuntimeFault::UnresolvedCall(name.to_string()));
                    }
                },
                Op::Return => match self.frames.pop() {
                    Some(ret) => ip = ret,
                    None => return Ok(self.stack.last().copied()),
                },
                Op::ReturnVoid => match self.frames.pop() {
                    Some(ret) => ip = ret,
                    None => return Ok(None),
                },
            }
        }
        Ok(None)
    }

    fn push(&mut self, v: Value) -> Exec<()> {
        if self.stack.len() >= self.max_stack {
            return Err(RuntimeFault::StackOverflow { limit: self.max_stack });
        }
        self.stack.push(v);
        Ok(())
    }

    fn pop(&mut self, ip: usize) -> Exec<Value> {
        self.stack.pop().ok_or(RuntimeFault::StackUnderflow { ip })
    }

    fn pop_coordinate(&mut self, ip: usize) -> Exec<i64> {
        match self.pop(ip)? {
            Value::Int(i) => Ok(i),
            v @ Value::Float(_) => Err(RuntimeFault::TypeFault(format!(
                "teleport expects int coordinates, got {v}"
            ))),
        }
    }

    /// The cell ahead of the agent; looking off the grid is a fault.
    fn cell_ahead(&self) -> Exec<(i64, i64, Cell)> {
        let (x, y) = self.agent.ahead();
        let cell = self.maze.get(x, y).ok_or(RuntimeFault::OutOfBounds { x, y })?;
        Ok((x, y, cell))
    }

    fn intrinsic(&mut self, intrinsic: Intrinsic, ip: usize) -> Exec<()> {
        match intrinsic {
            Intrinsic::MoveForward => {
                let (x, y, cell) = self.cell_ahead()?;
                if cell == Cell::Wall {
                    self.push(Value::from_bool(false))?;
                } else {
                    self.maze.set(self.agent.x, self.agent.y, Cell::Open);
                    self.agent.x = x;
                    self.agent.y = y;
                    self.trace.push(self.agent.position());
                    self.push(Value::from_bool(true))?;
                }
            }
            Intrinsic::TurnLeft => self.agent.heading = self.agent.heading.turned_left(),
            Intrinsic::TurnRight => self.agent.heading = self.agent.heading.turned_right(),
            Intrinsic::IsWall => {
                let (_, _, cell) = self.cell_ahead()?;
                self.push(Value::from_bool(cell == Cell::Wall))?;
            }
            Intrinsic::Completed => {
                let done = self.maze.get(self.agent.x, self.agent.y) == Some(Cell::Goal);
                self.push(Value::from_bool(done))?;
            }
            Intrinsic::Teleport => {
                // The first value popped (the last argument) becomes x.
                let x = self.pop_coordinate(ip)?;
                let y = self.pop_coordinate(ip)?;
                if !self.maze.contains(x, y) {
                    return Err(RuntimeFault::OutOfBounds { x, y });
                }
                self.agent.x = x;
                self.agent.y = y;
                self.trace.push(self.agent.position());
            }
            Intrinsic::Print => {
                let v = self.pop(ip)?;
                self.output.push_str(&v.to_string());
                self.output.push('\n');
            }
        }
        Ok(())
    }
}

/// Apply a binary opcode. Two ints stay integral; any float promotes.
#[allow(clippy::float_cmp)]
fn binary(op: BinOp, a: Value, b: Value, ip: usize) -> Exec<Value> {
    let ints = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some((x, y)),
        _ => None,
    };
    let v = match op {
        BinOp::And => Value::from_bool(a.truthy() && b.truthy()),
        BinOp::Or => Value::from_bool(a.truthy() || b.truthy()),
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            if let Some((x, y)) = ints {
                if matches!(op, BinOp::Div | BinOp::Mod) && y == 0 {
                    return Err(RuntimeFault::DivisionByZero { ip });
                }
                Value::Int(match op {
                    BinOp::Add => x.wrapping_add(y),
                    BinOp::Sub => x.wrapping_sub(y),
                    BinOp::Mul => x.wrapping_mul(y),
                    BinOp::Div => x.wrapping_div(y),
                    _ => x.wrapping_rem(y),
                })
            } else {
                let (x, y) = (a.as_f64(), b.as_f64());
                if matches!(op, BinOp::Div | BinOp::Mod) && y == 0.0 {
                    return Err(RuntimeFault::DivisionByZero { ip });
                }
                Value::Float(match op {
                    BinOp::Add => x + y,
                    BinOp::Sub => x - y,
                    BinOp::Mul => x * y,
                    BinOp::Div => x / y,
                    _ => x % y,
                })
            }
        }
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = match ints {
                Some((x, y)) => x.partial_cmp(&y),
                None => a.as_f64().partial_cmp(&b.as_f64()),
            };
            let result = match op {
                BinOp::Eq => ord == Some(std::cmp::Ordering::Equal),
                BinOp::Ne => ord != Some(std::cmp::Ordering::Equal),
                BinOp::Lt => ord == Some(std::cmp::Ordering::Less),
                BinOp::Le => matches!(ord, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)),
                BinOp::Gt => ord == Some(std::cmp::Ordering::Greater),
                _ => matches!(ord, Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)),
            };
            Value::from_bool(result)
        }
    };
    Ok(v)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::bytecode::parse_listing;
    use crate::dsl::compiler::compile;
    use crate::dsl::lexer::lex;
    use crate::dsl::parser::parse;
    use crate::dsl::typeck::analyze;
    use crate::settings::StartPose;

    /// Start at (1,0) facing down. The path runs down, right twice, then down to the goal.
    fn corridor() -> Maze {
        Maze::new(vec![
            vec![1, 2, 1, 1, 1],
            vec![1, 0, 0, 0, 1],
            vec![1, 1, 1, 0, 1],
            vec![1, 1, 1, 3, 1],
        ])
        .unwrap()
    }

    fn run_with(src: &str, maze: Maze, settings: &RunSettings) -> Result<RunOutcome, PipelineError> {
        let program = parse(lex(src).unwrap()).unwrap();
        analyze(&program).unwrap();
        let code = compile(&program).unwrap();
        run(&code, maze, settings)
    }

    fn run_src(src: &str, maze: Maze) -> RunOutcome {
        run_with(src, maze, &RunSettings::default()).unwrap()
    }

    fn fault(src: &str, maze: Maze) -> RuntimeFault {
        match run_with(src, maze, &RunSettings::default()) {
            Err(PipelineError::Runtime(f)) => f,
            other => panic!("expected runtime fault, got {other:?}"),
        }
    }

    fn pos(x: i64, y: i64, dir_x: i64, dir_y: i64) -> Position {
        Position { x, y, dir_x, dir_y }
    }

    #[test]
    fn main_return_value_is_left_on_stack() {
        let out = run_src("func int main() { return 1+2*3; }", corridor());
        assert_eq!(out.return_value, Some(Value::Int(7)));
        assert_eq!(out.trace, vec![pos(1, 0, 0, 1)]);
    }

    #[test]
    fn walks_corridor_to_goal() {
        let src = "
            func void main() {
                move_forward();
                turn_left();
                move_forward();
                move_forward();
                turn_right();
                move_forward();
                move_forward();
                print(completed());
            }";
        let out = run_src(src, corridor());
        assert_eq!(out.trace, vec![
            pos(1, 0, 0, 1),
            pos(1, 1, 0, 1),
            pos(2, 1, 1, 0),
            pos(3, 1, 1, 0),
            pos(3, 2, 0, 1),
            pos(3, 3, 0, 1),
        ]);
        assert_eq!(out.output, "1\n");
        assert!(out.completed);
        // The start marker was walked off and cleared.
        assert_eq!(out.maze.get(1, 0), Some(Cell::Open));
        assert_eq!(out.maze.get(3, 3), Some(Cell::Goal));
    }

    #[test]
    fn blocked_move_returns_false_without_trace() {
        let maze = Maze::new(vec![vec![1, 2, 1], vec![1, 1, 1]]).unwrap();
        let out = run_src("func void main() { print(move_forward()); print(is_wall()); }", maze);
        assert_eq!(out.output, "0\n1\n");
        assert_eq!(out.trace.len(), 1);
        assert_eq!(out.maze.get(1, 0), Some(Cell::Start));
    }

    #[test]
    fn move_result_matches_trace_growth() {
        let src = "
            func void main() {
                int i = 0;
                while (i < 6) {
                    bool moved = move_forward();
                    print(moved);
                    if (!moved) { turn_left(); }
                    i = i + 1;
                }
            }";
        let out = run_src(src, corridor());
        let moves = out.output.lines().filter(|l| *l == "1").count();
        assert_eq!(out.trace.len(), moves + 1);
        for pair in out.trace.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert_eq!((b.x - a.x).abs() + (b.y - a.y).abs(), 1);
        }
    }

    #[test]
    fn teleport_pops_x_first() {
        let maze = Maze::new(vec![vec![0; 8]; 8]).unwrap();
        let settings = RunSettings {
            start: Some(StartPose { x: 0, y: 0, dir_x: 1, dir_y: 0 }),
            ..RunSettings::default()
        };
        let out = run_with("func void main() { teleport(3, 5); }", maze, &settings).unwrap();
        assert_eq!(out.trace, vec![pos(0, 0, 1, 0), pos(5, 3, 1, 0)]);
    }

    #[test]
    fn teleport_off_grid_faults() {
        let f = fault("func void main() { teleport(0, 40); }", corridor());
        assert_eq!(f, RuntimeFault::OutOfBounds { x: 40, y: 0 });
    }

    #[test]
    fn next_wall_is_unresolved_at_run_time() {
        let f = fault("func void main() { int d = next_wall(); }", corridor());
        assert_eq!(f, RuntimeFault::UnresolvedCall("next_wall".into()));
    }

    #[test]
    fn unresolved_call_only_faults_when_reached() {
        let out = run_src("func void main() { if (false) { int d = next_wall(); } }", corridor());
        assert_eq!(out.trace.len(), 1);
    }

    #[test]
    fn walking_off_the_grid_faults() {
        let maze = Maze::new(vec![vec![0, 2, 0]]).unwrap();
        let f = fault("func void main() { move_forward(); }", maze);
        assert_eq!(f, RuntimeFault::OutOfBounds { x: 1, y: 1 });
    }

    #[test]
    fn user_functions_pass_arguments_and_return() {
        let src = "
            func int sub(int a, int b) { return a - b; }
            func float half(float v) { return v / 2.0; }
            func void main() { print(sub(10, 3)); print(half(5)); }";
        let out = run_src(src, corridor());
        assert_eq!(out.output, "7\n2.5\n");
    }

    #[test]
    fn ints_stored_in_float_slots_divide_as_floats() {
        let src = "
            func float half(float v) { return v / 2; }
            func float whole() { return 3; }
            func void main() {
                float x = 2;
                print(x / 4);
                float y = 0.5;
                y = 7;
                print(y % 2);
                print(half(5));
                print(whole() / 2);
            }";
        let out = run_src(src, corridor());
        assert_eq!(out.output, "0.5\n1.0\n2.5\n1.5\n");
        assert_eq!(out.variables.get("x"), Some(&Value::Float(2.0)));
        assert_eq!(out.variables.get("v"), Some(&Value::Float(5.0)));
    }

    #[test]
    fn whole_floats_keep_their_decimal_point() {
        let out = run_src("func void main() { print(2.0); print(1.5 * 2); print(-0.25); }", corridor());
        assert_eq!(out.output, "2.0\n3.0\n-0.25\n");
    }

    #[test]
    fn variables_are_shared_across_calls() {
        let src = "
            func void set(int n) { }
            func void main() { int n = 1; set(5); print(n); }";
        let out = run_src(src, corridor());
        assert_eq!(out.output, "5\n");
        assert_eq!(out.variables.get("n"), Some(&Value::Int(5)));
    }

    #[test]
    fn recursion_aliases_parameters() {
        // `n` is global, so the caller's `n` is clobbered by the recursive call.
        let src = "
            func int down(int n) {
                if (n == 0) { return 0; }
                int r = down(n - 1);
                return n;
            }
            func void main() { print(down(3)); }";
        let out = run_src(src, corridor());
        assert_eq!(out.output, "0\n");
    }

    #[test]
    fn integer_division_truncates() {
        let out = run_src("func void main() { print(7 / 2); print(-7 % 3); print(7.0 / 2.0); }", corridor());
        assert_eq!(out.output, "3\n-1\n3.5\n");
    }

    #[test]
    fn division_by_zero_faults() {
        let f = fault("func void main() { int z = 0; print(1 / z); }", corridor());
        assert!(matches!(f, RuntimeFault::DivisionByZero { .. }));
    }

    #[test]
    fn widened_variable_compares_numerically() {
        let out = run_src("func void main() { float x = 2; print(x < 2.5); print(x == 2.0); }", corridor());
        assert_eq!(out.output, "1\n1\n");
    }

    #[test]
    fn bools_print_the_same_from_any_source() {
        let src = "
            func void main() {
                bool a = true;
                bool b = 1 < 2;
                print(a);
                print(b);
                print(a == b);
                print(!a);
                print(a && false);
                print(false || b);
                print(is_wall());
            }";
        let out = run_src(src, corridor());
        assert_eq!(out.output, "1\n1\n1\n0\n0\n1\n0\n");
        assert_eq!(out.variables.get("a"), out.variables.get("b"));
    }

    #[test]
    fn infinite_loop_hits_step_budget() {
        let settings = RunSettings { max_steps: 1000, ..RunSettings::default() };
        let err = run_with("func void main() { while (true) { turn_left(); } }", corridor(), &settings)
            .unwrap_err();
        assert_eq!(err, PipelineError::Runtime(RuntimeFault::StepLimitExceeded { limit: 1000 }));
    }

    #[test]
    fn abandoned_values_accumulate_on_stack() {
        let settings = RunSettings { max_stack: 8, ..RunSettings::default() };
        let err = run_with("func void main() { while (true) { is_wall(); } }", corridor(), &settings)
            .unwrap_err();
        assert_eq!(err, PipelineError::Runtime(RuntimeFault::StackOverflow { limit: 8 }));
    }

    #[test]
    fn runaway_recursion_overflows() {
        let settings = RunSettings { max_stack: 16, ..RunSettings::default() };
        let err = run_with("func void f() { f(); } func void main() { f(); }", corridor(), &settings)
            .unwrap_err();
        assert_eq!(err, PipelineError::Runtime(RuntimeFault::StackOverflow { limit: 16 }));
    }

    #[test]
    fn step_count_covers_every_dispatched_opcode() {
        // FUNC is skipped by entry; PUSH_INT, RET = 2 steps.
        let out = run_src("func int main() { return 4; }", corridor());
        assert_eq!(out.steps, 2);
    }

    #[test]
    fn runs_are_deterministic() {
        let src = "
            func void main() {
                int i = 0;
                while (i < 12) {
                    if (!move_forward()) { turn_left(); }
                    i = i + 1;
                }
            }";
        let a = run_src(src, corridor());
        let b = run_src(src, corridor());
        assert_eq!(a, b);
    }

    #[test]
    fn missing_main_is_a_load_fault() {
        let code = parse_listing("FUNC helper 0\nEND\n").unwrap();
        let err = run(&code, corridor(), &RunSettings::default()).unwrap_err();
        assert_eq!(err, PipelineError::Runtime(RuntimeFault::MissingMain));
    }

    #[test]
    fn unresolved_label_faults_when_jumped() {
        let code = parse_listing("FUNC main 0\nJMP L9\nEND\n").unwrap();
        let err = run(&code, corridor(), &RunSettings::default()).unwrap_err();
        assert_eq!(err, PipelineError::Runtime(RuntimeFault::UnresolvedLabel("L9".into())));
    }

    #[test]
    fn undefined_variable_faults() {
        let code = parse_listing("FUNC main 0\nLOAD ghost\nEND\n").unwrap();
        let err = run(&code, corridor(), &RunSettings::default()).unwrap_err();
        assert_eq!(err, PipelineError::Runtime(RuntimeFault::UndefinedVariable("ghost".into())));
    }

    #[test]
    fn running_off_the_end_halts() {
        let code = parse_listing("FUNC main 0\nPUSH_INT 1\nSTORE x\n").unwrap();
        let out = run(&code, corridor(), &RunSettings::default()).unwrap();
        assert_eq!(out.variables.get("x"), Some(&Value::Int(1)));
        assert_eq!(out.return_value, None);
    }

    #[test]
    fn maze_without_start_needs_explicit_pose() {
        let maze = Maze::new(vec![vec![0, 0], vec![0, 3]]).unwrap();
        let f = fault("func void main() { }", maze.clone());
        assert_eq!(f, RuntimeFault::NoStartCell);

        let settings = RunSettings {
            start: Some(StartPose { x: 1, y: 0, dir_x: 0, dir_y: 1 }),
            ..RunSettings::default()
        };
        let out = run_with("func void main() { move_forward(); }", maze, &settings).unwrap();
        assert!(out.completed);
    }

    #[test]
    fn outcome_serializes_plain_values() {
        let out = run_src("func int main() { float f = 1.5; bool b = true == true; return 2; }", corridor());
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["return_value"], 2);
        assert_eq!(json["variables"]["f"], 1.5);
        assert_eq!(json["variables"]["b"], 1);
        assert_eq!(json["trace"][0]["dir_y"], 1);
        assert_eq!(json["maze"][0][1], 2);
    }
}
