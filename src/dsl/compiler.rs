use super::ast::*;
use super::builtins::{self, Intrinsic, ParamType};
use super::bytecode::Instruction;
use super::error::PipelineError;
use super::typeck::TypeContext;

/// Translate an analyzed program into a flat instruction sequence.
///
/// Assumes the program already passed semantic analysis; only the structural
/// rules the VM depends on are checked here.
pub fn compile(program: &Program) -> Result<Vec<Instruction>, PipelineError> {
    let mut compiler = Compiler::new();
    for decl in &program.body {
        match decl {
            Decl::Function(f) => compiler.compile_function(f)?,
            Decl::Stmt(other) => {
                return Err(PipelineError::compile(
                    "Top-level statements must be functions",
                    other.loc(),
                ))
            }
        }
    }
    tracing::debug!(instructions = compiler.code.len(), labels = compiler.next_label, "compiled program");
    Ok(compiler.code)
}

struct Compiler {
    code: Vec<Instruction>,
    next_label: u32,
    /// Mirrors the analyzer's scopes so int values bound for float slots can be widened.
    types: TypeContext,
}

type CompileResult = Result<(), PipelineError>;

impl Compiler {
    fn new() -> Self {
        Self {
            code: Vec::new(),
            next_label: 0,
            types: TypeContext::new(),
        }
    }

    fn emit(&mut self, instr: Instruction) {
        self.code.push(instr);
    }

    /// Allocate a program-unique label name.
    fn fresh_label(&mut self) -> String {
        let label = format!("L{}", self.next_label);
        self.next_label += 1;
        label
    }

    fn compile_function(&mut self, f: &FnDecl) -> CompileResult {
        self.emit(Instruction::Func {
            name: f.name.clone(),
            arity: f.params.len(),
        });
        // Arguments arrive on the stack in source order; bind the last one first.
        for p in f.params.iter().rev() {
            self.emit(Instruction::Store(p.name.clone()));
        }
        self.types.enter_function(f)?;
        let body = f.body.iter().try_for_each(|stmt| self.compile_stmt(stmt));
        self.types.leave_function();
        body?;
        self.emit(Instruction::End);
        Ok(())
    }

    fn compile_scoped(&mut self, body: &[Stmt]) -> CompileResult {
        self.types.push_scope();
        let result = body.iter().try_for_each(|s| self.compile_stmt(s));
        self.types.pop_scope();
        result
    }

    /// Compile `expr` for a slot of type `target`, widening an int result to float.
    fn compile_into(&mut self, target: TypeName, expr: &Expr) -> CompileResult {
        self.compile_expr(expr)?;
        if target == TypeName::Float && self.types.check_expr(expr)? == TypeName::Int {
            self.emit(Instruction::ToFloat);
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> CompileResult {
        match stmt {
            Stmt::VarDecl { ty, name, init, loc } => {
                self.compile_into(*ty, init)?;
                self.types.declare(name, *ty, *loc)?;
                self.emit(Instruction::Store(name.clone()));
            }
            Stmt::Assign { name, value, loc } => {
                let target = self.types.lookup(name, *loc)?;
                self.compile_into(target, value)?;
                self.emit(Instruction::Store(name.clone()));
            }
            Stmt::If { test, consequent, .. } => {
                let end = self.fresh_label();
                self.compile_expr(test)?;
                self.emit(Instruction::JmpIfFalse(end.clone()));
                self.compile_scoped(consequent)?;
                self.emit(Instruction::Label(end));
            }
            Stmt::While { test, body, .. } => {
                let start = self.fresh_label();
                let end = self.fresh_label();
                self.emit(Instruction::Label(start.clone()));
                self.compile_expr(test)?;
                self.emit(Instruction::JmpIfFalse(end.clone()));
                self.compile_scoped(body)?;
                self.emit(Instruction::Jmp(start));
                self.emit(Instruction::Label(end));
            }
            Stmt::Return { value, .. } => match value {
                Some(expr) => {
                    let target = self.types.current_return().unwrap_or(TypeName::Void);
                    self.compile_into(target, expr)?;
                    self.emit(Instruction::Ret);
                }
                None => self.emit(Instruction::RetVoid),
            },
            Stmt::Expr(expr) => {
                self.compile_expr(expr)?;
                self.emit(Instruction::Nop);
            }
            Stmt::Block { body, .. } => self.compile_scoped(body)?,
        }
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> CompileResult {
        match &expr.kind {
            ExprKind::IntLit(v) => self.emit(Instruction::PushInt(*v)),
            ExprKind::FloatLit { value, .. } => self.emit(Instruction::PushFloat(*value)),
            ExprKind::BoolLit(b) => self.emit(Instruction::PushInt(i64::from(*b))),
            ExprKind::Ident(name) => self.emit(Instruction::Load(name.clone())),
            ExprKind::BinOp { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(binop_instruction(*op));
            }
            ExprKind::UnaryOp { op, operand } => {
                self.compile_expr(operand)?;
                self.emit(match op {
                    UnaryOp::Neg => Instruction::Neg,
                    UnaryOp::Not => Instruction::Not,
                });
            }
            ExprKind::Call { name, args } => self.compile_call(name, args, expr.loc)?,
        }
        Ok(())
    }

    fn compile_call(&mut self, name: &str, args: &[Expr], loc: Location) -> CompileResult {
        if let Some(builtin) = builtins::lookup_builtin(name) {
            if builtin.is_restricted_navigation() && !args.is_empty() {
                return Err(PipelineError::compile(
                    format!("'{name}' does not take arguments"),
                    loc,
                ));
            }
            if builtin.intrinsic == Some(Intrinsic::Print) && args.len() != 1 {
                return Err(PipelineError::compile(
                    format!("'print' requires exactly one argument, got {}", args.len()),
                    loc,
                ));
            }
        }
        let params = self.types.param_types(name).map(<[ParamType]>::to_vec).unwrap_or_default();
        for (i, arg) in args.iter().enumerate() {
            match params.get(i) {
                Some(ParamType::Exact(ty)) => self.compile_into(*ty, arg)?,
                _ => self.compile_expr(arg)?,
            }
        }
        self.emit(Instruction::Call {
            name: name.to_string(),
            argc: args.len(),
        });
        Ok(())
    }
}

fn binop_instruction(op: BinOp) -> Instruction {
    match op {
        BinOp::Add => Instruction::Add,
        BinOp::Sub => Instruction::Sub,
        BinOp::Mul => Instruction::Mul,
        BinOp::Div => Instruction::Div,
        BinOp::Mod => Instruction::Mod,
        BinOp::Eq => Instruction::Eq,
        BinOp::Ne => Instruction::Ne,
        BinOp::Lt => Instruction::Lt,
        BinOp::Le => Instruction::Le,
        BinOp::Gt => Instruction::Gt,
        BinOp::Ge => Instruction::Ge,
        BinOp::And => Instruction::And,
        BinOp::Or => Instruction::Or,
    }
}
