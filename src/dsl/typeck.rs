//! Semantic analysis: scope resolution, type checking, and return completeness.
//!
//! This is a validation pass only. It walks the AST once, in source order, so a
//! function must be declared before the first call to it (self-recursion is fine).

use std::collections::HashMap;

use super::ast::*;
use super::builtins::{ParamType, BUILTINS};
use super::error::PipelineError;

/// Signature entry in the flat function table.
#[derive(Debug, Clone)]
struct Signature {
    ret: TypeName,
    params: Vec<ParamType>,
}

/// Validate a parsed program. Fails on the first semantic violation.
pub fn analyze(program: &Program) -> Result<(), PipelineError> {
    let mut ctx = TypeContext::new();
    for decl in &program.body {
        match decl {
            Decl::Function(f) => ctx.check_function(f)?,
            Decl::Stmt(stmt) => ctx.check_stmt(stmt)?,
        }
    }
    tracing::debug!(functions = ctx.functions.len(), "semantic analysis passed");
    Ok(())
}

/// `value` may be stored into a slot of type `target`.
pub fn compatible(target: TypeName, value: TypeName) -> bool {
    target == value || (target == TypeName::Float && value == TypeName::Int)
}

/// Conservative completeness: an `if` never completes, a `while` only when its
/// test is the literal `true` and its body completes.
pub fn block_returns(body: &[Stmt]) -> bool {
    body.iter().any(stmt_returns)
}

fn stmt_returns(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return { .. } => true,
        Stmt::Block { body, .. } => block_returns(body),
        Stmt::While { test, body, .. } => {
            matches!(test.kind, ExprKind::BoolLit(true)) && block_returns(body)
        }
        _ => false,
    }
}

/// Scopes and signatures seen so far. The compiler replays the same walk to
/// learn the static type of an expression.
pub(super) struct TypeContext {
    scopes: Vec<HashMap<String, TypeName>>,
    functions: HashMap<String, Signature>,
    /// Declared return type of the function being checked, if any.
    current_return: Option<TypeName>,
}

type CheckResult<T> = Result<T, PipelineError>;

impl TypeContext {
    pub(super) fn new() -> Self {
        let functions = BUILTINS
            .iter()
            .map(|b| {
                let sig = Signature {
                    ret: b.ret,
                    params: b.params.iter().map(|(_, p)| *p).collect(),
                };
                (b.name.to_string(), sig)
            })
            .collect();
        Self {
            scopes: vec![HashMap::new()],
            functions,
            current_return: None,
        }
    }

    // ── Scopes ─────────────────────────────────────────────────────

    pub(super) fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub(super) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub(super) fn declare(&mut self, name: &str, ty: TypeName, loc: Location) -> CheckResult<()> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(PipelineError::semantic("No active scope", loc));
        };
        if scope.contains_key(name) {
            return Err(PipelineError::semantic(
                format!("Variable '{name}' already declared in this scope"),
                loc,
            ));
        }
        scope.insert(name.to_string(), ty);
        Ok(())
    }

    pub(super) fn lookup(&self, name: &str, loc: Location) -> CheckResult<TypeName> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .ok_or_else(|| {
                PipelineError::semantic(format!("Undeclared variable '{name}'"), loc)
            })
    }

    fn check_block(&mut self, body: &[Stmt]) -> CheckResult<()> {
        self.push_scope();
        let result = body.iter().try_for_each(|s| self.check_stmt(s));
        self.pop_scope();
        result
    }

    // ── Statements ─────────────────────────────────────────────────

    fn check_stmt(&mut self, stmt: &Stmt) -> CheckResult<()> {
        match stmt {
            Stmt::VarDecl { ty, name, init, loc } => {
                let value_ty = self.check_expr(init)?;
                if !compatible(*ty, value_ty) {
                    return Err(PipelineError::semantic(
                        format!("Type mismatch: cannot initialize {ty} variable '{name}' with {value_ty}"),
                        *loc,
                    ));
                }
                self.declare(name, *ty, *loc)
            }
            Stmt::Assign { name, value, loc } => {
                let target = self.lookup(name, *loc)?;
                let value_ty = self.check_expr(value)?;
                if !compatible(target, value_ty) {
                    return Err(PipelineError::semantic(
                        format!("Type mismatch: cannot assign {value_ty} to {target} variable '{name}'"),
                        *loc,
                    ));
                }
                Ok(())
            }
            Stmt::If { test, consequent, .. } => {
                self.check_condition(test, "if")?;
                self.check_block(consequent)
            }
            Stmt::While { test, body, .. } => {
                self.check_condition(test, "while")?;
                self.check_block(body)
            }
            Stmt::Return { value, loc } => self.check_return(value.as_ref(), *loc),
            Stmt::Expr(expr) => self.check_expr(expr).map(|_| ()),
            Stmt::Block { body, .. } => self.check_block(body),
        }
    }

    fn check_function(&mut self, f: &FnDecl) -> CheckResult<()> {
        if self.functions.contains_key(&f.name) {
            return Err(PipelineError::semantic(
                format!("Function '{}' already declared", f.name),
                f.loc,
            ));
        }
        let result = self
            .enter_function(f)
            .and_then(|()| f.body.iter().try_for_each(|s| self.check_stmt(s)));
        self.leave_function();
        result?;

        if f.return_type != TypeName::Void && !block_returns(&f.body) {
            return Err(PipelineError::semantic(
                format!("Function '{}' must return on all paths", f.name),
                f.loc,
            ));
        }
        Ok(())
    }

    /// Register `f`'s signature, then open its scope with the parameters bound.
    /// The signature goes in first so the body may call itself.
    pub(super) fn enter_function(&mut self, f: &FnDecl) -> CheckResult<()> {
        self.functions.insert(
            f.name.clone(),
            Signature {
                ret: f.return_type,
                params: f.params.iter().map(|p| ParamType::Exact(p.ty)).collect(),
            },
        );
        self.push_scope();
        self.current_return = Some(f.return_type);
        for p in &f.params {
            if p.ty == TypeName::Void {
                return Err(PipelineError::semantic(
                    format!("Parameter '{}' cannot have type void", p.name),
                    p.loc,
                ));
            }
            self.declare(&p.name, p.ty, p.loc)?;
        }
        Ok(())
    }

    pub(super) fn leave_function(&mut self) {
        self.current_return = None;
        self.pop_scope();
    }

    pub(super) fn current_return(&self) -> Option<TypeName> {
        self.current_return
    }

    /// Declared parameter types of a known function.
    pub(super) fn param_types(&self, name: &str) -> Option<&[ParamType]> {
        self.functions.get(name).map(|sig| sig.params.as_slice())
    }

    fn check_condition(&mut self, test: &Expr, construct: &str) -> CheckResult<()> {
        let ty = self.check_expr(test)?;
        if ty == TypeName::Bool {
            Ok(())
        } else {
            Err(PipelineError::semantic(
                format!("Condition of '{construct}' must be bool, got {ty}"),
                test.loc,
            ))
        }
    }

    fn check_return(&mut self, value: Option<&Expr>, loc: Location) -> CheckResult<()> {
        let Some(expected) = self.current_return else {
            return Err(PipelineError::semantic("'return' outside of a function", loc));
        };
        let actual = match value {
            Some(expr) => self.check_expr(expr)?,
            None => TypeName::Void,
        };
        let ok = if expected == TypeName::Void || actual == TypeName::Void {
            expected == actual
        } else {
            compatible(expected, actual)
        };
        if ok {
            Ok(())
        } else {
            Err(PipelineError::semantic(
                format!("Return type mismatch: expected {expected}, got {actual}"),
                loc,
            ))
        }
    }

    // ── Expressions ────────────────────────────────────────────────

    /// Type of `expr` in the current scope.
    pub(super) fn check_expr(&mut self, expr: &Expr) -> CheckResult<TypeName> {
        let loc = expr.loc;
        match &expr.kind {
            ExprKind::IntLit(_) => Ok(TypeName::Int),
            ExprKind::FloatLit { .. } => Ok(TypeName::Float),
            ExprKind::BoolLit(_) => Ok(TypeName::Bool),
            ExprKind::Ident(name) => self.lookup(name, loc),
            ExprKind::BinOp { op, left, right } => {
                let lt = self.check_expr(left)?;
                let rt = self.check_expr(right)?;
                Self::binop_type(*op, lt, rt, loc)
            }
            ExprKind::UnaryOp { op, operand } => {
                let ty = self.check_expr(operand)?;
                match op {
                    UnaryOp::Neg if ty.is_numeric() => Ok(ty),
                    UnaryOp::Neg => Err(PipelineError::semantic(
                        format!("Unary '-' requires a numeric operand, got {ty}"),
                        loc,
                    )),
                    UnaryOp::Not if ty == TypeName::Bool => Ok(TypeName::Bool),
                    UnaryOp::Not => Err(PipelineError::semantic(
                        format!("Unary '!' requires a bool operand, got {ty}"),
                        loc,
                    )),
                }
            }
            ExprKind::Call { name, args } => self.check_call(name, args, loc),
        }
    }

    fn binop_type(op: BinOp, lt: TypeName, rt: TypeName, loc: Location) -> CheckResult<TypeName> {
        let sym = op.symbol();
        if lt == TypeName::Void || rt == TypeName::Void {
            return Err(PipelineError::semantic(
                format!("Operator '{sym}' cannot be applied to a void value"),
                loc,
            ));
        }
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    return Err(PipelineError::semantic(
                        format!("Operator '{sym}' requires numeric operands, got {lt} and {rt}"),
                        loc,
                    ));
                }
                if lt == TypeName::Float || rt == TypeName::Float {
                    Ok(TypeName::Float)
                } else {
                    Ok(TypeName::Int)
                }
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if lt == rt {
                    Ok(TypeName::Bool)
                } else {
                    Err(PipelineError::semantic(
                        format!("Operator '{sym}' requires operands of the same type, got {lt} and {rt}"),
                        loc,
                    ))
                }
            }
            BinOp::And | BinOp::Or => {
                if lt == TypeName::Bool && rt == TypeName::Bool {
                    Ok(TypeName::Bool)
                } else {
                    Err(PipelineError::semantic(
                        format!("Operator '{sym}' requires bool operands, got {lt} and {rt}"),
                        loc,
                    ))
                }
            }
        }
    }

    fn check_call(&mut self, name: &str, args: &[Expr], loc: Location) -> CheckResult<TypeName> {
        let Some(sig) = self.functions.get(name).cloned() else {
            return Err(PipelineError::semantic(
                format!("Undeclared function '{name}'"),
                loc,
            ));
        };
        if args.len() != sig.params.len() {
            return Err(PipelineError::semantic(
                format!(
                    "Function '{name}' expects {} argument(s), got {}",
                    sig.params.len(),
                    args.len()
                ),
                loc,
            ));
        }
        for (i, (arg, param)) in args.iter().zip(&sig.params).enumerate() {
            let ty = self.check_expr(arg)?;
            let ok = match param {
                ParamType::Exact(expected) => compatible(*expected, ty),
                ParamType::Any => ty != TypeName::Void,
            };
            if !ok {
                let expected = match param {
                    ParamType::Exact(t) => t.keyword(),
                    ParamType::Any => "a value",
                };
                return Err(PipelineError::semantic(
                    format!("Argument {} of '{name}': expected {expected}, got {ty}", i + 1),
                    arg.loc,
                ));
            }
        }
        Ok(sig.ret)
    }
}
