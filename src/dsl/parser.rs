use super::ast::*;
use super::error::PipelineError;
use super::lexer::{SpannedToken, Token};

/// Parse a token stream into a program, failing on the first structural error.
pub fn parse(tokens: Vec<SpannedToken>) -> Result<Program, PipelineError> {
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program()?;
    tracing::debug!(declarations = program.body.len(), "parsed program");
    Ok(program)
}

/// Parentheses, prefix operators and blocks that may nest inside one another.
const MAX_NESTING: usize = 64;
/// Height an expression tree may reach, counting each chained binary operator.
const MAX_EXPR_HEIGHT: usize = 512;

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    depth: usize,
    height: usize,
}

type ParseResult<T> = Result<T, PipelineError>;

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            height: 0,
        }
    }

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut body = Vec::new();
        while !self.at_eof() {
            let decl = if matches!(self.peek(), Token::Func) {
                Decl::Function(self.parse_function()?)
            } else {
                Decl::Stmt(self.parse_declaration()?)
            };
            body.push(decl);
        }
        Ok(Program { body })
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |t| &t.token)
    }

    fn peek_next(&self) -> &Token {
        self.tokens.get(self.pos + 1).map_or(&Token::Eof, |t| &t.token)
    }

    fn loc(&self) -> Location {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or_else(Location::default, |t| t.loc)
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, expected: &str) -> PipelineError {
        PipelineError::syntax(
            format!("Expected {expected}, got {}", self.peek()),
            self.loc(),
        )
    }

    fn expect(&mut self, expected: &Token) -> ParseResult<Location> {
        if self.peek() == expected {
            let loc = self.loc();
            self.advance();
            Ok(loc)
        } else {
            Err(self.error(&expected.to_string()))
        }
    }

    fn too_deep(&self) -> PipelineError {
        PipelineError::syntax("Nesting too deep", self.loc())
    }

    /// Enter one level of recursive nesting.
    fn enter(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING || self.height >= MAX_EXPR_HEIGHT {
            return Err(self.too_deep());
        }
        self.depth += 1;
        self.height += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
        self.height -= 1;
    }

    fn expect_ident(&mut self, what: &str) -> ParseResult<(String, Location)> {
        if let Token::Ident(name) = self.peek().clone() {
            let loc = self.loc();
            self.advance();
            Ok((name, loc))
        } else {
            Err(self.error(what))
        }
    }

    fn type_keyword(token: &Token) -> Option<TypeName> {
        match token {
            Token::IntTy => Some(TypeName::Int),
            Token::FloatTy => Some(TypeName::Float),
            Token::BoolTy => Some(TypeName::Bool),
            Token::VoidTy => Some(TypeName::Void),
            _ => None,
        }
    }

    fn expect_type(&mut self) -> ParseResult<TypeName> {
        match Self::type_keyword(self.peek()) {
            Some(ty) => {
                self.advance();
                Ok(ty)
            }
            None => Err(self.error("type name")),
        }
    }

    // ── Declarations ───────────────────────────────────────────────

    fn parse_declaration(&mut self) -> ParseResult<Stmt> {
        match self.peek() {
            Token::IntTy | Token::FloatTy | Token::BoolTy => self.parse_var_decl(),
            _ => self.parse_stmt(),
        }
    }

    /// `func type name(type a, type b) { ... }`
    fn parse_function(&mut self) -> ParseResult<FnDecl> {
        let loc = self.expect(&Token::Func)?;
        let return_type = self.expect_type()?;
        let (name, _) = self.expect_ident("function name")?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            loop {
                let ty = self.expect_type()?;
                let (pname, ploc) = self.expect_ident("parameter name")?;
                params.push(Param { ty, name: pname, loc: ploc });
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let body = self.parse_block()?;
        Ok(FnDecl {
            return_type,
            name,
            params,
            body,
            loc,
        })
    }

    /// `type name = expr;`
    fn parse_var_decl(&mut self) -> ParseResult<Stmt> {
        let loc = self.loc();
        let ty = self.expect_type()?;
        let (name, _) = self.expect_ident("variable name")?;
        self.expect(&Token::Eq)?;
        let init = self.parse_expr()?;
        self.expect(&Token::Semicolon)?;
        Ok(Stmt::VarDecl { ty, name, init, loc })
    }

    // ── Statements ─────────────────────────────────────────────────

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        match self.peek() {
            Token::If => {
                let loc = self.loc();
                self.advance();
                let test = self.parse_condition()?;
                let consequent = self.parse_block()?;
                Ok(Stmt::If { test, consequent, loc })
            }
            Token::While => {
                let loc = self.loc();
                self.advance();
                let test = self.parse_condition()?;
                let body = self.parse_block()?;
                Ok(Stmt::While { test, body, loc })
            }
            Token::Return => {
                let loc = self.loc();
                self.advance();
                let value = if matches!(self.peek(), Token::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Return { value, loc })
            }
            Token::LBrace => {
                let loc = self.loc();
                let body = self.parse_block()?;
                Ok(Stmt::Block { body, loc })
            }
            Token::Ident(_) if matches!(self.peek_next(), Token::Eq) => {
                let (name, loc) = self.expect_ident("identifier")?;
                self.advance(); // =
                let value = self.parse_expr()?;
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Assign { name, value, loc })
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// `( expr )` following `if` or `while`.
    fn parse_condition(&mut self) -> ParseResult<Expr> {
        self.expect(&Token::LParen)?;
        let test = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        Ok(test)
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&Token::LBrace)?;
        self.enter()?;
        let mut body = Vec::new();
        while !matches!(self.peek(), Token::RBrace) {
            if self.at_eof() {
                return Err(self.error("'}'"));
            }
            body.push(self.parse_declaration()?);
        }
        self.leave();
        self.expect(&Token::RBrace)?;
        Ok(body)
    }

    // ── Expressions (precedence climbing, lowest first) ────────────

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    /// One left-associative binary level: `next (op next)*`.
    fn parse_binary(
        &mut self,
        op_for: fn(&Token) -> Option<BinOp>,
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut left = next(self)?;
        let base = self.height;
        while let Some(op) = op_for(self.peek()) {
            if self.height >= MAX_EXPR_HEIGHT {
                return Err(self.too_deep());
            }
            self.height += 1;
            self.advance();
            let right = next(self)?;
            let loc = left.loc;
            left = Expr {
                kind: ExprKind::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                loc,
            };
        }
        self.height = base;
        Ok(left)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        self.parse_binary(
            |t| matches!(t, Token::Or).then_some(BinOp::Or),
            Self::parse_and,
        )
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        self.parse_binary(
            |t| matches!(t, Token::And).then_some(BinOp::And),
            Self::parse_equality,
        )
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        self.parse_binary(
            |t| match t {
                Token::EqEq => Some(BinOp::Eq),
                Token::Ne => Some(BinOp::Ne),
                _ => None,
            },
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        self.parse_binary(
            |t| match t {
                Token::Lt => Some(BinOp::Lt),
                Token::Le => Some(BinOp::Le),
                Token::Gt => Some(BinOp::Gt),
                Token::Ge => Some(BinOp::Ge),
                _ => None,
            },
            Self::parse_add,
        )
    }

    fn parse_add(&mut self) -> ParseResult<Expr> {
        self.parse_binary(
            |t| match t {
                Token::Plus => Some(BinOp::Add),
                Token::Minus => Some(BinOp::Sub),
                _ => None,
            },
            Self::parse_mul,
        )
    }

    fn parse_mul(&mut self) -> ParseResult<Expr> {
        self.parse_binary(
            |t| match t {
                Token::Star => Some(BinOp::Mul),
                Token::Slash => Some(BinOp::Div),
                Token::Percent => Some(BinOp::Mod),
                _ => None,
            },
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let expr = self.parse_prefixed();
        self.leave();
        expr
    }

    fn parse_prefixed(&mut self) -> ParseResult<Expr> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        let loc = self.loc();
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr {
            kind: ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            loc,
        })
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let loc = self.loc();
        let kind = match self.peek().clone() {
            Token::Number(raw) => {
                self.advance();
                Self::number_literal(raw, loc)?
            }
            Token::True => {
                self.advance();
                ExprKind::BoolLit(true)
            }
            Token::False => {
                self.advance();
                ExprKind::BoolLit(false)
            }
            Token::Ident(name) => {
                self.advance();
                if matches!(self.peek(), Token::LParen) {
                    let args = self.parse_args()?;
                    ExprKind::Call { name, args }
                } else {
                    ExprKind::Ident(name)
                }
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                return Ok(Expr { kind: inner.kind, loc });
            }
            _ => return Err(self.error("expression")),
        };
        Ok(Expr { kind, loc })
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn number_literal(raw: String, loc: Location) -> ParseResult<ExprKind> {
        if raw.contains('.') {
            let value = raw.parse::<f64>().map_err(|_| {
                PipelineError::syntax(format!("Invalid float literal '{raw}'"), loc)
            })?;
            Ok(ExprKind::FloatLit { value, raw })
        } else {
            let value = raw.parse::<i64>().map_err(|_| {
                PipelineError::syntax(format!("Integer literal '{raw}' is out of range"), loc)
            })?;
            Ok(ExprKind::IntLit(value))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::lexer::lex;

    fn parse_str(s: &str) -> Program {
        let tokens = lex(s).unwrap();
        parse(tokens).unwrap()
    }

    fn parse_err(s: &str) -> String {
        let tokens = lex(s).unwrap();
        match parse(tokens).unwrap_err() {
            PipelineError::Syntax(d) => d.message,
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    fn main_body(program: &Program) -> &[Stmt] {
        match &program.body[0] {
            Decl::Function(f) => &f.body,
            other => panic!("expected function, got {other:?}"),
        }
    }

    fn return_expr(src: &str) -> Expr {
        let program = parse_str(&format!("func int main() {{ return {src}; }}"));
        match &main_body(&program)[0] {
            Stmt::Return { value: Some(e), .. } => e.clone(),
            other => panic!("expected return, got {other:?}"),
        }
    }

    #[test]
    fn parse_function_with_params() {
        let program = parse_str("func float avg(int a, float b) { return b; }");
        let Decl::Function(f) = &program.body[0] else {
            panic!("expected function");
        };
        assert_eq!(f.name, "avg");
        assert_eq!(f.return_type, TypeName::Float);
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[0].ty, TypeName::Int);
        assert_eq!(f.params[1].name, "b");
    }

    #[test]
    fn multiplication_binds_tighter() {
        let expr = return_expr("1 + 2 * 3");
        let ExprKind::BinOp { op, left, right } = expr.kind else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOp::Add);
        assert_eq!(left.kind, ExprKind::IntLit(1));
        assert!(matches!(right.kind, ExprKind::BinOp { op: BinOp::Mul, .. }));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let expr = return_expr("10 - 4 - 3");
        let ExprKind::BinOp { op, left, right } = expr.kind else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOp::Sub);
        assert!(matches!(left.kind, ExprKind::BinOp { op: BinOp::Sub, .. }));
        assert_eq!(right.kind, ExprKind::IntLit(3));
    }

    #[test]
    fn or_is_lowest_precedence() {
        let expr = return_expr("a && b || c == d");
        let ExprKind::BinOp { op, left, right } = expr.kind else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOp::Or);
        assert!(matches!(left.kind, ExprKind::BinOp { op: BinOp::And, .. }));
        assert!(matches!(right.kind, ExprKind::BinOp { op: BinOp::Eq, .. }));
    }

    #[test]
    fn unary_is_prefix_and_nests() {
        let expr = return_expr("!!done");
        let ExprKind::UnaryOp { op: UnaryOp::Not, operand } = expr.kind else {
            panic!("expected unary");
        };
        assert!(matches!(operand.kind, ExprKind::UnaryOp { op: UnaryOp::Not, .. }));
    }

    #[test]
    fn parentheses_override_precedence() {
        let expr = return_expr("(1 + 2) * 3");
        let ExprKind::BinOp { op, left, .. } = expr.kind else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOp::Mul);
        assert!(matches!(left.kind, ExprKind::BinOp { op: BinOp::Add, .. }));
    }

    #[test]
    fn float_literal_keeps_raw_text() {
        let expr = return_expr("1.0");
        assert_eq!(
            expr.kind,
            ExprKind::FloatLit { value: 1.0, raw: "1.0".into() }
        );
    }

    #[test]
    fn assignment_versus_call_statement() {
        let program = parse_str("func void main() { x = 1; move_forward(); }");
        let body = main_body(&program);
        assert!(matches!(&body[0], Stmt::Assign { name, .. } if name == "x"));
        assert!(matches!(
            &body[1],
            Stmt::Expr(Expr { kind: ExprKind::Call { name, args }, .. })
                if name == "move_forward" && args.is_empty()
        ));
    }

    #[test]
    fn control_flow_and_blocks() {
        let program = parse_str(
            "func void main() { while (true) { if (is_wall()) { turn_left(); } { int n = 1; } } }",
        );
        let body = main_body(&program);
        let Stmt::While { body: loop_body, .. } = &body[0] else {
            panic!("expected while");
        };
        assert!(matches!(loop_body[0], Stmt::If { .. }));
        assert!(matches!(&loop_body[1], Stmt::Block { body, .. } if body.len() == 1));
    }

    #[test]
    fn top_level_variable_and_statement() {
        let program = parse_str("int x = 3; x = 4; func void main() { }");
        assert!(matches!(program.body[0], Decl::Stmt(Stmt::VarDecl { ty: TypeName::Int, .. })));
        assert!(matches!(program.body[1], Decl::Stmt(Stmt::Assign { .. })));
        assert!(matches!(program.body[2], Decl::Function(_)));
    }

    #[test]
    fn bare_return() {
        let program = parse_str("func void main() { return; }");
        assert!(matches!(main_body(&program)[0], Stmt::Return { value: None, .. }));
    }

    #[test]
    fn missing_semicolon_names_expected_symbol() {
        let msg = parse_err("func void main() { turn_left() }");
        assert_eq!(msg, "Expected ';', got '}'");
    }

    #[test]
    fn else_branch_is_rejected() {
        let msg = parse_err("func void main() { if (true) { } else { } }");
        assert!(msg.starts_with("Expected ';'"), "{msg}");
    }

    #[test]
    fn unterminated_block_reports_eof() {
        let msg = parse_err("func void main() { turn_left();");
        assert_eq!(msg, "Expected '}', got end of input");
    }

    #[test]
    fn error_carries_line() {
        let tokens = lex("func void main() {\n  int x = ;\n}").unwrap();
        let PipelineError::Syntax(d) = parse(tokens).unwrap_err() else {
            panic!("expected syntax error");
        };
        assert_eq!(d.line, Some(2));
        assert_eq!(d.message, "Expected expression, got ';'");
    }

    #[test]
    fn integer_literal_out_of_range() {
        let msg = parse_err("func int main() { return 99999999999999999999; }");
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn deep_parentheses_fail_cleanly() {
        let depth = 100_000;
        let src = format!("func int main() {{ return {}1{}; }}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse_err(&src), "Nesting too deep");
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let src = format!("func int main() {{ return 1{}; }}", " + 1".repeat(100_000));
        assert_eq!(parse_err(&src), "Nesting too deep");

        let src = format!("func int main() {{ return 1{}; }}", " + 1".repeat(100));
        let program = parse_str(&src);
        assert!(matches!(main_body(&program)[0], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn deep_blocks_and_prefix_chains_fail_cleanly() {
        let src = format!("func void main() {{ {}{} }}", "{".repeat(10_000), "}".repeat(10_000));
        assert_eq!(parse_err(&src), "Nesting too deep");

        let src = format!("func bool main() {{ return {}true; }}", "!".repeat(10_000));
        assert_eq!(parse_err(&src), "Nesting too deep");
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let src = format!("func int main() {{ return {}1{}; }}", "(".repeat(40), ")".repeat(40));
        parse_str(&src);
    }

    #[test]
    fn functions_only_declare_at_top_level() {
        let msg = parse_err("func void main() { func void inner() { } }");
        assert!(msg.starts_with("Expected expression"), "{msg}");
    }
}
