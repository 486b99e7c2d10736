use std::fmt;

use super::ast::Location;
use super::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Raw digits, optionally with a fractional part. The parser decides int vs float.
    Number(String),
    True,
    False,

    // Identifiers & keywords
    Ident(String),
    Func,
    If,
    While,
    Return,

    // Type names
    IntTy,
    FloatTy,
    BoolTy,
    VoidTy,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Le,        // <=
    Ge,        // >=
    EqEq,      // ==
    Ne,        // !=
    And,       // &&
    Or,        // ||
    Bang,      // !
    Eq,        // =

    // Special
    Eof,
}

/// Coarse token classification, as reported in token dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TokenKind {
    Identifier,
    Number,
    Boolean,
    Keyword,
    Operator,
    Symbol,
    EndOfInput,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Ident(_) => TokenKind::Identifier,
            Token::Number(_) => TokenKind::Number,
            Token::True | Token::False => TokenKind::Boolean,
            Token::Func
            | Token::If
            | Token::While
            | Token::Return
            | Token::IntTy
            | Token::FloatTy
            | Token::BoolTy
            | Token::VoidTy => TokenKind::Keyword,
            Token::LParen
            | Token::RParen
            | Token::LBrace
            | Token::RBrace
            | Token::Comma
            | Token::Semicolon => TokenKind::Symbol,
            Token::Eof => TokenKind::EndOfInput,
            _ => TokenKind::Operator,
        }
    }

    /// The source text this token is spelled with.
    pub fn text(&self) -> &str {
        match self {
            Token::Number(raw) | Token::Ident(raw) => raw,
            Token::True => "true",
            Token::False => "false",
            Token::Func => "func",
            Token::If => "if",
            Token::While => "while",
            Token::Return => "return",
            Token::IntTy => "int",
            Token::FloatTy => "float",
            Token::BoolTy => "bool",
            Token::VoidTy => "void",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Le => "<=",
            Token::Ge => ">=",
            Token::EqEq => "==",
            Token::Ne => "!=",
            Token::And => "&&",
            Token::Or => "||",
            Token::Bang => "!",
            Token::Eq => "=",
            Token::Eof => "end of input",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => f.write_str("end of input"),
            other => write!(f, "'{}'", other.text()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub loc: Location,
}

impl SpannedToken {
    pub fn lexeme(&self) -> &str {
        match self.token {
            Token::Eof => "",
            ref other => other.text(),
        }
    }
}

/// Tokenize the whole input, or fail on the first unrecognized character.
pub fn lex(source: &str) -> Result<Vec<SpannedToken>, PipelineError> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize()?;
    tracing::debug!(tokens = lexer.tokens.len(), "lexed source");
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<SpannedToken>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn tokenize(&mut self) -> Result<(), PipelineError> {
        loop {
            self.skip_whitespace_and_comments();
            let Some(ch) = self.peek() else {
                break;
            };
            let loc = self.loc();

            match ch {
                b'(' => self.single(Token::LParen, loc),
                b')' => self.single(Token::RParen, loc),
                b'{' => self.single(Token::LBrace, loc),
                b'}' => self.single(Token::RBrace, loc),
                b',' => self.single(Token::Comma, loc),
                b';' => self.single(Token::Semicolon, loc),
                b'+' => self.single(Token::Plus, loc),
                b'-' => self.single(Token::Minus, loc),
                b'*' => self.single(Token::Star, loc),
                b'/' => self.single(Token::Slash, loc),
                b'%' => self.single(Token::Percent, loc),
                b'<' => self.with_eq(Token::Le, Token::Lt, loc),
                b'>' => self.with_eq(Token::Ge, Token::Gt, loc),
                b'=' => self.with_eq(Token::EqEq, Token::Eq, loc),
                b'!' => self.with_eq(Token::Ne, Token::Bang, loc),
                b'&' | b'|' if self.peek_at(1) == Some(ch) => {
                    self.bump();
                    self.bump();
                    let token = if ch == b'&' { Token::And } else { Token::Or };
                    self.tokens.push(SpannedToken { token, loc });
                }
                b'0'..=b'9' => self.lex_number(loc),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_ident(loc),
                _ => {
                    let bad = self.source[self.pos..].chars().next().unwrap_or('?');
                    return Err(PipelineError::lexical(
                        format!("Unexpected character '{bad}'"),
                        loc,
                    ));
                }
            }
        }

        self.tokens.push(SpannedToken {
            token: Token::Eof,
            loc: self.loc(),
        });
        Ok(())
    }

    fn loc(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    /// Consume one byte, keeping line/column exact.
    fn bump(&mut self) {
        if let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn single(&mut self, token: Token, loc: Location) {
        self.bump();
        self.tokens.push(SpannedToken { token, loc });
    }

    /// One- or two-character operator where the second character is `=`.
    fn with_eq(&mut self, two: Token, one: Token, loc: Location) {
        self.bump();
        let token = if self.peek() == Some(b'=') {
            self.bump();
            two
        } else {
            one
        };
        self.tokens.push(SpannedToken { token, loc });
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.bump();
            } else if b == b'/' && self.peek_at(1) == Some(b'/') {
                while self.peek().is_some_and(|c| c != b'\n') {
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn lex_number(&mut self, loc: Location) {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        // A '.' is part of the number only if a digit follows it.
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let raw = self.source[start..self.pos].to_string();
        self.tokens.push(SpannedToken {
            token: Token::Number(raw),
            loc,
        });
    }

    fn lex_ident(&mut self, loc: Location) {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.bump();
        }
        let word = &self.source[start..self.pos];
        let token = match word {
            "func" => Token::Func,
            "if" => Token::If,
            "while" => Token::While,
            "return" => Token::Return,
            "int" => Token::IntTy,
            "float" => Token::FloatTy,
            "bool" => Token::BoolTy,
            "void" => Token::VoidTy,
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Ident(word.to_string()),
        };
        self.tokens.push(SpannedToken { token, loc });
    }
}
