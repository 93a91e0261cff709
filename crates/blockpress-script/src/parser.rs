//! Recursive-descent parser from tokens to [`ast`](crate::ast).
//!
//! Trivia is dropped up front, but each remaining token remembers whether a
//! line break preceded it; that is all automatic semicolon insertion needs.
//! A top-level `return` is accepted and ends the script with its value.

use std::rc::Rc;

use crate::ast::{
    BinaryOp, DeclKind, Expr, FunctionBody, FunctionDef, LogicalOp, Program, Stmt, TemplatePart,
    UnaryOp,
};
use crate::error::ScriptError;
use crate::lexer::{TokenKind, lex};
use crate::value::number_to_string;

/// Bound on syntactic nesting so hostile input cannot exhaust the stack.
const MAX_NESTING: usize = 64;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "false", "finally", "for", "function", "if", "import", "in",
    "instanceof", "let", "new", "null", "return", "super", "switch", "this", "throw", "true",
    "try", "typeof", "var", "void", "while", "with", "yield",
];

const UNSUPPORTED: &[&str] = &[
    "class", "switch", "import", "export", "with", "debugger", "async", "await", "yield",
];

#[derive(Debug, Clone, Copy)]
struct Tok<'a> {
    kind: TokenKind,
    text: &'a str,
    offset: usize,
    newline_before: bool,
}

/// Parse a whole script.
pub fn parse(source: &str) -> Result<Program, ScriptError> {
    let mut parser = Parser::new(source, 0)?;
    let mut body = Vec::new();
    while !parser.at_end() {
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

/// Parse a standalone expression; `base` offsets error positions.
fn parse_expression(source: &str, base: usize) -> Result<Expr, ScriptError> {
    let mut parser = Parser::new(source, base)?;
    let expr = parser.expression()?;
    if !parser.at_end() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: Vec<Tok<'a>>,
    pos: usize,
    depth: usize,
    loops: usize,
    end_offset: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, base: usize) -> Result<Self, ScriptError> {
        let mut tokens = Vec::new();
        let mut newline_before = false;
        for token in lex(source) {
            match token.kind {
                TokenKind::Newline => newline_before = true,
                TokenKind::BlockComment if token.text.contains('\n') => newline_before = true,
                kind if kind.is_trivia() => {}
                TokenKind::Unknown => {
                    return Err(ScriptError::syntax(
                        "Invalid or unexpected token",
                        base + token.span.start,
                    ));
                }
                kind => {
                    tokens.push(Tok {
                        kind,
                        text: token.text,
                        offset: base + token.span.start,
                        newline_before,
                    });
                    newline_before = false;
                }
            }
        }
        Ok(Self {
            tokens,
            pos: 0,
            depth: 0,
            loops: 0,
            end_offset: base + source.len(),
        })
    }

    // ---- token helpers ----

    fn peek(&self) -> Option<Tok<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn nth(&self, n: usize) -> Option<Tok<'a>> {
        self.tokens.get(self.pos + n).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn nth_is_punct(&self, n: usize, punct: &str) -> bool {
        matches!(self.nth(n), Some(t) if t.kind == TokenKind::Punct && t.text == punct)
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.nth_is_punct(0, punct)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::Ident && t.text == keyword)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), ScriptError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn offset(&self) -> usize {
        self.peek().map(|t| t.offset).unwrap_or(self.end_offset)
    }

    fn unexpected(&self) -> ScriptError {
        match self.peek() {
            Some(t) => ScriptError::syntax(format!("Unexpected token '{}'", t.text), t.offset),
            None => ScriptError::syntax("Unexpected end of input", self.end_offset),
        }
    }

    fn identifier(&mut self) -> Result<String, ScriptError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident && !RESERVED.contains(&t.text) => {
                self.pos += 1;
                Ok(t.text.to_string())
            }
            _ => Err(self.unexpected()),
        }
    }

    fn enter(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            Err(ScriptError::syntax("Nesting too deep", self.offset()))
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn at_statement_end(&self) -> bool {
        self.at_end()
            || self.at_punct(";")
            || self.at_punct("}")
            || self.peek().is_some_and(|t| t.newline_before)
    }

    /// Consume a `;`, or accept its automatic insertion.
    fn semicolon(&mut self) -> Result<(), ScriptError> {
        if self.eat_punct(";") || self.at_statement_end() {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        self.enter()?;
        let stmt = self.statement_inner();
        self.leave();
        stmt
    }

    fn statement_inner(&mut self) -> Result<Stmt, ScriptError> {
        let Some(tok) = self.peek() else {
            return Err(self.unexpected());
        };

        if tok.kind == TokenKind::Punct {
            match tok.text {
                "{" => return Ok(Stmt::Block(self.block()?)),
                ";" => {
                    self.pos += 1;
                    return Ok(Stmt::Empty);
                }
                _ => {}
            }
        }

        if tok.kind == TokenKind::Ident {
            match tok.text {
                "let" | "const" | "var" => {
                    let stmt = self.declaration()?;
                    self.semicolon()?;
                    return Ok(stmt);
                }
                "if" => return self.if_statement(),
                "while" => {
                    self.pos += 1;
                    let cond = self.parenthesized()?;
                    let body = Box::new(self.loop_body()?);
                    return Ok(Stmt::While { cond, body });
                }
                "do" => {
                    self.pos += 1;
                    let body = Box::new(self.loop_body()?);
                    if !self.eat_keyword("while") {
                        return Err(self.unexpected());
                    }
                    let cond = self.parenthesized()?;
                    self.eat_punct(";");
                    return Ok(Stmt::DoWhile { body, cond });
                }
                "for" => return self.for_statement(),
                "function" => {
                    self.pos += 1;
                    return Ok(Stmt::Function(self.function_rest(true)?));
                }
                "return" => {
                    self.pos += 1;
                    let value = if self.at_statement_end() {
                        None
                    } else {
                        Some(self.expression()?)
                    };
                    self.semicolon()?;
                    return Ok(Stmt::Return(value));
                }
                "break" | "continue" => {
                    if self.loops == 0 {
                        return Err(ScriptError::syntax(
                            format!("Illegal {} statement", tok.text),
                            tok.offset,
                        ));
                    }
                    self.pos += 1;
                    self.semicolon()?;
                    return Ok(if tok.text == "break" {
                        Stmt::Break
                    } else {
                        Stmt::Continue
                    });
                }
                "throw" => {
                    self.pos += 1;
                    if self.peek().is_none_or(|t| t.newline_before) {
                        return Err(ScriptError::syntax("Illegal newline after throw", tok.offset));
                    }
                    let value = self.expression()?;
                    self.semicolon()?;
                    return Ok(Stmt::Throw(value));
                }
                "try" => return self.try_statement(),
                text if UNSUPPORTED.contains(&text) => {
                    return Err(ScriptError::syntax(
                        format!("'{text}' is not supported"),
                        tok.offset,
                    ));
                }
                _ => {}
            }
        }

        let expr = self.expression()?;
        self.semicolon()?;
        Ok(Stmt::Expr(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.at_punct("}") {
            if self.at_end() {
                return Err(self.unexpected());
            }
            body.push(self.statement()?);
        }
        self.pos += 1;
        Ok(body)
    }

    fn parenthesized(&mut self) -> Result<Expr, ScriptError> {
        self.expect_punct("(")?;
        let expr = self.expression()?;
        self.expect_punct(")")?;
        Ok(expr)
    }

    fn loop_body(&mut self) -> Result<Stmt, ScriptError> {
        self.loops += 1;
        let body = self.statement();
        self.loops -= 1;
        body
    }

    fn decl_kind(&self) -> Option<DeclKind> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident => match t.text {
                "let" => Some(DeclKind::Let),
                "const" => Some(DeclKind::Const),
                "var" => Some(DeclKind::Var),
                _ => None,
            },
            _ => None,
        }
    }

    fn declaration(&mut self) -> Result<Stmt, ScriptError> {
        let Some(kind) = self.decl_kind() else {
            return Err(self.unexpected());
        };
        self.pos += 1;

        let mut decls = Vec::new();
        loop {
            let offset = self.offset();
            let name = self.identifier()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            if kind == DeclKind::Const && init.is_none() {
                return Err(ScriptError::syntax(
                    "Missing initializer in const declaration",
                    offset,
                ));
            }
            decls.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(Stmt::Declare { kind, decls })
    }

    fn if_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.pos += 1;
        let cond = self.parenthesized()?;
        let then = Box::new(self.statement()?);
        let otherwise = if self.eat_keyword("else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.pos += 1;
        self.expect_punct("(")?;

        if let Some(kind) = self.decl_kind()
            && matches!(self.nth(1), Some(t) if t.kind == TokenKind::Ident)
            && matches!(self.nth(2), Some(t) if t.kind == TokenKind::Ident && t.text == "of")
        {
            self.pos += 1;
            let name = self.identifier()?;
            self.pos += 1;
            let iterable = self.assignment()?;
            self.expect_punct(")")?;
            let body = Box::new(self.loop_body()?);
            return Ok(Stmt::ForOf {
                kind,
                name,
                iterable,
                body,
            });
        }

        let init = if self.at_punct(";") {
            None
        } else if self.decl_kind().is_some() {
            Some(Box::new(self.declaration()?))
        } else {
            Some(Box::new(Stmt::Expr(self.expression()?)))
        };
        self.expect_punct(";")?;
        let cond = if self.at_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.at_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.loop_body()?);
        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
        })
    }

    fn try_statement(&mut self) -> Result<Stmt, ScriptError> {
        let offset = self.offset();
        self.pos += 1;
        let block = self.block()?;

        let mut param = None;
        let mut handler = None;
        if self.eat_keyword("catch") {
            if self.eat_punct("(") {
                param = Some(self.identifier()?);
                self.expect_punct(")")?;
            }
            handler = Some(self.block()?);
        }
        let finalizer = if self.eat_keyword("finally") {
            Some(self.block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(ScriptError::syntax("Missing catch or finally after try", offset));
        }
        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    /// Everything after the `function` keyword.
    fn function_rest(&mut self, require_name: bool) -> Result<Rc<FunctionDef>, ScriptError> {
        let name = if matches!(self.peek(), Some(t) if t.kind == TokenKind::Ident) {
            Some(self.identifier()?)
        } else if require_name {
            return Err(self.unexpected());
        } else {
            None
        };
        let params = self.params()?;
        let body = self.function_block()?;
        Ok(Rc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
        }))
    }

    /// A function body: loops outside it do not make `break` legal inside.
    fn function_block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        let outer_loops = std::mem::replace(&mut self.loops, 0);
        let body = self.block();
        self.loops = outer_loops;
        body
    }

    fn params(&mut self) -> Result<Vec<String>, ScriptError> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.at_punct(")") {
            params.push(self.identifier()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(params)
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ScriptError> {
        self.enter()?;
        let expr = self.assignment_inner();
        self.leave();
        expr
    }

    fn assignment_inner(&mut self) -> Result<Expr, ScriptError> {
        if self.arrow_ahead() {
            return self.arrow();
        }

        let offset = self.offset();
        let target = self.conditional()?;
        let op = match self.peek() {
            Some(t) if t.kind == TokenKind::Punct => match t.text {
                "=" => Some(None),
                "+=" => Some(Some(BinaryOp::Add)),
                "-=" => Some(Some(BinaryOp::Sub)),
                "*=" => Some(Some(BinaryOp::Mul)),
                "/=" => Some(Some(BinaryOp::Div)),
                "%=" => Some(Some(BinaryOp::Rem)),
                "**=" => Some(Some(BinaryOp::Pow)),
                _ => None,
            },
            _ => None,
        };
        let Some(op) = op else {
            return Ok(target);
        };

        check_assignable(&target, "Invalid left-hand side in assignment", offset)?;
        self.pos += 1;
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// `x =>` or a parenthesised list whose closing paren is followed by `=>`.
    fn arrow_ahead(&self) -> bool {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident && !RESERVED.contains(&t.text) => {
                self.nth_is_punct(1, "=>")
            }
            Some(t) if t.kind == TokenKind::Punct && t.text == "(" => {
                let mut depth = 0usize;
                for (i, tok) in self.tokens[self.pos..].iter().enumerate() {
                    if tok.kind != TokenKind::Punct {
                        continue;
                    }
                    match tok.text {
                        "(" => depth += 1,
                        ")" => {
                            depth -= 1;
                            if depth == 0 {
                                return self.nth_is_punct(i + 1, "=>");
                            }
                        }
                        _ => {}
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn arrow(&mut self) -> Result<Expr, ScriptError> {
        let params = if self.at_punct("(") {
            self.params()?
        } else {
            vec![self.identifier()?]
        };
        self.expect_punct("=>")?;
        let body = if self.at_punct("{") {
            FunctionBody::Block(self.function_block()?)
        } else {
            FunctionBody::Expr(Box::new(self.assignment()?))
        };
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
        })))
    }

    fn conditional(&mut self) -> Result<Expr, ScriptError> {
        let cond = self.logical_or()?;
        if !self.eat_punct("?") {
            return Ok(cond);
        }
        let then = self.assignment()?;
        self.expect_punct(":")?;
        let otherwise = self.assignment()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn logical_or(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.logical_and()?;
        loop {
            let op = if self.eat_punct("||") {
                LogicalOp::Or
            } else if self.eat_punct("??") {
                LogicalOp::Nullish
            } else {
                break;
            };
            let right = self.logical_and()?;
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.equality()?;
        while self.eat_punct("&&") {
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// One left-associative precedence level.
    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ScriptError>,
    ) -> Result<Expr, ScriptError> {
        let mut left = next(self)?;
        loop {
            let op = match self.peek() {
                Some(t) if t.kind == TokenKind::Punct => ops
                    .iter()
                    .find(|(text, _)| *text == t.text)
                    .map(|(_, op)| *op),
                _ => None,
            };
            let Some(op) = op else {
                break;
            };
            self.pos += 1;
            let right = next(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNe),
                ("==", BinaryOp::LooseEq),
                ("!=", BinaryOp::LooseNe),
            ],
            Self::relational,
        )
    }

    fn relational(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(
            &[
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::exponent,
        )
    }

    fn exponent(&mut self) -> Result<Expr, ScriptError> {
        let base = self.unary()?;
        if !self.eat_punct("**") {
            return Ok(base);
        }
        self.enter()?;
        let power = self.exponent();
        self.leave();
        Ok(Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(power?),
        })
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let Some(tok) = self.peek() else {
            return Err(self.unexpected());
        };
        let op = match (tok.kind, tok.text) {
            (TokenKind::Punct, "!") => Some(UnaryOp::Not),
            (TokenKind::Punct, "-") => Some(UnaryOp::Negate),
            (TokenKind::Punct, "+") => Some(UnaryOp::Plus),
            (TokenKind::Ident, "typeof") => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            self.enter()?;
            let operand = self.unary();
            self.leave();
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand?),
            });
        }

        if tok.kind == TokenKind::Punct && (tok.text == "++" || tok.text == "--") {
            self.pos += 1;
            self.enter()?;
            let target = self.unary();
            self.leave();
            let target = target?;
            check_assignable(
                &target,
                "Invalid left-hand side expression in prefix operation",
                tok.offset,
            )?;
            return Ok(Expr::Update {
                increment: tok.text == "++",
                prefix: true,
                target: Box::new(target),
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let offset = self.offset();
        let expr = self.call_member()?;
        if let Some(tok) = self.peek()
            && tok.kind == TokenKind::Punct
            && (tok.text == "++" || tok.text == "--")
            && !tok.newline_before
        {
            check_assignable(
                &expr,
                "Invalid left-hand side expression in postfix operation",
                offset,
            )?;
            self.pos += 1;
            return Ok(Expr::Update {
                increment: tok.text == "++",
                prefix: false,
                target: Box::new(expr),
            });
        }
        Ok(expr)
    }

    fn call_member(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = if self.at_keyword("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            if self.eat_punct(".") {
                let property = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.at_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn new_expression(&mut self) -> Result<Expr, ScriptError> {
        self.pos += 1;
        let mut callee = self.primary()?;
        while self.eat_punct(".") {
            let property = self.property_name()?;
            callee = Expr::Member {
                object: Box::new(callee),
                property,
            };
        }
        let args = if self.at_punct("(") {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    /// After `.`, keywords are valid property names.
    fn property_name(&mut self) -> Result<String, ScriptError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident => {
                self.pos += 1;
                Ok(t.text.to_string())
            }
            _ => Err(self.unexpected()),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ScriptError> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.at_punct(")") {
            args.push(self.assignment()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let Some(tok) = self.peek() else {
            return Err(self.unexpected());
        };
        self.pos += 1;

        match tok.kind {
            TokenKind::Number => Ok(Expr::Number(parse_number(tok.text))),
            TokenKind::String => {
                let inner = &tok.text[1..tok.text.len() - 1];
                Ok(Expr::Str(unescape(inner, tok.offset + 1)?.into()))
            }
            TokenKind::Template => template(tok.text, tok.offset),
            TokenKind::Ident => match tok.text {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "undefined" => Ok(Expr::Undefined),
                "function" => Ok(Expr::Function(self.function_rest(false)?)),
                text if RESERVED.contains(&text) || UNSUPPORTED.contains(&text) => Err(
                    ScriptError::syntax(format!("Unexpected token '{text}'"), tok.offset),
                ),
                text => Ok(Expr::Ident(text.to_string())),
            },
            TokenKind::Punct => match tok.text {
                "(" => {
                    let expr = self.expression()?;
                    self.expect_punct(")")?;
                    Ok(expr)
                }
                "[" => {
                    let mut items = Vec::new();
                    while !self.at_punct("]") {
                        items.push(self.assignment()?);
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                    self.expect_punct("]")?;
                    Ok(Expr::Array(items))
                }
                "{" => self.object_literal(),
                text => Err(ScriptError::syntax(
                    format!("Unexpected token '{text}'"),
                    tok.offset,
                )),
            },
            _ => Err(ScriptError::syntax(
                format!("Unexpected token '{}'", tok.text),
                tok.offset,
            )),
        }
    }

    /// Called with the opening brace already consumed.
    fn object_literal(&mut self) -> Result<Expr, ScriptError> {
        let mut props = Vec::new();
        while !self.at_punct("}") {
            let Some(key_tok) = self.peek() else {
                return Err(self.unexpected());
            };
            let key = match key_tok.kind {
                TokenKind::Ident => key_tok.text.to_string(),
                TokenKind::String => {
                    unescape(&key_tok.text[1..key_tok.text.len() - 1], key_tok.offset + 1)?
                }
                TokenKind::Number => number_to_string(parse_number(key_tok.text)),
                _ => return Err(self.unexpected()),
            };
            self.pos += 1;

            if self.eat_punct(":") {
                props.push((key, self.assignment()?));
            } else if self.at_punct("(") {
                let params = self.params()?;
                let body = self.function_block()?;
                let def = FunctionDef {
                    name: Some(key.clone()),
                    params,
                    body: FunctionBody::Block(body),
                };
                props.push((key, Expr::Function(Rc::new(def))));
            } else if key_tok.kind == TokenKind::Ident && !RESERVED.contains(&key_tok.text) {
                props.push((key.clone(), Expr::Ident(key)));
            } else {
                return Err(self.unexpected());
            }

            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object(props))
    }
}

fn check_assignable(target: &Expr, message: &str, offset: usize) -> Result<(), ScriptError> {
    if matches!(
        target,
        Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }
    ) {
        Ok(())
    } else {
        Err(ScriptError::syntax(message, offset))
    }
}

fn parse_number(text: &str) -> f64 {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::INFINITY);
    }
    text.parse::<f64>().unwrap_or(f64::NAN)
}

/// Resolve escape sequences in the body of a string or template segment.
fn unescape(raw: &str, offset: usize) -> Result<String, ScriptError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            break;
        };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            '\r' => {
                chars.next_if_eq(&'\n');
            }
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                out.push(hex_char(&hex, "Invalid hexadecimal escape sequence", offset)?);
            }
            'u' => {
                let hex: String = if chars.next_if_eq(&'{').is_some() {
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                out.push(hex_char(&hex, "Invalid Unicode escape sequence", offset)?);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn hex_char(hex: &str, message: &str, offset: usize) -> Result<char, ScriptError> {
    if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ScriptError::syntax(message, offset));
    }
    let code = u32::from_str_radix(hex, 16).map_err(|_| ScriptError::syntax(message, offset))?;
    // Lone surrogates have no `char`; substitute rather than fail.
    Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
}

/// Split a template literal token into text and `${}` expression parts.
fn template(text: &str, offset: usize) -> Result<Expr, ScriptError> {
    let inner = &text[1..text.len() - 1];
    let base = offset + 1;
    let bytes = inner.as_bytes();
    let mut parts = Vec::new();
    let mut segment_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                if i > segment_start {
                    let segment = unescape(&inner[segment_start..i], base + segment_start)?;
                    parts.push(TemplatePart::Text(segment));
                }
                let start = i + 2;
                let end = closing_brace(inner, start).ok_or_else(|| {
                    ScriptError::syntax("Unterminated template expression", base + i)
                })?;
                parts.push(TemplatePart::Expr(parse_expression(
                    &inner[start..end],
                    base + start,
                )?));
                i = end + 1;
                segment_start = i;
            }
            _ => i += 1,
        }
    }
    if segment_start < inner.len() {
        let segment = unescape(&inner[segment_start..], base + segment_start)?;
        parts.push(TemplatePart::Text(segment));
    }
    Ok(Expr::Template(parts))
}

/// Index of the `}` closing a `${` whose body starts at `start`.
fn closing_brace(s: &str, start: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}
