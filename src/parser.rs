// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::lexer::*;

use anyhow::{bail, Result};

#[derive(Clone)]
pub struct Parser<'source> {
    source: Source,
    lexer: Lexer<'source>,
    tok: Token,
    end: u32,
}

const CALENDAR_UNITS: [&str; 16] = [
    "year",
    "years",
    "month",
    "months",
    "week",
    "weeks",
    "day",
    "days",
    "hour",
    "hours",
    "minute",
    "minutes",
    "second",
    "seconds",
    "millisecond",
    "milliseconds",
];

impl<'source> Parser<'source> {
    pub fn new(source: &'source Source) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token()?;
        Ok(Self {
            source: source.clone(),
            lexer,
            tok,
            end: 0,
        })
    }

    /// Text of the current token when it can act as a symbol, keyword or
    /// identifier. Literal tokens yield an empty string so that a quoted
    /// `'and'` is never mistaken for an operator.
    pub fn token_text(&self) -> &str {
        match self.tok.0 {
            TokenKind::Symbol | TokenKind::Number | TokenKind::Ident | TokenKind::Eof => {
                self.tok.1.text()
            }
            _ => "",
        }
    }

    // End offset of the current token including closing delimiters.
    fn token_end(&self) -> u32 {
        let span = &self.tok.1;
        match self.tok.0 {
            TokenKind::String | TokenKind::DelimitedIdent => span.end + 1,
            TokenKind::Constant => {
                let rest = &self.source.contents()[span.end as usize..];
                match rest.chars().next() {
                    Some('`') | Some('\'') => span.end + 1,
                    _ => span.end,
                }
            }
            _ => span.end,
        }
    }

    // Span of the current token including opening delimiters.
    fn token_span(&self) -> Span {
        let mut span = self.tok.1.clone();
        if matches!(
            self.tok.0,
            TokenKind::String | TokenKind::DelimitedIdent | TokenKind::DateTime
        ) {
            span.start -= 1;
            span.col -= 1;
        }
        span.end = self.token_end();
        span
    }

    pub fn next_token(&mut self) -> Result<()> {
        self.end = self.token_end();
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, text: &str, context: &str) -> Result<()> {
        if self.token_text() == text {
            self.next_token()
        } else {
            let msg = format!("expecting `{text}` {context}");
            Err(self.source.error(self.tok.1.line, self.tok.1.col, &msg))
        }
    }

    fn error_here(&self, msg: &str) -> anyhow::Error {
        self.source.error(self.tok.1.line, self.tok.1.col, msg)
    }

    fn span_from(&self, start: &Span) -> Span {
        let mut span = start.clone();
        span.end = self.end;
        span
    }

    /// Parses a complete expression. Any trailing token is an error.
    pub fn parse(&mut self) -> Result<Ref<Expr>> {
        if self.tok.0 == TokenKind::Eof {
            return Err(self.error_here("empty expression"));
        }
        let expr = self.parse_expr()?;
        if self.tok.0 != TokenKind::Eof {
            let msg = format!("unexpected `{}` after expression", self.tok.1.text());
            return Err(self.error_here(&msg));
        }
        Ok(Ref::new(expr))
    }

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_implies()
    }

    fn parse_implies(&mut self) -> Result<Expr> {
        let mut expr = self.parse_or()?;
        while self.token_text() == "implies" {
            self.next_token()?;
            let rhs = self.parse_or()?;
            let span = self.span_from(expr.span());
            expr = Expr::LogicExpr {
                span,
                op: LogicOp::Implies,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut expr = self.parse_and()?;
        loop {
            let op = match self.token_text() {
                "or" => LogicOp::Or,
                "xor" => LogicOp::Xor,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_and()?;
            let span = self.span_from(expr.span());
            expr = Expr::LogicExpr {
                span,
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut expr = self.parse_membership()?;
        while self.token_text() == "and" {
            self.next_token()?;
            let rhs = self.parse_membership()?;
            let span = self.span_from(expr.span());
            expr = Expr::LogicExpr {
                span,
                op: LogicOp::And,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_membership(&mut self) -> Result<Expr> {
        let mut expr = self.parse_equality()?;
        loop {
            let op = match self.token_text() {
                "in" => MembershipOp::In,
                "contains" => MembershipOp::Contains,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_equality()?;
            let span = self.span_from(expr.span());
            expr = Expr::Membership {
                span,
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = match self.token_text() {
                "=" => BoolOp::Eq,
                "!=" => BoolOp::Ne,
                "~" => BoolOp::Equiv,
                "!~" => BoolOp::NotEquiv,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_comparison()?;
            let span = self.span_from(expr.span());
            expr = Expr::BoolExpr {
                span,
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut expr = self.parse_union()?;
        loop {
            let op = match self.token_text() {
                "<" => BoolOp::Lt,
                "<=" => BoolOp::Le,
                ">" => BoolOp::Gt,
                ">=" => BoolOp::Ge,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_union()?;
            let span = self.span_from(expr.span());
            expr = Expr::BoolExpr {
                span,
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_union(&mut self) -> Result<Expr> {
        let mut expr = self.parse_type_expr()?;
        while self.token_text() == "|" {
            self.next_token()?;
            let rhs = self.parse_type_expr()?;
            let span = self.span_from(expr.span());
            expr = Expr::Union {
                span,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_type_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = match self.token_text() {
                "is" => TypeOp::Is,
                "as" => TypeOp::As,
                _ => break,
            };
            self.next_token()?;
            let spec = self.parse_type_specifier()?;
            let span = self.span_from(expr.span());
            expr = Expr::TypeExpr {
                span,
                op,
                expr: Ref::new(expr),
                spec,
            };
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.token_text() {
                "+" => ArithOp::Add,
                "-" => ArithOp::Sub,
                "&" => ArithOp::Concat,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_multiplicative()?;
            let span = self.span_from(expr.span());
            expr = Expr::ArithExpr {
                span,
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.token_text() {
                "*" => ArithOp::Mul,
                "/" => ArithOp::Div,
                "div" => ArithOp::IntDiv,
                "mod" => ArithOp::Mod,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_unary()?;
            let span = self.span_from(expr.span());
            expr = Expr::ArithExpr {
                span,
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.token_text() {
            "+" => UnaryOp::Plus,
            "-" => UnaryOp::Minus,
            _ => return self.parse_postfix(),
        };
        let start = self.token_span();
        self.next_token()?;
        let expr = self.parse_unary()?;
        let span = self.span_from(&start);
        Ok(Expr::UnaryExpr {
            span,
            op,
            expr: Ref::new(expr),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut term = self.parse_term()?;
        loop {
            match self.token_text() {
                "." => {
                    self.next_token()?;
                    let start = term.span().clone();
                    term = self.parse_invocation(Some(Ref::new(term)), &start)?;
                }
                "[" => {
                    self.next_token()?;
                    let index = self.parse_expr()?;
                    self.expect("]", "while parsing indexer")?;
                    let span = self.span_from(term.span());
                    term = Expr::Indexer {
                        span,
                        focus: Ref::new(term),
                        index: Ref::new(index),
                    };
                }
                _ => break,
            }
        }
        Ok(term)
    }

    fn parse_identifier(&mut self) -> Result<(Span, String)> {
        let span = self.token_span();
        let name = match self.tok.0 {
            TokenKind::Ident => self.tok.1.text().to_string(),
            TokenKind::DelimitedIdent => unescape(&self.tok.1)?,
            _ => return Err(self.error_here("expecting identifier")),
        };
        self.next_token()?;
        Ok((span, name))
    }

    fn parse_invocation(&mut self, focus: Option<Ref<Expr>>, start: &Span) -> Result<Expr> {
        let name = self.parse_identifier()?;
        if self.token_text() != "(" {
            let span = self.span_from(start);
            return Ok(Expr::Member { span, focus, name });
        }

        self.next_token()?;
        let mut params = vec![];
        if self.token_text() != ")" {
            params.push(Ref::new(self.parse_expr()?));
            while self.token_text() == "," {
                self.next_token()?;
                params.push(Ref::new(self.parse_expr()?));
            }
        }
        self.expect(")", "while parsing function call")?;
        let span = self.span_from(start);
        Ok(Expr::Call {
            span,
            focus,
            name,
            params,
        })
    }

    fn parse_type_specifier(&mut self) -> Result<TypeSpecifier> {
        let start = self.token_span();
        let (_, first) = self.parse_identifier()?;
        let (namespace, name) = if self.token_text() == "." {
            self.next_token()?;
            let (_, name) = self.parse_identifier()?;
            (Some(first), name)
        } else {
            (None, first)
        };
        Ok(TypeSpecifier {
            span: self.span_from(&start),
            namespace,
            name,
        })
    }

    fn parse_number(&mut self) -> Result<Expr> {
        let span = self.token_span();
        let text = span.text();
        let kind = if text.ends_with('L') {
            NumberKind::Long
        } else if text.contains('.') {
            NumberKind::Decimal
        } else {
            NumberKind::Integer
        };
        self.next_token()?;

        // A number directly followed by a unit is a quantity.
        let unit = match self.tok.0 {
            TokenKind::String => {
                let unit = unescape(&self.tok.1)?;
                Some((self.token_span(), unit))
            }
            TokenKind::Ident if CALENDAR_UNITS.contains(&self.tok.1.text()) => {
                Some((self.token_span(), self.tok.1.text().to_string()))
            }
            _ => None,
        };

        match unit {
            Some(unit) if kind != NumberKind::Long => {
                self.next_token()?;
                Ok(Expr::Quantity {
                    span: self.span_from(&span),
                    value: span,
                    unit,
                })
            }
            Some(_) => bail!(span.error("long numbers cannot carry a unit")),
            None => Ok(Expr::Number((span, kind))),
        }
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let span = self.token_span();
        let expr = match self.tok.0 {
            TokenKind::Number => return self.parse_number(),
            TokenKind::String => Expr::String((span, unescape(&self.tok.1)?)),
            TokenKind::DateTime => {
                let text = self.tok.1.text();
                let kind = if text.starts_with('T') {
                    TemporalKind::Time
                } else if text.contains('T') {
                    TemporalKind::DateTime
                } else {
                    TemporalKind::Date
                };
                Expr::Temporal((span, kind))
            }
            TokenKind::Variable => match self.tok.1.text() {
                "$this" => Expr::This(span),
                "$index" => Expr::Index(span),
                _ => Expr::Total(span),
            },
            TokenKind::Constant => Expr::Constant((span, unescape(&self.tok.1)?)),
            TokenKind::Ident if matches!(self.token_text(), "true" | "false") => {
                Expr::Bool((span, self.token_text() == "true"))
            }
            TokenKind::Ident | TokenKind::DelimitedIdent => {
                return self.parse_invocation(None, &span)
            }
            TokenKind::Symbol if self.token_text() == "(" => {
                self.next_token()?;
                let expr = self.parse_expr()?;
                self.expect(")", "while parsing parenthesized expression")?;
                return Ok(expr);
            }
            TokenKind::Symbol if self.token_text() == "{" => {
                self.next_token()?;
                self.expect("}", "while parsing empty collection")?;
                return Ok(Expr::Empty(self.span_from(&span)));
            }
            _ => return Err(self.error_here("expecting expression")),
        };
        self.next_token()?;
        Ok(expr)
    }
}

/// Parses `text` as a FHIRPath expression. `name` identifies the expression
/// in error messages.
pub fn parse_expression(name: &str, text: &str) -> Result<Ref<Expr>> {
    let source = Source::from_contents(name.to_string(), text.to_string())?;
    let mut parser = Parser::new(&source)?;
    parser.parse()
}
