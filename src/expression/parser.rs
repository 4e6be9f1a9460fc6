use crate::expression::ast::{BinaryOp, Expr, UnaryOp};
use crate::expression::error::EquationError;
use crate::expression::lexer::{Token, TokenKind, lex};

/// Parse an equation string. A leading `=` is accepted and ignored.
pub(crate) fn parse_expr(src: &str) -> Result<Expr, EquationError> {
    let src = src.trim();
    let src = src.strip_prefix('=').unwrap_or(src);
    let mut p = Parser {
        tokens: lex(src)?,
        pos: 0,
        depth: 0,
        height: 0,
    };
    let expr = p.parse_conditional()?;
    p.expect(TokenKind::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Parser recursion, counting parentheses and prefix signs.
    depth: usize,
    /// Height of the tree returned by the last parse step.
    height: usize,
}

/// Limit for both parser recursion and syntax tree height.
const MAX_DEPTH: usize = 64;

/// Number of binary precedence levels.
const LEVELS: usize = 6;

/// Operator for `kind` at precedence `level` (0 binds loosest).
fn binary_op(level: usize, kind: &TokenKind) -> Option<BinaryOp> {
    Some(match (level, kind) {
        (0, TokenKind::OrOr) => BinaryOp::Or,
        (1, TokenKind::AndAnd) => BinaryOp::And,
        (2, TokenKind::EqEq) => BinaryOp::Eq,
        (2, TokenKind::Ne) => BinaryOp::Ne,
        (3, TokenKind::Lt) => BinaryOp::Lt,
        (3, TokenKind::Le) => BinaryOp::Le,
        (3, TokenKind::Gt) => BinaryOp::Gt,
        (3, TokenKind::Ge) => BinaryOp::Ge,
        (4, TokenKind::Plus) => BinaryOp::Add,
        (4, TokenKind::Minus) => BinaryOp::Sub,
        (5, TokenKind::Star) => BinaryOp::Mul,
        (5, TokenKind::Slash) => BinaryOp::Div,
        (5, TokenKind::Percent) => BinaryOp::Mod,
        _ => return None,
    })
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), EquationError> {
        if self.consume(&kind) {
            Ok(())
        } else {
            Err(EquationError::new(
                self.peek().span.start,
                format!("expected {kind:?}, found {:?}", self.peek().kind),
            ))
        }
    }

    fn too_deep(&self) -> EquationError {
        EquationError::new(
            self.peek().span.start,
            format!("equation nests deeper than {MAX_DEPTH} levels"),
        )
    }

    fn enter(&mut self) -> Result<(), EquationError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(())
    }

    /// Record a new node one above its tallest child.
    fn node(&mut self, tallest_child: usize) -> Result<(), EquationError> {
        self.height = tallest_child + 1;
        if self.height > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(())
    }

    fn parse_conditional(&mut self) -> Result<Expr, EquationError> {
        self.enter()?;
        let e = self.parse_choose();
        self.depth -= 1;
        e
    }

    fn parse_choose(&mut self) -> Result<Expr, EquationError> {
        let condition = self.parse_level(0)?;
        if !self.consume(&TokenKind::Question) {
            return Ok(condition);
        }
        let mut tallest = self.height;
        let when_true = self.parse_conditional()?;
        tallest = tallest.max(self.height);
        self.expect(TokenKind::Colon)?;
        let when_false = self.parse_conditional()?;
        self.node(tallest.max(self.height))?;
        Ok(Expr::Choose {
            condition: Box::new(condition),
            when_true: Box::new(when_true),
            when_false: Box::new(when_false),
        })
    }

    fn parse_level(&mut self, level: usize) -> Result<Expr, EquationError> {
        if level == LEVELS {
            return self.parse_unary();
        }
        let mut e = self.parse_level(level + 1)?;
        while let Some(op) = binary_op(level, &self.peek().kind) {
            self.bump();
            let lhs_height = self.height;
            let rhs = self.parse_level(level + 1)?;
            self.node(lhs_height.max(self.height))?;
            e = Expr::Binary {
                op,
                lhs: Box::new(e),
                rhs: Box::new(rhs),
            };
        }
        Ok(e)
    }

    fn parse_unary(&mut self) -> Result<Expr, EquationError> {
        let op = if self.consume(&TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.consume(&TokenKind::Bang) {
            UnaryOp::Not
        } else if self.consume(&TokenKind::Plus) {
            self.enter()?;
            let e = self.parse_unary();
            self.depth -= 1;
            return e;
        } else {
            return self.parse_primary();
        };
        self.enter()?;
        let operand = self.parse_unary()?;
        self.depth -= 1;
        self.node(self.height)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, EquationError> {
        let mut args = Vec::new();
        let mut tallest = 0;
        if !self.consume(&TokenKind::RParen) {
            loop {
                args.push(self.parse_conditional()?);
                tallest = tallest.max(self.height);
                if !self.consume(&TokenKind::Comma) {
                    self.expect(TokenKind::RParen)?;
                    break;
                }
            }
        }
        self.node(tallest)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, EquationError> {
        let t = self.bump();
        self.height = 0;
        match t.kind {
            TokenKind::Number(v) => Ok(Expr::Number(v)),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::Variable(name) => Ok(Expr::Var(name)),
            TokenKind::Ident(name) => {
                if self.consume(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    Ok(Expr::Call { func: name, args })
                } else {
                    Ok(Expr::Constant(name))
                }
            }
            TokenKind::LParen => {
                let e = self.parse_conditional()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            other => Err(EquationError::new(
                t.span.start,
                format!("unexpected token {other:?}"),
            )),
        }
    }
}
