use crate::expression::error::EquationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    /// `$name`, looked up in the context variables.
    Variable(String),
    Number(f64),
    True,
    False,

    LParen,
    RParen,
    Comma,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Bang,

    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    AndAnd,
    OrOr,

    Question,
    Colon,

    Eof,
}

struct Cursor<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn eat_while(&mut self, f: impl Fn(u8) -> bool) {
        while self.peek().is_some_and(&f) {
            self.pos += 1;
        }
    }

    fn number(&mut self, start: usize) -> Result<f64, EquationError> {
        self.eat_while(|b| b.is_ascii_digit());
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
            self.eat_while(|b| b.is_ascii_digit());
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let e_pos = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            let digits = self.pos;
            self.eat_while(|b| b.is_ascii_digit());
            if digits == self.pos {
                return Err(EquationError::new(e_pos, "exponent needs digits"));
            }
        }
        self.src[start..self.pos]
            .parse()
            .map_err(|_| EquationError::new(start, "invalid number"))
    }

    fn word(&mut self) -> &'a str {
        let start = self.pos;
        self.eat_while(|b| b.is_ascii_alphanumeric() || b == b'_');
        &self.src[start..self.pos]
    }
}

pub(crate) fn lex(input: &str) -> Result<Vec<Token>, EquationError> {
    let mut out = Vec::new();
    let mut cur = Cursor {
        src: input,
        bytes: input.as_bytes(),
        pos: 0,
    };

    while let Some(b) = cur.peek() {
        if b.is_ascii_whitespace() {
            cur.pos += 1;
            continue;
        }
        let start = cur.pos;

        let kind = if b.is_ascii_digit()
            || (b == b'.' && cur.peek_at(1).is_some_and(|n| n.is_ascii_digit()))
        {
            TokenKind::Number(cur.number(start)?)
        } else if b == b'$' {
            cur.pos += 1;
            let name = cur.word();
            if name.is_empty() {
                return Err(EquationError::new(start, "expected variable name after '$'"));
            }
            TokenKind::Variable(name.to_owned())
        } else if b.is_ascii_alphabetic() || b == b'_' {
            match cur.word() {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                w => TokenKind::Ident(w.to_owned()),
            }
        } else {
            let two = match (b, cur.peek_at(1)) {
                (b'&', Some(b'&')) => Some(TokenKind::AndAnd),
                (b'|', Some(b'|')) => Some(TokenKind::OrOr),
                (b'=', Some(b'=')) => Some(TokenKind::EqEq),
                (b'!', Some(b'=')) => Some(TokenKind::Ne),
                (b'<', Some(b'=')) => Some(TokenKind::Le),
                (b'>', Some(b'=')) => Some(TokenKind::Ge),
                _ => None,
            };
            if let Some(kind) = two {
                cur.pos += 2;
                kind
            } else {
                cur.pos += 1;
                match b {
                    b'(' => TokenKind::LParen,
                    b')' => TokenKind::RParen,
                    b',' => TokenKind::Comma,
                    b'+' => TokenKind::Plus,
                    b'-' => TokenKind::Minus,
                    b'*' => TokenKind::Star,
                    b'/' => TokenKind::Slash,
                    b'%' => TokenKind::Percent,
                    b'!' => TokenKind::Bang,
                    b'<' => TokenKind::Lt,
                    b'>' => TokenKind::Gt,
                    b'?' => TokenKind::Question,
                    b':' => TokenKind::Colon,
                    _ => {
                        let c = input[start..].chars().next().unwrap_or('?');
                        return Err(EquationError::new(start, format!("unexpected character '{c}'")));
                    }
                }
            }
        };

        out.push(Token {
            kind,
            span: Span {
                start,
                end: cur.pos,
            },
        });
    }

    out.push(Token {
        kind: TokenKind::Eof,
        span: Span {
            start: input.len(),
            end: input.len(),
        },
    });
    Ok(out)
}
