//! Formula lexer.
//!
//! Only the characters of the formula language are accepted. Constructs that
//! hint at escaping the sandbox (attribute access, assignment, subscripts,
//! string literals) are reported as forbidden rather than merely unexpected.

use super::error::EvaluationError;

/// Token kinds in formulas.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(f64),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::Plus => "'+'".into(),
            TokenKind::Minus => "'-'".into(),
            TokenKind::Star => "'*'".into(),
            TokenKind::StarStar => "'**'".into(),
            TokenKind::Slash => "'/'".into(),
            TokenKind::Lt => "'<'".into(),
            TokenKind::Le => "'<='".into(),
            TokenKind::Gt => "'>'".into(),
            TokenKind::Ge => "'>='".into(),
            TokenKind::EqEq => "'=='".into(),
            TokenKind::NotEq => "'!='".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

/// A token with its byte offset in the formula.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, position: usize) -> Self {
        Self { kind, position }
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, EvaluationError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, EvaluationError> {
        self.skip_whitespace();

        let Some(&(pos, ch)) = self.chars.peek() else {
            return Ok(Token::new(TokenKind::Eof, self.input.len()));
        };

        let single = |kind| Ok(Token::new(kind, pos));
        match ch {
            '0'..='9' => self.read_number(pos),
            '.' => {
                if self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
                    self.read_number(pos)
                } else {
                    Err(EvaluationError::ForbiddenConstruct {
                        construct: "attribute access",
                        position: pos,
                    })
                }
            }
            'a'..='z' | 'A'..='Z' | '_' => Ok(self.read_identifier(pos)),
            '(' => {
                self.chars.next();
                single(TokenKind::LParen)
            }
            ')' => {
                self.chars.next();
                single(TokenKind::RParen)
            }
            ',' => {
                self.chars.next();
                single(TokenKind::Comma)
            }
            '+' => {
                self.chars.next();
                single(TokenKind::Plus)
            }
            '-' => {
                self.chars.next();
                single(TokenKind::Minus)
            }
            '/' => {
                self.chars.next();
                single(TokenKind::Slash)
            }
            '*' => {
                self.chars.next();
                if self.eat('*') {
                    single(TokenKind::StarStar)
                } else {
                    single(TokenKind::Star)
                }
            }
            '<' => {
                self.chars.next();
                if self.eat('=') {
                    single(TokenKind::Le)
                } else {
                    single(TokenKind::Lt)
                }
            }
            '>' => {
                self.chars.next();
                if self.eat('=') {
                    single(TokenKind::Ge)
                } else {
                    single(TokenKind::Gt)
                }
            }
            '=' => {
                self.chars.next();
                if self.eat('=') {
                    single(TokenKind::EqEq)
                } else {
                    Err(EvaluationError::ForbiddenConstruct {
                        construct: "assignment",
                        position: pos,
                    })
                }
            }
            '!' => {
                self.chars.next();
                if self.eat('=') {
                    single(TokenKind::NotEq)
                } else {
                    Err(EvaluationError::UnexpectedChar { ch, position: pos })
                }
            }
            '[' | ']' => Err(EvaluationError::ForbiddenConstruct {
                construct: "subscript",
                position: pos,
            }),
            '"' | '\'' => Err(EvaluationError::ForbiddenConstruct {
                construct: "string literal",
                position: pos,
            }),
            _ => Err(EvaluationError::UnexpectedChar { ch, position: pos }),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().is_some_and(|&(_, c)| c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    /// `digits [. digits] [(e|E) [+|-] digits]`, or `. digits ...`.
    fn read_number(&mut self, start: usize) -> Result<Token, EvaluationError> {
        self.skip_digits();
        if self.peek_is(|c| c == '.') {
            if self
                .peek_second()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            {
                return Err(EvaluationError::ForbiddenConstruct {
                    construct: "attribute access",
                    position: self.offset(),
                });
            }
            self.chars.next();
            self.skip_digits();
        }
        if self.peek_is(|c| c == 'e' || c == 'E') {
            self.chars.next();
            if self.peek_is(|c| c == '+' || c == '-') {
                self.chars.next();
            }
            if !self.peek_is(|c| c.is_ascii_digit()) {
                return Err(EvaluationError::InvalidNumber { position: start });
            }
            self.skip_digits();
        }
        // `1.5.real`
        if self.peek_is(|c| c == '.') {
            return Err(EvaluationError::ForbiddenConstruct {
                construct: "attribute access",
                position: self.offset(),
            });
        }

        let end = self.offset();
        self.input[start..end]
            .parse::<f64>()
            .map(|n| Token::new(TokenKind::Number(n), start))
            .map_err(|_| EvaluationError::InvalidNumber { position: start })
    }

    fn skip_digits(&mut self) {
        while self.peek_is(|c| c.is_ascii_digit()) {
            self.chars.next();
        }
    }

    fn peek_is(&mut self, pred: impl Fn(char) -> bool) -> bool {
        self.chars.peek().is_some_and(|&(_, c)| pred(c))
    }

    /// Byte offset of the next unread character.
    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |&(i, _)| i)
    }

    fn read_identifier(&mut self, start: usize) -> Token {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                end = i + 1;
                self.chars.next();
            } else {
                break;
            }
        }
        Token::new(TokenKind::Ident(self.input[start..end].to_string()), start)
    }
}
