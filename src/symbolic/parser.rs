use crate::symbolic::{
    Expr, Symbol, SymbolicError,
    expr::parse_decimal,
    simplify::simplify,
};
use std::{iter::Peekable, str::CharIndices, str::FromStr};

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Caret,
    Ident(String),
    LParen,
    Minus,
    Number(String),
    Plus,
    RParen,
    Slash,
    Star,
    StarStar,
}

/// Splits the source into tokens, each paired with its byte offset.
fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, SymbolicError> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<CharIndices> = source.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        let token = match c {
            _ if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();

                while let Some(&(_, c)) = chars.peek() {
                    let exponent_sign = matches!(c, '+' | '-')
                        && literal.ends_with(['e', 'E'])
                        && literal.starts_with(|c: char| c.is_ascii_digit() || c == '.');

                    if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }

                Token::Number(literal)
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut ident = String::new();

                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }

                Token::Ident(ident)
            }
            '*' => {
                chars.next();

                match chars.peek() {
                    Some((_, '*')) => {
                        chars.next();
                        Token::StarStar
                    }
                    _ => Token::Star,
                }
            }
            _ => {
                chars.next();

                match c {
                    '^' => Token::Caret,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '/' => Token::Slash,
                    _ => {
                        return Err(SymbolicError::Parse {
                            msg: format!("unexpected character {:?}", c),
                            position,
                        });
                    }
                }
            }
        };

        tokens.push((position, token));
    }

    Ok(tokens)
}

/// A recursive descent parser with the usual precedence rules, `**` / `^` being right
/// associative and binding tighter than a unary minus on its left.
struct Parser {
    end: usize,
    index: usize,
    tokens: Vec<(usize, Token)>,
}

impl Parser {
    fn error<R>(&self, msg: impl Into<String>) -> Result<R, SymbolicError> {
        Err(SymbolicError::Parse {
            msg: msg.into(),
            position: self.position(),
        })
    }

    fn expect(&mut self, token: Token) -> Result<(), SymbolicError> {
        match self.next() {
            Some(next) if next == token => Ok(()),
            Some(next) => {
                self.index -= 1;
                self.error(format!("expected {:?} but found {:?}", token, next))
            }
            None => self.error(format!("expected {:?} but reached the end", token)),
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).map(|(_, token)| token.clone());

        if token.is_some() {
            self.index += 1;
        }

        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|(_, token)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.index)
            .map(|(position, _)| *position)
            .unwrap_or(self.end)
    }

    fn parse_sum(&mut self) -> Result<Expr, SymbolicError> {
        let mut expr = self.parse_product()?;

        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    expr = expr + self.parse_product()?;
                }
                Some(Token::Minus) => {
                    self.next();
                    expr = expr - self.parse_product()?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_product(&mut self) -> Result<Expr, SymbolicError> {
        let mut expr = self.parse_unary()?;

        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.next();
                    expr = expr * self.parse_unary()?;
                }
                Some(Token::Slash) => {
                    self.next();
                    expr = expr / self.parse_unary()?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, SymbolicError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next();
                Ok(-self.parse_unary()?)
            }
            Some(Token::Plus) => {
                self.next();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, SymbolicError> {
        let base = self.parse_atom()?;

        match self.peek() {
            Some(Token::StarStar) | Some(Token::Caret) => {
                self.next();
                Ok(base.pow(self.parse_unary()?))
            }
            _ => Ok(base),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, SymbolicError> {
        let position = self.position();

        match self.next() {
            Some(Token::Number(literal)) => match parse_decimal(&literal) {
                Some(value) => Ok(Expr::Num(value)),
                None => Err(SymbolicError::Parse {
                    msg: format!("invalid number literal {:?}", literal),
                    position,
                }),
            },
            Some(Token::Ident(ident)) => match self.peek() {
                Some(Token::LParen) => {
                    self.next();

                    let arg = self.parse_sum()?;

                    self.expect(Token::RParen)?;

                    match ident.as_str() {
                        "exp" => Ok(arg.exp()),
                        "log" | "ln" => Ok(arg.ln()),
                        "sqrt" => Ok(arg.sqrt()),
                        _ => Err(SymbolicError::Parse {
                            msg: format!("unknown function {:?}", ident),
                            position,
                        }),
                    }
                }
                _ => match ident.as_str() {
                    "nan" => Ok(Expr::NaN),
                    _ => Ok(Expr::Sym(Symbol::from_name(&ident))),
                },
            },
            Some(Token::LParen) => {
                let expr = self.parse_sum()?;

                self.expect(Token::RParen)?;

                Ok(expr)
            }
            Some(token) => {
                self.index -= 1;
                self.error(format!("unexpected token {:?}", token))
            }
            None => self.error("unexpected end of expression"),
        }
    }
}

impl FromStr for Expr {
    type Err = SymbolicError;

    /// Parses an expression with the operators `+ - * / ** ^`, parentheses, decimal literals,
    /// symbols and the functions `exp`, `log` (or `ln`) and `sqrt`. The result is simplified.
    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            end: source.len(),
            index: 0,
            tokens: tokenize(source)?,
        };

        let expr = parser.parse_sum()?;

        if parser.peek().is_some() {
            return parser.error("trailing input");
        }

        Ok(simplify(&expr))
    }
}
