//! Classifier expression parsing
//!
//! Grammar, with case-insensitive keywords:
//!
//! ```text
//! expr      := term ( "or" term )*
//! term      := factor ( "and" factor )*
//! factor    := "not" factor | "(" expr ")" | predicate
//! predicate := "arp" | "ip" | "vlan" | "tcp" | "udp"
//!            | ( "src" | "dst" )? "port" uint16
//! ```

use pktkit_core::{Error, Result};

/// Protocol literal predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Proto {
    Arp,
    Ip,
    Vlan,
    Tcp,
    Udp,
}

impl Proto {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Proto::Arp => "arp",
            Proto::Ip => "ip",
            Proto::Vlan => "vlan",
            Proto::Tcp => "tcp",
            Proto::Udp => "udp",
        }
    }
}

/// Direction qualifier for the port predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Source,
    Destination,
}

/// Parsed classifier expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expr {
    Proto(Proto),
    Port {
        direction: Option<Direction>,
        port: u16,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Number(u32),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '(' {
            chars.next();
            tokens.push(Token::LParen);
        } else if c == ')' {
            chars.next();
            tokens.push(Token::RParen);
        } else if c.is_ascii_alphanumeric() {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() {
                    word.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            if word.chars().all(|c| c.is_ascii_digit()) {
                let number = word
                    .parse::<u32>()
                    .map_err(|_| Error::syntax(format!("number '{}' too large", word)))?;
                tokens.push(Token::Number(number));
            } else {
                tokens.push(Token::Word(word.to_ascii_lowercase()));
            }
        } else {
            return Err(Error::syntax(format!("unexpected character '{}'", c)));
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut expr = self.parse_and()?;
        while self.peek_is_word("or") {
            self.advance();
            let rhs = self.parse_and()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut expr = self.parse_factor()?;
        while self.peek_is_word("and") {
            self.advance();
            let rhs = self.parse_factor()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Word(word)) if word == "not" => {
                Ok(Expr::Not(Box::new(self.parse_factor()?)))
            }
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(Error::syntax("missing closing parenthesis")),
                }
            }
            Some(Token::Word(word)) => self.parse_predicate(&word),
            Some(Token::Number(n)) => Err(Error::syntax(format!("unexpected number {}", n))),
            Some(Token::RParen) => Err(Error::syntax("unexpected ')'")),
            None => Err(Error::syntax("unexpected end of expression")),
        }
    }

    fn parse_predicate(&mut self, word: &str) -> Result<Expr> {
        match word {
            "arp" => Ok(Expr::Proto(Proto::Arp)),
            "ip" => Ok(Expr::Proto(Proto::Ip)),
            "vlan" => Ok(Expr::Proto(Proto::Vlan)),
            "tcp" => Ok(Expr::Proto(Proto::Tcp)),
            "udp" => Ok(Expr::Proto(Proto::Udp)),
            "port" => self.parse_port(None),
            "src" | "dst" => {
                let direction = if word == "src" {
                    Direction::Source
                } else {
                    Direction::Destination
                };
                match self.advance() {
                    Some(Token::Word(w)) if w == "port" => self.parse_port(Some(direction)),
                    _ => Err(Error::syntax(format!("expected 'port' after '{}'", word))),
                }
            }
            other => Err(Error::FilterKeyword(other.to_string())),
        }
    }

    fn parse_port(&mut self, direction: Option<Direction>) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(n)) if n <= u16::MAX as u32 => Ok(Expr::Port {
                direction,
                port: n as u16,
            }),
            Some(Token::Number(n)) => {
                Err(Error::syntax(format!("port number {} out of range", n)))
            }
            _ => Err(Error::syntax("expected port number")),
        }
    }
}

/// Parse a classifier expression into its AST
pub(crate) fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(Error::syntax("empty expression"));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;

    if parser.pos != parser.tokens.len() {
        return Err(Error::syntax("trailing tokens after expression"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proto() {
        assert_eq!(parse("arp").unwrap(), Expr::Proto(Proto::Arp));
        assert_eq!(parse("UDP").unwrap(), Expr::Proto(Proto::Udp));
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(
            parse("port 8338").unwrap(),
            Expr::Port {
                direction: None,
                port: 8338
            }
        );
        assert_eq!(
            parse("dst port 53").unwrap(),
            Expr::Port {
                direction: Some(Direction::Destination),
                port: 53
            }
        );
    }

    #[test]
    fn test_parse_precedence() {
        // "a or b and c" groups as "a or (b and c)"
        let expr = parse("arp or udp and port 53").unwrap();
        match expr {
            Expr::Or(lhs, rhs) => {
                assert_eq!(*lhs, Expr::Proto(Proto::Arp));
                assert!(matches!(*rhs, Expr::And(_, _)));
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_parse_parentheses() {
        let expr = parse("(arp or udp) and port 53").unwrap();
        assert!(matches!(expr, Expr::And(_, _)));
    }

    #[test]
    fn test_parse_not() {
        let expr = parse("not arp").unwrap();
        assert_eq!(expr, Expr::Not(Box::new(Expr::Proto(Proto::Arp))));
    }

    #[test]
    fn test_unknown_keyword() {
        assert!(matches!(
            parse("frob").unwrap_err(),
            Error::FilterKeyword(w) if w == "frob"
        ));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse(""), Err(Error::FilterSyntax(_))));
        assert!(matches!(parse("port"), Err(Error::FilterSyntax(_))));
        assert!(matches!(parse("port 99999"), Err(Error::FilterSyntax(_))));
        assert!(matches!(parse("(arp"), Err(Error::FilterSyntax(_))));
        assert!(matches!(parse("arp udp"), Err(Error::FilterSyntax(_))));
        assert!(matches!(parse("src udp"), Err(Error::FilterSyntax(_))));
        assert!(matches!(parse("arp && udp"), Err(Error::FilterSyntax(_))));
    }
}
