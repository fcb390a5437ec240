use std::iter::Peekable;
use std::str::Chars;

use crate::errors::{RecError, RecResult};

/// A selection-expression token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Str(String),
    /// A bare identifier: a field name, possibly qualified with `:`.
    Name(String),
    Or,
    And,
    Not,
    Eql,
    Neq,
    Match,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Sharp,
    LParen,
    RParen,
}

/// Cut an expression into tokens. Strings are double-quoted with C-style
/// backslash escapes; names may embed `:` qualifiers.
pub fn tokenize(input: &str) -> RecResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '0'..='9' => tokens.push(lex_int(&mut chars)),
            '"' => tokens.push(lex_str(input, &mut chars)?),
            'a'..='z' | 'A'..='Z' | '%' => tokens.push(lex_name(&mut chars)),
            '|' => {
                chars.next();
                expect(input, &mut chars, '|')?;
                tokens.push(Token::Or);
            }
            '&' => {
                chars.next();
                expect(input, &mut chars, '&')?;
                tokens.push(Token::And);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Neq);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eql);
            }
            '~' => {
                chars.next();
                tokens.push(Token::Match);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' if !next_is_name(&chars) => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '#' => {
                chars.next();
                tokens.push(Token::Sharp);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            _ => {
                return Err(RecError::InvalidSex(format!(
                    "unexpected character '{c}' in {input}"
                )));
            }
        }
    }

    Ok(tokens)
}

fn lex_int(chars: &mut Peekable<Chars<'_>>) -> Token {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            chars.next();
        } else {
            break;
        }
    }
    Token::Int(digits.parse().unwrap_or(i64::MAX))
}

fn lex_str(input: &str, chars: &mut Peekable<Chars<'_>>) -> RecResult<Token> {
    chars.next(); // opening quote
    let mut text = String::new();
    loop {
        match chars.next() {
            None => {
                return Err(RecError::InvalidSex(format!(
                    "unterminated string in {input}"
                )));
            }
            Some('"') => break,
            Some('\\') => match chars.next() {
                None => {
                    return Err(RecError::InvalidSex(format!(
                        "unterminated string in {input}"
                    )));
                }
                Some('n') => text.push('\n'),
                Some('t') => text.push('\t'),
                Some(other) => text.push(other),
            },
            Some(other) => text.push(other),
        }
    }
    Ok(Token::Str(text))
}

fn lex_name(chars: &mut Peekable<Chars<'_>>) -> Token {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        // '%' may only start a name part, so mid-name it ends the token
        // (and lexes as the modulo operator).
        let part_head = name.is_empty() || name.ends_with(':');
        if c.is_ascii_alphanumeric() || c == '_' || c == ':' || (c == '%' && part_head) {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    Token::Name(name)
}

/// Distinguish the modulo operator from a `%`-prefixed field name: `%` is
/// a name head only when a letter follows it.
fn next_is_name(chars: &Peekable<Chars<'_>>) -> bool {
    let mut lookahead = chars.clone();
    lookahead.next();
    matches!(lookahead.peek(), Some(c) if c.is_ascii_alphabetic())
}

fn expect(input: &str, chars: &mut Peekable<Chars<'_>>, wanted: char) -> RecResult<()> {
    match chars.next() {
        Some(c) if c == wanted => Ok(()),
        _ => Err(RecError::InvalidSex(format!(
            "expected '{wanted}' in {input}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_operators_and_names() {
        let tokens = tokenize("Age > 18 && Name ~ \"^A\"").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("Age".to_owned()),
                Token::Gt,
                Token::Int(18),
                Token::And,
                Token::Name("Name".to_owned()),
                Token::Match,
                Token::Str("^A".to_owned()),
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        let tokens = tokenize("a <= b >= c != d || e").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("a".to_owned()),
                Token::Le,
                Token::Name("b".to_owned()),
                Token::Ge,
                Token::Name("c".to_owned()),
                Token::Neq,
                Token::Name("d".to_owned()),
                Token::Or,
                Token::Name("e".to_owned()),
            ]
        );
    }

    #[test]
    fn test_sharp_and_parens() {
        let tokens = tokenize("#Phone = 0").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Sharp,
                Token::Name("Phone".to_owned()),
                Token::Eql,
                Token::Int(0),
            ]
        );

        let tokens = tokenize("(1 + 2) * 3").unwrap();
        assert_eq!(tokens.first(), Some(&Token::LParen));
        assert_eq!(tokens.get(4), Some(&Token::RParen));
    }

    #[test]
    fn test_percent_is_modulo_or_name_head() {
        let tokens = tokenize("10 % 3").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Int(10), Token::Percent, Token::Int(3)]
        );

        let tokens = tokenize("%rec = \"Contact\"").unwrap();
        assert_eq!(tokens[0], Token::Name("%rec".to_owned()));
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#""a\"b\\c\nd""#).unwrap();
        assert_eq!(tokens, vec![Token::Str("a\"b\\c\nd".to_owned())]);
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("\"open").is_err());
        assert!(tokenize("a | b").is_err());
        assert!(tokenize("a & b").is_err());
        assert!(tokenize("a ? b").is_err());
    }

    #[test]
    fn test_qualified_name() {
        let tokens = tokenize("Contact:Home:Email = \"x\"").unwrap();
        assert_eq!(tokens[0], Token::Name("Contact:Home:Email".to_owned()));
    }
}
