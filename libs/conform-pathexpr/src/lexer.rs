//! Tokenizer for the path-expression subset this crate implements.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    String(String),
    Int(i64),
    Decimal(f64),
    True,
    False,
    And,
    Or,
    Not,
    Implies,
    Dot,
    Comma,
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Dollar,
    Eof,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            '$' => {
                tokens.push(Token::Dollar);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Neq);
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '\'' => {
                let (s, consumed) = read_string(&chars[i + 1..])?;
                tokens.push(Token::String(s));
                i += consumed + 2;
            }
            c if c.is_ascii_digit() => {
                let (tok, consumed) = read_number(&chars[i..]);
                tokens.push(tok);
                i += consumed;
            }
            c if c.is_alphabetic() || c == '_' => {
                let (word, consumed) = read_word(&chars[i..]);
                i += consumed;
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" | "xor" => Token::Or,
                    "implies" => Token::Implies,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(Error::UnexpectedChar(other, i)),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

fn read_string(rest: &[char]) -> Result<(String, usize)> {
    let mut out = String::new();
    let mut i = 0;
    loop {
        match rest.get(i) {
            None => return Err(Error::UnterminatedString),
            Some('\'') => return Ok((out, i + 1)),
            Some('\\') => {
                match rest.get(i + 1) {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(*c),
                    None => return Err(Error::UnterminatedString),
                }
                i += 2;
            }
            Some(c) => {
                out.push(*c);
                i += 1;
            }
        }
    }
}

fn read_number(chars: &[char]) -> (Token, usize) {
    let mut i = 0;
    while chars.get(i).map(|c| c.is_ascii_digit()).unwrap_or(false) {
        i += 1;
    }
    let mut is_decimal = false;
    if chars.get(i) == Some(&'.') && chars.get(i + 1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
        is_decimal = true;
        i += 1;
        while chars.get(i).map(|c| c.is_ascii_digit()).unwrap_or(false) {
            i += 1;
        }
    }
    let text: String = chars[..i].iter().collect();
    if is_decimal {
        (Token::Decimal(text.parse().unwrap_or(0.0)), i)
    } else {
        (Token::Int(text.parse().unwrap_or(0)), i)
    }
}

fn read_word(chars: &[char]) -> (String, usize) {
    let mut i = 0;
    while chars
        .get(i)
        .map(|c| c.is_alphanumeric() || *c == '_')
        .unwrap_or(false)
    {
        i += 1;
    }
    (chars[..i].iter().collect(), i)
}
