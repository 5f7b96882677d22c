//! Lossless-enough SQL lexer for formatting and validation.
//!
//! Whitespace is dropped; every other character lands in exactly one token
//! whose text reproduces the source (keywords keep their original case).

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    QuotedIdent,
    Str,
    Number,
    Operator,
    Comma,
    Dot,
    LParen,
    RParen,
    /// `[...]` written right after an operand: array type suffix or index.
    Subscript,
    Semicolon,
    LineComment,
    BlockComment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }

    /// Case-insensitive keyword match on a bare word.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("Unterminated string literal starting at character {0}")]
    UnterminatedString(usize),
    #[error("Unterminated quoted identifier starting at character {0}")]
    UnterminatedIdent(usize),
    #[error("Unterminated block comment starting at character {0}")]
    UnterminatedComment(usize),
}

const MULTI_CHAR_OPS: [&str; 11] = ["->>", "<>", "<=", ">=", "!=", "||", "::", "->", "=>", "<<", ">>"];

pub fn tokenize(input: &str) -> Result<Vec<Token>, TokenizeError> {
    Lexer::new(input).tokenize()
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    current_char: Option<char>,
    pos: usize,
    spaced: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        let mut chars = input.chars().peekable();
        let current_char = chars.next();
        Self {
            chars,
            current_char,
            pos: 0,
            spaced: false,
            tokens: Vec::new(),
        }
    }

    fn advance(&mut self) {
        self.current_char = self.chars.next();
        self.pos += 1;
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        while let Some(c) = self.current_char {
            if c.is_whitespace() {
                self.advance();
                self.spaced = true;
                continue;
            }
            let token = match c {
                '-' if self.peek() == Some('-') => self.read_line_comment(),
                '/' if self.peek() == Some('*') => self.read_block_comment()?,
                '\'' => self.read_string(String::new())?,
                '"' | '`' => self.read_quoted(c, c)?,
                '[' if self.subscript_allowed() => self.read_subscript()?,
                '[' => self.read_quoted('[', ']')?,
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semicolon),
                '.' if self.peek().is_some_and(|n| n.is_ascii_digit()) => self.read_number(),
                '.' => self.single(TokenKind::Dot),
                '-' if self.peek().is_some_and(|n| n.is_ascii_digit()) && self.sign_allowed() => {
                    self.read_number()
                }
                c if c.is_ascii_digit() => self.read_number(),
                ':' | '@' | '$' if self.peek().is_some_and(is_word_char) => self.read_word(),
                c if is_word_start(c) => {
                    let word = self.read_word();
                    // E'..', N'..', X'..', B'..' string prefixes
                    if word.text.chars().count() == 1
                        && matches!(word.text.to_ascii_uppercase().as_str(), "E" | "N" | "X" | "B")
                        && self.current_char == Some('\'')
                    {
                        self.read_string(word.text)?
                    } else {
                        word
                    }
                }
                _ => self.read_operator(),
            };
            self.tokens.push(token);
            self.spaced = false;
        }
        Ok(self.tokens)
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let c = self.current_char.unwrap_or_default();
        self.advance();
        Token::new(kind, c.to_string())
    }

    /// `[` glued to an operand indexes it (`a[1]`, `int[]`); anywhere else it
    /// opens a SQL Server quoted identifier.
    fn subscript_allowed(&self) -> bool {
        !self.spaced
            && self.tokens.last().is_some_and(|t| {
                matches!(
                    t.kind,
                    TokenKind::Word | TokenKind::QuotedIdent | TokenKind::RParen | TokenKind::Subscript
                )
            })
    }

    fn read_subscript(&mut self) -> Result<Token, TokenizeError> {
        let start = self.pos;
        let mut text = String::new();
        let mut depth = 0usize;
        while let Some(c) = self.current_char {
            text.push(c);
            self.advance();
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Token::new(TokenKind::Subscript, text));
                    }
                }
                _ => {}
            }
        }
        Err(TokenizeError::UnterminatedIdent(start))
    }

    /// A leading `-` belongs to the number when no operand precedes it.
    fn sign_allowed(&self) -> bool {
        match self.tokens.iter().rev().find(|t| !t.is_comment()) {
            None => true,
            Some(t) => match t.kind {
                TokenKind::Operator | TokenKind::Comma | TokenKind::LParen => true,
                TokenKind::Word => is_sign_keyword(&t.text),
                _ => false,
            },
        }
    }

    fn read_line_comment(&mut self) -> Token {
        let mut text = String::new();
        while let Some(c) = self.current_char {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.advance();
        }
        Token::new(TokenKind::LineComment, text.trim_end())
    }

    fn read_block_comment(&mut self) -> Result<Token, TokenizeError> {
        let start = self.pos;
        let mut text = String::from("/*");
        self.advance();
        self.advance();
        while let Some(c) = self.current_char {
            text.push(c);
            self.advance();
            if c == '*' && self.current_char == Some('/') {
                text.push('/');
                self.advance();
                return Ok(Token::new(TokenKind::BlockComment, text));
            }
        }
        Err(TokenizeError::UnterminatedComment(start))
    }

    fn read_string(&mut self, prefix: String) -> Result<Token, TokenizeError> {
        let start = self.pos;
        let mut text = prefix;
        text.push('\'');
        self.advance();
        while let Some(c) = self.current_char {
            text.push(c);
            self.advance();
            if c == '\'' {
                if self.current_char == Some('\'') {
                    text.push('\'');
                    self.advance();
                } else {
                    return Ok(Token::new(TokenKind::Str, text));
                }
            }
        }
        Err(TokenizeError::UnterminatedString(start))
    }

    fn read_quoted(&mut self, open: char, close: char) -> Result<Token, TokenizeError> {
        let start = self.pos;
        let mut text = String::from(open);
        self.advance();
        while let Some(c) = self.current_char {
            text.push(c);
            self.advance();
            if c == close {
                if self.current_char == Some(close) {
                    text.push(close);
                    self.advance();
                } else {
                    return Ok(Token::new(TokenKind::QuotedIdent, text));
                }
            }
        }
        Err(TokenizeError::UnterminatedIdent(start))
    }

    fn read_number(&mut self) -> Token {
        let mut text = String::new();
        if self.current_char == Some('-') {
            text.push('-');
            self.advance();
        }
        while let Some(c) = self.current_char {
            let exponent_sign = matches!(c, '+' | '-') && text.ends_with(['e', 'E']);
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Token::new(TokenKind::Number, text)
    }

    fn read_word(&mut self) -> Token {
        let mut text = String::new();
        if let Some(c) = self.current_char {
            text.push(c);
            self.advance();
        }
        while let Some(c) = self.current_char {
            if is_word_char(c) {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Token::new(TokenKind::Word, text)
    }

    fn read_operator(&mut self) -> Token {
        let Some(first) = self.current_char else {
            return Token::new(TokenKind::Operator, "");
        };
        self.advance();
        let mut text = first.to_string();
        // greedy: extend while the result is still a known operator prefix
        while let Some(c) = self.current_char {
            let candidate = format!("{text}{c}");
            if MULTI_CHAR_OPS.iter().any(|op| op.starts_with(&candidate)) {
                text = candidate;
                self.advance();
            } else {
                break;
            }
        }
        Token::new(TokenKind::Operator, text)
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '#'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '#'
}

fn is_sign_keyword(word: &str) -> bool {
    const SIGN_KEYWORDS: [&str; 16] = [
        "SELECT", "WHERE", "AND", "OR", "NOT", "BETWEEN", "IN", "VALUES", "SET", "THEN", "ELSE",
        "WHEN", "RETURN", "LIMIT", "OFFSET", "ON",
    ];
    SIGN_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        tokenize(sql).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn splits_basic_select() {
        let tokens = tokenize("select a.id, 'it''s' from t where x >= -1.5").unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["select", "a", ".", "id", ",", "'it''s'", "from", "t", "where", "x", ">=", "-1.5"]
        );
    }

    #[test]
    fn minus_after_operand_is_an_operator() {
        assert_eq!(
            kinds("a -1"),
            vec![TokenKind::Word, TokenKind::Operator, TokenKind::Number]
        );
    }

    #[test]
    fn glued_brackets_are_subscripts() {
        assert_eq!(
            kinds("a::int[] tags[1][2] [dbo].[t]"),
            vec![
                TokenKind::Word,
                TokenKind::Operator,
                TokenKind::Word,
                TokenKind::Subscript,
                TokenKind::Word,
                TokenKind::Subscript,
                TokenKind::Subscript,
                TokenKind::QuotedIdent,
                TokenKind::Dot,
                TokenKind::QuotedIdent,
            ]
        );
    }

    #[test]
    fn comments_and_quoted_identifiers() {
        let tokens =
            tokenize("-- lead  \nSELECT \"Weird \"\"Name\"\"\", [x y], `z` /* c */").unwrap();
        assert_eq!(tokens[0].text, "-- lead");
        assert_eq!(tokens[2].text, "\"Weird \"\"Name\"\"\"");
        assert_eq!(tokens[4].text, "[x y]");
        assert_eq!(tokens[6].kind, TokenKind::QuotedIdent);
        assert_eq!(tokens[7].kind, TokenKind::BlockComment);
    }

    #[test]
    fn unterminated_input_is_an_error() {
        assert_eq!(
            tokenize("SELECT 'abc"),
            Err(TokenizeError::UnterminatedString(7))
        );
        assert!(matches!(
            tokenize("SELECT \"abc"),
            Err(TokenizeError::UnterminatedIdent(_))
        ));
        assert!(matches!(
            tokenize("SELECT /* abc"),
            Err(TokenizeError::UnterminatedComment(_))
        ));
    }

    #[test]
    fn parameters_and_casts() {
        let tokens = tokenize("x = :id AND y::text = $1").unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["x", "=", ":id", "AND", "y", "::", "text", "=", "$1"]);
    }
}
