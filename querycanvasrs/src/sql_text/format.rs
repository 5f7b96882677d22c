//! Pretty-printer for raw SQL.
//!
//! Layout is a function of the token stream alone (whitespace is discarded and
//! keyword case normalized), so formatting already formatted text reproduces it.

use super::tokenize::{tokenize, Token, TokenKind};
use crate::dialect::SqlDialect;

const INDENT: usize = 2;

/// Words upper-cased on output.
const KEYWORDS: &[&str] = &[
    "ALL", "ALTER", "ANALYZE", "AND", "AS", "ASC", "AVG", "BETWEEN", "BY", "CASE", "CAST",
    "CHECK", "COALESCE", "CONSTRAINT", "COUNT", "CREATE", "CROSS", "DEFAULT", "DELETE", "DESC",
    "DESCRIBE", "DISTINCT", "DROP", "ELSE", "END", "EXCEPT", "EXISTS", "EXPLAIN", "FALSE",
    "FETCH", "FIRST", "FOREIGN", "FROM", "FULL", "GROUP", "HAVING", "ILIKE", "IN", "INDEX",
    "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "KEY", "LAST", "LEFT", "LIKE",
    "LIMIT", "MAX", "MIN", "NATURAL", "NEXT", "NOT", "NULL", "NULLIF", "NULLS", "OFFSET", "ON",
    "ONLY", "OR", "ORDER", "OUTER", "OVER", "PARTITION", "PRAGMA", "PRIMARY", "RECURSIVE",
    "REFERENCES", "RETURNING", "RIGHT", "ROW", "ROWS", "SELECT", "SET", "SHOW", "SUM", "TABLE",
    "THEN", "TOP", "TRUE", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "VIEW", "WHEN",
    "WHERE", "WITH",
];

/// Keywords written like functions: no space before `(`.
const CALLABLE_KEYWORDS: &[&str] = &[
    "AVG", "CAST", "COALESCE", "COUNT", "MAX", "MIN", "NULLIF", "SUM", "OVER", "EXISTS",
];

/// Keywords that open a clause on their own line.
const CLAUSES: &[&str] = &[
    "SELECT", "FROM", "WHERE", "HAVING", "LIMIT", "OFFSET", "VALUES", "SET", "RETURNING", "WITH",
    "UNION", "INTERSECT", "EXCEPT", "UPDATE", "FETCH",
];

/// Two-word clause openers, merged onto one line.
const CLAUSE_PAIRS: &[(&str, &str)] = &[
    ("GROUP", "BY"),
    ("ORDER", "BY"),
    ("INSERT", "INTO"),
    ("DELETE", "FROM"),
    ("UNION", "ALL"),
];

const JOIN_MODIFIERS: &[&str] = &["INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL", "OUTER"];

/// Format SQL for reading: keywords upper-cased, each major clause on its own
/// line with its body indented, top-level list items and AND/OR on separate
/// lines, subqueries indented one level deeper. Literals, quoted identifiers
/// and comments are kept verbatim. Input that does not tokenize is returned
/// unchanged.
pub fn format_sql_query(sql: &str, dialect: SqlDialect) -> String {
    match tokenize(sql) {
        Ok(tokens) if tokens.is_empty() => String::new(),
        Ok(tokens) => Formatter::new(&tokens).run(),
        Err(e) => {
            tracing::warn!(dialect = %dialect, error = %e, "sql did not tokenize, leaving it unformatted");
            sql.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    base: usize,
    in_body: bool,
    parens: usize,
    in_between: bool,
}

impl Frame {
    fn new(base: usize) -> Self {
        Self {
            base,
            in_body: false,
            parens: 0,
            in_between: false,
        }
    }

    fn body(&self) -> usize {
        if self.in_body {
            self.base + INDENT
        } else {
            self.base
        }
    }
}

struct Formatter<'t> {
    tokens: &'t [Token],
    out: String,
    pending: Option<usize>,
    frames: Vec<Frame>,
    prev: Option<(TokenKind, String)>,
}

impl<'t> Formatter<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            out: String::new(),
            pending: None,
            frames: vec![Frame::new(0)],
            prev: None,
        }
    }

    fn frame(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn top(&self) -> Frame {
        self.frames[self.frames.len() - 1]
    }

    fn newline(&mut self, indent: usize) {
        self.pending = Some(indent);
    }

    fn emit(&mut self, kind: TokenKind, text: &str) {
        if let Some(indent) = self.pending.take() {
            if !self.out.is_empty() {
                self.out.push('\n');
                self.out.push_str(&" ".repeat(indent));
            }
        } else if !self.out.is_empty() && self.space_before(kind, text) {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.prev = Some((kind, text.to_string()));
    }

    fn space_before(&self, kind: TokenKind, text: &str) -> bool {
        let Some((prev_kind, prev_text)) = &self.prev else {
            return false;
        };
        if matches!(
            kind,
            TokenKind::Comma
                | TokenKind::Dot
                | TokenKind::RParen
                | TokenKind::Subscript
                | TokenKind::Semicolon
        ) || text == "::"
        {
            return false;
        }
        if matches!(prev_kind, TokenKind::Dot | TokenKind::LParen) || prev_text == "::" {
            return false;
        }
        if kind == TokenKind::LParen {
            return match prev_kind {
                TokenKind::Word => is_keyword(prev_text) && !is_callable_keyword(prev_text),
                TokenKind::QuotedIdent => false,
                _ => true,
            };
        }
        true
    }

    fn peek_word(&self, i: usize) -> Option<String> {
        self.tokens
            .get(i)
            .filter(|t| t.kind == TokenKind::Word)
            .map(|t| t.text.to_ascii_uppercase())
    }

    /// Next non-comment token after `i`.
    fn next_code(&self, i: usize) -> Option<&Token> {
        self.tokens[i + 1..].iter().find(|t| !t.is_comment())
    }

    fn run(mut self) -> String {
        let tokens = self.tokens;
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += match token.kind {
                TokenKind::Word => self.word(i),
                TokenKind::LineComment => {
                    self.emit(token.kind, &token.text);
                    let indent = self.top().body();
                    self.newline(indent);
                    1
                }
                TokenKind::Comma => {
                    self.emit(token.kind, ",");
                    let frame = self.top();
                    if frame.parens == 0 && frame.in_body {
                        self.newline(frame.base + INDENT);
                    }
                    1
                }
                TokenKind::LParen => {
                    self.open_paren(i);
                    1
                }
                TokenKind::RParen => {
                    self.close_paren();
                    1
                }
                TokenKind::Semicolon => {
                    self.emit(token.kind, ";");
                    self.frames = vec![Frame::new(0)];
                    self.newline(0);
                    1
                }
                _ => {
                    self.emit(token.kind, &token.text);
                    1
                }
            };
        }
        self.out
    }

    /// Handle the word at `i`; returns how many tokens were consumed.
    fn word(&mut self, i: usize) -> usize {
        let tokens = self.tokens;
        let token = &tokens[i];
        let upper = token.text.to_ascii_uppercase();
        let frame = self.top();
        let text = if is_keyword(&upper) {
            upper.clone()
        } else {
            token.text.clone()
        };

        if frame.parens > 0 {
            self.emit(TokenKind::Word, &text);
            return 1;
        }

        if let Some(second) = self.peek_word(i + 1) {
            if CLAUSE_PAIRS.iter().any(|(a, b)| *a == upper && *b == second) {
                self.clause(&format!("{upper} {second}"));
                return 2;
            }
        }

        if CLAUSES.contains(&upper.as_str()) {
            self.clause(&upper);
            return 1;
        }

        if self.starts_join(i, &upper) {
            self.newline(frame.base + INDENT);
            self.emit(TokenKind::Word, &text);
            return 1;
        }

        match upper.as_str() {
            "BETWEEN" => self.frame().in_between = true,
            "AND" if frame.in_between => self.frame().in_between = false,
            "AND" | "OR" if frame.in_body => self.newline(frame.base + INDENT),
            _ => {}
        }
        self.emit(TokenKind::Word, &text);
        1
    }

    fn clause(&mut self, keyword: &str) {
        let base = self.top().base;
        self.newline(base);
        self.emit(TokenKind::Word, keyword);
        let frame = self.frame();
        frame.in_body = true;
        frame.in_between = false;
        self.newline(base + INDENT);
    }

    fn starts_join(&self, i: usize, upper: &str) -> bool {
        let prev_is_modifier = self
            .prev
            .as_ref()
            .is_some_and(|(k, t)| *k == TokenKind::Word && JOIN_MODIFIERS.contains(&t.as_str()));
        if prev_is_modifier {
            return false;
        }
        if upper == "JOIN" {
            return true;
        }
        if !JOIN_MODIFIERS.contains(&upper) {
            return false;
        }
        let mut j = i + 1;
        while let Some(next) = self.peek_word(j) {
            if next == "JOIN" {
                return true;
            }
            if !JOIN_MODIFIERS.contains(&next.as_str()) {
                return false;
            }
            j += 1;
        }
        false
    }

    fn open_paren(&mut self, i: usize) {
        let subquery = self
            .next_code(i)
            .is_some_and(|t| t.is_word("SELECT") || t.is_word("WITH"));
        self.emit(TokenKind::LParen, "(");
        if subquery {
            let base = self.top().body() + INDENT;
            self.frames.push(Frame::new(base));
            self.newline(base);
        } else {
            self.frame().parens += 1;
        }
    }

    fn close_paren(&mut self) {
        if self.top().parens > 0 {
            self.frame().parens -= 1;
        } else if self.frames.len() > 1 {
            if let Some(inner) = self.frames.pop() {
                self.newline(inner.base.saturating_sub(INDENT));
            }
        }
        self.emit(TokenKind::RParen, ")");
    }
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn is_callable_keyword(word: &str) -> bool {
    CALLABLE_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}
