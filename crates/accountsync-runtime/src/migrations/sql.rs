//! Splitting of multi-statement SQL for MySQL.

use std::iter::Peekable;
use std::str::Chars;

/// One statement out of a SQL script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    /// Positional `?` parameters outside quotes and comments.
    pub placeholders: usize,
}

/// Split SQL into individual statements.
///
/// Semicolons inside `'…'`, `"…"` and `` `…` `` are kept, comments (`-- `,
/// `#`, `/* */`) are stripped, and comment-only pieces are dropped.
pub fn split_sql_statements(sql: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut placeholders = 0;
    let mut has_code = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                current.push(c);
                consume_quoted(c, &mut chars, &mut current);
                has_code = true;
            }
            '-' if starts_line_comment(&chars) => {
                skip_line(&mut chars);
                current.push(' ');
            }
            '#' => {
                skip_line(&mut chars);
                current.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                skip_block_comment(&mut chars);
                current.push(' ');
            }
            ';' => {
                flush(&mut statements, &mut current, &mut placeholders, &mut has_code);
            }
            '?' => {
                current.push(c);
                placeholders += 1;
                has_code = true;
            }
            _ => {
                current.push(c);
                if !c.is_whitespace() {
                    has_code = true;
                }
            }
        }
    }

    // The last statement might not end with ;
    flush(&mut statements, &mut current, &mut placeholders, &mut has_code);

    statements
}

fn flush(
    statements: &mut Vec<Statement>,
    current: &mut String,
    placeholders: &mut usize,
    has_code: &mut bool,
) {
    let sql = current.trim();
    if *has_code && !sql.is_empty() {
        statements.push(Statement {
            sql: sql.to_string(),
            placeholders: *placeholders,
        });
    }
    current.clear();
    *placeholders = 0;
    *has_code = false;
}

/// Copy a quoted string or identifier through its closing quote.
fn consume_quoted(quote: char, chars: &mut Peekable<Chars<'_>>, current: &mut String) {
    while let Some(c) = chars.next() {
        current.push(c);
        if c == '\\' && quote != '`' {
            if let Some(escaped) = chars.next() {
                current.push(escaped);
            }
            continue;
        }
        if c == quote {
            // Doubled quote is an escaped quote.
            if chars.peek() == Some(&quote) {
                if let Some(q) = chars.next() {
                    current.push(q);
                }
                continue;
            }
            return;
        }
    }
}

// MySQL only treats `--` as a comment when followed by whitespace.
fn starts_line_comment(chars: &Peekable<Chars<'_>>) -> bool {
    let mut ahead = chars.clone();
    if ahead.next() != Some('-') {
        return false;
    }
    matches!(ahead.peek(), None | Some(' ' | '\t' | '\n' | '\r'))
}

fn skip_line(chars: &mut Peekable<Chars<'_>>) {
    for c in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

fn skip_block_comment(chars: &mut Peekable<Chars<'_>>) {
    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'/') {
            chars.next();
            return;
        }
    }
}
