//! Raw lexer: turns source text into a flat token stream, joining lines that
//! are inside an open `(` / `[` the way the grammar requires, and tagging
//! each significant token with the bookkeeping the indent filter needs
//! (`at_line_start`, `must_indent`). INDENT/DEDENT synthesis itself lives in
//! [`crate::indent`].

use crate::error::{Error, Result};
use crate::token::is_keyword;

/// One raw token plus the flags `indent::filter` consumes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawToken {
    pub kind: RawKind,
    pub line: usize,
    pub column: usize,
    pub at_line_start: bool,
    pub must_indent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawKind {
    Keyword(String),
    Identifier(String),
    IntegerConstant(i64),
    StringConstant(String),
    Symbol(char),
    Colon,
    Arrow,
    /// Leading indentation at the start of a line; carries its width.
    Ws(usize),
    Newline,
}

const SYMBOL_CHARS: &[char] = &[
    '(', ')', '[', ']', '.', ',', '+', '-', '*', '/', '&', '|', '<', '>', '=', '!',
];

#[derive(PartialEq, Eq, Clone, Copy)]
enum IndentMode {
    No,
    May,
    Must,
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    #[allow(dead_code)]
    src: &'a str,
    line: usize,
    col: usize,
    paren_depth: i32,
    at_line_start: bool,
    indent_mode: IndentMode,
    /// Illegal characters encountered so far; each is a one-byte skip, not an
    /// abort (spec.md §4.1, §7).
    diagnostics: Vec<Error>,
}

/// Scans `src` into raw tokens. Illegal characters are non-fatal: each is
/// logged, recorded in the returned diagnostics, and skipped one byte at a
/// time so the rest of the file still lexes. Only a genuinely unterminated
/// construct (an unclosed string literal) aborts the scan.
pub(crate) fn tokenize(src: &str) -> Result<(Vec<RawToken>, Vec<Error>)> {
    let mut scanner = Scanner {
        chars: src.char_indices().peekable(),
        src,
        line: 1,
        col: 1,
        paren_depth: 0,
        at_line_start: true,
        indent_mode: IndentMode::No,
        diagnostics: Vec::new(),
    };
    let tokens = scanner.run()?;
    Ok((tokens, scanner.diagnostics))
}

impl<'a> Scanner<'a> {
    fn run(&mut self) -> Result<Vec<RawToken>> {
        let mut out = Vec::new();
        loop {
            let Some(&(_, c)) = self.chars.peek() else {
                break;
            };

            if c == '#' {
                self.skip_comment();
                continue;
            }

            if c == '\n' {
                let line = self.line;
                let col = self.col;
                self.bump();
                if self.paren_depth > 0 {
                    continue;
                }
                // Reflects whether we were already at line start (a blank or
                // indent-only line) *before* this newline — the indent
                // filter uses it to suppress newlines that carry no text.
                let was_at_line_start = self.at_line_start;
                if self.indent_mode == IndentMode::May {
                    self.indent_mode = IndentMode::Must;
                }
                self.at_line_start = true;
                out.push(RawToken {
                    kind: RawKind::Newline,
                    line,
                    column: col,
                    at_line_start: was_at_line_start,
                    must_indent: false,
                });
                continue;
            }

            if c == ' ' {
                let start_col = self.col;
                let start_at_line_start = self.at_line_start;
                let mut width = 0;
                while matches!(self.chars.peek(), Some((_, ' '))) {
                    self.bump();
                    width += 1;
                }
                if start_at_line_start && self.paren_depth == 0 {
                    out.push(RawToken {
                        kind: RawKind::Ws(width),
                        line: self.line,
                        column: start_col,
                        at_line_start: true,
                        must_indent: false,
                    });
                }
                continue;
            }

            if c == ':' {
                let (line, column) = (self.line, self.col);
                self.bump();
                let at_line_start = self.at_line_start;
                self.indent_mode = IndentMode::May;
                self.at_line_start = false;
                out.push(RawToken {
                    kind: RawKind::Colon,
                    line,
                    column,
                    at_line_start,
                    must_indent: false,
                });
                continue;
            }

            if c == '-' && self.peek_second() == Some('>') {
                self.bump();
                self.bump();
                out.push(self.annotate(RawKind::Arrow, self.line, self.col - 2));
                continue;
            }

            if c.is_ascii_digit() {
                out.push(self.scan_integer());
                continue;
            }

            if c == '"' {
                out.push(self.scan_string()?);
                continue;
            }

            if c.is_alphabetic() || c == '_' {
                out.push(self.scan_word());
                continue;
            }

            if SYMBOL_CHARS.contains(&c) {
                if c == '(' || c == '[' {
                    self.paren_depth += 1;
                } else if c == ')' || c == ']' {
                    self.paren_depth = (self.paren_depth - 1).max(0);
                }
                let start_col = self.col;
                self.bump();
                out.push(self.annotate(RawKind::Symbol(c), self.line, start_col));
                continue;
            }

            log::error!("illegal character '{c}' at {}:{}, skipping", self.line, self.col);
            self.diagnostics.push(Error::Lexical {
                line: self.line,
                column: self.col,
                ch: c,
            });
            self.bump();
            continue;
        }
        Ok(out)
    }

    /// Applies the "any other token" row of the indent-tracking state
    /// machine: `must_indent` reflects whether the previous significant
    /// token left us in MUST mode, then the mode resets.
    fn annotate(&mut self, kind: RawKind, line: usize, column: usize) -> RawToken {
        let must_indent = self.indent_mode == IndentMode::Must;
        self.indent_mode = IndentMode::No;
        let at_line_start = self.at_line_start;
        self.at_line_start = false;
        RawToken {
            kind,
            line,
            column,
            at_line_start,
            must_indent,
        }
    }

    fn peek_second(&self) -> Option<char> {
        let mut it = self.chars.clone();
        it.next();
        it.next().map(|(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_comment(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn scan_integer(&mut self) -> RawToken {
        let start_col = self.col;
        let mut text = String::new();
        while matches!(self.chars.peek(), Some((_, c)) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        let value: i64 = text.parse().unwrap_or(0);
        self.annotate(RawKind::IntegerConstant(value), self.line, start_col)
    }

    fn scan_word(&mut self) -> RawToken {
        let start_col = self.col;
        let mut text = String::new();
        while matches!(self.chars.peek(), Some((_, c)) if c.is_alphanumeric() || *c == '_') {
            text.push(self.bump().unwrap());
        }
        let kind = if is_keyword(&text) {
            RawKind::Keyword(text)
        } else {
            RawKind::Identifier(text)
        };
        self.annotate(kind, self.line, start_col)
    }

    fn scan_string(&mut self) -> Result<RawToken> {
        let start_line = self.line;
        let start_col = self.col;
        let mut text = String::new();
        text.push(self.bump().unwrap()); // opening quote
        loop {
            match self.chars.peek() {
                Some((_, '"')) => {
                    text.push(self.bump().unwrap());
                    break;
                }
                Some((_, _)) => text.push(self.bump().unwrap()),
                None => {
                    return Err(Error::Lexical {
                        line: start_line,
                        column: start_col,
                        ch: '"',
                    })
                }
            }
        }
        Ok(self.annotate(RawKind::StringConstant(text), start_line, start_col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<RawKind> {
        tokenize(src).unwrap().0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("class Foo"),
            vec![
                RawKind::Keyword("class".into()),
                RawKind::Identifier("Foo".into()),
            ]
        );
    }

    #[test]
    fn integers_and_strings() {
        assert_eq!(
            kinds(r#"42 "hi""#),
            vec![
                RawKind::IntegerConstant(42),
                RawKind::StringConstant("\"hi\"".into()),
            ]
        );
    }

    #[test]
    fn arrow_and_colon_are_distinct_from_symbols() {
        assert_eq!(kinds("->:"), vec![RawKind::Arrow, RawKind::Colon]);
    }

    #[test]
    fn newlines_suppressed_inside_parens() {
        let toks = kinds("f(1,\n2)");
        assert!(!toks.iter().any(|k| matches!(k, RawKind::Newline)));
    }

    #[test]
    fn leading_whitespace_emits_ws_only_at_line_start() {
        let toks = tokenize("  x\ny  z").unwrap().0;
        let ws: Vec<_> = toks
            .iter()
            .filter(|t| matches!(t.kind, RawKind::Ws(_)))
            .collect();
        // one WS for the leading "  " on line 1; the space between y and z
        // is mid-line and produces no token at all.
        assert_eq!(ws.len(), 1);
        assert!(matches!(ws[0].kind, RawKind::Ws(2)));
    }

    #[test]
    fn comment_is_discarded() {
        assert_eq!(
            kinds("x # trailing\ny"),
            vec![
                RawKind::Identifier("x".into()),
                RawKind::Newline,
                RawKind::Identifier("y".into()),
            ]
        );
    }

    #[test]
    fn illegal_character_is_reported() {
        let (toks, diagnostics) = tokenize("x = @ y").unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(diagnostics[0], Error::Lexical { ch: '@', .. }));
        // scanning continued past the bad byte: `y` still comes out the
        // other side.
        assert!(toks
            .iter()
            .any(|t| matches!(&t.kind, RawKind::Identifier(s) if s == "y")));
    }

    #[test]
    fn colon_arms_must_indent_for_next_line() {
        let toks = tokenize("class A:\n  x").unwrap().0;
        let indented = toks
            .iter()
            .find(|t| matches!(t.kind, RawKind::Identifier(ref s) if s == "x"))
            .unwrap();
        assert!(indented.must_indent);
    }
}
