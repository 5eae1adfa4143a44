//! Stage (b) of the indent filter: walks the annotated raw-token stream,
//! maintains the indentation-level stack, and synthesizes `Indent`/`Dedent`
//! tokens the way `spec.md` §4.2 describes. Blank and indent-only lines are
//! dropped here rather than in the raw lexer, since telling a blank line
//! from a real one needs the `at_line_start`/`must_indent` bookkeeping the
//! lexer attached to each token.

use crate::error::{Error, Result};
use crate::lexer::{RawKind, RawToken};
use crate::token::{Token, TokenKind};

pub(crate) fn filter(raw: Vec<RawToken>) -> Result<Vec<Token>> {
    let mut levels: Vec<usize> = vec![0];
    let mut depth: usize = 0;
    let mut prev_was_ws = false;
    let mut out = Vec::new();
    let mut last_line = 1;

    for token in raw {
        last_line = token.line;

        match token.kind {
            RawKind::Ws(width) => {
                depth = width;
                prev_was_ws = true;
                continue;
            }
            RawKind::Newline => {
                depth = 0;
                if prev_was_ws || token.at_line_start {
                    continue;
                }
                out.push(Token::new(TokenKind::Newline, token.line, token.column));
                continue;
            }
            _ => {}
        }

        prev_was_ws = false;

        if token.must_indent {
            if depth <= *levels.last().unwrap() {
                log::warn!("expected indent at line {}", token.line);
                return Err(Error::ExpectedIndent { line: token.line });
            }
            levels.push(depth);
            out.push(Token::new(TokenKind::Indent, token.line, token.column));
        } else if token.at_line_start {
            let top = *levels.last().unwrap();
            if depth > top {
                log::warn!("unexpected indent at line {}", token.line);
                return Err(Error::UnexpectedIndent { line: token.line });
            } else if depth < top {
                match levels.iter().position(|&l| l == depth) {
                    None => {
                        log::warn!("inconsistent dedent at line {}", token.line);
                        return Err(Error::InconsistentIndent { line: token.line });
                    }
                    Some(i) => {
                        for _ in i + 1..levels.len() {
                            out.push(Token::new(TokenKind::Dedent, token.line, token.column));
                            levels.pop();
                        }
                    }
                }
            }
        }

        out.push(convert(token));
    }

    for _ in 1..levels.len() {
        out.push(Token::new(TokenKind::Dedent, last_line, 1));
    }
    out.push(Token::new(TokenKind::EndMarker, last_line, 1));
    Ok(out)
}

fn convert(token: RawToken) -> Token {
    let kind = match token.kind {
        RawKind::Keyword(k) => TokenKind::Keyword(k),
        RawKind::Identifier(i) => TokenKind::Identifier(i),
        RawKind::IntegerConstant(n) => TokenKind::IntegerConstant(n),
        RawKind::StringConstant(s) => TokenKind::StringConstant(s),
        RawKind::Symbol(c) => TokenKind::Symbol(c),
        RawKind::Colon => TokenKind::Colon,
        RawKind::Arrow => TokenKind::Arrow,
        RawKind::Ws(_) | RawKind::Newline => unreachable!("handled before convert"),
    };
    Token::new(kind, token.line, token.column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn run(src: &str) -> Vec<TokenKind> {
        filter(tokenize(src).unwrap().0)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn indent_dedent_bracket_around_a_block() {
        let kinds = run("class A:\n  var num x\n");
        let indents = kinds.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, dedents);
        assert!(indents >= 1);
    }

    #[test]
    fn blank_lines_produce_no_tokens() {
        let kinds = run("class A:\n\n  field num x\n");
        // exactly: Keyword(class) Identifier(A) Colon Indent Keyword(field)
        // Keyword(num) Identifier(x) Newline Dedent EndMarker — no stray
        // Newline for the blank line.
        let newline_count = kinds.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newline_count, 1);
    }

    #[test]
    fn unexpected_indent_is_an_error() {
        let err = filter(tokenize("x\n  y\n").unwrap().0).unwrap_err();
        assert!(matches!(err, Error::UnexpectedIndent { .. }));
    }

    #[test]
    fn inconsistent_dedent_is_an_error() {
        let err = filter(tokenize("class A:\n    x\n  y\n").unwrap().0).unwrap_err();
        assert!(matches!(err, Error::InconsistentIndent { .. }));
    }

    #[test]
    fn trailing_dedents_synthesized_at_eof() {
        let kinds = run("class A:\n  field num x\n");
        assert_eq!(kinds.last(), Some(&TokenKind::EndMarker));
        assert_eq!(kinds[kinds.len() - 2], TokenKind::Dedent);
    }
}
