//! A pull lexer for C# source text.
//!
//! Produces a flat token stream: identifiers (keywords are not
//! distinguished here), string/char/number literals, and single-character
//! punctuation. Comments, preprocessor directives, and whitespace are
//! skipped. Interpolated strings are consumed as one string token,
//! including any embedded `{…}` expressions; verbatim strings honor the
//! `""` escape. The scanner layered on top decides what token shapes mean.
//!
//! Forward scans for a terminator — end of line, `*/`, a closing quote —
//! go through `memchr`/`memmem` rather than byte-at-a-time loops.

use memchr::{memchr, memchr2, memchr_iter, memmem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'d> {
    Ident(&'d str),
    /// Inner text of the literal, quotes stripped, escapes left as written.
    Str(&'d str),
    Char,
    Number,
    Punct(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'d> {
    pub kind: TokenKind<'d>,
    pub line: u32,
    pub col: u32,
}

impl<'d> Token<'d> {
    pub fn ident(&self) -> Option<&'d str> {
        match self.kind {
            TokenKind::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }
}

struct Cursor<'d> {
    src: &'d str,
    bytes: &'d [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'d> Cursor<'d> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    /// Jump the cursor to an absolute position found by a forward scan,
    /// keeping the line/column bookkeeping consistent with `bump`.
    fn advance_to(&mut self, target: usize) {
        let skipped = &self.bytes[self.pos..target];
        let mut last_newline = None;
        for i in memchr_iter(b'\n', skipped) {
            self.line += 1;
            last_newline = Some(i);
        }
        match last_newline {
            Some(i) => self.col = (skipped.len() - i) as u32,
            None => self.col += skipped.len() as u32,
        }
        self.pos = target;
    }
}

pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    let mut cursor = Cursor {
        src,
        bytes: src.as_bytes(),
        pos: 0,
        line: 1,
        col: 1,
    };
    let mut tokens = Vec::new();
    let mut at_line_start = true;

    while let Some(b) = cursor.peek() {
        let line = cursor.line;
        let col = cursor.col;
        match b {
            b' ' | b'\t' | b'\r' => {
                cursor.bump();
            }
            b'\n' => {
                cursor.bump();
                at_line_start = true;
                continue;
            }
            b'#' if at_line_start => {
                skip_to_eol(&mut cursor);
            }
            b'/' if cursor.peek_at(1) == Some(b'/') => {
                skip_to_eol(&mut cursor);
            }
            b'/' if cursor.peek_at(1) == Some(b'*') => {
                cursor.bump();
                cursor.bump();
                let target = match memmem::find(&cursor.bytes[cursor.pos..], b"*/") {
                    Some(i) => cursor.pos + i + 2,
                    None => cursor.bytes.len(),
                };
                cursor.advance_to(target);
            }
            b'"' => {
                let text = lex_ordinary_string(&mut cursor);
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    line,
                    col,
                });
            }
            b'@' | b'$' => {
                // `@"…"`, `$"…"`, `$@"…"`, `@$"…"`, or an `@ident`.
                let (verbatim, interpolated, prefix_len) = string_prefix(&cursor);
                if prefix_len > 0 {
                    for _ in 0..prefix_len {
                        cursor.bump();
                    }
                    let text = if interpolated {
                        lex_interpolated_string(&mut cursor, verbatim)
                    } else {
                        lex_verbatim_string(&mut cursor)
                    };
                    tokens.push(Token {
                        kind: TokenKind::Str(text),
                        line,
                        col,
                    });
                } else if b == b'@' && cursor.peek_at(1).is_some_and(is_ident_start) {
                    cursor.bump();
                    let text = lex_ident(&mut cursor);
                    tokens.push(Token {
                        kind: TokenKind::Ident(text),
                        line,
                        col,
                    });
                } else {
                    cursor.bump();
                    tokens.push(Token {
                        kind: TokenKind::Punct(b as char),
                        line,
                        col,
                    });
                }
            }
            b'\'' => {
                cursor.bump();
                while let Some(c) = cursor.bump() {
                    match c {
                        b'\\' => {
                            cursor.bump();
                        }
                        b'\'' => break,
                        _ => {}
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Char,
                    line,
                    col,
                });
            }
            _ if b.is_ascii_digit() => {
                cursor.bump();
                while let Some(c) = cursor.peek() {
                    if c.is_ascii_alphanumeric() || c == b'_' {
                        cursor.bump();
                    } else if c == b'.' && cursor.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                        cursor.bump();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Number,
                    line,
                    col,
                });
            }
            _ if is_ident_start(b) => {
                let text = lex_ident(&mut cursor);
                tokens.push(Token {
                    kind: TokenKind::Ident(text),
                    line,
                    col,
                });
            }
            _ => {
                cursor.bump();
                tokens.push(Token {
                    kind: TokenKind::Punct(b as char),
                    line,
                    col,
                });
            }
        }
        at_line_start = false;
    }

    tokens
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn lex_ident<'d>(cursor: &mut Cursor<'d>) -> &'d str {
    let start = cursor.pos;
    cursor.bump();
    while cursor.peek().is_some_and(is_ident_continue) {
        cursor.bump();
    }
    &cursor.src[start..cursor.pos]
}

fn skip_to_eol(cursor: &mut Cursor<'_>) {
    let target = match memchr(b'\n', &cursor.bytes[cursor.pos..]) {
        Some(i) => cursor.pos + i,
        None => cursor.bytes.len(),
    };
    cursor.advance_to(target);
}

/// Detect a string prefix at the cursor: (verbatim, interpolated, length).
fn string_prefix(cursor: &Cursor<'_>) -> (bool, bool, usize) {
    let a = cursor.peek();
    let b = cursor.peek_at(1);
    let c = cursor.peek_at(2);
    match (a, b, c) {
        (Some(b'@'), Some(b'"'), _) => (true, false, 1),
        (Some(b'$'), Some(b'"'), _) => (false, true, 1),
        (Some(b'@'), Some(b'$'), Some(b'"')) | (Some(b'$'), Some(b'@'), Some(b'"')) => {
            (true, true, 2)
        }
        _ => (false, false, 0),
    }
}

fn lex_ordinary_string<'d>(cursor: &mut Cursor<'d>) -> &'d str {
    cursor.bump(); // opening quote
    let start = cursor.pos;
    loop {
        let rest = &cursor.bytes[cursor.pos..];
        match memchr2(b'"', b'\\', rest) {
            Some(i) if rest[i] == b'\\' => {
                cursor.advance_to(cursor.pos + i);
                cursor.bump(); // backslash
                cursor.bump(); // escaped byte
            }
            Some(i) => {
                cursor.advance_to(cursor.pos + i);
                break;
            }
            None => {
                cursor.advance_to(cursor.bytes.len());
                break;
            }
        }
    }
    let end = cursor.pos;
    cursor.bump(); // closing quote
    &cursor.src[start..end]
}

fn lex_verbatim_string<'d>(cursor: &mut Cursor<'d>) -> &'d str {
    cursor.bump(); // opening quote
    let start = cursor.pos;
    loop {
        match memchr(b'"', &cursor.bytes[cursor.pos..]) {
            Some(i) => {
                cursor.advance_to(cursor.pos + i);
                // `""` is an escaped quote, anything else ends the literal.
                if cursor.peek_at(1) == Some(b'"') {
                    cursor.bump();
                    cursor.bump();
                } else {
                    break;
                }
            }
            None => {
                cursor.advance_to(cursor.bytes.len());
                break;
            }
        }
    }
    let end = cursor.pos;
    cursor.bump();
    &cursor.src[start..end]
}

/// Consume an interpolated string as one token, skipping over embedded
/// `{…}` holes (which may themselves contain strings and braces).
fn lex_interpolated_string<'d>(cursor: &mut Cursor<'d>, verbatim: bool) -> &'d str {
    cursor.bump(); // opening quote
    let start = cursor.pos;
    let mut hole_depth = 0usize;
    loop {
        match cursor.peek() {
            None => break,
            Some(b'{') if cursor.peek_at(1) == Some(b'{') && hole_depth == 0 => {
                cursor.bump();
                cursor.bump();
            }
            Some(b'{') => {
                hole_depth += 1;
                cursor.bump();
            }
            Some(b'}') if cursor.peek_at(1) == Some(b'}') && hole_depth == 0 => {
                cursor.bump();
                cursor.bump();
            }
            Some(b'}') if hole_depth > 0 => {
                hole_depth -= 1;
                cursor.bump();
            }
            Some(b'"') if hole_depth > 0 => {
                // A nested string inside a hole.
                lex_ordinary_string(cursor);
            }
            Some(b'"') if verbatim && cursor.peek_at(1) == Some(b'"') => {
                cursor.bump();
                cursor.bump();
            }
            Some(b'"') => break,
            Some(b'\\') if !verbatim && hole_depth == 0 => {
                cursor.bump();
                cursor.bump();
            }
            _ => {
                cursor.bump();
            }
        }
    }
    let end = cursor.pos;
    cursor.bump();
    &cursor.src[start..end]
}
