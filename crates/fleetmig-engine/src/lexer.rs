//! Minimal Python lexing for verification
//!
//! Masks comments, and optionally string literals, with spaces. Byte offsets
//! and newlines are preserved so positions in masked text map back 1:1.

/// What to blank out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mask {
    /// `#` comments only
    Comments,
    /// Comments and string literals, including triple-quoted
    CommentsAndStrings,
}

/// Masked source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Masked {
    /// Text with masked regions replaced by spaces
    pub text: String,
    /// Line where an unterminated string starts, if any
    pub unterminated: Option<usize>,
}

#[derive(Clone, Copy)]
enum State {
    Code,
    Comment,
    Str { quote: char, triple: bool, open_line: usize },
}

/// Mask `source` according to `mode`
#[must_use]
pub fn mask(source: &str, mode: Mask) -> Masked {
    let mask_strings = mode == Mask::CommentsAndStrings;
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut line = 1;
    let mut unterminated = None;
    let mut i = 0;

    let blank = |out: &mut String, c: char| {
        if c == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        }
    };

    while i < chars.len() {
        let c = chars[i];
        match state {
            State::Code => match c {
                '#' => {
                    state = State::Comment;
                    blank(&mut out, c);
                }
                '\'' | '"' => {
                    let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                    let width = if triple { 3 } else { 1 };
                    for _ in 0..width {
                        if mask_strings {
                            blank(&mut out, c);
                        } else {
                            out.push(c);
                        }
                    }
                    state = State::Str {
                        quote: c,
                        triple,
                        open_line: line,
                    };
                    i += width;
                    continue;
                }
                _ => out.push(c),
            },
            State::Comment => {
                if c == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    blank(&mut out, c);
                }
            }
            State::Str {
                quote,
                triple,
                open_line,
            } => {
                let keep = |out: &mut String, c: char| {
                    if mask_strings {
                        blank(out, c);
                    } else {
                        out.push(c);
                    }
                };
                if c == '\\' {
                    keep(&mut out, c);
                    if let Some(&next) = chars.get(i + 1) {
                        if next == '\n' {
                            line += 1;
                        }
                        keep(&mut out, next);
                    }
                    i += 2;
                    continue;
                }
                if c == '\n' && !triple {
                    unterminated = unterminated.or(Some(open_line));
                    state = State::Code;
                    out.push('\n');
                    line += 1;
                    i += 1;
                    continue;
                }
                let closes = c == quote
                    && (!triple
                        || (chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote)));
                if closes {
                    let width = if triple { 3 } else { 1 };
                    for _ in 0..width {
                        keep(&mut out, quote);
                    }
                    state = State::Code;
                    i += width;
                    continue;
                }
                keep(&mut out, c);
            }
        }
        if c == '\n' {
            line += 1;
        }
        i += 1;
    }

    if let State::Str { open_line, .. } = state {
        unterminated = unterminated.or(Some(open_line));
    }

    Masked {
        text: out,
        unterminated,
    }
}

/// 1-based line number of byte `offset` in `text`
#[must_use]
pub fn line_at(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}
